// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{IdentityProvider, Session};
use canvass_core::DeviceId;

/// Identity that never changes for the life of the process.
///
/// Used by tooling and single-user deployments where sign-in happens before
/// the engine starts.
#[derive(Clone, Debug)]
pub struct StaticIdentity {
    session: Session,
    device_id: DeviceId,
}

impl StaticIdentity {
    pub fn new(session: Session, device_id: DeviceId) -> Self {
        Self { session, device_id }
    }
}

impl IdentityProvider for StaticIdentity {
    fn session(&self) -> Option<Session> {
        Some(self.session.clone())
    }

    fn device_id(&self) -> DeviceId {
        self.device_id.clone()
    }
}
