// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake identity provider for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{IdentityProvider, Session};
use canvass_core::{DeviceId, UserId};
use std::sync::{Arc, Mutex};

/// Identity whose session the test can change at any point
#[derive(Clone)]
pub struct FakeIdentity {
    session: Arc<Mutex<Option<Session>>>,
    device_id: DeviceId,
}

impl FakeIdentity {
    pub fn signed_in(user_id: impl Into<UserId>, device_id: impl Into<DeviceId>) -> Self {
        Self {
            session: Arc::new(Mutex::new(Some(Session::new(user_id, "session-1")))),
            device_id: device_id.into(),
        }
    }

    pub fn signed_out(device_id: impl Into<DeviceId>) -> Self {
        Self {
            session: Arc::new(Mutex::new(None)),
            device_id: device_id.into(),
        }
    }

    pub fn sign_in(&self, session: Session) {
        *self.session.lock().unwrap_or_else(|e| e.into_inner()) = Some(session);
    }

    pub fn sign_out(&self) {
        *self.session.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl IdentityProvider for FakeIdentity {
    fn session(&self) -> Option<Session> {
        self.session.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn device_id(&self) -> DeviceId {
        self.device_id.clone()
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
