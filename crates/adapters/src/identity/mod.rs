// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Who is signed in on this device

mod fixed;

pub use fixed::StaticIdentity;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeIdentity;

use canvass_core::{DeviceId, UserId};

/// A signed-in session
///
/// `session_id` changes on every sign-in, so comparing it before and after a
/// network call tells whether the result still belongs to the live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    pub session_id: String,
}

impl Session {
    pub fn new(user_id: impl Into<UserId>, session_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }
}

/// Source of the current user and device identity
pub trait IdentityProvider: Clone + Send + Sync + 'static {
    /// Current session, `None` when signed out
    fn session(&self) -> Option<Session>;

    /// Stable identifier of this installation
    fn device_id(&self) -> DeviceId;
}
