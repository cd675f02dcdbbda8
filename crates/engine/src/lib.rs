// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! canvass sync engine
//!
//! [`SyncEngine`] is one signed-in session: it renders local mutations
//! optimistically, records them in the operation log, pushes full snapshots
//! through the offline queue and merges what other devices write.
//! [`spawn`] runs an engine as a single task so every mutation, remote
//! notification and timer tick is applied one at a time.

mod driver;
mod engine;
mod error;
mod status;

pub use driver::{spawn, EngineHandle};
pub use engine::{MutationTicket, SyncEngine};
pub use error::EngineError;
pub use status::SyncStatus;
