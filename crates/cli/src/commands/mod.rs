// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod checksum;
pub mod config;
pub mod flags;
pub mod log;
pub mod merge;
pub mod queue;
