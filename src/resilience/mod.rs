// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Resilience primitives.
//!
//! - [`timeout::TimeoutGuard`]: race an operation against a deadline and an
//!   external cancel, delivering exactly one outcome

pub mod timeout;

pub use timeout::{with_timeout, CancelHandle, GuardError, TimeoutGuard};
