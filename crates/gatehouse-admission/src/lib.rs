// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Four-level rate-limit admission control.
//!
//! Every prompt passes the [`guard::RateLimitGuard`] before any model or
//! tool work starts: whitelist short-circuit, then burst, per-chat,
//! hourly, and daily checks in that order, fail-fast. Limit settings are
//! published as hot-swappable snapshots; blocked decisions are recorded
//! off the admission path by the [`recorder::ViolationRecorder`].

pub mod clock;
pub mod guard;
pub mod recorder;
pub mod settings;

pub use clock::{Clock, ManualClock, SystemClock};
pub use guard::RateLimitGuard;
pub use recorder::ViolationRecorder;
pub use settings::{LimitSettings, SettingsHandle};
