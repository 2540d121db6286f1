// SPDX-License-Identifier: PMPL-1.0-or-later
//! rtsdata Query
//!
//! Window policy and the range query engine. Every query returns rows
//! newest first, inside a window clamped to the channel's data and capped
//! at [`MAX_RECORDS`].

pub mod engine;
pub mod window;

pub use engine::{QueryEngine, QueryError};
pub use window::{clamp_limit, RangeRequest, Window, MAX_RECORDS};
