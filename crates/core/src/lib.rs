// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Change capture logic, free of any storage concerns.
//!
//! The persistence layer reads row images and runs statements; everything
//! that decides *what* gets logged lives here:
//!
//! - [`SessionContext`] carries the actor of one unit of work
//! - [`diff`] decides whether an update changed any tracked column
//! - [`interceptor`] turns a row event into a log entry or a suppression
//! - [`coordinator`] expands batch, merge, and bulk-load requests into
//!   exactly one row event per affected key

#![deny(
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    clippy::style,
    clippy::correctness,
    clippy::all,
    clippy::suspicious,
    clippy::complexity,
    clippy::perf,
    clippy::unwrap_used,
    clippy::expect_used
)]

pub mod coordinator;
pub mod diff;
mod error;
pub mod interceptor;
mod session;

#[cfg(test)]
mod tests;

pub use coordinator::{MergePlan, MergeResolution};
pub use diff::Comparison;
pub use error::{CoreError, ImagePhase};
pub use interceptor::{Interception, RowEvent, intercept};
pub use session::SessionContext;
