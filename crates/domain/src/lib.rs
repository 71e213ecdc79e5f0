// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Domain types shared by every rowtrail crate.
//!
//! Nothing in this crate touches a database. It defines the validated
//! identifiers used to build SQL, the storage-class [`Value`] model, and the
//! row images that the change log captures before and after a mutation.

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

mod error;
mod identifier;
mod row;
mod value;

#[cfg(test)]
mod tests;

pub use error::DomainError;
pub use identifier::{Identifier, TableRef};
pub use row::{Assignment, RowImage, RowKey, RowValues};
pub use value::Value;
