// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Read-only queries.
//!
//! ## Module Organization
//!
//! - `change_log` — change log readers
//! - `introspect` — PRAGMA-based table introspection and key detection
//! - `registration` — registration lookups
//! - `snapshot` — row image and whole-table reads

pub mod change_log;
pub mod introspect;
pub mod registration;
pub mod snapshot;
