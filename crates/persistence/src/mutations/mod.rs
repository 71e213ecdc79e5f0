// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! State-changing operations outside of monitored tables.
//!
//! ## Module Organization
//!
//! - `change_log` — the append-only change log writer and log store DDL
//! - `registration` — enabling and disabling capture per table
//!
//! Writes to monitored tables go through `unit_of_work` instead.

pub mod change_log;
pub mod registration;
