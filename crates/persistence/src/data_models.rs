// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use rowtrail_domain::{TableRef, Value};
use serde::{Deserialize, Serialize};

/// A table registered for change logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationData {
    pub registration_id: i64,
    pub table: TableRef,
    /// The business key column; its value becomes `row_key` in the log.
    pub key_column: String,
    /// The columns captured in row images, fixed when the table was first
    /// enabled.
    pub tracked_columns: Vec<String>,
    pub enabled: bool,
    pub registered_at: String,
    pub updated_at: String,
}

/// The contents of a table, read column by column.
#[derive(Debug, Clone, PartialEq)]
pub struct TableData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// What one monitored mutation did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationSummary {
    /// Rows the statement reported as changed.
    pub affected: usize,
    /// Change log records appended.
    pub logged: usize,
    /// Updates that changed no tracked column and were not logged.
    pub suppressed: usize,
}

impl MutationSummary {
    /// Adds another summary's counts to this one.
    pub const fn absorb(&mut self, other: Self) {
        self.affected += other.affected;
        self.logged += other.logged;
        self.suppressed += other.suppressed;
    }
}
