// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use rowtrail_domain::RowKey;

/// Which side of a mutation a row image belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImagePhase {
    /// Captured before the statement ran.
    Before,
    /// Captured after the statement ran.
    After,
}

impl std::fmt::Display for ImagePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Before => f.write_str("before"),
            Self::After => f.write_str("after"),
        }
    }
}

/// Errors raised while planning or resolving captured changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The same key appears more than once in one batch.
    ///
    /// A single statement may affect a row at most once.
    DuplicateKeyInBatch(RowKey),
    /// Rows of one batch do not write the same set of columns.
    InconsistentBatchColumns {
        /// The first row whose columns differ from the batch.
        key: RowKey,
        /// The columns of the first row of the batch.
        expected: Vec<String>,
        /// The columns of the offending row.
        found: Vec<String>,
    },
    /// A row image required to classify a change was not captured.
    MissingImage {
        /// The affected row.
        key: RowKey,
        /// Which image was missing.
        phase: ImagePhase,
    },
}

impl std::fmt::Display for CoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateKeyInBatch(key) => {
                write!(f, "Key {key} appears more than once in the same batch")
            }
            Self::InconsistentBatchColumns {
                key,
                expected,
                found,
            } => write!(
                f,
                "Row {key} writes columns [{}] but the batch writes [{}]",
                found.join(", "),
                expected.join(", ")
            ),
            Self::MissingImage { key, phase } => {
                write!(f, "Missing {phase} image for row {key}")
            }
        }
    }
}

impl std::error::Error for CoreError {}
