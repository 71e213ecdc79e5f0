// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

/// Errors raised while constructing domain values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The identifier is empty or contains characters outside `[A-Za-z0-9_]`.
    InvalidIdentifier(String),
}

impl std::fmt::Display for DomainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidIdentifier(name) => write!(f, "Invalid identifier: '{name}'"),
        }
    }
}

impl std::error::Error for DomainError {}
