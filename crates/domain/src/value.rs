// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use serde::{Deserialize, Serialize};

/// A single column value, modelled on `SQLite` storage classes.
///
/// The serialized form is plain JSON (`null`, numbers, strings, byte arrays)
/// so stored row images stay readable. JSON has no infinity or NaN, so a
/// non-finite real serializes as `{"real": "inf"}`, `{"real": "-inf"}` or
/// `{"real": "NaN"}`. `Unsupported` marks a value whose storage class could
/// not be decoded; it serializes as `{"unsupported": "<type name>"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// A 64-bit signed integer.
    Integer(i64),
    /// A 64-bit float.
    Real(#[serde(with = "real_repr")] f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
    /// A value the engine cannot interpret.
    Unsupported {
        /// The storage class reported by the database.
        unsupported: String,
    },
}

mod real_repr {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Finite(f64),
        NonFinite { real: String },
    }

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            Repr::Finite(*value).serialize(serializer)
        } else {
            Repr::NonFinite {
                real: value.to_string(),
            }
            .serialize(serializer)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Finite(value) => Ok(value),
            Repr::NonFinite { real } => match real.parse::<f64>() {
                Ok(value) if !value.is_finite() => Ok(value),
                _ => Err(D::Error::custom(format!("not a non-finite real: {real}"))),
            },
        }
    }
}

impl Value {
    /// Returns `true` for SQL NULL.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the storage class name as `SQLite`'s `typeof()` reports it.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::Null => "null",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::Text(_) => "text",
            Self::Blob(_) => "blob",
            Self::Unsupported { unsupported } => unsupported,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("<NULL>"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
            Self::Blob(bytes) => write!(f, "x'{}'", hex::encode_upper(bytes)),
            Self::Unsupported { unsupported } => write!(f, "<unsupported:{unsupported}>"),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Blob(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
