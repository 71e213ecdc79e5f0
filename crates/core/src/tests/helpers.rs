// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use rowtrail_domain::{RowImage, Value};
use time::OffsetDateTime;
use time::macros::datetime;

pub fn tracked_columns() -> Vec<String> {
    vec![String::from("int_value"), String::from("varchar_value")]
}

pub fn row_image(int_value: impl Into<Value>, varchar_value: impl Into<Value>) -> RowImage {
    RowImage::new()
        .with("int_value", int_value)
        .with("varchar_value", varchar_value)
}

pub fn statement_time() -> OffsetDateTime {
    datetime!(2026-03-01 08:30:00 UTC)
}
