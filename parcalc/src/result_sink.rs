// SPDX-License-Identifier: MIT

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{CalcError, Result};

/// Formats one result the way `printf("%f")` does: six fractional digits,
/// `inf`/`-inf` and `nan` for the special values.
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value == f64::INFINITY {
        "inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        format!("{value:.6}")
    }
}

pub fn write_values<W: Write>(out: &mut W, values: &[f64]) -> std::io::Result<()> {
    for value in values {
        writeln!(out, "{}", format_value(*value))?;
    }
    out.flush()
}

/// Creates or truncates `path` and writes one value per line.
pub fn write_results(path: &Path, values: &[f64]) -> Result<()> {
    let file = File::create(path).map_err(|e| CalcError::io(path, e))?;
    let mut out = BufWriter::new(file);
    write_values(&mut out, values).map_err(|e| CalcError::io(path, e))
}
