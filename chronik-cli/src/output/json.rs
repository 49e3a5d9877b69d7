//! JSON output formatting.

use anyhow::Result;
use serde::Serialize;

/// Pretty-print any serializable value to stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
