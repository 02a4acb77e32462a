use anyhow::{Result, anyhow};
use serde::Serialize;
use vault_files::FileResult;

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Turns an engine failure into the message a caller is allowed to see.
/// Internal causes were already logged by the engine.
pub fn engine<T>(result: FileResult<T>) -> Result<T> {
    result.map_err(|e| anyhow!("{} (status {})", e.public_message(), e.status_code()))
}
