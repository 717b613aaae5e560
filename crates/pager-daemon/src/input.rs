//! JSON-lines input parsing

use pager_core::EngineEvent;
use thiserror::Error;

/// A rejected input line
#[derive(Debug, Error)]
pub enum InputError {
    #[error("malformed event: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("alert has an empty {0}")]
    EmptyField(&'static str),
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<EngineEvent>, InputError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let event: EngineEvent = serde_json::from_str(line)?;
    let alert = event.alert();
    if alert.id.trim().is_empty() {
        return Err(InputError::EmptyField("id"));
    }
    if alert.service_id.trim().is_empty() {
        return Err(InputError::EmptyField("serviceId"));
    }
    Ok(Some(event))
}
