// Parses the tabular output of `brew services list`.

use super::model::{ServiceRecord, ServiceStatus};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("service list is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("service {name:?} is listed more than once")]
    DuplicateService { name: String },
}

/// Parses the full stdout of `brew services list`.
///
/// Expected format approx:
/// ```text
/// Name  Status  User  File
/// nginx started alice ~/Library/LaunchAgents/homebrew.mxcl.nginx.plist
/// redis none
/// ```
/// The first line is always the header and is dropped by position. An empty
/// listing is a valid result, not an error.
pub fn parse_service_list(raw: &[u8]) -> Result<Vec<ServiceRecord>, ParseError> {
    let text = std::str::from_utf8(raw)?;
    let text = text.trim_end_matches(['\n', '\r']);

    let mut services: Vec<ServiceRecord> = Vec::new();
    for line in text.lines().skip(1) {
        let Some(service) = parse_service_line(line) else {
            continue;
        };

        if services.iter().any(|s| s.name == service.name) {
            return Err(ParseError::DuplicateService { name: service.name });
        }
        services.push(service);
    }

    Ok(services)
}

/// Parses a single data row. Returns `None` for blank lines.
fn parse_service_line(line: &str) -> Option<ServiceRecord> {
    let mut parts = line.split_whitespace();
    let name = parts.next()?;

    let status = match parts.next() {
        Some("started") => ServiceStatus::Running,
        // "stopped", "none", "error", "scheduled"... are all treated as not running
        Some(_) => ServiceStatus::Stopped,
        None => ServiceStatus::Unknown,
    };

    Some(ServiceRecord {
        name: name.to_string(),
        status,
        owner: parts.next().map(str::to_string),
    })
}
