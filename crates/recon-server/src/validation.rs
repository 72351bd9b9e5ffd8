//! Job request validation
//!
//! Presence of both fields is always required. The format checks only run
//! when strict argument checking is enabled in the runner configuration.

use serde::{Deserialize, Serialize};
use serde_json::Value;

const MAX_DOMAIN_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;
const MAX_TASK_LEN: usize = 64;

/// Caller-supplied `(domain, task)` pair for one script run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub domain: String,
    pub task: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Domain and task are required!")]
    MissingFields,

    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    #[error("Invalid task: {0}")]
    InvalidTask(String),
}

impl RunRequest {
    /// Extract both fields from a JSON body. Anything other than two
    /// non-empty strings counts as missing.
    pub fn from_json(body: &Value) -> Result<Self, ValidationError> {
        let field = |name: &str| {
            body.get(name)
                .and_then(Value::as_str)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        match (field("domain"), field("task")) {
            (Some(domain), Some(task)) => Ok(Self { domain, task }),
            _ => Err(ValidationError::MissingFields),
        }
    }

    /// Hostname syntax for the domain, a plain identifier for the task.
    /// Neither may look like a command-line flag.
    pub fn check_format(&self) -> Result<(), ValidationError> {
        check_domain(&self.domain)?;
        check_task(&self.task)
    }

    /// Positional arguments for the script, in order
    pub fn args(&self) -> Vec<String> {
        vec![self.domain.clone(), self.task.clone()]
    }
}

fn check_domain(domain: &str) -> Result<(), ValidationError> {
    let invalid = |reason: &str| Err(ValidationError::InvalidDomain(format!("{domain} ({reason})")));

    if domain.len() > MAX_DOMAIN_LEN {
        return invalid("too long");
    }

    let host = domain.strip_suffix('.').unwrap_or(domain);
    for label in host.split('.') {
        if label.is_empty() || label.len() > MAX_LABEL_LEN {
            return invalid("bad label length");
        }
        if label.starts_with('-') || label.ends_with('-') {
            return invalid("label starts or ends with '-'");
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return invalid("unexpected character");
        }
    }
    Ok(())
}

fn check_task(task: &str) -> Result<(), ValidationError> {
    if task.len() > MAX_TASK_LEN {
        return Err(ValidationError::InvalidTask(format!("{task} (too long)")));
    }
    if task.starts_with('-') {
        return Err(ValidationError::InvalidTask(format!("{task} (starts with '-')")));
    }
    if !task
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(ValidationError::InvalidTask(format!("{task} (unexpected character)")));
    }
    Ok(())
}
