use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every failure the client and the command layer can report.
///
/// The first eight variants are the user-facing kinds the CLI maps to
/// distinct exit codes; the rest are transport or decoding failures.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration not found or empty: {}", path.display())]
    ConfigNotFound { path: PathBuf },

    #[error("{}", environment_not_found_message(name.as_deref(), available))]
    EnvironmentNotFound {
        name: Option<String>,
        available: Vec<String>,
    },

    #[error("invalid value '{value}' for '{key}' in environment '{environment}'")]
    InvalidConfig {
        environment: String,
        key: String,
        value: String,
    },

    #[error("could not connect to {url}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("authentication failed (HTTP {status}): {body}")]
    Authentication { status: u16, body: String },

    #[error("invalid query, job was not created: {body}")]
    InvalidQuery { body: String },

    #[error("job did not complete after {attempts} attempt(s)")]
    RetriesExceeded { attempts: u32 },

    #[error("resource cannot be found '{name}', available resources: {}", available.join(", "))]
    ResourceNotFound {
        name: String,
        available: Vec<&'static str>,
    },

    #[error("file does not exist '{}'", path.display())]
    FileNotExists { path: PathBuf },

    #[error("API request failed: HTTP {status} for url ({url}): {message}")]
    Http {
        status: u16,
        url: String,
        message: String,
    },

    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected response from {url}: {message}")]
    MalformedResponse { url: String, message: String },

    #[error("invalid resource description: {0}")]
    InvalidDescription(String),

    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build HTTP client")]
    HttpClient(#[source] reqwest::Error),
}

impl Error {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::ConfigNotFound { .. } => 2,
            Error::EnvironmentNotFound { .. } => 3,
            Error::Connection { .. } => 4,
            Error::Authentication { .. } => 5,
            Error::InvalidQuery { .. } => 6,
            Error::RetriesExceeded { .. } => 7,
            Error::ResourceNotFound { .. } => 8,
            Error::FileNotExists { .. } => 9,
            _ => 1,
        }
    }

    /// Remediation advice printed under the error line, if any.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => Some(
                "create $HOME/.zacc.ini or pass one with '-c /path/to/config'; \
                 it needs a section with client_id and client_secret",
            ),
            Error::EnvironmentNotFound { name: None, .. } => Some(
                "set 'default_environment' in the [zacc] section or pass '-e <environment>'",
            ),
            Error::Connection { .. } => Some(
                "check your network connection and that the Zuora hosts resolve and are reachable",
            ),
            Error::Authentication { .. } => Some("check client_id and client_secret"),
            Error::RetriesExceeded { .. } => Some(
                "raise the limit with '-m <number of retries>', '-m 0' polls until the job finishes",
            ),
            _ => None,
        }
    }
}

fn environment_not_found_message(name: Option<&str>, available: &[String]) -> String {
    let configured = if available.is_empty() {
        "(none)".to_string()
    } else {
        available.join(", ")
    };
    match name {
        Some(name) => format!(
            "environment '{}' not found, environments configured: {}",
            name, configured
        ),
        None => format!(
            "no environment passed and no default environment set, environments configured: {}",
            configured
        ),
    }
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct ZuoraErrorResponse {
    #[serde(default)]
    pub(crate) message: Option<String>,
    #[serde(default)]
    pub(crate) reasons: Vec<ZuoraErrorReason>,
    // OAuth endpoints answer with {"error":...,"error_description":...}
    #[serde(default)]
    pub(crate) error: Option<String>,
    #[serde(default)]
    pub(crate) error_description: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct ZuoraErrorReason {
    #[serde(default)]
    pub(crate) code: Option<serde_json::Value>,
    #[serde(default)]
    pub(crate) message: Option<String>,
}

/// Builds a one-line summary of an error body, falling back to the raw text.
pub(crate) fn summarize_error_body(status: StatusCode, text: &str) -> String {
    let Ok(e) = serde_json::from_str::<ZuoraErrorResponse>(text) else {
        return single_line(text, status);
    };

    let mut parts: Vec<String> = Vec::new();
    if let Some(m) = e.message.as_deref().or(e.error_description.as_deref()) {
        parts.push(m.to_string());
    } else if let Some(m) = e.error.as_deref() {
        parts.push(m.to_string());
    }
    for reason in &e.reasons {
        let msg = reason.message.as_deref().unwrap_or("");
        match &reason.code {
            Some(code) => parts.push(format!("[{}] {}", code, msg)),
            None if !msg.is_empty() => parts.push(msg.to_string()),
            None => {}
        }
    }

    if parts.is_empty() {
        single_line(text, status)
    } else {
        parts.join("; ")
    }
}

fn single_line(text: &str, status: StatusCode) -> String {
    let joined = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if joined.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("empty response body")
            .to_string()
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarizes_zuora_reasons() {
        let body = r#"{"success":false,"reasons":[{"code":90000011,"message":"this resource is protected"}]}"#;
        assert_eq!(
            summarize_error_body(StatusCode::FORBIDDEN, body),
            "[90000011] this resource is protected"
        );
    }

    #[test]
    fn summarizes_oauth_error() {
        let body = r#"{"error":"invalid_client","error_description":"Invalid client credentials"}"#;
        assert_eq!(
            summarize_error_body(StatusCode::UNAUTHORIZED, body),
            "Invalid client credentials"
        );
    }

    #[test]
    fn falls_back_to_raw_text() {
        assert_eq!(
            summarize_error_body(StatusCode::BAD_GATEWAY, "<html>\n  bad gateway\n</html>"),
            "<html> bad gateway </html>"
        );
        assert_eq!(
            summarize_error_body(StatusCode::NOT_FOUND, ""),
            "Not Found"
        );
    }

    #[test]
    fn exit_codes_are_distinct_for_user_facing_kinds() {
        let errors = [
            Error::ConfigNotFound {
                path: PathBuf::from("x"),
            },
            Error::EnvironmentNotFound {
                name: None,
                available: vec![],
            },
            Error::Authentication {
                status: 401,
                body: String::new(),
            },
            Error::InvalidQuery {
                body: String::new(),
            },
            Error::RetriesExceeded { attempts: 3 },
            Error::ResourceNotFound {
                name: "x".into(),
                available: vec![],
            },
            Error::FileNotExists {
                path: PathBuf::from("x"),
            },
        ];
        let mut codes: Vec<i32> = errors.iter().map(Error::exit_code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
        assert!(!codes.contains(&1));
    }

    #[test]
    fn environment_message_lists_configured_names() {
        let err = Error::EnvironmentNotFound {
            name: Some("prod".into()),
            available: vec!["env1".into(), "env2".into()],
        };
        assert_eq!(
            err.to_string(),
            "environment 'prod' not found, environments configured: env1, env2"
        );
    }
}
