//! Error types for the QQ Music protocol client.

use thiserror::Error;

/// Known vendor codes and what they mean for the caller.
///
/// Kept as data so new codes can be added without touching control flow.
const VENDOR_HINTS: &[(i64, &str)] = &[
    (
        10006,
        "refresh_token invalid or expired, log in again to obtain a new credential",
    ),
    (1000, "credential expired"),
    (2000, "invalid signature"),
];

/// Look up the human-readable hint for a vendor `code`.
pub fn vendor_hint(code: i64) -> Option<&'static str> {
    VENDOR_HINTS
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, hint)| *hint)
}

/// Errors that can occur when talking to the vendor or managing the credential.
#[derive(Debug, Error)]
pub enum QqMusicError {
    /// Missing or unusable configuration (e.g. no location for the store).
    #[error("configuration error: {0}")]
    Config(String),

    /// A required parameter is missing or malformed.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The vendor answered, but the `module.method` entry was missing or
    /// carried a non-zero `code`.
    ///
    /// Common codes (see [`vendor_hint`]):
    /// - `1000`  — credential expired
    /// - `2000`  — signature rejected
    /// - `10006` — refresh token invalid, re-login required
    #[error("{module}.{method} failed: {}", describe_vendor_code(.code))]
    Vendor {
        /// Vendor status code, `None` when the response had no entry (or no
        /// `code`) for the call.
        code: Option<i64>,
        module: String,
        method: String,
    },

    /// Transport failure (connection refused, timeout, TLS failure, etc.).
    #[error("network error: {0}")]
    Network(#[from] Box<dyn std::error::Error + Send + Sync>),

    /// The response body was not the JSON we expected.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No credential is stored.
    #[error("no stored credential")]
    CredentialMissing,

    /// The stored credential lacks a field required for refreshing.
    #[error("credential has no {0}, it cannot be refreshed")]
    MissingRefreshField(&'static str),

    /// Credential store failure.
    #[error("credential store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// File I/O error (config read, store directory creation).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for QqMusicError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(Box::new(e))
    }
}

impl QqMusicError {
    /// The vendor code carried by a [`QqMusicError::Vendor`] error.
    pub fn vendor_code(&self) -> Option<i64> {
        match self {
            Self::Vendor { code, .. } => *code,
            _ => None,
        }
    }

    /// Whether this is a vendor-level rejection (as opposed to transport,
    /// parse, or local failures). Fallback loops only swallow these.
    pub fn is_vendor(&self) -> bool {
        matches!(self, Self::Vendor { .. })
    }
}

#[allow(clippy::ref_option)]
fn describe_vendor_code(code: &Option<i64>) -> String {
    match code {
        None => "response carried no result code".to_owned(),
        Some(c) => match vendor_hint(*c) {
            Some(hint) => format!("code={c} ({hint})"),
            None => format!("code={c}"),
        },
    }
}

/// Convenience alias for `Result<T, QqMusicError>`.
pub type Result<T> = std::result::Result<T, QqMusicError>;
