//! The shared backend session credential.
//!
//! A credential is submitted once (admin submission or bootstrap value) as
//! JSON, in either of these shapes:
//!
//! ```json
//! { "musicid": 123456, "musickey": "Q_H_L_...", "refresh_key": "...",
//!   "refresh_token": "...", "login_type": 2,
//!   "musickeyCreateTime": 1735000000, "keyExpiresIn": 259200 }
//! ```
//!
//! ```json
//! { "credential": { ... } }
//! ```
//!
//! `musicid` may be a number or a numeric string; vendor camelCase names are
//! accepted next to the snake_case column names.

use crate::error::{QqMusicError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Lifetime assumed when the vendor did not report `keyExpiresIn` (3 days).
pub const DEFAULT_KEY_EXPIRES_IN: i64 = 259_200;

/// `tmeLoginType` sent when the credential does not carry one.
pub const DEFAULT_LOGIN_TYPE: i64 = 2;

/// Credentials with less than this much lifetime left are refreshed.
pub const REFRESH_WINDOW_SECS: i64 = 48 * 3600;

/// Staleness of a credential at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// At least [`REFRESH_WINDOW_SECS`] left.
    Fresh,
    /// Inside the refresh window (or already expired).
    Stale,
}

/// Singleton session credential, mirrored 1:1 by the store row.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(deserialize_with = "lenient_i64")]
    pub musicid: i64,
    pub musickey: String,
    #[serde(default, alias = "refreshKey")]
    pub refresh_key: String,
    #[serde(default, alias = "refreshToken")]
    pub refresh_token: String,
    #[serde(default, alias = "loginType", deserialize_with = "lenient_i64")]
    pub login_type: i64,
    #[serde(
        default,
        alias = "musickeyCreateTime",
        deserialize_with = "lenient_i64"
    )]
    pub musickey_createtime: i64,
    #[serde(default, alias = "keyExpiresIn", deserialize_with = "lenient_i64")]
    pub key_expires_in: i64,
}

impl Credential {
    /// Parse an admin submission or bootstrap value.
    ///
    /// # Errors
    ///
    /// [`QqMusicError::Validation`] when `musicid` or `musickey` is missing.
    pub fn from_json(input: &str) -> Result<Self> {
        let mut value: Value = serde_json::from_str(input)?;
        if let Some(inner) = value.get_mut("credential").filter(|v| v.is_object()) {
            value = inner.take();
        }
        for field in ["musicid", "musickey"] {
            if value.get(field).is_none_or(Value::is_null) {
                return Err(QqMusicError::Validation(format!("missing {field}")));
            }
        }
        let credential: Self = serde_json::from_value(value)?;
        if credential.musicid == 0 || credential.musickey.is_empty() {
            return Err(QqMusicError::Validation(
                "missing musicid or musickey".into(),
            ));
        }
        Ok(credential)
    }

    /// Effective lifetime in seconds.
    pub fn expires_in(&self) -> i64 {
        if self.key_expires_in > 0 {
            self.key_expires_in
        } else {
            DEFAULT_KEY_EXPIRES_IN
        }
    }

    /// Epoch second at which the `musickey` stops working.
    pub fn expiry(&self) -> i64 {
        self.musickey_createtime + self.expires_in()
    }

    /// Seconds of validity left at `now` (negative once expired).
    pub fn remaining_at(&self, now: i64) -> i64 {
        self.expiry() - now
    }

    pub fn freshness_at(&self, now: i64) -> Freshness {
        if self.remaining_at(now) < REFRESH_WINDOW_SECS {
            Freshness::Stale
        } else {
            Freshness::Fresh
        }
    }

    /// `tmeLoginType` as sent on the wire.
    pub fn effective_login_type(&self) -> i64 {
        if self.login_type > 0 {
            self.login_type
        } else {
            DEFAULT_LOGIN_TYPE
        }
    }

    /// Build the `Cookie` HTTP header value for vendor requests.
    pub fn cookie_header(&self) -> String {
        format!(
            "uin={}; qqmusic_key={key}; qm_keyst={key}; tmeLoginType={}",
            self.musicid,
            self.effective_login_type(),
            key = self.musickey,
        )
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // secrets are never printed
        f.debug_struct("Credential")
            .field("musicid", &self.musicid)
            .field("musickey", &redact(&self.musickey))
            .field("refresh_key", &redact(&self.refresh_key))
            .field("refresh_token", &redact(&self.refresh_token))
            .field("login_type", &self.login_type)
            .field("musickey_createtime", &self.musickey_createtime)
            .field("key_expires_in", &self.key_expires_in)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() { "<empty>" } else { "<redacted>" }
}

/// Accept numbers, numeric strings and `null` for integer columns.
fn lenient_i64<'de, D: Deserializer<'de>>(de: D) -> std::result::Result<i64, D::Error> {
    use serde::de::Error;

    match Value::deserialize(de)? {
        Value::Null => Ok(0),
        #[allow(clippy::cast_possible_truncation)]
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| D::Error::custom(format!("integer out of range: {n}"))),
        Value::String(s) if s.trim().is_empty() => Ok(0),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("not an integer: {s:?}"))),
        other => Err(D::Error::custom(format!("expected integer, got {other}"))),
    }
}
