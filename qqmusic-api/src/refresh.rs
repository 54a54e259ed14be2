//! Credential refresh engine.
//!
//! # Endpoint
//!
//! `music.login.LoginServer.Login`, called with the current credential
//! attached:
//!
//! ```json
//! { "refresh_key": "...", "refresh_token": "...", "musickey": "...", "musicid": 123456 }
//! ```
//!
//! Response `data`:
//!
//! ```json
//! { "musickey": "...", "musicid": 123456, "refresh_key": "...",
//!   "refresh_token": "...", "keyExpiresIn": 259200 }
//! ```
//!
//! A credential is refreshed once it has less than 48 hours left (or on
//! demand). The new row is written with an optimistic check on
//! `musickey_createtime`, so two overlapping refreshes cannot both win.

use crate::client::QqMusicClient;
use crate::credential::{Credential, Freshness};
use crate::error::{QqMusicError, Result};
use crate::store::CredentialStore;
use crate::types::RefreshReport;
use chrono::Utc;
use serde_json::{Value, json};
use tracing::{error, info, warn};

const MODULE: &str = "music.login.LoginServer";
const METHOD: &str = "Login";

/// What a refresh check did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The store is empty.
    NotFound,
    /// Outside the refresh window and not forced.
    StillFresh { remaining_secs: i64 },
    /// A new credential was obtained and persisted.
    Refreshed { credential: Credential },
    /// The vendor issued a new credential, but the row had already been
    /// replaced by another writer; the store was left as that writer left it.
    Superseded,
}

impl RefreshOutcome {
    pub fn report(&self) -> RefreshReport {
        let (success, message) = match self {
            Self::NotFound => (false, "credential not found".to_owned()),
            Self::StillFresh { remaining_secs } => (
                true,
                format!(
                    "credential valid for another {}h, no refresh needed",
                    remaining_secs / 3600
                ),
            ),
            Self::Refreshed { .. } => (true, "credential refreshed".to_owned()),
            Self::Superseded => (
                true,
                "credential was refreshed concurrently, keeping the stored one".to_owned(),
            ),
        };
        RefreshReport { success, message }
    }
}

/// Refresh state machine over a client and the credential store.
pub struct Refresher<'a> {
    client: &'a QqMusicClient,
    store: &'a dyn CredentialStore,
}

impl<'a> Refresher<'a> {
    pub fn new(client: &'a QqMusicClient, store: &'a dyn CredentialStore) -> Self {
        Self { client, store }
    }

    /// Refresh the stored credential if it is stale, or unconditionally
    /// when `force` is set.
    pub fn check_and_refresh(&self, force: bool) -> Result<RefreshOutcome> {
        self.check_and_refresh_at(force, Utc::now().timestamp())
    }

    /// [`check_and_refresh`](Self::check_and_refresh) at an explicit epoch
    /// second.
    ///
    /// # Errors
    ///
    /// - [`QqMusicError::MissingRefreshField`] — raised before any request
    /// - [`QqMusicError::Vendor`] — the refresh call was rejected (with hint)
    /// - [`QqMusicError::Network`] / [`QqMusicError::Json`] / [`QqMusicError::Store`]
    ///
    /// On any error the stored credential is left untouched.
    pub fn check_and_refresh_at(&self, force: bool, now: i64) -> Result<RefreshOutcome> {
        self.store.ensure_schema()?;
        let Some(current) = self.store.get()? else {
            warn!("refresh requested but no credential is stored");
            return Ok(RefreshOutcome::NotFound);
        };

        let remaining_secs = current.remaining_at(now);
        info!(
            musicid = current.musicid,
            remaining_hours = remaining_secs / 3600,
            force,
            "checking credential"
        );
        if !force && current.freshness_at(now) == Freshness::Fresh {
            return Ok(RefreshOutcome::StillFresh { remaining_secs });
        }

        let data = self.request_refresh(&current)?;
        let refreshed = merge(&current, &data, now);

        if self
            .store
            .compare_and_save(&refreshed, current.musickey_createtime)?
        {
            info!(
                musicid = refreshed.musicid,
                expires_in = refreshed.expires_in(),
                "credential refreshed"
            );
            Ok(RefreshOutcome::Refreshed {
                credential: refreshed,
            })
        } else {
            warn!("credential changed while refreshing, discarding our result");
            Ok(RefreshOutcome::Superseded)
        }
    }

    /// Scheduled trigger: never fails, only logs.
    pub fn run_scheduled(&self) -> Option<RefreshOutcome> {
        match self.check_and_refresh(false) {
            Ok(outcome) => {
                info!(message = %outcome.report().message, "scheduled refresh");
                Some(outcome)
            }
            Err(e) => {
                error!(error = %e, "scheduled refresh failed");
                None
            }
        }
    }

    fn request_refresh(&self, current: &Credential) -> Result<Value> {
        if current.refresh_key.is_empty() {
            return Err(QqMusicError::MissingRefreshField("refresh_key"));
        }
        if current.refresh_token.is_empty() {
            return Err(QqMusicError::MissingRefreshField("refresh_token"));
        }

        let param = json!({
            "refresh_key": current.refresh_key,
            "refresh_token": current.refresh_token,
            "musickey": current.musickey,
            "musicid": current.musicid,
        });
        self.client.call(MODULE, METHOD, &param, Some(current)).inspect_err(|e| {
            error!(musicid = current.musicid, error = %e, "credential refresh rejected");
        })
    }
}

/// Manual trigger, as answered to the routing layer.
pub fn refresh_credential(
    client: &QqMusicClient,
    store: &dyn CredentialStore,
    force: bool,
) -> Result<RefreshReport> {
    Refresher::new(client, store)
        .check_and_refresh(force)
        .map(|outcome| outcome.report())
}

/// New credential from the vendor reply; absent or empty fields keep the
/// previous value.
fn merge(current: &Credential, data: &Value, now: i64) -> Credential {
    let text = |name: &str, prior: &str| {
        data[name]
            .as_str()
            .filter(|s| !s.is_empty())
            .unwrap_or(prior)
            .to_owned()
    };
    let int = |name: &str| {
        let value = &data[name];
        value
            .as_i64()
            .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
            .filter(|&n| n > 0)
    };

    Credential {
        musicid: int("musicid").unwrap_or(current.musicid),
        musickey: text("musickey", &current.musickey),
        refresh_key: text("refresh_key", &current.refresh_key),
        refresh_token: text("refresh_token", &current.refresh_token),
        login_type: current.login_type,
        musickey_createtime: now,
        key_expires_in: int("keyExpiresIn").unwrap_or(current.key_expires_in),
    }
}
