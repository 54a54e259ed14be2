//! Credential persistence.
//!
//! Exactly one credential row exists (fixed key `id = 1`). It is created on
//! first write, overwritten in place afterwards and never deleted.

use crate::credential::Credential;
use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, params};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Upsert-capable single-row store for the session credential.
pub trait CredentialStore: Send + Sync {
    /// Create the backing table if it does not exist. Idempotent.
    fn ensure_schema(&self) -> Result<()>;

    /// The current credential, if one was ever written.
    fn get(&self) -> Result<Option<Credential>>;

    /// Insert or overwrite every field of the row.
    fn save(&self, credential: &Credential) -> Result<()>;

    /// Overwrite the row only if its `musickey_createtime` still equals
    /// `expected_createtime`. Returns `false` when another writer got there
    /// first (or the row vanished), leaving the store untouched.
    fn compare_and_save(&self, credential: &Credential, expected_createtime: i64) -> Result<bool>;
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS credential (
        id                  INTEGER PRIMARY KEY CHECK (id = 1),
        musicid             INTEGER NOT NULL,
        musickey            TEXT    NOT NULL,
        refresh_key         TEXT    NOT NULL DEFAULT '',
        refresh_token       TEXT    NOT NULL DEFAULT '',
        login_type          INTEGER NOT NULL DEFAULT 0,
        musickey_createtime INTEGER NOT NULL DEFAULT 0,
        key_expires_in      INTEGER NOT NULL DEFAULT 0
    )";

/// SQLite-backed [`CredentialStore`].
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file at `path`, creating parent
    /// directories if needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "opened credential store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Private, non-persistent store (tests, one-shot tools).
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // the connection holds no state that a panicking holder could corrupt
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CredentialStore for SqliteStore {
    fn ensure_schema(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    fn get(&self) -> Result<Option<Credential>> {
        let row = self
            .conn()
            .query_row(
                "SELECT musicid, musickey, refresh_key, refresh_token, login_type,
                        musickey_createtime, key_expires_in
                 FROM credential WHERE id = 1",
                [],
                |row| {
                    Ok(Credential {
                        musicid: row.get(0)?,
                        musickey: row.get(1)?,
                        refresh_key: row.get(2)?,
                        refresh_token: row.get(3)?,
                        login_type: row.get(4)?,
                        musickey_createtime: row.get(5)?,
                        key_expires_in: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    fn save(&self, c: &Credential) -> Result<()> {
        self.conn().execute(
            "INSERT INTO credential (id, musicid, musickey, refresh_key, refresh_token,
                                     login_type, musickey_createtime, key_expires_in)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                musicid             = excluded.musicid,
                musickey            = excluded.musickey,
                refresh_key         = excluded.refresh_key,
                refresh_token       = excluded.refresh_token,
                login_type          = excluded.login_type,
                musickey_createtime = excluded.musickey_createtime,
                key_expires_in      = excluded.key_expires_in",
            params![
                c.musicid,
                c.musickey,
                c.refresh_key,
                c.refresh_token,
                c.login_type,
                c.musickey_createtime,
                c.key_expires_in,
            ],
        )?;
        debug!(musicid = c.musicid, "credential saved");
        Ok(())
    }

    fn compare_and_save(&self, c: &Credential, expected_createtime: i64) -> Result<bool> {
        let changed = self.conn().execute(
            "UPDATE credential SET
                musicid = ?1, musickey = ?2, refresh_key = ?3, refresh_token = ?4,
                login_type = ?5, musickey_createtime = ?6, key_expires_in = ?7
             WHERE id = 1 AND musickey_createtime = ?8",
            params![
                c.musicid,
                c.musickey,
                c.refresh_key,
                c.refresh_token,
                c.login_type,
                c.musickey_createtime,
                c.key_expires_in,
                expected_createtime,
            ],
        )?;
        Ok(changed == 1)
    }
}

/// Read the stored credential, seeding the store from `initial` (a
/// credential JSON value) the first time it is found empty.
///
/// An unparsable `initial` value is logged and treated as absent.
pub fn load_or_bootstrap(
    store: &dyn CredentialStore,
    initial: Option<&str>,
) -> Result<Option<Credential>> {
    store.ensure_schema()?;
    if let Some(credential) = store.get()? {
        return Ok(Some(credential));
    }

    let Some(raw) = initial.filter(|s| !s.trim().is_empty()) else {
        return Ok(None);
    };
    match Credential::from_json(raw) {
        Ok(credential) => {
            store.save(&credential)?;
            info!(musicid = credential.musicid, "credential bootstrapped from configuration");
            Ok(Some(credential))
        }
        Err(e) => {
            warn!(error = %e, "ignoring invalid bootstrap credential");
            Ok(None)
        }
    }
}

/// Admin submission: parse `json` and overwrite the stored credential.
///
/// # Errors
///
/// [`QqMusicError::Validation`](crate::QqMusicError::Validation) or
/// [`QqMusicError::Json`](crate::QqMusicError::Json) for a malformed
/// submission; the store is left untouched in that case.
pub fn submit_credential(store: &dyn CredentialStore, json: &str) -> Result<Credential> {
    let credential = Credential::from_json(json)?;
    store.ensure_schema()?;
    store.save(&credential)?;
    info!(musicid = credential.musicid, "credential submitted");
    Ok(credential)
}
