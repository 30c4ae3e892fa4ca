//! SQLite-backed encrypted settings store.
//!
//! One row per setting. Key names are blinded and values sealed by
//! [`ValueCipher`], so the file on disk holds no readable key or value.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::error::StoreError;

use super::cipher::ValueCipher;
use super::data_dir;
use super::keys::MasterKey;
use super::kv::{next_count, KvStore};

const DB_FILE: &str = "settings.db";

/// How long a write waits on another process holding the database lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Sealed under the master key at creation. A key that cannot open it does
/// not belong to this store.
const CANARY_KEY: &str = "__canary";
const CANARY_VALUE: &str = "anima";

pub struct SecureStore {
    conn: Mutex<Connection>,
    cipher: ValueCipher,
}

impl SecureStore {
    /// Open the store at `<data dir>/settings.db`.
    ///
    /// # Errors
    /// Returns an error if the data directory is unavailable, the database
    /// cannot be opened or migrated, or `key` does not match the store.
    pub fn open(key: &MasterKey) -> Result<Self, StoreError> {
        let dir = data_dir().map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Self::open_at(&dir.join(DB_FILE), key)
    }

    pub fn open_at(path: &Path, key: &MasterKey) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        tracing::debug!(path = %path.display(), "opened settings store");
        Self::init(conn, key)
    }

    /// Open an in-memory store (for tests).
    pub fn open_memory(key: &MasterKey) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::OpenFailed {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        Self::init(conn, key)
    }

    fn init(conn: Connection, key: &MasterKey) -> Result<Self, StoreError> {
        let store = Self {
            conn: Mutex::new(conn),
            cipher: ValueCipher::new(key)?,
        };
        store.migrate()?;
        store.check_canary()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        self.lock()?.execute_batch(
            "CREATE TABLE IF NOT EXISTS settings (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );",
        )?;
        Ok(())
    }

    /// The canary row is stored under its plain name, since blinded names
    /// already differ between keys and would hide a mismatch.
    fn check_canary(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        match read_sealed(&conn, CANARY_KEY)? {
            Some(sealed) => match self.cipher.open(CANARY_KEY, &sealed) {
                Ok(v) if v == CANARY_VALUE => Ok(()),
                _ => Err(StoreError::Unavailable(
                    "master key does not match the settings store".into(),
                )),
            },
            None => {
                let sealed = self.cipher.seal(CANARY_KEY, CANARY_VALUE)?;
                conn.execute(
                    "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)",
                    params![CANARY_KEY, sealed, Utc::now().timestamp_millis()],
                )?;
                Ok(())
            }
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Locked)
    }

    fn open_value(&self, key: &str, blinded: &str, sealed: &str) -> Result<String, StoreError> {
        self.cipher.open(blinded, sealed).map_err(|_| StoreError::Decrypt {
            key: key.to_string(),
        })
    }
}

fn read_sealed(conn: &Connection, blinded: &str) -> Result<Option<String>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![blinded],
            |row| row.get(0),
        )
        .optional()?)
}

fn write_sealed(conn: &Connection, blinded: &str, sealed: &str) -> Result<(), StoreError> {
    conn.execute(
        "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)",
        params![blinded, sealed, Utc::now().timestamp_millis()],
    )?;
    Ok(())
}

impl KvStore for SecureStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let blinded = self.cipher.blind_key(key)?;
        let sealed = read_sealed(&*self.lock()?, &blinded)?;
        sealed.map(|sealed| self.open_value(key, &blinded, &sealed)).transpose()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let blinded = self.cipher.blind_key(key)?;
        let sealed = self.cipher.seal(&blinded, value)?;
        write_sealed(&*self.lock()?, &blinded, &sealed)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let blinded = self.cipher.blind_key(key)?;
        self.lock()?
            .execute("DELETE FROM settings WHERE key = ?1", params![blinded])?;
        Ok(())
    }

    /// Runs as one `BEGIN IMMEDIATE` transaction, so other processes sharing
    /// the file wait rather than read a stale count.
    fn increment(&self, key: &str) -> Result<u64, StoreError> {
        let blinded = self.cipher.blind_key(key)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current = read_sealed(&tx, &blinded)?
            .map(|sealed| self.open_value(key, &blinded, &sealed))
            .transpose()?;
        let next = next_count(key, current.as_deref())?;
        let sealed = self.cipher.seal(&blinded, &next.to_string())?;
        write_sealed(&tx, &blinded, &sealed)?;
        tx.commit()?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key() -> MasterKey {
        MasterKey::from_bytes([3u8; 32])
    }

    #[test]
    fn kv_store() {
        let store = SecureStore::open_memory(&key()).unwrap();
        assert!(store.get("reminder_hour").unwrap().is_none());
        store.set("reminder_hour", "21").unwrap();
        assert_eq!(store.get("reminder_hour").unwrap().as_deref(), Some("21"));
        store.set("reminder_hour", "7").unwrap();
        assert_eq!(store.get("reminder_hour").unwrap().as_deref(), Some("7"));
        store.remove("reminder_hour").unwrap();
        assert!(store.get("reminder_hour").unwrap().is_none());
    }

    #[test]
    fn values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DB_FILE);
        {
            let store = SecureStore::open_at(&path, &key()).unwrap();
            store.set("reminder_msg", "Time to check in").unwrap();
        }
        let store = SecureStore::open_at(&path, &key()).unwrap();
        assert_eq!(
            store.get("reminder_msg").unwrap().as_deref(),
            Some("Time to check in")
        );
    }

    #[test]
    fn file_holds_no_plaintext() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DB_FILE);
        {
            let store = SecureStore::open_at(&path, &key()).unwrap();
            store.set("reminder_msg", "plaintext-marker-xyz").unwrap();
        }
        let raw = std::fs::read(&path).unwrap();
        let haystack = String::from_utf8_lossy(&raw);
        assert!(!haystack.contains("plaintext-marker-xyz"));
        assert!(!haystack.contains("reminder_msg"));
    }

    #[test]
    fn wrong_key_fails_closed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DB_FILE);
        SecureStore::open_at(&path, &key()).unwrap();

        let result = SecureStore::open_at(&path, &MasterKey::from_bytes([4u8; 32]));
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }

    #[test]
    fn increments_from_two_handles_are_not_lost() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DB_FILE);
        let handles: Vec<_> = (0..2)
            .map(|_| std::sync::Arc::new(SecureStore::open_at(&path, &key()).unwrap()))
            .collect();

        let workers: Vec<_> = handles
            .iter()
            .cloned()
            .map(|store| {
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        store.increment("failed_attempts").unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(handles[0].get("failed_attempts").unwrap().as_deref(), Some("50"));
        assert_eq!(handles[1].increment("failed_attempts").unwrap(), 51);
    }

    #[test]
    fn increment_continues_a_set_value() {
        let store = SecureStore::open_memory(&key()).unwrap();
        store.set("failed_attempts", "2").unwrap();
        assert_eq!(store.increment("failed_attempts").unwrap(), 3);
        assert_eq!(store.get("failed_attempts").unwrap().as_deref(), Some("3"));
    }

    #[test]
    fn unopenable_path_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("nested").join(DB_FILE);
        let result = SecureStore::open_at(&path, &key());
        assert!(matches!(result, Err(StoreError::OpenFailed { .. })));
    }
}
