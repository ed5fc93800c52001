// ============================
// crates/backend-lib/src/storage.rs
// ============================
//! Credential storage abstraction with flat-file implementation.
use crate::error::AppError;
use crate::identity::Identity;
use async_trait::async_trait;
use parking_lot::RwLock;
use recipe_common::UserRecord;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{fs as tokio_fs, sync::Mutex};
use tracing::{debug, info, warn};

const USERS_FILE: &str = "users.json";

/// Trait for credential storage backends
///
/// Lookups have no side effects. The security core never learns more than
/// "found" or "not found" from a lookup.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up an identity by login name
    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, AppError>;

    /// Replace an identity's password hash
    async fn update_password(&self, username: &str, password_hash: &str) -> Result<(), AppError>;

    /// Replace an identity's role set
    async fn assign_roles(&self, username: &str, roles: &[String]) -> Result<(), AppError>;

    /// Enable or soft-disable an identity
    async fn set_enabled(&self, username: &str, enabled: bool) -> Result<(), AppError>;

    /// Insert a new identity. Returns `false` without writing if the name is taken.
    async fn provision(&self, identity: &Identity) -> Result<bool, AppError>;
}

/// Flat-file implementation of the `CredentialStore` trait
///
/// Records live in `<root>/users.json` and are cached in memory. Every
/// mutation rewrites the file through a temporary file and a rename.
#[derive(Clone)]
pub struct FlatFileStorage {
    path: PathBuf,
    records: Arc<RwLock<BTreeMap<String, UserRecord>>>,
    write_lock: Arc<Mutex<()>>,
}

impl FlatFileStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, AppError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        let path = root.join(USERS_FILE);

        let mut records = BTreeMap::new();
        if path.exists() {
            let content = fs::read_to_string(&path)?;
            let list: Vec<UserRecord> = serde_json::from_str(&content)?;
            for record in list {
                let username = record.username.clone();
                if records.insert(username.clone(), record).is_some() {
                    return Err(AppError::Configuration(format!(
                        "duplicate user '{username}' in {}",
                        path.display()
                    )));
                }
            }
        }
        info!(users = records.len(), path = %path.display(), "credential store opened");

        Ok(Self {
            path,
            records: Arc::new(RwLock::new(records)),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Number of stored accounts
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    async fn persist(&self, records: &BTreeMap<String, UserRecord>) -> Result<(), AppError> {
        let list: Vec<&UserRecord> = records.values().collect();
        let json = serde_json::to_string_pretty(&list)?;

        let tmp = self.path.with_extension("json.tmp");
        tokio_fs::write(&tmp, json).await?;
        tokio_fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Apply a validated change to one identity and write it through
    async fn mutate<F>(&self, username: &str, change: F) -> Result<(), AppError>
    where
        F: FnOnce(&mut Identity) -> Result<(), AppError> + Send,
    {
        let _guard = self.write_lock.lock().await;

        let record = self
            .records
            .read()
            .get(username)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("user '{username}'")))?;
        let mut identity = Identity::try_from(&record)?;
        change(&mut identity)?;

        let mut next = self.records.read().clone();
        next.insert(username.to_string(), identity.to_record(Some(&record)));
        self.persist(&next).await?;
        *self.records.write() = next;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FlatFileStorage {
    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, AppError> {
        let Some(record) = self.records.read().get(username).cloned() else {
            return Ok(None);
        };

        match Identity::try_from(&record) {
            Ok(identity) => Ok(Some(identity)),
            Err(err) => {
                // A malformed record (for instance a plaintext password) never authenticates
                warn!(username, error = %err, "ignoring invalid user record");
                Ok(None)
            },
        }
    }

    async fn update_password(&self, username: &str, password_hash: &str) -> Result<(), AppError> {
        self.mutate(username, |identity| {
            identity.set_password_hash(password_hash).map_err(AppError::from)
        })
        .await?;
        debug!(username, "password hash replaced");
        Ok(())
    }

    async fn assign_roles(&self, username: &str, roles: &[String]) -> Result<(), AppError> {
        self.mutate(username, |identity| {
            identity.assign_roles(roles).map_err(AppError::from)
        })
        .await
    }

    async fn set_enabled(&self, username: &str, enabled: bool) -> Result<(), AppError> {
        self.mutate(username, |identity| {
            identity.set_enabled(enabled);
            Ok(())
        })
        .await
    }

    async fn provision(&self, identity: &Identity) -> Result<bool, AppError> {
        let _guard = self.write_lock.lock().await;

        if self.records.read().contains_key(identity.username()) {
            return Ok(false);
        }

        let mut next = self.records.read().clone();
        next.insert(identity.username().to_string(), identity.to_record(None));
        self.persist(&next).await?;
        *self.records.write() = next;
        info!(username = identity.username(), "identity provisioned");
        Ok(true)
    }
}
