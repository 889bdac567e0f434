//! Backup manager: dated rotation, temporary snapshot, rollback.
//!
//! Two backup flavors share one selection rule. The *dated* backup copies
//! every selected key under `backup/DDMMYYYY/` once a day, evicting the
//! oldest folder when the rotation is full. The *temporary* backup copies
//! the same selection into the single `temporary_backup/` slot immediately
//! before any destructive catalog write; rollback copies the slot's
//! contents back out and leaves the slot in place until the next snapshot
//! overwrites it.
//!
//! If a copy set fails midway, already-copied keys remain; callers retry
//! the whole backup.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};

use peril_core::keys;
use peril_core::StorageBackend;

use crate::error::{CatalogError, Result};

/// Policy controlling backup selection and dated-slot retention.
///
/// # Example
///
/// ```rust
/// use peril_catalog::backup::BackupPolicy;
///
/// // Use defaults
/// let policy = BackupPolicy::default();
/// assert_eq!(policy.retained_daily, 7);
/// assert!(policy.validate().is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BackupPolicy {
    /// Number of dated backup folders kept before the oldest is evicted.
    pub retained_daily: usize,
    /// Key prefixes never included in a backup.
    pub excluded_prefixes: Vec<String>,
    /// Key substrings never included in a backup.
    pub excluded_markers: Vec<String>,
}

impl Default for BackupPolicy {
    fn default() -> Self {
        Self {
            retained_daily: 7,
            excluded_prefixes: vec![
                keys::DATED_BACKUP_ROOT.to_string(),
                keys::TEMP_BACKUP_ROOT.to_string(),
            ],
            excluded_markers: vec![keys::IMAGE_STORAGE_MARKER.to_string()],
        }
    }
}

impl BackupPolicy {
    /// Creates a policy with a custom retention count and default exclusions.
    #[must_use]
    pub fn with_retained(retained_daily: usize) -> Self {
        Self {
            retained_daily,
            ..Self::default()
        }
    }

    /// Validates the policy settings are reasonable.
    ///
    /// Returns an error message if validation fails.
    #[must_use]
    pub fn validate(&self) -> Option<String> {
        if self.retained_daily == 0 {
            return Some("retained_daily must be at least 1".to_string());
        }
        None
    }

    /// Returns `true` if a key belongs in a backup.
    ///
    /// Directory placeholder keys, keys already under a backup prefix, and
    /// keys inside excluded subtrees (image storage) are skipped.
    #[must_use]
    pub fn selects(&self, key: &str) -> bool {
        !key.ends_with('/')
            && !self.excluded_prefixes.iter().any(|p| key.starts_with(p))
            && !self.excluded_markers.iter().any(|m| key.contains(m))
    }
}

/// Maintains the dated backup rotation and the temporary rollback slot.
pub struct BackupManager {
    storage: Arc<dyn StorageBackend>,
    policy: BackupPolicy,
}

impl BackupManager {
    /// Creates a new backup manager.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>, policy: BackupPolicy) -> Self {
        Self { storage, policy }
    }

    /// Returns the active policy.
    #[must_use]
    pub fn policy(&self) -> &BackupPolicy {
        &self.policy
    }

    /// Copies every selected key into today's dated folder.
    ///
    /// When the rotation already holds `retained_daily` or more folders, the
    /// lexicographically smallest folder is deleted first. Returns the number
    /// of keys copied.
    ///
    /// # Errors
    ///
    /// Returns an error if listing, eviction, or any copy fails. Copies made
    /// before the failure remain.
    pub async fn daily_backup(&self) -> Result<usize> {
        let today = keys::dated_backup_prefix(Utc::now().date_naive());
        let all = self.storage.list("").await?;

        let folders: BTreeSet<String> = all
            .iter()
            .filter_map(|meta| dated_folder(&meta.path))
            .collect();

        if folders.len() >= self.policy.retained_daily {
            if let Some(oldest) = folders.iter().next() {
                let stale: Vec<String> = self
                    .storage
                    .list(oldest)
                    .await?
                    .into_iter()
                    .map(|meta| meta.path)
                    .collect();
                self.storage.delete_batch(&stale).await?;
                tracing::info!(folder = %oldest, count = stale.len(), "evicted oldest dated backup");
            }
        }

        let copies: Vec<(String, String)> = all
            .iter()
            .filter(|meta| self.policy.selects(&meta.path))
            .map(|meta| (meta.path.clone(), format!("{today}{}", meta.path)))
            .collect();

        try_join_all(
            copies
                .iter()
                .map(|(from, to)| self.storage.copy(from, to)),
        )
        .await?;

        tracing::info!(folder = %today, copied = copies.len(), "daily backup complete");
        Ok(copies.len())
    }

    /// Snapshots every selected key into the temporary slot.
    ///
    /// The slot is overwritten in place; no retention, no pre-clearing.
    /// Returns the number of keys copied. An empty selection is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if listing or any copy fails.
    pub async fn temporary_backup(&self) -> Result<usize> {
        let all = self.storage.list("").await?;

        let copies: Vec<(String, String)> = all
            .iter()
            .filter(|meta| self.policy.selects(&meta.path))
            .map(|meta| (meta.path.clone(), keys::temporary_backup_key(&meta.path)))
            .collect();

        try_join_all(
            copies
                .iter()
                .map(|(from, to)| self.storage.copy(from, to)),
        )
        .await?;

        Ok(copies.len())
    }

    /// Snapshots the given keys into the temporary slot.
    ///
    /// Used by merge updates, which only put the single target file at risk.
    ///
    /// # Errors
    ///
    /// Returns an error if any copy fails, including a missing source.
    pub async fn snapshot_keys(&self, keys_to_copy: &[String]) -> Result<()> {
        try_join_all(
            keys_to_copy
                .iter()
                .map(|key| async move {
                    self.storage
                        .copy(key, &keys::temporary_backup_key(key))
                        .await
                }),
        )
        .await?;
        Ok(())
    }

    /// Restores every key in the temporary slot to its original location.
    ///
    /// The slot itself is left in place; only the next snapshot overwrites
    /// it. Returns the number of keys restored.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if the slot is empty, or a storage
    /// error if any copy-back fails.
    pub async fn rollback(&self) -> Result<usize> {
        let entries = self.storage.list(keys::TEMP_BACKUP_ROOT).await?;

        let copies: Vec<(String, String)> = entries
            .iter()
            .filter_map(|meta| {
                keys::original_from_temporary(&meta.path)
                    .filter(|original| !original.is_empty())
                    .map(|original| (meta.path.clone(), original.to_string()))
            })
            .collect();

        if copies.is_empty() {
            return Err(CatalogError::NotFound {
                message: "no temporary backup to restore".to_string(),
            });
        }

        try_join_all(
            copies
                .iter()
                .map(|(from, to)| self.storage.copy(from, to)),
        )
        .await?;

        tracing::info!(restored = copies.len(), "rolled back from temporary backup");
        Ok(copies.len())
    }
}

fn dated_folder(key: &str) -> Option<String> {
    let rest = key.strip_prefix(keys::DATED_BACKUP_ROOT)?;
    let (folder, _) = rest.split_once('/')?;
    Some(format!("{}{folder}/", keys::DATED_BACKUP_ROOT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use peril_core::MemoryBackend;

    fn manager(storage: Arc<dyn StorageBackend>) -> BackupManager {
        BackupManager::new(storage, BackupPolicy::default())
    }

    #[test]
    fn selection_skips_backups_images_and_placeholders() {
        let policy = BackupPolicy::default();
        assert!(policy.selects("water_damage/water_damage.json"));
        assert!(policy.selects("water_damage/group/ceiling.json"));
        assert!(!policy.selects("backup/01012024/water_damage/x.json"));
        assert!(!policy.selects("temporary_backup/water_damage/x.json"));
        assert!(!policy.selects("orders/7/storage/images/photo.png"));
        assert!(!policy.selects("water_damage/"));
    }

    #[test]
    fn zero_retention_fails_validation() {
        assert!(BackupPolicy::with_retained(0).validate().is_some());
        assert!(BackupPolicy::with_retained(3).validate().is_none());
    }

    #[tokio::test]
    async fn temporary_backup_copies_selected_keys() {
        let storage: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        storage
            .put("water/water.json", Bytes::from("[1]"))
            .await
            .unwrap();
        storage
            .put("backup/01012024/old.json", Bytes::from("x"))
            .await
            .unwrap();

        let copied = manager(Arc::clone(&storage))
            .temporary_backup()
            .await
            .unwrap();
        assert_eq!(copied, 1);
        assert_eq!(
            storage
                .get("temporary_backup/water/water.json")
                .await
                .unwrap(),
            Bytes::from("[1]")
        );
        // Backup keys never nest into the slot
        assert!(storage
            .head("temporary_backup/backup/01012024/old.json")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn temporary_backup_overwrites_previous_snapshot() {
        let storage: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        let backups = manager(Arc::clone(&storage));

        storage
            .put("water/water.json", Bytes::from("v1"))
            .await
            .unwrap();
        backups.temporary_backup().await.unwrap();

        storage
            .put("water/water.json", Bytes::from("v2"))
            .await
            .unwrap();
        backups.temporary_backup().await.unwrap();

        assert_eq!(
            storage
                .get("temporary_backup/water/water.json")
                .await
                .unwrap(),
            Bytes::from("v2")
        );
    }

    #[tokio::test]
    async fn rollback_restores_and_leaves_slot_in_place() {
        let storage: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        let backups = manager(Arc::clone(&storage));

        storage
            .put("water/water.json", Bytes::from("before"))
            .await
            .unwrap();
        backups.temporary_backup().await.unwrap();
        storage
            .put("water/water.json", Bytes::from("after"))
            .await
            .unwrap();

        let restored = backups.rollback().await.unwrap();
        assert_eq!(restored, 1);
        assert_eq!(
            storage.get("water/water.json").await.unwrap(),
            Bytes::from("before")
        );
        // Slot survives until the next snapshot
        assert!(storage
            .head("temporary_backup/water/water.json")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn rollback_without_snapshot_is_not_found() {
        let storage: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        let err = manager(storage).rollback().await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn daily_backup_below_retention_keeps_all_folders() {
        let storage: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        storage
            .put("water/water.json", Bytes::from("[1]"))
            .await
            .unwrap();
        storage
            .put("backup/01012024/water/water.json", Bytes::from("x"))
            .await
            .unwrap();

        manager(Arc::clone(&storage)).daily_backup().await.unwrap();

        assert!(storage
            .head("backup/01012024/water/water.json")
            .await
            .unwrap()
            .is_some());

        let today = keys::dated_backup_prefix(Utc::now().date_naive());
        assert_eq!(
            storage
                .get(&format!("{today}water/water.json"))
                .await
                .unwrap(),
            Bytes::from("[1]")
        );
    }

    #[tokio::test]
    async fn daily_backup_at_retention_evicts_exactly_the_oldest() {
        let storage: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        storage
            .put("water/water.json", Bytes::from("[1]"))
            .await
            .unwrap();
        for day in 1..=7 {
            storage
                .put(
                    &format!("backup/0{day}012024/water/water.json"),
                    Bytes::from("x"),
                )
                .await
                .unwrap();
        }

        manager(Arc::clone(&storage)).daily_backup().await.unwrap();

        assert!(
            storage
                .head("backup/01012024/water/water.json")
                .await
                .unwrap()
                .is_none(),
            "oldest folder evicted"
        );
        for day in 2..=7 {
            assert!(storage
                .head(&format!("backup/0{day}012024/water/water.json"))
                .await
                .unwrap()
                .is_some());
        }
    }
}
