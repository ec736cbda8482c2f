//! Filesystem content store with a SQLite index
//!
//! Layout under the store root:
//!
//! ```text
//! {root}/index.db                      object index (WAL mode)
//! {root}/objects/{key[0..2]}/{key}.{ext}
//! ```
//!
//! Public URLs take the form `{public_base_url}/{key}/{file_name}`.

use crate::store::schema::initialize_schema;
use crate::store::traits::{ContentStore, ObjectMetadata, StoreError, StoreRef, StoreResult};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Content store backed by a local directory
pub struct LocalContentStore {
    root: PathBuf,
    public_base_url: String,
    conn: Mutex<Connection>,
    temp_counter: AtomicU64,
}

impl LocalContentStore {
    /// Opens (or creates) a store rooted at `root`
    ///
    /// # Arguments
    ///
    /// * `root` - Directory holding the index and object files
    /// * `public_base_url` - Base of the URLs handed back to callers
    ///
    /// # Returns
    ///
    /// * `Ok(LocalContentStore)` - Store ready for use
    /// * `Err(StoreError)` - The directory or index could not be opened
    pub fn open(root: &Path, public_base_url: &str) -> StoreResult<Self> {
        std::fs::create_dir_all(root.join("objects"))?;

        let conn = Connection::open(root.join("index.db"))?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
        ",
        )?;
        initialize_schema(&conn)?;

        tracing::debug!("Opened local content store at {}", root.display());

        Ok(Self {
            root: root.to_path_buf(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            conn: Mutex::new(conn),
            temp_counter: AtomicU64::new(0),
        })
    }

    /// Path of an object file relative to the store root
    pub fn relative_path(content_key: &str, extension: &str) -> PathBuf {
        let shard = content_key.get(..2).unwrap_or(content_key);
        let file = if extension.is_empty() {
            content_key.to_string()
        } else {
            format!("{}.{}", content_key, extension)
        };
        Path::new("objects").join(shard).join(file)
    }

    /// Absolute path of an object file
    pub fn object_path(&self, content_key: &str, extension: &str) -> PathBuf {
        self.root.join(Self::relative_path(content_key, extension))
    }

    /// Number of indexed objects
    pub fn object_count(&self) -> StoreResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM objects", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn public_url(&self, content_key: &str, file_name: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, content_key, file_name)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("index lock poisoned".to_string()))
    }

    fn lookup(&self, content_key: &str) -> StoreResult<Option<(StoreRef, String)>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT id, file_name, relative_path FROM objects WHERE content_key = ?1",
                params![content_key],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        Ok(row.map(|(id, file_name, relative_path)| {
            (
                StoreRef {
                    id: id.to_string(),
                    url: self.public_url(content_key, &file_name),
                },
                relative_path,
            )
        }))
    }

    /// Removes a written object file unless the index points at it
    async fn discard_unindexed(&self, content_key: &str, path: &Path, relative: &str) {
        match self.lookup(content_key) {
            Ok(Some((_, indexed))) if indexed == relative => return,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Keeping {}, index lookup failed: {}", path.display(), e);
                return;
            }
        }

        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::warn!("Failed to remove orphaned {}: {}", path.display(), e);
        }
    }

    /// Inserts an index row; returns the new row id, or `None` if the key exists
    fn insert(
        &self,
        metadata: &ObjectMetadata,
        relative_path: &str,
        byte_size: usize,
    ) -> StoreResult<Option<i64>> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "INSERT INTO objects
                (content_key, file_name, relative_path, mime_type, kind, byte_size, original_url, stored_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(content_key) DO NOTHING",
            params![
                metadata.content_key,
                metadata.file_name,
                relative_path,
                metadata.mime_type,
                metadata.kind.as_str(),
                byte_size as i64,
                metadata.original_url.as_str(),
                Utc::now().to_rfc3339(),
            ],
        )?;

        Ok((changed == 1).then(|| conn.last_insert_rowid()))
    }
}

#[async_trait]
impl ContentStore for LocalContentStore {
    async fn exists(&self, content_key: &str) -> StoreResult<Option<StoreRef>> {
        Ok(self.lookup(content_key)?.map(|(store_ref, _)| store_ref))
    }

    async fn store(&self, bytes: &[u8], metadata: &ObjectMetadata) -> StoreResult<StoreRef> {
        let relative = Self::relative_path(&metadata.content_key, &metadata.extension);
        let path = self.root.join(&relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Unique temp name so concurrent writers of one key never share a file
        let temp = path.with_file_name(format!(
            ".{}.{}.partial",
            metadata.content_key,
            self.temp_counter.fetch_add(1, Ordering::Relaxed)
        ));
        tokio::fs::write(&temp, bytes).await?;
        tokio::fs::rename(&temp, &path).await?;

        let relative_str = relative.to_string_lossy().into_owned();
        let inserted = match self.insert(metadata, &relative_str, bytes.len()) {
            Ok(inserted) => inserted,
            Err(e) => {
                self.discard_unindexed(&metadata.content_key, &path, &relative_str)
                    .await;
                return Err(e);
            }
        };

        match inserted {
            Some(id) => {
                tracing::debug!("Stored {} as {}", metadata.original_url, relative_str);
                Ok(StoreRef {
                    id: id.to_string(),
                    url: self.public_url(&metadata.content_key, &metadata.file_name),
                })
            }
            None => {
                // Another writer indexed this key first; keep only the winner's file
                self.discard_unindexed(&metadata.content_key, &path, &relative_str)
                    .await;
                Err(StoreError::Conflict(metadata.content_key.clone()))
            }
        }
    }
}
