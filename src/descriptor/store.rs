//! The descriptor store (C1): loads, validates, and persists agent
//! descriptors from a flat directory, and owns the `id -> descriptor` map
//! that every other component reads through.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use super::template::substitute_datetime_placeholders;
use super::{AgentDescriptor, DescriptorValidationError, DESCRIPTOR_EXTENSIONS};
use crate::utilities::errors::DescriptorStoreError;

/// Invoked after a descriptor is successfully (re)loaded from disk.
pub type ChangeCallback = Arc<dyn Fn(AgentDescriptor) + Send + Sync>;
/// Invoked after a descriptor's source file disappears.
pub type DeleteCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Per-file parse/validate failure. Always non-fatal to the store as a
/// whole — the caller logs it and moves on to the next file.
#[derive(Debug, thiserror::Error)]
pub enum DescriptorParseError {
    #[error("io error reading {0}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("invalid YAML in {0}: {1}")]
    Yaml(PathBuf, serde_yaml::Error),
    #[error("validation failed for {0}: {1}")]
    Validation(PathBuf, DescriptorValidationError),
}

/// The registry of agent descriptors backing a single runtime instance.
pub struct DescriptorStore {
    dir: PathBuf,
    descriptors: RwLock<HashMap<String, AgentDescriptor>>,
}

impl DescriptorStore {
    /// Open (creating if missing) the descriptor directory and construct an
    /// empty store. Call [`DescriptorStore::load_all`] to populate it.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, DescriptorStoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(DescriptorStoreError::DirectoryInaccessible)?;
        Ok(Self {
            dir,
            descriptors: RwLock::new(HashMap::new()),
        })
    }

    /// The watched descriptor directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Scan the directory for recognised descriptor files and load each one.
    /// Per-file failures are logged and skipped; only directory-level I/O
    /// failure propagates.
    pub async fn load_all(&self) -> Result<(), DescriptorStoreError> {
        let entries =
            std::fs::read_dir(&self.dir).map_err(DescriptorStoreError::DirectoryInaccessible)?;

        let mut loaded = HashMap::new();
        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    log::warn!("skipping unreadable directory entry: {e}");
                    continue;
                }
            };
            let path = entry.path();
            if !is_descriptor_file(&path) {
                continue;
            }
            match parse_descriptor_file(&path) {
                Ok(descriptor) => {
                    loaded.insert(descriptor.id.clone(), descriptor);
                }
                Err(e) => log::warn!("skipping descriptor {path:?}: {e}"),
            }
        }

        *self.descriptors.write().await = loaded;
        Ok(())
    }

    /// Look up a descriptor by id.
    pub async fn get(&self, id: &str) -> Option<AgentDescriptor> {
        self.descriptors.read().await.get(id).cloned()
    }

    /// All currently registered descriptors.
    pub async fn all(&self) -> Vec<AgentDescriptor> {
        self.descriptors.read().await.values().cloned().collect()
    }

    /// Serialise and atomically write `descriptor` to its source path (or a
    /// path derived from its sanitised id if it has none), then update the
    /// in-memory map and load timestamp.
    pub async fn save(
        &self,
        mut descriptor: AgentDescriptor,
    ) -> Result<AgentDescriptor, DescriptorStoreError> {
        descriptor.validate().map_err(|e| DescriptorStoreError::Validation {
            id: descriptor.id.clone(),
            message: e.to_string(),
        })?;

        let path = descriptor
            .source_path
            .clone()
            .unwrap_or_else(|| self.dir.join(format!("{}.yaml", sanitize_id(&descriptor.id))));

        let yaml = serde_yaml::to_string(&descriptor).map_err(|e| DescriptorStoreError::Serialize {
            id: descriptor.id.clone(),
            source: e,
        })?;

        write_atomic(&path, &yaml).map_err(|e| DescriptorStoreError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        descriptor.source_path = Some(path);
        descriptor.loaded_at = Some(Utc::now());

        self.descriptors
            .write()
            .await
            .insert(descriptor.id.clone(), descriptor.clone());

        Ok(descriptor)
    }

    /// Remove a descriptor from the map and unlink its source file, if any.
    /// Idempotent: deleting an already-missing id or file is not an error.
    pub async fn delete(&self, id: &str) -> Result<(), DescriptorStoreError> {
        let removed = self.descriptors.write().await.remove(id);
        if let Some(descriptor) = removed {
            if let Some(path) = descriptor.source_path {
                match std::fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        return Err(DescriptorStoreError::Io {
                            path: path.display().to_string(),
                            source: e,
                        })
                    }
                }
            }
        }
        Ok(())
    }

    /// Re-parse and re-validate a single path (used by the watcher on
    /// create-or-write events); on success, replaces the map entry.
    pub async fn reload_path(
        &self,
        path: &Path,
    ) -> Result<Option<AgentDescriptor>, DescriptorParseError> {
        let descriptor = parse_descriptor_file(path)?;
        self.descriptors
            .write()
            .await
            .insert(descriptor.id.clone(), descriptor.clone());
        Ok(Some(descriptor))
    }

    /// Find the id of the descriptor whose source path equals `path`.
    pub async fn id_for_path(&self, path: &Path) -> Option<String> {
        self.descriptors
            .read()
            .await
            .values()
            .find(|d| d.source_path.as_deref() == Some(path))
            .map(|d| d.id.clone())
    }

    /// Remove an entry from the in-memory map without touching the
    /// filesystem (used by the watcher on remove-or-rename events).
    pub async fn remove_in_memory(&self, id: &str) {
        self.descriptors.write().await.remove(id);
    }
}

fn is_descriptor_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| DESCRIPTOR_EXTENSIONS.contains(&ext))
            .unwrap_or(false)
}

fn parse_descriptor_file(path: &Path) -> Result<AgentDescriptor, DescriptorParseError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| DescriptorParseError::Io(path.to_path_buf(), e))?;
    let mut descriptor: AgentDescriptor = serde_yaml::from_str(&raw)
        .map_err(|e| DescriptorParseError::Yaml(path.to_path_buf(), e))?;

    descriptor.system_prompt = substitute_datetime_placeholders(&descriptor.system_prompt, Utc::now());
    descriptor
        .validate()
        .map_err(|e| DescriptorParseError::Validation(path.to_path_buf(), e))?;

    descriptor.source_path = Some(path.to_path_buf());
    descriptor.loaded_at = Some(Utc::now());
    Ok(descriptor)
}

/// Write `content` to `path` atomically: write to a sibling temp file,
/// fsync, then rename over the destination. Prevents the watcher from
/// observing a partially written file.
fn write_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    use std::io::Write;

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let tmp_path = dir.join(format!(
        ".{}.tmp",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("descriptor")
    ));

    let mut file = std::fs::File::create(&tmp_path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;
    drop(file);

    std::fs::rename(&tmp_path, path)
}

fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
