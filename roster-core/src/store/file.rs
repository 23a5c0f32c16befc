//! YAML-on-disk roster store.
//!
//! # Storage layout
//!
//! ```text
//! ~/.roster/
//!   personnel.yaml                 (Vec<Person>)
//!   rosters/
//!     <YYYY-MM-DD>/
//!       <position_id>.yaml         (RosterPost, mode 0600)
//! ```
//!
//! Writes go to a `.tmp` sibling and are renamed into place. A write whose
//! SHA-256 matches the file already on disk is skipped.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{io_err, StoreError};
use crate::store::{
    apply_updates, DateWindow, PersistOutcome, RosterDay, RosterPost, RosterStore, SlotUpdate,
};
use crate::types::{Person, PositionId};

#[derive(Debug, Clone)]
pub struct FileRosterStore {
    root: PathBuf,
}

impl FileRosterStore {
    /// Store rooted at `<home>/.roster`.
    pub fn at(home: &Path) -> Self {
        Self {
            root: home.join(".roster"),
        }
    }

    /// Store rooted at the current user's home directory.
    pub fn open() -> Result<Self, StoreError> {
        let home = dirs::home_dir().ok_or(StoreError::HomeNotFound)?;
        Ok(Self::at(&home))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/rosters/<date>/`, pure, no I/O.
    pub fn day_dir(&self, date: NaiveDate) -> PathBuf {
        self.root
            .join("rosters")
            .join(date.format("%Y-%m-%d").to_string())
    }

    /// `<root>/rosters/<date>/<position>.yaml`, pure, no I/O.
    pub fn post_path(&self, date: NaiveDate, position_id: &PositionId) -> PathBuf {
        self.day_dir(date).join(format!("{}.yaml", position_id.0))
    }

    pub fn personnel_path(&self) -> PathBuf {
        self.root.join("personnel.yaml")
    }

    pub fn load_post(
        &self,
        date: NaiveDate,
        position_id: &PositionId,
    ) -> Result<RosterPost, StoreError> {
        let path = self.post_path(date, position_id);
        if !path.exists() {
            return Err(StoreError::RecordNotFound { path });
        }
        read_yaml(&path)
    }

    /// All posts stored for `date`, sorted by file name. A missing day is empty.
    pub fn load_day(&self, date: NaiveDate) -> Result<Vec<RosterPost>, StoreError> {
        let dir = self.day_dir(date);
        if !dir.exists() {
            return Ok(vec![]);
        }
        let mut entries: Vec<_> = std::fs::read_dir(&dir)
            .map_err(|e| io_err(&dir, e))?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .collect();
        entries.sort_by_key(|e| e.file_name());

        let mut posts = Vec::new();
        for entry in entries {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("yaml") {
                continue;
            }
            posts.push(read_yaml(&path)?);
        }
        Ok(posts)
    }

    pub fn save_post(
        &self,
        date: NaiveDate,
        post: &RosterPost,
    ) -> Result<PersistOutcome, StoreError> {
        let path = self.post_path(date, &post.position_id);
        write_yaml_atomic(&path, post)
    }

    pub fn save_personnel(&self, people: &[Person]) -> Result<PersistOutcome, StoreError> {
        write_yaml_atomic(&self.personnel_path(), people)
    }
}

impl RosterStore for FileRosterStore {
    fn fetch_roster(&self, window: DateWindow) -> Result<Vec<RosterDay>, StoreError> {
        window
            .dates()
            .map(|date| {
                Ok(RosterDay {
                    date,
                    posts: self.load_day(date)?,
                })
            })
            .collect()
    }

    fn persist(
        &self,
        date: NaiveDate,
        position_id: &PositionId,
        updates: &[SlotUpdate],
    ) -> Result<PersistOutcome, StoreError> {
        let mut post = self.load_post(date, position_id)?;
        apply_updates(&mut post, updates)?;
        self.save_post(date, &post)
    }

    fn fetch_person_roster(&self) -> Result<Vec<Person>, StoreError> {
        let path = self.personnel_path();
        if !path.exists() {
            tracing::warn!(path = %path.display(), "personnel file missing, roster has no people");
            return Ok(vec![]);
        }
        read_yaml(&path)
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_yaml::from_str(&contents).map_err(|e| StoreError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Serialize → hash-compare → `.tmp` sibling → `chmod 0600` → `rename`.
fn write_yaml_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<PersistOutcome, StoreError> {
    let yaml = serde_yaml::to_string(value)?;

    if let Ok(existing) = std::fs::read(path) {
        if digest(&existing) == digest(yaml.as_bytes()) {
            tracing::debug!("unchanged: {}", path.display());
            return Ok(PersistOutcome::Unchanged);
        }
    }

    if let Some(dir) = path.parent() {
        if !dir.exists() {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
            set_dir_permissions(dir)?;
        }
    }

    let tmp = PathBuf::from(format!("{}.tmp", path.display()));
    std::fs::write(&tmp, &yaml).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }

    tracing::info!("wrote: {}", path.display());
    Ok(PersistOutcome::Written)
}

fn digest(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    hex::encode(h.finalize())
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
