//! Format-preserving TOML project manifest.
//!
//! ```toml
//! [targets.DemoApp]
//! id = "5A0C19E2B7D34F10"
//!
//! [[files]]
//! path = "DemoApp/Unity/Classes/main.mm"
//! id = "9C1F0E7A22B4D681"
//! targets = ["5A0C19E2B7D34F10"]
//! ```
//!
//! Edits go through `toml_edit`, so entries that are not added or removed
//! keep their exact formatting and a sync with no changes rewrites nothing.

use crate::manifest::{FileRef, ProjectManifest, TargetHandle};
use crate::rewrite::atomic_write;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use toml_edit::{value, Array, ArrayOfTables, DocumentMut, Item, Table};
use xxhash_rust::xxh3::xxh3_64;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write manifest {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse manifest TOML: {0}")]
    Parse(#[from] toml_edit::TomlError),

    #[error("invalid manifest: {0}")]
    Invalid(String),

    #[error("manifest was not loaded from a file; use save_to")]
    NoPath,
}

#[derive(Debug, Clone)]
pub struct ManifestDocument {
    path: Option<PathBuf>,
    doc: DocumentMut,
    dirty: bool,
}

impl Default for ManifestDocument {
    fn default() -> Self {
        Self {
            path: None,
            doc: DocumentMut::new(),
            dirty: false,
        }
    }
}

impl ManifestDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(input: &str) -> Result<Self, ManifestError> {
        let doc = input.parse::<DocumentMut>()?;
        validate(&doc)?;
        Ok(Self {
            path: None,
            doc,
            dirty: false,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut manifest = Self::parse(&contents)?;
        manifest.path = Some(path.to_path_buf());
        Ok(manifest)
    }

    /// Write back to the file this manifest was loaded from.
    pub fn save(&mut self) -> Result<(), ManifestError> {
        let path = self.path.clone().ok_or(ManifestError::NoPath)?;
        self.save_to(&path)
    }

    pub fn save_to(&mut self, path: &Path) -> Result<(), ManifestError> {
        atomic_write(path, self.doc.to_string().as_bytes()).map_err(|source| {
            ManifestError::Write {
                path: path.to_path_buf(),
                source,
            }
        })?;
        self.path = Some(path.to_path_buf());
        self.dirty = false;
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether anything was added or removed since the last load/save.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Declare a build target, returning the existing handle if present.
    pub fn add_target(&mut self, name: &str) -> Result<TargetHandle, ManifestError> {
        if let Some(handle) = self.target_handle(name) {
            return Ok(handle);
        }
        let id = self.fresh_id(&format!("target:{name}"));

        let targets = self
            .doc
            .entry("targets")
            .or_insert_with(|| {
                let mut targets = Table::new();
                targets.set_implicit(true);
                Item::Table(targets)
            })
            .as_table_like_mut()
            .ok_or_else(|| ManifestError::Invalid("'targets' must be a table".to_string()))?;
        let mut entry = Table::new();
        entry.insert("id", value(id.as_str()));
        targets.insert(name, Item::Table(entry));

        self.dirty = true;
        Ok(TargetHandle(id))
    }

    /// Target ids a file is attached to.
    pub fn file_targets(&self, path: &str) -> Vec<String> {
        self.files()
            .find(|t| entry_str(t, "path") == Some(path))
            .and_then(|t| t.get("targets").and_then(|v| v.as_array()))
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default()
    }

    /// Every tracked file path, in document order.
    pub fn all_paths(&self) -> Vec<String> {
        self.files()
            .filter_map(|t| entry_str(t, "path").map(str::to_string))
            .collect()
    }

    fn files(&self) -> impl Iterator<Item = &Table> {
        self.doc
            .get("files")
            .and_then(Item::as_array_of_tables)
            .into_iter()
            .flat_map(|arr| arr.iter())
    }

    fn known_ids(&self) -> HashSet<String> {
        let mut ids: HashSet<String> = self
            .files()
            .filter_map(|t| entry_str(t, "id").map(str::to_string))
            .collect();
        if let Some(targets) = self.doc.get("targets").and_then(Item::as_table_like) {
            for (_, item) in targets.iter() {
                if let Some(id) = item.get("id").and_then(|v| v.as_str()) {
                    ids.insert(id.to_string());
                }
            }
        }
        ids
    }

    /// Stable id derived from `seed`; salted only on collision.
    fn fresh_id(&self, seed: &str) -> String {
        let known = self.known_ids();
        let mut salt = 0u32;
        loop {
            let input = if salt == 0 {
                seed.to_string()
            } else {
                format!("{seed}#{salt}")
            };
            let id = format!("{:016X}", xxh3_64(input.as_bytes()));
            if !known.contains(&id) {
                return id;
            }
            salt += 1;
        }
    }
}

fn entry_str<'a>(table: &'a Table, key: &str) -> Option<&'a str> {
    table.get(key).and_then(|v| v.as_str())
}

fn validate(doc: &DocumentMut) -> Result<(), ManifestError> {
    if let Some(targets) = doc.get("targets") {
        let targets = targets
            .as_table_like()
            .ok_or_else(|| ManifestError::Invalid("'targets' must be a table".to_string()))?;
        for (name, item) in targets.iter() {
            if item.get("id").and_then(|v| v.as_str()).is_none() {
                return Err(ManifestError::Invalid(format!(
                    "target '{name}' is missing a string 'id'"
                )));
            }
        }
    }

    if let Some(files) = doc.get("files") {
        let files = files.as_array_of_tables().ok_or_else(|| {
            ManifestError::Invalid("'files' must be an array of tables".to_string())
        })?;
        for (idx, file) in files.iter().enumerate() {
            for key in ["path", "id"] {
                if entry_str(file, key).is_none() {
                    return Err(ManifestError::Invalid(format!(
                        "file entry {idx} is missing a string '{key}'"
                    )));
                }
            }
        }
    }

    Ok(())
}

impl ProjectManifest for ManifestDocument {
    fn target_handle(&self, name: &str) -> Option<TargetHandle> {
        self.doc
            .get("targets")
            .and_then(Item::as_table_like)
            .and_then(|targets| targets.get(name))
            .and_then(|item| item.get("id"))
            .and_then(|v| v.as_str())
            .map(|id| TargetHandle(id.to_string()))
    }

    fn target_names(&self) -> Vec<String> {
        self.doc
            .get("targets")
            .and_then(Item::as_table_like)
            .map(|targets| targets.iter().map(|(name, _)| name.to_string()).collect())
            .unwrap_or_default()
    }

    fn tracked_paths(&self, prefix: &str) -> Vec<String> {
        let dir = format!("{}/", prefix.trim_end_matches('/'));
        self.files()
            .filter_map(|t| entry_str(t, "path"))
            .filter(|path| path.starts_with(&dir))
            .map(str::to_string)
            .collect()
    }

    fn find_file(&self, path: &str) -> Option<FileRef> {
        self.files()
            .find(|t| entry_str(t, "path") == Some(path))
            .and_then(|t| entry_str(t, "id"))
            .map(|id| FileRef(id.to_string()))
    }

    fn add_file(&mut self, path: &str, target: &TargetHandle) -> Result<FileRef, ManifestError> {
        if let Some(existing) = self.find_file(path) {
            return Ok(existing);
        }
        let id = self.fresh_id(&format!("file:{path}"));

        let mut targets = Array::new();
        targets.push(target.0.as_str());
        let mut entry = Table::new();
        entry.insert("path", value(path));
        entry.insert("id", value(id.as_str()));
        entry.insert("targets", value(targets));

        self.doc
            .entry("files")
            .or_insert(Item::ArrayOfTables(ArrayOfTables::new()))
            .as_array_of_tables_mut()
            .ok_or_else(|| ManifestError::Invalid("'files' must be an array of tables".to_string()))?
            .push(entry);

        self.dirty = true;
        Ok(FileRef(id))
    }

    fn remove_file(&mut self, file: &FileRef) -> Result<bool, ManifestError> {
        let Some(files) = self
            .doc
            .get_mut("files")
            .and_then(Item::as_array_of_tables_mut)
        else {
            return Ok(false);
        };

        let Some(idx) = files
            .iter()
            .position(|t| entry_str(t, "id") == Some(file.0.as_str()))
        else {
            return Ok(false);
        };

        files.remove(idx);
        self.dirty = true;
        Ok(true)
    }
}

impl std::fmt::Display for ManifestDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.doc)
    }
}
