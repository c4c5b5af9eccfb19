//! `manifest.toml`: the list of revisions and the files each one owns.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MigrationError, Result};

pub const MANIFEST_FILE: &str = "manifest.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, rename = "revision")]
    pub revisions: Vec<RevisionEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionEntry {
    pub id: String,
    /// Empty for the root revision, two or more for a merge
    #[serde(default)]
    pub parents: Vec<String>,
    pub message: String,
    pub created_at: DateTime<Utc>,
    /// Upgrade script, relative to the migrations directory
    pub upgrade: String,
    /// Downgrade script, relative to the migrations directory
    pub downgrade: String,
    /// Schema snapshot after this revision, relative to the migrations directory
    pub snapshot: String,
}

impl RevisionEntry {
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }
}

impl Manifest {
    /// Read `<dir>/manifest.toml`. A missing file is an empty manifest.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|e| MigrationError::io(&path, e))?;
        toml::from_str(&content).map_err(|source| MigrationError::ManifestParse { path, source })
    }

    /// Write `<dir>/manifest.toml`, replacing the previous file in one rename.
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).map_err(|e| MigrationError::io(dir, e))?;

        let path = dir.join(MANIFEST_FILE);
        let tmp = dir.join(format!("{MANIFEST_FILE}.tmp"));
        let content = toml::to_string_pretty(self)?;

        fs::write(&tmp, content).map_err(|e| MigrationError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| MigrationError::io(&path, e))
    }
}

/// Content-derived revision id: the first 12 hex digits of
/// `md5(parents joined by "," + "\n" + message + "\n" + upgrade script)`.
pub fn revision_id(parents: &[String], message: &str, upgrade_sql: &str) -> String {
    let input = format!("{}\n{}\n{}", parents.join(","), message, upgrade_sql);
    let digest = format!("{:x}", md5::compute(input.as_bytes()));
    digest[..12].to_string()
}

/// File-name friendly form of a revision message.
pub fn slugify(message: &str) -> String {
    let mut slug = String::new();
    for ch in message.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('_') && !slug.is_empty() {
            slug.push('_');
        }
        if slug.len() >= 40 {
            break;
        }
    }
    let slug = slug.trim_end_matches('_');
    if slug.is_empty() {
        "revision".to_string()
    } else {
        slug.to_string()
    }
}
