//! Track id to file path sidecar written next to a snapshot

use anyhow::{Context, Result};
use jukebox_core::TrackId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub tracks: BTreeMap<TrackId, String>,
}

impl Catalog {
    /// `<snapshot>.tracks.json`
    pub fn sidecar_path(snapshot: &Path) -> PathBuf {
        let mut path = snapshot.as_os_str().to_owned();
        path.push(".tracks.json");
        PathBuf::from(path)
    }

    pub fn insert(&mut self, id: TrackId, path: &Path) {
        self.tracks.insert(id, path.display().to_string());
    }

    pub fn path_of(&self, id: TrackId) -> Option<&str> {
        self.tracks.get(&id).map(String::as_str)
    }

    pub fn save(&self, snapshot: &Path) -> Result<PathBuf> {
        let path = Self::sidecar_path(snapshot);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// The sidecar of `snapshot`, or `None` if there is none
    pub fn load(snapshot: &Path) -> Result<Option<Self>> {
        let path = Self::sidecar_path(snapshot);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let catalog = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(catalog))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            Catalog::sidecar_path(Path::new("/tmp/library.jbx")),
            PathBuf::from("/tmp/library.jbx.tracks.json")
        );
    }

    #[test]
    fn test_save_and_load() {
        let snapshot = std::env::temp_dir().join(format!("jukebox-catalog-{}.jbx", std::process::id()));
        assert_eq!(Catalog::load(&snapshot).unwrap(), None);

        let mut catalog = Catalog::default();
        catalog.insert(TrackId(0), Path::new("music/a.flac"));
        catalog.insert(TrackId(7), Path::new("music/b.mp3"));
        let path = catalog.save(&snapshot).unwrap();

        let loaded = Catalog::load(&snapshot).unwrap().unwrap();
        assert_eq!(loaded, catalog);
        assert_eq!(loaded.path_of(TrackId(7)), Some("music/b.mp3"));
        assert_eq!(loaded.path_of(TrackId(1)), None);

        std::fs::remove_file(path).ok();
    }
}
