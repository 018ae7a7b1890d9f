// src/infrastructure/persistence/mod.rs
// JSON file storage for the watchlist

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::application::dto::parser::{parse_watchlist_document, render_watchlist_document};
use crate::domain::errors::PersistenceResult;
use crate::domain::model::SavedSymbol;
use crate::domain::repository::WatchlistRepository;

pub struct JsonWatchlistRepository {
    path: PathBuf,
}

impl JsonWatchlistRepository {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "watchlist.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl WatchlistRepository for JsonWatchlistRepository {
    fn save(&self, entries: &[SavedSymbol]) -> PersistenceResult<()> {
        let contents = render_watchlist_document(entries)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        // Write then rename so a crash never leaves a truncated file
        let temp = self.temp_path();
        fs::write(&temp, contents)?;
        fs::rename(&temp, &self.path)?;

        log::debug!("Saved {} symbols to {}", entries.len(), self.path.display());
        Ok(())
    }

    fn load(&self) -> PersistenceResult<Vec<SavedSymbol>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::info!("No watchlist at {}, starting empty", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        parse_watchlist_document(&contents)
    }
}
