use std::path::PathBuf;

use crate::error::Result;
use crate::types::MovieSummary;

const WISHLIST_KEY: &str = "wishlist";

/// On-device key-value storage the wishlist persists through.
pub trait Store: Send + Sync {
    /// Read a value. None if the key is missing or unreadable.
    fn get(&self, key: &str) -> Option<Vec<u8>>;
    fn set(&self, key: &str, value: &[u8]) -> std::io::Result<()>;
}

/// XDG-compatible data directory: ~/.local/share/marquee/ (Linux) or
/// ~/Library/Application Support/marquee/ (macOS)
fn data_dir() -> Option<PathBuf> {
    let dir = dirs::data_dir()?.join("marquee");
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir)
}

/// One JSON file per key under the platform data directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new() -> Option<Self> {
        Some(Self { dir: data_dir()? })
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl Store for FileStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        std::fs::read(self.path(key)).ok()
    }

    fn set(&self, key: &str, value: &[u8]) -> std::io::Result<()> {
        std::fs::write(self.path(key), value)
    }
}

/// Favorited movies, persisted as a JSON array in insertion order and
/// deduplicated by movie id.
pub struct Wishlist {
    store: Box<dyn Store>,
}

impl Wishlist {
    pub fn new(store: Box<dyn Store>) -> Self {
        Self { store }
    }

    /// All wishlisted movies. A missing or corrupt payload reads as empty.
    pub fn entries(&self) -> Vec<MovieSummary> {
        let Some(bytes) = self.store.get(WISHLIST_KEY) else {
            return Vec::new();
        };
        serde_json::from_slice(&bytes).unwrap_or_default()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.entries().iter().any(|m| m.id == id)
    }

    /// Add the movie if absent, remove it if present. Returns whether the
    /// movie is wishlisted afterwards.
    pub fn toggle(&self, movie: &MovieSummary) -> Result<bool> {
        let mut entries = self.entries();
        let wishlisted = if let Some(pos) = entries.iter().position(|m| m.id == movie.id) {
            entries.remove(pos);
            false
        } else {
            entries.push(movie.clone());
            true
        };
        self.save(&entries)?;
        Ok(wishlisted)
    }

    pub fn add(&self, movie: &MovieSummary) -> Result<()> {
        let mut entries = self.entries();
        if !entries.iter().any(|m| m.id == movie.id) {
            entries.push(movie.clone());
            self.save(&entries)?;
        }
        Ok(())
    }

    pub fn remove(&self, id: u64) -> Result<()> {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|m| m.id != id);
        if entries.len() != before {
            self.save(&entries)?;
        }
        Ok(())
    }

    fn save(&self, entries: &[MovieSummary]) -> Result<()> {
        let bytes = serde_json::to_vec(entries)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        self.store.set(WISHLIST_KEY, &bytes)?;
        Ok(())
    }
}
