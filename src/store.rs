use anyhow::Result;
use rusqlite::Connection;
use std::path::{Path, PathBuf};

const DISCLAIMER_KEY: &str = "disclaimer_shown";

/// Tiny key-value store for state that survives restarts. Currently holds
/// a single flag: whether the data disclaimer was already shown.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open() -> Result<Self> {
        let path = Self::default_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open_at(&path)
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS flags (
                key TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            );",
        )?;
        Ok(Self { conn })
    }

    fn default_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "magang") {
            Ok(proj_dirs.data_dir().join("magang.db"))
        } else {
            Ok(PathBuf::from("magang.db"))
        }
    }

    pub fn disclaimer_shown(&self) -> Result<bool> {
        self.get_flag(DISCLAIMER_KEY)
    }

    pub fn mark_disclaimer_shown(&self) -> Result<()> {
        self.set_flag(DISCLAIMER_KEY)
    }

    fn get_flag(&self, key: &str) -> Result<bool> {
        let value: Option<i64> = self
            .conn
            .query_row("SELECT value FROM flags WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .ok();
        Ok(value.unwrap_or(0) != 0)
    }

    fn set_flag(&self, key: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO flags (key, value) VALUES (?1, 1)
             ON CONFLICT(key) DO UPDATE SET value = 1",
            [key],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disclaimer_flag_is_write_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("magang.db");

        let store = Store::open_at(&path).unwrap();
        assert!(!store.disclaimer_shown().unwrap());

        store.mark_disclaimer_shown().unwrap();
        assert!(store.disclaimer_shown().unwrap());

        // Marking again is harmless, and the flag survives reopening.
        store.mark_disclaimer_shown().unwrap();
        drop(store);
        let store = Store::open_at(&path).unwrap();
        assert!(store.disclaimer_shown().unwrap());
    }
}
