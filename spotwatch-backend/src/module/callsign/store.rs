use std::path::{Path, PathBuf};

use spotwatch_common::base_callsign;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::normalize_callsign;
use crate::error::Result;
use crate::utils::write_atomic;

/// Flat list of tracked callsigns, one per line.
///
/// Every read and write goes through the same lock, so the poll loop never
/// sees a half-written file and concurrent add/remove calls never interleave.
pub struct CallsignStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CallsignStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current tracked callsigns in file order. A missing file is an empty list.
    pub async fn list(&self) -> Result<Vec<String>> {
        let _guard = self.lock.lock().await;
        self.read_unlocked().await
    }

    /// Add a callsign. Returns the normalized form; already present is not an error.
    pub async fn add(&self, callsign: &str) -> Result<String> {
        let callsign = normalize_callsign(callsign)?;

        let _guard = self.lock.lock().await;
        let mut calls = self.read_unlocked().await?;
        if calls.contains(&callsign) {
            debug!("Callsign {} already tracked", callsign);
            return Ok(callsign);
        }
        calls.push(callsign.clone());
        self.write_unlocked(&calls).await?;

        info!("Tracking callsign {}", callsign);
        Ok(callsign)
    }

    /// Remove a callsign. Returns whether it was present.
    ///
    /// Reduced to its base form like [`add`](Self::add), but without the shape
    /// check: input that could never have been added is simply not present.
    pub async fn remove(&self, callsign: &str) -> Result<bool> {
        let callsign = base_callsign(callsign.trim()).to_uppercase();

        let _guard = self.lock.lock().await;
        let mut calls = self.read_unlocked().await?;
        let before = calls.len();
        calls.retain(|c| c != &callsign);
        if calls.len() == before {
            return Ok(false);
        }
        self.write_unlocked(&calls).await?;

        info!("Stopped tracking callsign {}", callsign);
        Ok(true)
    }

    async fn read_unlocked(&self) -> Result<Vec<String>> {
        if !fs::try_exists(&self.path).await? {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path).await?;
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_uppercase)
            .collect())
    }

    async fn write_unlocked(&self, calls: &[String]) -> Result<()> {
        write_atomic(&self.path, calls.join("\n").as_bytes()).await?;
        Ok(())
    }
}
