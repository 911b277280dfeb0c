use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use rebuild_core::DetectionCache;
use rebuild_platform::write_atomic;

pub fn load(path: &Path) -> Option<DetectionCache> {
    let data = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&data) {
        Ok(cache) => Some(cache),
        Err(error) => {
            log::debug!("Ignoring detection cache {}: {error}", path.display());
            None
        }
    }
}

/// The cached detection, if it is younger than `ttl`.
pub fn load_fresh(path: &Path, ttl: Duration) -> Option<DetectionCache> {
    load(path).filter(|cache| cache.is_fresh(ttl, Utc::now()))
}

pub fn save(path: &Path, cache: &DetectionCache) {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match serde_json::to_vec(cache) {
        Ok(data) => {
            if let Err(error) = write_atomic(path, &data) {
                log::warn!("Failed to save detection cache {}: {error}", path.display());
            }
        }
        Err(error) => log::warn!("Failed to serialize detection cache: {error}"),
    }
}
