use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::error::Result;
use crate::paths::Paths;

/// Security pause sentinel. While a sentinel younger than `delay` exists,
/// the driver refuses to start; an expired sentinel is removed on check.
pub struct Cooldown {
    paths: Paths,
    delay: Duration,
}

impl Cooldown {
    pub fn new(paths: Paths, delay: Duration) -> Self {
        Self { paths, delay }
    }

    pub fn set(&self, reason: &str) -> Result<()> {
        let body = format!(
            "Cooldown started: {}\nReason: {}\n",
            Utc::now().to_rfc3339(),
            reason
        );
        std::fs::write(self.paths.cooldown_file(), body)?;
        warn!(reason = %reason, "cooldown sentinel created");
        Ok(())
    }

    /// Returns true if a sentinel existed and was removed.
    pub fn clear(&self) -> Result<bool> {
        let path = self.paths.cooldown_file();
        if path.exists() {
            std::fs::remove_file(&path)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Remaining pause, if an unexpired sentinel exists. An expired
    /// sentinel is deleted as a side effect.
    pub fn remaining(&self) -> Result<Option<Duration>> {
        let path = self.paths.cooldown_file();
        if !path.exists() {
            return Ok(None);
        }
        let age = std::fs::metadata(&path)?
            .modified()?
            .elapsed()
            .unwrap_or(Duration::ZERO);
        if age >= self.delay {
            std::fs::remove_file(&path)?;
            info!("cooldown expired, resuming normal operation");
            return Ok(None);
        }
        Ok(Some(self.delay - age))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_sentinel_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base(dir.path().to_path_buf());
        let cooldown = Cooldown::new(paths, Duration::from_secs(3600));

        assert!(cooldown.remaining().unwrap().is_none());
        cooldown.set("captcha challenge").unwrap();
        let left = cooldown.remaining().unwrap().unwrap();
        assert!(left <= Duration::from_secs(3600));
        assert!(left > Duration::from_secs(3500));
    }

    #[test]
    fn test_expired_sentinel_removed() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base(dir.path().to_path_buf());
        let cooldown = Cooldown::new(paths.clone(), Duration::ZERO);

        cooldown.set("stale").unwrap();
        assert!(cooldown.remaining().unwrap().is_none());
        assert!(!paths.cooldown_file().exists());
    }

    #[test]
    fn test_clear() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base(dir.path().to_path_buf());
        let cooldown = Cooldown::new(paths, Duration::from_secs(10));

        assert!(!cooldown.clear().unwrap());
        cooldown.set("manual").unwrap();
        assert!(cooldown.clear().unwrap());
        assert!(cooldown.remaining().unwrap().is_none());
    }
}
