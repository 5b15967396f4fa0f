use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Paths {
    pub base: PathBuf,
}

impl Paths {
    pub fn new() -> Self {
        let base = dirs::home_dir()
            .map(|h| h.join(".patrol"))
            .unwrap_or_else(|| PathBuf::from(".patrol"));
        Self { base }
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn config_file(&self) -> PathBuf {
        self.base.join("config.json")
    }

    pub fn ledger_dir(&self) -> PathBuf {
        self.base.join("ledger")
    }

    pub fn ledger_file(&self) -> PathBuf {
        self.ledger_dir().join("visits.json")
    }

    pub fn pid_file(&self) -> PathBuf {
        self.base.join("patrol.pid")
    }

    pub fn cooldown_file(&self) -> PathBuf {
        self.base.join("cooldown")
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.base)?;
        std::fs::create_dir_all(self.ledger_dir())?;
        Ok(())
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}
