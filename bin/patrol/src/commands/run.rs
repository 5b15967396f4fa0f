use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use patrol_core::{Config, Cooldown, CredentialSet, Paths};
use patrol_scheduler::{DriverService, DriverTiming};
use patrol_session::SimulatedBrowser;
use patrol_storage::VisitLedger;
use tokio::sync::broadcast;
use tracing::{info, warn};

pub async fn run(interaction_secs: u64) -> anyhow::Result<()> {
    let paths = Paths::new();
    paths.ensure_dirs()?;

    let config = Config::from_env(&paths)?;
    let credentials = CredentialSet::load(config.accounts.clone())?;

    let cooldown = Cooldown::new(paths.clone(), config.min_delay().to_std()?);
    if let Some(left) = cooldown.remaining()? {
        anyhow::bail!(
            "cooling down for another {:.1}h; `patrol cooldown clear` overrides",
            left.as_secs_f64() / 3600.0
        );
    }

    let _pid_guard = PidGuard::acquire(&paths, config.stale_after().to_std()?)?;

    let ledger = Arc::new(VisitLedger::new(paths, config.stale_after()));
    ledger.load().await?;

    let capability = Arc::new(SimulatedBrowser::new(Duration::from_secs(interaction_secs)));
    let driver = Arc::new(DriverService::new(
        credentials,
        ledger,
        capability,
        DriverTiming::from(&config),
    )?);

    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    let handle = tokio::spawn(driver.run_loop(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("interrupt received, letting any in-flight visit finish");
    let _ = shutdown_tx.send(());
    handle.await?;

    Ok(())
}

/// Keeps a second `patrol run` from sharing the ledger. The file is
/// removed on drop; one left behind by a crash is reclaimed once it is
/// older than the staleness threshold.
struct PidGuard {
    path: PathBuf,
}

impl PidGuard {
    fn acquire(paths: &Paths, stale_after: Duration) -> anyhow::Result<Self> {
        use std::io::Write;

        let path = paths.pid_file();
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                write!(file, "{}", std::process::id())?;
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let age = std::fs::metadata(&path)?
                    .modified()?
                    .elapsed()
                    .unwrap_or_default();
                if age < stale_after {
                    anyhow::bail!(
                        "another patrol run appears active ({} exists)",
                        path.display()
                    );
                }
                warn!(path = %path.display(), "reclaiming stale pid file");
                let mut file = std::fs::File::create(&path)?;
                write!(file, "{}", std::process::id())?;
                Ok(Self { path })
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for PidGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
