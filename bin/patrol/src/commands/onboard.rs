use patrol_core::config::ACCOUNTS_ENV;
use patrol_core::{Config, Paths};

pub async fn run(force: bool) -> anyhow::Result<()> {
    let paths = Paths::new();
    paths.ensure_dirs()?;

    let config_path = paths.config_file();
    if config_path.exists() && !force {
        println!("Config already exists at {}", config_path.display());
        println!("Use --force to overwrite.");
        return Ok(());
    }

    let mut config = Config::default();
    config
        .accounts
        .insert("your_id_here".to_string(), "your_password".to_string());
    config.save(&config_path)?;

    println!("Wrote starter config to {}", config_path.display());
    println!("Fill in the accounts map, or set {} instead.", ACCOUNTS_ENV);
    Ok(())
}
