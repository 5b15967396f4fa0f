use patrol_core::{Config, Cooldown, Paths};

fn cooldown() -> anyhow::Result<Cooldown> {
    let paths = Paths::new();
    paths.ensure_dirs()?;
    let config = Config::from_env(&paths)?;
    Ok(Cooldown::new(paths, config.min_delay().to_std()?))
}

pub fn set(reason: &str) -> anyhow::Result<()> {
    cooldown()?.set(reason)?;
    println!("Cooldown sentinel created.");
    Ok(())
}

pub fn clear() -> anyhow::Result<()> {
    if cooldown()?.clear()? {
        println!("Cooldown sentinel removed.");
    } else {
        println!("No cooldown sentinel present.");
    }
    Ok(())
}

pub fn status() -> anyhow::Result<()> {
    match cooldown()?.remaining()? {
        Some(left) => println!(
            "Cooling down for another {:.1}h.",
            left.as_secs_f64() / 3600.0
        ),
        None => println!("No active cooldown."),
    }
    Ok(())
}
