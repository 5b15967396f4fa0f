use chrono::{TimeZone, Utc};
use patrol_core::{Config, Paths};
use patrol_storage::VisitLedger;

fn fmt_ms(ms: i64) -> String {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "invalid".to_string())
}

async fn open_ledger() -> anyhow::Result<VisitLedger> {
    let paths = Paths::new();
    let config = Config::from_env(&paths)?;
    let ledger = VisitLedger::new(paths, config.stale_after());
    ledger.load().await?;
    Ok(ledger)
}

pub async fn list() -> anyhow::Result<()> {
    let ledger = open_ledger().await?;

    let mut records: Vec<_> = ledger.snapshot().await.into_values().collect();
    if records.is_empty() {
        println!("No visit records.");
        return Ok(());
    }
    records.sort_by(|a, b| a.account.cmp(&b.account));

    println!(
        "{:<20} {:<12} {:<18} {}",
        "Account", "Outcome", "Last Attempt", "Last Success"
    );
    println!("{}", "-".repeat(68));
    for rec in records {
        println!(
            "{:<20} {:<12} {:<18} {}",
            rec.account,
            format!("{:?}", rec.outcome).to_lowercase(),
            fmt_ms(rec.last_attempted_at_ms),
            rec.last_completed_at_ms
                .map(fmt_ms)
                .unwrap_or_else(|| "-".to_string()),
        );
    }
    Ok(())
}

pub async fn reset(account: &str) -> anyhow::Result<()> {
    let ledger = open_ledger().await?;
    if ledger.reset(account).await? {
        println!("Dropped visit record for '{}'.", account);
    } else {
        println!("No visit record for '{}'.", account);
    }
    Ok(())
}
