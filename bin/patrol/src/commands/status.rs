use chrono::{TimeZone, Utc};
use patrol_core::{Config, CredentialSet, Paths};
use patrol_scheduler::next_eligible;
use patrol_storage::VisitLedger;

pub async fn run() -> anyhow::Result<()> {
    let paths = Paths::new();
    let config = Config::from_env(&paths)?;

    println!("Delay between visits : {}h", config.delay_hours);
    println!("Minimum dwell        : {}s", config.min_dwell_secs);
    println!("Staleness threshold  : {}s", config.stale_after_secs);

    let credentials = match CredentialSet::load(config.accounts.clone()) {
        Ok(set) => set,
        Err(e) => {
            println!("Accounts             : none usable ({})", e);
            return Ok(());
        }
    };
    println!("Accounts             : {}", credentials.len());

    let ledger = VisitLedger::new(paths, config.stale_after());
    ledger.load().await?;
    let records = ledger.snapshot().await;

    let now = Utc::now();
    let plans = next_eligible(
        &credentials,
        &records,
        now,
        config.min_delay(),
        config.stale_after(),
    );

    println!();
    println!("{:<20} {:<20} {}", "Account", "Eligible", "State");
    println!("{}", "-".repeat(56));
    for plan in &plans {
        let eligible = if plan.is_due(now) {
            "now".to_string()
        } else {
            Utc.timestamp_millis_opt(plan.eligible_at_ms)
                .single()
                .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "invalid".to_string())
        };
        let state = records
            .get(&plan.account)
            .map(|r| format!("{:?}", r.outcome).to_lowercase())
            .unwrap_or_else(|| "never visited".to_string());
        println!("{:<20} {:<20} {}", plan.account, eligible, state);
    }
    for cred in credentials.iter() {
        if !plans.iter().any(|p| p.account == cred.id) {
            println!("{:<20} {:<20} {}", cred.id, "-", "in progress");
        }
    }

    Ok(())
}
