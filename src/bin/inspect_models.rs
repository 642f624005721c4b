use {
    anyhow::Result,
    candle_cast::{Cli, ModelRegistry, utils::{format_duration, now_utc}},
    clap::Parser,
    std::time::Duration,
    tabled::{Table, Tabled, settings::Style},
};

#[derive(Tabled)]
struct ArtifactRow {
    #[tabled(rename = "Interval")]
    interval: String,
    #[tabled(rename = "Created (UTC)")]
    created: String,
    #[tabled(rename = "Age")]
    age: String,
    #[tabled(rename = "Fresh")]
    fresh: String,
    #[tabled(rename = "Location")]
    location: String,
}

/// Prints every model in the registry, newest first per interval.
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = Cli::parse().into_config();
    let registry = ModelRegistry::new(config.layout.model_dir(), Duration::from_secs(1));
    let max_age = config.model_max_age_secs();
    let now = now_utc();

    let mut artifacts = registry.list()?;
    artifacts.retain(|a| config.intervals.contains(&a.interval));
    artifacts.sort_by(|a, b| {
        a.interval
            .cmp(&b.interval)
            .then(b.created_at.cmp(&a.created_at))
    });

    if artifacts.is_empty() {
        println!("No models under {}", registry.model_dir().display());
        return Ok(());
    }

    let rows: Vec<ArtifactRow> = artifacts
        .iter()
        .map(|a| ArtifactRow {
            interval: a.interval.to_string(),
            created: a.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            age: format_duration(a.age_secs(now)),
            fresh: if a.is_fresh(now, max_age) { "yes" } else { "no" }.to_string(),
            location: a.location.display().to_string(),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);
    Ok(())
}
