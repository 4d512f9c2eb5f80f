use super::open_store;
use chrono::Utc;
use tierwise_core::SmartRouterConfig;

pub fn run(config: &SmartRouterConfig) -> anyhow::Result<()> {
    let store = open_store(config);
    let stats = store.stats_at(Utc::now());

    let output = serde_json::json!({
        "path": store.path().display().to_string(),
        "vector_dim": config.vector_store.vector_dim,
        "compaction_threshold": config.vector_store.compaction_threshold,
        "half_life_days": store.decay().half_life_days,
        "stats": stats,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
