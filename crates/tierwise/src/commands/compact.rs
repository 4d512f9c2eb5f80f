use super::open_store;
use tierwise_core::SmartRouterConfig;

pub fn run(config: &SmartRouterConfig) -> anyhow::Result<()> {
    let store = open_store(config);
    match store.compact()? {
        Some(result) => println!("{}", serde_json::to_string_pretty(&result)?),
        None => println!("compaction already running"),
    }
    Ok(())
}
