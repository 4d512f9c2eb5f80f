use tierwise_core::SmartRouterConfig;

pub fn run(config: &SmartRouterConfig) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
