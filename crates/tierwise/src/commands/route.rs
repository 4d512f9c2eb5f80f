use super::build_router;
use tierwise_core::{RoutingDecision, SmartRouterConfig};

pub fn decide(
    config: &SmartRouterConfig,
    query: &str,
    offline: bool,
) -> anyhow::Result<RoutingDecision> {
    let router = build_router(config, offline)?;
    let decision = router.route(query);
    // Overrides are learned in the background; finish them before exiting
    router.flush_pending();
    Ok(decision)
}

pub fn run(config: &SmartRouterConfig, query: &str, offline: bool) -> anyhow::Result<()> {
    let decision = decide(config, query, offline)?;
    println!("{}", serde_json::to_string(&decision)?);
    Ok(())
}
