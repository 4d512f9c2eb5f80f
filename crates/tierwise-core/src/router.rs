//! Tier router: override prefix, learned patches, DNA intents, keywords, default

use crate::config::SmartRouterConfig;
use crate::dna::DnaRegistry;
use crate::keyword::KeywordMatcher;
use crate::learning::{LearningQueue, LEARNING_QUEUE_CAPACITY};
use crate::prefix::detect_prefix;
use crate::types::{MatchSource, PatchSearchResult, RoutingDecision};
use chrono::Utc;
use std::sync::Arc;
use tierwise_embed::EmbeddingClient;
use tierwise_store::{DualSinglePolicy, MatchKind, MatchPolicy, PatchStore};
use tierwise_vector::{Patch, Tier};
use tracing::{debug, warn};

pub struct Router {
    config: SmartRouterConfig,
    store: Arc<PatchStore>,
    dna: Arc<DnaRegistry>,
    embedder: Option<EmbeddingClient>,
    policy: Arc<dyn MatchPolicy>,
    keywords: KeywordMatcher,
    learning: LearningQueue,
}

impl Router {
    pub fn new(config: SmartRouterConfig, store: Arc<PatchStore>, dna: Arc<DnaRegistry>) -> Self {
        let policy = Arc::new(DualSinglePolicy::new(
            config.vector_store.patch_similarity_threshold,
            config.vector_store.single_match_discount,
        ));
        let keywords = KeywordMatcher::new(&config.keywords);
        Self {
            config,
            store,
            dna,
            embedder: None,
            policy,
            keywords,
            learning: LearningQueue::start(LEARNING_QUEUE_CAPACITY),
        }
    }

    /// Without an embedder only overrides, keywords and the default apply
    pub fn with_embedder(mut self, embedder: EmbeddingClient) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_policy(mut self, policy: Arc<dyn MatchPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &SmartRouterConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<PatchStore> {
        &self.store
    }

    /// Pick a tier for `query`. Never fails; degraded paths fall through to
    /// keywords and the default.
    pub fn route(&self, query: &str) -> RoutingDecision {
        let (forced, stripped) = detect_prefix(query, &self.config.prefixes);
        if let Some(tier) = forced {
            self.record_override(tier, stripped);
            let decision = self.decision(tier, 1.0, "explicit override".to_string(), MatchSource::Override);
            debug!(tier = %tier, "explicit override");
            return decision;
        }

        let mut unavailable = None;
        let embedding = match &self.embedder {
            Some(client) => match client.embed(query) {
                Ok(vector) => Some(vector),
                Err(e) => {
                    warn!(error = %e, "routing without embedding");
                    unavailable = Some(e.to_string());
                    None
                }
            },
            None => None,
        };

        let result = self.search(query, embedding.as_deref());
        let (confidence, mut reasoning) = match result.source {
            MatchSource::PatchDual | MatchSource::PatchSingle => {
                let label = result.patch.as_ref().map_or("", |p| p.label.as_str());
                (result.score, format!("{}:{}", result.source, label))
            }
            MatchSource::Dna => (
                result.score,
                format!("dna:{}", result.intent.as_deref().unwrap_or_default()),
            ),
            MatchSource::Keyword => (
                result.score,
                format!("keyword:{}", result.keyword.as_deref().unwrap_or_default()),
            ),
            MatchSource::Override | MatchSource::Default => (0.0, "no match, default".to_string()),
        };
        if let Some(error) = unavailable {
            reasoning.push_str("; embedding unavailable: ");
            reasoning.push_str(&error);
        }

        let decision = self.decision(result.tier, confidence, reasoning, result.source);
        if let Some(vector) = embedding {
            self.maybe_reinforce(&decision, query, vector);
        }
        debug!(
            tier = %decision.tier,
            source = %decision.source,
            confidence = decision.confidence,
            "routed"
        );
        decision
    }

    /// Run the patch, DNA and keyword cascade. `embedding` is `None` when no
    /// vector could be computed, which skips the first two stages.
    pub fn search(&self, text: &str, embedding: Option<&[f32]>) -> PatchSearchResult {
        if let Some(query) = embedding {
            if let Some(m) = self.store.find_match(query, self.policy.as_ref()) {
                let source = match m.kind {
                    MatchKind::Dual => MatchSource::PatchDual,
                    MatchKind::Single => MatchSource::PatchSingle,
                };
                return PatchSearchResult {
                    found: true,
                    source,
                    tier: m.tier,
                    score: m.confidence,
                    patch: Some(m.patch),
                    intent: None,
                    keyword: None,
                };
            }

            if let Some(m) = self.dna.find(query, self.config.dna_similarity_threshold) {
                return PatchSearchResult {
                    found: true,
                    source: MatchSource::Dna,
                    tier: m.intent.preferred_tier,
                    score: m.similarity,
                    patch: None,
                    intent: Some(m.intent.id.clone()),
                    keyword: None,
                };
            }
        }

        if let Some((keyword, tier)) = self.keywords.find(text) {
            return PatchSearchResult {
                found: true,
                source: MatchSource::Keyword,
                tier,
                score: self.config.keyword_confidence,
                patch: None,
                intent: None,
                keyword: Some(keyword.to_string()),
            };
        }

        PatchSearchResult::not_found()
    }

    /// Wait for background learning appends queued by earlier decisions
    pub fn flush_pending(&self) {
        self.learning.flush();
    }

    fn decision(
        &self,
        tier: Tier,
        confidence: f32,
        reasoning: String,
        source: MatchSource,
    ) -> RoutingDecision {
        RoutingDecision {
            tier,
            selected_model: self.config.model_for(tier).to_string(),
            confidence: confidence.clamp(0.0, 1.0),
            reasoning,
            source,
        }
    }

    /// Learn from an explicit override. The stripped text is embedded off the
    /// request path.
    fn record_override(&self, tier: Tier, stripped: &str) {
        let label = stripped.trim();
        if label.is_empty() {
            return;
        }
        let Some(client) = self.embedder.clone() else {
            debug!("no embedder, override not recorded");
            return;
        };
        let store = Arc::clone(&self.store);
        let label = label.to_string();

        self.learning.submit(move || {
            let vector = match client.embed(&label) {
                Ok(vector) => vector,
                Err(e) => {
                    warn!(error = %e, "override not recorded");
                    return;
                }
            };
            if let Err(e) = store.append(Patch::new(vector, tier, label, Utc::now(), 1.0)) {
                warn!(error = %e, "failed to record override patch");
            }
        });
    }

    fn maybe_reinforce(&self, decision: &RoutingDecision, query: &str, vector: Vec<f32>) {
        let settings = &self.config.self_reinforcement;
        if !settings.enabled
            || !matches!(decision.source, MatchSource::Dna | MatchSource::Keyword)
            || decision.confidence < settings.min_confidence
        {
            return;
        }

        let store = Arc::clone(&self.store);
        let patch = Patch::new(
            vector,
            decision.tier,
            query.trim(),
            Utc::now(),
            settings.initial_weight,
        );
        self.learning.submit(move || {
            if let Err(e) = store.append(patch) {
                warn!(error = %e, "failed to record reinforcement patch");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dna::{DnaConfig, DnaIntent};
    use std::collections::HashMap;
    use tierwise_embed::{EmbedError, Embedder, EmbeddingConfig};
    use tierwise_store::VectorStoreConfig;
    use tierwise_vector::TimeDecay;

    const DIM: usize = 4;

    /// Embeds known texts from a table and fails for everything else
    struct Table(HashMap<String, Vec<f32>>);

    impl Table {
        fn new(entries: &[(&str, [f32; DIM])]) -> Self {
            Self(
                entries
                    .iter()
                    .map(|(text, v)| (text.to_string(), v.to_vec()))
                    .collect(),
            )
        }
    }

    impl Embedder for Table {
        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
            self.0
                .get(text)
                .cloned()
                .ok_or_else(|| EmbedError::Provider(format!("unknown text {:?}", text)))
        }
    }

    fn config(dir: &std::path::Path) -> SmartRouterConfig {
        let mut config = SmartRouterConfig::new();
        config.vector_store = VectorStoreConfig {
            data_file_path: dir.join("patches.bin"),
            vector_dim: DIM,
            ..VectorStoreConfig::new()
        };
        config.embedding.max_retries = 0;
        config
    }

    fn router(config: SmartRouterConfig, dna: DnaRegistry, table: Table) -> Router {
        let store = Arc::new(PatchStore::open(config.vector_store.clone(), config.time_decay));
        let client = EmbeddingClient::new(Arc::new(table), EmbeddingConfig {
            max_retries: 0,
            ..config.embedding.clone()
        }, DIM);
        Router::new(config, store, Arc::new(dna)).with_embedder(client)
    }

    fn table() -> Table {
        Table::new(&[
            ("hello", [0.0, 0.0, 0.0, 1.0]),
            ("what's 2+2", [1.0, 0.0, 0.0, 0.0]),
            ("explain monads", [0.0, 1.0, 0.0, 0.0]),
            ("write a sorting proof", [0.0, 0.0, 1.0, 0.0]),
        ])
    }

    #[test]
    fn test_override_wins_and_is_learned() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(config(dir.path()), DnaRegistry::empty(DIM), table());

        let decision = router.route("/deep explain monads");
        assert_eq!(decision.tier, Tier::Flagship);
        assert_eq!(decision.confidence, 1.0);
        assert_eq!(decision.reasoning, "explicit override");
        assert_eq!(decision.source, MatchSource::Override);
        assert_eq!(decision.selected_model, router.config().default_flagship_model);

        router.flush_pending();
        let patches = router.store().snapshot();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].label, "explain monads");
        assert_eq!(patches[0].initial_weight, 1.0);

        let again = router.route("explain monads");
        assert_eq!(again.tier, Tier::Flagship);
        assert_eq!(again.source, MatchSource::PatchSingle);
        assert_eq!(again.reasoning, "patch-single:explain monads");
        approx::assert_abs_diff_eq!(again.confidence, 0.8, epsilon = 1e-4);
    }

    #[test]
    fn test_bare_prefix_records_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(config(dir.path()), DnaRegistry::empty(DIM), table());
        let decision = router.route("  /QUICK   ");
        assert_eq!(decision.tier, Tier::Lightweight);
        router.flush_pending();
        assert!(router.store().is_empty());
    }

    #[test]
    fn test_empty_everything_defaults_lightweight() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(config(dir.path()), DnaRegistry::empty(DIM), table());
        let decision = router.route("hello");
        assert_eq!(decision.tier, Tier::Lightweight);
        assert_eq!(decision.confidence, 0.0);
        assert_eq!(decision.reasoning, "no match, default");
        assert_eq!(decision.source, MatchSource::Default);
        assert_eq!(decision.selected_model, router.config().default_lightweight_model);
    }

    #[test]
    fn test_dual_patch_match() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(config(dir.path()), DnaRegistry::empty(DIM), table());
        let now = Utc::now();
        router
            .store()
            .append(Patch::new(vec![1.0, 0.05, 0.0, 0.0], Tier::Flagship, "arith a", now, 1.0))
            .unwrap();
        router
            .store()
            .append(Patch::new(vec![1.0, 0.0, 0.05, 0.0], Tier::Flagship, "arith b", now, 1.0))
            .unwrap();

        let decision = router.route("what's 2+2");
        assert_eq!(decision.tier, Tier::Flagship);
        assert_eq!(decision.source, MatchSource::PatchDual);
        assert!(decision.reasoning.starts_with("patch-dual:arith"));
        assert!(decision.confidence > 0.9);
    }

    #[test]
    fn test_dna_match_when_no_patch() {
        let dir = tempfile::tempdir().unwrap();
        let dna = DnaRegistry::from_config(
            DnaConfig {
                version: "t".to_string(),
                generated_at: None,
                intents: vec![DnaIntent {
                    id: "proofs".to_string(),
                    name: "Proofs".to_string(),
                    preferred_tier: Tier::Flagship,
                    centroid: vec![0.0, 0.1, 1.0, 0.0],
                    confidence: 1.0,
                    sample_count: 12,
                }],
            },
            DIM,
        )
        .unwrap();
        let router = router(config(dir.path()), dna, table());

        let decision = router.route("write a sorting proof");
        assert_eq!(decision.tier, Tier::Flagship);
        assert_eq!(decision.reasoning, "dna:proofs");
        assert!(decision.confidence > 0.99);

        // Self-reinforcement is off by default
        router.flush_pending();
        assert!(router.store().is_empty());
    }

    #[test]
    fn test_self_reinforcement_records_confident_decisions() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.self_reinforcement.enabled = true;
        config.self_reinforcement.min_confidence = 0.5;
        config.keyword_confidence = 0.7;
        let router = router(
            config,
            DnaRegistry::empty(DIM),
            Table::new(&[("please summarize this", [0.0, 0.0, 1.0, 0.0])]),
        );

        let decision = router.route("please summarize this");
        assert_eq!(decision.reasoning, "keyword:summarize");
        router.flush_pending();

        let patches = router.store().snapshot();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].tier, Tier::Lightweight);
        assert_eq!(patches[0].initial_weight, 0.25);
    }

    #[test]
    fn test_embedding_failure_falls_back_to_keywords() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(config(dir.path()), DnaRegistry::empty(DIM), table());

        let decision = router.route("translate this paragraph");
        assert_eq!(decision.tier, Tier::Lightweight);
        assert_eq!(decision.source, MatchSource::Keyword);
        assert_eq!(decision.confidence, 0.6);
        assert!(decision.reasoning.starts_with("keyword:translate; embedding unavailable"));

        let decision = router.route("something unknown");
        assert_eq!(decision.source, MatchSource::Default);
        assert!(decision.reasoning.starts_with("no match, default; embedding unavailable"));
    }

    #[test]
    fn test_without_embedder() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let store = Arc::new(PatchStore::open(config.vector_store.clone(), TimeDecay::default()));
        let router = Router::new(config, store, Arc::new(DnaRegistry::empty(DIM)));

        assert_eq!(router.route("refactor this module").tier, Tier::Flagship);
        assert_eq!(router.route("hello").reasoning, "no match, default");
        router.route("flagship: remember me");
        router.flush_pending();
        assert!(router.store().is_empty());
    }

    #[test]
    fn test_override_burst_recorded_by_one_worker() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(config(dir.path()), DnaRegistry::empty(DIM), table());
        for _ in 0..20 {
            assert_eq!(router.route("@flagship explain monads").tier, Tier::Flagship);
        }
        router.flush_pending();
        assert_eq!(router.store().len(), 20);
        assert!(router.store().snapshot().iter().all(|p| p.label == "explain monads"));
    }
}
