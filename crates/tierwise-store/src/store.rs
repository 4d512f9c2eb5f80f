//! File-backed patch store with copy-on-write snapshots

use crate::codec::{self, Header};
use crate::compactor::{compact_patches, CompactionResult, CompactionSettings};
use crate::config::VectorStoreConfig;
use crate::error::StoreError;
use crate::policy::{MatchPolicy, PatchMatch, ScoredPatch};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::cmp::Ordering;
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Instant;
use tierwise_vector::{atomic_write, atomic_write_via, cosine_similarity, normalize, truncate_to_millis, Patch, Tier, TimeDecay};
use tracing::{debug, info, warn};

/// Temp file suffix for compaction rewrites
pub const COMPACTION_TEMP_SUFFIX: &str = ".compact.tmp";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total: usize,
    pub live: usize,
    pub flagship: usize,
    pub lightweight: usize,
    pub journal_records: u32,
    pub file_bytes: u64,
    /// Successful compactions since open
    pub compactions: u64,
}

/// Writer-side view of the file. `None` means the file is missing or
/// unusable and the next write must rewrite it from the snapshot.
struct WriterState {
    header: Option<Header>,
}

/// Clears the in-flight flag when a compaction ends, however it ends
struct CompactionGuard<'a>(&'a AtomicBool);

impl Drop for CompactionGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, AtomicOrdering::Release);
    }
}

pub struct PatchStore {
    config: VectorStoreConfig,
    decay: TimeDecay,
    snapshot: RwLock<Arc<Vec<Patch>>>,
    writer: Mutex<WriterState>,
    compacting: AtomicBool,
    last_compaction: Mutex<Option<DateTime<Utc>>>,
    compactions: AtomicU64,
    /// Live count at which an append triggers the next compaction. Reset to
    /// `compaction_threshold` whenever the live count falls below it.
    next_trigger: AtomicUsize,
}

impl PatchStore {
    /// Open the store at `config.data_file_path`.
    ///
    /// Never fails: a missing, foreign or damaged file yields an empty store
    /// and is replaced by a fresh file on the next append.
    pub fn open(config: VectorStoreConfig, decay: TimeDecay) -> Self {
        let (header, patches) = load(&config);
        let config_threshold = config.compaction_threshold;
        Self {
            config,
            decay,
            snapshot: RwLock::new(Arc::new(patches)),
            writer: Mutex::new(WriterState { header }),
            compacting: AtomicBool::new(false),
            last_compaction: Mutex::new(None),
            compactions: AtomicU64::new(0),
            next_trigger: AtomicUsize::new(config_threshold),
        }
    }

    pub fn config(&self) -> &VectorStoreConfig {
        &self.config
    }

    pub fn decay(&self) -> &TimeDecay {
        &self.decay
    }

    pub fn path(&self) -> &Path {
        &self.config.data_file_path
    }

    /// Current immutable patch list
    pub fn snapshot(&self) -> Arc<Vec<Patch>> {
        self.snapshot.read().clone()
    }

    pub fn len(&self) -> usize {
        self.snapshot.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last_compaction(&self) -> Option<DateTime<Utc>> {
        *self.last_compaction.lock()
    }

    pub fn is_compacting(&self) -> bool {
        self.compacting.load(AtomicOrdering::Acquire)
    }

    pub fn live_count_at(&self, now: DateTime<Utc>) -> usize {
        self.snapshot()
            .iter()
            .filter(|p| p.effective_weight(&self.decay, now) >= self.config.live_weight_epsilon)
            .count()
    }

    pub fn stats_at(&self, now: DateTime<Utc>) -> StoreStats {
        let patches = self.snapshot();
        let journal_records = self
            .writer
            .lock()
            .header
            .map(|h| h.journal_count())
            .unwrap_or(0);
        let file_bytes = std::fs::metadata(self.path()).map(|m| m.len()).unwrap_or(0);
        StoreStats {
            total: patches.len(),
            live: self.live_count_at(now),
            flagship: patches.iter().filter(|p| p.tier == Tier::Flagship).count(),
            lightweight: patches.iter().filter(|p| p.tier == Tier::Lightweight).count(),
            journal_records,
            file_bytes,
            compactions: self.compactions.load(AtomicOrdering::Relaxed),
        }
    }

    fn prepare(&self, mut patch: Patch) -> Result<Patch, StoreError> {
        if patch.vector.len() != self.config.vector_dim {
            return Err(StoreError::DimensionMismatch {
                expected: self.config.vector_dim,
                got: patch.vector.len(),
            });
        }
        if !normalize(&mut patch.vector) {
            return Err(StoreError::InvalidPatch(
                "vector is zero or not finite".to_string(),
            ));
        }
        if !(patch.initial_weight.is_finite() && patch.initial_weight > 0.0) {
            return Err(StoreError::InvalidPatch(format!(
                "initial weight {} must be positive",
                patch.initial_weight
            )));
        }
        patch.initial_weight = patch.initial_weight.min(1.0);
        patch.label = codec::clamp_label(&patch.label).to_string();
        patch.timestamp = truncate_to_millis(patch.timestamp);
        Ok(patch)
    }

    /// Append one patch, then compact if the live count crossed the threshold
    pub fn append(&self, patch: Patch) -> Result<(), StoreError> {
        let patch = self.prepare(patch)?;
        {
            let mut writer = self.writer.lock();
            let current = self.snapshot();

            let next_header = match writer.header {
                Some(header) => self.append_record(&header, &patch),
                None => self.rewrite_with(&current, &patch),
            };
            match next_header {
                Ok(header) => writer.header = Some(header),
                Err(e) => {
                    writer.header = None;
                    return Err(e);
                }
            }

            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(patch);
            *self.snapshot.write() = Arc::new(next);
        }

        self.maybe_compact(Utc::now());
        Ok(())
    }

    fn append_record(&self, header: &Header, patch: &Patch) -> Result<Header, StoreError> {
        let record = codec::encode_journal_record(patch, header.end_offset, self.config.vector_dim)?;
        let next = codec::header_after_append(header, record.len());

        let mut file = OpenOptions::new().write(true).open(self.path())?;
        file.seek(SeekFrom::Start(header.end_offset))?;
        file.write_all(&record)?;
        file.set_len(next.end_offset)?;
        file.sync_data()?;

        file.seek(SeekFrom::Start(0))?;
        file.write_all(&next.encode())?;
        file.sync_data()?;
        Ok(next)
    }

    fn rewrite_with(&self, current: &[Patch], patch: &Patch) -> Result<Header, StoreError> {
        let mut all = Vec::with_capacity(current.len() + 1);
        all.extend_from_slice(current);
        all.push(patch.clone());
        let bytes = codec::encode_store(&all, self.config.vector_dim)?;
        atomic_write(self.path(), &bytes)?;
        debug!(path = %self.path().display(), count = all.len(), "rewrote patch store");
        Ok(Header::decode(&bytes)?)
    }

    /// Best matching patch for `query` under `policy`, ignoring dead patches
    pub fn find_match_at(
        &self,
        query: &[f32],
        policy: &dyn MatchPolicy,
        now: DateTime<Utc>,
    ) -> Option<PatchMatch> {
        let patches = self.snapshot();
        let mut ranked: Vec<ScoredPatch<'_>> = patches
            .iter()
            .filter_map(|patch| {
                let weight = patch.effective_weight(&self.decay, now);
                if weight < self.config.live_weight_epsilon {
                    return None;
                }
                Some(ScoredPatch {
                    patch,
                    similarity: cosine_similarity(query, &patch.vector),
                    weight,
                })
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.weight.partial_cmp(&a.weight).unwrap_or(Ordering::Equal))
                .then_with(|| b.patch.timestamp.cmp(&a.patch.timestamp))
        });
        ranked.truncate(policy.candidates());
        policy.evaluate(&ranked)
    }

    pub fn find_match(&self, query: &[f32], policy: &dyn MatchPolicy) -> Option<PatchMatch> {
        self.find_match_at(query, policy, Utc::now())
    }

    /// Compact when the live count crosses the trigger from below.
    ///
    /// After a compaction (or a failed attempt) the trigger moves past the
    /// remaining live count by at least half of it, so a store whose live
    /// patches cannot be reduced is rewritten geometrically rarely instead of
    /// on every append.
    fn maybe_compact(&self, now: DateTime<Utc>) {
        let threshold = self.config.compaction_threshold;
        let live = self.live_count_at(now);
        if live < threshold {
            self.next_trigger.store(threshold, AtomicOrdering::Release);
            return;
        }
        if live < self.next_trigger.load(AtomicOrdering::Acquire) {
            return;
        }
        match self.compact_at(now) {
            Ok(Some(_)) => {}
            Ok(None) => debug!("compaction already running, trigger coalesced"),
            Err(e) => {
                self.rearm_trigger(live);
                warn!(error = %e, "compaction failed, will retry on next trigger");
            }
        }
    }

    fn rearm_trigger(&self, live: usize) {
        let threshold = self.config.compaction_threshold;
        let margin = (threshold / 2).max(live / 2).max(1);
        let next = live.saturating_add(margin).max(threshold);
        self.next_trigger.store(next, AtomicOrdering::Release);
    }

    pub fn compact(&self) -> Result<Option<CompactionResult>, StoreError> {
        self.compact_at(Utc::now())
    }

    /// Compact the store. Returns `Ok(None)` if another compaction is in flight.
    ///
    /// The new file is written beside the old one and renamed over it; the
    /// in-memory snapshot only changes after the rename succeeded.
    pub fn compact_at(&self, now: DateTime<Utc>) -> Result<Option<CompactionResult>, StoreError> {
        if self
            .compacting
            .compare_exchange(false, true, AtomicOrdering::AcqRel, AtomicOrdering::Acquire)
            .is_err()
        {
            return Ok(None);
        }
        let _guard = CompactionGuard(&self.compacting);
        let started = Instant::now();

        let mut writer = self.writer.lock();
        let current = self.snapshot();
        let settings = CompactionSettings::from_config(&self.config);
        let outcome = compact_patches(&current, &settings, &self.decay, now);

        let bytes = codec::encode_store(&outcome.patches, self.config.vector_dim)?;
        atomic_write_via(self.path(), COMPACTION_TEMP_SUFFIX, &bytes)
            .map_err(StoreError::CompactionWrite)?;
        writer.header = Some(Header::decode(&bytes)?);

        let result = CompactionResult {
            before_count: current.len(),
            after_count: outcome.patches.len(),
            deleted_count: current.len() - outcome.patches.len(),
            merged_count: outcome.merged,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        let live_after = outcome
            .patches
            .iter()
            .filter(|p| p.effective_weight(&self.decay, now) >= self.config.live_weight_epsilon)
            .count();
        *self.snapshot.write() = Arc::new(outcome.patches);
        *self.last_compaction.lock() = Some(now);
        self.compactions.fetch_add(1, AtomicOrdering::Relaxed);
        self.rearm_trigger(live_after);

        info!(
            before = result.before_count,
            after = result.after_count,
            deleted = result.deleted_count,
            merged = result.merged_count,
            pruned = outcome.pruned,
            duration_ms = result.duration_ms,
            "compacted patch store"
        );
        Ok(Some(result))
    }
}

fn load(config: &VectorStoreConfig) -> (Option<Header>, Vec<Patch>) {
    let path = &config.data_file_path;
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no patch store yet");
            return (None, Vec::new());
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read patch store, starting empty");
            return (None, Vec::new());
        }
    };

    match codec::decode_store(&bytes, config.vector_dim) {
        Ok((header, patches)) => {
            debug!(path = %path.display(), count = patches.len(), "loaded patch store");
            (Some(header), patches)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "patch store is corrupt, starting empty");
            (None, Vec::new())
        }
    }
}
