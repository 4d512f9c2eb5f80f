//! Decay, prune and merge pass over the patch set

use crate::config::VectorStoreConfig;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use tierwise_vector::{cosine_similarity, normalize, Patch, Tier, TimeDecay};

/// Audit record for one compaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompactionResult {
    pub before_count: usize,
    pub after_count: usize,
    /// `before_count - after_count`; merged patches are part of this figure
    pub deleted_count: usize,
    /// Patches absorbed into another during merging
    pub merged_count: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct CompactionSettings {
    pub death_threshold: f64,
    pub min_retention: usize,
    pub merge_threshold: f32,
}

impl CompactionSettings {
    pub fn from_config(config: &VectorStoreConfig) -> Self {
        Self {
            death_threshold: config.death_threshold,
            min_retention: config.min_retention,
            merge_threshold: config.merge_threshold(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompactionOutcome {
    pub patches: Vec<Patch>,
    pub pruned: usize,
    pub merged: usize,
}

type Weighted<'a> = (f64, &'a Patch);

fn by_weight_desc(a: &Weighted<'_>, b: &Weighted<'_>) -> Ordering {
    b.0.partial_cmp(&a.0)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.1.timestamp.cmp(&a.1.timestamp))
        .then_with(|| a.1.label.cmp(&b.1.label))
}

/// Run one deterministic compaction pass.
///
/// Output is grouped by tier and ordered by effective weight, so compacting an
/// already compacted set with nothing to prune or merge returns it unchanged.
pub fn compact_patches(
    patches: &[Patch],
    settings: &CompactionSettings,
    decay: &TimeDecay,
    now: DateTime<Utc>,
) -> CompactionOutcome {
    let mut kept = Vec::with_capacity(patches.len());
    let mut pruned = 0;
    let mut merged = 0;

    for tier in Tier::ALL {
        let mut members: Vec<Weighted<'_>> = patches
            .iter()
            .filter(|p| p.tier == tier)
            .map(|p| (p.effective_weight(decay, now), p))
            .collect();
        members.sort_by(by_weight_desc);

        let floor = settings.min_retention.min(members.len());
        let before = members.len();
        let survivors: Vec<Weighted<'_>> = members
            .into_iter()
            .enumerate()
            .filter(|(rank, (weight, _))| {
                *rank < settings.min_retention || *weight >= settings.death_threshold
            })
            .map(|(_, member)| member)
            .collect();
        pruned += before - survivors.len();

        let mut clusters: Vec<Vec<Weighted<'_>>> = Vec::new();
        let mut projected = survivors.len();
        for member in survivors {
            if projected > floor {
                let target = clusters
                    .iter()
                    .enumerate()
                    .map(|(i, cluster)| (i, cosine_similarity(&cluster[0].1.vector, &member.1.vector)))
                    .filter(|(_, sim)| *sim >= settings.merge_threshold)
                    .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
                if let Some((i, _)) = target {
                    clusters[i].push(member);
                    projected -= 1;
                    merged += 1;
                    continue;
                }
            }
            clusters.push(vec![member]);
        }

        kept.extend(clusters.iter().map(|cluster| merge_cluster(cluster)));
    }

    CompactionOutcome {
        patches: kept,
        pruned,
        merged,
    }
}

fn merge_cluster(cluster: &[Weighted<'_>]) -> Patch {
    let (_, head) = cluster[0];
    if cluster.len() == 1 {
        return head.clone();
    }

    let total: f64 = cluster.iter().map(|(w, _)| w).sum();
    let share = |w: f64| {
        if total > 0.0 {
            w / total
        } else {
            1.0 / cluster.len() as f64
        }
    };

    let mut vector = vec![0.0f32; head.vector.len()];
    let mut timestamp_ms = 0.0f64;
    for &(w, patch) in cluster {
        let s = share(w);
        for (acc, x) in vector.iter_mut().zip(&patch.vector) {
            *acc += (s as f32) * x;
        }
        timestamp_ms += s * patch.timestamp.timestamp_millis() as f64;
    }
    if !normalize(&mut vector) {
        vector = head.vector.clone();
    }

    let newest = cluster
        .iter()
        .max_by_key(|(_, p)| p.timestamp)
        .map(|(_, p)| p.label.clone())
        .unwrap_or_else(|| head.label.clone());
    let timestamp =
        DateTime::from_timestamp_millis(timestamp_ms.round() as i64).unwrap_or(head.timestamp);

    Patch::new(vector, head.tier, newest, timestamp, total.min(1.0) as f32)
}
