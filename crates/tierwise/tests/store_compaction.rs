mod common;

use chrono::{Duration, Utc};
use common::{one_hot, store_config};
use tierwise_core::{Patch, Tier};
use tierwise_store::PatchStore;
use tierwise_vector::TimeDecay;

const DIM: usize = 128;

/// 100 patches: 60 long dead (30 per tier), 2 live flagship, 38 live
/// lightweight of which 4 share one vector
fn hundred_patches() -> Vec<Patch> {
    let now = Utc::now();
    let mut patches = Vec::new();
    let mut next = 0;
    let fresh = |tier: Tier, age: Duration, index: usize, label: String| {
        Patch::new(one_hot(DIM, index), tier, label, now - age, 1.0)
    };

    for i in 0..60 {
        let tier = if i % 2 == 0 { Tier::Flagship } else { Tier::Lightweight };
        let age = Duration::days(120) + Duration::hours(i as i64);
        patches.push(fresh(tier, age, next, format!("dead-{}", i)));
        next += 1;
    }
    for i in 0..2 {
        patches.push(fresh(Tier::Flagship, Duration::minutes(i), next, format!("live-f{}", i)));
        next += 1;
    }
    for i in 0..34 {
        patches.push(fresh(Tier::Lightweight, Duration::minutes(i), next, format!("live-l{}", i)));
        next += 1;
    }
    for i in 0..4 {
        patches.push(fresh(Tier::Lightweight, Duration::minutes(i), next, format!("dup-{}", i)));
    }
    patches
}

#[test]
fn test_compaction_of_hundred_patches() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = store_config(dir.path(), DIM);

    config.compaction_threshold = 10_000;
    let store = PatchStore::open(config.clone(), TimeDecay::new(14.0));
    for patch in hundred_patches() {
        store.append(patch).unwrap();
    }
    assert_eq!(store.len(), 100);
    drop(store);

    config.compaction_threshold = 50;
    config.min_retention = 5;
    let store = PatchStore::open(config, TimeDecay::new(14.0));
    let result = store.compact().unwrap().unwrap();

    assert_eq!(result.before_count, 100);
    assert!(result.after_count >= 10);
    assert_eq!(result.before_count - result.after_count, result.deleted_count);
    assert_eq!(result.merged_count, 3);
    assert_eq!(result.after_count, 40);

    let patches = store.snapshot();
    let flagship = patches.iter().filter(|p| p.tier == Tier::Flagship).count();
    assert_eq!(flagship, 5, "retention floor keeps the best dead flagship patches");
    assert!(store.last_compaction().is_some());

    // Compacted file reopens to the same set
    let reopened = PatchStore::open(store.config().clone(), *store.decay());
    assert_eq!(*reopened.snapshot(), *patches);
}

#[test]
fn test_append_triggers_compaction() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = store_config(dir.path(), DIM);
    config.compaction_threshold = 20;
    config.min_retention = 2;
    let store = PatchStore::open(config, TimeDecay::new(14.0));
    let now = Utc::now();

    // Twenty near-identical live patches collapse once the threshold is hit
    for i in 0..20 {
        let patch = Patch::new(one_hot(DIM, 0), Tier::Flagship, format!("same-{}", i), now, 0.5);
        store.append(patch).unwrap();
    }

    assert!(store.last_compaction().is_some());
    assert_eq!(store.len(), 2);
    assert!(!store.is_compacting());
}

#[test]
fn test_reopen_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let config = store_config(dir.path(), DIM);
    let now = Utc::now();
    let written = vec![
        Patch::new(one_hot(DIM, 1), Tier::Flagship, "proof", now, 1.0),
        Patch::new(one_hot(DIM, 2), Tier::Lightweight, "weather", now - Duration::days(2), 0.25),
        Patch::new(one_hot(DIM, 3), Tier::Lightweight, "ünïcødé", now, 0.5),
    ];

    let store = PatchStore::open(config.clone(), TimeDecay::default());
    for patch in &written {
        store.append(patch.clone()).unwrap();
    }
    drop(store);

    let reopened = PatchStore::open(config, TimeDecay::default());
    assert_eq!(*reopened.snapshot(), written);
}

#[test]
fn test_garbage_file_is_replaced_on_append() {
    let dir = tempfile::tempdir().unwrap();
    let config = store_config(dir.path(), DIM);
    let garbage: Vec<u8> = (0..4096u32).map(|i| (i.wrapping_mul(2654435761) >> 13) as u8).collect();
    std::fs::write(&config.data_file_path, garbage).unwrap();

    let store = PatchStore::open(config.clone(), TimeDecay::default());
    assert!(store.is_empty());
    store
        .append(Patch::new(one_hot(DIM, 7), Tier::Flagship, "fresh", Utc::now(), 1.0))
        .unwrap();

    let reopened = PatchStore::open(config, TimeDecay::default());
    assert_eq!(reopened.len(), 1);
    assert_eq!(reopened.snapshot()[0].label, "fresh");
}
