use notecull_core::store::memory::InjectedFailure;
use notecull_core::{
    load_snapshot, save_snapshot, CacheError, CollectionSnapshot, EngineConfig, FilterSet, Item,
    ItemId, ItemReference, ItemStore, ItemType, MemoryItemStore, MutationError, MutationService,
    QueryService, SnapshotCache, WipeRequest,
};
use std::collections::BTreeMap;
use std::fs;

fn sample_items() -> Vec<Item> {
    vec![
        Item::new(ItemId::from("a"), ItemType::note())
            .with_label("first")
            .with_body("body"),
        Item::new(ItemId::from("b"), ItemType::note())
            .with_label("second")
            .tombstoned(),
    ]
}

#[test]
fn save_then_load_round_trips_collections_and_references() {
    let dir = tempfile::tempdir().unwrap();
    let items_path = dir.path().join("items.snapshot");
    let refs_path = dir.path().join("nested").join("refs.snapshot");

    let items = sample_items();
    save_snapshot(&items_path, &items).unwrap();
    assert_eq!(load_snapshot::<Vec<Item>>(&items_path).unwrap(), items);

    let refs: Vec<ItemReference> = items.iter().map(Item::reference).collect();
    save_snapshot(&refs_path, &refs).unwrap();
    assert_eq!(load_snapshot::<Vec<ItemReference>>(&refs_path).unwrap(), refs);
}

#[test]
fn round_trips_arbitrary_values() {
    let dir = tempfile::tempdir().unwrap();
    let cache = SnapshotCache::new(dir.path().join("map.snapshot"));

    let mut cursor = BTreeMap::new();
    cursor.insert("sync_token".to_string(), 42_u64);
    cache.save(&cursor).unwrap();
    assert_eq!(cache.load::<BTreeMap<String, u64>>().unwrap(), cursor);
}

#[test]
fn missing_file_is_a_miss_not_an_empty_collection() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_snapshot::<Vec<Item>>(&dir.path().join("absent")).unwrap_err();
    assert!(err.is_miss());

    let empty_path = dir.path().join("empty.snapshot");
    save_snapshot(&empty_path, &Vec::<Item>::new()).unwrap();
    assert!(load_snapshot::<Vec<Item>>(&empty_path).unwrap().is_empty());
}

#[test]
fn truncated_file_is_a_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("items.snapshot");
    save_snapshot(&path, &sample_items()).unwrap();

    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();

    let err = load_snapshot::<Vec<Item>>(&path).unwrap_err();
    assert!(matches!(err, CacheError::Decode { .. }), "got {err}");
}

#[test]
fn flipped_byte_is_a_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("items.snapshot");
    save_snapshot(&path, &sample_items()).unwrap();

    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    fs::write(&path, &bytes).unwrap();

    assert!(matches!(
        load_snapshot::<Vec<Item>>(&path),
        Err(CacheError::Decode { .. })
    ));
}

#[test]
fn foreign_file_is_a_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    fs::write(&path, "plain text that is long enough to cover the header bytes").unwrap();

    assert!(matches!(
        load_snapshot::<Vec<Item>>(&path),
        Err(CacheError::Decode { .. })
    ));
}

#[test]
fn save_overwrites_and_leaves_no_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let cache = SnapshotCache::new(dir.path().join("state.snapshot"));
    cache.save(&vec![1_u32, 2, 3]).unwrap();
    cache.save(&vec![4_u32]).unwrap();

    assert_eq!(cache.load::<Vec<u32>>().unwrap(), vec![4]);
    let names: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(names.len(), 1);
}

#[test]
fn invalidate_removes_file_and_tolerates_absence() {
    let dir = tempfile::tempdir().unwrap();
    let cache = SnapshotCache::new(dir.path().join("state.snapshot"));
    cache.invalidate().unwrap();
    cache.save(&1_u8).unwrap();
    cache.invalidate().unwrap();
    assert!(cache.load::<u8>().unwrap_err().is_miss());
}

#[test]
fn select_cached_reads_snapshot_before_fetching() {
    let dir = tempfile::tempdir().unwrap();
    let cache = SnapshotCache::new(dir.path().join("notes.snapshot"));
    let store = MemoryItemStore::new();
    for item in sample_items() {
        store.insert(item);
    }
    let query = QueryService::new(&store).with_snapshot(cache.clone());

    let first = query
        .select_cached(&ItemType::note(), &FilterSet::label_equals("first"))
        .unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(store.fetch_calls(), 1);

    let snapshot: CollectionSnapshot = cache.load().unwrap();
    assert_eq!(snapshot.item_type, ItemType::note());
    assert_eq!(snapshot.items.len(), 2);

    // Served from the snapshot; tombstones in it are still filtered.
    let second = query
        .select_cached(&ItemType::note(), &FilterSet::label_equals("second"))
        .unwrap();
    assert!(second.is_empty());
    assert_eq!(store.fetch_calls(), 1);
}

#[test]
fn select_cached_falls_back_to_store_on_corrupt_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.snapshot");
    fs::write(&path, b"NCSN garbage").unwrap();

    let store = MemoryItemStore::new();
    for item in sample_items() {
        store.insert(item);
    }
    let query = QueryService::new(&store).with_snapshot(SnapshotCache::new(&path));
    let matched = query
        .select_cached(&ItemType::note(), &FilterSet::label_equals("first"))
        .unwrap();
    assert_eq!(matched.len(), 1);
    assert_eq!(store.fetch_calls(), 1);
    assert!(load_snapshot::<CollectionSnapshot>(&path).is_ok());
}

#[test]
fn select_cached_treats_other_type_snapshot_as_miss() {
    let dir = tempfile::tempdir().unwrap();
    let cache = SnapshotCache::new(dir.path().join("notes.snapshot"));
    cache
        .save(&CollectionSnapshot {
            item_type: ItemType::tag(),
            items: Vec::new(),
        })
        .unwrap();

    let store = MemoryItemStore::new();
    for item in sample_items() {
        store.insert(item);
    }
    let query = QueryService::new(&store).with_snapshot(cache);
    let matched = query
        .select_cached(&ItemType::note(), &FilterSet::label_equals("first"))
        .unwrap();
    assert_eq!(matched.len(), 1);
    assert_eq!(store.fetch_calls(), 1);
    assert_eq!(query.store().max_batch_size(), usize::MAX);
}

#[test]
fn added_note_is_visible_to_next_cached_select() {
    let dir = tempfile::tempdir().unwrap();
    let cache = SnapshotCache::new(dir.path().join("notes.snapshot"));
    let store = MemoryItemStore::new();
    let query = QueryService::new(&store).with_snapshot(cache.clone());
    let mutation = MutationService::new(&store).with_snapshot(cache.clone());

    mutation.add_note("A", "").unwrap();
    let first = query
        .select_cached(&ItemType::note(), &FilterSet::label_equals("A"))
        .unwrap();
    assert_eq!(first.len(), 1);
    assert!(cache.path().exists());

    mutation.add_note("B", "").unwrap();
    assert!(!cache.path().exists());
    let second = query
        .select_cached(&ItemType::note(), &FilterSet::label_equals("B"))
        .unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(store.fetch_calls(), 2);
}

#[test]
fn configured_snapshot_is_cleared_by_bulk_create() {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig {
        snapshot_path: Some(dir.path().join("notes.snapshot")),
        ..EngineConfig::default()
    };
    let store = MemoryItemStore::new();
    let cache = SnapshotCache::new(dir.path().join("notes.snapshot"));
    let query = QueryService::new(&store).with_snapshot(cache.clone());
    query.refresh_snapshot(&ItemType::note()).unwrap();
    assert!(cache.path().exists());

    MutationService::with_config(&store, &config)
        .create_notes(3, 1)
        .unwrap();
    assert!(!cache.path().exists());
    assert_eq!(query.list_live(&ItemType::note()).unwrap().len(), 3);
}

#[test]
fn aborted_wipe_still_clears_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let cache = SnapshotCache::new(dir.path().join("notes.snapshot"));
    let store = MemoryItemStore::new().with_max_batch_size(2);
    let mutation = MutationService::new(&store)
        .with_parallel_submit(false)
        .with_snapshot(cache.clone());
    mutation.create_notes(4, 1).unwrap();

    let query = QueryService::new(&store).with_snapshot(cache.clone());
    query.refresh_snapshot(&ItemType::note()).unwrap();
    store.fail_submit_call(1, InjectedFailure::Cancelled);

    let err = mutation
        .wipe(&WipeRequest::new(ItemType::note()))
        .unwrap_err();
    assert!(matches!(err, MutationError::Store { committed: 2, .. }));
    assert!(cache.load::<CollectionSnapshot>().unwrap_err().is_miss());

    let live = query
        .select_cached(&ItemType::note(), &FilterSet::label_equals("note-0001"))
        .unwrap();
    assert!(live.is_empty());
}
