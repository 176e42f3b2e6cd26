//! Key enumeration across store paging behaviors.

use proptest::prelude::*;
use routelog_core::{CoreError, Pager, PagerConfig};
use routelog_storage::InMemoryKvStore;
use routelog_testkit::prelude::*;
use std::collections::{BTreeSet, HashSet};

fn store_of(keys: &BTreeSet<String>, page_limit: usize) -> InMemoryKvStore {
    InMemoryKvStore::with_entries(keys.iter().map(|k| (k.clone(), "v".to_string())))
        .with_page_limit(page_limit)
}

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(f)
}

#[tokio::test]
async fn cursor_only_store_is_fully_listed() {
    let keys: BTreeSet<String> = (0..50).map(|i| format!("user:{i:03}")).collect();
    let kv = QuirkyPagingKv::new(store_of(&keys, 1000), PagingQuirk::CursorOnly);

    let listed = Pager::new(&kv, PagerConfig::new().with_page_size(7))
        .collect_keys("user:")
        .await
        .unwrap();
    assert_eq!(listed.len(), 50);
    assert_eq!(kv.list_calls(), 8);
}

#[tokio::test]
async fn flag_only_store_is_fully_listed() {
    let keys: BTreeSet<String> = (0..50).map(|i| format!("user:{i:03}")).collect();
    let kv = QuirkyPagingKv::new(store_of(&keys, 1000), PagingQuirk::FlagOnly);

    let listed = Pager::new(&kv, PagerConfig::new().with_page_size(10))
        .collect_keys("user:")
        .await
        .unwrap();
    assert_eq!(listed.len(), 50);
    assert_eq!(kv.list_calls(), 5);
}

#[tokio::test]
async fn overlapping_pages_are_deduplicated() {
    let keys: BTreeSet<String> = (0..20).map(|i| format!("k:{i:02}")).collect();
    let kv = QuirkyPagingKv::new(store_of(&keys, 1000), PagingQuirk::Overlapping);

    let listed = Pager::new(&kv, PagerConfig::new().with_page_size(3))
        .collect_keys("k:")
        .await
        .unwrap();
    let unique: HashSet<&String> = listed.iter().collect();
    assert_eq!(listed.len(), 20);
    assert_eq!(unique.len(), 20);
}

#[tokio::test]
async fn stuck_cursor_is_reported() {
    let keys: BTreeSet<String> = (0..20).map(|i| format!("k:{i:02}")).collect();
    let kv = QuirkyPagingKv::new(store_of(&keys, 1000), PagingQuirk::StuckCursor);

    let err = Pager::new(&kv, PagerConfig::new().with_page_size(3))
        .collect_keys("k:")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::CursorStalled { .. }));
    assert_eq!(kv.list_calls(), 2);
}

#[tokio::test]
async fn cycling_cursor_terminates_with_default_config() {
    let keys: BTreeSet<String> = (0..20).map(|i| format!("k:{i:02}")).collect();
    let kv = QuirkyPagingKv::new(store_of(&keys, 3), PagingQuirk::CyclingCursor);

    let result = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        Pager::new(&kv, PagerConfig::default()).collect_keys("k:"),
    )
    .await
    .expect("pager must terminate");
    assert!(matches!(result, Err(CoreError::CursorStalled { .. })));
    assert_eq!(kv.list_calls(), 7);
}

#[tokio::test]
async fn store_page_limit_is_respected() {
    // The store serves at most 4 keys per call whatever the pager asks for.
    let keys: BTreeSet<String> = (0..10).map(|i| format!("k:{i}")).collect();
    let kv = QuirkyPagingKv::new(store_of(&keys, 4), PagingQuirk::CursorOnly);

    let listed = Pager::new(&kv, PagerConfig::new()).collect_keys("").await.unwrap();
    assert_eq!(listed.len(), 10);
    assert_eq!(kv.list_calls(), 3);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn every_key_exactly_once(keys in key_set_strategy(120), page_size in page_size_strategy()) {
        let kv = store_of(&keys, 1000);
        let listed = block_on(Pager::new(&kv, PagerConfig::new().with_page_size(page_size)).collect_keys(""))
            .unwrap();
        let expected: Vec<String> = keys.iter().cloned().collect();
        prop_assert_eq!(listed, expected);
    }

    #[test]
    fn prefix_listing_matches_filter(keys in key_set_strategy(80), page_size in page_size_strategy()) {
        let kv = QuirkyPagingKv::new(store_of(&keys, 1000), PagingQuirk::Overlapping);
        let listed = block_on(Pager::new(&kv, PagerConfig::new().with_page_size(page_size)).collect_keys("user:"))
            .unwrap();
        let expected: Vec<String> = keys.iter().filter(|k| k.starts_with("user:")).cloned().collect();
        prop_assert_eq!(listed, expected);
    }

    #[test]
    fn ceiling_never_truncates(keys in key_set_strategy(60), page_size in 1usize..10, max_pages in 1usize..10) {
        let kv = store_of(&keys, 1000);
        let pager = Pager::new(&kv, PagerConfig::new().with_page_size(page_size).with_max_pages(max_pages));
        match block_on(pager.collect_keys("")) {
            Ok(listed) => {
                prop_assert!(keys.len() <= page_size * max_pages);
                prop_assert_eq!(listed.len(), keys.len());
            }
            Err(CoreError::PaginationLimit { .. }) => prop_assert!(keys.len() > page_size * max_pages),
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }
}
