//! Port table behaviour under contention and misuse.

#![allow(clippy::expect_used)]

use std::collections::HashSet;
use std::sync::Arc;

use arena_orchestrator::application::ports::PortTable;
use arena_orchestrator::infra::InMemoryStore;
use proptest::prelude::*;

fn store(size: u16) -> Arc<InMemoryStore> {
    Arc::new(InMemoryStore::new(28015..=28015 + size - 1, Vec::new()))
}

async fn reserve_concurrently(store: &Arc<InMemoryStore>, callers: usize) -> Vec<Option<u16>> {
    let handles: Vec<_> = (0..callers)
        .map(|_| {
            let store = Arc::clone(store);
            tokio::spawn(async move { store.reserve().await.expect("reserve") })
        })
        .collect();
    let mut out = Vec::with_capacity(callers);
    for handle in handles {
        out.push(handle.await.expect("join"));
    }
    out
}

proptest! {
    /// concurrent callers never share a port, and extra callers get nothing
    #[test]
    fn prop_concurrent_reserves_are_distinct(size in 1u16..12, callers in 1usize..20) {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .expect("runtime");
        let results = rt.block_on(async {
            let store = store(size);
            reserve_concurrently(&store, callers).await
        });

        let granted: Vec<u16> = results.iter().flatten().copied().collect();
        let unique: HashSet<u16> = granted.iter().copied().collect();
        prop_assert_eq!(unique.len(), granted.len());
        prop_assert_eq!(granted.len(), callers.min(usize::from(size)));
        prop_assert!(granted.iter().all(|p| (28015..28015 + size).contains(p)));
    }
}

#[tokio::test]
async fn refused_occupy_changes_nothing() {
    let store = store(2);
    assert!(store.occupy(28015, "srv1").await.expect("occupy"));
    let before = store.list().await.expect("list");

    assert!(!store.occupy(28015, "srv2").await.expect("port taken"));
    assert!(!store.occupy(28016, "srv1").await.expect("name bound"));
    assert!(!store.occupy(30000, "srv3").await.expect("outside range"));

    assert_eq!(store.list().await.expect("list"), before);
}

#[tokio::test]
async fn second_release_reports_nothing_freed() {
    let store = store(1);
    assert!(store.occupy(28015, "srv1").await.expect("occupy"));

    assert!(store.release("srv1").await.expect("release"));
    assert!(!store.release("srv1").await.expect("release again"));
    assert!(!store.release_by_number(28015).await.expect("by number"));
    assert_eq!(store.reserve().await.expect("reserve"), Some(28015));
}

#[tokio::test]
async fn freed_port_is_handed_out_again() {
    let store = store(1);
    let port = store.reserve().await.expect("reserve").expect("free");
    assert_eq!(store.reserve().await.expect("reserve"), None);

    assert!(store.release_by_number(port).await.expect("release"));
    assert_eq!(store.reserve().await.expect("reserve"), Some(port));
}
