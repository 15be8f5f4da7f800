//! TTL and merge semantics for the in-process session memory store.
//!
//! Time-dependent cases run under tokio's paused clock so they complete
//! instantly and deterministically.

use std::time::Duration;

use voxfab_core::SessionMemory;
use voxfab_core::ports::memory::MemoryStore;
use voxfab_memory::InMemoryStore;

fn patch(field: &str, value: &str) -> SessionMemory {
    let mut memory = SessionMemory::default();
    match field {
        "account" => memory.account = Some(value.into()),
        "sortCode" => memory.sort_code = Some(value.into()),
        "userIntent" => memory.user_intent = Some(value.into()),
        other => {
            memory.extra.insert(other.into(), value.into());
        }
    }
    memory
}

#[tokio::test(start_paused = true)]
async fn entries_expire_after_idle_ttl() {
    let store = InMemoryStore::new(Duration::from_secs(60));
    store.put("s-1", patch("account", "12345678")).await.unwrap();

    tokio::time::advance(Duration::from_secs(59)).await;
    assert!(!store.get("s-1").await.unwrap().is_empty());

    tokio::time::advance(Duration::from_secs(2)).await;
    assert!(store.get("s-1").await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn touch_resets_the_ttl() {
    let store = InMemoryStore::new(Duration::from_secs(60));
    store.put("s-1", patch("account", "12345678")).await.unwrap();

    tokio::time::advance(Duration::from_secs(50)).await;
    store.touch("s-1").await.unwrap();

    // Would have expired at t=60 without the touch.
    tokio::time::advance(Duration::from_secs(30)).await;
    assert!(!store.get("s-1").await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn writes_reset_the_ttl() {
    let store = InMemoryStore::new(Duration::from_secs(60));
    store.put("s-1", patch("account", "12345678")).await.unwrap();

    tokio::time::advance(Duration::from_secs(45)).await;
    store.put("s-1", patch("sortCode", "112233")).await.unwrap();

    tokio::time::advance(Duration::from_secs(45)).await;
    let memory = store.get("s-1").await.unwrap();
    assert_eq!(memory.account.as_deref(), Some("12345678"));
    assert_eq!(memory.sort_code.as_deref(), Some("112233"));
}

#[tokio::test]
async fn disjoint_patches_are_order_equivalent() {
    // put(P1); put(P2) must be observationally equivalent to put(merge(P1, P2))
    // when the patches touch disjoint keys.
    let p1 = patch("account", "12345678");
    let p2 = patch("userIntent", "balance");

    let sequential = InMemoryStore::with_defaults();
    sequential.put("s", p1.clone()).await.unwrap();
    sequential.put("s", p2.clone()).await.unwrap();

    let combined = InMemoryStore::with_defaults();
    combined.put("s", p1.merged(p2)).await.unwrap();

    assert_eq!(
        sequential.get("s").await.unwrap(),
        combined.get("s").await.unwrap()
    );
}

#[tokio::test]
async fn sessions_are_isolated() {
    let store = InMemoryStore::with_defaults();
    store.put("s-1", patch("account", "12345678")).await.unwrap();
    store.put("s-2", patch("account", "87654321")).await.unwrap();
    store.delete("s-1").await.unwrap();

    assert!(store.get("s-1").await.unwrap().is_empty());
    assert_eq!(
        store.get("s-2").await.unwrap().account.as_deref(),
        Some("87654321")
    );
}
