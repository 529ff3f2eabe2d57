
use std::sync::Arc;

use common::time::DAY_MS;
use mock_store::InMemoryWatchStore;
use watch::{WatchError, WatchRegistry};

const NOW: u64 = 1_760_000_000_000;

fn registry(max: usize) -> WatchRegistry {
    WatchRegistry::with_limits(Arc::new(InMemoryWatchStore::default()), max, 5)
}

#[tokio::test]
async fn add_uses_default_duration_and_floors_at_one_day() {
    let reg = registry(10);

    let w = reg.add_watch("  Wet   Leg ", None, NOW).await.unwrap();
    assert_eq!(w.artist_key, "Wet Leg");
    assert_eq!(w.expires_at_ms, NOW + 5 * DAY_MS);

    let w = reg.add_watch("MJ Lenderman", Some(0), NOW).await.unwrap();
    assert_eq!(w.expires_at_ms, NOW + DAY_MS);
}

#[tokio::test]
async fn blank_artist_is_rejected() {
    let reg = registry(10);
    assert!(matches!(
        reg.add_watch("   ", None, NOW).await,
        Err(WatchError::EmptyArtist)
    ));
    assert!(matches!(reg.remove_watch("").await, Err(WatchError::EmptyArtist)));
}

#[tokio::test]
async fn cap_rejects_new_artists_but_allows_refresh() {
    let reg = registry(2);

    reg.add_watch("A", None, NOW).await.unwrap();
    reg.add_watch("B", None, NOW + 1).await.unwrap();

    let err = reg.add_watch("C", None, NOW + 2).await.unwrap_err();
    assert!(matches!(err, WatchError::CapacityReached { max: 2 }));
    assert_eq!(err.to_string(), "max surge artists reached (2)");

    // Refreshing an existing watch is not an add.
    let refreshed = reg.add_watch("a", Some(30), NOW + 3).await.unwrap();
    assert_eq!(refreshed.expires_at_ms, NOW + 3 + 30 * DAY_MS);

    let listed = reg.list_watches(NOW + 4).await.unwrap();
    assert_eq!(listed.len(), 2);
}

#[tokio::test]
async fn default_cap_admits_ten_artists_and_rejects_the_eleventh() {
    let reg = WatchRegistry::new(Arc::new(InMemoryWatchStore::default()));
    assert_eq!(reg.max_active(), 10);

    for i in 0..10 {
        reg.add_watch(&format!("Artist {i}"), None, NOW + i).await.unwrap();
    }

    let err = reg.add_watch("Artist 10", None, NOW + 10).await.unwrap_err();
    assert!(matches!(err, WatchError::CapacityReached { max: 10 }));

    let refreshed = reg.add_watch("artist 3", Some(7), NOW + 11).await.unwrap();
    assert_eq!(refreshed.expires_at_ms, NOW + 11 + 7 * DAY_MS);

    let listed = reg.list_watches(NOW + 12).await.unwrap();
    assert_eq!(listed.len(), 10);
    assert!(listed.iter().all(|w| w.artist_key != "Artist 10"));
}

#[tokio::test]
async fn expired_watches_free_capacity_and_drop_from_listing() {
    let reg = registry(1);

    reg.add_watch("Short", Some(1), NOW).await.unwrap();
    let later = NOW + DAY_MS;

    assert!(reg.list_watches(later).await.unwrap().is_empty());
    reg.add_watch("Next", None, later).await.unwrap();

    assert_eq!(reg.purge_expired(later).await.unwrap(), 1);
}

#[tokio::test]
async fn list_is_in_registration_order() {
    let reg = registry(10);
    reg.add_watch("Zola", None, NOW).await.unwrap();
    reg.add_watch("Alvvays", None, NOW + 10).await.unwrap();
    reg.add_watch("Mitski", None, NOW + 10).await.unwrap();

    let names: Vec<_> = reg
        .list_watches(NOW + 20)
        .await
        .unwrap()
        .into_iter()
        .map(|w| w.artist_key)
        .collect();
    assert_eq!(names, vec!["Zola", "Alvvays", "Mitski"]);
}

#[tokio::test]
async fn remove_reports_not_found() {
    let reg = registry(10);
    reg.add_watch("Yard Act", None, NOW).await.unwrap();

    reg.remove_watch("yard act").await.unwrap();
    assert!(matches!(
        reg.remove_watch("Yard Act").await,
        Err(WatchError::NotFound(a)) if a == "Yard Act"
    ));
}

#[tokio::test]
async fn store_failures_surface_as_store_errors() {
    let reg = WatchRegistry::new(Arc::new(InMemoryWatchStore::failing()));
    assert!(matches!(
        reg.add_watch("X", None, NOW).await,
        Err(WatchError::Store(_))
    ));
    assert!(matches!(reg.list_watches(NOW).await, Err(WatchError::Store(_))));
}
