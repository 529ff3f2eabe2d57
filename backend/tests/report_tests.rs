
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use backend::error::AppError;
use backend::report::ReportService;
use demand::{CompositeScorer, Label, Provider, SelloutSignals};
use mock_store::{
    CountingProvider, FixedSource, MemSightings, MemWatches, QueuedSource, event_in, social,
    streaming, video,
};
use scheduler::{FetchError, LogNotifier, PacedSource, SchedulerConfig, SurgeScheduler};
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;
use watch::model::{CitySighting, Event, SurgeWatch};

const NOW: u64 = 1_760_000_000_000;
const DAY_MS: u64 = 86_400_000;
const PROFILE_TTL: Duration = Duration::from_secs(3_600);
const CITY_TTL: Duration = Duration::from_secs(1_800);

fn service() -> ReportService {
    ReportService::new(CompositeScorer::default(), PROFILE_TTL, CITY_TTL, 64)
}

fn sighting(city: &str, count: u32, last_seen_ms: u64) -> CitySighting {
    CitySighting {
        artist_key: "Wednesday".into(),
        city: city.into(),
        count,
        last_seen_ms,
    }
}

#[tokio::test]
async fn blank_artist_is_the_only_error() {
    let err = service().artist_report_at("   ", NOW).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidArtist));
}

#[tokio::test]
async fn absent_provider_does_not_zero_the_composite() {
    let svc = service()
        .with_provider(Arc::new(CountingProvider::new(
            Provider::Streaming,
            Some(streaming(80, 2_000_000)),
        )))
        .with_provider(Arc::new(CountingProvider::new(
            Provider::Video,
            Some(video(500_000, 70)),
        )))
        .with_provider(Arc::new(CountingProvider::new(Provider::Social, None)));

    let report = svc.artist_report_at("Fontaines D.C.", NOW).await.unwrap();

    assert!(
        report.score.value >= 65.0 && report.score.value < 85.0,
        "value {}",
        report.score.value
    );
    assert_eq!(report.score.label, Label::Headliner);
    assert_eq!(report.score.missing, vec![Provider::Social]);
    assert!(report.snapshot.social.is_none());
    assert_eq!(report.snapshot.fetched_at_ms, NOW);
}

#[tokio::test]
async fn snapshot_is_cached_for_the_profile_ttl() {
    let provider = Arc::new(CountingProvider::new(Provider::Social, Some(social(1_000_000, 12.0))));
    let svc = service().with_provider(provider.clone());

    svc.artist_report_at("Wednesday", NOW).await.unwrap();
    svc.artist_report_at("  wednesday ", NOW + 1_000).await.unwrap();
    svc.artist_report_at("Wednesday", NOW + 3_600_000).await.unwrap();
    assert_eq!(provider.calls(), 1);

    svc.artist_report_at("Wednesday", NOW + 3_600_001).await.unwrap();
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn nothing_known_falls_back_to_seed_cities() {
    let report = service().artist_report_at("Unknown Band", NOW).await.unwrap();

    assert_eq!(report.score.value, 0.0);
    assert_eq!(report.score.label, Label::Emerging);
    assert_eq!(report.cities.len(), 10);
    assert_eq!(report.cities[0].city, "New York, NY");
    assert!(report.cities[0].components.contains_key("seed"));
    assert!(report.cities.windows(2).all(|w| w[0].score > w[1].score));
    assert_eq!(report.heat.reasons, vec!["Limited data; baseline heat applied"]);
}

#[tokio::test]
async fn history_and_live_density_rank_cities() {
    let sightings = Arc::new(MemSightings::default());
    sightings
        .rows
        .lock()
        .await
        .push(sighting("Chicago, IL", 5, NOW - DAY_MS));

    let live = Arc::new(FixedSource(Ok(vec![
        event_in("Austin, TX"),
        event_in("Austin, TX"),
        event_in("Austin, TX"),
        event_in("Chicago, IL"),
    ])));

    let svc = service()
        .with_sightings(sightings)
        .with_live_events(live);

    let report = svc.artist_report_at("Wednesday", NOW).await.unwrap();
    let cities: Vec<&str> = report.cities.iter().map(|c| c.city.as_str()).collect();

    assert_eq!(cities, vec!["Chicago, IL", "Austin, TX"]);
    assert!(report.cities[0].components.contains_key("recency"));
    assert!(!report.cities[1].components.contains_key("recency"));
}

#[tokio::test]
async fn manual_boost_can_reorder_cities() {
    let sightings = Arc::new(MemSightings::default());
    sightings
        .rows
        .lock()
        .await
        .push(sighting("Chicago, IL", 5, NOW - DAY_MS));

    let svc = service()
        .with_sightings(sightings)
        .with_live_events(Arc::new(FixedSource(Ok(vec![
            event_in("Austin, TX"),
            event_in("Austin, TX"),
            event_in("Austin, TX"),
        ]))))
        .with_boosts(BTreeMap::from([("austin, tx".to_string(), 5.0)]));

    let report = svc.artist_report_at("Wednesday", NOW).await.unwrap();

    assert_eq!(report.cities[0].city, "Austin, TX");
    assert_eq!(report.cities[0].components.get("boost"), Some(&5.0));
}

#[tokio::test]
async fn city_ranking_is_cached_for_the_city_ttl() {
    let sightings = Arc::new(MemSightings::default());
    let svc = service().with_sightings(sightings.clone());

    let first = svc.artist_report_at("Wednesday", NOW).await.unwrap();
    assert!(first.cities[0].components.contains_key("seed"));

    sightings
        .rows
        .lock()
        .await
        .push(sighting("Richmond, VA", 2, NOW));

    let cached = svc.artist_report_at("Wednesday", NOW + 1_800_000).await.unwrap();
    assert_eq!(cached.cities, first.cities);

    let fresh = svc.artist_report_at("Wednesday", NOW + 1_800_001).await.unwrap();
    assert_eq!(fresh.cities.len(), 1);
    assert_eq!(fresh.cities[0].city, "Richmond, VA");
}

#[tokio::test]
#[traced_test]
async fn unavailable_sources_only_remove_their_contribution() {
    let sightings = Arc::new(MemSightings {
        down: true,
        ..MemSightings::default()
    });
    let live = Arc::new(FixedSource(Err(FetchError::Unavailable("503".into()))));

    let svc = service()
        .with_provider(Arc::new(CountingProvider::new(
            Provider::Streaming,
            Some(streaming(60, 50_000)),
        )))
        .with_sightings(sightings)
        .with_live_events(live);

    let report = svc.artist_report_at("Wednesday", NOW).await.unwrap();

    assert!(report.score.value > 0.0);
    assert!(report.cities[0].components.contains_key("seed"));
    assert!(logs_contain("city sighting history unavailable"));
    assert!(logs_contain("live ticketing density unavailable"));
}

#[tokio::test]
#[traced_test]
async fn provider_answering_for_another_kind_is_ignored() {
    let svc = service().with_provider(Arc::new(CountingProvider::new(
        Provider::Video,
        Some(streaming(90, 1_000_000)),
    )));

    let report = svc.artist_report_at("Wednesday", NOW).await.unwrap();

    assert!(report.snapshot.streaming.is_none());
    assert!(report.snapshot.video.is_none());
    assert!(logs_contain("provider returned metrics of another kind"));
}

#[test]
fn smaller_venue_sells_out_more_readily() {
    let svc = service();
    let venue = |capacity| Event {
        name: "show".into(),
        capacity: Some(capacity),
        ..Event::default()
    };

    let small = svc.sellout_probability(&venue(2_500), SelloutSignals::default());
    let large = svc.sellout_probability(&venue(20_000), SelloutSignals::default());

    assert!(small.value >= large.value + 10.0, "{} vs {}", small.value, large.value);
}

#[tokio::test]
async fn city_weight_is_blended_into_the_top_city_heat() {
    let weighted = service()
        .with_city_weights(BTreeMap::from([(" new york, ny".to_string(), 80.0)]))
        .artist_report_at("Unknown Band", NOW)
        .await
        .unwrap();

    assert_eq!(weighted.cities[0].city, "New York, NY");
    assert!((weighted.heat.score - 24.0).abs() < 1e-9, "heat {}", weighted.heat.score);
    assert_eq!(
        weighted.heat.reasons.last().map(String::as_str),
        Some("City weight 80/100 blended")
    );

    let elsewhere = service()
        .with_city_weights(BTreeMap::from([("Boise, ID".to_string(), 80.0)]))
        .artist_report_at("Unknown Band", NOW)
        .await
        .unwrap();
    assert_eq!(elsewhere.heat.score, 0.0);
}

#[test]
fn city_weight_lifts_sellout_heat_for_that_city_only() {
    let svc = service().with_city_weights(BTreeMap::from([("Austin, TX".to_string(), 100.0)]));
    let show = |city: &str| Event {
        name: "show".into(),
        city: Some(city.into()),
        ..Event::default()
    };

    let weighted = svc.sellout_probability(&show("austin, tx"), SelloutSignals::default());
    let plain = svc.sellout_probability(&show("Boise, ID"), SelloutSignals::default());

    // Heat 50 blends to 65, which moves the base by 0.45 * 15.
    assert!((weighted.value - plain.value - 6.75).abs() < 1e-9);
    assert_eq!(weighted.reasons[0], "City weight 100/100 blended");
    assert_eq!(weighted.reasons[1], "Market heat 65/100");
    assert_eq!(plain.reasons[0], "Market heat 50/100");
}

#[tokio::test]
async fn sightings_recorded_in_sqlite_feed_the_ranking() {
    use watch::store::SightingStore;
    use watch::store::sqlite_store::SqliteWatchStore;

    let url = format!("sqlite:file:{}?mode=memory&cache=shared", uuid::Uuid::new_v4());
    let store = Arc::new(SqliteWatchStore::new(&url).await.unwrap());

    store.record_sighting("Wednesday", "Asheville, NC", NOW - DAY_MS).await.unwrap();
    store.record_sighting("wednesday", "Asheville, NC", NOW).await.unwrap();
    store.record_sighting("Wednesday", "Durham, NC", NOW - 90 * DAY_MS).await.unwrap();

    let report = service()
        .with_sightings(store)
        .artist_report_at("Wednesday", NOW)
        .await
        .unwrap();

    let cities: Vec<&str> = report.cities.iter().map(|c| c.city.as_str()).collect();
    assert_eq!(cities, vec!["Asheville, NC", "Durham, NC"]);
    assert!(report.cities[0].components.contains_key("recency"));
    assert!(!report.cities[1].components.contains_key("recency"));
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn rate_limit_hit_by_a_report_delays_the_next_scheduled_fetch() {
    let upstream = Arc::new(QueuedSource::default());
    upstream
        .push(Err(FetchError::RateLimited { retry_after: None }))
        .await;

    let cfg = SchedulerConfig {
        poll_interval: Duration::from_secs(60),
        request_spacing: Duration::from_secs(1),
        max_jitter: Duration::ZERO,
        ..SchedulerConfig::default()
    };
    let paced = Arc::new(PacedSource::new(upstream.clone(), &cfg));

    let report = service()
        .with_live_events(paced.clone())
        .artist_report_at("Wednesday", NOW)
        .await
        .unwrap();
    assert!(report.cities[0].components.contains_key("seed"));
    assert!(logs_contain("upstream rate limited; backing off"));
    assert_eq!(paced.backoff_remaining(), Duration::from_secs(5));

    let watches = Arc::new(MemWatches::default());
    watches.watches.lock().await.push(SurgeWatch {
        artist_key: "Wednesday".into(),
        created_at_ms: NOW,
        expires_at_ms: NOW + DAY_MS,
    });
    let sched = SurgeScheduler::new(
        cfg,
        watches.clone(),
        watches.clone(),
        paced.clone(),
        Arc::new(LogNotifier),
    );

    let cycle = sched.run_cycle(NOW, &CancellationToken::new()).await.unwrap();
    assert_eq!(cycle.artists_polled, 1);
    assert_eq!(cycle.rate_limited, 0);

    let calls = upstream.call_times().await;
    assert_eq!(calls.len(), 2);
    assert!(calls[1].1 - calls[0].1 >= Duration::from_secs(5));
    assert_eq!(sched.backoff_remaining(), Duration::ZERO);
}
