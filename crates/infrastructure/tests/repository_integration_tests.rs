use std::sync::Arc;
use std::time::Duration;

use catalog_core::models::{
    CacheEntry, Calendar, CalendarEntry, Host, JobType, MetadataStats, Property, RunStats,
    SyncRun,
};
use catalog_core::traits::{
    CacheStore, CalendarRepository, HostRepository, PropertyRepository, SyncRunRepository,
};
use catalog_domain::PropertySyncSession;
use catalog_infrastructure::{
    Cache, DatabaseManager, SqliteCacheStore, SqliteCalendarRepository, SqliteHostRepository,
    SqlitePropertyRepository, SqliteSyncRunRepository,
};
use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::json;

async fn setup() -> DatabaseManager {
    DatabaseManager::in_memory().await.unwrap()
}

#[tokio::test]
async fn test_host_lifecycle() {
    let db = setup().await;
    let repo = SqliteHostRepository::new(db.pool().clone());

    let host = repo
        .create(&Host::new("atleisure", "acme-villas", json!({"api_key": "k"})))
        .await
        .unwrap();
    assert!(host.id > 0);

    let found = repo.find_by_id(host.id).await.unwrap().unwrap();
    assert_eq!(found.identifier, "acme-villas");
    assert_eq!(found.credentials, json!({"api_key": "k"}));
    assert_eq!(repo.find_all().await.unwrap().len(), 1);

    assert!(repo.delete(host.id).await.unwrap());
    assert!(!repo.delete(host.id).await.unwrap());
    assert!(repo.find_by_id(host.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_property_upsert_and_identifiers() {
    let db = setup().await;
    let repo = SqlitePropertyRepository::new(db.pool().clone());

    repo.upsert(&Property::new(1, "B", json!({"name": "Beach house"})))
        .await
        .unwrap();
    repo.upsert(&Property::new(1, "A", json!({"name": "Alpine lodge"})))
        .await
        .unwrap();
    repo.upsert(&Property::new(2, "C", json!({})))
        .await
        .unwrap();

    let updated = repo
        .upsert(&Property::new(1, "A", json!({"name": "Alpine lodge v2"})))
        .await
        .unwrap();
    assert_eq!(updated.data["name"], "Alpine lodge v2");

    assert_eq!(
        repo.all_identifiers_for_host(1).await.unwrap(),
        vec!["A".to_string(), "B".to_string()]
    );

    assert!(repo.delete(1, "B").await.unwrap());
    assert!(repo
        .find_by_host_and_identifier(1, "B")
        .await
        .unwrap()
        .is_none());
    assert!(repo
        .find_by_host_and_identifier(2, "C")
        .await
        .unwrap()
        .is_some());

    assert_eq!(repo.delete_by_host(1).await.unwrap(), 1);
    assert_eq!(repo.all_identifiers_for_host(2).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_calendar_is_replaced() {
    let db = setup().await;
    let repo = SqliteCalendarRepository::new(db.pool().clone());
    let day = NaiveDate::from_ymd_opt(2026, 11, 1).unwrap();

    repo.upsert(&Calendar::new(
        1,
        "villa-1",
        vec![
            CalendarEntry::available(day, 150.0),
            CalendarEntry::unavailable(day.succ_opt().unwrap()),
        ],
    ))
    .await
    .unwrap();
    repo.upsert(&Calendar::new(
        1,
        "villa-1",
        vec![CalendarEntry::unavailable(day)],
    ))
    .await
    .unwrap();

    let calendar = repo.find_by_property(1, "villa-1").await.unwrap().unwrap();
    assert_eq!(calendar.entries, vec![CalendarEntry::unavailable(day)]);
    assert_eq!(repo.delete_by_host(1).await.unwrap(), 1);
    assert!(repo.find_by_property(1, "villa-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_purge_only_touches_the_session_host() {
    let db = setup().await;
    let properties = Arc::new(SqlitePropertyRepository::new(db.pool().clone()));
    let calendars = Arc::new(SqliteCalendarRepository::new(db.pool().clone()));
    let runs = Arc::new(SqliteSyncRunRepository::new(db.pool().clone()));
    let day = NaiveDate::from_ymd_opt(2026, 12, 24).unwrap();

    for (host_id, id) in [(1, "A"), (1, "B"), (2, "A"), (2, "B"), (2, "Z")] {
        properties
            .upsert(&Property::new(host_id, id, json!({})))
            .await
            .unwrap();
        calendars
            .upsert(&Calendar::new(
                host_id,
                id,
                vec![CalendarEntry::available(day, 99.0)],
            ))
            .await
            .unwrap();
    }

    let mut session = PropertySyncSession::new(1, properties.clone(), calendars.clone(), runs);
    session.start("A", || async { Ok(json!({"v": 2})) }).await.unwrap();
    let run = session.finish().await.unwrap();

    assert!(run.successful);
    assert_eq!(
        properties.all_identifiers_for_host(1).await.unwrap(),
        vec!["A".to_string()]
    );
    assert!(calendars.find_by_property(1, "B").await.unwrap().is_none());
    assert!(calendars.find_by_property(1, "A").await.unwrap().is_some());

    assert_eq!(
        properties.all_identifiers_for_host(2).await.unwrap(),
        vec!["A".to_string(), "B".to_string(), "Z".to_string()]
    );
    for id in ["A", "B", "Z"] {
        assert!(calendars.find_by_property(2, id).await.unwrap().is_some());
    }
}

#[tokio::test]
async fn test_sync_run_history_is_newest_first() {
    let db = setup().await;
    let repo = SqliteSyncRunRepository::new(db.pool().clone());

    for hour in [8, 10, 9] {
        let started_at = Utc.with_ymd_and_hms(2026, 10, 16, hour, 0, 0).unwrap();
        repo.create(&SyncRun {
            id: 0,
            host_id: 1,
            job_type: JobType::Metadata,
            started_at,
            finished_at: started_at + chrono::Duration::minutes(3),
            successful: hour != 9,
            stats: RunStats::Metadata(MetadataStats {
                created: hour as u64,
                ..Default::default()
            }),
        })
        .await
        .unwrap();
    }

    let runs = repo.find_by_host(1, 2).await.unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].stats, RunStats::Metadata(MetadataStats {
        created: 10,
        ..Default::default()
    }));
    assert!(!runs[1].successful);
    assert_eq!(runs[0].duration_ms(), 180_000);
    assert!(repo.find_by_host(2, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cache_over_sqlite_store() {
    let db = setup().await;
    let store = SqliteCacheStore::new(db.pool().clone());

    store
        .put(&CacheEntry::new("catalog.regions", "[\"eu\"]".to_string()))
        .await
        .unwrap();
    assert_eq!(
        store.get("catalog.regions").await.unwrap().unwrap().value,
        "[\"eu\"]"
    );

    let cache = Cache::new(Arc::new(store), "catalog");
    let regions: Vec<String> = cache
        .fetch_json("regions", Duration::from_secs(60), || async {
            Ok(vec!["unused".to_string()])
        })
        .await
        .unwrap();
    assert_eq!(regions, vec!["eu".to_string()]);

    cache.invalidate("regions").await.unwrap();
    let regions: Vec<String> = cache
        .fetch_json("regions", Duration::from_secs(60), || async {
            Ok(vec!["us".to_string()])
        })
        .await
        .unwrap();
    assert_eq!(regions, vec!["us".to_string()]);
}
