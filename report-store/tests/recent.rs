use sqlx::PgPool;

use report_store::{resolve, MessageFilters, RawReport, ReportStore, MESSAGE_LIST_LIMIT};

fn report(game: &str, version: &str, template: &str, formatted: &str) -> RawReport {
    RawReport {
        game: game.to_string(),
        game_title: format!("{game} (title)"),
        version: version.to_string(),
        gpu: "Adreno 650".to_string(),
        gpu_full: String::new(),
        cpu: "Snapdragon 865".to_string(),
        platform: "Android".to_string(),
        message: template.to_string(),
        value: formatted.to_string(),
        config: serde_json::Map::new(),
    }
}

fn filters(status: Option<&str>) -> MessageFilters {
    MessageFilters {
        status: status.map(str::to_owned),
        ..Default::default()
    }
}

async fn mark_resolved(db: &PgPool, id_msg: i64) {
    sqlx::query("UPDATE report_messages SET status = 'resolved' WHERE id_msg = $1")
        .bind(id_msg)
        .execute(db)
        .await
        .unwrap();
}

/// Creates one row of each canonical entity and returns
/// (id_version, id_gpu, id_cpu, id_platform, id_game, id_config, id_msg_kind).
async fn seed_entities(db: &PgPool) -> (i64, i64, i64, i64, i64, i64, i64) {
    let id_version = resolve::version_id(db, "v1.17.1").await.unwrap();
    let id_gpu = resolve::gpu_id(db, "Adreno 650", "").await.unwrap();
    let id_cpu = resolve::cpu_id(db, "Snapdragon 865").await.unwrap();
    let id_platform = resolve::platform_id(db, "Android").await.unwrap();
    let id_game = resolve::game_id(db, "ULUS-10336", "Crisis Core").await.unwrap();
    let id_config = resolve::config_id(db, &serde_json::Map::new()).await.unwrap();
    let id_msg_kind = resolve::message_kind_id(db, "Unknown GE command %08x")
        .await
        .unwrap();
    (
        id_version,
        id_gpu,
        id_cpu,
        id_platform,
        id_game,
        id_config,
        id_msg_kind,
    )
}

/// Bulk-inserts `n` distinct messages (with their version rows) against
/// the seeded entities, bypassing ingestion for speed.
async fn bulk_messages(db: &PgPool, ids: (i64, i64, i64, i64, i64, i64, i64), n: i64) {
    sqlx::query(
        r#"
INSERT INTO report_messages
    (id_version, id_gpu, id_cpu, id_platform, id_game, id_config, id_msg_kind, formatted_message)
SELECT $1, $2, $3, $4, $5, $6, $7, 'bulk message ' || n
FROM generate_series(1, $8) AS n
        "#,
    )
    .bind(ids.0)
    .bind(ids.1)
    .bind(ids.2)
    .bind(ids.3)
    .bind(ids.4)
    .bind(ids.5)
    .bind(ids.6)
    .bind(n)
    .execute(db)
    .await
    .unwrap();

    sqlx::query(
        r#"
INSERT INTO report_message_versions (id_msg, id_version)
SELECT id_msg, id_version FROM report_messages
ON CONFLICT (id_msg, id_version) DO NOTHING
        "#,
    )
    .execute(db)
    .await
    .unwrap();
}

#[sqlx::test(migrations = "./migrations")]
async fn test_default_status_predicate(db: PgPool) {
    let store = ReportStore::new(db.clone(), None);

    let kept_a = store
        .ingest_report(&report("ULUS-10336", "v1.17.1", "Crash in %s", "Crash in sceGe"))
        .await
        .unwrap()
        .unwrap();
    let kept_b = store
        .ingest_report(&report("ULUS-10336", "v1.17.1", "Crash in %s", "Crash in sceIo"))
        .await
        .unwrap()
        .unwrap();
    let resolved = store
        .ingest_report(&report("ULUS-10336", "v1.17.1", "Crash in %s", "Crash in sceSas"))
        .await
        .unwrap()
        .unwrap();
    mark_resolved(&db, resolved).await;

    // Absent status: new + reoccurring only.
    let summaries = store.recent_messages(&filters(None)).await.unwrap();
    let ids: Vec<i64> = summaries.iter().map(|s| s.id_msg).collect();
    assert_eq!(ids, vec![kept_b, kept_a]);

    // "any" lifts the predicate.
    let summaries = store.recent_messages(&filters(Some("any"))).await.unwrap();
    assert_eq!(summaries.len(), 3);
    assert_eq!(summaries[0].id_msg, resolved);

    // Explicit value matches exactly.
    let summaries = store
        .recent_messages(&filters(Some("resolved")))
        .await
        .unwrap();
    let ids: Vec<i64> = summaries.iter().map(|s| s.id_msg).collect();
    assert_eq!(ids, vec![resolved]);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_unrecognized_status_falls_back_to_default_predicate(db: PgPool) {
    let store = ReportStore::new(db.clone(), None);

    let kept = store
        .ingest_report(&report("ULUS-10336", "v1.17.1", "Crash in %s", "Crash in sceGe"))
        .await
        .unwrap()
        .unwrap();
    let resolved = store
        .ingest_report(&report("ULUS-10336", "v1.17.1", "Crash in %s", "Crash in sceSas"))
        .await
        .unwrap()
        .unwrap();
    mark_resolved(&db, resolved).await;

    let bogus = store.recent_messages(&filters(Some("bogus"))).await.unwrap();
    let default = store.recent_messages(&filters(None)).await.unwrap();

    assert_eq!(bogus, default);
    assert_eq!(bogus.len(), 1);
    assert_eq!(bogus[0].id_msg, kept);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_summaries_carry_the_joined_attributes(db: PgPool) {
    let store = ReportStore::new(db.clone(), None);

    let id_msg = store
        .ingest_report(&report(
            "ULUS-10336",
            "v1.17.1",
            "Unknown GE command %08x",
            "Unknown GE command deadbeef",
        ))
        .await
        .unwrap()
        .unwrap();

    let summaries = store.recent_messages(&filters(None)).await.unwrap();
    assert_eq!(summaries.len(), 1);

    let summary = &summaries[0];
    assert_eq!(summary.id_msg, id_msg);
    assert_eq!(summary.game_title, "ULUS-10336 (title)");
    assert_eq!(summary.version, "v1.17.1");
    assert_eq!(summary.message, "Unknown GE command deadbeef");
    assert_eq!(summary.message_template, "Unknown GE command %08x");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_game_filter_returns_only_that_game(db: PgPool) {
    let store = ReportStore::new(db.clone(), None);

    let mine = store
        .ingest_report(&report("ULUS-10336", "v1.17.1", "Crash in %s", "Crash in sceGe"))
        .await
        .unwrap()
        .unwrap();
    store
        .ingest_report(&report("ULES-00151", "v1.17.1", "Crash in %s", "Crash in sceGe"))
        .await
        .unwrap()
        .unwrap();

    let id_game: i64 = sqlx::query_scalar("SELECT id_game FROM games WHERE identifier = $1")
        .bind("ULUS-10336")
        .fetch_one(&db)
        .await
        .unwrap();

    let summaries = store
        .recent_messages(&MessageFilters {
            game_id: Some(id_game),
            ..Default::default()
        })
        .await
        .unwrap();

    let ids: Vec<i64> = summaries.iter().map(|s| s.id_msg).collect();
    assert_eq!(ids, vec![mine]);
    assert!(summaries.iter().all(|s| s.id_game == id_game));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_game_filter_caps_candidates_at_100(db: PgPool) {
    let ids = seed_entities(&db).await;
    bulk_messages(&db, ids, 120).await;

    let store = ReportStore::new(db.clone(), None);
    let summaries = store
        .recent_messages(&MessageFilters {
            game_id: Some(ids.4),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(summaries.len(), MESSAGE_LIST_LIMIT);
    // Newest candidates win.
    let max_id: i64 = sqlx::query_scalar("SELECT MAX(id_msg) FROM report_messages")
        .fetch_one(&db)
        .await
        .unwrap();
    assert_eq!(summaries[0].id_msg, max_id);
    assert!(summaries.windows(2).all(|w| w[0].id_msg > w[1].id_msg));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_game_and_version_filters_combine(db: PgPool) {
    let store = ReportStore::new(db.clone(), None);

    let old = store
        .ingest_report(&report("ULUS-10336", "v1.16.0", "Crash in %s", "Crash in sceGe"))
        .await
        .unwrap()
        .unwrap();
    let new = store
        .ingest_report(&report("ULUS-10336", "v1.17.1", "Crash in %s", "Crash in sceGe"))
        .await
        .unwrap()
        .unwrap();
    assert_ne!(old, new);

    let id_game: i64 = sqlx::query_scalar("SELECT id_game FROM games WHERE identifier = $1")
        .bind("ULUS-10336")
        .fetch_one(&db)
        .await
        .unwrap();

    let summaries = store
        .recent_messages(&MessageFilters {
            game_id: Some(id_game),
            version: Some("v1.17.1".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    let ids: Vec<i64> = summaries.iter().map(|s| s.id_msg).collect();
    assert_eq!(ids, vec![new]);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_version_and_kind_filters(db: PgPool) {
    let store = ReportStore::new(db.clone(), None);

    let ge_crash = store
        .ingest_report(&report("ULUS-10336", "v1.17.1", "Unknown GE command %08x", "x"))
        .await
        .unwrap()
        .unwrap();
    let io_crash = store
        .ingest_report(&report("ULUS-10336", "v1.16.0", "sceIo error %08x", "y"))
        .await
        .unwrap()
        .unwrap();

    let summaries = store
        .recent_messages(&MessageFilters {
            version: Some("v1.17.1".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    let ids: Vec<i64> = summaries.iter().map(|s| s.id_msg).collect();
    assert_eq!(ids, vec![ge_crash]);

    let id_msg_kind: i64 =
        sqlx::query_scalar("SELECT id_msg_kind FROM report_message_kinds WHERE message = $1")
            .bind("sceIo error %08x")
            .fetch_one(&db)
            .await
            .unwrap();
    let summaries = store
        .recent_messages(&MessageFilters {
            message_kind_id: Some(id_msg_kind),
            ..Default::default()
        })
        .await
        .unwrap();
    let ids: Vec<i64> = summaries.iter().map(|s| s.id_msg).collect();
    assert_eq!(ids, vec![io_crash]);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_recency_window_hides_ids_outside_the_window(db: PgPool) {
    let ids = seed_entities(&db).await;
    bulk_messages(&db, ids, 150).await;

    // Leave a gap wider than the window, then add one fresh message.
    sqlx::query("ALTER TABLE report_messages ALTER COLUMN id_msg RESTART WITH 5000")
        .execute(&db)
        .await
        .unwrap();
    bulk_messages(&db, ids, 1).await;

    let store = ReportStore::new(db.clone(), None);

    // No filters: the window strategy only sees id > 4000.
    let summaries = store.recent_messages(&filters(None)).await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].id_msg, 5000);

    // An explicit status forces the direct strategy: the old rows are
    // back, capped at the limit.
    let summaries = store.recent_messages(&filters(Some("new"))).await.unwrap();
    assert_eq!(summaries.len(), MESSAGE_LIST_LIMIT);
    assert_eq!(summaries[0].id_msg, 5000);
    assert_eq!(summaries[1].id_msg, 150);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_version_filter_caps_at_newest_100(db: PgPool) {
    let ids = seed_entities(&db).await;
    bulk_messages(&db, ids, 120).await;

    let store = ReportStore::new(db.clone(), None);
    let summaries = store
        .recent_messages(&MessageFilters {
            version: Some("v1.17.1".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(summaries.len(), MESSAGE_LIST_LIMIT);
    let max_id: i64 = sqlx::query_scalar("SELECT MAX(id_msg) FROM report_messages")
        .fetch_one(&db)
        .await
        .unwrap();
    assert_eq!(summaries[0].id_msg, max_id);
    assert!(summaries.windows(2).all(|w| w[0].id_msg > w[1].id_msg));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_kind_summary_counts_distinct_games(db: PgPool) {
    let store = ReportStore::new(db.clone(), None);

    // Two games share a kind; one game reports it twice with different
    // formatted text (two message rows, same game/kind).
    store
        .ingest_report(&report("ULUS-10336", "v1.17.1", "Crash in %s", "Crash in sceGe"))
        .await
        .unwrap();
    store
        .ingest_report(&report("ULUS-10336", "v1.17.1", "Crash in %s", "Crash in sceIo"))
        .await
        .unwrap();
    store
        .ingest_report(&report("ULES-00151", "v1.17.1", "Crash in %s", "Crash in sceGe"))
        .await
        .unwrap();

    let kinds = store.kind_summary(&filters(None)).await.unwrap();
    assert_eq!(kinds.len(), 1);
    assert_eq!(kinds[0].message, "Crash in %s");
    assert_eq!(kinds[0].games, 2);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_kind_summary_respects_status_filter(db: PgPool) {
    let store = ReportStore::new(db.clone(), None);

    let resolved = store
        .ingest_report(&report("ULUS-10336", "v1.17.1", "Crash in %s", "Crash in sceGe"))
        .await
        .unwrap()
        .unwrap();
    store
        .ingest_report(&report("ULUS-10336", "v1.17.1", "sceIo error %08x", "y"))
        .await
        .unwrap()
        .unwrap();
    mark_resolved(&db, resolved).await;

    let kinds = store.kind_summary(&filters(None)).await.unwrap();
    assert_eq!(kinds.len(), 1);
    assert_eq!(kinds[0].message, "sceIo error %08x");

    let kinds = store.kind_summary(&filters(Some("any"))).await.unwrap();
    assert_eq!(kinds.len(), 2);

    let kinds = store.kind_summary(&filters(Some("resolved"))).await.unwrap();
    assert_eq!(kinds.len(), 1);
    assert_eq!(kinds[0].message, "Crash in %s");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_kind_summary_cap(db: PgPool) {
    let ids = seed_entities(&db).await;

    sqlx::query(
        "INSERT INTO report_message_kinds (message) SELECT 'bulk kind ' || n FROM generate_series(1, 1100) AS n",
    )
    .execute(&db)
    .await
    .unwrap();
    sqlx::query(
        r#"
INSERT INTO report_messages
    (id_version, id_gpu, id_cpu, id_platform, id_game, id_config, id_msg_kind, formatted_message)
SELECT $1, $2, $3, $4, $5, $6, mk.id_msg_kind, 'kind message ' || mk.id_msg_kind
FROM report_message_kinds AS mk
ON CONFLICT DO NOTHING
        "#,
    )
    .bind(ids.0)
    .bind(ids.1)
    .bind(ids.2)
    .bind(ids.3)
    .bind(ids.4)
    .bind(ids.5)
    .execute(&db)
    .await
    .unwrap();

    let store = ReportStore::new(db.clone(), None);
    let kinds = store.kind_summary(&filters(None)).await.unwrap();

    assert_eq!(kinds.len(), 1000);
    // Grouped by kind id descending.
    assert!(kinds.windows(2).all(|w| w[0].id_msg_kind > w[1].id_msg_kind));
}
