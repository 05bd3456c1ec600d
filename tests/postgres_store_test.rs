//! PostgreSQL store tests. Run with a database available:
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/sprout_test cargo test --test postgres_store_test -- --ignored
//! ```

use chrono::Utc;
use sprout_core::auth::{Actor, AllowAll, Role};
use sprout_core::config::SproutConfig;
use sprout_core::models::{NewTray, QualityGrade};
use sprout_core::query_builder::{Pagination, SortDirection, SortField, TraySort};
use sprout_core::services::{CreateBatchRequest, TrayService, TrayUpdate};
use sprout_core::state_machine::Stage;
use sprout_core::store::{PgTrayStore, TrayFilter, TrayStore};
use sqlx::PgPool;
use std::sync::Arc;

fn new_tray(batch_code: &str, label: &str) -> NewTray {
    NewTray {
        batch_code: batch_code.to_string(),
        tray_label: label.to_string(),
        tray_number: "01".to_string(),
        location: format!("Rack1 - {label}"),
        position_x: 1,
        position_y: 1,
        notes: Some(format!("Tray {label}")),
        planted_at: Utc::now(),
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires PostgreSQL"]
async fn test_insert_lock_and_soft_delete(pool: PgPool) -> sqlx::Result<()> {
    let store = PgTrayStore::new(pool);

    let mut tx = store.begin().await.unwrap();
    let first = tx.insert_tray(new_tray("1", "A1")).await.unwrap();
    let second = tx.insert_tray(new_tray("1", "A2")).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let locked = tx.lock_batches(&["1".to_string()]).await.unwrap();
    assert_eq!(locked.len(), 2);
    tx.soft_delete(first.id, Utc::now()).await.unwrap();
    assert!(tx.soft_delete(first.id, Utc::now()).await.is_err());
    tx.commit().await.unwrap();

    assert_eq!(store.find(first.id).await.unwrap(), None);
    assert_eq!(store.find(second.id).await.unwrap().unwrap().tray_label, "A2");
    assert_eq!(store.find_many(&[first.id], true).await.unwrap().len(), 1);
    assert_eq!(store.all_batch_codes().await.unwrap(), vec!["1".to_string()]);
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires PostgreSQL"]
async fn test_failed_item_does_not_poison_transaction(pool: PgPool) -> sqlx::Result<()> {
    let store = PgTrayStore::new(pool);
    let mut tx = store.begin().await.unwrap();
    let tray = tx.insert_tray(new_tray("3", "A1")).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    assert!(tx.soft_delete(99_999, Utc::now()).await.is_err());
    tx.soft_delete(tray.id, Utc::now()).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(store.find(tray.id).await.unwrap(), None);
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires PostgreSQL"]
async fn test_page_orders_codes_numerically(pool: PgPool) -> sqlx::Result<()> {
    let store = PgTrayStore::new(pool);
    let mut tx = store.begin().await.unwrap();
    for code in ["10", "9", "100", "LEGACY"] {
        tx.insert_tray(new_tray(code, "A1")).await.unwrap();
    }
    tx.commit().await.unwrap();

    let sort = TraySort::new(SortField::BatchCode, SortDirection::Asc);
    let (page, total) = store
        .page(&TrayFilter::live(), &sort, &Pagination::new(1, 3))
        .await
        .unwrap();
    assert_eq!(total, 4);
    let codes: Vec<&str> = page.iter().map(|tray| tray.batch_code.as_str()).collect();
    assert_eq!(codes, vec!["9", "10", "100"]);

    let search = TrayFilter {
        search: Some("legacy".to_string()),
        ..TrayFilter::default()
    };
    assert_eq!(store.list(&search).await.unwrap().len(), 1);
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires PostgreSQL"]
async fn test_service_round_trip(pool: PgPool) -> sqlx::Result<()> {
    let service = TrayService::new(
        Arc::new(PgTrayStore::new(pool)),
        Arc::new(AllowAll),
        SproutConfig::default(),
    );
    let actor = Actor::new(1, "morgan", Role::Manager);

    let request = CreateBatchRequest {
        tray_labels: vec!["A1".into(), "A2".into(), "A3".into()],
        location_prefix: "Rack1".into(),
        notes: None,
    };
    let created = service.create_batch(&actor, &request).await.unwrap();
    assert_eq!(created.batch_code, "1");

    let summary = service
        .advance_batches(&actor, &[created.batch_code.clone()])
        .await
        .unwrap();
    assert_eq!(summary.batches_processed, 1);
    assert_eq!(summary.succeeded, 3);
    assert!(summary.verification.unwrap().passed());

    let detail = service.tray_detail(&actor, created.trays[0].id).await.unwrap();
    assert_eq!(detail.tray.stage, Stage::Germination);

    service
        .delete_batches(&actor, &[created.batch_code])
        .await
        .unwrap();
    assert_eq!(service.next_batch_code(&actor).await.unwrap(), "2");
    Ok(())
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires PostgreSQL"]
async fn test_update_and_delete_one(pool: PgPool) -> sqlx::Result<()> {
    let service = TrayService::new(
        Arc::new(PgTrayStore::new(pool)),
        Arc::new(AllowAll),
        SproutConfig::default(),
    );
    let actor = Actor::new(1, "morgan", Role::Manager);
    let request = CreateBatchRequest {
        tray_labels: vec!["A1".into(), "A2".into()],
        location_prefix: "Rack1".into(),
        notes: None,
    };
    let created = service.create_batch(&actor, &request).await.unwrap();

    let update = TrayUpdate {
        location: Some("Rack2 - A1".into()),
        harvested_weight_grams: Some(412.5),
        yield_percentage: Some(88.0),
        quality_grade: Some(QualityGrade::A),
        ..TrayUpdate::default()
    };
    let saved = service
        .update_tray(&actor, created.trays[0].id, &update)
        .await
        .unwrap();
    assert_eq!(saved.location, "Rack2 - A1");
    assert_eq!(saved.harvested_weight_grams, Some(412.5));
    assert_eq!(saved.quality_grade, Some(QualityGrade::A));

    let deleted = service.delete_one(&actor, created.trays[1].id).await.unwrap();
    assert!(deleted.deleted_at.is_some());
    assert!(service.tray_detail(&actor, created.trays[1].id).await.is_err());
    Ok(())
}
