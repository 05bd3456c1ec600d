mod common;

use common::*;
use sprout_core::auth::RoleBasedPolicy;
use sprout_core::error::SproutError;
use sprout_core::models::BatchStatus;
use sprout_core::query_builder::{SortDirection, SortField};
use sprout_core::services::{ListItems, ListRequest, ViewMode};
use sprout_core::state_machine::{Stage, TrayStatus};
use sprout_core::store::InMemoryTrayStore;
use std::sync::Arc;

fn batches(items: ListItems) -> Vec<sprout_core::models::BatchView> {
    match items {
        ListItems::Batches(batches) => batches,
        other => panic!("Expected batches, got {other:?}"),
    }
}

#[tokio::test]
async fn test_batch_listing_paginates_grouped_result() {
    let store = InMemoryTrayStore::new();
    for code in 1..=7 {
        let code = code.to_string();
        seed_batch(&store, &code, &["A1", "A2"]);
    }
    let service = allow_all_service(&store);

    let request = ListRequest {
        sort_by: Some(SortField::BatchCode),
        sort_direction: Some(SortDirection::Asc),
        page: Some(2),
        per_page: Some(5),
        ..ListRequest::default()
    };
    let response = service.list(&viewer(), &request).await.unwrap();

    assert_eq!(response.page_info.total, 7);
    assert_eq!(response.page_info.last_page, 2);
    assert!(!response.page_info.has_next_page);
    assert!(response.page_info.has_previous_page);
    assert_eq!(response.stages.len(), 6);

    let page = batches(response.items);
    let codes: Vec<&str> = page.iter().map(|batch| batch.batch_code.as_str()).collect();
    assert_eq!(codes, vec!["6", "7"]);
    assert!(page.iter().all(|batch| batch.total_trays == 2));
}

#[tokio::test]
async fn test_filters_run_before_grouping() {
    let store = InMemoryTrayStore::new();
    TrayBuilder::new("1", "A1").with_notes("Sunflower").seed(&store);
    TrayBuilder::new("1", "A2").with_notes("Pea shoots").seed(&store);
    TrayBuilder::new("2", "B1").with_notes("Pea shoots").seed(&store);
    let service = allow_all_service(&store);

    let request = ListRequest {
        search: Some("sunflower".to_string()),
        ..ListRequest::default()
    };
    let response = service.list(&viewer(), &request).await.unwrap();
    assert_eq!(response.filters.search.as_deref(), Some("sunflower"));

    let page = batches(response.items);
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].batch_code, "1");
    assert_eq!(page[0].total_trays, 1);
}

#[tokio::test]
async fn test_batch_statistics_in_listing() {
    let store = InMemoryTrayStore::new();
    TrayBuilder::new("9", "A1").at_stage(Stage::Germination).seed(&store);
    TrayBuilder::new("9", "A2").at_stage(Stage::Light).seed(&store);
    TrayBuilder::new("9", "A3").harvested().seed(&store);
    TrayBuilder::new("10", "B1").with_status(TrayStatus::Failed).seed(&store);
    TrayBuilder::new("10", "B2").seed(&store);
    let service = allow_all_service(&store);

    let request = ListRequest {
        sort_by: Some(SortField::Progress),
        ..ListRequest::default()
    };
    let page = batches(service.list(&viewer(), &request).await.unwrap().items);

    assert_eq!(page[0].batch_code, "9");
    assert_eq!(page[0].progress, 66.7);
    assert_eq!(page[0].dominant_stage, Stage::Germination);
    assert_eq!(page[0].batch_status, BatchStatus::Active);
    assert_eq!(page[1].batch_status, BatchStatus::Attention);
    assert_eq!(page[1].counts.failed, 1);
}

#[tokio::test]
async fn test_flat_mode_sorts_in_store() {
    let store = InMemoryTrayStore::new();
    TrayBuilder::new("10", "A1").seed(&store);
    TrayBuilder::new("9", "A1").seed(&store);
    TrayBuilder::new("100", "A1").seed(&store);
    TrayBuilder::new("9", "A2").deleted().seed(&store);
    let service = allow_all_service(&store);

    let request = ListRequest {
        view_mode: ViewMode::Trays,
        sort_by: Some(SortField::BatchCode),
        sort_direction: Some(SortDirection::Asc),
        ..ListRequest::default()
    };
    let response = service.list(&viewer(), &request).await.unwrap();

    assert_eq!(response.page_info.total, 3);
    match response.items {
        ListItems::Trays(trays) => {
            let codes: Vec<&str> = trays.iter().map(|tray| tray.batch_code.as_str()).collect();
            assert_eq!(codes, vec!["9", "10", "100"]);
            assert_eq!(trays[0].days_in_production, 3);
        }
        other => panic!("Expected trays, got {other:?}"),
    }
}

#[tokio::test]
async fn test_listing_requires_view_any() {
    let store = InMemoryTrayStore::new();
    let service = service_with(&store, Arc::new(RoleBasedPolicy));

    assert!(service.list(&viewer(), &ListRequest::default()).await.is_ok());

    let request = ListRequest {
        per_page: Some(500),
        ..ListRequest::default()
    };
    assert!(matches!(
        service.list(&viewer(), &request).await,
        Err(SproutError::ValidationError(_))
    ));
}

#[tokio::test]
async fn test_default_sort_is_newest_batch_first() {
    let store = InMemoryTrayStore::new();
    TrayBuilder::new("1", "A1").created_days_ago(10).seed(&store);
    TrayBuilder::new("2", "A1").created_days_ago(1).seed(&store);
    TrayBuilder::new("3", "A1").created_days_ago(5).seed(&store);
    let service = allow_all_service(&store);

    let page = batches(service.list(&viewer(), &ListRequest::default()).await.unwrap().items);
    let codes: Vec<&str> = page.iter().map(|batch| batch.batch_code.as_str()).collect();
    assert_eq!(codes, vec!["2", "3", "1"]);
}
