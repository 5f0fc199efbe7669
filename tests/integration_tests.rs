// Integration tests driving the backend client and the full scoring
// pipeline against a mock HTTP backend.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use refind_matcher::core::{
    Classifier, FeatureBuilder, Matcher, TypeSimilarityTable, DEFAULT_BUFFER_RADIUS_M,
    FEATURE_NAMES,
};
use refind_matcher::models::{GeoShape, Item, ItemKind, LocationSpec};
use refind_matcher::services::{BackendClient, MatcherService};
use serde_json::json;

/// Fixed-probability stand-in for the trained model.
struct ConstantClassifier {
    names: Vec<String>,
    probability: f64,
}

impl ConstantClassifier {
    fn new(probability: f64) -> Self {
        Self {
            names: FEATURE_NAMES.iter().map(|n| n.to_string()).collect(),
            probability,
        }
    }
}

impl Classifier for ConstantClassifier {
    fn feature_names(&self) -> &[String] {
        &self.names
    }

    fn predict_proba(&self, _row: &[f64]) -> f64 {
        self.probability
    }
}

fn point_location(lon: f64, lat: f64) -> LocationSpec {
    LocationSpec {
        path: Some(GeoShape {
            kind: "Point".to_string(),
            coordinates: json!([lon, lat]),
        }),
        public_transport_lines: None,
    }
}

fn trigger_item(kind: ItemKind, id: &str) -> Item {
    Item {
        kind,
        id: id.to_string(),
        type_name: "wallet".to_string(),
        subtype: None,
        color: [120, 40, 40],
        location: point_location(15.0, 50.0),
        date: Utc.with_ymd_and_hms(2023, 3, 10, 9, 0, 0).unwrap(),
    }
}

fn service(base_url: String, probability: f64) -> MatcherService {
    let backend = Arc::new(BackendClient::new(base_url, 5));
    let matcher = Arc::new(Matcher::new(
        FeatureBuilder::new(
            Arc::new(TypeSimilarityTable::default()),
            DEFAULT_BUFFER_RADIUS_M,
        ),
        Arc::new(ConstantClassifier::new(probability)),
        0.05,
    ));
    MatcherService::new(
        backend,
        matcher,
        "amqp://unused.test:5672/%2f".to_string(),
        "matcher.item_to_process".to_string(),
        1,
        1,
    )
}

fn candidate_record(id: &str, lon: f64, lat: f64) -> serde_json::Value {
    json!({
        "_id": id,
        "type": "wallet",
        "color": [120, 40, 40],
        "location": {
            "path": { "type": "Point", "coordinates": [lon, lat] }
        },
        "date": "2023-03-12T14:00:00Z"
    })
}

#[tokio::test]
async fn test_process_item_scores_and_persists_matches() {
    let mut server = mockito::Server::new_async().await;

    let found_body = json!({
        "success": true,
        "data": [
            candidate_record("found-1", 15.0, 50.0001),
            // Unresolvable geometry: skipped, not fatal
            {
                "_id": "found-broken",
                "type": "wallet",
                "color": [0, 0, 0],
                "location": { "path": { "type": "Blob", "coordinates": [] } },
                "date": "2023-03-12T14:00:00Z"
            }
        ]
    });

    let get_mock = server
        .mock("GET", "/found")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(found_body.to_string())
        .create_async()
        .await;

    let post_mock = server
        .mock("POST", "/matches/batch")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"success":true}"#)
        .create_async()
        .await;

    let service = service(server.url(), 0.8);
    let trigger = trigger_item(ItemKind::Lost, "lost-1");

    let results = service.process_item(&trigger).await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].lost_id, "lost-1");
    assert_eq!(results[0].found_id, "found-1");
    assert_eq!(results[0].match_probability, 0.8);

    get_mock.assert_async().await;
    post_mock.assert_async().await;
}

#[tokio::test]
async fn test_below_threshold_skips_persistence() {
    let mut server = mockito::Server::new_async().await;

    let found_body = json!({
        "success": true,
        "data": [candidate_record("found-1", 15.0, 50.0001)]
    });

    server
        .mock("GET", "/found")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(found_body.to_string())
        .create_async()
        .await;

    // Empty batches never reach the match store
    let post_mock = server
        .mock("POST", "/matches/batch")
        .expect(0)
        .create_async()
        .await;

    let service = service(server.url(), 0.01);
    let trigger = trigger_item(ItemKind::Lost, "lost-1");

    let results = service.process_item(&trigger).await.unwrap();

    assert!(results.is_empty());
    post_mock.assert_async().await;
}

#[tokio::test]
async fn test_found_trigger_keeps_roles_straight() {
    let mut server = mockito::Server::new_async().await;

    let lost_body = json!({
        "success": true,
        "data": [candidate_record("lost-7", 15.0, 50.0001)]
    });

    server
        .mock("GET", "/lost")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(lost_body.to_string())
        .create_async()
        .await;

    server
        .mock("POST", "/matches/batch")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"success":true}"#)
        .create_async()
        .await;

    let service = service(server.url(), 0.9);
    let trigger = trigger_item(ItemKind::Found, "found-9");

    let results = service.process_item(&trigger).await.unwrap();

    assert_eq!(results.len(), 1);
    // The lost-typed record is always the lost side, whichever one triggered
    assert_eq!(results[0].lost_id, "lost-7");
    assert_eq!(results[0].found_id, "found-9");
}

#[tokio::test]
async fn test_store_refusal_fails_the_pass() {
    let mut server = mockito::Server::new_async().await;

    server
        .mock("GET", "/found")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"success":false,"data":[]}"#)
        .create_async()
        .await;

    let service = service(server.url(), 0.8);
    let trigger = trigger_item(ItemKind::Lost, "lost-1");

    assert!(service.process_item(&trigger).await.is_err());
}

#[tokio::test]
async fn test_fetch_items_drops_malformed_records() {
    let mut server = mockito::Server::new_async().await;

    let body = json!({
        "success": true,
        "data": [
            candidate_record("found-1", 15.0, 50.0),
            // Missing color and date: dropped, not fatal
            { "_id": "found-2", "type": "umbrella" }
        ]
    });

    server
        .mock("GET", "/found")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await;

    let client = BackendClient::new(server.url(), 5);
    let items = client.fetch_items(ItemKind::Found).await.unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, "found-1");
    assert_eq!(items[0].kind, ItemKind::Found);
}

#[tokio::test]
async fn test_fetch_types() {
    let mut server = mockito::Server::new_async().await;

    server
        .mock("GET", "/config/types")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"success":true,"data":["wallet","keys","umbrella"]}"#)
        .create_async()
        .await;

    let client = BackendClient::new(server.url(), 5);
    let types = client.fetch_types().await.unwrap();

    assert_eq!(types, vec!["wallet", "keys", "umbrella"]);
}

#[tokio::test]
async fn test_save_matches_serializes_wire_names() {
    let mut server = mockito::Server::new_async().await;

    let post_mock = server
        .mock("POST", "/matches/batch")
        .match_body(mockito::Matcher::PartialJson(json!([
            {
                "lostId": "lost-1",
                "foundId": "found-1",
                "matchProbability": 0.42
            }
        ])))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"success":true}"#)
        .create_async()
        .await;

    let client = BackendClient::new(server.url(), 5);
    let matches = vec![refind_matcher::models::MatchResult {
        lost_id: "lost-1".to_string(),
        found_id: "found-1".to_string(),
        match_probability: 0.42,
    }];

    client.save_matches(&matches).await.unwrap();
    post_mock.assert_async().await;
}
