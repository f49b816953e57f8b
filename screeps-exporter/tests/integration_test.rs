//! Integration tests for the Screeps exporter.
//!
//! These tests verify the full flow from repository documents to the text
//! served over HTTP.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::watch;

use screeps_exporter::{
    ALL_FAMILIES, CycleError, Exporter, HttpServer, InMemoryRepository, MetricGroup, MetricSink,
    Scope,
};

fn user_documents() -> Vec<Value> {
    vec![
        json!({
            "_id": { "$oid": "5f1e2d3c4b5a697887766554" },
            "email": "alice@example.com",
            "username": "Alice",
            "rooms": ["W1N1", "W2N1"],
            "lastUsedCpu": 12.5,
            "cpu": 100,
            "gcl": 3,
            "money": 1500.25,
        }),
        json!({
            "_id": "u2",
            "email": "bob@example.com",
            "username": "Bob",
            "rooms": ["W5N5"],
            "cpu": 20,
        }),
        json!({
            "_id": "u3",
            "email": "",
            "username": "NoContact",
            "rooms": ["W9N9"],
        }),
    ]
}

fn object_documents() -> Vec<Value> {
    let alice = "5f1e2d3c4b5a697887766554";
    vec![
        json!({
            "_id": "o1", "user": alice, "room": "W1N1", "type": "spawn",
            "store": { "energy": 300 },
        }),
        json!({
            "_id": "o2", "user": alice, "room": "W1N1", "type": "extension",
            "store": { "energy": 50 },
        }),
        json!({
            "_id": "o3", "user": alice, "room": "W1N1", "type": "storage",
            "store": { "energy": 1000, "Z": 40, "O": 7 },
        }),
        json!({
            "_id": "o4", "user": alice, "room": "W1N1", "type": "creep",
            "body": [{ "type": "move" }, { "type": "work" }, { "type": "carry" }],
        }),
        json!({
            "_id": "o5", "user": alice, "room": "W2N1", "type": "creep",
            "body": [{ "type": "claim" }, { "type": "move" }],
        }),
        json!({ "_id": "o6", "user": "u2", "room": "W5N5", "type": "road" }),
        json!({
            "_id": "o7", "user": "u3", "room": "W9N9", "type": "spawn",
            "store": { "energy": 999 },
        }),
    ]
}

fn create_exporter(repository: Arc<InMemoryRepository>) -> Arc<Exporter> {
    let sink = Arc::new(MetricSink::with_families(ALL_FAMILIES.iter()));
    Arc::new(Exporter::new(repository, sink, "Unknown"))
}

fn create_repository() -> Arc<InMemoryRepository> {
    Arc::new(InMemoryRepository::from_documents(
        &user_documents(),
        &object_documents(),
    ))
}

/// Extract the value of an exact sample line, e.g. `name{labels}`.
fn sample_value(body: &str, series: &str) -> Option<f64> {
    body.lines().find_map(|line| {
        let (name, value) = line.rsplit_once(' ')?;
        if name == series {
            value.parse().ok()
        } else {
            None
        }
    })
}

#[tokio::test]
async fn test_full_flow_room_metrics() {
    let exporter = create_exporter(create_repository());

    let body = exporter
        .scrape(Scope::Only(MetricGroup::Rooms))
        .await
        .unwrap();

    assert_eq!(
        sample_value(&body, r#"screep_users_energy{userName="Alice",room="W1N1"}"#),
        Some(1350.0)
    );
    assert_eq!(
        sample_value(
            &body,
            r#"screep_users_mineral_type_count{userName="Alice",room="W1N1",type="Z"}"#
        ),
        Some(40.0)
    );
    assert_eq!(
        sample_value(
            &body,
            r#"screep_users_struct_count{userName="Alice",room="W1N1",type="extension"}"#
        ),
        Some(1.0)
    );
    assert_eq!(
        sample_value(
            &body,
            r#"screep_users_struct_count{userName="Bob",room="W5N5",type="road"}"#
        ),
        Some(1.0)
    );
    assert_eq!(
        sample_value(&body, r#"screep_users_creep_count{userName="Alice",room="W1N1"}"#),
        Some(1.0)
    );
    assert_eq!(
        sample_value(
            &body,
            r#"screep_users_creep_cost_count{userName="Alice",room="W1N1"}"#
        ),
        Some(200.0)
    );
    assert_eq!(
        sample_value(
            &body,
            r#"screep_users_creep_cost_count{userName="Alice",room="W2N1"}"#
        ),
        Some(650.0)
    );

    // Users without a contact address are never queried
    assert!(!body.contains("W9N9"));
    assert!(!body.contains("NoContact"));
}

#[tokio::test]
async fn test_full_flow_user_metrics() {
    let exporter = create_exporter(create_repository());

    let body = exporter
        .scrape(Scope::Only(MetricGroup::Users))
        .await
        .unwrap();

    assert_eq!(
        sample_value(&body, r#"screep_users_used_cpu{userName="Alice"}"#),
        Some(12.5)
    );
    assert_eq!(
        sample_value(&body, r#"screep_users_total_cpu{userName="Bob"}"#),
        Some(20.0)
    );
    assert_eq!(
        sample_value(&body, r#"screep_users_GCL{userName="Alice"}"#),
        Some(3.0)
    );
    assert_eq!(
        sample_value(&body, r#"screep_users_total_room_count{userName="Alice"}"#),
        Some(2.0)
    );
    assert_eq!(
        sample_value(&body, r#"screep_users_total_money{userName="Alice"}"#),
        Some(1500.25)
    );
    assert!(!body.contains("screep_users_energy{"));
}

#[tokio::test]
async fn test_display_names_are_escaped_in_output() {
    let repository = Arc::new(InMemoryRepository::from_documents(
        &[json!({
            "_id": "u9",
            "email": "quote@example.com",
            "username": "Al\"ice\\",
            "rooms": ["W1N1"],
        })],
        &[json!({
            "_id": "o1", "user": "u9", "room": "W1N1", "type": "spawn",
            "store": { "energy": 300 },
        })],
    ));
    let exporter = create_exporter(repository);

    let body = exporter.scrape(Scope::All).await.unwrap();

    assert_eq!(
        sample_value(&body, r#"screep_users_energy{userName="Al\"ice\\",room="W1N1"}"#),
        Some(300.0)
    );
    assert_eq!(
        sample_value(&body, r#"screep_users_total_room_count{userName="Al\"ice\\"}"#),
        Some(1.0)
    );
}

#[tokio::test]
async fn test_vanished_groups_are_dropped() {
    let repository = create_repository();
    let exporter = create_exporter(Arc::clone(&repository));
    exporter.scrape(Scope::All).await.unwrap();

    // Alice's storage and creeps are gone next tick
    repository.set_objects(
        object_documents()
            .iter()
            .take(2)
            .map(screeps_common::WorldObject::from_document)
            .collect(),
    );
    let body = exporter.scrape(Scope::All).await.unwrap();

    assert_eq!(
        sample_value(&body, r#"screep_users_energy{userName="Alice",room="W1N1"}"#),
        Some(350.0)
    );
    assert!(!body.contains(r#"screep_users_creep_count{"#));
    assert!(!body.contains(r#"type="Z""#));
    assert!(!body.contains(r#"userName="Bob",room="W5N5",type="road""#));
}

#[tokio::test]
async fn test_failed_cycle_keeps_last_published_values() {
    let repository = create_repository();
    let exporter = create_exporter(Arc::clone(&repository));
    exporter.scrape(Scope::All).await.unwrap();

    repository.set_failure(Some("server selection timeout"));
    let err = exporter.scrape(Scope::All).await.unwrap_err();
    assert!(matches!(err, CycleError::FetchUsers(_)));

    let body = exporter.render(Scope::All).unwrap();
    assert_eq!(
        sample_value(&body, r#"screep_users_energy{userName="Alice",room="W1N1"}"#),
        Some(1350.0)
    );
    assert_eq!(
        sample_value(&body, r#"screeps_exporter_cycles_total{outcome="failure"}"#),
        Some(1.0)
    );
}

#[tokio::test]
async fn test_concurrent_scrapes_agree() {
    let exporter = create_exporter(create_repository());

    let scrapes: Vec<_> = (0..8)
        .map(|_| {
            let exporter = Arc::clone(&exporter);
            tokio::spawn(async move { exporter.scrape(Scope::Only(MetricGroup::Rooms)).await })
        })
        .collect();

    for scrape in scrapes {
        let body = scrape.await.unwrap().unwrap();
        assert_eq!(
            sample_value(&body, r#"screep_users_energy{userName="Alice",room="W1N1"}"#),
            Some(1350.0)
        );
    }

    assert_eq!(exporter.stats().cycles_succeeded, 8);
}

#[tokio::test]
async fn test_http_server_serves_scrapes() {
    let exporter = create_exporter(create_repository());

    // Find an available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server = HttpServer::new(exporter, addr, "/metrics".to_string());
    let server_task = tokio::spawn(async move { server.run(shutdown_rx).await });

    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /metrics HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains("application/openmetrics-text"));
    assert!(response.contains(r#"screep_users_energy{userName="Alice",room="W1N1"} 1350"#));
    assert!(response.contains("screeps_exporter_series"));

    shutdown_tx.send(true).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), server_task)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}
