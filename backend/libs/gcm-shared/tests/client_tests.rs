/// HTTP-level tests for the gateway client against a mock gateway
use std::time::Duration;

use gcm_shared::{GcmClient, GcmError};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> GcmClient {
    GcmClient::new("test-key")
        .with_endpoint(format!("{}/send", server.uri()))
        .with_initial_backoff(Duration::from_millis(1))
}

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[tokio::test]
async fn test_ping_sends_api_key_and_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .and(header("Authorization", "key=test-key"))
        .and(body_json(json!({
            "registration_ids": ["device-a"],
            "data": {"message": "ping"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "multicast_id": 1,
            "success": 1,
            "failure": 0,
            "canonical_ids": 0,
            "results": [{"message_id": "0:1"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = client_for(&server)
        .send_ping(&ids(&["device-a"]))
        .await
        .unwrap();

    assert_eq!(result.success_count, 1);
    assert_eq!(result.failure_count, 0);
    assert_eq!(result.attempts, 1);
}

#[tokio::test]
async fn test_ping_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": 1,
            "results": [{"message_id": "0:2"}]
        })))
        .mount(&server)
        .await;

    let result = client_for(&server)
        .send_ping(&ids(&["device-a"]))
        .await
        .unwrap();

    assert_eq!(result.success_count, 1);
    assert_eq!(result.attempts, 2);
}

#[tokio::test]
async fn test_ping_gives_up_after_retry_budget() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let result = client_for(&server).send_ping(&ids(&["device-a"])).await;

    match result {
        Err(GcmError::RetriesExhausted { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("expected RetriesExhausted, got {:?}", other),
    }
}

#[tokio::test]
async fn test_ping_does_not_retry_client_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let result = client_for(&server).send_ping(&ids(&["device-a"])).await;
    assert!(matches!(result, Err(GcmError::Unauthorized)));
}

#[tokio::test]
async fn test_ping_resends_only_unavailable_devices() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": 1,
            "failure": 2,
            "results": [
                {"message_id": "0:1"},
                {"error": "Unavailable"},
                {"error": "NotRegistered"}
            ]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_json(json!({
            "registration_ids": ["device-b"],
            "data": {"message": "ping"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": 1,
            "results": [{"message_id": "0:3", "registration_id": "device-b2"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = client_for(&server)
        .send_ping(&ids(&["device-a", "device-b", "device-c"]))
        .await
        .unwrap();

    assert_eq!(result.success_count, 2);
    assert_eq!(result.failure_count, 1);
    assert_eq!(
        result.failed,
        vec![("device-c".to_string(), "NotRegistered".to_string())]
    );
    assert_eq!(
        result.canonical_ids,
        vec![("device-b".to_string(), "device-b2".to_string())]
    );
    assert_eq!(result.attempts, 2);
}
