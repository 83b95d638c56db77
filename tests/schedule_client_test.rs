use std::time::Duration;

use runwire::adapters::scheduler::{HttpScheduler, HttpSchedulerConfig};
use runwire::domain::errors::DomainError;
use runwire::domain::ports::{RemoteScheduler, ScheduleRequest};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn scheduler(server: &MockServer) -> HttpScheduler {
    HttpScheduler::new(HttpSchedulerConfig {
        base_url: server.uri(),
        token: Some("sched-token".to_string()),
        request_timeout: Duration::from_secs(5),
        max_retry_elapsed: Duration::from_secs(2),
    })
    .unwrap()
}

fn request() -> ScheduleRequest {
    ScheduleRequest {
        destination: "https://hooks.example.com/api/triggers/abc/webhook".to_string(),
        cron: "0 14 * * *".to_string(),
        body: json!({"trigger_id": "abc", "execution_type": "agent", "agent_prompt": "hi"}),
        headers: vec![("X-Trigger-Source".to_string(), "schedule".to_string())],
        retries: 3,
        delay: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn test_create_schedule_sends_cron_and_delivery_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/v2/schedules/https:/+hooks\.example\.com/api/triggers/abc/webhook$"))
        .and(header("authorization", "Bearer sched-token"))
        .and(header("Upstash-Cron", "0 14 * * *"))
        .and(header("Upstash-Retries", "3"))
        .and(header("Upstash-Delay", "5s"))
        .and(header("Upstash-Forward-X-Trigger-Source", "schedule"))
        .and(body_json(json!({"trigger_id": "abc", "execution_type": "agent", "agent_prompt": "hi"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"scheduleId": "scd_123"})))
        .expect(1)
        .mount(&server)
        .await;

    let schedule_id = scheduler(&server).create_schedule(&request()).await.unwrap();
    assert_eq!(schedule_id, "scd_123");
}

#[tokio::test]
async fn test_create_schedule_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"scheduleId": "scd_retry"})))
        .with_priority(2)
        .mount(&server)
        .await;

    let schedule_id = scheduler(&server).create_schedule(&request()).await.unwrap();
    assert_eq!(schedule_id, "scd_retry");
}

#[tokio::test]
async fn test_create_schedule_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid cron"))
        .expect(1)
        .mount(&server)
        .await;

    let err = scheduler(&server).create_schedule(&request()).await.unwrap_err();
    match err {
        DomainError::ExternalService(message) => assert!(message.contains("invalid cron")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_delete_treats_missing_schedule_as_done() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v2/schedules/scd_gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    scheduler(&server).delete_schedule("scd_gone").await.unwrap();
}

#[tokio::test]
async fn test_get_schedule_maps_not_found_to_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/schedules/scd_live"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "scheduleId": "scd_live",
            "destination": "https://hooks.example.com/api/triggers/abc/webhook",
            "cron": "0 14 * * *",
            "isPaused": true,
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/schedules/scd_missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = scheduler(&server);
    let live = client.get_schedule("scd_live").await.unwrap().unwrap();
    assert_eq!(live.cron, "0 14 * * *");
    assert!(live.is_paused);
    assert!(client.get_schedule("scd_missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_list_schedules() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/schedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"scheduleId": "scd_1", "destination": "https://a.example.com", "cron": "* * * * *"},
            {"scheduleId": "scd_2", "destination": "https://b.example.com", "cron": "0 * * * *", "isPaused": false},
        ])))
        .mount(&server)
        .await;

    let schedules = scheduler(&server).list_schedules().await.unwrap();
    assert_eq!(schedules.len(), 2);
    assert_eq!(schedules[0].schedule_id, "scd_1");
    assert!(!schedules[0].is_paused);
    assert_eq!(schedules[1].destination, "https://b.example.com");
}
