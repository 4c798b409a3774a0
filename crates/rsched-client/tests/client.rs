// End-to-end behaviour of SchedulerClient against a mocked scheduler
// instance, plus the webhook listener it owns.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rsched_client::{
    ClientConfig, RschedError, ScheduleRecord, ScheduleRequest, ScheduleUpdate, SchedulerClient,
    Stats, WebhookEvent, WebhookStatus,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "test-token";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Reminder {
    user: String,
    text: String,
}

fn ok(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"status": 200, "data": data}))
}

fn fail(status: u16, error: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({"status": status, "error": error}))
}

async fn mock_instance() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ok(json!("Scheduler service is running.")))
        .mount(&server)
        .await;
    server
}

async fn connect(server: &MockServer) -> SchedulerClient {
    SchedulerClient::connect(ClientConfig::new(server.uri(), TOKEN))
        .await
        .unwrap()
}

// ============================================================================
// Construction
// ============================================================================

#[tokio::test]
async fn probe_failure_envelope_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(fail(503, "Redis unavailable."))
        .mount(&server)
        .await;

    let err = SchedulerClient::connect(ClientConfig::new(server.uri(), TOKEN))
        .await
        .unwrap_err();
    match err {
        RschedError::Config(msg) => assert!(msg.contains("Redis unavailable.")),
        other => panic!("expected config error, got {other:?}"),
    }
}

#[tokio::test]
async fn probe_against_non_scheduler_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>hello</html>"))
        .mount(&server)
        .await;

    let err = SchedulerClient::connect(ClientConfig::new(server.uri(), TOKEN))
        .await
        .unwrap_err();
    assert!(matches!(err, RschedError::Config(_)));
}

#[tokio::test]
async fn trailing_slash_in_instance_url_is_ignored() {
    let server = mock_instance().await;
    Mock::given(method("GET"))
        .and(path("/schedules"))
        .respond_with(ok(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = SchedulerClient::connect(ClientConfig::new(format!("{}/", server.uri()), TOKEN))
        .await
        .unwrap();
    let all: Vec<ScheduleRecord<Value>> = client.get_all_schedules().await.unwrap();
    assert!(all.is_empty());
}

// ============================================================================
// Operations
// ============================================================================

#[tokio::test]
async fn schedule_sends_headers_and_body_and_returns_key() {
    let server = mock_instance().await;
    Mock::given(method("POST"))
        .and(path("/schedule"))
        .and(header("Authorization", TOKEN))
        .and(header("Content-Type", "application/json"))
        .and(body_json(json!({
            "webhook": "https://app.example/hook",
            "ttl": 60,
            "data": {"user": "ada", "text": "stand up"}
        })))
        .respond_with(ok(json!({"key": "rsch-ref:default:k1"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let request = ScheduleRequest::new(
        "https://app.example/hook",
        60,
        Reminder { user: "ada".into(), text: "stand up".into() },
    );
    assert_eq!(client.schedule(&request).await.unwrap(), "rsch-ref:default:k1");
}

#[tokio::test]
async fn get_schedule_decodes_typed_payload() {
    let server = mock_instance().await;
    Mock::given(method("GET"))
        .and(path("/schedule/rsch-ref:default:k1"))
        .respond_with(ok(json!({
            "info": {
                "key": "rsch-ref:default:k1",
                "ttl": 60,
                "retry": 0,
                "webhook": "https://app.example/hook",
                "expires": "2026-10-16T10:01:00Z"
            },
            "data": {"user": "ada", "text": "stand up"}
        })))
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let record: ScheduleRecord<Reminder> = client.get_schedule("rsch-ref:default:k1").await.unwrap();

    assert_eq!(record.key, "rsch-ref:default:k1");
    assert_eq!(record.ttl_secs, 60);
    assert_eq!(record.payload.user, "ada");
}

#[tokio::test]
async fn unknown_key_is_a_remote_error() {
    let server = mock_instance().await;
    Mock::given(method("GET"))
        .and(path("/schedule/missing"))
        .respond_with(fail(404, "Schedule not found."))
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let err = client.get_schedule::<Value>("missing").await.unwrap_err();
    match err {
        RschedError::Remote { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Schedule not found.");
        }
        other => panic!("expected remote error, got {other:?}"),
    }
}

#[tokio::test]
async fn update_sends_only_set_fields_and_reports_truthiness() {
    let server = mock_instance().await;
    Mock::given(method("PATCH"))
        .and(path("/schedule/k1"))
        .and(body_json(json!({"ttl": 120, "retry": 1})))
        .respond_with(ok(json!("Schedule updated successfully.")))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/schedule/k2"))
        .respond_with(ok(json!("")))
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let update: ScheduleUpdate<Value> = ScheduleUpdate::default().ttl_secs(120).retry(1);
    assert!(client.update_schedule("k1", &update).await.unwrap());
    // empty success payload reads as false
    assert!(!client.update_schedule("k2", &update).await.unwrap());
}

#[tokio::test]
async fn delete_schedule_returns_true_on_success() {
    let server = mock_instance().await;
    Mock::given(method("DELETE"))
        .and(path("/schedule/k1"))
        .respond_with(ok(json!("Schedule deleted successfully.")))
        .mount(&server)
        .await;

    let client = connect(&server).await;
    assert!(client.delete_schedule("k1").await.unwrap());
}

#[tokio::test]
async fn delete_all_twice_succeeds_both_times() {
    let server = mock_instance().await;
    Mock::given(method("DELETE"))
        .and(path("/schedules"))
        .respond_with(ok(json!("Redis database purged successfully.")))
        .expect(2)
        .mount(&server)
        .await;

    let client = connect(&server).await;
    assert!(client.delete_all_schedules().await.unwrap());
    assert!(client.delete_all_schedules().await.unwrap());
}

#[tokio::test]
async fn stats_are_renamed_not_converted() {
    let server = mock_instance().await;
    Mock::given(method("GET"))
        .and(path("/stats"))
        .respond_with(ok(json!({
            "total_redis_keys": 5,
            "cpu_usage": 12.5,
            "ram_usage": "30%",
            "ram_usage_bytes": 1048576,
            "running_schedules": 2,
            "system_uptime": "3d",
            "go_routines": 4
        })))
        .mount(&server)
        .await;

    let client = connect(&server).await;
    assert_eq!(
        client.get_stats().await.unwrap(),
        Stats {
            total_keys: 5,
            cpu_usage_percent: 12.5,
            ram_usage_percent: "30%".into(),
            ram_usage_bytes: 1_048_576,
            running_schedules: 2,
            system_uptime: "3d".into(),
            worker_count: 4,
        }
    );
}

#[tokio::test]
async fn unauthorized_body_without_error_field_is_remote() {
    let server = mock_instance().await;
    Mock::given(method("GET"))
        .and(path("/stats"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"status": 401, "data": "Unauthorized."})),
        )
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let err = client.get_stats().await.unwrap_err();
    assert!(matches!(err, RschedError::Remote { status: 401, ref message } if message == "Unauthorized."));
}

#[tokio::test]
async fn response_without_envelope_is_protocol_error() {
    let server = mock_instance().await;
    // no mock for /schedules: wiremock answers 404 with an empty body

    let client = connect(&server).await;
    let err = client.get_all_schedules::<Value>().await.unwrap_err();
    assert!(matches!(err, RschedError::Protocol(_)));
}

#[tokio::test]
async fn timeout_is_transport_error() {
    let server = mock_instance().await;
    Mock::given(method("GET"))
        .and(path("/stats"))
        .respond_with(ok(json!({})).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_millis(500))
        .build()
        .unwrap();
    let client = SchedulerClient::connect_with(ClientConfig::new(server.uri(), TOKEN), http)
        .await
        .unwrap();

    let err = client.get_stats().await.unwrap_err();
    assert!(matches!(err, RschedError::Transport(_)));
    assert!(err.is_retryable());
}

// ============================================================================
// Webhook delivery
// ============================================================================

#[tokio::test]
async fn webhook_disabled_without_port() {
    let server = mock_instance().await;
    let client = connect(&server).await;
    assert_eq!(client.webhook_status(), WebhookStatus::Disabled);
    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn webhook_delivery_reaches_subscribers_in_order() {
    let server = mock_instance().await;
    let config = ClientConfig::new(server.uri(), TOKEN)
        .with_webhook_bind("127.0.0.1")
        .with_webhook_port(0);
    let client = SchedulerClient::connect(config).await.unwrap();

    let addr = match client.webhook_status() {
        WebhookStatus::Listening(addr) => addr,
        WebhookStatus::Disabled => panic!("listener should be running"),
    };

    let seen = Arc::new(Mutex::new(Vec::<(u8, Reminder)>::new()));
    for tag in [1u8, 2] {
        let seen = Arc::clone(&seen);
        client.events().subscribe(move |ev: &WebhookEvent| {
            seen.lock().unwrap().push((tag, ev.payload_as().unwrap()));
        });
    }

    let http = reqwest::Client::new();
    let url = format!("http://{addr}/webhook");
    let mut acks = Vec::new();
    for auth in [TOKEN, "wrong"] {
        let resp = http
            .post(&url)
            .header("Authorization", auth)
            .json(&json!({"user": "ada", "text": auth}))
            .send()
            .await
            .unwrap();
        acks.push((resp.status().as_u16(), resp.json::<Value>().await.unwrap()));
    }

    assert_eq!(acks[0], acks[1]);
    let reminder = Reminder { user: "ada".into(), text: TOKEN.into() };
    assert_eq!(
        *seen.lock().unwrap(),
        vec![(1, reminder.clone()), (2, reminder)]
    );

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn direct_injection_uses_same_authentication() {
    let server = mock_instance().await;
    let client = connect(&server).await;
    let count = Arc::new(Mutex::new(0));
    let c = Arc::clone(&count);
    client.events().subscribe(move |_: &WebhookEvent| *c.lock().unwrap() += 1);

    assert!(client.on_webhook(json!({"n": 1}), TOKEN));
    assert!(!client.on_webhook(json!({"n": 2}), "nope"));
    assert_eq!(*count.lock().unwrap(), 1);
}

#[tokio::test]
async fn registries_are_per_client() {
    let server = mock_instance().await;
    let a = connect(&server).await;
    let b = connect(&server).await;

    a.events().subscribe(|_: &WebhookEvent| {});
    assert_eq!(a.events().listener_count(), 1);
    assert_eq!(b.events().listener_count(), 0);
}
