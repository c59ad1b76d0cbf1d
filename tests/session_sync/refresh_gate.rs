use std::time::Duration;

use serde_json::json;
use stridesync::ApiError;
use stridesync::form::FieldMap;
use stridesync::store::{LocalStore, keys};
use stridesync::sync::SessionGateway;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::harness::{Harness, token_body};

async fn mount_session_put(h: &Harness, valid_token: &str) {
    Mock::given(method("PUT"))
        .and(path("/sessions/s-1"))
        .and(header("authorization", format!("Bearer {valid_token}").as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "session_id": "s-1", "completed": false })),
        )
        .with_priority(1)
        .mount(&h.server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/sessions/s-1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&h.server)
        .await;
}

#[tokio::test]
async fn parallel_401s_trigger_exactly_one_refresh() {
    let h = Harness::start(600).await;
    h.sign_in("access-0", "refresh-0");
    mount_session_put(&h, "access-1").await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(body_json(json!({ "refresh_token": "refresh-0" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body(1))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let gateway = h.gateway();
    let mut payload = FieldMap::new();
    payload.insert("name".into(), json!("Kim"));

    let (a, b, c) = tokio::join!(
        gateway.update_session("s-1", &payload, None),
        gateway.update_session("s-1", &payload, None),
        gateway.update_session("s-1", &payload, None),
    );
    for result in [a, b, c] {
        assert_eq!(result.unwrap().session_id, "s-1");
    }

    assert_eq!(h.runtime.gate().access_token().as_deref(), Some("access-1"));
    assert_eq!(
        h.store.get(keys::REFRESH_TOKEN).unwrap().as_deref(),
        Some("refresh-1")
    );

    let received = h.server.received_requests().await.unwrap();
    let retried = received
        .iter()
        .filter(|r| r.method.as_str() == "PUT")
        .filter(|r| {
            r.headers
                .get("authorization")
                .is_some_and(|v| v.as_bytes() == b"Bearer access-1")
        })
        .count();
    assert_eq!(retried, 3);
    h.server.verify().await;
}

#[tokio::test]
async fn rejected_refresh_signs_out_and_surfaces_auth_expired() {
    let h = Harness::start(600).await;
    h.sign_in("access-0", "refresh-0");
    h.seed_anonymous_session("s-1");

    Mock::given(method("POST"))
        .and(path("/sessions/s-1/attach"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&h.server)
        .await;

    let err = h.runtime.attach().attach_if_pending().await.unwrap_err();

    assert!(matches!(err, ApiError::AuthExpired { .. }), "{err:?}");
    assert!(!h.runtime.gate().is_signed_in());
    assert!(h.store.get(keys::ACCESS_TOKEN).unwrap().is_none());
    assert_eq!(h.store.get(keys::SESSION_ID).unwrap().as_deref(), Some("s-1"));
    h.server.verify().await;
}

#[tokio::test]
async fn requests_carry_bearer_and_request_id() {
    let h = Harness::start(600).await;
    h.sign_in("access-7", "refresh-7");
    h.seed_anonymous_session("s-9");

    Mock::given(method("POST"))
        .and(path("/sessions/s-9/attach"))
        .and(header("authorization", "Bearer access-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "profile": { "id": 1 },
            "questionnaire_completed": false
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    assert!(h.runtime.attach().attach_if_pending().await.unwrap());

    let received = h.server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    let request_id = received[0]
        .headers
        .get("x-request-id")
        .expect("request id header")
        .to_str()
        .unwrap();
    assert_eq!(request_id.len(), 36);
}
