use std::time::Duration;

use serde_json::json;
use stridesync::auth::TokenPair;
use stridesync::form::{FieldKey, FieldValue};
use stridesync::store::{LocalStore, keys};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::harness::Harness;

#[tokio::test]
async fn first_edit_creates_session_then_pushes_diff() {
    let h = Harness::start(50).await;
    h.sign_in("access-0", "refresh-0");

    Mock::given(method("POST"))
        .and(path("/sessions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "session_id": "s-42" })))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/sessions/s-42"))
        .and(body_json(json!({
            "payload": { "email": "kim@example.com", "name": "Kim" }
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "session_id": "s-42", "completed": false })),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let mut form = h.runtime.restore_form();
    form.set_field(FieldKey::Email, FieldValue::text("kim@example.com"));
    h.runtime.autosave().record_change(form.state());
    form.set_field(FieldKey::Name, FieldValue::text("Kim"));
    h.runtime.autosave().record_change(form.state());

    tokio::time::sleep(Duration::from_millis(400)).await;

    let received = h.server.received_requests().await.unwrap();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0].method.as_str(), "POST");
    assert_eq!(received[1].method.as_str(), "PUT");
    assert_eq!(h.store.get(keys::SESSION_ID).unwrap().as_deref(), Some("s-42"));
    // Created by a signed-in user, so there is nothing to attach later.
    assert!(!h.store.flag(keys::PENDING_ATTACH).unwrap());
    h.server.verify().await;
}

#[tokio::test]
async fn offline_push_keeps_draft_and_creates_no_session() {
    let h = Harness::start(50).await;

    Mock::given(method("POST"))
        .and(path("/sessions"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&h.server)
        .await;

    let mut form = h.runtime.restore_form();
    form.set_field(FieldKey::Name, FieldValue::text("Kim"));
    h.runtime.autosave().record_change(form.state());

    assert!(!h.runtime.autosave().flush_now().await);
    assert!(h.store.get(keys::SESSION_ID).unwrap().is_none());
    assert!(!h.store.flag(keys::PENDING_ATTACH).unwrap());

    let restored = h.runtime.restore_form();
    assert_eq!(restored.answers().name.as_deref(), Some("Kim"));
}

#[tokio::test]
async fn submit_sends_completed_flag() {
    let h = Harness::start(600).await;
    h.store.set(keys::SESSION_ID, "s-5").unwrap();

    Mock::given(method("PUT"))
        .and(path("/sessions/s-5"))
        .and(body_json(json!({ "payload": { "name": "Kim" }, "completed": true })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "session_id": "s-5", "completed": true })),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let mut form = h.runtime.restore_form();
    form.set_field(FieldKey::Name, FieldValue::text("Kim"));
    let ack = h.runtime.autosave().submit(form.state()).await.unwrap();

    assert!(ack.completed);
    h.server.verify().await;
}

#[tokio::test]
async fn login_inside_quiet_period_pushes_draft_before_attach() {
    let h = Harness::start(600).await;

    Mock::given(method("POST"))
        .and(path("/sessions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "session_id": "anon-7" })))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/sessions/anon-7"))
        .and(body_json(json!({ "payload": { "name": "Kim" } })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "session_id": "anon-7", "completed": false })),
        )
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/sessions/anon-7/attach"))
        .and(header("authorization", "Bearer access-0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "profile": { "name": "Kim" },
            "questionnaire_completed": false
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let mut form = h.runtime.restore_form();
    form.set_field(FieldKey::Name, FieldValue::text("Kim"));
    h.runtime.autosave().record_change(form.state());

    let outcome = h
        .runtime
        .on_authenticated(TokenPair::new("access-0", "refresh-0"))
        .await
        .unwrap();
    assert!(outcome.is_some());

    // The canceled timer must not push again once the window closes.
    tokio::time::sleep(Duration::from_millis(800)).await;

    let received = h.server.received_requests().await.unwrap();
    let order: Vec<String> = received
        .iter()
        .map(|r| format!("{} {}", r.method, r.url.path()))
        .collect();
    assert_eq!(
        order,
        [
            "POST /sessions",
            "PUT /sessions/anon-7",
            "POST /sessions/anon-7/attach"
        ]
    );
    assert!(h.store.get(keys::SESSION_ID).unwrap().is_none());
    assert!(!h.store.flag(keys::PENDING_ATTACH).unwrap());
    h.server.verify().await;
}
