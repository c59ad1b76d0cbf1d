use serde_json::json;
use stridesync::auth::TokenPair;
use stridesync::store::{LocalStore, keys};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::harness::{Harness, token_body};

#[tokio::test]
async fn login_attaches_once_and_clears_local_state() {
    let h = Harness::start(600).await;
    h.seed_anonymous_session("anon-1");

    Mock::given(method("POST"))
        .and(path("/sessions/anon-1/attach"))
        .and(header("authorization", "Bearer access-0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "profile": { "name": "Kim", "goal": "finish_race" },
            "questionnaire_completed": true
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let outcome = h
        .runtime
        .on_authenticated(TokenPair::new("access-0", "refresh-0"))
        .await
        .unwrap()
        .expect("pending session should attach");
    assert!(outcome.questionnaire_completed);
    assert_eq!(outcome.profile["name"], "Kim");

    assert!(h.store.get(keys::SESSION_ID).unwrap().is_none());
    assert!(!h.store.flag(keys::PENDING_ATTACH).unwrap());
    assert!(h.store.get(keys::DRAFT).unwrap().is_none());

    // Second call has nothing to do and sends nothing.
    assert!(!h.runtime.attach().attach_if_pending().await.unwrap());
    h.server.verify().await;
}

#[tokio::test]
async fn failed_attach_keeps_session_for_retry() {
    let h = Harness::start(600).await;
    h.sign_in("access-0", "refresh-0");
    h.seed_anonymous_session("anon-2");

    Mock::given(method("POST"))
        .and(path("/sessions/anon-2/attach"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .expect(1)
        .mount(&h.server)
        .await;

    let err = h.runtime.attach().attach_if_pending().await.unwrap_err();
    assert!(err.is_transient());

    assert_eq!(
        h.store.get(keys::SESSION_ID).unwrap().as_deref(),
        Some("anon-2")
    );
    assert!(h.store.flag(keys::PENDING_ATTACH).unwrap());
    assert!(h.store.get(keys::DRAFT).unwrap().is_some());
    h.server.verify().await;
}

#[tokio::test]
async fn attach_with_expired_access_token_refreshes_then_attaches() {
    let h = Harness::start(600).await;
    h.sign_in("access-0", "refresh-0");
    h.seed_anonymous_session("anon-3");

    Mock::given(method("POST"))
        .and(path("/sessions/anon-3/attach"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "profile": {},
            "questionnaire_completed": false
        })))
        .with_priority(1)
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/sessions/anon-3/attach"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(1)))
        .expect(1)
        .mount(&h.server)
        .await;

    assert!(h.runtime.attach().attach_if_pending().await.unwrap());
    assert_eq!(h.runtime.gate().access_token().as_deref(), Some("access-1"));
    h.server.verify().await;
}
