//! End-to-end flow scenarios against a mock recovery API

use std::sync::Arc;
use std::time::Duration;

use recover_engine::{FlowError, FlowSettings, Stage, VerificationCode};
use recover_providers::{FORGOT_PATH, RESET_PATH, VERIFY_PATH};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{EMAIL, http_harness, mount_error, mount_status};

#[tokio::test]
async fn scenario_a_request_code_starts_cooldown_and_navigates() {
    let server = MockServer::start().await;
    mount_status(&server, FORGOT_PATH, 200).await;
    let h = http_harness(&server, FlowSettings::default());

    h.flow.request_code(EMAIL).await.unwrap();

    let state = h.flow.state();
    assert_eq!(state.stage(), Stage::CodeSent);
    assert_eq!(state.email().unwrap().as_str(), EMAIL);
    let countdown = h.flow.countdown();
    assert_eq!(countdown.remaining_seconds, 30);
    assert!(countdown.is_running);

    assert!(h.bridge.observe().is_some());
    assert_eq!(h.navigator.log(), vec![format!("verify_code?email={EMAIL}")]);
}

#[tokio::test]
async fn scenario_b_rejected_code_keeps_stage_and_buffer() {
    let server = MockServer::start().await;
    mount_status(&server, FORGOT_PATH, 200).await;
    mount_error(&server, VERIFY_PATH, 400, "Invalid code").await;
    let h = http_harness(&server, FlowSettings::default());
    h.flow.request_code(EMAIL).await.unwrap();
    h.bridge.observe();

    let _screen = h.flow.enter_verification();
    for (i, digit) in "123456".chars().enumerate() {
        h.flow.set_cell(i, &digit.to_string());
    }
    let err = h.flow.verify_code().await.unwrap_err();
    assert!(matches!(err, FlowError::Backend(_)));

    let state = h.flow.state();
    assert_eq!(state.stage(), Stage::CodeSent);
    assert_eq!(state.error_message(), Some("Invalid code"));
    assert_eq!(h.flow.code_input().assembled_code(), "123456");

    // Still on the same stage entry: no second navigation.
    assert!(h.bridge.observe().is_none());
    assert_eq!(h.navigator.log().len(), 1);
}

#[tokio::test]
async fn scenario_c_verified_navigates_once() {
    let server = MockServer::start().await;
    mount_status(&server, FORGOT_PATH, 200).await;
    mount_status(&server, VERIFY_PATH, 200).await;
    let h = http_harness(&server, FlowSettings::default());
    h.flow.request_code(EMAIL).await.unwrap();
    h.bridge.observe();

    let _screen = h.flow.enter_verification();
    h.flow.paste_code("654321");
    h.flow.verify_code().await.unwrap();

    let state = h.flow.state();
    assert_eq!(state.stage(), Stage::Verified);
    assert_eq!(state.verified_code().unwrap().as_str(), "654321");

    for _ in 0..3 {
        h.bridge.observe();
    }
    assert_eq!(
        h.navigator.log(),
        vec![
            format!("verify_code?email={EMAIL}"),
            format!("new_password?code=654321&email={EMAIL}"),
        ]
    );
}

#[tokio::test]
async fn scenario_e_complete_clears_back_stack_once() {
    let server = MockServer::start().await;
    mount_status(&server, FORGOT_PATH, 200).await;
    mount_status(&server, VERIFY_PATH, 200).await;
    mount_status(&server, RESET_PATH, 204).await;
    let h = http_harness(&server, FlowSettings::default());

    h.flow.request_code(EMAIL).await.unwrap();
    h.flow
        .verify_code_with(VerificationCode::parse("654321").unwrap())
        .await
        .unwrap();
    h.flow.set_new_password("a much better password").await.unwrap();
    assert_eq!(h.flow.state().stage(), Stage::Complete);

    assert!(h.bridge.observe().is_some());
    assert!(h.bridge.observe().is_none());
    assert_eq!(
        h.navigator.log(),
        vec!["pop forgot_password -> reset_complete".to_string()]
    );
}

#[tokio::test]
async fn in_flight_call_rejects_every_other_trigger() {
    let server = MockServer::start().await;
    mount_status(&server, FORGOT_PATH, 200).await;
    Mock::given(method("POST"))
        .and(path(VERIFY_PATH))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(300)))
        .expect(1)
        .mount(&server)
        .await;
    let h = http_harness(&server, FlowSettings::default());
    h.flow.request_code(EMAIL).await.unwrap();

    let pending = tokio::spawn({
        let flow = Arc::clone(&h.flow);
        async move {
            flow.verify_code_with(VerificationCode::parse("111111").unwrap())
                .await
        }
    });
    h.flow
        .subscribe()
        .wait_for(|state| state.is_loading())
        .await
        .unwrap();

    let snapshot = h.flow.state();
    assert_eq!(h.flow.verify_code().await, Err(FlowError::Busy));
    assert_eq!(h.flow.resend().await, Err(FlowError::Busy));
    assert_eq!(h.flow.request_code(EMAIL).await, Err(FlowError::Busy));
    assert_eq!(h.flow.state(), snapshot);

    pending.await.unwrap().unwrap();
    assert_eq!(h.flow.state().stage(), Stage::Verified);
}

#[tokio::test]
async fn expired_reset_session_restarts_from_a_new_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FORGOT_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;
    mount_status(&server, VERIFY_PATH, 200).await;
    mount_error(&server, RESET_PATH, 410, "Your reset session has expired.").await;
    let h = http_harness(&server, FlowSettings::default());

    h.flow.request_code(EMAIL).await.unwrap();
    h.bridge.observe();
    {
        let _screen = h.flow.enter_verification();
        h.flow.paste_code("222222");
        h.flow.verify_code().await.unwrap();
    }
    h.bridge.observe();

    assert!(h.flow.set_new_password("long enough pw").await.is_err());
    let state = h.flow.state();
    assert_eq!(state.stage(), Stage::Failed);
    assert_eq!(
        state.error_message(),
        Some("Your reset session has expired.")
    );
    assert!(h.bridge.observe().is_none());

    // Leaving the code screen cancelled the cooldown, so a fresh code is allowed.
    h.flow.resend().await.unwrap();
    assert_eq!(h.flow.state().stage(), Stage::CodeSent);
    assert!(h.bridge.observe().is_some());
    assert_eq!(
        h.navigator.log().last().unwrap(),
        &format!("verify_code?email={EMAIL}")
    );
}

#[tokio::test]
async fn unreachable_server_reports_connection_problem() {
    let server = MockServer::start().await;
    mount_status(&server, FORGOT_PATH, 503).await;
    let h = http_harness(&server, FlowSettings::default());

    let err = h.flow.request_code(EMAIL).await.unwrap_err();
    assert!(matches!(err, FlowError::Backend(ref e) if e.is_transport()));

    let state = h.flow.state();
    assert_eq!(state.stage(), Stage::Idle);
    assert!(state.error_message().unwrap().contains("Could not reach"));
    assert!(h.flow.can_resend());
}
