//! Resend cooldown behaviour on a paused clock

use std::sync::Arc;
use std::time::Duration;

use recover_engine::{CountdownEvent, FlowError, FlowSettings, Stage};

use crate::common::{AcceptingBackend, EMAIL, Harness};

fn harness(backend: &Arc<AcceptingBackend>) -> Harness {
    Harness::new(backend.clone(), FlowSettings::default())
}

#[tokio::test(start_paused = true)]
async fn resend_is_a_noop_while_the_timer_runs() {
    let backend = Arc::new(AcceptingBackend::default());
    let h = harness(&backend);
    h.flow.request_code(EMAIL).await.unwrap();
    let _screen = h.flow.enter_verification();

    for _ in 0..5 {
        tokio::time::sleep(Duration::from_secs(5)).await;
        let before = h.flow.state();
        assert!(matches!(
            h.flow.resend().await,
            Err(FlowError::CooldownActive { .. })
        ));
        assert_eq!(h.flow.state(), before);
    }
    assert_eq!(backend.calls(), vec![format!("request {EMAIL}")]);
}

#[tokio::test(start_paused = true)]
async fn scenario_d_expiry_enables_resend() {
    let backend = Arc::new(AcceptingBackend::default());
    let h = harness(&backend);
    h.flow.request_code(EMAIL).await.unwrap();
    let _screen = h.flow.enter_verification();
    let mut events = h.flow.countdown_events();
    h.flow.paste_code("987654");

    loop {
        if events.recv().await.unwrap() == CountdownEvent::Expired {
            break;
        }
    }
    assert!(!h.flow.countdown().is_running);
    assert!(h.flow.can_resend());

    h.flow.resend().await.unwrap();
    assert_eq!(h.flow.state().stage(), Stage::CodeSent);
    assert!(h.flow.code_input().cells().iter().all(Option::is_none));
    let countdown = h.flow.countdown();
    assert_eq!(countdown.remaining_seconds, 30);
    assert!(countdown.is_running);
    assert_eq!(backend.calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn leaving_the_code_screen_stops_the_timer() {
    let backend = Arc::new(AcceptingBackend::default());
    let h = harness(&backend);
    h.flow.request_code(EMAIL).await.unwrap();

    let screen = h.flow.enter_verification();
    tokio::time::sleep(Duration::from_millis(4_500)).await;
    assert_eq!(h.flow.countdown().remaining_seconds, 26);
    drop(screen);

    let mut ticks = h.flow.countdown_events();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(ticks.try_recv().is_err());
    assert!(!h.flow.countdown().is_running);
}
