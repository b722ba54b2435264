//! Shared test utilities and fixtures
//!
//! Common infrastructure for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use recover_engine::{
    BackendFut, Email, FlowController, FlowSettings, NavParams, NavigationBridge, Navigator,
    NewPassword, NoToken, ResetBackend, Route, VerificationCode,
};
use recover_providers::{HttpResetBackend, HttpSettings, RetryConfig};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const EMAIL: &str = "a@b.com";

/// Navigator that records every command as a short string.
#[derive(Default)]
pub struct RecordingNavigator {
    log: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate_to(&self, route: Route, params: &NavParams) {
        let params: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
        self.log
            .lock()
            .unwrap()
            .push(format!("{route}?{}", params.join("&")));
    }

    fn pop_and_navigate_to(&self, route: Route, clear_back_stack_to: Route) {
        self.log
            .lock()
            .unwrap()
            .push(format!("pop {clear_back_stack_to} -> {route}"));
    }
}

pub struct Harness {
    pub flow: Arc<FlowController>,
    pub navigator: Arc<RecordingNavigator>,
    pub bridge: NavigationBridge<Arc<RecordingNavigator>>,
}

impl Harness {
    pub fn new(backend: Arc<dyn ResetBackend>, settings: FlowSettings) -> Self {
        let flow = Arc::new(FlowController::new(backend, settings));
        let navigator = Arc::new(RecordingNavigator::default());
        let bridge = NavigationBridge::new(Arc::clone(&flow), Arc::clone(&navigator));
        Self {
            flow,
            navigator,
            bridge,
        }
    }
}

/// Harness backed by the real HTTP client pointed at `server`.
pub fn http_harness(server: &MockServer, settings: FlowSettings) -> Harness {
    let http = HttpSettings {
        base_url: server.uri(),
        timeout: Duration::from_secs(5),
        allow_insecure_http: true,
        retry: RetryConfig {
            max_retries: 1,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter_factor: 0.0,
        },
    };
    let backend = HttpResetBackend::new(http, Arc::new(NoToken)).expect("client builds");
    Harness::new(Arc::new(backend), settings)
}

pub async fn mount_status(server: &MockServer, endpoint: &str, status: u16) {
    Mock::given(method("POST"))
        .and(path(endpoint))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

pub async fn mount_error(server: &MockServer, endpoint: &str, status: u16, message: &str) {
    Mock::given(method("POST"))
        .and(path(endpoint))
        .respond_with(
            ResponseTemplate::new(status)
                .set_body_json(serde_json::json!({ "error": { "message": message } })),
        )
        .mount(server)
        .await;
}

/// In-process backend that accepts everything and counts calls. Used where
/// the clock is paused and real sockets would stall.
#[derive(Default)]
pub struct AcceptingBackend {
    calls: Mutex<Vec<String>>,
}

impl AcceptingBackend {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> BackendFut<'_> {
        self.calls.lock().unwrap().push(call);
        Box::pin(async { Ok(()) })
    }
}

impl ResetBackend for AcceptingBackend {
    fn request_code<'a>(&'a self, email: &'a Email) -> BackendFut<'a> {
        self.record(format!("request {email}"))
    }

    fn verify_code<'a>(&'a self, email: &'a Email, code: &'a VerificationCode) -> BackendFut<'a> {
        self.record(format!("verify {email} {code}"))
    }

    fn set_new_password<'a>(
        &'a self,
        email: &'a Email,
        code: &'a VerificationCode,
        _password: &'a NewPassword,
    ) -> BackendFut<'a> {
        self.record(format!("reset {email} {code}"))
    }
}
