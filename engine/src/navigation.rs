//! Flow-to-navigation bridge.
//!
//! Watches a [`FlowController`] and turns settled stages into one navigation
//! command per stage entry. The claim on `has_navigated` is taken through the
//! controller, so a bridge that observes the same state twice (or two bridges
//! racing) still navigates once.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::flow::FlowController;
use crate::state::{FlowState, Stage};

/// Destination screens of the recovery flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    ForgotPassword,
    VerifyCode,
    NewPassword,
    ResetComplete,
}

impl Route {
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::ForgotPassword => "forgot_password",
            Self::VerifyCode => "verify_code",
            Self::NewPassword => "new_password",
            Self::ResetComplete => "reset_complete",
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

pub type NavParams = BTreeMap<&'static str, String>;

pub const PARAM_EMAIL: &str = "email";
pub const PARAM_CODE: &str = "code";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationCommand {
    NavigateTo {
        route: Route,
        params: NavParams,
    },
    /// Replace the back stack down to `clear_back_stack_to` (inclusive) with
    /// `route`.
    PopAndNavigateTo {
        route: Route,
        clear_back_stack_to: Route,
    },
}

/// Host navigation surface.
pub trait Navigator: Send + Sync {
    fn navigate_to(&self, route: Route, params: &NavParams);
    fn pop_and_navigate_to(&self, route: Route, clear_back_stack_to: Route);
}

impl<N: Navigator + ?Sized> Navigator for Arc<N> {
    fn navigate_to(&self, route: Route, params: &NavParams) {
        (**self).navigate_to(route, params);
    }

    fn pop_and_navigate_to(&self, route: Route, clear_back_stack_to: Route) {
        (**self).pop_and_navigate_to(route, clear_back_stack_to);
    }
}

/// Command for the stage `state` has settled on, ignoring the guard.
#[must_use]
pub fn command_for(state: &FlowState) -> Option<NavigationCommand> {
    match state.stage() {
        Stage::CodeSent => {
            let email = state.email()?;
            Some(NavigationCommand::NavigateTo {
                route: Route::VerifyCode,
                params: NavParams::from([(PARAM_EMAIL, email.to_string())]),
            })
        }
        Stage::Verified => {
            let email = state.email()?;
            let code = state.verified_code()?;
            Some(NavigationCommand::NavigateTo {
                route: Route::NewPassword,
                params: NavParams::from([
                    (PARAM_EMAIL, email.to_string()),
                    (PARAM_CODE, code.to_string()),
                ]),
            })
        }
        Stage::Complete => Some(NavigationCommand::PopAndNavigateTo {
            route: Route::ResetComplete,
            clear_back_stack_to: Route::ForgotPassword,
        }),
        Stage::Idle
        | Stage::RequestingCode
        | Stage::VerifyingCode
        | Stage::SettingPassword
        | Stage::Failed => None,
    }
}

pub struct NavigationBridge<N> {
    controller: Arc<FlowController>,
    navigator: N,
}

impl<N: Navigator> NavigationBridge<N> {
    pub fn new(controller: Arc<FlowController>, navigator: N) -> Self {
        Self {
            controller,
            navigator,
        }
    }

    /// Evaluate the current state once and navigate if a stage entry is
    /// still unclaimed. Returns the dispatched command.
    pub fn observe(&self) -> Option<NavigationCommand> {
        let state = self.controller.state();
        if state.is_loading() || state.has_navigated() {
            return None;
        }
        let command = command_for(&state)?;
        if !self.controller.claim_navigation(state.stage()) {
            return None;
        }

        tracing::info!(stage = %state.stage(), "Navigating");
        match &command {
            NavigationCommand::NavigateTo { route, params } => {
                self.navigator.navigate_to(*route, params);
            }
            NavigationCommand::PopAndNavigateTo {
                route,
                clear_back_stack_to,
            } => {
                self.navigator
                    .pop_and_navigate_to(*route, *clear_back_stack_to);
            }
        }
        Some(command)
    }

    /// Observe every state change. Runs until the task is aborted.
    pub async fn run(self) {
        let mut updates = self.controller.subscribe();
        loop {
            self.observe();
            if updates.changed().await.is_err() {
                break;
            }
        }
    }
}
