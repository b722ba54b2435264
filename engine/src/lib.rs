//! Core engine for the password recovery flow.
//!
//! This crate owns the flow state machine and knows nothing about HTTP or
//! terminals. Backends plug in through [`ResetBackend`]; hosts observe state
//! through `watch` channels and navigate through [`Navigator`].

mod backend;
mod code_input;
mod config;
mod countdown;
mod flow;
mod navigation;
mod operation;
mod state;

pub use backend::{BackendError, BackendFut, NoToken, ResetBackend, StaticToken, TokenSource};
pub use code_input::{CellEdit, CodeInput, Focus};
pub use config::{
    API_URL_ENV, ApiConfig, CONFIG_PATH_ENV, ConfigError, FlowConfig, RecoverConfig, RetryConfig,
    RetryValues, config_path, expand_env_vars,
};
pub use countdown::{Countdown, CountdownEvent, CountdownState};
pub use flow::{FlowController, FlowError, FlowSettings, VerificationScreen};
pub use navigation::{
    NavParams, NavigationBridge, NavigationCommand, Navigator, PARAM_CODE, PARAM_EMAIL, Route,
    command_for,
};
pub use operation::Operation;
pub use state::{FlowState, Stage};

pub use recover_types::{
    CODE_LENGTH, Email, NewPassword, SecretString, ValidationError, VerificationCode,
};
