//! Verification flow controller.
//!
//! # Architecture
//!
//! ```text
//! UI trigger ──> FlowController::{request_code, verify_code, resend, set_new_password}
//!                     │  begin(): busy? legal origin? gate? validate  (one critical section)
//!                     v
//!                ResetBackend call (awaited, lock-free)
//!                     │
//!                     v
//!                finish(): settle stage, store artifacts, restart cooldown
//!                     │
//!                     v
//!          watch::Sender<FlowState> ──> NavigationBridge / UI observers
//! ```
//!
//! The controller is shared as `Arc<FlowController>` and outlives any one
//! screen. Every trigger takes `&self`; single-flight is enforced on the
//! `is_loading` flag inside the same `send_if_modified` closure that sets it,
//! so two triggers can never both observe an idle flow.


use std::sync::Arc;

use recover_types::{Email, NewPassword, ValidationError, VerificationCode};
use thiserror::Error;
use tokio::sync::{broadcast, watch};

use crate::backend::{BackendError, ResetBackend};
use crate::code_input::{CellEdit, CodeInput};
use crate::countdown::{Countdown, CountdownEvent, CountdownState};
use crate::operation::{self, Operation, TransitionReceipt};
use crate::state::{FlowState, Stage};

/// Tunables for one flow instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowSettings {
    /// Seconds before another code may be requested.
    pub cooldown_secs: u32,
    pub min_password_len: usize,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            cooldown_secs: 30,
            min_password_len: recover_types::DEFAULT_MIN_PASSWORD_LEN,
        }
    }
}

/// Why a trigger did not run to a successful backend call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    /// Another operation for this flow is in flight. Nothing changed.
    #[error("another request is already in progress")]
    Busy,
    /// The trigger is not legal from the current stage. Nothing changed.
    #[error("{operation} is not available while the flow is {stage}")]
    InvalidStage { operation: Operation, stage: Stage },
    /// Another code requested before the cooldown ran out. Nothing changed.
    #[error("a new code can be requested in {remaining_secs}s")]
    CooldownActive { remaining_secs: u32 },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl FlowError {
    /// Rejections a caller should drop without telling the user.
    #[must_use]
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::Busy)
    }
}

/// Owner of one recovery flow's state.
pub struct FlowController {
    backend: Arc<dyn ResetBackend>,
    settings: FlowSettings,
    state: watch::Sender<FlowState>,
    code: watch::Sender<CodeInput>,
    cooldown: Countdown,
}

impl std::fmt::Debug for FlowController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowController")
            .field("settings", &self.settings)
            .field("state", &*self.state.borrow())
            .field("cooldown", &self.cooldown.state())
            .finish_non_exhaustive()
    }
}

impl FlowController {
    #[must_use]
    pub fn new(backend: Arc<dyn ResetBackend>, settings: FlowSettings) -> Self {
        let (state, _) = watch::channel(FlowState::default());
        let (code, _) = watch::channel(CodeInput::new());
        Self {
            backend,
            settings,
            state,
            code,
            cooldown: Countdown::new(),
        }
    }

    #[must_use]
    pub fn settings(&self) -> FlowSettings {
        self.settings
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    /// Current snapshot.
    #[must_use]
    pub fn state(&self) -> FlowState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<FlowState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn code_input(&self) -> CodeInput {
        self.code.borrow().clone()
    }

    #[must_use]
    pub fn subscribe_code(&self) -> watch::Receiver<CodeInput> {
        self.code.subscribe()
    }

    #[must_use]
    pub fn countdown(&self) -> CountdownState {
        self.cooldown.state()
    }

    #[must_use]
    pub fn subscribe_countdown(&self) -> watch::Receiver<CountdownState> {
        self.cooldown.subscribe()
    }

    #[must_use]
    pub fn countdown_events(&self) -> broadcast::Receiver<CountdownEvent> {
        self.cooldown.subscribe_events()
    }

    /// Whether `resend()` would pass the cooldown gate right now.
    #[must_use]
    pub fn can_resend(&self) -> bool {
        !self.cooldown.is_running()
    }

    // ------------------------------------------------------------------
    // Code entry
    // ------------------------------------------------------------------

    pub fn set_cell(&self, index: usize, value: &str) -> CellEdit {
        self.edit_code(|input| input.set_cell(index, value))
    }

    pub fn paste_code(&self, text: &str) -> CellEdit {
        self.edit_code(|input| input.paste(text))
    }

    fn edit_code(&self, edit: impl FnOnce(&mut CodeInput) -> CellEdit) -> CellEdit {
        let mut outcome = CellEdit::Rejected;
        self.code.send_if_modified(|input| {
            outcome = edit(input);
            matches!(outcome, CellEdit::Applied(_))
        });
        outcome
    }

    fn reset_code(&self) {
        self.code.send_if_modified(|input| {
            let had_digits = !input.is_empty();
            input.reset();
            had_digits
        });
    }

    /// Enter the code-entry screen.
    ///
    /// The buffer starts empty on every entry. Dropping the returned guard
    /// tears the screen down and cancels the countdown. Entering again does
    /// not restart it, so after leaving and coming back a new code may be
    /// requested straight away; rate limiting past that point is the
    /// server's.
    #[must_use]
    pub fn enter_verification(self: &Arc<Self>) -> VerificationScreen {
        self.reset_code();
        VerificationScreen {
            controller: Arc::clone(self),
        }
    }

    // ------------------------------------------------------------------
    // Triggers
    // ------------------------------------------------------------------

    /// Ask for a code to be sent to `raw_email`.
    ///
    /// Once an email is stored (recovering from `Failed`) this is a resend in
    /// all but name and passes the same cooldown gate.
    pub async fn request_code(&self, raw_email: &str) -> Result<(), FlowError> {
        let (flight, email) = self.begin(Operation::RequestCode, |state| {
            let email = Email::parse(raw_email)?;
            if let Some(stored) = &state.email {
                if *stored != email {
                    return Err(ValidationError::EmailLocked.into());
                }
                self.check_cooldown()?;
            }
            Ok(email)
        })?;

        let result = self.backend.request_code(&email).await;
        if result.is_ok() {
            self.restart_cooldown();
        }
        self.finish(flight, result, |state| {
            state.email = Some(email);
            state.verified_code = None;
        })
    }

    /// Verify the code currently held in the entry buffer.
    pub async fn verify_code(&self) -> Result<(), FlowError> {
        self.verify(None).await
    }

    /// Verify an explicitly supplied code, bypassing the entry buffer.
    pub async fn verify_code_with(&self, code: VerificationCode) -> Result<(), FlowError> {
        self.verify(Some(code)).await
    }

    async fn verify(&self, supplied: Option<VerificationCode>) -> Result<(), FlowError> {
        let (flight, (email, code)) = self.begin(Operation::VerifyCode, |state| {
            let email = state.email.clone().ok_or(FlowError::InvalidStage {
                operation: Operation::VerifyCode,
                stage: state.stage,
            })?;
            let code = match supplied {
                Some(code) => code,
                None => self.code.borrow().code()?,
            };
            Ok((email, code))
        })?;

        let result = self.backend.verify_code(&email, &code).await;
        self.finish(flight, result, |state| {
            state.verified_code = Some(code);
        })
    }

    /// Request another code to the stored email once the cooldown is over.
    pub async fn resend(&self) -> Result<(), FlowError> {
        let (flight, email) = self.begin(Operation::Resend, |state| {
            self.check_cooldown()?;
            state.email.clone().ok_or(FlowError::InvalidStage {
                operation: Operation::Resend,
                stage: state.stage,
            })
        })?;

        let result = self.backend.request_code(&email).await;
        if result.is_ok() {
            self.reset_code();
            self.restart_cooldown();
        }
        self.finish(flight, result, |state| {
            state.verified_code = None;
        })
    }

    /// Finalize the reset with the verified code.
    pub async fn set_new_password(&self, raw_password: &str) -> Result<(), FlowError> {
        let min_len = self.settings.min_password_len;
        let (flight, (email, code, password)) =
            self.begin(Operation::SetNewPassword, |state| {
                let password = NewPassword::new(raw_password, min_len)?;
                match (&state.email, &state.verified_code) {
                    (Some(email), Some(code)) => Ok((email.clone(), code.clone(), password)),
                    _ => Err(FlowError::InvalidStage {
                        operation: Operation::SetNewPassword,
                        stage: state.stage,
                    }),
                }
            })?;

        let result = self
            .backend
            .set_new_password(&email, &code, &password)
            .await;
        self.finish(flight, result, |_| {})
    }

    /// Clear the error slot after it has been shown.
    pub fn acknowledge_error(&self) {
        self.state
            .send_if_modified(|state| state.error_message.take().is_some());
    }

    /// Atomically mark navigation as done for `stage`.
    ///
    /// Returns true for exactly one caller per stage entry, and only while
    /// the flow is settled on that stage.
    pub fn claim_navigation(&self, stage: Stage) -> bool {
        self.state.send_if_modified(|state| {
            if state.stage != stage || state.is_loading || state.has_navigated {
                return false;
            }
            state.has_navigated = true;
            true
        })
    }

    // ------------------------------------------------------------------
    // Operation lifecycle
    // ------------------------------------------------------------------

    /// Start `operation` if the flow is idle, the stage allows it, and
    /// `prepare` accepts the inputs.
    ///
    /// Busy, stage and gate rejections leave the state untouched. A
    /// validation failure is written to the error slot.
    fn begin<T>(
        &self,
        operation: Operation,
        prepare: impl FnOnce(&FlowState) -> Result<T, FlowError>,
    ) -> Result<(InFlight<'_>, T), FlowError> {
        let mut outcome = Err(FlowError::Busy);

        self.state.send_if_modified(|state| {
            if state.is_loading {
                return false;
            }
            let Some(receipt) = operation::begin(operation, state.stage) else {
                outcome = Err(FlowError::InvalidStage {
                    operation,
                    stage: state.stage,
                });
                return false;
            };

            match prepare(state) {
                Ok(value) => {
                    state.error_message = None;
                    state.is_loading = true;
                    state.stage = receipt.in_flight();
                    outcome = Ok((receipt, value));
                    true
                }
                Err(FlowError::Validation(err)) => {
                    state.error_message = Some(err.to_string());
                    outcome = Err(FlowError::Validation(err));
                    true
                }
                Err(err) => {
                    outcome = Err(err);
                    false
                }
            }
        });

        match outcome {
            Ok((receipt, value)) => {
                tracing::debug!(%operation, origin = %receipt.origin(), "Flow operation started");
                Ok((InFlight::new(&self.state, receipt), value))
            }
            Err(err) => {
                if !err.is_silent() {
                    tracing::debug!(%operation, error = %err, "Flow operation not started");
                }
                Err(err)
            }
        }
    }

    fn finish(
        &self,
        flight: InFlight<'_>,
        result: Result<(), BackendError>,
        on_success: impl FnOnce(&mut FlowState),
    ) -> Result<(), FlowError> {
        let receipt = flight.disarm();
        let origin = receipt.origin();

        match result {
            Ok(()) => {
                let to = operation::settle_success(receipt);
                self.state.send_modify(|state| {
                    on_success(state);
                    state.settle(origin, to);
                });
                tracing::info!(operation = %receipt.operation(), stage = %to, "Flow operation succeeded");
                Ok(())
            }
            Err(err) => {
                let to = operation::settle_failure(receipt, &err);
                let message = err.user_message();
                self.state.send_modify(|state| {
                    if to == Stage::Failed {
                        state.verified_code = None;
                    }
                    state.error_message = Some(message);
                    state.settle(origin, to);
                });
                tracing::warn!(
                    operation = %receipt.operation(),
                    stage = %to,
                    error = %err,
                    "Flow operation failed"
                );
                Err(err.into())
            }
        }
    }

    fn check_cooldown(&self) -> Result<(), FlowError> {
        if self.cooldown.is_running() {
            return Err(FlowError::CooldownActive {
                remaining_secs: self.cooldown.remaining_seconds(),
            });
        }
        Ok(())
    }

    fn restart_cooldown(&self) {
        self.cooldown.start(self.settings.cooldown_secs);
    }
}

/// Outstanding operation.
///
/// If the awaiting future is dropped before the backend answers, the flow
/// returns to the origin stage instead of staying busy forever.
struct InFlight<'a> {
    state: &'a watch::Sender<FlowState>,
    receipt: TransitionReceipt,
    armed: bool,
}

impl<'a> InFlight<'a> {
    fn new(state: &'a watch::Sender<FlowState>, receipt: TransitionReceipt) -> Self {
        Self {
            state,
            receipt,
            armed: true,
        }
    }

    fn disarm(mut self) -> TransitionReceipt {
        self.armed = false;
        self.receipt
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let origin = self.receipt.origin();
        self.state.send_modify(|state| state.settle(origin, origin));
        tracing::debug!(operation = %self.receipt.operation(), "Abandoned in-flight operation");
    }
}

/// Screen-scoped handle for the code-entry step.
///
/// Exists while the verification screen is shown; teardown cancels the
/// countdown so no tick outlives the screen.
#[derive(Debug)]
pub struct VerificationScreen {
    controller: Arc<FlowController>,
}

impl VerificationScreen {
    #[must_use]
    pub fn controller(&self) -> &Arc<FlowController> {
        &self.controller
    }
}

impl Drop for VerificationScreen {
    fn drop(&mut self) {
        self.controller.cooldown.cancel();
    }
}
