//! Flow state types.
//!
//! `FlowState` is owned by the [`FlowController`](crate::FlowController) and
//! published read-only to everyone else. Mutators are crate-private.

use recover_types::{Email, VerificationCode};

/// Named point in the recovery flow.
///
/// # State Machine
/// ```text
///  Idle ──request──> RequestingCode ──ok──> CodeSent ──verify──> VerifyingCode ──ok──> Verified
///   ^                     │  ^                │  ^                    │                  │
///   └──────err────────────┘  └────resend──────┘  └────────err─────────┘                  │
///                                                                                        │ set password
///  Failed <──expired── SettingPassword <─────────────────────────────────────────────────┘
///    │                     │
///    │ resend / request    └──ok──> Complete
///    └──────> RequestingCode
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Stage {
    #[default]
    Idle,
    RequestingCode,
    CodeSent,
    VerifyingCode,
    Verified,
    SettingPassword,
    Complete,
    Failed,
}

impl Stage {
    /// Stages that exist only while a request is outstanding.
    #[must_use]
    pub const fn is_in_flight(self) -> bool {
        matches!(
            self,
            Self::RequestingCode | Self::VerifyingCode | Self::SettingPassword
        )
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::RequestingCode => "requesting_code",
            Self::CodeSent => "code_sent",
            Self::VerifyingCode => "verifying_code",
            Self::Verified => "verified",
            Self::SettingPassword => "setting_password",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Snapshot of one recovery flow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowState {
    pub(crate) stage: Stage,
    pub(crate) email: Option<Email>,
    pub(crate) verified_code: Option<VerificationCode>,
    pub(crate) is_loading: bool,
    pub(crate) error_message: Option<String>,
    pub(crate) has_navigated: bool,
}

impl FlowState {
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Set once by the first successful code request.
    #[must_use]
    pub fn email(&self) -> Option<&Email> {
        self.email.as_ref()
    }

    #[must_use]
    pub fn verified_code(&self) -> Option<&VerificationCode> {
        self.verified_code.as_ref()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Whether navigation already fired for the current stage entry.
    #[must_use]
    pub fn has_navigated(&self) -> bool {
        self.has_navigated
    }

    /// End an operation that started from `origin`, landing on `stage`.
    ///
    /// The navigation guard resets only when the settled stage differs from
    /// the one the operation started in; the in-flight stage in between does
    /// not count as an entry.
    pub(crate) fn settle(&mut self, origin: Stage, stage: Stage) {
        if origin != stage {
            self.has_navigated = false;
        }
        self.stage = stage;
        self.is_loading = false;
    }
}
