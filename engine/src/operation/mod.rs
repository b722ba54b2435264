//! Operation transition graph authority.
//!
//! This module is the single encoding point for which trigger may start from
//! which stage, which stage it occupies while in flight, and where it lands.
//! The controller delegates every legality decision here instead of
//! embedding the table in each trigger.

use crate::backend::BackendError;
use crate::state::Stage;

/// A user-triggered flow operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    RequestCode,
    VerifyCode,
    Resend,
    SetNewPassword,
}

impl Operation {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::RequestCode => "request_code",
            Self::VerifyCode => "verify_code",
            Self::Resend => "resend",
            Self::SetNewPassword => "set_new_password",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Proof that an operation was legal from its origin stage.
///
/// Constructed only by [`begin`]; the controller carries it across the
/// network await and hands it back to [`settle_success`] / [`settle_failure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TransitionReceipt {
    operation: Operation,
    origin: Stage,
}

impl TransitionReceipt {
    #[must_use]
    pub(crate) const fn operation(self) -> Operation {
        self.operation
    }

    #[must_use]
    pub(crate) const fn origin(self) -> Stage {
        self.origin
    }

    #[must_use]
    pub(crate) const fn in_flight(self) -> Stage {
        in_flight_stage(self.operation)
    }
}

/// Check that `operation` may start from `stage`.
#[must_use]
pub(crate) fn begin(operation: Operation, stage: Stage) -> Option<TransitionReceipt> {
    is_legal_origin(operation, stage).then_some(TransitionReceipt {
        operation,
        origin: stage,
    })
}

#[must_use]
pub(crate) const fn is_legal_origin(operation: Operation, stage: Stage) -> bool {
    use Operation::{RequestCode, Resend, SetNewPassword, VerifyCode};
    use Stage::{CodeSent, Failed, Idle, Verified};

    match operation {
        RequestCode => matches!(stage, Idle | Failed),
        VerifyCode => matches!(stage, CodeSent),
        Resend => matches!(stage, CodeSent | Failed),
        SetNewPassword => matches!(stage, Verified),
    }
}

#[must_use]
pub(crate) const fn in_flight_stage(operation: Operation) -> Stage {
    match operation {
        Operation::RequestCode | Operation::Resend => Stage::RequestingCode,
        Operation::VerifyCode => Stage::VerifyingCode,
        Operation::SetNewPassword => Stage::SettingPassword,
    }
}

#[must_use]
pub(crate) const fn settle_success(receipt: TransitionReceipt) -> Stage {
    match receipt.operation {
        Operation::RequestCode | Operation::Resend => Stage::CodeSent,
        Operation::VerifyCode => Stage::Verified,
        Operation::SetNewPassword => Stage::Complete,
    }
}

/// Where a failed operation lands.
///
/// Every failure returns to the origin stage except an expired verification
/// at the password step, which cannot be retried without a new code.
#[must_use]
pub(crate) fn settle_failure(receipt: TransitionReceipt, error: &BackendError) -> Stage {
    match (receipt.operation, error) {
        (Operation::SetNewPassword, BackendError::Expired { .. }) => Stage::Failed,
        _ => receipt.origin,
    }
}

#[cfg(test)]
mod tests {
    use super::{Operation, begin, in_flight_stage, settle_failure, settle_success};
    use crate::backend::BackendError;
    use crate::state::Stage;

    const ALL_STAGES: [Stage; 8] = [
        Stage::Idle,
        Stage::RequestingCode,
        Stage::CodeSent,
        Stage::VerifyingCode,
        Stage::Verified,
        Stage::SettingPassword,
        Stage::Complete,
        Stage::Failed,
    ];

    #[test]
    fn in_flight_and_terminal_stages_accept_nothing() {
        for stage in ALL_STAGES.into_iter().filter(|s| s.is_in_flight()) {
            for op in [
                Operation::RequestCode,
                Operation::VerifyCode,
                Operation::Resend,
                Operation::SetNewPassword,
            ] {
                assert!(begin(op, stage).is_none(), "{op} from {stage}");
                assert!(begin(op, Stage::Complete).is_none(), "{op} from complete");
            }
        }
    }

    #[test]
    fn table_edges() {
        let receipt = begin(Operation::RequestCode, Stage::Idle).unwrap();
        assert_eq!(receipt.in_flight(), Stage::RequestingCode);
        assert_eq!(settle_success(receipt), Stage::CodeSent);

        let receipt = begin(Operation::VerifyCode, Stage::CodeSent).unwrap();
        assert_eq!(settle_success(receipt), Stage::Verified);

        let receipt = begin(Operation::Resend, Stage::CodeSent).unwrap();
        assert_eq!(settle_success(receipt), Stage::CodeSent);

        let receipt = begin(Operation::SetNewPassword, Stage::Verified).unwrap();
        assert_eq!(settle_success(receipt), Stage::Complete);

        assert!(begin(Operation::VerifyCode, Stage::Idle).is_none());
        assert!(begin(Operation::SetNewPassword, Stage::CodeSent).is_none());
        assert!(begin(Operation::RequestCode, Stage::CodeSent).is_none());
    }

    #[test]
    fn failures_return_to_origin() {
        let rejected = BackendError::Rejected {
            message: "Invalid code".to_string(),
        };
        let receipt = begin(Operation::VerifyCode, Stage::CodeSent).unwrap();
        assert_eq!(settle_failure(receipt, &rejected), Stage::CodeSent);

        let expired = BackendError::Expired {
            message: "expired".to_string(),
        };
        assert_eq!(settle_failure(receipt, &expired), Stage::CodeSent);

        let receipt = begin(Operation::SetNewPassword, Stage::Verified).unwrap();
        assert_eq!(settle_failure(receipt, &rejected), Stage::Verified);
        assert_eq!(settle_failure(receipt, &expired), Stage::Failed);
    }

    #[test]
    fn failed_stage_retries_through_request() {
        assert!(begin(Operation::Resend, Stage::Failed).is_some());
        assert!(begin(Operation::RequestCode, Stage::Failed).is_some());
        assert_eq!(in_flight_stage(Operation::Resend), Stage::RequestingCode);
    }
}
