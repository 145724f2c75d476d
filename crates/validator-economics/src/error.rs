use thiserror::Error;

pub type Result<T = ()> = std::result::Result<T, EconomicsError>;

/// Errors that abort a run. Everything recoverable is a [`RunWarning`].
#[derive(Debug, Error)]
pub enum EconomicsError {
    #[error("invalid billing cycle: {0}")]
    InvalidCycle(String),
    #[error("invalid validator identity '{0}'")]
    InvalidIdentity(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("epoch resolution failed: {0}")]
    Resolution(String),
    #[error("chain rpc error: {0}")]
    Rpc(String),
}

impl EconomicsError {
    /// Configuration-level fatals are the only ones that end the process non-zero.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            EconomicsError::InvalidCycle(_)
                | EconomicsError::InvalidIdentity(_)
                | EconomicsError::Config(_)
        )
    }
}

/// Raised when a projection would divide by zero; callers substitute 0.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("division by zero while computing {0}")]
pub struct DivisionGuardError(pub &'static str);

/// Non-fatal problems collected during a run and rendered with the report.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RunWarning {
    #[error("bulk reward history unavailable, fetched every epoch individually: {0}")]
    BulkSourceFailure(String),
    #[error("epoch {epoch}: reward fetch failed: {reason}")]
    EpochFetchFailed { epoch: u64, reason: String },
    #[error("epoch {epoch}: rejected malformed reward record: {reason}")]
    MalformedRecord { epoch: u64, reason: String },
    #[error("run cancelled, {0} epoch(s) not fetched")]
    Cancelled(usize),
    #[error("price lookup failed, using fallback ${fallback:.2}: {reason}")]
    PriceFallback { fallback: f64, reason: String },
    #[error("{0}; reported as 0")]
    DivisionGuard(DivisionGuardError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors_are_flagged() {
        assert!(EconomicsError::InvalidCycle("end before start".into()).is_configuration());
        assert!(EconomicsError::InvalidIdentity("nope".into()).is_configuration());
        assert!(EconomicsError::Config("bad day".into()).is_configuration());
        assert!(!EconomicsError::Resolution("schedule".into()).is_configuration());
        assert!(!EconomicsError::Rpc("timeout".into()).is_configuration());
    }

    #[test]
    fn test_warning_messages() {
        let warning = RunWarning::EpochFetchFailed {
            epoch: 812,
            reason: "timed out".into(),
        };
        assert_eq!(warning.to_string(), "epoch 812: reward fetch failed: timed out");

        let guard = RunWarning::DivisionGuard(DivisionGuardError("projected revenue"));
        assert_eq!(
            guard.to_string(),
            "division by zero while computing projected revenue; reported as 0"
        );
    }
}
