//! Per-platform go/no-go decision.

use crate::domain::{Platform, PlatformCredential};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateDecision {
    Start(PlatformCredential),
    Skip,
    /// Requested, but no credential was available.
    Error,
}

/// Credential-free view of a decision, for reports and logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateOutcome {
    Start,
    Skip,
    Error,
}

impl GateDecision {
    pub fn outcome(&self) -> GateOutcome {
        match self {
            GateDecision::Start(_) => GateOutcome::Start,
            GateDecision::Skip => GateOutcome::Skip,
            GateDecision::Error => GateOutcome::Error,
        }
    }
}

/// Rules, in order: not requested → Skip; credential present → Start; otherwise Error.
///
/// The Error case logs which credential is missing; it never aborts the
/// other platform's decision.
pub fn decide(
    platform: Platform,
    requested: bool,
    credential: Option<PlatformCredential>,
) -> GateDecision {
    if !requested {
        return GateDecision::Skip;
    }
    match credential {
        Some(c) => GateDecision::Start(c),
        None => {
            tracing::error!(%platform, "{} is missing, not starting", platform.env_var());
            GateDecision::Error
        }
    }
}
