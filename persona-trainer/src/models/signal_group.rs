//! Per-signal-group analysis outcome

use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Outcome of one optional group of signals within an analysis record
///
/// A group that could not be computed is recorded as data instead of failing the whole
/// record. Serialized with a `status` tag: `ok` (fields inline), `unavailable`, or `failed`
/// (both with a `reason`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SignalGroup<T> {
    /// Signals computed normally
    Ok(T),
    /// Host lacks the capability (no audio track, no landmark model, ...)
    Unavailable { reason: String },
    /// Computation was attempted and errored
    Failed { reason: String },
}

impl<T> SignalGroup<T> {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        SignalGroup::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        SignalGroup::Failed {
            reason: reason.into(),
        }
    }

    /// Wrap a fallible computation, downgrading the error to `Failed`
    pub fn from_result<E: Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => SignalGroup::Ok(value),
            Err(e) => SignalGroup::failed(e.to_string()),
        }
    }

    pub fn ok(&self) -> Option<&T> {
        match self {
            SignalGroup::Ok(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, SignalGroup::Ok(_))
    }

    /// Reason the group is missing, if it is
    pub fn reason(&self) -> Option<&str> {
        match self {
            SignalGroup::Ok(_) => None,
            SignalGroup::Unavailable { reason } | SignalGroup::Failed { reason } => Some(reason),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> SignalGroup<U> {
        match self {
            SignalGroup::Ok(value) => SignalGroup::Ok(f(value)),
            SignalGroup::Unavailable { reason } => SignalGroup::Unavailable { reason },
            SignalGroup::Failed { reason } => SignalGroup::Failed { reason },
        }
    }
}
