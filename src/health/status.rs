// src/health/status.rs
use serde::{Deserialize, Serialize};
use std::fmt;

/// Overall availability of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "Partially Available")]
    PartiallyAvailable,
    #[serde(rename = "Unavailable")]
    Unavailable,
}

/// Span status description used when a check runs past its timeout.
pub const STATUS_TIMEOUT: &str = "Timeout during health check";

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::PartiallyAvailable => "Partially Available",
            Status::Unavailable => "Unavailable",
        }
    }

    /// `true` for every status except `Unavailable`.
    pub fn is_ok(&self) -> bool {
        matches!(self, Status::Ok | Status::PartiallyAvailable)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Folds per-check verdicts into one [`Status`].
///
/// Starts at `Ok`. A failure of a non-skippable check makes the result
/// `Unavailable` and nothing upgrades it afterwards; a skippable failure
/// lowers `Ok` to `PartiallyAvailable`. Successes change nothing.
#[derive(Debug, Clone, Copy)]
pub struct StatusReducer {
    status: Status,
}

impl Default for StatusReducer {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusReducer {
    pub fn new() -> Self {
        Self { status: Status::Ok }
    }

    pub fn observe(&mut self, ok: bool, skippable: bool) {
        if ok {
            return;
        }

        self.status = match (self.status, skippable) {
            (Status::Unavailable, _) => Status::Unavailable,
            (_, true) => Status::PartiallyAvailable,
            (_, false) => Status::Unavailable,
        };
    }

    pub fn status(&self) -> Status {
        self.status
    }
}

/// Reduce a sequence of `(ok, skippable)` verdicts.
pub fn reduce<I>(verdicts: I) -> Status
where
    I: IntoIterator<Item = (bool, bool)>,
{
    let mut reducer = StatusReducer::new();
    for (ok, skippable) in verdicts {
        reducer.observe(ok, skippable);
    }
    reducer.status()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUCCESS: (bool, bool) = (true, false);
    const SKIPPABLE_FAILURE: (bool, bool) = (false, true);
    const FATAL_FAILURE: (bool, bool) = (false, false);

    #[test]
    fn test_empty_is_ok() {
        assert_eq!(reduce(Vec::<(bool, bool)>::new()), Status::Ok);
    }

    #[test]
    fn test_single_verdicts() {
        assert_eq!(reduce([SUCCESS]), Status::Ok);
        assert_eq!(reduce([SKIPPABLE_FAILURE]), Status::PartiallyAvailable);
        assert_eq!(reduce([FATAL_FAILURE]), Status::Unavailable);
    }

    #[test]
    fn test_unavailable_is_sticky() {
        assert_eq!(reduce([FATAL_FAILURE, SKIPPABLE_FAILURE]), Status::Unavailable);
        assert_eq!(reduce([SKIPPABLE_FAILURE, FATAL_FAILURE]), Status::Unavailable);
        assert_eq!(reduce([FATAL_FAILURE, SUCCESS, SUCCESS]), Status::Unavailable);
    }

    #[test]
    fn test_success_does_not_upgrade() {
        assert_eq!(reduce([SKIPPABLE_FAILURE, SUCCESS]), Status::PartiallyAvailable);
    }

    #[test]
    fn test_many_successes_do_not_outvote_a_failure() {
        let mut verdicts = vec![SUCCESS; 10];
        verdicts.push(FATAL_FAILURE);
        assert_eq!(reduce(verdicts), Status::Unavailable);
    }

    #[test]
    fn test_is_ok() {
        assert!(Status::Ok.is_ok());
        assert!(Status::PartiallyAvailable.is_ok());
        assert!(!Status::Unavailable.is_ok());
    }

    #[test]
    fn test_serialized_names() {
        assert_eq!(
            serde_json::to_string(&Status::PartiallyAvailable).unwrap(),
            "\"Partially Available\""
        );
        assert_eq!(serde_json::to_string(&Status::Ok).unwrap(), "\"OK\"");
    }
}
