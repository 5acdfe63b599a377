//! Failure classification for workload operations.
//!
//! During a switchover the interesting failures are a small set: the write
//! path getting rejected because the connected node is in a read-only role,
//! and errors that indicate the connection or endpoint went away underneath
//! the client. Everything else is noise for this harness.

use serde::Serialize;
use std::fmt;

/// Classification of a single failed database operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A statement refused because the serving node is read-only.
    ReadOnlyRejection,
    /// The connection or endpoint became unreachable or was redirected.
    FailoverSignal,
    /// Anything else (syntax errors, constraint violations, ...).
    Other,
}

/// A database failure as seen by a worker: message text plus the vendor
/// error code when the server supplied one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DbFailure {
    pub message: String,
    pub code: Option<u16>,
}

impl DbFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(message: impl Into<String>, code: u16) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
        }
    }
}

impl fmt::Display for DbFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "[{code}] {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

struct Rule {
    kind: FailureKind,
    phrases: &'static [&'static str],
    codes: &'static [u16],
}

/// Ordered by precedence: a failure matching several rules takes the first.
/// Read-only stays ahead of failover because a rejection message can also
/// mention the connection, and the read-only role is the more specific,
/// intentional signal.
const RULES: &[Rule] = &[
    Rule {
        kind: FailureKind::ReadOnlyRejection,
        phrases: &["read-only", "read only"],
        // ER_OPTION_PREVENTS_STATEMENT
        codes: &[1290],
    },
    Rule {
        kind: FailureKind::FailoverSignal,
        phrases: &[
            "failover",
            "connection",
            "communications link failure",
            "lost connection",
        ],
        // ER_UNKNOWN_COM_ERROR, ER_SERVER_SHUTDOWN
        codes: &[1047, 1053],
    },
];

/// Map one failure to exactly one [`FailureKind`]. Pure and deterministic;
/// phrase matching is case-insensitive.
pub fn classify(failure: &DbFailure) -> FailureKind {
    let message = failure.message.to_ascii_lowercase();
    for rule in RULES {
        if rule.phrases.iter().any(|phrase| message.contains(phrase))
            || failure.code.is_some_and(|code| rule.codes.contains(&code))
        {
            return rule.kind;
        }
    }
    FailureKind::Other
}
