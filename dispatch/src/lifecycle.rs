//! Dispatch lifecycle state machine
//!
//! Every dispatch starts in `Routing` and ends in `Completed` or `Failed`:
//!
//! ```text
//! Routing -> Executing -> Finalizing -> Completed
//!    \__________\____________\_______> Failed
//! ```
//!
//! Each transition is validated and recorded so a failed dispatch can be
//! diagnosed from its transition log.

use crate::error::{codes, ErrorRecord};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPhase {
    /// Resolving method and mode
    Routing,
    /// Solver or sweep running
    Executing,
    /// Identity, artifacts, ledger
    Finalizing,
    Completed,
    Failed,
}

impl DispatchPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for DispatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Routing => write!(f, "Routing"),
            Self::Executing => write!(f, "Executing"),
            Self::Finalizing => write!(f, "Finalizing"),
            Self::Completed => write!(f, "Completed"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

fn is_legal_transition(from: DispatchPhase, to: DispatchPhase) -> bool {
    use DispatchPhase::*;

    if to == Failed && !from.is_terminal() {
        return true;
    }

    matches!(
        (from, to),
        (Routing, Executing) | (Executing, Finalizing) | (Finalizing, Completed)
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: DispatchPhase,
    pub to: DispatchPhase,
    /// Milliseconds since the dispatch started
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IllegalTransition {
    pub from: DispatchPhase,
    pub to: DispatchPhase,
}

impl fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Illegal dispatch transition: {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for IllegalTransition {}

impl From<IllegalTransition> for ErrorRecord {
    fn from(err: IllegalTransition) -> Self {
        ErrorRecord::known(codes::ILLEGAL_TRANSITION, err.to_string())
            .with_context("from", err.from.to_string())
            .with_context("to", err.to.to_string())
    }
}

/// Lifecycle of a single dispatch.
pub struct DispatchLifecycle {
    current: DispatchPhase,
    started: Instant,
    transitions: Vec<TransitionRecord>,
}

impl DispatchLifecycle {
    pub fn new() -> Self {
        Self {
            current: DispatchPhase::Routing,
            started: Instant::now(),
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> DispatchPhase {
        self.current
    }

    pub fn advance(
        &mut self,
        to: DispatchPhase,
        reason: Option<&str>,
    ) -> Result<(), IllegalTransition> {
        if !is_legal_transition(self.current, to) {
            return Err(IllegalTransition {
                from: self.current,
                to,
            });
        }

        tracing::debug!(from = %self.current, to = %to, "Dispatch transition");

        self.transitions.push(TransitionRecord {
            from: self.current,
            to,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
            reason: reason.map(String::from),
        });
        self.current = to;
        Ok(())
    }

    /// Move to `Failed`, recording the error code as the reason.
    ///
    /// Failing an already terminal lifecycle is a no-op so the original error
    /// is the one reported.
    pub fn fail(&mut self, err: &ErrorRecord) {
        if self.current.is_terminal() {
            return;
        }
        let reason = err.code().to_string();
        if let Err(e) = self.advance(DispatchPhase::Failed, Some(&reason)) {
            tracing::warn!(error = %e, "Could not record dispatch failure");
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    pub fn into_transitions(self) -> Vec<TransitionRecord> {
        self.transitions
    }

    /// `Routing -> Executing -> ... (12ms)`
    pub fn summary(&self) -> String {
        let mut states = vec![DispatchPhase::Routing.to_string()];
        states.extend(self.transitions.iter().map(|t| t.to.to_string()));
        format!(
            "{} ({}ms)",
            states.join(" -> "),
            self.started.elapsed().as_millis()
        )
    }
}

impl Default for DispatchLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
