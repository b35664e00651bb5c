//! Optimization tracing.
//!
//! Rules report every rewrite they perform to an [`OptimizeTrace`]. The
//! optimizer uses the step count to tell whether a pass changed the plan;
//! the step details are only kept when tracing is enabled.

use std::fmt;

/// One rewrite performed by a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceStep {
    /// Rule that performed the rewrite.
    pub rule: String,
    /// What was rewritten.
    pub action: String,
    /// Why the rewrite was valid.
    pub reason: String,
}

impl fmt::Display for TraceStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.rule, self.action, self.reason)
    }
}

/// Collects the rewrites of one optimization run.
#[derive(Debug, Clone, Default)]
pub struct OptimizeTrace {
    enabled: bool,
    step_count: usize,
    steps: Vec<TraceStep>,
}

impl OptimizeTrace {
    /// Creates a trace that keeps step details if `enabled`.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }

    /// Creates a trace that only counts steps.
    pub fn disabled() -> Self {
        Self::new(false)
    }

    /// Returns true if step details are kept.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Records a rewrite. The descriptions are only rendered when tracing
    /// is enabled.
    pub fn record<A, R>(&mut self, rule: &str, action: A, reason: R)
    where
        A: FnOnce() -> String,
        R: FnOnce() -> String,
    {
        self.step_count += 1;
        if self.enabled {
            self.steps.push(TraceStep {
                rule: rule.to_string(),
                action: action(),
                reason: reason(),
            });
        }
    }

    /// Returns the number of recorded rewrites.
    pub fn step_count(&self) -> usize {
        self.step_count
    }

    /// Returns the recorded steps.
    pub fn steps(&self) -> &[TraceStep] {
        &self.steps
    }

    /// Consumes the trace, returning the recorded steps.
    pub fn into_steps(self) -> Vec<TraceStep> {
        self.steps
    }
}
