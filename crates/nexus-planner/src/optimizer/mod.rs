//! Query optimizer for NexusDB.
//!
//! This module implements a rule-based optimizer that rewrites logical
//! plans in place. Rules run in registration order, and the whole rule set
//! is repeated until a pass performs no rewrite or the configured number of
//! passes is reached.
//!
//! # Architecture
//!
//! - **OptimizerRule**: Trait for individual optimization rules
//! - **Optimizer**: Coordinates rule application and collects statistics
//! - **OptimizeTrace**: Records every rewrite a rule performs
//!
//! # Optimization Rules
//!
//! - **GeneratedColumnSubstitution**: Replaces expressions equal to the
//!   definition of an indexed virtual generated column with the column
//!
//! # Example
//!
//! ```ignore
//! use nexus_planner::optimizer::{Optimizer, OptimizerConfig};
//!
//! let optimizer = Optimizer::new(OptimizerConfig::default());
//! let optimized_plan = optimizer.optimize(plan)?;
//! ```

mod config;
mod gc_substitute;
mod trace;

pub use config::{ConfigError, ConfigResult, OptimizerConfig};
pub use gc_substitute::*;
pub use trace::{OptimizeTrace, TraceStep};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::debug;

use crate::logical::LogicalPlan;
use crate::types::EvalContext;

/// Errors that can occur during optimization.
#[derive(Debug, Error)]
pub enum OptimizerError {
    /// Rule application failed.
    #[error("Rule '{rule}' failed: {message}")]
    RuleFailed {
        /// Rule name.
        rule: String,
        /// Error message.
        message: String,
    },

    /// The optimizer configuration is unusable.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Internal optimizer error.
    #[error("Internal optimizer error: {0}")]
    Internal(String),
}

/// Result type for optimizer operations.
pub type OptimizerResult<T> = Result<T, OptimizerError>;

/// Session state rules evaluate expressions under.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptimizerContext {
    /// Expression evaluation settings.
    pub eval: EvalContext,
}

impl OptimizerContext {
    /// Creates a context from evaluation settings.
    pub fn new(eval: EvalContext) -> Self {
        Self { eval }
    }

    /// Creates a context matching an optimizer configuration.
    pub fn from_config(config: &OptimizerConfig) -> Self {
        Self::new(EvalContext::new(config.new_collation_enabled))
    }
}

/// Trait for optimizer rules.
///
/// Rules rewrite the plan they are given and report each rewrite to the
/// trace. A rule must be idempotent: running it on its own output performs
/// no further rewrite.
pub trait OptimizerRule: std::fmt::Debug + Send + Sync {
    /// Returns the name of this rule.
    fn name(&self) -> &str;

    /// Optimizes the given plan.
    fn optimize(
        &self,
        ctx: &OptimizerContext,
        plan: LogicalPlan,
        trace: &mut OptimizeTrace,
    ) -> OptimizerResult<LogicalPlan>;
}

/// Statistics about optimization.
#[derive(Debug, Clone, Default)]
pub struct OptimizationStats {
    /// Number of iterations performed.
    pub iterations: usize,
    /// Number of rules applied.
    pub rules_applied: usize,
    /// Per-rule application counts.
    pub rule_applications: Vec<(String, usize)>,
    /// Total optimization time in microseconds.
    pub total_time_us: u64,
    /// Rewrites performed, when tracing is enabled.
    pub trace: Vec<TraceStep>,
}

impl OptimizationStats {
    /// Returns how many passes of the named rule changed the plan.
    pub fn applications_of(&self, rule: &str) -> usize {
        self.rule_applications
            .iter()
            .find(|(name, _)| name == rule)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }
}

/// The query optimizer.
#[derive(Debug)]
pub struct Optimizer {
    config: OptimizerConfig,
    rules: Vec<Arc<dyn OptimizerRule>>,
}

impl Optimizer {
    /// Creates a new optimizer with the given configuration.
    pub fn new(config: OptimizerConfig) -> Self {
        let mut rules: Vec<Arc<dyn OptimizerRule>> = Vec::new();

        if config.is_rule_enabled(GC_SUBSTITUTE_RULE_NAME) {
            rules.push(Arc::new(GeneratedColumnSubstitutionRule));
        }

        Self { config, rules }
    }

    /// Creates an optimizer with default configuration.
    pub fn default_optimizer() -> Self {
        Self::new(OptimizerConfig::default())
    }

    /// Optimizes a logical plan.
    pub fn optimize(&self, plan: LogicalPlan) -> OptimizerResult<LogicalPlan> {
        let (optimized, _) = self.optimize_with_stats(plan)?;
        Ok(optimized)
    }

    /// Optimizes a logical plan and returns optimization statistics.
    pub fn optimize_with_stats(
        &self,
        plan: LogicalPlan,
    ) -> OptimizerResult<(LogicalPlan, OptimizationStats)> {
        self.config.validate()?;

        let start = Instant::now();
        let ctx = OptimizerContext::from_config(&self.config);
        let mut trace = OptimizeTrace::new(self.config.enable_trace);
        let mut stats = OptimizationStats::default();
        let mut rule_counts: HashMap<String, usize> = HashMap::new();

        let mut current_plan = plan;

        for iteration in 0..self.config.max_iterations {
            stats.iterations = iteration + 1;
            let mut plan_changed = false;

            for rule in &self.rules {
                if !self.config.is_rule_enabled(rule.name()) {
                    continue;
                }

                let before = trace.step_count();
                current_plan = rule.optimize(&ctx, current_plan, &mut trace)?;
                let rewrites = trace.step_count() - before;

                if rewrites > 0 {
                    debug!(rule = rule.name(), iteration, rewrites, "rule rewrote plan");
                    plan_changed = true;
                    stats.rules_applied += 1;
                    *rule_counts.entry(rule.name().to_string()).or_insert(0) += 1;
                }
            }

            if !plan_changed {
                break;
            }
        }

        let mut rule_applications: Vec<(String, usize)> = rule_counts.into_iter().collect();
        rule_applications.sort();
        stats.rule_applications = rule_applications;
        stats.total_time_us = start.elapsed().as_micros() as u64;
        stats.trace = trace.into_steps();

        debug!(
            iterations = stats.iterations,
            rules_applied = stats.rules_applied,
            elapsed_us = stats.total_time_us,
            "optimization finished"
        );

        Ok((current_plan, stats))
    }

    /// Adds a custom optimization rule.
    pub fn add_rule(&mut self, rule: Arc<dyn OptimizerRule>) {
        self.rules.push(rule);
    }

    /// Returns the names of the registered rules, in application order.
    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Returns the current configuration.
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::default_optimizer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnInfo, IndexInfo, TableInfo};
    use crate::logical::{ColumnIdAllocator, Expr, LogicalOperator, PlanBuilder};
    use crate::types::FieldType;

    fn plan() -> LogicalPlan {
        let a = ColumnInfo::new(1, "a", FieldType::int());
        let g = ColumnInfo::new(2, "g", FieldType::bigint())
            .virtual_generated(a.to_expr().plus(Expr::lit_i64(1)));
        let table = TableInfo::new("t")
            .with_column(a)
            .with_column(g)
            .with_index(IndexInfo::new("idx_g", vec![1], false));

        let ids = ColumnIdAllocator::new();
        let builder = PlanBuilder::scan(&ids, Arc::new(table));
        let a = builder.col("a").unwrap();
        builder
            .filter(a.plus(Expr::lit_i64(1)).eq(Expr::lit_i64(5)))
            .unwrap()
            .build()
    }

    /// Counts its invocations through the trace without touching the plan.
    #[derive(Debug)]
    struct AlwaysRewrites;

    impl OptimizerRule for AlwaysRewrites {
        fn name(&self) -> &str {
            "always_rewrites"
        }

        fn optimize(
            &self,
            _ctx: &OptimizerContext,
            plan: LogicalPlan,
            trace: &mut OptimizeTrace,
        ) -> OptimizerResult<LogicalPlan> {
            trace.record(self.name(), || "noop".to_string(), || "test".to_string());
            Ok(plan)
        }
    }

    #[test]
    fn test_optimizer_creation() {
        let optimizer = Optimizer::new(OptimizerConfig::default());
        assert_eq!(optimizer.rule_names(), vec![GC_SUBSTITUTE_RULE_NAME]);

        let optimizer = Optimizer::new(OptimizerConfig::minimal());
        assert!(optimizer.rule_names().is_empty());
    }

    #[test]
    fn test_optimizer_substitutes_and_stops() {
        let optimizer = Optimizer::new(OptimizerConfig::default().with_trace(true));
        let (optimized, stats) = optimizer.optimize_with_stats(plan()).unwrap();

        assert_eq!(stats.iterations, 2);
        assert_eq!(stats.rules_applied, 1);
        assert_eq!(stats.applications_of(GC_SUBSTITUTE_RULE_NAME), 1);
        assert_eq!(stats.trace.len(), 1);

        let LogicalOperator::Filter(filter) = &optimized.root else {
            panic!("Expected filter");
        };
        assert_eq!(filter.conditions[0].to_string(), "t.g = 5");
    }

    #[test]
    fn test_optimizer_respects_max_iterations() {
        let mut optimizer = Optimizer::new(OptimizerConfig::minimal().with_max_iterations(3));
        optimizer.add_rule(Arc::new(AlwaysRewrites));

        let (_, stats) = optimizer.optimize_with_stats(plan()).unwrap();
        assert_eq!(stats.iterations, 3);
        assert_eq!(stats.applications_of("always_rewrites"), 3);
        assert!(stats.trace.is_empty());
    }

    #[test]
    fn test_optimizer_skips_blocked_custom_rule() {
        let mut optimizer =
            Optimizer::new(OptimizerConfig::minimal().with_disabled_rule("always_rewrites"));
        optimizer.add_rule(Arc::new(AlwaysRewrites));

        let (_, stats) = optimizer.optimize_with_stats(plan()).unwrap();
        assert_eq!(stats.iterations, 1);
        assert_eq!(stats.rules_applied, 0);
    }

    #[test]
    fn test_optimizer_rejects_invalid_config() {
        let optimizer = Optimizer::new(OptimizerConfig::default().with_max_iterations(0));
        assert!(matches!(
            optimizer.optimize(plan()),
            Err(OptimizerError::Config(ConfigError::Invalid(_)))
        ));
    }
}
