//! Integration tests for the optimizer driver and its configuration.

use std::sync::Arc;

use nexus_planner::logical::{Expr, LogicalOperator, LogicalPlan};
use nexus_planner::optimizer::{
    OptimizeTrace, Optimizer, OptimizerConfig, OptimizerContext, OptimizerError, OptimizerResult,
    OptimizerRule, GC_SUBSTITUTE_RULE_NAME,
};
use nexus_planner::types::FieldType;
use nexus_test::utils::{ci_str, fixture_catalog, init_tracing, scan};
use tempfile::TempDir;

fn plan() -> LogicalPlan {
    let catalog = fixture_catalog();
    let builder = scan(&catalog, "t");
    let a = builder.col("a").unwrap();
    let b = builder.col("b").unwrap();
    let predicate = a
        .plus(Expr::lit_i64(1))
        .eq(Expr::lit_i64(5))
        .and(Expr::func("concat", vec![b, ci_str("X")], FieldType::varchar(20)).eq(Expr::lit_str("bx")));
    builder.filter(predicate).unwrap().build()
}

fn conditions(plan: &LogicalPlan) -> Vec<String> {
    match &plan.root {
        LogicalOperator::Filter(filter) => filter.conditions.iter().map(|c| c.to_string()).collect(),
        other => panic!("Expected filter, got {}", other.name()),
    }
}

#[derive(Debug)]
struct FailingRule;

impl OptimizerRule for FailingRule {
    fn name(&self) -> &str {
        "failing"
    }

    fn optimize(
        &self,
        _ctx: &OptimizerContext,
        _plan: LogicalPlan,
        _trace: &mut OptimizeTrace,
    ) -> OptimizerResult<LogicalPlan> {
        Err(OptimizerError::RuleFailed {
            rule: self.name().to_string(),
            message: "always fails".to_string(),
        })
    }
}

#[test]
fn test_default_optimizer_substitutes() {
    init_tracing();
    let optimizer = Optimizer::default_optimizer();
    let (optimized, stats) = optimizer.optimize_with_stats(plan()).unwrap();

    assert_eq!(conditions(&optimized), vec!["t.g = 5", "t.k = 'bx'"]);
    assert_eq!(stats.iterations, 2);
    assert_eq!(stats.rules_applied, 1);
    assert_eq!(stats.applications_of(GC_SUBSTITUTE_RULE_NAME), 1);
    assert!(stats.trace.is_empty());
}

#[test]
fn test_disabled_rule_leaves_plan_alone() {
    init_tracing();
    for config in [
        OptimizerConfig::minimal(),
        OptimizerConfig::default().with_disabled_rule(GC_SUBSTITUTE_RULE_NAME),
    ] {
        let optimizer = Optimizer::new(config);
        let (optimized, stats) = optimizer.optimize_with_stats(plan()).unwrap();

        assert_eq!(
            conditions(&optimized),
            vec!["(t.a + 1) = 5", "concat(t.b, 'X') = 'bx'"]
        );
        assert_eq!(stats.rules_applied, 0);
        assert_eq!(stats.iterations, 1);
    }
}

#[test]
fn test_trace_collected_when_enabled() {
    init_tracing();
    let optimizer = Optimizer::new(OptimizerConfig::default().with_trace(true));
    let (_, stats) = optimizer.optimize_with_stats(plan()).unwrap();

    let rendered: Vec<_> = stats.trace.iter().map(|s| s.action.clone()).collect();
    assert_eq!(rendered, vec!["t.a + 1 -> t.g", "concat(t.b, 'X') -> t.k"]);
    assert!(stats
        .trace
        .iter()
        .all(|s| s.rule == GC_SUBSTITUTE_RULE_NAME));
}

#[test]
fn test_config_file_drives_optimizer() {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("optimizer.toml");
    std::fs::write(
        &path,
        "max_iterations = 4\nenable_trace = true\nnew_collation_enabled = false\n",
    )
    .unwrap();

    let config = OptimizerConfig::from_file(&path).unwrap();
    assert_eq!(config.max_iterations, 4);
    assert!(config.enable_gc_substitute);

    let optimizer = Optimizer::new(config);
    let (optimized, stats) = optimizer.optimize_with_stats(plan()).unwrap();

    // Constants compare binary in either collation mode.
    assert_eq!(conditions(&optimized), vec!["t.g = 5", "t.k = 'bx'"]);
    assert_eq!(stats.trace.len(), 2);
}

#[test]
fn test_saved_config_round_trips() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("optimizer.toml");

    let config = OptimizerConfig::full()
        .with_max_iterations(5)
        .with_disabled_rule("failing");
    config.save(&path).unwrap();

    let loaded = OptimizerConfig::from_file(&path).unwrap();
    assert_eq!(loaded, config);
    assert!(!loaded.is_rule_enabled("failing"));
}

#[test]
fn test_rule_errors_propagate() {
    init_tracing();
    let mut optimizer = Optimizer::default_optimizer();
    optimizer.add_rule(Arc::new(FailingRule));

    let err = optimizer.optimize(plan()).unwrap_err();
    assert!(matches!(err, OptimizerError::RuleFailed { ref rule, .. } if rule == "failing"));
    assert_eq!(err.to_string(), "Rule 'failing' failed: always fails");
}

#[test]
fn test_blocked_custom_rule_is_skipped() {
    let mut optimizer =
        Optimizer::new(OptimizerConfig::default().with_disabled_rule("FAILING"));
    optimizer.add_rule(Arc::new(FailingRule));

    assert_eq!(
        optimizer.rule_names(),
        vec![GC_SUBSTITUTE_RULE_NAME, "failing"]
    );
    let optimized = optimizer.optimize(plan()).unwrap();
    assert_eq!(conditions(&optimized), vec!["t.g = 5", "t.k = 'bx'"]);
}
