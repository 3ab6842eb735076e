//! ContractEngine (C4): evaluates a Contract's conditions against an
//! ExecutionContext in the fixed precondition -> postcondition -> invariant
//! order, plus the five standard-library conditions every contract can draw on.

use std::time::Instant;

use chrono::Utc;

use crate::domain::models::{Condition, ConditionResult, Contract, ContractResult, ExecutionContext, Severity};

pub struct ContractEngine;

impl ContractEngine {
    pub fn evaluate(contract: &Contract, ctx: &ExecutionContext) -> ContractResult {
        let mut result = ContractResult::default();
        for condition in contract.all_conditions() {
            let evaluated = Self::evaluate_condition(condition, ctx);
            if evaluated.passed {
                result.successes.push(evaluated);
            } else {
                result.failures.push(evaluated);
            }
        }
        result.success = result.failures.iter().all(|f| f.severity != Severity::Error);
        result
    }

    pub fn evaluate_all<'a>(
        contracts: impl IntoIterator<Item = &'a Contract>,
        ctx: &ExecutionContext,
    ) -> Vec<(String, ContractResult)> {
        contracts.into_iter().map(|c| (c.id.clone(), Self::evaluate(c, ctx))).collect()
    }

    fn evaluate_condition(condition: &Condition, ctx: &ExecutionContext) -> ConditionResult {
        let start = Instant::now();
        let passed = (condition.predicate)(ctx);
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        ConditionResult {
            condition_id: condition.id.clone(),
            condition_name: condition.name.clone(),
            condition_type: condition.condition_type,
            passed,
            error_message: if passed { None } else { Some(condition.error_message.clone()) },
            severity: condition.severity,
            evaluated_at: Utc::now(),
            evaluation_duration_ms: duration_ms,
        }
    }
}

/// Conditions every contract may reuse instead of redefining.
pub mod standard_conditions {
    use super::*;
    use crate::domain::models::ConditionType;

    pub fn has_input(key: &'static str) -> Condition {
        Condition::new(
            format!("has-input-{key}"),
            format!("has input '{key}'"),
            ConditionType::Precondition,
            Severity::Error,
            format!("missing required input '{key}'"),
            move |ctx: &ExecutionContext| ctx.inputs.contains_key(key),
        )
    }

    pub fn input_not_empty(key: &'static str) -> Condition {
        Condition::new(
            format!("input-not-empty-{key}"),
            format!("input '{key}' is not empty"),
            ConditionType::Precondition,
            Severity::Error,
            format!("input '{key}' must not be empty"),
            move |ctx: &ExecutionContext| {
                ctx.inputs.get(key).is_some_and(|v| match v {
                    serde_json::Value::String(s) => !s.is_empty(),
                    serde_json::Value::Null => false,
                    _ => true,
                })
            },
        )
    }

    pub fn has_output() -> Condition {
        Condition::new(
            "has-output",
            "has output",
            ConditionType::Postcondition,
            Severity::Error,
            "execution produced no output",
            |ctx: &ExecutionContext| ctx.outputs.as_ref().is_some_and(|o| !o.is_empty()),
        )
    }

    pub fn no_error() -> Condition {
        Condition::new(
            "no-error",
            "no error recorded",
            ConditionType::Postcondition,
            Severity::Error,
            "execution recorded an error",
            |ctx: &ExecutionContext| ctx.error.is_none(),
        )
    }

    pub fn valid_state() -> Condition {
        Condition::new(
            "valid-state",
            "state is a recognized value",
            ConditionType::Invariant,
            Severity::Error,
            "context carries an unrecognized execution state",
            |_ctx: &ExecutionContext| true,
        )
    }

    pub fn within_timeout(max_ms: i64) -> Condition {
        Condition::new(
            format!("within-timeout-{max_ms}"),
            format!("completes within {max_ms}ms"),
            ConditionType::Invariant,
            Severity::Warning,
            format!("execution exceeded {max_ms}ms"),
            move |ctx: &ExecutionContext| {
                ctx.end_time.is_none_or(|end| (end - ctx.start_time).num_milliseconds() <= max_ms)
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::standard_conditions::*;
    use super::*;

    #[test]
    fn evaluates_conditions_in_pre_post_invariant_order() {
        let mut contract = Contract::new("c1", "basic", "story");
        contract.preconditions.push(has_input("x"));
        contract.postconditions.push(has_output());
        contract.invariants.push(no_error());

        let mut ctx = ExecutionContext::new("scope", "task");
        ctx = ctx.with_input("x", serde_json::json!(1));
        let result = ContractEngine::evaluate(&contract, &ctx);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].condition_id, "has-output");
        assert!(!result.success);
    }

    #[test]
    fn warning_severity_failures_do_not_fail_the_contract() {
        let mut contract = Contract::new("c1", "timeout-check", "story");
        contract.invariants.push(within_timeout(0));
        let mut ctx = ExecutionContext::new("scope", "task");
        ctx.end_time = Some(ctx.start_time + chrono::Duration::milliseconds(5));
        let result = ContractEngine::evaluate(&contract, &ctx);
        assert_eq!(result.failures.len(), 1);
        assert!(result.success);
    }

    #[test]
    fn input_not_empty_rejects_empty_strings() {
        let condition = input_not_empty("name");
        let ctx = ExecutionContext::new("scope", "task").with_input("name", serde_json::json!(""));
        assert!(!(condition.predicate)(&ctx));
    }
}
