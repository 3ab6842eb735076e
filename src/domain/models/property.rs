//! Generators and the seeded random source for the PropertyTester (C5).
//!
//! A generator is data — `{generate, shrink}` — dispatched by the engine,
//! not a class hierarchy, matching this crate's existing enum-dispatch style
//! for validation rules.

use std::collections::HashMap;

use serde_json::Value;

use super::exec_state::{ExecState, ExecutionContext};

/// Linear-congruential pseudo-random generator. Deterministic given a seed,
/// so every failing property-test run is reproducible from its seed alone.
#[derive(Debug, Clone)]
pub struct Lcg {
    state: u64,
}

impl Lcg {
    /// Constants from Numerical Recipes' LCG (`a`, `c`, modulus 2^64).
    const MULTIPLIER: u64 = 6_364_136_223_846_793_005;
    const INCREMENT: u64 = 1_442_695_040_888_963_407;

    pub const fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_mul(Self::MULTIPLIER).wrapping_add(Self::INCREMENT);
        self.state
    }

    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    pub fn next_bool(&mut self) -> bool {
        self.next_u64() % 2 == 0
    }

    /// Inclusive range `[lo, hi]`.
    pub fn next_range(&mut self, lo: i64, hi: i64) -> i64 {
        if hi <= lo {
            return lo;
        }
        let span = (hi - lo + 1) as u64;
        lo + (self.next_u64() % span) as i64
    }
}

/// A value-producing, optionally-shrinking generator for type `T`.
pub trait Generator<T> {
    fn generate(&self, rng: &mut Lcg) -> T;
    fn shrink(&self, _value: &T) -> Vec<T> {
        Vec::new()
    }
}

pub struct BoundedString {
    pub min_len: usize,
    pub max_len: usize,
    pub alphabet: &'static str,
}

impl Generator<String> for BoundedString {
    fn generate(&self, rng: &mut Lcg) -> String {
        let len = rng.next_range(self.min_len as i64, self.max_len as i64) as usize;
        let chars: Vec<char> = self.alphabet.chars().collect();
        (0..len)
            .map(|_| chars[rng.next_range(0, chars.len() as i64 - 1) as usize])
            .collect()
    }

    fn shrink(&self, value: &String) -> Vec<String> {
        if value.is_empty() {
            Vec::new()
        } else {
            vec![value[..value.len() - 1].to_string()]
        }
    }
}

pub struct BoundedInt {
    pub min: i64,
    pub max: i64,
}

impl Generator<i64> for BoundedInt {
    fn generate(&self, rng: &mut Lcg) -> i64 {
        rng.next_range(self.min, self.max)
    }

    fn shrink(&self, value: &i64) -> Vec<i64> {
        if *value == 0 {
            Vec::new()
        } else {
            vec![*value / 2, value.signum() * (value.abs() - 1).max(0)]
        }
    }
}

pub struct ExecutionStateGen;

impl Generator<ExecState> for ExecutionStateGen {
    fn generate(&self, rng: &mut Lcg) -> ExecState {
        const STATES: [ExecState; 7] = [
            ExecState::Idle,
            ExecState::Planning,
            ExecState::Executing,
            ExecState::Verifying,
            ExecState::Committing,
            ExecState::Completed,
            ExecState::Failed,
        ];
        STATES[rng.next_range(0, STATES.len() as i64 - 1) as usize]
    }
}

/// Produces a random `ExecutionContext` per the shape fixed by §4.5:
/// 0-5 inputs mixing string/int/bool/null; outputs present when
/// `state ∈ {COMPLETED, VERIFYING, COMMITTING}`; `endTime` present when
/// `state ∈ {COMPLETED, FAILED}`; an error when `state == FAILED` with
/// probability ½.
pub struct ExecutionContextGen;

impl Generator<ExecutionContext> for ExecutionContextGen {
    fn generate(&self, rng: &mut Lcg) -> ExecutionContext {
        let state = ExecutionStateGen.generate(rng);
        let mut ctx = ExecutionContext::new("prop-test", "prop-task");
        ctx.state = state;

        let input_count = rng.next_range(0, 5);
        for i in 0..input_count {
            let value = match rng.next_range(0, 3) {
                0 => Value::String(BoundedString { min_len: 1, max_len: 8, alphabet: "abcdefghij" }.generate(rng)),
                1 => Value::Number(BoundedInt { min: -100, max: 100 }.generate(rng).into()),
                2 => Value::Bool(rng.next_bool()),
                _ => Value::Null,
            };
            ctx.inputs.insert(format!("in{i}"), value);
        }

        if matches!(state, ExecState::Completed | ExecState::Verifying | ExecState::Committing) {
            let mut outputs = HashMap::new();
            outputs.insert("result".to_string(), Value::String("ok".to_string()));
            ctx.outputs = Some(outputs);
        }

        if matches!(state, ExecState::Completed | ExecState::Failed) {
            ctx.end_time = Some(ctx.start_time + chrono::Duration::milliseconds(rng.next_range(1, 5000)));
        }

        if state == ExecState::Failed && rng.next_bool() {
            ctx.error = Some("generated failure".to_string());
        }

        ctx
    }

    /// Shrinks toward IDLE and smaller inputs/outputs, per the engine's
    /// same-failing-condition-only acceptance rule (applied by the caller).
    fn shrink(&self, value: &ExecutionContext) -> Vec<ExecutionContext> {
        let mut candidates = Vec::new();

        if let Some(key) = value.inputs.keys().next().cloned() {
            let mut c = value.clone();
            c.inputs.remove(&key);
            candidates.push(c);
        }

        if let Some(outputs) = &value.outputs {
            if let Some(key) = outputs.keys().next().cloned() {
                let mut c = value.clone();
                if let Some(out) = c.outputs.as_mut() {
                    out.remove(&key);
                }
                candidates.push(c);
            }
        }

        if value.error.is_some() {
            let mut c = value.clone();
            c.error = None;
            candidates.push(c);
        }

        if let Some(prev) = step_toward_idle(value.state) {
            let mut c = value.clone();
            c.state = prev;
            candidates.push(c);
        }

        candidates
    }
}

fn step_toward_idle(state: ExecState) -> Option<ExecState> {
    match state {
        ExecState::Idle => None,
        ExecState::Planning => Some(ExecState::Idle),
        ExecState::Executing => Some(ExecState::Planning),
        ExecState::Verifying => Some(ExecState::Executing),
        ExecState::Committing => Some(ExecState::Verifying),
        ExecState::Completed => Some(ExecState::Committing),
        ExecState::Failed => Some(ExecState::Verifying),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lcg_is_deterministic_given_a_seed() {
        let mut a = Lcg::new(42);
        let mut b = Lcg::new(42);
        for _ in 0..10 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn bounded_int_respects_range() {
        let gen = BoundedInt { min: -5, max: 5 };
        let mut rng = Lcg::new(7);
        for _ in 0..50 {
            let v = gen.generate(&mut rng);
            assert!((-5..=5).contains(&v));
        }
    }

    #[test]
    fn context_gen_respects_shape_invariants() {
        let mut rng = Lcg::new(123);
        for _ in 0..50 {
            let ctx = ExecutionContextGen.generate(&mut rng);
            if matches!(ctx.state, ExecState::Completed | ExecState::Failed) {
                assert!(ctx.end_time.is_some());
            } else {
                assert!(ctx.end_time.is_none());
            }
        }
    }
}
