//! PropertyTester (C5): generate -> evaluate -> shrink loop over a
//! caller-supplied property, built on the seeded `Lcg` and `Generator<T>`
//! types shared with every other reproducible-random consumer in this crate.

use std::collections::HashMap;

use crate::domain::models::{ExecState, ExecutionContext, Generator, Lcg, PropertyTesterConfig};

/// One property-test failure: the minimal input that reproduced it plus the
/// number of shrink steps taken to get there.
#[derive(Debug, Clone)]
pub struct Failure {
    pub input: ExecutionContext,
    pub shrink_steps: u32,
}

/// Aggregate statistics over a test run, per §4.5.
#[derive(Debug, Clone, Default)]
pub struct TestStatistics {
    pub state_distribution: HashMap<ExecState, u32>,
    pub avg_input_complexity: f64,
    pub shrink_success_rate: f64,
    pub avg_shrink_steps: f64,
}

#[derive(Debug, Clone)]
pub struct TestReport {
    pub runs: u32,
    pub passed: u32,
    pub failures: Vec<Failure>,
    pub statistics: TestStatistics,
}

pub struct PropertyTester {
    config: PropertyTesterConfig,
}

impl PropertyTester {
    pub const fn new(config: PropertyTesterConfig) -> Self {
        Self { config }
    }

    /// Runs `property` against `num_runs` generated contexts. `collect_all`
    /// controls whether every failure is kept (true) or only the first
    /// (false, matching most property-testing frameworks' fail-fast default).
    pub fn run(
        &self,
        generator: &impl Generator<ExecutionContext>,
        property: impl Fn(&ExecutionContext) -> bool,
    ) -> TestReport {
        let mut rng = Lcg::new(self.config.seed);
        let mut failures = Vec::new();
        let mut passed = 0u32;
        let mut state_distribution: HashMap<ExecState, u32> = HashMap::new();
        let mut total_complexity = 0.0;
        let mut total_shrink_steps = 0u32;
        let mut shrunk_failures = 0usize;

        for _ in 0..self.config.num_runs {
            let input = generator.generate(&mut rng);
            *state_distribution.entry(input.state).or_insert(0) += 1;
            total_complexity += complexity_of(&input);

            if property(&input) {
                passed += 1;
                continue;
            }

            let (minimal, steps) = self.shrink(generator, &property, input);
            if steps > 0 {
                shrunk_failures += 1;
            }
            total_shrink_steps += steps;
            failures.push(Failure { input: minimal, shrink_steps: steps });

            if !self.config.collect_all {
                break;
            }
        }

        let runs = passed + u32::try_from(failures.len()).unwrap_or(u32::MAX);
        let statistics = TestStatistics {
            state_distribution,
            avg_input_complexity: if runs == 0 { 0.0 } else { total_complexity / f64::from(runs) },
            shrink_success_rate: if failures.is_empty() {
                0.0
            } else {
                shrunk_failures as f64 / failures.len() as f64
            },
            avg_shrink_steps: if failures.is_empty() { 0.0 } else { total_shrink_steps as f64 / failures.len() as f64 },
        };

        TestReport { runs, passed, failures, statistics }
    }

    /// Greedily shrinks `input` toward a minimal reproduction: at each step,
    /// take the first candidate that still fails the property, stop when
    /// none do or `max_shrinks` is reached.
    fn shrink(
        &self,
        generator: &impl Generator<ExecutionContext>,
        property: &impl Fn(&ExecutionContext) -> bool,
        mut current: ExecutionContext,
    ) -> (ExecutionContext, u32) {
        let mut steps: u32 = 0;
        while steps < self.config.max_shrinks {
            let candidates = generator.shrink(&current);
            let Some(next) = candidates.into_iter().find(|c| !property(c)) else { break };
            current = next;
            steps += 1;
        }
        (current, steps)
    }
}

fn complexity_of(ctx: &ExecutionContext) -> f64 {
    (ctx.inputs.len() + ctx.outputs.as_ref().map_or(0, std::collections::HashMap::len)) as f64
}
