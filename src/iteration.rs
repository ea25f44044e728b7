//! Policy iteration controller.
//!
//! The controller owns the transition model, the current policy and the
//! current value function. Each round evaluates the policy to convergence and
//! replaces it with the greedy policy for the new values. Iteration ends when
//! a round leaves every action unchanged.

use tracing::{info, warn};

use crate::config::{RentalConfig, SolverParams};
use crate::error::SolveError;
use crate::evaluation::evaluate;
use crate::improvement::improve;
use crate::model::TransitionModel;
use crate::policy::{Policy, ValueFunction};

/// Receives intermediate results, e.g. to draw or save them.
pub trait RoundObserver {
    /// Called with the improved policy after every round.
    fn on_policy(&mut self, round: usize, policy: &Policy) -> Result<(), SolveError>;

    /// Called once with the value function of the final policy.
    fn on_values(&mut self, values: &ValueFunction) -> Result<(), SolveError>;
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RoundObserver for NoopObserver {
    fn on_policy(&mut self, _round: usize, _policy: &Policy) -> Result<(), SolveError> {
        Ok(())
    }

    fn on_values(&mut self, _values: &ValueFunction) -> Result<(), SolveError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundReport {
    pub round: usize,
    pub sweeps: usize,
    pub delta: f64,
    pub changed: usize,
    pub stable: bool,
}

/// Optimal policy and its value function.
#[derive(Debug, Clone)]
pub struct Solution {
    pub policy: Policy,
    pub values: ValueFunction,
    pub rounds: Vec<RoundReport>,
}

pub struct PolicyIteration {
    model: TransitionModel,
    params: SolverParams,
    policy: Policy,
    values: ValueFunction,
    round: usize,
}

impl PolicyIteration {
    /// Start from the zero policy and zero values.
    pub fn new(model: TransitionModel, params: SolverParams) -> PolicyIteration {
        let max_cars = model.max_cars();
        PolicyIteration {
            model,
            params,
            policy: Policy::new(max_cars),
            values: ValueFunction::new(max_cars),
            round: 0,
        }
    }

    pub fn from_config(config: &RentalConfig) -> Result<PolicyIteration, SolveError> {
        let model = TransitionModel::build(config)?;
        Ok(PolicyIteration::new(model, config.solver_params()))
    }

    pub fn model(&self) -> &TransitionModel {
        &self.model
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn values(&self) -> &ValueFunction {
        &self.values
    }

    pub fn params(&self) -> &SolverParams {
        &self.params
    }

    /// Replace the solver settings, e.g. to retry with higher caps after a
    /// non-convergence error. The model and current policy are kept.
    pub fn set_params(&mut self, params: SolverParams) {
        self.params = params;
    }

    /// Run one evaluation and one improvement.
    pub fn step(&mut self) -> Result<RoundReport, SolveError> {
        let round = self.round + 1;
        let eval = evaluate(&self.model, &self.policy, &self.values, &self.params)?;
        self.values = eval.values;
        let improvement = improve(&self.model, &self.values, &self.policy, &self.params)?;
        self.policy = improvement.policy;
        self.round = round;
        info!(
            round,
            sweeps = eval.sweeps,
            changed = improvement.changed,
            stable = improvement.stable,
            "policy iteration round"
        );
        Ok(RoundReport {
            round,
            sweeps: eval.sweeps,
            delta: eval.delta,
            changed: improvement.changed,
            stable: improvement.stable,
        })
    }

    /// Iterate until the policy is stable or `max_rounds` rounds have run.
    pub fn run(&mut self, observer: &mut impl RoundObserver) -> Result<Solution, SolveError> {
        let mut rounds = Vec::new();
        for _ in 0..self.params.max_rounds {
            let report = self.step()?;
            observer.on_policy(report.round, &self.policy)?;
            rounds.push(report);
            if report.stable {
                observer.on_values(&self.values)?;
                return Ok(Solution {
                    policy: self.policy.clone(),
                    values: self.values.clone(),
                    rounds,
                });
            }
        }
        warn!(rounds = self.params.max_rounds, "policy did not stabilize");
        Err(SolveError::PolicyNotStable { rounds: self.params.max_rounds })
    }
}

/// Build the model for `config` and run policy iteration to completion.
pub fn solve(config: &RentalConfig, observer: &mut impl RoundObserver) -> Result<Solution, SolveError> {
    PolicyIteration::from_config(config)?.run(observer)
}
