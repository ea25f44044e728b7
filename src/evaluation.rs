//! Iterative policy evaluation.
//!
//! Each sweep computes every state's new value from the values as they stood
//! at the start of the sweep, so per-state work is independent and may run
//! in parallel without changing the result.

use ndarray::Array2;
use rayon::prelude::*;
use tracing::{debug, trace};

use crate::config::SolverParams;
use crate::error::SolveError;
use crate::model::{backup, TransitionModel};
use crate::policy::{Policy, ValueFunction};
use crate::state::State;

/// Converged value function and how long it took to get there.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub values: ValueFunction,
    pub sweeps: usize,
    /// Largest per-state change in the final sweep
    pub delta: f64,
}

/// One synchronous Bellman expectation sweep over every state.
pub fn sweep(
    model: &TransitionModel,
    policy: &Policy,
    values: &ValueFunction,
    gamma: f64,
    parallel: bool,
) -> Result<ValueFunction, SolveError> {
    let states: Vec<State> = model.states().collect();
    let update = |s: &State| -> Result<f64, SolveError> {
        Ok(backup(model.outcomes(*s, policy.get(*s))?, values, gamma))
    };
    let next: Vec<f64> = if parallel {
        states.par_iter().map(update).collect::<Result<_, _>>()?
    } else {
        states.iter().map(update).collect::<Result<_, _>>()?
    };
    let dim = model.max_cars() as usize + 1;
    Ok(ValueFunction { values: Array2::from_shape_vec((dim, dim), next)? })
}

/// Sweep from `init` until no state changes by `params.theta` or more.
pub fn evaluate(
    model: &TransitionModel,
    policy: &Policy,
    init: &ValueFunction,
    params: &SolverParams,
) -> Result<Evaluation, SolveError> {
    let mut values = init.clone();
    let mut delta = f64::INFINITY;
    for n in 1..=params.max_sweeps {
        let next = sweep(model, policy, &values, params.gamma, params.parallel)?;
        delta = next.max_abs_diff(&values);
        values = next;
        trace!(sweep = n, delta, "policy evaluation sweep");
        if delta < params.theta {
            debug!(sweeps = n, delta, "policy evaluation converged");
            return Ok(Evaluation { values, sweeps: n, delta });
        }
    }
    Err(SolveError::EvaluationNotConverged { sweeps: params.max_sweeps, delta })
}
