//! Greedy policy improvement.
//!
//! Ties between equally valued actions go to the action that comes first in
//! canonical order (`-max_move` up to `+max_move`). A later action replaces
//! the incumbent only if its value is strictly greater. The rule makes the
//! improved policy a pure function of the value function, so repeated runs
//! pick the same actions and the iteration cannot cycle between ties.

use ndarray::Array2;
use rayon::prelude::*;

use crate::config::SolverParams;
use crate::error::SolveError;
use crate::model::TransitionModel;
use crate::policy::{Policy, ValueFunction};
use crate::state::State;

/// Result of one improvement pass.
#[derive(Debug, Clone)]
pub struct Improvement {
    pub policy: Policy,
    /// Number of states whose action changed
    pub changed: usize,
    pub stable: bool,
}

/// Best feasible action at `s` with respect to `values`.
pub fn greedy_action(
    model: &TransitionModel,
    s: State,
    values: &ValueFunction,
    gamma: f64,
) -> Result<i8, SolveError> {
    let mut best: Option<(i8, f64)> = None;
    for a in model.feasible_actions(s) {
        let q = model.action_value(s, a, values, gamma)?;
        if best.map_or(true, |(_, best_q)| q > best_q) {
            best = Some((a, q));
        }
    }
    // The zero action is always feasible, so this only fails on a broken model.
    best.map(|(a, _)| a)
        .ok_or(SolveError::InfeasibleAction { state: s, action: 0 })
}

/// Build the greedy policy for `values` and compare it with `previous`.
pub fn improve(
    model: &TransitionModel,
    values: &ValueFunction,
    previous: &Policy,
    params: &SolverParams,
) -> Result<Improvement, SolveError> {
    let states: Vec<State> = model.states().collect();
    let choose = |s: &State| greedy_action(model, *s, values, params.gamma);
    let chosen: Vec<i8> = if params.parallel {
        states.par_iter().map(choose).collect::<Result<_, _>>()?
    } else {
        states.iter().map(choose).collect::<Result<_, _>>()?
    };
    let dim = model.max_cars() as usize + 1;
    let policy = Policy {
        max_cars: model.max_cars(),
        actions: Array2::from_shape_vec((dim, dim), chosen)?,
    };
    let changed = policy.changes_from(previous);
    Ok(Improvement { policy, changed, stable: changed == 0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RentalConfig;
    use crate::state::StateIterator;

    fn idle_config() -> RentalConfig {
        RentalConfig {
            max_cars: 6,
            max_move: 2,
            rent_mean1: 0.0,
            rent_mean2: 0.0,
            return_mean1: 0.0,
            return_mean2: 0.0,
            ..RentalConfig::default()
        }
    }

    #[test]
    fn zero_values_keep_zero_policy() {
        let config = idle_config();
        let model = TransitionModel::build(&config).unwrap();
        let result = improve(&model, &ValueFunction::new(6), &Policy::new(6), &config.solver_params())
            .unwrap();
        assert!(result.stable);
        assert_eq!(result.changed, 0);
        assert_eq!(result.policy, Policy::new(6));
    }

    #[test]
    fn ties_go_to_first_action_in_canonical_order() {
        // Free moves and no rentals: every feasible action is worth zero.
        let config = RentalConfig { move_cost: 0.0, ..idle_config() };
        let model = TransitionModel::build(&config).unwrap();
        let result = improve(&model, &ValueFunction::new(6), &Policy::new(6), &config.solver_params())
            .unwrap();
        assert_eq!(result.policy.get(State::new(0, 0)), 0);
        assert_eq!(result.policy.get(State::new(3, 3)), -2);
        assert_eq!(result.policy.get(State::new(5, 0)), 0);
        assert_eq!(result.policy.get(State::new(0, 5)), -2);
        assert_eq!(result.policy.get(State::new(6, 3)), 0);
        assert!(!result.stable);
    }

    #[test]
    fn greedy_moves_cars_toward_valuable_site() {
        // Arrange
        let config = idle_config();
        let model = TransitionModel::build(&config).unwrap();
        let mut values = ValueFunction::new(6);
        for s in StateIterator::new(6, 6) {
            values.values[s.index()] = 10.0 * f64::from(s.n2);
        }
        // Act
        let result = improve(&model, &values, &Policy::new(6), &config.solver_params()).unwrap();
        // Assert
        assert_eq!(result.policy.get(State::new(6, 0)), 2);
        assert_eq!(result.policy.get(State::new(1, 3)), 1);
        assert_eq!(result.policy.get(State::new(0, 6)), 0);
        assert_eq!(result.policy.get(State::new(3, 6)), 0);
        assert_eq!(result.changed, result.policy.actions.iter().filter(|a| **a != 0).count());
        assert!(!result.stable);
    }

    #[test]
    fn chosen_actions_are_feasible() {
        let config = RentalConfig { move_cost: 0.0, ..idle_config() };
        let model = TransitionModel::build(&config).unwrap();
        let mut values = ValueFunction::new(6);
        values.values[[0, 6]] = 100.0;
        values.values[[6, 0]] = 100.0;
        let result = improve(&model, &values, &Policy::new(6), &config.solver_params()).unwrap();
        for s in model.states() {
            assert!(model.is_feasible(s, result.policy.get(s)));
        }
    }

    #[test]
    fn parallel_matches_sequential() {
        let config = RentalConfig { max_cars: 6, max_move: 2, poisson_upper: 6, ..RentalConfig::default() };
        let model = TransitionModel::build(&config).unwrap();
        let mut values = ValueFunction::new(6);
        for s in StateIterator::new(6, 6) {
            values.values[s.index()] = f64::from(s.n1) * 2.0 + f64::from(s.n2) * 5.0;
        }
        let params = config.solver_params();
        let parallel = improve(&model, &values, &Policy::new(6), &params).unwrap();
        let sequential = improve(&model, &values, &Policy::new(6), &SolverParams { parallel: false, ..params })
            .unwrap();
        assert_eq!(parallel.policy, sequential.policy);
    }
}
