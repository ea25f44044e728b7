//! Transition model: for every feasible (state, action) pair, the list of
//! outcomes produced by one day of rentals and returns.
//!
//! A day runs in a fixed order:
//!
//! 1. Move cars overnight. Each lot is capped at `max_cars`.
//! 2. Pay for the cars moved, less any free transfer allowance.
//! 3. Pay the parking fee for each lot above the parking threshold.
//! 4. Rent out `min(cars on lot, cars requested)` at each site.
//! 5. Take in returned cars, capped at `max_cars`. Extra returns are lost.
//!
//! Requests and returns at both sites are independent truncated Poisson
//! variables (or fixed counts for returns), so one (state, action) pair
//! yields one outcome per joint realization.

use ndarray::Array3;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::cars::CarProbs;
use crate::config::{FreeTransfer, Parking, RentalConfig, Site};
use crate::error::SolveError;
use crate::policy::ValueFunction;
use crate::state::{action_index, actions, is_feasible, Outcome, State, StateIterator};

/// The number of cars requested and returned at each site during a day.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Demand {
    pub x1: u8,  // Cars requested at site #1
    pub x2: u8,  // Cars requested at site #2
    pub y1: u8,  // Cars returned at site #1
    pub y2: u8,  // Cars returned at site #2
}

/// Deterministic part of the problem: capacities, prices and fees.
#[derive(Debug, Clone, PartialEq)]
pub struct Dynamics {
    pub max_cars: u8,
    pub max_move: u8,
    pub rental_credit: f64,
    pub move_cost: f64,
    pub free_transfer: Option<FreeTransfer>,
    pub parking: Option<Parking>,
}

impl Dynamics {
    pub fn new(config: &RentalConfig) -> Dynamics {
        Dynamics {
            max_cars: config.max_cars,
            max_move: config.max_move,
            rental_credit: config.rental_credit,
            move_cost: config.move_cost,
            free_transfer: config.free_transfer,
            parking: config.parking,
        }
    }

    /// Cars on each lot after moving `a` cars from site #1 to site #2.
    pub fn transfer(&self, s: State, a: i8) -> (u8, u8) {
        let cap = self.max_cars as i16;
        let n1 = (s.n1 as i16 - a as i16).min(cap).max(0);
        let n2 = (s.n2 as i16 + a as i16).min(cap).max(0);
        (n1 as u8, n2 as u8)
    }

    /// Cost of moving `a` cars. The free allowance only applies to moves
    /// leaving the configured site.
    pub fn move_charge(&self, a: i8) -> f64 {
        let moved = a.unsigned_abs();
        let charged = match self.free_transfer {
            Some(FreeTransfer { from: Site::One, units }) if a > 0 => moved.saturating_sub(units),
            Some(FreeTransfer { from: Site::Two, units }) if a < 0 => moved.saturating_sub(units),
            _ => moved,
        };
        f64::from(charged) * self.move_cost
    }

    /// Parking fees owed for the lots after the overnight move.
    pub fn parking_charge(&self, n1: u8, n2: u8) -> f64 {
        match self.parking {
            Some(Parking { threshold, fee }) => {
                [n1, n2].iter().filter(|n| **n > threshold).count() as f64 * fee
            }
            None => 0.0,
        }
    }

    /// Lot counts after the overnight move and the (non-positive) reward
    /// for moving and parking.
    pub fn overnight(&self, s: State, a: i8) -> (u8, u8, f64) {
        let (n1, n2) = self.transfer(s, a);
        (n1, n2, -self.move_charge(a) - self.parking_charge(n1, n2))
    }

    /// Rentals then returns, starting from the post-move counts.
    pub fn daytime(&self, n1: u8, n2: u8, reward: f64, d: Demand) -> (State, f64) {
        let rented1 = n1.min(d.x1);
        let rented2 = n2.min(d.x2);
        let reward = reward + f64::from(rented1 as u16 + rented2 as u16) * self.rental_credit;

        let cap = self.max_cars as u16;
        let next1 = ((n1 - rented1) as u16 + d.y1 as u16).min(cap) as u8;
        let next2 = ((n2 - rented2) as u16 + d.y2 as u16).min(cap) as u8;
        (State::new(next1, next2), reward)
    }

    /// Run one day for a single realization of requests and returns.
    /// Returns the next state and the reward earned.
    pub fn simulate(&self, s: State, a: i8, d: Demand) -> (State, f64) {
        let (n1, n2, reward) = self.overnight(s, a);
        self.daytime(n1, n2, reward, d)
    }
}

/// Collects the outcomes of one (state, action) pair, either as the raw
/// per-realization list or merged by next state.
struct OutcomeSink {
    width: usize,
    coalesce: bool,
    raw: Vec<Outcome>,
    // (probability, probability * reward) per next state, row-major
    mass: Vec<(f64, f64)>,
}

impl OutcomeSink {
    fn new(max_cars: u8, coalesce: bool) -> OutcomeSink {
        let width = max_cars as usize + 1;
        let mass = if coalesce { vec![(0.0, 0.0); width * width] } else { Vec::new() };
        OutcomeSink { width, coalesce, raw: Vec::new(), mass }
    }

    fn push(&mut self, next: State, reward: f64, prob: f64) {
        if self.coalesce {
            let slot = &mut self.mass[next.n1 as usize * self.width + next.n2 as usize];
            slot.0 += prob;
            slot.1 += prob * reward;
        } else {
            self.raw.push(Outcome { next, reward, prob });
        }
    }

    fn finish(self) -> Vec<Outcome> {
        if !self.coalesce {
            return self.raw;
        }
        let max = (self.width - 1) as u8;
        StateIterator::new(max, max)
            .zip(self.mass)
            .filter(|(_, (prob, _))| *prob > 0.0)
            .map(|(next, (prob, weighted))| Outcome { next, reward: weighted / prob, prob })
            .collect()
    }
}

/// Computes outcome lists. Each list depends only on the builder's
/// read-only inputs, so keys can be computed in any order on any thread.
#[derive(Debug, Clone)]
pub struct ModelBuilder {
    pub dynamics: Dynamics,
    x1: Vec<(u8, f64)>,
    x2: Vec<(u8, f64)>,
    y1: Vec<(u8, f64)>,
    y2: Vec<(u8, f64)>,
    prune_below: f64,
    coalesce: bool,
    parallel: bool,
    workers: Option<usize>,
}

impl ModelBuilder {
    pub fn new(config: &RentalConfig) -> Result<ModelBuilder, SolveError> {
        config.validate()?;
        let cprobs = CarProbs::new(config)?;
        Ok(ModelBuilder::from_parts(Dynamics::new(config), &cprobs, config))
    }

    pub fn from_parts(dynamics: Dynamics, cprobs: &CarProbs, config: &RentalConfig) -> ModelBuilder {
        ModelBuilder {
            dynamics,
            x1: cprobs.x1.support(),
            x2: cprobs.x2.support(),
            y1: cprobs.y1.support(),
            y2: cprobs.y2.support(),
            prune_below: config.prune_below,
            coalesce: config.coalesce,
            parallel: config.parallel,
            workers: config.workers,
        }
    }

    pub fn is_feasible(&self, s: State, a: i8) -> bool {
        is_feasible(s, a, self.dynamics.max_cars, self.dynamics.max_move)
    }

    /// Every feasible (state, action) pair in canonical order.
    pub fn keys(&self) -> Vec<(State, i8)> {
        let max = self.dynamics.max_cars;
        StateIterator::new(max, max)
            .flat_map(|s| {
                actions(self.dynamics.max_move)
                    .filter(move |a| self.is_feasible(s, *a))
                    .map(move |a| (s, a))
            })
            .collect()
    }

    /// Outcome list for one (state, action) pair.
    ///
    /// Realizations are enumerated with requests at site #1 outermost and
    /// returns at site #2 innermost. A realization's probability is the
    /// product of the four individual probabilities.
    pub fn outcomes_for(&self, s: State, a: i8) -> Result<Vec<Outcome>, SolveError> {
        if !self.is_feasible(s, a) {
            return Err(SolveError::InfeasibleAction { state: s, action: a });
        }
        let mut sink = OutcomeSink::new(self.dynamics.max_cars, self.coalesce);
        let (n1, n2, base) = self.dynamics.overnight(s, a);
        let prune = self.prune_below;
        for &(x1, p1) in &self.x1 {
            if p1 < prune {
                continue;
            }
            for &(x2, p2) in &self.x2 {
                let w2 = p1 * p2;
                if w2 < prune {
                    continue;
                }
                for &(y1, p3) in &self.y1 {
                    let w3 = w2 * p3;
                    if w3 < prune {
                        continue;
                    }
                    for &(y2, p4) in &self.y2 {
                        let w = w3 * p4;
                        if w < prune {
                            continue;
                        }
                        let (next, reward) = self.dynamics.daytime(n1, n2, base, Demand { x1, x2, y1, y2 });
                        sink.push(next, reward, w);
                    }
                }
            }
        }
        Ok(sink.finish())
    }

    fn compute(&self, keys: &[(State, i8)]) -> Result<Vec<Vec<Outcome>>, SolveError> {
        if self.parallel {
            keys.par_iter().map(|&(s, a)| self.outcomes_for(s, a)).collect()
        } else {
            keys.iter().map(|&(s, a)| self.outcomes_for(s, a)).collect()
        }
    }

    /// Compute every feasible key and merge the lists into one model.
    pub fn build(&self) -> Result<TransitionModel, SolveError> {
        let keys = self.keys();
        let lists = match self.workers {
            Some(n) if self.parallel => {
                let pool = rayon::ThreadPoolBuilder::new().num_threads(n).build()?;
                pool.install(|| self.compute(&keys))?
            }
            _ => self.compute(&keys)?,
        };

        let max_cars = self.dynamics.max_cars;
        let max_move = self.dynamics.max_move;
        let dim = (max_cars as usize + 1, max_cars as usize + 1, 2 * max_move as usize + 1);
        let mut table: Array3<Option<Vec<Outcome>>> = Array3::from_shape_fn(dim, |_| None);
        let mut outcome_count = 0;
        for ((s, a), list) in keys.iter().zip(lists) {
            outcome_count += list.len();
            table[[s.n1 as usize, s.n2 as usize, action_index(*a, max_move)]] = Some(list);
        }
        debug!(outcomes = outcome_count, "merged outcome lists");
        info!(keys = keys.len(), max_cars, max_move, "built transition model");
        Ok(TransitionModel { max_cars, max_move, keys: keys.len(), table })
    }
}

/// Immutable mapping from feasible (state, action) pairs to outcome lists.
#[derive(Debug, Clone)]
pub struct TransitionModel {
    max_cars: u8,
    max_move: u8,
    keys: usize,
    // Indexes: cars at site #1, cars at site #2, action index
    table: Array3<Option<Vec<Outcome>>>,
}

impl TransitionModel {
    /// Validate `config` and build the full model.
    pub fn build(config: &RentalConfig) -> Result<TransitionModel, SolveError> {
        ModelBuilder::new(config)?.build()
    }

    pub fn max_cars(&self) -> u8 {
        self.max_cars
    }

    pub fn max_move(&self) -> u8 {
        self.max_move
    }

    /// Number of feasible (state, action) pairs.
    pub fn len(&self) -> usize {
        self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys == 0
    }

    pub fn states(&self) -> StateIterator {
        StateIterator::new(self.max_cars, self.max_cars)
    }

    pub fn is_feasible(&self, s: State, a: i8) -> bool {
        is_feasible(s, a, self.max_cars, self.max_move)
    }

    /// Feasible actions at `s` in canonical order.
    pub fn feasible_actions(&self, s: State) -> impl Iterator<Item = i8> + '_ {
        actions(self.max_move).filter(move |a| self.is_feasible(s, *a))
    }

    pub fn outcomes(&self, s: State, a: i8) -> Result<&[Outcome], SolveError> {
        if !self.is_feasible(s, a) {
            return Err(SolveError::InfeasibleAction { state: s, action: a });
        }
        self.table[[s.n1 as usize, s.n2 as usize, action_index(a, self.max_move)]]
            .as_deref()
            .ok_or(SolveError::InfeasibleAction { state: s, action: a })
    }

    /// Expected discounted return of taking `a` in `s` and following the
    /// policy behind `values` afterwards.
    pub fn action_value(
        &self, s: State, a: i8, values: &ValueFunction, gamma: f64,
    ) -> Result<f64, SolveError> {
        Ok(backup(self.outcomes(s, a)?, values, gamma))
    }
}

/// Bellman backup over one outcome list.
pub fn backup(outcomes: &[Outcome], values: &ValueFunction, gamma: f64) -> f64 {
    outcomes
        .iter()
        .map(|o| o.prob * (o.reward + gamma * values.get(o.next)))
        .sum()
}
