//! Policy iteration for the two-location car rental problem.
//!
//! Cars are rented and returned at two lots, each holding at most
//! `max_cars`. Every night up to `max_move` cars can be moved between the
//! lots at a cost. Requests and returns are Poisson distributed. The solver
//! finds the moving policy that maximizes expected discounted rental income.
//!
//! | Module | Role |
//! |--------|------|
//! | [`cars`] | Truncated Poisson tables for requests and returns |
//! | [`model`] | Outcome lists for every feasible (state, action) pair |
//! | [`evaluation`] | Value of a fixed policy |
//! | [`improvement`] | Greedy policy for a value function |
//! | [`iteration`] | Alternates evaluation and improvement until stable |
//! | [`export`] | CSV grids of policies and values |

pub mod cars;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod export;
pub mod improvement;
pub mod iteration;
pub mod model;
pub mod policy;
pub mod state;

pub use config::RentalConfig;
pub use error::{ConfigError, SolveError};
pub use iteration::{solve, PolicyIteration, RoundObserver, Solution};
pub use model::TransitionModel;
pub use policy::{Policy, ValueFunction};
pub use state::{Outcome, State};
