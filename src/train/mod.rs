//! Training: the likelihood objective, the optimizers that minimise it and
//! the prune-and-retrain loop around them.

mod objective;
mod optimizer;
mod trainer;

pub use self::objective::{Function, Objective, StochasticFunction};
pub use self::optimizer::{Evaluator, L1Proximal, Monitor, Optimizer, QuasiNewton, Report, Sgd};
pub use self::trainer::Trainer;
