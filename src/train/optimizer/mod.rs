//! Numerical optimizers behind the trainer

mod l1;
mod qn;
mod sgd;

pub use self::l1::L1Proximal;
pub use self::qn::QuasiNewton;
pub use self::sgd::Sgd;

use super::objective::StochasticFunction;
use crate::config::{Config, OptimizerKind};
use crate::error::{Error, Result};
use crate::index::Indices;
use crate::log::Logger;
use crate::weights::Weights;

/// External scorer run at training checkpoints.
///
/// It sees a read-only snapshot of the current weights and returns a score
/// to report. Failures are logged and training continues.
pub trait Evaluator {
    fn evaluate(&mut self, iteration: usize, indices: &Indices, weights: &Weights) -> Result<f64>;
}

impl<F> Evaluator for F
where
    F: FnMut(usize, &Indices, &Weights) -> Result<f64>,
{
    fn evaluate(&mut self, iteration: usize, indices: &Indices, weights: &Weights) -> Result<f64> {
        self(iteration, indices, weights)
    }
}

/// Iteration-boundary hook shared by all optimizers: progress logging plus
/// the periodic evaluator call.
pub struct Monitor<'a> {
    logger: Logger,
    every: usize,
    evaluator: Option<&'a mut Box<dyn Evaluator>>,
    context: Option<(&'a Indices, &'a Weights)>,
}

impl<'a> Monitor<'a> {
    pub fn new(logger: Logger) -> Self {
        Self {
            logger,
            every: 0,
            evaluator: None,
            context: None,
        }
    }

    /// Call `evaluator` every `every` iterations with weights shaped like `layout`
    pub fn with_evaluator(
        mut self,
        every: usize,
        evaluator: Option<&'a mut Box<dyn Evaluator>>,
        indices: &'a Indices,
        layout: &'a Weights,
    ) -> Self {
        self.every = every;
        self.evaluator = evaluator;
        self.context = Some((indices, layout));
        self
    }

    pub fn logger(&self) -> Logger {
        self.logger
    }

    pub fn iteration(&mut self, iteration: usize, x: &[f64], value: f64) {
        self.logger.progress(format_args!("iteration {}: objective = {:.6}", iteration, value));
        if self.every == 0 || iteration % self.every != 0 {
            return;
        }
        let (evaluator, (indices, layout)) = match (self.evaluator.as_mut(), self.context) {
            (Some(evaluator), Some(context)) => (evaluator, context),
            _ => return,
        };
        let outcome = layout
            .with_values(x.to_vec())
            .and_then(|snapshot| evaluator.evaluate(iteration, indices, &snapshot));
        match outcome {
            Ok(score) => self
                .logger
                .progress(format_args!("iteration {}: evaluation score = {:.6}", iteration, score)),
            Err(err) => self
                .logger
                .warn(format_args!("iteration {}: evaluation skipped: {}", iteration, err)),
        }
    }
}

/// Where a minimisation run ended
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Report {
    pub iterations: usize,
    pub value: f64,
    pub converged: bool,
}

/// Optimizer chosen by configuration
#[derive(Debug, Clone)]
pub enum Optimizer {
    QuasiNewton(QuasiNewton),
    Sgd(Sgd),
    /// Warm-up SGD passes, then quasi-Newton from where SGD stopped
    SgdToQuasiNewton(Sgd, QuasiNewton),
    L1Proximal(L1Proximal),
}

impl Optimizer {
    pub fn from_config(config: &Config) -> Result<Self> {
        let kind = config
            .optimizer
            .ok_or_else(|| Error::config("no optimizer selected"))?;
        let qn = || QuasiNewton::new(config.qn_memory, config.tolerance, config.max_iterations)
            .robust(config.robust_qn);
        let sgd = |passes| {
            Sgd::new(config.sgd_batch_size, passes, config.learning_rate).seed(config.seed)
        };
        let optimizer = match kind {
            OptimizerKind::QuasiNewton => Optimizer::QuasiNewton(qn()),
            OptimizerKind::Sgd => Optimizer::Sgd(sgd(config.sgd_passes).tolerance(config.tolerance)),
            // warm-up runs its fixed number of passes
            OptimizerKind::SgdToQuasiNewton => {
                Optimizer::SgdToQuasiNewton(sgd(config.sgd_warmup_passes), qn())
            }
            OptimizerKind::L1Proximal => Optimizer::L1Proximal(L1Proximal::new(
                sgd(config.sgd_passes).tolerance(config.tolerance),
                config.l1_weight,
            )),
        };
        Ok(optimizer)
    }

    /// Minimise `function` starting from `x`, leaving the final point in `x`
    pub fn minimize<F>(&self, function: &mut F, x: &mut [f64], monitor: &mut Monitor<'_>) -> Report
    where
        F: StochasticFunction + ?Sized,
    {
        match self {
            Optimizer::QuasiNewton(qn) => qn.minimize(function, x, monitor),
            Optimizer::Sgd(sgd) => sgd.minimize(function, x, monitor),
            Optimizer::SgdToQuasiNewton(sgd, qn) => {
                let warmup = sgd.minimize(function, x, monitor);
                monitor
                    .logger()
                    .progress(format_args!("switching to quasi-Newton after {} SGD passes", warmup.iterations));
                let mut report = qn.minimize(function, x, monitor);
                report.iterations += warmup.iterations;
                report
            }
            Optimizer::L1Proximal(l1) => l1.minimize(function, x, monitor),
        }
    }
}

pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub(crate) fn norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::super::objective::{Function, StochasticFunction};

    /// `sum_i (x_i - target_i)^2 / 2`, one example per coordinate
    pub struct Quadratic {
        pub target: Vec<f64>,
    }

    impl Function for Quadratic {
        fn dimension(&self) -> usize {
            self.target.len()
        }

        fn evaluate(&mut self, x: &[f64], gradient: &mut [f64]) -> f64 {
            let all: Vec<usize> = (0..self.target.len()).collect();
            self.evaluate_batch(x, &all, gradient)
        }
    }

    impl StochasticFunction for Quadratic {
        fn num_examples(&self) -> usize {
            self.target.len()
        }

        fn evaluate_batch(&mut self, x: &[f64], batch: &[usize], gradient: &mut [f64]) -> f64 {
            gradient.iter_mut().for_each(|g| *g = 0.0);
            let mut value = 0.0;
            for &i in batch {
                let d = x[i] - self.target[i];
                value += 0.5 * d * d;
                gradient[i] = d;
            }
            value
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::Quadratic;
    use super::*;

    #[test]
    fn test_no_optimizer_selected() {
        let config = Config {
            optimizer: None,
            ..Config::default()
        };
        assert!(matches!(Optimizer::from_config(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_hybrid_reaches_minimum() {
        let config = Config {
            optimizer: Some(OptimizerKind::SgdToQuasiNewton),
            seed: Some(1),
            ..Config::default()
        };
        let optimizer = Optimizer::from_config(&config).unwrap();
        let mut function = Quadratic {
            target: vec![1.0, -2.0, 0.5],
        };
        let mut x = vec![0.0; 3];
        let report = optimizer.minimize(&mut function, &mut x, &mut Monitor::new(Logger::quiet()));
        assert!(report.converged);
        for (a, b) in x.iter().zip(&function.target) {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[test]
    fn test_evaluator_failures_are_swallowed() {
        use crate::feature::WordFeatureFactory;
        use crate::index::IndexBuilder;
        use crate::token::Token;

        let corpus = vec![vec![Token::with_gold("a", "O")]];
        let indices = IndexBuilder::new(&WordFeatureFactory::new(), 2, "O")
            .build(&corpus)
            .unwrap();
        let layout = Weights::zeros(&indices);
        let calls = std::rc::Rc::new(std::cell::Cell::new(0));
        let seen = calls.clone();
        let mut evaluator: Box<dyn Evaluator> = Box::new(move |_: usize, _: &Indices, _: &Weights| -> Result<f64> {
            seen.set(seen.get() + 1);
            Err(Error::Evaluator("scorer offline".to_string()))
        });
        let mut monitor = Monitor::new(Logger::quiet()).with_evaluator(2, Some(&mut evaluator), &indices, &layout);
        let x = vec![0.0; layout.len()];
        for i in 1..=5 {
            monitor.iteration(i, &x, 0.0);
        }
        assert_eq!(calls.get(), 2);
    }
}
