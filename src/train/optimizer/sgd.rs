use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::{Monitor, Report};
use crate::train::objective::StochasticFunction;

/// Mini-batch stochastic gradient descent.
///
/// The step size decays as `learning_rate / (1 + t / batches_per_pass)`,
/// where `t` counts batches seen so far. With a positive tolerance the run
/// stops once the objective summed over a pass changes by less than
/// `tolerance * max(|value|, 1)` from the previous pass.
#[derive(Debug, Clone)]
pub struct Sgd {
    batch_size: usize,
    passes: usize,
    learning_rate: f64,
    tolerance: f64,
    seed: Option<u64>,
}

impl Sgd {
    pub fn new(batch_size: usize, passes: usize, learning_rate: f64) -> Self {
        Self {
            batch_size: batch_size.max(1),
            passes,
            learning_rate,
            tolerance: 0.0,
            seed: None,
        }
    }

    /// Relative change between passes below which the run stops; 0 runs every pass
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Fix the shuffling order
    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Run passes until the tolerance is met; after each step `project` may adjust the point given
    /// the step size and the batch's share of the data
    pub(crate) fn run<F, P>(
        &self,
        function: &mut F,
        x: &mut [f64],
        monitor: &mut Monitor<'_>,
        mut project: P,
    ) -> Report
    where
        F: StochasticFunction + ?Sized,
        P: FnMut(&mut [f64], f64, f64),
    {
        let num_examples = function.num_examples();
        if num_examples == 0 || self.passes == 0 {
            return Report {
                iterations: 0,
                value: 0.0,
                converged: true,
            };
        }
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let batches_per_pass = (num_examples + self.batch_size - 1) / self.batch_size;
        let mut order: Vec<usize> = (0..num_examples).collect();
        let mut gradient = vec![0.0; x.len()];
        let mut t = 0usize;
        let mut value = 0.0;
        let mut previous = None;

        for pass in 1..=self.passes {
            order.shuffle(&mut rng);
            value = 0.0;
            for batch in order.chunks(self.batch_size) {
                let eta = self.learning_rate / (1.0 + t as f64 / batches_per_pass as f64);
                value += function.evaluate_batch(x, batch, &mut gradient);
                for (xi, gi) in x.iter_mut().zip(&gradient) {
                    *xi -= eta * gi;
                }
                project(x, eta, batch.len() as f64 / num_examples as f64);
                t += 1;
            }
            monitor.iteration(pass, x, value);
            if let Some(previous) = previous {
                let change: f64 = previous - value;
                if self.tolerance > 0.0 && change.abs() < self.tolerance * value.abs().max(1.0) {
                    return Report {
                        iterations: pass,
                        value,
                        converged: true,
                    };
                }
            }
            previous = Some(value);
        }
        if self.tolerance > 0.0 {
            monitor.logger().warn(format_args!(
                "sgd: objective still changing after {} passes",
                self.passes
            ));
        }
        Report {
            iterations: self.passes,
            value,
            converged: false,
        }
    }

    pub fn minimize<F>(&self, function: &mut F, x: &mut [f64], monitor: &mut Monitor<'_>) -> Report
    where
        F: StochasticFunction + ?Sized,
    {
        self.run(function, x, monitor, |_, _, _| {})
    }
}
