use super::{Monitor, Report, Sgd};
use crate::train::objective::StochasticFunction;

/// Stochastic proximal gradient for an added `l1_weight * |x|_1` penalty.
///
/// After each SGD step every coordinate is soft-thresholded by the step size
/// times the penalty share of the batch, which drives small weights to
/// exactly zero.
#[derive(Debug, Clone)]
pub struct L1Proximal {
    sgd: Sgd,
    l1_weight: f64,
}

fn soft_threshold(x: &mut [f64], threshold: f64) {
    for xi in x.iter_mut() {
        *xi = xi.signum() * (xi.abs() - threshold).max(0.0);
    }
}

impl L1Proximal {
    pub fn new(sgd: Sgd, l1_weight: f64) -> Self {
        Self { sgd, l1_weight }
    }

    pub fn minimize<F>(&self, function: &mut F, x: &mut [f64], monitor: &mut Monitor<'_>) -> Report
    where
        F: StochasticFunction + ?Sized,
    {
        let l1 = self.l1_weight;
        let report = self.sgd.run(function, x, monitor, |x, eta, share| {
            soft_threshold(x, eta * l1 * share)
        });
        let zeros = x.iter().filter(|&&v| v == 0.0).count();
        monitor.logger().progress(format_args!(
            "l1: {} of {} weights are zero",
            zeros,
            x.len()
        ));
        report
    }
}
