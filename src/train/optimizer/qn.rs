use std::collections::VecDeque;

use super::{dot, norm, Monitor, Report};
use crate::train::objective::Function;

/// Sufficient-decrease constant of the Armijo test
const ARMIJO: f64 = 1e-4;
/// Iterations looked back by the relative-improvement test
const PERIOD: usize = 10;

/// Limited-memory BFGS with a backtracking line search.
///
/// The robust variant only stores curvature pairs that are safely positive
/// and, when the line search fails, drops its history and retries along the
/// steepest descent direction instead of stopping.
#[derive(Debug, Clone)]
pub struct QuasiNewton {
    memory: usize,
    tolerance: f64,
    max_iterations: usize,
    max_linesearch: usize,
    robust: bool,
}

/// One stored update: `s = x' - x`, `y = g' - g`, `rho = 1 / y.s`
struct Correction {
    s: Vec<f64>,
    y: Vec<f64>,
    rho: f64,
}

impl QuasiNewton {
    pub fn new(memory: usize, tolerance: f64, max_iterations: usize) -> Self {
        Self {
            memory: memory.max(1),
            tolerance,
            max_iterations,
            max_linesearch: 20,
            robust: false,
        }
    }

    pub fn robust(mut self, robust: bool) -> Self {
        self.robust = robust;
        self
    }

    /// Two-loop recursion: `-H g` for the implicit inverse Hessian `H`
    fn direction(history: &VecDeque<Correction>, gradient: &[f64]) -> Vec<f64> {
        let mut q: Vec<f64> = gradient.to_vec();
        let mut alphas = Vec::with_capacity(history.len());
        for c in history.iter().rev() {
            let a = c.rho * dot(&c.s, &q);
            for (qi, yi) in q.iter_mut().zip(&c.y) {
                *qi -= a * yi;
            }
            alphas.push(a);
        }
        if let Some(last) = history.back() {
            let gamma = dot(&last.s, &last.y) / dot(&last.y, &last.y);
            q.iter_mut().for_each(|qi| *qi *= gamma);
        }
        for (c, a) in history.iter().zip(alphas.into_iter().rev()) {
            let b = c.rho * dot(&c.y, &q);
            for (qi, si) in q.iter_mut().zip(&c.s) {
                *qi += (a - b) * si;
            }
        }
        q.iter_mut().for_each(|qi| *qi = -*qi);
        q
    }

    pub fn minimize<F>(&self, function: &mut F, x: &mut [f64], monitor: &mut Monitor<'_>) -> Report
    where
        F: Function + ?Sized,
    {
        let n = x.len();
        let mut gradient = vec![0.0; n];
        let mut value = function.evaluate(x, &mut gradient);
        let mut history: VecDeque<Correction> = VecDeque::with_capacity(self.memory);
        let mut past = VecDeque::with_capacity(PERIOD + 1);
        past.push_back(value);

        let mut next_x = vec![0.0; n];
        let mut next_gradient = vec![0.0; n];
        let mut iteration = 0;
        while iteration < self.max_iterations {
            let gnorm = norm(&gradient);
            if gnorm <= self.tolerance * norm(x).max(1.0) {
                return Report {
                    iterations: iteration,
                    value,
                    converged: true,
                };
            }
            iteration += 1;

            let mut direction = Self::direction(&history, &gradient);
            let mut slope = dot(&direction, &gradient);
            if slope >= 0.0 {
                history.clear();
                direction = gradient.iter().map(|g| -g).collect();
                slope = -gnorm * gnorm;
            }

            let mut step = if history.is_empty() { (1.0 / gnorm).min(1.0) } else { 1.0 };
            let mut accepted = None;
            for _ in 0..self.max_linesearch {
                for ((nx, xi), di) in next_x.iter_mut().zip(x.iter()).zip(&direction) {
                    *nx = xi + step * di;
                }
                let candidate = function.evaluate(&next_x, &mut next_gradient);
                if candidate.is_finite() && candidate <= value + ARMIJO * step * slope {
                    accepted = Some(candidate);
                    break;
                }
                step *= 0.5;
            }

            let next_value = match accepted {
                Some(v) => v,
                None if self.robust && !history.is_empty() => {
                    monitor
                        .logger()
                        .warn(format_args!("line search failed at iteration {}; resetting history", iteration));
                    history.clear();
                    continue;
                }
                None => {
                    monitor
                        .logger()
                        .warn(format_args!("line search failed at iteration {}; stopping", iteration));
                    return Report {
                        iterations: iteration,
                        value,
                        converged: false,
                    };
                }
            };

            let s: Vec<f64> = next_x.iter().zip(x.iter()).map(|(a, b)| a - b).collect();
            let y: Vec<f64> = next_gradient.iter().zip(&gradient).map(|(a, b)| a - b).collect();
            let sy = dot(&s, &y);
            let threshold = if self.robust {
                f64::EPSILON.sqrt() * dot(&y, &y)
            } else {
                0.0
            };
            if sy > threshold {
                if history.len() == self.memory {
                    history.pop_front();
                }
                history.push_back(Correction { s, y, rho: 1.0 / sy });
            }

            x.copy_from_slice(&next_x);
            gradient.copy_from_slice(&next_gradient);
            value = next_value;
            monitor.iteration(iteration, x, value);

            past.push_back(value);
            if past.len() > PERIOD {
                let old = past.pop_front().unwrap_or(value);
                let improvement = (old - value) / (value.abs().max(1.0) * PERIOD as f64);
                if improvement < self.tolerance {
                    return Report {
                        iterations: iteration,
                        value,
                        converged: true,
                    };
                }
            }
        }

        let converged = norm(&gradient) <= self.tolerance * norm(x).max(1.0);
        if !converged {
            monitor.logger().warn(format_args!(
                "quasi-Newton stopped after {} iterations without converging",
                iteration
            ));
        }
        Report {
            iterations: iteration,
            value,
            converged,
        }
    }
}
