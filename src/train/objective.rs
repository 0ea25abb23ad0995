use rayon::prelude::*;

use crate::clique_tree::CliqueTree;
use crate::dataset::{label_window, Instance};
use crate::index::{Indices, LabelTuple};
use crate::weights::Weights;

/// Documents handed to one rayon task
const CHUNK_SIZE: usize = 16;

/// A differentiable function to minimise
pub trait Function {
    fn dimension(&self) -> usize;

    /// Value at `x`; the gradient is written into `gradient`
    fn evaluate(&mut self, x: &[f64], gradient: &mut [f64]) -> f64;
}

/// A sum over examples that can also be evaluated on a subset of them
pub trait StochasticFunction: Function {
    fn num_examples(&self) -> usize;

    /// Value and gradient of the examples in `batch`, with the regulariser
    /// scaled down to the batch's share of the data
    fn evaluate_batch(&mut self, x: &[f64], batch: &[usize], gradient: &mut [f64]) -> f64;
}

/// Negative conditional log-likelihood of the training documents plus a
/// Gaussian prior on the weights.
pub struct Objective<'a> {
    instances: &'a [Instance],
    indices: &'a Indices,
    sigma_sq: f64,
    weights: Weights,
}

impl<'a> Objective<'a> {
    pub fn new(instances: &'a [Instance], indices: &'a Indices, sigma: f64) -> Self {
        Self {
            instances,
            indices,
            sigma_sq: sigma * sigma,
            weights: Weights::zeros(indices),
        }
    }

    /// Negative log-likelihood of one document, adding expected minus
    /// observed feature counts into `gradient`
    fn accumulate(&self, instance: &Instance, gradient: &mut [f64]) -> f64 {
        let indices = self.indices;
        let num_classes = indices.num_classes();
        let tree = CliqueTree::calibrate(instance, indices, &self.weights);
        let labels = instance.labels();

        for (pos, datum) in instance.data.iter().enumerate() {
            for (order, active) in datum.features.iter().enumerate() {
                if active.is_empty() {
                    continue;
                }
                let lookup = indices.lookup(order);
                let probs = tree.order_marginals(pos, order);
                let gold = LabelTuple::new(label_window(&labels, pos, order + 1)).encode(num_classes);
                for &f in active {
                    let offset = self.weights.offset(f);
                    for (code, id) in lookup.iter().enumerate() {
                        if let Some(id) = id {
                            gradient[offset + id] += probs[code];
                        }
                    }
                    if let Some(id) = lookup[gold] {
                        gradient[offset + id] -= 1.0;
                    }
                }
            }
        }
        tree.log_z() - tree.sequence_potential(&labels)
    }

    /// Sum over the selected documents.
    ///
    /// Documents are split into fixed chunks and chunk results are added in
    /// chunk order, so the result does not depend on thread scheduling. At
    /// most one wave of chunks, one per worker thread, holds a partial
    /// gradient at a time.
    fn data_term(&self, selected: &[usize], gradient: &mut [f64]) -> f64 {
        let wave = CHUNK_SIZE * rayon::current_num_threads().max(1);
        self.data_term_in_waves(selected, wave, gradient)
    }

    fn data_term_in_waves(&self, selected: &[usize], wave: usize, gradient: &mut [f64]) -> f64 {
        let dimension = gradient.len();
        gradient.iter_mut().for_each(|g| *g = 0.0);
        let mut value = 0.0;
        for group in selected.chunks(wave.max(CHUNK_SIZE)) {
            let partials: Vec<(f64, Vec<f64>)> = group
                .par_chunks(CHUNK_SIZE)
                .map(|chunk| {
                    let mut partial = vec![0.0; dimension];
                    let value = chunk
                        .iter()
                        .map(|&i| self.accumulate(&self.instances[i], &mut partial))
                        .sum::<f64>();
                    (value, partial)
                })
                .collect();
            for (v, partial) in partials {
                value += v;
                for (g, p) in gradient.iter_mut().zip(partial) {
                    *g += p;
                }
            }
        }
        value
    }

    fn regularize(&self, x: &[f64], scale: f64, gradient: &mut [f64]) -> f64 {
        let mut penalty = 0.0;
        for (g, &w) in gradient.iter_mut().zip(x) {
            penalty += w * w;
            *g += scale * w / self.sigma_sq;
        }
        scale * penalty / (2.0 * self.sigma_sq)
    }
}

impl Function for Objective<'_> {
    fn dimension(&self) -> usize {
        self.weights.len()
    }

    fn evaluate(&mut self, x: &[f64], gradient: &mut [f64]) -> f64 {
        self.weights.set_values(x);
        let all: Vec<usize> = (0..self.instances.len()).collect();
        let value = self.data_term(&all, gradient);
        value + self.regularize(x, 1.0, gradient)
    }
}

impl StochasticFunction for Objective<'_> {
    fn num_examples(&self) -> usize {
        self.instances.len()
    }

    fn evaluate_batch(&mut self, x: &[f64], batch: &[usize], gradient: &mut [f64]) -> f64 {
        self.weights.set_values(x);
        let value = self.data_term(batch, gradient);
        let scale = batch.len() as f64 / self.instances.len().max(1) as f64;
        value + self.regularize(x, scale, gradient)
    }
}
