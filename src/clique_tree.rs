use ndarray::Array2;

use crate::dataset::{label_window, Instance};
use crate::decode::{SequenceListener, SequenceModel};
use crate::index::Indices;
use crate::weights::Weights;

/// `log(sum(exp(x)))` without overflow
pub(crate) fn log_sum_exp<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let values: Vec<f64> = values.into_iter().collect();
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

/// Calibrated linear-chain factor graph for one document.
///
/// Label tuples spanning the whole window are encoded base `num_classes`,
/// oldest label first. A *state* is the tuple of the `window - 1` labels
/// preceding a position, encoded the same way; positions before the start of
/// the document hold the background class.
#[derive(Debug, Clone)]
pub struct CliqueTree {
    window: usize,
    num_classes: usize,
    /// `num_classes^(window - 1)`
    num_states: usize,
    /// Log-potential of every full tuple at each position, `[n][T]`
    phi: Array2<f64>,
    /// Forward messages, `[n + 1][S]`; row `i` covers positions before `i`
    alpha: Array2<f64>,
    /// Backward messages, `[n + 1][S]`; row `i` covers positions from `i` on
    beta: Array2<f64>,
    log_z: f64,
    /// Sequence the relabel interface is tracking
    sequence: Vec<usize>,
    /// Conditional log-probability of each tracked position
    position_scores: Vec<f64>,
    total: f64,
}

impl CliqueTree {
    /// Build potentials from the active features and run forward-backward
    pub fn calibrate(instance: &Instance, indices: &Indices, weights: &Weights) -> Self {
        let window = indices.window();
        let num_classes = indices.num_classes();
        let num_tuples = num_classes.pow(window as u32);
        let n = instance.len();

        let mut phi = Array2::<f64>::zeros((n, num_tuples));
        for (i, datum) in instance.data.iter().enumerate() {
            let mut row = phi.row_mut(i);
            for (order, active) in datum.features.iter().enumerate() {
                if active.is_empty() {
                    continue;
                }
                let lookup = indices.lookup(order);
                let size = lookup.len();
                let mut local = vec![0.0; size];
                for &f in active {
                    let vector = weights.vector(f);
                    for (code, id) in lookup.iter().enumerate() {
                        if let Some(id) = id {
                            local[code] += vector[*id];
                        }
                    }
                }
                for (t, value) in row.iter_mut().enumerate() {
                    *value += local[t % size];
                }
            }
        }
        Self::from_potentials(window, num_classes, phi)
    }

    /// Calibrate from precomputed log-potentials, `[n][num_classes^window]`
    pub fn from_potentials(window: usize, num_classes: usize, phi: Array2<f64>) -> Self {
        let num_states = num_classes.pow(window as u32 - 1);
        let n = phi.nrows();

        let mut alpha = Array2::from_elem((n + 1, num_states), f64::NEG_INFINITY);
        alpha[[0, 0]] = 0.0;
        for i in 0..n {
            for h in 0..num_states {
                let value = log_sum_exp((0..num_classes).map(|a| {
                    let t = a * num_states + h;
                    alpha[[i, t / num_classes]] + phi[[i, t]]
                }));
                alpha[[i + 1, h]] = value;
            }
        }

        let mut beta = Array2::<f64>::zeros((n + 1, num_states));
        for i in (0..n).rev() {
            for h in 0..num_states {
                let value = log_sum_exp((0..num_classes).map(|y| {
                    let t = h * num_classes + y;
                    phi[[i, t]] + beta[[i + 1, t % num_states]]
                }));
                beta[[i, h]] = value;
            }
        }

        let log_z = log_sum_exp(alpha.row(n).iter().copied());
        Self {
            window,
            num_classes,
            num_states,
            phi,
            alpha,
            beta,
            log_z,
            sequence: Vec::new(),
            position_scores: Vec::new(),
            total: 0.0,
        }
    }

    pub fn length(&self) -> usize {
        self.phi.nrows()
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn background_index(&self) -> usize {
        0
    }

    /// Log partition function
    pub fn log_z(&self) -> f64 {
        self.log_z
    }

    /// State code of the labels preceding `position` in `sequence`
    fn state_at(&self, sequence: &[usize], position: usize) -> usize {
        self.state_with(position, |j| sequence[j])
    }

    /// History state before `position`, reading earlier labels through `label_at`
    fn state_with(&self, position: usize, label_at: impl Fn(usize) -> usize) -> usize {
        let history = self.window - 1;
        (0..history).fold(0, |code, i| {
            let back = history - i;
            let label = if back > position { 0 } else { label_at(position - back) };
            code * self.num_classes + label
        })
    }

    fn conditional(&self, position: usize, state: usize, label: usize) -> f64 {
        let t = state * self.num_classes + label;
        self.phi[[position, t]] + self.beta[[position + 1, t % self.num_states]]
            - self.beta[[position, state]]
    }

    /// Log-probability of `label` at `position` given the labels before it.
    ///
    /// `previous` lists the preceding labels oldest first; missing entries on
    /// the left read as background, extra ones are ignored.
    pub fn conditional_log_prob(&self, position: usize, label: usize, previous: &[usize]) -> f64 {
        let history = self.window - 1;
        let skip = previous.len().saturating_sub(history);
        let pad = history.saturating_sub(previous.len());
        let state = std::iter::repeat(0)
            .take(pad)
            .chain(previous[skip..].iter().copied())
            .fold(0, |code, l| code * self.num_classes + l);
        self.conditional(position, state, label)
    }

    /// Log-marginal of a full-window tuple code at `position`
    pub fn tuple_log_marginal(&self, position: usize, tuple: usize) -> f64 {
        self.alpha[[position, tuple / self.num_classes]]
            + self.phi[[position, tuple]]
            + self.beta[[position + 1, tuple % self.num_states]]
            - self.log_z
    }

    /// Marginals over tuples of clique order `order` at `position`, indexed by code
    pub fn order_marginals(&self, position: usize, order: usize) -> Vec<f64> {
        let size = self.num_classes.pow(order as u32 + 1);
        let mut probs = vec![0.0; size];
        for t in 0..self.phi.ncols() {
            probs[t % size] += self.tuple_log_marginal(position, t).exp();
        }
        probs
    }

    /// Distribution over labels at `position`
    pub fn marginals(&self, position: usize) -> Vec<f64> {
        self.order_marginals(position, 0)
    }

    pub fn marginal(&self, position: usize, label: usize) -> f64 {
        (0..self.phi.ncols())
            .filter(|t| t % self.num_classes == label)
            .map(|t| self.tuple_log_marginal(position, t).exp())
            .sum()
    }

    /// Probability of `label_a` at `position - 1` together with `label_b` at `position`
    pub fn pairwise_marginal(&self, position: usize, label_a: usize, label_b: usize) -> f64 {
        if self.window < 2 {
            let before = if position == 0 {
                if label_a == 0 {
                    1.0
                } else {
                    0.0
                }
            } else {
                self.marginal(position - 1, label_a)
            };
            return before * self.marginal(position, label_b);
        }
        let pair = self.num_classes * self.num_classes;
        let code = label_a * self.num_classes + label_b;
        (0..self.phi.ncols())
            .filter(|t| t % pair == code)
            .map(|t| self.tuple_log_marginal(position, t).exp())
            .sum()
    }

    /// Unnormalised log-score of a gold labeling under the potentials
    pub fn sequence_potential(&self, labels: &[usize]) -> f64 {
        (0..self.length())
            .map(|i| {
                let tuple = label_window(labels, i, self.window)
                    .into_iter()
                    .fold(0, |code, l| code * self.num_classes + l);
                self.phi[[i, tuple]]
            })
            .sum()
    }

    /// Log-probability of a full labeling
    pub fn log_prob(&self, labels: &[usize]) -> f64 {
        self.sequence_potential(labels) - self.log_z
    }
}

impl SequenceModel for CliqueTree {
    fn length(&self) -> usize {
        self.phi.nrows()
    }

    fn left_window(&self) -> usize {
        self.window - 1
    }

    fn possible_labels(&self, _position: usize) -> Vec<usize> {
        (0..self.num_classes).collect()
    }

    fn scores_of(&self, sequence: &[usize], position: usize) -> Vec<f64> {
        let state = self.state_at(sequence, position);
        (0..self.num_classes)
            .map(|label| self.conditional(position, state, label))
            .collect()
    }

    fn score_of(&self, sequence: &[usize], position: usize) -> f64 {
        let state = self.state_at(sequence, position);
        self.conditional(position, state, sequence[position])
    }

    fn conditional_scores(&self, sequence: &[usize], position: usize) -> Vec<f64> {
        let last = (position + self.window - 1).min(self.length() - 1);
        (0..self.num_classes)
            .map(|label| {
                let label_at = |j: usize| if j == position { label } else { sequence[j] };
                (position..=last)
                    .map(|i| self.conditional(i, self.state_with(i, &label_at), label_at(i)))
                    .sum()
            })
            .collect()
    }
}

impl SequenceListener for CliqueTree {
    fn set_initial_sequence(&mut self, sequence: &[usize]) {
        self.sequence = sequence.to_vec();
        self.position_scores = (0..self.length())
            .map(|i| self.score_of(sequence, i))
            .collect();
        self.total = self.position_scores.iter().sum();
    }

    fn update_sequence_element(&mut self, sequence: &[usize], position: usize, _old_label: usize) {
        self.sequence[position] = sequence[position];
        let last = (position + self.window - 1).min(self.length() - 1);
        for i in position..=last {
            let state = self.state_at(&self.sequence, i);
            let score = self.conditional(i, state, self.sequence[i]);
            self.total += score - self.position_scores[i];
            self.position_scores[i] = score;
        }
    }

    fn current_score(&self) -> f64 {
        self.total
    }
}
