use std::collections::HashMap;

use super::{argmax, SequenceModel};

/// A partial labeling ending at the current position
#[derive(Debug, Clone)]
struct Hypothesis {
    /// Labels of the last `left_window` positions, oldest first
    state: Vec<usize>,
    score: f64,
    label: usize,
    /// Index of the predecessor in the previous position's list
    back: usize,
}

/// Dynamic program over states of the last `left_window` labels.
///
/// With `width` set only the best `width` states survive each position.
pub(crate) fn best_sequence<M>(model: &M, width: Option<usize>) -> Vec<usize>
where
    M: SequenceModel + ?Sized,
{
    let n = model.length();
    if n == 0 {
        return Vec::new();
    }
    let left = model.left_window();
    let mut scratch = vec![0; n];
    let mut lattice: Vec<Vec<Hypothesis>> = Vec::with_capacity(n);
    let start = Hypothesis {
        state: Vec::new(),
        score: 0.0,
        label: 0,
        back: 0,
    };

    for pos in 0..n {
        let labels = model.possible_labels(pos);
        let previous: &[Hypothesis] = match lattice.last() {
            Some(hyps) => hyps,
            None => std::slice::from_ref(&start),
        };
        let mut current: Vec<Hypothesis> = Vec::new();
        let mut seen: HashMap<Vec<usize>, usize> = HashMap::new();
        for (j, hyp) in previous.iter().enumerate() {
            scratch[pos - hyp.state.len()..pos].copy_from_slice(&hyp.state);
            let scores = model.scores_of(&scratch, pos);
            for (&label, &score) in labels.iter().zip(&scores) {
                let mut state = hyp.state.clone();
                state.push(label);
                if state.len() > left {
                    state.remove(0);
                }
                let candidate = Hypothesis {
                    state,
                    score: hyp.score + score,
                    label,
                    back: j,
                };
                match seen.get(&candidate.state) {
                    Some(&k) => {
                        if candidate.score > current[k].score {
                            current[k] = candidate;
                        }
                    }
                    None => {
                        seen.insert(candidate.state.clone(), current.len());
                        current.push(candidate);
                    }
                }
            }
        }
        if let Some(width) = width {
            if current.len() > width {
                // stable: equal scores keep discovery order
                current.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
                current.truncate(width);
            }
        }
        lattice.push(current);
    }

    let last = &lattice[n - 1];
    let scores: Vec<f64> = last.iter().map(|h| h.score).collect();
    let mut k = argmax(&scores).unwrap_or(0);
    let mut labels = vec![0; n];
    for pos in (0..n).rev() {
        let hyp = &lattice[pos][k];
        labels[pos] = hyp.label;
        k = hyp.back;
    }
    labels
}

/// Exact maximum-score decoding.
///
/// Ties go to the hypothesis reached first in class order.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactDecoder;

impl ExactDecoder {
    pub fn decode<M: SequenceModel + ?Sized>(&self, model: &M) -> Vec<usize> {
        best_sequence(model, None)
    }
}
