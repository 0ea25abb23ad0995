use std::collections::HashMap;

use super::{SequenceListener, SequenceModel};
use crate::token::Token;

/// Scores every sequence 0
#[derive(Debug, Clone)]
pub struct UniformPrior {
    length: usize,
    num_classes: usize,
}

impl UniformPrior {
    pub fn new(length: usize, num_classes: usize) -> Self {
        Self {
            length,
            num_classes,
        }
    }
}

impl SequenceModel for UniformPrior {
    fn length(&self) -> usize {
        self.length
    }

    fn left_window(&self) -> usize {
        0
    }

    fn possible_labels(&self, _position: usize) -> Vec<usize> {
        (0..self.num_classes).collect()
    }

    fn scores_of(&self, _sequence: &[usize], _position: usize) -> Vec<f64> {
        vec![0.0; self.num_classes]
    }

    fn score_of(&self, _sequence: &[usize], _position: usize) -> f64 {
        0.0
    }

    fn conditional_scores(&self, _sequence: &[usize], _position: usize) -> Vec<f64> {
        vec![0.0; self.num_classes]
    }
}

impl SequenceListener for UniformPrior {
    fn set_initial_sequence(&mut self, _sequence: &[usize]) {}

    fn update_sequence_element(&mut self, _sequence: &[usize], _position: usize, _old_label: usize) {}

    fn current_score(&self) -> f64 {
        0.0
    }
}

/// Penalises every pair of positions that share a word but not a label.
///
/// A sequence scores `-penalty` per disagreeing pair.
#[derive(Debug, Clone)]
pub struct ConsistencyPrior {
    num_classes: usize,
    penalty: f64,
    /// Word id of each position
    words: Vec<usize>,
    /// Positions of each word id
    occurrences: Vec<Vec<usize>>,
    /// `counts[word][label]` over the tracked sequence
    counts: Vec<Vec<usize>>,
    disagreements: usize,
}

impl ConsistencyPrior {
    pub fn new(doc: &[Token], num_classes: usize, penalty: f64) -> Self {
        let mut ids: HashMap<&str, usize> = HashMap::new();
        let mut occurrences: Vec<Vec<usize>> = Vec::new();
        let words = doc
            .iter()
            .enumerate()
            .map(|(pos, token)| {
                let next = ids.len();
                let id = *ids.entry(token.word.as_str()).or_insert(next);
                if id == occurrences.len() {
                    occurrences.push(Vec::new());
                }
                occurrences[id].push(pos);
                id
            })
            .collect();
        Self {
            num_classes,
            penalty,
            words,
            counts: vec![vec![0; num_classes]; occurrences.len()],
            occurrences,
            disagreements: 0,
        }
    }

    /// Positions sharing a word with `position` whose label is not `label`
    fn conflicts(&self, sequence: &[usize], position: usize, label: usize) -> usize {
        self.occurrences[self.words[position]]
            .iter()
            .filter(|&&j| j != position && sequence[j] != label)
            .count()
    }
}

impl SequenceModel for ConsistencyPrior {
    fn length(&self) -> usize {
        self.words.len()
    }

    fn left_window(&self) -> usize {
        0
    }

    fn possible_labels(&self, _position: usize) -> Vec<usize> {
        (0..self.num_classes).collect()
    }

    fn scores_of(&self, sequence: &[usize], position: usize) -> Vec<f64> {
        (0..self.num_classes)
            .map(|label| -self.penalty * self.conflicts(sequence, position, label) as f64)
            .collect()
    }

    /// Half of each pair's penalty goes to either end
    fn score_of(&self, sequence: &[usize], position: usize) -> f64 {
        -0.5 * self.penalty * self.conflicts(sequence, position, sequence[position]) as f64
    }

    fn conditional_scores(&self, sequence: &[usize], position: usize) -> Vec<f64> {
        self.scores_of(sequence, position)
    }
}

impl SequenceListener for ConsistencyPrior {
    fn set_initial_sequence(&mut self, sequence: &[usize]) {
        for row in self.counts.iter_mut() {
            row.iter_mut().for_each(|c| *c = 0);
        }
        for (pos, &label) in sequence.iter().enumerate() {
            self.counts[self.words[pos]][label] += 1;
        }
        let mut pairs = 0;
        for (word, row) in self.counts.iter().enumerate() {
            let n = self.occurrences[word].len();
            let same: usize = row.iter().map(|c| c * c).sum();
            pairs += (n * n - same) / 2;
        }
        self.disagreements = pairs;
    }

    fn update_sequence_element(&mut self, sequence: &[usize], position: usize, old_label: usize) {
        let word = self.words[position];
        let n = self.occurrences[word].len();
        let new_label = sequence[position];
        let before = n - self.counts[word][old_label];
        self.counts[word][old_label] -= 1;
        self.counts[word][new_label] += 1;
        let after = n - self.counts[word][new_label];
        self.disagreements = self.disagreements + after - before;
    }

    fn current_score(&self) -> f64 {
        -self.penalty * self.disagreements as f64
    }
}
