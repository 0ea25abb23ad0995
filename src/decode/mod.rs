//! Decoders and the scoring interfaces they consume

mod beam;
mod exact;
mod gibbs;
mod prior;

pub use self::beam::BeamDecoder;
pub use self::exact::ExactDecoder;
pub use self::gibbs::GibbsDecoder;
pub use self::prior::{ConsistencyPrior, UniformPrior};

use crate::clique_tree::CliqueTree;
use crate::config::{Config, DecoderKind, PriorKind};
use crate::error::Result;
use crate::token::Token;

/// A model scoring label sequences position by position.
///
/// Sequences hold class ids for positions `0..length()`; positions before
/// the start read as the background class.
pub trait SequenceModel {
    fn length(&self) -> usize;

    /// Number of preceding labels a position's score depends on
    fn left_window(&self) -> usize;

    fn possible_labels(&self, position: usize) -> Vec<usize>;

    /// Score of every label in `possible_labels(position)` at `position`,
    /// given the labels before it in `sequence`
    fn scores_of(&self, sequence: &[usize], position: usize) -> Vec<f64>;

    /// Score of the label `sequence` holds at `position`
    fn score_of(&self, sequence: &[usize], position: usize) -> f64;

    fn score(&self, sequence: &[usize]) -> f64 {
        (0..self.length()).map(|i| self.score_of(sequence, i)).sum()
    }

    /// Unnormalised log-probability of each possible label at `position`
    /// given every other label in `sequence`.
    ///
    /// The default rescores a copy of the sequence, which costs a full copy
    /// per call; models used for Gibbs sampling override it.
    fn conditional_scores(&self, sequence: &[usize], position: usize) -> Vec<f64> {
        let last = (position + self.left_window()).min(self.length().saturating_sub(1));
        let mut scratch = sequence.to_vec();
        self.possible_labels(position)
            .into_iter()
            .map(|label| {
                scratch[position] = label;
                (position..=last).map(|i| self.score_of(&scratch, i)).sum()
            })
            .collect()
    }
}

/// A model that follows single-position edits of a sequence
pub trait SequenceListener {
    fn set_initial_sequence(&mut self, sequence: &[usize]);

    /// `sequence` already holds the new label at `position`
    fn update_sequence_element(&mut self, sequence: &[usize], position: usize, old_label: usize);

    /// Score of the sequence last seen
    fn current_score(&self) -> f64;
}

/// Something the Gibbs decoder can both query and notify
pub trait ListeningModel: SequenceModel + SequenceListener {}

impl<T: SequenceModel + SequenceListener> ListeningModel for T {}

/// Pick the first best-scoring entry
pub(crate) fn argmax(scores: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, &s) in scores.iter().enumerate() {
        if best.map_or(true, |b| s > scores[b]) {
            best = Some(i);
        }
    }
    best
}

/// The configured decoding strategy
#[derive(Debug, Clone)]
pub enum Decoder {
    Exact(ExactDecoder),
    Beam(BeamDecoder),
    /// Sampling over the tree and one prior per entry of `priors`
    Gibbs {
        sampler: GibbsDecoder,
        priors: Vec<PriorKind>,
        consistency_penalty: f64,
    },
}

impl Decoder {
    pub fn from_config(config: &Config) -> Result<Self> {
        let decoder = match config.decoder {
            DecoderKind::Exact => Decoder::Exact(ExactDecoder),
            DecoderKind::Beam => Decoder::Beam(BeamDecoder::new(config.beam_width)),
            DecoderKind::Gibbs => Decoder::Gibbs {
                sampler: GibbsDecoder::from_config(config)?,
                priors: config.priors.clone(),
                consistency_penalty: config.consistency_penalty,
            },
        };
        Ok(decoder)
    }

    /// Best label sequence for one document's calibrated tree
    pub fn decode(&self, tree: &mut CliqueTree, doc: &[Token]) -> Result<Vec<usize>> {
        match self {
            Decoder::Exact(exact) => Ok(exact.decode(&*tree)),
            Decoder::Beam(beam) => Ok(beam.decode(&*tree)),
            Decoder::Gibbs {
                sampler,
                priors,
                consistency_penalty,
            } => {
                let num_classes = tree.num_classes();
                let mut owned: Vec<Box<dyn ListeningModel>> = priors
                    .iter()
                    .map(|kind| -> Box<dyn ListeningModel> {
                        match kind {
                            PriorKind::Uniform => Box::new(UniformPrior::new(doc.len(), num_classes)),
                            PriorKind::Consistency => {
                                Box::new(ConsistencyPrior::new(doc, num_classes, *consistency_penalty))
                            }
                        }
                    })
                    .collect();
                let mut models: Vec<&mut dyn ListeningModel> = Vec::with_capacity(owned.len() + 1);
                models.push(tree);
                for model in owned.iter_mut() {
                    models.push(model.as_mut());
                }
                sampler.decode(&mut models)
            }
        }
    }
}
