use super::exact::best_sequence;
use super::SequenceModel;

/// Viterbi restricted to the `width` best states per position.
///
/// Once `width` reaches the number of label histories this is exact. Below
/// that the optimum can fall out of the beam, in which case a lower-scoring
/// sequence comes back without any indication.
#[derive(Debug, Clone, Copy)]
pub struct BeamDecoder {
    width: usize,
}

impl BeamDecoder {
    pub fn new(width: usize) -> Self {
        Self {
            width: width.max(1),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn decode<M: SequenceModel + ?Sized>(&self, model: &M) -> Vec<usize> {
        best_sequence(model, Some(self.width))
    }
}
