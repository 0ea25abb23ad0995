use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::exact::best_sequence;
use super::ListeningModel;
use crate::clique_tree::log_sum_exp;
use crate::config::{Annealing, Config, GibbsInit};
use crate::error::{Error, Result};

/// Annealed Gibbs sampling over a weighted product of sequence models.
///
/// The first model is the clique tree, any further ones are priors. Every
/// accepted label change is reported to all of them. The returned sequence
/// is the best one seen under the plain weighted score, not the
/// temperature-scaled one the sampler draws from. On return every model has
/// been set to the returned sequence.
#[derive(Debug, Clone)]
pub struct GibbsDecoder {
    samples: usize,
    annealing: Annealing,
    initial_temperature: f64,
    target_temperature: f64,
    rate: f64,
    init: GibbsInit,
    seed: Option<u64>,
    model_weights: Vec<f64>,
}

impl GibbsDecoder {
    pub fn from_config(config: &Config) -> Result<Self> {
        if config.gibbs_samples == 0 {
            return Err(Error::config("gibbs_samples must be positive"));
        }
        if !(config.initial_temperature > 0.0 && config.target_temperature > 0.0) {
            return Err(Error::config("temperatures must be positive"));
        }
        if !config.model_weights.is_empty() && config.model_weights.len() != config.priors.len() + 1 {
            return Err(Error::config(format!(
                "{} model weights configured but only {} priors",
                config.model_weights.len(),
                config.priors.len()
            )));
        }
        Ok(Self {
            samples: config.gibbs_samples,
            annealing: config.annealing,
            initial_temperature: config.initial_temperature,
            target_temperature: config.target_temperature,
            rate: config.anneal_rate,
            init: config.gibbs_init,
            seed: config.seed,
            model_weights: config.model_weights.clone(),
        })
    }

    /// Temperature used for sweep number `step`
    pub fn temperature(&self, step: usize) -> f64 {
        let temperature = match self.annealing {
            Annealing::Linear => {
                let progress = step as f64 / self.samples as f64;
                self.initial_temperature
                    + (self.target_temperature - self.initial_temperature) * progress
            }
            Annealing::Exponential => self.initial_temperature * self.rate.powi(step as i32),
        };
        temperature.max(f64::MIN_POSITIVE)
    }

    fn weights_for(&self, count: usize) -> Result<Vec<f64>> {
        if self.model_weights.is_empty() {
            return Ok(vec![1.0; count]);
        }
        if self.model_weights.len() != count {
            return Err(Error::config(format!(
                "{} model weights configured for {} models; a required prior is missing",
                self.model_weights.len(),
                count
            )));
        }
        Ok(self.model_weights.clone())
    }

    fn combined_score(models: &[&mut dyn ListeningModel], weights: &[f64]) -> f64 {
        models
            .iter()
            .zip(weights)
            .map(|(m, w)| w * m.current_score())
            .sum()
    }

    pub fn decode(&self, models: &mut [&mut dyn ListeningModel]) -> Result<Vec<usize>> {
        let weights = self.weights_for(models.len())?;
        let tree = models
            .first()
            .ok_or_else(|| Error::config("gibbs decoding needs at least one model"))?;
        let n = tree.length();
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut sequence = match self.init {
            GibbsInit::Exact => best_sequence(&**tree, None),
            GibbsInit::Random => (0..n)
                .map(|pos| {
                    let labels = tree.possible_labels(pos);
                    labels[rng.gen_range(0..labels.len())]
                })
                .collect(),
        };
        for model in models.iter_mut() {
            model.set_initial_sequence(&sequence);
        }
        let mut best = sequence.clone();
        let mut best_score = Self::combined_score(models, &weights);

        let mut order: Vec<usize> = (0..n).collect();
        for step in 0..self.samples {
            let temperature = self.temperature(step);
            order.shuffle(&mut rng);
            for &pos in &order {
                let labels = models[0].possible_labels(pos);
                let mut combined = vec![0.0; labels.len()];
                for (model, w) in models.iter().zip(&weights) {
                    if *w == 0.0 {
                        continue;
                    }
                    for (c, s) in combined.iter_mut().zip(model.conditional_scores(&sequence, pos)) {
                        *c += w * s;
                    }
                }
                let scaled: Vec<f64> = combined.iter().map(|s| s / temperature).collect();
                let norm = log_sum_exp(scaled.iter().copied());
                let probs: Vec<f64> = scaled.iter().map(|s| (s - norm).exp()).collect();
                let dist = match WeightedIndex::new(&probs) {
                    Ok(dist) => dist,
                    Err(_) => continue,
                };
                let label = labels[dist.sample(&mut rng)];
                let old = sequence[pos];
                if label == old {
                    continue;
                }
                sequence[pos] = label;
                for model in models.iter_mut() {
                    model.update_sequence_element(&sequence, pos, old);
                }
                let score = Self::combined_score(models, &weights);
                if score > best_score {
                    best_score = score;
                    best.copy_from_slice(&sequence);
                }
            }
        }
        if best != sequence {
            for model in models.iter_mut() {
                model.set_initial_sequence(&best);
            }
        }
        Ok(best)
    }
}
