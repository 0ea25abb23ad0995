use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Decoding strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecoderKind {
    /// Viterbi over the full label window
    #[default]
    Exact,
    /// Viterbi keeping only the best `beam_width` states per position
    Beam,
    /// Annealed Gibbs sampling
    Gibbs,
}

/// Cooling schedule for the Gibbs decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Annealing {
    #[default]
    Linear,
    Exponential,
}

/// How the Gibbs decoder picks its starting assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GibbsInit {
    #[default]
    Exact,
    Random,
}

/// Numerical optimizer used by the trainer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptimizerKind {
    /// Limited-memory quasi-Newton
    #[default]
    QuasiNewton,
    /// Mini-batch stochastic gradient descent
    Sgd,
    /// A few SGD passes, then quasi-Newton from the SGD solution
    SgdToQuasiNewton,
    /// Stochastic proximal gradient with an L1 penalty
    L1Proximal,
}

/// Extra sequence model combined with the clique tree by the Gibbs decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorKind {
    Uniform,
    /// Penalise different labels on repeated words
    Consistency,
}

macro_rules! selector {
    ($ty:ty, $what:expr, { $($name:expr => $variant:path),+ $(,)? }) => {
        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s.to_ascii_lowercase().as_str() {
                    $($name => Ok($variant),)+
                    _ => Err(Error::config(format!("unknown {}: {}", $what, s))),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let name = match *self {
                    $($variant => $name,)+
                };
                f.write_str(name)
            }
        }
    };
}

selector!(DecoderKind, "decoder", {
    "exact" => DecoderKind::Exact,
    "beam" => DecoderKind::Beam,
    "gibbs" => DecoderKind::Gibbs,
});

selector!(Annealing, "annealing schedule", {
    "linear" => Annealing::Linear,
    "exp" => Annealing::Exponential,
});

selector!(GibbsInit, "gibbs initialisation", {
    "exact" => GibbsInit::Exact,
    "random" => GibbsInit::Random,
});

selector!(PriorKind, "prior", {
    "uniform" => PriorKind::Uniform,
    "consistency" => PriorKind::Consistency,
});

selector!(OptimizerKind, "optimizer", {
    "qn" => OptimizerKind::QuasiNewton,
    "sgd" => OptimizerKind::Sgd,
    "sgdtoqn" => OptimizerKind::SgdToQuasiNewton,
    "l1" => OptimizerKind::L1Proximal,
});

/// Every knob the engine consumes.
///
/// The caller owns the configuration; components only read it. Values can be
/// assigned directly or through [`Config::set`], which accepts the same
/// key/value pairs a properties file would carry.
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of consecutive positions in the largest clique
    pub window: usize,
    /// Name of the background label (class id 0)
    pub background: String,
    /// Standard deviation of the Gaussian prior (L2 penalty)
    pub sigma: f64,
    /// `None` means no optimizer has been selected
    pub optimizer: Option<OptimizerKind>,
    /// Quasi-Newton history depth
    pub qn_memory: usize,
    /// Use the damped, restart-on-failure quasi-Newton variant
    pub robust_qn: bool,
    pub tolerance: f64,
    pub max_iterations: usize,
    pub sgd_batch_size: usize,
    pub sgd_passes: usize,
    pub learning_rate: f64,
    /// SGD passes run before switching to quasi-Newton
    pub sgd_warmup_passes: usize,
    pub l1_weight: f64,
    pub decoder: DecoderKind,
    pub beam_width: usize,
    pub annealing: Annealing,
    pub initial_temperature: f64,
    /// Temperature reached at the end of the linear schedule
    pub target_temperature: f64,
    /// Multiplier applied each sample by the exponential schedule
    pub anneal_rate: f64,
    pub gibbs_samples: usize,
    pub gibbs_init: GibbsInit,
    /// Priors sampled jointly with the clique tree
    pub priors: Vec<PriorKind>,
    /// Log-linear weights: the clique tree first, then one per prior.
    /// Empty means every model weighs 1.
    pub model_weights: Vec<f64>,
    pub consistency_penalty: f64,
    pub feature_diff_threshold: f64,
    /// Number of prune-and-retrain rounds after the first training round
    pub prune_rounds: usize,
    /// Derive smaller label-tuple spaces from observed full tuples only
    pub observed_only: bool,
    /// Drop singleton features seen only between background labels
    pub drop_background_singletons: bool,
    /// Process documents right to left
    pub reverse: bool,
    pub initial_weights: Option<PathBuf>,
    /// Run the external evaluator every this many optimizer iterations (0 = never)
    pub evaluate_every: usize,
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window: 2,
            background: "O".to_string(),
            sigma: 1.0,
            optimizer: Some(OptimizerKind::QuasiNewton),
            qn_memory: 25,
            robust_qn: false,
            tolerance: 1e-4,
            max_iterations: 500,
            sgd_batch_size: 1,
            sgd_passes: 10,
            learning_rate: 0.1,
            sgd_warmup_passes: 3,
            l1_weight: 0.0,
            decoder: DecoderKind::Exact,
            beam_width: 30,
            annealing: Annealing::Linear,
            initial_temperature: 1.0,
            target_temperature: 0.1,
            anneal_rate: 0.95,
            gibbs_samples: 100,
            gibbs_init: GibbsInit::Exact,
            priors: Vec::new(),
            model_weights: Vec::new(),
            consistency_penalty: 1.0,
            feature_diff_threshold: 0.0,
            prune_rounds: 0,
            observed_only: false,
            drop_background_singletons: false,
            reverse: false,
            initial_weights: None,
            evaluate_every: 0,
            seed: None,
        }
    }
}

fn parse<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::config(format!("invalid value for {}: {}", name, value)))
}

fn parse_list<T: FromStr>(name: &str, value: &str) -> Result<Vec<T>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| parse(name, v))
        .collect()
}

fn join<T: fmt::Display>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn positive(name: &str, value: usize) -> Result<usize> {
    if value == 0 {
        return Err(Error::config(format!("{} must be positive", name)));
    }
    Ok(value)
}

fn non_negative(name: &str, value: f64) -> Result<f64> {
    if !(value >= 0.0) {
        return Err(Error::config(format!("{} must be non-negative", name)));
    }
    Ok(value)
}

fn strictly_positive(name: &str, value: f64) -> Result<f64> {
    if !(value > 0.0) {
        return Err(Error::config(format!("{} must be positive", name)));
    }
    Ok(value)
}

impl Config {
    /// Set a parameter from its string form
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        match name {
            "window" => self.window = positive(name, parse(name, value)?)?,
            "background" => {
                if value.is_empty() {
                    return Err(Error::config("background must be non-empty"));
                }
                self.background = value.to_string();
            }
            "sigma" => self.sigma = strictly_positive(name, parse(name, value)?)?,
            "optimizer" => {
                self.optimizer = if value.is_empty() || value == "none" {
                    None
                } else {
                    Some(value.parse()?)
                }
            }
            "qn_memory" => self.qn_memory = positive(name, parse(name, value)?)?,
            "robust_qn" => self.robust_qn = parse(name, value)?,
            "tolerance" => self.tolerance = non_negative(name, parse(name, value)?)?,
            "max_iterations" => self.max_iterations = positive(name, parse(name, value)?)?,
            "sgd_batch_size" => self.sgd_batch_size = positive(name, parse(name, value)?)?,
            "sgd_passes" => self.sgd_passes = positive(name, parse(name, value)?)?,
            "learning_rate" => {
                self.learning_rate = strictly_positive(name, parse(name, value)?)?
            }
            "sgd_warmup_passes" => self.sgd_warmup_passes = parse(name, value)?,
            "l1_weight" => self.l1_weight = non_negative(name, parse(name, value)?)?,
            "decoder" => self.decoder = value.parse()?,
            "beam_width" => self.beam_width = positive(name, parse(name, value)?)?,
            "annealing" => self.annealing = value.parse()?,
            "initial_temperature" => {
                self.initial_temperature = strictly_positive(name, parse(name, value)?)?
            }
            "target_temperature" => {
                self.target_temperature = strictly_positive(name, parse(name, value)?)?
            }
            "anneal_rate" => {
                let rate: f64 = parse(name, value)?;
                if !(rate > 0.0 && rate <= 1.0) {
                    return Err(Error::config("anneal_rate must be in (0, 1]"));
                }
                self.anneal_rate = rate;
            }
            "gibbs_samples" => self.gibbs_samples = positive(name, parse(name, value)?)?,
            "gibbs_init" => self.gibbs_init = value.parse()?,
            "priors" => self.priors = parse_list(name, value)?,
            "model_weights" => self.model_weights = parse_list(name, value)?,
            "consistency_penalty" => {
                self.consistency_penalty = non_negative(name, parse(name, value)?)?
            }
            "feature_diff_threshold" => {
                self.feature_diff_threshold = non_negative(name, parse(name, value)?)?
            }
            "prune_rounds" => self.prune_rounds = parse(name, value)?,
            "observed_only" => self.observed_only = parse(name, value)?,
            "drop_background_singletons" => self.drop_background_singletons = parse(name, value)?,
            "reverse" => self.reverse = parse(name, value)?,
            "initial_weights" => {
                self.initial_weights = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                }
            }
            "evaluate_every" => self.evaluate_every = parse(name, value)?,
            "seed" => self.seed = Some(parse(name, value)?),
            _ => return Err(Error::config(format!("unknown parameter: {}", name))),
        }
        Ok(())
    }

    /// Get a parameter in its string form
    pub fn get(&self, name: &str) -> Result<String> {
        let value = match name {
            "window" => self.window.to_string(),
            "background" => self.background.clone(),
            "sigma" => self.sigma.to_string(),
            "optimizer" => self
                .optimizer
                .map(|o| o.to_string())
                .unwrap_or_else(|| "none".to_string()),
            "qn_memory" => self.qn_memory.to_string(),
            "robust_qn" => self.robust_qn.to_string(),
            "tolerance" => self.tolerance.to_string(),
            "max_iterations" => self.max_iterations.to_string(),
            "sgd_batch_size" => self.sgd_batch_size.to_string(),
            "sgd_passes" => self.sgd_passes.to_string(),
            "learning_rate" => self.learning_rate.to_string(),
            "sgd_warmup_passes" => self.sgd_warmup_passes.to_string(),
            "l1_weight" => self.l1_weight.to_string(),
            "decoder" => self.decoder.to_string(),
            "beam_width" => self.beam_width.to_string(),
            "annealing" => self.annealing.to_string(),
            "initial_temperature" => self.initial_temperature.to_string(),
            "target_temperature" => self.target_temperature.to_string(),
            "anneal_rate" => self.anneal_rate.to_string(),
            "gibbs_samples" => self.gibbs_samples.to_string(),
            "gibbs_init" => self.gibbs_init.to_string(),
            "priors" => join(&self.priors),
            "model_weights" => join(&self.model_weights),
            "consistency_penalty" => self.consistency_penalty.to_string(),
            "feature_diff_threshold" => self.feature_diff_threshold.to_string(),
            "prune_rounds" => self.prune_rounds.to_string(),
            "observed_only" => self.observed_only.to_string(),
            "drop_background_singletons" => self.drop_background_singletons.to_string(),
            "reverse" => self.reverse.to_string(),
            "initial_weights" => self
                .initial_weights
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            "evaluate_every" => self.evaluate_every.to_string(),
            "seed" => self.seed.map(|s| s.to_string()).unwrap_or_default(),
            _ => return Err(Error::config(format!("unknown parameter: {}", name))),
        };
        Ok(value)
    }

    /// Check cross-field constraints that single setters cannot see
    pub fn validate(&self) -> Result<()> {
        positive("window", self.window)?;
        if self.background.is_empty() {
            return Err(Error::config("background must be non-empty"));
        }
        strictly_positive("sigma", self.sigma)?;
        if self.decoder == DecoderKind::Beam {
            positive("beam_width", self.beam_width)?;
        }
        if self.decoder == DecoderKind::Gibbs {
            positive("gibbs_samples", self.gibbs_samples)?;
            strictly_positive("initial_temperature", self.initial_temperature)?;
            strictly_positive("target_temperature", self.target_temperature)?;
            if !self.model_weights.is_empty() && self.model_weights.len() != self.priors.len() + 1 {
                return Err(Error::config(format!(
                    "{} model weights need {} priors, {} configured",
                    self.model_weights.len(),
                    self.model_weights.len().saturating_sub(1),
                    self.priors.len()
                )));
            }
        }
        if self.optimizer == Some(OptimizerKind::L1Proximal) && self.l1_weight == 0.0 {
            tracing::warn!("l1 optimizer selected with l1_weight = 0");
        }
        Ok(())
    }
}
