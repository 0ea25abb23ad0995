//! Linear-chain Conditional Random Fields (CRF) with arbitrary label windows
//!
//! This library trains and applies CRF sequence labelers whose cliques span
//! up to `window` consecutive labels. Feature strings come from a pluggable
//! [`FeatureFactory`]; the engine indexes them, fits weights with L-BFGS or
//! SGD variants and decodes with exact Viterbi, beam search or annealed
//! Gibbs sampling.
//!
//! # Examples
//!
//! ## Training
//!
//! ```no_run
//! use chaincrf::{store, Config, Token, Trainer, WordFeatureFactory};
//!
//! let corpus = vec![vec![
//!     Token::with_gold("John", "PERSON"),
//!     Token::with_gold("ran", "O"),
//! ]];
//! let factory = WordFeatureFactory::new();
//! let mut trainer = Trainer::new(Config::default(), &factory);
//! trainer.set("sigma", "1.0")?;
//! let model = trainer.train(&corpus)?;
//! store::save(&model, "model.crf", store::Format::Binary)?;
//! # Ok::<(), chaincrf::Error>(())
//! ```
//!
//! ## Prediction
//!
//! ```no_run
//! use std::sync::Arc;
//! use chaincrf::{store, Classifier, Config, Token, WordFeatureFactory};
//!
//! let model = store::load("model.crf")?;
//! let classifier = Classifier::new(model, Arc::new(WordFeatureFactory::new()), &Config::default())?;
//! let labels = classifier.best_sequence(&[Token::new("Mary"), Token::new("sat")])?;
//! # Ok::<(), chaincrf::Error>(())
//! ```

mod clique_tree;
mod config;
mod dataset;
mod error;
mod feature;
mod log;
mod model;
mod token;
mod weights;

/// Exact, beam and Gibbs decoders
pub mod decode;
pub mod index;
/// Binary and text model files
pub mod store;
/// Training: objective, optimizers and the trainer
pub mod train;

pub use self::clique_tree::CliqueTree;
pub use self::config::{Annealing, Config, DecoderKind, GibbsInit, OptimizerKind, PriorKind};
pub use self::dataset::{Datum, Instance};
pub use self::error::{Error, Result};
pub use self::feature::{order_of, order_suffix, word_shape, Clique, FeatureFactory, WordFeatureFactory};
pub use self::log::Logger;
pub use self::model::{Classifier, Hyperparams, ModelState};
pub use self::token::{Document, Padded, Token};
pub use self::weights::Weights;

pub use self::train::Trainer;
