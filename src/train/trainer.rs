use super::objective::Objective;
use super::optimizer::{Evaluator, Monitor, Optimizer};
use crate::config::Config;
use crate::dataset::Instance;
use crate::error::{Error, Result};
use crate::feature::FeatureFactory;
use crate::index::{IndexBuilder, IndexOptions, Indices};
use crate::log::Logger;
use crate::model::{Hyperparams, ModelState};
use crate::store;
use crate::token::{orient, Document};
use crate::weights::Weights;

/// CRF trainer.
///
/// Builds the indices from the training corpus, fits the weights with the
/// configured optimizer and optionally alternates pruning with retraining.
pub struct Trainer<'a> {
    config: Config,
    factory: &'a dyn FeatureFactory,
    logger: Logger,
    evaluator: Option<Box<dyn Evaluator>>,
}

impl<'a> Trainer<'a> {
    pub fn new(config: Config, factory: &'a dyn FeatureFactory) -> Self {
        Self {
            config,
            factory,
            logger: Logger::quiet(),
            evaluator: None,
        }
    }

    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Score the weights every `config.evaluate_every` iterations
    pub fn evaluator<E: Evaluator + 'static>(mut self, evaluator: E) -> Self {
        self.evaluator = Some(Box::new(evaluator));
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Set a parameter from its string form
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        self.config.set(name, value)
    }

    /// Get a parameter in its string form
    pub fn get(&self, name: &str) -> Result<String> {
        self.config.get(name)
    }

    fn index_options(&self) -> IndexOptions {
        let mut options = IndexOptions::empty();
        options.set(IndexOptions::OBSERVED_ONLY, self.config.observed_only);
        options.set(
            IndexOptions::DROP_BACKGROUND_SINGLETONS,
            self.config.drop_background_singletons,
        );
        options
    }

    fn initial_weights(&self, indices: &Indices) -> Result<Weights> {
        match &self.config.initial_weights {
            Some(path) => {
                let values = store::read_weights(path)?;
                self.logger.progress(format_args!(
                    "loaded {} initial weights from {}",
                    values.len(),
                    path.display()
                ));
                Weights::from_values(indices, values)
            }
            None => Ok(Weights::zeros(indices)),
        }
    }

    fn instances(&self, docs: &[Document], indices: &Indices) -> Result<Vec<Instance>> {
        docs.iter()
            .map(|doc| indices.instance(doc, self.factory, true))
            .collect()
    }

    /// Train on `corpus` and return the fitted model
    pub fn train(&mut self, corpus: &[Document]) -> Result<ModelState> {
        self.config.validate()?;
        let optimizer = Optimizer::from_config(&self.config)?;
        if corpus.is_empty() {
            return Err(Error::InvalidInput("no training data".to_string()));
        }
        if corpus.iter().any(Vec::is_empty) {
            return Err(Error::InvalidInput("empty sequences are not allowed".to_string()));
        }

        let docs: Vec<Document> = corpus
            .iter()
            .map(|doc| {
                let mut doc = doc.clone();
                orient(&mut doc, self.config.reverse);
                doc
            })
            .collect();

        let mut indices = IndexBuilder::new(self.factory, self.config.window, &self.config.background)
            .options(self.index_options())
            .logger(self.logger)
            .build(&docs)?;
        let mut weights = self.initial_weights(&indices)?;

        for round in 0..=self.config.prune_rounds {
            let instances = self.instances(&docs, &indices)?;
            self.logger.progress(format_args!(
                "round {}: {} features, {} parameters",
                round,
                indices.num_features(),
                weights.len()
            ));

            let mut objective = Objective::new(&instances, &indices, self.config.sigma);
            let mut x = weights.values().to_vec();
            let report = {
                let mut monitor = Monitor::new(self.logger).with_evaluator(
                    self.config.evaluate_every,
                    self.evaluator.as_mut(),
                    &indices,
                    &weights,
                );
                optimizer.minimize(&mut objective, &mut x, &mut monitor)
            };
            self.logger.progress(format_args!(
                "round {}: objective {:.6} after {} iterations{}",
                round,
                report.value,
                report.iterations,
                if report.converged { "" } else { " (not converged)" }
            ));
            weights = weights.with_values(x)?;

            if round < self.config.prune_rounds {
                let (pruned, remapped) = indices.prune(&weights, self.config.feature_diff_threshold)?;
                self.logger.progress(format_args!(
                    "pruned {} of {} features",
                    indices.num_features() - pruned.num_features(),
                    indices.num_features()
                ));
                indices = pruned;
                weights = remapped;
            }
        }

        let hyper = Hyperparams {
            sigma: self.config.sigma,
            reverse: self.config.reverse,
            factory: self.factory.name().to_string(),
        };
        ModelState::new(hyper, indices, weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::WordFeatureFactory;
    use crate::token::Token;

    fn corpus() -> Vec<Document> {
        vec![
            vec![
                Token::with_gold("the", "O"),
                Token::with_gold("John", "PERSON"),
                Token::with_gold("ran", "O"),
            ],
            vec![Token::with_gold("Mary", "PERSON"), Token::with_gold("sat", "O")],
        ]
    }

    #[test]
    fn test_empty_corpus() {
        let factory = WordFeatureFactory::new();
        let mut trainer = Trainer::new(Config::default(), &factory);
        assert!(matches!(trainer.train(&[]), Err(Error::InvalidInput(_))));
        assert!(matches!(trainer.train(&[vec![]]), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_missing_initial_weights_is_fatal() {
        let factory = WordFeatureFactory::new();
        let mut trainer = Trainer::new(Config::default(), &factory);
        trainer
            .set("initial_weights", "/nonexistent/chaincrf/weights.bin")
            .unwrap();
        assert!(matches!(trainer.train(&corpus()), Err(Error::Io(_))));
    }

    #[test]
    fn test_prune_rounds_shrink_model() {
        let factory = WordFeatureFactory::new();
        let mut config = Config::default();
        config.prune_rounds = 1;
        config.feature_diff_threshold = 1e6;
        let mut trainer = Trainer::new(config, &factory);
        let model = trainer.train(&corpus()).unwrap();
        assert_eq!(model.indices().num_features(), 0);
        assert!(model.weights().is_empty());
    }
}
