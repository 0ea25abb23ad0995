use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::RwLock;
use rayon::prelude::*;

use crate::clique_tree::CliqueTree;
use crate::config::Config;
use crate::decode::Decoder;
use crate::error::{Error, Result};
use crate::feature::FeatureFactory;
use crate::index::Indices;
use crate::log::Logger;
use crate::token::{orient, Document, Token};
use crate::weights::Weights;

/// Training settings saved alongside a model
#[derive(Debug, Clone, PartialEq)]
pub struct Hyperparams {
    pub sigma: f64,
    /// Documents are processed right to left
    pub reverse: bool,
    /// Name of the feature factory the model was trained with
    pub factory: String,
}

/// A trained model: indices and the weights laid out after them.
///
/// Values are never edited in place; pruning and combining build a new
/// state.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelState {
    hyper: Hyperparams,
    indices: Indices,
    weights: Weights,
}

impl ModelState {
    pub fn new(hyper: Hyperparams, indices: Indices, weights: Weights) -> Result<Self> {
        weights.check(&indices)?;
        Ok(Self {
            hyper,
            indices,
            weights,
        })
    }

    pub fn hyperparams(&self) -> &Hyperparams {
        &self.hyper
    }

    pub fn indices(&self) -> &Indices {
        &self.indices
    }

    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    pub fn window(&self) -> usize {
        self.indices.window()
    }

    pub fn background(&self) -> &str {
        self.indices.background()
    }

    pub fn label(&self, id: usize) -> Option<&str> {
        self.indices.classes().get(id).map(String::as_str)
    }

    /// Calibrated clique tree for a document already in processing order
    pub fn calibrate(&self, doc: &[Token], factory: &dyn FeatureFactory) -> Result<CliqueTree> {
        let instance = self.indices.instance(doc, factory, false)?;
        Ok(CliqueTree::calibrate(&instance, &self.indices, &self.weights))
    }

    /// Drop features whose weights vary by less than `threshold`
    pub fn prune(&self, threshold: f64) -> Result<ModelState> {
        let (indices, weights) = self.indices.prune(&self.weights, threshold)?;
        ModelState::new(self.hyper.clone(), indices, weights)
    }

    /// Add `weight` times `other`'s weights to this model.
    ///
    /// Features only `other` knows are appended to the feature index. Both
    /// models must agree on window size, classes and label-tuple indices.
    pub fn combine(&self, other: &ModelState, weight: f64) -> Result<ModelState> {
        let (a, b) = (&self.indices, &other.indices);
        if a.window() != b.window() {
            return Err(Error::dimension(format!(
                "window size {} vs {}",
                a.window(),
                b.window()
            )));
        }
        if a.background() != b.background() {
            return Err(Error::dimension(format!(
                "background label {} vs {}",
                a.background(),
                b.background()
            )));
        }
        if a.classes() != b.classes() {
            return Err(Error::dimension("class indices differ"));
        }
        if a.all_label_tuples() != b.all_label_tuples() {
            return Err(Error::dimension("label-tuple indices differ"));
        }

        let extra = b
            .features()
            .iter()
            .zip(b.feature_type_of())
            .map(|(name, &order)| (name, order));
        let indices = a.with_extra_features(extra)?;
        let mut weights = Weights::zeros(&indices);
        for f in 0..a.num_features() {
            weights.vector_mut(f).copy_from_slice(self.weights.vector(f));
        }
        for (f, name) in b.features().iter().enumerate() {
            let target = indices
                .features()
                .id_of(name.as_str())
                .ok_or_else(|| Error::dimension(format!("feature {} lost in union", name)))?;
            for (w, v) in weights.vector_mut(target).iter_mut().zip(other.weights.vector(f)) {
                *w += weight * v;
            }
        }
        ModelState::new(self.hyper.clone(), indices, weights)
    }

    /// Write a human-readable listing of the model
    pub fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let indices = &self.indices;
        writeln!(w, "HYPERPARAMS = {{")?;
        writeln!(w, "  window: {}", indices.window())?;
        writeln!(w, "  sigma: {}", self.hyper.sigma)?;
        writeln!(w, "  reverse: {}", self.hyper.reverse)?;
        writeln!(w, "  factory: {}", self.hyper.factory)?;
        writeln!(w, "  options: {:?}", indices.options())?;
        writeln!(w, "}}\n")?;

        writeln!(w, "CLASSES = {{")?;
        for (i, class) in indices.classes().iter().enumerate() {
            writeln!(w, "  {:>5}: {}", i, class)?;
        }
        writeln!(w, "}}\n")?;

        for (order, tuples) in indices.all_label_tuples().iter().enumerate() {
            writeln!(w, "LABEL_TUPLES[{}] = {{", order)?;
            for (i, tuple) in tuples.iter().enumerate() {
                let names: Vec<&str> = tuple
                    .labels()
                    .iter()
                    .map(|&l| self.label(l).unwrap_or("?"))
                    .collect();
                writeln!(w, "  {:>5}: {}", i, names.join(" "))?;
            }
            writeln!(w, "}}\n")?;
        }

        writeln!(w, "WEIGHTS = {{")?;
        for (f, name) in indices.features().iter().enumerate() {
            let tuples = indices.label_tuples(indices.feature_type_of()[f]);
            for (id, &value) in self.weights.vector(f).iter().enumerate() {
                if value == 0.0 {
                    continue;
                }
                let labels = tuples.get(id).map(|t| t.to_string()).unwrap_or_default();
                writeln!(w, "  {} [{}]: {:.6}", name, labels, value)?;
            }
        }
        writeln!(w, "}}")?;
        Ok(())
    }
}

/// Labels documents with a shared model.
///
/// The model sits behind a lock holding an `Arc`; every call works on the
/// snapshot it grabbed at the start, and [`Classifier::replace`] swaps in a
/// whole new state at once.
pub struct Classifier {
    state: RwLock<Arc<ModelState>>,
    factory: Arc<dyn FeatureFactory>,
    decoder: Decoder,
    logger: Logger,
}

impl Classifier {
    pub fn new(state: ModelState, factory: Arc<dyn FeatureFactory>, config: &Config) -> Result<Self> {
        let decoder = Decoder::from_config(config)?;
        if factory.name() != state.hyper.factory {
            tracing::warn!(
                "model was trained with {} but classifying with {}",
                state.hyper.factory,
                factory.name()
            );
        }
        Ok(Self {
            state: RwLock::new(Arc::new(state)),
            factory,
            decoder,
            logger: Logger::quiet(),
        })
    }

    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Current model
    pub fn snapshot(&self) -> Arc<ModelState> {
        self.state.read().clone()
    }

    pub fn replace(&self, state: ModelState) {
        *self.state.write() = Arc::new(state);
    }

    /// Class ids of the best labeling, in document order
    fn decode(&self, state: &ModelState, doc: &[Token]) -> Result<Vec<usize>> {
        if doc.is_empty() {
            return Ok(Vec::new());
        }
        let reverse = state.hyper.reverse;
        let mut work = doc.to_vec();
        orient(&mut work, reverse);
        let mut tree = state.calibrate(&work, self.factory.as_ref())?;
        let mut labels = self.decoder.decode(&mut tree, &work)?;
        if reverse {
            labels.reverse();
        }
        Ok(labels)
    }

    /// Best label for every token
    pub fn best_sequence(&self, doc: &[Token]) -> Result<Vec<String>> {
        let state = self.snapshot();
        let labels = self.decode(&state, doc)?;
        Ok(labels
            .into_iter()
            .map(|l| state.label(l).unwrap_or_default().to_string())
            .collect())
    }

    /// Write the best label onto each token's `answer`
    pub fn classify(&self, doc: &mut [Token]) -> Result<()> {
        let labels = self.best_sequence(doc)?;
        for (token, label) in doc.iter_mut().zip(labels) {
            token.answer = Some(label);
        }
        Ok(())
    }

    /// Classify independent documents in parallel
    pub fn classify_all(&self, docs: &mut [Document]) -> Result<()> {
        docs.par_iter_mut().try_for_each(|doc| self.classify(doc))?;
        self.logger
            .progress(format_args!("classified {} documents", docs.len()));
        Ok(())
    }

    /// Per-token distribution over classes, in class-index order
    pub fn marginals(&self, doc: &[Token]) -> Result<Vec<Vec<f64>>> {
        let state = self.snapshot();
        if doc.is_empty() {
            return Ok(Vec::new());
        }
        let reverse = state.hyper.reverse;
        let mut work = doc.to_vec();
        orient(&mut work, reverse);
        let tree = state.calibrate(&work, self.factory.as_ref())?;
        let mut marginals: Vec<Vec<f64>> = (0..tree.length()).map(|i| tree.marginals(i)).collect();
        if reverse {
            marginals.reverse();
        }
        Ok(marginals)
    }

    pub fn prune(&self, threshold: f64) -> Result<()> {
        let pruned = self.snapshot().prune(threshold)?;
        self.logger.progress(format_args!(
            "pruned model keeps {} features",
            pruned.indices().num_features()
        ));
        self.replace(pruned);
        Ok(())
    }

    pub fn combine(&self, other: &ModelState, weight: f64) -> Result<()> {
        let combined = self.snapshot().combine(other, weight)?;
        self.replace(combined);
        Ok(())
    }
}
