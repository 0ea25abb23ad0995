use std::collections::{HashMap, HashSet};

use bitflags::bitflags;

use super::dictionary::Index;
use super::label::LabelTuple;
use crate::dataset::{label_window, Datum, Instance};
use crate::error::{Error, Result};
use crate::feature::{order_of, FeatureFactory};
use crate::log::Logger;
use crate::token::{Padded, Token};
use crate::weights::Weights;

bitflags! {
    /// Options controlling how the indices are built
    #[derive(Default)]
    pub struct IndexOptions: u32 {
        /// Derive smaller label-tuple spaces by projecting observed full tuples
        const OBSERVED_ONLY = 0x01;
        /// Drop features seen exactly once, between two background labels
        const DROP_BACKGROUND_SINGLETONS = 0x02;
    }
}

/// Everything that maps strings and label tuples to dense ids.
///
/// Immutable once built; [`Indices::prune`] produces a new value instead of
/// editing this one.
#[derive(Debug, Clone)]
pub struct Indices {
    window: usize,
    options: IndexOptions,
    classes: Index<String>,
    features: Index<String>,
    /// `label_tuples[k]` holds tuples of length `k + 1`
    label_tuples: Vec<Index<LabelTuple>>,
    feature_type_of: Vec<usize>,
    /// `lookup[k][code]` is the id in `label_tuples[k]` of the tuple with that code
    lookup: Vec<Vec<Option<usize>>>,
}

impl PartialEq for Indices {
    fn eq(&self, other: &Self) -> bool {
        self.window == other.window
            && self.options == other.options
            && self.classes == other.classes
            && self.features == other.features
            && self.label_tuples == other.label_tuples
            && self.feature_type_of == other.feature_type_of
    }
}

/// Largest label-tuple space, in codes, that a lookup table may cover
const MAX_TUPLE_SPACE: usize = 1 << 24;

/// `num_classes^len`, refused past [`MAX_TUPLE_SPACE`]
fn tuple_space(num_classes: usize, len: usize) -> Result<usize> {
    u32::try_from(len)
        .ok()
        .and_then(|len| num_classes.checked_pow(len))
        .filter(|&codes| codes <= MAX_TUPLE_SPACE)
        .ok_or_else(|| {
            Error::dimension(format!(
                "{} classes over a window of {} exceed {} label tuples",
                num_classes, len, MAX_TUPLE_SPACE
            ))
        })
}

impl Indices {
    /// Assemble indices from their parts, checking every cross-reference
    pub fn from_parts(
        window: usize,
        options: IndexOptions,
        classes: Index<String>,
        features: Index<String>,
        label_tuples: Vec<Index<LabelTuple>>,
        feature_type_of: Vec<usize>,
    ) -> Result<Self> {
        if window == 0 {
            return Err(Error::config("window must be positive"));
        }
        if classes.is_empty() {
            return Err(Error::dimension("class index is empty"));
        }
        if label_tuples.len() != window {
            return Err(Error::dimension(format!(
                "{} label-tuple indices for window size {}",
                label_tuples.len(),
                window
            )));
        }
        if feature_type_of.len() != features.len() {
            return Err(Error::dimension(format!(
                "featureTypeOf has {} entries for {} features",
                feature_type_of.len(),
                features.len()
            )));
        }
        if let Some(&order) = feature_type_of.iter().find(|&&o| o >= window) {
            return Err(Error::dimension(format!(
                "feature order {} exceeds window size {}",
                order, window
            )));
        }
        let num_classes = classes.len();
        let mut lookup = Vec::with_capacity(window);
        for (k, tuples) in label_tuples.iter().enumerate() {
            let codes = tuple_space(num_classes, k + 1)?;
            let mut table = vec![None; codes];
            for (id, tuple) in tuples.iter().enumerate() {
                if tuple.len() != k + 1 || tuple.labels().iter().any(|&l| l >= num_classes) {
                    return Err(Error::dimension(format!(
                        "label tuple [{}] does not belong in index of order {}",
                        tuple, k
                    )));
                }
                table[tuple.encode(num_classes)] = Some(id);
            }
            lookup.push(table);
        }
        Ok(Self {
            window,
            options,
            classes,
            features,
            label_tuples,
            feature_type_of,
            lookup,
        })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn options(&self) -> IndexOptions {
        self.options
    }

    pub fn classes(&self) -> &Index<String> {
        &self.classes
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    /// Name of class 0
    pub fn background(&self) -> &str {
        self.classes.get(0).map(String::as_str).unwrap_or_default()
    }

    pub fn features(&self) -> &Index<String> {
        &self.features
    }

    pub fn num_features(&self) -> usize {
        self.features.len()
    }

    pub fn label_tuples(&self, order: usize) -> &Index<LabelTuple> {
        &self.label_tuples[order]
    }

    pub fn all_label_tuples(&self) -> &[Index<LabelTuple>] {
        &self.label_tuples
    }

    pub fn feature_type_of(&self) -> &[usize] {
        &self.feature_type_of
    }

    /// Code-to-id table for tuples of clique order `order`
    pub fn lookup(&self, order: usize) -> &[Option<usize>] {
        &self.lookup[order]
    }

    /// Convert a document to feature ids.
    ///
    /// Unknown feature strings are ignored. With `training` set, every token
    /// must carry a gold label present in the class index; otherwise gold
    /// labels are optional and unknown ones read as background.
    pub fn instance(
        &self,
        doc: &[Token],
        factory: &dyn FeatureFactory,
        training: bool,
    ) -> Result<Instance> {
        let padded = Padded::new(doc, self.background());
        let mut instance = Instance::with_capacity(doc.len());
        for (pos, token) in doc.iter().enumerate() {
            let mut datum = Datum::new(self.window);
            for order in 0..self.window {
                for clique in factory.cliques_at(order, 0) {
                    for name in factory.features_for(&padded, pos, &clique) {
                        if let Some(id) = self.features.id_of(name.as_str()) {
                            datum.features[self.feature_type_of[id]].push(id);
                        }
                    }
                }
            }
            datum.label = match (&token.gold, training) {
                (Some(gold), true) => self.classes.id_of(gold.as_str()).ok_or_else(|| {
                    Error::InvalidInput(format!("unknown gold label: {}", gold))
                })?,
                (None, true) => {
                    return Err(Error::InvalidInput(format!(
                        "token {} ({}) has no gold label",
                        pos, token.word
                    )))
                }
                (Some(gold), false) => self.classes.id_of(gold.as_str()).unwrap_or(0),
                (None, false) => 0,
            };
            instance.push(datum);
        }
        Ok(instance)
    }

    /// Drop every feature whose weights vary by less than `threshold`.
    ///
    /// Returns the rebuilt indices together with the remapped weights; the
    /// label-tuple and class indices are carried over unchanged.
    pub fn prune(&self, weights: &Weights, threshold: f64) -> Result<(Indices, Weights)> {
        weights.check(self)?;
        let mut features = Index::new();
        let mut feature_type_of = Vec::new();
        let mut vectors = Vec::new();
        for (f, name) in self.features.iter().enumerate() {
            let vector = weights.vector(f);
            let max = vector.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let min = vector.iter().copied().fold(f64::INFINITY, f64::min);
            let spread = if vector.is_empty() { 0.0 } else { max - min };
            if spread >= threshold {
                features.get_or_insert(name.clone());
                feature_type_of.push(self.feature_type_of[f]);
                vectors.push(vector.to_vec());
            }
        }
        let indices = Indices::from_parts(
            self.window,
            self.options,
            self.classes.clone(),
            features,
            self.label_tuples.clone(),
            feature_type_of,
        )?;
        let weights = Weights::from_vectors(&indices, vectors)?;
        Ok((indices, weights))
    }

    /// Append features missing from this index, keeping existing ids
    pub(crate) fn with_extra_features<'a, I>(&self, extra: I) -> Result<Indices>
    where
        I: IntoIterator<Item = (&'a String, usize)>,
    {
        let mut features = self.features.clone();
        let mut feature_type_of = self.feature_type_of.clone();
        for (name, order) in extra {
            if !features.contains(name.as_str()) {
                features.get_or_insert(name.clone());
                feature_type_of.push(order);
            }
        }
        Indices::from_parts(
            self.window,
            self.options,
            self.classes.clone(),
            features,
            self.label_tuples.clone(),
            feature_type_of,
        )
    }
}

/// Builds [`Indices`] from a labeled corpus
pub struct IndexBuilder<'a> {
    factory: &'a dyn FeatureFactory,
    window: usize,
    background: String,
    options: IndexOptions,
    logger: Logger,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(factory: &'a dyn FeatureFactory, window: usize, background: &str) -> Self {
        Self {
            factory,
            window,
            background: background.to_string(),
            options: IndexOptions::default(),
            logger: Logger::quiet(),
        }
    }

    pub fn options(mut self, options: IndexOptions) -> Self {
        self.options = options;
        self
    }

    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Feature strings active at `pos`, with their clique order
    fn features_at(&self, padded: &Padded<'_>, pos: usize) -> Result<Vec<(String, usize)>> {
        let mut active = Vec::new();
        for order in 0..self.window {
            for clique in self.factory.cliques_at(order, 0) {
                for name in self.factory.features_for(padded, pos, &clique) {
                    let feature_order = order_of(&name, self.window)?;
                    if feature_order != clique.order() {
                        return Err(Error::config(format!(
                            "feature {} does not end with clique suffix {}",
                            name,
                            clique.suffix()
                        )));
                    }
                    active.push((name, feature_order));
                }
            }
        }
        Ok(active)
    }

    fn gold_labels(&self, doc: &[Token], classes: &Index<String>) -> Result<Vec<usize>> {
        doc.iter()
            .map(|t| {
                t.gold
                    .as_deref()
                    .and_then(|g| classes.id_of(g))
                    .ok_or_else(|| Error::InvalidInput(format!("token {} has no gold label", t.word)))
            })
            .collect()
    }

    /// Build the class, feature and label-tuple indices.
    ///
    /// Class 0 is the background label; the remaining classes are numbered
    /// in order of first appearance.
    pub fn build(&self, corpus: &[Vec<Token>]) -> Result<Indices> {
        if self.window == 0 {
            return Err(Error::config("window must be positive"));
        }
        let mut classes = Index::new();
        classes.get_or_insert(self.background.clone());
        for doc in corpus {
            for token in doc {
                let gold = token.gold.as_ref().ok_or_else(|| {
                    Error::InvalidInput(format!("token {} has no gold label", token.word))
                })?;
                classes.get_or_insert(gold.clone());
            }
        }

        let suppressed = if self.options.contains(IndexOptions::DROP_BACKGROUND_SINGLETONS) {
            self.background_singletons(corpus, &classes)?
        } else {
            Default::default()
        };

        let mut features = Index::new();
        let mut feature_type_of = Vec::new();
        let mut observed = Index::new();
        for doc in corpus {
            let padded = Padded::new(doc, &self.background);
            let labels = self.gold_labels(doc, &classes)?;
            for pos in 0..doc.len() {
                for (name, order) in self.features_at(&padded, pos)? {
                    if suppressed.contains(&name) {
                        continue;
                    }
                    if !features.contains(name.as_str()) {
                        features.get_or_insert(name);
                        feature_type_of.push(order);
                    }
                }
                observed.get_or_insert(LabelTuple::new(label_window(&labels, pos, self.window)));
            }
        }

        let num_classes = classes.len();
        let label_tuples = if self.options.contains(IndexOptions::OBSERVED_ONLY) {
            let mut label_tuples = vec![observed];
            for _ in 1..self.window {
                let projected: Index<LabelTuple> = label_tuples[0].iter().map(LabelTuple::project).collect();
                label_tuples.insert(0, projected);
            }
            label_tuples
        } else {
            tuple_space(num_classes, self.window)?;
            (0..self.window)
                .map(|k| LabelTuple::all(k + 1, num_classes).collect())
                .collect()
        };

        self.logger.progress(format_args!(
            "built indices: {} classes, {} features ({} suppressed), label tuples per order {:?}",
            num_classes,
            features.len(),
            suppressed.len(),
            label_tuples.iter().map(Index::len).collect::<Vec<_>>()
        ));

        Indices::from_parts(
            self.window,
            self.options,
            classes,
            features,
            label_tuples,
            feature_type_of,
        )
    }

    /// Features occurring once, where the position and its predecessor are background
    fn background_singletons(
        &self,
        corpus: &[Vec<Token>],
        classes: &Index<String>,
    ) -> Result<HashSet<String>> {
        let mut seen: HashMap<String, (usize, bool)> = HashMap::new();
        for doc in corpus {
            let padded = Padded::new(doc, &self.background);
            let labels = self.gold_labels(doc, classes)?;
            for pos in 0..doc.len() {
                let background_pair = labels[pos] == 0 && (pos == 0 || labels[pos - 1] == 0);
                for (name, _) in self.features_at(&padded, pos)? {
                    let entry = seen.entry(name).or_insert((0, true));
                    entry.0 += 1;
                    entry.1 &= background_pair;
                }
            }
        }
        Ok(seen
            .into_iter()
            .filter(|(_, (count, background_pair))| *count == 1 && *background_pair)
            .map(|(name, _)| name)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{Clique, WordFeatureFactory};

    struct CapsFactory;

    impl FeatureFactory for CapsFactory {
        fn name(&self) -> &str {
            "CapsFactory"
        }

        fn features_for(&self, context: &Padded<'_>, position: usize, clique: &Clique) -> Vec<String> {
            let word = &context.at(position, 0).word;
            match clique.order() {
                0 => {
                    let mut f = vec![clique.tag(&format!("WORD-{}", word))];
                    if word.chars().next().map_or(false, char::is_uppercase) {
                        f.push(clique.tag("isCapitalized"));
                    }
                    f
                }
                _ => vec![clique.tag("PSEQ")],
            }
        }
    }

    fn corpus() -> Vec<Vec<Token>> {
        vec![
            vec![
                Token::with_gold("the", "O"),
                Token::with_gold("John", "PERSON"),
                Token::with_gold("ran", "O"),
            ],
            vec![
                Token::with_gold("Paris", "LOC"),
                Token::with_gold("is", "O"),
            ],
        ]
    }

    #[test]
    fn test_classes_first_seen() {
        let indices = IndexBuilder::new(&CapsFactory, 2, "O").build(&corpus()).unwrap();
        let classes: Vec<_> = indices.classes().iter().map(String::as_str).collect();
        assert_eq!(classes, vec!["O", "PERSON", "LOC"]);
        assert_eq!(indices.background(), "O");
    }

    #[test]
    fn test_feature_types() {
        let indices = IndexBuilder::new(&CapsFactory, 2, "O").build(&corpus()).unwrap();
        let pseq = indices.features().id_of("PSEQ|CpC").unwrap();
        assert_eq!(indices.feature_type_of()[pseq], 1);
        let caps = indices.features().id_of("isCapitalized|C").unwrap();
        assert_eq!(indices.feature_type_of()[caps], 0);
    }

    #[test]
    fn test_exhaustive_label_space() {
        let indices = IndexBuilder::new(&CapsFactory, 2, "O").build(&corpus()).unwrap();
        assert_eq!(indices.label_tuples(0).len(), 3);
        assert_eq!(indices.label_tuples(1).len(), 9);
    }

    #[test]
    fn test_observed_label_space() {
        let indices = IndexBuilder::new(&CapsFactory, 2, "O")
            .options(IndexOptions::OBSERVED_ONLY)
            .build(&corpus())
            .unwrap();
        // (O,O) (O,PERSON) (PERSON,O) (O,LOC) (LOC,O)
        assert_eq!(indices.label_tuples(1).len(), 5);
        let unigrams: Vec<_> = indices.label_tuples(0).iter().map(|t| t.labels()[0]).collect();
        assert_eq!(unigrams, vec![0, 1, 2]);
        assert!(indices.lookup(1)[LabelTuple::new(vec![1, 2]).encode(3)].is_none());
    }

    #[test]
    fn test_background_singletons() {
        let plain = IndexBuilder::new(&CapsFactory, 2, "O").build(&corpus()).unwrap();
        let pruned = IndexBuilder::new(&CapsFactory, 2, "O")
            .options(IndexOptions::DROP_BACKGROUND_SINGLETONS)
            .build(&corpus())
            .unwrap();
        // "the" sits between padding and O, "John" is labeled PERSON
        assert!(plain.features().contains("WORD-the|C"));
        assert!(!pruned.features().contains("WORD-the|C"));
        assert!(pruned.features().contains("WORD-John|C"));
        // "ran" follows PERSON
        assert!(pruned.features().contains("WORD-ran|C"));
    }

    #[test]
    fn test_oversized_tuple_space_is_refused() {
        let mut classes = Index::new();
        classes.get_or_insert("O".to_string());
        classes.get_or_insert("X".to_string());
        let label_tuples = vec![Index::new(); 70];
        let result = Indices::from_parts(70, IndexOptions::empty(), classes, Index::new(), label_tuples, Vec::new());
        assert!(matches!(result, Err(Error::Dimension(_))));

        let wide = IndexBuilder::new(&CapsFactory, 30, "O").build(&corpus());
        assert!(matches!(wide, Err(Error::Dimension(_))));
    }

    #[test]
    fn test_unrecognized_suffix() {
        struct Bad;
        impl FeatureFactory for Bad {
            fn name(&self) -> &str {
                "Bad"
            }
            fn features_for(&self, _: &Padded<'_>, _: usize, _: &Clique) -> Vec<String> {
                vec!["WORD|X".to_string()]
            }
        }
        let result = IndexBuilder::new(&Bad, 2, "O").build(&corpus());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_instance_conversion() {
        let factory = WordFeatureFactory::new();
        let indices = IndexBuilder::new(&factory, 2, "O").build(&corpus()).unwrap();
        let doc = vec![Token::from("the"), Token::from("Unseen")];
        let instance = indices.instance(&doc, &factory, false).unwrap();
        assert_eq!(instance.len(), 2);
        assert_eq!(instance.labels(), vec![0, 0]);
        let the = indices.features().id_of("WORD-the|C").unwrap();
        assert!(instance.data[0].features[0].contains(&the));
        assert!(indices.instance(&doc, &factory, true).is_err());
    }

    #[test]
    fn test_prune_extremes() {
        let indices = IndexBuilder::new(&CapsFactory, 2, "O").build(&corpus()).unwrap();
        let mut weights = Weights::zeros(&indices);
        let caps = indices.features().id_of("isCapitalized|C").unwrap();
        weights.vector_mut(caps)[1] = 0.5;

        let (kept, kept_weights) = indices.prune(&weights, 0.0).unwrap();
        assert_eq!(kept.num_features(), indices.num_features());
        assert_eq!(kept_weights, weights);

        let (some, some_weights) = indices.prune(&weights, 0.1).unwrap();
        assert_eq!(some.num_features(), 1);
        assert_eq!(some_weights.vector(0), weights.vector(caps));

        let (none, none_weights) = indices.prune(&weights, f64::INFINITY).unwrap();
        assert_eq!(none.num_features(), 0);
        assert!(none_weights.is_empty());
    }
}
