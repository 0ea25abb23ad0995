mod common;

use std::sync::Arc;

use chaincrf::index::{Indices, LabelTuple};
use chaincrf::{
    Classifier, Config, Error, ModelState, OptimizerKind, Result, Trainer, Weights,
    WordFeatureFactory,
};

fn weight(model: &ModelState, feature: &str, label: &str) -> f64 {
    let indices = model.indices();
    let f = indices.features().id_of(feature).unwrap();
    let class = indices.classes().id_of(label).unwrap();
    let tuple = indices
        .label_tuples(0)
        .id_of(&LabelTuple::new(vec![class]))
        .unwrap();
    model.weights().vector(f)[tuple]
}

fn labels_training_data(model: ModelState) {
    let classifier =
        Classifier::new(model, Arc::new(WordFeatureFactory::new()), &Config::default()).unwrap();
    for doc in common::people() {
        let gold: Vec<String> = doc.iter().map(|t| t.gold.clone().unwrap()).collect();
        assert_eq!(classifier.best_sequence(&doc).unwrap(), gold);
    }
}

#[test]
fn test_capitalization_favours_person() {
    let model = common::train(Config::default());
    assert_eq!(model.background(), "O");
    assert!(
        weight(&model, "isCapitalized|C", "PERSON") > weight(&model, "isCapitalized|C", "O"),
        "isCapitalized should prefer PERSON"
    );
}

#[test]
fn test_quasi_newton_fits_training_data() {
    labels_training_data(common::train(Config::default()));
}

#[test]
fn test_robust_quasi_newton() {
    let mut config = Config::default();
    config.robust_qn = true;
    labels_training_data(common::train(config));
}

#[test]
fn test_sgd() {
    let mut config = Config::default();
    config.optimizer = Some(OptimizerKind::Sgd);
    config.sgd_passes = 50;
    config.sgd_batch_size = 2;
    config.learning_rate = 1.0;
    config.seed = Some(7);
    labels_training_data(common::train(config));
}

#[test]
fn test_sgd_then_quasi_newton() {
    let mut config = Config::default();
    config.optimizer = Some(OptimizerKind::SgdToQuasiNewton);
    config.sgd_warmup_passes = 2;
    config.seed = Some(7);
    labels_training_data(common::train(config));
}

#[test]
fn test_l1_zeroes_weights() {
    let mut dense = Config::default();
    dense.optimizer = Some(OptimizerKind::Sgd);
    dense.sgd_passes = 30;
    dense.seed = Some(3);
    let mut sparse = dense.clone();
    sparse.optimizer = Some(OptimizerKind::L1Proximal);
    sparse.l1_weight = 0.5;

    let zeros = |m: &ModelState| m.weights().values().iter().filter(|&&v| v == 0.0).count();
    let dense = common::train(dense);
    let sparse = common::train(sparse);
    assert!(zeros(&sparse) > zeros(&dense));
}

#[test]
fn test_initial_weights_warm_start() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("init.w");
    let first = common::train(Config::default());
    chaincrf::store::write_weights(&path, first.weights().values()).unwrap();

    let mut config = Config::default();
    config.initial_weights = Some(path);
    config.max_iterations = 1;
    let warm = common::train(config);
    assert_eq!(warm.indices(), first.indices());
    labels_training_data(warm);
}

#[test]
fn test_initial_weights_wrong_length() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("init.w");
    chaincrf::store::write_weights(&path, &[1.0, 2.0]).unwrap();

    let factory = WordFeatureFactory::new();
    let mut config = Config::default();
    config.initial_weights = Some(path);
    let mut trainer = Trainer::new(config, &factory);
    assert!(matches!(
        trainer.train(&common::people()),
        Err(Error::Dimension(_))
    ));
}

#[test]
fn test_reverse_training() {
    let mut config = Config::default();
    config.reverse = true;
    let model = common::train(config);
    assert!(model.hyperparams().reverse);
    labels_training_data(model);
}

#[test]
fn test_evaluator_is_called() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let factory = WordFeatureFactory::new();
    let mut config = Config::default();
    config.evaluate_every = 1;
    let mut trainer = Trainer::new(config, &factory).evaluator(
        move |_iteration: usize, _indices: &Indices, _weights: &Weights| -> Result<f64> {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(0.0)
        },
    );
    trainer.train(&common::people()).unwrap();
    assert!(calls.load(Ordering::SeqCst) > 0);
}

/// Fires `isCapitalized|C` and nothing else
struct CapitalOnly;

impl chaincrf::FeatureFactory for CapitalOnly {
    fn name(&self) -> &str {
        "CapitalOnly"
    }

    fn features_for(
        &self,
        context: &chaincrf::Padded<'_>,
        position: usize,
        clique: &chaincrf::Clique,
    ) -> Vec<String> {
        let word = &context.at(position, 0).word;
        if clique.order() == 0 && word.chars().next().map_or(false, char::is_uppercase) {
            vec![clique.tag("isCapitalized")]
        } else {
            Vec::new()
        }
    }
}

#[test]
fn test_single_informative_feature() {
    use chaincrf::Token;

    let corpus = vec![
        vec![Token::with_gold("the", "O"), Token::with_gold("John", "PERSON")],
        vec![Token::with_gold("Mary", "PERSON"), Token::with_gold("ran", "O")],
    ];
    let mut config = Config::default();
    config.tolerance = 1e-8;
    let model = Trainer::new(config, &CapitalOnly).train(&corpus).unwrap();
    assert_eq!(model.indices().num_features(), 1);
    assert!(weight(&model, "isCapitalized|C", "PERSON") > weight(&model, "isCapitalized|C", "O"));
}

#[test]
fn test_hand_set_weight_decodes_person() {
    use chaincrf::index::IndexBuilder;
    use chaincrf::{Hyperparams, Token};

    let corpus = vec![vec![
        Token::with_gold("the", "O"),
        Token::with_gold("John", "PERSON"),
        Token::with_gold("ran", "O"),
    ]];
    let indices = IndexBuilder::new(&CapitalOnly, 2, "O").build(&corpus).unwrap();
    let mut weights = Weights::zeros(&indices);
    let f = indices.features().id_of("isCapitalized|C").unwrap();
    let person = indices.classes().id_of("PERSON").unwrap();
    let tuple = indices
        .label_tuples(0)
        .id_of(&LabelTuple::new(vec![person]))
        .unwrap();
    weights.vector_mut(f)[tuple] = 2.0;
    let hyper = Hyperparams {
        sigma: 1.0,
        reverse: false,
        factory: "CapitalOnly".to_string(),
    };
    let model = ModelState::new(hyper, indices, weights).unwrap();

    let classifier = Classifier::new(model, Arc::new(CapitalOnly), &Config::default()).unwrap();
    let labels = classifier
        .best_sequence(&common::words(&["the", "John", "ran"]))
        .unwrap();
    assert_eq!(labels, vec!["O", "PERSON", "O"]);
}
