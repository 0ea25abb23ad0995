mod common;

use std::sync::Arc;

use chaincrf::{Classifier, Config, Error, Token, WordFeatureFactory};

#[test]
fn test_prune_extremes() {
    let model = common::train(Config::default());
    let n = model.indices().num_features();

    let kept = model.prune(0.0).unwrap();
    assert_eq!(kept.indices().num_features(), n);
    assert_eq!(kept.weights(), model.weights());

    let empty = model.prune(f64::INFINITY).unwrap();
    assert_eq!(empty.indices().num_features(), 0);
    assert!(empty.weights().is_empty());
    assert_eq!(empty.indices().classes(), model.indices().classes());
}

#[test]
fn test_pruned_model_falls_back_to_background() {
    let classifier = Classifier::new(
        common::train(Config::default()),
        Arc::new(WordFeatureFactory::new()),
        &Config::default(),
    )
    .unwrap();
    classifier.prune(f64::INFINITY).unwrap();
    let labels = classifier
        .best_sequence(&common::words(&["the", "John", "ran"]))
        .unwrap();
    assert_eq!(labels, vec!["O", "O", "O"]);
}

#[test]
fn test_pruning_keeps_wide_features() {
    let model = common::train(Config::default());
    let spread = |f: usize| {
        let v = model.weights().vector(f);
        let max = v.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = v.iter().copied().fold(f64::INFINITY, f64::min);
        max - min
    };
    let mut spreads: Vec<f64> = (0..model.indices().num_features()).map(spread).collect();
    spreads.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let threshold = spreads[spreads.len() / 2];
    let widest = (0..spreads.len())
        .max_by(|&a, &b| spread(a).partial_cmp(&spread(b)).unwrap())
        .unwrap();

    let pruned = model.prune(threshold).unwrap();
    let expected = spreads.iter().filter(|&&s| s >= threshold).count();
    assert_eq!(pruned.indices().num_features(), expected);
    let name = &model.indices().features().as_slice()[widest];
    let kept = pruned.indices().features().id_of(name.as_str()).unwrap();
    assert_eq!(pruned.weights().vector(kept), model.weights().vector(widest));
}

#[test]
fn test_combine_with_self() {
    let model = common::train(Config::default());
    let doubled = model.combine(&model, 1.0).unwrap();
    assert_eq!(doubled.indices(), model.indices());
    for (a, b) in doubled.weights().values().iter().zip(model.weights().values()) {
        assert!((a - 2.0 * b).abs() < 1e-12);
    }
    let same = model.combine(&model, 0.0).unwrap();
    assert_eq!(same.weights(), model.weights());
}

#[test]
fn test_combine_adds_new_features() {
    let base = common::train(Config::default());
    let factory = WordFeatureFactory::new();
    let other_corpus = vec![vec![
        Token::with_gold("Zed", "PERSON"),
        Token::with_gold("sang", "O"),
    ]];
    let other = chaincrf::Trainer::new(Config::default(), &factory)
        .train(&other_corpus)
        .unwrap();

    let combined = base.combine(&other, 0.5).unwrap();
    let features = combined.indices().features();
    assert!(features.contains("WORD-Zed|C"));
    assert!(features.contains("WORD-Alice|C"));
    assert!(combined.indices().num_features() > base.indices().num_features());

    let f = features.id_of("WORD-Zed|C").unwrap();
    let g = other.indices().features().id_of("WORD-Zed|C").unwrap();
    for (a, b) in combined.weights().vector(f).iter().zip(other.weights().vector(g)) {
        assert!((a - 0.5 * b).abs() < 1e-12);
    }
}

#[test]
fn test_combine_rejects_mismatched_models() {
    let base = common::train(Config::default());
    let mut config = Config::default();
    config.window = 3;
    let wider = common::train(config);
    assert!(matches!(base.combine(&wider, 1.0), Err(Error::Dimension(_))));
}

#[test]
fn test_replace_is_seen_by_later_calls() {
    let model = common::train(Config::default());
    let classifier = Classifier::new(
        model.clone(),
        Arc::new(WordFeatureFactory::new()),
        &Config::default(),
    )
    .unwrap();
    let before = classifier.snapshot();
    classifier.replace(model.prune(f64::INFINITY).unwrap());
    assert_eq!(before.indices().num_features(), model.indices().num_features());
    assert_eq!(classifier.snapshot().indices().num_features(), 0);
}
