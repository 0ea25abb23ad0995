mod common;

use std::sync::Arc;

use chaincrf::{Classifier, Config, Error, PriorKind, Trainer, WordFeatureFactory};

fn config_error(result: chaincrf::Result<()>) -> String {
    match result {
        Err(Error::Config(msg)) => msg,
        other => panic!("expected a config error, got {:?}", other),
    }
}

#[test]
fn test_unknown_parameter() {
    let mut config = Config::default();
    assert_eq!(
        config_error(config.set("c1", "1.0")),
        "unknown parameter: c1"
    );
    assert!(matches!(config.get("c1"), Err(Error::Config(_))));
}

#[test]
fn test_sigma_validation() {
    let mut config = Config::default();
    assert_eq!(config_error(config.set("sigma", "-1.0")), "sigma must be positive");
    assert_eq!(config_error(config.set("sigma", "0")), "sigma must be positive");
    assert!(config.set("sigma", "2.5").is_ok());
    assert_eq!(config.get("sigma").unwrap(), "2.5");
}

#[test]
fn test_window_validation() {
    let mut config = Config::default();
    assert_eq!(config_error(config.set("window", "0")), "window must be positive");
    assert!(config.set("window", "abc").is_err());
    assert!(config.set("window", "3").is_ok());
    assert_eq!(config.window, 3);
}

#[test]
fn test_selectors() {
    let mut config = Config::default();
    assert!(config.set("decoder", "viterbi").is_err());
    assert!(config.set("optimizer", "newton").is_err());
    assert!(config.set("annealing", "cubic").is_err());

    for (name, value) in [
        ("decoder", "beam"),
        ("optimizer", "sgdtoqn"),
        ("annealing", "exp"),
        ("gibbs_init", "random"),
        ("priors", "uniform,consistency"),
        ("model_weights", "1,0.5,2"),
    ] {
        config.set(name, value).unwrap();
        assert_eq!(config.get(name).unwrap(), value);
    }
    assert_eq!(config.priors, vec![PriorKind::Uniform, PriorKind::Consistency]);
}

#[test]
fn test_anneal_rate_range() {
    let mut config = Config::default();
    assert!(config.set("anneal_rate", "0").is_err());
    assert!(config.set("anneal_rate", "1.5").is_err());
    assert!(config.set("anneal_rate", "1").is_ok());
}

#[test]
fn test_no_optimizer_selected() {
    let factory = WordFeatureFactory::new();
    let mut trainer = Trainer::new(Config::default(), &factory);
    trainer.set("optimizer", "none").unwrap();
    assert_eq!(trainer.get("optimizer").unwrap(), "none");
    match trainer.train(&common::people()) {
        Err(Error::Config(msg)) => assert_eq!(msg, "no optimizer selected"),
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_gibbs_weight_count_mismatch() {
    let mut config = Config::default();
    config.decoder = chaincrf::DecoderKind::Gibbs;
    config.priors = vec![PriorKind::Consistency];
    config.model_weights = vec![1.0, 1.0, 1.0];
    assert!(matches!(config.validate(), Err(Error::Config(_))));

    let model = common::train(Config::default());
    let result = Classifier::new(model, Arc::new(WordFeatureFactory::new()), &config);
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_unrecognized_feature_suffix() {
    use chaincrf::{Clique, FeatureFactory, Padded};

    struct Broken;

    impl FeatureFactory for Broken {
        fn name(&self) -> &str {
            "Broken"
        }

        fn features_for(&self, _: &Padded<'_>, _: usize, _: &Clique) -> Vec<String> {
            vec!["WORD|Cx".to_string()]
        }
    }

    let mut trainer = Trainer::new(Config::default(), &Broken);
    assert!(matches!(
        trainer.train(&common::people()),
        Err(Error::Config(_))
    ));
}
