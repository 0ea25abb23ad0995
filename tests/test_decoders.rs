mod common;

use chaincrf::decode::{BeamDecoder, Decoder, ExactDecoder, SequenceListener, SequenceModel};
use chaincrf::{Annealing, CliqueTree, Config, DecoderKind, PriorKind, WordFeatureFactory};
use ndarray::{array, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_tree(rng: &mut StdRng, window: usize, num_classes: usize, len: usize) -> CliqueTree {
    let tuples = num_classes.pow(window as u32);
    let phi = Array2::from_shape_fn((len, tuples), |_| rng.gen_range(-2.0..2.0));
    CliqueTree::from_potentials(window, num_classes, phi)
}

#[test]
fn test_exact_never_loses_to_beam() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..20 {
        let window = rng.gen_range(1..=3);
        let num_classes = rng.gen_range(2..=4);
        let len = rng.gen_range(1..=8);
        let tree = random_tree(&mut rng, window, num_classes, len);
        let exact = ExactDecoder.decode(&tree);
        let best = tree.score(&exact);
        for width in 1..=6 {
            let beam = BeamDecoder::new(width).decode(&tree);
            assert_eq!(beam.len(), len);
            assert!(best >= tree.score(&beam) - 1e-9);
        }
    }
}

#[test]
fn test_wide_beam_is_exact() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..20 {
        let num_classes = rng.gen_range(2..=5);
        let tree = random_tree(&mut rng, 2, num_classes, 6);
        let exact = ExactDecoder.decode(&tree);
        let beam = BeamDecoder::new(num_classes).decode(&tree);
        assert!((tree.score(&exact) - tree.score(&beam)).abs() < 1e-9);
    }
}

#[test]
fn test_marginals_normalised() {
    let mut rng = StdRng::seed_from_u64(3);
    for window in 1..=3 {
        let tree = random_tree(&mut rng, window, 3, 7);
        for pos in 0..tree.length() {
            let total: f64 = (0..3).map(|l| tree.marginal(pos, l)).sum();
            assert!((total - 1.0).abs() < 1e-9);
            if pos > 0 {
                for a in 0..3 {
                    let joint: f64 = (0..3).map(|b| tree.pairwise_marginal(pos, a, b)).sum();
                    assert!((joint - tree.marginal(pos - 1, a)).abs() < 1e-9);
                }
            }
        }
    }
}

#[test]
fn test_calibrated_tree_from_model() {
    let model = common::train(Config::default());
    let factory = WordFeatureFactory::new();
    let tree = model
        .calibrate(&common::words(&["the", "John", "ran"]), &factory)
        .unwrap();
    assert_eq!(tree.length(), 3);
    assert_eq!(tree.window(), 2);
    assert_eq!(tree.num_classes(), 2);
    assert_eq!(tree.background_index(), 0);
    assert!(tree.log_z().is_finite());

    let labels = ExactDecoder.decode(&tree);
    assert_eq!(labels, vec![0, 1, 0]);
    let p: f64 = (0..3)
        .map(|i| tree.conditional_log_prob(i, labels[i], &labels[..i]))
        .sum();
    assert!((p - tree.log_prob(&labels)).abs() < 1e-9);
}

#[test]
fn test_gibbs_with_consistency_prior_agrees_on_repeated_words() {
    let doc = common::words(&["x", "y", "x"]);
    let mut config = Config {
        decoder: DecoderKind::Gibbs,
        gibbs_samples: 30,
        annealing: Annealing::Linear,
        initial_temperature: 0.05,
        target_temperature: 0.01,
        seed: Some(5),
        ..Config::default()
    };
    let split = || CliqueTree::from_potentials(1, 2, array![[3.0, 0.0], [1.0, 0.0], [0.0, 0.5]]);

    let plain = Decoder::from_config(&config).unwrap();
    assert_eq!(plain.decode(&mut split(), &doc).unwrap(), vec![0, 0, 1]);

    config.priors = vec![PriorKind::Consistency];
    config.consistency_penalty = 1.0;
    config.model_weights = vec![1.0, 2.0];
    let consistent = Decoder::from_config(&config).unwrap();
    let mut tree = split();
    let labels = consistent.decode(&mut tree, &doc).unwrap();
    assert_eq!(labels, vec![0, 0, 0]);
    assert!((tree.current_score() - tree.score(&labels)).abs() < 1e-9);
}
