mod common;

use std::fs;

use chaincrf::store::{self, binary, text, Format};
use chaincrf::{Config, Error};

#[test]
fn test_binary_rewrite_is_identical() {
    let model = common::train(Config::default());
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("a.crf");
    let second = dir.path().join("b.crf");

    store::save(&model, &first, Format::Binary).unwrap();
    let loaded = store::load(&first).unwrap();
    store::save(&loaded, &second, Format::Binary).unwrap();
    assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
}

#[test]
fn test_text_rewrite_is_identical() {
    let mut config = Config::default();
    config.window = 3;
    config.observed_only = true;
    let model = common::train(config);

    let rendered = text::to_text(&model);
    let reread = text::from_text(&rendered).unwrap();
    assert_eq!(reread, model);
    assert_eq!(text::to_text(&reread), rendered);
}

#[test]
fn test_formats_hold_the_same_model() {
    let model = common::train(Config::default());
    let from_binary = binary::from_bytes(&binary::to_bytes(&model).unwrap()).unwrap();
    let from_text = text::from_text(&text::to_text(&model)).unwrap();
    assert_eq!(from_binary, from_text);
    assert_eq!(from_binary.hyperparams(), model.hyperparams());
}

#[test]
fn test_corrupt_files() {
    let model = common::train(Config::default());
    let dir = tempfile::tempdir().unwrap();

    let path = dir.path().join("cut.crf");
    let bytes = binary::to_bytes(&model).unwrap();
    fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();
    assert!(matches!(store::load(&path), Err(Error::Format(_))));

    let path = dir.path().join("garbage.crf");
    fs::write(&path, b"not a model at all").unwrap();
    assert!(matches!(store::load(&path), Err(Error::Format(_))));

    let path = dir.path().join("cut.zst");
    store::save(&model, &path, Format::Text).unwrap();
    let compressed = fs::read(&path).unwrap();
    fs::write(&path, &compressed[..compressed.len() / 2]).unwrap();
    assert!(matches!(store::load(&path), Err(Error::Format(_))));

    assert!(matches!(
        store::load(dir.path().join("missing.crf")),
        Err(Error::Io(_))
    ));
}

#[test]
fn test_text_weight_dimension_mismatch() {
    let model = common::train(Config::default());
    let rendered = text::to_text(&model);
    let weights_at = rendered.find("<weights>\n").unwrap() + "<weights>\n".len();
    let (head, tail) = rendered.split_at(weights_at);
    let mut lines: Vec<&str> = tail.lines().collect();
    lines[0] = "1 0.5";
    let broken = format!("{}{}\n", head, lines.join("\n"));
    match text::from_text(&broken) {
        Err(Error::Format(msg)) => assert!(msg.starts_with("line "), "{}", msg),
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_dump_lists_model() {
    let model = common::train(Config::default());
    let mut out = Vec::new();
    model.dump(&mut out).unwrap();
    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("CLASSES = {"));
    assert!(out.contains("PERSON"));
    assert!(out.contains("LABEL_TUPLES[1] = {"));
    assert!(out.contains("isCapitalized|C"));
}
