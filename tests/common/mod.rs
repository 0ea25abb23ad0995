#![allow(dead_code)]

use chaincrf::{Config, Document, ModelState, Token, Trainer, WordFeatureFactory};

/// Small corpus where every capitalized word is a PERSON
pub fn people() -> Vec<Document> {
    let raw: &[&[(&str, &str)]] = &[
        &[("the", "O"), ("dog", "O"), ("saw", "O"), ("Alice", "PERSON")],
        &[("yesterday", "O"), ("Bob", "PERSON"), ("ran", "O"), ("home", "O")],
        &[("we", "O"), ("met", "O"), ("Carol", "PERSON"), ("today", "O")],
        &[("then", "O"), ("Dave", "PERSON"), ("likes", "O"), ("tea", "O")],
        &[("a", "O"), ("cat", "O"), ("sat", "O")],
        &[("the", "O"), ("Eve", "PERSON"), ("ran", "O")],
        &[("the", "O"), ("man", "O"), ("ran", "O")],
    ];
    raw.iter()
        .map(|doc| doc.iter().map(|&(w, l)| Token::with_gold(w, l)).collect())
        .collect()
}

pub fn words(words: &[&str]) -> Document {
    words.iter().map(|&w| Token::new(w)).collect()
}

pub fn train(config: Config) -> ModelState {
    let factory = WordFeatureFactory::new();
    let mut trainer = Trainer::new(config, &factory);
    trainer.train(&people()).unwrap()
}
