use crate::error::{Error, Result};
use crate::token::Padded;

/// A clique of consecutive label positions ending at the current token.
///
/// A clique of order `k` spans `k + 1` positions: the current one and the
/// `k` before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Clique {
    order: usize,
}

impl Clique {
    pub fn new(order: usize) -> Self {
        Self { order }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Suffix every feature string of this clique must carry
    pub fn suffix(&self) -> String {
        order_suffix(self.order)
    }

    /// Attach this clique's suffix to a feature name
    pub fn tag(&self, name: &str) -> String {
        let mut s = String::with_capacity(name.len() + 8);
        s.push_str(name);
        s.push_str(&self.suffix());
        s
    }
}

/// `|C`, `|CpC`, `|Cp2C`, ...
pub fn order_suffix(order: usize) -> String {
    match order {
        0 => "|C".to_string(),
        1 => "|CpC".to_string(),
        k => format!("|Cp{}C", k),
    }
}

/// Clique order encoded in a feature string's suffix.
///
/// Fails for a missing or malformed suffix and for orders that do not fit
/// in `window`.
pub fn order_of(feature: &str, window: usize) -> Result<usize> {
    let unrecognised = || Error::config(format!("unrecognized feature order suffix: {}", feature));
    let (_, suffix) = feature.rsplit_once('|').ok_or_else(unrecognised)?;
    let order = match suffix {
        "C" => 0,
        "CpC" => 1,
        s => s
            .strip_prefix("Cp")
            .and_then(|s| s.strip_suffix('C'))
            .and_then(|k| k.parse::<usize>().ok())
            .filter(|&k| k >= 2)
            .ok_or_else(unrecognised)?,
    };
    if order >= window {
        return Err(Error::config(format!(
            "feature {} has order {} but window size is {}",
            feature, order, window
        )));
    }
    Ok(order)
}

/// Source of per-position feature strings.
///
/// The engine asks for the cliques of each order and then for the features
/// each clique fires at a position. Every returned string must end with the
/// clique's [`suffix`](Clique::suffix).
pub trait FeatureFactory: Send + Sync {
    /// Identity recorded in saved models
    fn name(&self) -> &str;

    /// Cliques whose leftmost position is `order` back and rightmost `offset` ahead
    fn cliques_at(&self, order: usize, offset: usize) -> Vec<Clique> {
        if offset == 0 {
            vec![Clique::new(order)]
        } else {
            Vec::new()
        }
    }

    fn features_for(&self, context: &Padded<'_>, position: usize, clique: &Clique) -> Vec<String>;
}

/// Word identity, shape and label-sequence features
#[derive(Debug, Clone, Default)]
pub struct WordFeatureFactory {
    /// Also fire previous/next word features
    pub use_neighbors: bool,
}

impl WordFeatureFactory {
    pub fn new() -> Self {
        Self {
            use_neighbors: true,
        }
    }
}

/// Collapse a word to its character classes: `John` -> `Xx`, `1984` -> `d`
pub fn word_shape(word: &str) -> String {
    let mut shape = String::new();
    for c in word.chars() {
        let class = if c.is_uppercase() {
            'X'
        } else if c.is_lowercase() {
            'x'
        } else if c.is_numeric() {
            'd'
        } else {
            c
        };
        if !shape.ends_with(class) {
            shape.push(class);
        }
    }
    shape
}

impl FeatureFactory for WordFeatureFactory {
    fn name(&self) -> &str {
        "WordFeatureFactory"
    }

    fn features_for(&self, context: &Padded<'_>, position: usize, clique: &Clique) -> Vec<String> {
        let word = &context.at(position, 0).word;
        match clique.order() {
            0 => {
                let mut features = vec![
                    clique.tag(&format!("WORD-{}", word)),
                    clique.tag(&format!("SHAPE-{}", word_shape(word))),
                ];
                if word.chars().next().map_or(false, char::is_uppercase) {
                    features.push(clique.tag("isCapitalized"));
                }
                if self.use_neighbors {
                    features.push(clique.tag(&format!("PWORD-{}", context.at(position, -1).word)));
                    features.push(clique.tag(&format!("NWORD-{}", context.at(position, 1).word)));
                }
                features
            }
            1 => vec![
                clique.tag("PSEQ"),
                clique.tag(&format!("PSEQW-{}", word)),
            ],
            _ => vec![clique.tag("PSEQ")],
        }
    }
}
