/// One token of an input sequence
///
/// `gold` carries the reference label during training; `answer` receives the
/// label assigned by the classifier.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Token {
    pub word: String,
    pub gold: Option<String>,
    pub answer: Option<String>,
}

impl Token {
    pub fn new<T: Into<String>>(word: T) -> Self {
        Self {
            word: word.into(),
            gold: None,
            answer: None,
        }
    }

    pub fn with_gold<T: Into<String>, L: Into<String>>(word: T, gold: L) -> Self {
        Self {
            word: word.into(),
            gold: Some(gold.into()),
            answer: None,
        }
    }
}

impl From<&str> for Token {
    fn from(word: &str) -> Self {
        Token::new(word)
    }
}

impl<T: Into<String>, L: Into<String>> From<(T, L)> for Token {
    fn from((word, gold): (T, L)) -> Self {
        Token::with_gold(word, gold)
    }
}

/// An ordered token sequence
pub type Document = Vec<Token>;

/// A document seen through fixed background padding on both sides.
///
/// Any offset outside the sequence yields the padding token, whose word and
/// gold label are the background symbol.
#[derive(Debug, Clone)]
pub struct Padded<'a> {
    tokens: &'a [Token],
    pad: Token,
}

impl<'a> Padded<'a> {
    pub fn new(tokens: &'a [Token], background: &str) -> Self {
        Self {
            tokens,
            pad: Token::with_gold(background, background),
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Token at a signed offset, padding outside `0..len`
    pub fn get(&self, index: isize) -> &Token {
        if index < 0 {
            return &self.pad;
        }
        self.tokens.get(index as usize).unwrap_or(&self.pad)
    }

    /// Token at `position + offset`
    pub fn at(&self, position: usize, offset: isize) -> &Token {
        self.get(position as isize + offset)
    }
}

/// Reverse a document in place when right-to-left processing is enabled
pub(crate) fn orient(doc: &mut [Token], reverse: bool) {
    if reverse {
        doc.reverse();
    }
}
