use std::fmt;

/// Joint label assignment over a clique, oldest position first
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelTuple(Vec<usize>);

impl LabelTuple {
    pub fn new(labels: Vec<usize>) -> Self {
        Self(labels)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn labels(&self) -> &[usize] {
        &self.0
    }

    /// Label at the clique's current (most recent) position
    pub fn last(&self) -> Option<usize> {
        self.0.last().copied()
    }

    /// Drop the oldest element, yielding the tuple one order smaller
    pub fn project(&self) -> LabelTuple {
        LabelTuple(self.0[1.min(self.0.len())..].to_vec())
    }

    /// Base-`num_classes` code, oldest label most significant
    pub fn encode(&self, num_classes: usize) -> usize {
        self.0.iter().fold(0, |code, &l| code * num_classes + l)
    }

    pub fn decode(mut code: usize, len: usize, num_classes: usize) -> Self {
        let mut labels = vec![0; len];
        for slot in labels.iter_mut().rev() {
            *slot = code % num_classes;
            code /= num_classes;
        }
        LabelTuple(labels)
    }

    /// Every tuple of length `len`, in increasing code order
    pub fn all(len: usize, num_classes: usize) -> impl Iterator<Item = LabelTuple> {
        let count = num_classes.pow(len as u32);
        (0..count).map(move |code| LabelTuple::decode(code, len, num_classes))
    }
}

impl From<Vec<usize>> for LabelTuple {
    fn from(labels: Vec<usize>) -> Self {
        LabelTuple(labels)
    }
}

impl fmt::Display for LabelTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, l) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", l)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project() {
        let t = LabelTuple::new(vec![0, 2, 1]);
        assert_eq!(t.project(), LabelTuple::new(vec![2, 1]));
        assert_eq!(t.project().project(), LabelTuple::new(vec![1]));
    }

    #[test]
    fn test_encode_decode() {
        let t = LabelTuple::new(vec![1, 0, 2]);
        let code = t.encode(3);
        assert_eq!(code, 9 + 2);
        assert_eq!(LabelTuple::decode(code, 3, 3), t);
    }

    #[test]
    fn test_all() {
        let all: Vec<_> = LabelTuple::all(2, 2).collect();
        assert_eq!(all.len(), 4);
        assert_eq!(all[1], LabelTuple::new(vec![0, 1]));
        assert_eq!(all[2], LabelTuple::new(vec![1, 0]));
    }
}
