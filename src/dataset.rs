/// A single decision point.
///
/// `features[k]` holds the ids of the features of clique order `k` active at
/// this position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Datum {
    pub features: Vec<Vec<usize>>,
    /// Gold class id, background when unknown
    pub label: usize,
}

impl Datum {
    pub fn new(window: usize) -> Self {
        Self {
            features: vec![Vec::new(); window],
            label: 0,
        }
    }
}

/// A document converted to feature ids
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Instance {
    pub data: Vec<Datum>,
}

impl Instance {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            data: Vec::with_capacity(cap),
        }
    }

    pub fn push(&mut self, datum: Datum) {
        self.data.push(datum);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn labels(&self) -> Vec<usize> {
        self.data.iter().map(|d| d.label).collect()
    }

    /// Gold labels of the `len` positions ending at `position`, oldest first.
    ///
    /// Positions before the start read as the background class (id 0).
    pub fn label_window(&self, position: usize, len: usize) -> Vec<usize> {
        label_window(&self.labels(), position, len)
    }
}

/// Labels of the `len` positions ending at `position`, background-padded
pub fn label_window(labels: &[usize], position: usize, len: usize) -> Vec<usize> {
    (0..len)
        .map(|i| {
            let back = len - 1 - i;
            if back > position {
                0
            } else {
                labels[position - back]
            }
        })
        .collect()
}
