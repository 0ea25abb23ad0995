use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

/// A bidirectional mapping between values and dense ids.
///
/// Ids are handed out in insertion order starting at zero.
#[derive(Debug, Clone)]
pub struct Index<T> {
    /// Map from value to ID
    to_id: HashMap<T, usize>,
    /// Map from ID to value
    items: Vec<T>,
}

impl<T: Hash + Eq + Clone> Index<T> {
    /// Create a new empty index
    pub fn new() -> Self {
        Self {
            to_id: HashMap::new(),
            items: Vec::new(),
        }
    }

    /// Get the number of entries in the index
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the index contains no entries
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get or create an ID for a value
    pub fn get_or_insert(&mut self, value: T) -> usize {
        if let Some(&id) = self.to_id.get(&value) {
            id
        } else {
            let id = self.items.len();
            self.to_id.insert(value.clone(), id);
            self.items.push(value);
            id
        }
    }

    /// Look up the ID of a value
    pub fn id_of<Q>(&self, value: &Q) -> Option<usize>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.to_id.get(value).copied()
    }

    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.to_id.contains_key(value)
    }

    /// Value stored under an ID
    pub fn get(&self, id: usize) -> Option<&T> {
        self.items.get(id)
    }

    /// Iterate over all values in ID order
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

impl<T: Hash + Eq + Clone> Default for Index<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Hash + Eq + Clone> FromIterator<T> for Index<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut index = Index::new();
        for value in iter {
            index.get_or_insert(value);
        }
        index
    }
}

impl<T: PartialEq> PartialEq for Index<T> {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}
