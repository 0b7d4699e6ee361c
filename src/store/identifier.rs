use std::collections::HashMap;
use std::hash::Hash;

/// A set with stable, dense ids: values are numbered in insertion order
/// starting at 0 and ids are never reused or reordered.
#[derive(Debug, Clone)]
pub struct IdentifierCache<T> {
    values: Vec<T>,
    ids: HashMap<T, usize>,
}

impl<T> Default for IdentifierCache<T> {
    fn default() -> Self {
        Self {
            values: Vec::new(),
            ids: HashMap::new(),
        }
    }
}

impl<T: Eq + Hash + Clone> IdentifierCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of `value`, appending it when not present yet
    pub fn put(&mut self, value: T) -> usize {
        if let Some(&id) = self.ids.get(&value) {
            return id;
        }

        let id = self.values.len();
        self.values.push(value.clone());
        self.ids.insert(value, id);
        id
    }

    pub fn get(&self, id: usize) -> Option<&T> {
        self.values.get(id)
    }

    pub fn id_of(&self, value: &T) -> Option<usize> {
        self.ids.get(value).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.values
    }
}
