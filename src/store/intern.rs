use std::collections::HashSet;
use std::sync::Arc;

/// Deduplicates parameter strings so repeated values share one allocation
#[derive(Debug, Default)]
pub struct InternPool {
    strings: HashSet<Arc<str>>,
}

impl InternPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the shared instance equal to `value`, adding it if unseen
    pub fn intern(&mut self, value: &str) -> Arc<str> {
        if let Some(existing) = self.strings.get(value) {
            return Arc::clone(existing);
        }

        let shared: Arc<str> = Arc::from(value);
        self.strings.insert(Arc::clone(&shared));
        shared
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn clear(&mut self) {
        self.strings.clear();
    }
}
