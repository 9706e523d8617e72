use fnv::FnvHashMap;
use std::hash::Hash;
use std::time::Duration;

/// Ordered duration samples, one sequence per registered key.
pub struct Series<T> {
    data: FnvHashMap<T, Vec<Duration>>,
}

impl<T> Default for Series<T>
where
    T: Hash + Eq,
{
    fn default() -> Self {
        Series::new()
    }
}

impl<T> Series<T>
where
    T: Hash + Eq,
{
    /// Create a blank `Series` object
    pub fn new() -> Series<T> {
        Series {
            data: FnvHashMap::default(),
        }
    }

    /// Register interest in the key with an empty sequence
    pub fn init(&mut self, key: T) {
        self.data.insert(key, Vec::new());
    }

    /// Append a sample to the sequence for the given key.
    /// If the key hasn't been registered, this is ignored and the `Series` object will not be updated.
    pub fn push(&mut self, key: &T, d: Duration) {
        if let Some(v) = self.data.get_mut(key) {
            v.push(d);
        }
    }

    /// Samples recorded for the key, in arrival order. Unregistered keys have no samples.
    pub fn get(&self, key: &T) -> &[Duration] {
        self.data.get(key).map(Vec::as_slice).unwrap_or(&[])
    }
}
