use crate::util;
use fnv::FnvHashMap;
use hdrhistogram::Histogram;
use std::hash::Hash;
use std::time::Duration;

const SIGNIFICANT_FIGURES: u8 = 3;

/// Microsecond-resolution latency histograms, one per registered key.
pub struct Histograms<T> {
    data: FnvHashMap<T, Histogram<u64>>,
}

impl<T> Default for Histograms<T>
where
    T: Hash + Eq,
{
    fn default() -> Self {
        Histograms::new()
    }
}

impl<T> Histograms<T>
where
    T: Hash + Eq,
{
    pub fn new() -> Histograms<T> {
        Histograms {
            data: FnvHashMap::default(),
        }
    }

    pub fn init(&mut self, key: T) {
        // auto-resizing with 3 significant figures is always a valid configuration
        if let Ok(h) = Histogram::new(SIGNIFICANT_FIGURES) {
            self.data.insert(key, h);
        }
    }

    pub fn record(&mut self, key: &T, d: Duration) {
        if let Some(h) = self.data.get_mut(key) {
            h.saturating_record(util::dur_to_u64(d));
        }
    }

    pub fn get(&self, key: &T) -> Option<&Histogram<u64>> {
        self.data.get(key)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn records_in_microseconds() {
        let mut histograms = Histograms::new();
        histograms.init("ttfb");
        histograms.record(&"ttfb", Duration::from_millis(1));
        histograms.record(&"ttfb", Duration::from_millis(2));
        let h = histograms.get(&"ttfb").map(|h| (h.len(), h.max()));
        assert_eq!(h, Some((2, 2000)));
        assert!(histograms.get(&"dns").is_none());
    }
}
