//! Begin/end bookkeeping for overlapping pairs across two steps

/// Remembers which pairs touched this step and last step.
///
/// Both generations are kept as sorted vectors of canonical `(low, high)`
/// pairs, so the begin/end diff is a single merge walk.
#[derive(Debug, Clone)]
pub struct OverlapKeeper<K> {
    current: Vec<(K, K)>,
    previous: Vec<(K, K)>,
}

impl<K> Default for OverlapKeeper<K> {
    fn default() -> Self {
        Self {
            current: Vec::new(),
            previous: Vec::new(),
        }
    }
}

impl<K: Ord + Copy> OverlapKeeper<K> {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(a: K, b: K) -> (K, K) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    /// Records an overlap for the current step. Duplicates are ignored.
    pub fn set(&mut self, a: K, b: K) {
        let key = Self::key(a, b);
        if let Err(index) = self.current.binary_search(&key) {
            self.current.insert(index, key);
        }
    }

    /// Starts a new step: the current generation becomes the previous one
    pub fn tick(&mut self) {
        std::mem::swap(&mut self.current, &mut self.previous);
        self.current.clear();
    }

    pub fn is_overlapping(&self, a: K, b: K) -> bool {
        self.current.binary_search(&Self::key(a, b)).is_ok()
    }

    pub fn was_overlapping(&self, a: K, b: K) -> bool {
        self.previous.binary_search(&Self::key(a, b)).is_ok()
    }

    /// Pairs that started touching this step and pairs that stopped
    pub fn diff(&self, additions: &mut Vec<(K, K)>, removals: &mut Vec<(K, K)>) {
        let (mut i, mut j) = (0, 0);
        while i < self.current.len() && j < self.previous.len() {
            let (cur, prev) = (self.current[i], self.previous[j]);
            match cur.cmp(&prev) {
                std::cmp::Ordering::Less => {
                    additions.push(cur);
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    removals.push(prev);
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    i += 1;
                    j += 1;
                }
            }
        }
        additions.extend_from_slice(&self.current[i..]);
        removals.extend_from_slice(&self.previous[j..]);
    }

    /// Drops every pair mentioning `key` from both generations
    pub fn remove_key(&mut self, key: K) {
        self.current.retain(|&(a, b)| a != key && b != key);
        self.previous.retain(|&(a, b)| a != key && b != key);
    }

    pub fn current(&self) -> &[(K, K)] {
        &self.current
    }
}
