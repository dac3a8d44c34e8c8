//! Symmetric "did these two bodies collide" flags keyed by body index

/// Strict lower-triangular bit table. Pair `(i, j)` with `i > j` lives at
/// `i * (i - 1) / 2 + j`, so growing the table keeps existing entries.
#[derive(Debug, Clone, Default)]
pub struct CollisionMatrix {
    flags: Vec<bool>,
    len: usize,
}

impl CollisionMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(i: usize, j: usize) -> Option<usize> {
        let (hi, lo) = if i > j { (i, j) } else { (j, i) };
        (hi != lo).then(|| hi * (hi - 1) / 2 + lo)
    }

    /// Resizes for `len` objects. New pairs start cleared.
    pub fn resize(&mut self, len: usize) {
        self.len = len;
        self.flags.resize(len * len.saturating_sub(1) / 2, false);
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, i: usize, j: usize) -> bool {
        Self::slot(i, j)
            .and_then(|slot| self.flags.get(slot).copied())
            .unwrap_or(false)
    }

    /// Self-pairs and out-of-range pairs are ignored
    pub fn set(&mut self, i: usize, j: usize, value: bool) {
        if let Some(flag) = Self::slot(i, j).and_then(|slot| self.flags.get_mut(slot)) {
            *flag = value;
        }
    }

    pub fn reset(&mut self) {
        self.flags.iter_mut().for_each(|f| *f = false);
    }

    /// Drops object `removed` and shifts every higher index down by one
    pub fn remove_index(&mut self, removed: usize) {
        if removed >= self.len {
            return;
        }
        let mut next = Self::new();
        next.resize(self.len - 1);
        for i in 0..self.len {
            for j in 0..i {
                if i == removed || j == removed || !self.get(i, j) {
                    continue;
                }
                let shift = |k: usize| if k > removed { k - 1 } else { k };
                next.set(shift(i), shift(j), true);
            }
        }
        *self = next;
    }
}
