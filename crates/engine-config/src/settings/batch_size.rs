/// Picks a batch size from the dataset size unless one was given.
///
/// Larger datasets get smaller batches so a single failing call costs less.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSizePolicy {
    explicit: Option<usize>,
}

const SMALL_DATASET: usize = 50_000;
const MEDIUM_DATASET: usize = 250_000;

pub const SMALL_BATCH: usize = 10_000;
pub const MEDIUM_BATCH: usize = 5_000;
pub const LARGE_BATCH: usize = 2_000;

impl BatchSizePolicy {
    pub fn new(explicit: Option<usize>) -> Self {
        Self { explicit }
    }

    pub fn resolve(&self, total_rows: usize) -> usize {
        if let Some(size) = self.explicit {
            return size;
        }
        match total_rows {
            n if n <= SMALL_DATASET => SMALL_BATCH,
            n if n <= MEDIUM_DATASET => MEDIUM_BATCH,
            _ => LARGE_BATCH,
        }
    }

    pub fn is_explicit(&self) -> bool {
        self.explicit.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_tiers() {
        let policy = BatchSizePolicy::new(None);
        assert_eq!(policy.resolve(10), 10_000);
        assert_eq!(policy.resolve(50_000), 10_000);
        assert_eq!(policy.resolve(50_001), 5_000);
        assert_eq!(policy.resolve(1_000_000), 2_000);
        assert_eq!(BatchSizePolicy::new(Some(7)).resolve(1_000_000), 7);
    }
}
