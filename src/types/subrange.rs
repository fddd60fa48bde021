use std::fmt;

/// Inclusive index range stored as a lower bound and a size. A size of `-1`
/// stands for "any size" and makes comparisons ignore the bounds.
#[derive(Debug, Clone, Copy)]
pub struct Subrange {
    pub lower: i64,
    pub size: i64,
}

impl Subrange {
    pub const UNBOUNDED: Subrange = Subrange {
        lower: 0,
        size: -1,
    };

    pub fn new(lower: i64, size: i64) -> Self {
        Self { lower, size }
    }

    /// Range `lower..=upper`; `None` when `upper < lower`.
    pub fn between(lower: i64, upper: i64) -> Option<Self> {
        if upper < lower {
            return None;
        }
        Some(Self {
            lower,
            size: upper - lower + 1,
        })
    }

    pub fn is_unbounded(&self) -> bool {
        self.size < 0
    }

    /// Whether a value with these bounds can be stored where `target` is
    /// expected. Open targets take any bounds; open sources fit nothing fixed.
    pub fn fits(&self, target: &Subrange) -> bool {
        target.is_unbounded() || (!self.is_unbounded() && self == target)
    }

    pub fn upper(&self) -> i64 {
        self.lower + self.size - 1
    }

    pub fn len(&self) -> usize {
        usize::try_from(self.size).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, index: i64) -> bool {
        self.is_unbounded() || (index >= self.lower && index <= self.upper())
    }
}

impl PartialEq for Subrange {
    fn eq(&self, other: &Self) -> bool {
        if self.is_unbounded() || other.is_unbounded() {
            return true;
        }
        self.lower == other.lower && self.size == other.size
    }
}

impl fmt::Display for Subrange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unbounded() {
            Ok(())
        } else {
            write!(f, "{}..{}", self.lower, self.upper())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_equals_everything() {
        let any = Subrange::new(0, -1);
        for (lower, size) in [(0, 0), (2, 3), (-7, 100), (5, -1)] {
            let other = Subrange::new(lower, size);
            assert_eq!(any, other);
            assert_eq!(other, any);
        }
    }

    #[test]
    fn bounded_ranges_compare_bounds() {
        assert_eq!(Subrange::new(2, 3), Subrange::new(2, 3));
        assert_ne!(Subrange::new(2, 3), Subrange::new(2, 4));
        assert_ne!(Subrange::new(1, 3), Subrange::new(2, 3));
    }

    #[test]
    fn between_checks_order() {
        let range = Subrange::between(1, 10).unwrap();
        assert_eq!(range.size, 10);
        assert_eq!(range.upper(), 10);
        assert!(range.contains(10));
        assert!(!range.contains(11));
        assert!(Subrange::between(3, 2).is_none());
    }
}
