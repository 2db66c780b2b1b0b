//! Interval set abstract domain over 32-bit signed integers.

use std::fmt;

use thiserror::Error;

/// Number of values in the 32-bit domain.
const DOMAIN_SIZE: i64 = 1 << 32;

/// Errors from [`ValueSet`] operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSetError {
    #[error("invalid interval [{lo}, {hi}]: end is smaller than start")]
    InvalidInterval { lo: i32, hi: i32 },
    #[error("division by zero")]
    DivisionByZero,
}

/// Closed interval `[start, end]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Interval {
    pub start: i32,
    pub end: i32,
}

impl Interval {
    const FULL: Self = Self {
        start: i32::MIN,
        end: i32::MAX,
    };

    /// Number of values in the interval.
    #[must_use]
    pub const fn len(self) -> u64 {
        (self.end as i64 - self.start as i64 + 1).unsigned_abs()
    }

    #[must_use]
    pub const fn contains(self, value: i32) -> bool {
        self.start <= value && value <= self.end
    }
}

/// A set of `i32` values stored as sorted, disjoint, non-adjacent intervals.
///
/// Arithmetic wraps around like 32-bit registers do, so translating an
/// interval may split it in two at the domain boundary.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ValueSet {
    intervals: Vec<Interval>,
}

impl ValueSet {
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            intervals: Vec::new(),
        }
    }

    #[must_use]
    pub fn of(value: i32) -> Self {
        Self {
            intervals: vec![Interval {
                start: value,
                end: value,
            }],
        }
    }

    /// Set of all values in `[lo, hi]`.
    ///
    /// # Errors
    ///
    /// Returns [`ValueSetError::InvalidInterval`] when `hi < lo`.
    pub fn of_interval(lo: i32, hi: i32) -> Result<Self, ValueSetError> {
        if hi < lo {
            return Err(ValueSetError::InvalidInterval { lo, hi });
        }
        Ok(Self {
            intervals: vec![Interval { start: lo, end: hi }],
        })
    }

    /// The full domain.
    #[must_use]
    pub fn all() -> Self {
        Self {
            intervals: vec![Interval::FULL],
        }
    }

    /// Exact cardinality; `2^32` for the full domain.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.intervals.iter().map(|i| i.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    #[must_use]
    pub fn is_all(&self) -> bool {
        self.intervals.as_slice() == [Interval::FULL]
    }

    /// The `index`-th smallest value.
    #[must_use]
    pub fn get(&self, mut index: u64) -> Option<i32> {
        for interval in &self.intervals {
            let len = interval.len();
            if index < len {
                let offset = i64::try_from(index).ok()?;
                return i32::try_from(i64::from(interval.start) + offset).ok();
            }
            index -= len;
        }
        None
    }

    #[must_use]
    pub fn min(&self) -> Option<i32> {
        self.intervals.first().map(|i| i.start)
    }

    #[must_use]
    pub fn max(&self) -> Option<i32> {
        self.intervals.last().map(|i| i.end)
    }

    #[must_use]
    pub fn contains(&self, value: i32) -> bool {
        let pos = self.intervals.partition_point(|i| i.end < value);
        self.intervals.get(pos).is_some_and(|i| i.contains(value))
    }

    #[must_use]
    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    /// All values in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        self.intervals.iter().flat_map(|i| i.start..=i.end)
    }

    /// Replace the contents with a single value.
    pub fn set_value(&mut self, value: i32) -> &mut Self {
        self.intervals.clear();
        self.intervals.push(Interval {
            start: value,
            end: value,
        });
        self
    }

    /// Replace the contents with `[lo, hi]`.
    ///
    /// # Errors
    ///
    /// Returns [`ValueSetError::InvalidInterval`] when `hi < lo`. The set is
    /// left unchanged in that case.
    pub fn set_interval(&mut self, lo: i32, hi: i32) -> Result<&mut Self, ValueSetError> {
        if hi < lo {
            return Err(ValueSetError::InvalidInterval { lo, hi });
        }
        self.intervals.clear();
        self.intervals.push(Interval { start: lo, end: hi });
        Ok(self)
    }

    /// Add every value of `other` to this set.
    pub fn union(&mut self, other: &Self) -> &mut Self {
        if other.intervals.is_empty() {
            return self;
        }
        let mut merged = Vec::with_capacity(self.intervals.len() + other.intervals.len());
        let (mut a, mut b) = (self.intervals.iter().peekable(), other.intervals.iter().peekable());
        loop {
            let next = match (a.peek(), b.peek()) {
                (Some(x), Some(y)) if x.start <= y.start => a.next(),
                (Some(_), Some(_)) | (None, Some(_)) => b.next(),
                (Some(_), None) => a.next(),
                (None, None) => break,
            };
            if let Some(interval) = next {
                merged.push(*interval);
            }
        }
        self.intervals = coalesce(merged);
        self
    }

    pub fn scalar_add(&mut self, s: i32) -> &mut Self {
        self.map_endpoints(|x| x + i64::from(s))
    }

    pub fn scalar_sub(&mut self, s: i32) -> &mut Self {
        self.map_endpoints(|x| x - i64::from(s))
    }

    pub fn scalar_mul(&mut self, s: i32) -> &mut Self {
        self.map_endpoints(|x| x * i64::from(s))
    }

    /// Divide every endpoint by `s`, rounding toward negative infinity.
    ///
    /// # Errors
    ///
    /// Returns [`ValueSetError::DivisionByZero`] when `s` is zero.
    pub fn scalar_div(&mut self, s: i32) -> Result<&mut Self, ValueSetError> {
        if s == 0 {
            return Err(ValueSetError::DivisionByZero);
        }
        Ok(self.map_endpoints(|x| floor_div(x, i64::from(s))))
    }

    /// Apply a monotonic function to each interval's endpoints, then wrap
    /// the results back into the 32-bit domain.
    fn map_endpoints(&mut self, f: impl Fn(i64) -> i64) -> &mut Self {
        let mut mapped = Vec::with_capacity(self.intervals.len() + 1);
        for interval in &self.intervals {
            let a = f(i64::from(interval.start));
            let b = f(i64::from(interval.end));
            let (lo, hi) = (a.min(b), a.max(b));

            if hi - lo + 1 >= DOMAIN_SIZE {
                mapped = vec![Interval::FULL];
                break;
            }

            let start = wrap(lo);
            let end = i64::from(start) + (hi - lo);
            if end <= i64::from(i32::MAX) {
                mapped.push(Interval {
                    start,
                    end: wrap(end),
                });
            } else {
                mapped.push(Interval {
                    start,
                    end: i32::MAX,
                });
                mapped.push(Interval {
                    start: i32::MIN,
                    end: wrap(end),
                });
            }
        }
        mapped.sort_unstable_by_key(|i| i.start);
        self.intervals = coalesce(mapped);
        self
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn wrap(value: i64) -> i32 {
    value as i32
}

const fn floor_div(a: i64, b: i64) -> i64 {
    let q = a / b;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        q - 1
    } else {
        q
    }
}

/// Merge overlapping or adjacent intervals of a list sorted by start.
fn coalesce(sorted: Vec<Interval>) -> Vec<Interval> {
    let mut out: Vec<Interval> = Vec::with_capacity(sorted.len());
    for interval in sorted {
        if let Some(last) = out.last_mut()
            && i64::from(interval.start) <= i64::from(last.end) + 1
        {
            last.end = last.end.max(interval.end);
        } else {
            out.push(interval);
        }
    }
    out
}

impl fmt::Display for ValueSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, interval) in self.intervals.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            if interval.start == interval.end {
                write!(f, "{}", interval.start)?;
            } else {
                write!(f, "{}..={}", interval.start, interval.end)?;
            }
        }
        f.write_str("}")
    }
}

impl fmt::Debug for ValueSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValueSet{self}")
    }
}

impl FromIterator<i32> for ValueSet {
    fn from_iter<T: IntoIterator<Item = i32>>(iter: T) -> Self {
        let mut set = Self::empty();
        for value in iter {
            set.union(&Self::of(value));
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        assert_eq!(ValueSet::empty().size(), 0);
        assert_eq!(ValueSet::of(5).size(), 1);
        assert_eq!(ValueSet::of_interval(-2, 2).unwrap().size(), 5);
        assert_eq!(ValueSet::all().size(), 1 << 32);
        assert_eq!(
            ValueSet::of_interval(3, 2),
            Err(ValueSetError::InvalidInterval { lo: 3, hi: 2 })
        );
    }

    #[test]
    fn test_union_and_get() {
        let mut vs = ValueSet::of_interval(10, 13).unwrap();
        vs.union(&ValueSet::of_interval(20, 22).unwrap());
        assert_eq!(vs.size(), 7);
        assert_eq!(vs.get(0), Some(10));
        assert_eq!(vs.get(3), Some(13));
        assert_eq!(vs.get(4), Some(20));
        assert_eq!(vs.get(6), Some(22));
        assert_eq!(vs.get(7), None);
    }

    #[test]
    fn test_union_coalesces_adjacent() {
        let mut vs = ValueSet::of_interval(1, 2).unwrap();
        vs.union(&ValueSet::of_interval(5, 6).unwrap())
            .union(&ValueSet::of_interval(3, 4).unwrap());
        assert_eq!(vs.intervals(), &[Interval { start: 1, end: 6 }]);

        let mut vs = ValueSet::of(111);
        vs.union(&ValueSet::of(222));
        assert_eq!(vs.intervals().len(), 2);
        assert_eq!(vs.get(0), Some(111));
        assert_eq!(vs.get(1), Some(222));
    }

    #[test]
    fn test_min_max_contains() {
        let vs: ValueSet = [7, -3, 8, 100].into_iter().collect();
        assert_eq!(vs.min(), Some(-3));
        assert_eq!(vs.max(), Some(100));
        assert!(vs.contains(7));
        assert!(vs.contains(8));
        assert!(!vs.contains(9));
        assert!(!vs.contains(-4));
        assert_eq!(ValueSet::empty().min(), None);
        assert_eq!(ValueSet::empty().max(), None);
    }

    #[test]
    fn test_set_value_and_interval() {
        let mut vs = ValueSet::all();
        vs.set_value(4);
        assert_eq!(vs, ValueSet::of(4));
        vs.set_interval(0, 3).unwrap();
        assert_eq!(vs.size(), 4);
        assert!(vs.set_interval(1, 0).is_err());
    }

    #[test]
    fn test_add_wraps() {
        let mut vs = ValueSet::of(i32::MAX);
        vs.scalar_add(1);
        assert_eq!(vs, ValueSet::of(i32::MIN));

        let mut vs = ValueSet::of_interval(i32::MAX - 1, i32::MAX).unwrap();
        vs.scalar_add(2);
        assert_eq!(vs, ValueSet::of_interval(i32::MIN, i32::MIN + 1).unwrap());

        // Straddles the boundary and splits in two.
        let mut vs = ValueSet::of_interval(i32::MAX - 2, i32::MAX).unwrap();
        vs.scalar_add(1);
        assert_eq!(
            vs.intervals(),
            &[
                Interval {
                    start: i32::MIN,
                    end: i32::MIN,
                },
                Interval {
                    start: i32::MAX - 1,
                    end: i32::MAX,
                },
            ]
        );
        assert_eq!(vs.size(), 3);
    }

    #[test]
    fn test_sub_wraps() {
        let mut vs = ValueSet::of_interval(i32::MIN, i32::MIN + 4).unwrap();
        vs.scalar_sub(1);
        assert_eq!(vs.size(), 5);
        assert!(vs.contains(i32::MAX));
        assert!(vs.contains(i32::MIN + 3));
        assert!(!vs.contains(i32::MIN + 4));
    }

    #[test]
    fn test_add_on_full_domain() {
        let mut vs = ValueSet::all();
        vs.scalar_add(12345);
        assert!(vs.is_all());
        vs.scalar_sub(-7);
        assert_eq!(vs.size(), 1 << 32);
    }

    #[test]
    fn test_mul() {
        let mut vs = ValueSet::of_interval(2, 4).unwrap();
        vs.scalar_mul(-3);
        assert_eq!(vs, ValueSet::of_interval(-12, -6).unwrap());

        let mut vs = ValueSet::of_interval(0, 1 << 20).unwrap();
        vs.scalar_mul(1 << 13);
        assert!(vs.is_all());

        let mut vs = ValueSet::of_interval(-5, 5).unwrap();
        vs.scalar_mul(0);
        assert_eq!(vs, ValueSet::of(0));
    }

    #[test]
    fn test_div_floors() {
        let mut vs = ValueSet::of(-7);
        vs.scalar_div(2).unwrap();
        assert_eq!(vs, ValueSet::of(-4));

        let mut vs = ValueSet::of_interval(-7, 7).unwrap();
        vs.scalar_div(-2).unwrap();
        assert_eq!(vs, ValueSet::of_interval(-4, 3).unwrap());

        let mut vs = ValueSet::of(i32::MIN);
        vs.scalar_div(-1).unwrap();
        assert_eq!(vs, ValueSet::of(i32::MIN));

        assert_eq!(
            ValueSet::of(1).scalar_div(0).map(|vs| vs.clone()),
            Err(ValueSetError::DivisionByZero)
        );
    }

    #[test]
    fn test_display() {
        let mut vs = ValueSet::of_interval(10, 13).unwrap();
        vs.union(&ValueSet::of(20));
        assert_eq!(vs.to_string(), "{10..=13, 20}");
        assert_eq!(ValueSet::empty().to_string(), "{}");
    }
}
