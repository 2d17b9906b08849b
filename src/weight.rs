//! Numeric weight domains
//!
//! Every structure is built and queried in exactly one domain: fixed-width
//! integer (`u32`) or floating point (`f64`). The algorithms are generic over
//! [`Weight`] so both domains share one code path without ever mixing.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Numeric domain tag stored in every structure header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NumericDomain {
    Integer,
    Real,
}

impl NumericDomain {
    pub fn tag(self) -> u8 {
        match self {
            NumericDomain::Integer => 1,
            NumericDomain::Real => 2,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(NumericDomain::Integer),
            2 => Some(NumericDomain::Real),
            _ => None,
        }
    }
}

impl fmt::Display for NumericDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericDomain::Integer => write!(f, "integer"),
            NumericDomain::Real => write!(f, "real"),
        }
    }
}

/// Edge weight / distance value.
///
/// `INFINITY` doubles as the "unreachable" sentinel returned by queries.
/// Addition saturates at `INFINITY`.
///
/// In the integer domain this caps distances: a pair whose true distance is
/// `u32::MAX` (about 4.29e9) or more is reported as unreachable. Use
/// `precision_loss` or the real domain when paths can grow that long;
/// [`Graph::may_overflow`](crate::graph::Graph::may_overflow) tells whether a
/// graph is affected.
pub trait Weight:
    Copy + PartialOrd + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    const ZERO: Self;
    const INFINITY: Self;
    const DOMAIN: NumericDomain;
    /// Encoded width in structure files
    const BYTES: usize;

    fn plus(self, other: Self) -> Self;

    /// Total order used by priority queues (weights are validated finite)
    fn total_cmp(&self, other: &Self) -> Ordering;

    /// Equality used when checking that an edge lies on a shortest path.
    /// Exact for integers, relative tolerance for floats.
    fn tight(a: Self, b: Self) -> bool;

    /// Usable as an edge weight: non-negative, finite, below the sentinel
    fn is_valid_edge_weight(self) -> bool;

    fn parse_text(s: &str) -> Option<Self>;

    /// Apply a precision-loss divisor at load time
    fn scale_down(self, divisor: u32) -> Self;

    fn encode(self, out: &mut Vec<u8>);

    /// Decode from exactly `BYTES` little-endian bytes
    fn decode(bytes: &[u8]) -> Self;

    fn as_f64(self) -> f64;

    #[inline]
    fn is_infinite(self) -> bool {
        self.total_cmp(&Self::INFINITY) == Ordering::Equal
    }

    #[inline]
    fn min_of(a: Self, b: Self) -> Self {
        if b.total_cmp(&a) == Ordering::Less {
            b
        } else {
            a
        }
    }

    #[inline]
    fn max_of(a: Self, b: Self) -> Self {
        if b.total_cmp(&a) == Ordering::Greater {
            b
        } else {
            a
        }
    }
}

impl Weight for u32 {
    const ZERO: Self = 0;
    const INFINITY: Self = u32::MAX;
    const DOMAIN: NumericDomain = NumericDomain::Integer;
    const BYTES: usize = 4;

    #[inline(always)]
    fn plus(self, other: Self) -> Self {
        self.saturating_add(other)
    }

    #[inline(always)]
    fn total_cmp(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }

    #[inline(always)]
    fn tight(a: Self, b: Self) -> bool {
        a == b
    }

    fn is_valid_edge_weight(self) -> bool {
        self != u32::MAX
    }

    fn parse_text(s: &str) -> Option<Self> {
        s.parse().ok()
    }

    fn scale_down(self, divisor: u32) -> Self {
        if divisor <= 1 {
            return self;
        }
        (self as f64 / divisor as f64).round() as u32
    }

    fn encode(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn decode(bytes: &[u8]) -> Self {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&bytes[..4]);
        u32::from_le_bytes(buf)
    }

    fn as_f64(self) -> f64 {
        self as f64
    }
}

/// Relative tolerance for float tightness checks
const REAL_EPSILON: f64 = 1e-9;

impl Weight for f64 {
    const ZERO: Self = 0.0;
    const INFINITY: Self = f64::INFINITY;
    const DOMAIN: NumericDomain = NumericDomain::Real;
    const BYTES: usize = 8;

    #[inline(always)]
    fn plus(self, other: Self) -> Self {
        self + other
    }

    #[inline(always)]
    fn total_cmp(&self, other: &Self) -> Ordering {
        f64::total_cmp(self, other)
    }

    #[inline(always)]
    fn tight(a: Self, b: Self) -> bool {
        if a == b {
            return true;
        }
        if !a.is_finite() || !b.is_finite() {
            return false;
        }
        (a - b).abs() <= REAL_EPSILON * a.abs().max(b.abs()).max(1.0)
    }

    fn is_valid_edge_weight(self) -> bool {
        self.is_finite() && self >= 0.0
    }

    fn parse_text(s: &str) -> Option<Self> {
        s.parse().ok()
    }

    // Precision loss only applies to integer weights.
    fn scale_down(self, _divisor: u32) -> Self {
        self
    }

    fn encode(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn decode(bytes: &[u8]) -> Self {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&bytes[..8]);
        f64::from_le_bytes(buf)
    }

    fn as_f64(self) -> f64 {
        self
    }
}

/// Heap key wrapper giving any [`Weight`] a total order.
///
/// Used as `Reverse((Ordered(dist), node))` in min-heaps.
#[derive(Debug, Clone, Copy)]
pub struct Ordered<W>(pub W);

impl<W: Weight> PartialEq for Ordered<W> {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl<W: Weight> Eq for Ordered<W> {}

impl<W: Weight> PartialOrd for Ordered<W> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<W: Weight> Ord for Ordered<W> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Reverse;
    use std::collections::BinaryHeap;

    #[test]
    fn test_integer_add_saturates() {
        assert_eq!((u32::MAX - 1).plus(5), u32::INFINITY);
        assert!(u32::INFINITY.plus(1).is_infinite());
        assert_eq!(3u32.plus(4), 7);
    }

    #[test]
    fn test_real_tight_tolerance() {
        assert!(f64::tight(0.1 + 0.2, 0.3));
        assert!(!f64::tight(1.0, 1.001));
        assert!(!f64::tight(f64::INFINITY, 1.0));
        assert!(f64::tight(f64::INFINITY, f64::INFINITY));
    }

    #[test]
    fn test_edge_weight_validation() {
        assert!(0u32.is_valid_edge_weight());
        assert!(!u32::MAX.is_valid_edge_weight());
        assert!(2.5f64.is_valid_edge_weight());
        assert!(!(-1.0f64).is_valid_edge_weight());
        assert!(!f64::NAN.is_valid_edge_weight());
        assert!(!f64::INFINITY.is_valid_edge_weight());
    }

    #[test]
    fn test_scale_down_rounds_integers_only() {
        assert_eq!(1049u32.scale_down(100), 10);
        assert_eq!(1050u32.scale_down(100), 11);
        assert_eq!(7u32.scale_down(1), 7);
        assert_eq!(10.5f64.scale_down(100), 10.5);
    }

    #[test]
    fn test_encode_decode_widths() {
        let mut buf = Vec::new();
        12345u32.encode(&mut buf);
        1.25f64.encode(&mut buf);
        assert_eq!(buf.len(), u32::BYTES + f64::BYTES);
        assert_eq!(u32::decode(&buf[..4]), 12345);
        assert_eq!(f64::decode(&buf[4..]), 1.25);
    }

    #[test]
    fn test_ordered_min_heap() {
        let mut heap = BinaryHeap::new();
        for (d, n) in [(3.5f64, 1u32), (0.5, 2), (2.0, 3)] {
            heap.push(Reverse((Ordered(d), n)));
        }
        let Reverse((Ordered(d), n)) = heap.pop().unwrap();
        assert_eq!((d, n), (0.5, 2));
    }

    #[test]
    fn test_domain_tags() {
        for domain in [NumericDomain::Integer, NumericDomain::Real] {
            assert_eq!(NumericDomain::from_tag(domain.tag()), Some(domain));
        }
        assert_eq!(NumericDomain::from_tag(0), None);
        assert_eq!(<u32 as Weight>::DOMAIN, NumericDomain::Integer);
        assert_eq!(<f64 as Weight>::DOMAIN, NumericDomain::Real);
    }
}
