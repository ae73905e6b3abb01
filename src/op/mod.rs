//! User-supplied operators parameterizing the algebra
//!
//! An operator is a pair of renderings of one function: a host callable
//! used by the CPU kernels, and an accelerator source fragment spliced
//! into generated kernel programs. Operators are immutable and compared
//! by identity; the identity keys the accelerator program cache, so the
//! same operator value reuses the same compiled program for the process
//! lifetime.
//!
//! Binary fragments are written in terms of `a` and `b`, unary and select
//! fragments in terms of `x`:
//!
//! ```
//! use sparr::op::BinaryOp;
//!
//! let plus = BinaryOp::<f32>::new("plus", "a + b", |a, b| a + b);
//! assert_eq!(plus.apply(2.0, 3.0), 5.0);
//! ```

use std::fmt;
use std::ops::{Add, BitAnd, BitOr, BitXor, Div, Mul, Neg, Sub};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::dtype::Element;

/// Stable operator identity used to key kernel caches
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(u64);

static NEXT_OP_ID: AtomicU64 = AtomicU64::new(1);

impl OpId {
    fn next() -> Self {
        Self(NEXT_OP_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw identity value
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

struct BinaryInner<T> {
    id: OpId,
    label: &'static str,
    source: String,
    func: Box<dyn Fn(T, T) -> T + Send + Sync>,
}

/// Binary operator `(T, T) -> T`
pub struct BinaryOp<T>(Arc<BinaryInner<T>>);

impl<T> Clone for BinaryOp<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> PartialEq for BinaryOp<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl<T> fmt::Debug for BinaryOp<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BinaryOp({}, id={})", self.0.label, self.0.id.raw())
    }
}

impl<T: Element> BinaryOp<T> {
    /// Create an operator from a label, an accelerator source fragment in
    /// terms of `a` and `b`, and a host callable
    pub fn new(
        label: &'static str,
        source: impl Into<String>,
        func: impl Fn(T, T) -> T + Send + Sync + 'static,
    ) -> Self {
        Self(Arc::new(BinaryInner {
            id: OpId::next(),
            label,
            source: source.into(),
            func: Box::new(func),
        }))
    }

    /// Apply the operator on the host
    #[inline]
    pub fn apply(&self, a: T, b: T) -> T {
        (self.0.func)(a, b)
    }

    /// Operator identity
    #[inline]
    pub fn id(&self) -> OpId {
        self.0.id
    }

    /// Human label
    #[inline]
    pub fn label(&self) -> &'static str {
        self.0.label
    }

    /// Accelerator source fragment
    #[inline]
    pub fn source(&self) -> &str {
        &self.0.source
    }
}

struct UnaryInner<T> {
    id: OpId,
    label: &'static str,
    source: String,
    func: Box<dyn Fn(T) -> T + Send + Sync>,
}

/// Unary operator `T -> T`
pub struct UnaryOp<T>(Arc<UnaryInner<T>>);

impl<T> Clone for UnaryOp<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> PartialEq for UnaryOp<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl<T> fmt::Debug for UnaryOp<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnaryOp({}, id={})", self.0.label, self.0.id.raw())
    }
}

impl<T: Element> UnaryOp<T> {
    /// Create an operator from a label, an accelerator source fragment in
    /// terms of `x`, and a host callable
    pub fn new(
        label: &'static str,
        source: impl Into<String>,
        func: impl Fn(T) -> T + Send + Sync + 'static,
    ) -> Self {
        Self(Arc::new(UnaryInner {
            id: OpId::next(),
            label,
            source: source.into(),
            func: Box::new(func),
        }))
    }

    /// Apply the operator on the host
    #[inline]
    pub fn apply(&self, x: T) -> T {
        (self.0.func)(x)
    }

    /// Operator identity
    #[inline]
    pub fn id(&self) -> OpId {
        self.0.id
    }

    /// Human label
    #[inline]
    pub fn label(&self) -> &'static str {
        self.0.label
    }

    /// Accelerator source fragment
    #[inline]
    pub fn source(&self) -> &str {
        &self.0.source
    }
}

struct SelectInner<T> {
    id: OpId,
    label: &'static str,
    source: String,
    func: Box<dyn Fn(T) -> bool + Send + Sync>,
}

/// Selection predicate `T -> bool`, used by masked kernels
pub struct SelectOp<T>(Arc<SelectInner<T>>);

impl<T> Clone for SelectOp<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> PartialEq for SelectOp<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl<T> fmt::Debug for SelectOp<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SelectOp({}, id={})", self.0.label, self.0.id.raw())
    }
}

impl<T: Element> SelectOp<T> {
    /// Create a predicate from a label, an accelerator source fragment in
    /// terms of `x` evaluating to `bool`, and a host callable
    pub fn new(
        label: &'static str,
        source: impl Into<String>,
        func: impl Fn(T) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self(Arc::new(SelectInner {
            id: OpId::next(),
            label,
            source: source.into(),
            func: Box::new(func),
        }))
    }

    /// Apply the predicate on the host
    #[inline]
    pub fn apply(&self, x: T) -> bool {
        (self.0.func)(x)
    }

    /// Operator identity
    #[inline]
    pub fn id(&self) -> OpId {
        self.0.id
    }

    /// Human label
    #[inline]
    pub fn label(&self) -> &'static str {
        self.0.label
    }

    /// Accelerator source fragment
    #[inline]
    pub fn source(&self) -> &str {
        &self.0.source
    }
}

// ----------------------------------------------------------------------------
// Standard algebra
// ----------------------------------------------------------------------------

/// `a + b`
pub fn plus<T: Element + Add<Output = T>>() -> BinaryOp<T> {
    BinaryOp::new("plus", "a + b", |a, b| a + b)
}

/// `a - b`
pub fn minus<T: Element + Sub<Output = T>>() -> BinaryOp<T> {
    BinaryOp::new("minus", "a - b", |a, b| a - b)
}

/// `a * b`
pub fn mult<T: Element + Mul<Output = T>>() -> BinaryOp<T> {
    BinaryOp::new("mult", "a * b", |a, b| a * b)
}

/// `a / b`
pub fn div<T: Element + Div<Output = T>>() -> BinaryOp<T> {
    BinaryOp::new("div", "a / b", |a, b| a / b)
}

/// `min(a, b)`
pub fn min<T: Element + PartialOrd>() -> BinaryOp<T> {
    BinaryOp::new("min", "min(a, b)", |a, b| if b < a { b } else { a })
}

/// `max(a, b)`
pub fn max<T: Element + PartialOrd>() -> BinaryOp<T> {
    BinaryOp::new("max", "max(a, b)", |a, b| if a < b { b } else { a })
}

/// `a` (keep the first operand)
pub fn first<T: Element>() -> BinaryOp<T> {
    BinaryOp::new("first", "a", |a, _| a)
}

/// `b` (keep the second operand; the default assign operator)
pub fn second<T: Element>() -> BinaryOp<T> {
    BinaryOp::new("second", "b", |_, b| b)
}

/// Bitwise `a & b`
pub fn band<T: Element + BitAnd<Output = T>>() -> BinaryOp<T> {
    BinaryOp::new("band", "a & b", |a, b| a & b)
}

/// Bitwise `a | b`
pub fn bor<T: Element + BitOr<Output = T>>() -> BinaryOp<T> {
    BinaryOp::new("bor", "a | b", |a, b| a | b)
}

/// Bitwise `a ^ b`
pub fn bxor<T: Element + BitXor<Output = T>>() -> BinaryOp<T> {
    BinaryOp::new("bxor", "a ^ b", |a, b| a ^ b)
}

/// `x`
pub fn identity<T: Element>() -> UnaryOp<T> {
    UnaryOp::new("identity", "x", |x| x)
}

/// `-x`
pub fn ainv<T: Element + Neg<Output = T>>() -> UnaryOp<T> {
    UnaryOp::new("ainv", "-x", |x: T| -x)
}

/// `|x|`
pub fn abs<T: Element + PartialOrd + Sub<Output = T>>() -> UnaryOp<T> {
    UnaryOp::new("abs", "abs(x)", |x| {
        if x < T::zero() {
            T::zero() - x
        } else {
            x
        }
    })
}

/// `x * k` for a constant captured at creation time
///
/// The constant is burned into the source fragment, so distinct constants
/// are distinct operators and compile distinct programs.
pub fn scale<T: Element + Mul<Output = T> + fmt::Debug>(k: T) -> UnaryOp<T> {
    UnaryOp::new("scale", format!("x * {:?}", k), move |x| x * k)
}

/// `x + k` for a constant captured at creation time
pub fn shift<T: Element + Add<Output = T> + fmt::Debug>(k: T) -> UnaryOp<T> {
    UnaryOp::new("shift", format!("x + {:?}", k), move |x| x + k)
}

/// `x != 0` (the usual structural mask predicate)
pub fn nonzero<T: Element>() -> SelectOp<T> {
    SelectOp::new("nonzero", "x != 0", |x| x != T::zero())
}

/// `x == 0` (the complement mask predicate)
pub fn eqzero<T: Element>() -> SelectOp<T> {
    SelectOp::new("eqzero", "x == 0", |x| x == T::zero())
}

/// `true` for every input
pub fn always<T: Element>() -> SelectOp<T> {
    SelectOp::new("always", "true", |_| true)
}

/// `false` for every input
pub fn never<T: Element>() -> SelectOp<T> {
    SelectOp::new("never", "false", |_| false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_semantics() {
        let p1 = plus::<i32>();
        let p2 = plus::<i32>();
        let p3 = p1.clone();

        // Distinct factory calls mint distinct operators; clones share one.
        assert_ne!(p1, p2);
        assert_eq!(p1, p3);
        assert_eq!(p1.id(), p3.id());
    }

    #[test]
    fn test_builtin_semantics() {
        assert_eq!(plus::<i32>().apply(2, 3), 5);
        assert_eq!(min::<f32>().apply(2.0, 3.0), 2.0);
        assert_eq!(max::<u32>().apply(2, 3), 3);
        assert_eq!(second::<i32>().apply(7, 9), 9);
        assert_eq!(band::<i32>().apply(1, 1), 1);
        assert_eq!(bor::<i32>().apply(0, 1), 1);
        assert_eq!(abs::<f32>().apply(-2.5), 2.5);
        assert_eq!(scale(2.0f32).apply(3.0), 6.0);
        assert!(nonzero::<i32>().apply(4));
        assert!(!nonzero::<i32>().apply(0));
        assert!(eqzero::<f32>().apply(0.0));
    }

    #[test]
    fn test_min_keeps_first_on_tie() {
        // Stable pick for equal keys
        let m = min::<i32>();
        assert_eq!(m.apply(5, 5), 5);
    }

    #[test]
    fn test_void_ops() {
        let f = first::<()>();
        f.apply((), ());
        assert!(always::<()>().apply(()));
    }
}
