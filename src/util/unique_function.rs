//! A move-only, no-throw callable container.
//!
//! Type erasure here is simply `Box<dyn FnOnce(..) + Send>`: the box is
//! move-only by construction, and dropping it runs the closure's
//! destructor for free. This wrapper exists to (a) make the move-only,
//! no-copy, "calling empty aborts" contract explicit and type-checked, and
//! (b) give call sites a named type instead of a raw trait object.

use crate::util::exit;

/// A move-only callable taking `Args` and returning `R`. Analogous to
/// `Box<dyn FnOnce(Args) -> R + Send>`, but calling an empty (already
/// consumed) instance is a hard abort rather than a panic that could be
/// caught, preserving a no-throw contract.
pub struct UniqueFunction<Args, R = ()> {
    inner: Option<Box<dyn FnOnce(Args) -> R + Send>>,
}

impl<Args, R> UniqueFunction<Args, R> {
    /// Wraps a closure. No inline small-buffer storage is hand-rolled
    /// here: Rust's `Box` already avoids a second allocation for
    /// zero-sized captures, and the closure is moved, not copied, across
    /// the boundary.
    pub fn new(f: impl FnOnce(Args) -> R + Send + 'static) -> Self {
        Self {
            inner: Some(Box::new(f)),
        }
    }

    /// An instance holding no callable. Calling it aborts the process.
    pub fn empty() -> Self {
        Self { inner: None }
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_none()
    }

    /// Clears the callable, leaving this instance empty.
    pub fn clear(&mut self) {
        self.inner = None;
    }

    /// Invokes and consumes the callable. Aborts the process if this
    /// instance is empty.
    pub fn invoke(self, args: Args) -> R {
        match self.inner {
            Some(f) => f(args),
            None => exit::exit(1),
        }
    }
}

impl<Args, R> From<Option<Box<dyn FnOnce(Args) -> R + Send>>> for UniqueFunction<Args, R> {
    fn from(inner: Option<Box<dyn FnOnce(Args) -> R + Send>>) -> Self {
        Self { inner }
    }
}
