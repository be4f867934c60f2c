//! Row iteration that is parallel with the `parallel` feature and
//! sequential without it.
//!
//! Algorithms import `crate::maybe_rayon::*` and call `into_par_iter()`
//! either way.

#[cfg(feature = "parallel")]
pub use rayon::prelude::*;

#[cfg(not(feature = "parallel"))]
pub use sequential::IntoParallelIterator;

#[cfg(not(feature = "parallel"))]
mod sequential {
    /// `into_par_iter()` that hands back the plain `IntoIterator` iterator,
    /// so `.flat_map()` and `.collect()` resolve to `Iterator` methods.
    pub trait IntoParallelIterator: IntoIterator + Sized {
        fn into_par_iter(self) -> Self::IntoIter {
            self.into_iter()
        }
    }

    impl<I: IntoIterator> IntoParallelIterator for I {}
}
