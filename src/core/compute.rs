//! Raster compute capability.
//!
//! Every kernel in this crate produces its output grid through [`RasterCompute`], so the
//! filtering and terrain algorithms only describe *what* to evaluate per pixel. Where the
//! evaluation runs (one thread, a rayon pool, or some external tile scheduler) is decided
//! by the implementation handed to the engines.

use ndarray::{Array2, Zip};

/// Execution strategy for [`LocalCompute`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Single-threaded evaluation
    Sequential,
    /// Data-parallel evaluation on the global rayon pool
    #[default]
    Parallel,
}

/// Map-style raster evaluation.
///
/// `f` must be pure with respect to the output: it may read any shared input but each
/// output pixel is written exactly once, so implementations are free to evaluate pixels in
/// any order and on any thread.
pub trait RasterCompute: Send + Sync {
    fn generate<F>(&self, shape: (usize, usize), f: F) -> Array2<f32>
    where
        F: Fn(usize, usize) -> f32 + Send + Sync;

    /// Boolean variant of [`RasterCompute::generate`], used for masks
    fn generate_mask<F>(&self, shape: (usize, usize), f: F) -> Array2<bool>
    where
        F: Fn(usize, usize) -> bool + Send + Sync,
    {
        self.generate(shape, |r, c| if f(r, c) { 1.0 } else { 0.0 })
            .mapv(|v| v != 0.0)
    }
}

impl<B: RasterCompute> RasterCompute for &B {
    fn generate<F>(&self, shape: (usize, usize), f: F) -> Array2<f32>
    where
        F: Fn(usize, usize) -> f32 + Send + Sync,
    {
        (**self).generate(shape, f)
    }
}

/// In-process evaluation over ndarray, optionally parallel
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalCompute {
    pub mode: ExecutionMode,
}

impl LocalCompute {
    pub fn new(mode: ExecutionMode) -> Self {
        Self { mode }
    }

    pub fn sequential() -> Self {
        Self::new(ExecutionMode::Sequential)
    }
}

impl RasterCompute for LocalCompute {
    fn generate<F>(&self, shape: (usize, usize), f: F) -> Array2<f32>
    where
        F: Fn(usize, usize) -> f32 + Send + Sync,
    {
        let mut out = Array2::<f32>::zeros(shape);
        match self.mode {
            ExecutionMode::Sequential => {
                Zip::indexed(&mut out).for_each(|(r, c), v| *v = f(r, c));
            }
            ExecutionMode::Parallel => fill_parallel(&mut out, &f),
        }
        out
    }
}

#[cfg(feature = "parallel")]
fn fill_parallel<F>(out: &mut Array2<f32>, f: &F)
where
    F: Fn(usize, usize) -> f32 + Send + Sync,
{
    Zip::indexed(out).par_for_each(|(r, c), v| *v = f(r, c));
}

#[cfg(not(feature = "parallel"))]
fn fill_parallel<F>(out: &mut Array2<f32>, f: &F)
where
    F: Fn(usize, usize) -> f32 + Send + Sync,
{
    // Fallback to sequential evaluation if parallel feature is not available
    Zip::indexed(out).for_each(|(r, c), v| *v = f(r, c));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modes_agree() {
        let f = |r: usize, c: usize| (r * 31 + c) as f32 * 0.5;
        let seq = LocalCompute::sequential().generate((17, 23), f);
        let par = LocalCompute::new(ExecutionMode::Parallel).generate((17, 23), f);
        assert_eq!(seq, par);
        assert_eq!(seq[[2, 3]], 32.5);
    }

    #[test]
    fn test_generate_mask() {
        let mask = LocalCompute::default().generate_mask((3, 3), |r, c| r == c);
        assert!(mask[[1, 1]]);
        assert!(!mask[[0, 1]]);
    }
}
