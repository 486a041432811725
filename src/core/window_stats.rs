//! Local mean / variance / ENL within a sliding window.
//!
//! Boxcar statistics come from summed-area tables, so every window costs four lookups
//! regardless of its size. Windows shrink at the raster border instead of reading
//! outside the extent or padding, and non-finite (masked) samples never contribute.
//! Irregular windows (the directional half-windows of Refined Lee, the sigma-range
//! subsets of Lee Sigma) are evaluated explicitly with [`MomentAccumulator`].

use crate::core::compute::RasterCompute;
use crate::types::{SarError, SarResult};
use ndarray::Array2;

/// Variances below this fraction of μ² are rounding noise and read as exactly zero
const MIN_RELATIVE_VARIANCE: f64 = 1e-12;

/// First and second moments of the valid samples inside one window
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LocalMoments {
    pub count: usize,
    pub mean: f64,
    /// Population variance
    pub variance: f64,
}

impl LocalMoments {
    pub fn from_sums(count: usize, sum: f64, sum_sq: f64) -> Self {
        if count == 0 {
            return Self::default();
        }
        let n = count as f64;
        let mean = sum / n;
        let mut variance = (sum_sq / n - mean * mean).max(0.0);
        if variance <= MIN_RELATIVE_VARIANCE * mean * mean {
            variance = 0.0;
        }
        Self { count, mean, variance }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn std_dev(&self) -> f64 {
        self.variance.sqrt()
    }

    /// Coefficient of variation σ/μ (zero for an empty or zero-mean window)
    pub fn cv(&self) -> f64 {
        if self.mean == 0.0 {
            0.0
        } else {
            self.std_dev() / self.mean.abs()
        }
    }

    /// Equivalent number of looks μ²/σ², clipped to ≥ 1; infinite on a zero-variance window
    pub fn enl(&self) -> f64 {
        if self.variance == 0.0 {
            f64::INFINITY
        } else {
            (self.mean * self.mean / self.variance).max(1.0)
        }
    }
}

/// Streaming moments for windows that are not axis-aligned rectangles
#[derive(Debug, Clone, Copy, Default)]
pub struct MomentAccumulator {
    count: usize,
    sum: f64,
    sum_sq: f64,
}

impl MomentAccumulator {
    pub fn push(&mut self, value: f32) {
        if value.is_finite() {
            let v = value as f64;
            self.count += 1;
            self.sum += v;
            self.sum_sq += v * v;
        }
    }

    pub fn finish(&self) -> LocalMoments {
        LocalMoments::from_sums(self.count, self.sum, self.sum_sq)
    }
}

/// Summed-area tables of value, squared value and valid-sample count
#[derive(Debug, Clone)]
pub struct IntegralImage {
    sum: Array2<f64>,
    sum_sq: Array2<f64>,
    count: Array2<u32>,
}

impl IntegralImage {
    pub fn new(image: &Array2<f32>) -> Self {
        let (rows, cols) = image.dim();
        let mut sum = Array2::<f64>::zeros((rows + 1, cols + 1));
        let mut sum_sq = Array2::<f64>::zeros((rows + 1, cols + 1));
        let mut count = Array2::<u32>::zeros((rows + 1, cols + 1));

        for i in 0..rows {
            let mut row_sum = 0.0;
            let mut row_sum_sq = 0.0;
            let mut row_count = 0u32;
            for j in 0..cols {
                let v = image[[i, j]];
                if v.is_finite() {
                    let v = v as f64;
                    row_sum += v;
                    row_sum_sq += v * v;
                    row_count += 1;
                }
                sum[[i + 1, j + 1]] = sum[[i, j + 1]] + row_sum;
                sum_sq[[i + 1, j + 1]] = sum_sq[[i, j + 1]] + row_sum_sq;
                count[[i + 1, j + 1]] = count[[i, j + 1]] + row_count;
            }
        }

        Self { sum, sum_sq, count }
    }

    /// Raster dimensions the tables were built from
    pub fn dim(&self) -> (usize, usize) {
        let (r, c) = self.sum.dim();
        (r - 1, c - 1)
    }

    /// Moments over rows `r0..r1` and cols `c0..c1` (half-open, clipped to the extent)
    pub fn rect(&self, r0: usize, r1: usize, c0: usize, c1: usize) -> LocalMoments {
        let (rows, cols) = self.dim();
        let (r1, c1) = (r1.min(rows), c1.min(cols));
        if r0 >= r1 || c0 >= c1 {
            return LocalMoments::default();
        }
        let area = |t: &Array2<f64>| t[[r1, c1]] - t[[r0, c1]] - t[[r1, c0]] + t[[r0, c0]];
        let n = self.count[[r1, c1]] + self.count[[r0, c0]]
            - self.count[[r0, c1]]
            - self.count[[r1, c0]];
        LocalMoments::from_sums(n as usize, area(&self.sum), area(&self.sum_sq))
    }

    /// Square window of half-size `half` centred on (row, col), shrunk at the borders
    pub fn window(&self, row: usize, col: usize, half: usize) -> LocalMoments {
        self.rect(
            row.saturating_sub(half),
            row + half + 1,
            col.saturating_sub(half),
            col + half + 1,
        )
    }
}

/// Reject window sizes that are zero or even
pub fn validate_window_size(window_size: usize) -> SarResult<()> {
    if window_size == 0 || window_size % 2 == 0 {
        return Err(SarError::Validation(format!(
            "Window size must be odd and > 0, got {}",
            window_size
        )));
    }
    Ok(())
}

/// Sliding-window statistics of one raster, shared by every speckle kernel
#[derive(Debug, Clone)]
pub struct WindowStatistics {
    integral: IntegralImage,
    window_size: usize,
}

impl WindowStatistics {
    pub fn new(image: &Array2<f32>, window_size: usize) -> SarResult<Self> {
        validate_window_size(window_size)?;
        Ok(Self {
            integral: IntegralImage::new(image),
            window_size,
        })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn dim(&self) -> (usize, usize) {
        self.integral.dim()
    }

    /// Moments of the window centred on (row, col)
    pub fn at(&self, row: usize, col: usize) -> LocalMoments {
        self.integral.window(row, col, self.window_size / 2)
    }

    /// Per-pixel window mean; NaN where the window holds no valid sample
    pub fn mean<B: RasterCompute>(&self, backend: &B) -> Array2<f32> {
        self.map(backend, |m| m.mean as f32)
    }

    /// Per-pixel population variance
    pub fn variance<B: RasterCompute>(&self, backend: &B) -> Array2<f32> {
        self.map(backend, |m| m.variance as f32)
    }

    /// Per-pixel ENL μ²/σ², clipped to ≥ 1
    pub fn enl<B: RasterCompute>(&self, backend: &B) -> Array2<f32> {
        self.map(backend, |m| m.enl() as f32)
    }

    fn map<B, F>(&self, backend: &B, f: F) -> Array2<f32>
    where
        B: RasterCompute,
        F: Fn(&LocalMoments) -> f32 + Send + Sync,
    {
        backend.generate(self.dim(), |i, j| {
            let m = self.at(i, j);
            if m.is_empty() {
                f32::NAN
            } else {
                f(&m)
            }
        })
    }
}
