//! Multi-temporal speckle filtering.
//!
//! Each target image is divided by the temporal mean of a stack of neighbouring
//! acquisitions, the ratio is filtered with a mono-temporal kernel and the result is
//! scaled back by the same mean. Targets only read the input collection, so they are
//! filtered independently in parallel.

use crate::core::compute::RasterCompute;
use crate::core::speckle_filter::{
    filter_record, is_speckle_band, FilterConfig, SpeckleFilter, SpeckleFilterType,
};
use crate::types::{ImageCollection, ImageRecord, Raster, SarError, SarResult};
use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Position of the target inside its stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StackAlignment {
    /// ⌊(N−1)/2⌋ images before the target, the rest after
    #[default]
    Centered,
    /// N−1 images before the target
    Preceding,
}

impl std::fmt::Display for StackAlignment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StackAlignment::Centered => write!(f, "CENTERED"),
            StackAlignment::Preceding => write!(f, "PRECEDING"),
        }
    }
}

impl FromStr for StackAlignment {
    type Err = SarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CENTERED" | "CENTRED" => Ok(StackAlignment::Centered),
            "PRECEDING" => Ok(StackAlignment::Preceding),
            _ => Err(SarError::Validation(format!(
                "Stack alignment must be CENTERED or PRECEDING, got {:?}",
                s
            ))),
        }
    }
}

impl TryFrom<String> for StackAlignment {
    type Error = SarError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<StackAlignment> for String {
    fn from(a: StackAlignment) -> Self {
        a.to_string()
    }
}

/// Collection indices of the stack around `target`, clipped to `0..len`.
///
/// Near the ends of the collection the stack shrinks rather than shifting or padding.
pub fn stack_indices(
    len: usize,
    target: usize,
    depth: usize,
    alignment: StackAlignment,
) -> std::ops::Range<usize> {
    let depth = depth.max(1);
    let before = match alignment {
        StackAlignment::Centered => (depth - 1) / 2,
        StackAlignment::Preceding => depth - 1,
    };
    let after = depth - 1 - before;
    let start = target.saturating_sub(before);
    let end = (target + after + 1).min(len);
    start..end
}

/// Per-pixel mean of the finite samples across `members`, NaN where none are finite
pub fn temporal_mean<B: RasterCompute>(backend: &B, members: &[&Array2<f32>]) -> Array2<f32> {
    let shape = members.first().map_or((0, 0), |m| m.dim());
    backend.generate(shape, |i, j| {
        let (sum, n) = members
            .iter()
            .map(|m| m[[i, j]])
            .filter(|v| v.is_finite())
            .fold((0.0f64, 0usize), |(s, n), v| (s + v as f64, n + 1));
        if n == 0 {
            f32::NAN
        } else {
            (sum / n as f64) as f32
        }
    })
}

/// Multi-temporal framework around one mono-temporal kernel
pub struct MultiTemporalFilter<'a, B: RasterCompute> {
    kernel: SpeckleFilterType,
    stack_depth: usize,
    alignment: StackAlignment,
    filter: SpeckleFilter<&'a B>,
    backend: &'a B,
}

impl<'a, B: RasterCompute> MultiTemporalFilter<'a, B> {
    pub fn new(config: &FilterConfig, backend: &'a B) -> Self {
        Self {
            kernel: config.kernel,
            stack_depth: config.stack_depth,
            alignment: config.stack_alignment,
            filter: SpeckleFilter::from_config(config, backend),
            backend,
        }
    }

    pub fn apply(&self, collection: &ImageCollection) -> SarResult<ImageCollection> {
        let records = collection.records();
        log::debug!(
            "Multi-temporal {} filtering of {} images, stack depth {} ({})",
            self.kernel,
            records.len(),
            self.stack_depth,
            self.alignment
        );

        let filtered = (0..records.len())
            .into_par_iter()
            .map(|target| {
                let stack = stack_indices(records.len(), target, self.stack_depth, self.alignment);
                self.filter_target(&records[target], &records[stack])
            })
            .collect::<SarResult<Vec<_>>>()?;
        ImageCollection::new(filtered)
    }

    /// Filter one target against its stack (which includes the target itself)
    pub fn filter_target(
        &self,
        target: &ImageRecord,
        stack: &[ImageRecord],
    ) -> SarResult<ImageRecord> {
        if stack.len() <= 1 {
            return filter_record(&self.filter, target, self.kernel);
        }
        log::debug!("Filtering image {} against a stack of {}", target.id(), stack.len());

        target.map_bands(|band| {
            if !is_speckle_band(band) {
                return Ok(band.clone());
            }
            let members: Vec<&Array2<f32>> = stack
                .iter()
                .filter_map(|r| r.band(band.band()))
                .map(|r| r.data())
                .collect();
            if members.len() <= 1 {
                return band.with_data(self.filter.apply_filter(band.data(), self.kernel)?);
            }
            band.with_data(self.filter_band(band, &members)?)
        })
    }

    fn filter_band(&self, band: &Raster, members: &[&Array2<f32>]) -> SarResult<Array2<f32>> {
        let image = band.data();
        let mean = temporal_mean(self.backend, members);
        let ratio = self.backend.generate(image.dim(), |i, j| {
            let m = mean[[i, j]];
            if m.is_finite() && m != 0.0 {
                image[[i, j]] / m
            } else {
                f32::NAN
            }
        });
        let filtered_ratio = self.filter.apply_filter(&ratio, self.kernel)?;

        Ok(self.backend.generate(image.dim(), |i, j| {
            if ratio[[i, j]].is_finite() {
                filtered_ratio[[i, j]] * mean[[i, j]]
            } else {
                image[[i, j]]
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::compute::LocalCompute;
    use approx::assert_relative_eq;

    #[test]
    fn test_stack_indices_centered() {
        assert_eq!(stack_indices(10, 5, 3, StackAlignment::Centered), 4..7);
        assert_eq!(stack_indices(10, 0, 3, StackAlignment::Centered), 0..2);
        assert_eq!(stack_indices(10, 9, 3, StackAlignment::Centered), 8..10);
        // even depth puts the extra image after the target
        assert_eq!(stack_indices(10, 5, 4, StackAlignment::Centered), 4..8);
        assert_eq!(stack_indices(3, 1, 10, StackAlignment::Centered), 0..3);
    }

    #[test]
    fn test_stack_indices_preceding() {
        assert_eq!(stack_indices(10, 5, 3, StackAlignment::Preceding), 3..6);
        assert_eq!(stack_indices(10, 0, 3, StackAlignment::Preceding), 0..1);
        assert_eq!(stack_indices(10, 4, 1, StackAlignment::Preceding), 4..5);
    }

    #[test]
    fn test_alignment_parse() {
        assert_eq!("preceding".parse::<StackAlignment>().unwrap(), StackAlignment::Preceding);
        assert!("AFTER".parse::<StackAlignment>().is_err());
    }

    #[test]
    fn test_temporal_mean_ignores_masked_members() {
        let a = Array2::from_elem((2, 2), 1.0f32);
        let mut b = Array2::from_elem((2, 2), 3.0f32);
        b[[0, 0]] = f32::NAN;
        let mean = temporal_mean(&LocalCompute::default(), &[&a, &b]);
        assert_eq!(mean[[0, 0]], 1.0);
        assert_relative_eq!(mean[[1, 1]], 2.0);
    }
}
