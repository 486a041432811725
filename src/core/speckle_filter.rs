use crate::core::compute::{LocalCompute, RasterCompute};
use crate::core::multitemporal::{MultiTemporalFilter, StackAlignment};
use crate::core::window_stats::{
    validate_window_size, LocalMoments, MomentAccumulator, WindowStatistics,
};
use crate::types::{ImageCollection, ImageRecord, Polarization, Raster, SarError, SarResult};
use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::f64::consts::SQRT_2;
use std::str::FromStr;

/// Neighbourhood of the Refined Lee directional windows
pub const REFINED_LEE_WINDOW: usize = 7;

/// Temporal framework the kernel runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FilterFramework {
    /// Every image filtered on its own
    #[default]
    Mono,
    /// Kernel applied to the ratio against a temporal mean of neighbouring acquisitions
    Multi,
}

impl std::fmt::Display for FilterFramework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterFramework::Mono => write!(f, "MONO"),
            FilterFramework::Multi => write!(f, "MULTI"),
        }
    }
}

impl FromStr for FilterFramework {
    type Err = SarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "MONO" => Ok(FilterFramework::Mono),
            "MULTI" => Ok(FilterFramework::Multi),
            _ => Err(SarError::Validation(format!(
                "Speckle filter framework must be MONO or MULTI, got {:?}",
                s
            ))),
        }
    }
}

impl TryFrom<String> for FilterFramework {
    type Error = SarError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<FilterFramework> for String {
    fn from(f: FilterFramework) -> Self {
        f.to_string()
    }
}

/// Available speckle filter types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SpeckleFilterType {
    /// Mean filter (simple averaging)
    #[default]
    Boxcar,
    /// Lee filter (adaptive)
    Lee,
    /// Gamma MAP filter (Maximum A Posteriori)
    GammaMap,
    /// Refined Lee filter (directional windows)
    RefinedLee,
    /// Lee Sigma filter (sigma-range outlier rejection)
    LeeSigma,
}

impl SpeckleFilterType {
    pub const ALL: [SpeckleFilterType; 5] = [
        SpeckleFilterType::Boxcar,
        SpeckleFilterType::Lee,
        SpeckleFilterType::GammaMap,
        SpeckleFilterType::RefinedLee,
        SpeckleFilterType::LeeSigma,
    ];
}

impl std::fmt::Display for SpeckleFilterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SpeckleFilterType::Boxcar => "BOXCAR",
            SpeckleFilterType::Lee => "LEE",
            SpeckleFilterType::GammaMap => "GAMMA MAP",
            SpeckleFilterType::RefinedLee => "REFINED LEE",
            SpeckleFilterType::LeeSigma => "LEE SIGMA",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for SpeckleFilterType {
    type Err = SarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('_', " ").as_str() {
            "BOXCAR" => Ok(SpeckleFilterType::Boxcar),
            "LEE" => Ok(SpeckleFilterType::Lee),
            "GAMMA MAP" => Ok(SpeckleFilterType::GammaMap),
            "REFINED LEE" => Ok(SpeckleFilterType::RefinedLee),
            "LEE SIGMA" => Ok(SpeckleFilterType::LeeSigma),
            _ => Err(SarError::Validation(format!(
                "Speckle filter must be one of {}, got {:?}",
                SpeckleFilterType::ALL.map(|k| k.to_string()).join(", "),
                s
            ))),
        }
    }
}

impl TryFrom<String> for SpeckleFilterType {
    type Error = SarError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SpeckleFilterType> for String {
    fn from(t: SpeckleFilterType) -> Self {
        t.to_string()
    }
}

/// Kernel tuning parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpeckleFilterParams {
    /// Nominal number of looks for LEE, GAMMA MAP and REFINED LEE (Cu² = 1/enl)
    pub enl: f32,
    /// Target inclusion probability of the Lee Sigma range
    pub sigma: f32,
    /// Number of looks of the Lee Sigma speckle model
    pub sigma_looks: f32,
    /// Window of the Lee Sigma prior estimate (odd)
    pub target_window: usize,
    /// Percentile above which a pixel counts as bright for point-target detection
    pub point_target_percentile: f32,
    /// Bright pixels needed in the 3x3 neighbourhood to keep a point target unfiltered
    pub point_target_count: usize,
}

impl Default for SpeckleFilterParams {
    fn default() -> Self {
        Self {
            enl: 5.0,
            sigma: 0.9,
            sigma_looks: 4.0,
            target_window: 3,
            point_target_percentile: 0.98,
            point_target_count: 7,
        }
    }
}

impl SpeckleFilterParams {
    pub fn validate(&self) -> SarResult<()> {
        if !(self.enl.is_finite() && self.enl > 0.0) {
            return Err(SarError::Validation(format!("enl must be > 0, got {}", self.enl)));
        }
        if !(self.sigma > 0.0 && self.sigma < 1.0) {
            return Err(SarError::Validation(format!(
                "sigma must lie in (0, 1), got {}",
                self.sigma
            )));
        }
        if !(self.sigma_looks.is_finite() && self.sigma_looks >= 1.0) {
            return Err(SarError::Validation(format!(
                "sigma_looks must be >= 1, got {}",
                self.sigma_looks
            )));
        }
        validate_window_size(self.target_window)?;
        if !(self.point_target_percentile > 0.0 && self.point_target_percentile < 1.0) {
            return Err(SarError::Validation(format!(
                "point_target_percentile must lie in (0, 1), got {}",
                self.point_target_percentile
            )));
        }
        Ok(())
    }
}

/// Speckle stage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterConfig {
    pub framework: FilterFramework,
    pub kernel: SpeckleFilterType,
    /// Kernel window size (odd, > 0)
    pub kernel_size: usize,
    /// Images in the multi-temporal stack (>= 1)
    pub stack_depth: usize,
    pub stack_alignment: StackAlignment,
    pub params: SpeckleFilterParams,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            framework: FilterFramework::Mono,
            kernel: SpeckleFilterType::Boxcar,
            kernel_size: 13,
            stack_depth: 10,
            stack_alignment: StackAlignment::Centered,
            params: SpeckleFilterParams::default(),
        }
    }
}

impl FilterConfig {
    pub fn mono(kernel: SpeckleFilterType, kernel_size: usize) -> Self {
        Self {
            framework: FilterFramework::Mono,
            kernel,
            kernel_size,
            ..Self::default()
        }
    }

    pub fn multi(kernel: SpeckleFilterType, kernel_size: usize, stack_depth: usize) -> Self {
        Self {
            framework: FilterFramework::Multi,
            kernel,
            kernel_size,
            stack_depth,
            ..Self::default()
        }
    }

    /// Build and validate from the textual names used in parameter files
    pub fn parse(
        framework: &str,
        kernel: &str,
        kernel_size: usize,
        stack_depth: usize,
    ) -> SarResult<Self> {
        let config = Self {
            framework: framework.parse()?,
            kernel: kernel.parse()?,
            kernel_size,
            stack_depth,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SarResult<()> {
        if self.kernel_size == 0 || self.kernel_size % 2 == 0 {
            return Err(SarError::Validation(format!(
                "Speckle filter kernel size must be odd and > 0, got {}",
                self.kernel_size
            )));
        }
        if self.stack_depth == 0 {
            return Err(SarError::Validation(
                "Multi-temporal stack depth must be >= 1".to_string(),
            ));
        }
        self.params.validate()
    }
}

/// Multiplicative sigma range of the Lee Sigma filter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SigmaRange {
    pub lower: f64,
    pub upper: f64,
    /// Squared coefficient of variation of speckle truncated to [lower, upper]
    pub eta_v2: f64,
}

impl SigmaRange {
    const STEP: f64 = 1e-3;
    const EXTENT: f64 = 25.0;

    /// Highest-density interval holding probability `sigma` of unit-mean Gamma(looks) speckle
    pub fn for_looks(looks: f64, sigma: f64) -> SarResult<Self> {
        if !(looks >= 1.0 && sigma > 0.0 && sigma < 1.0) {
            return Err(SarError::Validation(format!(
                "Sigma range needs looks >= 1 and sigma in (0, 1), got {} / {}",
                looks, sigma
            )));
        }

        let n = (Self::EXTENT / Self::STEP) as usize;
        let u: Vec<f64> = (0..n).map(|i| (i as f64 + 0.5) * Self::STEP).collect();
        let log_pdf: Vec<f64> = u.iter().map(|&x| (looks - 1.0) * x.ln() - looks * x).collect();
        let peak = log_pdf.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let pdf: Vec<f64> = log_pdf.iter().map(|&l| (l - peak).exp()).collect();
        let total: f64 = pdf.iter().sum();

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| pdf[b].total_cmp(&pdf[a]));

        let (mut mass, mut lo, mut hi) = (0.0, n, 0);
        let (mut m0, mut m1, mut m2) = (0.0, 0.0, 0.0);
        for &i in &order {
            if mass >= sigma * total {
                break;
            }
            mass += pdf[i];
            lo = lo.min(i);
            hi = hi.max(i);
            m0 += pdf[i];
            m1 += pdf[i] * u[i];
            m2 += pdf[i] * u[i] * u[i];
        }

        let mean = m1 / m0;
        let variance = (m2 / m0 - mean * mean).max(0.0);
        Ok(Self {
            lower: u[lo] - Self::STEP / 2.0,
            upper: u[hi] + Self::STEP / 2.0,
            eta_v2: variance / (mean * mean),
        })
    }
}

/// Directional half-windows of the Refined Lee filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Direction {
    /// Evaluation order; on equal variance the earlier direction wins
    pub const PRIORITY: [Direction; 8] = [
        Direction::North,
        Direction::NorthEast,
        Direction::East,
        Direction::SouthEast,
        Direction::South,
        Direction::SouthWest,
        Direction::West,
        Direction::NorthWest,
    ];

    /// Whether offset (dr, dc) from the centre lies in this half-window (rows grow southward)
    pub fn contains(self, dr: isize, dc: isize) -> bool {
        match self {
            Direction::North => dr <= 0,
            Direction::South => dr >= 0,
            Direction::East => dc >= 0,
            Direction::West => dc <= 0,
            Direction::NorthEast => dc >= dr,
            Direction::SouthWest => dc <= dr,
            Direction::NorthWest => dr + dc <= 0,
            Direction::SouthEast => dr + dc >= 0,
        }
    }

    fn offsets(self, half: isize) -> Vec<(isize, isize)> {
        let mut offsets = Vec::new();
        for dr in -half..=half {
            for dc in -half..=half {
                if self.contains(dr, dc) {
                    offsets.push((dr, dc));
                }
            }
        }
        offsets
    }
}

/// Precomputed directional windows for one neighbourhood size
#[derive(Debug, Clone)]
pub struct DirectionalWindows {
    windows: Vec<(Direction, Vec<(isize, isize)>)>,
}

impl DirectionalWindows {
    pub fn new(window_size: usize) -> Self {
        let half = (window_size / 2) as isize;
        Self {
            windows: Direction::PRIORITY
                .iter()
                .map(|&d| (d, d.offsets(half)))
                .collect(),
        }
    }

    /// Half-window with the smallest variance around (row, col), and its moments
    pub fn select(&self, image: &Array2<f32>, row: usize, col: usize) -> (Direction, LocalMoments) {
        let (rows, cols) = image.dim();
        let mut best: Option<(Direction, LocalMoments)> = None;

        for (direction, offsets) in &self.windows {
            let mut acc = MomentAccumulator::default();
            for &(dr, dc) in offsets {
                let r = row as isize + dr;
                let c = col as isize + dc;
                if r >= 0 && c >= 0 && (r as usize) < rows && (c as usize) < cols {
                    acc.push(image[[r as usize, c as usize]]);
                }
            }
            let moments = acc.finish();
            if moments.is_empty() {
                continue;
            }
            match best {
                Some((_, b)) if b.variance <= moments.variance => {}
                _ => best = Some((*direction, moments)),
            }
        }

        best.unwrap_or((Direction::North, LocalMoments::default()))
    }
}

/// Lee weight W = σ² / (σ² + μ²·Cu²), clipped to [0, 1]
pub fn lee_weight(variance: f64, mean: f64, cu2: f64) -> f64 {
    let denominator = variance + mean * mean * cu2;
    if denominator <= 0.0 {
        return 0.0;
    }
    (variance / denominator).clamp(0.0, 1.0)
}

/// μ + W·(x − μ) with the given window moments
pub fn lee_estimate(x: f32, moments: &LocalMoments, cu2: f64) -> f32 {
    if moments.is_empty() {
        return x;
    }
    let w = lee_weight(moments.variance, moments.mean, cu2);
    (moments.mean + w * (x as f64 - moments.mean)) as f32
}

/// Gamma MAP estimate.
///
/// Ci ≤ Cu returns μ, Ci ≥ Cmax returns `x`, anything in between takes the positive root
/// of the MAP quadratic.
pub fn gamma_map_estimate(x: f32, moments: &LocalMoments, enl: f64) -> f32 {
    if moments.is_empty() || moments.mean <= 0.0 {
        return x;
    }
    let cu = 1.0 / enl.sqrt();
    let cmax = SQRT_2 * cu;
    let ci = moments.cv();

    if ci <= cu {
        return moments.mean as f32;
    }
    if ci >= cmax {
        return x;
    }

    let mean = moments.mean;
    let alpha = (1.0 + cu * cu) / (ci * ci - cu * cu);
    let b = alpha - enl - 1.0;
    let discriminant = mean * mean * b * b + 4.0 * alpha * enl * mean * x as f64;
    ((b * mean + discriminant.max(0.0).sqrt()) / (2.0 * alpha)) as f32
}

/// Speckle filter processor
pub struct SpeckleFilter<B: RasterCompute = LocalCompute> {
    window_size: usize,
    params: SpeckleFilterParams,
    backend: B,
}

impl SpeckleFilter<LocalCompute> {
    /// Create a speckle filter with default kernel parameters
    pub fn new(window_size: usize) -> Self {
        Self::with_params(window_size, SpeckleFilterParams::default())
    }

    /// Create a speckle filter with custom parameters
    pub fn with_params(window_size: usize, params: SpeckleFilterParams) -> Self {
        Self::with_backend(window_size, params, LocalCompute::default())
    }

    /// Estimate number of looks from image statistics
    pub fn estimate_number_of_looks(image: &Array2<f32>) -> SarResult<f32> {
        let mut acc = MomentAccumulator::default();
        image.iter().for_each(|&v| acc.push(v));
        let moments = acc.finish();
        if moments.is_empty() {
            return Err(SarError::Computation("No valid pixels found".to_string()));
        }
        let num_looks = moments.enl() as f32;
        log::info!("Estimated number of looks: {:.2}", num_looks);
        Ok(num_looks)
    }
}

impl<B: RasterCompute> SpeckleFilter<B> {
    pub fn with_backend(window_size: usize, params: SpeckleFilterParams, backend: B) -> Self {
        Self {
            window_size,
            params,
            backend,
        }
    }

    pub fn from_config(config: &FilterConfig, backend: B) -> Self {
        Self::with_backend(config.kernel_size, config.params.clone(), backend)
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn params(&self) -> &SpeckleFilterParams {
        &self.params
    }

    /// Apply speckle filtering to one band
    pub fn apply_filter(
        &self,
        image: &Array2<f32>,
        filter_type: SpeckleFilterType,
    ) -> SarResult<Array2<f32>> {
        validate_window_size(self.window_size)?;
        self.params.validate()?;
        log::debug!(
            "Applying {} speckle filter ({}x{}) to {:?} image",
            filter_type,
            self.window_size,
            self.window_size,
            image.dim()
        );

        match filter_type {
            SpeckleFilterType::Boxcar => self.apply_boxcar_filter(image),
            SpeckleFilterType::Lee => self.apply_lee_filter(image),
            SpeckleFilterType::GammaMap => self.apply_gamma_map_filter(image),
            SpeckleFilterType::RefinedLee => Ok(self.apply_refined_lee_filter(image)),
            SpeckleFilterType::LeeSigma => self.apply_lee_sigma_filter(image),
        }
    }

    fn cu2(&self) -> f64 {
        1.0 / self.params.enl as f64
    }

    fn apply_boxcar_filter(&self, image: &Array2<f32>) -> SarResult<Array2<f32>> {
        let stats = WindowStatistics::new(image, self.window_size)?;
        Ok(self.backend.generate(image.dim(), |i, j| {
            let x = image[[i, j]];
            let moments = stats.at(i, j);
            if !x.is_finite() || moments.is_empty() {
                x
            } else {
                moments.mean as f32
            }
        }))
    }

    fn apply_lee_filter(&self, image: &Array2<f32>) -> SarResult<Array2<f32>> {
        let stats = WindowStatistics::new(image, self.window_size)?;
        let cu2 = self.cu2();
        Ok(self.backend.generate(image.dim(), |i, j| {
            let x = image[[i, j]];
            if !x.is_finite() {
                return x;
            }
            lee_estimate(x, &stats.at(i, j), cu2)
        }))
    }

    fn apply_gamma_map_filter(&self, image: &Array2<f32>) -> SarResult<Array2<f32>> {
        let stats = WindowStatistics::new(image, self.window_size)?;
        let enl = self.params.enl as f64;
        Ok(self.backend.generate(image.dim(), |i, j| {
            let x = image[[i, j]];
            if !x.is_finite() {
                return x;
            }
            gamma_map_estimate(x, &stats.at(i, j), enl)
        }))
    }

    fn apply_refined_lee_filter(&self, image: &Array2<f32>) -> Array2<f32> {
        let windows = DirectionalWindows::new(REFINED_LEE_WINDOW);
        let cu2 = self.cu2();
        self.backend.generate(image.dim(), |i, j| {
            let x = image[[i, j]];
            if !x.is_finite() {
                return x;
            }
            let (_, moments) = windows.select(image, i, j);
            lee_estimate(x, &moments, cu2)
        })
    }

    fn apply_lee_sigma_filter(&self, image: &Array2<f32>) -> SarResult<Array2<f32>> {
        let looks = self.params.sigma_looks as f64;
        let range = SigmaRange::for_looks(looks, self.params.sigma as f64)?;
        log::debug!(
            "Lee sigma range [{:.3}, {:.3}], eta_v^2 {:.4}",
            range.lower,
            range.upper,
            range.eta_v2
        );

        let point_targets = self.detect_point_targets(image)?;
        let target = WindowStatistics::new(image, self.params.target_window)?;
        let half = self.window_size / 2;
        let (rows, cols) = image.dim();

        Ok(self.backend.generate(image.dim(), |i, j| {
            let x = image[[i, j]];
            if !x.is_finite() || point_targets[[i, j]] {
                return x;
            }

            let prior = lee_estimate(x, &target.at(i, j), 1.0 / looks) as f64;
            let (lower, upper) = (prior * range.lower, prior * range.upper);

            let mut acc = MomentAccumulator::default();
            for r in i.saturating_sub(half)..(i + half + 1).min(rows) {
                for c in j.saturating_sub(half)..(j + half + 1).min(cols) {
                    let v = image[[r, c]];
                    if v.is_finite() && (v as f64) >= lower && (v as f64) <= upper {
                        acc.push(v);
                    }
                }
            }
            let refined = acc.finish();
            if refined.is_empty() {
                prior as f32
            } else {
                lee_estimate(x, &refined, range.eta_v2)
            }
        }))
    }

    /// Bright clusters above the configured percentile, kept unfiltered by Lee Sigma
    fn detect_point_targets(&self, image: &Array2<f32>) -> SarResult<Array2<bool>> {
        let mut values: Vec<f32> = image.iter().copied().filter(|v| v.is_finite()).collect();
        if values.is_empty() {
            return Ok(Array2::from_elem(image.dim(), false));
        }
        let idx = ((values.len() - 1) as f64 * self.params.point_target_percentile as f64).round()
            as usize;
        let (_, threshold, _) = values.select_nth_unstable_by(idx, |a, b| a.total_cmp(b));
        let threshold = *threshold;

        let bright = image.mapv(|v| if v.is_finite() && v > threshold { 1.0 } else { 0.0 });
        let counts = WindowStatistics::new(&bright, 3)?;
        let required = self.params.point_target_count;
        Ok(self.backend.generate_mask(image.dim(), |i, j| {
            if bright[[i, j]] == 0.0 {
                return false;
            }
            let m = counts.at(i, j);
            (m.mean * m.count as f64).round() as usize >= required
        }))
    }
}

/// True for the bands speckle kernels are applied to
pub fn is_speckle_band(raster: &Raster) -> bool {
    Polarization::from_band(raster.band()).map_or(false, |p| p.is_speckle_filtered())
}

/// Soft data-shape check: the collection must carry VV or VH somewhere
pub fn check_polarizations(collection: &ImageCollection) -> SarResult<()> {
    let names = collection.band_names();
    let present = names
        .iter()
        .filter_map(|n| Polarization::from_band(n))
        .any(|p| p.is_speckle_filtered());
    if present {
        Ok(())
    } else {
        Err(SarError::MissingPolarization {
            available: names.into_iter().collect::<Vec<_>>().join(", "),
        })
    }
}

/// Apply the configured speckle filter to every image of a collection
pub fn apply_speckle_filter(
    collection: &ImageCollection,
    config: &FilterConfig,
) -> SarResult<ImageCollection> {
    apply_speckle_filter_with(collection, config, &LocalCompute::default())
}

/// [`apply_speckle_filter`] on an explicit compute backend
pub fn apply_speckle_filter_with<B: RasterCompute>(
    collection: &ImageCollection,
    config: &FilterConfig,
    backend: &B,
) -> SarResult<ImageCollection> {
    config.validate()?;

    if let Err(e) = check_polarizations(collection) {
        if e.is_soft() {
            log::warn!("{}. No speckle filter has been applied", e);
            return Ok(collection.clone());
        }
        return Err(e);
    }

    let filtered = match config.framework {
        FilterFramework::Mono => filter_mono_temporal(collection, config, backend)?,
        FilterFramework::Multi => MultiTemporalFilter::new(config, backend).apply(collection)?,
    };

    log::info!(
        "{} speckle filtering ({}, {}x{}) completed on {} images",
        config.framework,
        config.kernel,
        config.kernel_size,
        config.kernel_size,
        filtered.len()
    );
    Ok(filtered)
}

fn filter_mono_temporal<B: RasterCompute>(
    collection: &ImageCollection,
    config: &FilterConfig,
    backend: &B,
) -> SarResult<ImageCollection> {
    let filter = SpeckleFilter::from_config(config, backend);
    let records = collection
        .records()
        .par_iter()
        .map(|record| filter_record(&filter, record, config.kernel))
        .collect::<SarResult<Vec<_>>>()?;
    ImageCollection::new(records)
}

/// Filter the VV/VH bands of one record, carrying every other band through
pub(crate) fn filter_record<B: RasterCompute>(
    filter: &SpeckleFilter<B>,
    record: &ImageRecord,
    kernel: SpeckleFilterType,
) -> SarResult<ImageRecord> {
    log::debug!("Filtering image {}", record.id());
    record.map_bands(|band| {
        if is_speckle_band(band) {
            band.with_data(filter.apply_filter(band.data(), kernel)?)
        } else {
            Ok(band.clone())
        }
    })
}
