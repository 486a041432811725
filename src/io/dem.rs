use crate::types::{GeoTransform, Raster, SarError, SarResult};
use ndarray::Array2;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Source of elevation rasters, keyed by DEM reference (e.g. "USGS/SRTMGL1_003")
pub trait DemSource: Send + Sync {
    fn load_dem(&self, reference: &str) -> SarResult<Raster>;
}

impl<S: DemSource + ?Sized> DemSource for Arc<S> {
    fn load_dem(&self, reference: &str) -> SarResult<Raster> {
        (**self).load_dem(reference)
    }
}

/// DEMs already held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryDemSource {
    dems: HashMap<String, Raster>,
}

impl InMemoryDemSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dem(mut self, reference: impl Into<String>, dem: Raster) -> Self {
        self.insert(reference, dem);
        self
    }

    pub fn insert(&mut self, reference: impl Into<String>, dem: Raster) {
        self.dems.insert(reference.into(), dem);
    }
}

impl DemSource for InMemoryDemSource {
    fn load_dem(&self, reference: &str) -> SarResult<Raster> {
        self.dems.get(reference).cloned().ok_or_else(|| {
            SarError::Computation(format!("DEM {} is not available", reference))
        })
    }
}

/// Wraps another source so each reference is read at most once
pub struct CachedDemSource<S: DemSource> {
    inner: S,
    cache: Mutex<HashMap<String, Raster>>,
}

impl<S: DemSource> CachedDemSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn cached_references(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl<S: DemSource> DemSource for CachedDemSource<S> {
    fn load_dem(&self, reference: &str) -> SarResult<Raster> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| SarError::Computation("DEM cache lock poisoned".to_string()))?;
        if let Some(dem) = cache.get(reference) {
            log::debug!("DEM {} served from cache", reference);
            return Ok(dem.clone());
        }
        log::info!("Loading DEM {}", reference);
        let dem = self.inner.load_dem(reference)?;
        cache.insert(reference.to_string(), dem.clone());
        Ok(dem)
    }
}

/// DEM resampling and terrain derivatives
pub struct DemReader;

impl DemReader {
    /// Resample DEM to the target grid with bilinear interpolation at pixel centres.
    ///
    /// Target pixels whose centre falls outside the DEM extent are NaN; within half a DEM
    /// pixel of the border the nearest edge sample is used.
    pub fn resample_dem(
        dem: &Array2<f32>,
        source_transform: &GeoTransform,
        target_transform: &GeoTransform,
        target_shape: (usize, usize),
    ) -> SarResult<Array2<f32>> {
        log::debug!("Resampling DEM {:?} to target shape {:?}", dem.dim(), target_shape);

        let (source_height, source_width) = dem.dim();
        if source_height == 0 || source_width == 0 {
            return Err(SarError::DataShape("DEM raster is empty".to_string()));
        }
        let max_row = (source_height - 1) as f64;
        let max_col = (source_width - 1) as f64;

        let resampled = Array2::from_shape_fn(target_shape, |(i, j)| {
            let (x, y) = target_transform.pixel_center(i, j);
            let (row, col) = source_transform.world_to_pixel(x, y);
            if row < -0.5 || col < -0.5 || row > max_row + 0.5 || col > max_col + 0.5 {
                return f32::NAN;
            }
            let row = row.clamp(0.0, max_row);
            let col = col.clamp(0.0, max_col);

            let y1 = row.floor() as usize;
            let x1 = col.floor() as usize;
            let y2 = (y1 + 1).min(source_height - 1);
            let x2 = (x1 + 1).min(source_width - 1);
            let dy = row - y1 as f64;
            let dx = col - x1 as f64;

            let v11 = dem[[y1, x1]] as f64;
            let v12 = dem[[y2, x1]] as f64;
            let v21 = dem[[y1, x2]] as f64;
            let v22 = dem[[y2, x2]] as f64;

            (v11 * (1.0 - dx) * (1.0 - dy)
                + v21 * dx * (1.0 - dy)
                + v12 * (1.0 - dx) * dy
                + v22 * dx * dy) as f32
        });

        Ok(resampled)
    }

    /// Slope and aspect (radians) with Horn's 3x3 gradient.
    ///
    /// `spacing` is the signed ground distance in metres of one column step (east positive)
    /// and one row step (north positive). Aspect is the downslope direction, clockwise from
    /// north in [0, 2π). Neighbours outside the raster are clamped to the edge.
    pub fn calculate_slope_aspect(
        dem: &Array2<f32>,
        spacing: (f64, f64),
    ) -> SarResult<(Array2<f32>, Array2<f32>)> {
        let (dx, dy) = spacing;
        if dx == 0.0 || dy == 0.0 || !dx.is_finite() || !dy.is_finite() {
            return Err(SarError::DataShape(format!(
                "Invalid pixel spacing for slope computation: {:?}",
                spacing
            )));
        }
        let (rows, cols) = dem.dim();
        let mut slope = Array2::<f32>::zeros((rows, cols));
        let mut aspect = Array2::<f32>::zeros((rows, cols));

        let at = |r: isize, c: isize| -> f64 {
            let r = r.clamp(0, rows as isize - 1) as usize;
            let c = c.clamp(0, cols as isize - 1) as usize;
            dem[[r, c]] as f64
        };

        for i in 0..rows as isize {
            for j in 0..cols as isize {
                let (a, b, c) = (at(i - 1, j - 1), at(i - 1, j), at(i - 1, j + 1));
                let (d, f) = (at(i, j - 1), at(i, j + 1));
                let (g, h, k) = (at(i + 1, j - 1), at(i + 1, j), at(i + 1, j + 1));

                let dz_dcol = ((c + 2.0 * f + k) - (a + 2.0 * d + g)) / (8.0 * dx);
                let dz_drow = ((g + 2.0 * h + k) - (a + 2.0 * b + c)) / (8.0 * dy);

                let s = (dz_dcol * dz_dcol + dz_drow * dz_drow).sqrt().atan();
                let mut asp = (-dz_dcol).atan2(-dz_drow);
                if asp < 0.0 {
                    asp += 2.0 * std::f64::consts::PI;
                }
                let (iu, ju) = (i as usize, j as usize);
                slope[[iu, ju]] = s as f32;
                aspect[[iu, ju]] = if s > 0.0 { asp as f32 } else { 0.0 };
                if !s.is_finite() {
                    aspect[[iu, ju]] = f32::NAN;
                }
            }
        }

        Ok((slope, aspect))
    }
}
