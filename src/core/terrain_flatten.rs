//! Radiometric terrain flattening.
//!
//! Local incidence angles come from DEM slope/aspect and the per-image viewing geometry.
//! Layover and shadow pixels (plus an optional buffer) are masked, and backscatter is
//! normalised with a DIRECT (surface) or VOLUME scattering model.

use crate::core::compute::{LocalCompute, RasterCompute};
use crate::io::dem::{DemReader, DemSource};
use crate::types::{
    ImageCollection, ImageRecord, OrbitPass, Polarization, Raster, SarError, SarResult, NO_DATA,
};
use ndarray::{Array2, Zip};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Scattering model used for the slope correction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TerrainModel {
    /// Surface scattering: x·cos θ / cos θloc
    #[default]
    Direct,
    /// Volume scattering: x·sin θ / sin(θ − αr)
    Volume,
}

impl std::fmt::Display for TerrainModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerrainModel::Direct => write!(f, "DIRECT"),
            TerrainModel::Volume => write!(f, "VOLUME"),
        }
    }
}

impl FromStr for TerrainModel {
    type Err = SarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DIRECT" => Ok(TerrainModel::Direct),
            "VOLUME" => Ok(TerrainModel::Volume),
            _ => Err(SarError::Validation(format!(
                "Terrain flattening model must be DIRECT or VOLUME, got {:?}",
                s
            ))),
        }
    }
}

impl TryFrom<String> for TerrainModel {
    type Error = SarError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TerrainModel> for String {
    fn from(m: TerrainModel) -> Self {
        m.to_string()
    }
}

/// Terrain flattening configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TerrainConfig {
    pub model: TerrainModel,
    /// DEM reference handed to the [`DemSource`]
    pub dem: String,
    /// Extra layover/shadow buffer in metres
    pub buffer_m: f64,
    /// Incidence-angle band (degrees); overrides the band named in each record's metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub angle_band: Option<String>,
    /// Local incidence angle (degrees) from which a pixel counts as shadow
    pub shadow_threshold_deg: f64,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            model: TerrainModel::Direct,
            dem: "USGS/SRTMGL1_003".to_string(),
            buffer_m: 0.0,
            angle_band: None,
            shadow_threshold_deg: 90.0,
        }
    }
}

impl TerrainConfig {
    pub fn new(model: TerrainModel, dem: impl Into<String>, buffer_m: f64) -> Self {
        Self {
            model,
            dem: dem.into(),
            buffer_m,
            ..Self::default()
        }
    }

    /// Build and validate from the textual model name
    pub fn parse(model: &str, dem: &str, buffer_m: f64) -> SarResult<Self> {
        let config = Self::new(model.parse()?, dem, buffer_m);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SarResult<()> {
        if !(self.buffer_m.is_finite() && self.buffer_m >= 0.0) {
            return Err(SarError::Validation(format!(
                "Layover/shadow buffer must be >= 0, got {}",
                self.buffer_m
            )));
        }
        if !(self.shadow_threshold_deg > 0.0 && self.shadow_threshold_deg <= 180.0) {
            return Err(SarError::Validation(format!(
                "Shadow threshold must lie in (0, 180], got {}",
                self.shadow_threshold_deg
            )));
        }
        if self.dem.trim().is_empty() {
            return Err(SarError::Validation("DEM reference is empty".to_string()));
        }
        if matches!(&self.angle_band, Some(name) if name.trim().is_empty()) {
            return Err(SarError::Validation("Angle band name is empty".to_string()));
        }
        Ok(())
    }

    /// Angle band used for `record`: the configured override, else the record's own
    pub fn angle_band_for<'a>(&'a self, record: &'a ImageRecord) -> &'a str {
        self.angle_band
            .as_deref()
            .unwrap_or(record.metadata().angle_band.as_str())
    }

    /// Every image must carry its angle band; fails hard otherwise
    pub fn check_angle_band(&self, collection: &ImageCollection) -> SarResult<()> {
        for record in collection {
            record.require_band(self.angle_band_for(record))?;
        }
        Ok(())
    }
}

/// DEM-derived terrain on the image grid, shared by every record of a collection
#[derive(Debug, Clone)]
pub struct TerrainGeometry {
    /// Terrain slope, radians
    pub slope: Array2<f32>,
    /// Downslope direction, radians clockwise from north
    pub aspect: Array2<f32>,
    /// Ground spacing (x, y) in metres
    pub ground_spacing: (f64, f64),
}

impl TerrainGeometry {
    pub fn from_dem(dem: &Raster, grid: &Raster) -> SarResult<Self> {
        if dem.coordinate_system() != grid.coordinate_system() {
            return Err(SarError::GridMismatch(format!(
                "DEM is in {:?}, images are in {:?}",
                dem.coordinate_system(),
                grid.coordinate_system()
            )));
        }
        if grid.geo_transform().is_rotated() {
            return Err(SarError::GridMismatch(
                "Rotated image grids are not supported".to_string(),
            ));
        }

        let elevation = DemReader::resample_dem(
            dem.data(),
            dem.geo_transform(),
            grid.geo_transform(),
            grid.dim(),
        )?;
        if elevation.iter().all(|v| !v.is_finite()) {
            return Err(SarError::Computation(
                "DEM does not overlap the image grid".to_string(),
            ));
        }

        let ground_spacing = grid.ground_spacing();
        let (slope, aspect) = DemReader::calculate_slope_aspect(&elevation, signed_spacing(grid))?;
        Ok(Self {
            slope,
            aspect,
            ground_spacing,
        })
    }

    /// Flat terrain on a grid of the given shape and spacing
    pub fn flat(shape: (usize, usize), ground_spacing: (f64, f64)) -> Self {
        Self {
            slope: Array2::zeros(shape),
            aspect: Array2::zeros(shape),
            ground_spacing,
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        self.slope.dim()
    }
}

/// Viewing geometry of one acquisition over the terrain
#[derive(Debug, Clone)]
pub struct IncidenceGeometry {
    /// θ − αr in degrees: incidence angle in the range plane, ≤ 0 in layover
    pub range_angle: Array2<f32>,
    /// Terrain slope along the azimuth (flight) direction αaz, degrees
    pub azimuth_slope: Array2<f32>,
}

impl IncidenceGeometry {
    /// Flat terrain seen at incidence `theta_deg`
    pub fn flat(theta_deg: &Array2<f32>) -> Self {
        Self {
            range_angle: theta_deg.clone(),
            azimuth_slope: Array2::zeros(theta_deg.dim()),
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        self.range_angle.dim()
    }

    /// Angle between line of sight and terrain normal: cos θloc = cos αaz·cos(θ − αr)
    pub fn local_incidence_angle(&self) -> Array2<f32> {
        Zip::from(&self.range_angle)
            .and(&self.azimuth_slope)
            .map_collect(|&r, &az| {
                let cos_loc = (az as f64).to_radians().cos() * (r as f64).to_radians().cos();
                cos_loc.clamp(-1.0, 1.0).acos().to_degrees() as f32
            })
    }
}

/// Column step (east positive) and row step (north positive) in metres
fn signed_spacing(grid: &Raster) -> (f64, f64) {
    let (gx, gy) = grid.ground_spacing();
    let gt = grid.geo_transform();
    (gx * gt.pixel_width.signum(), gy * gt.pixel_height.signum())
}

/// Nominal Sentinel-1 platform heading per pass, degrees from north
fn nominal_heading(pass: OrbitPass) -> f64 {
    match pass {
        OrbitPass::Ascending => -10.0,
        OrbitPass::Descending => 190.0,
    }
}

/// Terrain flattening processor
pub struct TerrainFlattener<B: RasterCompute = LocalCompute> {
    config: TerrainConfig,
    backend: B,
}

impl TerrainFlattener<LocalCompute> {
    pub fn new(config: TerrainConfig) -> Self {
        Self::with_backend(config, LocalCompute::default())
    }
}

impl<B: RasterCompute> TerrainFlattener<B> {
    pub fn with_backend(config: TerrainConfig, backend: B) -> Self {
        Self { config, backend }
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    /// Direction from the ground toward the sensor, radians clockwise from north.
    ///
    /// Taken from the platform heading (right-looking, heading − 90°) when known, else from
    /// the mean downslope direction of the angle band, else from the nominal pass heading.
    pub fn facing_azimuth(&self, record: &ImageRecord, spacing: (f64, f64)) -> SarResult<f64> {
        let metadata = record.metadata();
        if let Some(heading) = metadata.heading_deg {
            return Ok((heading - 90.0).to_radians());
        }

        let angle = record.require_band(self.config.angle_band_for(record))?;
        let (slope, aspect) = DemReader::calculate_slope_aspect(angle.data(), spacing)?;
        let (mut east, mut north) = (0.0f64, 0.0f64);
        Zip::from(&slope).and(&aspect).for_each(|&s, &a| {
            if s.is_finite() && a.is_finite() {
                let magnitude = (s as f64).tan();
                east += magnitude * (a as f64).sin();
                north += magnitude * (a as f64).cos();
            }
        });
        if east.hypot(north) > 0.0 {
            return Ok(east.atan2(north));
        }

        log::debug!(
            "Image {}: flat angle band and no heading, using nominal {:?} geometry",
            record.id(),
            metadata.orbit_pass
        );
        Ok((nominal_heading(metadata.orbit_pass) - 90.0).to_radians())
    }

    /// Split the terrain slope into its range (αr) and azimuth (αaz) components
    ///
    /// With φr = φ − aspect: αr = atan(tan α·cos φr), αaz = atan(tan α·sin φr).
    pub fn incidence_geometry(
        &self,
        theta_deg: &Array2<f32>,
        geometry: &TerrainGeometry,
        facing_azimuth: f64,
    ) -> IncidenceGeometry {
        let shape = theta_deg.dim();
        let component = |i: usize, j: usize| {
            let tan_slope = (geometry.slope[[i, j]] as f64).tan();
            let phi_r = facing_azimuth - geometry.aspect[[i, j]] as f64;
            (tan_slope * phi_r.cos(), tan_slope * phi_r.sin())
        };
        let range_angle = self.backend.generate(shape, |i, j| {
            let alpha_r = component(i, j).0.atan();
            (theta_deg[[i, j]] as f64 - alpha_r.to_degrees()) as f32
        });
        let azimuth_slope = self
            .backend
            .generate(shape, |i, j| component(i, j).1.atan().to_degrees() as f32);
        IncidenceGeometry {
            range_angle,
            azimuth_slope,
        }
    }

    /// Local incidence angle in degrees, measured from the terrain normal
    pub fn local_incidence_angle(
        &self,
        theta_deg: &Array2<f32>,
        geometry: &TerrainGeometry,
        facing_azimuth: f64,
    ) -> Array2<f32> {
        self.incidence_geometry(theta_deg, geometry, facing_azimuth)
            .local_incidence_angle()
    }

    /// Layover (θ − αr ≤ 0) and shadow (θ − αr ≥ threshold), dilated by the buffer
    pub fn layover_shadow_mask(
        &self,
        range_angle_deg: &Array2<f32>,
        ground_spacing: (f64, f64),
    ) -> Array2<bool> {
        let threshold = self.config.shadow_threshold_deg as f32;
        let mask = range_angle_deg.mapv(|v| v.is_finite() && (v <= 0.0 || v >= threshold));
        self.buffer_mask(&mask, ground_spacing)
    }

    /// Dilate `mask` to every pixel within the buffer distance (Euclidean, metres)
    pub fn buffer_mask(&self, mask: &Array2<bool>, ground_spacing: (f64, f64)) -> Array2<bool> {
        let buffer = self.config.buffer_m;
        let (gx, gy) = ground_spacing;
        if buffer <= 0.0 || !mask.iter().any(|&m| m) {
            return mask.clone();
        }

        let reach_r = (buffer / gy).floor() as isize;
        let reach_c = (buffer / gx).floor() as isize;
        let mut offsets = Vec::new();
        for dr in -reach_r..=reach_r {
            for dc in -reach_c..=reach_c {
                let (y, x) = (dr as f64 * gy, dc as f64 * gx);
                if x * x + y * y <= buffer * buffer {
                    offsets.push((dr, dc));
                }
            }
        }

        let (rows, cols) = mask.dim();
        self.backend.generate_mask(mask.dim(), |i, j| {
            offsets.iter().any(|&(dr, dc)| {
                let r = i as isize + dr;
                let c = j as isize + dc;
                r >= 0
                    && c >= 0
                    && (r as usize) < rows
                    && (c as usize) < cols
                    && mask[[r as usize, c as usize]]
            })
        })
    }

    /// Correct one backscatter band given θ, the slope components and the layover/shadow mask
    ///
    /// DIRECT divides by cos αaz·cos(θ − αr), the cosine of the normal-relative angle.
    /// VOLUME depends on the range-plane angle only.
    pub fn flatten_band(
        &self,
        data: &Array2<f32>,
        theta_deg: &Array2<f32>,
        incidence: &IncidenceGeometry,
        mask: &Array2<bool>,
    ) -> SarResult<Array2<f32>> {
        let shape = data.dim();
        if theta_deg.dim() != shape || incidence.dim() != shape || mask.dim() != shape {
            return Err(SarError::DataShape(format!(
                "Terrain inputs disagree: data {:?}, angle {:?}, incidence {:?}, mask {:?}",
                shape,
                theta_deg.dim(),
                incidence.dim(),
                mask.dim()
            )));
        }
        let model = self.config.model;
        Ok(self.backend.generate(shape, |i, j| {
            if mask[[i, j]] {
                return NO_DATA;
            }
            let theta = (theta_deg[[i, j]] as f64).to_radians();
            let range = (incidence.range_angle[[i, j]] as f64).to_radians();
            let factor = match model {
                TerrainModel::Direct => {
                    let alpha_az = (incidence.azimuth_slope[[i, j]] as f64).to_radians();
                    theta.cos() / (alpha_az.cos() * range.cos())
                }
                TerrainModel::Volume => theta.sin() / range.sin(),
            };
            (data[[i, j]] as f64 * factor) as f32
        }))
    }

    /// Flatten every polarization band of one record; other bands pass through
    pub fn flatten_record(
        &self,
        record: &ImageRecord,
        geometry: &TerrainGeometry,
    ) -> SarResult<ImageRecord> {
        let angle_band = self.config.angle_band_for(record);
        let angle = record.require_band(angle_band)?;
        if angle.dim() != geometry.dim() {
            return Err(SarError::GridMismatch(format!(
                "Image {} is {:?}, terrain geometry is {:?}",
                record.id(),
                angle.dim(),
                geometry.dim()
            )));
        }
        let phi = self.facing_azimuth(record, signed_spacing(angle))?;
        let theta = angle.data();
        let incidence = self.incidence_geometry(theta, geometry, phi);
        let mask = self.layover_shadow_mask(&incidence.range_angle, geometry.ground_spacing);
        log::debug!(
            "Image {}: facing azimuth {:.1}°, {} layover/shadow pixels",
            record.id(),
            phi.to_degrees().rem_euclid(360.0),
            mask.iter().filter(|&&m| m).count()
        );

        record.map_bands(|band| {
            let name = band.band();
            if name == angle_band || Polarization::from_band(name).is_none() {
                Ok(band.clone())
            } else {
                band.with_data(self.flatten_band(band.data(), theta, &incidence, &mask)?)
            }
        })
    }
}

/// Terrain-flatten every image of a collection
pub fn apply_terrain_flattening(
    collection: &ImageCollection,
    config: &TerrainConfig,
    dem_source: &dyn DemSource,
) -> SarResult<ImageCollection> {
    apply_terrain_flattening_with(collection, config, dem_source, LocalCompute::default())
}

/// [`apply_terrain_flattening`] on an explicit compute backend
pub fn apply_terrain_flattening_with<B: RasterCompute>(
    collection: &ImageCollection,
    config: &TerrainConfig,
    dem_source: &dyn DemSource,
    backend: B,
) -> SarResult<ImageCollection> {
    config.validate()?;
    config.check_angle_band(collection)?;

    let grid = match collection.grid() {
        Some(grid) => grid,
        None => return Ok(collection.clone()),
    };

    let dem = dem_source.load_dem(&config.dem)?;
    let geometry = TerrainGeometry::from_dem(&dem, grid)?;
    let flattener = TerrainFlattener::with_backend(config.clone(), backend);

    let records = collection
        .records()
        .par_iter()
        .map(|record| flattener.flatten_record(record, &geometry))
        .collect::<SarResult<Vec<_>>>()?;

    log::info!(
        "Terrain flattening ({}, buffer {} m) completed on {} images",
        config.model,
        config.buffer_m,
        records.len()
    );
    ImageCollection::new(records)
}
