use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;

/// Real-valued backscatter sample (linear power, not dB)
pub type SarReal = f32;

/// 2D real SAR data array (rows x cols)
pub type SarRealImage = Array2<SarReal>;

/// No-data sentinel written into masked pixels
pub const NO_DATA: SarReal = f32::NAN;

const METERS_PER_DEGREE: f64 = 111_320.0;

/// Coordinate system enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinateSystem {
    /// Radar coordinates (range, azimuth), spacing in meters
    Radar,
    /// Geographic coordinates (latitude, longitude), spacing in degrees
    Geographic,
    /// Projected coordinates (e.g., UTM), spacing in meters
    Projected { epsg: u32 },
}

/// Polarization channels carried as backscatter bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Polarization {
    VV,
    VH,
    HV,
    HH,
}

impl Polarization {
    /// Band name -> polarization, if the band is a backscatter channel
    pub fn from_band(name: &str) -> Option<Self> {
        name.parse().ok()
    }

    /// Speckle kernels are only defined for the Sentinel-1 dual-pol channels
    pub fn is_speckle_filtered(self) -> bool {
        matches!(self, Polarization::VV | Polarization::VH)
    }
}

impl std::fmt::Display for Polarization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Polarization::VV => write!(f, "VV"),
            Polarization::VH => write!(f, "VH"),
            Polarization::HV => write!(f, "HV"),
            Polarization::HH => write!(f, "HH"),
        }
    }
}

impl FromStr for Polarization {
    type Err = SarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "VV" => Ok(Polarization::VV),
            "VH" => Ok(Polarization::VH),
            "HV" => Ok(Polarization::HV),
            "HH" => Ok(Polarization::HH),
            _ => Err(SarError::Validation(format!("Invalid polarization: {}", s))),
        }
    }
}

/// Orbit pass direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrbitPass {
    Ascending,
    Descending,
}

/// Geospatial transformation parameters (GDAL ordering)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// North-up transform with square pixels
    pub fn north_up(top_left_x: f64, top_left_y: f64, pixel_size: f64) -> Self {
        Self {
            top_left_x,
            pixel_width: pixel_size,
            rotation_x: 0.0,
            top_left_y,
            rotation_y: 0.0,
            pixel_height: -pixel_size,
        }
    }

    pub fn is_rotated(&self) -> bool {
        self.rotation_x != 0.0 || self.rotation_y != 0.0
    }

    /// World coordinates of a pixel centre
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        let c = col as f64 + 0.5;
        let r = row as f64 + 0.5;
        (
            self.top_left_x + c * self.pixel_width + r * self.rotation_x,
            self.top_left_y + c * self.rotation_y + r * self.pixel_height,
        )
    }

    /// Fractional (row, col) whose pixel centre lies at (x, y). Rotation terms are ignored.
    pub fn world_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let col = (x - self.top_left_x) / self.pixel_width - 0.5;
        let row = (y - self.top_left_y) / self.pixel_height - 0.5;
        (row, col)
    }
}

/// Immutable band raster: samples, georeference and band label.
///
/// Samples sit behind an `Arc`, so cloning a raster or carrying an untouched band into a
/// new record never copies pixel data.
#[derive(Debug, Clone)]
pub struct Raster {
    band: String,
    data: Arc<SarRealImage>,
    geo_transform: GeoTransform,
    coordinate_system: CoordinateSystem,
}

impl Raster {
    pub fn new(
        band: impl Into<String>,
        data: SarRealImage,
        geo_transform: GeoTransform,
        coordinate_system: CoordinateSystem,
    ) -> Self {
        Self {
            band: band.into(),
            data: Arc::new(data),
            geo_transform,
            coordinate_system,
        }
    }

    pub fn band(&self) -> &str {
        &self.band
    }

    pub fn data(&self) -> &SarRealImage {
        &self.data
    }

    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn geo_transform(&self) -> &GeoTransform {
        &self.geo_transform
    }

    pub fn coordinate_system(&self) -> &CoordinateSystem {
        &self.coordinate_system
    }

    /// New raster on the same grid and band label holding `data`
    pub fn with_data(&self, data: SarRealImage) -> SarResult<Self> {
        if data.dim() != self.dim() {
            return Err(SarError::DataShape(format!(
                "Band {} is {:?}, replacement data is {:?}",
                self.band,
                self.dim(),
                data.dim()
            )));
        }
        Ok(Self {
            band: self.band.clone(),
            data: Arc::new(data),
            geo_transform: self.geo_transform,
            coordinate_system: self.coordinate_system.clone(),
        })
    }

    /// Same samples under another band label
    pub fn renamed(&self, band: impl Into<String>) -> Self {
        Self {
            band: band.into(),
            ..self.clone()
        }
    }

    /// Identical dimensions, geotransform and coordinate system
    pub fn same_grid(&self, other: &Raster) -> bool {
        self.dim() == other.dim()
            && self.geo_transform == other.geo_transform
            && self.coordinate_system == other.coordinate_system
    }

    /// True when both rasters hold the very same sample buffer
    pub fn shares_data(&self, other: &Raster) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Absolute ground spacing (x, y) in meters
    pub fn ground_spacing(&self) -> (f64, f64) {
        let gt = &self.geo_transform;
        match self.coordinate_system {
            CoordinateSystem::Geographic => {
                let (rows, _) = self.dim();
                let lat_center = gt.top_left_y + gt.pixel_height * rows as f64 / 2.0;
                (
                    gt.pixel_width.abs() * METERS_PER_DEGREE * lat_center.to_radians().cos(),
                    gt.pixel_height.abs() * METERS_PER_DEGREE,
                )
            }
            _ => (gt.pixel_width.abs(), gt.pixel_height.abs()),
        }
    }
}

/// Per-acquisition metadata carried through every stage untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionMetadata {
    pub image_id: String,
    pub start_time: DateTime<Utc>,
    pub orbit_pass: OrbitPass,
    /// Name of the incidence-angle band (degrees); stages read it unless configured otherwise
    pub angle_band: String,
    /// Platform heading, degrees clockwise from north, if known
    pub heading_deg: Option<f64>,
}

/// One acquisition: named band rasters on one shared grid plus metadata
#[derive(Debug, Clone)]
pub struct ImageRecord {
    metadata: AcquisitionMetadata,
    bands: Vec<Raster>,
}

impl ImageRecord {
    pub fn new(metadata: AcquisitionMetadata, bands: Vec<Raster>) -> SarResult<Self> {
        let mut seen = BTreeSet::new();
        for band in &bands {
            if !seen.insert(band.band()) {
                return Err(SarError::DataShape(format!(
                    "Image {} carries band {} twice",
                    metadata.image_id,
                    band.band()
                )));
            }
        }
        if let Some(reference) = bands.first() {
            if let Some(odd) = bands.iter().find(|b| !b.same_grid(reference)) {
                return Err(SarError::DataShape(format!(
                    "Image {}: band {} {:?} does not share the grid of band {} {:?}",
                    metadata.image_id,
                    odd.band(),
                    odd.dim(),
                    reference.band(),
                    reference.dim()
                )));
            }
        }
        Ok(Self { metadata, bands })
    }

    pub fn metadata(&self) -> &AcquisitionMetadata {
        &self.metadata
    }

    pub fn id(&self) -> &str {
        &self.metadata.image_id
    }

    pub fn bands(&self) -> &[Raster] {
        &self.bands
    }

    pub fn band(&self, name: &str) -> Option<&Raster> {
        self.bands.iter().find(|b| b.band() == name)
    }

    pub fn has_band(&self, name: &str) -> bool {
        self.band(name).is_some()
    }

    pub fn band_names(&self) -> Vec<&str> {
        self.bands.iter().map(|b| b.band()).collect()
    }

    /// Band lookup that fails hard when the band is absent
    pub fn require_band(&self, name: &str) -> SarResult<&Raster> {
        self.band(name).ok_or_else(|| SarError::MissingBand {
            band: name.to_string(),
            image: self.metadata.image_id.clone(),
        })
    }

    /// Grid reference of the record (its first band)
    pub fn grid(&self) -> Option<&Raster> {
        self.bands.first()
    }

    /// New record with `raster` replacing the band of the same name (or appended)
    pub fn with_band(&self, raster: Raster) -> SarResult<Self> {
        if let Some(reference) = self.grid() {
            if !raster.same_grid(reference) {
                return Err(SarError::DataShape(format!(
                    "Band {} does not share the grid of image {}",
                    raster.band(),
                    self.id()
                )));
            }
        }
        let mut bands = self.bands.clone();
        match bands.iter_mut().find(|b| b.band() == raster.band()) {
            Some(slot) => *slot = raster,
            None => bands.push(raster),
        }
        Ok(Self {
            metadata: self.metadata.clone(),
            bands,
        })
    }

    /// New record with every band passed through `f`; band order and metadata are kept
    pub fn map_bands<F>(&self, mut f: F) -> SarResult<Self>
    where
        F: FnMut(&Raster) -> SarResult<Raster>,
    {
        let bands = self.bands.iter().map(&mut f).collect::<SarResult<Vec<_>>>()?;
        Self::new(self.metadata.clone(), bands)
    }
}

/// Temporally ordered records sharing one grid geometry
#[derive(Debug, Clone, Default)]
pub struct ImageCollection {
    records: Vec<ImageRecord>,
}

impl ImageCollection {
    pub fn new(mut records: Vec<ImageRecord>) -> SarResult<Self> {
        records.sort_by_key(|r| r.metadata.start_time);
        let reference = records.iter().find_map(|r| r.grid());
        if let Some(reference) = reference {
            for record in &records {
                if let Some(grid) = record.grid() {
                    if !grid.same_grid(reference) {
                        return Err(SarError::GridMismatch(format!(
                            "Image {} grid {:?} differs from collection grid {:?}",
                            record.id(),
                            grid.dim(),
                            reference.dim()
                        )));
                    }
                }
            }
        }
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ImageRecord> {
        self.records.iter()
    }

    pub fn get(&self, index: usize) -> Option<&ImageRecord> {
        self.records.get(index)
    }

    pub fn into_records(self) -> Vec<ImageRecord> {
        self.records
    }

    /// Union of band names over all records
    pub fn band_names(&self) -> BTreeSet<&str> {
        self.records.iter().flat_map(|r| r.band_names()).collect()
    }

    /// Grid reference shared by the whole collection
    pub fn grid(&self) -> Option<&Raster> {
        self.records.iter().find_map(|r| r.grid())
    }
}

impl<'a> IntoIterator for &'a ImageCollection {
    type Item = &'a ImageRecord;
    type IntoIter = std::slice::Iter<'a, ImageRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Error types for ARD processing
#[derive(Debug, thiserror::Error)]
pub enum SarError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Validation(String),

    #[error("Filters only apply to VV and VH bands; available bands: {available}")]
    MissingPolarization { available: String },

    #[error("Band {band} is missing from image {image}")]
    MissingBand { band: String, image: String },

    #[error("Invalid data shape: {0}")]
    DataShape(String),

    #[error("Grid mismatch: {0}")]
    GridMismatch(String),

    #[error("Computation error: {0}")]
    Computation(String),

    #[error("Configuration parsing error: {0}")]
    Config(#[from] serde_json::Error),
}

impl SarError {
    /// Soft errors downgrade a stage to a pass-through instead of aborting
    pub fn is_soft(&self) -> bool {
        matches!(self, SarError::MissingPolarization { .. })
    }
}

/// Result type for SAR operations
pub type SarResult<T> = Result<T, SarError>;
