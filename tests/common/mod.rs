//! Synthetic Sentinel-1 collections shared by the integration tests
#![allow(dead_code)]

use chrono::{Duration, TimeZone, Utc};
use ndarray::Array2;
use s1ard::{
    AcquisitionMetadata, CoordinateSystem, DemSource, GeoTransform, ImageCollection, ImageRecord,
    OrbitPass, Raster, SarResult,
};
use std::sync::atomic::{AtomicUsize, Ordering};

pub const SHAPE: (usize, usize) = (20, 24);
pub const PIXEL_SIZE: f64 = 10.0;
pub const DEM_REFERENCE: &str = "USGS/SRTMGL1_003";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn geo_transform() -> GeoTransform {
    GeoTransform::north_up(500_000.0, 4_000_000.0, PIXEL_SIZE)
}

pub fn crs() -> CoordinateSystem {
    CoordinateSystem::Projected { epsg: 32631 }
}

pub fn raster(band: &str, data: Array2<f32>) -> Raster {
    Raster::new(band, data, geo_transform(), crs())
}

/// Deterministic speckle-like multiplicative pattern with mean close to `base`
pub fn speckle_pattern(shape: (usize, usize), base: f32, seed: usize) -> Array2<f32> {
    Array2::from_shape_fn(shape, |(i, j)| {
        let mut h = (i.wrapping_mul(73_856_093))
            ^ (j.wrapping_mul(19_349_663))
            ^ (seed.wrapping_mul(83_492_791));
        h = h.wrapping_mul(2_654_435_761) >> 7;
        let u = (h % 1000) as f32 / 999.0;
        base * (0.25 + 1.5 * u)
    })
}

/// Incidence angle growing eastward from 30.0° by 0.7° per column
pub fn angle_band(shape: (usize, usize)) -> Array2<f32> {
    Array2::from_shape_fn(shape, |(_, j)| 30.0 + 0.7 * j as f32)
}

pub fn metadata(index: usize, heading_deg: Option<f64>) -> AcquisitionMetadata {
    AcquisitionMetadata {
        image_id: format!("S1A_IW_GRDH_{:03}", index),
        start_time: Utc.with_ymd_and_hms(2021, 1, 1, 5, 30, 0).unwrap()
            + Duration::days(12 * index as i64),
        orbit_pass: OrbitPass::Ascending,
        angle_band: "angle".to_string(),
        heading_deg,
    }
}

pub fn record(index: usize, bands: Vec<Raster>) -> ImageRecord {
    ImageRecord::new(metadata(index, Some(-10.0)), bands).unwrap()
}

/// VV, VH and angle bands for `n` acquisitions
pub fn s1_collection(n: usize) -> ImageCollection {
    let records = (0..n)
        .map(|k| {
            record(
                k,
                vec![
                    raster("VV", speckle_pattern(SHAPE, 0.12, 2 * k)),
                    raster("VH", speckle_pattern(SHAPE, 0.03, 2 * k + 1)),
                    raster("angle", angle_band(SHAPE)),
                ],
            )
        })
        .collect();
    ImageCollection::new(records).unwrap()
}

/// Collection without the angle band
pub fn collection_without_angle(n: usize) -> ImageCollection {
    let records = (0..n)
        .map(|k| record(k, vec![raster("VV", speckle_pattern(SHAPE, 0.12, k))]))
        .collect();
    ImageCollection::new(records).unwrap()
}

pub fn flat_dem() -> Raster {
    raster("elevation", Array2::from_elem(SHAPE, 120.0))
}

/// DEM on the image grid whose elevation is `f(col)` in every row
pub fn dem_by_column<F: Fn(usize) -> f32>(f: F) -> Raster {
    raster("elevation", Array2::from_shape_fn(SHAPE, |(_, j)| f(j)))
}

/// DEM on the image grid whose elevation is `f(row)` in every column
pub fn dem_by_row<F: Fn(usize) -> f32>(f: F) -> Raster {
    raster("elevation", Array2::from_shape_fn(SHAPE, |(i, _)| f(i)))
}

/// DEM source that serves one raster and counts reads
pub struct CountingDemSource {
    dem: Raster,
    reads: AtomicUsize,
}

impl CountingDemSource {
    pub fn new(dem: Raster) -> Self {
        Self {
            dem,
            reads: AtomicUsize::new(0),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl DemSource for CountingDemSource {
    fn load_dem(&self, _reference: &str) -> SarResult<Raster> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.dem.clone())
    }
}
