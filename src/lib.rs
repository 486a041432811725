//! s1ard: Sentinel-1 analysis-ready backscatter
//!
//! Speckle filtering (BOXCAR, LEE, GAMMA MAP, REFINED LEE, LEE SIGMA in mono- and
//! multi-temporal frameworks) and radiometric terrain flattening (DIRECT and VOLUME
//! scattering models) for time-ordered collections of SAR backscatter rasters.

pub mod core;
pub mod io;
pub mod types;

#[cfg(feature = "python")]
mod python;

// Re-export main types and functions for easier access
pub use types::{
    AcquisitionMetadata, CoordinateSystem, GeoTransform, ImageCollection, ImageRecord, OrbitPass,
    Polarization, Raster, SarError, SarRealImage, SarResult, NO_DATA,
};

pub use crate::core::{
    apply_speckle_filter, apply_terrain_flattening, get_analysis_ready_data, ArdParams,
    FilterConfig, FilterFramework, SpeckleFilterType, TerrainConfig, TerrainModel,
};

pub use io::{CachedDemSource, DemSource, InMemoryDemSource};
