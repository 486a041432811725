//! Analysis-ready data pipeline: border noise mask, speckle filter, terrain flattening.
//!
//! Stages run in that fixed order. A stage whose configuration is absent is skipped,
//! never run with defaults. Every configuration is validated before the first raster or
//! DEM read.

use crate::core::border_noise::{apply_border_noise_correction, BorderNoiseParams};
use crate::core::compute::{LocalCompute, RasterCompute};
use crate::core::speckle_filter::{apply_speckle_filter_with, FilterConfig};
use crate::core::terrain_flatten::{apply_terrain_flattening_with, TerrainConfig};
use crate::io::dem::DemSource;
use crate::types::{ImageCollection, SarError, SarResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete parameter set of one ARD run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArdParams {
    pub apply_border_noise_correction: bool,
    pub border_noise: BorderNoiseParams,
    pub speckle_filter: Option<FilterConfig>,
    pub terrain_flattening: Option<TerrainConfig>,
}

impl ArdParams {
    pub fn from_json_str(json: &str) -> SarResult<Self> {
        let params: Self = serde_json::from_str(json).map_err(|e| match e.classify() {
            serde_json::error::Category::Data => SarError::Validation(e.to_string()),
            _ => SarError::Config(e),
        })?;
        params.validate()?;
        Ok(params)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> SarResult<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        log::debug!("Loaded ARD parameters from {}", path.as_ref().display());
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> SarResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> SarResult<()> {
        if self.apply_border_noise_correction {
            self.border_noise.validate()?;
        }
        if let Some(filter) = &self.speckle_filter {
            filter.validate()?;
        }
        if let Some(terrain) = &self.terrain_flattening {
            terrain.validate()?;
        }
        Ok(())
    }

    pub fn run(
        &self,
        collection: &ImageCollection,
        dem_source: &dyn DemSource,
    ) -> SarResult<ImageCollection> {
        get_analysis_ready_data_with(
            collection,
            self.speckle_filter.as_ref(),
            self.terrain_flattening.as_ref(),
            self.apply_border_noise_correction.then_some(&self.border_noise),
            dem_source,
            &LocalCompute::default(),
        )
    }
}

/// Run the ARD stages over a collection with default border-noise thresholds
pub fn get_analysis_ready_data(
    collection: &ImageCollection,
    filter: Option<&FilterConfig>,
    terrain: Option<&TerrainConfig>,
    apply_edge_mask: bool,
    dem_source: &dyn DemSource,
) -> SarResult<ImageCollection> {
    let border_noise = BorderNoiseParams::default();
    get_analysis_ready_data_with(
        collection,
        filter,
        terrain,
        apply_edge_mask.then_some(&border_noise),
        dem_source,
        &LocalCompute::default(),
    )
}

/// [`get_analysis_ready_data`] with explicit border-noise parameters and compute backend
pub fn get_analysis_ready_data_with<B: RasterCompute>(
    collection: &ImageCollection,
    filter: Option<&FilterConfig>,
    terrain: Option<&TerrainConfig>,
    edge_mask: Option<&BorderNoiseParams>,
    dem_source: &dyn DemSource,
    backend: &B,
) -> SarResult<ImageCollection> {
    if let Some(params) = edge_mask {
        params.validate()?;
        for record in collection {
            record.require_band(params.angle_band_for(record))?;
        }
    }
    if let Some(config) = filter {
        config.validate()?;
    }
    if let Some(config) = terrain {
        config.validate()?;
        config.check_angle_band(collection)?;
    }

    log::info!(
        "Preparing analysis-ready data for {} images (edge mask: {}, speckle: {}, terrain: {})",
        collection.len(),
        edge_mask.is_some(),
        filter.map_or("skipped".to_string(), |f| format!("{} {}", f.framework, f.kernel)),
        terrain.map_or("skipped".to_string(), |t| t.model.to_string())
    );

    let mut current = match edge_mask {
        Some(params) => apply_border_noise_correction(collection, params)?,
        None => collection.clone(),
    };
    if let Some(config) = filter {
        current = apply_speckle_filter_with(&current, config, backend)?;
    }
    if let Some(config) = terrain {
        current = apply_terrain_flattening_with(&current, config, dem_source, backend)?;
    }

    Ok(current)
}
