//! Core ARD processing modules

pub mod border_noise;
pub mod compute;
pub mod multitemporal;
pub mod pipeline;
pub mod scaling;
pub mod speckle_filter;
pub mod terrain_flatten;
pub mod window_stats;

// Re-export main types
pub use border_noise::{apply_border_noise_correction, mask_edges, BorderNoiseParams};
pub use compute::{ExecutionMode, LocalCompute, RasterCompute};
pub use multitemporal::{stack_indices, MultiTemporalFilter, StackAlignment};
pub use pipeline::{get_analysis_ready_data, get_analysis_ready_data_with, ArdParams};
pub use scaling::{add_ratio_band, db_to_linear, linear_to_db, RATIO_BAND};
pub use speckle_filter::{
    apply_speckle_filter, apply_speckle_filter_with, FilterConfig, FilterFramework, SpeckleFilter,
    SpeckleFilterParams, SpeckleFilterType,
};
pub use terrain_flatten::{
    apply_terrain_flattening, apply_terrain_flattening_with, TerrainConfig, TerrainFlattener,
    IncidenceGeometry, TerrainGeometry, TerrainModel,
};
pub use window_stats::{LocalMoments, WindowStatistics};
