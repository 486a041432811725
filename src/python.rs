//! Python bindings: array-level access to the speckle and terrain kernels

use crate::core::speckle_filter::{SpeckleFilter, SpeckleFilterParams, SpeckleFilterType};
use crate::core::terrain_flatten::{
    TerrainConfig, TerrainFlattener, TerrainGeometry, TerrainModel,
};
use crate::types::SarError;
use numpy::{IntoPyArray, PyArray2, PyReadonlyArray2};
use pyo3::prelude::*;

fn to_py_err(e: SarError) -> PyErr {
    match e {
        SarError::Validation(_) | SarError::MissingBand { .. } => {
            PyErr::new::<pyo3::exceptions::PyValueError, _>(e.to_string())
        }
        _ => PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(e.to_string()),
    }
}

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(speckle_filter, m)?)?;
    m.add_function(wrap_pyfunction!(terrain_flatten, m)?)?;
    m.add_function(wrap_pyfunction!(estimate_enl, m)?)?;
    Ok(())
}

/// Filter one linear-power band with the named kernel
#[pyfunction]
#[pyo3(signature = (image, kernel = "BOXCAR", kernel_size = 7, enl = 5.0))]
fn speckle_filter<'py>(
    py: Python<'py>,
    image: PyReadonlyArray2<f32>,
    kernel: &str,
    kernel_size: usize,
    enl: f32,
) -> PyResult<&'py PyArray2<f32>> {
    let filter_type: SpeckleFilterType = kernel.parse().map_err(to_py_err)?;
    let params = SpeckleFilterParams {
        enl,
        ..SpeckleFilterParams::default()
    };
    let input = image.as_array().to_owned();
    let filtered = py
        .allow_threads(|| {
            SpeckleFilter::with_params(kernel_size, params).apply_filter(&input, filter_type)
        })
        .map_err(to_py_err)?;
    Ok(filtered.into_pyarray(py))
}

/// Terrain-flatten one band given incidence angle, slope and aspect (all degrees)
#[pyfunction]
#[pyo3(signature = (
    image,
    theta,
    slope,
    aspect,
    facing_azimuth,
    model = "DIRECT",
    buffer_m = 0.0,
    pixel_spacing = 10.0
))]
#[allow(clippy::too_many_arguments)]
fn terrain_flatten<'py>(
    py: Python<'py>,
    image: PyReadonlyArray2<f32>,
    theta: PyReadonlyArray2<f32>,
    slope: PyReadonlyArray2<f32>,
    aspect: PyReadonlyArray2<f32>,
    facing_azimuth: f64,
    model: &str,
    buffer_m: f64,
    pixel_spacing: f64,
) -> PyResult<&'py PyArray2<f32>> {
    let model: TerrainModel = model.parse().map_err(to_py_err)?;
    let config = TerrainConfig {
        model,
        buffer_m,
        ..TerrainConfig::default()
    };
    config.validate().map_err(to_py_err)?;

    let data = image.as_array().to_owned();
    let theta = theta.as_array().to_owned();
    let geometry = TerrainGeometry {
        slope: slope.as_array().mapv(f32::to_radians),
        aspect: aspect.as_array().mapv(f32::to_radians),
        ground_spacing: (pixel_spacing, pixel_spacing),
    };
    if geometry.dim() != data.dim() {
        return Err(to_py_err(SarError::DataShape(format!(
            "slope {:?} does not match image {:?}",
            geometry.dim(),
            data.dim()
        ))));
    }

    let flattened = py
        .allow_threads(|| {
            let flattener = TerrainFlattener::new(config);
            let incidence =
                flattener.incidence_geometry(&theta, &geometry, facing_azimuth.to_radians());
            let mask =
                flattener.layover_shadow_mask(&incidence.range_angle, geometry.ground_spacing);
            flattener.flatten_band(&data, &theta, &incidence, &mask)
        })
        .map_err(to_py_err)?;
    Ok(flattened.into_pyarray(py))
}

/// Whole-image equivalent number of looks
#[pyfunction]
fn estimate_enl(image: PyReadonlyArray2<f32>) -> PyResult<f32> {
    SpeckleFilter::estimate_number_of_looks(&image.as_array().to_owned()).map_err(to_py_err)
}
