mod common;

use common::*;
use s1ard::core::border_noise::BorderNoiseParams;
use s1ard::core::compute::LocalCompute;
use s1ard::core::pipeline::get_analysis_ready_data_with;
use s1ard::{
    get_analysis_ready_data, ArdParams, FilterConfig, SarError, SpeckleFilterType, TerrainConfig,
    TerrainModel,
};
use std::io::Write;

#[test]
fn test_mono_boxcar_ten_images() {
    init_logging();
    let collection = s1_collection(10);
    let filter = FilterConfig::parse("MONO", "BOXCAR", 13, 1).unwrap();
    let source = CountingDemSource::new(flat_dem());
    let output = get_analysis_ready_data(&collection, Some(&filter), None, false, &source).unwrap();

    assert_eq!(output.len(), 10);
    for (a, b) in collection.iter().zip(output.iter()) {
        assert_eq!(a.id(), b.id());
        assert_eq!(a.band_names(), b.band_names());
        for band in b.bands() {
            assert_eq!(band.dim(), SHAPE);
        }
    }
    assert_eq!(source.reads(), 0);
}

#[test]
fn test_multi_gamma_map_ten_images_with_clamped_stacks() {
    let collection = s1_collection(10);
    let filter = FilterConfig::parse("MULTI", "GAMMA MAP", 7, 3).unwrap();
    let output = get_analysis_ready_data(
        &collection,
        Some(&filter),
        None,
        false,
        &CountingDemSource::new(flat_dem()),
    )
    .unwrap();

    assert_eq!(output.len(), 10);
    for record in output.iter() {
        assert_eq!(record.band_names(), vec!["VV", "VH", "angle"]);
        assert!(record.band("VV").unwrap().data().iter().all(|v| v.is_finite() && *v > 0.0));
    }
    assert_eq!(output.get(0).unwrap().id(), collection.get(0).unwrap().id());
    assert_eq!(output.get(9).unwrap().id(), collection.get(9).unwrap().id());
}

#[test]
fn test_full_chain_in_fixed_order() {
    let collection = s1_collection(4);
    let filter = FilterConfig::mono(SpeckleFilterType::Lee, 5);
    let terrain = TerrainConfig::new(TerrainModel::Direct, DEM_REFERENCE, 0.0);
    let source = CountingDemSource::new(flat_dem());
    let output =
        get_analysis_ready_data(&collection, Some(&filter), Some(&terrain), true, &source).unwrap();

    assert_eq!(output.len(), 4);
    assert_eq!(source.reads(), 1);
    let vv = output.get(2).unwrap().band("VV").unwrap().data();
    // columns 0, 22 and 23 lie outside the valid incidence range and stay masked
    for i in 0..SHAPE.0 {
        assert!(vv[[i, 0]].is_nan());
        assert!(vv[[i, 22]].is_nan());
        assert!(vv[[i, 23]].is_nan());
        for j in 1..22 {
            assert!(vv[[i, j]].is_finite(), "pixel {},{}", i, j);
        }
    }
}

#[test]
fn test_absent_configs_skip_stages() {
    let collection = s1_collection(3);
    let source = CountingDemSource::new(flat_dem());
    let output = get_analysis_ready_data(&collection, None, None, false, &source).unwrap();
    for (a, b) in collection.iter().zip(output.iter()) {
        for band in a.bands() {
            assert!(b.band(band.band()).unwrap().shares_data(band));
        }
    }
    assert_eq!(source.reads(), 0);
}

#[test]
fn test_invalid_config_zero_reads() {
    let collection = s1_collection(3);
    let source = CountingDemSource::new(flat_dem());
    let terrain = TerrainConfig::default();

    let bad_filter = FilterConfig::mono(SpeckleFilterType::Boxcar, 0);
    let err = get_analysis_ready_data(&collection, Some(&bad_filter), Some(&terrain), true, &source)
        .unwrap_err();
    assert!(matches!(err, SarError::Validation(_)));

    let bad_terrain = TerrainConfig {
        buffer_m: -1.0,
        ..TerrainConfig::default()
    };
    let filter = FilterConfig::default();
    let err =
        get_analysis_ready_data(&collection, Some(&filter), Some(&bad_terrain), false, &source)
            .unwrap_err();
    assert!(matches!(err, SarError::Validation(_)));

    assert!(matches!(FilterConfig::parse("BAD", "LEE", 7, 1), Err(SarError::Validation(_))));
    assert!(matches!(
        TerrainConfig::parse("WRONG", DEM_REFERENCE, 0.0),
        Err(SarError::Validation(_))
    ));
    assert_eq!(source.reads(), 0);
}

#[test]
fn test_missing_angle_band_aborts_before_any_stage() {
    let collection = collection_without_angle(3);
    let source = CountingDemSource::new(flat_dem());
    let filter = FilterConfig::default();
    let terrain = TerrainConfig::default();
    let err = get_analysis_ready_data(&collection, Some(&filter), Some(&terrain), false, &source)
        .unwrap_err();
    assert!(err.to_string().contains("Band angle is missing"));
    assert_eq!(source.reads(), 0);

    // the edge mask needs the angle band too
    let err = get_analysis_ready_data(&collection, None, None, true, &source).unwrap_err();
    assert!(matches!(err, SarError::MissingBand { .. }));
}

#[test]
fn test_custom_border_noise_range() {
    let collection = s1_collection(1);
    let params = BorderNoiseParams {
        min_angle_deg: 35.0,
        max_angle_deg: 40.0,
        ..BorderNoiseParams::default()
    };
    let output = get_analysis_ready_data_with(
        &collection,
        None,
        None,
        Some(&params),
        &CountingDemSource::new(flat_dem()),
        &LocalCompute::sequential(),
    )
    .unwrap();
    let vh = output.get(0).unwrap().band("VH").unwrap().data();
    // angle 30.0 + 0.7·j: columns 8..=14 lie strictly inside (35, 40)
    let valid: Vec<usize> = (0..SHAPE.1).filter(|&j| vh[[0, j]].is_finite()).collect();
    assert_eq!(valid, (8..15).collect::<Vec<_>>());
}

#[test]
fn test_params_file_round_trip() {
    let collection = s1_collection(5);
    let params = ArdParams {
        apply_border_noise_correction: true,
        speckle_filter: Some(FilterConfig::multi(SpeckleFilterType::RefinedLee, 7, 3)),
        terrain_flattening: Some(TerrainConfig::new(TerrainModel::Volume, DEM_REFERENCE, 10.0)),
        ..ArdParams::default()
    };

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(params.to_json_string().unwrap().as_bytes()).unwrap();
    let loaded = ArdParams::from_file(file.path()).unwrap();
    assert_eq!(loaded, params);

    let source = CountingDemSource::new(flat_dem());
    let output = loaded.run(&collection, &source).unwrap();
    assert_eq!(output.len(), 5);
    assert_eq!(source.reads(), 1);
}

#[test]
fn test_params_file_rejects_unknown_key() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"speckle_filter": {{"kernel": "LEE", "kernal_size": 7}}, "terrain_flattening": null}}"#
    )
    .unwrap();
    assert!(matches!(ArdParams::from_file(file.path()), Err(SarError::Validation(_))));

    let missing = ArdParams::from_file("/nonexistent/ard_params.json");
    assert!(matches!(missing, Err(SarError::Io(_))));
}
