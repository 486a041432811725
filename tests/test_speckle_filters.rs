mod common;

use approx::assert_relative_eq;
use common::*;
use ndarray::Array2;
use s1ard::core::speckle_filter::{
    apply_speckle_filter, FilterConfig, SpeckleFilter, SpeckleFilterType,
};
use s1ard::{ImageCollection, SarError};

fn assert_same_layout(input: &ImageCollection, output: &ImageCollection) {
    assert_eq!(input.len(), output.len());
    for (a, b) in input.iter().zip(output.iter()) {
        assert_eq!(a.id(), b.id());
        assert_eq!(a.band_names(), b.band_names());
        assert_eq!(a.metadata(), b.metadata());
        for band in b.bands() {
            assert_eq!(band.dim(), SHAPE);
        }
    }
}

#[test]
fn test_every_kernel_preserves_bands_and_count() {
    init_logging();
    let collection = s1_collection(4);
    for kernel in SpeckleFilterType::ALL {
        for config in [FilterConfig::mono(kernel, 5), FilterConfig::multi(kernel, 5, 3)] {
            let output = apply_speckle_filter(&collection, &config).unwrap();
            assert_same_layout(&collection, &output);
        }
    }
}

#[test]
fn test_angle_band_carried_through_untouched() {
    let collection = s1_collection(3);
    let config = FilterConfig::mono(SpeckleFilterType::Lee, 7);
    let output = apply_speckle_filter(&collection, &config).unwrap();
    for (a, b) in collection.iter().zip(output.iter()) {
        assert!(b.band("angle").unwrap().shares_data(a.band("angle").unwrap()));
        assert!(!b.band("VV").unwrap().shares_data(a.band("VV").unwrap()));
    }
}

#[test]
fn test_boxcar_on_constant_collection() {
    let records = (0..3)
        .map(|k| {
            record(
                k,
                vec![
                    raster("VV", Array2::from_elem(SHAPE, 0.25)),
                    raster("VH", Array2::from_elem(SHAPE, 0.0625)),
                ],
            )
        })
        .collect();
    let collection = ImageCollection::new(records).unwrap();
    for config in [
        FilterConfig::mono(SpeckleFilterType::Boxcar, 13),
        FilterConfig::multi(SpeckleFilterType::Boxcar, 13, 3),
    ] {
        let output = apply_speckle_filter(&collection, &config).unwrap();
        for (a, b) in collection.iter().zip(output.iter()) {
            assert_eq!(a.band("VV").unwrap().data(), b.band("VV").unwrap().data());
            assert_eq!(a.band("VH").unwrap().data(), b.band("VH").unwrap().data());
        }
    }
}

#[test]
fn test_single_image_stack_equals_mono_filter() {
    let collection = s1_collection(5);
    for kernel in SpeckleFilterType::ALL {
        let mono = apply_speckle_filter(&collection, &FilterConfig::mono(kernel, 7)).unwrap();
        let multi = apply_speckle_filter(&collection, &FilterConfig::multi(kernel, 7, 1)).unwrap();
        for (a, b) in mono.iter().zip(multi.iter()) {
            for band in ["VV", "VH"] {
                assert_eq!(
                    a.band(band).unwrap().data(),
                    b.band(band).unwrap().data(),
                    "{} {}",
                    kernel,
                    band
                );
            }
        }
    }
}

#[test]
fn test_one_image_collection_multi_equals_mono() {
    let collection = s1_collection(1);
    let kernel = SpeckleFilterType::GammaMap;
    let mono = apply_speckle_filter(&collection, &FilterConfig::mono(kernel, 7)).unwrap();
    let multi = apply_speckle_filter(&collection, &FilterConfig::multi(kernel, 7, 10)).unwrap();
    assert_eq!(
        mono.get(0).unwrap().band("VV").unwrap().data(),
        multi.get(0).unwrap().band("VV").unwrap().data()
    );
}

#[test]
fn test_temporally_stable_scene_is_preserved_by_multi_boxcar() {
    let pattern = speckle_pattern(SHAPE, 0.1, 42);
    let records = (0..5).map(|k| record(k, vec![raster("VV", pattern.clone())])).collect();
    let collection = ImageCollection::new(records).unwrap();
    let config = FilterConfig::multi(SpeckleFilterType::Boxcar, 5, 3);
    let output = apply_speckle_filter(&collection, &config).unwrap();
    for r in output.iter() {
        for (&a, &b) in r.band("VV").unwrap().data().iter().zip(pattern.iter()) {
            assert_relative_eq!(a, b, max_relative = 1e-5);
        }
    }
}

#[test]
fn test_multi_temporal_reduces_variance() {
    let collection = s1_collection(6);
    let config = FilterConfig::multi(SpeckleFilterType::Lee, 7, 5);
    let output = apply_speckle_filter(&collection, &config).unwrap();
    let enl = |c: &ImageCollection| {
        SpeckleFilter::estimate_number_of_looks(c.get(3).unwrap().band("VV").unwrap().data())
            .unwrap()
    };
    let (enl_in, enl_out) = (enl(&collection), enl(&output));
    assert!(enl_out > enl_in, "ENL {} -> {}", enl_in, enl_out);
}

#[test]
fn test_refined_lee_preserves_step_edge_better_than_lee() {
    let truth = Array2::from_shape_fn(SHAPE, |(_, j)| if j < 12 { 0.05f32 } else { 0.4 });
    let collection =
        ImageCollection::new(vec![record(0, vec![raster("VV", truth.clone())])]).unwrap();

    let deviation = |kernel: SpeckleFilterType| -> f32 {
        let output = apply_speckle_filter(&collection, &FilterConfig::mono(kernel, 7)).unwrap();
        let vv = output.get(0).unwrap().band("VV").unwrap().data().clone();
        let mut total = 0.0;
        for i in 0..SHAPE.0 {
            for j in 8..16 {
                total += (vv[[i, j]] - truth[[i, j]]).abs();
            }
        }
        total
    };
    assert!(deviation(SpeckleFilterType::RefinedLee) < deviation(SpeckleFilterType::Lee));
}

#[test]
fn test_missing_polarization_is_soft_skip() {
    init_logging();
    let records = (0..2)
        .map(|k| {
            record(
                k,
                vec![
                    raster("HH", speckle_pattern(SHAPE, 0.2, k)),
                    raster("angle", angle_band(SHAPE)),
                ],
            )
        })
        .collect();
    let collection = ImageCollection::new(records).unwrap();
    let config = FilterConfig::mono(SpeckleFilterType::Lee, 7);
    let output = apply_speckle_filter(&collection, &config).unwrap();
    assert_eq!(output.len(), 2);
    for (a, b) in collection.iter().zip(output.iter()) {
        assert!(b.band("HH").unwrap().shares_data(a.band("HH").unwrap()));
    }
}

#[test]
fn test_invalid_config_fails_before_filtering() {
    let collection = s1_collection(2);
    let mut config = FilterConfig::mono(SpeckleFilterType::Lee, 0);
    assert!(matches!(apply_speckle_filter(&collection, &config), Err(SarError::Validation(_))));
    config.kernel_size = 6;
    assert!(matches!(apply_speckle_filter(&collection, &config), Err(SarError::Validation(_))));
    let config = FilterConfig::multi(SpeckleFilterType::Lee, 7, 0);
    assert!(matches!(apply_speckle_filter(&collection, &config), Err(SarError::Validation(_))));
    assert!(FilterConfig::parse("BAD", "LEE", 7, 1).is_err());
    assert!(FilterConfig::parse("MONO", "MEDIAN", 7, 1).is_err());
}

#[test]
fn test_masked_pixels_survive_filtering() {
    let mut vv = speckle_pattern(SHAPE, 0.1, 3);
    vv[[5, 5]] = f32::NAN;
    let collection = ImageCollection::new(vec![
        record(0, vec![raster("VV", vv.clone())]),
        record(1, vec![raster("VV", speckle_pattern(SHAPE, 0.1, 4))]),
    ])
    .unwrap();
    for config in [
        FilterConfig::mono(SpeckleFilterType::RefinedLee, 5),
        FilterConfig::multi(SpeckleFilterType::LeeSigma, 5, 2),
    ] {
        let output = apply_speckle_filter(&collection, &config).unwrap();
        let out = output.get(0).unwrap().band("VV").unwrap().data();
        assert!(out[[5, 5]].is_nan());
        assert!(out[[5, 6]].is_finite());
    }
}
