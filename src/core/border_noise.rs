//! Additional border noise removal: pixels imaged at the extreme near and far range
//! of the swath are masked using the incidence-angle band.

use crate::types::{ImageCollection, ImageRecord, SarError, SarResult, NO_DATA};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Valid incidence-angle range; pixels at or beyond either bound are masked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BorderNoiseParams {
    pub min_angle_deg: f32,
    pub max_angle_deg: f32,
    /// Overrides the angle band named in each record's metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub angle_band: Option<String>,
}

impl Default for BorderNoiseParams {
    fn default() -> Self {
        Self {
            min_angle_deg: 30.63993,
            max_angle_deg: 45.23993,
            angle_band: None,
        }
    }
}

impl BorderNoiseParams {
    pub fn validate(&self) -> SarResult<()> {
        if !(self.min_angle_deg.is_finite()
            && self.max_angle_deg.is_finite()
            && self.min_angle_deg < self.max_angle_deg)
        {
            return Err(SarError::Validation(format!(
                "Border noise angle range [{}, {}] is empty",
                self.min_angle_deg, self.max_angle_deg
            )));
        }
        if matches!(&self.angle_band, Some(name) if name.trim().is_empty()) {
            return Err(SarError::Validation("Angle band name is empty".to_string()));
        }
        Ok(())
    }

    pub fn angle_band_for<'a>(&'a self, record: &'a ImageRecord) -> &'a str {
        self.angle_band
            .as_deref()
            .unwrap_or(record.metadata().angle_band.as_str())
    }

    pub fn is_valid_angle(&self, angle: f32) -> bool {
        angle > self.min_angle_deg && angle < self.max_angle_deg
    }
}

/// Mask every band except the angle band outside the valid incidence-angle range
pub fn mask_edges(record: &ImageRecord, params: &BorderNoiseParams) -> SarResult<ImageRecord> {
    let angle_band = params.angle_band_for(record);
    let angle = record.require_band(angle_band)?.data();
    record.map_bands(|band| {
        if band.band() == angle_band {
            return Ok(band.clone());
        }
        let mut data = band.data().clone();
        data.zip_mut_with(angle, |v, &a| {
            if !params.is_valid_angle(a) {
                *v = NO_DATA;
            }
        });
        band.with_data(data)
    })
}

/// [`mask_edges`] over a whole collection
pub fn apply_border_noise_correction(
    collection: &ImageCollection,
    params: &BorderNoiseParams,
) -> SarResult<ImageCollection> {
    params.validate()?;
    let records = collection
        .records()
        .par_iter()
        .map(|record| mask_edges(record, params))
        .collect::<SarResult<Vec<_>>>()?;
    log::info!("Additional border noise correction completed on {} images", records.len());
    ImageCollection::new(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AcquisitionMetadata, CoordinateSystem, GeoTransform, OrbitPass, Raster};
    use chrono::{TimeZone, Utc};
    use ndarray::Array2;

    fn record() -> ImageRecord {
        record_with_angle_band("angle")
    }

    fn record_with_angle_band(angle_band: &str) -> ImageRecord {
        let gt = GeoTransform::north_up(0.0, 0.0, 10.0);
        let cs = CoordinateSystem::Projected { epsg: 32632 };
        let angle = Array2::from_shape_vec((1, 4), vec![30.0, 30.63993, 38.0, 45.3]).unwrap();
        ImageRecord::new(
            AcquisitionMetadata {
                image_id: "S1A_test".to_string(),
                start_time: Utc.with_ymd_and_hms(2021, 3, 11, 5, 0, 0).unwrap(),
                orbit_pass: OrbitPass::Descending,
                angle_band: angle_band.to_string(),
                heading_deg: None,
            },
            vec![
                Raster::new("VV", Array2::from_elem((1, 4), 0.1), gt, cs.clone()),
                Raster::new(angle_band, angle, gt, cs),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_mask_edges() {
        let masked = mask_edges(&record(), &BorderNoiseParams::default()).unwrap();
        let vv = masked.band("VV").unwrap().data();
        assert!(vv[[0, 0]].is_nan());
        assert!(vv[[0, 1]].is_nan());
        assert_eq!(vv[[0, 2]], 0.1);
        assert!(vv[[0, 3]].is_nan());
        assert_eq!(masked.band("angle").unwrap().data()[[0, 0]], 30.0);
    }

    #[test]
    fn test_missing_angle_band_is_hard_error() {
        let params = BorderNoiseParams {
            angle_band: Some("incidence".to_string()),
            ..BorderNoiseParams::default()
        };
        let err = mask_edges(&record(), &params).unwrap_err();
        assert!(matches!(err, SarError::MissingBand { ref band, .. } if band == "incidence"));
    }

    #[test]
    fn test_angle_band_named_by_metadata() {
        let record = record_with_angle_band("incidence");
        let masked = mask_edges(&record, &BorderNoiseParams::default()).unwrap();
        let vv = masked.band("VV").unwrap().data();
        assert!(vv[[0, 0]].is_nan());
        assert_eq!(vv[[0, 2]], 0.1);
        assert_eq!(masked.band("incidence").unwrap().data()[[0, 3]], 45.3);
    }
}
