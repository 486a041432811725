use crate::types::{ImageRecord, SarResult};

/// Band appended by [`add_ratio_band`]
pub const RATIO_BAND: &str = "VVVH_ratio";

/// Convert every band except the record's angle band from linear power to dB
pub fn linear_to_db(record: &ImageRecord) -> SarResult<ImageRecord> {
    let angle_band = record.metadata().angle_band.as_str();
    record.map_bands(|band| {
        if band.band() == angle_band {
            Ok(band.clone())
        } else {
            band.with_data(band.data().mapv(|v| 10.0 * v.log10()))
        }
    })
}

/// Convert every band except the record's angle band from dB to linear power
pub fn db_to_linear(record: &ImageRecord) -> SarResult<ImageRecord> {
    let angle_band = record.metadata().angle_band.as_str();
    record.map_bands(|band| {
        if band.band() == angle_band {
            Ok(band.clone())
        } else {
            band.with_data(band.data().mapv(|v| 10f32.powf(v / 10.0)))
        }
    })
}

/// Append the linear VV/VH ratio band
pub fn add_ratio_band(record: &ImageRecord) -> SarResult<ImageRecord> {
    let vv = record.require_band("VV")?;
    let vh = record.require_band("VH")?;
    let ratio = vv.data() / vh.data();
    record.with_band(vv.with_data(ratio)?.renamed(RATIO_BAND))
}
