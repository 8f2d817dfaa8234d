//! Light-curve table schema
//!
//! Column layout follows the TESS FFI light-curve product: observation time
//! in double precision, simple-aperture flux and background in single
//! precision, and a 32-bit quality bitmask.

use arrow_schema::{DataType, Field, Schema, SchemaRef};
use std::sync::Arc;

/// Standard column names
pub const TIME_FIELD: &str = "TIME";
pub const SAP_FLUX_FIELD: &str = "SAP_FLUX";
pub const SAP_BKG_FIELD: &str = "SAP_BKG";
pub const QUALITY_FIELD: &str = "QUALITY";

/// Header keys, in the order they are written
pub const HEADER_TELESCOPE: &str = "TELESCOP";
pub const HEADER_CAMERA: &str = "CAMERA";
pub const HEADER_SECTOR: &str = "SECTOR";
pub const HEADER_CCD: &str = "CCD";
pub const HEADER_OBJECT: &str = "OBJECT";
pub const HEADER_COORDINATE_SYSTEM: &str = "RADESYS";
pub const HEADER_APERTURE_RADIUS: &str = "AP_RAD";
pub const HEADER_CUTOUT_WIDTH: &str = "SKYWIDTH";
pub const HEADER_DATE: &str = "DATE";
pub const HEADER_RA: &str = "RA_OBJ";
pub const HEADER_DEC: &str = "DEC_OBJ";
pub const HEADER_APERTURE_X: &str = "APCEN_X";
pub const HEADER_APERTURE_Y: &str = "APCEN_Y";

/// Number of scalar fields in one fragment
pub const FRAGMENT_FIELD_COUNT: usize = 8;

/// Arrow schema of the published table
pub fn light_curve_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(TIME_FIELD, DataType::Float64, false),
        Field::new(SAP_FLUX_FIELD, DataType::Float32, false),
        Field::new(SAP_BKG_FIELD, DataType::Float32, false),
        Field::new(QUALITY_FIELD, DataType::Int32, false),
    ]))
}

/// One observation of one target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementRecord {
    /// Mid-exposure time
    pub time: f64,
    /// Simple-aperture flux
    pub flux: f32,
    /// Background estimate
    pub background: f32,
    /// Data-quality bitmask
    pub quality: i32,
    /// Aperture center column
    pub x: i32,
    /// Aperture center row
    pub y: i32,
    pub ra: f64,
    pub dec: f64,
}

impl MeasurementRecord {
    /// Aperture position this observation reports
    pub fn position(&self) -> AperturePosition {
        AperturePosition {
            x: self.x,
            y: self.y,
            ra: self.ra,
            dec: self.dec,
        }
    }
}

/// Fixed aperture of a light curve, in pixel and sky coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AperturePosition {
    pub x: i32,
    pub y: i32,
    pub ra: f64,
    pub dec: f64,
}

impl AperturePosition {
    /// Bitwise comparison, so NaN coordinates compare equal to themselves
    pub fn same_as(&self, other: &AperturePosition) -> bool {
        self.x == other.x
            && self.y == other.y
            && self.ra.to_bits() == other.ra.to_bits()
            && self.dec.to_bits() == other.dec.to_bits()
    }
}

/// Records ordered by non-decreasing time
///
/// Only the aggregator constructs non-empty tables, after its terminal sort.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasurementTable {
    records: Vec<MeasurementRecord>,
}

impl MeasurementTable {
    pub(crate) fn from_sorted(records: Vec<MeasurementRecord>) -> Self {
        debug_assert!(records.windows(2).all(|w| w[0].time <= w[1].time));
        Self { records }
    }

    pub fn records(&self) -> &[MeasurementRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        self.records.iter().map(|r| r.time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_columns() {
        let schema = light_curve_schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["TIME", "SAP_FLUX", "SAP_BKG", "QUALITY"]);
        assert_eq!(schema.field(0).data_type(), &DataType::Float64);
        assert_eq!(schema.field(1).data_type(), &DataType::Float32);
        assert_eq!(schema.field(3).data_type(), &DataType::Int32);
    }

    #[test]
    fn test_position_same_as_handles_nan() {
        let a = AperturePosition { x: 1, y: 2, ra: f64::NAN, dec: -30.5 };
        let b = a;
        assert!(a.same_as(&b));
        assert_ne!(a, b);

        let c = AperturePosition { x: 1, y: 3, ..a };
        assert!(!a.same_as(&c));
    }
}
