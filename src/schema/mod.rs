//! Schema definitions for light-curve tables
//!
//! Defines the Arrow schema of the published table, the header keys attached
//! to it, and the in-memory record types shared by the parser, aggregator
//! and builder.

mod light_curve;

pub use light_curve::{
    light_curve_schema,
    AperturePosition,
    MeasurementRecord,
    MeasurementTable,
    FRAGMENT_FIELD_COUNT,
    HEADER_APERTURE_RADIUS,
    HEADER_APERTURE_X,
    HEADER_APERTURE_Y,
    HEADER_CAMERA,
    HEADER_CCD,
    HEADER_COORDINATE_SYSTEM,
    HEADER_CUTOUT_WIDTH,
    HEADER_DATE,
    HEADER_DEC,
    HEADER_OBJECT,
    HEADER_RA,
    HEADER_SECTOR,
    HEADER_TELESCOPE,
    QUALITY_FIELD,
    SAP_BKG_FIELD,
    SAP_FLUX_FIELD,
    TIME_FIELD,
};
