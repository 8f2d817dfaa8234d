//! Fragment parsing
//!
//! A fragment is one comma-separated line of eight scalars:
//! `time,flux,background,quality,x,y,ra,dec`.

use super::FragmentHandle;
use crate::schema::{MeasurementRecord, FRAGMENT_FIELD_COUNT};
use crate::{Error, Result};

use std::str::FromStr;

const FIELD_NAMES: [&str; FRAGMENT_FIELD_COUNT] =
    ["time", "flux", "background", "quality", "x", "y", "ra", "dec"];

/// Parse one fragment body into a measurement record
pub fn parse_fragment(handle: &FragmentHandle, bytes: &[u8]) -> Result<MeasurementRecord> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| Error::malformed(handle.to_string(), format!("not UTF-8: {}", e)))?;

    let fields: Vec<&str> = text.trim().split(',').map(str::trim).collect();
    if fields.len() != FRAGMENT_FIELD_COUNT {
        return Err(Error::malformed(
            handle.to_string(),
            format!(
                "expected {} fields, got {}",
                FRAGMENT_FIELD_COUNT,
                fields.len()
            ),
        ));
    }

    let record = MeasurementRecord {
        time: field(handle, &fields, 0)?,
        flux: field(handle, &fields, 1)?,
        background: field(handle, &fields, 2)?,
        quality: field(handle, &fields, 3)?,
        x: field(handle, &fields, 4)?,
        y: field(handle, &fields, 5)?,
        ra: field(handle, &fields, 6)?,
        dec: field(handle, &fields, 7)?,
    };

    // Ordering is defined on time, so it has to be a real number
    if !record.time.is_finite() {
        return Err(Error::malformed(
            handle.to_string(),
            format!("time must be finite, got {}", record.time),
        ));
    }

    Ok(record)
}

fn field<T: FromStr>(handle: &FragmentHandle, fields: &[&str], index: usize) -> Result<T> {
    fields[index].parse::<T>().map_err(|_| {
        Error::malformed(
            handle.to_string(),
            format!(
                "field {} ({}) is not a valid {}: '{}'",
                index,
                FIELD_NAMES[index],
                std::any::type_name::<T>(),
                fields[index]
            ),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use object_store::path::Path;

    fn handle() -> FragmentHandle {
        FragmentHandle {
            location: Path::from("tic000025155310/s0001-4-1/r2.5/w30/cutout_0001.csv"),
            size: 64,
            last_modified: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_parse_valid_fragment() {
        let record = parse_fragment(
            &handle(),
            b"1325.2938,1523.75,12.5,0,1021,877,84.29125,-80.4689\n",
        )
        .unwrap();

        assert_eq!(record.time, 1325.2938);
        assert_eq!(record.flux, 1523.75f32);
        assert_eq!(record.background, 12.5f32);
        assert_eq!(record.quality, 0);
        assert_eq!(record.x, 1021);
        assert_eq!(record.y, 877);
        assert_eq!(record.ra, 84.29125);
        assert_eq!(record.dec, -80.4689);
    }

    #[test]
    fn test_parse_tolerates_whitespace() {
        let record = parse_fragment(&handle(), b"  5.0, 1.0 ,2.0,128,1,2,3.5,-4.5\r\n").unwrap();
        assert_eq!(record.time, 5.0);
        assert_eq!(record.quality, 128);
    }

    #[test]
    fn test_parse_accepts_nan_flux() {
        let record = parse_fragment(&handle(), b"5.0,nan,NaN,0,1,2,3.5,-4.5").unwrap();
        assert!(record.flux.is_nan());
        assert!(record.background.is_nan());
    }

    #[test]
    fn test_parse_rejects_non_numeric_field() {
        let err = parse_fragment(&handle(), b"5.0,bright,2.0,0,1,2,3.5,-4.5").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedFragment);
        let msg = err.to_string();
        assert!(msg.contains("cutout_0001.csv"));
        assert!(msg.contains("flux"));
    }

    #[test]
    fn test_parse_rejects_wrong_field_count() {
        let err = parse_fragment(&handle(), b"5.0,1.0,2.0,0,1,2,3.5").unwrap_err();
        assert!(err.to_string().contains("expected 8 fields, got 7"));

        let err = parse_fragment(&handle(), b"5.0,1.0,2.0,0,1,2,3.5,-4.5,9").unwrap_err();
        assert!(err.to_string().contains("got 9"));

        let err = parse_fragment(&handle(), b"").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedFragment);
    }

    #[test]
    fn test_parse_rejects_fractional_pixel() {
        let err = parse_fragment(&handle(), b"5.0,1.0,2.0,0,1.5,2,3.5,-4.5").unwrap_err();
        assert!(err.to_string().contains("(x)"));
    }

    #[test]
    fn test_parse_rejects_non_finite_time() {
        let err = parse_fragment(&handle(), b"inf,1.0,2.0,0,1,2,3.5,-4.5").unwrap_err();
        assert!(err.to_string().contains("time must be finite"));

        let err = parse_fragment(&handle(), b"NaN,1.0,2.0,0,1,2,3.5,-4.5").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedFragment);
    }

    #[test]
    fn test_parse_rejects_invalid_utf8() {
        let err = parse_fragment(&handle(), &[0xff, 0xfe, b',']).unwrap_err();
        assert!(err.to_string().contains("not UTF-8"));
    }
}
