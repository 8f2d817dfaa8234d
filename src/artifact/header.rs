//! Light-curve header metadata

use crate::schema::{
    AperturePosition, HEADER_APERTURE_RADIUS, HEADER_APERTURE_X, HEADER_APERTURE_Y,
    HEADER_CAMERA, HEADER_CCD, HEADER_COORDINATE_SYSTEM, HEADER_CUTOUT_WIDTH, HEADER_DATE,
    HEADER_DEC, HEADER_OBJECT, HEADER_RA, HEADER_SECTOR, HEADER_TELESCOPE,
};

use chrono::{DateTime, Utc};

/// `DATE` header format
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Header attached to a published light curve
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactMetadata {
    pub telescope: String,
    pub camera: u8,
    pub sector: u32,
    pub ccd: u8,
    /// `TIC {id}`
    pub object: String,
    pub coordinate_system: String,
    /// Aperture radius as rendered in storage keys
    pub aperture_radius: String,
    pub cutout_width: u32,
    pub generated_at: DateTime<Utc>,
    /// Derived from the records; absent for an empty light curve
    pub position: Option<AperturePosition>,
}

impl ArtifactMetadata {
    /// Header entries in write order
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let mut entries = vec![
            (HEADER_TELESCOPE, self.telescope.clone()),
            (HEADER_CAMERA, self.camera.to_string()),
            (HEADER_SECTOR, self.sector.to_string()),
            (HEADER_CCD, self.ccd.to_string()),
            (HEADER_OBJECT, self.object.clone()),
            (HEADER_COORDINATE_SYSTEM, self.coordinate_system.clone()),
            (HEADER_APERTURE_RADIUS, self.aperture_radius.clone()),
            (HEADER_CUTOUT_WIDTH, self.cutout_width.to_string()),
            (HEADER_DATE, self.generated_at.format(DATE_FORMAT).to_string()),
        ];

        if let Some(position) = &self.position {
            entries.push((HEADER_RA, position.ra.to_string()));
            entries.push((HEADER_DEC, position.dec.to_string()));
            entries.push((HEADER_APERTURE_X, position.x.to_string()));
            entries.push((HEADER_APERTURE_Y, position.y.to_string()));
        }

        entries
    }

    /// Look up one header value
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries()
            .into_iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn metadata(position: Option<AperturePosition>) -> ArtifactMetadata {
        ArtifactMetadata {
            telescope: "TESS".to_string(),
            camera: 4,
            sector: 1,
            ccd: 1,
            object: "TIC 25155310".to_string(),
            coordinate_system: "ICRS".to_string(),
            aperture_radius: "2.5".to_string(),
            cutout_width: 30,
            generated_at: Utc.with_ymd_and_hms(2018, 8, 22, 1, 2, 3).unwrap(),
            position,
        }
    }

    #[test]
    fn test_entries_order_with_position() {
        let meta = metadata(Some(AperturePosition {
            x: 1021,
            y: 877,
            ra: 84.29125,
            dec: -80.4689,
        }));
        let keys: Vec<&str> = meta.entries().iter().map(|(k, _)| *k).collect();
        assert_eq!(
            keys,
            vec![
                "TELESCOP", "CAMERA", "SECTOR", "CCD", "OBJECT", "RADESYS", "AP_RAD",
                "SKYWIDTH", "DATE", "RA_OBJ", "DEC_OBJ", "APCEN_X", "APCEN_Y"
            ]
        );
        assert_eq!(meta.get("DATE").unwrap(), "2018-08-22T01:02:03Z");
        assert_eq!(meta.get("RA_OBJ").unwrap(), "84.29125");
        assert_eq!(meta.get("APCEN_Y").unwrap(), "877");
    }

    #[test]
    fn test_entries_without_position() {
        let meta = metadata(None);
        assert_eq!(meta.entries().len(), 9);
        assert!(meta.get("RA_OBJ").is_none());
        assert_eq!(meta.get("OBJECT").unwrap(), "TIC 25155310");
    }
}
