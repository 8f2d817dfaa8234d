//! Aggregation requests and the composite key derived from them
//!
//! Requests arrive as loosely typed JSON: numeric fields may be numbers or
//! numeric strings. Everything is coerced and range-checked here so the rest
//! of the pipeline only ever sees a valid [`AggregationKey`].

use crate::{Error, Result};

use object_store::path::Path;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Width the catalog id is zero-padded to in storage keys
pub const OBJECT_ID_WIDTH: usize = 12;

/// Highest sector number representable in the four-digit sector id
pub const MAX_SECTOR: u64 = 9999;

/// Cameras and CCDs are numbered 1 through 4
const MAX_DETECTOR_INDEX: u64 = 4;

/// Composite identifier of one light curve
#[derive(Debug, Clone)]
pub struct AggregationKey {
    object_id: String,
    sector: u32,
    camera: u8,
    ccd: u8,
    radius: f64,
    cutout_width: u32,
}

impl AggregationKey {
    /// Create a validated key
    pub fn new(
        object_id: &str,
        sector: u32,
        camera: u8,
        ccd: u8,
        radius: f64,
        cutout_width: u32,
    ) -> Result<Self> {
        let object_id = validate_object_id(object_id)?;
        check_range("sector", sector as u64, 1, MAX_SECTOR)?;
        check_range("camera", camera as u64, 1, MAX_DETECTOR_INDEX)?;
        check_range("ccd", ccd as u64, 1, MAX_DETECTOR_INDEX)?;
        if !radius.is_finite() || radius <= 0.0 {
            return Err(Error::InvalidRequest(format!(
                "radius must be a positive finite number, got {}",
                radius
            )));
        }
        if cutout_width == 0 {
            return Err(Error::InvalidRequest(
                "cutout_width must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            object_id,
            sector,
            camera,
            ccd,
            radius,
            cutout_width,
        })
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    pub fn sector(&self) -> u32 {
        self.sector
    }

    pub fn camera(&self) -> u8 {
        self.camera
    }

    pub fn ccd(&self) -> u8 {
        self.ccd
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn cutout_width(&self) -> u32 {
        self.cutout_width
    }

    /// Catalog id zero-padded to twelve digits
    pub fn padded_object_id(&self) -> String {
        format!("{:0>width$}", self.object_id, width = OBJECT_ID_WIDTH)
    }

    /// `s{sector:04}-{camera}-{ccd}`
    pub fn sector_id(&self) -> String {
        format!("s{:04}-{}-{}", self.sector, self.camera, self.ccd)
    }

    /// Radius as it appears in storage keys and headers (`2.5`, `3.0`)
    pub fn radius_label(&self) -> String {
        format_radius(self.radius)
    }

    /// Prefix under which the upstream producer stores this key's fragments
    pub fn fragment_prefix(&self) -> Path {
        Path::from(format!(
            "tic{}/{}/r{}/w{}",
            self.padded_object_id(),
            self.sector_id(),
            self.radius_label(),
            self.cutout_width
        ))
    }

    /// File name of the published light curve
    pub fn artifact_basename(&self, extension: &str) -> String {
        format!(
            "tic{}_{}_lcc.{}",
            self.padded_object_id(),
            self.sector_id(),
            extension.trim_start_matches('.')
        )
    }

    /// Durable-store address of the published light curve
    pub fn artifact_address(&self, extension: &str) -> Path {
        Path::from(format!(
            "tic{}/{}",
            self.padded_object_id(),
            self.artifact_basename(extension)
        ))
    }
}

impl PartialEq for AggregationKey {
    fn eq(&self, other: &Self) -> bool {
        self.object_id == other.object_id
            && self.sector == other.sector
            && self.camera == other.camera
            && self.ccd == other.ccd
            && self.radius.to_bits() == other.radius.to_bits()
            && self.cutout_width == other.cutout_width
    }
}

impl Eq for AggregationKey {}

impl Hash for AggregationKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.object_id.hash(state);
        self.sector.hash(state);
        self.camera.hash(state);
        self.ccd.hash(state);
        self.radius.to_bits().hash(state);
        self.cutout_width.hash(state);
    }
}

impl fmt::Display for AggregationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TIC {} {} r{} w{}",
            self.object_id,
            self.sector_id(),
            self.radius_label(),
            self.cutout_width
        )
    }
}

/// One unit of work handed over by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationRequest {
    pub key: AggregationKey,
    /// Skip all work when the artifact already exists
    pub use_cache: bool,
}

/// Wire shape of a request before coercion
#[derive(Debug, Deserialize)]
struct RawRequest {
    tic_id: Value,
    sector: Value,
    camera: Value,
    ccd: Value,
    radius: Value,
    cutout_width: Value,
    use_cache: Value,
}

impl AggregationRequest {
    pub fn new(key: AggregationKey, use_cache: bool) -> Self {
        Self { key, use_cache }
    }

    /// Decode and validate a JSON request
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    /// Validate an already-decoded JSON request
    pub fn from_value(value: Value) -> Result<Self> {
        let raw: RawRequest = serde_json::from_value(value)?;

        let object_id = coerce_object_id(&raw.tic_id)?;
        let sector = coerce_unsigned("sector", &raw.sector)?;
        let camera = coerce_unsigned("camera", &raw.camera)?;
        let ccd = coerce_unsigned("ccd", &raw.ccd)?;
        let radius = coerce_float("radius", &raw.radius)?;
        let cutout_width = coerce_unsigned("cutout_width", &raw.cutout_width)?;
        let use_cache = coerce_bool("use_cache", &raw.use_cache)?;

        check_range("sector", sector, 1, MAX_SECTOR)?;
        check_range("camera", camera, 1, MAX_DETECTOR_INDEX)?;
        check_range("ccd", ccd, 1, MAX_DETECTOR_INDEX)?;
        check_range("cutout_width", cutout_width, 1, u32::MAX as u64)?;

        let key = AggregationKey::new(
            &object_id,
            sector as u32,
            camera as u8,
            ccd as u8,
            radius,
            cutout_width as u32,
        )?;

        Ok(Self { key, use_cache })
    }
}

/// Render a radius with a guaranteed fractional part
fn format_radius(radius: f64) -> String {
    let text = radius.to_string();
    if text.contains('.') {
        text
    } else {
        format!("{}.0", text)
    }
}

fn validate_object_id(raw: &str) -> Result<String> {
    let id = raw.trim();
    if id.is_empty() {
        return Err(Error::InvalidRequest("tic_id is empty".to_string()));
    }
    if !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidRequest(format!(
            "tic_id must be a decimal catalog number, got '{}'",
            raw
        )));
    }
    if id.len() > OBJECT_ID_WIDTH {
        return Err(Error::InvalidRequest(format!(
            "tic_id '{}' is longer than {} digits",
            id, OBJECT_ID_WIDTH
        )));
    }
    Ok(id.to_string())
}

fn check_range(field: &str, value: u64, min: u64, max: u64) -> Result<()> {
    if value < min || value > max {
        return Err(Error::InvalidRequest(format!(
            "{} must be in [{}, {}], got {}",
            field, min, max, value
        )));
    }
    Ok(())
}

fn coerce_object_id(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => n.as_u64().map(|v| v.to_string()).ok_or_else(|| {
            Error::InvalidRequest(format!("tic_id must be a non-negative integer, got {}", n))
        }),
        other => Err(Error::InvalidRequest(format!(
            "tic_id must be a string or integer, got {}",
            other
        ))),
    }
}

fn coerce_unsigned(field: &str, value: &Value) -> Result<u64> {
    let invalid = || Error::InvalidRequest(format!("{} must be an integer, got {}", field, value));
    match value {
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                return Ok(v);
            }
            // Integral floats such as 4.0 are accepted
            match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f >= 0.0 && f <= u32::MAX as f64 => Ok(f as u64),
                _ => Err(invalid()),
            }
        }
        Value::String(s) => s.trim().parse::<u64>().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

fn coerce_float(field: &str, value: &Value) -> Result<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| Error::InvalidRequest(format!("{} must be a number, got {}", field, value)))
}

fn coerce_bool(field: &str, value: &Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(Error::InvalidRequest(format!(
                "{} must be true or false, got '{}'",
                field, s
            ))),
        },
        other => Err(Error::InvalidRequest(format!(
            "{} must be a boolean, got {}",
            field, other
        ))),
    }
}
