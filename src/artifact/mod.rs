//! Light-curve artifact assembly
//!
//! Turns a finalized table into the published artifact:
//! - Builds the header from request parameters and derived position
//! - Converts records to an Arrow batch
//! - Serializes header + batch to Parquet

mod header;
mod parquet_writer;

pub use header::{ArtifactMetadata, DATE_FORMAT};
pub use parquet_writer::ParquetWriter;

use crate::aggregate::FinalizedTable;
use crate::request::AggregationKey;
use crate::schema::{light_curve_schema, MeasurementTable};
use crate::{ArtifactConfig, Error, PositionPolicy, Result};

use arrow_array::{Float32Array, Float64Array, Int32Array, RecordBatch};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use object_store::path::Path;
use std::sync::Arc;

/// A serialized light curve and where it goes
#[derive(Debug, Clone)]
pub struct Artifact {
    pub address: Path,
    pub metadata: ArtifactMetadata,
    pub table: MeasurementTable,
    pub bytes: Bytes,
}

impl Artifact {
    /// File name component of the target address
    pub fn file_name(&self) -> &str {
        self.address.filename().unwrap_or("artifact")
    }
}

/// Builds artifacts for one output configuration
#[derive(Debug, Clone)]
pub struct ArtifactBuilder {
    config: ArtifactConfig,
    writer: ParquetWriter,
}

impl ArtifactBuilder {
    pub fn new(config: ArtifactConfig) -> Self {
        Self {
            config,
            writer: ParquetWriter::new(),
        }
    }

    pub fn config(&self) -> &ArtifactConfig {
        &self.config
    }

    /// Target address for `key` under this configuration
    pub fn address_for(&self, key: &AggregationKey) -> Path {
        key.artifact_address(&self.config.extension)
    }

    /// Header for `key`, failing when a required position is missing
    pub fn metadata(
        &self,
        key: &AggregationKey,
        finalized: &FinalizedTable,
        generated_at: DateTime<Utc>,
    ) -> Result<ArtifactMetadata> {
        if finalized.position.is_none() && self.config.positions == PositionPolicy::Required {
            return Err(Error::SerializationFailure(format!(
                "{} has no observations; aperture position header is required",
                key
            )));
        }

        Ok(ArtifactMetadata {
            telescope: self.config.telescope.clone(),
            camera: key.camera(),
            sector: key.sector(),
            ccd: key.ccd(),
            object: format!("TIC {}", key.object_id()),
            coordinate_system: self.config.coordinate_system.clone(),
            aperture_radius: key.radius_label(),
            cutout_width: key.cutout_width(),
            generated_at,
            position: finalized.position,
        })
    }

    /// Build and serialize the artifact for `key`
    pub fn build(
        &self,
        key: &AggregationKey,
        finalized: FinalizedTable,
        generated_at: DateTime<Utc>,
    ) -> Result<Artifact> {
        let metadata = self.metadata(key, &finalized, generated_at)?;
        let batch = to_record_batch(&finalized.table)?;
        let bytes = self.writer.write_table(&batch, &metadata.entries())?;

        Ok(Artifact {
            address: self.address_for(key),
            metadata,
            table: finalized.table,
            bytes,
        })
    }
}

/// Columnar view of a measurement table
pub fn to_record_batch(table: &MeasurementTable) -> Result<RecordBatch> {
    let records = table.records();
    let times: Vec<f64> = records.iter().map(|r| r.time).collect();
    let flux: Vec<f32> = records.iter().map(|r| r.flux).collect();
    let background: Vec<f32> = records.iter().map(|r| r.background).collect();
    let quality: Vec<i32> = records.iter().map(|r| r.quality).collect();

    let batch = RecordBatch::try_new(
        light_curve_schema(),
        vec![
            Arc::new(Float64Array::from(times)),
            Arc::new(Float32Array::from(flux)),
            Arc::new(Float32Array::from(background)),
            Arc::new(Int32Array::from(quality)),
        ],
    )?;
    Ok(batch)
}
