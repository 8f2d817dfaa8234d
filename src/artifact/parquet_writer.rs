//! Parquet writer for light-curve tables
//!
//! Output must be a pure function of the input batch and header, so every
//! writer property is pinned here, including the `created_by` string.

use crate::Result;

use arrow_array::RecordBatch;
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::metadata::KeyValue;
use parquet::file::properties::{EnabledStatistics, WriterProperties, WriterVersion};

const CREATED_BY: &str = concat!("lcstitch version ", env!("CARGO_PKG_VERSION"));

/// Writes one light-curve table plus its header
#[derive(Debug, Clone)]
pub struct ParquetWriter {
    zstd_level: i32,
}

impl ParquetWriter {
    pub fn new() -> Self {
        Self { zstd_level: 3 }
    }

    fn writer_properties(&self, header: Vec<KeyValue>) -> Result<WriterProperties> {
        Ok(WriterProperties::builder()
            .set_writer_version(WriterVersion::PARQUET_2_0)
            .set_created_by(CREATED_BY.to_string())
            .set_compression(Compression::ZSTD(ZstdLevel::try_new(self.zstd_level)?))
            // A light curve is a few thousand rows; keep it in one row group
            .set_max_row_group_size(1_000_000)
            .set_statistics_enabled(EnabledStatistics::Page)
            .set_bloom_filter_enabled(false)
            .set_key_value_metadata(Some(header))
            .build())
    }

    /// Write `batch` with `header` as file key/value metadata
    ///
    /// A zero-row batch produces a valid file carrying only schema and header.
    pub fn write_table(&self, batch: &RecordBatch, header: &[(&str, String)]) -> Result<Bytes> {
        let header = header
            .iter()
            .map(|(k, v)| KeyValue::new(k.to_string(), v.clone()))
            .collect();
        let props = self.writer_properties(header)?;

        let mut buffer = Vec::new();
        {
            let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), Some(props))?;
            if batch.num_rows() > 0 {
                writer.write(batch)?;
            }
            writer.close()?;
        }

        Ok(Bytes::from(buffer))
    }
}

impl Default for ParquetWriter {
    fn default() -> Self {
        Self::new()
    }
}
