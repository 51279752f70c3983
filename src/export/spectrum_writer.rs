//! # CCS Spectrum Writer
//!
//! Writes mapped CCS spectra to Parquet in a "wide" layout: one row per
//! analyte charge state, with the CCS and intensity values stored as list
//! columns so a whole distribution is read back in one row.
//!
//! ## Schema Columns
//!
//! | Column | Type | Description |
//! |--------|------|-------------|
//! | analyte | Utf8 | Analyte name |
//! | charge | UInt32 | Charge state |
//! | ccs_array | List<Float64> | CCS values (Å²) |
//! | intensity_array | List<Float64> | Intensity values |
//!
//! Run metadata is stored as JSON in the file footer under
//! [`KEY_RUN_METADATA`].

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Builder, ListBuilder, StringBuilder, UInt32Builder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::{EnabledStatistics, WriterProperties};
use parquet::format::KeyValue;
use serde::{Deserialize, Serialize};

use crate::mapping::MappedSpectrum;

use super::ExportError;

/// Footer key holding the run metadata JSON
pub const KEY_RUN_METADATA: &str = "ccsfit:run_metadata";

/// Column names of the spectrum schema
pub mod spectrum_columns {
    /// Analyte name
    pub const ANALYTE: &str = "analyte";
    /// Charge state
    pub const CHARGE: &str = "charge";
    /// CCS array
    pub const CCS_ARRAY: &str = "ccs_array";
    /// Intensity array
    pub const INTENSITY_ARRAY: &str = "intensity_array";
}

/// Creates the Arrow schema of the spectrum file
pub fn create_spectrum_schema() -> Schema {
    let list = |name: &str| {
        Field::new(
            name,
            DataType::List(Arc::new(Field::new("item", DataType::Float64, false))),
            false,
        )
    };
    Schema::new(vec![
        Field::new(spectrum_columns::ANALYTE, DataType::Utf8, false),
        Field::new(spectrum_columns::CHARGE, DataType::UInt32, false),
        list(spectrum_columns::CCS_ARRAY),
        list(spectrum_columns::INTENSITY_ARRAY),
    ])
}

/// Provenance of a mapping run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// When the file was written
    pub created: DateTime<Utc>,
    /// Producing tool and version
    pub producer: String,
    /// Calibration files used
    pub calibration_files: Vec<String>,
    /// CCS spread threshold applied to the calibration
    pub max_relative_stddev: f64,
    /// Injection delay subtracted from raw drift times (ms)
    pub injection_ms: f64,
}

impl RunMetadata {
    /// Metadata stamped with the current time
    pub fn new(max_relative_stddev: f64, injection_ms: f64) -> Self {
        Self {
            created: Utc::now(),
            producer: format!("ccsfit v{}", env!("CARGO_PKG_VERSION")),
            calibration_files: Vec::new(),
            max_relative_stddev,
            injection_ms,
        }
    }

    /// Record the calibration files
    pub fn with_calibration_files(mut self, files: Vec<String>) -> Self {
        self.calibration_files = files;
        self
    }

    /// Footer key-value pairs
    pub fn to_parquet_metadata(&self) -> Result<HashMap<String, String>, ExportError> {
        let mut metadata = HashMap::new();
        metadata.insert(KEY_RUN_METADATA.to_string(), serde_json::to_string(self)?);
        Ok(metadata)
    }
}

/// Configuration for the spectrum writer
#[derive(Debug, Clone)]
pub struct SpectrumWriterConfig {
    /// ZSTD compression level
    pub compression_level: i32,
    /// Target row group size
    pub row_group_size: usize,
    /// Whether to write column statistics
    pub write_statistics: bool,
}

impl Default for SpectrumWriterConfig {
    fn default() -> Self {
        Self {
            compression_level: 3,
            row_group_size: 100,
            write_statistics: true,
        }
    }
}

impl SpectrumWriterConfig {
    fn to_writer_properties(&self, metadata: &HashMap<String, String>) -> WriterProperties {
        let compression = Compression::ZSTD(
            ZstdLevel::try_new(self.compression_level).unwrap_or_default(),
        );
        let statistics = if self.write_statistics {
            EnabledStatistics::Chunk
        } else {
            EnabledStatistics::None
        };

        let mut builder = WriterProperties::builder()
            .set_compression(compression)
            .set_statistics_enabled(statistics)
            .set_max_row_group_size(self.row_group_size);

        // Array columns hold unique values
        for column in [spectrum_columns::CCS_ARRAY, spectrum_columns::INTENSITY_ARRAY] {
            builder = builder.set_column_dictionary_enabled(
                parquet::schema::types::ColumnPath::new(vec![column.to_string()]),
                false,
            );
        }

        let kv_metadata: Vec<KeyValue> = metadata
            .iter()
            .map(|(k, v)| KeyValue {
                key: k.clone(),
                value: Some(v.clone()),
            })
            .collect();
        builder.set_key_value_metadata(Some(kv_metadata)).build()
    }
}

/// Streaming writer for CCS spectrum Parquet files
pub struct SpectrumWriter<W: Write + Send> {
    writer: ArrowWriter<W>,
    schema: Arc<Schema>,
    spectra_written: usize,
    data_points_written: usize,
}

impl SpectrumWriter<File> {
    /// Create a writer to a file path
    pub fn new_file<P: AsRef<Path>>(
        path: P,
        metadata: &RunMetadata,
        config: SpectrumWriterConfig,
    ) -> Result<Self, ExportError> {
        let file = File::create(path)?;
        Self::new(file, metadata, config)
    }
}

impl<W: Write + Send> SpectrumWriter<W> {
    /// Create a writer to any `Write` implementation
    pub fn new(
        writer: W,
        metadata: &RunMetadata,
        config: SpectrumWriterConfig,
    ) -> Result<Self, ExportError> {
        let schema = Arc::new(create_spectrum_schema());
        let props = config.to_writer_properties(&metadata.to_parquet_metadata()?);
        let writer = ArrowWriter::try_new(writer, schema.clone(), Some(props))?;
        Ok(Self {
            writer,
            schema,
            spectra_written: 0,
            data_points_written: 0,
        })
    }

    /// Write a batch of mapped spectra, one row each
    pub fn write_spectra(&mut self, spectra: &[MappedSpectrum]) -> Result<(), ExportError> {
        if spectra.is_empty() {
            return Ok(());
        }

        let mut analyte_builder = StringBuilder::new();
        let mut charge_builder = UInt32Builder::new();
        let item = || Field::new("item", DataType::Float64, false);
        let mut ccs_builder = ListBuilder::new(Float64Builder::new()).with_field(item());
        let mut intensity_builder = ListBuilder::new(Float64Builder::new()).with_field(item());

        for spectrum in spectra {
            analyte_builder.append_value(&spectrum.analyte);
            charge_builder.append_value(spectrum.charge);
            for row in &spectrum.rows {
                ccs_builder.values().append_value(row.ccs);
                intensity_builder.values().append_value(row.intensity);
            }
            ccs_builder.append(true);
            intensity_builder.append(true);
            self.data_points_written += spectrum.rows.len();
        }

        let arrays: Vec<ArrayRef> = vec![
            Arc::new(analyte_builder.finish()),
            Arc::new(charge_builder.finish()),
            Arc::new(ccs_builder.finish()),
            Arc::new(intensity_builder.finish()),
        ];
        let batch = RecordBatch::try_new(self.schema.clone(), arrays)?;
        self.writer.write(&batch)?;
        self.spectra_written += spectra.len();
        Ok(())
    }

    /// Flush buffered rows and finalize the file
    pub fn finish(self) -> Result<SpectrumWriterStats, ExportError> {
        let file_metadata = self.writer.close()?;
        Ok(SpectrumWriterStats {
            spectra_written: self.spectra_written,
            data_points_written: self.data_points_written,
            row_groups_written: file_metadata.row_groups.len(),
        })
    }

    /// Current statistics
    pub fn stats(&self) -> SpectrumWriterStats {
        SpectrumWriterStats {
            spectra_written: self.spectra_written,
            data_points_written: self.data_points_written,
            row_groups_written: 0,
        }
    }
}

/// Statistics from a completed spectrum write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpectrumWriterStats {
    /// Number of spectra (rows) written
    pub spectra_written: usize,
    /// Total number of CCS points written
    pub data_points_written: usize,
    /// Number of row groups written
    pub row_groups_written: usize,
}

impl std::fmt::Display for SpectrumWriterStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Wrote {} spectra ({} data points) in {} row groups",
            self.spectra_written, self.data_points_written, self.row_groups_written
        )
    }
}
