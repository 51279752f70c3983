//! CSV writers for mapped, scaled, CIU and drift-tube tables.

use std::io::Write;

use crate::calibration::DriftTubeTable;
use crate::mapping::{CcsRow, CiuRow, ScaledRow};

use super::ExportError;

/// Header of mapped CCS tables
pub const CCS_HEADER: [&str; 5] = ["Charge", "Drift", "CCS", "CCS Std.Dev.", "Intensity"];

/// Header of scaled CCS tables
pub const SCALED_HEADER: [&str; 8] = [
    "Charge",
    "Drift",
    "CCS",
    "CCS Std.Dev.",
    "Intensity",
    "Scale Factor",
    "Normalized Intensity",
    "Scaled Intensity",
];

/// Write mapped rows as `Charge,Drift,CCS,CCS Std.Dev.,Intensity`
pub fn write_ccs_rows<W: Write>(writer: W, rows: &[CcsRow]) -> Result<usize, ExportError> {
    let mut csv = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv.write_record(CCS_HEADER)?;
    for row in rows {
        csv.serialize(row)?;
    }
    csv.flush()?;
    Ok(rows.len())
}

/// Write scaled rows: the mapped columns followed by the three scaling columns
pub fn write_scaled_rows<W: Write>(writer: W, rows: &[ScaledRow]) -> Result<usize, ExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(SCALED_HEADER)?;
    for scaled in rows {
        let row = &scaled.row;
        csv.write_record([
            row.charge.to_string(),
            row.drift_time.to_string(),
            row.ccs.to_string(),
            row.ccs_stddev.to_string(),
            row.intensity.to_string(),
            scaled.scale_factor.to_string(),
            scaled.normalized.to_string(),
            scaled.scaled.to_string(),
        ])?;
    }
    csv.flush()?;
    Ok(rows.len())
}

/// Write CIU rows as `CCS,Drift Time,Collision Voltage,Intensity`
pub fn write_ciu_rows<W: Write>(writer: W, rows: &[CiuRow]) -> Result<usize, ExportError> {
    let mut csv = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv.write_record(["CCS", "Drift Time", "Collision Voltage", "Intensity"])?;
    for row in rows {
        csv.serialize(row)?;
    }
    csv.flush()?;
    Ok(rows.len())
}

/// Write one drift-tube run as `Drift Time,CCS,Intensity`
pub fn write_drift_tube_table<W: Write>(
    writer: W,
    table: &DriftTubeTable,
) -> Result<usize, ExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(["Drift Time", "CCS", "Intensity"])?;
    for row in &table.rows {
        csv.write_record([
            row.drift_time.to_string(),
            row.ccs.to_string(),
            row.intensity.to_string(),
        ])?;
    }
    csv.flush()?;
    Ok(table.rows.len())
}
