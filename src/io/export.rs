//! CSV export of telemetry snapshots.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::error::SinkError;
use crate::telemetry::{TelemetrySink, TelemetrySnapshot};

/// Flat column layout for CSV telemetry export.
const HEADER: &str = "timestamp,site_id,solar_kw,irradiance_w_m2,panel_temp_c,\
                      load_kw,battery_kw,soc_percent,voltage_v,current_a,grid_kw,\
                      solar_to_load_kw,solar_to_battery_kw,solar_to_grid_kw,\
                      battery_to_load_kw,grid_to_load_kw";

/// Streams snapshots to CSV, writing the header before the first row.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    header_written: bool,
}

impl<W: Write> CsvSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: csv::WriterBuilder::new().from_writer(writer),
            header_written: false,
        }
    }

    /// Flushes and returns the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns a `SinkError` if the final flush fails.
    pub fn into_inner(self) -> Result<W, SinkError> {
        self.writer
            .into_inner()
            .map_err(|e| SinkError::Io(e.into_error()))
    }

    fn write_row(&mut self, s: &TelemetrySnapshot) -> Result<(), csv::Error> {
        if !self.header_written {
            self.writer.write_record(HEADER.split(',').map(str::trim))?;
            self.header_written = true;
        }

        let f = &s.energy_flow;
        self.writer.write_record(&[
            s.timestamp.to_rfc3339(),
            s.site_id.clone(),
            format!("{:.4}", s.solar.production_kw),
            format!("{:.2}", s.solar.irradiance_w_m2),
            format!("{:.2}", s.solar.panel_temp_c),
            format!("{:.4}", s.load.consumption_kw),
            format!("{:.4}", s.battery.power_kw),
            format!("{:.4}", s.battery.soc_percent),
            format!("{:.3}", s.battery.voltage_v),
            format!("{:.3}", s.battery.current_a),
            format!("{:.4}", s.grid.power_kw),
            format!("{:.4}", f.solar_to_load_kw),
            format!("{:.4}", f.solar_to_battery_kw),
            format!("{:.4}", f.solar_to_grid_kw),
            format!("{:.4}", f.battery_to_load_kw),
            format!("{:.4}", f.grid_to_load_kw),
        ])
    }
}

impl<W: Write> TelemetrySink for CsvSink<W> {
    fn publish(&mut self, snapshot: &TelemetrySnapshot) -> Result<(), SinkError> {
        self.write_row(snapshot)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Exports snapshots to a CSV file at the given path.
///
/// # Errors
///
/// Returns a `SinkError` if file creation or writing fails.
pub fn export_csv(snapshots: &[TelemetrySnapshot], path: &Path) -> Result<(), SinkError> {
    let file = File::create(path)?;
    write_csv(snapshots, io::BufWriter::new(file))
}

/// Writes snapshots as CSV to any writer. Output is deterministic for identical input.
///
/// # Errors
///
/// Returns a `SinkError` if writing fails.
pub fn write_csv(snapshots: &[TelemetrySnapshot], writer: impl Write) -> Result<(), SinkError> {
    let mut sink = CsvSink::new(writer);
    for s in snapshots {
        sink.write_row(s)?;
    }
    sink.into_inner()?;
    Ok(())
}
