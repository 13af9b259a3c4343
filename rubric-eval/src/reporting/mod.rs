//! Rubric reporting

use std::io::{self, Write};

use crate::rubric::Rubric;

/// Output layout for a generated rubric
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    /// Label/value lines per metric and criterion
    #[default]
    Text,
    /// The validated rubric as pretty-printed JSON
    Json,
}

/// Write the rubric as label/value lines, in the order received
pub fn write_report<W: Write>(rubric: &Rubric, out: &mut W) -> io::Result<()> {
    for metric in &rubric.metrics {
        writeln!(out, "Metric: {}", metric.name)?;
        writeln!(out, "Metric Type: {}", metric.metric_type)?;
        for criterion in &metric.criteria {
            writeln!(out, "Score: {}", criterion.score)?;
            writeln!(out, "Determination: {}", criterion.determination)?;
        }
    }
    Ok(())
}

/// Write the rubric as pretty JSON followed by a newline
pub fn write_json<W: Write>(rubric: &Rubric, out: &mut W) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, rubric)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(out)
}

/// Print the rubric to stdout in the requested format
pub fn print_report(rubric: &Rubric, format: ReportFormat) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match format {
        ReportFormat::Text => write_report(rubric, &mut out)?,
        ReportFormat::Json => write_json(rubric, &mut out)?,
    }
    out.flush()
}
