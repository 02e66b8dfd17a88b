//! Row Sinks

use crate::SinkError;
use feature_engine::FeatureRow;
use serde::Serialize;
use std::fmt::Display;
use std::io::Write;

/// All rows extracted from one signal
#[derive(Debug, Clone, PartialEq)]
pub struct SignalRows<L> {
    pub signal_id: String,
    pub rows: Vec<FeatureRow<L>>,
}

/// Destination for extracted rows.
///
/// The scheduler calls [`emit_batch`](RowSink::emit_batch) while holding the
/// output lock, so one batch is never interleaved with another.
pub trait RowSink<L> {
    fn emit_batch(&mut self, batch: &[SignalRows<L>]) -> Result<(), SinkError>;

    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Comma-separated rows: `signal,position,label,values...`
pub struct CsvSink<W: Write> {
    writer: W,
}

impl<W: Write> CsvSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Quote a field if it contains a delimiter, quote or newline
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

impl<L: Display, W: Write> RowSink<L> for CsvSink<W> {
    fn emit_batch(&mut self, batch: &[SignalRows<L>]) -> Result<(), SinkError> {
        for signal in batch {
            let id = csv_field(&signal.signal_id);
            for row in &signal.rows {
                let label = match &row.label {
                    Some(label) => csv_field(&label.to_string()),
                    None => "none".to_string(),
                };
                write!(self.writer, "{},{},{}", id, row.position, label)?;
                for value in &row.values {
                    write!(self.writer, ",{}", value)?;
                }
                writeln!(self.writer)?;
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

#[derive(Serialize)]
struct JsonRow<'a, L> {
    signal: &'a str,
    #[serde(flatten)]
    row: &'a FeatureRow<L>,
}

/// One JSON object per row
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<L: Serialize, W: Write> RowSink<L> for JsonLinesSink<W> {
    fn emit_batch(&mut self, batch: &[SignalRows<L>]) -> Result<(), SinkError> {
        for signal in batch {
            for row in &signal.rows {
                serde_json::to_writer(
                    &mut self.writer,
                    &JsonRow {
                        signal: &signal.signal_id,
                        row,
                    },
                )?;
                writeln!(self.writer)?;
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Keeps every emitted batch in memory
#[derive(Debug, Default)]
pub struct MemorySink<L> {
    batches: Vec<Vec<SignalRows<L>>>,
}

impl<L> MemorySink<L> {
    pub fn new() -> Self {
        Self {
            batches: Vec::new(),
        }
    }

    /// Batches in emission order
    pub fn batches(&self) -> &[Vec<SignalRows<L>>] {
        &self.batches
    }

    pub fn into_batches(self) -> Vec<Vec<SignalRows<L>>> {
        self.batches
    }

    pub fn row_count(&self) -> usize {
        self.batches
            .iter()
            .flatten()
            .map(|signal| signal.rows.len())
            .sum()
    }
}

impl<L: Clone> RowSink<L> for MemorySink<L> {
    fn emit_batch(&mut self, batch: &[SignalRows<L>]) -> Result<(), SinkError> {
        self.batches.push(batch.to_vec());
        Ok(())
    }
}
