//! File-backed record sinks: JSON Lines or CSV.
//!
//! Files are opened in append mode so a resumed crawl extends the output
//! of earlier runs instead of clobbering it; the dedup set in the
//! checkpoint guarantees no record appears twice across runs. Every emit
//! is flushed so an interrupt loses at most the record being written.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use clap::ValueEnum;
use talos_core::error::CrawlError;
use talos_core::models::Review;
use talos_core::traits::RecordSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Jsonl,
    Csv,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Jsonl => write!(f, "jsonl"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

enum Writer {
    Jsonl(BufWriter<File>),
    Csv(csv::Writer<File>),
}

pub struct FileSink {
    writer: Mutex<Writer>,
}

impl FileSink {
    pub fn create(path: &Path, format: OutputFormat) -> Result<Self, CrawlError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| CrawlError::Sink(format!("create {}: {e}", parent.display())))?;
        }

        // A CSV header only belongs at the top of a fresh file.
        let has_content = std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| CrawlError::Sink(format!("open {}: {e}", path.display())))?;

        let writer = match format {
            OutputFormat::Jsonl => Writer::Jsonl(BufWriter::new(file)),
            OutputFormat::Csv => Writer::Csv(
                csv::WriterBuilder::new()
                    .has_headers(!has_content)
                    .from_writer(file),
            ),
        };
        Ok(Self {
            writer: Mutex::new(writer),
        })
    }
}

impl RecordSink for FileSink {
    async fn emit(&self, review: &Review) -> Result<(), CrawlError> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| CrawlError::Sink("output writer poisoned".into()))?;
        match &mut *writer {
            Writer::Jsonl(w) => {
                serde_json::to_writer(&mut *w, review)?;
                w.write_all(b"\n")
                    .and_then(|()| w.flush())
                    .map_err(|e| CrawlError::Sink(e.to_string()))?;
            }
            Writer::Csv(w) => {
                w.serialize(review)
                    .map_err(|e| CrawlError::Sink(e.to_string()))?;
                w.flush().map_err(|e| CrawlError::Sink(e.to_string()))?;
            }
        }
        Ok(())
    }
}
