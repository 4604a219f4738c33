//! CSV export of the results table.
//!
//! Header `File Name,SMILES,SELFIES,Confidence,Processing Time`, text fields
//! in double quotes (embedded quotes doubled), numeric fields bare. A row
//! without a confidence exports an empty quoted field.

use crate::aggregate::ConversionResult;
use crate::error::MolSnapError;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Suggested file name for a download.
pub const CSV_FILE_NAME: &str = "chemical_conversion_results.csv";

/// Header row, written unquoted.
pub const CSV_HEADER: &str = "File Name,SMILES,SELFIES,Confidence,Processing Time";

/// Serialise `results` as CSV into `writer`.
pub fn write_csv<W: Write>(results: &[ConversionResult], mut writer: W) -> io::Result<()> {
    writer.write_all(CSV_HEADER.as_bytes())?;
    writer.write_all(b"\n")?;

    for r in results {
        let text = quoted_text([r.file_name.as_str(), r.smiles.as_str(), r.selfies.as_str()])?;
        writer.write_all(&text)?;
        match r.confidence {
            Some(c) => write!(writer, "{c},")?,
            None => writer.write_all(b"\"\",")?,
        }
        writeln!(writer, "{}", r.processing_time)?;
    }
    writer.flush()
}

/// The text columns, always quoted, each followed by a comma.
fn quoted_text(fields: [&str; 3]) -> io::Result<Vec<u8>> {
    let mut wtr = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b','))
        .has_headers(false)
        .from_writer(Vec::with_capacity(64));
    wtr.write_record(fields)?;
    wtr.into_inner().map_err(|e| e.into_error())
}

/// Serialise `results` as a CSV string.
pub fn to_csv_string(results: &[ConversionResult]) -> io::Result<String> {
    let mut buf = Vec::new();
    write_csv(results, &mut buf)?;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Write the CSV to `path` atomically (temp file + rename).
///
/// When `path` is an existing directory the file is created inside it as
/// [`CSV_FILE_NAME`]. Returns the path written.
pub async fn export_to_file(
    results: &[ConversionResult],
    path: impl AsRef<Path>,
) -> Result<PathBuf, MolSnapError> {
    let mut path = path.as_ref().to_path_buf();
    if tokio::fs::metadata(&path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
    {
        path.push(CSV_FILE_NAME);
    }

    let write_err = |source: io::Error| MolSnapError::OutputWriteFailed {
        path: path.clone(),
        source,
    };

    let csv = to_csv_string(results).map_err(write_err)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("csv.tmp");
    tokio::fs::write(&tmp_path, csv.as_bytes())
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, &path).await.map_err(write_err)?;

    info!("Exported {} results to {}", results.len(), path.display());
    Ok(path)
}
