//! Session files in, analysis files out.
//!
//! The analysis core never touches the filesystem; these helpers are what
//! the CLI uses to read move records and persist results as JSON and CSV.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::engine::LinkographAnalysis;
use crate::error::{AppError, AppResult, LinkographError};
use crate::metrics::LinkographMetrics;
use crate::moves::{MoveRecord, MoveStore};

/// Accepted session file layouts.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SessionFile {
    Records(Vec<MoveRecord>),
    Wrapped { moves: Vec<MoveRecord> },
}

/// Read and validate one session file.
///
/// The file holds either a JSON array of move records or an object with a
/// `moves` array.
pub fn read_session(path: &Path) -> AppResult<MoveStore> {
    let raw = std::fs::read_to_string(path)?;
    let records = match serde_json::from_str(&raw)? {
        SessionFile::Records(records) => records,
        SessionFile::Wrapped { moves } => moves,
    };
    let store = MoveStore::from_records(records).map_err(LinkographError::from)?;

    debug!(
        path = %path.display(),
        session_id = %store.session_id(),
        moves = store.len(),
        "Session file loaded"
    );
    Ok(store)
}

/// File name used for a session's analysis output.
///
/// Ids that need character replacement get a short digest of the raw id
/// appended, so `studio/7` and `studio_7` land in different files.
pub fn analysis_file_name(session_id: &str) -> String {
    let safe: String = session_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if safe == session_id && !safe.is_empty() {
        return format!("{}.linkograph.json", safe);
    }
    let digest = Sha256::digest(session_id.as_bytes());
    let tag: String = digest[..4].iter().map(|b| format!("{:02x}", b)).collect();
    format!("{}-{}.linkograph.json", safe, tag)
}

/// Write an analysis as pretty JSON into `dir`, returning the file path.
pub fn write_analysis_json(
    analysis: &LinkographAnalysis,
    dir: &Path,
    strip_embeddings: bool,
) -> AppResult<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(analysis_file_name(analysis.session_id()));
    let mut writer = BufWriter::new(File::create(&path)?);

    if strip_embeddings {
        serde_json::to_writer_pretty(&mut writer, &analysis.without_embeddings())?;
    } else {
        serde_json::to_writer_pretty(&mut writer, analysis)?;
    }
    writer.flush()?;

    info!(
        session_id = %analysis.session_id(),
        path = %path.display(),
        "Analysis written"
    );
    Ok(path)
}

/// Writes analyses into one directory, refusing to overwrite a file already
/// written by the same writer.
#[derive(Debug)]
pub struct AnalysisWriter {
    dir: PathBuf,
    strip_embeddings: bool,
    written: HashMap<PathBuf, String>,
}

impl AnalysisWriter {
    /// Writer for `dir`.
    pub fn new(dir: impl Into<PathBuf>, strip_embeddings: bool) -> Self {
        Self {
            dir: dir.into(),
            strip_embeddings,
            written: HashMap::new(),
        }
    }

    /// Write one analysis. Two analyses with the same session id in one run
    /// are an [`AppError::OutputCollision`]; the first file is kept.
    pub fn write(&mut self, analysis: &LinkographAnalysis) -> AppResult<PathBuf> {
        let path = self.dir.join(analysis_file_name(analysis.session_id()));
        if let Some(existing) = self.written.get(&path) {
            warn!(
                session_id = %analysis.session_id(),
                path = %path.display(),
                "Analysis output already written in this run"
            );
            return Err(AppError::OutputCollision {
                path: path.display().to_string(),
                existing: existing.clone(),
            });
        }

        let path = write_analysis_json(analysis, &self.dir, self.strip_embeddings)?;
        self.written
            .insert(path.clone(), analysis.session_id().to_string());
        Ok(path)
    }

    /// Number of files written so far
    pub fn written(&self) -> usize {
        self.written.len()
    }
}

/// Write one CSV row of metrics per analysis.
pub fn write_metrics_csv<'a, I>(path: &Path, analyses: I) -> AppResult<usize>
where
    I: IntoIterator<Item = &'a LinkographAnalysis>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "{}", LinkographMetrics::csv_header())?;

    let mut rows = 0;
    for analysis in analyses {
        writeln!(writer, "{}", analysis.metrics.to_csv_row(analysis.session_id()))?;
        rows += 1;
    }
    writer.flush()?;

    info!(path = %path.display(), rows, "Metrics CSV written");
    Ok(rows)
}
