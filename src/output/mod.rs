//! JSON document output

use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Output writer errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error writing {path}: {source}")]
    Io {
        /// Destination path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Serialization error
    #[error("serialization error writing {path}: {source}")]
    Serialize {
        /// Destination path
        path: String,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Write `value` as pretty-printed JSON, replacing any existing file.
///
/// Missing parent directories are created.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> OutputResult<()> {
    let shown = path.display().to_string();
    let io_err = |source| OutputError::Io {
        path: shown.clone(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|source| OutputError::Serialize {
        path: shown.clone(),
        source,
    })?;
    writer.write_all(b"\n").map_err(io_err)?;
    writer.flush().map_err(io_err)?;

    debug!(path = %shown, "Wrote JSON output");
    Ok(())
}
