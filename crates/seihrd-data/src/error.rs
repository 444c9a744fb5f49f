use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document does not have the expected shape. Fatal at load time.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Dates or bands are missing relative to the simulation grid.
    #[error("data shape error: {0}")]
    DataShape(String),
}
