use thiserror::Error;

/// Errors that abort an assessment run.
///
/// Only setup-level problems are errors. Per-pixel and per-class
/// degeneracies (a configured class absent from the raster, a clump with no
/// reachable supply, an empty averaging set) resolve to nodata or sentinel
/// outputs plus a warning in the run log.
#[derive(Debug, Error)]
pub enum AssessmentError {
    /// Input rasters differ in shape. Detected before a stage runs.
    #[error(
        "alignment: raster `{name}` is {found_rows}x{found_cols}, \
         expected {expected_rows}x{expected_cols}"
    )]
    Alignment {
        name: String,
        expected_rows: usize,
        expected_cols: usize,
        found_rows: usize,
        found_cols: usize,
    },

    /// Invalid configuration, rejected at setup.
    #[error("config: {reason}")]
    Config { reason: String },

    /// The run's cancel token was triggered; names the observing stage.
    #[error("cancelled during {stage}")]
    Cancelled { stage: &'static str },
}

pub type Result<T> = std::result::Result<T, AssessmentError>;
