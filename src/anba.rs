//! # ANBA4 beam cross-section solver
//!
//! ANBA4 runs in its own conda environment, it is given the `anba.json` files
//! of the sections and writes the `anba_out.json` results next to them.

use std::path::PathBuf;

mod input;
mod results;
mod runner;
pub use input::AnbaInput;
pub use results::AnbaResults;
pub use runner::{find_anba_inputs, AnbaRun, AnbaRunner};

/// Solver input file name
pub const ANBA_INPUT: &str = "anba.json";
/// Solver output file name
pub const ANBA_OUTPUT: &str = "anba_out.json";
/// Solver log file name
pub const ANBA_LOG: &str = "anba_solve.log";

#[derive(Debug, thiserror::Error)]
pub enum AnbaError {
    #[error("Conda not found - please install conda")]
    CondaNotFound,
    #[error("Conda environment {0} not found - please create it")]
    EnvNotFound(String),
    #[error("cannot run {1}")]
    Spawn(#[source] std::io::Error, PathBuf),
    #[error("{0} not found in mesh cell data")]
    MissingCellData(String),
    #[error("No anba.json files found in {0}")]
    NoInputs(PathBuf),
    #[error("cannot read/write {1}")]
    Io(#[source] std::io::Error, PathBuf),
    #[error("ANBA4 JSON (de)serialization failure")]
    Json(#[from] serde_json::Error),
    #[error("invalid file pattern")]
    Pattern(#[from] glob::PatternError),
    #[error("cannot create the solver thread pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
pub type Result<T> = std::result::Result<T, AnbaError>;

/// Section id from a `section_<id>` directory name
pub(crate) fn section_id_from_path(path: &std::path::Path) -> Option<i64> {
    path.components()
        .rev()
        .filter_map(|c| c.as_os_str().to_str())
        .find_map(|name| name.strip_prefix("section_"))
        .and_then(|id| id.parse().ok())
}
