//! # Section mesher
//!
//! The triangulation of a section model is delegated to an external program.

use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
    process::Command,
};

use crate::{
    config::MesherConfig,
    mesh::MeshError,
    model::{AirfoilMesh, ModelError},
    SurfaceMesh,
};

/// Mesher JSON input file name
pub const MODEL_FILE: &str = "cgfoil.json";
/// Per-section log file name
pub const SECTION_LOG: &str = "2dmesh.log";

#[derive(Debug, thiserror::Error)]
pub enum MesherError {
    #[error("cannot write the mesher input")]
    Model(#[from] ModelError),
    #[error("cannot run the mesher program {1}")]
    Spawn(#[source] std::io::Error, String),
    #[error("mesher exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("the model has no VTK output file")]
    NoOutput,
    #[error("cannot read the mesher output")]
    Mesh(#[from] MeshError),
    #[error("cannot write to log file {1}")]
    Log(#[source] std::io::Error, PathBuf),
}
pub type Result<T> = std::result::Result<T, MesherError>;

/// Section mesher interface
pub trait Mesher: Send + Sync {
    /// Meshes the model in the section directory and returns the triangulated section
    fn mesh(&self, model: &AirfoilMesh, section_dir: &Path) -> Result<SurfaceMesh>;
}

/// `cgfoil` command line mesher
///
/// The model is written to `cgfoil.json` in the section directory and the mesher is
/// called with `<program> <args...> cgfoil.json` from within the section directory.
#[derive(Debug, Clone, Default)]
pub struct CgfoilMesher {
    program: String,
    args: Vec<String>,
}
impl From<&MesherConfig> for CgfoilMesher {
    fn from(config: &MesherConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
        }
    }
}
impl CgfoilMesher {
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
            args: vec![],
        }
    }
    /// Appends arguments to the mesher command line
    pub fn args<I, S>(self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut all_args = self.args;
        all_args.extend(args.into_iter().map(|a| a.into()));
        Self {
            args: all_args,
            ..self
        }
    }
}

impl Mesher for CgfoilMesher {
    fn mesh(&self, model: &AirfoilMesh, section_dir: &Path) -> Result<SurfaceMesh> {
        let vtk = model.vtk.as_ref().ok_or(MesherError::NoOutput)?;
        model.dump(section_dir.join(MODEL_FILE))?;
        log::debug!(
            "{} {} {} in {:?}",
            self.program,
            self.args.join(" "),
            MODEL_FILE,
            section_dir
        );
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(MODEL_FILE)
            .current_dir(section_dir)
            .output()
            .map_err(|e| MesherError::Spawn(e, self.program.clone()))?;

        let log_path = section_dir.join(SECTION_LOG);
        let mut log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(|e| MesherError::Log(e, log_path.clone()))?;
        log_file
            .write_all(&output.stdout)
            .and_then(|_| log_file.write_all(&output.stderr))
            .map_err(|e| MesherError::Log(e, log_path.clone()))?;

        if !output.status.success() {
            return Err(MesherError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(SurfaceMesh::read(section_dir.join(vtk))?)
    }
}

/// Adds the `Area` cell array to the mesh if it is missing
pub fn ensure_cell_area(mesh: &mut SurfaceMesh) -> bool {
    let added = mesh.ensure_cell_area();
    if added {
        log::debug!("Area cell data computed from the mesh cells");
    }
    added
}
