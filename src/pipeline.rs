//! # Section processing pipeline
//!
//! Each section of the draped blade is processed independently in its own
//! `section_<id>` directory:
//!  1. extraction of the section and removal of its twist and offset,
//!  2. creation of the skins and webs model,
//!  3. meshing of the model,
//!  4. export of the mesh (`output.vtk`), of the ANBA4 input (`anba.json`)
//!     and of the bill of materials (`bom.json`).

use std::{
    error::Error,
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;

use crate::{
    anba::ANBA_INPUT,
    compute_bom,
    mesher::{ensure_cell_area, MODEL_FILE, SECTION_LOG},
    plotting::{plot_mesh, plot_section_debug},
    section::{self, detransform, extract_airfoil_and_web_points, extract_section},
    span::BOM_FILE,
    AirfoilMeshBuilder, AnbaInput, Builder, Config, Mesher, SurfaceMesh,
};

/// Mesh file name of a section
pub const MESH_FILE: &str = "output.vtk";

/// Outcome of the processing of a section
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SectionResult {
    pub section_id: i64,
    pub success: bool,
    pub errors: Vec<String>,
    pub output_dir: PathBuf,
    pub created_files: Vec<PathBuf>,
}
impl SectionResult {
    fn new(section_id: i64, output_dir: PathBuf) -> Self {
        Self {
            section_id,
            output_dir,
            ..Default::default()
        }
    }
    fn failed(mut self, error: &dyn Error) -> Self {
        self.success = false;
        self.errors.push(error_chain(error));
        self
    }
}

/// Error message with all its sources
pub(crate) fn error_chain(error: &dyn Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(e) = source {
        message.push_str(": ");
        message.push_str(&e.to_string());
        source = e.source();
    }
    message
}

/// Section log file, messages are also sent to the logger
struct SectionLog {
    section_id: i64,
    path: PathBuf,
}
impl SectionLog {
    fn create(section_id: i64, section_dir: &Path) -> std::io::Result<Self> {
        let path = section_dir.join(SECTION_LOG);
        File::create(&path)?;
        Ok(Self { section_id, path })
    }
    fn write(&self, level: log::Level, message: &str) {
        log::log!(level, "section #{}: {}", self.section_id, message);
        if let Err(e) = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .and_then(|mut file| writeln!(file, "[{level}] {message}"))
        {
            log::warn!("cannot write to {:?}: {e}", self.path);
        }
    }
    fn info(&self, message: &str) {
        self.write(log::Level::Info, message)
    }
    fn warn(&self, message: &str) {
        self.write(log::Level::Warn, message)
    }
}

fn run_section(
    section_id: i64,
    mesh: &SurfaceMesh,
    section_dir: &Path,
    config: &Config,
    mesher: &dyn Mesher,
    log: &SectionLog,
    created_files: &mut Vec<PathBuf>,
) -> crate::Result<()> {
    let mut section = extract_section(mesh, section_id)?;
    log.info(&format!(
        "{} cells, {} points",
        section.n_cells(),
        section.n_points()
    ));
    if config.section.plot {
        match plot_section_debug(&section, &config.section, section_dir, section_id) {
            Ok(files) => created_files.extend(files),
            Err(e) => log.warn(&error_chain(&e)),
        }
    }
    if !detransform(&mut section) {
        log.info("no twist/dx/dy cell data, the section is used as is");
    }

    let geometry = extract_airfoil_and_web_points(&section, &config.section)?;
    log.info(&format!(
        "airfoil: {} points, trailing edge: {}, webs: {}",
        geometry.airfoil_points.len(),
        if geometry.te.is_some() { "merged" } else { "none" },
        geometry.n_webs()
    ));
    let model = AirfoilMeshBuilder::from_section(&geometry, &config.section)?
        .vtk(MESH_FILE)
        .build()?;

    let mut section_mesh = mesher.mesh(&model, section_dir)?;
    let model_file = section_dir.join(MODEL_FILE);
    if model_file.exists() {
        created_files.push(model_file);
    }
    if ensure_cell_area(&mut section_mesh) {
        log.info("Area cell data added to the mesh");
    }
    let mesh_file = section_dir.join(MESH_FILE);
    section_mesh.write(&mesh_file)?;
    created_files.push(mesh_file);

    let anba_file = section_dir.join(ANBA_INPUT);
    AnbaInput::from_mesh(&section_mesh, &config.matdb)?.dump(&anba_file)?;
    created_files.push(anba_file);

    match compute_bom(&section_mesh, Some(&config.matdb)) {
        Some(bom) => {
            let bom_file = section_dir.join(BOM_FILE);
            bom.dump(&bom_file)?;
            created_files.push(bom_file);
        }
        None => log.warn("Area or material_id cell data missing, no bill of materials"),
    }

    if config.section.plot {
        let plot_file = section_dir.join("mesh.png");
        match plot_mesh(&section_mesh, Some("material_id"), &plot_file) {
            Ok(()) => created_files.push(plot_file),
            Err(e) => log.warn(&error_chain(&e)),
        }
    }
    Ok(())
}

/// Processes a section of the draped mesh
///
/// Errors are logged and reported in the returned [`SectionResult`].
pub fn process_section<P: AsRef<Path>>(
    section_id: i64,
    mesh: &SurfaceMesh,
    output_base_dir: P,
    config: &Config,
    mesher: &dyn Mesher,
) -> SectionResult {
    let section_dir = output_base_dir.as_ref().join(format!("section_{section_id}"));
    let mut result = SectionResult::new(section_id, section_dir.clone());
    let log = match fs::create_dir_all(&section_dir)
        .and_then(|_| SectionLog::create(section_id, &section_dir))
    {
        Ok(log) => log,
        Err(e) => {
            log::error!("Error processing section_id {section_id}: {e}");
            return result.failed(&e);
        }
    };
    log.info("Starting processing");
    match run_section(
        section_id,
        mesh,
        &section_dir,
        config,
        mesher,
        &log,
        &mut result.created_files,
    ) {
        Ok(()) => {
            result.success = true;
            log.info("Completed processing");
            result
        }
        Err(e) => {
            let message = error_chain(&e);
            log.write(log::Level::Error, &message);
            result.errors.push(message);
            result
        }
    }
}

/// Loads the draped mesh and processes a section
///
/// Errors are logged and reported in the returned [`SectionResult`].
pub fn process_single_section<P: AsRef<Path>, Q: AsRef<Path>>(
    section_id: i64,
    vtp_file: P,
    output_base_dir: Q,
    config: &Config,
    mesher: &dyn Mesher,
) -> SectionResult {
    match SurfaceMesh::load_draped(vtp_file, config.section.rotation_angle) {
        Ok(mesh) => process_section(section_id, &mesh, output_base_dir, config, mesher),
        Err(e) => {
            log::error!("Error processing section_id {section_id}: {e}");
            let section_dir = output_base_dir
                .as_ref()
                .join(format!("section_{section_id}"));
            SectionResult::new(section_id, section_dir).failed(&e)
        }
    }
}

/// Processes all the sections of the draped mesh
///
/// The sections are processed in parallel on `num_processes` threads,
/// default to the smallest of the number of CPUs and of the number of sections.
/// The results are sorted by section id.
pub fn process_vtp_multi_section<P: AsRef<Path>, Q: AsRef<Path>>(
    vtp_file: P,
    output_base_dir: Q,
    num_processes: Option<usize>,
    config: &Config,
    mesher: &dyn Mesher,
) -> crate::Result<Vec<SectionResult>> {
    let mesh = SurfaceMesh::load_draped(vtp_file, config.section.rotation_angle)?;
    let ids = section::section_ids(&mesh)?;
    log::info!("Found {} unique section_ids: {:?}", ids.len(), ids);
    fs::create_dir_all(&output_base_dir)?;

    let n_thread = num_processes
        .or(config.num_processes)
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
                .min(ids.len())
        })
        .max(1);
    log::info!("Using {n_thread} threads");
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(n_thread)
        .build()?;

    let pb = ProgressBar::new(ids.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("{msg} [{eta_precise}] {bar:50.cyan/blue} {pos:>7}/{len:7}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb.set_message("Meshing sections");
    let output_base_dir = output_base_dir.as_ref();
    let mut results: Vec<SectionResult> = pool.install(|| {
        ids.par_iter()
            .map(|&id| {
                let result = process_section(id, &mesh, output_base_dir, config, mesher);
                pb.inc(1);
                result
            })
            .collect()
    });
    pb.finish_and_clear();
    results.sort_by_key(|r| r.section_id);

    let n_success = results.iter().filter(|r| r.success).count();
    log::info!(
        "{}/{} sections processed successfully",
        n_success,
        results.len()
    );
    Ok(results)
}
