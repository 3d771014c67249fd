//! # Pipeline steps
//!
//! The b3-2d steps of the blade workflow, each step works inside
//! `<configuration file directory>/<workdir>`:
//!  * [`MeshStep`] (`b3_2d_mesh`): `b3_drp/draped.vtk` to `b3_2d/section_*`
//!  * [`AnbaStep`] (`b3_2d_anba`): `b3_2d/section_*/anba.json` to `anba4_results/`
//!  * [`PostStep`] (`b3_2d_post`): spanwise plots and total bill of materials

use std::{
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
};

use crate::{
    anba::{find_anba_inputs, ANBA_LOG},
    pipeline::error_chain,
    plotting::{plot_bom_spanwise, plot_span_anba},
    process_vtp_multi_section,
    span::collect_bom_spanwise,
    AnbaRunner, Bom, CgfoilMesher, Config, Mesher, SectionResult,
};

/// Draped mesh, relative to the work directory
pub const DRAPED_FILE: &str = "b3_drp/draped.vtk";
/// Sections directory, relative to the work directory
pub const SECTIONS_DIR: &str = "b3_2d";
/// ANBA4 log directory, relative to the work directory
pub const ANBA_RESULTS_DIR: &str = "anba4_results";
/// Total bill of materials file name
pub const BOM_TOTAL_FILE: &str = "bom_total.json";

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("{step}: input {path} not found")]
    MissingInput { step: String, path: PathBuf },
    #[error("{step}: input {path} is empty")]
    EmptyInput { step: String, path: PathBuf },
}

/// Step input file or directory, relative to the work directory
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedFile {
    pub name: String,
    pub non_empty: bool,
}
impl ManagedFile {
    pub fn new<S: Into<String>>(name: S, non_empty: bool) -> Self {
        Self {
            name: name.into(),
            non_empty,
        }
    }
    /// Checks that the file exists in `workdir`, and is not empty if required
    ///
    /// A directory is empty if it has no entries.
    pub fn check<P: AsRef<Path>>(&self, workdir: P, step: &str) -> Result<(), StepError> {
        let path = workdir.as_ref().join(&self.name);
        let Ok(metadata) = fs::metadata(&path) else {
            return Err(StepError::MissingInput {
                step: step.into(),
                path,
            });
        };
        let empty = if metadata.is_dir() {
            fs::read_dir(&path)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(true)
        } else {
            metadata.len() == 0
        };
        if self.non_empty && empty {
            Err(StepError::EmptyInput {
                step: step.into(),
                path,
            })
        } else {
            Ok(())
        }
    }
}

/// Workflow step interface
pub trait Step {
    fn name(&self) -> &str;
    fn input_files(&self) -> Vec<ManagedFile>;
    fn output_files(&self) -> Vec<&str>;
    /// Steps this step depends on
    fn dependent_sections(&self) -> Vec<&str>;
    /// Executes the step, `config_path` is the path to the configuration file
    fn execute(&self, config: &Config, config_path: &Path) -> crate::Result<()>;
    /// Checks the inputs and executes the step
    fn run(&self, config: &Config, config_path: &Path) -> crate::Result<()> {
        let workdir = config.resolve_workdir(config_path);
        for input in self.input_files() {
            input.check(&workdir, self.name())?;
        }
        log::info!("Running step {} in {:?}", self.name(), workdir);
        self.execute(config, config_path)
    }
}

/// Formats the section results as a table
pub fn results_table(results: &[SectionResult]) -> String {
    let header = ["Section ID", "Success", "Errors", "Path", "Created Files"];
    let rows: Vec<[String; 5]> = results
        .iter()
        .map(|r| {
            [
                r.section_id.to_string(),
                r.success.to_string(),
                r.errors.join("; "),
                r.output_dir.display().to_string(),
                r.created_files
                    .iter()
                    .filter_map(|f| f.file_name())
                    .map(|f| f.to_string_lossy())
                    .collect::<Vec<_>>()
                    .join(", "),
            ]
        })
        .collect();
    let mut widths = header.map(str::len);
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.len());
        }
    }
    let mut table = String::from("Section Processing Results\n");
    let mut line = |cells: &[&str]| {
        let row: Vec<String> = cells
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(i, (cell, &w))| {
                if i == 0 {
                    format!("{cell:>w$}")
                } else {
                    format!("{cell:<w$}")
                }
            })
            .collect();
        let _ = writeln!(table, "| {} |", row.join(" | "));
    };
    let separator: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    line(&header);
    line(&separator.iter().map(String::as_str).collect::<Vec<_>>());
    for row in &rows {
        line(&row.iter().map(String::as_str).collect::<Vec<_>>());
    }
    table
}

/// Section meshing step
///
/// The sections are meshed with [`CgfoilMesher`] configured from the `[mesher]`
/// table unless another mesher is given.
#[derive(Default)]
pub struct MeshStep {
    mesher: Option<Box<dyn Mesher>>,
}
impl MeshStep {
    pub fn new() -> Self {
        Default::default()
    }
    /// Replaces the default mesher
    pub fn mesher<M: Mesher + 'static>(self, mesher: M) -> Self {
        Self {
            mesher: Some(Box::new(mesher)),
        }
    }
}
impl Step for MeshStep {
    fn name(&self) -> &str {
        "b3_2d_mesh"
    }
    fn input_files(&self) -> Vec<ManagedFile> {
        vec![ManagedFile::new(DRAPED_FILE, true)]
    }
    fn output_files(&self) -> Vec<&str> {
        vec!["b3_2d/"]
    }
    fn dependent_sections(&self) -> Vec<&str> {
        vec!["draping"]
    }
    fn execute(&self, config: &Config, config_path: &Path) -> crate::Result<()> {
        log::info!("Executing MeshStep: 2D meshing with cgfoil.");
        let workdir = config.resolve_workdir(config_path);
        let output_dir = workdir.join(SECTIONS_DIR);
        fs::create_dir_all(&output_dir)?;
        let default_mesher = CgfoilMesher::from(&config.mesher);
        let mesher: &dyn Mesher = self.mesher.as_deref().unwrap_or(&default_mesher);
        let results = process_vtp_multi_section(
            workdir.join(DRAPED_FILE),
            &output_dir,
            config.num_processes,
            config,
            mesher,
        )?;
        println!("{}", results_table(&results));
        log::info!("2D meshing completed, outputs in {output_dir:?}");
        Ok(())
    }
}

/// ANBA4 solver step
///
/// All the sections are solved with a single solver invocation, the solver
/// outputs are written to `anba4_results/anba_solve.log`.
/// A missing input, conda installation or conda environment is logged as an error.
#[derive(Debug, Default, Clone)]
pub struct AnbaStep {
    conda: Option<PathBuf>,
}
impl AnbaStep {
    pub fn new() -> Self {
        Default::default()
    }
    /// Sets the conda executable instead of looking for it
    pub fn conda<P: Into<PathBuf>>(self, conda: P) -> Self {
        Self {
            conda: Some(conda.into()),
        }
    }
}
impl Step for AnbaStep {
    fn name(&self) -> &str {
        "b3_2d_anba"
    }
    fn input_files(&self) -> Vec<ManagedFile> {
        vec![ManagedFile::new("b3_2d/", true)]
    }
    fn output_files(&self) -> Vec<&str> {
        vec!["anba4_results/"]
    }
    fn dependent_sections(&self) -> Vec<&str> {
        vec!["b3_2d_mesh"]
    }
    fn execute(&self, config: &Config, config_path: &Path) -> crate::Result<()> {
        log::info!("Executing AnbaStep: Running ANBA4 on cgfoil outputs.");
        let workdir = config.resolve_workdir(config_path);
        let files = find_anba_inputs(workdir.join(SECTIONS_DIR))?;
        if files.is_empty() {
            log::error!("No anba.json files found in b3_2d/");
            return Ok(());
        }
        let runner = match &self.conda {
            Some(conda) => AnbaRunner::with_conda(conda, config.anba_env.as_str()),
            None => match AnbaRunner::new(config.anba_env.as_str()) {
                Ok(runner) => runner,
                Err(e) => {
                    log::error!("{e}");
                    return Ok(());
                }
            },
        };
        if let Err(e) = runner.check_env() {
            log::error!("{}", error_chain(&e));
            return Ok(());
        }
        let results_dir = workdir.join(ANBA_RESULTS_DIR);
        fs::create_dir_all(&results_dir)?;
        let run = runner.run_all(&files)?;
        AnbaRunner::write_log(results_dir.join(ANBA_LOG), std::slice::from_ref(&run))?;
        if run.success {
            log::info!("ANBA4 completed successfully, outputs in {results_dir:?}");
        } else {
            log::info!("ANBA4 completed with errors");
        }
        log::info!("ANBA4 processing completed");
        Ok(())
    }
}

/// Post-processing step
///
/// Writes the spanwise plots of the bills of materials and of the ANBA4 results,
/// and the bill of materials of the whole blade.
#[derive(Debug, Default, Clone)]
pub struct PostStep;
impl PostStep {
    pub fn new() -> Self {
        Self
    }
}
impl Step for PostStep {
    fn name(&self) -> &str {
        "b3_2d_post"
    }
    fn input_files(&self) -> Vec<ManagedFile> {
        vec![ManagedFile::new("b3_2d/", true)]
    }
    fn output_files(&self) -> Vec<&str> {
        vec!["b3_2d/bom_spanwise.png", "b3_2d/anba_spanwise.png"]
    }
    fn dependent_sections(&self) -> Vec<&str> {
        vec!["b3_2d_mesh"]
    }
    fn execute(&self, config: &Config, config_path: &Path) -> crate::Result<()> {
        log::info!("Executing PostStep: Postprocessing 2D meshes and ANBA results.");
        let output_dir = config.resolve_workdir(config_path).join(SECTIONS_DIR);

        let boms = collect_bom_spanwise(&output_dir);
        if boms.is_empty() {
            log::warn!("No section bill of materials found in {output_dir:?}");
        } else {
            let total = Bom::accumulate(boms.iter().map(|(_, bom)| bom));
            let total_file = output_dir.join(BOM_TOTAL_FILE);
            total.dump(&total_file)?;
            log::info!(
                "Bill of materials of {} sections saved to {total_file:?}",
                boms.len()
            );
        }

        let bom_plot_file = output_dir.join("bom_spanwise.png");
        log::info!("Attempting to generate BOM spanwise plot: {bom_plot_file:?}");
        match plot_bom_spanwise(&output_dir, &bom_plot_file, Some(&config.matdb)) {
            Ok(true) => log::info!("BOM plot saved to {bom_plot_file:?}"),
            Ok(false) => log::warn!(
                "BOM plot not generated (no BOM data found): {bom_plot_file:?}"
            ),
            Err(e) => log::error!("{}", error_chain(&e)),
        }

        let anba_plot_file = output_dir.join("anba_spanwise.png");
        log::info!("Attempting to generate ANBA spanwise plot: {anba_plot_file:?}");
        match plot_span_anba(&output_dir, &anba_plot_file) {
            Ok(true) => log::info!("ANBA plot saved to {anba_plot_file:?}"),
            Ok(false) => log::warn!(
                "ANBA plot not generated (no ANBA data found): {anba_plot_file:?}"
            ),
            Err(e) => log::error!("{}", error_chain(&e)),
        }

        log::info!("Postprocessing completed.");
        Ok(())
    }
}
