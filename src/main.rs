use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use b3_2d::{
    anba::find_anba_inputs,
    plotting::{plot_bom_spanwise, plot_mesh, plot_section_anba, plot_span_anba, plot_span_matrices},
    span::collect_bom_spanwise,
    AnbaResults, AnbaRunner, AnbaStep, Bom, CgfoilMesher, Config, MeshStep, PostStep, Step,
    SurfaceMesh,
};
use clap::{Parser, Subcommand, ValueEnum};

/// Blade cross-section meshing and ANBA4 beam-section analysis
#[derive(Parser)]
#[command(name = "b3_2d", about, long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short = 'V', long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process VTP file for multi-section meshing
    Mesh {
        /// Input VTP file
        #[arg(short, long)]
        vtp_file: PathBuf,
        /// Output directory
        #[arg(short, long)]
        output_dir: PathBuf,
        /// Number of processes
        #[arg(short, long)]
        num_processes: Option<usize>,
        /// Configuration file (mesher, section parameters and material database)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Plot a mesh
    Plot {
        /// Input mesh file
        #[arg(short, long)]
        mesh_file: PathBuf,
        /// Output plot file
        #[arg(short, long)]
        output_file: PathBuf,
        /// Cell data used to color the mesh
        #[arg(short, long, default_value = "material_id")]
        scalar: String,
    },
    /// ANBA4 commands
    Anba {
        #[command(subcommand)]
        command: AnbaCommands,
    },
    /// Plot ANBA stiffnesses and masses along blade span
    Span {
        /// Output directory containing section_*/
        #[arg(short, long)]
        output_dir: PathBuf,
        /// Output plot file
        #[arg(short = 'f', long)]
        output_file: PathBuf,
        /// Plot file of the stiffness and mass matrices diagonals
        #[arg(short, long)]
        matrices_file: Option<PathBuf>,
    },
    /// Plot the bills of materials along blade span and sum them
    Bom {
        /// Output directory containing section_*/
        #[arg(short, long)]
        output_dir: PathBuf,
        /// Output plot file
        #[arg(short = 'f', long)]
        output_file: PathBuf,
        /// Configuration file with the material database
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Run a workflow step
    Step {
        #[arg(value_enum)]
        step: StepName,
        /// Configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(Subcommand)]
enum AnbaCommands {
    /// Run ANBA4 on a single anba.json file
    Single {
        /// Input anba.json file
        #[arg(short, long)]
        json_file: PathBuf,
        /// Conda environment for ANBA4
        #[arg(short = 'e', long, default_value = "anba4-env")]
        anba_env: String,
    },
    /// Run ANBA4 on all section anba.json files
    All {
        /// Output directory containing section_*/anba.json
        #[arg(short, long)]
        output_dir: PathBuf,
        /// Conda environment for ANBA4
        #[arg(short = 'e', long, default_value = "anba4-env")]
        anba_env: String,
        /// Solve the sections one by one on this many threads
        #[arg(short, long)]
        num_processes: Option<usize>,
    },
    /// Plot ANBA4 results for a section
    Plot {
        /// Input anba_out.json file with results
        #[arg(short, long)]
        json_file: PathBuf,
        /// Output plot file
        #[arg(short, long)]
        output_file: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StepName {
    Mesh,
    Anba,
    Post,
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path).with_context(|| format!("loading {path:?}")),
        None => Ok(Config::default()),
    }
}

fn anba(command: AnbaCommands) -> Result<()> {
    match command {
        AnbaCommands::Single {
            json_file,
            anba_env,
        } => {
            let runner = AnbaRunner::new(anba_env)?;
            runner.check_env()?;
            let run = runner.run_single(&json_file)?;
            if !run.stdout.is_empty() {
                log::info!("{}", run.stdout.trim());
            }
            if run.success {
                log::info!("ANBA4 completed for {json_file:?}");
            } else {
                bail!("ANBA4 failed for {json_file:?}: {}", run.stderr.trim());
            }
        }
        AnbaCommands::All {
            output_dir,
            anba_env,
            num_processes,
        } => {
            let files = find_anba_inputs(&output_dir)?;
            if files.is_empty() {
                log::warn!("No anba.json files found");
                return Ok(());
            }
            let runner = AnbaRunner::new(anba_env)?;
            runner.check_env()?;
            let runs = match num_processes {
                Some(n) => runner.run_pool(&files, n)?,
                None => vec![runner.run_all(&files)?],
            };
            let n_failed = runs.iter().filter(|r| !r.success).count();
            if n_failed > 0 {
                bail!("ANBA4 failed for {n_failed} run(s)");
            }
            log::info!("ANBA4 completed for all sections");
        }
        AnbaCommands::Plot {
            json_file,
            output_file,
        } => {
            let vtk_file = json_file
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join(b3_2d::pipeline::MESH_FILE);
            if !vtk_file.exists() {
                bail!("VTK file not found: {vtk_file:?}");
            }
            let mesh = SurfaceMesh::read(&vtk_file)?;
            let results = AnbaResults::load(&json_file)?;
            plot_section_anba(&mesh, &results, &output_file)?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_default_env()
        .filter_level(if cli.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    match cli.command {
        Commands::Mesh {
            vtp_file,
            output_dir,
            num_processes,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let mesher = CgfoilMesher::from(&config.mesher);
            let results = b3_2d::process_vtp_multi_section(
                &vtp_file,
                &output_dir,
                num_processes,
                &config,
                &mesher,
            )?;
            println!("{}", b3_2d::step::results_table(&results));
        }
        Commands::Plot {
            mesh_file,
            output_file,
            scalar,
        } => {
            let mesh = SurfaceMesh::read(&mesh_file)?;
            plot_mesh(&mesh, Some(scalar.as_str()), &output_file)?;
        }
        Commands::Anba { command } => anba(command)?,
        Commands::Span {
            output_dir,
            output_file,
            matrices_file,
        } => {
            if !plot_span_anba(&output_dir, &output_file)? {
                log::warn!("ANBA plot not generated (no ANBA data found)");
            }
            if let Some(matrices_file) = matrices_file {
                plot_span_matrices(&output_dir, &matrices_file)?;
            }
        }
        Commands::Bom {
            output_dir,
            output_file,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            plot_bom_spanwise(&output_dir, &output_file, Some(&config.matdb))?;
            let boms = collect_bom_spanwise(&output_dir);
            let total = Bom::accumulate(boms.iter().map(|(_, bom)| bom));
            println!("{}", serde_json::to_string_pretty(&total)?);
        }
        Commands::Step { step, config } => {
            let cfg = Config::load(&config).with_context(|| format!("loading {config:?}"))?;
            let step: Box<dyn Step> = match step {
                StepName::Mesh => Box::new(MeshStep::new()),
                StepName::Anba => Box::new(AnbaStep::new()),
                StepName::Post => Box::new(PostStep::new()),
            };
            step.run(&cfg, &config)?;
        }
    }
    Ok(())
}
