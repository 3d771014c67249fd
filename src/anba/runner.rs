use std::{
    env,
    ffi::OsStr,
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    process::Command,
    time::Duration,
};

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use super::{section_id_from_path, AnbaError, Result, ANBA_INPUT};

/// `anba.json` files of the `section_*` sub-directories, sorted by section id
pub fn find_anba_inputs<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let pattern = dir.as_ref().join("section_*").join(ANBA_INPUT);
    let mut files: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())?
        .filter_map(|entry| entry.ok())
        .collect();
    files.sort_by_key(|f| (section_id_from_path(f).unwrap_or(i64::MAX), f.clone()));
    Ok(files)
}

/// Outcome of an ANBA4 invocation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnbaRun {
    pub files: Vec<PathBuf>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}
impl AnbaRun {
    fn header(&self) -> String {
        match self.files.as_slice() {
            [file] => format!("--- ANBA4 run for {} ---", file.display()),
            _ => "--- ANBA4 run for all sections ---".to_string(),
        }
    }
}

/// ANBA4 solver driver
///
/// The solver is called with `conda run -n <env> anba4-run -i <files...>`
/// using a single thread for the numerical libraries.
#[derive(Debug, Clone)]
pub struct AnbaRunner {
    conda: PathBuf,
    env: String,
}
impl AnbaRunner {
    /// Creates a runner, conda is either given by `CONDA_EXE` or found in `PATH`
    pub fn new<S: Into<String>>(env: S) -> Result<Self> {
        let conda = Self::locate_conda().ok_or(AnbaError::CondaNotFound)?;
        log::debug!("conda: {conda:?}");
        Ok(Self::with_conda(conda, env))
    }
    /// Creates a runner with the given conda executable
    pub fn with_conda<P: Into<PathBuf>, S: Into<String>>(conda: P, env: S) -> Self {
        Self {
            conda: conda.into(),
            env: env.into(),
        }
    }
    pub fn locate_conda() -> Option<PathBuf> {
        if let Some(conda) = env::var_os("CONDA_EXE").filter(|c| !c.is_empty()) {
            return Some(PathBuf::from(conda));
        }
        env::var_os("PATH").and_then(|paths| {
            env::split_paths(&paths)
                .map(|dir| dir.join("conda"))
                .find(|conda| conda.is_file())
        })
    }
    pub fn env(&self) -> &str {
        &self.env
    }
    /// Checks that the conda environment exists
    pub fn check_env(&self) -> Result<()> {
        let output = Command::new(&self.conda)
            .args(["env", "list"])
            .output()
            .map_err(|e| AnbaError::Spawn(e, self.conda.clone()))?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let found = output.status.success()
            && stdout
                .lines()
                .filter(|line| !line.trim_start().starts_with('#'))
                .filter_map(|line| line.split_whitespace().next())
                .any(|name| {
                    name == self.env || Path::new(name).file_name() == Some(OsStr::new(&self.env))
                });
        if found {
            Ok(())
        } else {
            Err(AnbaError::EnvNotFound(self.env.clone()))
        }
    }
    fn command<P: AsRef<Path>>(&self, files: &[P]) -> Command {
        let mut command = Command::new(&self.conda);
        command
            .args(["run", "-n", self.env.as_str(), "anba4-run", "-i"])
            .args(files.iter().map(|f| f.as_ref().as_os_str()))
            .env("OPENBLAS_NUM_THREADS", "1")
            .env("MKL_NUM_THREADS", "1")
            .env("OMP_NUM_THREADS", "1")
            .env("CUDA_VISIBLE_DEVICES", "-1");
        command
    }
    fn run<P: AsRef<Path>>(&self, files: &[P]) -> Result<AnbaRun> {
        let output = self
            .command(files)
            .output()
            .map_err(|e| AnbaError::Spawn(e, self.conda.clone()))?;
        let run = AnbaRun {
            files: files.iter().map(|f| f.as_ref().to_path_buf()).collect(),
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        if run.success {
            log::info!("ANBA4 completed for {} file(s)", files.len());
        } else {
            log::error!("ANBA4 failed: {}", run.stderr.trim());
        }
        Ok(run)
    }
    /// Runs the solver on a single input file
    pub fn run_single<P: AsRef<Path>>(&self, file: P) -> Result<AnbaRun> {
        self.run(&[file])
    }
    /// Runs the solver once on all the input files
    pub fn run_all<P: AsRef<Path>>(&self, files: &[P]) -> Result<AnbaRun> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_message("Running ANBA4 on all sections...");
        spinner.enable_steady_tick(Duration::from_millis(100));
        let run = self.run(files);
        spinner.finish_and_clear();
        run
    }
    /// Runs the solver on each input file on a pool of `n_thread` threads
    pub fn run_pool<P: AsRef<Path> + Sync>(&self, files: &[P], n_thread: usize) -> Result<Vec<AnbaRun>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n_thread.max(1))
            .build()?;
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::with_template("{msg} [{eta_precise}] {bar:50.cyan/blue} {pos:>7}/{len:7}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        pb.set_message("ANBA4");
        let runs = pool.install(|| {
            files
                .par_iter()
                .map(|file| {
                    let run = self.run_single(file);
                    pb.inc(1);
                    run
                })
                .collect::<Result<Vec<_>>>()
        });
        pb.finish_and_clear();
        runs
    }
    /// Writes the solver outputs into a log file
    pub fn write_log<P: AsRef<Path>>(path: P, runs: &[AnbaRun]) -> Result<()> {
        let path = path.as_ref();
        let io_err = |e| AnbaError::Io(e, path.to_path_buf());
        let mut log = BufWriter::new(File::create(path).map_err(io_err)?);
        for run in runs {
            writeln!(log, "{}", run.header()).map_err(io_err)?;
            write!(log, "{}", run.stdout).map_err(io_err)?;
            if !run.stderr.is_empty() {
                write!(log, "{}", run.stderr).map_err(io_err)?;
            }
            writeln!(log, "--- {} ---", if run.success { "success" } else { "failure" })
                .map_err(io_err)?;
        }
        log.flush().map_err(io_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorted_inputs() {
        let dir = tempfile::tempdir().unwrap();
        for id in [10, 2, 1] {
            let section = dir.path().join(format!("section_{id}"));
            std::fs::create_dir(&section).unwrap();
            std::fs::write(section.join(ANBA_INPUT), "{}").unwrap();
        }
        std::fs::create_dir(dir.path().join("section_3")).unwrap();
        let files = find_anba_inputs(dir.path()).unwrap();
        let ids: Vec<_> = files
            .iter()
            .filter_map(|f| section_id_from_path(f))
            .collect();
        assert_eq!(ids, vec![1, 2, 10]);
    }

    #[test]
    fn log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anba_solve.log");
        let runs = vec![AnbaRun {
            files: vec!["a.json".into(), "b.json".into()],
            success: false,
            stdout: "solving\n".into(),
            stderr: "diverged\n".into(),
        }];
        AnbaRunner::write_log(&path, &runs).unwrap();
        let log = std::fs::read_to_string(&path).unwrap();
        assert!(log.starts_with("--- ANBA4 run for all sections ---\nsolving\ndiverged\n"));
        assert!(log.ends_with("--- failure ---\n"));
    }

    #[test]
    fn missing_conda() {
        let runner = AnbaRunner::with_conda("/no/such/conda", "anba4-env");
        assert!(matches!(runner.check_env(), Err(AnbaError::Spawn(..))));
    }
}
