#![cfg(unix)]

use std::{fs, os::unix::fs::PermissionsExt, path::Path};

use b3_2d::{
    anba::{find_anba_inputs, AnbaError, ANBA_LOG},
    AnbaRunner, AnbaStep, Config, Step,
};

/// Fake conda: lists the `anba4-env` environment and echoes the solver command line
fn fake_conda(dir: &Path, exit_code: i32) -> std::path::PathBuf {
    let conda = dir.join("conda");
    fs::write(
        &conda,
        format!(
            r##"#!/bin/sh
if [ "$1" = "env" ]; then
  echo "# conda environments:"
  echo "base     /opt/conda"
  echo "anba4-env     /opt/conda/envs/anba4-env"
  exit 0
fi
echo "threads: $OMP_NUM_THREADS $CUDA_VISIBLE_DEVICES"
echo "args: $@"
echo "solver warning" >&2
exit {exit_code}
"##
        ),
    )
    .unwrap();
    fs::set_permissions(&conda, fs::Permissions::from_mode(0o755)).unwrap();
    conda
}

fn sections(dir: &Path, ids: &[i64]) {
    for id in ids {
        let section = dir.join(format!("section_{id}"));
        fs::create_dir_all(&section).unwrap();
        fs::write(section.join("anba.json"), "{}").unwrap();
    }
}

#[test]
fn environments() {
    let dir = tempfile::tempdir().unwrap();
    let conda = fake_conda(dir.path(), 0);
    assert!(AnbaRunner::with_conda(&conda, "anba4-env")
        .check_env()
        .is_ok());
    assert!(AnbaRunner::with_conda(&conda, "envs").check_env().is_err());
    assert!(matches!(
        AnbaRunner::with_conda(&conda, "anba4").check_env(),
        Err(AnbaError::EnvNotFound(env)) if env == "anba4"
    ));
}

#[test]
fn single_and_all() {
    let dir = tempfile::tempdir().unwrap();
    let conda = fake_conda(dir.path(), 0);
    sections(dir.path(), &[3, 1]);
    let files = find_anba_inputs(dir.path()).unwrap();
    let runner = AnbaRunner::with_conda(&conda, "anba4-env");

    let run = runner.run_single(&files[0]).unwrap();
    assert!(run.success);
    assert!(run.stdout.contains("threads: 1 -1"));
    assert!(run.stdout.contains("run -n anba4-env anba4-run -i"));
    assert!(run.stdout.contains("section_1"));
    assert_eq!(run.stderr.trim(), "solver warning");

    let run = runner.run_all(&files).unwrap();
    assert_eq!(run.files.len(), 2);
    let args = run.stdout.lines().find(|l| l.starts_with("args:")).unwrap();
    assert!(args.find("section_1").unwrap() < args.find("section_3").unwrap());

    let runs = runner.run_pool(&files, 2).unwrap();
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().all(|r| r.success && r.files.len() == 1));
}

#[test]
fn failed_run() {
    let dir = tempfile::tempdir().unwrap();
    let conda = fake_conda(dir.path(), 1);
    sections(dir.path(), &[1]);
    let files = find_anba_inputs(dir.path()).unwrap();
    let run = AnbaRunner::with_conda(&conda, "anba4-env")
        .run_all(&files)
        .unwrap();
    assert!(!run.success);
    let log = dir.path().join(ANBA_LOG);
    AnbaRunner::write_log(&log, &[run]).unwrap();
    let log = fs::read_to_string(log).unwrap();
    assert!(log.contains("solver warning"));
    assert!(log.ends_with("--- failure ---\n"));
}

#[test]
fn anba_step() {
    let dir = tempfile::tempdir().unwrap();
    let conda = fake_conda(dir.path(), 0);
    let config_path = dir.path().join("b3_2d.toml");
    Config::default().save(&config_path).unwrap();
    sections(&dir.path().join("work").join("b3_2d"), &[1, 2]);

    AnbaStep::new()
        .conda(&conda)
        .run(&Config::default(), &config_path)
        .unwrap();
    let log = fs::read_to_string(dir.path().join("work").join("anba4_results").join(ANBA_LOG))
        .unwrap();
    assert!(log.starts_with("--- ANBA4 run for all sections ---"));
    assert!(log.contains("section_2"));
    assert!(log.ends_with("--- success ---\n"));
}
