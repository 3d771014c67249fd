//! Pipeline configuration
//!
//! The configuration is a toml file, every entry has a default value:
//! ```toml
//! workdir = "work"
//! num_processes = 8
//! anba_env = "anba4-env"
//!
//! [mesher]
//! program = "cgfoil"
//! args = []
//!
//! [section]
//! rotation_angle = 90.0
//! web_thickness = 0.004
//! web_n_cell = 10
//! te_size_ratio = 0.03
//! te_panel_id = -3
//! plot = true
//!
//! [matdb.carbon]
//! id = 1
//! rho = 1600.0
//! ```

use std::{
    fs::File,
    io::{Read, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::bom::MaterialDb;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot open configuration file: {1}")]
    Open(#[source] std::io::Error, PathBuf),
    #[error("cannot create configuration file: {1}")]
    Create(#[source] std::io::Error, PathBuf),
    #[error("cannot read configuration file: {1}")]
    Read(#[source] std::io::Error, PathBuf),
    #[error("cannot write configuration file: {1}")]
    Write(#[source] std::io::Error, PathBuf),
    #[error("cannot deserialize configuration from toml")]
    Load(#[from] toml::de::Error),
    #[error("cannot serialize configuration into toml")]
    Save(#[from] toml::ser::Error),
}

/// Section extraction and modeling parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionConfig {
    /// Rotation about z applied to the draped mesh, in degrees
    pub rotation_angle: f64,
    /// Thickness of the fallback web ply
    pub web_thickness: f64,
    /// Number of cells across the webs
    pub web_n_cell: usize,
    /// Minimum trailing edge to skin bounding box ratio for the trailing edge
    /// to be part of the airfoil loop
    pub te_size_ratio: f64,
    /// `panel_id` of the trailing edge cells, the other negative ids are webs
    pub te_panel_id: i64,
    /// Save a picture of each meshed section
    pub plot: bool,
}
/// Default properties:
///  * rotation angle : 90 degrees
///  * web thickness  : 4mm
///  * web cells      : 10
///  * TE size ratio  : 3%
///  * TE panel id    : -3
///  * plot           : false
impl Default for SectionConfig {
    fn default() -> Self {
        Self {
            rotation_angle: 90.,
            web_thickness: 0.004,
            web_n_cell: 10,
            te_size_ratio: 0.03,
            te_panel_id: -3,
            plot: false,
        }
    }
}

/// External mesher command line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MesherConfig {
    pub program: String,
    pub args: Vec<String>,
}
impl Default for MesherConfig {
    fn default() -> Self {
        Self {
            program: "cgfoil".into(),
            args: vec![],
        }
    }
}

/// b3-2d configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Work directory, relative to the configuration file
    pub workdir: PathBuf,
    /// Size of the section thread pool, default to the number of CPUs
    pub num_processes: Option<usize>,
    /// Conda environment where ANBA4 is installed
    pub anba_env: String,
    pub mesher: MesherConfig,
    pub section: SectionConfig,
    pub matdb: MaterialDb,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            workdir: PathBuf::from("work"),
            num_processes: None,
            anba_env: "anba4-env".into(),
            mesher: Default::default(),
            section: Default::default(),
            matdb: Default::default(),
        }
    }
}

impl Config {
    /// Load the configuration from a toml file
    pub fn load<P: AsRef<Path>>(path: P) -> std::result::Result<Self, ConfigError> {
        let mut file =
            File::open(&path).map_err(|e| ConfigError::Open(e, path.as_ref().to_path_buf()))?;
        let mut toml = String::new();
        file.read_to_string(&mut toml)
            .map_err(|e| ConfigError::Read(e, path.as_ref().to_path_buf()))?;
        Ok(toml::from_str(&toml)?)
    }
    /// Save the configuration into a toml file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> std::result::Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)?;
        let mut file =
            File::create(&path).map_err(|e| ConfigError::Create(e, path.as_ref().to_path_buf()))?;
        write!(file, "# b3-2d configuration\n\n{}", toml)
            .map_err(|e| ConfigError::Write(e, path.as_ref().to_path_buf()))?;
        Ok(())
    }
    /// Set the work directory
    pub fn workdir<P: Into<PathBuf>>(self, workdir: P) -> Self {
        Self {
            workdir: workdir.into(),
            ..self
        }
    }
    /// Set the size of the thread pool
    pub fn num_processes(self, num_processes: usize) -> Self {
        Self {
            num_processes: Some(num_processes),
            ..self
        }
    }
    /// Set the ANBA4 conda environment
    pub fn anba_env(self, anba_env: &str) -> Self {
        Self {
            anba_env: anba_env.into(),
            ..self
        }
    }
    /// Set the material database
    pub fn matdb(self, matdb: MaterialDb) -> Self {
        Self { matdb, ..self }
    }
    /// Resolves the work directory against the directory of the configuration file
    pub fn resolve_workdir<P: AsRef<Path>>(&self, config_path: P) -> PathBuf {
        config_path
            .as_ref()
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(&self.workdir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml() {
        let config: Config = toml::from_str(
            r#"
workdir = "run"
num_processes = 4

[section]
web_thickness = 0.006

[matdb.carbon]
id = 1
rho = 1600.0
E = 1.2e11
"#,
        )
        .unwrap();
        assert_eq!(config.workdir, PathBuf::from("run"));
        assert_eq!(config.num_processes, Some(4));
        assert_eq!(config.anba_env, "anba4-env");
        assert_eq!(config.section.web_thickness, 0.006);
        assert_eq!(config.section.web_n_cell, 10);
        assert_eq!(config.mesher.program, "cgfoil");
        let carbon = &config.matdb["carbon"];
        assert_eq!(carbon.id, Some(1));
        assert_eq!(carbon.rho, Some(1600.));
        assert!(carbon.other.contains_key("E"));
    }

    #[test]
    fn string_material_ids() {
        let config: Config = toml::from_str(
            r#"
[matdb.carbon]
id = "1"
rho = 1600.0

[matdb.foam]
id = "abc"
rho = 80.0
"#,
        )
        .unwrap();
        assert_eq!(config.matdb["carbon"].id, Some(1));
        assert_eq!(config.matdb["foam"].id, None);
        assert_eq!(config.matdb["foam"].rho, Some(80.));
    }

    #[test]
    fn save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b3_2d.toml");
        let config = Config::default().workdir("blade").num_processes(2);
        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn workdir_relative_to_config() {
        let config = Config::default();
        assert_eq!(
            config.resolve_workdir("/data/blade/config.toml"),
            PathBuf::from("/data/blade/work")
        );
    }
}
