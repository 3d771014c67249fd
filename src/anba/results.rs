use std::{fs::File, io::BufReader, path::Path};

use serde::{Deserialize, Serialize};

use super::{AnbaError, Result};

/// ANBA4 section properties
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnbaResults {
    pub mass_center: [f64; 2],
    pub shear_center: [f64; 2],
    /// Elastic center
    pub tension_center: [f64; 2],
    /// Principal axes angle in radians
    pub principal_angle: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stiffness: Option<[[f64; 6]; 6]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mass_matrix: Option<[[f64; 6]; 6]>,
}
impl AnbaResults {
    /// Loads the results from an `anba_out.json` file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path).map_err(|e| AnbaError::Io(e, path.as_ref().to_path_buf()))?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
    pub fn principal_angle_deg(&self) -> f64 {
        self.principal_angle.to_degrees()
    }
    /// Stiffness matrix diagonal
    pub fn stiffness_diagonal(&self) -> Option<[f64; 6]> {
        self.stiffness.map(|k| std::array::from_fn(|i| k[i][i]))
    }
    /// Mass matrix diagonal
    pub fn mass_diagonal(&self) -> Option<[f64; 6]> {
        self.mass_matrix.map(|m| std::array::from_fn(|i| m[i][i]))
    }
}
