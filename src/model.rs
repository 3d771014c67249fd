//! # Airfoil meshing model
//!
//! The skins, webs and plies of a section as consumed by the `cgfoil` mesher.
//! The model is serialized into the mesher JSON input file.

use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::SurfaceMesh;

mod builder;
pub use builder::AirfoilMeshBuilder;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("invalid airfoil loop: at least 3 finite points are required, found {0}")]
    InvalidAirfoil(usize),
    #[error("{name} thickness has {found} values, expected {expected}")]
    ThicknessLength {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("{name} thickness must be finite and positive")]
    InvalidThickness { name: String },
    #[error("{name} has {found} points, at least 2 are required")]
    WebPoints { name: String, found: usize },
    #[error("{name} has no plies")]
    NoPlies { name: String },
    #[error("cannot read/write model file {1}")]
    Io(#[source] std::io::Error, PathBuf),
    #[error("model JSON (de)serialization failure")]
    Json(#[from] serde_json::Error),
}
pub type Result<T> = std::result::Result<T, ModelError>;

/// Ply thickness
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Thickness {
    Constant { value: f64 },
    Array { array: Vec<f64> },
}
impl Thickness {
    pub fn constant(value: f64) -> Self {
        Self::Constant { value }
    }
    pub fn array(array: Vec<f64>) -> Self {
        Self::Array { array }
    }
    /// True if the thickness is zero everywhere
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Constant { value } => *value == 0.,
            Self::Array { array } => array.iter().all(|x| *x == 0.),
        }
    }
    fn is_valid(&self) -> bool {
        match self {
            Self::Constant { value } => value.is_finite() && *value >= 0.,
            Self::Array { array } => array.iter().all(|x| x.is_finite() && *x >= 0.),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ply {
    pub thickness: Thickness,
    pub material: i64,
}

/// Airfoil skin layer, layers are stacked inward following `sort_index`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skin {
    pub thickness: Thickness,
    pub material: i64,
    pub sort_index: usize,
}

/// Shear web
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Web {
    pub points: Vec<[f64; 2]>,
    pub plies: Vec<Ply>,
    pub normal_ref: [f64; 2],
    pub n_cell: usize,
}

/// Section meshing model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirfoilMesh {
    pub skins: BTreeMap<String, Skin>,
    pub webs: BTreeMap<String, Web>,
    pub airfoil_input: Vec<[f64; 2]>,
    pub n_elem: Option<usize>,
    pub plot: bool,
    pub plot_filename: Option<String>,
    pub vtk: Option<String>,
}
impl AirfoilMesh {
    /// Skins in stacking order
    pub fn sorted_skins(&self) -> Vec<(&String, &Skin)> {
        let mut skins: Vec<_> = self.skins.iter().collect();
        skins.sort_by_key(|(_, skin)| skin.sort_index);
        skins
    }
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file =
            File::open(&path).map_err(|e| ModelError::Io(e, path.as_ref().to_path_buf()))?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
    pub fn dump<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file =
            File::create(&path).map_err(|e| ModelError::Io(e, path.as_ref().to_path_buf()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }
}

/// Ply thickness field: `ply_<n>[_<anything>]_thickness`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PlyField {
    /// Leading ply number
    pub number: u32,
    /// Text between `ply_` and `_thickness`
    pub key: String,
    /// Full field name
    pub name: String,
}
impl PlyField {
    pub fn parse(name: &str) -> Option<Self> {
        let key = name.strip_prefix("ply_")?.strip_suffix("_thickness")?;
        let digits = key.find(|c: char| !c.is_ascii_digit()).unwrap_or(key.len());
        let (number, rest) = key.split_at(digits);
        if number.is_empty() || !(rest.is_empty() || (rest.len() > 1 && rest.starts_with('_'))) {
            return None;
        }
        Some(Self {
            number: number.parse().ok()?,
            key: key.to_string(),
            name: name.to_string(),
        })
    }
    /// Name of the matching material cell array
    pub fn material_name(&self) -> String {
        format!("ply_{}_material", self.key)
    }
}

/// Ply thickness fields, ordered by ply number and key
pub fn ply_fields<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<PlyField> {
    let mut fields: Vec<PlyField> = names.into_iter().filter_map(PlyField::parse).collect();
    fields.sort();
    fields.dedup();
    fields
}

/// Ply thickness and material arrays of a mesh
#[derive(Debug, Default, Clone)]
pub struct PlyArrays {
    pub fields: Vec<PlyField>,
    /// Thickness at the mesh points, keyed by field name
    pub thickness: BTreeMap<String, Vec<f64>>,
    /// Material id per cell, keyed by thickness field name
    pub material: BTreeMap<String, Vec<f64>>,
}
impl PlyArrays {
    pub fn get(&self, field: &PlyField) -> Option<&[f64]> {
        self.thickness.get(&field.name).map(|v| v.as_slice())
    }
    /// Most frequent material id of a ply
    pub fn dominant_material(&self, field: &PlyField) -> Option<i64> {
        dominant(self.material.get(&field.name)?)
    }
}

/// Most frequent value, the smallest one wins ties
pub(crate) fn dominant(values: &[f64]) -> Option<i64> {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    values
        .iter()
        .filter(|v| v.is_finite())
        .for_each(|v| *counts.entry(v.round() as i64).or_default() += 1);
    counts
        .into_iter()
        .fold(None, |best: Option<(i64, usize)>, (id, n)| match best {
            Some((_, m)) if m >= n => best,
            _ => Some((id, n)),
        })
        .map(|(id, _)| id)
}

/// Gets the ply thickness arrays at the mesh points and the matching material cell arrays
///
/// Thickness fields stored as cell data are averaged at the points.
pub fn get_thickness_and_material_arrays(mesh: &SurfaceMesh) -> PlyArrays {
    let point_mesh = mesh.cell_data_to_point_data();
    let fields = ply_fields(point_mesh.point_data.keys().map(|k| k.as_str()));
    let thickness = fields
        .iter()
        .filter_map(|f| {
            point_mesh
                .point_data
                .get(&f.name)
                .map(|v| (f.name.clone(), v.clone()))
        })
        .collect();
    let material = fields
        .iter()
        .filter_map(|f| {
            mesh.cell_data
                .get(&f.material_name())
                .map(|v| (f.name.clone(), v.clone()))
        })
        .collect();
    PlyArrays {
        fields,
        thickness,
        material,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Cell;
    use approx::assert_abs_diff_eq;

    #[test]
    fn thickness_json() {
        let ply = Ply {
            thickness: Thickness::constant(0.004),
            material: 3,
        };
        let json = serde_json::to_value(&ply).unwrap();
        assert_eq!(json["thickness"]["type"], "constant");
        assert_eq!(json["thickness"]["value"], 0.004);
        let skin: Skin = serde_json::from_str(
            r#"{"thickness":{"type":"array","array":[0.1,0.2]},"material":1,"sort_index":0}"#,
        )
        .unwrap();
        assert_eq!(skin.thickness, Thickness::array(vec![0.1, 0.2]));
    }

    #[test]
    fn field_names() {
        let fields = ply_fields([
            "ply_10_uniax_2_thickness",
            "ply_2_thickness",
            "ply_1_triax_1_thickness",
            "ply_1_triax_1_material",
            "ply__thickness",
            "ply_x_thickness",
            "ply_3__thickness",
            "panel_id",
        ]);
        let keys: Vec<_> = fields.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["1_triax_1", "2", "10_uniax_2"]);
        assert_eq!(fields[0].material_name(), "ply_1_triax_1_material");
    }

    #[test]
    fn dominant_material() {
        assert_eq!(dominant(&[2., 1., 2., 1., 3.]), Some(1));
        assert_eq!(dominant(&[2., 2., 1.]), Some(2));
        assert_eq!(dominant(&[]), None);
    }

    #[test]
    fn arrays() {
        let mesh = SurfaceMesh::new(
            vec![[0., 0., 0.], [1., 0., 0.], [2., 0., 0.]],
            vec![Cell::line([0, 1]), Cell::line([1, 2])],
        )
        .with_cell_data("ply_1_glass_thickness", vec![1e-3, 3e-3])
        .with_cell_data("ply_1_glass_material", vec![4., 4.])
        .with_cell_data("panel_id", vec![0., 0.]);
        let arrays = get_thickness_and_material_arrays(&mesh);
        assert_eq!(arrays.fields.len(), 1);
        let field = &arrays.fields[0];
        let t = arrays.get(field).unwrap();
        assert_eq!(t.len(), 3);
        assert_abs_diff_eq!(t[1], 2e-3, epsilon = 1e-15);
        assert_eq!(arrays.dominant_material(field), Some(4));
    }

    #[test]
    fn zero_thickness() {
        assert!(Thickness::array(vec![0.; 4]).is_zero());
        assert!(!Thickness::constant(1e-3).is_zero());
        assert!(!Thickness::array(vec![0., -1.]).is_valid());
    }
}
