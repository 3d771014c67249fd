use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::{bom::MaterialDb, SurfaceMesh};

use super::{AnbaError, Result};

/// ANBA4 input: the triangulated section with the material and fibre orientation of each triangle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnbaInput {
    pub points: Vec<[f64; 2]>,
    pub cells: Vec<[usize; 3]>,
    pub material_id: Vec<i64>,
    /// Fibre plane orientation in degrees
    pub orientation: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thickness: Option<Vec<f64>>,
    pub materials: MaterialDb,
}

impl AnbaInput {
    /// Creates the solver input from the mesher output
    ///
    /// The surface cells are split into triangles, lines and vertices are ignored.
    /// The orientation is the direction of the `normals` cell vectors, if any.
    pub fn from_mesh(mesh: &SurfaceMesh, matdb: &MaterialDb) -> Result<Self> {
        let material = mesh
            .cell_data
            .get("material_id")
            .ok_or_else(|| AnbaError::MissingCellData("material_id".into()))?;
        let normals = mesh
            .cell_data
            .get("normals_0")
            .zip(mesh.cell_data.get("normals_1"));
        let thickness = mesh.cell_data.get("thickness");

        let mut input = Self {
            points: mesh.points_2d(),
            materials: matdb.clone(),
            thickness: thickness.map(|_| vec![]),
            ..Default::default()
        };
        for (i, cell) in mesh.cells.iter().enumerate() {
            for triangle in cell.triangles() {
                input.cells.push(triangle);
                input.material_id.push(material[i].round() as i64);
                input.orientation.push(
                    normals
                        .map(|(n0, n1)| n1[i].atan2(n0[i]).to_degrees())
                        .unwrap_or_default(),
                );
                if let (Some(t), Some(values)) = (input.thickness.as_mut(), thickness) {
                    t.push(values[i]);
                }
            }
        }
        log::debug!(
            "ANBA4 input: {} points, {} triangles",
            input.points.len(),
            input.cells.len()
        );
        Ok(input)
    }
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path).map_err(|e| AnbaError::Io(e, path.as_ref().to_path_buf()))?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
    pub fn dump<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file =
            File::create(&path).map_err(|e| AnbaError::Io(e, path.as_ref().to_path_buf()))?;
        serde_json::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bom::MaterialProperties,
        mesh::{Cell, CellKind},
    };
    use approx::assert_abs_diff_eq;

    fn mesh() -> SurfaceMesh {
        SurfaceMesh::new(
            vec![[0., 0., 0.], [1., 0., 0.], [1., 1., 0.], [0., 1., 0.]],
            vec![
                Cell::new(CellKind::Quad, vec![0, 1, 2, 3]),
                Cell::line([0, 1]),
            ],
        )
        .with_cell_data("material_id", vec![2., 0.])
    }

    #[test]
    fn triangles() {
        let matdb = MaterialDb::from([("glass".to_string(), MaterialProperties::new(2, 2e3))]);
        let input = AnbaInput::from_mesh(&mesh(), &matdb).unwrap();
        assert_eq!(input.cells, vec![[0, 1, 2], [0, 2, 3]]);
        assert_eq!(input.material_id, vec![2, 2]);
        assert_eq!(input.orientation, vec![0., 0.]);
        assert!(input.thickness.is_none());
        assert_eq!(input.materials.len(), 1);
    }

    #[test]
    fn orientation() {
        let mesh = mesh()
            .with_cell_data("normals_0", vec![0., 1.])
            .with_cell_data("normals_1", vec![-1., 0.])
            .with_cell_data("thickness", vec![4e-3, 0.]);
        let input = AnbaInput::from_mesh(&mesh, &MaterialDb::new()).unwrap();
        assert_abs_diff_eq!(input.orientation[0], -90.);
        assert_eq!(input.thickness, Some(vec![4e-3, 4e-3]));
    }

    #[test]
    fn missing_material() {
        let mut mesh = mesh();
        mesh.cell_data.clear();
        assert!(matches!(
            AnbaInput::from_mesh(&mesh, &MaterialDb::new()),
            Err(AnbaError::MissingCellData(_))
        ));
    }
}
