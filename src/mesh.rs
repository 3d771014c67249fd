//! # Surface mesh
//!
//! A light-weight polygonal mesh with named scalar point and cell arrays.
//! It carries the draped blade surface, the per-section meshes and the
//! triangulated cross-sections returned by the mesher.

use std::{collections::BTreeMap, path::Path};

use nalgebra::{Point3, Rotation3, Vector3};

mod io;

#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    #[error("{0} not found in mesh cell data")]
    MissingCellData(String),
    #[error("{0} not found in mesh point data")]
    MissingPointData(String),
    #[error("array {name} has {found} values, expected {expected}")]
    ArrayLength {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("cell #{cell} refers to point #{point} of a {n_points} points mesh")]
    CellIndex {
        cell: usize,
        point: usize,
        n_points: usize,
    },
    #[error("VTK I/O failure with {path}: {message}")]
    Vtk {
        path: std::path::PathBuf,
        message: String,
    },
    #[error("unsupported VTK data set: {0}")]
    DataSet(String),
    #[error("unsupported VTK cell type: {0}")]
    CellType(String),
}
pub type Result<T> = std::result::Result<T, MeshError>;

/// Mesh cell types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Vertex,
    PolyVertex,
    Line,
    PolyLine,
    Triangle,
    TriangleStrip,
    Polygon,
    Quad,
}
impl CellKind {
    /// Surface cell type for a polygon with `n` vertices
    pub fn polygon(n: usize) -> Self {
        match n {
            3 => Self::Triangle,
            4 => Self::Quad,
            _ => Self::Polygon,
        }
    }
    /// Returns true for 2D cells
    pub fn is_surface(&self) -> bool {
        matches!(
            self,
            Self::Triangle | Self::TriangleStrip | Self::Polygon | Self::Quad
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub kind: CellKind,
    pub points: Vec<usize>,
}
impl Cell {
    pub fn new(kind: CellKind, points: Vec<usize>) -> Self {
        Self { kind, points }
    }
    pub fn triangle(points: [usize; 3]) -> Self {
        Self::new(CellKind::Triangle, points.to_vec())
    }
    pub fn line(points: [usize; 2]) -> Self {
        Self::new(CellKind::Line, points.to_vec())
    }
    /// Splits the cell into triangles
    pub fn triangles(&self) -> Vec<[usize; 3]> {
        let p = &self.points;
        match self.kind {
            CellKind::TriangleStrip => p
                .windows(3)
                .enumerate()
                .map(|(i, w)| {
                    if i % 2 == 0 {
                        [w[0], w[1], w[2]]
                    } else {
                        [w[1], w[0], w[2]]
                    }
                })
                .collect(),
            CellKind::Triangle | CellKind::Quad | CellKind::Polygon if p.len() > 2 => {
                (1..p.len() - 1).map(|i| [p[0], p[i], p[i + 1]]).collect()
            }
            _ => vec![],
        }
    }
}

/// Polygonal mesh with scalar point and cell data
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SurfaceMesh {
    pub points: Vec<[f64; 3]>,
    pub cells: Vec<Cell>,
    pub point_data: BTreeMap<String, Vec<f64>>,
    pub cell_data: BTreeMap<String, Vec<f64>>,
}

impl SurfaceMesh {
    pub fn new(points: Vec<[f64; 3]>, cells: Vec<Cell>) -> Self {
        Self {
            points,
            cells,
            ..Default::default()
        }
    }
    /// Adds a cell array
    pub fn with_cell_data<S: Into<String>>(mut self, name: S, values: Vec<f64>) -> Self {
        assert_eq!(values.len(), self.n_cells(), "cell array length mismatch");
        self.cell_data.insert(name.into(), values);
        self
    }
    /// Adds a point array
    pub fn with_point_data<S: Into<String>>(mut self, name: S, values: Vec<f64>) -> Self {
        assert_eq!(values.len(), self.n_points(), "point array length mismatch");
        self.point_data.insert(name.into(), values);
        self
    }
    /// Loads the draped blade mesh and rotates it around the z axis by `rotation_angle` degrees
    pub fn load_draped<P: AsRef<Path>>(path: P, rotation_angle: f64) -> Result<Self> {
        let mut mesh = Self::read(path)?;
        mesh.rotate_z(rotation_angle);
        log::debug!(
            "draped mesh: {} points, {} cells",
            mesh.n_points(),
            mesh.n_cells()
        );
        Ok(mesh)
    }
    #[inline]
    pub fn n_points(&self) -> usize {
        self.points.len()
    }
    #[inline]
    pub fn n_cells(&self) -> usize {
        self.cells.len()
    }
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
    /// Checks the mesh invariants: cell indices and array lengths
    pub fn check(&self) -> Result<()> {
        let n_points = self.n_points();
        for (cell, c) in self.cells.iter().enumerate() {
            if let Some(&point) = c.points.iter().find(|&&p| p >= n_points) {
                return Err(MeshError::CellIndex {
                    cell,
                    point,
                    n_points,
                });
            }
        }
        for (data, expected) in [
            (&self.point_data, n_points),
            (&self.cell_data, self.n_cells()),
        ] {
            if let Some((name, values)) = data.iter().find(|(_, v)| v.len() != expected) {
                return Err(MeshError::ArrayLength {
                    name: name.clone(),
                    expected,
                    found: values.len(),
                });
            }
        }
        Ok(())
    }
    pub fn cell_array(&self, name: &str) -> Result<&[f64]> {
        self.cell_data
            .get(name)
            .map(|v| v.as_slice())
            .ok_or_else(|| MeshError::MissingCellData(name.into()))
    }
    pub fn point_array(&self, name: &str) -> Result<&[f64]> {
        self.point_data
            .get(name)
            .map(|v| v.as_slice())
            .ok_or_else(|| MeshError::MissingPointData(name.into()))
    }
    /// Sorted unique values of a cell array
    pub fn unique_cell_values(&self, name: &str) -> Result<Vec<f64>> {
        let mut values = self.cell_array(name)?.to_vec();
        values.sort_by(|a, b| a.total_cmp(b));
        values.dedup();
        Ok(values)
    }
    /// Points (x,y) coordinates
    pub fn points_2d(&self) -> Vec<[f64; 2]> {
        self.points.iter().map(|p| [p[0], p[1]]).collect()
    }
    /// Rotates the mesh around the z axis by `angle` degrees
    pub fn rotate_z(&mut self, angle: f64) -> &mut Self {
        let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), angle.to_radians());
        self.points.iter_mut().for_each(|p| {
            let q = rotation * Point3::from(*p);
            *p = [q.x, q.y, q.z];
        });
        self
    }
    pub fn translate(&mut self, dx: f64, dy: f64, dz: f64) -> &mut Self {
        self.points.iter_mut().for_each(|p| {
            p[0] += dx;
            p[1] += dy;
            p[2] += dz;
        });
        self
    }
    /// Bounding box `[xmin, xmax, ymin, ymax, zmin, zmax]`
    pub fn bounds(&self) -> [f64; 6] {
        if self.points.is_empty() {
            return [0f64; 6];
        }
        self.points.iter().fold(
            [
                f64::INFINITY,
                f64::NEG_INFINITY,
                f64::INFINITY,
                f64::NEG_INFINITY,
                f64::INFINITY,
                f64::NEG_INFINITY,
            ],
            |mut b, p| {
                for k in 0..3 {
                    b[2 * k] = b[2 * k].min(p[k]);
                    b[2 * k + 1] = b[2 * k + 1].max(p[k]);
                }
                b
            },
        )
    }
    /// Diagonal of the (x,y) bounding box
    pub fn bb_size(&self) -> f64 {
        let b = self.bounds();
        (b[1] - b[0]).hypot(b[3] - b[2])
    }
    /// Extracts the cells with a `scalars` value in the closed interval `range`
    ///
    /// The points are renumbered in the order they are first met when walking
    /// through the selected cells.
    pub fn threshold(&self, scalars: &str, range: (f64, f64)) -> Result<Self> {
        let (lo, hi) = range;
        let ids: Vec<usize> = self
            .cell_array(scalars)?
            .iter()
            .enumerate()
            .filter(|(_, &v)| v >= lo && v <= hi)
            .map(|(i, _)| i)
            .collect();
        Ok(self.extract_cells(&ids))
    }
    /// New mesh made of the given cells
    pub fn extract_cells(&self, ids: &[usize]) -> Self {
        let mut point_map: Vec<Option<usize>> = vec![None; self.n_points()];
        let mut order: Vec<usize> = Vec::new();
        let mut cells = Vec::with_capacity(ids.len());
        for &i in ids {
            let cell = &self.cells[i];
            let mut points = Vec::with_capacity(cell.points.len());
            for &p in &cell.points {
                let q = match point_map[p] {
                    Some(q) => q,
                    None => {
                        order.push(p);
                        point_map[p] = Some(order.len() - 1);
                        order.len() - 1
                    }
                };
                points.push(q);
            }
            cells.push(Cell::new(cell.kind, points));
        }
        Self {
            points: order.iter().map(|&p| self.points[p]).collect(),
            cells,
            point_data: self
                .point_data
                .iter()
                .map(|(name, v)| (name.clone(), order.iter().map(|&p| v[p]).collect()))
                .collect(),
            cell_data: self
                .cell_data
                .iter()
                .map(|(name, v)| (name.clone(), ids.iter().map(|&i| v[i]).collect()))
                .collect(),
        }
    }
    /// Reorders the points according to the permutation `order`, `order[k]` being the index of the k-th new point
    pub fn permute_points(&self, order: &[usize]) -> Self {
        let mut inverse = vec![0usize; order.len()];
        order.iter().enumerate().for_each(|(k, &p)| inverse[p] = k);
        Self {
            points: order.iter().map(|&p| self.points[p]).collect(),
            cells: self
                .cells
                .iter()
                .map(|c| Cell::new(c.kind, c.points.iter().map(|&p| inverse[p]).collect()))
                .collect(),
            point_data: self
                .point_data
                .iter()
                .map(|(name, v)| (name.clone(), order.iter().map(|&p| v[p]).collect()))
                .collect(),
            cell_data: self.cell_data.clone(),
        }
    }
    /// Interpolates the cell data to the points
    ///
    /// The value at a point is the mean of the values of the cells the point belongs to.
    /// The returned mesh has the interpolated arrays added to its point data and no cell data.
    pub fn cell_data_to_point_data(&self) -> Self {
        let n = self.n_points();
        let mut count = vec![0usize; n];
        self.cells
            .iter()
            .flat_map(|c| c.points.iter())
            .for_each(|&p| count[p] += 1);
        let mut point_data = self.point_data.clone();
        for (name, values) in &self.cell_data {
            let mut sums = vec![0f64; n];
            self.cells.iter().zip(values).for_each(|(c, v)| {
                c.points.iter().for_each(|&p| sums[p] += v);
            });
            sums.iter_mut().zip(&count).for_each(|(s, &c)| {
                if c > 0 {
                    *s /= c as f64
                }
            });
            point_data.insert(name.clone(), sums);
        }
        Self {
            points: self.points.clone(),
            cells: self.cells.clone(),
            point_data,
            cell_data: BTreeMap::new(),
        }
    }
    /// Appends another mesh, only the arrays common to both meshes are kept
    pub fn merge(&self, other: &Self) -> Self {
        let offset = self.n_points();
        let join = |a: &BTreeMap<String, Vec<f64>>, b: &BTreeMap<String, Vec<f64>>| {
            a.iter()
                .filter_map(|(name, va)| {
                    b.get(name)
                        .map(|vb| (name.clone(), va.iter().chain(vb).cloned().collect()))
                })
                .collect()
        };
        Self {
            points: self.points.iter().chain(&other.points).cloned().collect(),
            cells: self
                .cells
                .iter()
                .cloned()
                .chain(other.cells.iter().map(|c| {
                    Cell::new(c.kind, c.points.iter().map(|p| p + offset).collect())
                }))
                .collect(),
            point_data: join(&self.point_data, &other.point_data),
            cell_data: join(&self.cell_data, &other.cell_data),
        }
    }
    /// Area of the cell projected in the (x,y) plane, zero for lines and vertices
    pub fn cell_area(&self, cell: &Cell) -> f64 {
        cell.triangles()
            .into_iter()
            .map(|[a, b, c]| {
                let (pa, pb, pc) = (self.points[a], self.points[b], self.points[c]);
                0.5 * ((pb[0] - pa[0]) * (pc[1] - pa[1]) - (pc[0] - pa[0]) * (pb[1] - pa[1])).abs()
            })
            .sum()
    }
    /// Adds the `Area` cell array if the mesh does not have it yet, returns true if it was added
    pub fn ensure_cell_area(&mut self) -> bool {
        if self.cell_data.contains_key("Area") {
            return false;
        }
        let area = self.cells.iter().map(|c| self.cell_area(c)).collect();
        self.cell_data.insert("Area".into(), area);
        true
    }
    /// Cell centroid
    pub fn cell_centroid(&self, cell: &Cell) -> [f64; 3] {
        let n = cell.points.len().max(1) as f64;
        let mut c = cell.points.iter().fold([0f64; 3], |mut c, &p| {
            (0..3).for_each(|k| c[k] += self.points[p][k]);
            c
        });
        c.iter_mut().for_each(|x| *x /= n);
        c
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// 4 triangles over 9 points, the last 3 points are not used
    pub fn simple_mesh() -> SurfaceMesh {
        let points = vec![
            [0., 0., 0.],
            [1., 0., 0.],
            [0.5, 1., 0.],
            [2., 0., 0.],
            [1.5, 1., 0.],
            [1., 2., 0.],
            [3., 0., 0.],
            [2.5, 1., 0.],
            [2., 2., 0.],
        ];
        let cells = vec![
            Cell::triangle([0, 1, 2]),
            Cell::triangle([1, 3, 4]),
            Cell::triangle([3, 2, 4]),
            Cell::triangle([2, 5, 4]),
        ];
        SurfaceMesh::new(points, cells)
    }

    #[test]
    fn bb_size() {
        let mesh = simple_mesh();
        assert_eq!(mesh.bounds(), [0., 3., 0., 2., 0., 0.]);
        assert_abs_diff_eq!(mesh.bb_size(), 13f64.sqrt());
        assert_eq!(SurfaceMesh::default().bb_size(), 0.);
    }

    #[test]
    fn threshold_renumbers_points() {
        let mesh = simple_mesh().with_cell_data("panel_id", vec![-1., 0., 0., -2.]);
        let skin = mesh.threshold("panel_id", (0., 12.)).unwrap();
        assert_eq!(skin.n_cells(), 2);
        assert_eq!(skin.n_points(), 4);
        assert_eq!(
            skin.points,
            vec![[1., 0., 0.], [2., 0., 0.], [1.5, 1., 0.], [0.5, 1., 0.]]
        );
        assert_eq!(skin.cells[1].points, vec![1, 3, 2]);
        assert_eq!(skin.cell_data["panel_id"], vec![0., 0.]);
        skin.check().unwrap();
    }

    #[test]
    fn threshold_missing_array() {
        assert!(matches!(
            simple_mesh().threshold("section_id", (1., 1.)),
            Err(MeshError::MissingCellData(name)) if name == "section_id"
        ));
    }

    #[test]
    fn cell_to_point_average() {
        let mesh = simple_mesh()
            .with_cell_data("t", vec![1., 2., 3., 4.])
            .cell_data_to_point_data();
        let t = mesh.point_array("t").unwrap();
        assert_abs_diff_eq!(t[0], 1.);
        assert_abs_diff_eq!(t[1], 1.5);
        assert_abs_diff_eq!(t[2], (1. + 3. + 4.) / 3.);
        assert_abs_diff_eq!(t[8], 0.);
        assert!(mesh.cell_data.is_empty());
    }

    #[test]
    fn rotation() {
        let mut mesh = SurfaceMesh::new(vec![[1., 0., 0.5]], vec![]);
        mesh.rotate_z(90.);
        assert_abs_diff_eq!(mesh.points[0][0], 0., epsilon = 1e-12);
        assert_abs_diff_eq!(mesh.points[0][1], 1., epsilon = 1e-12);
        assert_abs_diff_eq!(mesh.points[0][2], 0.5, epsilon = 1e-12);
        mesh.translate(1., -1., 0.).rotate_z(-90.);
        assert_abs_diff_eq!(mesh.points[0][0], 0., epsilon = 1e-12);
        assert_abs_diff_eq!(mesh.points[0][1], -1., epsilon = 1e-12);
    }

    #[test]
    fn areas() {
        let mut mesh = simple_mesh();
        assert!(mesh.ensure_cell_area());
        assert!(!mesh.ensure_cell_area());
        let area = mesh.cell_array("Area").unwrap();
        assert_abs_diff_eq!(area[0], 0.5);
        assert_abs_diff_eq!(area.iter().sum::<f64>(), 0.5 + 0.5 + 0.5 + 0.5);
        let quad = SurfaceMesh::new(
            vec![[0., 0., 0.], [2., 0., 0.], [2., 1., 0.], [0., 1., 0.]],
            vec![Cell::new(CellKind::Quad, vec![0, 1, 2, 3])],
        );
        assert_abs_diff_eq!(quad.cell_area(&quad.cells[0]), 2.);
    }

    #[test]
    fn merge_common_arrays() {
        let a = simple_mesh()
            .with_cell_data("panel_id", vec![0.; 4])
            .with_cell_data("twist", vec![1.; 4]);
        let b = simple_mesh().with_cell_data("panel_id", vec![-3.; 4]);
        let m = a.merge(&b);
        assert_eq!(m.n_points(), 18);
        assert_eq!(m.cells[4].points, vec![9, 10, 11]);
        assert_eq!(m.cell_data.len(), 1);
        assert_eq!(m.cell_data["panel_id"][7], -3.);
        m.check().unwrap();
    }

    #[test]
    fn check_invariants() {
        let mut mesh = simple_mesh();
        mesh.cells.push(Cell::line([2, 9]));
        assert!(matches!(
            mesh.check(),
            Err(MeshError::CellIndex { cell: 4, point: 9, .. })
        ));
    }
}
