//! VTK files reader and writer

use std::{collections::BTreeMap, path::Path};

use vtkio::model::{
    Attribute, Attributes, ByteOrder, CellType, Cells, DataArray, DataSet, ElementType,
    FieldArray, IOBuffer, PolyDataPiece, UnstructuredGridPiece, Version, VertexNumbers, Vtk,
};

use super::{Cell, CellKind, MeshError, Result, SurfaceMesh};

impl From<CellKind> for CellType {
    fn from(kind: CellKind) -> Self {
        match kind {
            CellKind::Vertex => CellType::Vertex,
            CellKind::PolyVertex => CellType::PolyVertex,
            CellKind::Line => CellType::Line,
            CellKind::PolyLine => CellType::PolyLine,
            CellKind::Triangle => CellType::Triangle,
            CellKind::TriangleStrip => CellType::TriangleStrip,
            CellKind::Polygon => CellType::Polygon,
            CellKind::Quad => CellType::Quad,
        }
    }
}
impl TryFrom<CellType> for CellKind {
    type Error = MeshError;
    fn try_from(value: CellType) -> Result<Self> {
        Ok(match value {
            CellType::Vertex => CellKind::Vertex,
            CellType::PolyVertex => CellKind::PolyVertex,
            CellType::Line => CellKind::Line,
            CellType::PolyLine => CellKind::PolyLine,
            CellType::Triangle => CellKind::Triangle,
            CellType::TriangleStrip => CellKind::TriangleStrip,
            CellType::Polygon => CellKind::Polygon,
            CellType::Quad | CellType::Pixel => CellKind::Quad,
            other => return Err(MeshError::CellType(format!("{other:?}"))),
        })
    }
}

fn num_comp(elem: &ElementType) -> usize {
    match elem {
        ElementType::Scalars { num_comp, .. } => *num_comp as usize,
        ElementType::ColorScalars(n) | ElementType::TCoords(n) | ElementType::Generic(n) => {
            *n as usize
        }
        ElementType::Vectors | ElementType::Normals => 3,
        ElementType::Tensors => 9,
        _ => 1,
    }
}

/// Inserts a VTK array, splitting multi-component arrays into `<name>_<i>`
fn insert_array(data: &mut BTreeMap<String, Vec<f64>>, name: String, n_comp: usize, buffer: IOBuffer) {
    let Some(values) = buffer.cast_into::<f64>() else {
        log::debug!("skipping non-numeric array {name}");
        return;
    };
    if n_comp <= 1 {
        data.insert(name, values);
    } else {
        for i in 0..n_comp {
            data.insert(
                format!("{name}_{i}"),
                values.iter().skip(i).step_by(n_comp).cloned().collect(),
            );
        }
    }
}

fn read_attributes(attributes: Vec<Attribute>) -> BTreeMap<String, Vec<f64>> {
    let mut data = BTreeMap::new();
    for attribute in attributes {
        match attribute {
            Attribute::DataArray(DataArray { name, elem, data: buffer }) => {
                insert_array(&mut data, name, num_comp(&elem), buffer)
            }
            Attribute::Field { data_array, .. } => {
                for FieldArray { name, elem, data: buffer } in data_array {
                    insert_array(&mut data, name, elem as usize, buffer)
                }
            }
        }
    }
    data
}

fn cells_from_vertex_numbers(
    numbers: VertexNumbers,
    kind: fn(usize) -> CellKind,
) -> Result<Vec<Cell>> {
    let (connectivity, offsets) = numbers.into_xml();
    let mut start = 0usize;
    offsets
        .into_iter()
        .map(|end| {
            let end = end as usize;
            let points: Vec<usize> = connectivity
                .get(start..end)
                .ok_or_else(|| {
                    MeshError::DataSet(format!(
                        "cell offsets {start}..{end} out of connectivity of length {}",
                        connectivity.len()
                    ))
                })?
                .iter()
                .map(|&i| i as usize)
                .collect();
            start = end;
            Ok(Cell::new(kind(points.len()), points))
        })
        .collect()
}

fn points_from_buffer(buffer: IOBuffer) -> Result<Vec<[f64; 3]>> {
    let xyz = buffer
        .cast_into::<f64>()
        .ok_or_else(|| MeshError::DataSet("non-numeric points".into()))?;
    Ok(xyz.chunks_exact(3).map(|p| [p[0], p[1], p[2]]).collect())
}

impl TryFrom<PolyDataPiece> for SurfaceMesh {
    type Error = MeshError;
    fn try_from(piece: PolyDataPiece) -> Result<Self> {
        let points = points_from_buffer(piece.points)?;
        let mut cells = vec![];
        if let Some(verts) = piece.verts {
            cells.extend(cells_from_vertex_numbers(verts, |n| {
                if n == 1 {
                    CellKind::Vertex
                } else {
                    CellKind::PolyVertex
                }
            })?);
        }
        if let Some(lines) = piece.lines {
            cells.extend(cells_from_vertex_numbers(lines, |n| {
                if n == 2 {
                    CellKind::Line
                } else {
                    CellKind::PolyLine
                }
            })?);
        }
        if let Some(polys) = piece.polys {
            cells.extend(cells_from_vertex_numbers(polys, CellKind::polygon)?);
        }
        if let Some(strips) = piece.strips {
            cells.extend(cells_from_vertex_numbers(strips, |_| CellKind::TriangleStrip)?);
        }
        let mesh = Self {
            points,
            cells,
            point_data: read_attributes(piece.data.point),
            cell_data: read_attributes(piece.data.cell),
        };
        mesh.check()?;
        Ok(mesh)
    }
}

impl TryFrom<UnstructuredGridPiece> for SurfaceMesh {
    type Error = MeshError;
    fn try_from(piece: UnstructuredGridPiece) -> Result<Self> {
        let points = points_from_buffer(piece.points)?;
        let kinds = piece
            .cells
            .types
            .into_iter()
            .map(CellKind::try_from)
            .collect::<Result<Vec<_>>>()?;
        let cells = cells_from_vertex_numbers(piece.cells.cell_verts, CellKind::polygon)?
            .into_iter()
            .zip(kinds)
            .map(|(cell, kind)| Cell { kind, ..cell })
            .collect();
        let mesh = Self {
            points,
            cells,
            point_data: read_attributes(piece.data.point),
            cell_data: read_attributes(piece.data.cell),
        };
        mesh.check()?;
        Ok(mesh)
    }
}

/// `vtkio` reports file errors and piece loading errors with distinct types
fn vtk_error(path: &Path, e: impl std::fmt::Display) -> MeshError {
    MeshError::Vtk {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

impl SurfaceMesh {
    /// Reads a legacy (`.vtk`) or XML (`.vtp`, `.vtu`) VTK file
    ///
    /// Multi-pieces data sets are merged into a single mesh.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let vtk = Vtk::import(path).map_err(|e| vtk_error(path, e))?;
        let meshes: Vec<SurfaceMesh> = match vtk.data {
            DataSet::PolyData { pieces, .. } => pieces
                .into_iter()
                .map(|piece| {
                    piece
                        .into_loaded_piece_data(Some(path))
                        .map_err(|e| vtk_error(path, e))
                        .and_then(SurfaceMesh::try_from)
                })
                .collect::<Result<_>>()?,
            DataSet::UnstructuredGrid { pieces, .. } => pieces
                .into_iter()
                .map(|piece| {
                    piece
                        .into_loaded_piece_data(Some(path))
                        .map_err(|e| vtk_error(path, e))
                        .and_then(SurfaceMesh::try_from)
                })
                .collect::<Result<_>>()?,
            other => {
                return Err(MeshError::DataSet(
                    format!("{other:?}").chars().take(32).collect(),
                ))
            }
        };
        let mut meshes = meshes.into_iter();
        let first = meshes.next().unwrap_or_default();
        Ok(meshes.fold(first, |acc, mesh| acc.merge(&mesh)))
    }
    /// Writes the mesh into a legacy ASCII VTK file as an unstructured grid
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut vertices = Vec::with_capacity(self.cells.iter().map(|c| c.points.len() + 1).sum());
        for cell in &self.cells {
            vertices.push(cell.points.len() as u32);
            vertices.extend(cell.points.iter().map(|&p| p as u32));
        }
        let to_attributes = |data: &BTreeMap<String, Vec<f64>>| -> Vec<Attribute> {
            data.iter()
                .map(|(name, values)| {
                    Attribute::scalars(name.as_str(), 1).with_data(IOBuffer::F64(values.clone()))
                })
                .collect()
        };
        Vtk {
            version: Version { major: 4, minor: 2 },
            title: String::from("b3-2d"),
            byte_order: ByteOrder::BigEndian,
            file_path: None,
            data: DataSet::inline(UnstructuredGridPiece {
                points: IOBuffer::F64(self.points.iter().flatten().cloned().collect()),
                cells: Cells {
                    cell_verts: VertexNumbers::Legacy {
                        num_cells: self.n_cells() as u32,
                        vertices,
                    },
                    types: self.cells.iter().map(|c| c.kind.into()).collect(),
                },
                data: Attributes {
                    point: to_attributes(&self.point_data),
                    cell: to_attributes(&self.cell_data),
                },
            }),
        }
        .export_ascii(path)
        .map_err(|e| MeshError::Vtk {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}
