//! # Section extraction
//!
//! A section is the set of cells of the draped mesh sharing the same `section_id`.
//! Its cells are split according to their `panel_id`:
//!  * `panel_id >= 0`: airfoil skin,
//!  * `panel_id == te_panel_id` (-3 by default): trailing edge,
//!  * the other negative ids: shear webs, ordered as `-1, -2, ...`

use crate::{config::SectionConfig, mesh::MeshError, SurfaceMesh};

#[derive(Debug, thiserror::Error)]
pub enum SectionError {
    #[error("section_id not found in VTP file")]
    MissingSectionId,
    #[error("panel_id not found in section mesh")]
    MissingPanelId,
    #[error("no cells with section_id {0}")]
    Empty(i64),
    #[error("no airfoil skin cells (panel_id >= 0) in section")]
    NoSkin,
    #[error("invalid airfoil points: at least 3 finite points are required, found {0}")]
    InvalidPoints(usize),
    #[error("section mesh failure")]
    Mesh(#[from] MeshError),
}
pub type Result<T> = std::result::Result<T, SectionError>;

/// Geometry of a section ready for modeling
#[derive(Debug, Clone, Default)]
pub struct SectionGeometry {
    /// Airfoil skin
    pub airfoil: SurfaceMesh,
    /// Trailing edge, only if it is part of the airfoil loop
    pub te: Option<SurfaceMesh>,
    /// Shear webs, points sorted by increasing y
    pub webs: Vec<SurfaceMesh>,
    /// Airfoil closed loop
    pub airfoil_points: Vec<[f64; 2]>,
}
impl SectionGeometry {
    pub fn n_webs(&self) -> usize {
        self.webs.len()
    }
    /// Webs (x,y) coordinates
    pub fn web_points(&self) -> Vec<Vec<[f64; 2]>> {
        self.webs.iter().map(|web| web.points_2d()).collect()
    }
}

/// Sorted unique section ids
pub fn section_ids(mesh: &SurfaceMesh) -> Result<Vec<i64>> {
    let values = mesh
        .cell_data
        .get("section_id")
        .ok_or(SectionError::MissingSectionId)?;
    let mut ids: Vec<i64> = values.iter().map(|v| v.round() as i64).collect();
    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}

/// Extracts the cells of a section
pub fn extract_section(mesh: &SurfaceMesh, section_id: i64) -> Result<SurfaceMesh> {
    if !mesh.cell_data.contains_key("section_id") {
        return Err(SectionError::MissingSectionId);
    }
    let id = section_id as f64;
    let section = mesh.threshold("section_id", (id, id))?;
    if section.is_empty() {
        return Err(SectionError::Empty(section_id));
    }
    Ok(section)
}

/// Removes the section offset and twist
///
/// The section is translated by `(-dx,-dy)` and rotated by `-twist` degrees around z,
/// `dx`, `dy` and `twist` being the mean values over the skin cells.
/// Returns false and leaves the section unchanged if these cell data are missing.
pub fn detransform(section: &mut SurfaceMesh) -> bool {
    let Some(panel_id) = section.cell_data.get("panel_id") else {
        return false;
    };
    let skin: Vec<usize> = panel_id
        .iter()
        .enumerate()
        .filter(|(_, &id)| id >= 0.)
        .map(|(i, _)| i)
        .collect();
    if skin.is_empty() {
        return false;
    }
    let skin_mean = |name: &str| {
        section
            .cell_data
            .get(name)
            .map(|v| skin.iter().map(|&i| v[i]).sum::<f64>() / skin.len() as f64)
    };
    let (Some(twist), Some(dx), Some(dy)) = (skin_mean("twist"), skin_mean("dx"), skin_mean("dy"))
    else {
        return false;
    };
    log::debug!("detransform: dx={dx:.4}, dy={dy:.4}, twist={twist:.3}deg");
    section.translate(-dx, -dy, 0.).rotate_z(-twist);
    true
}

/// Stable reordering of the points by increasing y
pub fn sort_points_by_y(mesh: &SurfaceMesh) -> SurfaceMesh {
    let mut order: Vec<usize> = (0..mesh.n_points()).collect();
    order.sort_by(|&a, &b| mesh.points[a][1].total_cmp(&mesh.points[b][1]));
    mesh.permute_points(&order)
}

/// Checks that a points loop has at least 3 points with finite coordinates
pub fn validate_points(points: &[[f64; 2]]) -> bool {
    points.len() >= 3 && points.iter().flatten().all(|x| x.is_finite())
}

/// Size of the mesh bounding box in the (x,y) plane
pub fn bb_size(mesh: &SurfaceMesh) -> f64 {
    mesh.bb_size()
}

/// Splits a section into airfoil, trailing edge and webs
pub fn extract_airfoil_and_web_points(
    section: &SurfaceMesh,
    config: &SectionConfig,
) -> Result<SectionGeometry> {
    let panel_ids = section
        .unique_cell_values("panel_id")
        .map_err(|_| SectionError::MissingPanelId)?;
    let max_id = panel_ids.last().copied().unwrap_or(-1.);
    if max_id < 0. {
        return Err(SectionError::NoSkin);
    }
    let airfoil = section.threshold("panel_id", (0., max_id))?;
    let skin_points = airfoil.points_2d();

    let te_id = config.te_panel_id as f64;
    let has_te = panel_ids.contains(&te_id);
    let mut web_ids: Vec<f64> = panel_ids
        .into_iter()
        .filter(|&id| id < 0. && id != te_id)
        .collect();
    // -1, -2, ...
    web_ids.reverse();

    let te = if has_te {
        let te = section.threshold("panel_id", (te_id, te_id))?;
        let (te_size, skin_size) = (te.bb_size(), airfoil.bb_size());
        if te_size > config.te_size_ratio * skin_size {
            Some(te)
        } else {
            log::debug!(
                "trailing edge discarded: size {te_size:.4} <= {} x {skin_size:.4}",
                config.te_size_ratio
            );
            None
        }
    } else {
        None
    };

    let airfoil_points = match &te {
        Some(te) => skin_points[..skin_points.len().saturating_sub(1)]
            .iter()
            .chain(te.points_2d().iter().skip(1))
            .cloned()
            .collect(),
        None => skin_points,
    };
    if !validate_points(&airfoil_points) {
        return Err(SectionError::InvalidPoints(airfoil_points.len()));
    }

    let webs = web_ids
        .into_iter()
        .map(|id| {
            section
                .threshold("panel_id", (id, id))
                .map(|web| sort_points_by_y(&web))
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(SectionGeometry {
        airfoil,
        te,
        webs,
        airfoil_points,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::mesh::Cell;
    use approx::assert_abs_diff_eq;

    /// Rectangular box section made of line cells:
    /// skin panels 0 and 1, webs -1 and -2 and trailing edge -3
    pub fn box_section(te_height: f64) -> SurfaceMesh {
        let mut points = vec![];
        let mut cells = vec![];
        let mut panel_id = vec![];
        let mut line = |xy: &[[f64; 2]], id: f64| {
            let offset = points.len();
            points.extend(xy.iter().map(|p| [p[0], p[1], 0.]));
            for i in 0..xy.len() - 1 {
                cells.push(Cell::line([offset + i, offset + i + 1]));
                panel_id.push(id);
            }
        };
        // suction side, from the trailing edge to the leading edge
        line(&[[1., te_height], [0.5, 0.1], [0., 0.]], 0.);
        // pressure side, from the leading edge back to the trailing edge
        line(&[[0., 0.], [0.5, -0.1], [1., -te_height]], 1.);
        line(&[[1., -te_height], [1., te_height]], -3.);
        line(&[[0.3, 0.08], [0.3, 0.], [0.3, -0.08]], -1.);
        line(&[[0.6, -0.07], [0.6, 0.07]], -2.);
        let n = cells.len();
        SurfaceMesh::new(points, cells)
            .with_cell_data("panel_id", panel_id)
            .with_cell_data("section_id", vec![3.; n])
    }

    #[test]
    fn ids() {
        let mesh = box_section(0.05);
        assert_eq!(section_ids(&mesh).unwrap(), vec![3]);
        assert!(matches!(
            section_ids(&SurfaceMesh::default()),
            Err(SectionError::MissingSectionId)
        ));
        assert!(matches!(
            extract_section(&mesh, 4),
            Err(SectionError::Empty(4))
        ));
    }

    #[test]
    fn airfoil_with_te() {
        let section = extract_section(&box_section(0.05), 3).unwrap();
        let geometry = extract_airfoil_and_web_points(&section, &Default::default()).unwrap();
        assert!(geometry.te.is_some());
        assert_eq!(geometry.airfoil.n_points(), 6);
        // 5 skin points + 1 trailing edge point
        assert_eq!(geometry.airfoil_points.len(), 6);
        assert_eq!(geometry.airfoil_points[5], [1., 0.05]);
        assert_eq!(geometry.n_webs(), 2);
        assert_eq!(geometry.web_points()[0][0], [0.3, -0.08]);
        assert_eq!(geometry.web_points()[1], vec![[0.6, -0.07], [0.6, 0.07]]);
    }

    #[test]
    fn small_te_is_discarded() {
        let section = extract_section(&box_section(0.001), 3).unwrap();
        let geometry = extract_airfoil_and_web_points(&section, &Default::default()).unwrap();
        assert!(geometry.te.is_none());
        assert_eq!(geometry.airfoil_points.len(), 6);
        assert_eq!(geometry.n_webs(), 2);
    }

    #[test]
    fn webs_without_te() {
        let section = box_section(0.05).threshold("panel_id", (-2., 1.)).unwrap();
        let geometry = extract_airfoil_and_web_points(&section, &Default::default()).unwrap();
        assert!(geometry.te.is_none());
        assert_eq!(geometry.n_webs(), 2);
        assert_eq!(geometry.web_points()[1], vec![[0.6, -0.07], [0.6, 0.07]]);
        assert_eq!(geometry.airfoil_points.len(), 6);
        assert_eq!(geometry.airfoil_points.last(), Some(&[1., -0.05]));
    }

    #[test]
    fn custom_te_panel_id() {
        let config = SectionConfig {
            te_panel_id: -2,
            ..Default::default()
        };
        let section = extract_section(&box_section(0.05), 3).unwrap();
        let geometry = extract_airfoil_and_web_points(&section, &config).unwrap();
        // -2 is a short vertical segment at x=0.6, large enough to pass the size check
        assert!(geometry.te.is_some());
        assert_eq!(geometry.n_webs(), 2);
        assert_eq!(geometry.web_points()[0][0], [0.3, -0.08]);
        assert_eq!(geometry.web_points()[1], vec![[1., -0.05], [1., 0.05]]);
    }

    #[test]
    fn no_skin() {
        let section = box_section(0.05).threshold("panel_id", (-3., -1.)).unwrap();
        assert!(matches!(
            extract_airfoil_and_web_points(&section, &Default::default()),
            Err(SectionError::NoSkin)
        ));
    }

    #[test]
    fn no_webs() {
        let section = box_section(0.05).threshold("panel_id", (0., 1.)).unwrap();
        let geometry = extract_airfoil_and_web_points(&section, &Default::default()).unwrap();
        assert!(geometry.te.is_none());
        assert_eq!(geometry.n_webs(), 0);
    }

    #[test]
    fn points_validation() {
        assert!(validate_points(&[[0., 0.], [1., 0.], [0., 1.]]));
        assert!(!validate_points(&[[0., 0.], [1., 0.]]));
        assert!(!validate_points(&[[0., 0.], [1., f64::NAN], [0., 1.]]));
    }

    #[test]
    fn sort_by_y() {
        let web = SurfaceMesh::new(
            vec![[0., 1., 0.], [0., -1., 0.], [0., 0., 0.]],
            vec![Cell::line([0, 2]), Cell::line([2, 1])],
        )
        .with_point_data("t", vec![1., 2., 3.]);
        let sorted = sort_points_by_y(&web);
        assert_eq!(sorted.points_2d(), vec![[0., -1.], [0., 0.], [0., 1.]]);
        assert_eq!(sorted.point_data["t"], vec![2., 3., 1.]);
        assert_eq!(sorted.cells[0].points, vec![2, 1]);
        assert_eq!(sorted.cells[1].points, vec![1, 0]);
    }

    #[test]
    fn remove_twist_and_offset() {
        let mut section = SurfaceMesh::new(
            vec![[1., 2., 0.], [1., 3., 0.]],
            vec![Cell::line([0, 1])],
        );
        assert!(!detransform(&mut section));
        section = section
            .with_cell_data("panel_id", vec![0.])
            .with_cell_data("twist", vec![90.])
            .with_cell_data("dx", vec![1.])
            .with_cell_data("dy", vec![2.]);
        assert!(detransform(&mut section));
        assert_abs_diff_eq!(section.points[0][0], 0., epsilon = 1e-12);
        assert_abs_diff_eq!(section.points[0][1], 0., epsilon = 1e-12);
        assert_abs_diff_eq!(section.points[1][0], 1., epsilon = 1e-12);
        assert_abs_diff_eq!(section.points[1][1], 0., epsilon = 1e-12);
        assert_abs_diff_eq!(bb_size(&section), 1., epsilon = 1e-12);
    }
}
