use std::collections::BTreeMap;

use crate::{
    config::SectionConfig,
    section::{validate_points, SectionGeometry},
    Builder,
};

use super::{
    get_thickness_and_material_arrays, AirfoilMesh, ModelError, Ply, Result, Skin, Thickness, Web,
};

/// [`AirfoilMesh`] builder type
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AirfoilMeshBuilder {
    pub skins: BTreeMap<String, Skin>,
    pub webs: BTreeMap<String, Web>,
    pub airfoil_input: Vec<[f64; 2]>,
    pub n_elem: Option<usize>,
    pub plot_filename: Option<String>,
    pub vtk: Option<String>,
}

/// ## `AirfoilMesh` builder
impl AirfoilMeshBuilder {
    /// Creates the skins and webs of a section
    ///
    /// There is one skin per ply thickness field of the airfoil, a ply with a zero
    /// thickness everywhere is skipped.
    /// If the trailing edge is part of the airfoil loop, only the plies found on both
    /// the airfoil and the trailing edge are kept.
    /// Webs without ply thickness fields are given a single ply of constant thickness.
    pub fn from_section(geometry: &SectionGeometry, config: &SectionConfig) -> Result<Self> {
        let airfoil = get_thickness_and_material_arrays(&geometry.airfoil);
        let te = geometry.te.as_ref().map(get_thickness_and_material_arrays);

        let mut skins = BTreeMap::new();
        for field in &airfoil.fields {
            let Some(skin_thickness) = airfoil.get(field) else {
                continue;
            };
            let thickness: Vec<f64> = match &te {
                Some(te) => {
                    let Some(te_thickness) = te.get(field) else {
                        log::debug!("{} not found on the trailing edge", field.name);
                        continue;
                    };
                    skin_thickness[..skin_thickness.len().saturating_sub(1)]
                        .iter()
                        .chain(te_thickness.iter().skip(1))
                        .cloned()
                        .collect()
                }
                None => skin_thickness.to_vec(),
            };
            let thickness = Thickness::array(thickness);
            if thickness.is_zero() {
                log::debug!("skipping {}: zero thickness", field.name);
                continue;
            }
            let i = skins.len();
            let material = airfoil
                .dominant_material(field)
                .or_else(|| te.as_ref().and_then(|te| te.dominant_material(field)))
                .unwrap_or(i as i64 + 1);
            skins.insert(
                format!("skin_{i}"),
                Skin {
                    thickness,
                    material,
                    sort_index: i,
                },
            );
        }

        let n_skins = skins.len() as i64;
        let webs = geometry
            .webs
            .iter()
            .enumerate()
            .map(|(k, web)| {
                let arrays = get_thickness_and_material_arrays(web);
                let default_material = n_skins + k as i64 + 1;
                let mut plies: Vec<Ply> = arrays
                    .fields
                    .iter()
                    .filter_map(|field| {
                        let thickness = Thickness::array(arrays.get(field)?.to_vec());
                        (!thickness.is_zero()).then(|| Ply {
                            thickness,
                            material: arrays.dominant_material(field).unwrap_or(default_material),
                        })
                    })
                    .collect();
                if plies.is_empty() {
                    plies.push(Ply {
                        thickness: Thickness::constant(config.web_thickness),
                        material: default_material,
                    });
                }
                (
                    format!("web{}", k + 1),
                    Web {
                        points: web.points_2d(),
                        plies,
                        normal_ref: if k % 2 == 0 { [1., 0.] } else { [-1., 0.] },
                        n_cell: config.web_n_cell,
                    },
                )
            })
            .collect();

        log::debug!(
            "section model: {} skins, {} webs, {} airfoil points",
            skins.len(),
            geometry.n_webs(),
            geometry.airfoil_points.len()
        );
        Ok(Self {
            skins,
            webs,
            airfoil_input: geometry.airfoil_points.clone(),
            ..Default::default()
        })
    }
    /// Set the airfoil closed loop
    pub fn airfoil_input(self, airfoil_input: Vec<[f64; 2]>) -> Self {
        Self {
            airfoil_input,
            ..self
        }
    }
    /// Add a skin
    pub fn skin<S: Into<String>>(mut self, name: S, skin: Skin) -> Self {
        self.skins.insert(name.into(), skin);
        self
    }
    /// Add a web
    pub fn web<S: Into<String>>(mut self, name: S, web: Web) -> Self {
        self.webs.insert(name.into(), web);
        self
    }
    /// Set the number of elements along the airfoil
    pub fn n_elem(self, n_elem: usize) -> Self {
        Self {
            n_elem: Some(n_elem),
            ..self
        }
    }
    /// Set the name of the picture the mesher saves
    pub fn plot_filename<S: Into<String>>(self, plot_filename: S) -> Self {
        Self {
            plot_filename: Some(plot_filename.into()),
            ..self
        }
    }
    /// Set the name of the mesher VTK output file
    pub fn vtk<S: Into<String>>(self, vtk: S) -> Self {
        Self {
            vtk: Some(vtk.into()),
            ..self
        }
    }
    fn check(&self) -> Result<()> {
        let n = self.airfoil_input.len();
        if !validate_points(&self.airfoil_input) {
            return Err(ModelError::InvalidAirfoil(n));
        }
        for (name, skin) in &self.skins {
            if let Thickness::Array { array } = &skin.thickness {
                if array.len() != n {
                    return Err(ModelError::ThicknessLength {
                        name: name.clone(),
                        expected: n,
                        found: array.len(),
                    });
                }
            }
            if !skin.thickness.is_valid() {
                return Err(ModelError::InvalidThickness { name: name.clone() });
            }
        }
        for (name, web) in &self.webs {
            let n = web.points.len();
            if n < 2 {
                return Err(ModelError::WebPoints {
                    name: name.clone(),
                    found: n,
                });
            }
            if web.plies.is_empty() {
                return Err(ModelError::NoPlies { name: name.clone() });
            }
            for ply in &web.plies {
                match &ply.thickness {
                    Thickness::Array { array } if array.len() != n => {
                        return Err(ModelError::ThicknessLength {
                            name: name.clone(),
                            expected: n,
                            found: array.len(),
                        })
                    }
                    thickness if !thickness.is_valid() => {
                        return Err(ModelError::InvalidThickness { name: name.clone() })
                    }
                    _ => (),
                }
            }
        }
        Ok(())
    }
}
impl Builder for AirfoilMeshBuilder {
    type Component = AirfoilMesh;
    /// Build the `AirfoilMesh`
    fn build(self) -> crate::Result<AirfoilMesh> {
        self.check()?;
        Ok(AirfoilMesh {
            skins: self.skins,
            webs: self.webs,
            airfoil_input: self.airfoil_input,
            n_elem: self.n_elem,
            plot: self.plot_filename.is_some(),
            plot_filename: self.plot_filename,
            vtk: self.vtk,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::{extract_airfoil_and_web_points, tests::box_section};
    use approx::assert_abs_diff_eq;

    fn section(te_height: f64) -> SectionGeometry {
        let mesh = box_section(te_height);
        let n = mesh.n_cells();
        let panel_id = mesh.cell_data["panel_id"].clone();
        let glass: Vec<f64> = panel_id
            .iter()
            .map(|&id| if id >= 0. { 1e-3 } else if id == -3. { 2e-3 } else { 0. })
            .collect();
        let mesh = mesh
            .with_cell_data("ply_1_glass_thickness", glass)
            .with_cell_data("ply_1_glass_material", vec![7.; n])
            .with_cell_data("ply_2_foam_thickness", vec![0.; n]);
        extract_airfoil_and_web_points(&mesh, &Default::default()).unwrap()
    }

    #[test]
    fn skins_and_webs() {
        let geometry = section(0.05);
        let model = AirfoilMeshBuilder::from_section(&geometry, &Default::default())
            .unwrap()
            .vtk("output.vtk")
            .build()
            .unwrap();
        assert_eq!(model.skins.len(), 1);
        let skin = &model.skins["skin_0"];
        assert_eq!(skin.material, 7);
        assert_eq!(skin.sort_index, 0);
        match &skin.thickness {
            Thickness::Array { array } => {
                assert_eq!(array.len(), model.airfoil_input.len());
                assert_abs_diff_eq!(array[0], 1e-3);
                assert_abs_diff_eq!(array[5], 2e-3);
            }
            _ => panic!("expected an array thickness"),
        }
        assert_eq!(model.webs.len(), 2);
        let web = &model.webs["web1"];
        assert_eq!(web.normal_ref, [1., 0.]);
        assert_eq!(web.n_cell, 10);
        assert_eq!(
            web.plies,
            vec![Ply {
                thickness: Thickness::constant(0.004),
                material: 2
            }]
        );
        assert_eq!(model.webs["web2"].normal_ref, [-1., 0.]);
        assert_eq!(model.webs["web2"].plies[0].material, 3);
        assert!(!model.plot);
        assert_eq!(model.vtk.as_deref(), Some("output.vtk"));
    }

    #[test]
    fn skin_without_te() {
        let geometry = section(0.001);
        let model = AirfoilMeshBuilder::from_section(&geometry, &Default::default())
            .unwrap()
            .build()
            .unwrap();
        match &model.skins["skin_0"].thickness {
            Thickness::Array { array } => assert!(array.iter().all(|&t| t == 1e-3)),
            _ => panic!("expected an array thickness"),
        }
    }

    #[test]
    fn invalid_models() {
        let skin = Skin {
            thickness: Thickness::array(vec![1e-3; 2]),
            material: 1,
            sort_index: 0,
        };
        let builder = AirfoilMeshBuilder::new()
            .airfoil_input(vec![[0., 0.], [1., 0.], [0., 1.]])
            .skin("skin_0", skin);
        assert!(matches!(
            builder.clone().build(),
            Err(crate::B32dError::Model(ModelError::ThicknessLength { found: 2, .. }))
        ));
        assert!(matches!(
            AirfoilMeshBuilder::new().build(),
            Err(crate::B32dError::Model(ModelError::InvalidAirfoil(0)))
        ));
        let web = Web {
            points: vec![[0.5, 0.]],
            plies: vec![],
            normal_ref: [1., 0.],
            n_cell: 10,
        };
        assert!(matches!(
            AirfoilMeshBuilder::new()
                .airfoil_input(vec![[0., 0.], [1., 0.], [0., 1.]])
                .web("web1", web)
                .build(),
            Err(crate::B32dError::Model(ModelError::WebPoints { found: 1, .. }))
        ));
    }
}
