//! Bill of materials
//!
//! Cross-sectional area and mass per material of a meshed section.

use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

use serde::{Deserialize, Deserializer, Serialize};

use crate::{Result, SurfaceMesh};

/// Material properties, `id` matches the mesh `material_id` and `rho` is the density
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialProperties {
    #[serde(
        default,
        deserialize_with = "material_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rho: Option<f64>,
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}
impl MaterialProperties {
    pub fn new(id: i64, rho: f64) -> Self {
        Self {
            id: Some(id),
            rho: Some(rho),
            ..Default::default()
        }
    }
    /// Names of the properties set for this material
    pub fn keys(&self) -> Vec<String> {
        self.id
            .map(|_| "id".to_string())
            .into_iter()
            .chain(self.rho.map(|_| "rho".to_string()))
            .chain(self.other.keys().cloned())
            .collect()
    }
}

/// Reads a material id given as an integer or as a numeric string
///
/// Any other value is discarded with a warning and the material has no id.
fn material_id<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde_json::Value;
    let Some(value) = Option::<Value>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let id = match &value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|x| x.fract() == 0.).map(|x| x as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    if id.is_none() {
        log::warn!("invalid material id {value} in matdb, the material is skipped");
    }
    Ok(id)
}

/// Material database: material name to properties
pub type MaterialDb = BTreeMap<String, MaterialProperties>;

/// Reverse lookup of a material database by material id
pub fn materials_by_id(matdb: &MaterialDb) -> BTreeMap<i64, (&str, &MaterialProperties)> {
    matdb
        .iter()
        .filter_map(|(name, props)| props.id.map(|id| (id, (name.as_str(), props))))
        .collect()
}

/// Section bill of materials
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bom {
    pub total_area: f64,
    pub areas_per_material: BTreeMap<i64, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_mass: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masses_per_material: Option<BTreeMap<i64, f64>>,
}

impl Bom {
    /// Sums the bills of materials of several sections
    pub fn accumulate<'a>(boms: impl IntoIterator<Item = &'a Bom>) -> Self {
        boms.into_iter().fold(Bom::default(), |mut acc, bom| {
            acc.total_area += bom.total_area;
            bom.areas_per_material.iter().for_each(|(id, area)| {
                *acc.areas_per_material.entry(*id).or_default() += area;
            });
            if let Some(mass) = bom.total_mass {
                *acc.total_mass.get_or_insert(0.) += mass;
            }
            if let Some(masses) = &bom.masses_per_material {
                let acc_masses = acc.masses_per_material.get_or_insert_with(BTreeMap::new);
                masses.iter().for_each(|(id, mass)| {
                    *acc_masses.entry(*id).or_default() += mass;
                });
            }
            acc
        })
    }
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
    pub fn dump<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }
}

/// Computes the bill of materials from the `Area` and `material_id` cell data of the mesh
///
/// Returns `None` if any of the cell data is missing.
/// The masses are computed only if a non-empty material database is given.
pub fn compute_bom(mesh: &SurfaceMesh, matdb: Option<&MaterialDb>) -> Option<Bom> {
    let area = mesh.cell_data.get("Area")?;
    let material_id = mesh.cell_data.get("material_id")?;

    let total_area: f64 = area.iter().sum();
    let mut areas_per_material: BTreeMap<i64, f64> = BTreeMap::new();
    for (id, a) in material_id.iter().zip(area) {
        *areas_per_material.entry(id.round() as i64).or_default() += a;
    }
    let mut bom = Bom {
        total_area,
        areas_per_material,
        ..Default::default()
    };

    let Some(matdb) = matdb.filter(|matdb| !matdb.is_empty()) else {
        return Some(bom);
    };
    let id_to_props = materials_by_id(matdb);
    let mut masses_per_material = BTreeMap::new();
    let mut total_mass = 0f64;
    for (id, area) in &bom.areas_per_material {
        match id_to_props.get(id) {
            Some((_, MaterialProperties { rho: Some(rho), .. })) => {
                let mass = area * rho;
                masses_per_material.insert(*id, mass);
                total_mass += mass;
            }
            Some((_, props)) => log::warn!("{}", missing_rho_message(*id, &props.keys())),
            None => log::warn!(
                "{}",
                missing_material_message(*id, &id_to_props.keys().copied().collect::<Vec<_>>())
            ),
        }
    }
    bom.total_mass = Some(total_mass);
    bom.masses_per_material = Some(masses_per_material);
    Some(bom)
}

fn missing_rho_message(id: i64, keys: &[String]) -> String {
    format!(
        "Density (rho) not found in matdb for material ID {id} (attempted key: 'rho'). \
         Available keys in matdb for this material: {keys:?}. Skipping mass calculation."
    )
}

fn missing_material_message(id: i64, ids: &[i64]) -> String {
    format!(
        "Material ID {id} not found in matdb. Available material IDs: {ids:?}. \
         Skipping mass calculation."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh() -> SurfaceMesh {
        let mut mesh = SurfaceMesh::default();
        mesh.cell_data.insert("Area".into(), vec![1., 2., 3.]);
        mesh.cell_data.insert("material_id".into(), vec![1., 1., 2.]);
        mesh
    }

    #[test]
    fn areas() {
        let bom = compute_bom(&mesh(), None).unwrap();
        assert_eq!(bom.total_area, 6.);
        assert_eq!(bom.areas_per_material, BTreeMap::from([(1, 3.), (2, 3.)]));
        assert!(bom.total_mass.is_none());
        assert!(bom.masses_per_material.is_none());
    }

    #[test]
    fn empty_matdb_skips_masses() {
        let bom = compute_bom(&mesh(), Some(&MaterialDb::new())).unwrap();
        assert!(bom.total_mass.is_none());
    }

    #[test]
    fn masses() {
        let matdb = MaterialDb::from([
            ("carbon".to_string(), MaterialProperties::new(1, 1600.)),
            ("glass".to_string(), MaterialProperties::new(2, 2000.)),
        ]);
        let bom = compute_bom(&mesh(), Some(&matdb)).unwrap();
        assert_eq!(bom.total_mass, Some(3. * 1600. + 3. * 2000.));
        assert_eq!(
            bom.masses_per_material,
            Some(BTreeMap::from([(1, 4800.), (2, 6000.)]))
        );
    }

    #[test]
    fn partial_matdb() {
        let matdb = MaterialDb::from([
            ("carbon".to_string(), MaterialProperties::new(1, 1600.)),
            (
                "foam".to_string(),
                MaterialProperties {
                    id: Some(2),
                    ..Default::default()
                },
            ),
        ]);
        let bom = compute_bom(&mesh(), Some(&matdb)).unwrap();
        assert_eq!(bom.total_mass, Some(4800.));
        assert_eq!(bom.masses_per_material, Some(BTreeMap::from([(1, 4800.)])));
    }

    #[test]
    fn material_not_in_matdb() {
        let matdb = MaterialDb::from([("carbon".to_string(), MaterialProperties::new(1, 1600.))]);
        let bom = compute_bom(&mesh(), Some(&matdb)).unwrap();
        assert_eq!(bom.areas_per_material[&2], 3.);
        assert_eq!(bom.masses_per_material, Some(BTreeMap::from([(1, 4800.)])));
        assert_eq!(bom.total_mass, Some(4800.));
        assert_eq!(
            missing_material_message(2, &[1]),
            "Material ID 2 not found in matdb. Available material IDs: [1]. Skipping mass calculation."
        );
        assert_eq!(
            missing_rho_message(2, &["id".to_string()]),
            "Density (rho) not found in matdb for material ID 2 (attempted key: 'rho'). \
             Available keys in matdb for this material: [\"id\"]. Skipping mass calculation."
        );
    }

    #[test]
    fn string_material_ids() {
        let matdb: MaterialDb = serde_json::from_str(
            r#"{
                "carbon": {"id": "1", "rho": 1600.0},
                "glass": {"id": 2.0, "rho": 2000.0},
                "foam": {"id": "core", "rho": 80.0, "E": 1e6}
            }"#,
        )
        .unwrap();
        assert_eq!(matdb["carbon"].id, Some(1));
        assert_eq!(matdb["glass"].id, Some(2));
        assert_eq!(matdb["foam"].id, None);
        assert_eq!(matdb["foam"].other["E"], 1e6);
        let ids: Vec<i64> = materials_by_id(&matdb).into_keys().collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn missing_cell_data() {
        assert!(compute_bom(&SurfaceMesh::default(), None).is_none());
        let mut mesh = mesh();
        mesh.cell_data.remove("material_id");
        assert!(compute_bom(&mesh, None).is_none());
    }

    #[test]
    fn accumulate() {
        let matdb = MaterialDb::from([("carbon".to_string(), MaterialProperties::new(1, 10.))]);
        let a = compute_bom(&mesh(), Some(&matdb)).unwrap();
        let b = compute_bom(&mesh(), None).unwrap();
        let total = Bom::accumulate([&a, &b]);
        assert_eq!(total.total_area, 12.);
        assert_eq!(total.areas_per_material, BTreeMap::from([(1, 6.), (2, 6.)]));
        assert_eq!(total.total_mass, Some(30.));
    }

    #[test]
    fn json_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bom.json");
        let bom = compute_bom(&mesh(), None).unwrap();
        bom.dump(&path).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["areas_per_material"]["1"], 3.);
        assert!(json.get("total_mass").is_none());
        assert_eq!(Bom::load(&path).unwrap(), bom);
    }
}
