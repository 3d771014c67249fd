//!
//! # b3-2d
//!
//! Blade cross-section processing: a draped composite-blade surface mesh is cut
//! into span stations, each station is turned into a planar skin + shear-web
//! model, meshed by the external `cgfoil` mesher and handed over to the ANBA4
//! beam cross-section solver.
//!
//! The meshing model of a section is created with its builder:
//! ```no_run
//! use b3_2d::{section, AirfoilMeshBuilder, Builder, Config, SurfaceMesh};
//!
//! let config = Config::default();
//! let draped = SurfaceMesh::load_draped("draped.vtk", config.section.rotation_angle)?;
//! let station = section::extract_section(&draped, 12)?;
//! let geometry = section::extract_airfoil_and_web_points(&station, &config.section)?;
//! let model = AirfoilMeshBuilder::from_section(&geometry, &config.section)?.build()?;
//! println!("{} skins, {} webs", model.skins.len(), model.webs.len());
//! # Ok::<(), b3_2d::B32dError>(())
//! ```
//! The whole blade is processed with [`process_vtp_multi_section`].

pub mod anba;
pub mod bom;
pub mod config;
pub mod error;
pub mod mesh;
pub mod mesher;
pub mod model;
pub mod pipeline;
pub mod plotting;
pub mod section;
pub mod span;
pub mod step;

#[doc(inline)]
pub use self::anba::{AnbaInput, AnbaResults, AnbaRun, AnbaRunner};
#[doc(inline)]
pub use self::bom::{compute_bom, Bom, MaterialDb, MaterialProperties};
#[doc(inline)]
pub use self::config::Config;
#[doc(inline)]
pub use self::error::B32dError;
#[doc(inline)]
pub use self::mesh::SurfaceMesh;
#[doc(inline)]
pub use self::mesher::{CgfoilMesher, Mesher};
#[doc(inline)]
pub use self::model::{AirfoilMesh, AirfoilMeshBuilder, Ply, Skin, Thickness, Web};
#[doc(inline)]
pub use self::pipeline::{process_single_section, process_vtp_multi_section, SectionResult};
#[doc(inline)]
pub use self::section::SectionGeometry;
#[doc(inline)]
pub use self::step::{AnbaStep, ManagedFile, MeshStep, PostStep, Step};

pub type Result<T> = std::result::Result<T, B32dError>;

/// Builder type trait
pub trait Builder: Default {
    type Component;
    fn new() -> Self {
        Default::default()
    }
    fn build(self) -> Result<Self::Component>;
}
