#[derive(Debug, thiserror::Error)]
pub enum B32dError {
    #[error("mesh failure")]
    Mesh(#[from] crate::mesh::MeshError),
    #[error("section extraction failure")]
    Section(#[from] crate::section::SectionError),
    #[error("cannot build the section meshing model")]
    Model(#[from] crate::model::ModelError),
    #[error("mesher failure")]
    Mesher(#[from] crate::mesher::MesherError),
    #[error("ANBA4 failure")]
    Anba(#[from] crate::anba::AnbaError),
    #[error("plotting failure")]
    Plot(#[from] crate::plotting::PlotError),
    #[error("configuration failure")]
    Config(#[from] crate::config::ConfigError),
    #[error("pipeline step failure")]
    Step(#[from] crate::step::StepError),
    #[error("cannot create the thread pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("I/O failure")]
    Io(#[from] std::io::Error),
    #[error("JSON (de)serialization failure")]
    Json(#[from] serde_json::Error),
}
