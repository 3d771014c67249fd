//! Spanwise collection of the section results

use std::path::Path;

use crate::{
    anba::{section_id_from_path, AnbaResults, ANBA_OUTPUT},
    Bom,
};

/// Section bill of materials file name
pub const BOM_FILE: &str = "bom.json";

fn section_files(dir: &Path, name: &str) -> Vec<(i64, std::path::PathBuf)> {
    let pattern = dir.join("section_*").join(name);
    let mut files: Vec<_> = match glob::glob(&pattern.to_string_lossy()) {
        Ok(paths) => paths
            .filter_map(|entry| entry.ok())
            .filter_map(|path| section_id_from_path(&path).map(|id| (id, path)))
            .collect(),
        Err(e) => {
            log::warn!("invalid pattern {pattern:?}: {e}");
            vec![]
        }
    };
    files.sort_by_key(|(id, _)| *id);
    files
}

/// Bills of materials of the sections sorted by section id
///
/// Files that cannot be parsed are skipped with a warning.
pub fn collect_bom_spanwise<P: AsRef<Path>>(dir: P) -> Vec<(i64, Bom)> {
    section_files(dir.as_ref(), BOM_FILE)
        .into_iter()
        .filter_map(|(id, path)| match Bom::load(&path) {
            Ok(bom) => Some((id, bom)),
            Err(e) => {
                log::warn!("Missing required keys in {path:?}: {e}");
                None
            }
        })
        .collect()
}

/// ANBA4 results of the sections sorted by section id
///
/// Files that cannot be parsed are skipped with a warning.
pub fn collect_anba_spanwise<P: AsRef<Path>>(dir: P) -> Vec<(i64, AnbaResults)> {
    section_files(dir.as_ref(), ANBA_OUTPUT)
        .into_iter()
        .filter_map(|(id, path)| match AnbaResults::load(&path) {
            Ok(results) => Some((id, results)),
            Err(e) => {
                log::warn!("Missing required keys in {path:?}: {e}");
                None
            }
        })
        .collect()
}
