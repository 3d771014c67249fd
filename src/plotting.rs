//! # Diagnostic plots
//!
//! PNG pictures of the section meshes, of the ANBA4 results and of the
//! spanwise distribution of the section properties.

use std::{
    error::Error,
    ops::Range,
    path::{Path, PathBuf},
};

use plotters::{
    coord::{types::RangedCoordf64, Shift},
    prelude::*,
};

use crate::{
    config::SectionConfig,
    mesh::SurfaceMesh,
    section::{detransform, extract_airfoil_and_web_points, SectionGeometry},
    AnbaResults,
};

pub mod colors;
mod span;
pub use span::{plot_bom_spanwise, plot_span_anba, plot_span_matrices};

#[derive(Debug, thiserror::Error)]
pub enum PlotError {
    #[error("cannot draw {path}: {message}")]
    Drawing { path: PathBuf, message: String },
}
pub type Result<T> = std::result::Result<T, PlotError>;

type DrawResult = std::result::Result<(), Box<dyn Error>>;

const SECTION_SIZE: (u32, u32) = (1280, 660);
const SPAN_SIZE: (u32, u32) = (1200, 800);

/// Creates a PNG file and draws into it
fn draw_png<F>(output: &Path, size: (u32, u32), draw: F) -> Result<()>
where
    F: FnOnce(&DrawingArea<BitMapBackend, Shift>) -> DrawResult,
{
    let root = BitMapBackend::new(output, size).into_drawing_area();
    let draw_all = || -> DrawResult {
        root.fill(&WHITE)?;
        draw(&root)?;
        root.present()?;
        Ok(())
    };
    draw_all().map_err(|e| PlotError::Drawing {
        path: output.to_path_buf(),
        message: e.to_string(),
    })?;
    log::info!("Plot saved to {output:?}");
    Ok(())
}

/// x and y ranges of the mesh (x,y) bounding box with the aspect ratio of the picture
pub(crate) fn equal_aspect(bounds: [f64; 6], size: (u32, u32)) -> (Range<f64>, Range<f64>) {
    let (cx, cy) = (0.5 * (bounds[0] + bounds[1]), 0.5 * (bounds[2] + bounds[3]));
    let (mut w, mut h) = (
        (bounds[1] - bounds[0]) * 1.1,
        (bounds[3] - bounds[2]) * 1.1,
    );
    if w <= 0. && h <= 0. {
        w = 1.;
        h = 1.;
    }
    let ratio = size.0 as f64 / size.1 as f64;
    if w / h > ratio {
        h = w / ratio;
    } else {
        w = h * ratio;
    }
    (
        cx - 0.5 * w..cx + 0.5 * w,
        cy - 0.5 * h..cy + 0.5 * h,
    )
}

fn draw_cells<DB: DrawingBackend>(
    chart: &mut ChartContext<DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>,
    mesh: &SurfaceMesh,
    scalar: Option<&[f64]>,
) -> DrawResult
where
    DB::ErrorType: 'static,
{
    let xy = |p: usize| (mesh.points[p][0], mesh.points[p][1]);
    let colors = scalar.map(colors::scalar_colors);
    for (i, cell) in mesh.cells.iter().enumerate() {
        let points: Vec<(f64, f64)> = cell.points.iter().map(|&p| xy(p)).collect();
        match (&colors, cell.kind.is_surface()) {
            (Some(colors), true) => {
                let fill = colors[i].filled();
                chart.draw_series(
                    cell.triangles()
                        .into_iter()
                        .map(|t| Polygon::new(t.iter().map(|&p| xy(p)).collect::<Vec<_>>(), fill)),
                )?;
            }
            (None, true) => {
                let mut outline = points;
                let first = outline.first().cloned();
                outline.extend(first);
                chart.draw_series(std::iter::once(PathElement::new(
                    outline,
                    BLACK.stroke_width(1),
                )))?;
            }
            (Some(colors), false) => {
                chart.draw_series(std::iter::once(PathElement::new(
                    points,
                    colors[i].stroke_width(2),
                )))?;
            }
            (None, false) => {
                chart.draw_series(std::iter::once(PathElement::new(
                    points,
                    BLACK.stroke_width(1),
                )))?;
            }
        }
    }
    Ok(())
}

/// Plots the mesh in the (x,y) plane
///
/// The cells are colored according to the `scalar` cell data if the mesh has it.
pub fn plot_mesh<P: AsRef<Path>>(mesh: &SurfaceMesh, scalar: Option<&str>, output: P) -> Result<()> {
    let scalar_values = scalar.and_then(|name| mesh.cell_data.get(name).map(|v| v.as_slice()));
    let (x, y) = equal_aspect(mesh.bounds(), SECTION_SIZE);
    draw_png(output.as_ref(), SECTION_SIZE, |root| {
        let mut chart = ChartBuilder::on(root)
            .caption(scalar.unwrap_or(""), ("sans-serif", 20))
            .margin(10)
            .x_label_area_size(35)
            .y_label_area_size(50)
            .build_cartesian_2d(x, y)?;
        chart.configure_mesh().disable_mesh().draw()?;
        draw_cells(&mut chart, mesh, scalar_values)
    })
}

/// Plots the ANBA4 results over the material-colored mesh
///
/// The mass, shear and elastic centers are marked and the principal axis is drawn
/// through the elastic center.
pub fn plot_section_anba<P: AsRef<Path>>(
    mesh: &SurfaceMesh,
    results: &AnbaResults,
    output: P,
) -> Result<()> {
    let bounds = mesh.bounds();
    let (x, y) = equal_aspect(bounds, SECTION_SIZE);
    let angle = results.principal_angle;
    let length = (bounds[1] - bounds[0]).max(bounds[3] - bounds[2]) * 0.4;
    let (dx, dy) = (length * angle.cos(), length * angle.sin());
    let [ecx, ecy] = results.tension_center;
    draw_png(output.as_ref(), SECTION_SIZE, |root| {
        let mut chart = ChartBuilder::on(root)
            .margin(10)
            .x_label_area_size(35)
            .y_label_area_size(50)
            .build_cartesian_2d(x, y)?;
        chart.configure_mesh().draw()?;
        draw_cells(
            &mut chart,
            mesh,
            mesh.cell_data.get("material_id").map(|v| v.as_slice()),
        )?;

        let [mx, my] = results.mass_center;
        chart
            .draw_series(std::iter::once(Circle::new((mx, my), 6, RED.filled())))?
            .label("Mass Center")
            .legend(|(x, y)| Circle::new((x, y), 5, RED.filled()));
        let [sx, sy] = results.shear_center;
        chart
            .draw_series(std::iter::once(
                EmptyElement::at((sx, sy)) + Rectangle::new([(-5, -5), (5, 5)], BLUE.filled()),
            ))?
            .label("Shear Center")
            .legend(|(x, y)| Rectangle::new([(x - 5, y - 5), (x + 5, y + 5)], BLUE.filled()));
        chart
            .draw_series(std::iter::once(TriangleMarker::new(
                (ecx, ecy),
                7,
                GREEN.filled(),
            )))?
            .label("Elastic Center")
            .legend(|(x, y)| TriangleMarker::new((x, y), 6, GREEN.filled()));
        chart
            .draw_series(std::iter::once(PathElement::new(
                vec![(ecx - dx, ecy - dy), (ecx + dx, ecy + dy)],
                BLUE.stroke_width(2),
            )))?
            .label("Principal Angle")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE.stroke_width(2)));
        chart.draw_series(std::iter::once(Text::new(
            format!("Principal Angle: {:.2}°", results.principal_angle_deg()),
            (ecx + 0.02, ecy + 0.02),
            ("sans-serif", 16),
        )))?;
        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;
        Ok(())
    })
}

/// Plots a section as extracted from the draped mesh and after removing its twist and offset
///
/// The pictures `section_<id>_original.png` and `section_<id>_transformed.png` are
/// written in `output_dir`, the cells are colored with the `panel_id`.
/// The transformed view shows the skin and, when it is kept, the trailing edge.
pub fn plot_section_debug<P: AsRef<Path>>(
    section: &SurfaceMesh,
    config: &SectionConfig,
    output_dir: P,
    section_id: i64,
) -> Result<Vec<PathBuf>> {
    let output_dir = output_dir.as_ref();
    let original = output_dir.join(format!("section_{section_id}_original.png"));
    plot_mesh(section, Some("panel_id"), &original)?;

    let mut transformed = section.clone();
    if !detransform(&mut transformed) {
        log::warn!("section #{section_id}: no twist or offset data, plotting the original section");
    }
    let transformed = match extract_airfoil_and_web_points(&transformed, config) {
        Ok(SectionGeometry {
            airfoil,
            te: Some(te),
            ..
        }) => airfoil.merge(&te),
        Ok(SectionGeometry { airfoil, .. }) => airfoil,
        Err(e) => {
            log::warn!("section #{section_id}: {e}, plotting the whole section");
            transformed
        }
    };
    let transformed_file = output_dir.join(format!("section_{section_id}_transformed.png"));
    plot_mesh(&transformed, Some("panel_id"), &transformed_file)?;
    Ok(vec![original, transformed_file])
}

/// Checks that text can be rendered, plotters needs a system font for it
#[cfg(test)]
pub(crate) fn fonts_available() -> bool {
    let mut buffer = vec![0u8; 32 * 32 * 3];
    let root = BitMapBackend::with_buffer(&mut buffer, (32, 32)).into_drawing_area();
    root.draw(&Text::new("x", (4, 4), ("sans-serif", 12))).is_ok()
}

/// Checks a plot result: a PNG file with fonts, a drawing error without
#[cfg(test)]
pub(crate) fn assert_png(result: Result<()>, path: &Path) {
    if fonts_available() {
        assert!(result.is_ok(), "{result:?}");
        let bytes = std::fs::read(path).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    } else {
        assert!(matches!(result, Err(PlotError::Drawing { .. })));
    }
}
