use std::{collections::BTreeSet, ops::Range, path::Path};

use plotters::{coord::Shift, prelude::*};

use crate::{
    bom::{materials_by_id, MaterialDb},
    span::{collect_anba_spanwise, collect_bom_spanwise},
};

use super::{draw_png, DrawResult, Result, SPAN_SIZE};

/// Labeled data series
struct Series {
    label: String,
    points: Vec<(f64, f64)>,
    marker: bool,
}
impl Series {
    fn new<S: Into<String>>(label: S, points: Vec<(f64, f64)>) -> Self {
        Self {
            label: label.into(),
            points,
            marker: false,
        }
    }
    fn with_markers(self) -> Self {
        Self {
            marker: true,
            ..self
        }
    }
}

/// Range of the values with a 5% margin
fn padded_range(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if lo > hi {
        return 0f64..1f64;
    }
    let pad = if hi > lo {
        0.05 * (hi - lo)
    } else {
        0.5 * lo.abs().max(1.)
    };
    lo - pad..hi + pad
}

fn line_chart<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    title: &str,
    y_desc: &str,
    series: &[Series],
) -> DrawResult
where
    DB::ErrorType: 'static,
{
    let x = padded_range(series.iter().flat_map(|s| s.points.iter().map(|p| p.0)));
    let y = padded_range(series.iter().flat_map(|s| s.points.iter().map(|p| p.1)));
    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 18))
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(70)
        .build_cartesian_2d(x, y)?;
    chart
        .configure_mesh()
        .x_desc("Section ID")
        .y_desc(y_desc)
        .draw()?;
    for (i, s) in series.iter().enumerate() {
        let color = Palette99::pick(i).mix(1.);
        chart
            .draw_series(LineSeries::new(s.points.iter().cloned(), color.stroke_width(2)))?
            .label(s.label.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        if s.marker {
            chart.draw_series(
                s.points
                    .iter()
                    .map(|&p| Circle::new(p, 3, color.filled())),
            )?;
        }
    }
    if series.iter().any(|s| !s.label.is_empty()) {
        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;
    }
    Ok(())
}

fn no_data<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>, title: &str, message: &str) -> DrawResult
where
    DB::ErrorType: 'static,
{
    let area = area.titled(title, ("sans-serif", 18))?;
    let (w, h) = area.dim_in_pixel();
    area.draw(&Text::new(
        message,
        ((w / 2) as i32 - 90, (h / 2) as i32),
        ("sans-serif", 18),
    ))?;
    Ok(())
}

/// Plots the areas and masses per material of the sections along the blade span
///
/// Returns false if no section bill of materials is found in `output_dir`.
pub fn plot_bom_spanwise<P: AsRef<Path>, Q: AsRef<Path>>(
    output_dir: P,
    output_file: Q,
    matdb: Option<&MaterialDb>,
) -> Result<bool> {
    let boms = collect_bom_spanwise(output_dir);
    if boms.is_empty() {
        log::warn!("No valid BOM data found");
        return Ok(false);
    }
    let material_ids: BTreeSet<i64> = boms
        .iter()
        .flat_map(|(_, bom)| bom.areas_per_material.keys().cloned())
        .collect();
    let names = matdb.map(materials_by_id).unwrap_or_default();
    let name = |id: i64| {
        names
            .get(&id)
            .map(|(name, _)| name.to_string())
            .unwrap_or_else(|| format!("ID {id}"))
    };

    let mut areas = vec![Series::new(
        "Total Area",
        boms.iter().map(|(sid, bom)| (*sid as f64, bom.total_area)).collect(),
    )
    .with_markers()];
    areas.extend(material_ids.iter().map(|&id| {
        Series::new(
            format!("{} (ID {id}) Area", name(id)),
            boms.iter()
                .map(|(sid, bom)| {
                    (
                        *sid as f64,
                        bom.areas_per_material.get(&id).copied().unwrap_or_default(),
                    )
                })
                .collect(),
        )
        .with_markers()
    }));

    let has_mass = boms.iter().any(|(_, bom)| bom.total_mass.is_some());
    let mut masses = vec![];
    if has_mass {
        masses.push(
            Series::new(
                "Total Mass",
                boms.iter()
                    .map(|(sid, bom)| (*sid as f64, bom.total_mass.unwrap_or_default()))
                    .collect(),
            )
            .with_markers(),
        );
        masses.extend(material_ids.iter().map(|&id| {
            Series::new(
                format!("{} (ID {id}) Mass", name(id)),
                boms.iter()
                    .map(|(sid, bom)| {
                        (
                            *sid as f64,
                            bom.masses_per_material
                                .as_ref()
                                .and_then(|m| m.get(&id).copied())
                                .unwrap_or_default(),
                        )
                    })
                    .collect(),
            )
            .with_markers()
        }));
    }

    draw_png(output_file.as_ref(), SPAN_SIZE, |root| {
        let panels = root.split_evenly((2, 1));
        line_chart(&panels[0], "Areas along Blade Span", "Area", &areas)?;
        if has_mass {
            line_chart(&panels[1], "Masses along Blade Span", "Mass", &masses)
        } else {
            no_data(
                &panels[1],
                "Masses along Blade Span (No Data)",
                "No mass data available",
            )
        }
    })?;
    Ok(true)
}

/// Plots the ANBA4 centers, principal angle and stiffness diagonal along the blade span
///
/// Returns false if no ANBA4 results are found in `output_dir`.
pub fn plot_span_anba<P: AsRef<Path>, Q: AsRef<Path>>(output_dir: P, output_file: Q) -> Result<bool> {
    let results = collect_anba_spanwise(output_dir);
    if results.is_empty() {
        log::warn!("No valid ANBA data found");
        return Ok(false);
    }
    let sid: Vec<f64> = results.iter().map(|(id, _)| *id as f64).collect();
    let centers = |axis: usize, tag: &str| {
        vec![
            Series::new(
                format!("Mass Center {tag}"),
                results
                    .iter()
                    .map(|(id, r)| (*id as f64, r.mass_center[axis]))
                    .collect(),
            ),
            Series::new(
                format!("Shear Center {tag}"),
                results
                    .iter()
                    .map(|(id, r)| (*id as f64, r.shear_center[axis]))
                    .collect(),
            ),
            Series::new(
                format!("Tension Center {tag}"),
                results
                    .iter()
                    .map(|(id, r)| (*id as f64, r.tension_center[axis]))
                    .collect(),
            ),
        ]
    };
    let (x, y) = (centers(0, "X"), centers(1, "Y"));
    let angle = vec![Series::new(
        "",
        sid.iter()
            .zip(&results)
            .map(|(&s, (_, r))| (s, r.principal_angle_deg()))
            .collect(),
    )];
    let stiffness: Vec<Series> = (0..6)
        .map(|i| {
            Series::new(
                format!("K{}{}", i + 1, i + 1),
                results
                    .iter()
                    .filter_map(|(id, r)| r.stiffness_diagonal().map(|k| (*id as f64, k[i])))
                    .collect(),
            )
        })
        .filter(|s| !s.points.is_empty())
        .collect();

    draw_png(output_file.as_ref(), SPAN_SIZE, |root| {
        let panels = root.split_evenly((2, 2));
        line_chart(&panels[0], "X Positions along Blade", "X Position", &x)?;
        line_chart(&panels[1], "Y Positions along Blade", "Y Position", &y)?;
        line_chart(
            &panels[2],
            "Principal Angle along Blade",
            "Principal Angle (deg)",
            &angle,
        )?;
        if !stiffness.is_empty() {
            line_chart(
                &panels[3],
                "Stiffness Diagonal along Blade",
                "Stiffness",
                &stiffness,
            )?;
        }
        Ok(())
    })?;
    Ok(true)
}

/// Plots the diagonal terms of the stiffness and mass matrices along the blade span
///
/// Returns false if none of the ANBA4 results has a stiffness or a mass matrix.
pub fn plot_span_matrices<P: AsRef<Path>, Q: AsRef<Path>>(output_dir: P, output_file: Q) -> Result<bool> {
    let results = collect_anba_spanwise(output_dir);
    let diagonal = |prefix: &str, get: fn(&crate::AnbaResults) -> Option<[f64; 6]>| -> Vec<Series> {
        (0..6)
            .map(|i| {
                Series::new(
                    format!("{prefix}{}{}", i + 1, i + 1),
                    results
                        .iter()
                        .filter_map(|(id, r)| get(r).map(|d| (*id as f64, d[i])))
                        .collect(),
                )
                .with_markers()
            })
            .filter(|s| !s.points.is_empty())
            .collect()
    };
    let stiffness = diagonal("K", crate::AnbaResults::stiffness_diagonal);
    let mass = diagonal("M", crate::AnbaResults::mass_diagonal);
    if stiffness.is_empty() && mass.is_empty() {
        log::warn!("No stiffness or mass matrix found");
        return Ok(false);
    }
    draw_png(output_file.as_ref(), SPAN_SIZE, |root| {
        let panels = root.split_evenly((2, 1));
        for (panel, (title, series)) in panels.iter().zip([
            ("Stiffness Matrix Diagonal along Blade", &stiffness),
            ("Mass Matrix Diagonal along Blade", &mass),
        ]) {
            if series.is_empty() {
                no_data(panel, title, "No matrix data available")?;
            } else {
                line_chart(panel, title, "Value", series)?;
            }
        }
        Ok(())
    })?;
    Ok(true)
}
