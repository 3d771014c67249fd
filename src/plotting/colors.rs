use plotters::style::RGBColor;

const VIRIDIS: [(u8, u8, u8); 5] = [
    (68, 1, 84),
    (59, 82, 139),
    (33, 145, 140),
    (94, 201, 98),
    (253, 231, 37),
];

/// Viridis colormap, `t` is clamped to [0,1]
pub fn viridis(t: f64) -> RGBColor {
    let t = if t.is_finite() { t.clamp(0., 1.) } else { 0. };
    let x = t * (VIRIDIS.len() - 1) as f64;
    let i = (x.floor() as usize).min(VIRIDIS.len() - 2);
    let f = x - i as f64;
    let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * f).round() as u8;
    let (a, b) = (VIRIDIS[i], VIRIDIS[i + 1]);
    RGBColor(lerp(a.0, b.0), lerp(a.1, b.1), lerp(a.2, b.2))
}

/// Maps the values to colors, from the minimum to the maximum value
pub fn scalar_colors(values: &[f64]) -> Vec<RGBColor> {
    let (lo, hi) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let span = hi - lo;
    values
        .iter()
        .map(|&v| {
            if span > 0. {
                viridis((v - lo) / span)
            } else {
                viridis(0.5)
            }
        })
        .collect()
}
