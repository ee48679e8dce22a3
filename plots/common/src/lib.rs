//! Drawing helpers shared by the plot crates: named fills, hatch patterns,
//! box plots without fliers and a pixel space legend strip.

use std::{iter::once, ops::Range, path::Path};

use common::{config::RenderConfig, stats::BoxStats, util::ensure_parent_dir};
use eyre::Result;
use plotters::{
    coord::{Shift, types::RangedCoordf64},
    prelude::*,
    style::{FontDesc, FontFamily, FontStyle},
};
use serde::{Deserialize, Serialize};

pub type Chart<'a, 'b> =
    ChartContext<'a, SVGBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;
pub type Area<'b> = DrawingArea<SVGBackend<'b>, Shift>;

pub const LIGHT_GREEN: RGBColor = RGBColor(144, 238, 144);
pub const LIGHT_BLUE: RGBColor = RGBColor(173, 216, 230);
pub const PINK: RGBColor = RGBColor(255, 192, 203);
pub const KHAKI: RGBColor = RGBColor(240, 230, 140);
pub const GRAY: RGBColor = RGBColor(128, 128, 128);

const SWATCH: (i32, i32) = (24, 16);
const LEGEND_PAD: i32 = 8;
const MAX_LEGEND_COLUMNS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fill {
    LightGreen,
    LightBlue,
    Pink,
    Khaki,
}

impl Fill {
    pub fn rgb(&self) -> RGBColor {
        match self {
            Fill::LightGreen => LIGHT_GREEN,
            Fill::LightBlue => LIGHT_BLUE,
            Fill::Pink => PINK,
            Fill::Khaki => KHAKI,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hatch {
    #[default]
    None,
    /// Small rings
    Circles,
    /// Lines rising to the right
    Diagonal,
}

impl Hatch {
    /// Line segments of the pattern in the unit square, `v` pointing up
    pub fn segments(&self) -> Vec<[(f64, f64); 2]> {
        if *self != Hatch::Diagonal {
            return Vec::new();
        }
        (-4..=4)
            .map(|step| {
                let c = step as f64 * 0.2;
                if c >= 0.0 {
                    [(c, 0.0), (1.0, 1.0 - c)]
                } else {
                    [(0.0, -c), (1.0 + c, 1.0)]
                }
            })
            .collect()
    }

    /// Ring centers of the pattern in the unit square
    pub fn dots(&self) -> Vec<(f64, f64)> {
        if *self != Hatch::Circles {
            return Vec::new();
        }
        let mut dots = Vec::new();
        for u in [0.25, 0.5, 0.75] {
            for step in 0..5 {
                dots.push((u, 0.1 + step as f64 * 0.2));
            }
        }
        dots
    }
}

pub fn font(render: &RenderConfig, size: u32) -> FontDesc<'_> {
    FontDesc::new(
        FontFamily::from(render.font_family.as_str()),
        f64::from(size),
        FontStyle::Normal,
    )
}

/// Tick labels without scientific notation
pub fn plain_label(value: &f64) -> String {
    if value.abs() >= 100.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

/// Range covering every value with 5% headroom on both sides
pub fn value_range(values: impl IntoIterator<Item = f64>) -> Range<f64> {
    let (min, max) = values
        .into_iter()
        .filter(|x| x.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
            (lo.min(x), hi.max(x))
        });
    if min > max {
        return 0.0..1.0;
    }
    if min == max {
        return min - 1.0..max + 1.0;
    }
    let pad = (max - min) * 0.05;
    min - pad..max + pad
}

/// White SVG canvas of the configured size, creating missing directories
pub fn svg_area<'a>(path: &'a Path, render: &RenderConfig) -> Result<Area<'a>> {
    ensure_parent_dir(path)?;
    let root = SVGBackend::new(path, (render.width, render.height)).into_drawing_area();
    root.fill(&WHITE)?;
    Ok(root)
}

#[derive(Debug, Clone, Copy)]
pub struct BoxSpec {
    pub x: f64,
    pub width: f64,
    pub stats: BoxStats,
    pub fill: Fill,
    pub hatch: Hatch,
    pub median: RGBColor,
    pub line_width: u32,
}

pub fn draw_box(chart: &mut Chart<'_, '_>, spec: &BoxSpec) -> Result<()> {
    let BoxSpec {
        x,
        width,
        stats,
        fill,
        hatch,
        median,
        line_width,
    } = *spec;
    let (left, right) = (x - width / 2.0, x + width / 2.0);
    let outline = BLACK.stroke_width(line_width);

    chart.draw_series(once(Rectangle::new(
        [(left, stats.q1), (right, stats.q3)],
        fill.rgb().filled(),
    )))?;

    let height = stats.q3 - stats.q1;
    if height > 0.0 {
        let to_data = |(u, v): (f64, f64)| (left + u * width, stats.q1 + v * height);
        chart.draw_series(hatch.segments().into_iter().map(|[a, b]| {
            PathElement::new(vec![to_data(a), to_data(b)], BLACK.stroke_width(1))
        }))?;
        chart.draw_series(
            hatch
                .dots()
                .into_iter()
                .map(|p| Circle::new(to_data(p), 2, BLACK.stroke_width(1))),
        )?;
    }

    chart.draw_series(once(Rectangle::new(
        [(left, stats.q1), (right, stats.q3)],
        outline,
    )))?;

    let cap = width / 4.0;
    chart.draw_series(
        [
            vec![(x, stats.q3), (x, stats.whisker_high)],
            vec![(x, stats.q1), (x, stats.whisker_low)],
            vec![(x - cap, stats.whisker_high), (x + cap, stats.whisker_high)],
            vec![(x - cap, stats.whisker_low), (x + cap, stats.whisker_low)],
        ]
        .into_iter()
        .map(|points| PathElement::new(points, outline)),
    )?;
    chart.draw_series(once(PathElement::new(
        vec![(left, stats.median), (right, stats.median)],
        median.stroke_width(line_width + 1),
    )))?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub label: String,
    pub fill: Fill,
    pub hatch: Hatch,
}

/// Swatches with labels laid out in rows across `area`
pub fn draw_legend(area: &Area<'_>, entries: &[LegendEntry], font: &FontDesc<'_>) -> Result<()> {
    if entries.is_empty() {
        return Ok(());
    }
    let (width, height) = area.dim_in_pixel();
    let columns = entries.len().min(MAX_LEGEND_COLUMNS);
    let rows = entries.len().div_ceil(columns);
    let cell_width = width as i32 / columns as i32;
    let row_height = (height as i32 / rows as i32).max(SWATCH.1);
    let (sw, sh) = SWATCH;

    for (idx, entry) in entries.iter().enumerate() {
        let x = (idx % columns) as i32 * cell_width + LEGEND_PAD;
        let y = (idx / columns) as i32 * row_height + (row_height - sh) / 2;
        let to_px = |(u, v): (f64, f64)| {
            (
                x + (u * sw as f64).round() as i32,
                y + sh - (v * sh as f64).round() as i32,
            )
        };

        area.draw(&Rectangle::new(
            [(x, y), (x + sw, y + sh)],
            entry.fill.rgb().filled(),
        ))?;
        for [a, b] in entry.hatch.segments() {
            area.draw(&PathElement::new(
                vec![to_px(a), to_px(b)],
                BLACK.stroke_width(1),
            ))?;
        }
        for p in entry.hatch.dots() {
            area.draw(&Circle::new(to_px(p), 1, BLACK.stroke_width(1)))?;
        }
        area.draw(&Rectangle::new([(x, y), (x + sw, y + sh)], BLACK.stroke_width(1)))?;
        area.draw(&Text::new(
            entry.label.clone(),
            (x + sw + LEGEND_PAD, y),
            font.clone(),
        ))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs::read_to_string;

    use super::*;

    #[test]
    fn hatches_stay_in_unit_square() {
        let inside = |(u, v): (f64, f64)| (0.0..=1.0).contains(&u) && (0.0..=1.0).contains(&v);
        for hatch in [Hatch::None, Hatch::Circles, Hatch::Diagonal] {
            assert!(hatch.segments().iter().flatten().all(|p| inside(*p)));
            assert!(hatch.dots().into_iter().all(inside));
        }
        assert!(Hatch::None.segments().is_empty() && Hatch::None.dots().is_empty());
        assert_eq!(Hatch::Diagonal.segments().len(), 9);
        assert_eq!(Hatch::Circles.dots().len(), 15);
    }

    #[test]
    fn ranges() {
        assert_eq!(value_range(Vec::new()), 0.0..1.0);
        assert_eq!(value_range([3.0, 3.0]), 2.0..4.0);
        let r = value_range([0.0, 10.0, f64::NAN]);
        assert!((r.start + 0.5).abs() < 1e-9 && (r.end - 10.5).abs() < 1e-9);
    }

    #[test]
    fn labels() {
        assert_eq!(plain_label(&1234.56), "1235");
        assert_eq!(plain_label(&0.5), "0.50");
    }

    #[test]
    fn renders_box_and_legend() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("box.svg");
        let render = RenderConfig::default().with_size(400, 300);
        {
            let root = svg_area(&path, &render)?;
            let (upper, lower) = root.split_vertically(250);
            let mut chart = ChartBuilder::on(&upper)
                .margin(10)
                .y_label_area_size(40)
                .build_cartesian_2d(0.0..2.0, 0.0..10.0)?;
            chart.configure_mesh().disable_x_mesh().draw()?;
            let stats = BoxStats::new(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
            draw_box(
                &mut chart,
                &BoxSpec {
                    x: 1.0,
                    width: 0.8,
                    stats,
                    fill: Fill::Pink,
                    hatch: Hatch::Diagonal,
                    median: RED,
                    line_width: 1,
                },
            )?;
            draw_legend(
                &lower,
                &[LegendEntry {
                    label: "Zipfian".to_owned(),
                    fill: Fill::Pink,
                    hatch: Hatch::Circles,
                }],
                &font(&render, 12),
            )?;
            root.present()?;
        }
        let svg = read_to_string(&path)?;
        assert!(svg.contains("<svg") && svg.contains("<rect"));
        Ok(())
    }
}
