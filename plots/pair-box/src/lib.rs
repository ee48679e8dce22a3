use std::path::PathBuf;

use common::{
    error::EvalError,
    measurement::read_first_column,
    plot::{Plot, PlotContext},
    run::Distribution,
    stats::BoxStats,
    util::check_len,
};
use eyre::Result;
use itertools::Itertools;
use plot_common::{
    BoxSpec, Fill, Hatch, LegendEntry, draw_box, draw_legend, font, plain_label, svg_area,
    value_range,
};
use plotters::{
    prelude::*,
    style::text_anchor::{HPos, Pos, VPos},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_OUTPUT: &str = "Fig1.svg";
const LEGEND_HEIGHT: u32 = 60;
const BOX_WIDTH: f64 = 0.7;

/// ZNS and SSD boxes side by side, one pair per chunk size. Files come in
/// pairs, each file described by the workload and ratio at its index.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PairBox {
    /// CSV files with a header row, values in the first column
    pub files: Vec<PathBuf>,
    /// Tick label of every pair
    pub chunk_labels: Vec<String>,
    pub workloads: Vec<Distribution>,
    pub ratios: Vec<u32>,
    pub y_axis: String,
    pub title: String,
    pub output: Option<PathBuf>,
}

pub fn workload_fill(workload: Distribution) -> Fill {
    match workload {
        Distribution::Zipfian => Fill::Pink,
        Distribution::Random => Fill::LightBlue,
        Distribution::Sequential => Fill::LightGreen,
        Distribution::Uniform => Fill::Khaki,
    }
}

pub fn ratio_hatch(ratio: u32) -> Hatch {
    match ratio {
        2 => Hatch::Circles,
        10 => Hatch::Diagonal,
        _ => Hatch::None,
    }
}

/// x of both boxes of pair `idx` and of its tick
pub fn pair_positions(idx: usize) -> (f64, f64, f64) {
    let x = (2 * idx) as f64;
    (x, x + BOX_WIDTH, x + BOX_WIDTH / 2.0)
}

impl PairBox {
    fn validate(&self) -> Result<(), EvalError> {
        let files = self.files.len();
        if files % 2 != 0 {
            return Err(EvalError::ArgumentMismatch {
                what: "files (ZNS,SSD pairs)".to_owned(),
                expected: files + 1,
                got: files,
            });
        }
        check_len("chunk labels", files / 2, self.chunk_labels.len())?;
        check_len("workload types", files, self.workloads.len())?;
        check_len("ratios", files, self.ratios.len())?;
        Ok(())
    }

    /// Every workload and ratio combination, in order of appearance
    pub fn legend(&self) -> Vec<LegendEntry> {
        let ratios = self
            .ratios
            .iter()
            .copied()
            .unique()
            .sorted_by(|a, b| b.cmp(a))
            .collect::<Vec<_>>();
        self.workloads
            .iter()
            .copied()
            .unique()
            .flat_map(|workload| {
                ratios.iter().map(move |ratio| LegendEntry {
                    label: format!("{} 1:{ratio}", workload.pretty_name()),
                    fill: workload_fill(workload),
                    hatch: ratio_hatch(*ratio),
                })
            })
            .collect()
    }
}

#[typetag::serde]
impl Plot for PairBox {
    fn name(&self) -> &'static str {
        "PairBox"
    }

    fn plot(&self, ctx: &PlotContext<'_>) -> Result<Vec<PathBuf>> {
        self.validate()?;

        let mut boxes = Vec::with_capacity(self.files.len());
        for file in &self.files {
            let values = read_first_column(file)?;
            let stats = BoxStats::new(&values)
                .ok_or_else(|| EvalError::EmptySeries(file.display().to_string()))?;
            let fliers = values
                .into_iter()
                .filter(|v| *v < stats.whisker_low || *v > stats.whisker_high)
                .collect::<Vec<_>>();
            debug!("{}: {stats:?}, {} fliers", file.display(), fliers.len());
            boxes.push((stats, fliers));
        }

        let path = self
            .output
            .clone()
            .unwrap_or_else(|| ctx.render.output_dir.join(DEFAULT_OUTPUT));
        let text = TextStyle::from(font(ctx.render, ctx.render.text_size()));
        let root = svg_area(&path, ctx.render)?;
        let height = root.dim_in_pixel().1;
        let (upper, lower) = root.split_vertically(height.saturating_sub(LEGEND_HEIGHT));

        let y = value_range(boxes.iter().flat_map(|(stats, fliers)| {
            [stats.whisker_low, stats.whisker_high]
                .into_iter()
                .chain(fliers.iter().copied())
        }));
        let x_end = self.files.len() as f64 - 2.0 + BOX_WIDTH + 0.6;
        let mut chart = ChartBuilder::on(&upper)
            .margin(10)
            .caption(
                &self.title,
                TextStyle::from(font(ctx.render, ctx.render.title_size())),
            )
            .x_label_area_size(35)
            .y_label_area_size(70)
            .build_cartesian_2d(-0.6..x_end, y.clone())?;
        chart
            .configure_mesh()
            .disable_mesh()
            .x_label_formatter(&|_| String::new())
            .y_desc(self.y_axis.as_str())
            .y_label_formatter(&plain_label)
            .label_style(text.clone())
            .axis_desc_style(text.clone())
            .draw()?;

        for (idx, (stats, fliers)) in boxes.iter().enumerate() {
            let (first, second, _) = pair_positions(idx / 2);
            let x = if idx % 2 == 0 { first } else { second };
            draw_box(
                &mut chart,
                &BoxSpec {
                    x,
                    width: BOX_WIDTH,
                    stats: *stats,
                    fill: workload_fill(self.workloads[idx]),
                    hatch: ratio_hatch(self.ratios[idx]),
                    median: BLACK,
                    line_width: 2,
                },
            )?;
            chart.draw_series(
                fliers
                    .iter()
                    .map(|v| Circle::new((x, *v), 3, BLACK.stroke_width(1))),
            )?;
        }

        let tick = text.clone().pos(Pos::new(HPos::Center, VPos::Top));
        for (idx, label) in self.chunk_labels.iter().enumerate() {
            let (_, _, x) = pair_positions(idx);
            let (px, py) = chart.backend_coord(&(x, y.start));
            upper.draw(&Text::new(label.clone(), (px, py + 6), tick.clone()))?;
        }

        draw_legend(
            &lower,
            &self.legend(),
            &font(ctx.render, ctx.render.text_size()),
        )?;
        root.present()?;
        println!("Saved plot to {}", path.display());
        Ok(vec![path.clone()])
    }
}

#[cfg(test)]
mod tests {
    use std::fs::write;

    use common::config::RenderConfig;

    use super::*;

    fn pairs(files: Vec<PathBuf>) -> PairBox {
        PairBox {
            files,
            chunk_labels: vec!["512M".to_owned()],
            workloads: vec![Distribution::Zipfian, Distribution::Zipfian],
            ratios: vec![2, 10],
            y_axis: "Throughput (MiB/s)".to_owned(),
            title: "Throughput".to_owned(),
            output: None,
        }
    }

    #[test]
    fn positions() {
        assert_eq!(pair_positions(0), (0.0, 0.7, 0.35));
        let (a, b, tick) = pair_positions(1);
        assert_eq!(a, 2.0);
        assert!((b - 2.7).abs() < 1e-9 && (tick - 2.35).abs() < 1e-9);
    }

    #[test]
    fn styles() {
        assert_eq!(workload_fill(Distribution::Zipfian), Fill::Pink);
        assert_eq!(workload_fill(Distribution::Random), Fill::LightBlue);
        assert_eq!(workload_fill(Distribution::Sequential), Fill::LightGreen);
        assert_eq!(ratio_hatch(2), Hatch::Circles);
        assert_eq!(ratio_hatch(10), Hatch::Diagonal);
        assert_eq!(ratio_hatch(4), Hatch::None);
    }

    #[test]
    fn lists_must_align() {
        let mut plot = pairs(vec![PathBuf::from("a.csv")]);
        assert!(matches!(
            plot.validate(),
            Err(EvalError::ArgumentMismatch { got: 1, .. })
        ));

        plot.files.push(PathBuf::from("b.csv"));
        assert!(plot.validate().is_ok());

        plot.ratios.pop();
        assert_eq!(
            plot.validate(),
            Err(EvalError::ArgumentMismatch {
                what: "ratios".to_owned(),
                expected: 2,
                got: 1
            })
        );
    }

    #[test]
    fn legend_entries() {
        let legend = pairs(Vec::new()).legend();
        let labels = legend.iter().map(|e| e.label.as_str()).collect::<Vec<_>>();
        assert_eq!(labels, vec!["Zipfian 1:10", "Zipfian 1:2"]);
        assert_eq!(legend[0].hatch, Hatch::Diagonal);
    }

    #[test]
    fn writes_default_output() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let zns = dir.path().join("zns.csv");
        let ssd = dir.path().join("ssd.csv");
        write(&zns, "throughput\n1\n2\n3\n4\n100\n")?;
        write(&ssd, "throughput\n2\n3\nx\n4\n")?;
        let render = RenderConfig {
            output_dir: dir.path().to_path_buf(),
            ..RenderConfig::default()
        };
        let written = pairs(vec![zns, ssd]).plot(&PlotContext {
            render: &render,
            dataset: None,
        })?;
        assert_eq!(written, vec![dir.path().join(DEFAULT_OUTPUT)]);
        assert!(written[0].exists());
        Ok(())
    }
}
