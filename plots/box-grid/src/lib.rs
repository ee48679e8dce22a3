use std::path::PathBuf;

use common::{
    GIB_SCALE, NS_TO_MS_SCALE,
    aggregate::{Comparison, DeviceStats, markdown_table},
    error::EvalError,
    plot::{Plot, PlotContext},
    run::{ConfigKey, DeviceType, Distribution, chunk_label},
    stats::{BoxStats, summarize},
    table::Dataset,
};
use eyre::{Result, bail};
use plot_common::{
    BoxSpec, Fill, Hatch, LegendEntry, draw_box, draw_legend, font, plain_label, svg_area,
    value_range,
};
use plotters::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const LEGEND_HEIGHT: u32 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChunkStyle {
    pub bytes: u64,
    pub fill: Fill,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistributionStyle {
    pub distribution: Distribution,
    pub hatch: Hatch,
}

/// One cell per chunk size, distribution and ratio, each holding a box
/// per device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoxGrid {
    /// Measurement type, ie. `CACHETHROUGHPUT`
    pub measurement: String,
    pub title: String,
    pub scale: f64,
    /// Unit of scaled values, used in the comparison table
    pub unit: String,
    /// Written into the output directory, derived from the title if unset
    pub file_name: Option<String>,
    pub chunks: Vec<ChunkStyle>,
    pub distributions: Vec<DistributionStyle>,
    pub ratios: Vec<u32>,
}

impl Default for BoxGrid {
    fn default() -> Self {
        Self::throughput()
    }
}

struct Cell {
    key: ConfigKey,
    fill: Fill,
    hatch: Hatch,
    boxes: Vec<BoxStats>,
    stats: DeviceStats,
}

impl BoxGrid {
    pub fn throughput() -> Self {
        Self {
            measurement: "CACHETHROUGHPUT".to_owned(),
            title: "Throughput (GiB/s)".to_owned(),
            scale: GIB_SCALE,
            unit: "GiB/s".to_owned(),
            file_name: Some("cache_throughput.svg".to_owned()),
            chunks: vec![
                ChunkStyle {
                    bytes: 536870912,
                    fill: Fill::LightGreen,
                },
                ChunkStyle {
                    bytes: 65536,
                    fill: Fill::LightBlue,
                },
            ],
            distributions: vec![
                DistributionStyle {
                    distribution: Distribution::Zipfian,
                    hatch: Hatch::Circles,
                },
                DistributionStyle {
                    distribution: Distribution::Uniform,
                    hatch: Hatch::Diagonal,
                },
            ],
            ratios: vec![2, 10],
        }
    }

    pub fn latency() -> Self {
        Self {
            measurement: "GETLATENCY".to_owned(),
            title: "Latency (ms)".to_owned(),
            scale: NS_TO_MS_SCALE,
            unit: "ms".to_owned(),
            file_name: Some("get_latency.svg".to_owned()),
            ..Self::throughput()
        }
    }

    fn keys(&self) -> impl Iterator<Item = (ConfigKey, Fill, Hatch)> + '_ {
        self.chunks.iter().flat_map(move |chunk| {
            self.distributions.iter().flat_map(move |dist| {
                self.ratios.iter().map(move |ratio| {
                    (
                        ConfigKey {
                            chunk_size: chunk.bytes,
                            distribution: dist.distribution,
                            working_set_ratio: *ratio,
                        },
                        chunk.fill,
                        dist.hatch,
                    )
                })
            })
        })
    }

    fn cells(&self, dataset: &Dataset) -> Result<Vec<Cell>, EvalError> {
        let mut cells = Vec::new();
        for (key, fill, hatch) in self.keys() {
            let mut boxes = Vec::new();
            let mut stats = DeviceStats::new();
            for device in DeviceType::ALL {
                let run_id = dataset.select_run(&key, device)?;
                let values = dataset.series(run_id, &self.measurement, self.scale);
                let source = format!("{} of run {run_id} ({key} {device})", self.measurement);
                stats.insert(device, summarize(&values, &source)?);
                boxes.push(BoxStats::new(&values).ok_or(EvalError::EmptySeries(source))?);
            }
            cells.push(Cell {
                key,
                fill,
                hatch,
                boxes,
                stats,
            });
        }
        Ok(cells)
    }

    /// Device comparison of every cell, in drawing order
    pub fn comparisons(&self, dataset: &Dataset) -> Result<Vec<Comparison>, EvalError> {
        self.cells(dataset)?
            .iter()
            .map(|cell| Comparison::new(cell.key, &cell.stats))
            .collect()
    }

    pub fn legend(&self) -> Vec<LegendEntry> {
        self.chunks
            .iter()
            .flat_map(|chunk| {
                self.distributions.iter().map(|dist| LegendEntry {
                    label: format!(
                        "{} {}B",
                        dist.distribution.pretty_name(),
                        chunk_label(chunk.bytes)
                    ),
                    fill: chunk.fill,
                    hatch: dist.hatch,
                })
            })
            .collect()
    }
}

#[typetag::serde]
impl Plot for BoxGrid {
    fn name(&self) -> &'static str {
        "BoxGrid"
    }

    fn needs_dataset(&self) -> bool {
        true
    }

    fn plot(&self, ctx: &PlotContext<'_>) -> Result<Vec<PathBuf>> {
        let dataset = ctx.dataset()?;
        let cells = self.cells(dataset)?;
        if cells.is_empty() {
            bail!("{} has no chunk sizes, distributions or ratios", self.title);
        }

        let comparisons = cells
            .iter()
            .map(|cell| Comparison::new(cell.key, &cell.stats))
            .collect::<Result<Vec<_>, _>>()?;
        info!(
            "{}\n{}",
            self.title,
            markdown_table(&comparisons, &self.unit)
        );

        let explicit = self
            .file_name
            .as_ref()
            .map(|name| ctx.render.output_dir.join(name));
        let path = ctx.output_path(explicit.as_deref(), &self.title);
        println!(
            "Generating {} from {}, output is {}",
            self.title,
            self.measurement,
            path.display()
        );

        let text = TextStyle::from(font(ctx.render, ctx.render.text_size()));
        let root = svg_area(&path, ctx.render)?;
        let titled = root.titled(
            &self.title,
            font(ctx.render, ctx.render.title_size()),
        )?;
        let height = titled.dim_in_pixel().1;
        let (upper, lower) = titled.split_vertically(height.saturating_sub(LEGEND_HEIGHT));

        for (area, cell) in upper.split_evenly((1, cells.len())).iter().zip(&cells) {
            debug!("Drawing cell {}", cell.key);
            let y = value_range(
                cell.boxes
                    .iter()
                    .flat_map(|b| [b.whisker_low, b.whisker_high]),
            );
            let mut chart = ChartBuilder::on(area)
                .margin(4)
                .x_label_area_size(30)
                .y_label_area_size(45)
                .build_cartesian_2d(0.0..cell.boxes.len() as f64, y)?;
            chart
                .configure_mesh()
                .disable_mesh()
                .x_label_formatter(&|_| String::new())
                .x_desc(cell.key.working_set_ratio.to_string())
                .y_label_formatter(&plain_label)
                .label_style(text.clone())
                .axis_desc_style(text.clone())
                .draw()?;

            for (idx, stats) in cell.boxes.iter().enumerate() {
                draw_box(
                    &mut chart,
                    &BoxSpec {
                        x: idx as f64 + 0.5,
                        width: 1.0,
                        stats: *stats,
                        fill: cell.fill,
                        hatch: cell.hatch,
                        median: RED,
                        line_width: 1,
                    },
                )?;
            }
        }

        draw_legend(
            &lower,
            &self.legend(),
            &font(ctx.render, ctx.render.text_size()),
        )?;
        root.present()?;
        Ok(vec![path.clone()])
    }
}

#[cfg(test)]
mod tests {
    use common::{config::RenderConfig, decode::decode_compact, measurement::MeasurementRow};

    use super::*;

    const GIB: f64 = 1_073_741_824.0;

    fn dataset(ssd: bool) -> Dataset {
        let mut dataset = Dataset::default();
        let mut names = vec!["536870912,LAT=10,ZIPFIAN,RATIO=2,ITER=4,ZONES=100,nvme0n2"];
        if ssd {
            names.push("536870912,LAT=10,ZIPFIAN,RATIO=2,ITER=4,ZONES=100,nvme1n1p1");
        }
        for (idx, name) in names.into_iter().enumerate() {
            let id = dataset
                .runs
                .insert_with(|id| decode_compact(name, id))
                .unwrap();
            let rows = dataset
                .measurements
                .entry("CACHETHROUGHPUT".to_owned())
                .or_default();
            for (ts, gib) in [1.0, 2.0, 3.0].into_iter().enumerate() {
                rows.push(MeasurementRow {
                    timestamp: ts as f64,
                    value: gib * GIB * (idx + 1) as f64,
                    run_id: id,
                });
            }
        }
        dataset
    }

    fn single_cell() -> BoxGrid {
        BoxGrid {
            chunks: vec![ChunkStyle {
                bytes: 536870912,
                fill: Fill::LightGreen,
            }],
            distributions: vec![DistributionStyle {
                distribution: Distribution::Zipfian,
                hatch: Hatch::Circles,
            }],
            ratios: vec![2],
            ..BoxGrid::throughput()
        }
    }

    #[test]
    fn defaults() {
        let grid = BoxGrid::default();
        assert_eq!(grid.keys().count(), 8);
        assert_eq!(grid.legend()[0].label, "Zipfian 512MB");
        assert_eq!(grid.legend()[3].label, "Uniform 64KB");
        let latency = BoxGrid::latency();
        assert_eq!(latency.measurement, "GETLATENCY");
        assert_eq!(latency.file_name.as_deref(), Some("get_latency.svg"));
    }

    #[test]
    fn zns_is_the_baseline() {
        let comparisons = single_cell().comparisons(&dataset(true)).unwrap();
        assert_eq!(comparisons.len(), 1);
        let cmp = &comparisons[0];
        assert!((cmp.baseline.mean - 2.0).abs() < 1e-9);
        assert_eq!(cmp.multiplier(DeviceType::Zns), (1.0, 1.0));
        assert!((cmp.mean_multiplier(DeviceType::Ssd) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn missing_device_is_a_join_miss() {
        let err = single_cell().comparisons(&dataset(false)).unwrap_err();
        assert!(matches!(
            err,
            EvalError::JoinMiss {
                device: DeviceType::Ssd,
                ..
            }
        ));
    }

    #[test]
    fn writes_svg() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let render = RenderConfig {
            output_dir: dir.path().to_path_buf(),
            ..RenderConfig::default()
        };
        let dataset = dataset(true);
        let ctx = PlotContext {
            render: &render,
            dataset: Some(&dataset),
        };
        let written = single_cell().plot(&ctx)?;
        assert_eq!(written, vec![dir.path().join("cache_throughput.svg")]);
        assert!(written[0].exists());
        Ok(())
    }
}
