use std::{collections::HashMap, fmt, path::PathBuf, str::FromStr};

use common::{
    error::EvalError,
    measurement::{Event, read_events, read_series},
    plot::{Plot, PlotContext},
    stats::{Unit, linear_fit, mean},
    util::check_len,
};
use eyre::{Result, bail};
use plot_common::{GRAY, font, plain_label, svg_area, value_range};
use plotters::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const MS_PER_MINUTE: f64 = 60000.0;
/// Dashes per x axis span
const DASHES: f64 = 150.0;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesKind {
    #[default]
    Scatter,
    Line,
}

impl FromStr for SeriesKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scatter" => Ok(SeriesKind::Scatter),
            "line" => Ok(SeriesKind::Line),
            other => Err(format!("Unsupported plot type {other}, expected scatter or line")),
        }
    }
}

impl fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SeriesKind::Scatter => "scatter",
            SeriesKind::Line => "line",
        })
    }
}

/// Values of `(timestamp, name, value)` files over time in minutes
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeSeries {
    pub files: Vec<PathBuf>,
    /// One per file, defaults to the name column of each file
    pub labels: Option<Vec<String>>,
    /// Defaults to the name column of the first file
    pub y_axis: Option<String>,
    pub title: Option<String>,
    pub output: Option<PathBuf>,
    pub y_units: Unit,
    pub in_units: Unit,
    pub kind: SeriesKind,
    pub regression: bool,
    pub skip_zero: bool,
    /// Alternating begin and end marker files of eviction threads
    pub overlay_threads: Option<Vec<PathBuf>>,
}

#[derive(Debug)]
struct Loaded {
    label: Option<String>,
    points: Vec<(f64, f64)>,
}

impl TimeSeries {
    fn validate(&self) -> Result<(), EvalError> {
        if let Some(labels) = &self.labels {
            check_len("labels", self.files.len(), labels.len())?;
        }
        if let Some(overlay) = &self.overlay_threads
            && overlay.len() % 2 != 0
        {
            return Err(EvalError::ArgumentMismatch {
                what: "overlay files (begin,end pairs)".to_owned(),
                expected: overlay.len() + 1,
                got: overlay.len(),
            });
        }
        Ok(())
    }

    fn load(&self) -> Result<(Vec<Loaded>, Option<String>)> {
        let factor = self.in_units.factor(self.y_units);
        let mut loaded = Vec::with_capacity(self.files.len());
        let mut default_label = None;

        for (idx, file) in self.files.iter().enumerate() {
            let series = read_series(file)?;
            let points = series
                .samples
                .iter()
                .map(|s| (s.timestamp / MS_PER_MINUTE, s.value * factor))
                .filter(|(_, y)| !(self.skip_zero && *y == 0.0))
                .collect::<Vec<_>>();

            let ys = points.iter().map(|(_, y)| *y).collect::<Vec<_>>();
            let average =
                mean(&ys).ok_or_else(|| EvalError::EmptySeries(file.display().to_string()))?;
            println!("File: {} Average: {average}", file.display());

            if default_label.is_none() {
                default_label = series.name.clone();
            }
            let label = self
                .labels
                .as_ref()
                .map(|labels| labels[idx].clone())
                .or(series.name);
            loaded.push(Loaded { label, points });
        }
        Ok((loaded, default_label))
    }

    fn intervals(&self) -> Result<Vec<(f64, f64)>> {
        let Some(overlay) = &self.overlay_threads else {
            return Ok(Vec::new());
        };
        let mut intervals = Vec::new();
        for pair in overlay.chunks_exact(2) {
            let begin = read_events(&pair[0])?;
            let end = read_events(&pair[1])?;
            intervals.extend(thread_intervals(&begin, &end));
        }
        debug!("{} eviction thread intervals", intervals.len());
        Ok(intervals)
    }
}

/// Joins begin and end markers on their id, in minutes, ordered by begin
pub fn thread_intervals(begin: &[Event], end: &[Event]) -> Vec<(f64, f64)> {
    let mut ends: HashMap<&str, Vec<f64>> = HashMap::new();
    for event in end {
        ends.entry(event.id.as_str())
            .or_default()
            .push(event.timestamp / MS_PER_MINUTE);
    }
    let mut intervals = begin
        .iter()
        .flat_map(|b| {
            let start = b.timestamp / MS_PER_MINUTE;
            ends.get(b.id.as_str())
                .into_iter()
                .flatten()
                .map(move |stop| (start, *stop))
        })
        .collect::<Vec<_>>();
    intervals.sort_by(|a, b| a.0.total_cmp(&b.0));
    intervals
}

/// `[from, to]` cut into dashes of `dash` with equal gaps
pub fn dashes(from: f64, to: f64, dash: f64) -> Vec<(f64, f64)> {
    if dash <= 0.0 || to <= from {
        return vec![(from, to)];
    }
    let mut segments = Vec::new();
    let mut x = from;
    while x < to {
        segments.push((x, (x + dash).min(to)));
        x += 2.0 * dash;
    }
    segments
}

#[typetag::serde]
impl Plot for TimeSeries {
    fn name(&self) -> &'static str {
        "TimeSeries"
    }

    fn plot(&self, ctx: &PlotContext<'_>) -> Result<Vec<PathBuf>> {
        self.validate()?;
        if self.files.is_empty() {
            bail!("No data files to plot");
        }
        let (loaded, default_label) = self.load()?;
        let intervals = self.intervals()?;

        let x = value_range(
            loaded
                .iter()
                .flat_map(|l| l.points.iter().map(|(x, _)| *x))
                .chain(intervals.iter().flat_map(|(b, e)| [*b, *e])),
        );
        let zero = (!intervals.is_empty()).then_some(0.0);
        let y = value_range(
            loaded
                .iter()
                .flat_map(|l| l.points.iter().map(|(_, y)| *y))
                .chain(zero),
        );

        let path = ctx.output_path(
            self.output.as_deref(),
            self.title.as_deref().unwrap_or("plot"),
        );
        let text = TextStyle::from(font(ctx.render, ctx.render.text_size()));
        let root = svg_area(&path, ctx.render)?;

        let mut builder = ChartBuilder::on(&root);
        builder
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(70);
        if let Some(title) = &self.title {
            builder.caption(title, TextStyle::from(font(ctx.render, ctx.render.title_size())));
        }
        let mut chart = builder.build_cartesian_2d(x.clone(), y)?;
        chart
            .configure_mesh()
            .disable_mesh()
            .x_desc("Time (minutes)")
            .y_desc(self.y_axis.clone().or(default_label).unwrap_or_default())
            .y_label_formatter(&plain_label)
            .label_style(text.clone())
            .axis_desc_style(text.clone())
            .draw()?;

        let dash = (x.end - x.start) / DASHES;
        for (begin, end) in &intervals {
            chart.draw_series(dashes(*begin, *end, dash).into_iter().map(|(a, b)| {
                PathElement::new(vec![(a, 0.0), (b, 0.0)], GRAY.mix(0.4).stroke_width(1))
            }))?;
        }

        let mut labelled = false;
        for (idx, series) in loaded.iter().enumerate() {
            let color = Palette99::pick(idx).to_rgba();
            let anno = match self.kind {
                SeriesKind::Scatter => chart.draw_series(
                    series
                        .points
                        .iter()
                        .map(|p| Circle::new(*p, 1, color.filled())),
                )?,
                SeriesKind::Line => chart.draw_series(LineSeries::new(
                    series.points.iter().copied(),
                    color.stroke_width(1),
                ))?,
            };
            if let Some(label) = &series.label {
                labelled = true;
                anno.label(label.as_str()).legend(move |(x, y)| {
                    Rectangle::new([(x, y - 3), (x + 12, y + 3)], color.filled())
                });
            }

            if self.regression {
                let (xs, ys): (Vec<f64>, Vec<f64>) = series.points.iter().copied().unzip();
                match linear_fit(&xs, &ys) {
                    Some((slope, intercept)) => {
                        chart.draw_series(LineSeries::new(
                            xs.iter().map(|x| (*x, slope * x + intercept)),
                            RED.stroke_width(1),
                        ))?;
                    }
                    None => warn!(
                        "Not enough points for a regression of {}",
                        self.files[idx].display()
                    ),
                }
            }
        }

        if labelled {
            chart
                .configure_series_labels()
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .label_font(text.clone())
                .draw()?;
        }
        root.present()?;
        println!("Saved plot to {}", path.display());
        Ok(vec![path.clone()])
    }
}
