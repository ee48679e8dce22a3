use core::fmt::Debug;
use std::path::{Path, PathBuf};

use downcast_rs::{Downcast, impl_downcast};
use dyn_clone::{DynClone, clone_trait_object};
use eyre::{ContextCompat, Result};
use tracing::{debug, info};

use crate::{
    config::{RenderConfig, ReportConfig},
    table::Dataset,
};

/// Everything a plot may draw from
pub struct PlotContext<'a> {
    pub render: &'a RenderConfig,
    pub dataset: Option<&'a Dataset>,
}

impl PlotContext<'_> {
    pub fn dataset(&self) -> Result<&Dataset> {
        self.dataset
            .context("Plot requires run data, but no source directory was given")
    }

    /// `explicit` if set, otherwise `<output_dir>/<title>.svg`
    pub fn output_path(&self, explicit: Option<&Path>, title: &str) -> PathBuf {
        match explicit {
            Some(path) => path.to_path_buf(),
            None => self
                .render
                .output_dir
                .join(format!("{}.svg", title.replace('/', "_"))),
        }
    }
}

#[typetag::serde(tag = "type")]
pub trait Plot: Debug + DynClone + Downcast + Send + Sync {
    /// Name of the plot, for identification
    fn name(&self) -> &'static str;
    /// Whether [`Plot::plot`] needs [`PlotContext::dataset`]
    fn needs_dataset(&self) -> bool {
        false
    }
    /// Renders the plot, returning the files written
    fn plot(&self, ctx: &PlotContext<'_>) -> Result<Vec<PathBuf>>;
}
clone_trait_object!(Plot);
impl_downcast!(Plot);

pub fn plot(
    plots: &[Box<dyn Plot>],
    render: &RenderConfig,
    dataset: Option<&Dataset>,
) -> Result<Vec<PathBuf>> {
    if plots.is_empty() {
        debug!("No plots");
        return Ok(Vec::new());
    }

    let ctx = PlotContext { render, dataset };
    let mut written = Vec::new();
    for p in plots {
        debug!("Plotting {}", p.name());
        written.extend(p.plot(&ctx)?);
    }
    Ok(written)
}

/// Loads the dataset if any plot needs it, then renders every plot
pub fn run_report(config: &ReportConfig) -> Result<Vec<PathBuf>> {
    let dataset = if config.plots.iter().any(|p| p.needs_dataset()) {
        let source = config
            .source
            .as_ref()
            .context("Report has dataset plots but no source")?;
        Some(Dataset::load(source, config.reparse)?)
    } else {
        None
    };

    let written = plot(&config.plots, &config.render, dataset.as_ref())?;
    info!("Report {} wrote {} files", config.name, written.len());
    Ok(written)
}
