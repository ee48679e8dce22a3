use std::{fs::read_to_string, path::{Path, PathBuf}};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::plot::Plot;

/// Visual settings handed to every plot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub font_family: String,
    pub font_size: u32,
    /// Added to every font size, ie. `4` to enlarge all text for slides
    pub font_size_delta: i32,
    pub width: u32,
    pub height: u32,
    pub output_dir: PathBuf,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            font_family: "serif".to_owned(),
            font_size: 12,
            font_size_delta: 0,
            width: 1200,
            height: 500,
            output_dir: PathBuf::from("."),
        }
    }
}

impl RenderConfig {
    /// `base` adjusted by the configured delta
    pub fn font_size(&self, base: u32) -> u32 {
        (base as i64 + self.font_size_delta as i64).max(1) as u32
    }

    pub fn text_size(&self) -> u32 {
        self.font_size(self.font_size)
    }

    pub fn title_size(&self) -> u32 {
        self.font_size(self.font_size * 3 / 2)
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub name: String,
    /// Directory of run directories, or of a snapshot of them
    pub source: Option<PathBuf>,
    #[serde(default)]
    pub reparse: bool,
    #[serde(default)]
    pub render: RenderConfig,
    pub plots: Vec<Box<dyn Plot>>,
}

impl ReportConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        serde_yml::from_str(&read_to_string(path).context("Reading config file")?)
            .context("Parsing config file")
    }
}
