use std::path::PathBuf;

use box_grid::BoxGrid;
use clap::{Parser, Subcommand};
use common::{
    NS_TO_MS_SCALE,
    aggregate::{latency_report, markdown_table},
    config::{RenderConfig, ReportConfig},
    header::rename_profiles,
    plot::{Plot, plot, run_report},
    run::Distribution,
    stats::Unit,
    table::Dataset,
    util::split_list,
};
use eyre::{Context, Result};
use pair_box::PairBox;
use time_series::{SeriesKind, TimeSeries};
use tracing::error;
use tracing_subscriber::{
    EnvFilter,
    fmt::{layer, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const MODULES: &[&str] = &[
    "common",
    "plot_common",
    "box_grid",
    "time_series",
    "pair_box",
    "default_plots",
];

#[derive(Parser)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(short, long)]
    log: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Throughput and latency box plots of every run in a directory
    Graph {
        /// Directory of run directories, also holds the parsed snapshot
        #[arg(short, long)]
        filename: PathBuf,
        /// Parse the run directories again instead of reading the snapshot
        #[arg(short = 'r', default_value_t = false)]
        reparse: bool,
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Mean and p99 latency of labelled files, relative to ZNS
    Latstats {
        /// `|` separated CSV files
        #[arg(long)]
        files: String,
        /// `|` separated run names, one per file
        #[arg(long)]
        labels: String,
    },
    /// Scatter or line plot of values over time
    Scatter {
        /// Comma separated CSV files
        data_files: String,
        /// Comma separated labels, one per file
        #[arg(long)]
        labels: Option<String>,
        #[arg(long)]
        yaxis: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long, default_value = "B")]
        yunits: Unit,
        #[arg(long, default_value = "B")]
        inunits: Unit,
        #[arg(long = "type", default_value = "scatter")]
        kind: SeriesKind,
        #[arg(long, default_value_t = false)]
        regression: bool,
        #[arg(long, default_value_t = false)]
        skipzero: bool,
        /// Comma separated begin,end CSV pairs of eviction threads
        #[arg(long)]
        overlay_threads: Option<String>,
    },
    /// Side by side box plots of file pairs
    Pairs {
        /// Comma separated CSV files, ZNS and SSD alternating
        csv_files: String,
        /// Comma separated tick label per pair
        chunk_size: String,
        /// Comma separated workload per file
        workload_type: String,
        /// Comma separated working set ratio per file
        working_set_ratio: String,
        yaxis: String,
        title: String,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Copy profiles into `out/`, named after their header
    Rename { directory: PathBuf },
    /// Render every plot of a report config
    Report {
        #[arg(short, long, default_value = "config.yaml")]
        config_file: PathBuf,
    },
}

fn main() -> Result<()> {
    let log_level = std::env::var("RUST_LOG").unwrap_or("warn".to_owned());
    let args = Cli::parse();
    let file_appender = tracing_appender::rolling::never(".", "log.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let mut env_filter = EnvFilter::new(format!("zns_eval={log_level}"));

    if !args.log.is_empty() {
        for log in &args.log {
            env_filter = env_filter.add_directive(log.parse()?);
        }
    }

    for module in MODULES {
        if !args.log.iter().any(|x| x.starts_with(module)) {
            env_filter = env_filter.add_directive(format!("{module}={log_level}").parse()?);
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            layer()
                .with_timer(ChronoLocal::new("%v %k:%M:%S %z".to_owned()))
                .compact(),
        )
        .with(layer().with_writer(non_blocking))
        .init();

    default_plots::init_plots();

    if let Err(err) = run(args.command) {
        error!("{err:#?}");
        return Err(err);
    }
    Ok(())
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Graph {
            filename,
            reparse,
            output_dir,
        } => graph(filename, reparse, output_dir),
        Commands::Latstats { files, labels } => latstats(&files, &labels),
        Commands::Scatter {
            data_files,
            labels,
            yaxis,
            title,
            output,
            yunits,
            inunits,
            kind,
            regression,
            skipzero,
            overlay_threads,
        } => {
            let plot = TimeSeries {
                files: paths(&data_files, ','),
                labels: labels.map(|x| split_list(&x, ',')),
                y_axis: yaxis,
                title,
                output,
                y_units: yunits,
                in_units: inunits,
                kind,
                regression,
                skip_zero: skipzero,
                overlay_threads: overlay_threads.map(|x| paths(&x, ',')),
            };
            let render = RenderConfig {
                font_size_delta: 4,
                output_dir: PathBuf::from("data"),
                ..RenderConfig::default().with_size(1200, 400)
            };
            render_one(Box::new(plot), &render)
        }
        Commands::Pairs {
            csv_files,
            chunk_size,
            workload_type,
            working_set_ratio,
            yaxis,
            title,
            output,
        } => {
            let workloads = split_list(&workload_type, ',')
                .iter()
                .map(|x| x.parse::<Distribution>())
                .collect::<Result<Vec<_>, _>>()?;
            let ratios = split_list(&working_set_ratio, ',')
                .iter()
                .map(|x| x.parse::<u32>().context(format!("Working set ratio {x}")))
                .collect::<Result<Vec<_>>>()?;
            let plot = PairBox {
                files: paths(&csv_files, ','),
                chunk_labels: split_list(&chunk_size, ','),
                workloads,
                ratios,
                y_axis: yaxis,
                title,
                output,
            };
            let render = RenderConfig {
                font_size: 24,
                ..RenderConfig::default().with_size(1200, 800)
            };
            render_one(Box::new(plot), &render)
        }
        Commands::Rename { directory } => {
            let report = rename_profiles(&directory)?;
            println!(
                "Copied {} profiles, skipped {}",
                report.copied.len(),
                report.skipped.len()
            );
            Ok(())
        }
        Commands::Report { config_file } => {
            let config = ReportConfig::from_file(&config_file)?;
            for path in run_report(&config)? {
                println!("{}", path.display());
            }
            Ok(())
        }
    }
}

fn paths(list: &str, delimiter: char) -> Vec<PathBuf> {
    split_list(list, delimiter)
        .into_iter()
        .map(PathBuf::from)
        .collect()
}

fn render_one(p: Box<dyn Plot>, render: &RenderConfig) -> Result<()> {
    plot(&[p], render, None)?;
    Ok(())
}

fn graph(dir: PathBuf, reparse: bool, output_dir: PathBuf) -> Result<()> {
    let dataset = Dataset::load(&dir, reparse)?;
    let render = RenderConfig {
        output_dir,
        ..RenderConfig::default()
    };
    let grids = default_plots::graph_plots();
    for grid in &grids {
        print_comparisons(grid, &dataset)?;
    }
    let plots = grids
        .into_iter()
        .map(|grid| Box::new(grid) as Box<dyn Plot>)
        .collect::<Vec<_>>();
    plot(&plots, &render, Some(&dataset))?;
    Ok(())
}

fn print_comparisons(grid: &BoxGrid, dataset: &Dataset) -> Result<()> {
    let comparisons = grid.comparisons(dataset)?;
    println!("{}", grid.title);
    print!("{}", markdown_table(&comparisons, &grid.unit));
    Ok(())
}

fn latstats(files: &str, labels: &str) -> Result<()> {
    let comparisons = latency_report(&paths(files, '|'), &split_list(labels, '|'), NS_TO_MS_SCALE)?;
    print!("{}", markdown_table(&comparisons, "ms"));
    Ok(())
}
