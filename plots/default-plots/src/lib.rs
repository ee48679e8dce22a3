use box_grid::BoxGrid;
use common::plot::Plot;
use pair_box::PairBox;
use time_series::TimeSeries;

/// Serializes every plot once so their typetag registrations are linked
/// into the binary.
pub fn init_plots() {
    for plot in [
        Box::new(BoxGrid::default()) as Box<dyn Plot>,
        Box::new(TimeSeries::default()),
        Box::new(PairBox::default()),
    ] {
        _ = serde_json::to_string(&plot);
    }
}

/// Plots drawn by `graph`: throughput and latency grids
pub fn graph_plots() -> Vec<BoxGrid> {
    vec![BoxGrid::throughput(), BoxGrid::latency()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plots_round_trip_by_tag() {
        init_plots();
        let plots: Vec<Box<dyn Plot>> = graph_plots()
            .into_iter()
            .map(|p| Box::new(p) as Box<dyn Plot>)
            .collect();
        let json = serde_json::to_string(&plots).unwrap();
        assert!(json.contains("\"type\":\"BoxGrid\""));
        let back: Vec<Box<dyn Plot>> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 2);
        assert!(back.iter().all(|p| p.is::<BoxGrid>() && p.needs_dataset()));
    }

    #[test]
    fn report_config_from_yaml() {
        init_plots();
        let yaml = r#"
name: eviction
source: results/eviction
render:
  font_size: 14
  output_dir: plots
plots:
  - type: BoxGrid
    measurement: GETLATENCY
    title: Latency (ms)
    scale: 0.000001
    unit: ms
    ratios: [2]
  - type: TimeSeries
    files: [data/used.csv]
    y_units: MiB
    kind: line
    skip_zero: true
"#;
        let config: common::config::ReportConfig = serde_yml::from_str(yaml).unwrap();
        assert_eq!(config.render.font_size, 14);
        assert_eq!(config.render.width, 1200);
        assert_eq!(config.plots.len(), 2);
        let grid = config.plots[0].downcast_ref::<BoxGrid>().unwrap();
        assert_eq!(grid.ratios, vec![2]);
        assert_eq!(grid.chunks.len(), 2);
        let series = config.plots[1].downcast_ref::<TimeSeries>().unwrap();
        assert!(series.skip_zero && !series.regression);
        assert!(config.plots.iter().any(|p| p.needs_dataset()));
    }
}
