//! SVG line charts of time series
use std::path::Path;

use plotters::prelude::*;
use tracing::info;

use crate::output::OutputError;
use crate::simulate::TimeSeries;

/// Appearance of a time series plot
#[derive(Clone, Debug)]
pub struct PlotConfig {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    pub title: String,
    pub xlabel: String,
    pub ylabel: String,
    /// Line thickness in pixels
    pub line_width: u32,
    /// Only these species are drawn when set, otherwise every species
    pub species: Option<Vec<String>>,
}

impl Default for PlotConfig {
    fn default() -> Self {
        PlotConfig {
            width: 1024,
            height: 768,
            title: "Simulation".to_string(),
            xlabel: "Time".to_string(),
            ylabel: "Amount".to_string(),
            line_width: 2,
            species: None,
        }
    }
}

/// Draw one line per species of `series` and save it as an SVG file at `path`
pub fn plot_time_series<P: AsRef<Path>>(
    series: &TimeSeries,
    path: P,
    config: &PlotConfig,
) -> Result<(), OutputError> {
    if series.is_empty() {
        return Err(OutputError::EmptySeries);
    }
    let columns: Vec<(&String, &Vec<f64>)> = series
        .species
        .iter()
        .filter(|(id, _)| match &config.species {
            Some(selected) => selected.contains(*id),
            None => true,
        })
        .collect();

    let t_min = series.time.first().copied().unwrap_or(0.0);
    let mut t_max = series.time.last().copied().unwrap_or(1.0);
    if t_max <= t_min {
        t_max = t_min + 1.0;
    }
    let y_max = columns
        .iter()
        .flat_map(|(_, values)| values.iter())
        .copied()
        .filter(|v| v.is_finite())
        .fold(f64::NEG_INFINITY, f64::max)
        .max(1e-10);

    let backend = SVGBackend::new(path.as_ref(), (config.width, config.height));
    draw(backend, &series.time, &columns, config, (t_min, t_max), y_max)
        .map_err(OutputError::Plot)?;
    info!(path = %path.as_ref().display(), "wrote time series plot");
    Ok(())
}

fn draw<DB: DrawingBackend>(
    backend: DB,
    time: &[f64],
    columns: &[(&String, &Vec<f64>)],
    config: &PlotConfig,
    (t_min, t_max): (f64, f64),
    y_max: f64,
) -> Result<(), String> {
    let root = backend.into_drawing_area();
    root.fill(&WHITE).map_err(|e| e.to_string())?;

    let mut chart = ChartBuilder::on(&root)
        .caption(&config.title, ("sans-serif", 30).into_font())
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(t_min..t_max, 0.0..(y_max * 1.1))
        .map_err(|e| e.to_string())?;

    chart
        .configure_mesh()
        .x_desc(config.xlabel.as_str())
        .y_desc(config.ylabel.as_str())
        .draw()
        .map_err(|e| e.to_string())?;

    for (index, (id, values)) in columns.iter().enumerate() {
        let color = Palette99::pick(index).to_rgba();
        chart
            .draw_series(LineSeries::new(
                time.iter().zip(values.iter()).map(|(t, v)| (*t, *v)),
                color.stroke_width(config.line_width),
            ))
            .map_err(|e| e.to_string())?
            .label(id.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(|e| e.to_string())?;
    root.present().map_err(|e| e.to_string())?;
    Ok(())
}

#[cfg(test)]
mod plot_tests {
    use super::*;
    use indexmap::IndexMap;

    #[test]
    fn writes_svg() {
        let mut series = TimeSeries::new(&["A", "B"]);
        for step in 0..10 {
            let t = step as f64;
            series.push(
                t,
                &IndexMap::from([("A".to_string(), t), ("B".to_string(), 10.0 - t)]),
            );
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("series.svg");
        plot_time_series(&series, &path, &PlotConfig::default()).unwrap();
        let svg = std::fs::read_to_string(path).unwrap();
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn empty_series() {
        let dir = tempfile::tempdir().unwrap();
        let result = plot_time_series(
            &TimeSeries::new(&["A"]),
            dir.path().join("empty.svg"),
            &PlotConfig::default(),
        );
        assert!(matches!(result, Err(OutputError::EmptySeries)));
    }
}
