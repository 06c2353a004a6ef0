//! Export of recorded trajectories
//!
//! - [`csv`]: plain CSV tables with a `time` column followed by one column per species
//! - [`plot`]: SVG line charts (requires the `plot` feature)
use thiserror::Error;

pub mod csv;
#[cfg(feature = "plot")]
pub mod plot;

#[cfg(feature = "plot")]
pub use plot::{plot_time_series, PlotConfig};

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Unable to write output file")]
    Io(#[from] std::io::Error),
    #[error("Time series has no recorded points")]
    EmptySeries,
    #[error("Unable to draw plot: {0}")]
    Plot(String),
}
