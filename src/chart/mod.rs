pub mod builder;
pub mod palette;

pub use builder::{build, chart_data, ChartData, ChartSeries};
pub use palette::{Palette, DEFAULT_COLORS};
