pub mod format;
pub mod parsing;
pub mod tcc_chart;

// Re-export commonly used items
pub use tcc_chart::{ChartConfig, PngChartRenderer, TccChart};
