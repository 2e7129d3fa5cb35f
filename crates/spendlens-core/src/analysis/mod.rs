//! Consumption analysis payload and its chart normalization.

mod chart;
mod model;

pub use chart::{CategoryChart, ChartCategory, NormalizedAnalysis, PALETTE, format_percentage, normalize};
pub use model::{AnalysisResult, BasicAnalysis, CategoryHistogram, ItemsAnalysis, ShoppingHabits};
