use super::model::{AnalysisResult, CategoryHistogram};
use crate::error::GatewayError;
use serde::Serialize;
use serde_json::Value;

/// Fixed chart palette; entry `i` of a histogram gets `PALETTE[i % 8]`.
pub const PALETTE: [&str; 8] = [
    "#FF6384", "#36A2EB", "#FFCE56", "#4BC0C0", "#9966FF", "#FF9F40", "#8884d8", "#82ca9d",
];

/// One slice of the category chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartCategory {
    pub name: String,
    pub count: u64,
    pub color: &'static str,
    /// Exact `count / total_items` ratio in `0.0..=1.0`, not pre-rounded.
    pub percentage_of_total: f64,
}

impl ChartCategory {
    /// Ratio rendered as a percentage, e.g. `"75.0%"`.
    pub fn percent_label(&self, decimals: usize) -> String {
        format_percentage(self.percentage_of_total, decimals)
    }
}

/// Chart-ready view of a category histogram.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryChart {
    pub categories: Vec<ChartCategory>,
    pub total_items: u64,
}

impl CategoryChart {
    /// Derives chart categories in histogram order.
    ///
    /// An empty histogram yields an empty chart with `total_items == 0`.
    pub fn from_histogram(histogram: &CategoryHistogram) -> Self {
        let total_items = histogram.total();
        let categories = histogram
            .iter()
            .enumerate()
            .map(|(index, (name, count))| ChartCategory {
                name: name.to_string(),
                count,
                color: PALETTE[index % PALETTE.len()],
                percentage_of_total: if total_items > 0 {
                    count as f64 / total_items as f64
                } else {
                    0.0
                },
            })
            .collect();

        Self {
            categories,
            total_items,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Parsed analysis plus its derived chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedAnalysis {
    pub result: AnalysisResult,
    pub chart: CategoryChart,
}

impl NormalizedAnalysis {
    pub fn from_result(result: AnalysisResult) -> Self {
        let chart = CategoryChart::from_histogram(&result.items_analysis.possible_categories);
        Self { result, chart }
    }
}

/// Validates a raw analysis payload and derives the chart view.
///
/// Pure: the same payload always yields the same categories and colours.
///
/// # Errors
///
/// `InvalidShape` when a required section is missing. Callers must not try
/// to render a partial result.
pub fn normalize(raw: &Value) -> Result<NormalizedAnalysis, GatewayError> {
    AnalysisResult::from_value(raw).map(NormalizedAnalysis::from_result)
}

/// Renders a ratio as a percentage with `decimals` digits.
pub fn format_percentage(ratio: f64, decimals: usize) -> String {
    format!("{:.*}%", decimals, ratio * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_with_categories(categories: Value) -> Value {
        json!({
            "analysis": {
                "basic_analysis": {
                    "spending_pattern": "Steady",
                    "avg_spending": "$20",
                    "shopping_frequency": "Daily"
                },
                "items_analysis": {
                    "frequently_bought": [],
                    "possible_categories": categories
                },
                "shopping_habits": {"preferred_stores": [], "time_patterns": ""},
                "recommendations": []
            }
        })
    }

    #[test]
    fn test_empty_histogram() {
        let chart = CategoryChart::from_histogram(&CategoryHistogram::new());
        assert_eq!(chart.total_items, 0);
        assert!(chart.is_empty());

        let normalized = normalize(&raw_with_categories(json!({}))).unwrap();
        assert_eq!(normalized.chart, CategoryChart::default());
    }

    #[test]
    fn test_ratios_and_colors() {
        let normalized = normalize(&raw_with_categories(json!({"A": 3, "B": 1}))).unwrap();
        let chart = normalized.chart;

        assert_eq!(chart.total_items, 4);
        assert_eq!(chart.categories.len(), 2);
        assert_eq!(chart.categories[0].name, "A");
        assert_eq!(chart.categories[0].percentage_of_total, 0.75);
        assert_eq!(chart.categories[0].color, PALETTE[0]);
        assert_eq!(chart.categories[1].name, "B");
        assert_eq!(chart.categories[1].percentage_of_total, 0.25);
        assert_eq!(chart.categories[1].color, PALETTE[1]);
    }

    #[test]
    fn test_all_zero_counts() {
        let histogram = CategoryHistogram::from_entries([("A", 0), ("B", 0)]);
        let chart = CategoryChart::from_histogram(&histogram);
        assert_eq!(chart.total_items, 0);
        assert!(chart.categories.iter().all(|c| c.percentage_of_total == 0.0));
    }

    #[test]
    fn test_palette_cycles_after_eight() {
        let histogram =
            CategoryHistogram::from_entries((0..10).map(|i| (format!("c{}", i), 1)));
        let chart = CategoryChart::from_histogram(&histogram);
        assert_eq!(chart.categories[8].color, PALETTE[0]);
        assert_eq!(chart.categories[9].color, PALETTE[1]);
    }

    #[test]
    fn test_colors_are_stable_across_renders() {
        let raw = raw_with_categories(json!({"Food": 2, "Toys": 7, "Garden": 1}));
        let first = normalize(&raw).unwrap();
        let second = normalize(&raw).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_ratio_is_not_pre_rounded() {
        let histogram = CategoryHistogram::from_entries([("A", 1), ("B", 2)]);
        let chart = CategoryChart::from_histogram(&histogram);
        assert_eq!(chart.categories[0].percentage_of_total, 1.0 / 3.0);
        assert_eq!(chart.categories[0].percent_label(1), "33.3%");
        assert_eq!(chart.categories[1].percent_label(1), "66.7%");
    }

    #[test]
    fn test_missing_section_propagates() {
        let mut raw = raw_with_categories(json!({"A": 1}));
        raw["analysis"].as_object_mut().unwrap().remove("recommendations");
        assert!(matches!(normalize(&raw), Err(GatewayError::InvalidShape { .. })));
    }

    #[test]
    fn test_overflowing_counts_are_rejected() {
        let raw = raw_with_categories(json!({"A": u64::MAX, "B": 1}));
        assert!(matches!(
            normalize(&raw),
            Err(GatewayError::InvalidShape { .. })
        ));
    }

    #[test]
    fn test_format_percentage() {
        assert_eq!(format_percentage(0.75, 1), "75.0%");
        assert_eq!(format_percentage(0.0, 0), "0%");
    }
}
