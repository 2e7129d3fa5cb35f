use crate::error::GatewayError;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Category name to item count, in the order the server listed them.
///
/// Keys are unique. Order matters: it drives colour assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryHistogram {
    entries: Vec<(String, u64)>,
}

impl CategoryHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a histogram from ordered pairs. A repeated name keeps its first
    /// position and takes the last count.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        let mut histogram = Self::new();
        for (name, count) in entries {
            histogram.insert(name, count);
        }
        histogram
    }

    pub fn insert(&mut self, name: impl Into<String>, count: u64) {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = count,
            None => self.entries.push((name, count)),
        }
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, count)| *count)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(name, count)| (name.as_str(), *count))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all counts, `None` if it does not fit in a `u64`.
    pub fn checked_total(&self) -> Option<u64> {
        self.entries
            .iter()
            .try_fold(0u64, |sum, (_, count)| sum.checked_add(*count))
    }

    /// Sum of all counts, saturating at `u64::MAX`.
    ///
    /// Histograms parsed from a response never saturate; `from_json` rejects
    /// them.
    pub fn total(&self) -> u64 {
        self.checked_total().unwrap_or(u64::MAX)
    }

    fn from_json(map: &Map<String, Value>, path: &str) -> Result<Self, GatewayError> {
        let mut histogram = Self::new();
        for (name, value) in map {
            let count = value.as_u64().or_else(|| whole_number(value)).ok_or_else(|| {
                GatewayError::invalid_shape(format!(
                    "{}.{} must be a non-negative integer, got {}",
                    path, name, value
                ))
            })?;
            histogram.insert(name.as_str(), count);
        }
        if histogram.checked_total().is_none() {
            return Err(GatewayError::invalid_shape(format!(
                "{} counts add up to more than {}",
                path,
                u64::MAX
            )));
        }
        Ok(histogram)
    }
}

/// Accepts `3.0` as a count; rejects `2.5` and negatives.
fn whole_number(value: &Value) -> Option<u64> {
    let n = value.as_f64()?;
    if n >= 0.0 && n.fract() == 0.0 && n <= u64::MAX as f64 {
        Some(n as u64)
    } else {
        None
    }
}

impl Serialize for CategoryHistogram {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, count) in &self.entries {
            map.serialize_entry(name, count)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BasicAnalysis {
    pub spending_pattern: String,
    pub avg_spending: String,
    pub shopping_frequency: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ItemsAnalysis {
    pub frequently_bought: Vec<String>,
    pub possible_categories: CategoryHistogram,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShoppingHabits {
    pub preferred_stores: Vec<String>,
    pub time_patterns: String,
}

/// Consumption analysis returned by the backend. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisResult {
    pub analysis_id: Option<String>,
    pub created_at: Option<String>,
    pub basic_analysis: BasicAnalysis,
    pub items_analysis: ItemsAnalysis,
    pub shopping_habits: ShoppingHabits,
    pub recommendations: Vec<String>,
    pub from_cache: bool,
}

impl AnalysisResult {
    /// Validates and parses the `analyze-consumer-data` response body.
    ///
    /// # Errors
    ///
    /// `InvalidShape` naming the first missing or malformed path. The four
    /// required parts are the basic summary, the category histogram, the
    /// preferred store list and the recommendation list.
    pub fn from_value(raw: &Value) -> Result<Self, GatewayError> {
        let root = raw
            .as_object()
            .ok_or_else(|| GatewayError::invalid_shape("analysis response must be an object"))?;
        let analysis = object_at(root, "analysis", "analysis")?;

        let basic = object_at(analysis, "basic_analysis", "analysis.basic_analysis")?;
        let items = object_at(analysis, "items_analysis", "analysis.items_analysis")?;
        let categories = object_at(
            items,
            "possible_categories",
            "analysis.items_analysis.possible_categories",
        )?;
        let habits = object_at(analysis, "shopping_habits", "analysis.shopping_habits")?;
        let stores = array_at(
            habits,
            "preferred_stores",
            "analysis.shopping_habits.preferred_stores",
        )?;
        let recommendations = array_at(analysis, "recommendations", "analysis.recommendations")?;

        Ok(Self {
            analysis_id: root.get("analysis_id").map(scalar_text),
            created_at: root.get("created_at").map(scalar_text),
            basic_analysis: BasicAnalysis {
                spending_pattern: text_field(basic, "spending_pattern"),
                avg_spending: text_field(basic, "avg_spending"),
                shopping_frequency: text_field(basic, "shopping_frequency"),
            },
            items_analysis: ItemsAnalysis {
                frequently_bought: items
                    .get("frequently_bought")
                    .and_then(Value::as_array)
                    .map(|list| text_list(list))
                    .unwrap_or_default(),
                possible_categories: CategoryHistogram::from_json(
                    categories,
                    "analysis.items_analysis.possible_categories",
                )?,
            },
            shopping_habits: ShoppingHabits {
                preferred_stores: text_list(stores),
                time_patterns: text_field(habits, "time_patterns"),
            },
            recommendations: text_list(recommendations),
            from_cache: root
                .get("from_cache")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }
}

fn object_at<'a>(
    parent: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<&'a Map<String, Value>, GatewayError> {
    match parent.get(key) {
        Some(Value::Object(map)) => Ok(map),
        Some(Value::Null) | None => Err(GatewayError::invalid_shape(format!(
            "missing {}",
            path
        ))),
        Some(_) => Err(GatewayError::invalid_shape(format!(
            "{} must be an object",
            path
        ))),
    }
}

fn array_at<'a>(
    parent: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<&'a Vec<Value>, GatewayError> {
    match parent.get(key) {
        Some(Value::Array(list)) => Ok(list),
        Some(Value::Null) | None => Err(GatewayError::invalid_shape(format!(
            "missing {}",
            path
        ))),
        Some(_) => Err(GatewayError::invalid_shape(format!(
            "{} must be a list",
            path
        ))),
    }
}

/// Strings verbatim, other scalars in their JSON form, null as empty.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn text_field(map: &Map<String, Value>, key: &str) -> String {
    map.get(key).map(scalar_text).unwrap_or_default()
}

fn text_list(list: &[Value]) -> Vec<String> {
    list.iter().map(scalar_text).collect()
}
