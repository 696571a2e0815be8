use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use anyhow::{Result, bail};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const ENTRIES_KEY: &str = "calorie_journal_entries_v1";
/// Where unreadable entry records are moved by a repair.
pub const ENTRIES_REJECTED_KEY: &str = "calorie_journal_entries_v1_rejected";
pub const GOALS_KEY: &str = "calorie_journal_goals_v1";

/// Meal label an entry is grouped under.
///
/// Variant order is the display order used by summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub enum Meal {
    Breakfast,
    Lunch,
    Dinner,
    #[default]
    Snack,
}

impl Meal {
    pub const ALL: [Meal; 4] = [Meal::Breakfast, Meal::Lunch, Meal::Dinner, Meal::Snack];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Meal::Breakfast => "Breakfast",
            Meal::Lunch => "Lunch",
            Meal::Dinner => "Dinner",
            Meal::Snack => "Snack",
        }
    }

    /// Case-insensitive lookup that falls back to `Snack` for anything unknown.
    #[must_use]
    pub fn from_label(label: &str) -> Meal {
        label.parse().unwrap_or_default()
    }
}

impl fmt::Display for Meal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Meal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "breakfast" => Ok(Meal::Breakfast),
            "lunch" => Ok(Meal::Lunch),
            "dinner" => Ok(Meal::Dinner),
            "snack" | "snacks" => Ok(Meal::Snack),
            _ => bail!("Invalid meal '{s}'. Must be one of: breakfast, lunch, dinner, snack"),
        }
    }
}

/// Nutrition quantities carried by a single entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Nutrients {
    #[serde(default, deserialize_with = "lenient_quantity")]
    pub calories: f64,
    #[serde(default, deserialize_with = "lenient_quantity")]
    pub protein: f64,
    #[serde(default, deserialize_with = "lenient_quantity")]
    pub carbs: f64,
    #[serde(default, deserialize_with = "lenient_quantity")]
    pub fat: f64,
    #[serde(default, deserialize_with = "lenient_quantity")]
    pub fiber: f64,
    #[serde(default, deserialize_with = "lenient_quantity")]
    pub sugar: f64,
    #[serde(default, deserialize_with = "lenient_quantity")]
    pub sodium: f64,
}

impl Nutrients {
    /// Clamp every field through [`sanitize_quantity`].
    #[must_use]
    pub fn sanitized(self) -> Self {
        Self {
            calories: sanitize_quantity(self.calories),
            protein: sanitize_quantity(self.protein),
            carbs: sanitize_quantity(self.carbs),
            fat: sanitize_quantity(self.fat),
            fiber: sanitize_quantity(self.fiber),
            sugar: sanitize_quantity(self.sugar),
            sodium: sanitize_quantity(self.sodium),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        [
            self.calories,
            self.protein,
            self.carbs,
            self.fat,
            self.fiber,
            self.sugar,
            self.sodium,
        ]
        .iter()
        .all(|v| sanitize_quantity(*v) == 0.0)
    }
}

/// One logged food item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_meal")]
    pub meal: Meal,
    #[serde(flatten)]
    pub nutrients: Nutrients,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "blank_as_none"
    )]
    pub notes: Option<String>,
}

/// One meal row of an add-entry submission.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MealRow {
    pub meal: Meal,
    pub nutrients: Nutrients,
}

/// A single add-entry submission: one name, one timestamp, several meal rows.
#[derive(Debug, Clone)]
pub struct Submission {
    pub name: String,
    pub notes: Option<String>,
    pub date: DateTime<Utc>,
    pub rows: Vec<MealRow>,
}

impl Submission {
    /// Rows that will become entries, in submission order.
    pub fn filled_rows(&self) -> impl Iterator<Item = &MealRow> {
        self.rows.iter().filter(|r| !r.nutrients.is_empty())
    }
}

pub fn validate_submission(submission: &Submission) -> Result<()> {
    if submission.name.trim().is_empty() {
        bail!("Entry name must not be empty");
    }
    if submission.filled_rows().next().is_none() {
        bail!("At least one meal row must have a non-zero value");
    }
    Ok(())
}

pub const DEFAULT_CALORIES_GOAL: f64 = 2000.0;
pub const DEFAULT_PROTEIN_GOAL: f64 = 150.0;
pub const DEFAULT_CARBS_GOAL: f64 = 250.0;
pub const DEFAULT_FAT_GOAL: f64 = 70.0;
pub const DEFAULT_FIBER_GOAL: f64 = 30.0;

/// Target daily values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawGoalSet")]
pub struct GoalSet {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub fiber: f64,
}

impl Default for GoalSet {
    fn default() -> Self {
        Self {
            calories: DEFAULT_CALORIES_GOAL,
            protein: DEFAULT_PROTEIN_GOAL,
            carbs: DEFAULT_CARBS_GOAL,
            fat: DEFAULT_FAT_GOAL,
            fiber: DEFAULT_FIBER_GOAL,
        }
    }
}

impl GoalSet {
    pub fn validate(&self) -> Result<()> {
        for (label, value) in [
            ("calories", self.calories),
            ("protein", self.protein),
            ("carbs", self.carbs),
            ("fat", self.fat),
            ("fiber", self.fiber),
        ] {
            if !value.is_finite() {
                bail!("Goal for {label} must be a finite number");
            }
            if value < 0.0 {
                bail!("Goal for {label} must not be negative");
            }
        }
        Ok(())
    }

    /// The goals viewed as a [`Totals`] for arithmetic against consumption.
    #[must_use]
    pub fn as_totals(&self) -> Totals {
        Totals {
            calories: self.calories,
            protein: self.protein,
            carbs: self.carbs,
            fat: self.fat,
            fiber: self.fiber,
        }
    }
}

// Stored goal documents are read field by field; anything missing or
// unusable keeps its default.
#[derive(Deserialize)]
struct RawGoalSet {
    #[serde(default)]
    calories: Option<Value>,
    #[serde(default)]
    protein: Option<Value>,
    #[serde(default)]
    carbs: Option<Value>,
    #[serde(default)]
    fat: Option<Value>,
    #[serde(default)]
    fiber: Option<Value>,
}

impl From<RawGoalSet> for GoalSet {
    fn from(raw: RawGoalSet) -> Self {
        let pick = |value: Option<Value>, fallback: f64| {
            value
                .as_ref()
                .and_then(numeric_value)
                .filter(|v| v.is_finite() && *v >= 0.0)
                .unwrap_or(fallback)
        };
        Self {
            calories: pick(raw.calories, DEFAULT_CALORIES_GOAL),
            protein: pick(raw.protein, DEFAULT_PROTEIN_GOAL),
            carbs: pick(raw.carbs, DEFAULT_CARBS_GOAL),
            fat: pick(raw.fat, DEFAULT_FAT_GOAL),
            fiber: pick(raw.fiber, DEFAULT_FIBER_GOAL),
        }
    }
}

/// Pointwise sum of the aggregated nutrients. Sugar and sodium are not summed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub fiber: f64,
}

impl Totals {
    #[must_use]
    pub fn of(entry: &Entry) -> Self {
        let n = entry.nutrients.sanitized();
        Self {
            calories: n.calories,
            protein: n.protein,
            carbs: n.carbs,
            fat: n.fat,
            fiber: n.fiber,
        }
    }

    pub fn from_entries<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = &'a Entry>,
    {
        entries
            .into_iter()
            .map(Totals::of)
            .fold(Totals::default(), |acc, t| acc + t)
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Totals::default()
    }
}

impl Add for Totals {
    type Output = Totals;

    fn add(self, rhs: Totals) -> Totals {
        Totals {
            calories: self.calories + rhs.calories,
            protein: self.protein + rhs.protein,
            carbs: self.carbs + rhs.carbs,
            fat: self.fat + rhs.fat,
            fiber: self.fiber + rhs.fiber,
        }
    }
}

impl AddAssign for Totals {
    fn add_assign(&mut self, rhs: Totals) {
        *self = *self + rhs;
    }
}

/// Aggregation result for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub totals: Totals,
    pub by_meal: BTreeMap<Meal, Totals>,
    pub goals: GoalSet,
    pub entry_count: usize,
}

/// Fraction of each goal reached, clamped to `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GoalProgress {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub fiber: f64,
}

// --- Lenient field decoding ---

fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Coerce a stored JSON value to a non-negative quantity; anything unusable is 0.
#[must_use]
pub fn coerce_quantity(value: &Value) -> f64 {
    numeric_value(value).map_or(0.0, sanitize_quantity)
}

/// Negative, `NaN` and infinite values become 0.
#[must_use]
pub fn sanitize_quantity(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

fn lenient_quantity<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map_or(0.0, coerce_quantity))
}

fn lenient_meal<'de, D>(deserializer: D) -> Result<Meal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(Value::as_str)
        .map_or(Meal::Snack, Meal::from_label))
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::String(s) if !s.trim().is_empty() => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!("invalid entry id: {other}"))),
    }
}

/// Timestamps are RFC 3339 strings; epoch milliseconds are accepted too.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|e| D::Error::custom(format!("invalid entry date '{s}': {e}"))),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .ok_or_else(|| D::Error::custom(format!("invalid entry timestamp: {n}"))),
        other => Err(D::Error::custom(format!("invalid entry date: {other}"))),
    }
}
