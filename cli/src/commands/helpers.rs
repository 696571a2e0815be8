use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use tracing::warn;

use calorie_journal_core::models::{Meal, MealRow, Nutrients, sanitize_quantity};

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

/// Timestamp for an entry logged against `day`: now for today, local noon otherwise.
pub(crate) fn timestamp_for(day: NaiveDate) -> DateTime<Utc> {
    let now = Local::now();
    if day == now.date_naive() {
        return now.with_timezone(&Utc);
    }
    let noon = day.and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN));
    Local.from_local_datetime(&noon).earliest().map_or_else(
        || Utc.from_utc_datetime(&noon),
        |local| local.with_timezone(&Utc),
    )
}

/// Parse a user-typed quantity. Anything unusable counts as 0.
pub(crate) fn parse_quantity(label: &str, raw: &str) -> f64 {
    if let Ok(value) = raw.trim().parse::<f64>() {
        sanitize_quantity(value)
    } else {
        warn!(field = label, value = raw, "not a number, using 0");
        0.0
    }
}

/// Parse a `--row` value such as `lunch:calories=300,protein=20`.
pub(crate) fn parse_row_spec(spec: &str) -> Result<MealRow> {
    let (meal, values) = spec
        .split_once(':')
        .with_context(|| format!("Invalid row '{spec}'. Use 'meal:calories=300,protein=20'"))?;
    let meal: Meal = meal.parse()?;

    let mut nutrients = Nutrients::default();
    for pair in values.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, raw) = pair
            .split_once('=')
            .with_context(|| format!("Invalid value '{pair}' in row '{spec}'. Use key=value"))?;
        let key = key.trim().to_lowercase();
        let value = parse_quantity(&key, raw);
        match key.as_str() {
            "calories" | "cal" | "kcal" => nutrients.calories = value,
            "protein" | "p" => nutrients.protein = value,
            "carbs" | "c" => nutrients.carbs = value,
            "fat" | "f" => nutrients.fat = value,
            "fiber" | "fibre" => nutrients.fiber = value,
            "sugar" => nutrients.sugar = value,
            "sodium" => nutrients.sodium = value,
            _ => bail!(
                "Unknown nutrient '{key}' in row '{spec}'. Use calories, protein, carbs, fat, fiber, sugar, sodium"
            ),
        }
    }

    Ok(MealRow { meal, nutrients })
}

/// Text progress bar for a ratio in `[0, 1]`.
pub(crate) fn progress_bar(ratio: f64, width: usize) -> String {
    #[allow(clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let filled = ((ratio.clamp(0.0, 1.0) * width as f64).round() as usize).min(width);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

pub(crate) fn short_id(id: &str) -> &str {
    id.char_indices().nth(8).map_or(id, |(i, _)| &id[..i])
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
