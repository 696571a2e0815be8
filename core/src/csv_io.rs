use std::collections::HashSet;
use std::io::{Read, Write};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use crate::models::{Entry, Meal, Nutrients, sanitize_quantity};

const EXPORT_HEADER: [&str; 12] = [
    "id", "date", "meal", "name", "calories", "protein", "carbs", "fat", "fiber", "sugar",
    "sodium", "notes",
];

/// Write entries as CSV, one row per entry, in the order given.
pub fn write_entries_csv<W: Write>(writer: W, entries: &[Entry]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(EXPORT_HEADER)?;
    for e in entries {
        let n = &e.nutrients;
        wtr.write_record([
            e.id.clone(),
            e.date.to_rfc3339(),
            e.meal.to_string(),
            e.name.clone(),
            n.calories.to_string(),
            n.protein.to_string(),
            n.carbs.to_string(),
            n.fat.to_string(),
            n.fiber.to_string(),
            n.sugar.to_string(),
            n.sodium.to_string(),
            e.notes.clone().unwrap_or_default(),
        ])?;
    }
    wtr.flush().context("Failed to flush CSV output")?;
    Ok(())
}

/// A single row parsed from a diary-style CSV export.
#[derive(Debug, Clone)]
pub struct CsvRow {
    pub date: NaiveDate,
    pub meal: Meal,
    pub name: String,
    pub nutrients: Nutrients,
}

impl CsvRow {
    /// Build an entry stamped at local noon of the row's date.
    pub fn into_entry<Tz: TimeZone>(self, tz: &Tz) -> Entry {
        Entry {
            id: Uuid::new_v4().to_string(),
            date: local_noon(self.date, tz),
            name: self.name,
            meal: self.meal,
            nutrients: self.nutrients,
            notes: None,
        }
    }
}

fn local_noon<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let noon = date.and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN));
    tz.from_local_datetime(&noon).earliest().map_or_else(
        || Utc.from_utc_datetime(&noon),
        |local| local.with_timezone(&Utc),
    )
}

/// Summary of what a CSV import would do / did.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ImportSummary {
    pub rows_parsed: usize,
    pub entries_created: usize,
    pub dates_spanned: usize,
    pub dry_run: bool,
}

impl ImportSummary {
    #[must_use]
    pub fn for_rows(rows: &[CsvRow], dry_run: bool) -> Self {
        let dates: HashSet<NaiveDate> = rows.iter().map(|r| r.date).collect();
        Self {
            rows_parsed: rows.len(),
            entries_created: if dry_run { 0 } else { rows.len() },
            dates_spanned: dates.len(),
            dry_run,
        }
    }
}

/// Parse a diary CSV export (the MyFitnessPal layout) from any reader.
///
/// Expected header:
/// `Date,Meal,Food Name,Calories,Fat (g),Protein (g),Carbohydrates (g),Fiber (g),Sugar (g),Sodium (mg)`
///
/// Only the first four columns are required; headers match case-insensitively.
pub fn parse_journal_csv<R: Read>(reader: R) -> Result<Vec<CsvRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().context("Failed to read CSV headers")?.clone();

    let required = ["Date", "Meal", "Food Name", "Calories"];
    for name in &required {
        if !headers.iter().any(|h| h.eq_ignore_ascii_case(name)) {
            bail!("Missing required column: {name}");
        }
    }

    let col =
        |name: &str| -> Option<usize> { headers.iter().position(|h| h.eq_ignore_ascii_case(name)) };

    let idx_date = col("Date").context("Missing 'Date' column")?;
    let idx_meal = col("Meal").context("Missing 'Meal' column")?;
    let idx_name = col("Food Name").context("Missing 'Food Name' column")?;
    let idx_cal = col("Calories");
    let idx_fat = col("Fat (g)");
    let idx_protein = col("Protein (g)");
    let idx_carbs = col("Carbohydrates (g)");
    let idx_fiber = col("Fiber (g)");
    let idx_sugar = col("Sugar (g)");
    let idx_sodium = col("Sodium (mg)");

    let mut rows = Vec::new();

    for (line_num, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Failed to parse CSV row {}", line_num + 2))?;

        let date = record.get(idx_date).unwrap_or("").trim();
        let name = record.get(idx_name).unwrap_or("").trim();
        if date.is_empty() || name.is_empty() {
            continue;
        }

        let date = parse_csv_date(date).with_context(|| {
            format!(
                "Invalid date '{date}' on CSV row {}. Use YYYY-MM-DD, M/D/YYYY or D/M/YYYY",
                line_num + 2
            )
        })?;

        let quantity = |idx: Option<usize>| -> f64 {
            idx.and_then(|i| record.get(i))
                .and_then(|v| v.trim().parse::<f64>().ok())
                .map_or(0.0, sanitize_quantity)
        };

        rows.push(CsvRow {
            date,
            meal: Meal::from_label(record.get(idx_meal).unwrap_or("")),
            name: name.to_string(),
            nutrients: Nutrients {
                calories: quantity(idx_cal),
                protein: quantity(idx_protein),
                carbs: quantity(idx_carbs),
                fat: quantity(idx_fat),
                fiber: quantity(idx_fiber),
                sugar: quantity(idx_sugar),
                sodium: quantity(idx_sodium),
            },
        });
    }

    Ok(rows)
}

/// ISO dates first, then the US and day-first slashed layouts diary apps export.
/// An ambiguous slashed date reads as month first.
fn parse_csv_date(raw: &str) -> Option<NaiveDate> {
    ["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}
