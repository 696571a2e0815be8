use anyhow::Result;
use clap::Args;

use calorie_journal_core::JournalService;
use calorie_journal_core::models::{Entry, Meal, MealRow, Nutrients, Submission};

use super::helpers::{parse_date, parse_quantity, parse_row_spec, short_id, timestamp_for};

/// Nutrient values for a single meal row given as flags.
#[derive(Args, Debug, Default)]
pub(crate) struct NutrientFlags {
    /// Calories (kcal)
    #[arg(long)]
    pub calories: Option<String>,
    /// Protein (g)
    #[arg(long)]
    pub protein: Option<String>,
    /// Carbohydrates (g)
    #[arg(long)]
    pub carbs: Option<String>,
    /// Fat (g)
    #[arg(long)]
    pub fat: Option<String>,
    /// Fiber (g)
    #[arg(long)]
    pub fiber: Option<String>,
    /// Sugar (g)
    #[arg(long)]
    pub sugar: Option<String>,
    /// Sodium (mg)
    #[arg(long)]
    pub sodium: Option<String>,
}

impl NutrientFlags {
    fn is_set(&self) -> bool {
        [
            &self.calories,
            &self.protein,
            &self.carbs,
            &self.fat,
            &self.fiber,
            &self.sugar,
            &self.sodium,
        ]
        .iter()
        .any(|v| v.is_some())
    }

    fn to_nutrients(&self) -> Nutrients {
        let value = |label: &str, raw: &Option<String>| {
            raw.as_deref().map_or(0.0, |r| parse_quantity(label, r))
        };
        Nutrients {
            calories: value("calories", &self.calories),
            protein: value("protein", &self.protein),
            carbs: value("carbs", &self.carbs),
            fat: value("fat", &self.fat),
            fiber: value("fiber", &self.fiber),
            sugar: value("sugar", &self.sugar),
            sodium: value("sodium", &self.sodium),
        }
    }
}

/// Collect meal rows from the flag row (if any nutrient flag is set) and `--row` values.
pub(crate) fn build_rows(
    meal: &str,
    flags: &NutrientFlags,
    rows: &[String],
) -> Result<Vec<MealRow>> {
    let mut out = Vec::with_capacity(rows.len() + 1);
    if flags.is_set() {
        out.push(MealRow {
            meal: meal.parse::<Meal>()?,
            nutrients: flags.to_nutrients(),
        });
    }
    for spec in rows {
        out.push(parse_row_spec(spec)?);
    }
    Ok(out)
}

pub(crate) struct LogRequest {
    pub name: String,
    pub meal: String,
    pub flags: NutrientFlags,
    pub rows: Vec<String>,
    pub notes: Option<String>,
    pub date: Option<String>,
}

pub(crate) fn cmd_log(svc: &JournalService, req: LogRequest, json: bool) -> Result<()> {
    let day = parse_date(req.date)?;
    let rows = build_rows(&req.meal, &req.flags, &req.rows)?;

    let created = svc.add_submission(&Submission {
        name: req.name,
        notes: req.notes,
        date: timestamp_for(day),
        rows,
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&created)?);
    } else {
        for entry in &created {
            print_logged(entry);
        }
    }

    Ok(())
}

fn print_logged(entry: &Entry) {
    let id = short_id(&entry.id);
    let name = &entry.name;
    let meal = entry.meal;
    let n = &entry.nutrients;
    let (cal, p, c, f) = (n.calories, n.protein, n.carbs, n.fat);
    println!("Logged [{id}] {name} for {meal}: {cal:.0} kcal | P:{p:.0}g C:{c:.0}g F:{f:.0}g");
}
