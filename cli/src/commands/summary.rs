use anyhow::Result;
use chrono::Local;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use calorie_journal_core::JournalService;
use calorie_journal_core::models::{DaySummary, Entry, Meal};

use super::helpers::{no_neg_zero, parse_date, progress_bar, short_id};

const BAR_WIDTH: usize = 20;

pub(crate) fn cmd_summary(svc: &JournalService, date: Option<String>, json: bool) -> Result<()> {
    let day = parse_date(date)?;
    let summary = svc.day_summary(day, &Local)?;
    let entries = svc.entries_for_day(day, &Local)?;

    if json {
        let out = serde_json::json!({
            "summary": summary,
            "progress": summary.progress(),
            "remaining": summary.remaining(),
            "entries": entries,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if summary.is_empty() {
        eprintln!("No entries for {day}");
        process::exit(2);
    }

    println!("=== {day} ===\n");

    for meal in Meal::ALL {
        let meal_entries: Vec<&Entry> = entries.iter().filter(|e| e.meal == meal).collect();
        if meal_entries.is_empty() {
            continue;
        }
        let label = meal.as_str().to_uppercase();
        let sub_cal = summary.meal_totals(meal).calories;
        println!("  {label} ({sub_cal:.0} kcal)");
        for e in meal_entries {
            let id = short_id(&e.id);
            let name = &e.name;
            let n = &e.nutrients;
            let (cal, p, c, f) = (n.calories, n.protein, n.carbs, n.fat);
            println!("    [{id}] {name} — {cal:.0} kcal | P:{p:.0}g C:{c:.0}g F:{f:.0}g");
        }
        println!();
    }

    let t = &summary.totals;
    let g = &summary.goals;
    let r = summary.remaining();
    println!(
        "  TOTAL:     {:.0} kcal | P:{:.0}g C:{:.0}g F:{:.0}g Fiber:{:.0}g",
        t.calories, t.protein, t.carbs, t.fat, t.fiber
    );
    println!(
        "  GOAL:      {:.0} kcal | P:{:.0}g C:{:.0}g F:{:.0}g Fiber:{:.0}g",
        g.calories, g.protein, g.carbs, g.fat, g.fiber
    );
    println!(
        "  REMAINING: {:.0} kcal | P:{:.0}g C:{:.0}g F:{:.0}g Fiber:{:.0}g",
        no_neg_zero(r.calories),
        no_neg_zero(r.protein),
        no_neg_zero(r.carbs),
        no_neg_zero(r.fat),
        no_neg_zero(r.fiber)
    );
    println!();
    print_progress(&summary);

    Ok(())
}

fn print_progress(summary: &DaySummary) {
    let p = summary.progress();
    for (label, ratio) in [
        ("Calories", p.calories),
        ("Protein", p.protein),
        ("Carbs", p.carbs),
        ("Fat", p.fat),
        ("Fiber", p.fiber),
    ] {
        let bar = progress_bar(ratio, BAR_WIDTH);
        let pct = ratio * 100.0;
        println!("  {label:<9}{bar} {pct:>3.0}%");
    }
}

pub(crate) fn cmd_history(svc: &JournalService, days: u32, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct HistoryRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Entries")]
        entries: usize,
        #[tabled(rename = "Calories")]
        calories: String,
        #[tabled(rename = "Protein")]
        protein: String,
        #[tabled(rename = "Carbs")]
        carbs: String,
        #[tabled(rename = "Fat")]
        fat: String,
        #[tabled(rename = "Fiber")]
        fiber: String,
        #[tabled(rename = "Goal")]
        goal: String,
    }

    let today = Local::now().date_naive();
    let summaries = svc.history(today, days, &Local)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if summaries.iter().all(DaySummary::is_empty) {
        eprintln!("No entries in the last {days} days");
        process::exit(2);
    }

    let rows: Vec<HistoryRow> = summaries
        .iter()
        .map(|s| {
            let t = &s.totals;
            let pct = s.progress().calories * 100.0;
            HistoryRow {
                date: s.date.to_string(),
                entries: s.entry_count,
                calories: format!("{:.0}", no_neg_zero(t.calories)),
                protein: format!("{:.0}g", no_neg_zero(t.protein)),
                carbs: format!("{:.0}g", no_neg_zero(t.carbs)),
                fat: format!("{:.0}g", no_neg_zero(t.fat)),
                fiber: format!("{:.0}g", no_neg_zero(t.fiber)),
                goal: format!("{pct:.0}%"),
            }
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}
