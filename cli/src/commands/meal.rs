use anyhow::{Result, bail};
use chrono::Local;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use calorie_journal_core::JournalService;
use calorie_journal_core::models::Entry;

use super::helpers::{json_error, parse_date, short_id, truncate};

/// Resolve a full id or a unique id prefix (as shown by `list`) to a stored id.
pub(crate) fn resolve_entry_id(entries: &[Entry], query: &str) -> Result<Option<String>> {
    let query = query.trim();
    if query.is_empty() {
        bail!("Entry id must not be empty");
    }
    if let Some(exact) = entries.iter().find(|e| e.id == query) {
        return Ok(Some(exact.id.clone()));
    }
    let matches: Vec<&Entry> = entries.iter().filter(|e| e.id.starts_with(query)).collect();
    match matches.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some(only.id.clone())),
        _ => bail!(
            "Id prefix '{query}' matches {} entries; use more characters",
            matches.len()
        ),
    }
}

pub(crate) fn cmd_delete(svc: &JournalService, entry_id: &str, json: bool) -> Result<()> {
    let entries = svc.list_entries()?;
    let resolved = resolve_entry_id(&entries, entry_id)?;

    if let Some(id) = resolved {
        if svc.delete_entry(&id)? {
            if json {
                println!("{}", serde_json::json!({ "deleted": id }));
            } else {
                println!("Deleted entry {id}");
            }
            return Ok(());
        }
    }

    if json {
        println!("{}", json_error(&format!("Entry {entry_id} not found")));
    } else {
        eprintln!("Entry {entry_id} not found");
    }
    process::exit(2);
}

pub(crate) fn cmd_repair(svc: &JournalService, force: bool, json: bool) -> Result<()> {
    let report = svc.repair_entries(force)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.reset {
        println!("Entry list was unreadable; moved it aside and started an empty journal");
    } else if report.discarded == 0 {
        println!("Nothing to repair ({} entries)", report.kept);
    } else {
        println!(
            "Moved {} unreadable record(s) aside, kept {} entries",
            report.discarded, report.kept
        );
    }
    Ok(())
}

pub(crate) fn cmd_list(svc: &JournalService, date: Option<String>, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct EntryRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Logged")]
        logged: String,
        #[tabled(rename = "Meal")]
        meal: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Cal")]
        calories: String,
        #[tabled(rename = "P")]
        protein: String,
        #[tabled(rename = "C")]
        carbs: String,
        #[tabled(rename = "F")]
        fat: String,
        #[tabled(rename = "Fiber")]
        fiber: String,
    }

    let entries = match date {
        Some(d) => {
            let day = parse_date(Some(d))?;
            svc.entries_for_day(day, &Local)?
        }
        None => svc.list_entries()?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        eprintln!("No entries found");
        process::exit(2);
    }

    let rows: Vec<EntryRow> = entries
        .iter()
        .map(|e| {
            let n = &e.nutrients;
            EntryRow {
                id: short_id(&e.id).to_string(),
                logged: e
                    .date
                    .with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M")
                    .to_string(),
                meal: e.meal.to_string(),
                name: truncate(&e.name, 30),
                calories: format!("{:.0}", n.calories),
                protein: format!("{:.1}", n.protein),
                carbs: format!("{:.1}", n.carbs),
                fat: format!("{:.1}", n.fat),
                fiber: format!("{:.1}", n.fiber),
            }
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(4..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use calorie_journal_core::models::{Meal, Nutrients};
    use chrono::Utc;

    fn entry(id: &str) -> Entry {
        Entry {
            id: id.to_string(),
            date: Utc::now(),
            name: "x".to_string(),
            meal: Meal::Snack,
            nutrients: Nutrients::default(),
            notes: None,
        }
    }

    #[test]
    fn test_resolve_entry_id_exact_and_prefix() {
        let entries = vec![entry("abc123"), entry("abd456"), entry("ab")];
        assert_eq!(
            resolve_entry_id(&entries, "ab").unwrap().as_deref(),
            Some("ab")
        );
        assert_eq!(
            resolve_entry_id(&entries, "abc").unwrap().as_deref(),
            Some("abc123")
        );
        assert!(resolve_entry_id(&entries, "zzz").unwrap().is_none());
    }

    #[test]
    fn test_resolve_entry_id_ambiguous_or_empty() {
        let entries = vec![entry("abc123"), entry("abd456")];
        assert!(resolve_entry_id(&entries, "a").is_err());
        assert!(resolve_entry_id(&entries, "  ").is_err());
    }
}
