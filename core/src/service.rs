use std::io::{Read, Write};
use std::path::Path;

use anyhow::Result;
use chrono::{NaiveDate, TimeZone};
use tracing::info;
use uuid::Uuid;

use crate::aggregate::{self, summarize_day, summarize_range};
use crate::csv_io::{self, ImportSummary};
use crate::models::{DaySummary, Entry, GoalSet, Submission, validate_submission};
use crate::store::{
    EntryStore, GoalStore, KeyValueStore, MemoryStore, RepairReport, SqliteStore,
};

/// Facade over one storage backend, used by the front ends.
pub struct JournalService<S: KeyValueStore = SqliteStore> {
    store: S,
}

impl JournalService<SqliteStore> {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::with_store(SqliteStore::open(path)?))
    }
}

impl JournalService<MemoryStore> {
    #[must_use]
    pub fn new_in_memory() -> Self {
        Self::with_store(MemoryStore::new())
    }
}

impl<S: KeyValueStore> JournalService<S> {
    pub fn with_store(store: S) -> Self {
        Self { store }
    }

    fn entries(&self) -> EntryStore<'_, S> {
        EntryStore::new(&self.store)
    }

    fn goal_store(&self) -> GoalStore<'_, S> {
        GoalStore::new(&self.store)
    }

    // --- Entries ---

    /// Validate a submission and store one entry per filled meal row.
    pub fn add_submission(&self, submission: &Submission) -> Result<Vec<Entry>> {
        validate_submission(submission)?;

        let name = submission.name.trim().to_string();
        let notes = submission
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        let created: Vec<Entry> = submission
            .filled_rows()
            .map(|row| Entry {
                id: Uuid::new_v4().to_string(),
                date: submission.date,
                name: name.clone(),
                meal: row.meal,
                nutrients: row.nutrients.sanitized(),
                notes: notes.clone(),
            })
            .collect();

        self.entries().prepend(created.clone())?;
        info!(count = created.len(), name = %name, "logged entries");
        Ok(created)
    }

    pub fn delete_entry(&self, id: &str) -> Result<bool> {
        self.entries().delete(id)
    }

    pub fn get_entry(&self, id: &str) -> Result<Option<Entry>> {
        self.entries().get(id)
    }

    /// Move unreadable stored records aside; see [`EntryStore::repair`].
    pub fn repair_entries(&self, force: bool) -> Result<RepairReport> {
        self.entries().repair(force)
    }

    /// Every stored entry, newest first.
    pub fn list_entries(&self) -> Result<Vec<Entry>> {
        self.entries().load()
    }

    pub fn entries_for_day<Tz: TimeZone>(&self, day: NaiveDate, tz: &Tz) -> Result<Vec<Entry>> {
        let entries = self.entries().load()?;
        Ok(aggregate::entries_for_day(&entries, day, tz)
            .into_iter()
            .cloned()
            .collect())
    }

    // --- Summaries ---

    pub fn day_summary<Tz: TimeZone>(&self, day: NaiveDate, tz: &Tz) -> Result<DaySummary> {
        let entries = self.entries().load()?;
        let goals = self.goal_store().load()?;
        Ok(summarize_day(&entries, day, tz, &goals))
    }

    pub fn history<Tz: TimeZone>(
        &self,
        end_day: NaiveDate,
        days: u32,
        tz: &Tz,
    ) -> Result<Vec<DaySummary>> {
        let entries = self.entries().load()?;
        let goals = self.goal_store().load()?;
        Ok(summarize_range(&entries, end_day, days, tz, &goals))
    }

    // --- Goals ---

    pub fn goals(&self) -> Result<GoalSet> {
        self.goal_store().load()
    }

    pub fn set_goals(&self, goals: GoalSet) -> Result<GoalSet> {
        goals.validate()?;
        self.goal_store().save(&goals)?;
        Ok(goals)
    }

    /// Forget custom goals; returns whether any were stored.
    pub fn reset_goals(&self) -> Result<bool> {
        self.goal_store().reset()
    }

    // --- CSV ---

    pub fn export_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let entries = self.entries().load_strict()?;
        csv_io::write_entries_csv(writer, &entries)?;
        Ok(entries.len())
    }

    /// Import a diary CSV. With `dry_run` nothing is written.
    pub fn import_csv<R: Read, Tz: TimeZone>(
        &self,
        reader: R,
        tz: &Tz,
        dry_run: bool,
    ) -> Result<ImportSummary> {
        let rows = csv_io::parse_journal_csv(reader)?;
        let summary = ImportSummary::for_rows(&rows, dry_run);
        if dry_run || rows.is_empty() {
            return Ok(summary);
        }

        let mut imported: Vec<Entry> = rows.into_iter().map(|r| r.into_entry(tz)).collect();
        // Newest first, matching the order interactive logging produces.
        imported.sort_by(|a, b| b.date.cmp(&a.date));
        self.entries().prepend(imported)?;
        info!(
            rows = summary.rows_parsed,
            dates = summary.dates_spanned,
            "imported CSV"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Meal, MealRow, Nutrients};
    use chrono::Utc;

    fn row(meal: Meal, calories: f64) -> MealRow {
        MealRow {
            meal,
            nutrients: Nutrients {
                calories,
                protein: 10.0,
                ..Nutrients::default()
            },
        }
    }

    fn submission(name: &str, rows: Vec<MealRow>) -> Submission {
        Submission {
            name: name.to_string(),
            notes: Some("  ".to_string()),
            date: Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
            rows,
        }
    }

    fn june(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[test]
    fn test_add_submission_creates_entry_per_filled_row() {
        let svc = JournalService::new_in_memory();
        let created = svc
            .add_submission(&submission(
                " Pancakes ",
                vec![
                    row(Meal::Breakfast, 450.0),
                    MealRow::default(),
                    row(Meal::Snack, 120.0),
                ],
            ))
            .unwrap();

        assert_eq!(created.len(), 2);
        assert_eq!(created[0].name, "Pancakes");
        assert_eq!(created[0].meal, Meal::Breakfast);
        assert_eq!(created[1].meal, Meal::Snack);
        assert!(created[0].notes.is_none());
        assert_ne!(created[0].id, created[1].id);

        let stored = svc.list_entries().unwrap();
        assert_eq!(stored, created);
    }

    #[test]
    fn test_add_submission_rejects_invalid() {
        let svc = JournalService::new_in_memory();
        assert!(svc.add_submission(&submission("", vec![row(Meal::Lunch, 1.0)])).is_err());
        assert!(svc.add_submission(&submission("Water", vec![MealRow::default()])).is_err());
        assert!(svc.list_entries().unwrap().is_empty());
    }

    #[test]
    fn test_add_submission_sanitizes_values() {
        let svc = JournalService::new_in_memory();
        let mut bad = row(Meal::Dinner, 300.0);
        bad.nutrients.fat = -8.0;
        bad.nutrients.sugar = f64::NAN;
        let created = svc.add_submission(&submission("Stew", vec![bad])).unwrap();
        assert_eq!(created[0].nutrients.fat, 0.0);
        assert_eq!(created[0].nutrients.sugar, 0.0);
    }

    #[test]
    fn test_newest_submission_listed_first() {
        let svc = JournalService::new_in_memory();
        svc.add_submission(&submission("First", vec![row(Meal::Lunch, 100.0)]))
            .unwrap();
        svc.add_submission(&submission("Second", vec![row(Meal::Lunch, 200.0)]))
            .unwrap();
        let names: Vec<String> = svc
            .list_entries()
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["Second", "First"]);
    }

    #[test]
    fn test_delete_and_get_entry() {
        let svc = JournalService::new_in_memory();
        let created = svc
            .add_submission(&submission("Bagel", vec![row(Meal::Breakfast, 250.0)]))
            .unwrap();
        let id = &created[0].id;

        assert!(svc.get_entry(id).unwrap().is_some());
        assert!(svc.delete_entry(id).unwrap());
        assert!(!svc.delete_entry(id).unwrap());
        assert!(svc.get_entry(id).unwrap().is_none());
    }

    #[test]
    fn test_day_summary_uses_stored_goals() {
        let svc = JournalService::new_in_memory();
        svc.add_submission(&submission(
            "Lunch plate",
            vec![row(Meal::Lunch, 600.0), row(Meal::Dinner, 400.0)],
        ))
        .unwrap();
        svc.set_goals(GoalSet {
            calories: 2000.0,
            ..GoalSet::default()
        })
        .unwrap();

        let summary = svc.day_summary(june(1), &Utc).unwrap();
        assert!((summary.totals.calories - 1000.0).abs() < 1e-9);
        assert!((summary.totals.protein - 20.0).abs() < 1e-9);
        assert!((summary.meal_totals(Meal::Lunch).calories - 600.0).abs() < 1e-9);
        assert!((summary.progress().calories - 0.5).abs() < 1e-9);

        assert!(svc.day_summary(june(2), &Utc).unwrap().is_empty());
    }

    #[test]
    fn test_history_and_entries_for_day() {
        let svc = JournalService::new_in_memory();
        svc.add_submission(&submission("Eggs", vec![row(Meal::Breakfast, 300.0)]))
            .unwrap();

        let history = svc.history(june(3), 3, &Utc).unwrap();
        assert_eq!(history.len(), 3);
        assert!(history[0].is_empty());
        assert!(history[1].is_empty());
        assert_eq!(history[2].entry_count, 1);

        assert_eq!(svc.entries_for_day(june(1), &Utc).unwrap().len(), 1);
        assert!(svc.entries_for_day(june(2), &Utc).unwrap().is_empty());
    }

    #[test]
    fn test_goals_set_validate_and_reset() {
        let svc = JournalService::new_in_memory();
        assert_eq!(svc.goals().unwrap(), GoalSet::default());

        let invalid = GoalSet {
            protein: -1.0,
            ..GoalSet::default()
        };
        assert!(svc.set_goals(invalid).is_err());
        assert_eq!(svc.goals().unwrap(), GoalSet::default());

        let custom = GoalSet {
            calories: 2400.0,
            ..GoalSet::default()
        };
        svc.set_goals(custom).unwrap();
        assert_eq!(svc.goals().unwrap(), custom);
        assert!(svc.reset_goals().unwrap());
        assert_eq!(svc.goals().unwrap(), GoalSet::default());
    }

    #[test]
    fn test_import_then_export_csv() {
        let csv = "\
Date,Meal,Food Name,Calories,Protein (g)
2024-06-01,Breakfast,Porridge,220,7
2024-06-02,Dinner,Curry,640,25
";
        let svc = JournalService::new_in_memory();

        let preview = svc.import_csv(csv.as_bytes(), &Utc, true).unwrap();
        assert_eq!(preview.rows_parsed, 2);
        assert_eq!(preview.entries_created, 0);
        assert!(svc.list_entries().unwrap().is_empty());

        let summary = svc.import_csv(csv.as_bytes(), &Utc, false).unwrap();
        assert_eq!(summary.entries_created, 2);
        assert_eq!(summary.dates_spanned, 2);

        let entries = svc.list_entries().unwrap();
        assert_eq!(entries[0].name, "Curry");
        assert_eq!(entries[1].name, "Porridge");

        let day = svc.day_summary(june(2), &Utc).unwrap();
        assert!((day.meal_totals(Meal::Dinner).calories - 640.0).abs() < 1e-9);

        let mut out = Vec::new();
        assert_eq!(svc.export_csv(&mut out).unwrap(), 2);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.contains("Curry"));
    }

    #[test]
    fn test_unreadable_record_does_not_hide_or_block_journal() {
        use crate::models::ENTRIES_KEY;

        let store = MemoryStore::new();
        store
            .set(
                ENTRIES_KEY,
                r#"[{"id":"a","date":"2024-06-01T10:00:00Z","calories":500},{"id":"b","date":"garbage"}]"#,
            )
            .unwrap();
        let svc = JournalService::with_store(store);

        let summary = svc.day_summary(june(1), &Utc).unwrap();
        assert!((summary.totals.calories - 500.0).abs() < 1e-9);

        svc.add_submission(&submission("Toast", vec![row(Meal::Breakfast, 90.0)]))
            .unwrap();
        assert_eq!(svc.list_entries().unwrap().len(), 2);

        let report = svc.repair_entries(false).unwrap();
        assert_eq!(report.kept, 2);
        assert_eq!(report.discarded, 1);
    }

    #[test]
    fn test_open_file_backed_service() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.db");
        {
            let svc = JournalService::open(&path).unwrap();
            svc.add_submission(&submission("Toast", vec![row(Meal::Breakfast, 90.0)]))
                .unwrap();
        }
        let svc = JournalService::open(&path).unwrap();
        assert_eq!(svc.list_entries().unwrap().len(), 1);
    }
}
