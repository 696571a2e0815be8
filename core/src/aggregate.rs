//! Day-scoped aggregation of journal entries.
//!
//! Everything here is a pure function of its arguments: the reference day and
//! the time zone used for day boundaries are always supplied by the caller.

use std::collections::BTreeMap;

use chrono::{DateTime, Days, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::models::{DaySummary, Entry, GoalProgress, GoalSet, Meal, Totals};

/// Half-open interval `[start, end)` covering one local calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    pub fn for_day<Tz: TimeZone>(day: NaiveDate, tz: &Tz) -> Self {
        let start = start_of_day(day, tz);
        let end = day
            .checked_add_days(Days::new(1))
            .map_or(DateTime::<Utc>::MAX_UTC, |next| start_of_day(next, tz));
        Self { start, end }
    }

    #[must_use]
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }
}

// Local midnight, or the first valid local instant after it when midnight
// falls into a DST gap.
fn start_of_day<Tz: TimeZone>(day: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let midnight = day.and_time(NaiveTime::MIN);
    (0..=180)
        .find_map(|minutes| {
            tz.from_local_datetime(&(midnight + Duration::minutes(minutes)))
                .earliest()
        })
        .map_or_else(
            || Utc.from_utc_datetime(&midnight),
            |local| local.with_timezone(&Utc),
        )
}

/// Entries stamped inside `day`, in stored order.
pub fn entries_for_day<'a, Tz: TimeZone>(
    entries: &'a [Entry],
    day: NaiveDate,
    tz: &Tz,
) -> Vec<&'a Entry> {
    let window = DayWindow::for_day(day, tz);
    entries.iter().filter(|e| window.contains(e.date)).collect()
}

/// Summarize the entries of one day, grouped by meal, alongside `goals`.
///
/// All four meals are always present in `by_meal`. The overall totals are the
/// sum of the meal subtotals, so grouping never drops or double-counts.
pub fn summarize_day<Tz: TimeZone>(
    entries: &[Entry],
    day: NaiveDate,
    tz: &Tz,
    goals: &GoalSet,
) -> DaySummary {
    let mut by_meal: BTreeMap<Meal, Totals> = Meal::ALL
        .iter()
        .map(|meal| (*meal, Totals::default()))
        .collect();

    let day_entries = entries_for_day(entries, day, tz);
    for entry in &day_entries {
        *by_meal.entry(entry.meal).or_default() += Totals::of(entry);
    }

    let totals = by_meal
        .values()
        .fold(Totals::default(), |acc, subtotal| acc + *subtotal);

    DaySummary {
        date: day,
        totals,
        by_meal,
        goals: *goals,
        entry_count: day_entries.len(),
    }
}

/// One summary per day for `days` days ending at `end_day`, newest first.
pub fn summarize_range<Tz: TimeZone>(
    entries: &[Entry],
    end_day: NaiveDate,
    days: u32,
    tz: &Tz,
    goals: &GoalSet,
) -> Vec<DaySummary> {
    (0..u64::from(days))
        .map_while(|offset| end_day.checked_sub_days(Days::new(offset)))
        .map(|day| summarize_day(entries, day, tz, goals))
        .collect()
}

/// `value / goal` clamped to `[0, 1]`; 0 when the goal is not positive.
#[must_use]
pub fn progress_ratio(value: f64, goal: f64) -> f64 {
    if !value.is_finite() || !goal.is_finite() || goal <= 0.0 {
        return 0.0;
    }
    (value / goal).clamp(0.0, 1.0)
}

impl DaySummary {
    #[must_use]
    pub fn progress(&self) -> GoalProgress {
        GoalProgress {
            calories: progress_ratio(self.totals.calories, self.goals.calories),
            protein: progress_ratio(self.totals.protein, self.goals.protein),
            carbs: progress_ratio(self.totals.carbs, self.goals.carbs),
            fat: progress_ratio(self.totals.fat, self.goals.fat),
            fiber: progress_ratio(self.totals.fiber, self.goals.fiber),
        }
    }

    /// Goal minus consumed, per nutrient. Negative once a goal is exceeded.
    #[must_use]
    pub fn remaining(&self) -> Totals {
        let goal = self.goals.as_totals();
        Totals {
            calories: goal.calories - self.totals.calories,
            protein: goal.protein - self.totals.protein,
            carbs: goal.carbs - self.totals.carbs,
            fat: goal.fat - self.totals.fat,
            fiber: goal.fiber - self.totals.fiber,
        }
    }

    #[must_use]
    pub fn meal_totals(&self, meal: Meal) -> Totals {
        self.by_meal.get(&meal).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Nutrients;
    use chrono::FixedOffset;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn entry(id: &str, date: DateTime<Utc>, meal: Meal, calories: f64) -> Entry {
        Entry {
            id: id.to_string(),
            date,
            name: format!("food {id}"),
            meal,
            nutrients: Nutrients {
                calories,
                protein: calories / 10.0,
                carbs: calories / 5.0,
                fat: calories / 20.0,
                fiber: 1.0,
                sugar: 3.0,
                sodium: 100.0,
            },
            notes: None,
        }
    }

    fn sum_of_meals(summary: &DaySummary) -> Totals {
        summary
            .by_meal
            .values()
            .fold(Totals::default(), |acc, t| acc + *t)
    }

    #[test]
    fn test_scenario_breakfast_lunch_and_yesterday_snack() {
        let today = day(2024, 5, 10);
        let entries = vec![
            entry("1", at(2024, 5, 10, 8, 0), Meal::Breakfast, 500.0),
            entry("2", at(2024, 5, 10, 12, 30), Meal::Lunch, 300.0),
            entry("3", at(2024, 5, 9, 16, 0), Meal::Snack, 200.0),
        ];
        let goals = GoalSet {
            calories: 1000.0,
            ..GoalSet::default()
        };

        let summary = summarize_day(&entries, today, &Utc, &goals);

        assert!((summary.totals.calories - 800.0).abs() < 1e-9);
        assert!((summary.meal_totals(Meal::Breakfast).calories - 500.0).abs() < 1e-9);
        assert!((summary.meal_totals(Meal::Lunch).calories - 300.0).abs() < 1e-9);
        assert_eq!(summary.meal_totals(Meal::Snack).calories, 0.0);
        assert_eq!(summary.meal_totals(Meal::Dinner).calories, 0.0);
        assert_eq!(summary.entry_count, 2);
        assert_eq!(summary.goals, goals);
        assert!((progress_ratio(summary.totals.calories, goals.calories) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_empty_entries_give_zero_summary() {
        let summary = summarize_day(&[], day(2024, 5, 10), &Utc, &GoalSet::default());
        assert!(summary.totals.is_zero());
        assert_eq!(summary.by_meal.len(), 4);
        assert!(summary.by_meal.values().all(Totals::is_zero));
        assert!(summary.is_empty());
    }

    #[test]
    fn test_all_meals_present_in_display_order() {
        let summary = summarize_day(&[], day(2024, 5, 10), &Utc, &GoalSet::default());
        let meals: Vec<Meal> = summary.by_meal.keys().copied().collect();
        assert_eq!(meals, Meal::ALL.to_vec());
    }

    #[test]
    fn test_totals_equal_sum_of_meal_groups() {
        let entries = vec![
            entry("1", at(2024, 5, 10, 7, 0), Meal::Breakfast, 410.5),
            entry("2", at(2024, 5, 10, 7, 5), Meal::Breakfast, 90.25),
            entry("3", at(2024, 5, 10, 13, 0), Meal::Lunch, 655.0),
            entry("4", at(2024, 5, 10, 19, 0), Meal::Dinner, 720.0),
            entry("5", at(2024, 5, 10, 21, 0), Meal::Snack, 150.75),
            entry("6", at(2024, 5, 11, 1, 0), Meal::Snack, 999.0),
        ];
        let summary = summarize_day(&entries, day(2024, 5, 10), &Utc, &GoalSet::default());
        assert_eq!(summary.totals, sum_of_meals(&summary));
        assert_eq!(summary.entry_count, 5);
        assert!((summary.totals.fiber - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_summary_is_order_independent_and_idempotent() {
        let mut entries = vec![
            entry("1", at(2024, 5, 10, 7, 0), Meal::Breakfast, 400.0),
            entry("2", at(2024, 5, 10, 13, 0), Meal::Lunch, 600.0),
            entry("3", at(2024, 5, 10, 19, 0), Meal::Dinner, 800.0),
        ];
        let goals = GoalSet::default();
        let first = summarize_day(&entries, day(2024, 5, 10), &Utc, &goals);
        let second = summarize_day(&entries, day(2024, 5, 10), &Utc, &goals);
        assert_eq!(first, second);

        entries.reverse();
        let reversed = summarize_day(&entries, day(2024, 5, 10), &Utc, &goals);
        assert_eq!(first, reversed);
    }

    #[test]
    fn test_other_days_are_excluded() {
        let entries = vec![
            entry("1", at(2024, 5, 9, 23, 59), Meal::Dinner, 100.0),
            entry("2", at(2024, 5, 11, 0, 0), Meal::Breakfast, 100.0),
        ];
        let summary = summarize_day(&entries, day(2024, 5, 10), &Utc, &GoalSet::default());
        assert!(summary.totals.is_zero());
        assert!(summary.by_meal.values().all(Totals::is_zero));
    }

    #[test]
    fn test_midnight_entry_belongs_to_its_day() {
        let entries = vec![entry("1", at(2024, 5, 10, 0, 0), Meal::Snack, 120.0)];
        let summary = summarize_day(&entries, day(2024, 5, 10), &Utc, &GoalSet::default());
        assert!((summary.totals.calories - 120.0).abs() < 1e-9);

        let previous = summarize_day(&entries, day(2024, 5, 9), &Utc, &GoalSet::default());
        assert!(previous.totals.is_zero());
    }

    #[test]
    fn test_day_boundaries_follow_time_zone() {
        // 23:30 UTC on the 9th is 01:30 on the 10th at UTC+2.
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let entries = vec![entry("1", at(2024, 5, 9, 23, 30), Meal::Lunch, 250.0)];

        let local_10th = summarize_day(&entries, day(2024, 5, 10), &tz, &GoalSet::default());
        assert!((local_10th.totals.calories - 250.0).abs() < 1e-9);

        let utc_10th = summarize_day(&entries, day(2024, 5, 10), &Utc, &GoalSet::default());
        assert!(utc_10th.totals.is_zero());
    }

    #[test]
    fn test_day_window_bounds() {
        let tz = FixedOffset::west_opt(5 * 3600).unwrap();
        let window = DayWindow::for_day(day(2024, 1, 15), &tz);
        assert_eq!(window.start, at(2024, 1, 15, 5, 0));
        assert_eq!(window.end, at(2024, 1, 16, 5, 0));
        assert!(window.contains(window.start));
        assert!(!window.contains(window.end));
    }

    #[test]
    fn test_day_window_skips_dst_gap_at_midnight() {
        // Sao Paulo sprang forward at local midnight on 2018-11-04.
        let tz = chrono_tz::America::Sao_Paulo;
        let gap_day = DayWindow::for_day(day(2018, 11, 4), &tz);
        let prev = DayWindow::for_day(day(2018, 11, 3), &tz);

        assert_eq!(gap_day.start, at(2018, 11, 4, 3, 0));
        assert_eq!(gap_day.end, at(2018, 11, 5, 2, 0));
        assert_eq!(prev.end, gap_day.start);

        let entries = vec![
            entry("late", at(2018, 11, 4, 2, 59), Meal::Snack, 100.0),
            entry("first", at(2018, 11, 4, 3, 0), Meal::Breakfast, 300.0),
        ];
        let summary = summarize_day(&entries, day(2018, 11, 4), &tz, &GoalSet::default());
        assert_eq!(summary.entry_count, 1);
        assert!((summary.totals.calories - 300.0).abs() < 1e-9);
        assert_eq!(entries_for_day(&entries, day(2018, 11, 3), &tz)[0].id, "late");
    }

    #[test]
    fn test_day_window_at_max_date() {
        let window = DayWindow::for_day(NaiveDate::MAX, &Utc);
        assert_eq!(window.end, DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_progress_ratio() {
        assert!((progress_ratio(50.0, 100.0) - 0.5).abs() < f64::EPSILON);
        assert!((progress_ratio(150.0, 100.0) - 1.0).abs() < f64::EPSILON);
        assert_eq!(progress_ratio(10.0, 0.0), 0.0);
        assert_eq!(progress_ratio(10.0, -5.0), 0.0);
        assert_eq!(progress_ratio(-10.0, 100.0), 0.0);
        assert_eq!(progress_ratio(f64::NAN, 100.0), 0.0);
        assert_eq!(progress_ratio(10.0, f64::INFINITY), 0.0);
    }

    #[test]
    fn test_progress_and_remaining() {
        let entries = vec![entry("1", at(2024, 5, 10, 12, 0), Meal::Lunch, 1500.0)];
        let goals = GoalSet {
            calories: 1000.0,
            protein: 300.0,
            carbs: 0.0,
            fat: 150.0,
            fiber: 4.0,
        };
        let summary = summarize_day(&entries, day(2024, 5, 10), &Utc, &goals);
        let progress = summary.progress();
        assert!((progress.calories - 1.0).abs() < f64::EPSILON);
        assert!((progress.protein - 0.5).abs() < f64::EPSILON);
        assert_eq!(progress.carbs, 0.0);
        assert!((progress.fat - 0.5).abs() < f64::EPSILON);
        assert!((progress.fiber - 0.25).abs() < f64::EPSILON);

        let remaining = summary.remaining();
        assert!((remaining.calories + 500.0).abs() < 1e-9);
        assert!((remaining.protein - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_summarize_range_newest_first() {
        let entries = vec![
            entry("1", at(2024, 5, 10, 12, 0), Meal::Lunch, 500.0),
            entry("2", at(2024, 5, 8, 12, 0), Meal::Lunch, 300.0),
        ];
        let summaries =
            summarize_range(&entries, day(2024, 5, 10), 3, &Utc, &GoalSet::default());
        let dates: Vec<NaiveDate> = summaries.iter().map(|s| s.date).collect();
        assert_eq!(dates, vec![day(2024, 5, 10), day(2024, 5, 9), day(2024, 5, 8)]);
        assert!((summaries[0].totals.calories - 500.0).abs() < 1e-9);
        assert!(summaries[1].totals.is_zero());
        assert!((summaries[2].totals.calories - 300.0).abs() < 1e-9);

        assert!(
            summarize_range(&entries, day(2024, 5, 10), 0, &Utc, &GoalSet::default()).is_empty()
        );
    }

    #[test]
    fn test_entries_for_day_keeps_stored_order() {
        let entries = vec![
            entry("b", at(2024, 5, 10, 18, 0), Meal::Dinner, 1.0),
            entry("x", at(2024, 5, 11, 18, 0), Meal::Dinner, 1.0),
            entry("a", at(2024, 5, 10, 8, 0), Meal::Breakfast, 1.0),
        ];
        let ids: Vec<&str> = entries_for_day(&entries, day(2024, 5, 10), &Utc)
            .iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }
}
