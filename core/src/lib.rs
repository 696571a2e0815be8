//! Core library for the calorie journal: entry and goal models, JSON
//! document storage, and day-scoped nutrition aggregation.

pub mod aggregate;
pub mod csv_io;
pub mod models;
pub mod service;
pub mod store;

pub use aggregate::{DayWindow, progress_ratio, summarize_day, summarize_range};
pub use models::{
    DaySummary, Entry, GoalProgress, GoalSet, Meal, MealRow, Nutrients, Submission, Totals,
};
pub use service::JournalService;
pub use store::RepairReport;
