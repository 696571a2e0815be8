use anyhow::Result;
use clap::Args;

use calorie_journal_core::JournalService;
use calorie_journal_core::models::GoalSet;

/// Goal fields to change; anything left out keeps its current value.
#[derive(Args, Debug, Default)]
pub(crate) struct GoalFlags {
    /// Daily calories (kcal)
    #[arg(long)]
    pub calories: Option<f64>,
    /// Daily protein (g)
    #[arg(long)]
    pub protein: Option<f64>,
    /// Daily carbohydrates (g)
    #[arg(long)]
    pub carbs: Option<f64>,
    /// Daily fat (g)
    #[arg(long)]
    pub fat: Option<f64>,
    /// Daily fiber (g)
    #[arg(long)]
    pub fiber: Option<f64>,
}

impl GoalFlags {
    fn is_empty(&self) -> bool {
        self.calories.is_none()
            && self.protein.is_none()
            && self.carbs.is_none()
            && self.fat.is_none()
            && self.fiber.is_none()
    }

    pub(crate) fn apply(&self, current: GoalSet) -> GoalSet {
        GoalSet {
            calories: self.calories.unwrap_or(current.calories),
            protein: self.protein.unwrap_or(current.protein),
            carbs: self.carbs.unwrap_or(current.carbs),
            fat: self.fat.unwrap_or(current.fat),
            fiber: self.fiber.unwrap_or(current.fiber),
        }
    }
}

fn print_goals(goals: &GoalSet) {
    println!("  Calories: {:.0} kcal", goals.calories);
    println!("  Protein:  {:.0} g", goals.protein);
    println!("  Carbs:    {:.0} g", goals.carbs);
    println!("  Fat:      {:.0} g", goals.fat);
    println!("  Fiber:    {:.0} g", goals.fiber);
}

pub(crate) fn cmd_goal_show(svc: &JournalService, json: bool) -> Result<()> {
    let goals = svc.goals()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&goals)?);
    } else {
        println!("Daily goals:");
        print_goals(&goals);
    }
    Ok(())
}

pub(crate) fn cmd_goal_set(svc: &JournalService, flags: &GoalFlags, json: bool) -> Result<()> {
    if flags.is_empty() {
        anyhow::bail!(
            "Nothing to update. Provide at least one of --calories, --protein, --carbs, --fat, --fiber"
        );
    }
    let goals = svc.set_goals(flags.apply(svc.goals()?))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&goals)?);
    } else {
        println!("Goals updated:");
        print_goals(&goals);
    }
    Ok(())
}

pub(crate) fn cmd_goal_reset(svc: &JournalService, json: bool) -> Result<()> {
    let cleared = svc.reset_goals()?;
    if json {
        println!("{}", serde_json::json!({ "reset": cleared }));
    } else if cleared {
        println!("Goals reset to defaults");
    } else {
        eprintln!("No custom goals were set");
    }
    Ok(())
}
