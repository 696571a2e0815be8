mod goal;
mod helpers;
mod import;
mod log;
mod meal;
mod summary;

pub(crate) use goal::{GoalFlags, cmd_goal_reset, cmd_goal_set, cmd_goal_show};
pub(crate) use import::{cmd_export, cmd_import};
pub(crate) use log::{LogRequest, NutrientFlags, cmd_log};
pub(crate) use meal::{cmd_delete, cmd_list, cmd_repair};
pub(crate) use summary::{cmd_history, cmd_summary};
