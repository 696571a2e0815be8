use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;

use calorie_journal_core::JournalService;

pub(crate) fn cmd_import(
    svc: &JournalService,
    path: &Path,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let file =
        File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;

    let summary = svc.import_csv(file, &Local, dry_run)?;

    if summary.rows_parsed == 0 {
        if json {
            println!(
                "{}",
                serde_json::json!({ "error": "No rows found in CSV file" })
            );
        } else {
            eprintln!("No rows found in CSV file.");
        }
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else if dry_run {
        println!("Dry run — no changes made.\n");
        println!("  Rows parsed:     {}", summary.rows_parsed);
        println!("  Entries to log:  {}", summary.rows_parsed);
        println!("  Dates spanned:   {}", summary.dates_spanned);
    } else {
        println!("Import complete.\n");
        println!("  Rows parsed:     {}", summary.rows_parsed);
        println!("  Entries logged:  {}", summary.entries_created);
        println!("  Dates spanned:   {}", summary.dates_spanned);
    }

    Ok(())
}

pub(crate) fn cmd_export(svc: &JournalService, output: Option<&Path>, json: bool) -> Result<()> {
    let count = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create file: {}", path.display()))?;
            svc.export_csv(BufWriter::new(file))?
        }
        None => svc.export_csv(io::stdout().lock())?,
    };

    if let Some(path) = output {
        if json {
            println!(
                "{}",
                serde_json::json!({ "exported": count, "path": path.display().to_string() })
            );
        } else {
            println!("Exported {count} entries to {}", path.display());
        }
    }

    Ok(())
}
