use anyhow::{Context, Result};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use recordsync_core::modules::config::SyncConfig;
use recordsync_core::modules::watermark::{FileWatermarkStore, WatermarkStore};
use recordsync_core::{CycleReport, Engine};

use crate::cli::WatermarkCommands;

pub async fn handle_run(config: &SyncConfig, mapping: Option<&str>, json: bool) -> Result<()> {
    let engine = Engine::from_config(config).await.context("failed to start engine")?;
    let reports = engine.run_once(mapping).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    print_reports(&reports);
    let errors: usize = reports.iter().map(|r| r.errors).sum();
    if errors > 0 {
        println!("\n{} {} record errors, see the log for details", "!".yellow(), errors);
    }
    Ok(())
}

fn print_reports(reports: &[CycleReport]) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "Mapping",
        "Created local",
        "Created remote",
        "Updated local",
        "Updated remote",
        "Skipped",
        "Errors",
        "Duration",
    ]);

    for report in reports {
        let errors = if report.errors > 0 {
            Cell::new(report.errors).fg(Color::Red)
        } else {
            Cell::new(0).fg(Color::Green)
        };
        table.add_row(vec![
            Cell::new(&report.mapping),
            Cell::new(report.created_local),
            Cell::new(report.created_remote),
            Cell::new(report.updated_local),
            Cell::new(report.updated_remote),
            Cell::new(report.skipped),
            errors,
            Cell::new(format!("{}ms", report.duration_ms)),
        ]);
    }

    println!("{table}");
}

pub fn handle_mappings(config: &SyncConfig, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&config.mappings)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Name", "Local table", "Remote object", "Fields", "Strategy"]);

    for mapping in &config.mappings {
        let fields = mapping
            .fields
            .iter()
            .map(|f| format!("{} -> {}", f.local, f.remote))
            .collect::<Vec<_>>()
            .join("\n");
        table.add_row(vec![
            Cell::new(&mapping.name),
            Cell::new(&mapping.local_table),
            Cell::new(&mapping.remote_object),
            Cell::new(fields),
            Cell::new(mapping.strategy.build().name()),
        ]);
    }

    println!("{table}");
    println!("\n{} mappings total", config.mappings.len());
    Ok(())
}

pub async fn handle_watermark_command(config: &SyncConfig, cmd: WatermarkCommands) -> Result<()> {
    let store = FileWatermarkStore::new(config.watermark_path()?);

    match cmd {
        WatermarkCommands::Show { json } => {
            let marks = store.all().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&marks)?);
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Mapping", "Last run"]);
            for mapping in &config.mappings {
                let last_run = match marks.get(&mapping.name) {
                    Some(at) => Cell::new(at.to_rfc3339()),
                    None => Cell::new("never").fg(Color::Yellow),
                };
                table.add_row(vec![Cell::new(&mapping.name), last_run]);
            }
            println!("{table}");
            Ok(())
        },
        WatermarkCommands::Reset { mapping: Some(mapping) } => {
            if config.mapping(&mapping).is_none() {
                anyhow::bail!("Unknown mapping: {}", mapping);
            }
            reset_watermark(&store, &mapping).await
        },
        WatermarkCommands::Reset { mapping: None } => {
            for mapping in &config.mappings {
                reset_watermark(&store, &mapping.name).await?;
            }
            Ok(())
        },
    }
}

async fn reset_watermark(store: &FileWatermarkStore, mapping: &str) -> Result<()> {
    if store.reset(mapping).await? {
        println!("{} Watermark for {} cleared", "✓".green(), mapping);
    } else {
        println!("{}", format!("No watermark stored for {}", mapping).yellow());
    }
    Ok(())
}
