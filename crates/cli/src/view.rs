//! Terminal rendering of a check [`Report`].

use chrono::Local;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};

use iconsync_core::Report;

use crate::style;

pub fn print_report(report: &Report, verbose: bool) {
    println!("{}", style::header("Icon Sync Report"));
    println!(
        "{}",
        style::dim(&format!(
            "{} dev icons, {} design icons, {} skipped dirs ({})",
            report.dev_icons,
            report.design_icons,
            report.skipped_dirs,
            report
                .generated_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
        ))
    );
    println!();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Category", "Icons"]);
    for c in &report.categories {
        table.add_row(vec![
            Cell::new(c.category.to_string()),
            Cell::new(style::count(c.count, c.category.is_divergent())),
        ]);
    }
    println!("{table}");

    for c in &report.categories {
        if c.paths.is_empty() || (!verbose && !c.category.is_divergent()) {
            continue;
        }
        println!();
        println!("{}", style::header(&format!("{} ({})", c.category, c.count)));
        for path in &c.paths {
            println!("  {path}");
        }
    }

    if report.sync_requested {
        println!();
        if report.sync_failed {
            println!("{}", style::error("Sync completed with errors"));
            for e in &report.sync_errors {
                println!("  - {e}");
            }
        } else {
            println!("{}", style::success("Design repository updated"));
        }
    } else if !report.has_divergence() {
        println!();
        println!("{}", style::success("Icons are in sync"));
    }
}
