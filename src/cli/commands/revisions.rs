//! Revisions command - list the revisions of a recipe or package

use super::open_store;
use crate::cli::args::{OutputFormat, RevisionsArgs};
use crate::config::Config;
use crate::error::StoreResult;
use crate::ledger::RevisionRecord;
use crate::reference::AnyRef;
use crate::ui::{self, UiContext};
use console::style;

/// Execute the revisions command
pub fn execute(args: RevisionsArgs, config: &Config) -> StoreResult<()> {
    let reference = AnyRef::parse(&args.reference)?;
    let store = open_store(config)?;

    let records = match &reference {
        AnyRef::Recipe(recipe) => store.list_revisions(recipe)?,
        AnyRef::Package(pref) => store.list_package_revisions(pref)?,
    };

    if records.is_empty() {
        match args.format {
            OutputFormat::Json => println!("[]"),
            OutputFormat::Plain => {}
            OutputFormat::Table => {
                let ctx = UiContext::detect();
                ui::step_info(&ctx, &format!("No revisions of {}", reference));
            }
        }
        return Ok(());
    }

    match args.format {
        OutputFormat::Table => print_table(&reference, &records),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        OutputFormat::Plain => {
            for record in &records {
                println!("{}", record.revision_id);
            }
        }
    }

    Ok(())
}

fn print_table(reference: &AnyRef, records: &[RevisionRecord]) {
    let ctx = UiContext::detect();
    ui::section(&ctx, &reference.to_string());

    println!(
        "{:<34} {:<20}",
        style("REVISION").bold(),
        style("CREATED").bold()
    );
    println!("{}", "-".repeat(54));

    for (index, record) in records.iter().enumerate() {
        let created = record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string();
        if index == 0 {
            println!(
                "{:<34} {:<20} {}",
                record.revision_id,
                created,
                style("(latest)").green()
            );
        } else {
            println!("{:<34} {:<20}", record.revision_id, created);
        }
    }

    println!();
    println!("{} revision(s)", records.len());
}
