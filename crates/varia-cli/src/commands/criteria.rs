//! Implementation of the `varia criteria` command.

use serde::Serialize;

use varia_core::domain::{CRITERIA_REGISTRY, CriteriaDef};

use crate::{
    cli::{CriteriaArgs, ListFormat},
    error::CliResult,
    output::OutputManager,
};

#[derive(Debug, Serialize)]
struct CriteriaRow {
    category: &'static str,
    summary: &'static str,
    grammar: &'static str,
    example: &'static str,
}

impl From<&CriteriaDef> for CriteriaRow {
    fn from(def: &CriteriaDef) -> Self {
        Self {
            category: def.category,
            summary: def.summary,
            grammar: def.grammar,
            example: def.example,
        }
    }
}

pub fn execute(args: CriteriaArgs, output: OutputManager) -> CliResult<()> {
    let rows: Vec<CriteriaRow> = CRITERIA_REGISTRY.iter().map(CriteriaRow::from).collect();

    match args.format {
        ListFormat::Table => {
            output.header("Batch criteria:")?;
            for row in &rows {
                output.print(&format!("  {:<30} {}", row.category, row.summary))?;
                output.print(&format!("  {:<30} {}", "", row.grammar))?;
                output.print(&format!("  {:<30} e.g. {}", "", row.example))?;
            }
        }
        // Machine formats bypass quiet mode: they are the command's result.
        ListFormat::Json => output.json(&rows)?,
        ListFormat::List => {
            for row in &rows {
                println!("{}", row.category);
            }
        }
        ListFormat::Csv => print!("{}", to_csv(&rows)),
    }

    Ok(())
}

fn to_csv(rows: &[CriteriaRow]) -> String {
    let mut out = String::from("category,summary,grammar,example\n");
    for row in rows {
        let fields = [row.category, row.summary, row.grammar, row.example].map(csv_field);
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_owned()
    }
}
