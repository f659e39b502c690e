#![cfg(not(tarpaulin_include))]

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use imc::HistoryProjector;
use imc::dashboard;
use imc::form::{FieldState, FormInput, ImcForm};
use imc::history::{FilterSpec, PageWindow, SortDirection, SortKey, SortSpec};
use imc::record::{CalculationRecord, sort_newest_first};
use std::fs;
use std::path::{Path, PathBuf};

/// Offline companion of the IMC web front end
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Normalize and validate a height/weight pair as the form would
    Check {
        /// Height in meters, "," or "." as decimal separator
        #[arg(long)]
        height: String,

        /// Weight in kilograms
        #[arg(long)]
        weight: String,
    },

    /// Show one page of a JSON history export
    History {
        file: PathBuf,

        /// First calendar day to include (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last calendar day to include (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Column to sort by: weight, height or index
        #[arg(long, value_parser = parse_sort_key)]
        sort: Option<SortKey>,

        /// Sort ascending instead of descending
        #[arg(long, default_value_t = false)]
        asc: bool,

        #[arg(long, default_value_t = 1)]
        page: usize,
    },

    /// Print the dashboard summary of a JSON history export
    Summary { file: PathBuf },
}

fn parse_sort_key(name: &str) -> Result<SortKey, String> {
    SortKey::from_name(name).ok_or_else(|| format!("unknown column {:?}", name))
}

fn load_records(path: &Path) -> Result<Vec<CalculationRecord>, Box<dyn std::error::Error>> {
    let data = fs::read_to_string(path)?;
    let mut records: Vec<CalculationRecord> = serde_json::from_str(&data)?;
    sort_newest_first(&mut records);
    Ok(records)
}

fn check(height: &str, weight: &str) {
    let mut form = ImcForm::from_input(&FormInput {
        height: height.to_string(),
        weight: weight.to_string(),
    });

    let result = form.submit();
    for field in [&form.height, &form.weight] {
        let name = field.kind().field_name();
        let unit = field.kind().unit();
        match field.state() {
            FieldState::Clean => println!("✓ {} = {} {}", name, field.text(), unit),
            FieldState::Invalid(err) => println!("✗ {}: {}", name, err.localized()),
        }
    }

    if let Ok(request) = result {
        let index = request.weight() / (request.height() * request.height());
        println!("IMC aproximado: {:.2}", index);
    }
}

fn print_history(records: &[CalculationRecord], filter: FilterSpec, sort: SortSpec, page: usize) {
    let projection =
        HistoryProjector::default().project(records, &filter, &sort, &PageWindow::new(page));

    println!(
        "{:<12} {:>8} {:>8} {:>8}  {}",
        "Fecha", "Peso", "Altura", "IMC", "Categoría"
    );
    for record in &projection.visible {
        println!(
            "{:<12} {:>8.2} {:>8.2} {:>8.2}  {}",
            record.created_at.format("%Y-%m-%d"),
            record.weight,
            record.height,
            record.index,
            record.category
        );
    }
    if projection.visible.is_empty() {
        println!("(sin registros)");
    }

    println!(
        "Página {} de {} ({} registros)",
        projection.current_page, projection.total_pages, projection.filtered_count
    );
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Check { height, weight } => check(&height, &weight),
        Command::History {
            file,
            from,
            to,
            sort,
            asc,
            page,
        } => {
            let records = load_records(&file)?;
            let direction = if asc {
                SortDirection::Ascending
            } else {
                SortDirection::Descending
            };
            let sort = sort
                .map(|key| SortSpec::by(key, direction))
                .unwrap_or_default();
            print_history(&records, FilterSpec::new(from, to), sort, page);
        }
        Command::Summary { file } => {
            let records = load_records(&file)?;
            let summary = dashboard::summarize(&records);

            println!("Total de registros: {}", summary.total_records);
            if let Some(latest) = summary.latest_index {
                println!("Último IMC: {:.2}", latest);
            }
            if let Some(name) = &summary.most_frequent {
                println!("Categoría más frecuente: {}", name);
            }
            for slice in &summary.categories {
                println!(
                    "  {:<12} {:>3} registros  IMC promedio {:>6.2}  {:>5.1}%",
                    slice.name, slice.count, slice.average_index, slice.percentage
                );
            }
        }
    }

    Ok(())
}
