// Entry point and interactive console flow for the CNC cost dashboard.
//
// - Option [1] scans the record store and flattens the job records.
// - Option [2] picks the month, budget, reference cost and thickness limits.
// - Option [3] builds the per-line cost report, prints it and exports files.
//
// Loaded rows and the current selection live in a `Session` owned by `main`;
// the pipeline itself only sees what is passed to it.
mod aggregate;
mod buckets;
mod config;
mod cost;
mod error;
mod filter;
mod flatten;
mod loader;
mod output;
mod reports;
mod store;
mod types;
mod util;

use config::{parse_breakpoints, Selection, Settings};
use error::{ReportError, Result};
use std::env;
use std::io::{self, BufRead, Write};
use store::JsonLinesStore;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use types::FlatRow;

struct Session {
    settings: Settings,
    rows: Option<Vec<FlatRow>>,
    selection: Selection,
}

/// One trimmed line from `input`, or `None` once the input is closed.
fn read_answer<R: BufRead>(input: &mut R) -> Option<String> {
    let mut buf = String::new();
    match input.read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

fn prompt(label: &str) -> Option<String> {
    print!("{}", label);
    let _ = io::stdout().flush();
    read_answer(&mut io::stdin().lock())
}

/// Parse an answer; a blank or missing answer keeps `current`.
fn parse_or<T: std::str::FromStr>(answer: Option<String>, current: T) -> Option<T> {
    match answer {
        Some(a) if !a.is_empty() => a.parse().ok(),
        _ => Some(current),
    }
}

fn prompt_or<T: std::str::FromStr + std::fmt::Display>(label: &str, current: T) -> Option<T> {
    let answer = prompt(&format!("{} [{}]: ", label, current));
    parse_or(answer, current)
}

/// `RUST_LOG`-style directives, falling back to `info` when absent or invalid.
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Handle option [1]: drain the record store and flatten every job.
fn handle_load(session: &mut Session) {
    let path = session.settings.records_path.clone();
    let result = JsonLinesStore::open(&path, session.settings.page_size)
        .and_then(|store| loader::load_records(&store));
    match result {
        Ok((records, load_report)) => {
            let rows = flatten::flatten_records(&records);
            println!(
                "Loaded {} records ({} progress entries, {} rows).\n",
                util::format_int(load_report.records),
                util::format_int(load_report.progress_entries),
                util::format_int(rows.len())
            );
            session.rows = Some(rows);
        }
        Err(e) => {
            error!(error = %e, path = %path.display(), "load failed");
            eprintln!("Failed to load records: {}\n", e);
        }
    }
}

/// Handle option [2]: edit the selection. Invalid input leaves it unchanged.
fn handle_select(session: &mut Session) {
    let current = &session.selection;
    if let Ok(start) = session.settings.tracking_start_date() {
        let (months, years) = util::months_and_years_since(start, util::today());
        println!("Months with data: {:?}  Years: {:?}", months, years);
    }

    let (Some(month), Some(year), Some(budget), Some(reference_cost)) = (
        prompt_or("Month", current.month),
        prompt_or("Year", current.year),
        prompt_or("Monthly expenses", current.budget),
        prompt_or("Reference cost/mm", current.reference_cost),
    ) else {
        println!("Invalid number. Selection unchanged.\n");
        return;
    };

    let limits = current
        .breakpoints
        .iter()
        .map(|b| b.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let breakpoints = match prompt(&format!("Thickness limits, comma-separated [{}]: ", limits)) {
        Some(answer) if !answer.is_empty() => parse_breakpoints(&answer),
        _ => Ok(current.breakpoints.clone()),
    };

    match breakpoints.and_then(|b| Selection::new(year, month, budget, reference_cost, b)) {
        Ok(selection) => {
            info!(year, month, "selection updated");
            session.selection = selection;
            println!();
        }
        Err(e) => {
            warn!(error = %e, "rejected selection");
            println!("Invalid selection: {}. Selection unchanged.\n", e);
        }
    }
}

/// Handle option [3]: build the dashboard, print it and export the tables.
fn handle_generate_reports(session: &Session) {
    let Some(rows) = session.rows.as_deref() else {
        println!("Error: No data loaded. Please load the records first (option 1).\n");
        return;
    };

    let report = match reports::build_dashboard(rows, &session.selection, &session.settings) {
        Ok(r) => r,
        Err(e) if e.is_configuration() => {
            println!("Invalid selection: {}\n", e);
            return;
        }
        Err(e) => {
            error!(error = %e, "report failed");
            eprintln!("Report failed: {}\n", e);
            return;
        }
    };

    println!(
        "Cost report for {:02}/{} (expenses {}, reference {}/mm)\n",
        report.month,
        report.year,
        util::format_number(report.budget, 0),
        util::format_number(report.reference_cost, 2)
    );
    for line in &report.lines {
        output::print_line_section(line, report.reference_cost);
        if let Err(e) = export_line(&session.settings, line) {
            eprintln!("Write error: {}", e);
        }
    }

    let summary = reports::generate_summary(&report);
    let summary_path = session.settings.output_dir.join("summary.json");
    match output::write_json(&summary_path, &summary) {
        Ok(()) => println!("(Summary exported to {})\n", summary_path.display()),
        Err(e) => eprintln!("Write error: {}", e),
    }
}

fn export_line(settings: &Settings, line: &types::LineReport) -> Result<()> {
    let buckets_path = settings
        .output_dir
        .join(format!("report_{}_espesores.csv", line.line));
    output::write_csv(&buckets_path, &line.buckets)?;
    let aggregated_path = settings
        .output_dir
        .join(format!("report_{}_aggregated.csv", line.line));
    output::write_aggregated_csv(&aggregated_path, &line.aggregated)?;
    println!(
        "(Tables exported to {} and {})\n",
        buckets_path.display(),
        aggregated_path.display()
    );
    Ok(())
}

fn init_session() -> Result<Session> {
    let settings = Settings::load()?;
    let (year, month) = util::default_period(util::today());
    let selection = Selection::defaults(&settings, year, month)?;
    Ok(Session {
        settings,
        rows: None,
        selection,
    })
}

fn main() {
    FmtSubscriber::builder()
        .with_env_filter(log_filter(env::var("RUST_LOG").ok().as_deref()))
        .with_target(true)
        .init();

    let mut session = match init_session() {
        Ok(s) => s,
        Err(
            e @ (ReportError::Io(_) | ReportError::Config(_) | ReportError::InvalidConfig(_)),
        ) => {
            eprintln!("Cannot read configuration: {}", e);
            std::process::exit(2);
        }
        Err(e) => {
            eprintln!("Startup failed: {}", e);
            std::process::exit(1);
        }
    };
    info!(records = %session.settings.records_path.display(), "CNC cost dashboard started");

    loop {
        println!("CNC Cost Dashboard:");
        println!("[1] Load records");
        println!("[2] Select period / expenses / thickness limits");
        println!("[3] Generate report");
        println!("[4] Exit\n");
        let Some(choice) = prompt("Enter choice: ") else {
            println!("\nExiting the program.");
            break;
        };
        match choice.as_str() {
            "1" => handle_load(&mut session),
            "2" => handle_select(&mut session),
            "3" => {
                println!();
                handle_generate_reports(&session);
            }
            "4" => {
                println!("Exiting the program.");
                break;
            }
            _ => println!("Invalid choice. Please enter 1, 2, 3 or 4.\n"),
        }
    }
}
