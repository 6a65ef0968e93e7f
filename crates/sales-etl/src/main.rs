//! CLI entry point for the sales spreadsheet ETL.

use anyhow::{Result, anyhow};
use clap::Parser;
use sales_etl::config::{
    DEFAULT_CSV_OUTPUT, DEFAULT_EXCEL_OUTPUT, DEFAULT_INPUT, DEFAULT_OUTPUT_SHEET, DEFAULT_SHEET,
};
use sales_etl::{EtlConfig, EtlResult, Pipeline, RowFilter, render_statistics};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Sales spreadsheet ETL",
    long_about = "Loads one sheet of a sales workbook, cleans and enriches it, and writes \
                  the result to an xlsx workbook and a CSV file.\n\n\
                  EXAMPLES:\n  \
                  # Run with the default file names\n  \
                  sales-etl\n\n  \
                  # Explicit input and outputs\n  \
                  sales-etl -i sales.xlsx --sheet Sheet1 --excel-output out.xlsx --csv-output out.csv\n\n  \
                  # Keep only one country\n  \
                  sales-etl -i sales.xlsx --filter Country=Canada"
)]
struct Args {
    /// Path to the source spreadsheet or CSV file
    #[arg(short, long, default_value = DEFAULT_INPUT)]
    input: PathBuf,

    /// Sheet to read from a spreadsheet source
    #[arg(long, default_value = DEFAULT_SHEET)]
    sheet: String,

    /// Destination of the xlsx output
    #[arg(long, default_value = DEFAULT_EXCEL_OUTPUT)]
    excel_output: PathBuf,

    /// Destination of the CSV output
    #[arg(long, default_value = DEFAULT_CSV_OUTPUT)]
    csv_output: PathBuf,

    /// Sheet name in the xlsx output
    #[arg(long, default_value = DEFAULT_OUTPUT_SHEET)]
    output_sheet: String,

    /// Keep only rows where COLUMN equals VALUE (canonical column names)
    #[arg(long, value_name = "COLUMN=VALUE")]
    filter: Option<String>,

    /// Number of rows shown in the preview
    #[arg(long, default_value = "5")]
    preview_rows: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings and the final result)
    #[arg(short, long)]
    quiet: bool,

    /// Output the run result as JSON on stdout instead of a human-readable
    /// summary. Disables all logs.
    #[arg(long)]
    json: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn build_config(args: &Args) -> Result<EtlConfig> {
    let mut builder = EtlConfig::builder()
        .input_path(&args.input)
        .sheet_name(&args.sheet)
        .excel_output(&args.excel_output)
        .csv_output(&args.csv_output)
        .output_sheet_name(&args.output_sheet)
        .preview_rows(args.preview_rows);

    if let Some(expr) = &args.filter {
        builder = builder.row_filter(RowFilter::parse(expr)?);
    }

    Ok(builder.build()?)
}

fn build_pipeline(config: EtlConfig, quiet: bool) -> Result<Pipeline> {
    let mut builder = Pipeline::builder().config(config);

    if !quiet {
        builder = builder.on_progress(|update| {
            info!(
                "[{:.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            );
        });
    }

    Ok(builder.build()?)
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    let config = build_config(&args)?;
    let pipeline = build_pipeline(config, args.quiet || args.json)?;

    info!("{}", "=".repeat(80));
    info!("Starting sales ETL...");
    info!("{}", "=".repeat(80));

    match pipeline.run() {
        Ok(result) if args.json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Ok(result) => {
            print_human_readable_summary(&result);
            Ok(())
        }
        Err(e) => {
            if args.json {
                let body = serde_json::json!({ "error": &e });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                error!("ETL failed: {}", e);
                if let Some(target) = e.failed_target() {
                    error!("Output not written: {}", target.display());
                }
            }
            Err(anyhow!("ETL failed: {}", e))
        }
    }
}

/// Print a human-readable summary of the run.
///
/// Uses `println!` rather than logging so the summary is visible at every
/// log level.
fn print_human_readable_summary(result: &EtlResult) {
    let load = &result.load;
    let summary = &result.transform;

    println!();
    println!("{}", "=".repeat(80));
    println!("ETL COMPLETE");
    println!("{}", "=".repeat(80));
    println!();

    match &load.sheet {
        Some(sheet) => println!(
            "Input:  {} [{}] ({} rows x {} columns)",
            load.source.display(),
            sheet,
            load.rows,
            load.columns
        ),
        None => println!(
            "Input:  {} ({} rows x {} columns)",
            load.source.display(),
            load.rows,
            load.columns
        ),
    }
    println!(
        "Output: {} [{}]",
        result.outputs.excel.display(),
        result.outputs.excel_sheet
    );
    println!("        {}", result.outputs.csv.display());
    println!(
        "        ({} rows x {} columns)",
        result.shape.0, result.shape.1
    );
    println!();

    for (column, values) in &load.diagnostics {
        println!("Unique {}: {:?}", column, values);
    }
    if !load.diagnostics.is_empty() {
        println!();
    }

    println!("Transformation Summary:");
    println!("  Duration: {}ms", result.duration_ms);
    println!(
        "  Rows: {} -> {} ({} duplicates removed, {} filtered)",
        summary.rows_before, summary.rows_after, summary.duplicates_removed, summary.rows_filtered
    );
    println!(
        "  Columns: {} -> {}",
        summary.columns_before, summary.columns_after
    );
    println!("  Cells filled: {}", summary.total_filled());
    if summary.unparsed_dates > 0 {
        println!("  Unparsed dates: {}", summary.unparsed_dates);
    }
    println!();

    if !summary.actions.is_empty() {
        println!("Actions Taken:");
        for action in &summary.actions {
            println!("  - {}", action);
        }
        println!();
    }

    if !summary.skipped_rules.is_empty() {
        println!("Skipped (column absent):");
        for rule in &summary.skipped_rules {
            println!("  ! {}", rule);
        }
        println!();
    }

    println!("Preview:");
    println!("{}", result.preview);
    println!();

    println!("Descriptive Statistics:");
    print!("{}", render_statistics(&result.statistics));
    println!();

    println!("Use --json for machine-readable output");
    println!("{}", "=".repeat(80));
}
