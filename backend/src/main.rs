//! Layoffs CLI - Clean company layoff CSV datasets
//!
//! # Main Commands
//!
//! ```bash
//! layoffs clean layoffs.csv -o clean.csv     # Run the cleaning pipeline
//! layoffs summary layoffs.csv --top 5        # Clean, then print aggregates
//! layoffs serve                              # Start HTTP server (port 3000)
//! layoffs snapshot list                      # Inspect stored stage snapshots
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! layoffs parse layoffs.csv                  # Just parse CSV to JSON
//! layoffs validate clean.csv                 # Check a cleaned CSV
//! layoffs rules                              # Show the built-in rules
//! layoffs rules --matchers                   # Show available rule matchers
//! ```

use clap::{Parser, Subcommand};
use layoffs::{
    check_invariants, clean_csv, matchers_description, parse_csv_file_auto, read_cleaned_csv,
    summarize, validate_event, write_csv, write_csv_file, CleanOptions, CleaningRules,
    DatePolicy, PipelineStage, Settings, SnapshotStore, LOG_BROADCASTER,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "layoffs")]
#[command(about = "Clean and summarize company layoff CSV datasets", long_about = None)]
struct Cli {
    /// Only print results, no progress logs
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full cleaning pipeline: dedup, normalize, resolve nulls, finalize
    Clean {
        /// Input CSV file
        input: PathBuf,

        /// Output CSV file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write the cleaned rows as JSON
        #[arg(long)]
        json: Option<PathBuf>,

        /// Write the run report as JSON
        #[arg(long)]
        report: Option<PathBuf>,

        /// Rules JSON file (default: $LAYOFFS_RULES or built-in)
        #[arg(short, long)]
        rules: Option<PathBuf>,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Drop rows with unparseable dates instead of aborting
        #[arg(long)]
        skip_bad_dates: bool,

        /// Store each stage's output in the snapshot store
        #[arg(long)]
        snapshots: bool,

        /// Skip output validation
        #[arg(long)]
        no_validate: bool,
    },

    /// Parse a CSV file and output JSON
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Rules JSON file supplying the null tokens
        #[arg(short, long)]
        rules: Option<PathBuf>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check a cleaned CSV against the output invariants and row schema
    Validate {
        /// Cleaned CSV file
        input: PathBuf,

        /// Rules JSON file the table was cleaned with
        #[arg(short, long)]
        rules: Option<PathBuf>,
    },

    /// Clean a CSV, then print summary aggregates as JSON
    Summary {
        /// Input CSV file
        input: PathBuf,

        /// Entries per ranking
        #[arg(short, long, default_value = "10")]
        top: usize,

        /// Rules JSON file
        #[arg(short, long)]
        rules: Option<PathBuf>,

        /// Drop rows with unparseable dates instead of aborting
        #[arg(long)]
        skip_bad_dates: bool,
    },

    /// Show the built-in cleaning rules
    Rules {
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Describe the rule matchers instead
        #[arg(long)]
        matchers: bool,
    },

    /// Manage stored stage snapshots
    Snapshot {
        /// Snapshot root (default: $LAYOFFS_SNAPSHOT_DIR or .layoffs/snapshots)
        #[arg(long, global = true)]
        dir: Option<PathBuf>,

        #[command(subcommand)]
        action: SnapshotAction,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: $LAYOFFS_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[derive(Subcommand)]
enum SnapshotAction {
    /// List all runs
    List,

    /// Print one stage snapshot
    Show {
        /// Run ID
        run_id: String,
        /// Stage: dedup, normalize, resolve_nulls, finalize
        #[arg(default_value = "finalize")]
        stage: String,
    },

    /// Delete a run
    Delete {
        /// Run ID
        run_id: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    LOG_BROADCASTER.set_quiet(cli.quiet);

    let result = match Settings::from_env() {
        Ok(settings) => run(cli.command, settings).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(command: Commands, settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Clean {
            input,
            output,
            json,
            report,
            rules,
            delimiter,
            skip_bad_dates,
            snapshots,
            no_validate,
        } => {
            let options = CleanOptions {
                rules_path: rules.or(settings.rules_path),
                date_policy: skip_bad_dates.then_some(DatePolicy::Skip),
                delimiter,
                skip_validation: no_validate,
                snapshot_dir: snapshots.then_some(settings.snapshot_dir),
            };
            cmd_clean(
                &input,
                &options,
                output.as_deref(),
                json.as_deref(),
                report.as_deref(),
            )
        }

        Commands::Parse {
            input,
            delimiter,
            rules,
            output,
        } => {
            let options = CleanOptions {
                rules_path: rules.or(settings.rules_path),
                delimiter,
                ..CleanOptions::default()
            };
            cmd_parse(&input, &options, output.as_deref())
        }

        Commands::Validate { input, rules } => {
            cmd_validate(&input, rules.or(settings.rules_path).as_deref())
        }

        Commands::Summary {
            input,
            top,
            rules,
            skip_bad_dates,
        } => {
            let options = CleanOptions {
                rules_path: rules.or(settings.rules_path),
                date_policy: skip_bad_dates.then_some(DatePolicy::Skip),
                ..CleanOptions::default()
            };
            cmd_summary(&input, &options, top)
        }

        Commands::Rules { output, matchers } => cmd_rules(output.as_deref(), matchers),

        Commands::Snapshot { dir, action } => {
            let store = SnapshotStore::with_dir(dir.unwrap_or(settings.snapshot_dir));
            cmd_snapshot(&store, action)
        }

        Commands::Serve { port } => {
            let settings = Settings {
                port: port.unwrap_or(settings.port),
                ..settings
            };
            layoffs::server::start_server(settings).await
        }
    }
}

fn cmd_clean(
    input: &Path,
    options: &CleanOptions,
    output: Option<&Path>,
    json_output: Option<&Path>,
    report_output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {}", input.display());

    let result = clean_csv(input, options)?;

    eprintln!("   Encoding: {}", result.csv_info.encoding);
    eprintln!("   Delimiter: '{}'", format_delimiter(result.csv_info.delimiter));
    eprintln!("   Rows: {}", result.csv_info.row_count);

    let report = &result.report;
    eprintln!("\n⚙️  Cleaned: {} → {} rows", report.input_rows, report.output_rows);
    eprintln!("   Duplicates removed: {}", report.duplicates_removed + report.collapsed);
    eprintln!("   Industries backfilled: {}", report.nulls.backfilled);
    eprintln!("   Industries left null: {}", report.nulls.unresolved);
    eprintln!("   Rows pruned: {}", report.nulls.pruned);
    if !report.rejected.is_empty() {
        eprintln!("   ⚠️  Rows skipped for bad dates: {}", report.rejected.len());
    }
    if let Some(ref run_id) = result.run_id {
        eprintln!("   Snapshots: {}", run_id);
    }

    match output {
        Some(path) => {
            write_csv_file(&result.table, path)?;
            eprintln!("💾 Output written to: {}", path.display());
        }
        None => write_csv(&result.table, std::io::stdout().lock())?,
    }

    if let Some(path) = json_output {
        let json = serde_json::to_string_pretty(&result.table)?;
        fs::write(path, json)?;
        eprintln!("💾 JSON written to: {}", path.display());
    }

    if let Some(path) = report_output {
        let json = serde_json::to_string_pretty(&result.report)?;
        fs::write(path, json)?;
        eprintln!("💾 Report written to: {}", path.display());
    }

    eprintln!("\n✨ Done!");
    Ok(())
}

fn cmd_parse(
    input: &Path,
    options: &CleanOptions,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let parse_options = options.parse_options(&options.load_rules()?);
    let result = parse_csv_file_auto(input, &parse_options)?;

    eprintln!("   Encoding: {}", result.encoding);
    eprintln!(
        "   Delimiter: '{}'{}",
        format_delimiter(result.delimiter),
        if options.delimiter.is_none() { " (auto-detected)" } else { "" }
    );
    eprintln!("   Columns: {}", result.headers.join(", "));
    eprintln!("✅ Parsed {} records", result.rows.len());

    let json = serde_json::to_string_pretty(&result.rows)?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_validate(input: &Path, rules: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("✔️  Validating: {}", input.display());

    let rules = match rules {
        Some(path) => CleaningRules::from_file(path)?,
        None => CleaningRules::default(),
    }
    .compile()?;
    let events = read_cleaned_csv(input)?;

    let mut invalid = 0;
    for (i, event) in events.iter().enumerate() {
        if let Err(errors) = validate_event(&serde_json::to_value(event)?) {
            invalid += 1;
            if invalid <= 5 {
                eprintln!("\n❌ Row {} invalid:", i + 1);
                for err in errors.iter().take(3) {
                    eprintln!("   - {}", err);
                }
            }
        }
    }

    let violations = check_invariants(&events, &rules).err().unwrap_or_default();
    for v in violations.iter().take(10) {
        eprintln!("❌ {}", v);
    }

    eprintln!(
        "\n📊 Results: {} rows, {} schema failures, {} invariant violations",
        events.len(),
        invalid,
        violations.len()
    );

    if invalid > 0 || !violations.is_empty() {
        return Err("cleaned table is not valid".into());
    }

    Ok(())
}

fn cmd_summary(
    input: &Path,
    options: &CleanOptions,
    top: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = clean_csv(input, options)?;
    let summary = summarize(&result.table, top);
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn cmd_rules(output: Option<&Path>, matchers: bool) -> Result<(), Box<dyn std::error::Error>> {
    if matchers {
        println!("{}", matchers_description());
        return Ok(());
    }
    let json = CleaningRules::default().to_json()?;
    write_output(&json, output)
}

fn cmd_snapshot(
    store: &SnapshotStore,
    action: SnapshotAction,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        SnapshotAction::List => {
            let runs = store.list_runs()?;
            if runs.is_empty() {
                eprintln!("📋 No snapshots in {}", store.root().display());
                eprintln!("   Use 'layoffs clean <file> --snapshots' to record one.");
                return Ok(());
            }

            eprintln!("📋 Stored runs ({}):\n", runs.len());
            for run in runs {
                println!("  📄 {} ({})", run.run_id, run.label);
                println!("     Created: {}", run.created_at);
                let stages: Vec<&str> = run.stages.iter().map(|s| s.slug()).collect();
                println!("     Stages: {}", stages.join(", "));
                println!();
            }
        }

        SnapshotAction::Show { run_id, stage } => {
            let stage = PipelineStage::from_slug(&stage)
                .ok_or_else(|| format!("Unknown stage: {}", stage))?;
            let snapshot = store.load(&run_id, stage)?;
            eprintln!(
                "📄 {} / {} ({} rows, {})",
                snapshot.run_id,
                snapshot.stage.slug(),
                snapshot.row_count,
                snapshot.created_at
            );
            println!("{}", serde_json::to_string_pretty(&snapshot.rows)?);
        }

        SnapshotAction::Delete { run_id } => {
            store.delete_run(&run_id)?;
            eprintln!("🗑️  Run deleted: {}", run_id);
        }
    }

    Ok(())
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
