//! Binary entry point for the tanoak index CLI.
#![forbid(unsafe_code)]

mod config;
mod ui;

use std::error::Error;
use std::fs;
use std::io;
use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell as CompletionShell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use tanoak::cli::import_export::{extract_csv, load_csv};
use tanoak::cli::shell::Shell;
use tanoak::{BTree, StoreOptions, TreeStats};

use config::CliConfig;
use ui::{human_duration, Theme, Ui};

#[derive(Parser, Debug)]
#[command(
    name = "tanoak",
    version,
    about = "Single-file ordered index over a disk-paged B-tree",
    disable_help_subcommand = true
)]
struct Cli {
    #[command(flatten)]
    open: OpenArgs,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = ThemeArg::Auto,
        help = "Color theme for decorated output"
    )]
    theme: ThemeArg,

    #[arg(long, global = true, help = "Suppress icons, colors and spinners")]
    quiet: bool,

    #[arg(
        long,
        global = true,
        value_name = "FILE",
        env = "TANOAK_CONFIG",
        help = "Path to the CLI config file"
    )]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Args, Debug)]
struct OpenArgs {
    #[arg(
        long,
        global = true,
        value_name = "BLOCKS",
        help = "Override node cache capacity (blocks)"
    )]
    cache_blocks: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Start an interactive session (the default)")]
    Shell {
        #[arg(value_name = "INDEX")]
        index: Option<PathBuf>,
    },

    #[command(about = "Create an empty index file")]
    Create {
        #[arg(value_name = "INDEX")]
        index: PathBuf,

        #[arg(long, help = "Replace the file if it already exists")]
        force: bool,
    },

    #[command(about = "Insert one key/value pair")]
    Insert {
        #[arg(value_name = "INDEX")]
        index: PathBuf,

        #[arg(value_name = "KEY")]
        key: u64,

        #[arg(value_name = "VALUE")]
        value: u64,
    },

    #[command(about = "Look up the value stored under a key")]
    Search {
        #[arg(value_name = "INDEX")]
        index: PathBuf,

        #[arg(value_name = "KEY")]
        key: u64,
    },

    #[command(about = "Bulk insert key,value rows from a CSV file")]
    Load {
        #[arg(value_name = "INDEX")]
        index: PathBuf,

        #[arg(value_name = "CSV")]
        csv: PathBuf,
    },

    #[command(about = "List every pair in ascending key order")]
    Print {
        #[arg(value_name = "INDEX")]
        index: PathBuf,
    },

    #[command(about = "Write every pair to a CSV file in ascending key order")]
    Extract {
        #[arg(value_name = "INDEX")]
        index: PathBuf,

        #[arg(value_name = "CSV")]
        csv: PathBuf,

        #[arg(long, help = "Replace the output file if it already exists")]
        force: bool,
    },

    #[command(about = "Print file, tree and cache statistics")]
    Stats {
        #[arg(value_name = "INDEX")]
        index: PathBuf,
    },

    #[command(about = "Check structural invariants and report violations")]
    Verify {
        #[arg(value_name = "INDEX")]
        index: PathBuf,
    },

    #[command(about = "Generate shell completions on stdout")]
    Completions {
        #[arg(value_enum, value_name = "SHELL")]
        shell: CompletionShell,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum ThemeArg {
    Auto,
    Light,
    Dark,
    Plain,
}

impl From<ThemeArg> for Theme {
    fn from(theme: ThemeArg) -> Self {
        match theme {
            ThemeArg::Auto => Theme::Auto,
            ThemeArg::Light => Theme::Light,
            ThemeArg::Dark => Theme::Dark,
            ThemeArg::Plain => Theme::Plain,
        }
    }
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let cli_config = CliConfig::load(cli.config.clone())?;
    let options = build_store_options(&cli.open, &cli_config);
    let ui = Ui::new(cli.theme.into(), cli.quiet);

    match cli.command {
        None => run_shell(None, &cli_config, options)?,
        Some(Command::Shell { index }) => run_shell(index, &cli_config, options)?,

        Some(Command::Create { index, force }) => {
            if index.exists() {
                if !force {
                    return Err(format!(
                        "index file {} already exists (pass --force to replace it)",
                        index.display()
                    )
                    .into());
                }
                fs::remove_file(&index)?;
            }
            BTree::create_with(&index, options)?.close()?;
            ui.success(&format!("created {}", index.display()));
        }

        Some(Command::Insert { index, key, value }) => {
            let mut tree = BTree::open_with(&index, options)?;
            tree.insert(key, value)?;
            tree.close()?;
            ui.success(&format!("inserted {key}"));
        }

        Some(Command::Search { index, key }) => {
            let mut tree = BTree::open_with(&index, options)?;
            let value = tree.search(key)?;
            tree.close()?;
            let report = SearchReport {
                key,
                found: value.is_some(),
                value,
            };
            emit(&cli.format, &report, || match report.value {
                Some(value) => println!("{key} -> {value}"),
                None => ui.warn(&format!("key {key} not found")),
            })?;
            if report.value.is_none() {
                std::process::exit(1);
            }
        }

        Some(Command::Load { index, csv }) => {
            let mut tree = BTree::open_with(&index, options)?;
            let spinner = ui.progress(format!("loading {}", csv.display()));
            let summary = load_csv(&mut tree, &csv)?;
            let elapsed = spinner.done();
            tree.close()?;
            ui.success(&format!(
                "loaded {} pairs in {} ({} duplicates, {} malformed rows skipped)",
                summary.inserted,
                human_duration(elapsed),
                summary.duplicates,
                summary.malformed
            ));
        }

        Some(Command::Print { index }) => {
            let mut tree = BTree::open_with(&index, options)?;
            let rows: Vec<PairRow> = tree
                .collect()?
                .into_iter()
                .map(|(key, value)| PairRow { key, value })
                .collect();
            tree.close()?;
            emit(&cli.format, &rows, || {
                for row in &rows {
                    println!("{} -> {}", row.key, row.value);
                }
            })?;
        }

        Some(Command::Extract { index, csv, force }) => {
            let mut tree = BTree::open_with(&index, options)?;
            let spinner = ui.progress(format!("extracting to {}", csv.display()));
            let summary = extract_csv(&mut tree, &csv, force)?;
            let elapsed = spinner.done();
            tree.close()?;
            ui.success(&format!(
                "extracted {} pairs to {} in {}",
                summary.exported,
                csv.display(),
                human_duration(elapsed)
            ));
        }

        Some(Command::Stats { index }) => {
            let mut tree = BTree::open_with(&index, options)?;
            let stats = tree.stats()?;
            let file_size_bytes = fs::metadata(&index)?.len();
            tree.close()?;
            let report = StatsReport {
                path: index.display().to_string(),
                file_size_bytes,
                tree: stats,
            };
            emit(&cli.format, &report, || ui.stats(&report))?;
        }

        Some(Command::Verify { index }) => {
            let mut tree = BTree::open_with(&index, options)?;
            let findings = tree.verify()?;
            tree.close()?;
            let report = VerifyReport {
                success: findings.is_empty(),
                findings,
            };
            emit(&cli.format, &report, || ui.verify(&report))?;
            if !report.success {
                std::process::exit(1);
            }
        }

        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, name, &mut io::stdout());
        }
    }

    Ok(())
}

fn run_shell(
    index: Option<PathBuf>,
    cli_config: &CliConfig,
    options: StoreOptions,
) -> Result<(), Box<dyn Error>> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    // An explicit path must open; a configured default is only picked up
    // once something has created it.
    let resolved = index.or_else(|| {
        cli_config
            .default_index()
            .filter(|path| path.exists())
            .cloned()
    });
    let shell = match resolved {
        Some(path) => {
            let tree = BTree::open_with(&path, options.clone())?;
            Shell::with_index(stdin.lock(), stdout.lock(), options, tree)
        }
        None => Shell::new(stdin.lock(), stdout.lock(), options),
    };
    shell.run()?;
    Ok(())
}

fn build_store_options(args: &OpenArgs, cli_config: &CliConfig) -> StoreOptions {
    let mut options = StoreOptions::default();
    if let Some(blocks) = cli_config.cache_blocks() {
        options.cache_blocks = blocks;
    }
    if let Some(blocks) = args.cache_blocks {
        options.cache_blocks = blocks;
    }
    options
}

fn emit<T, F>(format: &OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: Serialize,
    F: Fn(),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(),
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct SearchReport {
    key: u64,
    found: bool,
    value: Option<u64>,
}

#[derive(Debug, Serialize)]
struct PairRow {
    key: u64,
    value: u64,
}

#[derive(Debug, Serialize)]
struct StatsReport {
    path: String,
    file_size_bytes: u64,
    #[serde(flatten)]
    tree: TreeStats,
}

#[derive(Debug, Serialize)]
struct VerifyReport {
    success: bool,
    findings: Vec<String>,
}
