mod logging;
mod project;
mod stats;
mod sync;
mod table;
mod validation;

use clap::{Parser, Subcommand};

use crate::project::load_manager;
use crate::stats::print_stats;
use crate::sync::{SyncOptions, run_sync_command};
use crate::table::{run_export_command, run_import_command};
use crate::validation::parse_cultures;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    commands: Commands,
}

/// Supported subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Show entities, languages and missing translations.
    Stats {
        /// Root folder to scan for resource files
        #[arg(short, long, default_value = ".")]
        root: String,

        /// Only report these cultures (repeatable)
        #[arg(short, long)]
        lang: Vec<String>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Synchronize every entity with its interchange file for one culture.
    Sync {
        /// Root folder to scan for resource files
        #[arg(short, long, default_value = ".")]
        root: String,

        /// Target culture, e.g. `de` or `fr-FR`
        #[arg(short, long)]
        lang: String,

        /// Remove units whose key no longer exists
        #[arg(long)]
        prune: bool,

        /// Do not copy interchange targets into empty native values
        #[arg(long)]
        no_import: bool,

        /// Write a JSON report to this file
        #[arg(long)]
        report_json: Option<String>,
    },

    /// Export entries to a CSV table.
    Export {
        /// Root folder to scan for resource files
        #[arg(short, long, default_value = ".")]
        root: String,

        /// The CSV file to write
        #[arg(short, long)]
        output: String,

        /// Only export these cultures besides the neutral one (repeatable)
        #[arg(short, long)]
        lang: Vec<String>,
    },

    /// Apply a CSV table written by `export`.
    Import {
        /// Root folder to scan for resource files
        #[arg(short, long, default_value = ".")]
        root: String,

        /// The CSV file to read
        #[arg(short, long)]
        input: String,
    },
}

fn run(args: Args) -> Result<(), String> {
    match args.commands {
        Commands::Stats { root, lang, json } => {
            let cultures = parse_cultures(&lang)?;
            let manager = load_manager(&root)?;
            print_stats(&manager, &cultures, json);
            Ok(())
        }
        Commands::Sync {
            root,
            lang,
            prune,
            no_import,
            report_json,
        } => run_sync_command(SyncOptions {
            root,
            lang,
            prune,
            no_import,
            report_json,
        }),
        Commands::Export { root, output, lang } => run_export_command(&root, &output, &lang),
        Commands::Import { root, input } => run_import_command(&root, &input),
    }
}

fn main() {
    let args = Args::parse();

    if let Err(e) = logging::init(args.verbose) {
        eprintln!("Warning: failed to initialize logging: {}", e);
    }

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
