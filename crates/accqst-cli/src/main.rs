//! accqst CLI: validate, encode, grade and export accounting questions.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "accqst", version, about = "Accounting question grading")]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check account and variable definitions, or a whole question file
    Validate {
        /// Account definition XML file
        #[arg(long, required_unless_present = "question")]
        accounts: Option<PathBuf>,

        /// Variable definition XML file
        #[arg(long)]
        variables: Option<PathBuf>,

        /// Question TOML file or directory of question files
        #[arg(long, conflicts_with_all = ["accounts", "variables"])]
        question: Option<PathBuf>,
    },

    /// Encode submitted ledger rows into a solution record
    Encode {
        /// Question TOML file
        #[arg(long)]
        question: PathBuf,

        /// Submitted rows as JSON, keyed by part id
        #[arg(long)]
        rows: PathBuf,
    },

    /// Grade a solution record
    Grade {
        /// Question TOML file
        #[arg(long)]
        question: PathBuf,

        /// Solution record JSON
        #[arg(long)]
        solution: PathBuf,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,

        /// Also write the report to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Print the export rows of a graded solution
    Export {
        /// Question TOML file
        #[arg(long)]
        question: PathBuf,

        /// Solution record JSON
        #[arg(long)]
        solution: PathBuf,
    },

    /// Create a starter config and example question
    Init,
}

fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("accqst=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    let result = match cli.command {
        Commands::Validate {
            accounts,
            variables,
            question,
        } => commands::validate::execute(accounts, variables, question, config),
        Commands::Encode { question, rows } => commands::encode::execute(question, rows, config),
        Commands::Grade {
            question,
            solution,
            format,
            output,
        } => commands::grade::execute(question, solution, format, output, config),
        Commands::Export { question, solution } => {
            commands::export::execute(question, solution, config)
        }
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
