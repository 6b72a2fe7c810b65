//! tidy-nb CLI - Convert notebooks between Jupyter and marimo formats.

mod analyze;
mod colors;
mod convert;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tidy_nb_core::{AllowList, Diagnostic, KeepAll, NamePolicy, ProducerRule, ReservedNames};
use tidy_nb_sync::{ConvertOptions, EmitOptions};

#[derive(Parser)]
#[command(name = "tidy-nb")]
#[command(about = "Convert notebooks between Jupyter .ipynb and marimo .py")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Exit with an error when any diagnostic is reported
    #[arg(long, global = true)]
    strict: bool,

    /// Treat temporaries, private and constant-style names as shared variables
    #[arg(long, global = true)]
    keep_all_names: bool,

    /// Always treat NAME as a shared variable (repeatable)
    #[arg(long = "allow", value_name = "NAME", global = true)]
    allow: Vec<String>,

    /// Wire a rebound name to its first binder instead of the nearest one
    #[arg(long, global = true)]
    earliest_producer: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a Jupyter notebook to a marimo notebook
    ToMarimo {
        /// Path to the notebook (.ipynb file)
        input: String,

        /// Output path (default: input with .py extension)
        output: Option<String>,

        /// Version recorded in `__generated_with`
        #[arg(long)]
        generated_with: Option<String>,

        /// App width; an empty value writes `marimo.App()`
        #[arg(long)]
        width: Option<String>,
    },

    /// Convert a marimo notebook to a Jupyter notebook
    ToJupyter {
        /// Path to the notebook (.py file)
        input: String,

        /// Output path (default: input with .ipynb extension)
        output: Option<String>,
    },

    /// Show per-cell inputs and outputs without writing anything
    Analyze {
        /// Path to the notebook (.ipynb or .py file)
        input: String,
    },
}

impl Cli {
    fn convert_options(&self) -> ConvertOptions {
        let policy: Arc<dyn NamePolicy> = if self.keep_all_names {
            Arc::new(KeepAll)
        } else if self.allow.is_empty() {
            Arc::new(ReservedNames::default())
        } else {
            Arc::new(AllowList::new(self.allow.clone(), ReservedNames::default()))
        };

        let producer_rule = if self.earliest_producer {
            ProducerRule::Earliest
        } else {
            ProducerRule::Nearest
        };

        ConvertOptions {
            policy,
            producer_rule,
            emit: EmitOptions::default(),
        }
    }
}

/// Print diagnostics as warnings; under `--strict` any diagnostic is an error.
pub(crate) fn report_diagnostics(diagnostics: &[Diagnostic], strict: bool) -> anyhow::Result<()> {
    for diagnostic in diagnostics {
        eprintln!("{}warning{}: {}", colors::YELLOW, colors::RESET, diagnostic);
    }
    if strict && !diagnostics.is_empty() {
        anyhow::bail!("{} diagnostic(s) reported (--strict)", diagnostics.len());
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut options = cli.convert_options();

    match &cli.command {
        Commands::ToMarimo {
            input,
            output,
            generated_with,
            width,
        } => {
            if let Some(version) = generated_with {
                options.emit.generated_with = version.clone();
            }
            if let Some(width) = width {
                options.emit.width = (!width.is_empty()).then(|| width.clone());
            }
            convert::to_marimo(input, output.as_deref(), &options, cli.strict)?;
        }

        Commands::ToJupyter { input, output } => {
            convert::to_jupyter(input, output.as_deref(), &options, cli.strict)?;
        }

        Commands::Analyze { input } => {
            analyze::execute(input, &options, cli.strict)?;
        }
    }

    Ok(())
}
