mod commands;

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use optrace_eval::EvalOptions;
use optrace_storage::{InMemoryRuleStore, RuleBaseDocument};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Operation interpreter: evaluates rule-base references with explanations.
#[derive(Parser)]
#[command(
    name = "optrace",
    version,
    about = "Operation interpreter: evaluates rule-base references with explanations"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Log resolution steps (debug level)
    #[arg(long, global = true)]
    verbose: bool,

    /// TOML file with evaluation options
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate the variable exposed by a node for one submission
    Evaluate {
        /// Path to the rule-base JSON document
        rulebase: PathBuf,
        /// Node id exposing the variable
        #[arg(long)]
        variable: String,
        /// Submission id
        #[arg(long)]
        submission: String,
        /// JSON object mapping node ids to override values
        #[arg(long)]
        overrides: Option<PathBuf>,
    },

    /// Resolve a single reference for one submission
    Interpret {
        /// Path to the rule-base JSON document
        rulebase: PathBuf,
        /// Reference to resolve (e.g. node-formula:abc, @table.t1)
        reference: String,
        /// Submission id
        #[arg(long)]
        submission: String,
        /// JSON object mapping node ids to override values
        #[arg(long)]
        overrides: Option<PathBuf>,
    },

    /// Classify a reference without reading any rule base
    Classify {
        /// Reference to classify
        reference: String,
    },

    /// Validate every condition, lookup configuration and token stream
    Check {
        /// Path to the rule-base JSON document
        rulebase: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Evaluate {
            rulebase,
            variable,
            submission,
            overrides,
        } => {
            let options = load_options(cli.config.as_deref(), cli.output, cli.quiet);
            commands::evaluate::cmd_evaluate(
                &rulebase,
                &variable,
                &submission,
                overrides.as_deref(),
                options,
                cli.output,
                cli.quiet,
            );
        }
        Commands::Interpret {
            rulebase,
            reference,
            submission,
            overrides,
        } => {
            let options = load_options(cli.config.as_deref(), cli.output, cli.quiet);
            commands::interpret::cmd_interpret(
                &rulebase,
                &reference,
                &submission,
                overrides.as_deref(),
                options,
                cli.output,
                cli.quiet,
            );
        }
        Commands::Classify { reference } => {
            commands::classify::cmd_classify(&reference, cli.output);
        }
        Commands::Check { rulebase } => {
            commands::check::cmd_check(&rulebase, cli.output, cli.quiet);
        }
    }
}

/// `RUST_LOG` wins; otherwise warnings, or debug for our crates with
/// `--verbose`, or errors only with `--quiet`.
fn init_logging(verbose: bool, quiet: bool) {
    let default = if verbose {
        "warn,optrace_eval=debug,optrace_storage=debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}

/// Report and exit with status 1.
pub(crate) fn fail(msg: &str, output: OutputFormat, quiet: bool) -> ! {
    report_error(msg, output, quiet);
    process::exit(1);
}

fn load_options(path: Option<&Path>, output: OutputFormat, quiet: bool) -> EvalOptions {
    let Some(path) = path else {
        return EvalOptions::default();
    };
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => fail(
            &format!("error reading config '{}': {}", path.display(), e),
            output,
            quiet,
        ),
    };
    match toml::from_str::<EvalOptions>(&text) {
        Ok(options) => {
            log::debug!("loaded options from {}: {:?}", path.display(), options);
            options
        }
        Err(e) => fail(
            &format!("error: invalid config in {}: {}", path.display(), e),
            output,
            quiet,
        ),
    }
}

pub(crate) fn load_document(path: &Path, output: OutputFormat, quiet: bool) -> RuleBaseDocument {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(_) => fail(
            &format!("error: rule base file not found: {}", path.display()),
            output,
            quiet,
        ),
    };
    match RuleBaseDocument::from_json_str(&text) {
        Ok(doc) => doc,
        Err(e) => fail(&format!("error in {}: {}", path.display(), e), output, quiet),
    }
}

pub(crate) fn load_store(path: &Path, output: OutputFormat, quiet: bool) -> InMemoryRuleStore {
    let doc = load_document(path, output, quiet);
    match InMemoryRuleStore::from_document(doc) {
        Ok(store) => store,
        Err(e) => fail(&format!("error in {}: {}", path.display(), e), output, quiet),
    }
}

pub(crate) fn load_overrides(
    path: Option<&Path>,
    output: OutputFormat,
    quiet: bool,
) -> BTreeMap<String, serde_json::Value> {
    let Some(path) = path else {
        return BTreeMap::new();
    };
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(_) => fail(
            &format!("error: overrides file not found: {}", path.display()),
            output,
            quiet,
        ),
    };
    match serde_json::from_str(&text) {
        Ok(map) => map,
        Err(e) => fail(
            &format!("error: overrides in {} must be a JSON object: {}", path.display(), e),
            output,
            quiet,
        ),
    }
}

/// Drive one future to completion on a single-threaded runtime.
pub(crate) fn block_on<F: Future>(future: F, output: OutputFormat, quiet: bool) -> F::Output {
    match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt.block_on(future),
        Err(e) => fail(
            &format!("failed to create tokio runtime: {}", e),
            output,
            quiet,
        ),
    }
}
