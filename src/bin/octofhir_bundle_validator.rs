//! Command line front end for the bundle validator
//!
//! Validates FHIR JSON documents, navigates single paths and inspects path
//! parsing. Issue batches from external collaborators are passed as JSON
//! files holding arrays of `{path, errorCode, message, severity, details}`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use octofhir_bundle_validator::diagnostics::{Format, ReportFormatter, issues_from_json};
use octofhir_bundle_validator::{
    IssueProvider, ResolutionPolicy, ValidationRequest, Validator, ValidatorConfig, parse,
};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "octofhir-bundle-validator")]
#[command(about = "Validate FHIR JSON bundles into pointer-addressable error reports")]
#[command(version)]
#[command(author = "OctoFHIR Team <funyloony@gmail.com>")]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    /// First matching entry in document order
    FirstMatch,
    /// Fail when several entries match
    ErrorIfMultiple,
}

impl From<PolicyArg> for ResolutionPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::FirstMatch => ResolutionPolicy::FirstMatch,
            PolicyArg::ErrorIfMultiple => ResolutionPolicy::ErrorIfMultiple,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Text,
    Json,
    Compact,
}

impl From<FormatArg> for Format {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => Format::Text,
            FormatArg::Json => Format::Json,
            FormatArg::Compact => Format::Compact,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline over a document
    Validate {
        /// JSON document (reads from stdin if not provided)
        file: Option<PathBuf>,
        /// Structural validator issue batch
        #[arg(long)]
        external: Option<PathBuf>,
        /// Business-rule issue batch
        #[arg(long)]
        rules: Option<PathBuf>,
        /// Terminology issue batch
        #[arg(long)]
        terminology: Option<PathBuf>,
        /// Reference issue batch
        #[arg(long)]
        references: Option<PathBuf>,
        /// Entry resolution policy
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: FormatArg,
    },
    /// Navigate one path and print the resolved location
    Resolve {
        /// Path expression
        path: String,
        /// JSON document (reads from stdin if not provided)
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Entry to start from
        #[arg(short, long)]
        entry: Option<usize>,
        /// Entry resolution policy
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
    },
    /// Parse a path expression and print its AST
    Parse {
        /// Path expression
        path: String,
    },
    /// Run only the grammar checks
    Check {
        /// JSON document (reads from stdin if not provided)
        file: Option<PathBuf>,
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: FormatArg,
    },
}

fn main() {
    // Setup human-panic for better error messages
    human_panic::setup_panic!();
    env_logger::init();

    match run(Cli::parse()) {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("Error: {err:#}");
            process::exit(2);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let config = match &cli.config {
        Some(path) => ValidatorConfig::from_file(path)
            .with_context(|| format!("reading config '{}'", path.display()))?,
        None => ValidatorConfig::default(),
    };

    match cli.command {
        Commands::Validate {
            file,
            external,
            rules,
            terminology,
            references,
            policy,
            format,
        } => {
            let mut request = ValidationRequest::new(read_input(file.as_deref())?);
            request.external = load_batch("external", external.as_deref())?;
            request.rules = load_batch("rules", rules.as_deref())?;
            request.terminology = load_batch("terminology", terminology.as_deref())?;
            request.references = load_batch("references", references.as_deref())?;
            request.policy = policy.map(Into::into);

            let report = Validator::new(config).validate(&request);
            println!("{}", ReportFormatter::new(format.into()).format_report(&report));
            Ok(if report.is_valid() { 0 } else { 1 })
        }
        Commands::Resolve {
            path,
            file,
            entry,
            policy,
        } => {
            let input = read_input(file.as_deref())?;
            let validator = Validator::new(config);
            let ctx = validator.context(&input, policy.map(Into::into))?;
            match ctx.navigate(&path, entry) {
                Some(location) => {
                    println!("{}", serde_json::to_string_pretty(&location)?);
                    Ok(if location.exists { 0 } else { 1 })
                }
                None => {
                    // Unparseable paths resolve to nothing
                    let err = parse(&path).err().map(|e| e.to_string()).unwrap_or_default();
                    eprintln!("Path does not parse: {err}");
                    println!("null");
                    Ok(1)
                }
            }
        }
        Commands::Parse { path } => match parse(&path) {
            Ok(expr) => {
                eprintln!("Normalized: {expr}");
                println!("{}", serde_json::to_string_pretty(&expr)?);
                Ok(0)
            }
            Err(err) => {
                eprintln!("Parse error: {err}");
                Ok(1)
            }
        },
        Commands::Check { file, format } => {
            let request = ValidationRequest::new(read_input(file.as_deref())?);
            let report = Validator::new(config).validate(&request);
            println!("{}", ReportFormatter::new(format.into()).format_report(&report));
            Ok(if report.is_valid() { 0 } else { 1 })
        }
    }
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("reading '{}'", path.display()))
        }
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("reading from stdin")?;
            Ok(buffer)
        }
    }
}

fn load_batch(name: &str, file: Option<&Path>) -> Result<Option<Arc<dyn IssueProvider>>> {
    let Some(path) = file else {
        return Ok(None);
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading {name} batch '{}'", path.display()))?;
    let issues = issues_from_json(name, &text)?;
    log::debug!("loaded {} {name} issue(s)", issues.len());
    let provider: Arc<dyn IssueProvider> = Arc::new(issues);
    Ok(Some(provider))
}
