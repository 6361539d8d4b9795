//! Command-line front end for nibble-compose
//!
//! Usage: nibble-compose <generate|list|validate|check-drift|eval> [options]

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use nibble_compose::{ComponentEmitter, InstructionKind, Orchestrator, PlanValidator};

// Command handlers live in src/bin/cli/
mod cli;

use cli::settings::{load_config, ConfigOverrides};
use cli::validate::BackendChoice;

#[derive(Parser)]
#[command(name = "nibble-compose")]
#[command(version, about = "Nibble decomposition of VM instructions into solver components", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate component queries for instructions
    Generate {
        /// Instruction mnemonics (default: every instruction)
        instructions: Vec<String>,

        /// Output directory
        #[arg(short, long, default_value = "generated")]
        out: PathBuf,

        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Character budget per component
        #[arg(long)]
        max_expr_chars: Option<usize>,

        /// Operand width in nibbles
        #[arg(long)]
        width: Option<u8>,

        /// Worker threads per wave
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Generate and report without writing files
        #[arg(long)]
        dry_run: bool,

        /// Exit non-zero when any instruction is not complete
        #[arg(long)]
        strict: bool,

        /// Output format
        #[arg(long, default_value = "human")]
        format: OutputFormat,
    },

    /// List instructions and their decompositions
    List {
        /// Filter by family (arithmetic, bitwise, shift, comparison, ...)
        #[arg(long)]
        family: Option<String>,

        /// Filter by mnemonic (supports `*`)
        #[arg(long)]
        pattern: Option<String>,

        /// Operand width in nibbles
        #[arg(long)]
        width: Option<u8>,

        /// Output format
        #[arg(long, default_value = "human")]
        format: OutputFormat,
    },

    /// Run emitted queries through a solver
    Validate {
        /// Directory of emitted queries
        #[arg(default_value = "generated")]
        dir: PathBuf,

        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Solver backend: builtin, process or z3
        #[arg(long)]
        backend: Option<BackendChoice>,

        /// Solver executable for the process backend
        #[arg(long)]
        driver: Option<PathBuf>,

        /// Timeout per query (seconds)
        #[arg(long)]
        timeout: Option<u64>,

        /// Number of parallel jobs
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Also fail on queries the solver left unproven
        #[arg(long)]
        strict: bool,

        /// Output format
        #[arg(long, default_value = "human")]
        format: OutputFormat,
    },

    /// Check emitted files against a fresh generation
    CheckDrift {
        /// Directory holding manifest.json
        #[arg(default_value = "generated")]
        dir: PathBuf,

        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "human")]
        format: OutputFormat,
    },

    /// Check one execution against an instruction's constraints
    Eval {
        /// Instruction mnemonic
        instruction: String,

        /// Operand words, comma separated (decimal or 0x hex)
        #[arg(long, value_delimiter = ',')]
        inputs: Vec<String>,

        /// Result words to check; omitted, the constrained results are printed
        #[arg(long, value_delimiter = ',')]
        outputs: Option<Vec<String>>,

        /// Fail on a violation instead of reporting it
        #[arg(long)]
        halt: bool,

        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Operand width in nibbles
        #[arg(long)]
        width: Option<u8>,
    },
}

#[derive(Clone, Copy, Debug)]
enum OutputFormat {
    Human,
    Json,
    Junit,
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(OutputFormat::Human),
            "json" => Ok(OutputFormat::Json),
            "junit" => Ok(OutputFormat::Junit),
            "markdown" => Ok(OutputFormat::Markdown),
            _ => Err(format!("Unknown format: {}. Expected: human, json, junit, markdown", s)),
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .from_env_lossy()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exit_code = match cli.command {
        Commands::Generate {
            instructions,
            out,
            config,
            max_expr_chars,
            width,
            jobs,
            dry_run,
            strict,
            format,
        } => {
            let overrides = ConfigOverrides {
                max_expr_chars,
                word_nibbles: width,
                workers: jobs,
                ..ConfigOverrides::default()
            };
            handle_generate(instructions, out, config, &overrides, dry_run, strict, format)
        }
        Commands::List {
            family,
            pattern,
            width,
            format,
        } => {
            let overrides = ConfigOverrides {
                word_nibbles: width,
                ..ConfigOverrides::default()
            };
            handle_list(family.as_deref(), pattern.as_deref(), &overrides, format)
        }
        Commands::Validate {
            dir,
            config,
            backend,
            driver,
            timeout,
            jobs,
            strict,
            format,
        } => {
            let overrides = ConfigOverrides {
                workers: jobs,
                driver,
                timeout_secs: timeout,
                ..ConfigOverrides::default()
            };
            handle_validate(dir, config, &overrides, backend, strict, format)
        }
        Commands::CheckDrift { dir, config, format } => handle_check_drift(dir, config, format),
        Commands::Eval {
            instruction,
            inputs,
            outputs,
            halt,
            config,
            width,
        } => {
            let overrides = ConfigOverrides {
                word_nibbles: width,
                halt_on_violation: halt,
                ..ConfigOverrides::default()
            };
            handle_eval(&instruction, &inputs, outputs.as_deref(), config, &overrides)
        }
    };

    std::process::exit(exit_code);
}

fn handle_generate(
    instructions: Vec<String>,
    out: PathBuf,
    config_path: Option<PathBuf>,
    overrides: &ConfigOverrides,
    dry_run: bool,
    strict: bool,
    format: OutputFormat,
) -> i32 {
    let config = match load_config(config_path.as_deref(), overrides) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {:#}", e);
            return 1;
        }
    };
    let orchestrator = match Orchestrator::new(&config) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Error setting up generator: {}", e);
            return 1;
        }
    };

    let requests = cli::generate::requested(instructions);
    let report = orchestrator.generate(requests.as_slice());

    let summary = if dry_run {
        None
    } else {
        match ComponentEmitter::new(&out).emit(&report) {
            Ok(s) => Some(s),
            Err(e) => {
                eprintln!("Error writing components to {}: {}", out.display(), e);
                return 1;
            }
        }
    };

    let output = match format {
        OutputFormat::Human => cli::generate::format_generate_human(&report, summary.as_ref()),
        OutputFormat::Json => cli::generate::format_generate_json(&report, summary.as_ref()),
        OutputFormat::Junit => cli::generate::format_generate_junit(&report),
        OutputFormat::Markdown => cli::generate::format_generate_markdown(&report),
    };
    print!("{}", output);

    cli::generate::exit_code(&report, strict)
}

fn handle_list(
    family: Option<&str>,
    pattern: Option<&str>,
    overrides: &ConfigOverrides,
    format: OutputFormat,
) -> i32 {
    let config = match load_config(None, overrides) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {:#}", e);
            return 1;
        }
    };

    let selected = cli::filters::filter_instructions(&InstructionKind::ALL, family, pattern);
    if selected.is_empty() {
        eprintln!("No instructions found matching criteria");
        return 1;
    }

    let rows = match cli::list::describe(&config, &selected) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error decomposing instructions: {}", e);
            return 1;
        }
    };

    let output = match format {
        OutputFormat::Human => cli::list::format_list_human(&rows),
        OutputFormat::Json => cli::list::format_list_json(&rows),
        OutputFormat::Markdown => cli::list::format_list_markdown(&rows),
        OutputFormat::Junit => {
            eprintln!("JUnit format is not available for the instruction list");
            return 1;
        }
    };
    print!("{}", output);
    0
}

fn handle_validate(
    dir: PathBuf,
    config_path: Option<PathBuf>,
    overrides: &ConfigOverrides,
    backend: Option<BackendChoice>,
    strict: bool,
    format: OutputFormat,
) -> i32 {
    let config = match load_config(config_path.as_deref(), overrides) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {:#}", e);
            return 1;
        }
    };

    let files = match cli::validate::discover_queries(&dir) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error discovering queries: {:#}", e);
            return 1;
        }
    };
    if files.is_empty() {
        eprintln!("No query files found under {}", dir.display());
        return 1;
    }

    let backend = match cli::validate::make_backend(backend, &config.solver) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Error selecting solver backend: {:#}", e);
            return 1;
        }
    };

    let results =
        match cli::validate::validate_queries(&files, backend.as_ref(), config.hard_ceiling, config.workers) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("Error running validation: {:#}", e);
                return 1;
            }
        };

    let format_str = match format {
        OutputFormat::Human => "human",
        OutputFormat::Json => "json",
        OutputFormat::Junit => "junit",
        OutputFormat::Markdown => "markdown",
    };
    print!("{}", cli::output::format_results(&results, backend.name(), format_str));

    if results.iter().any(|r| r.status.fails_run(strict)) {
        1
    } else {
        0
    }
}

fn handle_check_drift(dir: PathBuf, config_path: Option<PathBuf>, format: OutputFormat) -> i32 {
    let config = match load_config(config_path.as_deref(), &ConfigOverrides::default()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {:#}", e);
            return 1;
        }
    };

    let result = match cli::drift::detect_drift(&dir, &config) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error detecting drift: {:#}", e);
            return 1;
        }
    };

    let output = match format {
        OutputFormat::Human => cli::drift::format_drift_human(&result),
        OutputFormat::Json => cli::drift::format_drift_json(&result),
        OutputFormat::Markdown => cli::drift::format_drift_markdown(&result),
        OutputFormat::Junit => cli::drift::format_drift_junit(&result),
    };
    print!("{}", output);

    if result.has_drift() {
        1
    } else {
        0
    }
}

fn handle_eval(
    instruction: &str,
    inputs: &[String],
    outputs: Option<&[String]>,
    config_path: Option<PathBuf>,
    overrides: &ConfigOverrides,
) -> i32 {
    let config = match load_config(config_path.as_deref(), overrides) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {:#}", e);
            return 1;
        }
    };
    let kind: InstructionKind = match instruction.parse() {
        Ok(k) => k,
        Err(e) => {
            eprintln!("{}", e);
            return 1;
        }
    };
    let validator = match PlanValidator::new(&config) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Error setting up validator: {}", e);
            return 1;
        }
    };

    match cli::eval::run_eval(&validator, kind, inputs, outputs) {
        Ok(report) => {
            print!("{}", cli::eval::format_eval_human(&report));
            if report.is_violation() {
                1
            } else {
                0
            }
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    }
}
