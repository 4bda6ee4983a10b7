use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gable_lib::codegen::LANGUAGES;
use gable_lib::export::OutputFormat;
use gable_lib::{BuildConfig, BuildOrchestrator, BuildReport, BuildTarget, FsSink};

#[derive(Parser)]
#[command(name = "gable", version, about = "Compile spreadsheet tables into data artifacts and accessor code.")]
struct Cli {
    /// Log at debug level
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a workspace and export every enabled target
    Build(BuildArgs),
    /// Compile a workspace without exporting anything
    Check {
        /// Workspace root holding the sheets
        workspace: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List supported languages and output formats
    Languages,
}

#[derive(clap::Args)]
struct BuildArgs {
    /// Workspace root holding the sheets
    workspace: PathBuf,

    /// Build settings (JSON) listing the targets
    #[arg(long, short = 's', value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Only run targets with these display names (repeatable)
    #[arg(long = "target", value_name = "NAME")]
    targets: Vec<String>,

    /// Language of an ad hoc target, used when no settings file is given
    #[arg(long, requires = "out")]
    language: Option<String>,

    /// Output format of the ad hoc target
    #[arg(long, default_value = "json")]
    format: String,

    /// Output directory of the ad hoc target
    #[arg(long, value_name = "DIR")]
    out: Option<PathBuf>,

    /// Generate accessor code for the ad hoc target into this directory
    #[arg(long, value_name = "DIR")]
    code_out: Option<PathBuf>,

    /// Platform tag overriding every selected target's (`*` keeps all fields)
    #[arg(long)]
    platform: Option<String>,

    /// Worker limit
    #[arg(long, short = 'j')]
    jobs: Option<usize>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    match cli.command {
        Command::Build(args) => build(args),
        Command::Check { workspace, json } => {
            let orchestrator = BuildOrchestrator::new(BuildConfig::default(), Arc::new(FsSink));
            let outcome = orchestrator.run_workspace(&workspace);
            finish(&outcome.report, json)
        }
        Command::Languages => {
            for lang in LANGUAGES {
                let aliases = if lang.aliases.is_empty() {
                    String::new()
                } else {
                    format!(" (aliases: {})", lang.aliases.join(", "))
                };
                println!("{:<12} .{}{}", lang.tag, lang.keyword, aliases);
            }
            let formats: Vec<String> = OutputFormat::ALL.iter().map(|f| f.to_string()).collect();
            println!();
            println!("formats: {}", formats.join(", "));
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let default = if verbose {
        "gable=debug,gable_lib=debug"
    } else {
        "gable=info,gable_lib=info"
    };
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.is_empty() => EnvFilter::try_new(&directives)
            .with_context(|| format!("invalid RUST_LOG filter '{}'", directives))?,
        _ => EnvFilter::new(default),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn build(args: BuildArgs) -> Result<()> {
    let mut config = load_config(&args)?;
    if !args.targets.is_empty() {
        config
            .targets
            .retain(|t| args.targets.iter().any(|name| name == &t.display_name));
        if config.targets.is_empty() {
            bail!("no build target matches {}", args.targets.join(", "));
        }
    }
    if let Some(platform) = &args.platform {
        for target in &mut config.targets {
            target.platform = Some(platform.clone());
        }
    }
    if args.jobs.is_some() {
        config.jobs = args.jobs;
    }

    let orchestrator = BuildOrchestrator::new(config, Arc::new(FsSink));
    let outcome = orchestrator.run_workspace(&args.workspace);
    finish(&outcome.report, args.json)
}

fn load_config(args: &BuildArgs) -> Result<BuildConfig> {
    if let Some(path) = &args.settings {
        return BuildConfig::from_json_file(path)
            .with_context(|| format!("failed to load build settings from {}", path.display()));
    }

    match (&args.language, &args.out) {
        (Some(language), Some(out)) => {
            let mut target = BuildTarget::new(language.clone(), language.clone(), args.format.clone(), out);
            if let Some(code_out) = &args.code_out {
                target = target.with_code(code_out);
            }
            Ok(BuildConfig::new(vec![target]))
        }
        _ => {
            let default = args.workspace.join("gable.json");
            if default.is_file() {
                return BuildConfig::from_json_file(&default).with_context(|| {
                    format!("failed to load build settings from {}", default.display())
                });
            }
            bail!(
                "no build targets: pass --settings, --language with --out, or add {}",
                default.display()
            )
        }
    }
}

fn finish(report: &BuildReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        for artifact in &report.artifacts {
            println!("wrote {} ({} bytes)", artifact.path.display(), artifact.size);
        }
        for diagnostic in &report.diagnostics {
            eprintln!("{}", diagnostic);
        }
        println!(
            "{}: {} tables, {} artifacts, {} problems",
            report.stage,
            report.tables.len(),
            report.artifacts.len(),
            report.diagnostics.len()
        );
    }

    if !report.is_success() {
        bail!("build failed with {} problems", report.diagnostics.len());
    }
    Ok(())
}
