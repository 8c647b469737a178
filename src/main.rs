use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result, WrapErr};
use tracing::{debug, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vigil_archive::S3Connector;
use vigil_core::{OutputFormat, VigilConfig, ENV_ACCESS_KEY_ID, ENV_ENDPOINT, ENV_SECRET_KEY};
use vigil_review::context::{self, PrRef, ReviewContext};
use vigil_review::github::{CommentAction, GitHubClient};
use vigil_review::pipeline::{ReviewPipeline, ReviewReport};

#[derive(Parser)]
#[command(
    name = "vigil",
    version,
    about = "CI artifact review for pull requests",
    long_about = "Vigil turns the artifacts of a CI run into review annotations.\n\n\
                   Lint findings, Jest results and coverage become fails, warnings and\n\
                   messages; changed screenshots are archived to object storage and\n\
                   embedded in a sticky PR comment.\n\n\
                   Examples:\n  \
                     vigil run                         Review artifacts in the current directory\n  \
                     vigil run --pr owner/repo#12 --post  Update the PR comment\n  \
                     vigil run --format github         Emit GitHub Actions annotations\n  \
                     vigil doctor                      Check artifacts and credentials"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .vigil.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable summary (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  The PR comment body\n  \
                         sarif     SARIF v2.1.0 (run subcommand only)\n  \
                         github    GitHub Actions workflow commands (run subcommand only)"
    )]
    format: OutputFormat,

    /// Enable debug logging on stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    /// When to use colors
    #[arg(long, global = true, default_value = "auto")]
    color: ColorChoice,
}

#[derive(Subcommand)]
enum Command {
    /// Annotate CI artifacts and archive changed screenshots
    #[command(long_about = "Annotate CI artifacts and archive changed screenshots.\n\n\
        Reads the lint report, Jest results and coverage summary, scans the changed\n\
        files for updated baseline snapshots, and uploads screenshot diffs when\n\
        AWS_ENDPOINT, AWS_ACCESS_KEY_ID and AWS_SECRET_KEY are set.\n\n\
        Examples:\n  vigil run\n  vigil run --base origin/main --format markdown\n  vigil run --pr owner/repo#12 --post --fail-on-blocking")]
    Run(RunArgs),
    /// Create a default .vigil.toml in the current directory
    #[command(long_about = "Create a default .vigil.toml configuration file.\n\n\
        Generates a commented template with all available options.\n\
        Fails if .vigil.toml already exists.")]
    Init,
    /// Check artifacts, credentials and PR detection
    #[command(long_about = "Check artifacts, credentials and PR detection.\n\n\
        Reports which CI artifacts exist, whether storage credentials are complete,\n\
        whether a GitHub token is available, and which pull request was detected.\n\
        Use --format json for machine-readable output.")]
    Doctor {
        /// Project root (default: current directory)
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Project root holding the CI artifacts (default: current directory)
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Pull request to review, as owner/repo#number (default: detected from GitHub Actions)
    #[arg(long)]
    pr: Option<String>,

    /// File listing the changed paths, one per line
    #[arg(long, conflicts_with = "base")]
    changed_files: Option<PathBuf>,

    /// Compute changed paths with `git diff --name-only <BASE>...HEAD`
    #[arg(long)]
    base: Option<String>,

    /// Create or update the report comment on the pull request
    #[arg(long)]
    post: bool,

    /// GitHub token for reading PR files and posting
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// Exit with status 1 when any blocking annotation was produced
    #[arg(long)]
    fail_on_blocking: bool,
}

#[derive(Clone, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!("vigil v{version}, CI artifact review for pull requests\n");

    println!("Quick start:");
    println!("  vigil init                    Create a .vigil.toml config file");
    println!("  vigil run                     Annotate the artifacts in this directory");
    println!("  vigil doctor                  Check artifacts and credentials\n");

    println!("Run 'vigil <command> --help' for details.");
}

fn load_config(path: Option<&Path>) -> Result<VigilConfig> {
    let config = match path {
        Some(path) => VigilConfig::from_file(path)
            .wrap_err_with(|| format!("loading {}", path.display()))?,
        None => {
            let default_path = Path::new(".vigil.toml");
            if default_path.exists() {
                VigilConfig::from_file(default_path)?
            } else {
                VigilConfig::default()
            }
        }
    };
    Ok(config.with_env_credentials())
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn resolve_pr(explicit: Option<&str>) -> Result<Option<PrRef>> {
    match explicit {
        Some(pr) => Ok(Some(pr.parse()?)),
        None => Ok(context::detect_pull_request(env_lookup)),
    }
}

/// Changed paths, from the first source that applies.
async fn resolve_modified_files(
    args: &RunArgs,
    pr: Option<&PrRef>,
    github: Option<&GitHubClient>,
) -> Result<Vec<String>> {
    if let Some(path) = &args.changed_files {
        return Ok(context::read_changed_files(path).await?);
    }
    if let Some(base) = &args.base {
        return Ok(context::git_changed_files(&args.root, base).await?);
    }
    if let (Some(pr), Some(github)) = (pr, github) {
        match github.list_changed_files(pr).await {
            Ok(files) => return Ok(files),
            Err(e) => warn!(error = %e, "could not list PR files, snapshot scan skipped"),
        }
    }
    Ok(Vec::new())
}

fn print_report(report: &ReviewReport, config: &VigilConfig, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => print!("{report}"),
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            print!(
                "{}",
                report.to_markdown(&config.github.comment_title, &config.github.comment_marker)
            );
        }
        OutputFormat::Sarif => {
            let sarif = vigil_review::sarif::to_sarif(report);
            println!("{}", serde_json::to_string_pretty(&sarif).into_diagnostic()?);
        }
        OutputFormat::Github => {
            for line in report.to_github_commands() {
                println!("{line}");
            }
        }
    }
    Ok(())
}

async fn run_review(args: RunArgs, config: VigilConfig, format: OutputFormat) -> Result<()> {
    let pr = resolve_pr(args.pr.as_deref())?;
    let github = match &args.github_token {
        Some(token) if !token.is_empty() => Some(GitHubClient::new(Some(token.as_str()))?),
        _ => None,
    };
    if args.post && (pr.is_none() || github.is_none()) {
        miette::bail!("--post requires a pull request (--pr or GitHub Actions) and a GitHub token");
    }

    let modified_files = resolve_modified_files(&args, pr.as_ref(), github.as_ref()).await?;
    debug!(count = modified_files.len(), "resolved modified files");
    let review_context = ReviewContext { pr, modified_files };

    let connector = S3Connector::new(config.storage.clone());
    let pipeline = ReviewPipeline::new(&args.root, config.clone(), connector);
    let report = pipeline.run(&review_context).await;

    print_report(&report, &config, format)?;

    if args.post {
        if let (Some(pr), Some(github)) = (&review_context.pr, &github) {
            let body =
                report.to_markdown(&config.github.comment_title, &config.github.comment_marker);
            match github
                .upsert_comment(pr, &config.github.comment_marker, &body)
                .await?
            {
                CommentAction::Created(id) => eprintln!("Created comment {id} on {pr}"),
                CommentAction::Updated(id) => eprintln!("Updated comment {id} on {pr}"),
            }
        }
    }

    if args.fail_on_blocking && report.has_blocking() {
        std::process::exit(1);
    }
    Ok(())
}

#[derive(serde::Serialize)]
struct CheckResult {
    name: &'static str,
    status: &'static str,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

impl CheckResult {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "pass",
            detail: detail.into(),
            hint: None,
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            name,
            status: "fail",
            detail: detail.into(),
            hint: Some(hint.into()),
        }
    }

    fn info(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "info",
            detail: detail.into(),
            hint: None,
        }
    }

    fn symbol(&self) -> &'static str {
        match self.status {
            "pass" => "\u{2713}",
            "fail" => "\u{2717}",
            _ => "~",
        }
    }

    fn colored_symbol(&self) -> String {
        match self.status {
            "pass" => "\x1b[32m\u{2713}\x1b[0m".into(),
            "fail" => "\x1b[31m\u{2717}\x1b[0m".into(),
            _ => "\x1b[33m~\x1b[0m".into(),
        }
    }
}

fn artifact_check(name: &'static str, root: &Path, rel: &Path, hint: &str) -> CheckResult {
    let path = root.join(rel);
    if path.is_file() {
        CheckResult::pass(name, path.display().to_string())
    } else {
        CheckResult::fail(name, format!("{} not found", path.display()), hint)
    }
}

fn run_doctor(
    root: &Path,
    config: &VigilConfig,
    config_path: Option<&Path>,
    format: OutputFormat,
    use_color: bool,
) -> Result<()> {
    let mut checks: Vec<CheckResult> = Vec::new();

    let config_file = config_path.unwrap_or(Path::new(".vigil.toml"));
    if config_file.exists() {
        checks.push(CheckResult::pass("config_file", config_file.display().to_string()));
    } else {
        checks.push(CheckResult::info("config_file", "not found, using defaults"));
    }

    let reports = &config.reports;
    checks.push(artifact_check(
        "lint_report",
        root,
        &reports.lint,
        "run eslint with `--format json --output-file lint-results.json`",
    ));
    checks.push(artifact_check(
        "test_results",
        root,
        &reports.tests,
        "run jest with `--json --outputFile test-results.json`",
    ));
    checks.push(artifact_check(
        "coverage_summary",
        root,
        &reports.coverage,
        "run jest with `--coverage --coverageReporters json-summary`",
    ));

    let diff_dir = root.join(&config.screenshots.diff_dir);
    match std::fs::read_dir(&diff_dir) {
        Ok(entries) => {
            let count = entries
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
                .count();
            checks.push(CheckResult::info(
                "screenshot_diffs",
                format!("{count} in {}", diff_dir.display()),
            ));
        }
        Err(_) => checks.push(CheckResult::info(
            "screenshot_diffs",
            format!("{} absent, no changed screenshots", diff_dir.display()),
        )),
    }

    if config.credentials.is_some() {
        checks.push(CheckResult::pass(
            "storage_credentials",
            format!("configured for bucket {}", config.storage.bucket),
        ));
    } else {
        let missing: Vec<&str> = [ENV_ENDPOINT, ENV_ACCESS_KEY_ID, ENV_SECRET_KEY]
            .into_iter()
            .filter(|key| env_lookup(key).map_or(true, |v| v.trim().is_empty()))
            .collect();
        checks.push(CheckResult::fail(
            "storage_credentials",
            format!("missing {}", missing.join(", ")),
            "screenshot archiving is skipped until all three variables are set",
        ));
    }

    if env_lookup("GITHUB_TOKEN").is_some_and(|t| !t.is_empty()) {
        checks.push(CheckResult::pass("github_token", "GITHUB_TOKEN is set"));
    } else {
        checks.push(CheckResult::fail(
            "github_token",
            "GITHUB_TOKEN not set",
            "required for --post and for reading PR files",
        ));
    }

    match context::detect_pull_request(env_lookup) {
        Some(pr) => checks.push(CheckResult::pass("pull_request", pr.to_string())),
        None => checks.push(CheckResult::info(
            "pull_request",
            "none detected, archives use the fallback scope",
        )),
    }

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "checks": checks,
            });
            println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
        }
        _ => {
            let version = env!("CARGO_PKG_VERSION");
            println!("Vigil v{version} environment check\n");

            for check in &checks {
                let sym = if use_color {
                    check.colored_symbol()
                } else {
                    check.symbol().to_string()
                };
                let label = check.name.replace('_', " ");
                println!("  {sym} {label:<20} {}", check.detail);
                if let Some(hint) = &check.hint {
                    println!("    hint: {hint}");
                }
            }

            let passed = checks.iter().filter(|c| c.status == "pass").count();
            let failed = checks.iter().filter(|c| c.status == "fail").count();
            let info = checks.iter().filter(|c| c.status == "info").count();
            println!("\n{passed} checks passed, {failed} failed, {info} info");
        }
    }

    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# Vigil Configuration
# Storage credentials are read from AWS_ENDPOINT, AWS_ACCESS_KEY_ID and
# AWS_SECRET_KEY; they are never stored in this file.

[reports]
# lint = "lint-results.json"
# coverage = "coverage/coverage-summary.json"
# tests = "test-results.json"

[screenshots]
# diff_dir = "__diff_output__"
# snapshot_marker = "__image_snapshots__"
# fallback_scope = "local"
# remediation_url = "https://github.com/owner/repo/actions/workflows/update-screenshots.yml"

[storage]
# bucket = "vigil-screenshots"
# region = "us-east-1"
# path_style = false
# public_url = "https://cdn.example.com/vigil-screenshots"

[github]
# comment_marker = "<!-- vigil-report -->"
# comment_title = "CI Report"
"#;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    };

    match cli.command {
        None => print_welcome(),
        Some(Command::Run(args)) => {
            let config = load_config(cli.config.as_deref())?;
            run_review(args, config, cli.format).await?;
        }
        Some(Command::Init) => {
            let path = Path::new(".vigil.toml");
            if path.exists() {
                miette::bail!(".vigil.toml already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created .vigil.toml with default configuration");
        }
        Some(Command::Doctor { ref root }) => {
            if matches!(cli.format, OutputFormat::Sarif | OutputFormat::Github) {
                miette::bail!("doctor supports text, json and markdown output only");
            }
            let config = load_config(cli.config.as_deref())?;
            run_doctor(root, &config, cli.config.as_deref(), cli.format, use_color)?;
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "vigil", &mut std::io::stdout());
        }
    }

    Ok(())
}
