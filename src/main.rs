use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use depscan::{
    config::Config,
    logging::init_tracing,
    manifest::manifest_patterns,
    model::{Ecosystem, ScanResult, Severity},
    output::{format_result_to_string, print_result, OutputFormat},
    scanner::{collect_manifest_files, DependencyScanner},
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;

/// Exit codes for CI integration
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const CRITICAL_VULN: u8 = 2;
    pub const HIGH_VULN: u8 = 3;
    pub const MEDIUM_VULN: u8 = 4;
    pub const LOW_VULN: u8 = 5;
    pub const ERROR: u8 = 1;
}

#[derive(Parser)]
#[command(name = "depscan")]
#[command(
    author,
    version,
    about = "Scan dependency manifests for known vulnerabilities"
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan manifest files or directories
    Scan {
        /// Files or directories to scan (default: current directory)
        paths: Vec<PathBuf>,

        /// Output format (table, json, sarif)
        #[arg(short, long)]
        format: Option<String>,

        /// Write output to file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Exit with error if vulnerabilities at or above this severity are found
        #[arg(long, value_enum)]
        fail_on: Option<FailLevel>,

        /// Vulnerability database base URL
        #[arg(long)]
        api_url: Option<String>,
    },

    /// List supported ecosystems and the manifests recognised for each
    ListEcosystems,

    /// Show or create config file
    Config {
        /// Generate default config file
        #[arg(long)]
        init: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FailLevel {
    Critical,
    High,
    Medium,
    Low,
}

impl FailLevel {
    fn threshold(self) -> Severity {
        match self {
            FailLevel::Critical => Severity::Critical,
            FailLevel::High => Severity::High,
            FailLevel::Medium => Severity::Medium,
            FailLevel::Low => Severity::Low,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

async fn run() -> Result<u8> {
    let cli = Cli::parse();
    let mut config = Config::load()?;

    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    init_tracing(&config.logging)?;

    match cli.command {
        Commands::Scan {
            paths,
            format,
            output,
            fail_on,
            api_url,
        } => {
            if let Some(url) = api_url {
                config.api_url = url;
            }
            let format_str = format.unwrap_or(config.default_format.clone());
            run_scan(&config, paths, &format_str, output, fail_on).await
        }
        Commands::ListEcosystems => {
            list_ecosystems();
            Ok(exit_codes::SUCCESS)
        }
        Commands::Config { init, path } => {
            handle_config(init, path)?;
            Ok(exit_codes::SUCCESS)
        }
    }
}

async fn run_scan(
    config: &Config,
    paths: Vec<PathBuf>,
    format: &str,
    output_file: Option<PathBuf>,
    fail_on: Option<FailLevel>,
) -> Result<u8> {
    let format = OutputFormat::from_str(format).map_err(|e| anyhow::anyhow!(e))?;
    let is_interactive = format == OutputFormat::Table && output_file.is_none();

    let paths = if paths.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        paths
    };
    let files = collect_manifest_files(&paths)?;

    let progress = if is_interactive {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message(format!("Checking {} manifest files for vulnerabilities...", files.len()));
        Some(pb)
    } else {
        None
    };

    let scanner = DependencyScanner::from_config(config);
    let result = scanner.scan(&files).await;

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    // Handle output
    if let Some(path) = output_file {
        std::fs::write(&path, format_result_to_string(&result, format)?)?;
        eprintln!("Results written to: {}", path.display());
    } else {
        print_result(&result, format)?;
    }

    Ok(determine_exit_code(&result, fail_on))
}

/// Determine the exit code based on vulnerabilities found and --fail-on setting
fn determine_exit_code(result: &ScanResult, fail_on: Option<FailLevel>) -> u8 {
    if !result.success {
        return exit_codes::ERROR;
    }

    let Some(fail_on) = fail_on else {
        return exit_codes::SUCCESS;
    };

    match result.worst_severity() {
        Some(worst) if worst.is_at_least(fail_on.threshold()) => match worst {
            Severity::Critical => exit_codes::CRITICAL_VULN,
            Severity::High => exit_codes::HIGH_VULN,
            Severity::Medium => exit_codes::MEDIUM_VULN,
            Severity::Low => exit_codes::LOW_VULN,
            Severity::Unknown => exit_codes::SUCCESS,
        },
        _ => exit_codes::SUCCESS,
    }
}

fn list_ecosystems() {
    println!("Supported ecosystems:");
    println!();

    for ecosystem in Ecosystem::ALL {
        println!("  {:<12} {}", ecosystem.as_str(), ecosystem.display_name());
        println!("  {:<12} Manifests: {}", "", manifest_patterns(ecosystem));
        println!();
    }
}

fn handle_config(init: bool, show_path: bool) -> Result<()> {
    let config_path = Config::config_path();

    if show_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if config_path.exists() {
            println!("Config file already exists at: {}", config_path.display());
            return Ok(());
        }

        let config = Config::default();
        config.save()?;
        println!("Created config file at: {}", config_path.display());
        println!();
        println!("Default configuration:");
        println!("{}", Config::generate_default_config());
        return Ok(());
    }

    // Show current config
    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        println!("Config file: {}", config_path.display());
        println!();
        println!("{}", content);
    } else {
        println!("No config file found.");
        println!("Run 'depscan config --init' to create one.");
        println!();
        println!("Config path: {}", config_path.display());
    }

    Ok(())
}
