use anyhow::anyhow;
use chheader::config::Config;
use chheader::pattern::{detect_format, evaluate, generate_examples, validate_pattern};
use chheader::rules::{build_rules, installable_profile, sync_profile};
use chheader::store::FileRuleStore;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "chheader",
    about = "Compile header-rewrite profiles into declarative network rules",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Log format (text, json)
    #[arg(long)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate default configuration file
    Init {
        /// Output file path
        #[arg(short, long, default_value = "config.yaml")]
        output: PathBuf,
    },
    /// Print the compiled rules of a profile as JSON
    Compile {
        /// Profile id (defaults to the active profile)
        #[arg(short, long)]
        profile: Option<String>,
    },
    /// Compile the active profile and install its rules
    Apply,
    /// Make a profile active, save the config and install its rules
    Activate {
        /// Profile id
        id: String,
    },
    /// Validate a URL filter and test it against URLs
    Check {
        /// URL filter pattern
        pattern: String,
        /// Candidate URLs
        urls: Vec<String>,
    },
    /// Re-apply rules whenever the configuration file changes
    Watch {
        /// Poll interval in milliseconds
        #[arg(long, default_value_t = 500)]
        interval_ms: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        Config::default()
    };

    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    config.expand_paths();

    setup_logging(&config)?;

    match cli.command {
        Commands::Init { output } => {
            info!("Creating default configuration at {:?}", output);
            Config::create_default(&output)?;
            println!("Configuration file created: {:?}", output);
            println!("\nEdit this file to define your profiles.");
        }
        Commands::Compile { profile } => {
            let profile = match profile {
                Some(id) => Some(
                    config
                        .profiles
                        .get(&id)
                        .ok_or_else(|| anyhow!("Unknown profile: {}", id))?,
                ),
                None => config.profiles.active_profile(),
            };
            let installable = profile.and_then(installable_profile);
            let rules = build_rules(installable.as_ref());
            println!("{}", serde_json::to_string_pretty(&rules)?);
        }
        Commands::Apply => {
            apply_active(&config).await?;
        }
        Commands::Activate { id } => {
            // Overrides and expanded paths stay out of the saved file.
            Config::activate_saved(&cli.config, &id)?;
            config.activate(&id)?;
            println!("Active profile: {}", id);
            apply_active(&config).await?;
        }
        Commands::Check { pattern, urls } => {
            check_pattern(&pattern, &urls);
        }
        Commands::Watch { interval_ms } => {
            watch(&cli.config, config, Duration::from_millis(interval_ms)).await?;
        }
    }

    Ok(())
}

fn rule_store(config: &Config) -> FileRuleStore {
    FileRuleStore::with_max_rules(&config.rule_store.path, config.rule_store.max_rules)
}

async fn apply_active(config: &Config) -> anyhow::Result<()> {
    let store = rule_store(config);
    let report = sync_profile(&store, config.profiles.active_profile()).await?;
    println!(
        "Applied {} rule(s), removed {} old rule(s) in {}",
        report.applied,
        report.removed,
        store.path().display()
    );
    if !report.skipped_duplicates.is_empty() {
        println!("Skipped duplicate rule ids: {:?}", report.skipped_duplicates);
    }
    Ok(())
}

fn check_pattern(pattern: &str, urls: &[String]) {
    let format = detect_format(pattern);
    println!("Format:  {}", format);
    println!("Help:    {}", format.help());

    match validate_pattern(pattern) {
        Ok(_) => println!("Valid:   yes"),
        Err(e) => println!("Valid:   no ({})", e),
    }

    let examples = generate_examples(pattern);
    if !examples.is_empty() {
        println!("Examples:");
        for example in examples {
            println!("  {}", example);
        }
    }

    for url in urls {
        let verdict = if evaluate(pattern, url) { "match" } else { "no match" };
        println!("{:<9} {}", verdict, url);
    }
}

async fn watch(config_path: &Path, config: Config, interval: Duration) -> anyhow::Result<()> {
    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        info!("Received Ctrl+C, stopping watch...");
        shutdown_token.cancel();
    });

    apply_active(&config).await?;
    let mut last_modified = modified_time(config_path).await;
    let mut ticker = tokio::time::interval(interval);
    info!("Watching {:?} for changes", config_path);

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = ticker.tick() => {
                let modified = modified_time(config_path).await;
                if modified == last_modified {
                    continue;
                }
                last_modified = modified;

                let mut config = match Config::load(config_path) {
                    Ok(config) => config,
                    Err(e) => {
                        error!("Failed to reload configuration: {}", e);
                        continue;
                    }
                };
                config.expand_paths();

                if let Err(e) = apply_active(&config).await {
                    error!("Failed to apply rules: {}", e);
                }
            }
        }
    }

    info!("Watch stopped");
    Ok(())
}

async fn modified_time(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path).await.ok()?.modified().ok()
}

fn setup_logging(config: &Config) -> anyhow::Result<()> {
    let level = match config.logging.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if config.logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    Ok(())
}
