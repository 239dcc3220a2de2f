use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use remini::task::FeatureRequest;
use remini::{Remini, config, pipeline};

#[derive(Parser, Debug)]
#[command(
    name = "remini",
    version,
    about = "Enhance or stylize images through the Remini mobile API"
)]
struct Cli {
    /// Image files or directories to process
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Apply a style pipeline (e.g. "toon") on top of the enhancement
    #[arg(short, long, value_name = "STYLE_ID")]
    style: Option<String>,

    /// Output file (only with a single input image)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Path to config file (default: config.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default config.json and exit
    #[arg(long)]
    init: bool,

    /// Where to cache the session token (overrides config)
    #[arg(long, value_name = "FILE")]
    token_file: Option<PathBuf>,

    /// Give up polling a task after this many seconds (0 = never)
    #[arg(long, value_name = "SECS")]
    max_wait: Option<u64>,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

// ANSI color codes
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let config = config::Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => config::Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    if cli.paths.is_empty() {
        anyhow::bail!("No input files or directories specified. Use --help for usage.");
    }

    // Load config and apply CLI overrides
    let mut config = config::Config::load(cli.config.as_deref())?;
    if let Some(ref token_file) = cli.token_file {
        config.token_path = Some(token_file.clone());
    }
    if let Some(max_wait) = cli.max_wait {
        config.polling.max_wait_secs = max_wait;
    }

    let images = pipeline::collect_images(&cli.paths);
    if images.is_empty() {
        anyhow::bail!("No supported image files found in the specified paths.");
    }
    if cli.output.is_some() && images.len() > 1 {
        anyhow::bail!("--output can only be used with a single input image ({} found).", images.len());
    }

    let feature = match cli.style {
        Some(ref style) => FeatureRequest::stylize(style.clone()),
        None => FeatureRequest::Enhance,
    };

    let client = Remini::new(&config)?;

    // Ctrl-C aborts the task currently being polled
    let cancel = client.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling...");
            cancel.cancel();
        }
    });

    log::info!("Found {} image(s) to process", images.len());

    let mut results = Vec::new();
    let total = images.len();

    for (i, image_path) in images.iter().enumerate() {
        log::info!(
            "[{}/{}] Processing: {}",
            i + 1,
            total,
            image_path.display()
        );

        let result =
            pipeline::process_image(&client, image_path, &feature, cli.output.as_deref()).await;

        match (&result.output_path, &result.error) {
            (_, Some(err)) => log::error!("  {RED}Error:{RESET} {err}"),
            (Some(out), None) => log::info!("  {GREEN}Saved:{RESET} {}", out.display()),
            (None, None) => {}
        }

        let cancelled = client.cancellation_token().is_cancelled();
        results.push(result);
        if cancelled {
            log::warn!("{DIM}Skipping remaining images{RESET}");
            break;
        }
    }

    // JSON output
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    }

    // Summary
    let success = results.iter().filter(|r| r.error.is_none()).count();
    let failed = results.len() - success;
    log::info!("Done: {success} succeeded, {failed} failed out of {total} images");

    if failed > 0 {
        anyhow::bail!("{failed} image(s) failed");
    }
    Ok(())
}
