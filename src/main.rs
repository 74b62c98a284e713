use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "po-translator-rust",
    version,
    about = "Translate pending gettext catalog entries with a local LLM"
)]
struct Cli {
    /// Catalog to translate (default: fr.po)
    #[arg(short = 'i', long = "input")]
    input: Option<String>,

    /// Finished catalog whose translations are reused by context (default: strings.po)
    #[arg(short = 'o', long = "original")]
    original: Option<String>,

    /// Directory for the checkpoint and final catalogs (default: output)
    #[arg(short = 'd', long = "output-dir")]
    output_dir: Option<String>,

    /// Chat completions URL
    #[arg(short = 'u', long = "api-url")]
    api_url: Option<String>,

    /// Model identifier sent with every request
    #[arg(short = 'm', long = "model")]
    model: Option<String>,

    /// Bearer token for the endpoint (overrides PO_TRANSLATOR_API_KEY)
    #[arg(short = 'k', long = "api-key")]
    api_key: Option<String>,

    /// Write a checkpoint after this many entries
    #[arg(long = "save-interval")]
    save_interval: Option<usize>,

    /// Pause in milliseconds after each request
    #[arg(long = "request-delay")]
    request_delay: Option<u64>,

    /// Request timeout in milliseconds
    #[arg(long = "timeout")]
    timeout: Option<u64>,

    /// Maximum number of messages kept in the conversation window
    #[arg(long = "max-history")]
    max_history: Option<usize>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "settings")]
    settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    po_translator_rust::logging::init(cli.verbose)?;

    let summary = po_translator_rust::run(po_translator_rust::Config {
        settings_path: cli.settings,
        input: cli.input,
        original: cli.original,
        output_dir: cli.output_dir,
        api_url: cli.api_url,
        model: cli.model,
        api_key: cli.api_key,
        save_interval: cli.save_interval,
        request_delay_ms: cli.request_delay,
        timeout_ms: cli.timeout,
        max_history: cli.max_history,
    })
    .await?;

    println!(
        "{}/{} entries processed -> {}",
        summary.succeeded,
        summary.total,
        summary.output.display()
    );
    Ok(())
}
