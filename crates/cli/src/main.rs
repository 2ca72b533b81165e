use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use mobilis_core::{Document, FetchConfig, SiteConfigTable, Transcoder, fetch_url};
use owo_colors::OwoColorize;

mod echo;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Transcode web pages into mobile-friendly HTML
#[derive(Parser, Debug)]
#[command(name = "mobilis")]
#[command(author = "Mobilis Contributors")]
#[command(version = "1.0.0")]
#[command(about = "Transcode web pages for mobile rendering", long_about = None)]
struct Args {
    /// URL to fetch, local HTML file, or "-" for stdin
    #[arg(value_name = "INPUT")]
    input: String,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Source URL context for file or stdin input (selects the site
    /// override and feeds page classification)
    #[arg(short, long, value_name = "URL", default_value = "http://localhost/")]
    url: String,

    /// Site configuration file: a JSON object mapping hosts to
    /// configuration patches
    #[arg(long, value_name = "FILE")]
    site_config: Option<PathBuf>,

    /// HTTP timeout in seconds
    #[arg(long, default_value = "30", value_name = "SECS")]
    timeout: u64,

    /// Custom User-Agent for HTTP requests
    #[arg(long, value_name = "UA")]
    user_agent: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.verbose {
        echo::print_banner();
        echo::print_info("Debug logging enabled");
        eprintln!();
    }

    let is_remote = args.input.starts_with("http://") || args.input.starts_with("https://");
    let (html, size) = if args.input == "-" {
        if args.verbose {
            echo::print_step(1, 3, "Reading from stdin");
        }
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        let len = buffer.len();
        (buffer, len)
    } else if is_remote {
        if args.verbose {
            echo::print_step(
                1,
                3,
                &format!("Fetching from {}", args.input.bright_white().underline()),
            );
        }

        let config = FetchConfig {
            timeout: args.timeout,
            user_agent: args
                .user_agent
                .unwrap_or_else(|| "Mozilla/5.0 (compatible; Mobilis/1.0)".to_string()),
        };

        let content = fetch_url(&args.input, &config).await.context("Failed to fetch URL")?;
        let len = content.len();
        (content, len)
    } else {
        if args.verbose {
            echo::print_step(1, 3, &format!("Reading from file {}", args.input.bright_white()));
        }
        let content =
            fs::read_to_string(&args.input).with_context(|| format!("Failed to read file: {}", args.input))?;
        let len = content.len();
        (content, len)
    };

    if args.verbose {
        eprintln!("  {} {}", "Size:".dimmed(), echo::format_size(size).bright_white());
        eprintln!();
    }

    // remote input carries its own URL; local input uses the context flag
    let source_url = if is_remote { args.input.clone() } else { args.url.clone() };

    if args.verbose {
        echo::print_step(2, 3, "Transcoding document");
        eprintln!("  {} {}", "URL:".dimmed(), source_url.bright_white());
    }

    let site_configs = match &args.site_config {
        Some(path) => SiteConfigTable::load_from_file(path)
            .with_context(|| format!("Failed to load site config: {}", path.display()))?,
        None => SiteConfigTable::new(),
    };

    let transcoder = Transcoder::with_site_configs(site_configs).context("Failed to build transcoder")?;
    let doc = Document::parse(&html).context("Failed to parse HTML")?;
    let transcoded = transcoder
        .transcode(&source_url, Some(doc))
        .context("Failed to transcode document")?
        .context("No document produced")?;

    let output = transcoded.to_html();

    if args.verbose {
        eprintln!();
        echo::print_step(3, 3, "Writing output");
        eprintln!("  {} {}", "Size:".dimmed(), echo::format_size(output.len()).bright_white());
        eprintln!();
    }

    match args.output {
        Some(path) => {
            fs::write(&path, output).with_context(|| format!("Failed to write to file: {}", path.display()))?;
            echo::print_success(&format!("Output written to {}", path.display().bright_white()));
        }
        None => {
            print!("{}", output);
        }
    }

    Ok(())
}
