//! CLI entry point for `mailpart`.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mailpart::config::{Config, DecodeConfig};
use mailpart::model::context::MessageContext;
use mailpart::model::message::DecodedMessage;
use mailpart::parser::part::MimePart;

#[derive(Parser)]
#[command(
    name = "mailpart",
    version,
    about = "Decode mail messages into text bodies and attachments"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode one or more .eml files
    Decode {
        /// Raw RFC 822 messages; each file stem is used as the message id
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,
        /// Write attachments under this directory (YYYY/MM layout)
        #[arg(short, long, value_name = "DIR", env = "MAILPART_ATTACHMENTS_DIR")]
        output: Option<PathBuf>,
        /// Classify attachments but do not decode or write them
        #[arg(long)]
        skip_attachments: bool,
        /// Fail on non-text parts without a transfer encoding
        #[arg(long)]
        strict_encoding: bool,
        /// Fail when a message date cannot be parsed
        #[arg(long)]
        strict_dates: bool,
        /// Point cid: links in the HTML body at this URI (JSON output)
        #[arg(long, value_name = "URI")]
        link_base: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Show the effective configuration
    Config {
        /// Write it to the config file
        #[arg(long)]
        write: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

/// One decoded input file.
struct Decoded {
    path: PathBuf,
    context: MessageContext,
    message: DecodedMessage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = mailpart::config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Decode {
            files,
            output,
            skip_attachments,
            strict_encoding,
            strict_dates,
            link_base,
            json,
        } => {
            let decode_config = DecodeConfig {
                skip_attachments: skip_attachments || config.decode.skip_attachments,
                strict_encoding: strict_encoding || config.decode.strict_encoding,
                strict_dates: strict_dates || config.decode.strict_dates,
                attachments_dir: output.or_else(|| config.decode.attachments_dir.clone()),
            };
            cmd_decode(&files, &decode_config, link_base.as_deref(), json)
        }
        Commands::Config { write } => cmd_config(&config, write),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and a log file in the log directory.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = mailpart::config::log_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailpart.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Print the effective configuration, optionally saving it.
fn cmd_config(config: &Config, write: bool) -> anyhow::Result<()> {
    let path = mailpart::config::config_file_path();
    println!(
        "# {}",
        path.as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<no config location>".to_string())
    );
    print!("{}", toml::to_string_pretty(config)?);

    if write {
        mailpart::config::save_config(config)?;
        if let Some(path) = path {
            eprintln!("  Saved {}", path.display());
        }
    }
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailpart", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Decode every file and print the results.
fn cmd_decode(
    files: &[PathBuf],
    config: &DecodeConfig,
    link_base: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    for path in files {
        if !path.is_file() {
            anyhow::bail!("File not found: {}", path.display());
        }
    }

    let start = Instant::now();
    let pb = if files.len() > 1 {
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} Decoding [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .expect("valid template")
                .progress_chars("#>-"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let mut decoded = Vec::with_capacity(files.len());
    for path in files {
        pb.set_message(file_label(path));
        decoded.push(decode_file(path, config)?);
        pb.inc(1);
    }
    pb.finish_and_clear();
    let elapsed = start.elapsed();

    if json {
        print_decoded_json(&decoded, link_base)
    } else {
        print_decoded_table(&decoded, config, elapsed);
        Ok(())
    }
}

fn decode_file(path: &Path, config: &DecodeConfig) -> anyhow::Result<Decoded> {
    let raw = std::fs::read(path)?;
    let root = MimePart::parse(&raw);
    let context = MessageContext::from_headers(file_label(path), root.headers());
    let message = mailpart::decode(&context, &root, config)
        .map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))?;

    tracing::info!(
        file = %path.display(),
        attachments = message.attachments().len(),
        "Message decoded"
    );
    Ok(Decoded {
        path: path.to_path_buf(),
        context,
        message,
    })
}

/// The message id used for a file: its stem.
fn file_label(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Print decode results as a human-readable table.
fn print_decoded_table(decoded: &[Decoded], config: &DecodeConfig, elapsed: std::time::Duration) {
    use humansize::{format_size, BINARY};

    for d in decoded {
        let msg = &d.message;
        println!();
        println!("  {}", d.path.display());
        println!("  {:<14} {}", "Subject", d.context.subject);
        println!("  {:<14} {}", "From", d.context.from_address);
        println!("  {:<14} {}", "Date", d.context.date);
        println!("  {:<14} {}", "Charset", msg.charset);
        println!(
            "  {:<14} {}",
            "Plain text",
            format_size(msg.text_plain.len(), BINARY)
        );
        println!("  {:<14} {}", "HTML", format_size(msg.text_html.len(), BINARY));

        if msg.attachments().is_empty() {
            continue;
        }
        println!();
        println!(
            "  {:<32}  {:>10}  {:<24}  {}",
            "ID", "Size", "Type", "File"
        );
        println!("  {}", "-".repeat(96));
        for att in msg.attachments() {
            let file = att
                .location
                .as_ref()
                .map(|l| l.relative_path.as_str())
                .unwrap_or(att.filename.as_str());
            println!(
                "  {:<32}  {:>10}  {:<24}  {}",
                truncate(att.id.as_deref().unwrap_or_default(), 32),
                format_size(att.size(), BINARY),
                truncate(att.mime_type.as_deref().unwrap_or("-"), 24),
                file
            );
        }
    }

    let total: usize = decoded.iter().map(|d| d.message.attachments().len()).sum();
    println!();
    match &config.attachments_dir {
        Some(dir) if !config.skip_attachments => println!(
            "  {} message(s), {} attachment(s) written to {} in {:.2}s",
            decoded.len(),
            total,
            dir.display(),
            elapsed.as_secs_f64()
        ),
        _ => println!(
            "  {} message(s), {} attachment(s) in {:.2}s",
            decoded.len(),
            total,
            elapsed.as_secs_f64()
        ),
    }
    println!();
}

/// Print decode results as JSON.
fn print_decoded_json(decoded: &[Decoded], link_base: Option<&str>) -> anyhow::Result<()> {
    let messages: Vec<serde_json::Value> = decoded
        .iter()
        .map(|d| {
            let msg = &d.message;
            let html = match link_base {
                Some(base) => msg.replace_internal_links(base),
                None => msg.text_html.clone(),
            };
            let records: Vec<_> = msg.attachments().iter().map(|a| a.to_record()).collect();
            let inline: Vec<&str> = msg
                .internal_link_placeholders()
                .into_iter()
                .map(|(cid, _)| cid)
                .filter_map(|cid| msg.attachment(&cid).map(|a| a.filename.as_str()))
                .collect();
            serde_json::json!({
                "file": d.path.to_string_lossy(),
                "context": d.context,
                "charset": msg.charset,
                "text_plain": msg.text_plain,
                "text_html": html,
                "attachments": records,
                "inline_attachments": inline,
            })
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&messages)?);
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{truncated}…")
    }
}
