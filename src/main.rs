//! CLI entry point for `maildex`.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use maildex::cache::FileHeaderCache;
use maildex::cancel::CancelToken;
use maildex::config::{self, Config};
use maildex::maildir::{self, sequences::MhSequenceFile, ScanContext, ScanOutcome};
use maildex::model::Mailbox;
use maildex::parser::Rfc5322Parser;

#[derive(Parser)]
#[command(name = "maildex", version, about = "Scan and index Maildir and MH mailboxes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a mailbox and summarize its index
    Scan {
        path: PathBuf,
        /// Print the index as JSON
        #[arg(long)]
        json: bool,
        /// Parse every message, ignoring the header cache
        #[arg(long)]
        no_cache: bool,
    },
    /// Mark every message read and write the flags back to disk
    MarkRead { path: PathBuf },
    /// Count messages from filenames only
    Stats {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    let cancel = CancelToken::new();
    install_interrupt_handler(&cancel);

    match cli.command {
        Commands::Scan {
            path,
            json,
            no_cache,
        } => cmd_scan(&path, json, no_cache, &config, &cancel),
        Commands::MarkRead { path } => cmd_mark_read(&path, &config, &cancel),
        Commands::Stats { path, json } => cmd_stats(&path, json, &config),
        Commands::Init { force } => cmd_init(force),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_file = config::log_file_path(config);
    let log_dir = log_file.parent().map(Path::to_path_buf);
    match log_dir {
        Some(dir) if std::fs::create_dir_all(&dir).is_ok() => {
            let file_appender = tracing_appender::rolling::never(&dir, "maildex.log");
            let file_layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_appender);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .with(file_layer)
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .init();
        }
    }
}

#[cfg(unix)]
static INTERRUPT: std::sync::OnceLock<CancelToken> = std::sync::OnceLock::new();

#[cfg(unix)]
extern "C" fn on_sigint(_: nix::libc::c_int) {
    if let Some(token) = INTERRUPT.get() {
        token.cancel();
    }
}

/// Route Ctrl-C to `token`. A scan in progress stops at the next
/// directory entry and reports what it has read.
#[cfg(unix)]
fn install_interrupt_handler(token: &CancelToken) {
    use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

    if INTERRUPT.set(token.clone()).is_err() {
        return;
    }
    let action = SigAction::new(
        SigHandler::Handler(on_sigint),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    // SAFETY: the handler only performs an atomic store.
    if let Err(e) = unsafe { sigaction(Signal::SIGINT, &action) } {
        tracing::warn!(error = %e, "Could not install SIGINT handler");
    }
}

#[cfg(not(unix))]
fn install_interrupt_handler(_token: &CancelToken) {}

/// Write a default configuration file to the standard location.
fn cmd_init(force: bool) -> anyhow::Result<()> {
    let path = config::config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    config::save_config(&Config::default(), &path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "maildex", &mut std::io::stdout());
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

/// Read a mailbox and print its summary.
fn cmd_scan(
    path: &Path,
    json: bool,
    no_cache: bool,
    config: &Config,
    cancel: &CancelToken,
) -> anyhow::Result<()> {
    if !path.exists() {
        anyhow::bail!("Mailbox not found: {}", path.display());
    }

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Reading [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );
    let progress = |pos: usize, total: Option<usize>| {
        if let Some(total) = total {
            pb.set_length(total as u64);
        }
        pb.set_position(pos as u64);
    };

    let parser = Rfc5322Parser;
    let sequences = MhSequenceFile::new(&config.mh);
    let mut cache = (config.header_cache.enabled && !no_cache)
        .then(|| FileHeaderCache::open(&config::header_cache_path(config), path));
    if let Some(cache) = cache.as_ref() {
        tracing::debug!(path = %cache.path().display(), entries = cache.len(), "Header cache opened");
    }

    let start = Instant::now();
    let mut ctx = ScanContext::new(config, cancel, &parser, &sequences).with_progress(&progress);
    if let Some(cache) = cache.as_mut() {
        ctx = ctx.with_cache(cache);
    }
    let result = maildir::open_mailbox(path, &mut ctx);
    drop(ctx);
    pb.finish_and_clear();
    let elapsed = start.elapsed();

    if let Some(cache) = cache {
        if let Err(e) = cache.close() {
            tracing::warn!(error = %e, "Failed to write header cache");
        }
    }

    let (mailbox, outcome) =
        result.with_context(|| format!("Failed to read {}", path.display()))?;

    if json {
        print_scan_json(&mailbox, outcome, elapsed)?;
    } else {
        print_scan_table(&mailbox, outcome, elapsed);
    }
    Ok(())
}

/// Mark all messages of a mailbox read and sync the change to disk.
fn cmd_mark_read(path: &Path, config: &Config, cancel: &CancelToken) -> anyhow::Result<()> {
    let parser = Rfc5322Parser;
    let sequences = MhSequenceFile::new(&config.mh);
    let mut ctx = ScanContext::new(config, cancel, &parser, &sequences);
    let (mut mailbox, outcome) = maildir::open_mailbox(path, &mut ctx)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    if outcome.is_aborted() {
        anyhow::bail!("Interrupted while reading {}", path.display());
    }

    let mut marked = 0;
    for idx in 0..mailbox.count() {
        let Some(mut flags) = mailbox.messages.get(idx).map(|m| m.flags) else {
            continue;
        };
        flags.read = true;
        if mailbox.set_flags(idx, flags) {
            marked += 1;
        }
    }
    mailbox.update_counters();

    let synced = maildir::sync_mailbox(&mut mailbox, &config.mh)
        .with_context(|| format!("Failed to write flags in {}", mailbox.path().display()))?;
    println!("Marked {marked} message(s) read, {synced} written back.");
    Ok(())
}

/// Show filename-based statistics for a mailbox.
fn cmd_stats(path: &Path, json: bool, config: &Config) -> anyhow::Result<()> {
    let kind = maildir::detect_kind(path)
        .ok_or_else(|| anyhow::anyhow!("Not a Maildir or MH mailbox: {}", path.display()))?;
    let sequences = MhSequenceFile::new(&config.mh);
    let stats = maildir::mailbox_stats(path, kind, &sequences)?;

    if json {
        let output = serde_json::json!({
            "mailbox": path.to_string_lossy(),
            "kind": kind,
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!();
        println!("  {:<12} {}", "Mailbox", path.display());
        println!("  {:<12} {}", "Kind", kind);
        println!("  {:<12} {}", "Messages", stats.count);
        println!("  {:<12} {}", "Unread", stats.unread);
        println!("  {:<12} {}", "New", stats.new);
        println!("  {:<12} {}", "Flagged", stats.flagged);
        println!();
    }
    Ok(())
}

/// Print the scan summary in a human-readable table.
fn print_scan_table(mailbox: &Mailbox, outcome: ScanOutcome, elapsed: std::time::Duration) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  {:<12} {}", "Mailbox", mailbox.path.display());
    println!("  {:<12} {}", "Kind", mailbox.kind);
    println!("  {:<12} {}", "Messages", mailbox.count());
    println!("  {:<12} {}", "Size", format_size(mailbox.size, BINARY));
    println!("  {:<12} {}", "Unread", mailbox.unread);
    println!("  {:<12} {}", "New", mailbox.new);
    println!("  {:<12} {}", "Flagged", mailbox.flagged);
    println!("  {:<12} {}", "Deleted", mailbox.deleted);
    println!("  {:<12} {:.2?}", "Scan time", elapsed);
    if outcome.is_aborted() {
        println!();
        println!("  Interrupted: only {} message(s) were read.", outcome.added());
    }
    println!();
}

/// Print the scan result and every message as JSON.
fn print_scan_json(
    mailbox: &Mailbox,
    outcome: ScanOutcome,
    elapsed: std::time::Duration,
) -> anyhow::Result<()> {
    let messages: Vec<serde_json::Value> = mailbox
        .messages
        .iter()
        .map(|m| {
            serde_json::json!({
                "index": m.index,
                "path": m.path,
                "flags": m.flags,
                "from": m.envelope.from,
                "subject": m.envelope.subject,
                "message_id": m.envelope.message_id,
                "date": m.date_sent.to_rfc3339(),
                "received": m.received.to_rfc3339(),
                "size": m.size,
                "body_size": m.body_len(),
            })
        })
        .collect();

    let output = serde_json::json!({
        "mailbox": mailbox.path.to_string_lossy(),
        "kind": mailbox.kind,
        "aborted": outcome.is_aborted(),
        "message_count": mailbox.count(),
        "size": mailbox.size,
        "unread": mailbox.unread,
        "flagged": mailbox.flagged,
        "deleted": mailbox.deleted,
        "scan_time_ms": elapsed.as_millis(),
        "messages": messages,
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
