use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vicmd::{BatchFrontend, ExContext, Frame, MacroStore, Session};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// File to edit
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Create the file if it does not exist
    #[arg(short = 'c', long)]
    create: bool,

    /// Script of ex commands to source before reading stdin
    #[arg(short = 'i', long, value_name = "FILE")]
    init: Option<PathBuf>,

    /// Macro, abbreviation and variable store
    #[arg(long, value_name = "FILE")]
    store: Option<PathBuf>,

    /// Do not read or write the store
    #[arg(long, conflicts_with = "store")]
    no_store: bool,

    /// Open in read-only mode
    #[arg(short = 'r', long)]
    read_only: bool,
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("VICMD_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn store_path(args: &Args) -> Option<PathBuf> {
    if args.no_store {
        return None;
    }
    args.store
        .clone()
        .or_else(|| dirs::config_dir().map(|dir| dir.join("vicmd").join("macros.json")))
}

fn read_file(path: &Path, create: bool) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(err) if create && err.kind() == io::ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
    }
}

/// Keep the previous version as `FILE~1`, then write the buffer.
fn write_back(path: &Path, text: &str) -> Result<()> {
    if path.exists() {
        let mut backup = path.as_os_str().to_owned();
        backup.push("~1");
        fs::rename(path, &backup).with_context(|| format!("failed to back up {}", path.display()))?;
    }
    fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
    println!(
        "{} written ({} line{}).",
        path.display(),
        text.lines().count(),
        if text.lines().count() == 1 { "" } else { "s" }
    );
    Ok(())
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging();

    let mut ctx = match store_path(&args) {
        Some(path) => ExContext::new(MacroStore::new(path)),
        None => ExContext::in_memory(),
    };
    if let Err(err) = ctx.load() {
        warn!("store not loaded: {err:#}");
    }

    let text = match args.file.as_deref() {
        Some(path) => read_file(path, args.create)?,
        None => String::new(),
    };
    let frame = Frame::from_str(&text).with_read_only(args.read_only);
    let mut session = Session::new(frame, BatchFrontend::new(true));
    if let Some(path) = &args.file {
        session = session.with_filename(path);
    }

    let mut failed = false;
    if let Some(init) = &args.init {
        failed = session
            .execute(&mut ctx, &format!("so {}", init.display()))
            .is_failure();
    }

    if !failed {
        for line in io::stdin().lock().lines() {
            let line = line.context("failed to read stdin")?;
            if session.execute(&mut ctx, &line).is_failure() {
                failed = true;
                break;
            }
        }
    }

    if failed {
        println!("\x07COMMAND FAILED");
    } else if let Some(path) = &args.file
        && !args.read_only
    {
        write_back(path, &session.buffer().text())?;
    }
    ctx.flush().context("failed to save the store")?;
    info!(failed, "done");

    Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}
