//! Headless driver for one reader surface.
//!
//! Mounts the reader state for a single book, then reads JSON-encoded
//! reader commands from stdin (one per line) and prints a snapshot after
//! each. The last reading position is flushed on end of input and on
//! Ctrl+C.

use anyhow::{Context, Result, anyhow};
use folio_core::config::{FolioConfig, config_path, load_config};
use folio_core::error::{BackendError, StructuredError};
use folio_core::progress::{FileProgressStore, ProgressSynchronizer};
use folio_core::session::ReaderSession;
use folio_core::settings::{FileSlotStore, FitMode, SettingsPersistence, Theme};
use folio_core::store::{OpenSession, ReaderCommand, ReaderStateStore};
use folio_core::surface::{EffectScheduler, PresentationSurface};
use folio_core::BookId;
use serde_json::json;
use std::env;
use std::fs;
use std::sync::{Arc, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::writer::{MakeWriter, OptionalWriter};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

static TRACING_LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static FILE_LOG_WRITER: OnceLock<NonBlocking> = OnceLock::new();

struct DriverArgs {
    book_id: BookId,
    total_pages: usize,
    title: String,
}

/// Surface without a renderer: every applied property is logged.
struct LoggingSurface;

impl PresentationSurface for LoggingSurface {
    fn apply_theme(&self, theme: Theme) {
        info!(?theme, "Surface theme applied");
    }

    fn apply_fit_mode(&self, fit_mode: FitMode) {
        info!(?fit_mode, "Surface fit mode applied");
    }

    fn apply_strip_margin(&self, margin: i32) {
        info!(margin, "Surface strip margin applied");
    }
}

fn main() {
    let reload_handle = init_tracing();
    let config = load_config(&config_path());
    apply_logging_config(&reload_handle, &config);
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("Failed to start async runtime: {err}");
            std::process::exit(1);
        }
    };
    if let Err(err) = runtime.block_on(run(config)) {
        error!("{err:?}");
        std::process::exit(1);
    }
}

async fn run(config: FolioConfig) -> Result<()> {
    let args = parse_args()?;
    let data_dir = config.data_dir();
    fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data dir {}", data_dir.display()))?;
    info!(
        data_dir = %data_dir.display(),
        kind = %config.surface.reader_kind,
        debounce_ms = config.sync.debounce_ms,
        frame_interval_ms = config.surface.frame_interval_ms,
        "Starting Folio reader"
    );

    let persistence = SettingsPersistence::new(
        config.surface.reader_kind,
        FileSlotStore::new(data_dir.join("settings")),
    );
    let effects = Arc::new(EffectScheduler::new(Arc::new(LoggingSurface)));
    let pump = effects.spawn_frame_pump(config.frame_interval());
    let store = Arc::new(ReaderStateStore::new(persistence, effects.clone()));
    let progress =
        ProgressSynchronizer::new(Arc::new(FileProgressStore::new(&data_dir)), config.debounce());
    let session = ReaderSession::new(store.clone(), progress);

    let shutdown = Arc::new(Notify::new());
    let signal = shutdown.clone();
    if let Err(err) = ctrlc::set_handler(move || signal.notify_one()) {
        warn!("Failed to install Ctrl+C signal handler: {err}");
    }

    let restored = session
        .open_book(OpenSession {
            book_id: args.book_id,
            path: format!("book-{}", args.book_id),
            title: args.title,
            total_pages: args.total_pages,
            page_dimensions: None,
        })
        .await;
    if restored.is_none() {
        debug!(book_id = args.book_id, "Starting from the first page");
    }

    let mut stdout = tokio::io::stdout();
    emit(&mut stdout, &serde_json::to_value(store.snapshot())?).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let outcome = loop {
        let line = tokio::select! {
            _ = shutdown.notified() => {
                info!("Received Ctrl+C; flushing reading position");
                break Ok(());
            }
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break Ok(()),
            Err(err) => break Err(anyhow!(err).context("Failed to read command")),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let reply = match serde_json::from_str::<ReaderCommand>(line) {
            Ok(command) => {
                session.dispatch(command).await;
                serde_json::to_value(store.snapshot())?
            }
            Err(err) => {
                warn!("Rejected command: {err}");
                let structured = StructuredError::from(BackendError::Serialization(err));
                json!({ "error": structured })
            }
        };
        if let Err(err) = emit(&mut stdout, &reply).await {
            break Err(err);
        }
    };

    if let Some(saved) = session.close().await {
        info!(
            book_id = saved.book_id,
            location = %saved.location,
            percent = saved.percent,
            "Final reading position saved"
        );
    }
    effects.run_frame();
    pump.abort();
    outcome
}

async fn emit(stdout: &mut tokio::io::Stdout, value: &serde_json::Value) -> Result<()> {
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    stdout
        .write_all(&line)
        .await
        .context("Failed to write to stdout")?;
    stdout.flush().await.context("Failed to flush stdout")?;
    Ok(())
}

fn parse_args() -> Result<DriverArgs> {
    const USAGE: &str = "Usage: folio-reader <book-id> <total-pages> [title]";
    let mut args = env::args().skip(1);
    let book_id = args
        .next()
        .ok_or_else(|| anyhow!(USAGE))?
        .parse::<BookId>()
        .context("book id must be an integer")?;
    let total_pages = args
        .next()
        .ok_or_else(|| anyhow!(USAGE))?
        .parse::<usize>()
        .context("total pages must be a non-negative integer")?;
    let title = args.next().unwrap_or_else(|| format!("Book {book_id}"));
    Ok(DriverArgs {
        book_id,
        total_pages,
        title,
    })
}

fn log_timestamp_slug() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(now) => format!("{}-{:03}", now.as_secs(), now.subsec_millis()),
        Err(_) => "0-000".to_string(),
    }
}

/// File sink that stays silent until [`enable_file_logging`] installs a writer.
struct DeferredFileWriter;

impl<'a> MakeWriter<'a> for DeferredFileWriter {
    type Writer = OptionalWriter<NonBlocking>;

    fn make_writer(&'a self) -> Self::Writer {
        match FILE_LOG_WRITER.get() {
            Some(writer) => OptionalWriter::some(writer.clone()),
            None => OptionalWriter::none(),
        }
    }
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(DeferredFileWriter)
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
    handle
}

fn apply_logging_config(handle: &ReloadHandle, config: &FolioConfig) {
    if env::var_os("RUST_LOG").is_none() {
        set_log_level(handle, config.logging.level.as_filter_str());
    }
    if let Some(log_dir) = config.logging.log_dir.as_deref() {
        enable_file_logging(log_dir);
    }
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(err) = handle.reload(parsed) {
        warn!(%level, "Failed to update log level from config: {err}");
    } else {
        debug!(%level, "Applied configured log level");
    }
}

fn enable_file_logging(log_dir: &str) {
    if let Err(err) = fs::create_dir_all(log_dir) {
        warn!(log_dir, "Failed to create tracing logs dir: {err}");
        return;
    }
    let file_name = format!("folio-{}.log", log_timestamp_slug());
    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let _ = TRACING_LOG_GUARD.set(guard);
    let _ = FILE_LOG_WRITER.set(file_writer);
    info!(log_dir, "Enabled file logging");
}
