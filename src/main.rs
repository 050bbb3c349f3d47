use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use gridwatch::config::der_filter;
use gridwatch::data::duration::parse_duration;
use gridwatch::{
    events, ui, ApiKey, App, AppOptions, ConfigError, ConstraintData, CsvRecorder, DataSource,
    DisplayState, FileSource, OdpClient, OdpSource, Settings,
};

#[derive(Parser, Debug)]
#[command(name = "gridwatch")]
#[command(about = "Live terminal dashboard for network constraints on UKPN's Open Data Portal")]
struct Args {
    /// Settings file (TOML). Defaults to gridwatch.toml if present
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Replay a saved portal response instead of calling the API
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Only show constraints for this DER site
    #[arg(short, long)]
    der: Option<String>,

    /// Poll interval (e.g., "30s", "1m")
    #[arg(short, long)]
    interval: Option<String>,

    /// Number of constraints plotted on the chart
    #[arg(short, long)]
    top: Option<usize>,

    /// Fetch one batch, print it and exit
    #[arg(long, conflicts_with = "export")]
    once: bool,

    /// Fetch one batch, export it to a JSON file and exit
    #[arg(short, long)]
    export: Option<PathBuf>,

    /// Do not append fetched records to the CSV log
    #[arg(long)]
    no_record: bool,

    /// Log file used while the dashboard is running
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Args {
    /// Apply flags on top of the resolved settings.
    fn apply(&self, settings: &mut Settings) -> Result<(), ConfigError> {
        if let Some(ref der) = self.der {
            // A blank flag clears a site set in the settings file
            settings.der_name = der_filter(der);
        }
        if let Some(ref interval) = self.interval {
            let interval = parse_duration(interval).map_err(|e| ConfigError::Invalid {
                key: "interval",
                message: e.to_string(),
            })?;
            if interval.is_zero() {
                return Err(ConfigError::Invalid {
                    key: "interval",
                    message: "must be greater than zero".to_string(),
                });
            }
            settings.poll_interval = interval;
        }
        if let Some(top) = self.top {
            if top == 0 {
                return Err(ConfigError::Invalid {
                    key: "top",
                    message: "must be at least 1".to_string(),
                });
            }
            settings.top_n = top;
        }
        if self.no_record {
            settings.record_csv = false;
        }
        if let Some(ref log_file) = self.log_file {
            settings.log_file = log_file.clone();
        }
        Ok(())
    }

    /// Whether the dashboard takes over the terminal.
    fn interactive(&self) -> bool {
        !self.once && self.export.is_none()
    }
}

fn main() -> ExitCode {
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            if e.downcast_ref::<ConfigError>().is_some() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run(args: Args) -> Result<()> {
    // A missing .env is fine, the key may already be in the environment
    let _ = dotenvy::dotenv();

    let mut settings = Settings::load(args.config.as_deref())?;
    args.apply(&mut settings)?;

    // Resolve the key before anything touches the network
    let client = match args.file {
        Some(_) => None,
        None => Some(settings.client(&ApiKey::from_env()?)?),
    };

    let _guard = init_logging(args.interactive().then_some(settings.log_file.as_path()))?;
    info!(
        endpoint = %settings.endpoint,
        der = ?settings.der_name,
        interval = ?settings.poll_interval,
        "starting gridwatch"
    );

    let options = AppOptions {
        thresholds: settings.thresholds.clone(),
        top_n: settings.top_n,
        max_history: settings.max_history,
        failure_threshold: settings.failure_threshold,
    };

    // Handle single-shot modes (non-interactive)
    if !args.interactive() {
        let data = fetch_once(&settings, args.file.as_deref(), client)?;
        return match args.export {
            Some(ref export_path) => export_to_file(&data, export_path),
            None => {
                print_table(&data);
                Ok(())
            }
        };
    }

    match (args.file, client) {
        (Some(path), _) => run_with_file(&path, options),
        (None, Some(client)) => run_with_portal(client, &settings, options),
        (None, None) => bail!("no data source configured"),
    }
}

/// Install the tracing subscriber.
///
/// While the dashboard owns the terminal, logs go to `log_file` through a
/// background writer. Otherwise they go to stderr.
fn init_logging(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let Some(path) = log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
        return Ok(None);
    };

    let Some(file_name) = path.file_name() else {
        bail!("log file path has no file name: {}", path.display());
    };
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir)?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(Some(guard))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

/// Fetch a single batch from the saved file or the portal.
fn fetch_once(
    settings: &Settings,
    file: Option<&Path>,
    client: Option<OdpClient>,
) -> Result<ConstraintData> {
    if let Some(path) = file {
        return ConstraintData::load(path, &settings.thresholds);
    }
    let Some(client) = client else {
        bail!("no data source configured");
    };

    let batch = runtime()?.block_on(client.fetch_with_retry(&settings.query()))?;
    info!(records = batch.len(), skipped = batch.skipped, "fetched constraint records");

    if settings.record_csv {
        let mut recorder = CsvRecorder::new(&settings.csv_path);
        match recorder.record(&batch) {
            Ok(written) => info!(written, path = %settings.csv_path.display(), "recorded batch"),
            Err(e) => warn!(
                error = %e,
                path = %settings.csv_path.display(),
                "failed to record batch"
            ),
        }
    }

    Ok(ConstraintData::from_batch(batch, &settings.thresholds))
}

/// Print ranked records as a plain table.
fn print_table(data: &ConstraintData) {
    println!("{:<6} {:<20} {:<12} {}", "STATUS", "TIME", "ID", "CONSTRAINT");
    for row in data.ranked() {
        println!(
            "{:<6} {:<20} {:<12} {}",
            row.status.label(),
            row.record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            row.record.id,
            row.record.label()
        );
    }
    if data.skipped > 0 {
        println!("({} malformed records skipped)", data.skipped);
    }
}

/// Export a batch to a JSON file
fn export_to_file(data: &ConstraintData, export_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(&data.export_json())?;
    std::fs::write(export_path, json)?;

    println!("Exported {} records to: {}", data.len(), export_path.display());
    Ok(())
}

/// Run with a file-based data source
fn run_with_file(path: &Path, options: AppOptions) -> Result<()> {
    let source = Box::new(FileSource::new(path));
    run_tui(source, options, Duration::from_secs(1))
}

/// Run against the live portal
fn run_with_portal(client: OdpClient, settings: &Settings, options: AppOptions) -> Result<()> {
    let rt = runtime()?;

    let recorder = settings
        .record_csv
        .then(|| CsvRecorder::new(&settings.csv_path));
    let source = {
        let _enter = rt.enter();
        OdpSource::spawn(client, settings.query(), settings.poll_interval, recorder)
    };

    // The runtime polls on its own workers while the TUI owns the main thread
    let result = run_tui(Box::new(source), options, Duration::from_millis(100));

    // Abandon an in-flight fetch rather than wait out its timeout
    rt.shutdown_timeout(Duration::from_secs(1));

    result
}

/// Run the TUI with the given data source
fn run_tui(
    source: Box<dyn DataSource>,
    options: AppOptions,
    refresh_interval: Duration,
) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic);
    }));

    // Create app and load initial data
    let mut app = App::new(source, options);
    let _ = app.reload_data();

    // Run the main loop
    let result = run_app(&mut terminal, &mut app, refresh_interval);
    app.shutdown();

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result?;
    if let Some(fatal) = app.fatal_error {
        error!(error = %fatal, "stopped after fatal fetch error");
        bail!("{}", fatal);
    }
    Ok(())
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    refresh_interval: Duration,
) -> Result<()> {
    let mut last_refresh = Instant::now();

    while app.running {
        terminal.draw(|frame| ui::render(frame, app))?;

        // Poll for events with a short timeout
        if let Some(event) = events::poll_event(Duration::from_millis(100))? {
            match event {
                Event::Key(key) => events::handle_key_event(app, key),
                Event::Mouse(mouse) => {
                    // The error banner pushes view content down
                    let banner = if app.state == DisplayState::Error && app.data.is_some() {
                        3
                    } else {
                        0
                    };
                    events::handle_mouse_event(app, mouse, ui::CONTENT_START_ROW + banner);
                }
                Event::Resize(_, _) => {
                    // Terminal will redraw on next iteration
                }
                _ => {}
            }
        }

        // Drain completed fetches
        if last_refresh.elapsed() >= refresh_interval {
            let _ = app.reload_data();
            last_refresh = Instant::now();
        }
    }

    Ok(())
}
