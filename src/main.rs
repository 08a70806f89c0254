//! Simulator entry point: CLI, logging, and task wiring.

use std::fs::{File, OpenOptions};
use std::io::BufWriter;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail, ensure};
use chrono::{NaiveTime, TimeDelta, TimeZone, Utc};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use helios_sim::cli::{Args, Command, LogFormat, ReplayArgs, RunArgs};
use helios_sim::config::SimulatorConfig;
use helios_sim::io::export::export_csv;
use helios_sim::runner::Orchestrator;
use helios_sim::sim::clock::{SteppedClock, SystemClock};
use helios_sim::sim::engine::Engine;
use helios_sim::sim::kpi::EnergyReport;
use helios_sim::telemetry::{ChannelSink, JsonLinesSink, LogSink, TelemetrySink};
use helios_sim::weather::{SyntheticWeather, WeatherCell, WeatherUpdater};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    let cfg = args.load_config()?;
    let errors = cfg.validate();
    if !errors.is_empty() {
        let listing: Vec<String> = errors.iter().map(ToString::to_string).collect();
        bail!("invalid configuration:\n  {}", listing.join("\n  "));
    }
    info!(site_id = %cfg.site.site_id, timezone = %cfg.site.timezone, "configuration loaded");

    match args.command {
        None => run_live(&cfg, RunArgs::default()).await,
        Some(Command::Run(run)) => run_live(&cfg, run).await,
        Some(Command::Replay(replay)) => run_replay(&cfg, replay),
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

fn synthetic_updater(
    cfg: &SimulatorConfig,
    cell: WeatherCell,
) -> WeatherUpdater<SyntheticWeather> {
    WeatherUpdater::new(
        SyntheticWeather::new(&cfg.weather),
        SyntheticWeather::new(&cfg.weather),
        cell,
    )
}

fn json_lines_file(path: &Path, append: bool) -> Result<JsonLinesSink<BufWriter<File>>> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)
        .with_context(|| format!("cannot open {}", path.display()))?;
    Ok(JsonLinesSink::new(BufWriter::new(file)))
}

async fn run_live(cfg: &SimulatorConfig, args: RunArgs) -> Result<()> {
    let tz = cfg.time_zone()?;
    let cancel = CancellationToken::new();
    let weather = WeatherCell::new();

    let mut orchestrator = Orchestrator::new(
        Engine::from_config(cfg),
        SystemClock::new(tz),
        weather.clone(),
        cfg.tick_period(),
    )
    .with_sink(LogSink::default());
    let mut json_writer = None;
    if let Some(path) = &args.json_out {
        let (sink, writer) = ChannelSink::spawn(json_lines_file(path, true)?);
        orchestrator = orchestrator.with_sink(sink);
        json_writer = Some(writer);
    }

    #[cfg(feature = "api")]
    let api_task = match args.serve {
        Some(addr) => {
            let latest = helios_sim::telemetry::LatestSnapshot::new();
            orchestrator = orchestrator.with_sink(latest.clone());
            Some(tokio::spawn(helios_sim::api::serve(latest, addr, cancel.clone())))
        }
        None => None,
    };

    let updater = synthetic_updater(cfg, weather);
    let weather_task = tokio::spawn(updater.run(tz, cfg.weather.update_period(), cancel.clone()));
    let sim_task = tokio::spawn(orchestrator.run(cancel.clone()));

    shutdown_signal().await;
    info!("shutdown requested");
    cancel.cancel();

    weather_task.await.context("weather task panicked")?;
    let orchestrator = sim_task.await.context("simulation task panicked")?;
    #[cfg(feature = "api")]
    {
        if let Some(task) = api_task {
            task.await.context("API task panicked")??;
        }
    }

    let stats = orchestrator.stats();
    info!(
        site_id = orchestrator.engine().site_id(),
        completed = stats.completed,
        failed = stats.failed,
        soc_percent = format!("{:.1}", orchestrator.engine().battery().soc_percent()),
        "stopped"
    );
    // Dropping the orchestrator closes the channel so the writer can finish.
    drop(orchestrator);
    if let Some(writer) = json_writer {
        writer.await.context("telemetry writer panicked")?;
    }
    Ok(())
}

fn run_replay(cfg: &SimulatorConfig, args: ReplayArgs) -> Result<()> {
    let tz = cfg.time_zone()?;
    let step = args
        .step_secs
        .map_or_else(|| cfg.tick_period(), Duration::from_secs);
    ensure!(!step.is_zero(), "tick step must be positive");

    let ticks = args
        .ticks
        .unwrap_or_else(|| (86_400.0 / step.as_secs_f64()).ceil() as usize);
    let start_local = args.start.unwrap_or_else(|| {
        Utc::now()
            .with_timezone(&tz)
            .date_naive()
            .and_time(NaiveTime::MIN)
    });
    let start = tz
        .from_local_datetime(&start_local)
        .earliest()
        .with_context(|| format!("{start_local} does not exist in {tz}"))?;

    let weather = WeatherCell::new();
    let mut orchestrator = Orchestrator::new(
        Engine::from_config(cfg),
        SteppedClock::new(start, TimeDelta::from_std(step)?),
        weather.clone(),
        step,
    );
    let mut updater = synthetic_updater(cfg, weather);

    info!(ticks, step_secs = step.as_secs_f64(), %start, "replay started");
    let snapshots = orchestrator.replay(
        ticks,
        &mut updater,
        TimeDelta::from_std(cfg.weather.update_period())?,
    );

    if let Some(path) = &args.telemetry_out {
        export_csv(&snapshots, path).with_context(|| format!("cannot write {}", path.display()))?;
        info!(path = %path.display(), rows = snapshots.len(), "telemetry exported");
    }
    if let Some(path) = &args.json_out {
        let mut sink = json_lines_file(path, false)?;
        for snapshot in &snapshots {
            sink.publish(snapshot)?;
        }
        sink.flush()?;
    }

    let stats = orchestrator.stats();
    if stats.failed > 0 {
        warn!(failed = stats.failed, "some ticks were skipped");
    }
    println!(
        "{}",
        EnergyReport::from_snapshots(&snapshots, step.as_secs_f64() / 3600.0)
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
