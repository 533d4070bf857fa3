//! Flowline demo binary.
//!
//! Wires a handful of synthetic pipelines to exercise the core crate end
//! to end: a straight-line transform chain, a fan-out split, and a
//! deliberately undersized queue to show backpressure. Not part of the
//! library; everything here is plumbing around `flowline::Executor`.

mod config;
mod tasks;

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use flowline::{Executor, PrometheusMetric, Stage, StageSpec};

use crate::config::DemoConfig;
use crate::tasks::{CounterSource, Double, Explode, FlakyTransform, LogSink};

#[derive(Parser, Debug)]
#[command(name = "flowline-demo")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Runs sample pipelines built on the flowline stage-pipeline runtime")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, default_value_t = false, global = true)]
    json_logs: bool,

    /// How long to let the pipeline run before a clean shutdown
    #[arg(long, default_value = "10s", global = true)]
    run_for: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Producer -> Transform -> Consumer, with an occasional failing task
    Echo,
    /// Producer -> Transform -> FanOut -> Consumer
    FanOut,
    /// Same as `echo` but with a one-slot queue, to show backpressure in the logs
    Backpressure,
}

fn setup_logging(log_level: &str, json_output: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    if json_output {
        tracing_subscriber::registry().with(filter).with(fmt::layer().json()).init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

async fn serve_metrics(addr: SocketAddr, metric: Arc<PrometheusMetric>) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "metrics endpoint listening");
    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metric = metric.clone();
        tokio::spawn(async move {
            let service = service_fn(move |_req: Request<hyper::body::Incoming>| {
                let metric = metric.clone();
                async move {
                    let body = metric.gather();
                    Ok::<_, Infallible>(Response::new(Full::new(Bytes::from(body))))
                }
            });
            if let Err(error) = hyper::server::conn::http1::Builder::new().serve_connection(io, service).await {
                error!(%error, "metrics connection error");
            }
        });
    }
}

/// Producer -> Double -> (occasionally failing) Transform -> Consumer
async fn build_echo(cfg: &DemoConfig, metric: Arc<PrometheusMetric>, queue_capacity: usize) -> Result<Executor> {
    let metric: Arc<dyn flowline::Metric> = metric;

    let producer = Stage::producer(
        "counter",
        Arc::new(CounterSource::new()),
        cfg.worker_count,
        metric.clone(),
        cfg.produce_interval,
    );
    let double = Stage::transform("double", Arc::new(Double), cfg.worker_count, metric.clone());
    let flaky = Stage::transform("flaky", Arc::new(FlakyTransform::new(7)), cfg.worker_count, metric.clone());
    let sink = Stage::consumer("sink", Arc::new(LogSink), cfg.worker_count, metric);

    let mut executor = Executor::new([
        StageSpec::with_capacity(producer, queue_capacity),
        StageSpec::with_capacity(double, queue_capacity),
        StageSpec::with_capacity(flaky, queue_capacity),
        StageSpec::new(sink),
    ])?;
    executor.start().await?;
    info!(stages = ?executor.stage_names(), "echo pipeline running");
    Ok(executor)
}

/// Producer -> Explode(into a Vec) -> FanOut -> Consumer
async fn build_fan_out(cfg: &DemoConfig, metric: Arc<PrometheusMetric>) -> Result<Executor> {
    let metric: Arc<dyn flowline::Metric> = metric;

    let producer = Stage::producer(
        "counter",
        Arc::new(CounterSource::new()),
        1,
        metric.clone(),
        cfg.produce_interval,
    );
    let explode = Stage::transform::<u64, Vec<u64>>("explode", Arc::new(Explode), 1, metric.clone());
    let split = Stage::fan_out::<u64>("split", cfg.worker_count, metric.clone());
    let sink = Stage::consumer("sink", Arc::new(LogSink), cfg.worker_count, metric);

    let mut executor = Executor::new([
        StageSpec::with_capacity(producer, cfg.queue_capacity),
        StageSpec::with_capacity(explode, cfg.queue_capacity),
        StageSpec::with_capacity(split, cfg.queue_capacity),
        StageSpec::new(sink),
    ])?;
    executor.start().await?;
    info!(stages = ?executor.stage_names(), "fan-out pipeline running");
    Ok(executor)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level, cli.json_logs);

    let correlation_id = uuid::Uuid::new_v4();
    info!(%correlation_id, version = env!("CARGO_PKG_VERSION"), "starting flowline demo");

    let cfg = DemoConfig::load()?;
    cfg.validate()?;
    info!(?cfg, "configuration loaded");

    let metrics_addr: SocketAddr = cfg.metrics_addr.parse()?;
    let prometheus = Arc::new(PrometheusMetric::new()?);
    let metrics_server = tokio::spawn(serve_metrics(metrics_addr, prometheus.clone()));

    let mut executor = match cli.command {
        Commands::Echo => build_echo(&cfg, prometheus.clone(), cfg.queue_capacity).await?,
        Commands::FanOut => build_fan_out(&cfg, prometheus.clone()).await?,
        Commands::Backpressure => build_echo(&cfg, prometheus.clone(), 1).await?,
    };

    let run_for = humantime::parse_duration(&cli.run_for).unwrap_or(Duration::from_secs(10));
    tokio::select! {
        _ = tokio::time::sleep(run_for) => info!("run-for elapsed, shutting down"),
        _ = shutdown_signal() => {}
    }

    executor.stop_with_deadline(Duration::from_secs(5)).await;
    metrics_server.abort();
    info!("flowline demo exiting");
    Ok(())
}
