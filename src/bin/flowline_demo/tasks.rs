//! Synthetic tasks wiring the demo pipelines together.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use flowline::{Context, Metadata, Task, TaskError};
use serde_json::json;

/// Emits an incrementing counter, tagging each message with a wall-clock
/// timestamp so downstream stages can compute end-to-end latency.
pub struct CounterSource {
    next: AtomicU64,
}

impl CounterSource {
    pub fn new() -> Self {
        Self { next: AtomicU64::new(0) }
    }
}

#[async_trait::async_trait]
impl Task<(), u64> for CounterSource {
    async fn run(&self, _ctx: Context, _input: (), meta: &mut Metadata, _stage_name: &str) -> Result<u64, TaskError> {
        let value = self.next.fetch_add(1, Ordering::Relaxed);
        let now_ms = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        meta.insert("produced_at_ms".to_string(), json!(now_ms));
        Ok(value)
    }
}

/// Doubles its input and records the stage that touched it, demonstrating
/// metadata accumulating across hops.
pub struct Double;

#[async_trait::async_trait]
impl Task<u64, u64> for Double {
    async fn run(&self, _ctx: Context, input: u64, meta: &mut Metadata, stage_name: &str) -> Result<u64, TaskError> {
        meta.insert(format!("visited_{stage_name}"), json!(true));
        Ok(input.saturating_mul(2))
    }
}

/// Fails on multiples of `fail_every` to exercise per-message error
/// isolation without ever stopping the worker loop.
pub struct FlakyTransform {
    fail_every: u64,
}

impl FlakyTransform {
    pub fn new(fail_every: u64) -> Self {
        Self { fail_every: fail_every.max(1) }
    }
}

#[async_trait::async_trait]
impl Task<u64, u64> for FlakyTransform {
    async fn run(&self, _ctx: Context, input: u64, _meta: &mut Metadata, _stage_name: &str) -> Result<u64, TaskError> {
        if input % self.fail_every == 0 {
            anyhow::bail!("simulated failure for input {input}");
        }
        Ok(input)
    }
}

/// Splits a count into that many unit-valued elements, demonstrating the
/// fan-out stage's shape (`Task`-free; `FanOut` itself does the splitting,
/// so this task's job is just to produce the `Vec` to split).
pub struct Explode;

#[async_trait::async_trait]
impl Task<u64, Vec<u64>> for Explode {
    async fn run(&self, _ctx: Context, input: u64, _meta: &mut Metadata, _stage_name: &str) -> Result<Vec<u64>, TaskError> {
        Ok((0..input.min(8)).collect())
    }
}

/// Terminal sink: logs each message's end-to-end latency and discards it.
pub struct LogSink;

#[async_trait::async_trait]
impl Task<u64, ()> for LogSink {
    async fn run(&self, _ctx: Context, input: u64, meta: &mut Metadata, stage_name: &str) -> Result<(), TaskError> {
        let latency_ms = meta
            .get("produced_at_ms")
            .and_then(|v| v.as_u64())
            .map(|produced_at| {
                let now_ms = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64;
                now_ms.saturating_sub(produced_at)
            });
        tracing::info!(stage = stage_name, value = input, latency_ms, "sink received message");
        Ok(())
    }
}
