//! Harness shared by the session tests: a client running on a spawned task
//! with captured console output and a scripted input channel.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use ipk25_chat::config::{ClientConfig, Transport};
use ipk25_chat::console::Console;
use ipk25_chat::timer::TimerConfig;

/// Upper bound for any single step of a test.
pub const WAIT: Duration = Duration::from_secs(3);

/// Timers short enough to keep the suite fast.
pub fn fast_timers() -> TimerConfig {
    TimerConfig {
        confirm_timeout: Duration::from_millis(100),
        max_retries: 3,
        reply_timeout: Duration::from_secs(2),
        error_pause: Duration::from_millis(50),
    }
}

pub struct Client {
    pub input: mpsc::Sender<String>,
    output: mpsc::UnboundedReceiver<String>,
    task: JoinHandle<ipk25_chat::Result<()>>,
}

impl Client {
    pub fn start(transport: Transport, server: SocketAddr, timers: TimerConfig) -> Self {
        Self::start_with_interrupt(transport, server, timers, std::future::pending())
    }

    pub fn start_with_interrupt<F>(
        transport: Transport,
        server: SocketAddr,
        timers: TimerConfig,
        interrupt: F,
    ) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (console, output) = Console::capture();
        let (input, lines) = mpsc::channel(8);
        let config = ClientConfig::new(transport, server).with_timers(timers);
        let task =
            tokio::spawn(async move { ipk25_chat::run(&config, console, lines, interrupt).await });
        Self {
            input,
            output,
            task,
        }
    }

    /// Feed one operator line.
    pub async fn type_line(&self, line: impl Into<String>) -> anyhow::Result<()> {
        self.input.send(line.into()).await.context("client input closed")
    }

    /// Next line the client printed.
    pub async fn next_output(&mut self) -> anyhow::Result<String> {
        timeout(WAIT, self.output.recv())
            .await
            .context("no console output")?
            .context("console closed")
    }

    /// Wait for the session to end and return its outcome, plus anything the
    /// client printed that the test did not read.
    pub async fn outcome(mut self) -> anyhow::Result<(ipk25_chat::Result<()>, Vec<String>)> {
        let result = timeout(WAIT, self.task).await.context("session did not end")??;
        let mut rest = Vec::new();
        while let Ok(line) = self.output.try_recv() {
            rest.push(line);
        }
        Ok((result, rest))
    }
}
