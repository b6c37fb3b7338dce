//! Line-oriented command console over stdin.
//!
//! Each input line is a JSON command (`{"action":"checkBriefs"}`) or a keyword
//! (`check`, `interval 90`). Responses and broadcast events are written to
//! stdout as one JSON object per line.

use std::io::Write;

use anyhow::{Context, Result};
use briefwatch_engine::{BusError, MonitorHandle};
use briefwatch_types::{CommandResponse, MonitorCommand};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// What the console should do with one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Blank,
    Quit,
    Command(MonitorCommand),
    Unknown(String),
}

impl ConsoleInput {
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Self::Blank;
        }
        if matches!(trimmed, "quit" | "exit") {
            return Self::Quit;
        }
        match MonitorCommand::parse(trimmed) {
            Some(command) => Self::Command(command),
            None => Self::Unknown(trimmed.to_string()),
        }
    }
}

fn emit(out: &mut impl Write, value: &impl Serialize) -> Result<()> {
    serde_json::to_writer(&mut *out, value).context("failed to encode output")?;
    writeln!(out).and_then(|()| out.flush())?;
    Ok(())
}

/// Run until stdin closes, `quit` is entered, or Ctrl-C. Shuts the monitor down on exit.
pub async fn run(handle: MonitorHandle) -> Result<()> {
    let mut events = handle.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = std::io::stdout();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    debug!("stdin closed");
                    break;
                };
                let response = match ConsoleInput::parse(&line) {
                    ConsoleInput::Blank => continue,
                    ConsoleInput::Quit => break,
                    ConsoleInput::Unknown(input) => {
                        CommandResponse::failed(format!("unknown command: {input}"))
                    }
                    ConsoleInput::Command(command) => match handle.send(command).await {
                        Ok(response) => response,
                        Err(BusError::Closed) => {
                            warn!("Monitor stopped; leaving console");
                            break;
                        }
                    },
                };
                emit(&mut stdout, &response)?;
            }
            event = events.recv() => match event {
                Ok(event) => emit(&mut stdout, &event)?,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Console fell behind on events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    if let Err(e) = handle.shutdown().await {
        debug!("Monitor already gone: {e}");
    }
    Ok(())
}
