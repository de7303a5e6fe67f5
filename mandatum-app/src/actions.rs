//! Builtin actions — the closed set a command table may reference.
//!
//! Every action is resolved to a direct function reference when the command
//! table is built, so nothing is ever looked up by name at match time.

use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use chrono::Local;
use tokio::sync::mpsc::UnboundedSender;
use tracing::info;

use mandatum_core::{ActionFn, SlotValue};

/// 12-hour clock, e.g. "04:15 PM".
const TIME_FORMAT: &str = "%I:%M %p";
/// Spoken-style date, e.g. "Friday, August 07".
const DATE_FORMAT: &str = "%A, %B %d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinAction {
    /// Ask the host to shut the application down.
    Shutdown,
    /// Current local time.
    CurrentTime,
    /// Current local date.
    CurrentDate,
    /// Start a background countdown of N minutes.
    StartTimer,
    /// Echo captured free text back (quick note).
    EchoNote,
}

impl BuiltinAction {
    /// Resolve to an invocable. `shutdown_tx` is only captured by
    /// [`BuiltinAction::Shutdown`].
    pub fn resolve(self, shutdown_tx: &UnboundedSender<()>) -> ActionFn {
        match self {
            BuiltinAction::Shutdown => {
                let tx = shutdown_tx.clone();
                Arc::new(move |_args| {
                    let _ = tx.send(());
                    Ok("shutting down".into())
                })
            }
            BuiltinAction::CurrentTime => {
                Arc::new(|_args| Ok(Local::now().format(TIME_FORMAT).to_string()))
            }
            BuiltinAction::CurrentDate => {
                Arc::new(|_args| Ok(Local::now().format(DATE_FORMAT).to_string()))
            }
            BuiltinAction::StartTimer => Arc::new(|args| {
                let minutes = match args.first() {
                    Some(SlotValue::Int(n)) if *n > 0 => *n as f64,
                    Some(SlotValue::Float(x)) if *x > 0.0 => *x,
                    other => bail!("timer needs a positive duration, got {other:?}"),
                };
                std::thread::spawn(move || {
                    std::thread::sleep(Duration::from_secs_f64(minutes * 60.0));
                    info!(minutes, "timer elapsed");
                });
                Ok(format!("{minutes}"))
            }),
            BuiltinAction::EchoNote => Arc::new(|args| {
                match args.first() {
                    Some(SlotValue::Word(text)) if !text.trim().is_empty() => Ok(text.clone()),
                    _ => bail!("note text was empty"),
                }
            }),
        }
    }
}
