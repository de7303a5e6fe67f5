//! Command dispatch: argument substitution, off-thread action execution, and
//! output-template rendering.
//!
//! Actions never run on the input-director thread — a long-running command
//! must not stall phrase detection. Jobs are queued on a crossbeam channel
//! and executed by a dedicated worker thread, fire-and-forget from the
//! director's perspective. Action failures are caught at the worker
//! boundary, logged, and rendered as a degraded output line; they never
//! propagate back to the director.

use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Sender};
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use crate::grammar::{ActionFn, ArgTemplate, Command, OutputTemplate, SlotValue};
use crate::ipc::events::CommandOutputEvent;

struct Job {
    command_name: String,
    action: ActionFn,
    /// Positional arguments after template substitution.
    args: Vec<SlotValue>,
    /// All resolved slot values, for output-template slot markers.
    values: Vec<SlotValue>,
    output: OutputTemplate,
}

/// Queue + worker for command action execution.
pub struct Dispatcher {
    job_tx: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// Spawn the action worker. Rendered outputs are broadcast on
    /// `output_tx`; send failures (no subscribers) are ignored.
    ///
    /// # Errors
    /// Returns `MandatumError::Io` if the worker thread cannot be spawned.
    pub fn new(output_tx: broadcast::Sender<CommandOutputEvent>) -> crate::error::Result<Self> {
        let (job_tx, job_rx) = unbounded::<Job>();

        let worker = std::thread::Builder::new()
            .name("mandatum-dispatch".into())
            .spawn(move || {
                let mut seq = 0u64;
                for job in job_rx {
                    let (output, succeeded) = match (job.action)(&job.args) {
                        Ok(result) => (job.output.render(&job.values, &result), true),
                        Err(e) => {
                            error!(command = %job.command_name, error = %e, "action failed");
                            (format!("{} failed: {e}", job.command_name), false)
                        }
                    };

                    debug!(command = %job.command_name, %output, "action completed");
                    let _ = output_tx.send(CommandOutputEvent {
                        seq,
                        command: job.command_name,
                        output,
                        succeeded,
                    });
                    seq += 1;
                }
                debug!("dispatch worker exiting — queue closed");
            })?;

        Ok(Self {
            job_tx: Some(job_tx),
            worker: Some(worker),
        })
    }

    /// Build the invocation for a matched command and enqueue it.
    ///
    /// Slot markers in the argument template are replaced by the matching
    /// resolved value before the action runs; out-of-range indices were
    /// rejected at registration.
    pub fn dispatch(&self, command: &Command, values: Vec<SlotValue>) {
        let args = command
            .args()
            .iter()
            .map(|template| match template {
                ArgTemplate::Literal(v) => v.clone(),
                ArgTemplate::Slot(i) => values[*i].clone(),
            })
            .collect();

        info!(command = command.name(), "dispatching command");
        let job = Job {
            command_name: command.name().to_string(),
            action: command.action(),
            args,
            values,
            output: command.output().clone(),
        };

        if let Some(tx) = &self.job_tx {
            // Receiver outlives every sender until drop; send cannot fail
            // while the worker is alive.
            let _ = tx.send(job);
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        // Close the queue so the worker drains and exits, then join it.
        self.job_tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
