//! Separation service - runs split jobs on a background thread
//!
//! Jobs are submitted through a [`SeparationHandle`] and processed one at a
//! time. Every state change is published as a [`SeparationEvent`] on a
//! crossbeam channel that the control loop selects on.
//!
//! ```text
//! ┌──────────────┐   SeparationCommand   ┌─────────────────────┐
//! │ control loop │ ────────────────────► │  separation worker  │
//! │              │ ◄──────────────────── │  (StemSplitter)     │
//! └──────────────┘   SeparationEvent     └─────────────────────┘
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use crossbeam::channel::{self, Receiver, Sender};

use super::config::SeparationMethod;
use super::error::{Result, SeparationError};
use super::job::{list_files, CancelToken, StemPaths, StemSplitter};

/// Identifier of a submitted job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job {}", self.0)
    }
}

/// Commands for the separation worker
#[derive(Debug)]
pub enum SeparationCommand {
    Split {
        job: JobId,
        source: PathBuf,
        method: SeparationMethod,
    },
    Shutdown,
}

/// Progress of a job
#[derive(Debug, Clone, PartialEq)]
pub enum SeparationEvent {
    Queued { job: JobId, source: PathBuf },
    Started { job: JobId, source: PathBuf, method: SeparationMethod },
    /// Stems already existed; followed by `Finished`
    CacheHit { job: JobId, stems: StemPaths },
    Finished { job: JobId, source: PathBuf, stems: StemPaths },
    Failed { job: JobId, source: PathBuf, error: String },
    Cancelled { job: JobId, source: PathBuf },
}

impl SeparationEvent {
    pub fn job(&self) -> JobId {
        match self {
            Self::Queued { job, .. }
            | Self::Started { job, .. }
            | Self::CacheHit { job, .. }
            | Self::Finished { job, .. }
            | Self::Failed { job, .. }
            | Self::Cancelled { job, .. } => *job,
        }
    }

    /// Whether this is the last event of its job
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Finished { .. } | Self::Failed { .. } | Self::Cancelled { .. }
        )
    }
}

/// State shared between the handle and the worker
#[derive(Default)]
struct Shared {
    /// Job being processed with its own cancel token
    active: Mutex<Option<(JobId, CancelToken)>>,
    /// Set once the handle is dropped; queued jobs are skipped
    closing: AtomicBool,
}

impl Shared {
    fn slot(&self) -> MutexGuard<'_, Option<(JobId, CancelToken)>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark `job` as in flight and hand out a fresh token for it
    fn begin(&self, job: JobId) -> CancelToken {
        let token = CancelToken::new();
        *self.slot() = Some((job, token.clone()));
        token
    }

    fn finish(&self) {
        *self.slot() = None;
    }

    fn active_job(&self) -> Option<JobId> {
        self.slot().as_ref().map(|(job, _)| *job)
    }

    /// Cancel whatever job is in flight right now
    fn cancel_active(&self) -> Option<JobId> {
        let slot = self.slot();
        let (job, token) = slot.as_ref()?;
        token.cancel();
        Some(*job)
    }
}

/// Handle for submitting and cancelling separation jobs
pub struct SeparationHandle {
    command_tx: Sender<SeparationCommand>,
    event_tx: Sender<SeparationEvent>,
    thread_handle: Option<thread::JoinHandle<()>>,
    shared: Arc<Shared>,
    next_job: AtomicU64,
}

impl SeparationHandle {
    /// Queue a split of `source`
    pub fn submit(&self, source: PathBuf, method: SeparationMethod) -> Result<JobId> {
        let job = JobId(self.next_job.fetch_add(1, Ordering::Relaxed));
        let _ = self.event_tx.send(SeparationEvent::Queued {
            job,
            source: source.clone(),
        });
        let command = SeparationCommand::Split {
            job,
            source,
            method,
        };
        if let Err(channel::SendError(command)) = self.command_tx.send(command) {
            // Close out the Queued event; the worker will never see this job
            if let SeparationCommand::Split { source, .. } = command {
                let _ = self.event_tx.send(SeparationEvent::Failed {
                    job,
                    source,
                    error: SeparationError::ServiceStopped.to_string(),
                });
            }
            return Err(SeparationError::ServiceStopped);
        }
        Ok(job)
    }

    /// Queue a split of every regular file in `directory`
    pub fn submit_directory(&self, directory: &Path, method: SeparationMethod) -> Result<Vec<JobId>> {
        list_files(directory)?
            .into_iter()
            .map(|file| self.submit(file, method))
            .collect()
    }

    /// Job currently being processed
    pub fn active_job(&self) -> Option<JobId> {
        self.shared.active_job()
    }

    /// Best-effort cancel of the job in flight
    ///
    /// Terminates the external tool if one is running. Returns the job that
    /// was asked to stop, or `None` when the worker is idle. Queued jobs are
    /// not affected.
    pub fn cancel(&self) -> Option<JobId> {
        let job = self.shared.cancel_active()?;
        log::info!("Cancelling {}", job);
        Some(job)
    }

    /// Check if the worker thread is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Cancel the job in flight, stop the worker and wait for it
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shared.closing.store(true, Ordering::Relaxed);
        self.shared.cancel_active();
        let _ = self.command_tx.send(SeparationCommand::Shutdown);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SeparationHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Background service for stem separation
pub struct SeparationService;

impl SeparationService {
    /// Spawn the worker thread
    ///
    /// Returns the handle and the receiving end of the event channel.
    pub fn spawn(splitter: StemSplitter) -> Result<(SeparationHandle, Receiver<SeparationEvent>)> {
        let (command_tx, command_rx) = channel::unbounded();
        let (event_tx, event_rx) = channel::unbounded();
        let shared = Arc::new(Shared::default());

        let worker_events = event_tx.clone();
        let worker_shared = shared.clone();
        let thread_handle = thread::Builder::new()
            .name("stemix-separation".to_string())
            .spawn(move || Self::run(splitter, command_rx, worker_events, worker_shared))?;

        Ok((
            SeparationHandle {
                command_tx,
                event_tx,
                thread_handle: Some(thread_handle),
                shared,
                next_job: AtomicU64::new(1),
            },
            event_rx,
        ))
    }

    /// Main service loop
    fn run(
        splitter: StemSplitter,
        command_rx: Receiver<SeparationCommand>,
        event_tx: Sender<SeparationEvent>,
        shared: Arc<Shared>,
    ) {
        log::info!("Separation service started");

        while let Ok(cmd) = command_rx.recv() {
            match cmd {
                SeparationCommand::Split {
                    job,
                    source,
                    method,
                } => {
                    if shared.closing.load(Ordering::Relaxed) {
                        let _ = event_tx.send(SeparationEvent::Cancelled { job, source });
                        continue;
                    }
                    let cancel = shared.begin(job);
                    let _ = event_tx.send(SeparationEvent::Started {
                        job,
                        source: source.clone(),
                        method,
                    });

                    let event = match splitter.run_with_cancel(&source, method, &cancel) {
                        Ok(outcome) => {
                            if outcome.cache_hit {
                                let _ = event_tx.send(SeparationEvent::CacheHit {
                                    job,
                                    stems: outcome.stems.clone(),
                                });
                            }
                            log::info!("{}: split {:?} finished", job, source);
                            SeparationEvent::Finished {
                                job,
                                source,
                                stems: outcome.stems,
                            }
                        }
                        Err(SeparationError::Cancelled) => {
                            log::info!("{}: cancelled", job);
                            SeparationEvent::Cancelled { job, source }
                        }
                        Err(e) => {
                            log::error!("{}: split {:?} failed: {}", job, source, e);
                            SeparationEvent::Failed {
                                job,
                                source,
                                error: e.to_string(),
                            }
                        }
                    };

                    shared.finish();
                    let _ = event_tx.send(event);
                }

                SeparationCommand::Shutdown => {
                    log::info!("Separation service shutting down");
                    break;
                }
            }
        }
    }
}
