//! Session - the command surface over the track fleet
//!
//! Every user action is one method call here. The session owns the
//! [`TrackFleet`] and, when available, the separation service handle; it
//! turns separation results back into track loads on the control thread.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use stemix_core::effect::{list_effect_kinds, EffectKind, SlotId};
use stemix_core::engine::{TrackError, TrackFleet, TransportStatus};
use stemix_core::export::{write_mix, ExportError};
use stemix_core::{PlayState, TrackId};
use thiserror::Error;

use crate::console::{Command, HELP};
use crate::separation::{
    JobId, SeparationError, SeparationEvent, SeparationHandle, SeparationMethod,
};

/// Errors surfaced to the user by a command
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Track(#[from] TrackError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Separation(#[from] SeparationError),

    #[error("Stem separation is not available")]
    SeparationUnavailable,
}

pub type SessionResult<T> = Result<T, SessionError>;

/// What the caller should do after a command
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Show this text (may be empty)
    Message(String),
    Quit,
}

impl Reply {
    fn msg(text: impl Into<String>) -> Self {
        Reply::Message(text.into())
    }
}

/// The mixing console state behind the command surface
pub struct Session {
    fleet: TrackFleet,
    separation: Option<SeparationHandle>,
    default_method: SeparationMethod,
    /// Split whose stems go onto the tracks when it finishes
    pending_split: Option<JobId>,
    now_playing: Option<String>,
}

impl Session {
    pub fn new(
        fleet: TrackFleet,
        separation: Option<SeparationHandle>,
        default_method: SeparationMethod,
    ) -> Self {
        Self {
            fleet,
            separation,
            default_method,
            pending_split: None,
            now_playing: None,
        }
    }

    pub fn fleet(&self) -> &TrackFleet {
        &self.fleet
    }

    pub fn fleet_mut(&mut self) -> &mut TrackFleet {
        &mut self.fleet
    }

    /// Label for the song most recently sent to the splitter
    pub fn now_playing(&self) -> Option<&str> {
        self.now_playing.as_deref()
    }

    /// Run one command
    pub fn execute(&mut self, command: Command) -> SessionResult<Reply> {
        let reply = match command {
            Command::Import { track, path } => {
                self.import(track, &path)?;
                let name = self.fleet.track(track)?.display_name();
                Reply::msg(format!("{}: loaded {}", track, name))
            }
            Command::AddEffect { track } => {
                let slot = self.add_effect(track)?;
                Reply::msg(format!("{}: added slot {}", track, slot))
            }
            Command::SetEffect { track, slot, kind } => {
                self.set_effect(track, slot, kind)?;
                Reply::msg(format!("{}: slot {} is now {}", track, slot, kind))
            }
            Command::SetParameter {
                track,
                slot,
                name,
                value,
            } => {
                let actual = self.set_parameter(track, slot, &name, value)?;
                Reply::msg(format!("{}: slot {} {} = {:.3}", track, slot, name, actual))
            }
            Command::LockSlot { track, slot } => {
                self.lock_slot(track, slot)?;
                Reply::msg(format!("{}: slot {} locked", track, slot))
            }
            Command::UnlockSlot { track, slot } => {
                self.unlock_slot(track, slot)?;
                Reply::msg(format!("{}: slot {} unlocked", track, slot))
            }
            Command::RemoveSlot { track, slot } => {
                self.remove_slot(track, slot)?;
                Reply::msg(format!("{}: slot {} removed", track, slot))
            }
            Command::SetVolume { track, volume } => {
                self.set_volume(track, volume)?;
                Reply::msg(format!("{}: volume {:.2}", track, self.fleet.track(track)?.volume()))
            }
            Command::SetMute { track, muted } => {
                self.set_mute(track, muted)?;
                Reply::msg(format!("{}: {}", track, if muted { "muted" } else { "unmuted" }))
            }
            Command::SetSolo { track, soloed } => {
                self.set_solo(track, soloed)?;
                Reply::msg(format!("{}: solo {}", track, if soloed { "on" } else { "off" }))
            }
            Command::Play => {
                self.play()?;
                Reply::msg("Playing")
            }
            Command::Stop => {
                self.stop();
                Reply::msg(format!("Stopped at {}", self.transport().time_display()))
            }
            Command::Toggle => {
                if self.fleet.is_playing() {
                    self.execute(Command::Stop)?
                } else {
                    self.execute(Command::Play)?
                }
            }
            Command::Seek { fraction } => {
                self.seek(fraction)?;
                Reply::msg(self.transport().time_display())
            }
            Command::Export { path } => {
                self.export(&path)?;
                Reply::msg(format!("Saved to {}", path.display()))
            }
            Command::Reset => {
                self.reset();
                Reply::msg("All tracks cleared")
            }
            Command::Split { path, method } => {
                let job = self.split_file(path, method)?;
                let label = self.now_playing.clone().unwrap_or_default();
                Reply::msg(format!("Splitting in progress ({}). {}", job, label))
            }
            Command::SplitAll { directory, method } => {
                let jobs = self.split_all(&directory, method)?;
                Reply::msg(format!("Queued {} files for splitting", jobs.len()))
            }
            Command::CancelSplit => match self.cancel_split()? {
                Some(job) => Reply::msg(format!("Cancelling {}", job)),
                None => Reply::msg("No split in progress"),
            },
            Command::ShowChain { track } => Reply::msg(self.chain_report(track)?),
            Command::ListEffects => Reply::msg(effects_report()),
            Command::Status => Reply::msg(self.status_report()),
            Command::Help => Reply::msg(HELP),
            Command::Quit => Reply::Quit,
        };
        Ok(reply)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Tracks and effects
    // ─────────────────────────────────────────────────────────────────────

    pub fn import(&mut self, track: TrackId, path: &Path) -> SessionResult<()> {
        self.fleet.load_audio(track, path)?;
        Ok(())
    }

    pub fn add_effect(&mut self, track: TrackId) -> SessionResult<SlotId> {
        Ok(self.fleet.track_mut(track)?.add_effect_slot())
    }

    pub fn set_effect(&mut self, track: TrackId, slot: SlotId, kind: EffectKind) -> SessionResult<()> {
        self.fleet.track_mut(track)?.set_effect(slot, kind)?;
        Ok(())
    }

    /// Set a parameter from a normalized slider value; returns the actual value
    pub fn set_parameter(
        &mut self,
        track: TrackId,
        slot: SlotId,
        name: &str,
        normalized: f32,
    ) -> SessionResult<f32> {
        Ok(self.fleet.track_mut(track)?.set_effect_param(slot, name, normalized)?)
    }

    pub fn lock_slot(&mut self, track: TrackId, slot: SlotId) -> SessionResult<()> {
        self.fleet.track_mut(track)?.lock_slot(slot)?;
        Ok(())
    }

    pub fn unlock_slot(&mut self, track: TrackId, slot: SlotId) -> SessionResult<()> {
        self.fleet.track_mut(track)?.unlock_slot(slot)?;
        Ok(())
    }

    pub fn remove_slot(&mut self, track: TrackId, slot: SlotId) -> SessionResult<()> {
        self.fleet.track_mut(track)?.remove_slot(slot)?;
        Ok(())
    }

    pub fn set_volume(&mut self, track: TrackId, volume: f32) -> SessionResult<()> {
        self.fleet.track_mut(track)?.set_volume(volume);
        Ok(())
    }

    pub fn set_mute(&mut self, track: TrackId, muted: bool) -> SessionResult<()> {
        self.fleet.track_mut(track)?.set_muted(muted);
        Ok(())
    }

    pub fn set_solo(&mut self, track: TrackId, soloed: bool) -> SessionResult<()> {
        self.fleet.track_mut(track)?.set_soloed(soloed);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Transport
    // ─────────────────────────────────────────────────────────────────────

    pub fn play(&mut self) -> SessionResult<()> {
        self.fleet.start()?;
        Ok(())
    }

    pub fn stop(&mut self) {
        self.fleet.stop();
    }

    pub fn seek(&mut self, fraction: f64) -> SessionResult<()> {
        self.fleet.seek(fraction)?;
        Ok(())
    }

    /// Current transport snapshot
    ///
    /// This polls the fleet, so a transport that ran past the end stops here.
    pub fn transport(&mut self) -> TransportStatus {
        self.fleet.poll()
    }

    /// Periodic poll; returns a message when playback ran to the end
    pub fn tick(&mut self) -> Option<String> {
        let status = self.fleet.poll();
        status
            .reached_end
            .then(|| format!("Playback finished ({})", status.time_display()))
    }

    pub fn export(&self, path: &Path) -> SessionResult<()> {
        write_mix(path, self.fleet.tracks())?;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.fleet.reset();
        self.now_playing = None;
    }

    // ─────────────────────────────────────────────────────────────────────
    // Separation
    // ─────────────────────────────────────────────────────────────────────

    fn separation(&self) -> SessionResult<&SeparationHandle> {
        self.separation
            .as_ref()
            .ok_or(SessionError::SeparationUnavailable)
    }

    /// Queue a split; its stems replace tracks 1-4 when it finishes
    pub fn split_file(&mut self, path: PathBuf, method: Option<SeparationMethod>) -> SessionResult<JobId> {
        let method = method.unwrap_or(self.default_method);
        let label = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let job = self.separation()?.submit(path, method)?;
        self.pending_split = Some(job);
        self.now_playing = Some(format!("Now playing: {}", label));
        Ok(job)
    }

    /// Queue a split of every file in a directory (stems are not loaded)
    pub fn split_all(
        &mut self,
        directory: &Path,
        method: Option<SeparationMethod>,
    ) -> SessionResult<Vec<JobId>> {
        let method = method.unwrap_or(self.default_method);
        Ok(self.separation()?.submit_directory(directory, method)?)
    }

    pub fn cancel_split(&mut self) -> SessionResult<Option<JobId>> {
        Ok(self.separation()?.cancel())
    }

    /// React to a separation event; returns text for the user
    pub fn handle_separation_event(&mut self, event: SeparationEvent) -> Option<String> {
        let pending = self.pending_split == Some(event.job());
        match event {
            SeparationEvent::Queued { .. } => None,
            SeparationEvent::Started { job, source, method } => Some(format!(
                "{}: splitting {} with {}",
                job,
                source.display(),
                method
            )),
            SeparationEvent::CacheHit { job, .. } => {
                Some(format!("{}: using previously split stems", job))
            }
            SeparationEvent::Finished { job, source, stems } => {
                if !pending {
                    return Some(format!("{}: {} split", job, source.display()));
                }
                self.pending_split = None;
                let mut failures = Vec::new();
                for (stem, path) in stems.iter() {
                    let track = TrackId(stem as usize);
                    if let Err(e) = self.fleet.load_audio(track, path) {
                        log::error!("Failed to load {} stem {:?}: {}", stem.name(), path, e);
                        failures.push(format!("{}: {}", stem.name(), e));
                    }
                }
                if failures.is_empty() {
                    Some("Splitting complete!".to_string())
                } else {
                    Some(format!("Splitting finished with errors: {}", failures.join("; ")))
                }
            }
            SeparationEvent::Failed { job, error, .. } => {
                if pending {
                    self.pending_split = None;
                }
                Some(format!("{}: split failed: {}", job, error))
            }
            SeparationEvent::Cancelled { job, .. } => {
                if pending {
                    self.pending_split = None;
                }
                Some(format!("{}: split cancelled", job))
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Reports
    // ─────────────────────────────────────────────────────────────────────

    /// Transport state, global time and one line per track
    pub fn status_report(&mut self) -> String {
        let status = self.transport();
        let state = match status.state {
            PlayState::Playing => "Playing",
            PlayState::Stopped => "Stopped",
        };
        let mut out = String::new();
        if let Some(label) = &self.now_playing {
            let _ = writeln!(out, "{}", label);
        }
        let _ = write!(
            out,
            "{}  {}  [{:>4}/1000]",
            state,
            status.time_display(),
            status.slider_value()
        );

        for track in self.fleet.tracks() {
            let flags = format!(
                "{}{}",
                if track.is_muted() { "M" } else { "-" },
                if track.is_soloed() { "S" } else { "-" }
            );
            let effects: Vec<String> = track
                .chain()
                .slots()
                .iter()
                .filter(|s| !s.descriptor.kind.is_none())
                .map(|s| s.descriptor.kind.name().to_string())
                .collect();
            let _ = write!(
                out,
                "\n{}  {:<20} {}  vol {:.2} {}  fx: {}",
                track.id(),
                track.display_name(),
                track.time_display(),
                track.volume(),
                flags,
                if effects.is_empty() {
                    "none".to_string()
                } else {
                    effects.join(" > ")
                }
            );
        }
        out
    }

    /// One line per slot of a track's chain
    pub fn chain_report(&self, track: TrackId) -> SessionResult<String> {
        let track = self.fleet.track(track)?;
        if track.chain().is_empty() {
            return Ok(format!("{}: no effect slots", track.id()));
        }
        let mut out = format!("{} effect chain:", track.id());
        for slot in track.chain().slots() {
            let params: Vec<String> = slot
                .descriptor
                .parameters
                .iter()
                .map(|(name, value)| format!("{}={:.3}", name, value))
                .collect();
            let _ = write!(
                out,
                "\n  {} {}{} {}",
                slot.id,
                slot.descriptor.kind,
                if slot.locked { " (locked)" } else { "" },
                params.join(" ")
            );
        }
        Ok(out)
    }
}

/// Every effect kind with its parameter ranges and defaults
pub fn effects_report() -> String {
    let mut out = String::from("Effects:");
    for kind in list_effect_kinds() {
        let _ = write!(out, "\n  {}", kind);
        for param in kind.schema() {
            let _ = write!(
                out,
                "\n    {:<14} [{}, {}] default {}{}",
                param.name,
                param.min,
                param.max,
                param.default,
                if param.unit.is_empty() {
                    String::new()
                } else {
                    format!(" {}", param.unit)
                }
            );
        }
    }
    out
}
