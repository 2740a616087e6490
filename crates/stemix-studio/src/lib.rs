//! Stemix Studio - stem splitting, per-track effects and mixing console
//!
//! Builds on `stemix-core`:
//!
//! 1. **Separation**: split a song into vocals, drums, bass and other with
//!    demucs or spleeter, running in the background and cached by name.
//!
//! 2. **Session**: the command surface over the four-track fleet (import,
//!    effect slots, mixer, transport, export).
//!
//! 3. **Console**: a line-oriented front-end that parses commands.

pub mod config;
pub mod console;
pub mod convert;
pub mod separation;
pub mod session;
