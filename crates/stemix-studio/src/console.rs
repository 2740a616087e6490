//! Line-oriented command parser
//!
//! Each input line maps to exactly one [`Command`]. Tracks are numbered 1-4
//! as on screen; effect slots use the ids shown by `chain` (`#3` or `3`).
//! Path arguments take the rest of the line, so they may contain spaces.

use std::path::PathBuf;

use stemix_core::effect::{EffectKind, SlotId};
use stemix_core::TrackId;
use thiserror::Error;

use crate::separation::SeparationMethod;

/// One user action
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Import { track: TrackId, path: PathBuf },
    AddEffect { track: TrackId },
    SetEffect { track: TrackId, slot: SlotId, kind: EffectKind },
    SetParameter { track: TrackId, slot: SlotId, name: String, value: f32 },
    LockSlot { track: TrackId, slot: SlotId },
    UnlockSlot { track: TrackId, slot: SlotId },
    RemoveSlot { track: TrackId, slot: SlotId },
    SetVolume { track: TrackId, volume: f32 },
    SetMute { track: TrackId, muted: bool },
    SetSolo { track: TrackId, soloed: bool },
    Play,
    Stop,
    /// Toggle between play and stop
    Toggle,
    Seek { fraction: f64 },
    Export { path: PathBuf },
    Reset,
    Split { path: PathBuf, method: Option<SeparationMethod> },
    SplitAll { directory: PathBuf, method: Option<SeparationMethod> },
    CancelSplit,
    ShowChain { track: TrackId },
    ListEffects,
    Status,
    Help,
    Quit,
}

/// Errors from parsing a command line
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Empty command")]
    Empty,

    #[error("Unknown command '{0}' (try 'help')")]
    UnknownCommand(String),

    #[error("'{command}' needs {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },

    #[error("Not a number: '{0}'")]
    InvalidNumber(String),

    #[error("Not a track number (1-4): '{0}'")]
    InvalidTrack(String),

    #[error("Not a slot id: '{0}'")]
    InvalidSlot(String),

    #[error("Unknown effect '{0}' (try 'effects')")]
    UnknownEffect(String),

    #[error("Expected on/off, got '{0}'")]
    InvalidSwitch(String),
}

/// Usage text for the `help` command
pub const HELP: &str = "\
Commands:
  import <track> <path>            load an audio file into track 1-4
  split [demucs|spleeter] <path>   split a song into stems on tracks 1-4
  split-all [method] <directory>   split every file in a directory
  cancel                           stop the running split
  add <track>                      add an empty effect slot
  effect <track> <slot> <kind>     set a slot's effect (resets parameters)
  param <track> <slot> <name> <v>  set a parameter from a 0-1 slider value
  lock|unlock <track> <slot>       freeze or release a slot
  remove <track> <slot>            remove a slot
  chain <track>                    show a track's effect chain
  effects                          list effects and their parameters
  volume <track> <0-1>             set track volume
  mute|solo <track> on|off         mute or solo a track
  play | stop | toggle             transport
  seek <0-1>                       jump to a fraction of the longest track
  export <path>                    write the mix as a WAV file
  reset                            clear every track
  status                           show transport and tracks
  quit";

/// Cursor over the arguments of one line
struct Args<'a> {
    command: &'static str,
    rest: &'a str,
}

impl<'a> Args<'a> {
    fn next(&mut self) -> Option<&'a str> {
        let rest = self.rest.trim_start();
        if rest.is_empty() {
            return None;
        }
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let (token, tail) = rest.split_at(end);
        self.rest = tail;
        Some(token)
    }

    fn peek(&self) -> Option<&'a str> {
        self.rest.split_whitespace().next()
    }

    fn require(&mut self, argument: &'static str) -> Result<&'a str, ParseError> {
        self.next().ok_or(ParseError::MissingArgument {
            command: self.command,
            argument,
        })
    }

    fn track(&mut self) -> Result<TrackId, ParseError> {
        let token = self.require("a track number")?;
        token
            .parse::<usize>()
            .ok()
            .and_then(TrackId::from_display_number)
            .ok_or_else(|| ParseError::InvalidTrack(token.to_string()))
    }

    fn slot(&mut self) -> Result<SlotId, ParseError> {
        let token = self.require("a slot id")?;
        token
            .trim_start_matches('#')
            .parse::<u32>()
            .map(SlotId)
            .map_err(|_| ParseError::InvalidSlot(token.to_string()))
    }

    fn number<T: std::str::FromStr>(&mut self, argument: &'static str) -> Result<T, ParseError> {
        let token = self.require(argument)?;
        token
            .parse::<T>()
            .map_err(|_| ParseError::InvalidNumber(token.to_string()))
    }

    fn switch(&mut self) -> Result<bool, ParseError> {
        let token = self.require("on or off")?;
        match token.to_ascii_lowercase().as_str() {
            "on" | "true" | "1" | "yes" => Ok(true),
            "off" | "false" | "0" | "no" => Ok(false),
            _ => Err(ParseError::InvalidSwitch(token.to_string())),
        }
    }

    /// Remaining text as a path, with surrounding quotes removed
    fn path(&mut self, argument: &'static str) -> Result<PathBuf, ParseError> {
        let text = self.rest.trim();
        let text = text
            .strip_prefix('"')
            .and_then(|t| t.strip_suffix('"'))
            .unwrap_or(text);
        self.rest = "";
        if text.is_empty() {
            return Err(ParseError::MissingArgument {
                command: self.command,
                argument,
            });
        }
        Ok(PathBuf::from(text))
    }

    /// Optional leading separation method
    fn method(&mut self) -> Option<SeparationMethod> {
        let method = self.peek().and_then(SeparationMethod::from_name)?;
        self.next();
        Some(method)
    }
}

impl Command {
    /// Parse one input line
    pub fn parse(line: &str) -> Result<Command, ParseError> {
        let line = line.trim();
        let (word, rest) = match line.find(char::is_whitespace) {
            Some(i) => line.split_at(i),
            None => (line, ""),
        };
        if word.is_empty() {
            return Err(ParseError::Empty);
        }

        let command = match word.to_ascii_lowercase().as_str() {
            "import" | "load" => "import",
            "add" => "add",
            "effect" | "fx" => "effect",
            "param" | "set" => "param",
            "lock" => "lock",
            "unlock" => "unlock",
            "remove" | "rm" => "remove",
            "volume" | "vol" => "volume",
            "mute" => "mute",
            "solo" => "solo",
            "play" => "play",
            "stop" => "stop",
            "toggle" | "space" => "toggle",
            "seek" => "seek",
            "export" => "export",
            "reset" => "reset",
            "split" => "split",
            "split-all" | "splitall" => "split-all",
            "cancel" => "cancel",
            "chain" => "chain",
            "effects" => "effects",
            "status" | "st" => "status",
            "help" | "?" => "help",
            "quit" | "exit" | "q" => "quit",
            _ => return Err(ParseError::UnknownCommand(word.to_string())),
        };
        let mut args = Args { command, rest };

        Ok(match command {
            "import" => Command::Import {
                track: args.track()?,
                path: args.path("a file path")?,
            },
            "add" => Command::AddEffect {
                track: args.track()?,
            },
            "effect" => {
                let track = args.track()?;
                let slot = args.slot()?;
                let name = args.require("an effect name")?;
                let kind = EffectKind::from_name(name)
                    .ok_or_else(|| ParseError::UnknownEffect(name.to_string()))?;
                Command::SetEffect { track, slot, kind }
            }
            "param" => Command::SetParameter {
                track: args.track()?,
                slot: args.slot()?,
                name: args.require("a parameter name")?.to_string(),
                value: args.number("a value between 0 and 1")?,
            },
            "lock" => Command::LockSlot {
                track: args.track()?,
                slot: args.slot()?,
            },
            "unlock" => Command::UnlockSlot {
                track: args.track()?,
                slot: args.slot()?,
            },
            "remove" => Command::RemoveSlot {
                track: args.track()?,
                slot: args.slot()?,
            },
            "volume" => Command::SetVolume {
                track: args.track()?,
                volume: args.number("a volume between 0 and 1")?,
            },
            "mute" => Command::SetMute {
                track: args.track()?,
                muted: args.switch()?,
            },
            "solo" => Command::SetSolo {
                track: args.track()?,
                soloed: args.switch()?,
            },
            "play" => Command::Play,
            "stop" => Command::Stop,
            "toggle" => Command::Toggle,
            "seek" => Command::Seek {
                fraction: args.number("a position between 0 and 1")?,
            },
            "export" => Command::Export {
                path: args.path("an output path")?,
            },
            "reset" => Command::Reset,
            "split" => {
                let method = args.method();
                Command::Split {
                    method,
                    path: args.path("a file path")?,
                }
            }
            "split-all" => {
                let method = args.method();
                Command::SplitAll {
                    method,
                    directory: args.path("a directory")?,
                }
            }
            "cancel" => Command::CancelSplit,
            "chain" => Command::ShowChain {
                track: args.track()?,
            },
            "effects" => Command::ListEffects,
            "status" => Command::Status,
            "help" => Command::Help,
            _ => Command::Quit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_commands() {
        assert_eq!(Command::parse("play"), Ok(Command::Play));
        assert_eq!(Command::parse("  STOP  "), Ok(Command::Stop));
        assert_eq!(Command::parse("seek 0.25"), Ok(Command::Seek { fraction: 0.25 }));
        assert_eq!(Command::parse("q"), Ok(Command::Quit));
    }

    #[test]
    fn test_import_path_keeps_spaces() {
        assert_eq!(
            Command::parse("import 2 /music/My Song.flac"),
            Ok(Command::Import {
                track: TrackId(1),
                path: PathBuf::from("/music/My Song.flac"),
            })
        );
        assert_eq!(
            Command::parse("export \"/tmp/final mix.wav\""),
            Ok(Command::Export {
                path: PathBuf::from("/tmp/final mix.wav"),
            })
        );
    }

    #[test]
    fn test_effect_commands() {
        assert_eq!(
            Command::parse("effect 1 #3 reverb"),
            Ok(Command::SetEffect {
                track: TrackId(0),
                slot: SlotId(3),
                kind: EffectKind::Reverb,
            })
        );
        assert_eq!(
            Command::parse("param 4 2 room_size 0.8"),
            Ok(Command::SetParameter {
                track: TrackId(3),
                slot: SlotId(2),
                name: "room_size".to_string(),
                value: 0.8,
            })
        );
        assert_eq!(
            Command::parse("effect 1 1 flanger"),
            Err(ParseError::UnknownEffect("flanger".to_string()))
        );
    }

    #[test]
    fn test_split_method_is_optional() {
        assert_eq!(
            Command::parse("split spleeter /music/song.mp3"),
            Ok(Command::Split {
                path: PathBuf::from("/music/song.mp3"),
                method: Some(SeparationMethod::Spleeter),
            })
        );
        assert_eq!(
            Command::parse("split /music/demucs tests/song.mp3"),
            Ok(Command::Split {
                path: PathBuf::from("/music/demucs tests/song.mp3"),
                method: None,
            })
        );
        assert_eq!(
            Command::parse("split-all demucs /music/albums"),
            Ok(Command::SplitAll {
                directory: PathBuf::from("/music/albums"),
                method: Some(SeparationMethod::Demucs),
            })
        );
    }

    #[test]
    fn test_switches() {
        assert_eq!(
            Command::parse("solo 1 on"),
            Ok(Command::SetSolo {
                track: TrackId(0),
                soloed: true,
            })
        );
        assert_eq!(
            Command::parse("mute 2 maybe"),
            Err(ParseError::InvalidSwitch("maybe".to_string()))
        );
    }

    #[test]
    fn test_errors() {
        assert_eq!(Command::parse("   "), Err(ParseError::Empty));
        assert_eq!(
            Command::parse("dance"),
            Err(ParseError::UnknownCommand("dance".to_string()))
        );
        assert_eq!(
            Command::parse("volume 0 0.5"),
            Err(ParseError::InvalidTrack("0".to_string()))
        );
        assert_eq!(
            Command::parse("volume 1 loud"),
            Err(ParseError::InvalidNumber("loud".to_string()))
        );
        assert_eq!(
            Command::parse("import 1"),
            Err(ParseError::MissingArgument {
                command: "import",
                argument: "a file path",
            })
        );
        assert_eq!(
            Command::parse("lock 1 x"),
            Err(ParseError::InvalidSlot("x".to_string()))
        );
    }
}
