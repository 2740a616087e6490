//! Stem separation job
//!
//! One job turns a source file into four stem files:
//!
//! 1. Normalise the input into the cache directory ([`crate::convert`])
//! 2. Derive the output folder from the base file name and the method
//! 3. Return immediately if that folder already holds all four stems
//! 4. Otherwise run the external tool and check that the stems appeared
//!
//! The tool is run through a [`ToolRunner`] so the job can be driven without
//! demucs or spleeter installed.

use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use stemix_core::{Stem, NUM_STEMS};

use super::config::{SeparationConfig, SeparationMethod};
use super::error::{Result, SeparationError};
use crate::convert::prepare_input;

/// How often a running tool is checked for exit or cancellation
const PROCESS_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Paths of the four stems of one song
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StemPaths {
    paths: [PathBuf; NUM_STEMS],
}

impl StemPaths {
    /// The standard stem file names inside `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            paths: Stem::ALL.map(|stem| dir.join(stem.file_name())),
        }
    }

    pub fn get(&self, stem: Stem) -> &Path {
        &self.paths[stem as usize]
    }

    /// Stems in Vocals, Drums, Bass, Other order
    pub fn iter(&self) -> impl Iterator<Item = (Stem, &Path)> {
        Stem::ALL.into_iter().zip(self.paths.iter().map(PathBuf::as_path))
    }

    /// File names that do not exist on disk
    pub fn missing(&self) -> Vec<String> {
        self.iter()
            .filter(|(_, path)| !path.is_file())
            .map(|(stem, _)| stem.file_name().to_string())
            .collect()
    }

    pub fn all_exist(&self) -> bool {
        self.missing().is_empty()
    }
}

/// Result of a successful job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitOutcome {
    pub stems: StemPaths,
    /// True when the stems came from an earlier run
    pub cache_hit: bool,
}

/// Cancellation flag shared between a job and whoever may cancel it
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A command line for an external tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// Exit status and diagnostics of a finished tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stderr: String,
}

/// Runs external tools to completion
pub trait ToolRunner: Send + Sync {
    /// Run `invocation`, returning [`SeparationError::Cancelled`] once
    /// `cancel` is set
    fn run(&self, invocation: &ToolInvocation, cancel: &CancelToken) -> Result<ToolOutput>;
}

/// Runs tools as child processes
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ToolRunner for ProcessRunner {
    fn run(&self, invocation: &ToolInvocation, cancel: &CancelToken) -> Result<ToolOutput> {
        log::debug!("Running {:?} {:?}", invocation.program, invocation.args);

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SeparationError::Spawn {
                program: invocation.program.clone(),
                source: e,
            })?;

        // Drain stderr on the side so a chatty tool cannot fill the pipe
        let stderr_reader = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut text = String::new();
                let _ = pipe.read_to_string(&mut text);
                text
            })
        });

        let status = loop {
            if cancel.is_cancelled() {
                log::info!("Terminating {:?}", invocation.program);
                let _ = child.kill();
                let _ = child.wait();
                return Err(SeparationError::Cancelled);
            }
            match child.try_wait()? {
                Some(status) => break status,
                None => thread::sleep(PROCESS_POLL_INTERVAL),
            }
        };

        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        Ok(ToolOutput {
            success: status.success(),
            code: status.code(),
            stderr,
        })
    }
}

/// Splits files into stems with demucs or spleeter, caching results
pub struct StemSplitter {
    cache_dir: PathBuf,
    config: SeparationConfig,
    runner: Arc<dyn ToolRunner>,
}

impl StemSplitter {
    /// Create a splitter that runs the real tools
    pub fn new(cache_dir: PathBuf, config: SeparationConfig) -> Self {
        Self::with_runner(cache_dir, config, Arc::new(ProcessRunner))
    }

    pub fn with_runner(
        cache_dir: PathBuf,
        config: SeparationConfig,
        runner: Arc<dyn ToolRunner>,
    ) -> Self {
        Self {
            cache_dir,
            config,
            runner,
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn config(&self) -> &SeparationConfig {
        &self.config
    }

    /// Directory the tool for `method` writes under
    pub fn output_root(&self, method: SeparationMethod) -> PathBuf {
        self.cache_dir.join(method.output_dir_name())
    }

    /// Where the stems of an already-prepared input will be written
    pub fn expected_stems(&self, input: &Path, method: SeparationMethod) -> StemPaths {
        let base_name = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        StemPaths::in_dir(&method.stem_dir(&self.output_root(method), &base_name))
    }

    /// Command line for splitting `input` with `method`
    pub fn invocation(&self, input: &Path, method: SeparationMethod) -> ToolInvocation {
        let output_root = self.output_root(method);
        match method {
            SeparationMethod::Demucs => ToolInvocation::new(&self.config.demucs_program)
                .arg("--out")
                .arg(output_root)
                .arg(input),
            SeparationMethod::Spleeter => ToolInvocation::new(&self.config.spleeter_program)
                .arg("separate")
                .arg("-p")
                .arg(&self.config.spleeter_model)
                .arg("-o")
                .arg(output_root)
                .arg(input),
        }
    }

    /// Split `source` into stems
    pub fn run(&self, source: &Path, method: SeparationMethod) -> Result<SplitOutcome> {
        self.run_with_cancel(source, method, &CancelToken::new())
    }

    /// Split `source` into stems, stopping early if `cancel` is set
    pub fn run_with_cancel(
        &self,
        source: &Path,
        method: SeparationMethod,
        cancel: &CancelToken,
    ) -> Result<SplitOutcome> {
        let input = prepare_input(source, &self.cache_dir)?;
        let stems = self.expected_stems(&input, method);

        if stems.all_exist() {
            log::info!("Cache hit: using stems from {:?}", stems.get(Stem::Vocals).parent());
            return Ok(SplitOutcome {
                stems,
                cache_hit: true,
            });
        }
        if cancel.is_cancelled() {
            return Err(SeparationError::Cancelled);
        }

        log::info!("Cache miss: splitting {:?} with {}", input, method);
        std::fs::create_dir_all(self.output_root(method))?;

        let output = self.runner.run(&self.invocation(&input, method), cancel)?;
        if !output.success {
            log::error!("{} failed with exit code {:?}", method, output.code);
            return Err(SeparationError::ToolFailed {
                tool: method.name().to_string(),
                code: output.code,
                stderr: output.stderr,
            });
        }

        let missing = stems.missing();
        if !missing.is_empty() {
            let dir = stems
                .get(Stem::Vocals)
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            return Err(SeparationError::MissingStems { dir, missing });
        }

        Ok(SplitOutcome {
            stems,
            cache_hit: false,
        })
    }
}

/// Regular files directly inside `directory`, sorted by name
pub fn list_files(directory: &Path) -> Result<Vec<PathBuf>> {
    if !directory.is_dir() {
        return Err(SeparationError::NotADirectory(directory.to_path_buf()));
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(directory)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use std::sync::Mutex;

    /// What the fake tool does when run
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub enum FakeBehavior {
        /// Write all four stems and exit 0
        WriteStems,
        /// Exit 1 with a diagnostic
        Fail,
        /// Exit 0 without writing anything
        WriteNothing,
        /// Wait until cancelled
        Hang,
    }

    /// Records invocations instead of running anything
    pub struct FakeRunner {
        pub behavior: FakeBehavior,
        pub calls: Mutex<Vec<ToolInvocation>>,
    }

    impl FakeRunner {
        pub fn new(behavior: FakeBehavior) -> Self {
            Self {
                behavior,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn stem_dir(invocation: &ToolInvocation) -> PathBuf {
            let args: Vec<PathBuf> = invocation.args.iter().map(PathBuf::from).collect();
            let input = args.last().unwrap();
            let base = input.file_stem().unwrap().to_string_lossy().into_owned();
            if let Some(i) = args.iter().position(|a| a.as_os_str() == "--out") {
                args[i + 1].join("htdemucs").join(base)
            } else {
                let i = args.iter().position(|a| a.as_os_str() == "-o").unwrap();
                args[i + 1].join(base)
            }
        }
    }

    impl ToolRunner for FakeRunner {
        fn run(&self, invocation: &ToolInvocation, cancel: &CancelToken) -> Result<ToolOutput> {
            self.calls.lock().unwrap().push(invocation.clone());
            match self.behavior {
                FakeBehavior::WriteStems => {
                    let dir = Self::stem_dir(invocation);
                    std::fs::create_dir_all(&dir)?;
                    for stem in Stem::ALL {
                        std::fs::write(dir.join(stem.file_name()), stem.name())?;
                    }
                    Ok(ToolOutput { success: true, code: Some(0), stderr: String::new() })
                }
                FakeBehavior::Fail => Ok(ToolOutput {
                    success: false,
                    code: Some(1),
                    stderr: "model not found".to_string(),
                }),
                FakeBehavior::WriteNothing => {
                    Ok(ToolOutput { success: true, code: Some(0), stderr: String::new() })
                }
                FakeBehavior::Hang => loop {
                    if cancel.is_cancelled() {
                        return Err(SeparationError::Cancelled);
                    }
                    thread::sleep(Duration::from_millis(5));
                },
            }
        }
    }

    /// Write a short WAV file to split
    pub fn write_source(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        stemix_core::audio_file::write_wav(&path, &stemix_core::AudioBuffer::silence(32, 2), 44100)
            .unwrap();
        path
    }
}

#[cfg(test)]
mod tests {
    use super::test_util::*;
    use super::*;

    fn splitter(cache: &Path, behavior: FakeBehavior) -> (StemSplitter, Arc<FakeRunner>) {
        let runner = Arc::new(FakeRunner::new(behavior));
        let splitter = StemSplitter::with_runner(
            cache.to_path_buf(),
            SeparationConfig::default(),
            runner.clone(),
        );
        (splitter, runner)
    }

    #[test]
    fn test_demucs_layout_and_invocation() {
        let cache = tempfile::tempdir().unwrap();
        let (splitter, runner) = splitter(cache.path(), FakeBehavior::WriteStems);
        let input = cache.path().join("song.wav");

        let invocation = splitter.invocation(&input, SeparationMethod::Demucs);
        assert_eq!(invocation.program, PathBuf::from("demucs"));
        assert_eq!(
            invocation.args,
            vec![
                OsString::from("--out"),
                cache.path().join("Demucs_Output").into_os_string(),
                input.clone().into_os_string(),
            ]
        );

        let stems = splitter.expected_stems(&input, SeparationMethod::Demucs);
        assert_eq!(
            stems.get(Stem::Bass),
            cache.path().join("Demucs_Output/htdemucs/song/bass.wav")
        );
        assert_eq!(runner.call_count(), 0);
    }

    #[test]
    fn test_spleeter_invocation() {
        let cache = tempfile::tempdir().unwrap();
        let (splitter, _) = splitter(cache.path(), FakeBehavior::WriteStems);
        let input = cache.path().join("song.mp3");

        let invocation = splitter.invocation(&input, SeparationMethod::Spleeter);
        let args: Vec<String> = invocation
            .args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args[..3], ["separate", "-p", "spleeter:4stems"]);
        assert_eq!(args[3], "-o");

        let stems = splitter.expected_stems(&input, SeparationMethod::Spleeter);
        assert_eq!(
            stems.get(Stem::Vocals),
            cache.path().join("Spleeter_Output/song/vocals.wav")
        );
    }

    #[test]
    fn test_second_run_is_cache_hit() {
        let src = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let source = write_source(src.path(), "track.wav");
        let (splitter, runner) = splitter(cache.path(), FakeBehavior::WriteStems);

        let first = splitter.run(&source, SeparationMethod::Demucs).unwrap();
        assert!(!first.cache_hit);
        assert!(first.stems.all_exist());

        let second = splitter.run(&source, SeparationMethod::Demucs).unwrap();
        assert!(second.cache_hit);
        assert_eq!(second.stems, first.stems);
        assert_eq!(runner.call_count(), 1);

        // A different method is a different cache entry
        splitter.run(&source, SeparationMethod::Spleeter).unwrap();
        assert_eq!(runner.call_count(), 2);
    }

    #[test]
    fn test_tool_failure_carries_stderr() {
        let src = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let source = write_source(src.path(), "track.wav");
        let (splitter, _) = splitter(cache.path(), FakeBehavior::Fail);

        match splitter.run(&source, SeparationMethod::Demucs) {
            Err(SeparationError::ToolFailed { tool, code, stderr }) => {
                assert_eq!(tool, "demucs");
                assert_eq!(code, Some(1));
                assert_eq!(stderr, "model not found");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_missing_output_reported() {
        let src = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let source = write_source(src.path(), "track.wav");
        let (splitter, _) = splitter(cache.path(), FakeBehavior::WriteNothing);

        match splitter.run(&source, SeparationMethod::Demucs) {
            Err(SeparationError::MissingStems { missing, .. }) => assert_eq!(missing.len(), 4),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_cancel_before_tool_runs() {
        let src = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let source = write_source(src.path(), "track.wav");
        let (splitter, runner) = splitter(cache.path(), FakeBehavior::WriteStems);

        let cancel = CancelToken::new();
        cancel.cancel();
        let result = splitter.run_with_cancel(&source, SeparationMethod::Demucs, &cancel);

        assert!(matches!(result, Err(SeparationError::Cancelled)));
        assert_eq!(runner.call_count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_process_runner_exit_code_and_stderr() {
        let invocation = ToolInvocation::new("sh")
            .arg("-c")
            .arg("echo broken >&2; exit 3");

        let output = ProcessRunner.run(&invocation, &CancelToken::new()).unwrap();

        assert!(!output.success);
        assert_eq!(output.code, Some(3));
        assert_eq!(output.stderr.trim(), "broken");
    }

    #[cfg(unix)]
    #[test]
    fn test_process_runner_cancel_kills_child() {
        let invocation = ToolInvocation::new("sleep").arg("30");
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            trigger.cancel();
        });

        let start = std::time::Instant::now();
        let result = ProcessRunner.run(&invocation, &cancel);
        canceller.join().unwrap();

        assert!(matches!(result, Err(SeparationError::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_process_runner_missing_program() {
        let invocation = ToolInvocation::new("/definitely/not/a/tool");
        assert!(matches!(
            ProcessRunner.run(&invocation, &CancelToken::new()),
            Err(SeparationError::Spawn { .. })
        ));
    }
}
