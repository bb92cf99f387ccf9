//! Stand-in for ffmpeg: writes plausible outputs where the real engine would.

use async_trait::async_trait;
use ladder_processing::{CommandOutput, CommandRunner};
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
pub struct FakeEngine {
    fail_on: HashSet<String>,
    hang_on: HashSet<String>,
    calls: Mutex<Vec<String>>,
    killed: AtomicUsize,
}

/// Counts invocations that were dropped before the "process" exited.
struct KillCounter<'a>(&'a AtomicUsize);

impl Drop for KillCounter<'_> {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exit non-zero for the target labelled `label` (`720p`, `hls`, ...).
    pub fn failing_on(mut self, label: &str) -> Self {
        self.fail_on.insert(label.to_string());
        self
    }

    /// Never exit for the target labelled `label`.
    pub fn hanging_on(mut self, label: &str) -> Self {
        self.hang_on.insert(label.to_string());
        self
    }

    /// Target labels in invocation order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn killed(&self) -> usize {
        self.killed.load(Ordering::SeqCst)
    }
}

fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn label_for(args: &[String]) -> String {
    match value_after(args, "-f") {
        Some(muxer @ ("hls" | "dash")) => muxer.to_string(),
        _ => {
            let filter = value_after(args, "-vf").unwrap_or_default();
            format!("{}p", filter.rsplit(':').next().unwrap_or_default())
        }
    }
}

fn write_hls(dir: &Path) {
    for variant in 0..3 {
        std::fs::write(dir.join(format!("stream_{}.m3u8", variant)), "#EXTM3U").unwrap();
        for segment in 0..2 {
            std::fs::write(dir.join(format!("stream_{}_{:03}.ts", variant, segment)), "ts").unwrap();
        }
    }
    std::fs::write(dir.join("master.m3u8"), "#EXTM3U").unwrap();
}

fn write_dash(dir: &Path) {
    for stream in 0..3 {
        std::fs::write(dir.join(format!("init-stream{}.m4s", stream)), "init").unwrap();
        for chunk in 1..=2 {
            std::fs::write(dir.join(format!("chunk-stream{}-{:05}.m4s", stream, chunk)), "m4s").unwrap();
        }
    }
    std::fs::write(dir.join("manifest.mpd"), "<MPD/>").unwrap();
}

#[async_trait]
impl CommandRunner for FakeEngine {
    async fn run(&self, _program: &str, args: &[String]) -> io::Result<CommandOutput> {
        let label = label_for(args);
        self.calls.lock().unwrap().push(label.clone());

        if self.hang_on.contains(&label) {
            let _counter = KillCounter(&self.killed);
            tokio::time::sleep(Duration::from_secs(3600)).await;
            std::mem::forget(_counter);
        }

        if self.fail_on.contains(&label) {
            return Ok(CommandOutput {
                success: false,
                exit_code: Some(1),
                stdout: Vec::new(),
                stderr: format!("Error while encoding {}", label).into_bytes(),
            });
        }

        let output = PathBuf::from(args.last().unwrap());
        match label.as_str() {
            "hls" => write_hls(output.parent().unwrap()),
            "dash" => write_dash(output.parent().unwrap()),
            _ => std::fs::write(&output, format!("rendition {}", label)).unwrap(),
        }

        Ok(CommandOutput {
            success: true,
            exit_code: Some(0),
            ..Default::default()
        })
    }
}
