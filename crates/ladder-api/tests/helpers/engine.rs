//! Minimal stand-in for ffmpeg.

use async_trait::async_trait;
use ladder_processing::{CommandOutput, CommandRunner};
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Default)]
pub struct StubEngine {
    fail_on: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl StubEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exit non-zero for the target labelled `label` (`360p`, `hls`, `dash`).
    pub fn failing_on(label: &str) -> Self {
        Self {
            fail_on: Some(label.to_string()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

#[async_trait]
impl CommandRunner for StubEngine {
    async fn run(&self, _program: &str, args: &[String]) -> io::Result<CommandOutput> {
        let label = match value_after(args, "-f") {
            Some(muxer @ ("hls" | "dash")) => muxer.to_string(),
            _ => format!(
                "{}p",
                value_after(args, "-vf")
                    .and_then(|f| f.rsplit(':').next())
                    .unwrap_or_default()
            ),
        };
        self.calls.lock().unwrap().push(label.clone());

        if self.fail_on.as_deref() == Some(label.as_str()) {
            return Ok(CommandOutput {
                success: false,
                exit_code: Some(1),
                stdout: Vec::new(),
                stderr: b"Conversion failed!".to_vec(),
            });
        }

        let output = PathBuf::from(args.last().unwrap());
        let dir = output.parent().unwrap();
        match label.as_str() {
            "hls" => {
                std::fs::write(dir.join("stream_0_000.ts"), "ts")?;
                std::fs::write(dir.join("stream_0.m3u8"), "#EXTM3U")?;
                std::fs::write(dir.join("master.m3u8"), "#EXTM3U")?;
            }
            "dash" => {
                std::fs::write(dir.join("init-stream0.m4s"), "init")?;
                std::fs::write(dir.join("chunk-stream0-00001.m4s"), "m4s")?;
                std::fs::write(&output, "<MPD/>")?;
            }
            _ => std::fs::write(&output, format!("rendition {}", label))?,
        }

        Ok(CommandOutput {
            success: true,
            exit_code: Some(0),
            ..Default::default()
        })
    }
}
