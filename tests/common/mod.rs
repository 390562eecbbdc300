// Shared helpers for integration tests: a scripted in-memory device.
#![allow(dead_code)]

use async_trait::async_trait;
use dropship::core::config::{CompletionMode, Config, StreamSource};
use dropship::device::{CommandOutput, LineStream, RemoteChannel};
use dropship::error::{SyncError, SyncResult};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const BUTTON_AT_CENTER: &str = r#"<?xml version='1.0' encoding='UTF-8' standalone='yes' ?><hierarchy rotation="0"><node index="0" text="" resource-id="" class="android.widget.FrameLayout" clickable="false" enabled="true" bounds="[0,0][1080,2400]"><node index="0" text="Upload" resource-id="com.google.android.apps.photos:id/upload_button" class="android.widget.Button" clickable="true" enabled="true" bounds="[100,200][300,400]" /></node></hierarchy>"#;

pub const BUTTON_MOVED: &str = r#"<?xml version='1.0' encoding='UTF-8' standalone='yes' ?><hierarchy rotation="0"><node index="0" text="Upload" resource-id="com.google.android.apps.photos:id/upload_button" class="android.widget.Button" clickable="true" enabled="true" bounds="[0,0][10,10]" /></hierarchy>"#;

pub const PROGRESS_SHOWING: &str = r#"<?xml version='1.0' encoding='UTF-8' standalone='yes' ?><hierarchy rotation="0"><node index="0" text="Uploading…" resource-id="" class="android.widget.TextView" clickable="false" enabled="true" bounds="[0,1000][1080,1100]" /></hierarchy>"#;

pub const NO_BUTTON: &str = r#"<?xml version='1.0' encoding='UTF-8' standalone='yes' ?><hierarchy rotation="0"><node index="0" text="Loading" resource-id="" class="android.widget.ProgressBar" clickable="false" enabled="true" bounds="[0,0][1080,2400]" /></hierarchy>"#;

pub fn dump_output(xml: &str) -> String {
    format!("{}UI hierchary dumped to: /dev/tty", xml)
}

pub fn toast_event(text: &str) -> String {
    format!(
        "EventType: TYPE_NOTIFICATION_STATE_CHANGED; EventTime: 1; PackageName: com.google.android.apps.photos; [ ClassName: android.widget.Toast$TN; Text: [{}]; ContentDescription: null ]",
        text
    )
}

#[derive(Default)]
pub struct FakeState {
    pub calls: Vec<String>,
    pub remote_files: HashMap<String, u64>,
    pub ui_dumps: VecDeque<String>,
    pub default_dump: String,
    pub log_lines: Vec<String>,
    pub event_lines: Vec<String>,
    pub unreachable_polls: usize,
    pub fail_on: Vec<String>,
    pub taps: Vec<(i32, i32)>,
    pub streams_opened: usize,
    pub streams_terminated: usize,
}

#[derive(Clone, Default)]
pub struct FakeChannel {
    pub state: Arc<Mutex<FakeState>>,
}

impl FakeChannel {
    pub fn new() -> Self {
        let fake = Self::default();
        fake.state().default_dump = dump_output(BUTTON_AT_CENTER);
        fake
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn calls_matching(&self, needle: &str) -> usize {
        self.state().calls.iter().filter(|c| c.contains(needle)).count()
    }

    pub fn has_remote(&self, path: &str) -> bool {
        self.state().remote_files.contains_key(path)
    }
}

fn quoted(cmd: &str) -> String {
    match (cmd.find('\''), cmd.rfind('\'')) {
        (Some(start), Some(end)) if end > start => cmd[start + 1..end].to_string(),
        _ => String::new(),
    }
}

#[async_trait]
impl RemoteChannel for FakeChannel {
    async fn execute(&self, args: &[String]) -> SyncResult<CommandOutput> {
        let joined = args.join(" ");
        let mut state = self.state();
        state.calls.push(joined.clone());

        if state.fail_on.iter().any(|f| joined.contains(f.as_str())) {
            return Err(SyncError::remote_failed(joined, "exit status: 1", "scripted failure"));
        }

        let stdout = if joined.starts_with("shell getprop") {
            if state.unreachable_polls > 0 {
                state.unreachable_polls -= 1;
                return Err(SyncError::remote_failed(
                    joined,
                    "exit status: 1",
                    "adb: no devices/emulators found",
                ));
            }
            "Pixel 7\n".to_string()
        } else if joined.contains("stat -c %s") {
            let path = quoted(&joined);
            match state.remote_files.get(&path) {
                Some(size) => format!("{}\n", size),
                None => {
                    return Err(SyncError::remote_failed(
                        joined,
                        "exit status: 1",
                        "stat: No such file or directory",
                    ));
                }
            }
        } else if joined.starts_with("shell rm") {
            let path = quoted(&joined);
            state.remote_files.remove(&path);
            String::new()
        } else if joined.starts_with("shell am start") {
            "Starting: Intent { act=android.intent.action.SEND }\n".to_string()
        } else if joined.starts_with("exec-out uiautomator dump") {
            state
                .ui_dumps
                .pop_front()
                .unwrap_or_else(|| state.default_dump.clone())
        } else if joined.starts_with("shell input tap") {
            let coords: Vec<i32> = args[3..].iter().filter_map(|a| a.parse().ok()).collect();
            state.taps.push((coords[0], coords[1]));
            String::new()
        } else {
            String::new()
        };

        Ok(CommandOutput {
            stdout,
            stderr: String::new(),
        })
    }

    async fn push(&self, local: &Path, remote: &str) -> SyncResult<()> {
        let joined = format!("push {} {}", local.display(), remote);
        let mut state = self.state();
        state.calls.push(joined.clone());
        if state.fail_on.iter().any(|f| joined.contains(f.as_str())) {
            return Err(SyncError::remote_failed(joined, "exit status: 1", "scripted failure"));
        }
        let size = std::fs::metadata(local)?.len();
        state.remote_files.insert(remote.to_string(), size);
        Ok(())
    }

    async fn start_stream(&self, args: &[String]) -> SyncResult<Box<dyn LineStream>> {
        let joined = args.join(" ");
        let mut state = self.state();
        state.calls.push(format!("stream {}", joined));
        state.streams_opened += 1;
        let lines = if joined == "logcat" {
            state.log_lines.clone()
        } else {
            state.event_lines.clone()
        };
        Ok(Box::new(FakeStream {
            lines: lines.into(),
            state: self.state.clone(),
            done: false,
        }))
    }
}

pub struct FakeStream {
    lines: VecDeque<String>,
    state: Arc<Mutex<FakeState>>,
    done: bool,
}

#[async_trait]
impl LineStream for FakeStream {
    async fn next_line(&mut self) -> SyncResult<Option<String>> {
        match self.lines.pop_front() {
            Some(line) => Ok(Some(line)),
            // a live log never ends on its own
            None => std::future::pending().await,
        }
    }

    async fn terminate(&mut self) -> SyncResult<()> {
        self.kill();
        Ok(())
    }

    fn kill(&mut self) {
        if !self.done {
            self.done = true;
            self.state.lock().unwrap().streams_terminated += 1;
        }
    }
}

/// Stream mode here tails the log so tests can script log lines separately from
/// UI events; `Config::default()` tails UI events instead.
pub fn test_config(watched: &Path, ledger: PathBuf, mode: CompletionMode) -> Config {
    Config {
        watched_directory: watched.to_path_buf(),
        ledger_path: ledger,
        delete_local_on_success: Some(true),
        completion_mode: mode,
        stream_source: StreamSource::Log,
        completion_timeout_secs: 30,
        locate_timeout_secs: 5,
        ..Config::default()
    }
}
