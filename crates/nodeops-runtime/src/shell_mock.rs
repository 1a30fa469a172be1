//! Test mock for `shell::run_host` and related functions.
//!
//! Provides a thread-local handler that intercepts host commands during
//! tests. Responses are chosen by command-line prefix and every intercepted
//! command is recorded so tests can assert which external calls happened.

use std::cell::RefCell;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Output};
use std::sync::{Arc, Mutex};

/// Mock response for a host command.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Simulate the binary not being installed.
    pub spawn_error: bool,
}

impl MockResponse {
    pub fn ok(stdout: &str) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
            spawn_error: false,
        }
    }

    pub fn empty() -> Self {
        Self::ok("")
    }

    pub fn fail(exit_code: i32, stderr: &str) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.to_string(),
            spawn_error: false,
        }
    }

    pub fn missing() -> Self {
        Self {
            spawn_error: true,
            ..Self::empty()
        }
    }

    fn to_output(&self) -> io::Result<Output> {
        if self.spawn_error {
            return Err(io::Error::new(io::ErrorKind::NotFound, "No such file or directory"));
        }
        Ok(Output {
            // Unix exit code encoding: status = code << 8
            status: ExitStatus::from_raw(self.exit_code << 8),
            stdout: self.stdout.as_bytes().to_vec(),
            stderr: self.stderr.as_bytes().to_vec(),
        })
    }
}

/// Shared record of intercepted command lines.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn all(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Number of recorded commands starting with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn contains(&self, prefix: &str) -> bool {
        self.count(prefix) > 0
    }

    /// Index of the first command starting with `prefix`.
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.0.lock().unwrap().iter().position(|c| c.starts_with(prefix))
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    fn push(&self, line: &str) {
        self.0.lock().unwrap().push(line.to_string());
    }
}

struct MockState {
    rules: Vec<(String, MockResponse)>,
    calls: CallLog,
}

thread_local! {
    static HANDLER: RefCell<Option<MockState>> = const { RefCell::new(None) };
}

/// Guard that clears the mock handler on drop.
pub struct MockGuard;

impl Drop for MockGuard {
    fn drop(&mut self) {
        HANDLER.with(|h| *h.borrow_mut() = None);
    }
}

/// Try to intercept a command via the installed mock handler.
///
/// The most recently added matching rule wins; unmatched commands succeed
/// with empty output.
pub(crate) fn intercept(line: &str) -> Option<io::Result<Output>> {
    HANDLER.with(|h| {
        h.borrow().as_ref().map(|state| {
            state.calls.push(line);
            state
                .rules
                .iter()
                .rev()
                .find(|(prefix, _)| line.starts_with(prefix.as_str()))
                .map(|(_, resp)| resp.to_output())
                .unwrap_or_else(|| MockResponse::empty().to_output())
        })
    })
}

/// Start building a mock.
pub fn mock_shell() -> MockShellBuilder {
    MockShellBuilder { rules: Vec::new() }
}

pub struct MockShellBuilder {
    rules: Vec<(String, MockResponse)>,
}

impl MockShellBuilder {
    /// Respond to every command line starting with `prefix`.
    pub fn respond(mut self, prefix: &str, response: MockResponse) -> Self {
        self.rules.push((prefix.to_string(), response));
        self
    }

    /// Install the mock. Returns a guard (clears on drop) and the call log.
    pub fn install(self) -> (MockGuard, CallLog) {
        let calls = CallLog::default();
        HANDLER.with(|h| {
            *h.borrow_mut() = Some(MockState {
                rules: self.rules,
                calls: calls.clone(),
            });
        });
        (MockGuard, calls)
    }
}

// ── Host fixtures ───────────────────────────────────────────────────────

/// `/proc/meminfo` content for the given totals in bytes.
pub fn meminfo(mem_bytes: u64, swap_bytes: u64) -> String {
    format!(
        "MemTotal:       {} kB\nMemFree:         1024 kB\n\
         SwapTotal:      {} kB\nSwapFree:       0 kB\n",
        mem_bytes / 1024,
        swap_bytes / 1024
    )
}

/// `lscpu -p=Core,Socket` output for `cores` physical cores on one socket.
pub fn lscpu(cores: u64) -> String {
    let mut out = String::from("# The following is the parsable format\n# Core,Socket\n");
    for core in 0..cores {
        out.push_str(&format!("{core},0\n"));
    }
    out
}

/// A host that satisfies the `testutil` requirement set.
pub fn healthy_host() -> MockShellBuilder {
    mock_shell()
        .respond("nproc", MockResponse::ok("4"))
        .respond("lscpu", MockResponse::ok(&lscpu(4)))
        .respond("cat /proc/meminfo", MockResponse::ok(&meminfo(32_000_000_000, 1_000_000_000)))
        .respond("blockdev --getsize64", MockResponse::ok("200000000000"))
        .respond("dpkg-query", MockResponse::ok("install ok installed 9.9.9"))
        .respond("dpkg --compare-versions", MockResponse::empty())
        .respond("docker version", MockResponse::ok("24.0.7"))
        .respond("docker compose version", MockResponse::ok("2.21.0"))
        .respond("systemctl is-active", MockResponse::ok("active"))
        .respond("cat /etc/os-release", MockResponse::ok("ID=ubuntu\nVERSION_ID=\"22.04\"\n"))
}
