//! OS signal handling.
//!
//! # Responsibilities
//! - Name the signal that arms the debug endpoint ([`TriggerSignal`])
//! - Subscribe to and unsubscribe from that signal ([`SignalWatcher`])
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A subscription is a fresh Tokio signal stream; a fresh stream only
//!   observes deliveries made after it was created, so dropping it on
//!   unsubscribe discards anything that was pending
//! - Once subscribed, Tokio keeps the process-level handler installed, so a
//!   delivery while unsubscribed is ignored instead of killing the process

use std::fmt;
use std::io;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The OS signal that arms the debug endpoint.
///
/// Parsed case-insensitively, with or without the `SIG` prefix
/// (`"SIGUSR1"`, `"usr1"`), or as a raw signal number (`"34"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TriggerSignal {
    Hangup,
    User1,
    User2,
    WindowChange,
    /// Any other signal by number.
    Raw(i32),
}

impl Default for TriggerSignal {
    #[cfg(unix)]
    fn default() -> Self {
        TriggerSignal::User1
    }

    #[cfg(not(unix))]
    fn default() -> Self {
        TriggerSignal::Hangup
    }
}

/// Signals the OS does not let a process handle.
#[cfg(target_os = "linux")]
const UNCATCHABLE: [i32; 5] = [4, 8, 9, 11, 19];
#[cfg(not(target_os = "linux"))]
const UNCATCHABLE: [i32; 5] = [4, 8, 9, 11, 17];

/// Highest signal number the platform delivers, real-time signals included.
#[cfg(any(target_os = "linux", target_os = "android"))]
const MAX_SIGNAL: i32 = 64;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const MAX_SIGNAL: i32 = 31;

impl TriggerSignal {
    /// Whether a handler can be registered for this signal.
    pub fn is_catchable(&self) -> bool {
        match self {
            TriggerSignal::Raw(n) => (1..=MAX_SIGNAL).contains(n) && !UNCATCHABLE.contains(n),
            _ => true,
        }
    }

    #[cfg(unix)]
    fn kind(&self) -> tokio::signal::unix::SignalKind {
        use tokio::signal::unix::SignalKind;

        match self {
            TriggerSignal::Hangup => SignalKind::hangup(),
            TriggerSignal::User1 => SignalKind::user_defined1(),
            TriggerSignal::User2 => SignalKind::user_defined2(),
            TriggerSignal::WindowChange => SignalKind::window_change(),
            TriggerSignal::Raw(n) => SignalKind::from_raw(*n),
        }
    }
}

impl fmt::Display for TriggerSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerSignal::Hangup => f.write_str("SIGHUP"),
            TriggerSignal::User1 => f.write_str("SIGUSR1"),
            TriggerSignal::User2 => f.write_str("SIGUSR2"),
            TriggerSignal::WindowChange => f.write_str("SIGWINCH"),
            TriggerSignal::Raw(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown signal {0:?}")]
pub struct SignalParseError(String);

impl FromStr for TriggerSignal {
    type Err = SignalParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let name = upper.strip_prefix("SIG").unwrap_or(&upper);

        match name {
            "HUP" => Ok(TriggerSignal::Hangup),
            "USR1" => Ok(TriggerSignal::User1),
            "USR2" => Ok(TriggerSignal::User2),
            "WINCH" => Ok(TriggerSignal::WindowChange),
            other => other
                .parse::<i32>()
                .map(TriggerSignal::Raw)
                .map_err(|_| SignalParseError(s.to_string())),
        }
    }
}

impl TryFrom<String> for TriggerSignal {
    type Error = SignalParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TriggerSignal> for String {
    fn from(signal: TriggerSignal) -> Self {
        signal.to_string()
    }
}

#[cfg(unix)]
type SignalStream = tokio::signal::unix::Signal;
#[cfg(windows)]
type SignalStream = tokio::signal::windows::CtrlBreak;

#[cfg(unix)]
fn open_stream(signal: TriggerSignal) -> io::Result<SignalStream> {
    tokio::signal::unix::signal(signal.kind())
}

// Windows has no user signals; every trigger is Ctrl-Break.
#[cfg(windows)]
fn open_stream(_signal: TriggerSignal) -> io::Result<SignalStream> {
    tokio::signal::windows::ctrl_break()
}

/// Delivers notifications for one signal while subscribed.
///
/// Must be used from within a Tokio runtime.
pub struct SignalWatcher {
    signal: TriggerSignal,
    stream: Option<SignalStream>,
}

impl SignalWatcher {
    pub fn new(signal: TriggerSignal) -> Self {
        Self {
            signal,
            stream: None,
        }
    }

    pub fn signal(&self) -> TriggerSignal {
        self.signal
    }

    /// Start receiving deliveries. Subscribing twice is a no-op.
    pub fn subscribe(&mut self) -> io::Result<()> {
        if self.stream.is_none() {
            self.stream = Some(open_stream(self.signal)?);
        }
        Ok(())
    }

    /// Stop receiving deliveries and drop any that were not consumed yet.
    pub fn unsubscribe(&mut self) {
        self.stream = None;
    }

    pub fn is_subscribed(&self) -> bool {
        self.stream.is_some()
    }

    /// Wait for the next delivery.
    ///
    /// Pends forever while unsubscribed. Returns `None` if the runtime's
    /// signal driver has gone away.
    pub async fn recv(&mut self) -> Option<()> {
        match self.stream.as_mut() {
            Some(stream) => stream.recv().await,
            None => std::future::pending().await,
        }
    }
}
