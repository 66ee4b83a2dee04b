//! Surfacing verification challenges to the operator.

use std::io;
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};

/// Receives the URL of every verification challenge met by the pipeline.
///
/// The pipeline rotates to the next account right after calling
/// [`surface`](Self::surface); the handler must not block.
pub trait ChallengeHandler: Send + Sync {
    /// Presents the challenge at `url` to whoever can solve it.
    fn surface(&self, url: &str);
}

/// Opens challenges in the desktop browser.
///
/// Failing to launch the browser only logs a warning with the URL.
#[derive(Clone, Copy, Debug, Default)]
pub struct BrowserChallengeHandler;

impl BrowserChallengeHandler {
    fn command(url: &str) -> io::Result<Command> {
        let mut command = if cfg!(target_os = "windows") {
            let mut command = Command::new("rundll32");
            command.arg("url.dll,FileProtocolHandler");
            command
        } else if cfg!(target_os = "macos") {
            Command::new("open")
        } else if cfg!(any(
            target_os = "linux",
            target_os = "freebsd",
            target_os = "openbsd",
            target_os = "netbsd"
        )) {
            Command::new("xdg-open")
        } else {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "no browser launcher for this platform",
            ));
        };
        command
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        Ok(command)
    }
}

/// Spawns `command` and waits for it on a detached thread so the child is
/// reaped.
fn launch(mut command: Command) -> io::Result<JoinHandle<io::Result<ExitStatus>>> {
    let mut child = command.spawn()?;
    thread::Builder::new()
        .name("challenge-launcher".to_string())
        .spawn(move || child.wait())
}

impl ChallengeHandler for BrowserChallengeHandler {
    fn surface(&self, url: &str) {
        tracing::warn!("verification challenge received, solve it at {}", url);
        if let Err(e) = Self::command(url).and_then(launch) {
            tracing::warn!("cannot open a browser on the challenge: {}", e);
        }
    }
}

/// Only logs the challenge URL.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogChallengeHandler;

impl ChallengeHandler for LogChallengeHandler {
    fn surface(&self, url: &str) {
        tracing::warn!("verification challenge received, solve it at {}", url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_os = "linux")]
    #[test]
    fn test_linux_uses_xdg_open() {
        let command = BrowserChallengeHandler::command("https://example.com").unwrap();
        assert_eq!(command.get_program(), "xdg-open");
        let args: Vec<_> = command.get_args().collect();
        assert_eq!(args, vec!["https://example.com"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_launched_process_is_waited_for() {
        let status = launch(Command::new("true")).unwrap().join().unwrap().unwrap();
        assert!(status.success());
    }

    #[test]
    fn test_launch_failure_is_reported() {
        assert!(launch(Command::new("/nonexistent/browser-launcher")).is_err());
    }

    #[test]
    fn test_handlers_are_object_safe() {
        let handlers: Vec<Box<dyn ChallengeHandler>> =
            vec![Box::new(LogChallengeHandler), Box::new(BrowserChallengeHandler)];
        assert_eq!(handlers.len(), 2);
    }
}
