//! Device bridge: an external command-line program (`adb`) used to reach the phone.

use crate::error::AppError;
use chrono::NaiveDate;
use crossbeam_channel::Receiver;
use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

const OUTPUT_GRACE: Duration = Duration::from_millis(500);

/// Runs one bridge request and returns its standard output.
pub trait CommandRunner {
    fn run(&self, args: &[&str]) -> Result<String, AppError>;
}

pub struct AdbBridge {
    program: String,
    timeout: Duration,
}

impl AdbBridge {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

impl CommandRunner for AdbBridge {
    fn run(&self, args: &[&str]) -> Result<String, AppError> {
        log::trace!("Running {} {:?}", self.program, args);
        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AppError::Bridge(format!("cannot start {}: {}", self.program, e)))?;

        // Both pipes are drained on helper threads so a full pipe cannot stall the child.
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Bridge("stdout not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AppError::Bridge("stderr not captured".into()))?;
        let stdout_rx = drain(stdout);
        let stderr_rx = drain(stderr);

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(AppError::Bridge(format!(
                    "{} {:?} timed out after {:?}",
                    self.program, args, self.timeout
                )));
            }
            std::thread::sleep(Duration::from_millis(20));
        };

        // A process left behind by the child can hold the pipe open past its exit.
        let wait = deadline
            .saturating_duration_since(Instant::now())
            .max(OUTPUT_GRACE);
        let out = match stdout_rx.recv_timeout(wait) {
            Ok(result) => result?,
            Err(_) => {
                return Err(AppError::Bridge(format!(
                    "{} {:?} exited but its output stayed open",
                    self.program, args
                )))
            }
        };

        if !status.success() {
            let err = match stderr_rx.recv_timeout(OUTPUT_GRACE) {
                Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).trim().to_string(),
                _ => String::new(),
            };
            log::debug!(
                "{} {:?} exited with {}: {}",
                self.program,
                args,
                status,
                err
            );
            return Err(AppError::Bridge(format!(
                "{} {:?} exited with {}: {}",
                self.program, args, status, err
            )));
        }
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

/// Reads `reader` to the end on its own thread.
fn drain<R: Read + Send + 'static>(mut reader: R) -> Receiver<std::io::Result<Vec<u8>>> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    std::thread::spawn(move || {
        let mut out = Vec::new();
        let result = reader.read_to_end(&mut out).map(|_| out);
        let _ = tx.send(result);
    });
    rx
}

/// True when some line after the header ends with the `device` state marker.
pub fn has_ready_device(devices_output: &str) -> bool {
    devices_output
        .lines()
        .skip_while(|line| !line.starts_with("List of devices"))
        .skip(1)
        .any(|line| line.split_whitespace().last() == Some("device"))
}

pub fn parse_listing(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Reads the `YYYY-MM-DD` prefix of `stat -c %y` output.
pub fn parse_stat_date(output: &str) -> Option<NaiveDate> {
    let trimmed = output.trim();
    let prefix = trimmed.get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_device_needs_device_marker() {
        let ready = "List of devices attached\nR58M12345\tdevice\n\n";
        assert!(has_ready_device(ready));

        let unauthorized = "List of devices attached\nR58M12345\tunauthorized\n";
        assert!(!has_ready_device(unauthorized));

        let offline = "List of devices attached\nemulator-5554 offline\n";
        assert!(!has_ready_device(offline));

        assert!(!has_ready_device("List of devices attached\n\n"));
        assert!(!has_ready_device(""));
    }

    #[test]
    fn daemon_chatter_before_header_is_ignored() {
        let output = "* daemon not running; starting now at tcp:5037\n\
                      * daemon started successfully\n\
                      List of devices attached\n\
                      0123456789ABCDEF\tdevice\n";
        assert!(has_ready_device(output));
    }

    #[test]
    fn listing_drops_blank_lines_and_carriage_returns() {
        let output = "IMG_1.jpg\r\nVID_2.mp4\r\n\r\n  \nIMG_3.jpeg\n";
        assert_eq!(parse_listing(output), vec!["IMG_1.jpg", "VID_2.mp4", "IMG_3.jpeg"]);
    }

    #[test]
    fn stat_date_prefix() {
        let output = "2025-02-14 10:57:50.000000000 +0100\n";
        assert_eq!(parse_stat_date(output), NaiveDate::from_ymd_opt(2025, 2, 14));
        assert_eq!(parse_stat_date("stat: No such file"), None);
        assert_eq!(parse_stat_date(""), None);
    }

    #[cfg(unix)]
    #[test]
    fn captures_stdout() {
        let bridge = AdbBridge::new("echo", Duration::from_secs(5));
        assert_eq!(bridge.run(&["hello"]).unwrap().trim(), "hello");
    }

    #[cfg(unix)]
    #[test]
    fn kills_on_timeout() {
        let bridge = AdbBridge::new("sleep", Duration::from_millis(100));
        let started = Instant::now();
        assert!(matches!(bridge.run(&["5"]), Err(AppError::Bridge(_))));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn failure_carries_stderr() {
        let bridge = AdbBridge::new("sh", Duration::from_secs(5));
        match bridge.run(&["-c", "echo 'no devices/emulators found' >&2; exit 3"]) {
            Err(AppError::Bridge(message)) => {
                assert!(message.contains("no devices/emulators found"), "{}", message)
            }
            other => panic!("expected bridge error, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn output_held_open_after_exit_is_bounded() {
        let bridge = AdbBridge::new("sh", Duration::from_millis(300));
        let started = Instant::now();
        assert!(matches!(
            bridge.run(&["-c", "sleep 5 & echo started"]),
            Err(AppError::Bridge(_))
        ));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn missing_program_is_bridge_error() {
        let bridge = AdbBridge::new("definitely-not-a-real-bridge-binary", Duration::from_secs(1));
        assert!(matches!(bridge.run(&["devices"]), Err(AppError::Bridge(_))));
    }
}
