//! Access point sampling.
//!
//! The scan tool prints a header followed by one whitespace separated row per
//! visible radio:
//!
//! ```text
//!                             SSID BSSID             RSSI CHANNEL HT CC SECURITY (auth/unicast/group)
//!                    wpa.mcgill.ca 00:1f:45:6c:9a:31 -61  11      Y  CA WPA2(802.1x/AES/AES)
//! ```
//!
//! Only rows belonging to the target network are kept.

use std::{
    fs::File,
    path::{Path, PathBuf},
    thread,
};

use csv::{Terminator, WriterBuilder};
use tracing::{debug, info, warn};

use crate::{
    config::ScanConfig,
    retry::RetryPolicy,
    session::Session,
    shell::Shell,
    Result, SurveyError,
};

/// Raw tokens of one scan row, in column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRecord {
    fields: Vec<String>,
}

impl ScanRecord {
    pub fn from_line(line: &str) -> Option<Self> {
        let fields: Vec<String> = line.split_whitespace().map(String::from).collect();
        if fields.is_empty() {
            None
        } else {
            Some(Self { fields })
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    fn field(&self, idx: usize) -> Option<&str> {
        self.fields.get(idx).map(String::as_str)
    }

    pub fn ssid(&self) -> &str {
        &self.fields[0]
    }

    pub fn bssid(&self) -> Option<&str> {
        self.field(1)
    }

    pub fn rssi(&self) -> Option<i32> {
        self.field(2)?.parse().ok()
    }

    pub fn channel(&self) -> Option<&str> {
        self.field(3)
    }

    /// Everything after the country code. Some tools split the security column
    /// into several tokens.
    pub fn security(&self) -> Option<String> {
        let rest = self.fields.get(6..)?;
        if rest.is_empty() {
            None
        } else {
            Some(rest.join(" "))
        }
    }
}

/// Drops the header line and keeps rows whose first token is `ssid`.
pub fn parse_scan_output(output: &str, ssid: &str) -> Vec<ScanRecord> {
    output
        .trim()
        .lines()
        .skip(1)
        .filter_map(ScanRecord::from_line)
        .filter(|record| record.ssid() == ssid)
        .collect()
}

pub fn write_records(path: &Path, records: &[ScanRecord]) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .terminator(Terminator::CRLF)
        .from_writer(file);

    for record in records {
        writer.write_record(record.fields())?;
    }
    writer.flush()?;

    Ok(())
}

#[derive(Debug)]
pub struct ScanReport {
    pub records: Vec<ScanRecord>,
    pub path: PathBuf,
    pub attempts: u32,
}

#[derive(Debug)]
pub enum ScanOutcome {
    Captured(ScanReport),
    Exhausted { attempts: u32, last_error: SurveyError },
}

pub struct Scanner<'a, S> {
    shell: &'a S,
    cfg: &'a ScanConfig,
}

impl<'a, S: Shell> Scanner<'a, S> {
    pub fn new(shell: &'a S, cfg: &'a ScanConfig) -> Self {
        Self { shell, cfg }
    }

    /// One scan. Fails with a retryable error if the tool exits nonzero or the
    /// target network is absent.
    pub fn scan(&self) -> Result<Vec<ScanRecord>> {
        let output = self
            .shell
            .exec(&self.cfg.command)?
            .ensure_success(&self.cfg.command)?;

        let records = parse_scan_output(&output.stdout, &self.cfg.ssid);
        debug!(
            ssid = %self.cfg.ssid,
            matched = records.len(),
            "parsed scan output"
        );
        for record in &records {
            debug!(
                bssid = record.bssid(),
                rssi = record.rssi(),
                channel = record.channel(),
                security = record.security().as_deref(),
                "access point"
            );
        }
        if records.is_empty() {
            return Err(SurveyError::NetworkNotVisible {
                ssid: self.cfg.ssid.clone(),
            });
        }

        Ok(records)
    }

    /// Scans until the target network shows up or `policy.max_attempts` is
    /// reached, then writes the matching rows into `dir`.
    pub fn scan_with_retry(
        &self,
        policy: &RetryPolicy,
        session: &Session,
        dir: &Path,
    ) -> Result<ScanOutcome> {
        let mut last_error = None;

        for attempt in 1..=policy.max_attempts {
            match self.scan() {
                Ok(records) => {
                    let path = session.access_points_path(dir);
                    write_records(&path, &records)?;
                    info!(
                        attempt,
                        count = records.len(),
                        path = %path.display(),
                        "saved access points"
                    );
                    return Ok(ScanOutcome::Captured(ScanReport {
                        records,
                        path,
                        attempts: attempt,
                    }));
                }
                Err(e) if e.is_retryable() => {
                    warn!(attempt, max = policy.max_attempts, "scan failed: {e}");
                    last_error = Some(e);
                    if attempt < policy.max_attempts && !policy.delay.is_zero() {
                        thread::sleep(policy.delay);
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Ok(ScanOutcome::Exhausted {
            attempts: policy.max_attempts,
            last_error: last_error.unwrap_or_else(|| {
                SurveyError::ConfigError("retry policy allows zero attempts".into())
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::Cell,
        time::{Duration, Instant},
    };

    use chrono::{Local, TimeZone as _};

    use super::*;
    use crate::shell::{CmdOutput, CommandLine};

    /// Answers every command with the same output and counts the calls.
    struct Canned {
        stdout: &'static str,
        success: bool,
        calls: Cell<u32>,
    }

    impl Canned {
        fn new(stdout: &'static str, success: bool) -> Self {
            Self {
                stdout,
                success,
                calls: Cell::new(0),
            }
        }
    }

    impl Shell for Canned {
        fn exec(&self, _cmd: &CommandLine) -> Result<CmdOutput> {
            self.calls.set(self.calls.get() + 1);
            Ok(CmdOutput {
                success: self.success,
                status: "exit status: 0".into(),
                stdout: self.stdout.into(),
                stderr: String::new(),
            })
        }
    }

    fn session() -> Session {
        let ts = Local
            .with_ymd_and_hms(2016, 3, 14, 15, 9, 26)
            .single()
            .unwrap();
        Session::new(ts, "Trottier")
    }

    const AIRPORT_OUTPUT: &str = "                            SSID BSSID             RSSI CHANNEL HT CC SECURITY (auth/unicast/group)
                   wpa.mcgill.ca 00:1f:45:6c:9a:31 -61  11      Y  CA WPA2(802.1x/AES/AES)
                     eduroam     00:1f:45:6c:9a:32 -61  11      Y  CA WPA2(802.1x/AES/AES)
                   wpa.mcgill.ca 00:1f:45:6c:b1:f0 -74  36,+1   Y  CA WPA(802.1x/TKIP/TKIP) WPA2(802.1x/AES/TKIP)
                  McGill-Guest   00:1f:45:6c:9a:30 -60  11      Y  CA NONE
";

    #[test]
    fn it_keeps_only_target_rows() {
        // Act
        let actual = parse_scan_output(AIRPORT_OUTPUT, "wpa.mcgill.ca");

        // Assert
        assert_eq!(actual.len(), 2);
        assert_eq!(actual[0].bssid(), Some("00:1f:45:6c:9a:31"));
        assert_eq!(actual[0].rssi(), Some(-61));
        assert_eq!(actual[0].channel(), Some("11"));
        assert_eq!(actual[0].security().as_deref(), Some("WPA2(802.1x/AES/AES)"));
        assert_eq!(actual[1].bssid(), Some("00:1f:45:6c:b1:f0"));
        assert_eq!(
            actual[1].security().as_deref(),
            Some("WPA(802.1x/TKIP/TKIP) WPA2(802.1x/AES/TKIP)")
        );
    }

    #[test]
    fn header_is_dropped_even_when_it_matches() {
        let output = "wpa.mcgill.ca header columns\nwpa.mcgill.ca aa:bb 50 6 Y US WPA2\n";

        let actual = parse_scan_output(output, "wpa.mcgill.ca");

        assert_eq!(actual.len(), 1);
        assert_eq!(actual[0].bssid(), Some("aa:bb"));
    }

    #[test]
    fn example_from_a_minimal_listing() {
        let output = "HEADER\nwpa.mcgill.ca aa:bb 50 6 Y US WPA2\nother.net cc:dd 40 1 Y US WPA2";

        let actual = parse_scan_output(output, "wpa.mcgill.ca");

        assert_eq!(
            actual,
            vec![ScanRecord {
                fields: ["wpa.mcgill.ca", "aa:bb", "50", "6", "Y", "US", "WPA2"]
                    .map(String::from)
                    .to_vec(),
            }]
        );
    }

    #[test]
    fn blank_lines_and_empty_output_yield_nothing() {
        assert!(parse_scan_output("", "wpa.mcgill.ca").is_empty());
        assert!(parse_scan_output("HEADER", "wpa.mcgill.ca").is_empty());
        assert!(parse_scan_output("HEADER\n\n   \n", "wpa.mcgill.ca").is_empty());
    }

    #[test]
    fn ssid_must_match_exactly() {
        let output = "HEADER\nwpa.mcgill.ca.evil aa:bb 50 6 Y US WPA2\nWPA.MCGILL.CA cc:dd 1 1 Y US WPA2";

        assert!(parse_scan_output(output, "wpa.mcgill.ca").is_empty());
    }

    #[test]
    fn short_rows_have_no_security() {
        let record = ScanRecord::from_line("wpa.mcgill.ca aa:bb").unwrap();

        assert_eq!(record.rssi(), None);
        assert_eq!(record.security(), None);
    }

    #[test]
    fn records_are_written_as_crlf_csv_without_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aps.csv");
        let records = parse_scan_output(AIRPORT_OUTPUT, "wpa.mcgill.ca");

        write_records(&path, &records).unwrap();

        let actual = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            actual,
            "wpa.mcgill.ca,00:1f:45:6c:9a:31,-61,11,Y,CA,WPA2(802.1x/AES/AES)\r\n\
             wpa.mcgill.ca,00:1f:45:6c:b1:f0,-74,\"36,+1\",Y,CA,WPA(802.1x/TKIP/TKIP),WPA2(802.1x/AES/TKIP)\r\n"
        );
    }

    #[test]
    fn it_waits_between_attempts_but_not_after_the_last() {
        // Arrange
        let delay = Duration::from_millis(50);
        let policy = RetryPolicy {
            max_attempts: 3,
            delay,
        };
        let cfg = ScanConfig::default();
        let shell = Canned::new("HEADER\nMcGill-Guest aa:bb -60 11 Y CA NONE\n", true);
        let dir = tempfile::tempdir().unwrap();

        // Act
        let started = Instant::now();
        let outcome = Scanner::new(&shell, &cfg)
            .scan_with_retry(&policy, &session(), dir.path())
            .unwrap();
        let elapsed = started.elapsed();

        // Assert
        assert!(matches!(
            outcome,
            ScanOutcome::Exhausted {
                attempts: 3,
                last_error: SurveyError::NetworkNotVisible { .. },
            }
        ));
        assert_eq!(shell.calls.get(), 3);
        assert!(elapsed >= delay * 2, "slept only {elapsed:?}");
        assert!(elapsed < delay * 3, "slept after the last attempt: {elapsed:?}");
    }

    #[test]
    fn first_attempt_success_does_not_wait() {
        let delay = Duration::from_secs(2);
        let policy = RetryPolicy {
            max_attempts: 3,
            delay,
        };
        let cfg = ScanConfig::default();
        let shell = Canned::new(AIRPORT_OUTPUT, true);
        let dir = tempfile::tempdir().unwrap();

        let started = Instant::now();
        let outcome = Scanner::new(&shell, &cfg)
            .scan_with_retry(&policy, &session(), dir.path())
            .unwrap();

        assert!(started.elapsed() < delay);
        assert_eq!(shell.calls.get(), 1);
        let ScanOutcome::Captured(report) = outcome else {
            panic!("scan should succeed on the first attempt");
        };
        assert_eq!(report.attempts, 1);
        assert_eq!(report.records.len(), 2);
        assert!(report.path.starts_with(dir.path()));
    }
}
