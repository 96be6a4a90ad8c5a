use std::path::PathBuf;

use tracing::{info, warn};

use crate::{
    config::Config,
    connection::ConnectionInspector,
    peers::{InterfaceSource, PeerCounter},
    retry::RetryPrompt,
    scan::{ScanOutcome, ScanReport, Scanner},
    session::Session,
    shell::Shell,
    Result,
};

#[derive(Debug)]
pub enum SurveyOutcome {
    Completed {
        access_points: ScanReport,
        connection_info: Option<PathBuf>,
    },
    /// The scan rounds ran out and the prompt declined another one.
    Declined { rounds: u32 },
}

/// One reading: access points first, then the current connection.
pub struct Survey<'a, S, I> {
    cfg: &'a Config,
    shell: &'a S,
    interfaces: &'a I,
}

impl<'a, S: Shell, I: InterfaceSource> Survey<'a, S, I> {
    pub fn new(cfg: &'a Config, shell: &'a S, interfaces: &'a I) -> Self {
        Self {
            cfg,
            shell,
            interfaces,
        }
    }

    /// Rounds of scan attempts until one captures the target network or the
    /// prompt declines another round.
    pub fn capture_access_points(
        &self,
        session: &Session,
        prompt: &mut dyn RetryPrompt,
    ) -> Result<SurveyOutcome> {
        let scanner = Scanner::new(self.shell, &self.cfg.scan);

        let mut round: u32 = 0;
        loop {
            round += 1;
            println!("Attempt {round}");
            let outcome =
                scanner.scan_with_retry(&self.cfg.retry, session, &self.cfg.output_dir)?;
            match outcome {
                ScanOutcome::Captured(report) => {
                    return Ok(SurveyOutcome::Completed {
                        access_points: report,
                        connection_info: None,
                    });
                }
                ScanOutcome::Exhausted {
                    attempts,
                    last_error,
                } => {
                    warn!(round, attempts, "giving up on this round: {last_error}");
                    if !prompt.ask_retry()? {
                        return Ok(SurveyOutcome::Declined { rounds: round });
                    }
                }
            }
        }
    }

    pub fn run(
        &self,
        session: &Session,
        prompt: &mut dyn RetryPrompt,
    ) -> Result<SurveyOutcome> {
        let access_points = match self.capture_access_points(session, prompt)? {
            SurveyOutcome::Completed { access_points, .. } => access_points,
            declined @ SurveyOutcome::Declined { .. } => return Ok(declined),
        };
        println!("Saved {}", access_points.path.display());

        let connection_info = if self.cfg.connection.enabled {
            let peers = PeerCounter::new(self.shell, &self.cfg.peers);
            let inspector =
                ConnectionInspector::new(self.shell, &self.cfg.connection, peers);
            let path =
                inspector.capture(self.interfaces, session, &self.cfg.output_dir)?;
            println!("Saved {}", path.display());
            Some(path)
        } else {
            info!("connection capture disabled");
            None
        };

        Ok(SurveyOutcome::Completed {
            access_points,
            connection_info,
        })
    }
}
