//! Snapshot of the connection the machine is currently using.
//!
//! `airport -I` reports metrics such as `agrCtlRSSI`, `agrCtlNoise`, `state`,
//! `op mode`, `lastTxRate`, `maxRate`, `lastAssocStatus`, `802.11 auth`,
//! `link auth`, `BSSID`, `SSID`, `MCS` and `channel`, one `key: value` per line.

use std::{
    collections::BTreeMap,
    fs::File,
    io::Write as _,
    path::{Path, PathBuf},
};

use serde::{ser::SerializeMap as _, Serialize, Serializer};
use serde_json::ser::PrettyFormatter;
use tracing::{debug, info};

use crate::{
    config::ConnectionConfig,
    peers::{InterfaceSource, PeerCount, PeerCounter},
    session::Session,
    shell::Shell,
    Result, SurveyError,
};

pub const USERS_CONNECTED: &str = "users_connected";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub metrics: BTreeMap<String, String>,
    pub users_connected: Vec<PeerCount>,
}

/// Flattened into one object with sorted keys. `users_connected` replaces a
/// metric of the same name.
impl Serialize for ConnectionInfo {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(untagged)]
        enum Field<'a> {
            Metric(&'a str),
            Peers(&'a [PeerCount]),
        }

        let mut fields: BTreeMap<&str, Field<'_>> = self
            .metrics
            .iter()
            .map(|(k, v)| (k.as_str(), Field::Metric(v)))
            .collect();
        fields.insert(USERS_CONNECTED, Field::Peers(&self.users_connected));

        let mut map = serializer.serialize_map(Some(fields.len()))?;
        for (key, value) in &fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Splits every trimmed line on its first colon. Later keys overwrite earlier
/// ones. The value is kept as written, so `state: running` maps to `" running"`.
pub fn parse_connection_info(output: &str) -> Result<BTreeMap<String, String>> {
    let mut metrics = BTreeMap::new();

    for (idx, line) in output.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (key, value) =
            line.split_once(':').ok_or_else(|| SurveyError::MalformedLine {
                line_no: idx + 1,
                line: line.to_string(),
            })?;
        metrics.insert(key.trim().to_string(), value.to_string());
    }

    Ok(metrics)
}

pub fn write_connection_info(path: &Path, info: &ConnectionInfo) -> Result<()> {
    let mut file = File::create(path)?;
    let mut ser = serde_json::Serializer::with_formatter(
        &mut file,
        PrettyFormatter::with_indent(b"    "),
    );
    info.serialize(&mut ser)?;
    file.flush()?;

    Ok(())
}

pub struct ConnectionInspector<'a, S> {
    shell: &'a S,
    cfg: &'a ConnectionConfig,
    peers: PeerCounter<'a, S>,
}

impl<'a, S: Shell> ConnectionInspector<'a, S> {
    pub fn new(
        shell: &'a S,
        cfg: &'a ConnectionConfig,
        peers: PeerCounter<'a, S>,
    ) -> Self {
        Self { shell, cfg, peers }
    }

    /// Runs the info command once and counts peers. A failing info command is an
    /// error; nothing is retried.
    pub fn inspect(&self, interfaces: &impl InterfaceSource) -> Result<ConnectionInfo> {
        let output = self
            .shell
            .exec(&self.cfg.command)?
            .ensure_success(&self.cfg.command)?;

        let metrics = parse_connection_info(&output.combined())?;
        debug!(metrics = metrics.len(), "parsed connection info");

        let users_connected = self.peers.count(interfaces)?;

        Ok(ConnectionInfo {
            metrics,
            users_connected,
        })
    }

    /// [`Self::inspect`] and write the result for `session` into `dir`.
    pub fn capture(
        &self,
        interfaces: &impl InterfaceSource,
        session: &Session,
        dir: &Path,
    ) -> Result<PathBuf> {
        let snapshot = self.inspect(interfaces)?;
        let path = session.connection_info_path(dir);
        write_connection_info(&path, &snapshot)?;
        info!(path = %path.display(), "saved connection info");

        Ok(path)
    }
}
