use std::{
    io::{BufRead, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};

use crate::Result;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// When and where a reading was taken. Only used to name output files.
#[derive(Debug, Clone)]
pub struct Session {
    pub timestamp: DateTime<Local>,
    pub location: String,
}

impl Session {
    pub fn new(timestamp: DateTime<Local>, location: &str) -> Self {
        Self {
            timestamp,
            location: sanitize_location(location),
        }
    }

    pub fn now(location: &str) -> Self {
        Self::new(Local::now(), location)
    }

    pub fn stamp(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }

    pub fn access_points_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!(
            "Access Points: {} - {}.csv",
            self.stamp(),
            self.location
        ))
    }

    pub fn connection_info_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!(
            "Connection Info: {} - {}.json",
            self.stamp(),
            self.location
        ))
    }
}

// Path separators would turn the label into directories.
fn sanitize_location(location: &str) -> String {
    location
        .trim_end_matches(['\r', '\n'])
        .replace(['/', '\\', '\0'], "_")
}

/// Prints `prompt` and reads one line. EOF yields an empty label.
pub fn prompt_location(
    prompt: &str,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> Result<String> {
    write!(output, "{prompt}")?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;

    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn session(location: &str) -> Session {
        let ts = Local
            .with_ymd_and_hms(2016, 3, 14, 15, 9, 26)
            .single()
            .unwrap();
        Session::new(ts, location)
    }

    #[test]
    fn file_names_carry_timestamp_and_location() {
        let s = session("Trottier 3rd floor");

        assert_eq!(
            s.access_points_path(Path::new("out")),
            PathBuf::from(
                "out/Access Points: 2016-03-14 15:09:26.000000 - Trottier 3rd floor.csv"
            )
        );
        assert_eq!(
            s.connection_info_path(Path::new("out")),
            PathBuf::from(
                "out/Connection Info: 2016-03-14 15:09:26.000000 - Trottier 3rd floor.json"
            )
        );
    }

    #[test]
    fn location_separators_are_replaced() {
        let s = session("McConnell/room 204\n");

        assert_eq!(s.location, "McConnell_room 204");
    }

    #[test]
    fn it_reads_location_from_input() {
        let mut input = "Schulich library\n".as_bytes();
        let mut output = Vec::new();

        let location =
            prompt_location("Please input your location:", &mut input, &mut output)
                .unwrap();

        assert_eq!(location, "Schulich library");
        assert_eq!(output, b"Please input your location:");
    }

    #[test]
    fn eof_yields_empty_location() {
        let mut input = "".as_bytes();
        let mut output = Vec::new();

        let location = prompt_location("> ", &mut input, &mut output).unwrap();

        assert_eq!(location, "");
    }
}
