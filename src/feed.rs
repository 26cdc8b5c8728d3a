use std::{fs::File, io::Read, path::Path};

use serde::{de::DeserializeOwned, Deserialize};

use crate::error::FeedError;

#[derive(Deserialize, Debug, Clone)]
pub struct Line {
    pub line_id: u32,
    pub line_name: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Deserialize, Debug, Clone)]
pub struct Station {
    pub station_id: u32,
    pub station_name: String,
    pub line_id: u32,
    pub sequence_number: u32,
}

/// Raw rows of a network feed, as read from `lines.txt` and `stations.txt`.
#[derive(Debug, Default)]
pub struct Feed {
    pub lines: Vec<Line>,
    pub stations: Vec<Station>,
}

impl Feed {
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, FeedError> {
        let dir = dir.as_ref();
        Ok(Self {
            lines: deserialize_into(open(&dir.join("lines.txt"))?)?,
            stations: deserialize_into(open(&dir.join("stations.txt"))?)?,
        })
    }

    pub fn from_readers(lines: impl Read, stations: impl Read) -> Result<Self, FeedError> {
        Ok(Self {
            lines: deserialize_into(lines)?,
            stations: deserialize_into(stations)?,
        })
    }
}

fn open(path: &Path) -> Result<File, FeedError> {
    File::open(path).map_err(|source| FeedError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn deserialize_into<T: DeserializeOwned>(reader: impl Read) -> Result<Vec<T>, FeedError> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader)
        .deserialize()
        .map(|row| row.map_err(FeedError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_lines_and_stations() {
        let lines = "line_id,line_name,is_active\n1,Red,true\n2,Blue,false\n";
        let stations = "station_id,station_name,line_id,sequence_number\n\
                        10, Central ,1,1\n11,Harbour,1,2\n";

        let feed = Feed::from_readers(lines.as_bytes(), stations.as_bytes()).unwrap();

        assert_eq!(feed.lines.len(), 2);
        assert!(!feed.lines[1].is_active);
        assert_eq!(feed.stations[0].station_name, "Central");
        assert_eq!(feed.stations[1].sequence_number, 2);
    }

    #[test]
    fn active_flag_defaults_to_true() {
        let lines = "line_id,line_name\n1,Red\n";
        let feed = Feed::from_readers(lines.as_bytes(), "station_id,station_name,line_id,sequence_number\n".as_bytes())
            .unwrap();

        assert!(feed.lines[0].is_active);
        assert!(feed.stations.is_empty());
    }

    #[test]
    fn malformed_row_is_reported() {
        let stations = "station_id,station_name,line_id,sequence_number\nx,Central,1,1\n";
        let result = Feed::from_readers("line_id,line_name\n".as_bytes(), stations.as_bytes());

        assert!(matches!(result, Err(FeedError::Csv(_))));
    }
}
