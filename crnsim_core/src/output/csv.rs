//! CSV export of time series
use std::fs;
use std::path::Path;

use tracing::info;

use crate::output::OutputError;
use crate::simulate::TimeSeries;

impl TimeSeries {
    /// Render the series as CSV, header `time,<species...>` then one row per record
    ///
    /// # Examples
    /// ```rust
    /// use indexmap::IndexMap;
    /// use crnsim_core::simulate::TimeSeries;
    /// let mut series = TimeSeries::new(&["A"]);
    /// series.push(0.0, &IndexMap::from([("A".to_string(), 2.0)]));
    /// assert_eq!(series.to_csv_string(), "time,A\n0,2\n");
    /// ```
    pub fn to_csv_string(&self) -> String {
        let mut csv = String::from("time");
        for id in self.species.keys() {
            csv.push(',');
            csv.push_str(&escape_field(id));
        }
        csv.push('\n');
        for (row, t) in self.time.iter().enumerate() {
            csv.push_str(&t.to_string());
            for column in self.species.values() {
                csv.push(',');
                csv.push_str(&column[row].to_string());
            }
            csv.push('\n');
        }
        csv
    }

    /// Write the series to `path` as CSV
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), OutputError> {
        fs::write(path.as_ref(), self.to_csv_string())?;
        info!(path = %path.as_ref().display(), rows = self.len(), "wrote time series csv");
        Ok(())
    }
}

/// Quote a header field if it would otherwise break the table
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod csv_tests {
    use super::*;
    use indexmap::IndexMap;

    fn series() -> TimeSeries {
        let mut series = TimeSeries::new(&["G", "T"]);
        series.push(
            0.0,
            &IndexMap::from([("G".to_string(), 1.0), ("T".to_string(), 0.0)]),
        );
        series.push(
            0.5,
            &IndexMap::from([("G".to_string(), 1.0), ("T".to_string(), 0.25)]),
        );
        series
    }

    #[test]
    fn csv_string() {
        assert_eq!(series().to_csv_string(), "time,G,T\n0,1,0\n0.5,1,0.25\n");
    }

    #[test]
    fn quoted_header() {
        let series = TimeSeries::new(&["a,b"]);
        assert_eq!(series.to_csv_string(), "time,\"a,b\"\n");
    }

    #[test]
    fn write_csv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("series.csv");
        series().write_csv(&path).unwrap();
        let written = fs::read_to_string(path).unwrap();
        assert!(written.starts_with("time,G,T\n"));
        assert_eq!(written.lines().count(), 3);
    }
}
