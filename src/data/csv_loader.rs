//! CSV data loading for historical race results

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Team name used when the collector could not resolve a constructor
pub const UNKNOWN_TEAM: &str = "Unknown";

/// One driver's result in one historical race
///
/// Numeric measurements are nullable: the collector leaves them empty when the
/// provider had no data for that session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceResultRecord {
    pub driver: String,
    pub year: i32,
    pub round: u32,
    pub location: String,
    pub team: String,
    pub position: Option<f64>,
    pub points: Option<f64>,
    pub qualifying_position: Option<f64>,
    pub avg_temperature: Option<f64>,
    pub avg_humidity: Option<f64>,
    pub had_rain: bool,
    pub avg_lap_time: Option<f64>,
    pub best_lap_time: Option<f64>,
    pub pit_stops: Option<f64>,
    /// Derived once at load time from the raw finishing position
    pub won: bool,
}

impl RaceResultRecord {
    /// Minimal record with every optional measurement empty
    pub fn new(
        driver: impl Into<String>,
        year: i32,
        round: u32,
        location: impl Into<String>,
        team: impl Into<String>,
    ) -> Self {
        Self {
            driver: driver.into(),
            year,
            round,
            location: location.into(),
            team: team.into(),
            position: None,
            points: None,
            qualifying_position: None,
            avg_temperature: None,
            avg_humidity: None,
            had_rain: false,
            avg_lap_time: None,
            best_lap_time: None,
            pit_stops: None,
            won: false,
        }
    }

    /// Set finishing position and points, deriving the win flag
    pub fn with_result(mut self, position: Option<f64>, points: Option<f64>) -> Self {
        self.position = position;
        self.points = points;
        self.won = is_win(position);
        self
    }

    pub fn with_qualifying(mut self, qualifying_position: Option<f64>) -> Self {
        self.qualifying_position = qualifying_position;
        self
    }

    pub fn with_weather(
        mut self,
        avg_temperature: Option<f64>,
        avg_humidity: Option<f64>,
        had_rain: bool,
    ) -> Self {
        self.avg_temperature = avg_temperature;
        self.avg_humidity = avg_humidity;
        self.had_rain = had_rain;
        self
    }

    pub fn with_laps(
        mut self,
        avg_lap_time: Option<f64>,
        best_lap_time: Option<f64>,
        pit_stops: Option<f64>,
    ) -> Self {
        self.avg_lap_time = avg_lap_time;
        self.best_lap_time = best_lap_time;
        self.pit_stops = pit_stops;
        self
    }
}

fn is_win(position: Option<f64>) -> bool {
    position == Some(1.0)
}

/// Historical race results, in the order they were stored
#[derive(Debug, Clone, Default)]
pub struct HistoricalData {
    records: Vec<RaceResultRecord>,
}

impl HistoricalData {
    pub fn new(records: Vec<RaceResultRecord>) -> Self {
        Self { records }
    }

    /// Load historical results from the collector's CSV file
    pub fn load<P: AsRef<Path>>(csv_path: P) -> Result<Self, PolarsError> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(csv_path.as_ref().to_path_buf()))?
            .finish()?;

        let records = Self::dataframe_to_records(&df)?;
        info!(
            "Loaded {} historical results from {:?}",
            records.len(),
            csv_path.as_ref()
        );
        Ok(Self { records })
    }

    /// Load if the file exists, otherwise start with no history
    pub fn load_or_empty<P: AsRef<Path>>(csv_path: P) -> Result<Self, PolarsError> {
        if csv_path.as_ref().exists() {
            Self::load(csv_path)
        } else {
            info!(
                "No historical data at {:?}; predictions will use defaults",
                csv_path.as_ref()
            );
            Ok(Self::default())
        }
    }

    pub fn records(&self) -> &[RaceResultRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<RaceResultRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Convert DataFrame to RaceResultRecord vector
    ///
    /// Numeric columns are cast to Float64 so that integer columns, float
    /// columns written with NaN gaps, and empty cells all read the same way.
    fn dataframe_to_records(df: &DataFrame) -> Result<Vec<RaceResultRecord>, PolarsError> {
        let height = df.height();

        let driver_col = required_str_column(df, "Abbreviation")?;
        let location_col = required_str_column(df, "Location")?;
        let year_col = required_f64_column(df, "Year")?;
        let round_col = required_f64_column(df, "Round")?;

        let team_col = optional_str_column(df, "TeamName", height)?;
        let position_col = optional_f64_column(df, "Position", height)?;
        let points_col = optional_f64_column(df, "Points", height)?;
        let quali_col = optional_f64_column(df, "QualifyingPosition", height)?;
        let temp_col = optional_f64_column(df, "AvgTemperature", height)?;
        let humidity_col = optional_f64_column(df, "AvgHumidity", height)?;
        let rain_col = optional_str_column(df, "HadRain", height)?;
        let avg_lap_col = optional_f64_column(df, "AvgLapTime", height)?;
        let best_lap_col = optional_f64_column(df, "BestLapTime", height)?;
        let pit_col = optional_f64_column(df, "PitStops", height)?;

        let mut records = Vec::with_capacity(height);
        for i in 0..height {
            let (Some(year), Some(round)) = (race_index(year_col[i]), race_index(round_col[i]))
            else {
                warn!(
                    "Skipping CSV row {}: Year {:?} / Round {:?} is not a whole number",
                    i + 1,
                    year_col[i],
                    round_col[i]
                );
                continue;
            };

            let position = position_col[i];
            records.push(RaceResultRecord {
                driver: driver_col[i].clone().unwrap_or_default(),
                year: year as i32,
                round,
                location: location_col[i].clone().unwrap_or_default(),
                team: team_col[i]
                    .clone()
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| UNKNOWN_TEAM.to_string()),
                position,
                points: points_col[i],
                qualifying_position: quali_col[i],
                avg_temperature: temp_col[i],
                avg_humidity: humidity_col[i],
                had_rain: rain_col[i].as_deref().map(parse_flag).unwrap_or(false),
                avg_lap_time: avg_lap_col[i],
                best_lap_time: best_lap_col[i],
                pit_stops: pit_col[i],
                won: is_win(position),
            });
        }

        Ok(records)
    }
}

/// Year or round as a non-negative whole number
fn race_index(value: Option<f64>) -> Option<u32> {
    value
        .filter(|v| v.is_finite() && *v >= 0.0 && v.fract() == 0.0 && *v <= i32::MAX as f64)
        .map(|v| v as u32)
}

/// Parse the rain flag as written by pandas (`True`/`False`) or as 0/1
fn parse_flag(raw: &str) -> bool {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" => true,
        other => other.parse::<f64>().map(|v| v != 0.0).unwrap_or(false),
    }
}

fn required_f64_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, PolarsError> {
    let values = df.column(name)?.cast(&DataType::Float64)?;
    Ok(values.f64()?.into_iter().map(|v| v.filter(|x| !x.is_nan())).collect())
}

fn required_str_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>, PolarsError> {
    let values = df.column(name)?.cast(&DataType::String)?;
    Ok(values
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

fn optional_f64_column(
    df: &DataFrame,
    name: &str,
    height: usize,
) -> Result<Vec<Option<f64>>, PolarsError> {
    if df.column(name).is_err() {
        return Ok(vec![None; height]);
    }
    required_f64_column(df, name)
}

fn optional_str_column(
    df: &DataFrame,
    name: &str,
    height: usize,
) -> Result<Vec<Option<String>>, PolarsError> {
    if df.column(name).is_err() {
        return Ok(vec![None; height]);
    }
    required_str_column(df, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(name: &str, contents: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("f1predict-csv-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("True"));
        assert!(parse_flag("true"));
        assert!(parse_flag("1"));
        assert!(!parse_flag("False"));
        assert!(!parse_flag("0.0"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn test_record_builder_derives_win() {
        let winner = RaceResultRecord::new("VER", 2023, 1, "Sakhir", "Red Bull Racing")
            .with_result(Some(1.0), Some(25.0));
        let second = RaceResultRecord::new("PER", 2023, 1, "Sakhir", "Red Bull Racing")
            .with_result(Some(2.0), Some(18.0));
        let unclassified =
            RaceResultRecord::new("ZHO", 2023, 1, "Sakhir", "Alfa Romeo").with_result(None, None);

        assert!(winner.won);
        assert!(!second.won);
        assert!(!unclassified.won);
    }

    #[test]
    fn test_load_csv_with_gaps() {
        let path = write_csv(
            "history_gaps.csv",
            "Abbreviation,Position,Points,Status,Year,Round,Location,QualifyingPosition,AvgTemperature,AvgHumidity,HadRain,AvgLapTime,BestLapTime,PitStops,Won,TeamName\n\
             VER,1.0,25.0,Finished,2023,1,Sakhir,1.0,27.5,40.0,False,97.1,95.2,2,1,Red Bull Racing\n\
             LEC,,0.0,Retired,2023,1,Sakhir,,27.5,40.0,True,,,,0,\n",
        );

        let data = HistoricalData::load(&path).unwrap();
        assert_eq!(data.len(), 2);

        let ver = &data.records()[0];
        assert_eq!(ver.driver, "VER");
        assert_eq!(ver.year, 2023);
        assert_eq!(ver.round, 1);
        assert_eq!(ver.team, "Red Bull Racing");
        assert!(ver.won);
        assert!(!ver.had_rain);
        assert!((ver.pit_stops.unwrap() - 2.0).abs() < 1e-9);

        let lec = &data.records()[1];
        assert_eq!(lec.position, None);
        assert_eq!(lec.qualifying_position, None);
        assert_eq!(lec.team, UNKNOWN_TEAM);
        assert!(lec.had_rain);
        assert!(!lec.won);
    }

    #[test]
    fn test_load_csv_without_optional_columns() {
        let path = write_csv(
            "history_minimal.csv",
            "Abbreviation,Year,Round,Location,Position,Points\nHAM,2021,3,Portimao,1,26\n",
        );

        let data = HistoricalData::load(&path).unwrap();
        let ham = &data.records()[0];
        assert_eq!(ham.team, UNKNOWN_TEAM);
        assert_eq!(ham.avg_temperature, None);
        assert!(ham.won);
    }

    #[test]
    fn test_rows_without_valid_year_or_round_are_skipped() {
        let path = write_csv(
            "history_bad_index.csv",
            "Abbreviation,Year,Round,Location,Position,Points\n\
             VER,2023,1,Sakhir,1,25\n\
             LEC,,1,Sakhir,2,18\n\
             NOR,2023,-1,Sakhir,3,15\n\
             HAM,2023,2.5,Jeddah,4,12\n",
        );

        let data = HistoricalData::load(&path).unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data.records()[0].driver, "VER");
        assert_eq!((data.records()[0].year, data.records()[0].round), (2023, 1));
    }

    #[test]
    fn test_race_index() {
        assert_eq!(race_index(Some(2023.0)), Some(2023));
        assert_eq!(race_index(Some(0.0)), Some(0));
        assert_eq!(race_index(None), None);
        assert_eq!(race_index(Some(-1.0)), None);
        assert_eq!(race_index(Some(f64::NAN)), None);
        assert_eq!(race_index(Some(3.5)), None);
    }

    #[test]
    fn test_load_or_empty_missing_file() {
        let data = HistoricalData::load_or_empty("/nonexistent/historical_data.csv").unwrap();
        assert!(data.is_empty());
    }
}
