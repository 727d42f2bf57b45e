//! Feature Engineering
//!
//! Builds the model's feature table from historical race results: rolling
//! driver form, track affinity, constructor strength, qualifying impact and
//! season standing, one row per driver-race.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::{self, Write};
use std::ops::{Index, IndexMut};
use tracing::{info, warn};

use crate::data::aggregate::{
    dense_rank_descending, group_indices, mean_defined, median, min_defined, sum_defined,
};
use crate::data::csv_loader::RaceResultRecord;
use crate::error::LoadError;

/// Number of canonical features
pub const NUM_FEATURES: usize = 19;

/// Number of preceding races in the rolling driver-form window
pub const FORM_WINDOW: usize = 5;

/// Qualifying position assumed when none was recorded (last place)
pub const MISSING_QUALIFYING_POSITION: f64 = 20.0;

/// Canonical features, declared in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureName {
    QualifyingPosition,
    PointsLast5,
    AvgPositionLast5,
    WinsLast5,
    AvgPositionAtTrack,
    BestPositionAtTrack,
    WinsAtTrack,
    TeamAvgPoints,
    TeamRank,
    PositionChange,
    QualiToRaceAvg,
    DriverChampionshipRank,
    PointsPerRace,
    AvgTemperature,
    AvgHumidity,
    HadRain,
    AvgLapTime,
    BestLapTime,
    PitStops,
}

impl FeatureName {
    pub const ALL: [FeatureName; NUM_FEATURES] = [
        FeatureName::QualifyingPosition,
        FeatureName::PointsLast5,
        FeatureName::AvgPositionLast5,
        FeatureName::WinsLast5,
        FeatureName::AvgPositionAtTrack,
        FeatureName::BestPositionAtTrack,
        FeatureName::WinsAtTrack,
        FeatureName::TeamAvgPoints,
        FeatureName::TeamRank,
        FeatureName::PositionChange,
        FeatureName::QualiToRaceAvg,
        FeatureName::DriverChampionshipRank,
        FeatureName::PointsPerRace,
        FeatureName::AvgTemperature,
        FeatureName::AvgHumidity,
        FeatureName::HadRain,
        FeatureName::AvgLapTime,
        FeatureName::BestLapTime,
        FeatureName::PitStops,
    ];

    /// Column name used in feature tables and model metadata
    pub fn as_str(self) -> &'static str {
        match self {
            FeatureName::QualifyingPosition => "QualifyingPosition",
            FeatureName::PointsLast5 => "PointsLast5",
            FeatureName::AvgPositionLast5 => "AvgPositionLast5",
            FeatureName::WinsLast5 => "WinsLast5",
            FeatureName::AvgPositionAtTrack => "AvgPositionAtTrack",
            FeatureName::BestPositionAtTrack => "BestPositionAtTrack",
            FeatureName::WinsAtTrack => "WinsAtTrack",
            FeatureName::TeamAvgPoints => "TeamAvgPoints",
            FeatureName::TeamRank => "TeamRank",
            FeatureName::PositionChange => "PositionChange",
            FeatureName::QualiToRaceAvg => "QualiToRaceAvg",
            FeatureName::DriverChampionshipRank => "DriverChampionshipRank",
            FeatureName::PointsPerRace => "PointsPerRace",
            FeatureName::AvgTemperature => "AvgTemperature",
            FeatureName::AvgHumidity => "AvgHumidity",
            FeatureName::HadRain => "HadRain",
            FeatureName::AvgLapTime => "AvgLapTime",
            FeatureName::BestLapTime => "BestLapTime",
            FeatureName::PitStops => "PitStops",
        }
    }

    /// Position in the canonical order
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.as_str() == name)
    }
}

/// Get feature column names in canonical order (19 features)
pub fn get_feature_names() -> Vec<&'static str> {
    FeatureName::ALL.iter().map(|f| f.as_str()).collect()
}

/// One value for every canonical feature
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FeatureRow([f64; NUM_FEATURES]);

impl FeatureRow {
    /// Values in canonical order
    pub fn values(&self) -> &[f64; NUM_FEATURES] {
        &self.0
    }

    /// Model input for `schema`: element `i` is the value of schema column `i`.
    ///
    /// Columns the builder does not produce are fed 0. The result always has
    /// exactly `schema.len()` elements.
    pub fn project(&self, schema: &FeatureSchema) -> Vec<f64> {
        let input: Vec<f64> = schema
            .columns()
            .iter()
            .map(|column| column.map_or(0.0, |f| self[f]))
            .collect();
        debug_assert_eq!(input.len(), schema.len());
        input
    }
}

impl Index<FeatureName> for FeatureRow {
    type Output = f64;

    fn index(&self, feature: FeatureName) -> &f64 {
        &self.0[feature.index()]
    }
}

impl IndexMut<FeatureName> for FeatureRow {
    fn index_mut(&mut self, feature: FeatureName) -> &mut f64 {
        &mut self.0[feature.index()]
    }
}

/// Ordered feature names a trained model expects
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSchema {
    names: Vec<String>,
    columns: Vec<Option<FeatureName>>,
}

impl FeatureSchema {
    /// Schema in canonical order
    pub fn canonical() -> Self {
        Self {
            names: get_feature_names().into_iter().map(str::to_string).collect(),
            columns: FeatureName::ALL.iter().copied().map(Some).collect(),
        }
    }

    /// Resolve a model's feature names against the canonical set
    pub fn new(names: Vec<String>) -> Result<Self, LoadError> {
        if names.is_empty() {
            return Err(LoadError::InvalidSchema(
                "model declares no features".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(LoadError::InvalidSchema(format!(
                    "duplicate feature {:?}",
                    name
                )));
            }
        }

        let columns = names
            .iter()
            .map(|name| {
                let column = FeatureName::from_name(name);
                if column.is_none() {
                    warn!("Model feature {:?} is not built by this crate; feeding 0", name);
                }
                column
            })
            .collect();

        Ok(Self { names, columns })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn columns(&self) -> &[Option<FeatureName>] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Feature table row: identity columns, target and features
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    pub driver: String,
    pub year: i32,
    pub round: u32,
    pub location: String,
    pub team: String,
    pub won: bool,
    pub features: FeatureRow,
}

/// Features still being derived; `None` means undefined so far
#[derive(Clone, Copy)]
struct PendingRow([Option<f64>; NUM_FEATURES]);

impl Index<FeatureName> for PendingRow {
    type Output = Option<f64>;

    fn index(&self, feature: FeatureName) -> &Option<f64> {
        &self.0[feature.index()]
    }
}

impl IndexMut<FeatureName> for PendingRow {
    fn index_mut(&mut self, feature: FeatureName) -> &mut Option<f64> {
        &mut self.0[feature.index()]
    }
}

/// Numeric raw columns that take part in the median pre-fill
const NUMERIC_COLUMNS: usize = 8;

fn numeric_columns(r: &RaceResultRecord) -> [Option<f64>; NUMERIC_COLUMNS] {
    [
        r.position,
        r.points,
        r.qualifying_position,
        r.avg_temperature,
        r.avg_humidity,
        r.avg_lap_time,
        r.best_lap_time,
        r.pit_stops,
    ]
}

fn numeric_columns_mut(r: &mut RaceResultRecord) -> [&mut Option<f64>; NUMERIC_COLUMNS] {
    [
        &mut r.position,
        &mut r.points,
        &mut r.qualifying_position,
        &mut r.avg_temperature,
        &mut r.avg_humidity,
        &mut r.avg_lap_time,
        &mut r.best_lap_time,
        &mut r.pit_stops,
    ]
}

/// Feature engineering for historical results
pub struct FeatureEngineering;

impl FeatureEngineering {
    /// Create all ML features from raw historical results
    ///
    /// Missing numeric values are first filled with their column median; after
    /// every feature group has been derived, anything still undefined becomes 0.
    /// Rows come back sorted by (driver, year, round).
    pub fn create_ml_features(records: &[RaceResultRecord]) -> Vec<FeatureRecord> {
        let mut rows = Self::fill_with_medians(records);
        // Stable, so same-key rows keep their stored order.
        rows.sort_by(|a, b| {
            a.driver
                .cmp(&b.driver)
                .then(a.year.cmp(&b.year))
                .then(a.round.cmp(&b.round))
        });

        let mut pending = vec![PendingRow([None; NUM_FEATURES]); rows.len()];
        Self::apply_driver_form(&rows, &mut pending);
        Self::apply_track_performance(&rows, &mut pending);
        Self::apply_constructor_strength(&rows, &mut pending);
        Self::apply_qualifying_impact(&rows, &mut pending);
        Self::apply_season_features(&rows, &mut pending);
        Self::apply_session_features(&rows, &mut pending);

        let table: Vec<FeatureRecord> = rows
            .into_iter()
            .zip(pending)
            .map(|(row, features)| FeatureRecord {
                driver: row.driver,
                year: row.year,
                round: row.round,
                location: row.location,
                team: row.team,
                won: row.won,
                features: FeatureRow(features.0.map(|v| v.unwrap_or(0.0))),
            })
            .collect();

        info!("Created features for {} records", table.len());
        table
    }

    /// Fill missing numeric values with the column median over the whole table
    pub fn fill_with_medians(records: &[RaceResultRecord]) -> Vec<RaceResultRecord> {
        let mut medians = [None; NUMERIC_COLUMNS];
        for (j, slot) in medians.iter_mut().enumerate() {
            *slot = median(records.iter().map(|r| numeric_columns(r)[j]));
        }

        let mut rows = records.to_vec();
        for row in &mut rows {
            for (value, fill) in numeric_columns_mut(row).into_iter().zip(medians) {
                if value.map_or(true, f64::is_nan) {
                    *value = fill;
                }
            }
        }
        rows
    }

    /// Points, mean position and wins over each driver's preceding races
    fn apply_driver_form(rows: &[RaceResultRecord], pending: &mut [PendingRow]) {
        for indices in group_indices(rows, |r| r.driver.as_str()).into_values() {
            for (k, &idx) in indices.iter().enumerate() {
                let window = &indices[k.saturating_sub(FORM_WINDOW)..k];

                pending[idx][FeatureName::PointsLast5] =
                    sum_defined(window.iter().map(|&i| rows[i].points));
                pending[idx][FeatureName::AvgPositionLast5] =
                    mean_defined(window.iter().map(|&i| rows[i].position));
                pending[idx][FeatureName::WinsLast5] = (!window.is_empty())
                    .then(|| window.iter().filter(|&&i| rows[i].won).count() as f64);
            }
        }
    }

    /// Whole-history aggregates per (driver, track), current race included
    fn apply_track_performance(rows: &[RaceResultRecord], pending: &mut [PendingRow]) {
        let groups = group_indices(rows, |r| (r.driver.as_str(), r.location.as_str()));
        for indices in groups.into_values() {
            let avg = mean_defined(indices.iter().map(|&i| rows[i].position));
            let best = min_defined(indices.iter().map(|&i| rows[i].position));
            let wins = indices.iter().filter(|&&i| rows[i].won).count() as f64;

            for &i in &indices {
                pending[i][FeatureName::AvgPositionAtTrack] = avg;
                pending[i][FeatureName::BestPositionAtTrack] = best;
                pending[i][FeatureName::WinsAtTrack] = Some(wins);
            }
        }
    }

    /// Team mean points per season and the team's dense rank within the season
    fn apply_constructor_strength(rows: &[RaceResultRecord], pending: &mut [PendingRow]) {
        let mut team_avg = vec![None; rows.len()];
        for indices in group_indices(rows, |r| (r.team.as_str(), r.year)).into_values() {
            let avg = mean_defined(indices.iter().map(|&i| rows[i].points));
            for &i in &indices {
                team_avg[i] = avg;
            }
        }

        for indices in group_indices(rows, |r| r.year).into_values() {
            let values: Vec<Option<f64>> = indices.iter().map(|&i| team_avg[i]).collect();
            for (&i, rank) in indices.iter().zip(dense_rank_descending(&values)) {
                pending[i][FeatureName::TeamRank] = rank;
            }
        }

        for (row, avg) in pending.iter_mut().zip(team_avg) {
            row[FeatureName::TeamAvgPoints] = avg;
        }
    }

    /// Places gained from the grid, and the driver's usual gain at each track
    fn apply_qualifying_impact(rows: &[RaceResultRecord], pending: &mut [PendingRow]) {
        let qualifying: Vec<f64> = rows
            .iter()
            .map(|r| r.qualifying_position.unwrap_or(MISSING_QUALIFYING_POSITION))
            .collect();

        for (i, row) in rows.iter().enumerate() {
            pending[i][FeatureName::QualifyingPosition] = Some(qualifying[i]);
            pending[i][FeatureName::PositionChange] = row.position.map(|p| qualifying[i] - p);
        }

        let groups = group_indices(rows, |r| (r.driver.as_str(), r.location.as_str()));
        for indices in groups.into_values() {
            let mean_quali = mean_defined(indices.iter().map(|&i| Some(qualifying[i])));
            let mean_finish = mean_defined(indices.iter().map(|&i| rows[i].position));
            let delta = mean_quali.zip(mean_finish).map(|(q, p)| q - p);

            for &i in &indices {
                pending[i][FeatureName::QualiToRaceAvg] = delta;
            }
        }
    }

    /// Running championship points, their rank in the season, and points per race
    fn apply_season_features(rows: &[RaceResultRecord], pending: &mut [PendingRow]) {
        let mut cumulative = vec![None; rows.len()];
        for indices in group_indices(rows, |r| (r.driver.as_str(), r.year)).into_values() {
            let mut running = 0.0;
            for &i in &indices {
                cumulative[i] = rows[i].points.map(|p| {
                    running += p;
                    running
                });
            }

            let per_race = mean_defined(indices.iter().map(|&i| rows[i].points));
            for &i in &indices {
                pending[i][FeatureName::PointsPerRace] = per_race;
            }
        }

        for indices in group_indices(rows, |r| r.year).into_values() {
            let values: Vec<Option<f64>> = indices.iter().map(|&i| cumulative[i]).collect();
            for (&i, rank) in indices.iter().zip(dense_rank_descending(&values)) {
                pending[i][FeatureName::DriverChampionshipRank] = rank;
            }
        }
    }

    /// Weather, lap-time and pit-stop measurements carried over as-is
    fn apply_session_features(rows: &[RaceResultRecord], pending: &mut [PendingRow]) {
        for (row, features) in rows.iter().zip(pending.iter_mut()) {
            features[FeatureName::AvgTemperature] = row.avg_temperature;
            features[FeatureName::AvgHumidity] = row.avg_humidity;
            features[FeatureName::HadRain] = Some(if row.had_rain { 1.0 } else { 0.0 });
            features[FeatureName::AvgLapTime] = row.avg_lap_time;
            features[FeatureName::BestLapTime] = row.best_lap_time;
            features[FeatureName::PitStops] = row.pit_stops;
        }
    }
}

/// Write the feature table as CSV: identity columns, `Won`, then the features
pub fn write_feature_table<W: Write>(records: &[FeatureRecord], mut writer: W) -> io::Result<()> {
    let mut header = vec!["Abbreviation", "Year", "Round", "Location", "TeamName", "Won"];
    header.extend(get_feature_names());
    writeln!(writer, "{}", header.join(","))?;

    for record in records {
        let mut fields = vec![
            escape_csv(&record.driver),
            record.year.to_string(),
            record.round.to_string(),
            escape_csv(&record.location),
            escape_csv(&record.team),
            u8::from(record.won).to_string(),
        ];
        fields.extend(record.features.values().iter().map(|v| v.to_string()));
        writeln!(writer, "{}", fields.join(","))?;
    }

    Ok(())
}

/// Escape quotes and wrap in quotes if the field contains a comma
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn race(
        driver: &str,
        year: i32,
        round: u32,
        location: &str,
        team: &str,
        position: f64,
        points: f64,
    ) -> RaceResultRecord {
        RaceResultRecord::new(driver, year, round, location, team)
            .with_result(Some(position), Some(points))
            .with_qualifying(Some(position))
            .with_weather(Some(25.0), Some(50.0), false)
            .with_laps(Some(90.0), Some(88.0), Some(2.0))
    }

    fn find<'a>(table: &'a [FeatureRecord], driver: &str, year: i32, round: u32) -> &'a FeatureRow {
        &table
            .iter()
            .find(|r| r.driver == driver && r.year == year && r.round == round)
            .unwrap()
            .features
    }

    #[test]
    fn test_feature_names() {
        let names = get_feature_names();
        assert_eq!(names.len(), NUM_FEATURES);
        assert_eq!(names[0], "QualifyingPosition");
        assert_eq!(names[18], "PitStops");

        for (i, feature) in FeatureName::ALL.iter().enumerate() {
            assert_eq!(feature.index(), i);
            assert_eq!(FeatureName::from_name(feature.as_str()), Some(*feature));
        }
        assert_eq!(FeatureName::from_name("TotalLaps"), None);
    }

    #[test]
    fn test_rolling_form_excludes_current_race() {
        let history = vec![
            race("VER", 2023, 1, "Sakhir", "Red Bull Racing", 1.0, 25.0),
            race("VER", 2023, 2, "Jeddah", "Red Bull Racing", 2.0, 18.0),
            race("VER", 2023, 3, "Melbourne", "Red Bull Racing", 3.0, 15.0),
        ];
        let table = FeatureEngineering::create_ml_features(&history);

        // First race: nothing precedes it, so the post-pass fills 0 rather than its own 25.
        let first = find(&table, "VER", 2023, 1);
        assert_eq!(first[FeatureName::PointsLast5], 0.0);
        assert_eq!(first[FeatureName::AvgPositionLast5], 0.0);
        assert_eq!(first[FeatureName::WinsLast5], 0.0);

        let second = find(&table, "VER", 2023, 2);
        assert!((second[FeatureName::PointsLast5] - 25.0).abs() < 1e-9);
        assert!((second[FeatureName::AvgPositionLast5] - 1.0).abs() < 1e-9);
        assert!((second[FeatureName::WinsLast5] - 1.0).abs() < 1e-9);

        let third = find(&table, "VER", 2023, 3);
        assert!((third[FeatureName::PointsLast5] - 43.0).abs() < 1e-9);
        assert!((third[FeatureName::AvgPositionLast5] - 1.5).abs() < 1e-9);
        assert!((third[FeatureName::WinsLast5] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rolling_form_window_is_five() {
        let history: Vec<RaceResultRecord> = (1..=7)
            .map(|round| race("NOR", 2024, round, "Track", "McLaren", 4.0, round as f64))
            .collect();
        let table = FeatureEngineering::create_ml_features(&history);

        // Round 7 sees rounds 2..=6.
        let last = find(&table, "NOR", 2024, 7);
        assert!((last[FeatureName::PointsLast5] - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_output_sorted_and_row_count_preserved() {
        let history = vec![
            race("LEC", 2023, 2, "Jeddah", "Ferrari", 3.0, 15.0),
            race("HAM", 2023, 1, "Sakhir", "Mercedes", 5.0, 10.0),
            race("LEC", 2022, 5, "Miami", "Ferrari", 2.0, 18.0),
            race("LEC", 2023, 1, "Sakhir", "Ferrari", 4.0, 12.0),
        ];
        let table = FeatureEngineering::create_ml_features(&history);

        assert_eq!(table.len(), history.len());
        let keys: Vec<(&str, i32, u32)> = table
            .iter()
            .map(|r| (r.driver.as_str(), r.year, r.round))
            .collect();
        assert_eq!(
            keys,
            vec![("HAM", 2023, 1), ("LEC", 2022, 5), ("LEC", 2023, 1), ("LEC", 2023, 2)]
        );
    }

    #[test]
    fn test_track_performance_includes_current_race() {
        let history = vec![
            race("ALO", 2022, 14, "Monza", "Alpine", 3.0, 15.0),
            race("ALO", 2023, 14, "Monza", "Aston Martin", 1.0, 25.0),
            race("ALO", 2023, 13, "Spa-Francorchamps", "Aston Martin", 4.0, 12.0),
        ];
        let table = FeatureEngineering::create_ml_features(&history);

        for (year, round) in [(2022, 14), (2023, 14)] {
            let row = find(&table, "ALO", year, round);
            assert!((row[FeatureName::AvgPositionAtTrack] - 2.0).abs() < 1e-9);
            assert!((row[FeatureName::BestPositionAtTrack] - 1.0).abs() < 1e-9);
            assert!((row[FeatureName::WinsAtTrack] - 1.0).abs() < 1e-9);
        }

        let spa = find(&table, "ALO", 2023, 13);
        assert!((spa[FeatureName::AvgPositionAtTrack] - 4.0).abs() < 1e-9);
        assert_eq!(spa[FeatureName::WinsAtTrack], 0.0);
    }

    #[test]
    fn test_constructor_dense_rank_with_ties() {
        let history = vec![
            race("AAA", 2023, 1, "Sakhir", "Alpha", 2.0, 20.0),
            race("BBB", 2023, 1, "Sakhir", "Beta", 3.0, 20.0),
            race("CCC", 2023, 1, "Sakhir", "Gamma", 4.0, 10.0),
            race("CCC", 2024, 1, "Sakhir", "Gamma", 1.0, 30.0),
        ];
        let table = FeatureEngineering::create_ml_features(&history);

        let aaa = find(&table, "AAA", 2023, 1);
        let bbb = find(&table, "BBB", 2023, 1);
        let ccc = find(&table, "CCC", 2023, 1);
        assert!((aaa[FeatureName::TeamAvgPoints] - 20.0).abs() < 1e-9);
        assert_eq!(aaa[FeatureName::TeamRank], 1.0);
        assert_eq!(bbb[FeatureName::TeamRank], 1.0);
        assert_eq!(ccc[FeatureName::TeamRank], 2.0);

        let ccc_next = find(&table, "CCC", 2024, 1);
        assert!((ccc_next[FeatureName::TeamAvgPoints] - 30.0).abs() < 1e-9);
        assert_eq!(ccc_next[FeatureName::TeamRank], 1.0);
    }

    #[test]
    fn test_season_features() {
        let history = vec![
            race("XXX", 2023, 1, "Sakhir", "Alpha", 5.0, 10.0),
            race("XXX", 2023, 2, "Jeddah", "Alpha", 3.0, 15.0),
            race("YYY", 2023, 1, "Sakhir", "Beta", 1.0, 25.0),
            race("YYY", 2023, 2, "Jeddah", "Beta", 11.0, 0.0),
        ];
        let table = FeatureEngineering::create_ml_features(&history);

        // Cumulative totals: XXX 10 then 25, YYY 25 then 25.
        assert_eq!(find(&table, "XXX", 2023, 1)[FeatureName::DriverChampionshipRank], 2.0);
        assert_eq!(find(&table, "XXX", 2023, 2)[FeatureName::DriverChampionshipRank], 1.0);
        assert_eq!(find(&table, "YYY", 2023, 1)[FeatureName::DriverChampionshipRank], 1.0);
        assert_eq!(find(&table, "YYY", 2023, 2)[FeatureName::DriverChampionshipRank], 1.0);

        assert!((find(&table, "XXX", 2023, 1)[FeatureName::PointsPerRace] - 12.5).abs() < 1e-9);
        assert!((find(&table, "YYY", 2023, 2)[FeatureName::PointsPerRace] - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_median_prefill_feeds_rolling_form() {
        let history = vec![
            race("PIA", 2024, 1, "Sakhir", "McLaren", 5.0, 10.0),
            RaceResultRecord::new("PIA", 2024, 2, "Jeddah", "McLaren")
                .with_result(Some(6.0), None),
            race("PIA", 2024, 3, "Melbourne", "McLaren", 7.0, 30.0),
        ];
        let table = FeatureEngineering::create_ml_features(&history);

        // Round 2's missing points take the median of 10 and 30.
        let third = find(&table, "PIA", 2024, 3);
        assert!((third[FeatureName::PointsLast5] - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_qualifying_defaults_to_last_place() {
        let history = vec![RaceResultRecord::new("SAR", 2023, 1, "Sakhir", "Williams")
            .with_result(Some(5.0), Some(10.0))];
        let table = FeatureEngineering::create_ml_features(&history);

        let row = find(&table, "SAR", 2023, 1);
        assert_eq!(row[FeatureName::QualifyingPosition], MISSING_QUALIFYING_POSITION);
        assert!((row[FeatureName::PositionChange] - 15.0).abs() < 1e-9);
        assert!((row[FeatureName::QualiToRaceAvg] - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_residual_missing_values_become_zero() {
        let history = vec![RaceResultRecord::new("BOT", 2023, 1, "Sakhir", "Alfa Romeo")
            .with_result(Some(12.0), Some(0.0))
            .with_qualifying(Some(14.0))];
        let table = FeatureEngineering::create_ml_features(&history);

        let row = find(&table, "BOT", 2023, 1);
        assert_eq!(row[FeatureName::AvgLapTime], 0.0);
        assert_eq!(row[FeatureName::AvgTemperature], 0.0);
        assert_eq!(row[FeatureName::PitStops], 0.0);
        assert_eq!(row[FeatureName::HadRain], 0.0);
        assert!(row.values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_schema_projection_follows_model_order() {
        let mut row = FeatureRow::default();
        row[FeatureName::QualifyingPosition] = 3.0;
        row[FeatureName::PitStops] = 2.0;
        row[FeatureName::TeamRank] = 4.0;

        let schema = FeatureSchema::new(vec![
            "PitStops".to_string(),
            "TotalLaps".to_string(),
            "QualifyingPosition".to_string(),
            "TeamRank".to_string(),
        ])
        .unwrap();

        assert_eq!(row.project(&schema), vec![2.0, 0.0, 3.0, 4.0]);
    }

    #[test]
    fn test_canonical_projection_is_identity() {
        let mut row = FeatureRow::default();
        for feature in FeatureName::ALL {
            row[feature] = feature.index() as f64;
        }
        assert_eq!(row.project(&FeatureSchema::canonical()), row.values().to_vec());
    }

    #[test]
    fn test_schema_rejects_duplicates_and_empty() {
        assert!(FeatureSchema::new(vec![]).is_err());
        let duplicated = vec!["PitStops".to_string(), "PitStops".to_string()];
        assert!(FeatureSchema::new(duplicated).is_err());
    }

    #[test]
    fn test_write_feature_table() {
        let history = vec![race("PER", 2023, 4, "Baku", "Red Bull Racing", 1.0, 25.0)];
        let table = FeatureEngineering::create_ml_features(&history);

        let mut out = Vec::new();
        write_feature_table(&table, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();

        let header = lines.next().unwrap();
        assert!(header
            .starts_with("Abbreviation,Year,Round,Location,TeamName,Won,QualifyingPosition"));
        assert_eq!(header.split(',').count(), 6 + NUM_FEATURES);

        let row = lines.next().unwrap();
        assert!(row.starts_with("PER,2023,4,Baku,Red Bull Racing,1,1"));
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("Monaco"), "Monaco");
        assert_eq!(escape_csv("Mexico City, MX"), "\"Mexico City, MX\"");
    }
}
