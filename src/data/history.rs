//! Driver History Index
//!
//! Provides O(1) lookup of a driver's, team's or track's past results for the
//! fallbacks used when synthesizing a future race. Aggregates read the raw
//! records in their stored order, not the feature table.

use std::collections::{BTreeSet, HashMap};

use crate::assumptions::{ConstructorStrength, DriverForm, SeasonStats, Weather};
use crate::data::aggregate::{mean_defined, min_defined, sum_defined};
use crate::data::csv_loader::RaceResultRecord;

/// Number of most recent stored races used for driver form
const RECENT_RACE_LIMIT: usize = 5;

/// Rain rate above which a track is assumed wet
const RAIN_RATE_THRESHOLD: f64 = 0.3;

/// Why a feature group fell back to its hardcoded default
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// The driver has no stored races
    NoDriverHistory,
    /// The driver has never raced at this track
    NoTrackHistory,
    /// The driver's team has no stored races
    NoTeamHistory,
    /// No race has been stored for this track
    NoTrackWeather,
    /// Rows exist but every value some aggregate needs is missing
    IncompleteHistory,
    /// Nothing about a future race can be observed for this group
    NotObservable,
}

/// A history aggregate, possibly with some values taken from defaults
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aggregate<T> {
    pub value: T,
    /// Set when at least one value was undefined and fell back
    pub fallback: Option<FallbackReason>,
}

impl<T> Aggregate<T> {
    /// Every value was defined
    pub fn complete(value: T) -> Self {
        Self {
            value,
            fallback: None,
        }
    }
}

/// Substitutes defaults for undefined values and remembers that it did
#[derive(Default)]
struct Filler {
    incomplete: bool,
}

impl Filler {
    fn take(&mut self, value: Option<f64>, default: f64) -> f64 {
        value.unwrap_or_else(|| {
            self.incomplete = true;
            default
        })
    }

    fn finish<T>(self, value: T) -> Aggregate<T> {
        Aggregate {
            value,
            fallback: self.incomplete.then_some(FallbackReason::IncompleteHistory),
        }
    }
}

/// Driver's all-time results at one track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackRecord {
    pub avg_position: f64,
    pub best_position: f64,
    pub wins: f64,
}

/// Historical results indexed by driver, driver-track pair, track and team
pub struct HistoryIndex {
    records: Vec<RaceResultRecord>,
    /// driver -> row indices in stored order
    by_driver: HashMap<String, Vec<usize>>,
    /// (driver, track) -> row indices
    by_driver_track: HashMap<(String, String), Vec<usize>>,
    /// track -> row indices
    by_track: HashMap<String, Vec<usize>>,
    /// team -> mean points over all its rows (undefined if no points recorded)
    team_mean_points: HashMap<String, Option<f64>>,
    /// driver -> mean points over all their rows
    driver_mean_points: HashMap<String, Option<f64>>,
}

impl HistoryIndex {
    /// Index raw historical records
    pub fn new(records: Vec<RaceResultRecord>) -> Self {
        let mut by_driver: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_driver_track: HashMap<(String, String), Vec<usize>> = HashMap::new();
        let mut by_track: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_team: HashMap<String, Vec<usize>> = HashMap::new();

        for (i, record) in records.iter().enumerate() {
            by_driver.entry(record.driver.clone()).or_default().push(i);
            by_driver_track
                .entry((record.driver.clone(), record.location.clone()))
                .or_default()
                .push(i);
            by_track.entry(record.location.clone()).or_default().push(i);
            by_team.entry(record.team.clone()).or_default().push(i);
        }

        let mean_points =
            |indices: &Vec<usize>| mean_defined(indices.iter().map(|&i| records[i].points));
        let team_mean_points = by_team
            .iter()
            .map(|(team, indices)| (team.clone(), mean_points(indices)))
            .collect();
        let driver_mean_points = by_driver
            .iter()
            .map(|(driver, indices)| (driver.clone(), mean_points(indices)))
            .collect();

        Self {
            records,
            by_driver,
            by_driver_track,
            by_track,
            team_mean_points,
            driver_mean_points,
        }
    }

    /// Index with no history; every lookup falls back
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Points, mean position and wins over the driver's last five stored races
    ///
    /// Missing points count as zero; a mean position with no defined value
    /// takes `default.avg_position`.
    pub fn recent_form(
        &self,
        driver: &str,
        default: DriverForm,
    ) -> Result<Aggregate<DriverForm>, FallbackReason> {
        let indices = self.by_driver.get(driver).ok_or(FallbackReason::NoDriverHistory)?;
        let recent = &indices[indices.len().saturating_sub(RECENT_RACE_LIMIT)..];

        let mut fill = Filler::default();
        let form = DriverForm {
            points_last_5: sum_defined(recent.iter().map(|&i| self.records[i].points))
                .unwrap_or(0.0),
            avg_position: fill.take(
                mean_defined(recent.iter().map(|&i| self.records[i].position)),
                default.avg_position,
            ),
            wins_last_5: recent.iter().filter(|&&i| self.records[i].won).count() as f64,
        };
        Ok(fill.finish(form))
    }

    /// Mean position, best position and wins for the driver at this track
    pub fn track_record(
        &self,
        driver: &str,
        track: &str,
        default: TrackRecord,
    ) -> Result<Aggregate<TrackRecord>, FallbackReason> {
        let indices = self
            .by_driver_track
            .get(&(driver.to_string(), track.to_string()))
            .ok_or(FallbackReason::NoTrackHistory)?;

        let positions = || indices.iter().map(|&i| self.records[i].position);
        let mut fill = Filler::default();
        let record = TrackRecord {
            avg_position: fill.take(mean_defined(positions()), default.avg_position),
            best_position: fill.take(min_defined(positions()), default.best_position),
            wins: indices.iter().filter(|&&i| self.records[i].won).count() as f64,
        };
        Ok(fill.finish(record))
    }

    /// Mean points of the team of the driver's first stored race, and its rank
    /// among all teams by mean points
    pub fn team_strength(&self, driver: &str) -> Result<ConstructorStrength, FallbackReason> {
        let first = self
            .by_driver
            .get(driver)
            .and_then(|indices| indices.first())
            .ok_or(FallbackReason::NoDriverHistory)?;
        let team = &self.records[*first].team;

        let avg_points = self
            .team_mean_points
            .get(team)
            .ok_or(FallbackReason::NoTeamHistory)?
            .ok_or(FallbackReason::IncompleteHistory)?;

        Ok(ConstructorStrength {
            avg_points,
            rank: rank_above(self.team_mean_points.values(), avg_points),
        })
    }

    /// Driver's mean points per race, and their rank among all drivers
    pub fn season_standing(&self, driver: &str) -> Result<SeasonStats, FallbackReason> {
        let points_per_race = self
            .driver_mean_points
            .get(driver)
            .ok_or(FallbackReason::NoDriverHistory)?
            .ok_or(FallbackReason::IncompleteHistory)?;

        Ok(SeasonStats {
            championship_rank: rank_above(self.driver_mean_points.values(), points_per_race),
            points_per_race,
        })
    }

    /// Mean temperature and humidity at the track; wet if it rained in more
    /// than 30% of stored races there
    pub fn track_weather(
        &self,
        track: &str,
        default: Weather,
    ) -> Result<Aggregate<Weather>, FallbackReason> {
        let indices = self.by_track.get(track).ok_or(FallbackReason::NoTrackWeather)?;

        let temperature = mean_defined(indices.iter().map(|&i| self.records[i].avg_temperature));
        let humidity = mean_defined(indices.iter().map(|&i| self.records[i].avg_humidity));
        let rain_rate = indices.iter().filter(|&&i| self.records[i].had_rain).count() as f64
            / indices.len() as f64;

        let mut fill = Filler::default();
        let weather = Weather {
            temperature: fill.take(temperature, default.temperature),
            humidity: fill.take(humidity, default.humidity),
            rain: rain_rate > RAIN_RATE_THRESHOLD,
        };
        Ok(fill.finish(weather))
    }

    /// Tracks with at least one stored race, sorted
    pub fn tracks(&self) -> Vec<String> {
        let tracks: BTreeSet<&String> = self.by_track.keys().collect();
        tracks.into_iter().cloned().collect()
    }

    /// Drivers with at least one stored race, sorted
    pub fn drivers(&self) -> Vec<String> {
        let drivers: BTreeSet<&String> = self.by_driver.keys().collect();
        drivers.into_iter().cloned().collect()
    }

    /// Number of stored races
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Rank as the number of defined values strictly greater than `value`, plus one
fn rank_above<'a, I>(values: I, value: f64) -> f64
where
    I: IntoIterator<Item = &'a Option<f64>>,
{
    values
        .into_iter()
        .flatten()
        .filter(|&&other| other > value)
        .count() as f64
        + 1.0
}
