//! Future-race feature synthesis
//!
//! Builds the feature row for a race that has not happened yet. Each feature
//! group is resolved from the caller's assumptions first, then from the
//! driver's history, then from a fixed default; the source that supplied each
//! group is reported alongside the row.

use tracing::debug;

use crate::assumptions::{
    Assumptions, ConstructorStrength, DriverForm, LapTimes, SeasonStats, Weather,
};
use crate::data::features::{FeatureName, FeatureRow};
use crate::data::history::{Aggregate, FallbackReason, HistoryIndex, TrackRecord};
use crate::error::PredictError;

/// Form assumed for a driver with no history and no assumption
pub const DEFAULT_DRIVER_FORM: DriverForm = DriverForm {
    points_last_5: 30.0,
    avg_position: 8.0,
    wins_last_5: 0.0,
};

pub const DEFAULT_TRACK_RECORD: TrackRecord = TrackRecord {
    avg_position: 10.0,
    best_position: 5.0,
    wins: 0.0,
};

pub const DEFAULT_CONSTRUCTOR: ConstructorStrength = ConstructorStrength {
    avg_points: 15.0,
    rank: 5.0,
};

pub const DEFAULT_SEASON: SeasonStats = SeasonStats {
    championship_rank: 10.0,
    points_per_race: 10.0,
};

pub const DEFAULT_WEATHER: Weather = Weather {
    temperature: 25.0,
    humidity: 60.0,
    rain: false,
};

pub const DEFAULT_LAP_TIMES: LapTimes = LapTimes {
    avg: 90.0,
    best: 85.0,
};

pub const DEFAULT_PIT_STOPS: f64 = 2.0;

/// Where a feature group's values came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureSource {
    Assumption,
    History,
    /// History, with the values it could not define taken from defaults
    PartialHistory(FallbackReason),
    Default(FallbackReason),
}

/// Source of every feature group in one synthesized row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Provenance {
    pub driver_form: FeatureSource,
    pub track: FeatureSource,
    pub constructor: FeatureSource,
    pub qualifying_impact: FeatureSource,
    pub season: FeatureSource,
    pub weather: FeatureSource,
    pub lap_times: FeatureSource,
    pub pit_stops: FeatureSource,
}

/// Feature row for one driver in a future race
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedRow {
    pub row: FeatureRow,
    pub provenance: Provenance,
}

/// Synthesizes future-race features from assumptions and history
pub struct FutureRaceSynthesizer<'a> {
    history: &'a HistoryIndex,
}

impl<'a> FutureRaceSynthesizer<'a> {
    pub fn new(history: &'a HistoryIndex) -> Self {
        Self { history }
    }

    /// Resolve every canonical feature for `driver` at `track`
    pub fn synthesize(
        &self,
        driver: &str,
        track: &str,
        qualifying_position: u32,
        assumptions: &Assumptions,
    ) -> Result<SynthesizedRow, PredictError> {
        assumptions.validate_for(driver)?;

        let mut row = FeatureRow::default();
        row[FeatureName::QualifyingPosition] = qualifying_position as f64;

        let (form, driver_form) = resolve(
            assumptions.driver_form.get(driver).copied(),
            || self.history.recent_form(driver, DEFAULT_DRIVER_FORM),
            DEFAULT_DRIVER_FORM,
        );
        row[FeatureName::PointsLast5] = form.points_last_5;
        row[FeatureName::AvgPositionLast5] = form.avg_position;
        row[FeatureName::WinsLast5] = form.wins_last_5;

        let (record, track_source) = resolve(
            None,
            || self.history.track_record(driver, track, DEFAULT_TRACK_RECORD),
            DEFAULT_TRACK_RECORD,
        );
        row[FeatureName::AvgPositionAtTrack] = record.avg_position;
        row[FeatureName::BestPositionAtTrack] = record.best_position;
        row[FeatureName::WinsAtTrack] = record.wins;

        let (team, constructor) = resolve(
            assumptions.constructor_strength.get(driver).copied(),
            || self.history.team_strength(driver).map(Aggregate::complete),
            DEFAULT_CONSTRUCTOR,
        );
        row[FeatureName::TeamAvgPoints] = team.avg_points;
        row[FeatureName::TeamRank] = team.rank;

        // No systematic gain or loss from the grid is assumed.
        row[FeatureName::PositionChange] = 0.0;
        row[FeatureName::QualiToRaceAvg] = 0.0;
        let qualifying_impact = FeatureSource::Default(FallbackReason::NotObservable);

        let (standing, season) = resolve(
            assumptions.season_stats.get(driver).copied(),
            || self.history.season_standing(driver).map(Aggregate::complete),
            DEFAULT_SEASON,
        );
        row[FeatureName::DriverChampionshipRank] = standing.championship_rank;
        row[FeatureName::PointsPerRace] = standing.points_per_race;

        let (conditions, weather) = resolve(
            assumptions.weather,
            || self.history.track_weather(track, DEFAULT_WEATHER),
            DEFAULT_WEATHER,
        );
        row[FeatureName::AvgTemperature] = conditions.temperature;
        row[FeatureName::AvgHumidity] = conditions.humidity;
        row[FeatureName::HadRain] = if conditions.rain { 1.0 } else { 0.0 };

        let (laps, lap_times) = resolve(
            assumptions.lap_times,
            || Err(FallbackReason::NotObservable),
            DEFAULT_LAP_TIMES,
        );
        row[FeatureName::AvgLapTime] = laps.avg;
        row[FeatureName::BestLapTime] = laps.best;

        let (pits, pit_stops) = resolve(
            assumptions.pit_stops,
            || Err(FallbackReason::NotObservable),
            DEFAULT_PIT_STOPS,
        );
        row[FeatureName::PitStops] = pits;

        let provenance = Provenance {
            driver_form,
            track: track_source,
            constructor,
            qualifying_impact,
            season,
            weather,
            lap_times,
            pit_stops,
        };
        debug!("Synthesized {} at {}: {:?}", driver, track, provenance);

        Ok(SynthesizedRow { row, provenance })
    }
}

/// Assumption, else history, else default
fn resolve<T, F>(assumed: Option<T>, history: F, default: T) -> (T, FeatureSource)
where
    F: FnOnce() -> Result<Aggregate<T>, FallbackReason>,
{
    if let Some(value) = assumed {
        return (value, FeatureSource::Assumption);
    }
    match history() {
        Ok(found) => match found.fallback {
            None => (found.value, FeatureSource::History),
            Some(reason) => (found.value, FeatureSource::PartialHistory(reason)),
        },
        Err(reason) => (default, FeatureSource::Default(reason)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::csv_loader::RaceResultRecord;
    use crate::data::features::FeatureSchema;

    fn race(
        driver: &str,
        round: u32,
        location: &str,
        team: &str,
        position: f64,
        points: f64,
    ) -> RaceResultRecord {
        RaceResultRecord::new(driver, 2023, round, location, team)
            .with_result(Some(position), Some(points))
            .with_qualifying(Some(position))
            .with_weather(Some(24.0), Some(70.0), true)
            .with_laps(Some(80.0), Some(78.0), Some(1.0))
    }

    fn history() -> HistoryIndex {
        HistoryIndex::new(vec![
            race("VER", 1, "Monaco", "Red Bull Racing", 1.0, 25.0),
            race("VER", 2, "Monza", "Red Bull Racing", 2.0, 18.0),
            race("LEC", 1, "Monaco", "Ferrari", 3.0, 15.0),
        ])
    }

    #[test]
    fn test_unknown_driver_gets_defaults() {
        let history = HistoryIndex::empty();
        let synthesizer = FutureRaceSynthesizer::new(&history);
        let out = synthesizer
            .synthesize("NEW", "Monaco", 7, &Assumptions::default())
            .unwrap();
        let row = out.row;

        assert_eq!(row[FeatureName::QualifyingPosition], 7.0);
        assert_eq!(row[FeatureName::PointsLast5], 30.0);
        assert_eq!(row[FeatureName::AvgPositionLast5], 8.0);
        assert_eq!(row[FeatureName::WinsLast5], 0.0);
        assert_eq!(row[FeatureName::AvgPositionAtTrack], 10.0);
        assert_eq!(row[FeatureName::BestPositionAtTrack], 5.0);
        assert_eq!(row[FeatureName::WinsAtTrack], 0.0);
        assert_eq!(row[FeatureName::TeamAvgPoints], 15.0);
        assert_eq!(row[FeatureName::TeamRank], 5.0);
        assert_eq!(row[FeatureName::PointsPerRace], 10.0);
        assert_eq!(row[FeatureName::DriverChampionshipRank], 10.0);
        assert_eq!(row[FeatureName::AvgTemperature], 25.0);
        assert_eq!(row[FeatureName::AvgHumidity], 60.0);
        assert_eq!(row[FeatureName::HadRain], 0.0);
        assert_eq!(row[FeatureName::AvgLapTime], 90.0);
        assert_eq!(row[FeatureName::BestLapTime], 85.0);
        assert_eq!(row[FeatureName::PitStops], 2.0);

        assert_eq!(
            out.provenance.driver_form,
            FeatureSource::Default(FallbackReason::NoDriverHistory)
        );
        assert_eq!(
            out.provenance.weather,
            FeatureSource::Default(FallbackReason::NoTrackWeather)
        );
    }

    #[test]
    fn test_history_fallbacks() {
        let history = history();
        let synthesizer = FutureRaceSynthesizer::new(&history);
        let out = synthesizer
            .synthesize("VER", "Monaco", 1, &Assumptions::default())
            .unwrap();
        let row = out.row;

        assert!((row[FeatureName::PointsLast5] - 43.0).abs() < 1e-9);
        assert!((row[FeatureName::AvgPositionLast5] - 1.5).abs() < 1e-9);
        assert_eq!(row[FeatureName::WinsLast5], 1.0);
        assert_eq!(row[FeatureName::AvgPositionAtTrack], 1.0);
        assert_eq!(row[FeatureName::WinsAtTrack], 1.0);
        assert!((row[FeatureName::TeamAvgPoints] - 21.5).abs() < 1e-9);
        assert_eq!(row[FeatureName::TeamRank], 1.0);
        assert!((row[FeatureName::PointsPerRace] - 21.5).abs() < 1e-9);
        assert_eq!(row[FeatureName::DriverChampionshipRank], 1.0);
        assert!((row[FeatureName::AvgTemperature] - 24.0).abs() < 1e-9);
        assert_eq!(row[FeatureName::HadRain], 1.0);

        // Lap times have no historical source.
        assert_eq!(row[FeatureName::AvgLapTime], 90.0);
        assert_eq!(row[FeatureName::PositionChange], 0.0);

        assert_eq!(out.provenance.driver_form, FeatureSource::History);
        assert_eq!(out.provenance.track, FeatureSource::History);
        assert_eq!(
            out.provenance.lap_times,
            FeatureSource::Default(FallbackReason::NotObservable)
        );
    }

    #[test]
    fn test_assumptions_override_history() {
        let history = history();
        let synthesizer = FutureRaceSynthesizer::new(&history);
        let mut assumptions = Assumptions::default();
        assumptions.driver_form.insert(
            "VER".to_string(),
            DriverForm {
                points_last_5: 120.0,
                avg_position: 1.5,
                wins_last_5: 4.0,
            },
        );
        assumptions.weather = Some(Weather {
            temperature: 22.0,
            humidity: 65.0,
            rain: false,
        });
        assumptions.lap_times = Some(LapTimes {
            avg: 74.0,
            best: 72.5,
        });
        assumptions.pit_stops = Some(1.0);

        let out = synthesizer.synthesize("VER", "Monaco", 1, &assumptions).unwrap();
        let row = out.row;

        assert_eq!(row[FeatureName::PointsLast5], 120.0);
        assert_eq!(row[FeatureName::WinsLast5], 4.0);
        assert_eq!(row[FeatureName::AvgTemperature], 22.0);
        assert_eq!(row[FeatureName::HadRain], 0.0);
        assert_eq!(row[FeatureName::AvgLapTime], 74.0);
        assert_eq!(row[FeatureName::PitStops], 1.0);
        assert_eq!(out.provenance.driver_form, FeatureSource::Assumption);
        assert_eq!(out.provenance.weather, FeatureSource::Assumption);

        // Another driver in the same call is unaffected by VER's entry.
        let lec = synthesizer.synthesize("LEC", "Monaco", 2, &assumptions).unwrap();
        assert_eq!(lec.row[FeatureName::PointsLast5], 15.0);
        assert_eq!(lec.provenance.driver_form, FeatureSource::History);
    }

    #[test]
    fn test_non_finite_assumption_fails() {
        let history = history();
        let synthesizer = FutureRaceSynthesizer::new(&history);
        let assumptions = Assumptions {
            pit_stops: Some(f64::NAN),
            ..Assumptions::default()
        };

        let err = synthesizer.synthesize("VER", "Monaco", 1, &assumptions).unwrap_err();
        assert!(matches!(err, PredictError::MalformedAssumptions { .. }));
    }

    #[test]
    fn test_projection_matches_permuted_schema() {
        let history = history();
        let synthesizer = FutureRaceSynthesizer::new(&history);
        let out = synthesizer
            .synthesize("VER", "Monza", 4, &Assumptions::default())
            .unwrap();

        let mut names: Vec<String> = FeatureName::ALL
            .iter()
            .rev()
            .map(|f| f.as_str().to_string())
            .collect();
        names.push("Unused".to_string());
        let schema = FeatureSchema::new(names).unwrap();

        let input = out.row.project(&schema);
        assert_eq!(input.len(), schema.len());
        assert_eq!(input[0], out.row[FeatureName::PitStops]);
        assert_eq!(input[FeatureName::ALL.len() - 1], 4.0);
        assert_eq!(input[FeatureName::ALL.len()], 0.0);
    }

    #[test]
    fn test_partial_history_keeps_defined_values() {
        let history = HistoryIndex::new(vec![
            RaceResultRecord::new("DEV", 2023, 10, "Budapest", "AlphaTauri")
                .with_result(Some(12.0), None)
                .with_weather(None, Some(55.0), true),
            RaceResultRecord::new("DEV", 2023, 11, "Spa-Francorchamps", "AlphaTauri")
                .with_result(Some(14.0), None),
        ]);
        let synthesizer = FutureRaceSynthesizer::new(&history);
        let out = synthesizer
            .synthesize("DEV", "Budapest", 12, &Assumptions::default())
            .unwrap();
        let row = out.row;

        assert_eq!(row[FeatureName::PointsLast5], 0.0);
        assert!((row[FeatureName::AvgPositionLast5] - 13.0).abs() < 1e-9);
        assert_eq!(row[FeatureName::WinsLast5], 0.0);
        assert_eq!(out.provenance.driver_form, FeatureSource::History);

        // Temperature alone falls back; humidity and rain stay historical.
        assert_eq!(row[FeatureName::AvgTemperature], DEFAULT_WEATHER.temperature);
        assert!((row[FeatureName::AvgHumidity] - 55.0).abs() < 1e-9);
        assert_eq!(row[FeatureName::HadRain], 1.0);
        assert_eq!(
            out.provenance.weather,
            FeatureSource::PartialHistory(FallbackReason::IncompleteHistory)
        );
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        let history = history();
        let synthesizer = FutureRaceSynthesizer::new(&history);
        let a = synthesizer.synthesize("LEC", "Monza", 3, &Assumptions::default()).unwrap();
        let b = synthesizer.synthesize("LEC", "Monza", 3, &Assumptions::default()).unwrap();
        assert_eq!(a, b);
    }
}
