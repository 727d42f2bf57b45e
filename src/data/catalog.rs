//! Calendar tracks and grid drivers offered to callers

/// Track location names as the collector writes them in `Location`
pub const TRACKS: [&str; 22] = [
    "Bahrain",
    "Jeddah",
    "Melbourne",
    "Baku",
    "Miami",
    "Monaco",
    "Barcelona",
    "Montreal",
    "Silverstone",
    "Spielberg",
    "Budapest",
    "Spa-Francorchamps",
    "Zandvoort",
    "Monza",
    "Singapore",
    "Suzuka",
    "Qatar",
    "Austin",
    "Mexico City",
    "São Paulo",
    "Las Vegas",
    "Abu Dhabi",
];

/// Driver abbreviations of the current grid
pub const DRIVERS: [&str; 20] = [
    "VER", "PER", "LEC", "SAI", "HAM", "RUS", "NOR", "PIA", "ALO", "STR", "OCO", "GAS", "ALB",
    "SAR", "BOT", "ZHO", "TSU", "RIC", "HUL", "MAG",
];

/// Calendar tracks followed by any stored track not on the calendar
pub fn known_tracks(history_tracks: &[String]) -> Vec<String> {
    merge(&TRACKS, history_tracks)
}

/// Grid drivers followed by any stored driver not on the grid
pub fn known_drivers(history_drivers: &[String]) -> Vec<String> {
    merge(&DRIVERS, history_drivers)
}

fn merge(fixed: &[&str], extra: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = fixed.iter().map(|s| s.to_string()).collect();
    for name in extra {
        if !merged.contains(name) {
            merged.push(name.clone());
        }
    }
    merged
}
