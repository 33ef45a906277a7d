//! Placeholder records shown when nothing is registered and nothing was found.

use std::path::PathBuf;

use chrono::{Duration, Utc};

use crate::models::{GameDetails, GameRecord, LaunchTarget, LauncherKind};

/// (launcher, install location, days since last played, minutes played)
const SAMPLES: [(LauncherKind, &str, i64, u64); 4] = [
    (
        LauncherKind::Steam,
        r"C:\Program Files (x86)\Steam\steamapps\common\SampleGame",
        2,
        120,
    ),
    (LauncherKind::Xbox, r"C:\XboxGames\SampleXboxGame", 5, 60),
    (
        LauncherKind::Epic,
        r"C:\Program Files\Epic Games\SampleEpicGame",
        10,
        30,
    ),
    (LauncherKind::Other, r"C:\Games\SampleOtherGame", 15, 45),
];

/// One sample record per launcher, with ids `"1"` through `"4"`.
pub fn sample_records() -> Vec<GameRecord> {
    let now = Utc::now();
    SAMPLES
        .iter()
        .zip(1..)
        .map(|(&(launcher, location, days_ago, minutes), id)| {
            let install_location = PathBuf::from(location);
            GameRecord {
                id: id.to_string(),
                title: format!("Sample {launcher} Game"),
                launcher,
                launch_target: LaunchTarget::Executable(install_location.clone()),
                install_location,
                executable_path: None,
                app_id: None,
                last_played: now - Duration::days(days_ago),
                play_time_minutes: minutes,
                screenshots: Vec::new(),
                header_image: None,
                details: GameDetails::default(),
                is_sample: true,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_flagged_sample_per_launcher() {
        let samples = sample_records();
        assert_eq!(samples.len(), 4);
        for (record, launcher) in samples.iter().zip(LauncherKind::ALL) {
            assert_eq!(record.launcher, launcher);
            assert!(record.is_sample);
            assert!(!record.is_enrichable());
        }
        let ids: Vec<_> = samples.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4"]);
        assert_eq!(samples[0].title, "Sample Steam Game");
        assert_eq!(samples[3].play_time_minutes, 45);
        assert!(samples[0].last_played > samples[1].last_played);
    }
}
