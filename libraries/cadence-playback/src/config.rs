/// Playback configuration
use crate::error::{PlaybackError, Result};
use crate::types::RepeatMode;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "cadence.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaybackConfig {
    /// Listener the controller acts for
    #[serde(default = "default_user_id")]
    pub user_id: String,

    /// Pause after teardown so the device releases fully
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Progress notification cadence
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,

    /// Bound on the render thread's wait for the resume signal
    #[serde(default = "default_resume_wait_timeout_ms")]
    pub resume_wait_timeout_ms: u64,

    /// Bound on joining the progress thread during teardown
    #[serde(default = "default_progress_join_timeout_ms")]
    pub progress_join_timeout_ms: u64,

    /// Delay before re-applying gain once audio started
    #[serde(default = "default_gain_reapply_delay_ms")]
    pub gain_reapply_delay_ms: u64,

    /// Fraction of the frame count a stop must reach to count as a natural end
    #[serde(default = "default_natural_end_ratio")]
    pub natural_end_ratio: f64,

    /// Step used by "replay five seconds"
    #[serde(default = "default_replay_step_ms")]
    pub replay_step_ms: u64,

    #[serde(default)]
    pub initial_gain_db: f32,

    #[serde(default)]
    pub initial_repeat: RepeatMode,

    #[serde(default)]
    pub ads: AdSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdSettings {
    /// Songs a user hears between two ads
    #[serde(default = "default_songs_between_ads")]
    pub songs_between_ads: u32,
}

impl Default for AdSettings {
    fn default() -> Self {
        Self {
            songs_between_ads: default_songs_between_ads(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
            settle_delay_ms: default_settle_delay_ms(),
            progress_interval_ms: default_progress_interval_ms(),
            resume_wait_timeout_ms: default_resume_wait_timeout_ms(),
            progress_join_timeout_ms: default_progress_join_timeout_ms(),
            gain_reapply_delay_ms: default_gain_reapply_delay_ms(),
            natural_end_ratio: default_natural_end_ratio(),
            replay_step_ms: default_replay_step_ms(),
            initial_gain_db: 0.0,
            initial_repeat: RepeatMode::NoRepeat,
            ads: AdSettings::default(),
        }
    }
}

impl PlaybackConfig {
    /// Load configuration from an optional file and the environment
    ///
    /// Without an explicit path, `cadence.toml` in the working directory is
    /// used when present. Environment variables prefixed with `CADENCE_`
    /// override file values; nested keys use `__`
    /// (`CADENCE_ADS__SONGS_BETWEEN_ADS=5`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::from(path));
            }
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("CADENCE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = settings.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(PlaybackError::Config("user_id must not be empty".to_string()));
        }

        if !(0.0..=1.0).contains(&self.natural_end_ratio) {
            return Err(PlaybackError::Config(format!(
                "natural_end_ratio must be within 0..=1, got {}",
                self.natural_end_ratio
            )));
        }

        if self.progress_interval_ms == 0 {
            return Err(PlaybackError::Config(
                "progress_interval_ms must be positive".to_string(),
            ));
        }

        if self.ads.songs_between_ads == 0 {
            return Err(PlaybackError::Config(
                "ads.songs_between_ads must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn resume_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.resume_wait_timeout_ms)
    }

    pub fn progress_join_timeout(&self) -> Duration {
        Duration::from_millis(self.progress_join_timeout_ms)
    }

    pub fn gain_reapply_delay(&self) -> Duration {
        Duration::from_millis(self.gain_reapply_delay_ms)
    }
}

// Default values
fn default_user_id() -> String {
    "local".to_string()
}

fn default_settle_delay_ms() -> u64 {
    100
}

fn default_progress_interval_ms() -> u64 {
    50
}

fn default_resume_wait_timeout_ms() -> u64 {
    1_000
}

fn default_progress_join_timeout_ms() -> u64 {
    500
}

fn default_gain_reapply_delay_ms() -> u64 {
    50
}

fn default_natural_end_ratio() -> f64 {
    0.95
}

fn default_replay_step_ms() -> u64 {
    5_000
}

fn default_songs_between_ads() -> u32 {
    3
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config() {
        let config = PlaybackConfig::default();
        assert_eq!(config.settle_delay_ms, 100);
        assert_eq!(config.progress_interval_ms, 50);
        assert_eq!(config.natural_end_ratio, 0.95);
        assert_eq!(config.replay_step_ms, 5_000);
        assert_eq!(config.initial_repeat, RepeatMode::NoRepeat);
        assert_eq!(config.ads.songs_between_ads, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_from_file_fills_missing_keys_with_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "user_id = \"alice\"\nsettle_delay_ms = 0\ninitial_repeat = \"repeat_all\"\n\n[ads]\nsongs_between_ads = 7"
        )
        .unwrap();

        let config = PlaybackConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.user_id, "alice");
        assert_eq!(config.settle_delay_ms, 0);
        assert_eq!(config.initial_repeat, RepeatMode::RepeatAll);
        assert_eq!(config.ads.songs_between_ads, 7);
        assert_eq!(config.progress_interval_ms, 50);
    }

    #[test]
    fn validate_rejects_bad_ratio() {
        let config = PlaybackConfig {
            natural_end_ratio: 1.5,
            ..PlaybackConfig::default()
        };
        assert!(matches!(config.validate(), Err(PlaybackError::Config(_))));
    }

    #[test]
    fn validate_rejects_zero_ad_interval() {
        let mut config = PlaybackConfig::default();
        config.ads.songs_between_ads = 0;
        assert!(config.validate().is_err());
    }
}
