use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::audio_system::Clip;
use crate::error::ConfigError;

const APP_DIR: &str = "zone-music";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Initial music volume (0.0-1.0)
    pub volume: f32,

    /// How often shuffling cues check whether their clip has ended, in seconds
    pub shuffle_check_secs: f32,

    /// Tick length assumed before the first advance, in seconds
    pub tick_secs: f32,

    /// Transition used by cue definitions that ask for a fade without a length
    pub default_transition_secs: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            volume: 0.5,
            shuffle_check_secs: 2.5,
            tick_secs: 1.0 / 60.0,
            default_transition_secs: 0.5,
        }
    }
}

impl PlayerConfig {
    /// Load configuration from `path`.
    /// Writes and returns defaults if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            tracing::info!("Created default config at {}", path.display());
            return Ok(config);
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        let config: PlayerConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })?;
        config.validate()?;

        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save configuration to disk
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ConfigError::DirectoryCreationFailed {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        fs::write(path, json).map_err(|e| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })
    }

    /// Platform config file location, falling back to the working directory
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from("config"))
            .join("config.json")
    }

    /// Reject values the player cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("volume", self.volume),
            ("shuffle_check_secs", self.shuffle_check_secs),
            ("tick_secs", self.tick_secs),
            ("default_transition_secs", self.default_transition_secs),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if self.shuffle_check_secs == 0.0 || self.tick_secs == 0.0 {
            return Err(ConfigError::Invalid(
                "shuffle_check_secs and tick_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// How a cue plays its clips
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CueDefinition {
    pub name: String,

    /// Higher values win
    pub importance: u8,

    /// One clip plays (or loops); several clips shuffle
    pub clips: Vec<Clip>,

    #[serde(default)]
    pub looping: bool,

    /// Fade with the configured default length when `transition_secs` is absent
    #[serde(default)]
    pub fade: bool,

    /// Fade length; absent (and no `fade`) means instant switches
    #[serde(default)]
    pub transition_secs: Option<f32>,
}

/// What happens at a point on the demo timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TimelineAction {
    /// The listener entered the cue's zone
    Enter { cue: String },
    /// The listener left the cue's zone
    Exit { cue: String },
    /// The user changed the music volume
    Volume { volume: f32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub at_secs: f32,
    #[serde(flatten)]
    pub action: TimelineAction,
}

/// Cue definitions plus a scripted timeline of zone enters and exits
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CueSheet {
    pub cues: Vec<CueDefinition>,
    #[serde(default)]
    pub timeline: Vec<TimelineEvent>,
}

impl CueSheet {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        let mut sheet: CueSheet =
            serde_json::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })?;
        sheet.validate()?;
        sheet
            .timeline
            .sort_by(|a, b| a.at_secs.total_cmp(&b.at_secs));
        Ok(sheet)
    }

    pub fn cue(&self, name: &str) -> Option<&CueDefinition> {
        self.cues.iter().find(|c| c.name == name)
    }

    /// Every timeline entry must reference a defined cue
    pub fn validate(&self) -> Result<(), ConfigError> {
        for event in &self.timeline {
            if !event.at_secs.is_finite() || event.at_secs < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "timeline time {} is not a valid offset",
                    event.at_secs
                )));
            }
            match &event.action {
                TimelineAction::Enter { cue } | TimelineAction::Exit { cue } => {
                    if self.cue(cue).is_none() {
                        return Err(ConfigError::Invalid(format!("unknown cue '{cue}'")));
                    }
                }
                TimelineAction::Volume { .. } => {}
            }
        }
        Ok(())
    }

    /// Time of the last timeline event
    pub fn duration_secs(&self) -> f32 {
        self.timeline
            .iter()
            .map(|e| e.at_secs)
            .fold(0.0, f32::max)
    }
}
