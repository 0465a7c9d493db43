// Immutable run configuration.
// Built once at startup from defaults plus command-line flags, then handed by
// reference to every loader. Nothing reads configuration after construction.

use std::path::PathBuf;

use super::error::ConfigError;
use super::walker::BoundaryPolicy;

// ============================================================================
// DEFAULTS
// ============================================================================

pub const DEFAULT_HEIGHTMAP: &str = "data/heightmap.png";
pub const DEFAULT_PATH_FILE: &str = "data/path.txt";

pub const DEFAULT_HEIGHT_SCALE: f32 = 50.0;
pub const DEFAULT_HORIZONTAL_SCALE: f32 = 1.0;
pub const DEFAULT_TEXTURE_REPEAT: f32 = 10.0;

/// Hiker speed in world units per second.
pub const DEFAULT_HIKER_SPEED: f32 = 10.0;
/// Hiker height above the terrain surface.
pub const DEFAULT_HIKER_OFFSET: f32 = 0.5;

pub const DEFAULT_CHARACTER_SPEED: f32 = 5.0;
pub const DEFAULT_CHARACTER_OFFSET: f32 = 2.0;

// ============================================================================
// CONFIG STRUCTS
// ============================================================================

/// Scales applied when turning a heightfield into a mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerrainConfig {
    /// World height of a full-intensity (255) sample.
    pub height_scale: f32,
    /// World units between adjacent grid vertices.
    pub horizontal_scale: f32,
    /// How many times the ground texture tiles across the whole grid.
    pub texture_repeat: f32,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            height_scale: DEFAULT_HEIGHT_SCALE,
            horizontal_scale: DEFAULT_HORIZONTAL_SCALE,
            texture_repeat: DEFAULT_TEXTURE_REPEAT,
        }
    }
}

/// How raw waypoints are mapped onto the terrain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathConfig {
    /// Multiplier applied to the file's x and z before clamping.
    pub horizontal_scale: f32,
    /// Height of every waypoint above the terrain surface.
    pub offset: f32,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            horizontal_scale: DEFAULT_HORIZONTAL_SCALE,
            offset: DEFAULT_HIKER_OFFSET,
        }
    }
}

/// Per-agent traversal settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkerConfig {
    pub speed: f32,
    pub offset: f32,
    pub policy: BoundaryPolicy,
}

impl WalkerConfig {
    pub fn hiker() -> Self {
        Self {
            speed: DEFAULT_HIKER_SPEED,
            offset: DEFAULT_HIKER_OFFSET,
            policy: BoundaryPolicy::Bounce,
        }
    }

    pub fn character() -> Self {
        Self {
            speed: DEFAULT_CHARACTER_SPEED,
            offset: DEFAULT_CHARACTER_OFFSET,
            policy: BoundaryPolicy::Loop,
        }
    }
}

/// Everything the simulation needs to start.
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    pub heightmap: PathBuf,
    pub path_file: PathBuf,
    pub terrain: TerrainConfig,
    pub hiker: WalkerConfig,
    pub character: WalkerConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            heightmap: PathBuf::from(DEFAULT_HEIGHTMAP),
            path_file: PathBuf::from(DEFAULT_PATH_FILE),
            terrain: TerrainConfig::default(),
            hiker: WalkerConfig::hiker(),
            character: WalkerConfig::character(),
        }
    }
}

impl SimConfig {
    /// Parse `--flag value` pairs (program name already stripped).
    ///
    /// Unknown flags and malformed numbers are errors; nothing is silently
    /// ignored because a bad scale would produce plausible but wrong geometry.
    pub fn from_args<I>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = Self::default();
        let mut args = args.into_iter();

        while let Some(flag) = args.next() {
            match flag.as_str() {
                "--heightmap" => config.heightmap = PathBuf::from(next_value(&mut args, &flag)?),
                "--path" => config.path_file = PathBuf::from(next_value(&mut args, &flag)?),
                "--height-scale" => {
                    config.terrain.height_scale = parse_positive(&flag, next_value(&mut args, &flag)?)?
                }
                "--horizontal-scale" => {
                    config.terrain.horizontal_scale =
                        parse_positive(&flag, next_value(&mut args, &flag)?)?
                }
                "--texture-repeat" => {
                    config.terrain.texture_repeat =
                        parse_positive(&flag, next_value(&mut args, &flag)?)?
                }
                "--speed" => config.hiker.speed = parse_positive(&flag, next_value(&mut args, &flag)?)?,
                "--character-speed" => {
                    config.character.speed = parse_positive(&flag, next_value(&mut args, &flag)?)?
                }
                "--offset" => config.hiker.offset = parse_number(&flag, next_value(&mut args, &flag)?)?,
                "--policy" => config.hiker.policy = parse_policy(&next_value(&mut args, &flag)?)?,
                _ => return Err(ConfigError::UnknownFlag(flag.clone())),
            }
        }

        Ok(config)
    }

    /// Waypoint mapping derived from the terrain scale and the hiker offset.
    pub fn path_config(&self) -> PathConfig {
        PathConfig {
            horizontal_scale: self.terrain.horizontal_scale,
            offset: self.hiker.offset,
        }
    }
}

fn next_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String, ConfigError> {
    args.next().ok_or_else(|| ConfigError::MissingValue(flag.to_string()))
}

fn parse_number(flag: &str, value: String) -> Result<f32, ConfigError> {
    value.parse::<f32>().map_err(|_| ConfigError::InvalidNumber {
        flag: flag.to_string(),
        value,
    })
}

fn parse_positive(flag: &str, value: String) -> Result<f32, ConfigError> {
    let v = parse_number(flag, value)?;
    if v > 0.0 && v.is_finite() {
        Ok(v)
    } else {
        Err(ConfigError::NotPositive { flag: flag.to_string(), value: v })
    }
}

fn parse_policy(value: &str) -> Result<BoundaryPolicy, ConfigError> {
    match value {
        "bounce" => Ok(BoundaryPolicy::Bounce),
        "loop" => Ok(BoundaryPolicy::Loop),
        other => Err(ConfigError::UnknownPolicy(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn no_flags_gives_defaults() {
        let config = SimConfig::from_args(Vec::new()).unwrap();
        assert_eq!(config, SimConfig::default());
        assert_eq!(config.hiker.policy, BoundaryPolicy::Bounce);
        assert_eq!(config.character.policy, BoundaryPolicy::Loop);
    }

    #[test]
    fn flags_override_defaults() {
        let config = SimConfig::from_args(args(&[
            "--heightmap", "hills.png",
            "--path", "run.txt",
            "--height-scale", "20",
            "--horizontal-scale", "2.5",
            "--speed", "3",
            "--offset", "1.0",
            "--policy", "loop",
        ]))
        .unwrap();

        assert_eq!(config.heightmap, PathBuf::from("hills.png"));
        assert_eq!(config.path_file, PathBuf::from("run.txt"));
        assert_eq!(config.terrain.height_scale, 20.0);
        assert_eq!(config.terrain.horizontal_scale, 2.5);
        assert_eq!(config.hiker.speed, 3.0);
        assert_eq!(config.hiker.policy, BoundaryPolicy::Loop);

        let path = config.path_config();
        assert_eq!(path.horizontal_scale, 2.5);
        assert_eq!(path.offset, 1.0);
    }

    #[test]
    fn bad_input_is_rejected() {
        assert_eq!(
            SimConfig::from_args(args(&["--speed"])),
            Err(ConfigError::MissingValue("--speed".into()))
        );
        assert!(matches!(
            SimConfig::from_args(args(&["--height-scale", "tall"])),
            Err(ConfigError::InvalidNumber { .. })
        ));
        assert!(matches!(
            SimConfig::from_args(args(&["--horizontal-scale", "0"])),
            Err(ConfigError::NotPositive { .. })
        ));
        assert_eq!(
            SimConfig::from_args(args(&["--policy", "pingpong"])),
            Err(ConfigError::UnknownPolicy("pingpong".into()))
        );
        assert_eq!(
            SimConfig::from_args(args(&["--fast"])),
            Err(ConfigError::UnknownFlag("--fast".into()))
        );
    }
}
