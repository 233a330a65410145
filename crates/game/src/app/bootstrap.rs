use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use engine::render::TexturePack;
use engine::{
    load_level, resolve_app_paths, AppPaths, GeometryError, LevelError, LoopConfig, SessionSetup,
    SimulationConfig, StartupError,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

const CONFIG_ENV_VAR: &str = "GLOWTILE_CONFIG";
const LEVEL_ENV_VAR: &str = "GLOWTILE_LEVEL";
const CONFIG_FILE_NAME: &str = "glowtile.json";
const DEFAULT_LEVEL_FILE: &str = "default.txt";

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) session: SessionSetup,
}

/// On-disk shape of `config/glowtile.json`. Every section may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct GameConfig {
    pub(crate) window: LoopConfig,
    pub(crate) simulation: SimulationConfig,
}

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("failed to read config '{path}': {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config '{path}' at {field}: {message}")]
    ConfigParse {
        path: PathBuf,
        field: String,
        message: String,
    },
    #[error(transparent)]
    Level(#[from] LevelError),
    #[error("failed to build textures: {0}")]
    Textures(#[from] GeometryError),
}

pub(crate) fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    info!("=== Glowtile Startup ===");

    let paths = resolve_app_paths()?;
    info!(
        root = %paths.root.display(),
        levels = %paths.levels_dir.display(),
        textures = %paths.textures_dir.display(),
        "startup_paths"
    );

    let config = load_game_config(&paths)?;
    let level_path = resolve_level_path(&paths, std::env::var(LEVEL_ENV_VAR).ok().as_deref());
    let level = load_level(&level_path)?;

    let textures = if paths.textures_dir.is_dir() {
        TexturePack::load(&paths.textures_dir)?
    } else {
        info!(dir = %paths.textures_dir.display(), "textures_dir_missing_using_procedural");
        TexturePack::procedural()?
    };

    Ok(AppWiring {
        config: config.window,
        session: SessionSetup {
            level,
            textures: Arc::new(textures),
            config: config.simulation,
        },
    })
}

fn load_game_config(paths: &AppPaths) -> Result<GameConfig, BootstrapError> {
    let explicit = std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from);
    let path = match explicit {
        Some(path) => path,
        None => {
            let default_path = paths.config_dir.join(CONFIG_FILE_NAME);
            if !default_path.is_file() {
                info!(path = %default_path.display(), "config_missing_using_defaults");
                return Ok(GameConfig::default());
            }
            default_path
        }
    };

    let raw = fs::read_to_string(&path).map_err(|source| BootstrapError::ConfigRead {
        path: path.clone(),
        source,
    })?;
    let config = parse_game_config(&path, &raw)?;
    info!(
        path = %path.display(),
        target_fps = config.window.target_fps,
        seed = ?config.simulation.session.seed,
        "config_loaded"
    );
    Ok(config)
}

fn parse_game_config(path: &Path, raw: &str) -> Result<GameConfig, BootstrapError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, GameConfig>(&mut deserializer).map_err(|error| {
        let field = error.path().to_string();
        BootstrapError::ConfigParse {
            path: path.to_path_buf(),
            field: if field.is_empty() { ".".to_string() } else { field },
            message: error.into_inner().to_string(),
        }
    })
}

/// Relative level names resolve under `assets/levels/`; absolute paths are used as given.
fn resolve_level_path(paths: &AppPaths, requested: Option<&str>) -> PathBuf {
    let name = requested
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_LEVEL_FILE);
    let candidate = Path::new(name);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        paths.levels_dir.join(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> AppPaths {
        let root = PathBuf::from("/games/glowtile");
        AppPaths {
            assets_dir: root.join("assets"),
            levels_dir: root.join("assets").join("levels"),
            textures_dir: root.join("assets").join("textures"),
            config_dir: root.join("config"),
            root,
        }
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = parse_game_config(Path::new("glowtile.json"), "{}").expect("parse");
        assert_eq!(config, GameConfig::default());
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let raw = r#"{ "window": { "target_fps": 30 }, "simulation": { "session": { "seed": 7 } } }"#;
        let config = parse_game_config(Path::new("glowtile.json"), raw).expect("parse");
        assert_eq!(config.window.target_fps, 30);
        assert_eq!(config.window.window_width, LoopConfig::default().window_width);
        assert_eq!(config.simulation.session.seed, Some(7));
        assert_eq!(
            config.simulation.physics,
            SimulationConfig::default().physics
        );
    }

    #[test]
    fn bad_field_reports_json_path() {
        let raw = r#"{ "simulation": { "physics": { "gravity": "down" } } }"#;
        let err = parse_game_config(Path::new("glowtile.json"), raw).expect_err("should fail");
        match err {
            BootstrapError::ConfigParse { field, .. } => {
                assert_eq!(field, "simulation.physics.gravity");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_section_is_rejected() {
        let err = parse_game_config(Path::new("glowtile.json"), r#"{ "audio": {} }"#)
            .expect_err("should fail");
        assert!(matches!(err, BootstrapError::ConfigParse { .. }));
    }

    #[test]
    fn level_path_defaults_and_resolves_relative_names() {
        let paths = paths();
        assert_eq!(
            resolve_level_path(&paths, None),
            paths.levels_dir.join("default.txt")
        );
        assert_eq!(
            resolve_level_path(&paths, Some("  ")),
            paths.levels_dir.join("default.txt")
        );
        assert_eq!(
            resolve_level_path(&paths, Some("cave.txt")),
            paths.levels_dir.join("cave.txt")
        );
    }

    #[test]
    fn absolute_level_path_is_used_as_given() {
        let absolute = std::env::temp_dir().join("custom_level.txt");
        let requested = absolute.to_string_lossy().into_owned();
        assert_eq!(resolve_level_path(&paths(), Some(&requested)), absolute);
    }
}
