use directories::UserDirs;
use log::{info, warn};
use serde::Deserialize;
use std::{
    env, fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::error::{SwipeError, SwipeResult};
use crate::input;
use crate::player;
use crate::race::RaceTiming;
use crate::types::RaceConfig;

/// Overrides the home-relative layout (config and data under one root).
pub const HOME_ENV: &str = "SWIPERACE_HOME";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Meta {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerDefaults {
    pub handle: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub meta: Meta,
    #[serde(default)]
    pub timing: RaceTiming,
    #[serde(default)]
    pub race: RaceConfig,
    #[serde(default)]
    pub player: PlayerDefaults,
}

impl Profile {
    pub fn parse(txt: &str) -> SwipeResult<Self> {
        let profile: Profile = toml::from_str(txt)?;
        validate_profile(&profile)?;
        Ok(profile)
    }

    /// Handle to race under when none is given: the profile's, else the login name.
    pub fn default_handle(&self) -> Option<String> {
        let raw = self
            .player
            .handle
            .clone()
            .unwrap_or_else(whoami::username);
        player::normalize_handle(&raw).ok()
    }
}

#[derive(Debug, Clone)]
pub struct Paths {
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
    pub data_dir: PathBuf,
}

impl Paths {
    /// `~/.config/swiperace` and `~/.local/share/swiperace`, unless `SWIPERACE_HOME` is set.
    pub fn discover() -> SwipeResult<Self> {
        if let Ok(root) = env::var(HOME_ENV) {
            return Ok(Self::under(root));
        }
        let home = UserDirs::new()
            .ok_or_else(|| SwipeError::Config("cannot determine home directory".into()))?
            .home_dir()
            .to_path_buf();
        let config_dir = home.join(".config").join("swiperace");
        Ok(Self {
            profiles_dir: config_dir.join("profiles"),
            active_ptr: config_dir.join("active"),
            config_dir,
            data_dir: home.join(".local").join("share").join("swiperace"),
        })
    }

    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let config_dir = root.join("config");
        Self {
            profiles_dir: config_dir.join("profiles"),
            active_ptr: config_dir.join("active"),
            config_dir,
            data_dir: root.join("data"),
        }
    }
}

fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

#[derive(Debug, Clone)]
pub struct AppConfigState {
    pub active_name: String,
    pub profile: Profile,
    pub paths: Paths,
}

impl AppConfigState {
    pub fn load_or_install_default(paths: Paths) -> SwipeResult<Self> {
        fs::create_dir_all(&paths.profiles_dir)?;
        fs::create_dir_all(&paths.data_dir)?;

        let def_path = paths.profiles_dir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        if !paths.active_ptr.exists() {
            let mut f = fs::File::create(&paths.active_ptr)?;
            f.write_all(b"default")?;
        }

        let mut active_name = fs::read_to_string(&paths.active_ptr)?.trim().to_string();
        if active_name.is_empty() {
            warn!("active profile pointer is empty; using 'default'");
            active_name = "default".to_string();
        }
        let profile = Self::load_profile(&paths, &active_name)?;

        Ok(Self {
            active_name,
            profile,
            paths,
        })
    }

    pub fn set_active(&mut self, name: &str) -> SwipeResult<()> {
        let p = self.paths.profiles_dir.join(format!("{name}.toml"));
        if !p.exists() {
            return Err(SwipeError::Config(format!(
                "profile not found: {}",
                p.display()
            )));
        }
        // parse first so a broken profile never becomes active
        let profile = Self::load_profile(&self.paths, name)?;
        fs::write(&self.paths.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        self.profile = profile;
        Ok(())
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.paths.profiles_dir) {
            for e in rd.flatten() {
                let path = e.path();
                if path.extension().is_some_and(|ext| ext == "toml") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        v.push(stem.to_string());
                    }
                }
            }
        }
        v.sort();
        v
    }

    fn load_profile(paths: &Paths, name: &str) -> SwipeResult<Profile> {
        let path = paths.profiles_dir.join(format!("{name}.toml"));
        let txt = fs::read_to_string(&path).map_err(|e| {
            SwipeError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Profile::parse(&txt)
            .map_err(|e| SwipeError::Config(format!("failed to parse {}: {e}", path.display())))
    }

    pub fn doctor_report(&self) -> serde_json::Value {
        let devices: Vec<String> = input::discover()
            .into_iter()
            .map(|d| format!("{} ({}, {:?})", d.name, d.path, d.source))
            .collect();
        serde_json::json!({
            "active_profile": self.active_name,
            "profiles_dir": self.paths.profiles_dir,
            "data_dir": self.paths.data_dir,
            "default_handle": self.profile.default_handle(),
            "devices": devices,
            "hints": {
                "add_user_to_input_group": "sudo usermod -aG input $USER && newgrp input",
                "replay_instead": "swiperace race --replay <events.jsonl> --fast"
            }
        })
    }
}

fn validate_profile(p: &Profile) -> SwipeResult<()> {
    if p.timing.countdown_from > 10 {
        return Err(SwipeError::Validation(
            "timing.countdown_from must be at most 10".into(),
        ));
    }
    if p.timing.settle_ms > 10_000 {
        return Err(SwipeError::Validation(
            "timing.settle_ms must be at most 10000".into(),
        ));
    }
    p.race.validate()?;
    if let Some(h) = &p.player.handle {
        player::normalize_handle(h)?;
    }
    Ok(())
}
