use anyhow::{Context, Result, anyhow};
use directories::UserDirs;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::view::{Layout, ViewProps};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meta {
    pub name: Option<String>,
}

/// Timing and movement thresholds for the gesture responder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Longest press (and longest gap between taps) still counted as a tap.
    pub tap_ms: u64,
    /// Movement on either axis at which a tap candidate fails.
    pub tap_move_tol: f64,
    /// Single-finger movement before a move counts as effective.
    pub move_threshold: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            tap_ms: 200,
            tap_move_tol: 10.0,
            move_threshold: 2.0,
        }
    }
}

/// Which responder negotiation phases this surface wants to claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimPolicy {
    pub start_capture: bool,
    pub start: bool,
    pub move_capture: bool,
    #[serde(rename = "move")]
    pub on_move: bool,
}

impl Default for ClaimPolicy {
    fn default() -> Self {
        Self {
            start_capture: false,
            start: true,
            move_capture: true,
            on_move: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponderConfig {
    #[serde(skip)]
    pub thresholds: Thresholds,
    pub claim: ClaimPolicy,
    pub block_native_responder: bool,
    pub allow_termination: bool,
    /// Log every lifecycle transition at debug level.
    pub debug: bool,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            claim: ClaimPolicy::default(),
            block_native_responder: true,
            allow_termination: true,
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub meta: Meta,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub responder: ResponderConfig,
    #[serde(default)]
    pub view: ViewProps,
    #[serde(default)]
    pub viewport: Layout,
}

impl Profile {
    pub fn from_toml(txt: &str) -> Result<Self> {
        let mut profile: Profile = toml::from_str(txt)?;
        profile.responder.thresholds = profile.thresholds.clone();
        validate_profile(&profile)?;
        Ok(profile)
    }

    pub fn load_path(path: &Path) -> Result<Self> {
        let txt = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&txt).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn builtin_default() -> Result<Self> {
        Self::from_toml(default_profile_text())
    }
}

/// Profiles directory plus the `active` pointer naming the one in use.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    pub active_name: String,
    pub profile: Profile,
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
}

fn config_dir() -> Result<PathBuf> {
    let dirs = UserDirs::new().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(dirs.home_dir().join(".config").join("touchzoom"))
}

fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl ConfigStore {
    pub fn load_or_install_default() -> Result<Self> {
        Self::open_at(config_dir()?)
    }

    pub fn open_at(cfgdir: PathBuf) -> Result<Self> {
        let profdir = cfgdir.join("profiles");
        fs::create_dir_all(&profdir)
            .with_context(|| format!("failed to create {}", profdir.display()))?;

        let def_path = profdir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = cfgdir.join("active");
        if !active_ptr.exists() {
            fs::write(&active_ptr, b"default")?;
        }

        let active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = Profile::load_path(&profdir.join(format!("{active_name}.toml")))?;

        Ok(Self {
            active_name,
            profile,
            config_dir: cfgdir,
            profiles_dir: profdir,
            active_ptr,
        })
    }

    pub fn reload(&mut self) -> Result<()> {
        self.profile = self.load_profile(&self.active_name)?;
        Ok(())
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let p = self.profile_path(name);
        if !p.exists() {
            return Err(anyhow!("profile not found: {}", p.display()));
        }
        let profile = self.load_profile(name)?;
        fs::write(&self.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        self.profile = profile;
        Ok(())
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
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

    pub fn load_profile(&self, name: &str) -> Result<Profile> {
        Profile::load_path(&self.profile_path(name))
    }

    fn profile_path(&self, name: &str) -> PathBuf {
        self.profiles_dir.join(format!("{name}.toml"))
    }
}

fn validate_profile(p: &Profile) -> Result<()> {
    let th = &p.thresholds;
    if th.tap_ms == 0 {
        return Err(anyhow!("thresholds.tap_ms must be a positive duration"));
    }
    for (name, v) in [
        ("thresholds.tap_move_tol", th.tap_move_tol),
        ("thresholds.move_threshold", th.move_threshold),
        ("view.max_over_scroll_distance", p.view.max_over_scroll_distance),
    ] {
        if !v.is_finite() || v < 0.0 {
            return Err(anyhow!("{name} must be a finite, non-negative number"));
        }
    }
    if !p.view.max_scale.is_finite() || p.view.max_scale < 1.0 {
        return Err(anyhow!("view.max_scale must be >= 1"));
    }
    if let Some(ar) = p.view.content_aspect_ratio {
        if !ar.is_finite() || ar <= 0.0 {
            return Err(anyhow!("view.content_aspect_ratio must be positive"));
        }
    }
    let vp = &p.viewport;
    if !(vp.width > 0.0 && vp.height > 0.0) {
        return Err(anyhow!("viewport width and height must be positive"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn builtin_default_parses() {
        let p = Profile::builtin_default().unwrap();
        assert_eq!(p.thresholds.tap_ms, 200);
        assert_eq!(p.responder.thresholds.move_threshold, 2.0);
        assert!(p.responder.claim.start);
        assert!(p.view.enable_scale);
        assert!(!p.view.release_handled_by_host);
    }

    #[test]
    fn missing_sections_take_defaults() {
        let p = Profile::from_toml(
            r#"
            [meta]
            name = "bare"
            [viewport]
            width = 320.0
            height = 480.0
            "#,
        )
        .unwrap();
        assert_eq!(p.thresholds.tap_move_tol, 10.0);
        assert_eq!(p.view.max_scale, 1.0);
        assert!(p.responder.allow_termination);
    }

    #[test]
    fn rejects_bad_values() {
        let zero_tap = "[meta]\n[thresholds]\ntap_ms = 0\n[viewport]\nwidth = 1.0\nheight = 1.0\n";
        assert!(Profile::from_toml(zero_tap).is_err());

        let small_max = "[meta]\n[view]\nmax_scale = 0.5\n[viewport]\nwidth = 1.0\nheight = 1.0\n";
        assert!(Profile::from_toml(small_max).is_err());

        let no_viewport = "[meta]\n";
        assert!(Profile::from_toml(no_viewport).is_err());

        let bad_aspect =
            "[meta]\n[view]\ncontent_aspect_ratio = -1.0\n[viewport]\nwidth = 1.0\nheight = 1.0\n";
        assert!(Profile::from_toml(bad_aspect).is_err());
    }

    #[test]
    fn store_installs_lists_and_switches() {
        let tmp = TempDir::new().unwrap();
        let mut store = ConfigStore::open_at(tmp.path().to_path_buf()).unwrap();
        assert_eq!(store.active_name, "default");
        assert!(store.profiles_dir.join("default.toml").exists());

        fs::write(
            store.profiles_dir.join("zoomy.toml"),
            "[meta]\nname = \"zoomy\"\n[view]\nmax_scale = 4.0\n\
             [viewport]\nwidth = 100.0\nheight = 100.0\n",
        )
        .unwrap();
        assert_eq!(store.list_profiles(), vec!["default", "zoomy"]);

        store.set_active("zoomy").unwrap();
        assert_eq!(store.profile.view.max_scale, 4.0);
        assert_eq!(fs::read_to_string(&store.active_ptr).unwrap(), "zoomy");

        assert!(store.set_active("missing").is_err());
        assert_eq!(store.active_name, "zoomy");

        let reopened = ConfigStore::open_at(tmp.path().to_path_buf()).unwrap();
        assert_eq!(reopened.active_name, "zoomy");
    }
}
