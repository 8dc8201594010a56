//! Device capability profiles.
//!
//! Capability flags normally come from the settings layer of the player; on
//! the command line they are loaded from a small YAML profile and refined by
//! individual flags.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use iecburst::engine::{DeviceCaps, DtsLevel};

/// On-disk capability profile. Missing keys fall back to enabled, matching
/// a full HDMI receiver.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CapsProfile {
    #[serde(default = "enabled")]
    pub ac3: bool,
    #[serde(default = "enabled")]
    pub eac3: bool,
    #[serde(default = "enabled")]
    pub aac: bool,
    #[serde(default = "enabled")]
    pub mp1: bool,
    #[serde(default = "enabled")]
    pub mp2: bool,
    #[serde(default = "enabled")]
    pub mp3: bool,
    #[serde(default = "enabled")]
    pub truehd: bool,
    #[serde(default = "enabled")]
    pub mlp: bool,
    #[serde(default = "default_dts_level")]
    pub dts_level: Option<DtsLevelName>,
    #[serde(default = "enabled")]
    pub dts_core_fallback: bool,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DtsLevelName {
    Core,
    Es,
    #[serde(rename = "96-24")]
    Hd9624,
    HdHra,
    HdMa,
}

fn enabled() -> bool {
    true
}

fn default_dts_level() -> Option<DtsLevelName> {
    Some(DtsLevelName::HdMa)
}

impl From<DtsLevelName> for DtsLevel {
    fn from(name: DtsLevelName) -> Self {
        match name {
            DtsLevelName::Core => DtsLevel::Core,
            DtsLevelName::Es => DtsLevel::Es,
            DtsLevelName::Hd9624 => DtsLevel::Hd9624,
            DtsLevelName::HdHra => DtsLevel::HdHra,
            DtsLevelName::HdMa => DtsLevel::HdMa,
        }
    }
}

impl From<CapsProfile> for DeviceCaps {
    fn from(profile: CapsProfile) -> Self {
        DeviceCaps {
            ac3: profile.ac3,
            eac3: profile.eac3,
            aac: profile.aac,
            mp1: profile.mp1,
            mp2: profile.mp2,
            mp3: profile.mp3,
            truehd: profile.truehd,
            mlp: profile.mlp,
            dts_level: profile.dts_level.map(DtsLevel::from),
            dts_core_fallback: profile.dts_core_fallback,
        }
    }
}

pub fn load_caps(path: &Path) -> Result<DeviceCaps> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading capability profile {}", path.display()))?;
    let profile: CapsProfile = serde_yaml_ng::from_str(&text)
        .with_context(|| format!("parsing capability profile {}", path.display()))?;
    Ok(profile.into())
}
