// RvDiff - RISC-V Core Differential Testing
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{default_schema_version, parse_size};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_prefix() -> String {
    "riscv64-unknown-elf-".to_string()
}

fn default_linker_script() -> PathBuf {
    PathBuf::from("linker.ld")
}

fn default_spike() -> String {
    "spike".to_string()
}

fn default_rocket() -> String {
    "emulators/rocket_emulator".to_string()
}

fn default_max_log_size() -> String {
    "64MB".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ToolchainConfig {
    /// Prefix of the GNU binutils, e.g. `riscv64-unknown-elf-`.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_linker_script")]
    pub linker_script: PathBuf,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            linker_script: default_linker_script(),
        }
    }
}

impl ToolchainConfig {
    pub fn tool(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SpikeSettings {
    #[serde(default = "default_spike")]
    pub path: String,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for SpikeSettings {
    fn default() -> Self {
        Self {
            path: default_spike(),
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RocketSettings {
    #[serde(default = "default_rocket")]
    pub path: String,
    #[serde(default)]
    pub max_cycles: Option<u64>,
    #[serde(default = "default_true")]
    pub cycle_count: bool,
    #[serde(default)]
    pub verbose: bool,
}

impl Default for RocketSettings {
    fn default() -> Self {
        Self {
            path: default_rocket(),
            max_cycles: None,
            cycle_count: true,
            verbose: false,
        }
    }
}

/// Tool locations and limits used when building and running tests.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RunConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default)]
    pub toolchain: ToolchainConfig,
    #[serde(default)]
    pub spike: SpikeSettings,
    #[serde(default)]
    pub rocket: RocketSettings,
    /// Cap on each emulator log, e.g. "64MB".
    #[serde(default = "default_max_log_size")]
    pub max_log_size: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            toolchain: ToolchainConfig::default(),
            spike: SpikeSettings::default(),
            rocket: RocketSettings::default(),
            max_log_size: default_max_log_size(),
        }
    }
}

impl RunConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(path.as_ref())
            .with_context(|| format!("Failed to open run config {}", path.as_ref().display()))?;
        let config: RunConfig =
            serde_yaml::from_reader(f).context("Failed to parse run config YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != "1.0" {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '1.0'",
                self.schema_version
            );
        }
        if self.spike.path.trim().is_empty() {
            anyhow::bail!("'spike.path' cannot be empty");
        }
        if self.rocket.path.trim().is_empty() {
            anyhow::bail!("'rocket.path' cannot be empty");
        }
        if self.rocket.max_cycles == Some(0) {
            anyhow::bail!("'rocket.max_cycles' must be greater than zero");
        }
        if self.max_log_bytes()? == 0 {
            anyhow::bail!("'max_log_size' must be greater than zero");
        }
        Ok(())
    }

    pub fn max_log_bytes(&self) -> Result<u64> {
        parse_size(&self.max_log_size)
            .with_context(|| format!("Invalid max_log_size '{}'", self.max_log_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = RunConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.toolchain.tool("as"), "riscv64-unknown-elf-as");
        assert_eq!(cfg.max_log_bytes().unwrap(), 64_000_000);
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r#"
schema_version: "1.0"
rocket:
  path: "/opt/rocket/emulator"
  max_cycles: 5000000
max_log_size: "1MiB"
"#;
        let cfg: RunConfig = serde_yaml::from_str(yaml).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.rocket.path, "/opt/rocket/emulator");
        assert_eq!(cfg.rocket.max_cycles, Some(5_000_000));
        assert!(cfg.rocket.cycle_count);
        assert_eq!(cfg.spike.path, "spike");
        assert_eq!(cfg.max_log_bytes().unwrap(), 1024 * 1024);
    }

    #[test]
    fn test_zero_cycles_rejected() {
        let yaml = r#"
rocket:
  max_cycles: 0
"#;
        let cfg: RunConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_bad_size_rejected() {
        let cfg = RunConfig {
            max_log_size: "lots".to_string(),
            ..RunConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
