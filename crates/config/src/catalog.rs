// RvDiff - RISC-V Core Differential Testing
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Named fragments and profiles, built in or loaded from YAML.

use crate::default_schema_version;
use crate::isa::{Extension, Xlen};
use crate::profile::{
    BusTopology, ComposeError, ConflictPolicy, CoreProfile, Fragment, FragmentDef,
    ProfileComposer,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

pub const MAX_EXTENSION_RV64: &str = "MaxExtensionRV64Config";
pub const MAX_EXTENSION_RV32: &str = "MaxExtensionRV32Config";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDef {
    #[serde(default)]
    pub description: String,
    pub fragments: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default)]
    pub conflict_policy: ConflictPolicy,
    #[serde(default)]
    pub fragments: BTreeMap<String, FragmentDef>,
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileDef>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Catalog {
    /// Fragments and profiles that ship with RvDiff.
    pub fn builtin() -> Self {
        use Extension::*;

        let mut fragments = BTreeMap::new();
        let mut frag = |name: &str, description: &str, steps: Vec<Fragment>| {
            fragments.insert(name.to_string(), FragmentDef::new(description, steps));
        };

        frag(
            "BaseConfig",
            "Baseline RV64GC core",
            vec![Fragment::Enable(vec![I, M, A, F, D, C, Zicsr, Zifencei])],
        );
        frag(
            "WithNBigCores1",
            "Single big core",
            vec![Fragment::Cores(1)],
        );
        frag(
            "WithCoherentBusTopology",
            "Coherent system bus",
            vec![Fragment::Bus(BusTopology::Coherent)],
        );
        frag(
            "WithIncoherentBusTopology",
            "Incoherent system bus",
            vec![Fragment::Bus(BusTopology::Incoherent)],
        );
        frag(
            "DefaultConfig",
            "Base core, one big core, coherent bus",
            vec![
                Fragment::Include("BaseConfig".into()),
                Fragment::Include("WithNBigCores1".into()),
                Fragment::Include("WithCoherentBusTopology".into()),
            ],
        );
        frag(
            "WithRV32",
            "32-bit register width",
            vec![Fragment::Width(Xlen::Rv32)],
        );
        frag(
            "WithBitManip",
            "Bit-manipulation extensions",
            vec![Fragment::Enable(vec![Zba, Zbb, Zbc, Zbs])],
        );
        frag(
            "WithFP16",
            "Half-precision floating point",
            vec![Fragment::Enable(vec![Zfh])],
        );
        frag(
            "WithHypervisor",
            "Hypervisor extension with supervisor mode",
            vec![Fragment::Enable(vec![H, S])],
        );

        let mut profiles = BTreeMap::new();
        let mut profile = |name: &str, description: &str, frags: &[&str]| {
            profiles.insert(
                name.to_string(),
                ProfileDef {
                    description: description.to_string(),
                    fragments: frags.iter().map(|s| s.to_string()).collect(),
                },
            );
        };

        profile("DefaultRV64Config", "Default RV64 core", &["DefaultConfig"]);
        profile(
            "DefaultRV32Config",
            "Default RV32 core",
            &["DefaultConfig", "WithRV32"],
        );
        profile(
            MAX_EXTENSION_RV64,
            "RV64 core with hypervisor, FP16 and bit-manipulation",
            &["DefaultConfig", "WithHypervisor", "WithFP16", "WithBitManip"],
        );
        profile(
            MAX_EXTENSION_RV32,
            "RV32 core with hypervisor, FP16 and bit-manipulation",
            &[
                "DefaultConfig",
                "WithHypervisor",
                "WithFP16",
                "WithBitManip",
                "WithRV32",
            ],
        );

        Self {
            schema_version: default_schema_version(),
            conflict_policy: ConflictPolicy::LastWins,
            fragments,
            profiles,
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Invalid catalog {}", path.display()))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let catalog: Catalog =
            serde_yaml::from_str(yaml).context("Failed to parse catalog YAML")?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Built-in catalog extended by the manifest at `path`.
    pub fn load_with_builtins<P: AsRef<Path>>(path: P) -> Result<Self> {
        let user = Self::from_file(path)?;
        let mut catalog = Self::builtin();
        catalog.merge(user);
        Ok(catalog)
    }

    /// Entries of `other` replace same-named entries of `self`.
    pub fn merge(&mut self, other: Catalog) {
        for (name, def) in other.fragments {
            if self.fragments.insert(name.clone(), def).is_some() {
                info!("Catalog overrides fragment {}", name);
            }
        }
        for (name, def) in other.profiles {
            if self.profiles.insert(name.clone(), def).is_some() {
                info!("Catalog overrides profile {}", name);
            }
        }
        self.conflict_policy = other.conflict_policy;
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != "1.0" {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '1.0'",
                self.schema_version
            );
        }
        for (name, def) in &self.fragments {
            if name.trim().is_empty() {
                anyhow::bail!("Fragment name cannot be empty");
            }
            if def.steps.is_empty() {
                anyhow::bail!("Fragment '{}' has no steps", name);
            }
        }
        for (name, def) in &self.profiles {
            if def.fragments.is_empty() {
                anyhow::bail!("Profile '{}' has no fragments", name);
            }
        }
        Ok(())
    }

    pub fn composer(&self, policy: Option<ConflictPolicy>) -> ProfileComposer<'_> {
        ProfileComposer::new(&self.fragments, policy.unwrap_or(self.conflict_policy))
    }

    /// Resolve a named profile with the catalog's conflict policy.
    pub fn resolve(&self, name: &str) -> Result<CoreProfile, ComposeError> {
        self.resolve_with(name, None)
    }

    pub fn resolve_with(
        &self,
        name: &str,
        policy: Option<ConflictPolicy>,
    ) -> Result<CoreProfile, ComposeError> {
        let def = self
            .profiles
            .get(name)
            .ok_or_else(|| ComposeError::UnknownProfile(name.to_string()))?;
        self.composer(policy).compose(name, &def.fragments)
    }

    pub fn profile_names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }
}
