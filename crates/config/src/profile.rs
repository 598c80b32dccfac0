// RvDiff - RISC-V Core Differential Testing
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Core profiles composed from ordered configuration fragments.
//!
//! A profile is built by applying named fragments left to right onto an
//! accumulating draft. Later fragments override scalar fields set by
//! earlier ones, and extend or shrink the extension set.

use crate::isa::{march_string, Extension, ExtensionSet, Xlen};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BusTopology {
    #[default]
    Coherent,
    Incoherent,
    SingleBus,
}

impl fmt::Display for BusTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BusTopology::Coherent => "coherent",
            BusTopology::Incoherent => "incoherent",
            BusTopology::SingleBus => "single_bus",
        };
        f.write_str(s)
    }
}

/// One primitive step of a configuration fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fragment {
    Width(Xlen),
    Enable(Vec<Extension>),
    Disable(Vec<Extension>),
    Cores(u32),
    Bus(BusTopology),
    /// Apply another named fragment in place.
    Include(String),
}

/// A named, reusable list of fragment steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentDef {
    #[serde(default)]
    pub description: String,
    pub steps: Vec<Fragment>,
}

impl FragmentDef {
    pub fn new(description: &str, steps: Vec<Fragment>) -> Self {
        Self {
            description: description.to_string(),
            steps,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Later fragments silently win; a warning is logged.
    #[default]
    LastWins,
    /// Any override of a value set by an earlier fragment is an error.
    FailFast,
}

/// Fully resolved core profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreProfile {
    pub name: String,
    pub xlen: Xlen,
    pub extensions: ExtensionSet,
    pub cores: u32,
    pub bus: BusTopology,
    /// Fragment names in the order they were applied, includes expanded.
    #[serde(default)]
    pub lineage: Vec<String>,
}

impl CoreProfile {
    pub fn march(&self) -> String {
        march_string(self.xlen, &self.extensions)
    }

    pub fn has(&self, ext: Extension) -> bool {
        self.extensions.contains(ext)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ComposeError {
    #[error("unknown fragment '{0}'")]
    UnknownFragment(String),
    #[error("unknown profile '{0}'")]
    UnknownProfile(String),
    #[error("fragment include cycle: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
    #[error("conflict on {field}: '{earlier}' set {old}, '{later}' sets {new}")]
    Conflict {
        field: &'static str,
        earlier: String,
        later: String,
        old: String,
        new: String,
    },
    #[error("extension {extension} requires {requires}")]
    MissingDependency {
        extension: Extension,
        requires: Extension,
    },
    #[error("core count must be at least 1, got {0}")]
    InvalidCoreCount(u32),
    #[error("profile '{0}' has no fragments")]
    Empty(String),
}

/// A scalar field plus the fragment that last set it.
#[derive(Debug)]
struct Slot<T> {
    value: T,
    origin: Option<String>,
}

impl<T: Copy + PartialEq + fmt::Display> Slot<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            origin: None,
        }
    }

    fn set(
        &mut self,
        field: &'static str,
        value: T,
        origin: &str,
        policy: ConflictPolicy,
    ) -> Result<(), ComposeError> {
        if let Some(earlier) = &self.origin {
            if self.value != value {
                match policy {
                    ConflictPolicy::FailFast => {
                        return Err(ComposeError::Conflict {
                            field,
                            earlier: earlier.clone(),
                            later: origin.to_string(),
                            old: self.value.to_string(),
                            new: value.to_string(),
                        })
                    }
                    ConflictPolicy::LastWins => warn!(
                        "{}: '{}' overrides {} from '{}' with {}",
                        field, origin, self.value, earlier, value
                    ),
                }
            }
        }
        self.value = value;
        self.origin = Some(origin.to_string());
        Ok(())
    }
}

struct Draft {
    xlen: Slot<Xlen>,
    cores: Slot<u32>,
    bus: Slot<BusTopology>,
    extensions: ExtensionSet,
    enabled_by: BTreeMap<Extension, String>,
    lineage: Vec<String>,
}

impl Draft {
    fn base() -> Self {
        Self {
            xlen: Slot::new(Xlen::Rv64),
            cores: Slot::new(1),
            bus: Slot::new(BusTopology::Coherent),
            extensions: std::iter::once(Extension::I).collect(),
            enabled_by: BTreeMap::new(),
            lineage: Vec::new(),
        }
    }
}

/// Applies fragments from a lookup table onto a base profile.
pub struct ProfileComposer<'a> {
    fragments: &'a BTreeMap<String, FragmentDef>,
    policy: ConflictPolicy,
}

impl<'a> ProfileComposer<'a> {
    pub fn new(fragments: &'a BTreeMap<String, FragmentDef>, policy: ConflictPolicy) -> Self {
        Self { fragments, policy }
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// Compose `fragment_names` in order into a validated profile.
    pub fn compose<S: AsRef<str>>(
        &self,
        profile_name: &str,
        fragment_names: &[S],
    ) -> Result<CoreProfile, ComposeError> {
        if fragment_names.is_empty() {
            return Err(ComposeError::Empty(profile_name.to_string()));
        }

        let mut draft = Draft::base();
        let mut stack = Vec::new();
        for name in fragment_names {
            self.apply_named(&mut draft, name.as_ref(), &mut stack)?;
        }

        let profile = CoreProfile {
            name: profile_name.to_string(),
            xlen: draft.xlen.value,
            extensions: draft.extensions,
            cores: draft.cores.value,
            bus: draft.bus.value,
            lineage: draft.lineage,
        };
        validate_profile(&profile)?;
        debug!(
            "Composed {} ({}, {} core(s), {} bus): {}",
            profile.name, profile.xlen, profile.cores, profile.bus, profile.extensions
        );
        Ok(profile)
    }

    fn apply_named(
        &self,
        draft: &mut Draft,
        name: &str,
        stack: &mut Vec<String>,
    ) -> Result<(), ComposeError> {
        if stack.iter().any(|s| s == name) {
            let mut chain = stack.clone();
            chain.push(name.to_string());
            return Err(ComposeError::Cycle(chain));
        }
        let def = self
            .fragments
            .get(name)
            .ok_or_else(|| ComposeError::UnknownFragment(name.to_string()))?;

        stack.push(name.to_string());
        for step in &def.steps {
            self.apply_step(draft, name, step, stack)?;
        }
        stack.pop();

        draft.lineage.push(name.to_string());
        Ok(())
    }

    fn apply_step(
        &self,
        draft: &mut Draft,
        origin: &str,
        step: &Fragment,
        stack: &mut Vec<String>,
    ) -> Result<(), ComposeError> {
        match step {
            Fragment::Width(xlen) => draft.xlen.set("width", *xlen, origin, self.policy)?,
            Fragment::Cores(n) => draft.cores.set("cores", *n, origin, self.policy)?,
            Fragment::Bus(bus) => draft.bus.set("bus", *bus, origin, self.policy)?,
            Fragment::Enable(exts) => {
                for ext in exts {
                    if draft.extensions.insert(*ext) {
                        draft.enabled_by.insert(*ext, origin.to_string());
                    }
                }
            }
            Fragment::Disable(exts) => {
                for ext in exts {
                    if !draft.extensions.remove(*ext) {
                        continue;
                    }
                    let earlier = draft.enabled_by.remove(ext);
                    match (self.policy, earlier) {
                        (ConflictPolicy::FailFast, Some(earlier)) => {
                            return Err(ComposeError::Conflict {
                                field: "extensions",
                                earlier,
                                later: origin.to_string(),
                                old: format!("+{}", ext),
                                new: format!("-{}", ext),
                            });
                        }
                        (ConflictPolicy::LastWins, Some(earlier)) => {
                            warn!("'{}' disables {} enabled by '{}'", origin, ext, earlier)
                        }
                        _ => {}
                    }
                }
            }
            Fragment::Include(name) => self.apply_named(draft, name, stack)?,
        }
        Ok(())
    }
}

/// Check the structural invariants of a resolved profile.
pub fn validate_profile(profile: &CoreProfile) -> Result<(), ComposeError> {
    if profile.cores == 0 {
        return Err(ComposeError::InvalidCoreCount(profile.cores));
    }
    for ext in profile.extensions.iter() {
        for req in ext.requires() {
            if !profile.extensions.contains(*req) {
                return Err(ComposeError::MissingDependency {
                    extension: ext,
                    requires: *req,
                });
            }
        }
    }
    Ok(())
}
