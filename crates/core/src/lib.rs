// RvDiff - RISC-V Core Differential Testing
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod asm;
pub mod diff;
pub mod dump;
pub mod generate;
pub mod metrics;
pub mod names;
pub mod output;
pub mod retry;
pub mod template;
pub mod trace;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EmulatorType {
    Spike,
    Rocket,
}

impl EmulatorType {
    pub fn slug(self) -> &'static str {
        match self {
            EmulatorType::Spike => "spike",
            EmulatorType::Rocket => "rocket",
        }
    }
}

impl fmt::Display for EmulatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmulatorType::Spike => write!(f, "Spike"),
            EmulatorType::Rocket => write!(f, "Rocket"),
        }
    }
}

impl FromStr for EmulatorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "spike" => Ok(EmulatorType::Spike),
            "rocket" => Ok(EmulatorType::Rocket),
            other => Err(format!("unknown emulator '{}' (expected spike or rocket)", other)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("File not found: {0}")]
    MissingFile(PathBuf),
    #[error("No instructions to remove")]
    NothingToRemove,
    #[error("Assembly has no _user_code section")]
    NoUserCode,
    #[error("Cannot generate instructions: {0}")]
    Generation(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Hooks for following a random test campaign as it runs.
pub trait CampaignObserver: fmt::Debug + Send + Sync {
    fn on_campaign_start(&self, _tests: usize) {}
    fn on_test_start(&self, _id: usize) {}
    fn on_test_end(&self, _id: usize, _outcome: &metrics::TestOutcome) {}
    fn on_campaign_end(&self) {}
}
