// RvDiff - RISC-V Core Differential Testing
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Build, run on both emulators, diff, and retry without Rocket-only
//! illegal instructions.

use crate::emulator::run_and_parse;
use crate::toolchain::build_elf;
use anyhow::{bail, Context, Result};
use rvdiff_config::{CoreProfile, RunConfig};
use rvdiff_core::asm::{extract_user_code, minimal_slice, remove_instructions, splice_user_code};
use rvdiff_core::diff::{compare_outputs, DiffOptions, OutputDiff};
use rvdiff_core::metrics::TestOutcome;
use rvdiff_core::output::ExecutionOutput;
use rvdiff_core::retry::RetryReport;
use rvdiff_core::EmulatorType;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const RESULT_SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pass,
    Diff,
}

/// Contents of `run.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub result_schema_version: String,
    pub profile: String,
    pub march: String,
    pub assembly: PathBuf,
    pub elf_sha256: String,
    pub status: RunStatus,
    pub exception_differences: usize,
    pub differing_registers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryReport>,
}

impl RunRecord {
    pub fn outcome(&self) -> TestOutcome {
        match self.status {
            RunStatus::Pass => TestOutcome::Pass,
            RunStatus::Diff => TestOutcome::Diff {
                registers: self.differing_registers.clone(),
                exceptions: self.exception_differences,
            },
        }
    }
}

struct Execution {
    diff: OutputDiff,
    elf_sha256: String,
}

pub struct Pipeline<'a> {
    profile: &'a CoreProfile,
    config: &'a RunConfig,
    march: String,
    diff_options: DiffOptions,
    retry: bool,
}

impl<'a> Pipeline<'a> {
    pub fn new(profile: &'a CoreProfile, config: &'a RunConfig) -> Self {
        Self {
            profile,
            config,
            march: profile.march(),
            diff_options: DiffOptions::default(),
            retry: true,
        }
    }

    pub fn diff_options(mut self, options: DiffOptions) -> Self {
        self.diff_options = options;
        self
    }

    pub fn retry(mut self, enabled: bool) -> Self {
        self.retry = enabled;
        self
    }

    pub fn profile(&self) -> &CoreProfile {
        self.profile
    }

    /// Copy `asm` into `dir` so every artifact lands in one place.
    fn stage(dir: &Path, asm: &Path) -> Result<PathBuf> {
        if !asm.exists() {
            bail!("Assembly file not found: {}", asm.display());
        }
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create build directory {}", dir.display()))?;
        let name = asm
            .file_name()
            .with_context(|| format!("Not a file: {}", asm.display()))?;
        let staged = dir.join(name);
        if fs::canonicalize(&staged).ok() != Some(fs::canonicalize(asm)?) {
            fs::copy(asm, &staged)
                .with_context(|| format!("Failed to copy {} into {}", asm.display(), dir.display()))?;
        }
        Ok(staged)
    }

    fn build(&self, asm: &Path) -> Result<(crate::toolchain::BuildArtifacts, String)> {
        let artifacts = build_elf(asm, &self.march, &self.config.toolchain)?;
        rvdiff_loader::inspect_elf(&artifacts.elf)?.check_xlen(self.profile.xlen)?;

        let elf_bytes = fs::read(&artifacts.elf)?;
        let mut hasher = Sha256::new();
        hasher.update(&elf_bytes);
        Ok((artifacts, format!("{:x}", hasher.finalize())))
    }

    /// Build and run on a single emulator.
    pub fn emulate(&self, dir: &Path, asm: &Path, emulator: EmulatorType) -> Result<ExecutionOutput> {
        let staged = Self::stage(dir, asm)?;
        let (artifacts, _) = self.build(&staged)?;
        run_and_parse(
            emulator,
            &artifacts.elf,
            &artifacts.dump,
            &self.march,
            self.config,
            dir,
        )
    }

    fn execute(&self, dir: &Path, asm: &Path) -> Result<Execution> {
        let (artifacts, elf_sha256) = self.build(asm)?;
        let run = |emulator| {
            run_and_parse(
                emulator,
                &artifacts.elf,
                &artifacts.dump,
                &self.march,
                self.config,
                dir,
            )
        };
        let spike = run(EmulatorType::Spike)?;
        let rocket = run(EmulatorType::Rocket)?;
        let diff = compare_outputs(&spike, &rocket, &self.diff_options);
        diff.save(dir)?;
        Ok(Execution { diff, elf_sha256 })
    }

    /// Full flow for one program; writes `run.json` into `dir`.
    pub fn process(&self, dir: &Path, asm: &Path) -> Result<RunRecord> {
        let staged = Self::stage(dir, asm)?;
        let first = self.execute(dir, &staged)?;

        let retried = if !first.diff.exceptions.has_rocket_only_illegal() {
            info!("No Rocket-only illegal instructions");
            None
        } else if !self.retry {
            info!("Rocket-only illegal instructions found, retry disabled");
            None
        } else {
            let retried = self.retry_without_illegal(dir, &staged, &first.diff)?;
            if retried.is_none() {
                warn!("No removable source lines for Rocket-only illegal instructions");
            }
            retried
        };
        let (retry, retried_diff) = match retried {
            Some((report, diff)) => (Some(report), Some(diff)),
            None => (None, None),
        };
        let final_diff = retried_diff.as_ref().unwrap_or(&first.diff);

        let record = RunRecord {
            result_schema_version: RESULT_SCHEMA_VERSION.to_string(),
            profile: self.profile.name.clone(),
            march: self.march.clone(),
            assembly: staged,
            elf_sha256: first.elf_sha256,
            status: if final_diff.is_empty() {
                RunStatus::Pass
            } else {
                RunStatus::Diff
            },
            exception_differences: final_diff.exceptions.difference_count(),
            differing_registers: final_diff.differing_registers(),
            retry,
        };

        let path = dir.join("run.json");
        let file = fs::File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(file, &record)?;
        info!("Run result {:?} saved to {}", record.status, path.display());
        Ok(record)
    }

    fn retry_without_illegal(
        &self,
        dir: &Path,
        asm: &Path,
        before: &OutputDiff,
    ) -> Result<Option<(RetryReport, OutputDiff)>> {
        let removed = before.exceptions.rocket_only_illegal_sources();
        if removed.is_empty() {
            return Ok(None);
        }
        let text = fs::read_to_string(asm)?;
        let (retried, dropped) = remove_instructions(&text, &removed)?;
        if dropped == 0 {
            return Ok(None);
        }
        info!(
            "Retrying without {} Rocket-only illegal instruction(s) ({} lines)",
            removed.len(),
            dropped
        );

        let ext = asm.extension().and_then(|e| e.to_str()).unwrap_or("S");
        let retry_dir = dir.join("retry");
        fs::create_dir_all(&retry_dir)?;
        let retry_asm = retry_dir.join(format!("retry.{}", ext));
        fs::write(&retry_asm, &retried)?;

        let after = self.execute(&retry_dir, &retry_asm)?;
        let mut report = RetryReport::new(removed, before, &after.diff);

        if !report.registers_after.is_empty() {
            let slice = minimal_slice(&extract_user_code(&retried), &report.registers_after);
            if slice.is_empty() {
                warn!("No instructions write {:?}", report.registers_after);
            } else {
                let path = retry_dir.join(format!(
                    "minimal_{}.{}",
                    report.registers_after.join("_"),
                    ext
                ));
                fs::write(&path, splice_user_code(&retried, &slice)?)?;
                info!(
                    "Minimal program ({} instructions) written to {}",
                    slice.len(),
                    path.display()
                );
                report.minimal_program = Some(path);
            }
        }

        report.save(&retry_dir)?;
        Ok(Some((report, after.diff)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rvdiff_config::Catalog;

    #[test]
    fn test_record_outcome() {
        let record = RunRecord {
            result_schema_version: RESULT_SCHEMA_VERSION.to_string(),
            profile: "MaxExtensionRV64Config".to_string(),
            march: "rv64i".to_string(),
            assembly: PathBuf::from("t.S"),
            elf_sha256: String::new(),
            status: RunStatus::Diff,
            exception_differences: 2,
            differing_registers: vec!["x5".to_string()],
            retry: None,
        };
        assert_eq!(
            record.outcome(),
            TestOutcome::Diff {
                registers: vec!["x5".to_string()],
                exceptions: 2
            }
        );
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"status\":\"diff\""));
        assert!(!json.contains("retry"));
    }

    #[test]
    fn test_missing_assembly_fails_before_tools() {
        let profile = Catalog::builtin().resolve("MaxExtensionRV64Config").unwrap();
        let config = RunConfig::default();
        let dir = tempfile::tempdir().unwrap();
        let err = Pipeline::new(&profile, &config)
            .process(dir.path(), Path::new("/nonexistent/t.S"))
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
