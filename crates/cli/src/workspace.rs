// RvDiff - RISC-V Core Differential Testing
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Random test campaigns: output directory layout and the parallel driver.

use crate::pipeline::Pipeline;
use anyhow::{Context, Result};
use rand::distributions::Alphanumeric;
use rand::Rng;
use rayon::prelude::*;
use rvdiff_config::generation_extensions;
use rvdiff_core::generate::{generatable, seeded_rng, GenerationOrder, InstructionGenerator};
use rvdiff_core::metrics::{CampaignMetrics, CampaignSummary, TestOutcome};
use rvdiff_core::template::TemplateOptions;
use rvdiff_core::CampaignObserver;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const DEFAULT_WORKSPACE: &str = "workspace";

/// `fuzz_<YYYYmmdd_HHMMSS>_<6 alphanumerics>`
pub fn random_dir_name() -> String {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!("fuzz_{}_{}", stamp, suffix)
}

/// A fixed `output_dir` is used as is; otherwise a fresh directory is made
/// under the workspace.
pub fn resolve_output_dir(output_dir: Option<PathBuf>, workspace_dir: Option<PathBuf>) -> PathBuf {
    match output_dir {
        Some(dir) => dir,
        None => workspace_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_WORKSPACE))
            .join(random_dir_name()),
    }
}

pub fn test_dir(root: &Path, id: usize) -> PathBuf {
    root.join(format!("test_{:06}", id))
}

#[derive(Debug, Serialize)]
struct CampaignRecord<'a> {
    profile: &'a str,
    march: String,
    seed: Option<u64>,
    tests: usize,
    instructions_per_extension: usize,
    summary: CampaignSummary,
}

pub struct Campaign<'a> {
    pipeline: &'a Pipeline<'a>,
    tests: usize,
    jobs: usize,
    per_extension: usize,
    seed: Option<u64>,
}

impl<'a> Campaign<'a> {
    pub fn new(pipeline: &'a Pipeline<'a>, tests: usize, jobs: usize, per_extension: usize) -> Self {
        Self {
            pipeline,
            tests,
            jobs: jobs.max(1),
            per_extension,
            seed: None,
        }
    }

    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    fn generator(&self) -> InstructionGenerator {
        let profile = self.pipeline.profile();
        generatable(&generation_extensions(profile))
            .into_iter()
            .fold(
                InstructionGenerator::new(profile.xlen).order(GenerationOrder::Shuffled),
                |g, ext| g.with(ext, self.per_extension),
            )
    }

    fn run_one(&self, root: &Path, id: usize, generator: &InstructionGenerator) -> Result<TestOutcome> {
        let dir = test_dir(root, id);
        fs::create_dir_all(&dir)?;
        // Each test gets its own stream; seeded campaigns stay reproducible.
        let mut rng = seeded_rng(self.seed.map(|s| s.wrapping_add(id as u64)));
        let insts = generator.generate(&mut rng)?;
        let asm = TemplateOptions::for_profile(self.pipeline.profile()).render_instructions(&insts);
        let path = dir.join("generated.S");
        fs::write(&path, asm).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(self.pipeline.process(&dir, &path)?.outcome())
    }

    /// Run every test on a pool of `jobs` threads; writes `campaign.json` into `root`.
    pub fn run(&self, root: &Path, observer: &dyn CampaignObserver) -> Result<CampaignSummary> {
        fs::create_dir_all(root)
            .with_context(|| format!("Failed to create output directory {}", root.display()))?;
        let generator = self.generator();
        if generator.total() == 0 {
            anyhow::bail!(
                "Profile {} enables no extension the generator supports",
                self.pipeline.profile().name
            );
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
            .context("Failed to initialize thread pool")?;
        let metrics = CampaignMetrics::new();

        info!(
            "Starting {} random tests on {} threads in {}",
            self.tests,
            self.jobs,
            root.display()
        );
        observer.on_campaign_start(self.tests);
        pool.install(|| {
            (0..self.tests).into_par_iter().for_each(|id| {
                observer.on_test_start(id);
                metrics.on_test_start(id);
                let outcome = match self.run_one(root, id, &generator) {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        error!("Random test #{} failed: {:#}", id, e);
                        TestOutcome::Error(format!("{:#}", e))
                    }
                };
                info!("Random test #{}: {:?}", id, outcome);
                metrics.on_test_end(id, &outcome);
                observer.on_test_end(id, &outcome);
            })
        });
        observer.on_campaign_end();

        let summary = metrics.summary();
        let record = CampaignRecord {
            profile: &self.pipeline.profile().name,
            march: self.pipeline.profile().march(),
            seed: self.seed,
            tests: self.tests,
            instructions_per_extension: self.per_extension,
            summary: summary.clone(),
        };
        let path = root.join("campaign.json");
        let file = fs::File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(file, &record)?;
        info!(
            "Campaign finished: {} passed, {} with differences, {} errors ({:.2} tests/s)",
            summary.passed,
            summary.diffed,
            summary.failed,
            metrics.get_tests_per_sec()
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rvdiff_config::{Catalog, RunConfig};

    #[test]
    fn test_random_dir_name_shape() {
        let name = random_dir_name();
        let parts: Vec<&str> = name.split('_').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "fuzz");
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 6);
        assert_eq!(parts[3].len(), 6);
        assert!(parts[3].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_resolve_output_dir() {
        assert_eq!(
            resolve_output_dir(Some(PathBuf::from("out")), None),
            PathBuf::from("out")
        );
        let dir = resolve_output_dir(None, Some(PathBuf::from("ws")));
        assert!(dir.starts_with("ws"));
        assert!(dir
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("fuzz_")));
        assert!(resolve_output_dir(None, None).starts_with(DEFAULT_WORKSPACE));
        assert_eq!(test_dir(Path::new("r"), 7), PathBuf::from("r/test_000007"));
    }

    #[test]
    fn test_failed_tests_are_counted() {
        let profile = Catalog::builtin().resolve("MaxExtensionRV64Config").unwrap();
        let mut config = RunConfig::default();
        config.toolchain.prefix = "/nonexistent/riscv-".to_string();
        let pipeline = Pipeline::new(&profile, &config);
        let root = tempfile::tempdir().unwrap();

        let summary = Campaign::new(&pipeline, 3, 2, 4)
            .seed(Some(9))
            .run(root.path(), &CampaignMetrics::new())
            .unwrap();
        assert_eq!(summary.started, 3);
        assert_eq!(summary.failed, 3);
        assert!(root.path().join("campaign.json").exists());

        let asm = fs::read_to_string(test_dir(root.path(), 0).join("generated.S")).unwrap();
        let user = rvdiff_core::asm::extract_user_code(&asm);
        assert!(!user.is_empty());
        assert_eq!(user.len() % 4, 0);
    }
}
