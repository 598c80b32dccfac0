// RvDiff - RISC-V Core Differential Testing
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Assembly to ELF through the GNU RISC-V binutils.

use anyhow::{bail, Context, Result};
use rvdiff_config::{gcc_preprocess_march, ToolchainConfig};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;
use tracing::{debug, error, info};

#[derive(Debug, Clone)]
pub struct BuildArtifacts {
    /// Only set for `.S` inputs.
    pub preprocessed: Option<PathBuf>,
    pub object: PathBuf,
    pub elf: PathBuf,
    /// `objdump -S` listing.
    pub dump: PathBuf,
}

impl BuildArtifacts {
    pub fn for_source(asm: &Path) -> Self {
        Self {
            preprocessed: needs_preprocessing(asm).then(|| asm.with_extension("s")),
            object: asm.with_extension("o"),
            elf: asm.with_extension("elf"),
            dump: asm.with_extension("dump"),
        }
    }

    fn all(&self) -> impl Iterator<Item = &PathBuf> {
        [&self.object, &self.elf, &self.dump]
            .into_iter()
            .chain(self.preprocessed.iter())
    }
}

fn needs_preprocessing(asm: &Path) -> bool {
    asm.extension().is_some_and(|e| e == "S")
}

pub fn is_assembly(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "s" || e == "S")
}

fn run_tool(stage: &str, cmd: &mut Command) -> Result<Vec<u8>> {
    debug!("{}: {:?}", stage, cmd);
    let output = cmd
        .output()
        .with_context(|| format!("Failed to spawn {:?} for {}", cmd.get_program(), stage))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines().take(5) {
            error!("{} error: {}", stage, line);
        }
        bail!("{} failed ({}): {}", stage, output.status, stderr.trim());
    }
    Ok(output.stdout)
}

/// Build `asm` into an ELF next to it and write its disassembly listing.
pub fn build_elf(asm: &Path, march: &str, toolchain: &ToolchainConfig) -> Result<BuildArtifacts> {
    let start = Instant::now();
    if !asm.exists() {
        bail!("Assembly file not found: {}", asm.display());
    }

    let artifacts = BuildArtifacts::for_source(asm);
    for stale in artifacts.all().filter(|p| p.exists()) {
        std::fs::remove_file(stale)
            .with_context(|| format!("Failed to remove {}", stale.display()))?;
        debug!("Removed {}", stale.display());
    }

    let source = match &artifacts.preprocessed {
        Some(out) => {
            let gcc_march = gcc_preprocess_march(march);
            debug!("Preprocessing with -march={} (from {})", gcc_march, march);
            run_tool(
                "preprocessing",
                Command::new(toolchain.tool("gcc"))
                    .arg(format!("-march={}", gcc_march))
                    .arg("-E")
                    .arg(asm)
                    .arg("-o")
                    .arg(out),
            )?;
            out.clone()
        }
        None => asm.to_path_buf(),
    };

    run_tool(
        "assembly",
        Command::new(toolchain.tool("as"))
            .arg(format!("-march={}", march))
            .arg("-g")
            .arg("-o")
            .arg(&artifacts.object)
            .arg(&source),
    )?;

    run_tool(
        "linking",
        Command::new(toolchain.tool("ld"))
            .arg("-T")
            .arg(&toolchain.linker_script)
            .arg("-o")
            .arg(&artifacts.elf)
            .arg(&artifacts.object),
    )?;

    let listing = run_tool(
        "disassembly",
        Command::new(toolchain.tool("objdump"))
            .arg("-S")
            .arg(&artifacts.elf),
    )?;
    std::fs::write(&artifacts.dump, listing)
        .with_context(|| format!("Failed to write {}", artifacts.dump.display()))?;

    info!(
        "Built {} in {:.2}s",
        artifacts.elf.display(),
        start.elapsed().as_secs_f64()
    );
    Ok(artifacts)
}
