// RvDiff - RISC-V Core Differential Testing
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::size_limited_writer::SizeLimitedWriter;
use anyhow::{bail, Context, Result};
use rvdiff_config::RunConfig;
use rvdiff_core::output::ExecutionOutput;
use rvdiff_core::EmulatorType;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct EmulatorRun {
    pub log: PathBuf,
    pub bytes_logged: u64,
    pub truncated: bool,
}

fn command_for(emulator: EmulatorType, elf: &Path, march: &str, config: &RunConfig) -> Result<Command> {
    let cmd = match emulator {
        EmulatorType::Spike => {
            let mut cmd = Command::new(&config.spike.path);
            cmd.arg(format!("--isa={}", march));
            cmd.args(&config.spike.extra_args);
            cmd.arg(elf);
            cmd
        }
        EmulatorType::Rocket => {
            let rocket = &config.rocket;
            if !Path::new(&rocket.path).exists() {
                bail!("Rocket emulator not found at: {}", rocket.path);
            }
            let mut cmd = Command::new(&rocket.path);
            if rocket.cycle_count {
                cmd.arg("--cycle-count");
            }
            if rocket.verbose {
                cmd.arg("--verbose");
            }
            if let Some(max) = rocket.max_cycles {
                cmd.arg(format!("--max-cycles={}", max));
            }
            cmd.arg(elf);
            cmd
        }
    };
    Ok(cmd)
}

/// Run `elf` on one emulator and store its stdout in `<dir>/<emulator>_execution.log`.
pub fn run_emulator(
    emulator: EmulatorType,
    elf: &Path,
    march: &str,
    config: &RunConfig,
    dir: &Path,
) -> Result<EmulatorRun> {
    if !elf.exists() {
        bail!("Program file not found: {}", elf.display());
    }
    let mut cmd = command_for(emulator, elf, march, config)?;
    debug!("{} command: {:?}", emulator, cmd);

    let start = Instant::now();
    let output = cmd
        .output()
        .with_context(|| format!("Failed to start {}", emulator))?;
    debug!(
        "{} finished in {:.3}s with {}",
        emulator,
        start.elapsed().as_secs_f64(),
        output.status
    );

    if !output.status.success() {
        warn!("{} exit status indicates failure: {}", emulator, output.status);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            warn!("{} stderr: {}", emulator, stderr.trim());
        }
        if output.stdout.is_empty() {
            bail!("{} failed with no output", emulator);
        }
    }

    let log = dir.join(format!("{}_execution.log", emulator.slug()));
    let file = File::create(&log).with_context(|| format!("Failed to create {}", log.display()))?;
    let mut writer = SizeLimitedWriter::new(BufWriter::new(file), config.max_log_bytes()?);
    writer.write_all(&output.stdout)?;
    writer.flush()?;
    if writer.limit_exceeded() {
        warn!(
            "{} log capped at {} bytes, {} bytes dropped",
            emulator,
            writer.bytes_written(),
            writer.bytes_dropped()
        );
    }

    info!(
        "{} run completed in {:.2}s",
        emulator,
        start.elapsed().as_secs_f64()
    );
    Ok(EmulatorRun {
        log,
        bytes_logged: writer.bytes_written(),
        truncated: writer.limit_exceeded(),
    })
}

/// Run and parse, saving `<emulator>_output.{json,md}` into `dir`.
pub fn run_and_parse(
    emulator: EmulatorType,
    elf: &Path,
    dump: &Path,
    march: &str,
    config: &RunConfig,
    dir: &Path,
) -> Result<ExecutionOutput> {
    let run = run_emulator(emulator, elf, march, config, dir)?;
    let mut output = ExecutionOutput::from_log_file(&run.log, Some(dump), emulator)
        .with_context(|| format!("Failed to parse {} output", emulator))?;
    if run.truncated {
        output
            .conversion_stats
            .warnings
            .push(format!("Log truncated at {} bytes", run.bytes_logged));
    }
    output.save(dir)?;
    Ok(output)
}
