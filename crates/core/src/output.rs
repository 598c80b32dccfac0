// RvDiff - RISC-V Core Differential Testing
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Normalised result of one emulator run.

use crate::dump::{parse_stream, ExceptionDump, RegisterDump};
use crate::names::{exception_description, gpr_abi_name, fpr_abi_name};
use crate::trace::DisassemblyIndex;
use crate::{CoreError, CoreResult, EmulatorType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    pub original_exception_count: usize,
    pub original_register_count: usize,
    pub conversion_successful: bool,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutput {
    pub emulator: EmulatorType,
    pub exceptions: Vec<ExceptionDump>,
    /// Last register dump in the stream.
    pub register_dump: Option<RegisterDump>,
    pub conversion_stats: ConversionStats,
}

impl ExecutionOutput {
    /// Build from raw stream bytes, attaching source traces when an index is given.
    pub fn from_bytes(
        data: &[u8],
        emulator: EmulatorType,
        index: Option<&DisassemblyIndex>,
    ) -> Self {
        let parsed = parse_stream(data);

        let warnings: Vec<String> = parsed
            .unknown_binary()
            .map(|(position, bytes)| {
                format!(
                    "Unknown binary data ({} bytes) at position {}",
                    bytes.len(),
                    position
                )
            })
            .collect();
        if !warnings.is_empty() {
            warn!(
                "{}: {} unrecognised chunks in output stream",
                emulator,
                warnings.len()
            );
        }

        let mut exceptions = parsed.exception_dumps;
        if let Some(index) = index {
            for e in exceptions.iter_mut() {
                e.inst_trace = index.trace_pc(e.csrs.mepc);
            }
        }

        Self {
            emulator,
            conversion_stats: ConversionStats {
                original_exception_count: exceptions.len(),
                original_register_count: parsed.register_dumps.len(),
                conversion_successful: warnings.is_empty(),
                warnings,
            },
            exceptions,
            register_dump: parsed.register_dumps.last().cloned(),
        }
    }

    pub fn from_log_file(
        log: &Path,
        dump: Option<&Path>,
        emulator: EmulatorType,
    ) -> CoreResult<Self> {
        if !log.exists() {
            return Err(CoreError::MissingFile(log.to_path_buf()));
        }
        let data = std::fs::read(log)?;
        let index = match dump {
            Some(p) => Some(DisassemblyIndex::from_file(p)?),
            None => None,
        };
        Ok(Self::from_bytes(&data, emulator, index.as_ref()))
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CoreError::MissingFile(path.to_path_buf()));
        }
        let file = File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }

    /// Write `<emulator>_output.json` and `<emulator>_output.md` into `dir`.
    pub fn save(&self, dir: &Path) -> CoreResult<(PathBuf, PathBuf)> {
        std::fs::create_dir_all(dir)?;
        let json_path = dir.join(format!("{}_output.json", self.emulator.slug()));
        let md_path = dir.join(format!("{}_output.md", self.emulator.slug()));

        let writer = BufWriter::new(File::create(&json_path)?);
        serde_json::to_writer_pretty(writer, self)?;
        std::fs::write(&md_path, self.to_string())?;

        info!(
            "{} output: {} exceptions, register dump: {}",
            self.emulator,
            self.exceptions.len(),
            if self.register_dump.is_some() { "yes" } else { "no" }
        );
        Ok((json_path, md_path))
    }
}

impl fmt::Display for ExecutionOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# {} execution output", self.emulator)?;
        writeln!(f)?;
        writeln!(f, "| Item | Value |")?;
        writeln!(f, "|------|-------|")?;
        writeln!(f, "| Exceptions | `{}` |", self.exceptions.len())?;
        writeln!(
            f,
            "| Register dumps | `{}` |",
            self.conversion_stats.original_register_count
        )?;
        writeln!(
            f,
            "| Conversion | {} |",
            if self.conversion_stats.conversion_successful {
                "ok"
            } else {
                "with warnings"
            }
        )?;
        writeln!(f)?;

        if !self.conversion_stats.warnings.is_empty() {
            writeln!(f, "## Warnings")?;
            writeln!(f)?;
            for w in &self.conversion_stats.warnings {
                writeln!(f, "- {}", w)?;
            }
            writeln!(f)?;
        }

        if !self.exceptions.is_empty() {
            writeln!(f, "## Exceptions")?;
            writeln!(f)?;
            writeln!(f, "| # | mepc | mcause | Description | mtval | Instruction |")?;
            writeln!(f, "|---|------|--------|-------------|-------|-------------|")?;
            for (i, e) in self.exceptions.iter().enumerate() {
                let inst = e
                    .inst_trace
                    .as_ref()
                    .map_or("-", |t| t.original_instruction.as_str());
                writeln!(
                    f,
                    "| {} | `0x{:016X}` | `0x{:X}` | {} | `0x{:016X}` | `{}` |",
                    i + 1,
                    e.csrs.mepc,
                    e.csrs.mcause,
                    exception_description(e.csrs.mcause),
                    e.csrs.mtval,
                    inst
                )?;
            }
            writeln!(f)?;
        }

        if let Some(dump) = &self.register_dump {
            writeln!(f, "## Final registers ({})", dump.dump_type)?;
            writeln!(f)?;
            writeln!(f, "| Register | ABI | Value |")?;
            writeln!(f, "|----------|-----|-------|")?;
            for (i, v) in dump.int_registers.iter().enumerate() {
                writeln!(f, "| `x{:02}` | `{}` | `0x{:016X}` |", i, gpr_abi_name(i), v)?;
            }
            writeln!(f)?;
            writeln!(f, "| CSR | Value |")?;
            writeln!(f, "|-----|-------|")?;
            for (name, v) in dump.core_csrs.named() {
                writeln!(f, "| `{}` | `0x{:016X}` |", name, v)?;
            }
            if let Some(fprs) = &dump.float_registers {
                writeln!(f)?;
                writeln!(f, "| Register | ABI | Value |")?;
                writeln!(f, "|----------|-----|-------|")?;
                for (i, v) in fprs.iter().enumerate() {
                    writeln!(f, "| `f{:02}` | `{}` | `0x{:016X}` |", i, fpr_abi_name(i), v)?;
                }
                if let Some(fcsr) = dump.float_csr {
                    writeln!(f, "| `fcsr` | | `0x{:016X}` |", fcsr)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dump::{encode_exception_dump, ExceptionCsrs};

    fn stream() -> Vec<u8> {
        let mut data = b"boot\n".to_vec();
        data.extend(encode_exception_dump(&ExceptionCsrs {
            mcause: 2,
            mepc: 0x8000_0010,
            ..ExceptionCsrs::default()
        }));
        data
    }

    #[test]
    fn test_traces_attached() {
        let index = DisassemblyIndex::parse("    80000010:\t0000000b\t.insn\t4, 0xb\n");
        let out = ExecutionOutput::from_bytes(&stream(), EmulatorType::Rocket, Some(&index));
        assert_eq!(out.exceptions.len(), 1);
        let trace = out.exceptions[0].inst_trace.as_ref().unwrap();
        assert_eq!(trace.machine_code, "0000000b");
        assert!(out.register_dump.is_none());
        assert!(out.conversion_stats.conversion_successful);
    }

    #[test]
    fn test_unknown_binary_warns() {
        let mut data = stream();
        data.push(0x90);
        let out = ExecutionOutput::from_bytes(&data, EmulatorType::Spike, None);
        assert!(!out.conversion_stats.conversion_successful);
        assert_eq!(out.conversion_stats.warnings.len(), 1);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let out = ExecutionOutput::from_bytes(&stream(), EmulatorType::Spike, None);
        let (json, md) = out.save(dir.path()).unwrap();
        assert!(json.ends_with("spike_output.json"));
        let markdown = std::fs::read_to_string(md).unwrap();
        assert!(markdown.contains("Illegal instruction"));
        assert_eq!(ExecutionOutput::load_json(json).unwrap(), out);
    }
}
