// RvDiff - RISC-V Core Differential Testing
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! PC to source line lookup over an `objdump -S` listing.

use crate::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionTrace {
    pub pc: u64,
    /// Instruction text as printed by objdump.
    pub disassembly: String,
    pub machine_code: String,
    /// Source line interleaved by `-S`, or the disassembly when absent.
    pub original_instruction: String,
}

#[derive(Debug, Clone, Default)]
pub struct DisassemblyIndex {
    by_pc: HashMap<u64, InstructionTrace>,
}

impl DisassemblyIndex {
    pub fn from_file<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CoreError::MissingFile(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        let index = Self::parse(&text);
        debug!(
            "Indexed {} instructions from {}",
            index.len(),
            path.display()
        );
        Ok(index)
    }

    pub fn parse(listing: &str) -> Self {
        let lines: Vec<&str> = listing.lines().collect();
        let mut by_pc = HashMap::new();

        for (i, line) in lines.iter().enumerate() {
            let Some((pc, machine_code, disassembly)) = parse_instruction_line(line) else {
                continue;
            };
            let source = i
                .checked_sub(1)
                .map(|p| lines[p].trim())
                .filter(|prev| !prev.is_empty() && !prev.contains(':'));
            let original_instruction = source.map_or_else(|| disassembly.clone(), str::to_string);
            by_pc.insert(
                pc,
                InstructionTrace {
                    pc,
                    disassembly,
                    machine_code,
                    original_instruction,
                },
            );
        }
        Self { by_pc }
    }

    pub fn trace_pc(&self, pc: u64) -> Option<InstructionTrace> {
        self.by_pc.get(&pc).cloned()
    }

    pub fn len(&self) -> usize {
        self.by_pc.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_pc.is_empty()
    }
}

/// `"    80000004:\t00a00093\tli\tra,10"` -> `(pc, machine code, disassembly)`.
fn parse_instruction_line(line: &str) -> Option<(u64, String, String)> {
    let trimmed = line.trim();
    let (addr, rest) = trimmed.split_once(':')?;
    let pc = u64::from_str_radix(addr.trim(), 16).ok()?;
    let mut parts = rest.split_whitespace();
    let machine_code = parts.next()?.to_string();
    let disassembly = parts.collect::<Vec<_>>().join(" ");
    if disassembly.is_empty() {
        return None;
    }
    Some((pc, machine_code, disassembly))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
build/test.elf:     file format elf64-littleriscv

Disassembly of section .text:

0000000080000000 <_start>:
_start:
    80000000:\t00000297          \tauipc\tt0,0x0
    80000004:\t01028293          \taddi\tt0,t0,16

0000000080000010 <_user_code>:
    add x5, x6, x7
    80000010:\t007302b3          \tadd\tt0,t1,t2
    80000014:\t0000100f          \tfence.i
";

    #[test]
    fn test_source_line_preferred() {
        let index = DisassemblyIndex::parse(LISTING);
        let t = index.trace_pc(0x8000_0010).unwrap();
        assert_eq!(t.original_instruction, "add x5, x6, x7");
        assert_eq!(t.disassembly, "add t0,t1,t2");
        assert_eq!(t.machine_code, "007302b3");
    }

    #[test]
    fn test_falls_back_to_disassembly() {
        let index = DisassemblyIndex::parse(LISTING);
        let t = index.trace_pc(0x8000_0004).unwrap();
        assert_eq!(t.original_instruction, "addi t0,t0,16");
        let t = index.trace_pc(0x8000_0014).unwrap();
        assert_eq!(t.original_instruction, "fence.i");
    }

    #[test]
    fn test_labels_are_not_instructions() {
        let index = DisassemblyIndex::parse(LISTING);
        assert_eq!(index.len(), 4);
        assert!(index.trace_pc(0x8000_0008).is_none());
    }
}
