// RvDiff - RISC-V Core Differential Testing
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! ELF inspection for built test programs.

use anyhow::{anyhow, bail, Context, Result};
use goblin::elf::header::EM_RISCV;
use goblin::elf::program_header::PT_LOAD;
use goblin::elf::Elf;
use rvdiff_config::Xlen;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub start: u64,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElfSummary {
    pub entry: u64,
    pub xlen: Xlen,
    pub segments: Vec<Segment>,
    pub tohost: Option<u64>,
    pub fromhost: Option<u64>,
}

impl ElfSummary {
    pub fn has_htif(&self) -> bool {
        self.tohost.is_some() && self.fromhost.is_some()
    }

    /// Fail when the binary was built for a different register width.
    pub fn check_xlen(&self, expected: Xlen) -> Result<()> {
        if self.xlen != expected {
            bail!(
                "ELF is {} but profile expects {}",
                self.xlen.base(),
                expected.base()
            );
        }
        Ok(())
    }
}

pub fn inspect_elf(path: &Path) -> Result<ElfSummary> {
    let buffer = fs::read(path).with_context(|| format!("Failed to read ELF file: {:?}", path))?;
    inspect_elf_bytes(&buffer)
}

pub fn inspect_elf_bytes(buffer: &[u8]) -> Result<ElfSummary> {
    let elf = Elf::parse(buffer).context("Failed to parse ELF binary")?;

    if elf.header.e_machine != EM_RISCV {
        return Err(anyhow!(
            "Not a RISC-V binary (e_machine = {})",
            elf.header.e_machine
        ));
    }
    let xlen = if elf.is_64 { Xlen::Rv64 } else { Xlen::Rv32 };
    info!("ELF Entry Point: {:#x} ({})", elf.entry, xlen.base());

    let mut segments = Vec::new();
    for ph in &elf.program_headers {
        if ph.p_type != PT_LOAD || ph.p_memsz == 0 {
            continue;
        }
        let (offset, filesz) = (ph.p_offset as usize, ph.p_filesz as usize);
        if offset.checked_add(filesz).map_or(true, |end| end > buffer.len()) {
            return Err(anyhow!("Segment out of bounds in ELF file"));
        }
        debug!(
            "Found Loadable Segment: Addr={:#x}, Size={} bytes",
            ph.p_paddr, ph.p_memsz
        );
        segments.push(Segment {
            start: ph.p_paddr,
            size: ph.p_memsz,
        });
    }
    if segments.is_empty() {
        warn!("No loadable segments found in ELF file");
    }

    let symbol = |wanted: &str| {
        elf.syms
            .iter()
            .find(|s| elf.strtab.get_at(s.st_name) == Some(wanted))
            .map(|s| s.st_value)
    };
    let tohost = symbol("tohost");
    let fromhost = symbol("fromhost");
    if tohost.is_none() {
        warn!("ELF has no tohost symbol; emulators will not terminate");
    }

    Ok(ElfSummary {
        entry: elf.entry,
        xlen,
        segments,
        tohost,
        fromhost,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENTRY: u64 = 0x8000_0000;

    fn elf64(machine: u16) -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(&[0x7f, b'E', b'L', b'F', 2, 1, 1, 0]);
        b.extend_from_slice(&[0; 8]);
        b.extend_from_slice(&2u16.to_le_bytes()); // ET_EXEC
        b.extend_from_slice(&machine.to_le_bytes());
        b.extend_from_slice(&1u32.to_le_bytes());
        b.extend_from_slice(&ENTRY.to_le_bytes());
        b.extend_from_slice(&64u64.to_le_bytes()); // phoff
        b.extend_from_slice(&0u64.to_le_bytes()); // shoff
        b.extend_from_slice(&0u32.to_le_bytes());
        b.extend_from_slice(&64u16.to_le_bytes());
        b.extend_from_slice(&56u16.to_le_bytes());
        b.extend_from_slice(&1u16.to_le_bytes());
        b.extend_from_slice(&64u16.to_le_bytes());
        b.extend_from_slice(&0u16.to_le_bytes());
        b.extend_from_slice(&0u16.to_le_bytes());
        // PT_LOAD, RX, 4 bytes at offset 120
        b.extend_from_slice(&1u32.to_le_bytes());
        b.extend_from_slice(&5u32.to_le_bytes());
        b.extend_from_slice(&120u64.to_le_bytes());
        b.extend_from_slice(&ENTRY.to_le_bytes());
        b.extend_from_slice(&ENTRY.to_le_bytes());
        b.extend_from_slice(&4u64.to_le_bytes());
        b.extend_from_slice(&4u64.to_le_bytes());
        b.extend_from_slice(&4u64.to_le_bytes());
        b.extend_from_slice(&0x0000_0013u32.to_le_bytes()); // nop
        b
    }

    fn elf32() -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(&[0x7f, b'E', b'L', b'F', 1, 1, 1, 0]);
        b.extend_from_slice(&[0; 8]);
        b.extend_from_slice(&2u16.to_le_bytes());
        b.extend_from_slice(&EM_RISCV.to_le_bytes());
        b.extend_from_slice(&1u32.to_le_bytes());
        b.extend_from_slice(&(ENTRY as u32).to_le_bytes());
        b.extend_from_slice(&52u32.to_le_bytes());
        b.extend_from_slice(&0u32.to_le_bytes());
        b.extend_from_slice(&0u32.to_le_bytes());
        b.extend_from_slice(&52u16.to_le_bytes());
        b.extend_from_slice(&32u16.to_le_bytes());
        b.extend_from_slice(&1u16.to_le_bytes());
        b.extend_from_slice(&40u16.to_le_bytes());
        b.extend_from_slice(&0u16.to_le_bytes());
        b.extend_from_slice(&0u16.to_le_bytes());
        b.extend_from_slice(&1u32.to_le_bytes());
        b.extend_from_slice(&84u32.to_le_bytes());
        b.extend_from_slice(&(ENTRY as u32).to_le_bytes());
        b.extend_from_slice(&(ENTRY as u32).to_le_bytes());
        b.extend_from_slice(&4u32.to_le_bytes());
        b.extend_from_slice(&4u32.to_le_bytes());
        b.extend_from_slice(&5u32.to_le_bytes());
        b.extend_from_slice(&4u32.to_le_bytes());
        b.extend_from_slice(&0x0000_0013u32.to_le_bytes());
        b
    }

    #[test]
    fn test_inspect_rv64() {
        let summary = inspect_elf_bytes(&elf64(EM_RISCV)).unwrap();
        assert_eq!(summary.entry, ENTRY);
        assert_eq!(summary.xlen, Xlen::Rv64);
        assert_eq!(
            summary.segments,
            vec![Segment {
                start: ENTRY,
                size: 4
            }]
        );
        assert!(!summary.has_htif());
        assert!(summary.check_xlen(Xlen::Rv64).is_ok());
        assert!(summary.check_xlen(Xlen::Rv32).is_err());
    }

    #[test]
    fn test_inspect_rv32() {
        let summary = inspect_elf_bytes(&elf32()).unwrap();
        assert_eq!(summary.xlen, Xlen::Rv32);
        assert_eq!(summary.entry, ENTRY);
    }

    #[test]
    fn test_segment_bounds_do_not_overflow() {
        // p_offset lives at 72 and p_filesz at 96 in the first program header.
        let mut huge_offset = elf64(EM_RISCV);
        huge_offset[72..80].copy_from_slice(&(u64::MAX - 1).to_le_bytes());
        assert!(inspect_elf_bytes(&huge_offset).is_err());

        let mut huge_size = elf64(EM_RISCV);
        huge_size[96..104].copy_from_slice(&u64::MAX.to_le_bytes());
        assert!(inspect_elf_bytes(&huge_size).is_err());
    }

    #[test]
    fn test_rejects_other_machines() {
        // EM_ARM
        let err = inspect_elf_bytes(&elf64(40)).unwrap_err();
        assert!(err.to_string().contains("Not a RISC-V binary"));
        assert!(inspect_elf_bytes(b"not an elf").is_err());
    }
}
