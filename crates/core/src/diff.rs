// RvDiff - RISC-V Core Differential Testing
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Comparison of two execution outputs.

use crate::dump::{ExceptionDump, RegisterDump};
use crate::names::{exception_description, fpr_abi_name, gpr_abi_name};
use crate::output::ExecutionOutput;
use crate::trace::InstructionTrace;
use crate::{CoreResult, EmulatorType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

const ILLEGAL_INSTRUCTION: u64 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffOptions {
    /// Core CSRs left out of register dump comparison.
    pub ignored_csrs: BTreeSet<String>,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            ignored_csrs: ["mcycle", "minstret", "mvendorid", "marchid", "mimpid"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl DiffOptions {
    /// Compare every CSR.
    pub fn strict() -> Self {
        Self {
            ignored_csrs: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterValueDiff {
    pub index: usize,
    pub name: String,
    pub first: u64,
    pub second: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsrValueDiff {
    pub name: String,
    pub first: u64,
    pub second: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterDiff {
    pub int_registers: Vec<RegisterValueDiff>,
    pub core_csrs: Vec<CsrValueDiff>,
    /// Set when only one dump carries floating-point state.
    pub float_presence: Option<(bool, bool)>,
    pub float_registers: Vec<RegisterValueDiff>,
    pub fcsr: Option<(Option<u64>, Option<u64>)>,
}

impl RegisterDiff {
    pub fn is_empty(&self) -> bool {
        self.int_registers.is_empty()
            && self.core_csrs.is_empty()
            && self.float_presence.is_none()
            && self.float_registers.is_empty()
            && self.fcsr.is_none()
    }

    pub fn has_register_differences(&self) -> bool {
        !self.int_registers.is_empty() || !self.float_registers.is_empty()
    }

    /// `xN`/`fN` names of every differing register.
    pub fn differing_registers(&self) -> Vec<String> {
        self.int_registers
            .iter()
            .map(|d| format!("x{}", d.index))
            .chain(self.float_registers.iter().map(|d| format!("f{}", d.index)))
            .collect()
    }
}

pub fn compare_register_dumps(
    first: &RegisterDump,
    second: &RegisterDump,
    options: &DiffOptions,
) -> RegisterDiff {
    let mut diff = RegisterDiff::default();

    for (i, (a, b)) in first
        .int_registers
        .iter()
        .zip(second.int_registers.iter())
        .enumerate()
    {
        if a != b {
            diff.int_registers.push(RegisterValueDiff {
                index: i,
                name: gpr_abi_name(i).to_string(),
                first: *a,
                second: *b,
            });
        }
    }

    for ((name, a), (_, b)) in first.core_csrs.named().zip(second.core_csrs.named()) {
        if a != b && !options.ignored_csrs.contains(name) {
            diff.core_csrs.push(CsrValueDiff {
                name: name.to_string(),
                first: a,
                second: b,
            });
        }
    }

    match (&first.float_registers, &second.float_registers) {
        (Some(fa), Some(fb)) => {
            for (i, (a, b)) in fa.iter().zip(fb.iter()).enumerate() {
                if a != b {
                    diff.float_registers.push(RegisterValueDiff {
                        index: i,
                        name: fpr_abi_name(i).to_string(),
                        first: *a,
                        second: *b,
                    });
                }
            }
        }
        (a, b) if a.is_some() != b.is_some() => {
            diff.float_presence = Some((a.is_some(), b.is_some()));
        }
        _ => {}
    }

    if first.float_csr != second.float_csr {
        diff.fcsr = Some((first.float_csr, second.float_csr));
    }

    diff
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DiffCategory {
    MipDifference { first: u64, second: u64 },
    McauseDifference { first: u64, second: u64 },
    MtvalDifference,
    OtherCsr { name: String },
    OnlyIn { emulator: EmulatorType, mcause: u64 },
}

impl DiffCategory {
    fn from_csr(name: &str, first: u64, second: u64) -> Self {
        match name {
            "mip" => DiffCategory::MipDifference { first, second },
            "mcause" => DiffCategory::McauseDifference { first, second },
            "mtval" => DiffCategory::MtvalDifference,
            other => DiffCategory::OtherCsr {
                name: other.to_string(),
            },
        }
    }

    pub fn is_rocket_only_illegal(&self) -> bool {
        matches!(
            self,
            DiffCategory::OnlyIn {
                emulator: EmulatorType::Rocket,
                mcause: ILLEGAL_INSTRUCTION,
            }
        )
    }

    pub fn name(&self) -> String {
        match self {
            DiffCategory::MipDifference { .. } => "MIP difference".to_string(),
            DiffCategory::McauseDifference { .. } => "MCAUSE difference".to_string(),
            DiffCategory::MtvalDifference => "MTVAL difference".to_string(),
            DiffCategory::OtherCsr { name } => format!("{} difference", name),
            DiffCategory::OnlyIn { emulator, .. } => format!("Only in {}", emulator),
        }
    }
}

impl fmt::Display for DiffCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffCategory::MipDifference { first, second } => {
                write!(f, "MIP 0x{:X} vs 0x{:X}", first, second)
            }
            DiffCategory::McauseDifference { first, second } => write!(
                f,
                "MCAUSE 0x{:X} ({}) vs 0x{:X} ({})",
                first,
                exception_description(*first),
                second,
                exception_description(*second)
            ),
            DiffCategory::MtvalDifference => write!(f, "MTVAL value difference"),
            DiffCategory::OtherCsr { name } => write!(f, "{} value difference", name),
            DiffCategory::OnlyIn { emulator, mcause } => write!(
                f,
                "Only in {}: {} (mcause=0x{:X})",
                emulator,
                exception_description(*mcause),
                mcause
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorizedDiffs {
    pub category: DiffCategory,
    pub count: usize,
    /// Sorted, unique.
    pub pc_list: Vec<u64>,
    /// One entry per `pc_list` element.
    pub traces: Vec<Option<InstructionTrace>>,
}

struct RawDiff {
    pc: u64,
    category: DiffCategory,
    trace: Option<InstructionTrace>,
}

fn categorize(raw: Vec<RawDiff>) -> Vec<CategorizedDiffs> {
    let mut groups: BTreeMap<DiffCategory, Vec<RawDiff>> = BTreeMap::new();
    for d in raw {
        groups.entry(d.category.clone()).or_default().push(d);
    }

    let mut out: Vec<CategorizedDiffs> = groups
        .into_iter()
        .map(|(category, diffs)| {
            let mut pc_list: Vec<u64> = diffs.iter().map(|d| d.pc).collect();
            pc_list.sort_unstable();
            pc_list.dedup();
            let traces = pc_list
                .iter()
                .map(|pc| {
                    diffs
                        .iter()
                        .find(|d| d.pc == *pc)
                        .and_then(|d| d.trace.clone())
                })
                .collect();
            CategorizedDiffs {
                category,
                count: diffs.len(),
                pc_list,
                traces,
            }
        })
        .collect();

    out.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.category.name().cmp(&b.category.name()))
    });
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairedException {
    pub first: ExceptionDump,
    pub second: ExceptionDump,
    pub differences: Vec<CsrValueDiff>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionListDiff {
    pub first_emulator: EmulatorType,
    pub second_emulator: EmulatorType,
    pub only_in_first: Vec<ExceptionDump>,
    pub only_in_second: Vec<ExceptionDump>,
    /// Pairs matched by `mepc` whose CSRs differ.
    pub paired: Vec<PairedException>,
    pub matched: usize,
    pub categories: Vec<CategorizedDiffs>,
}

impl ExceptionListDiff {
    pub fn is_empty(&self) -> bool {
        self.only_in_first.is_empty() && self.only_in_second.is_empty() && self.paired.is_empty()
    }

    pub fn difference_count(&self) -> usize {
        self.categories.iter().map(|c| c.count).sum()
    }

    pub fn has_rocket_only_illegal(&self) -> bool {
        self.categories
            .iter()
            .any(|c| c.category.is_rocket_only_illegal())
    }

    /// Source lines of illegal instructions only Rocket trapped on.
    pub fn rocket_only_illegal_sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = self
            .categories
            .iter()
            .filter(|c| c.category.is_rocket_only_illegal())
            .flat_map(|c| c.traces.iter().flatten())
            .map(|t| t.original_instruction.clone())
            .collect();
        sources.sort_unstable();
        sources.dedup();
        sources
    }
}

pub fn compare_exception_lists(
    first: &[ExceptionDump],
    second: &[ExceptionDump],
    first_emulator: EmulatorType,
    second_emulator: EmulatorType,
) -> ExceptionListDiff {
    let mut by_mepc: HashMap<u64, Vec<usize>> = HashMap::new();
    for (i, e) in second.iter().enumerate() {
        by_mepc.entry(e.csrs.mepc).or_default().push(i);
    }
    let mut taken = vec![false; second.len()];
    let mut raw = Vec::new();
    let mut only_in_first = Vec::new();
    let mut paired = Vec::new();
    let mut matched = 0;

    for a in first {
        let mepc = a.csrs.mepc;
        let partner = by_mepc
            .get(&mepc)
            .and_then(|idxs| idxs.iter().copied().find(|&i| !taken[i]));

        let Some(j) = partner else {
            raw.push(RawDiff {
                pc: mepc,
                category: DiffCategory::OnlyIn {
                    emulator: first_emulator,
                    mcause: a.csrs.mcause,
                },
                trace: a.inst_trace.clone(),
            });
            only_in_first.push(a.clone());
            continue;
        };
        taken[j] = true;
        matched += 1;
        let b = &second[j];

        let differences: Vec<CsrValueDiff> = a
            .csrs
            .named()
            .zip(b.csrs.named())
            .filter(|((_, x), (_, y))| x != y)
            .map(|((name, x), (_, y))| CsrValueDiff {
                name: name.to_string(),
                first: x,
                second: y,
            })
            .collect();
        if differences.is_empty() {
            continue;
        }
        for d in &differences {
            raw.push(RawDiff {
                pc: mepc,
                category: DiffCategory::from_csr(&d.name, d.first, d.second),
                trace: a.inst_trace.clone(),
            });
        }
        paired.push(PairedException {
            first: a.clone(),
            second: b.clone(),
            differences,
        });
    }

    let only_in_second: Vec<ExceptionDump> = second
        .iter()
        .zip(taken.iter())
        .filter(|(_, t)| !**t)
        .map(|(b, _)| {
            raw.push(RawDiff {
                pc: b.csrs.mepc,
                category: DiffCategory::OnlyIn {
                    emulator: second_emulator,
                    mcause: b.csrs.mcause,
                },
                trace: b.inst_trace.clone(),
            });
            b.clone()
        })
        .collect();

    ExceptionListDiff {
        first_emulator,
        second_emulator,
        only_in_first,
        only_in_second,
        paired,
        matched,
        categories: categorize(raw),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDiff {
    pub first_emulator: EmulatorType,
    pub second_emulator: EmulatorType,
    /// Set when only one side produced a final register dump.
    pub register_dump_presence: Option<(bool, bool)>,
    pub registers: Option<RegisterDiff>,
    pub exceptions: ExceptionListDiff,
}

impl OutputDiff {
    pub fn is_empty(&self) -> bool {
        self.register_dump_presence.is_none()
            && self.registers.as_ref().map_or(true, RegisterDiff::is_empty)
            && self.exceptions.is_empty()
    }

    pub fn has_register_differences(&self) -> bool {
        self.registers
            .as_ref()
            .is_some_and(RegisterDiff::has_register_differences)
    }

    pub fn differing_registers(&self) -> Vec<String> {
        self.registers
            .as_ref()
            .map(RegisterDiff::differing_registers)
            .unwrap_or_default()
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let file = File::open(path.as_ref())?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }

    /// Write `diff.json` and `diff.md` into `dir`.
    pub fn save(&self, dir: &Path) -> CoreResult<(PathBuf, PathBuf)> {
        std::fs::create_dir_all(dir)?;
        let json_path = dir.join("diff.json");
        let md_path = dir.join("diff.md");
        serde_json::to_writer_pretty(BufWriter::new(File::create(&json_path)?), self)?;
        std::fs::write(&md_path, self.to_string())?;
        Ok((json_path, md_path))
    }
}

pub fn compare_outputs(
    first: &ExecutionOutput,
    second: &ExecutionOutput,
    options: &DiffOptions,
) -> OutputDiff {
    let (register_dump_presence, registers) = match (&first.register_dump, &second.register_dump)
    {
        (Some(a), Some(b)) => (None, Some(compare_register_dumps(a, b, options))),
        (None, None) => (None, None),
        (a, b) => (Some((a.is_some(), b.is_some())), None),
    };
    OutputDiff {
        first_emulator: first.emulator,
        second_emulator: second.emulator,
        register_dump_presence,
        registers,
        exceptions: compare_exception_lists(
            &first.exceptions,
            &second.exceptions,
            first.emulator,
            second.emulator,
        ),
    }
}

fn presence(p: bool) -> &'static str {
    if p {
        "present"
    } else {
        "absent"
    }
}

impl fmt::Display for OutputDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (a, b) = (self.first_emulator, self.second_emulator);
        writeln!(f, "# Diff report: {} vs {}", a, b)?;
        writeln!(f)?;
        if self.is_empty() {
            writeln!(f, "No differences found.")?;
            return Ok(());
        }

        if let Some((pa, pb)) = self.register_dump_presence {
            writeln!(
                f,
                "Final register dump {} in {}, {} in {}.",
                presence(pa),
                a,
                presence(pb),
                b
            )?;
            writeln!(f)?;
        }

        if let Some(regs) = self.registers.as_ref().filter(|r| !r.is_empty()) {
            writeln!(f, "## Registers")?;
            writeln!(f)?;
            writeln!(f, "| Register | {} | {} |", a, b)?;
            writeln!(f, "|----------|-----|-----|")?;
            for d in &regs.int_registers {
                writeln!(
                    f,
                    "| `x{}` ({}) | `0x{:016X}` | `0x{:016X}` |",
                    d.index, d.name, d.first, d.second
                )?;
            }
            for d in &regs.float_registers {
                writeln!(
                    f,
                    "| `f{}` ({}) | `0x{:016X}` | `0x{:016X}` |",
                    d.index, d.name, d.first, d.second
                )?;
            }
            for d in &regs.core_csrs {
                writeln!(f, "| `{}` | `0x{:016X}` | `0x{:016X}` |", d.name, d.first, d.second)?;
            }
            if let Some((fa, fb)) = regs.fcsr {
                let show = |v: Option<u64>| v.map_or("-".to_string(), |v| format!("`0x{:X}`", v));
                writeln!(f, "| `fcsr` | {} | {} |", show(fa), show(fb))?;
            }
            if let Some((pa, pb)) = regs.float_presence {
                writeln!(f, "| FP state | {} | {} |", presence(pa), presence(pb))?;
            }
            writeln!(f)?;
        }

        let ex = &self.exceptions;
        if !ex.is_empty() {
            writeln!(f, "## Exceptions")?;
            writeln!(f)?;
            writeln!(
                f,
                "Matched by mepc: {}, only in {}: {}, only in {}: {}, differing pairs: {}",
                ex.matched,
                a,
                ex.only_in_first.len(),
                b,
                ex.only_in_second.len(),
                ex.paired.len()
            )?;
            writeln!(f)?;
            writeln!(f, "| Category | Count |")?;
            writeln!(f, "|----------|-------|")?;
            for c in &ex.categories {
                writeln!(f, "| {} | {} |", c.category, c.count)?;
            }
            writeln!(f)?;
            for c in &ex.categories {
                writeln!(f, "### {}", c.category)?;
                writeln!(f)?;
                for (pc, trace) in c.pc_list.iter().zip(c.traces.iter()) {
                    match trace {
                        Some(t) => writeln!(
                            f,
                            "- `0x{:016X}`: `{}` ({})",
                            pc, t.original_instruction, t.machine_code
                        )?,
                        None => writeln!(f, "- `0x{:016X}`", pc)?,
                    }
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
