// RvDiff - RISC-V Core Differential Testing
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Before/after comparison of two diffs around a retry.

use crate::diff::{DiffCategory, OutputDiff};
use crate::CoreResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub exception_differences: usize,
    pub only_in_first: usize,
    pub only_in_second: usize,
    pub register_differences: usize,
    pub csr_differences: usize,
}

impl DiffSummary {
    pub fn of(diff: &OutputDiff) -> Self {
        let regs = diff.registers.as_ref();
        Self {
            exception_differences: diff.exceptions.difference_count(),
            only_in_first: diff.exceptions.only_in_first.len(),
            only_in_second: diff.exceptions.only_in_second.len(),
            register_differences: regs.map_or(0, |r| r.int_registers.len() + r.float_registers.len()),
            csr_differences: regs.map_or(0, |r| r.core_csrs.len()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryReport {
    pub removed_instructions: Vec<String>,
    pub before: DiffSummary,
    pub after: DiffSummary,
    /// Exception categories present before and gone after.
    pub resolved: Vec<DiffCategory>,
    pub remaining: Vec<DiffCategory>,
    pub new: Vec<DiffCategory>,
    pub registers_before: Vec<String>,
    pub registers_after: Vec<String>,
    /// Reduced program written for the remaining register differences.
    #[serde(default)]
    pub minimal_program: Option<PathBuf>,
}

impl RetryReport {
    pub fn new(removed: Vec<String>, before: &OutputDiff, after: &OutputDiff) -> Self {
        let cats = |d: &OutputDiff| -> BTreeSet<DiffCategory> {
            d.exceptions
                .categories
                .iter()
                .map(|c| c.category.clone())
                .collect()
        };
        let (b, a) = (cats(before), cats(after));

        Self {
            removed_instructions: removed,
            before: DiffSummary::of(before),
            after: DiffSummary::of(after),
            resolved: b.difference(&a).cloned().collect(),
            remaining: b.intersection(&a).cloned().collect(),
            new: a.difference(&b).cloned().collect(),
            registers_before: before.differing_registers(),
            registers_after: after.differing_registers(),
            minimal_program: None,
        }
    }

    pub fn improved(&self) -> bool {
        self.after.exception_differences < self.before.exception_differences
            || self.after.register_differences < self.before.register_differences
    }

    pub fn save(&self, dir: &Path) -> CoreResult<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join("retry_report.md");
        std::fs::write(&path, self.to_string())?;
        Ok(path)
    }
}

impl fmt::Display for RetryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Retry report")?;
        writeln!(f)?;
        writeln!(f, "## Removed instructions")?;
        writeln!(f)?;
        for inst in &self.removed_instructions {
            writeln!(f, "- `{}`", inst)?;
        }
        writeln!(f)?;
        writeln!(f, "| Metric | Before | After |")?;
        writeln!(f, "|--------|--------|-------|")?;
        let rows = [
            (
                "Exception differences",
                self.before.exception_differences,
                self.after.exception_differences,
            ),
            (
                "Only in first",
                self.before.only_in_first,
                self.after.only_in_first,
            ),
            (
                "Only in second",
                self.before.only_in_second,
                self.after.only_in_second,
            ),
            (
                "Register differences",
                self.before.register_differences,
                self.after.register_differences,
            ),
            (
                "CSR differences",
                self.before.csr_differences,
                self.after.csr_differences,
            ),
        ];
        for (name, before, after) in rows {
            writeln!(f, "| {} | {} | {} |", name, before, after)?;
        }
        writeln!(f)?;

        for (title, list) in [
            ("Resolved", &self.resolved),
            ("Remaining", &self.remaining),
            ("New", &self.new),
        ] {
            if list.is_empty() {
                continue;
            }
            writeln!(f, "## {}", title)?;
            writeln!(f)?;
            for c in list {
                writeln!(f, "- {}", c)?;
            }
            writeln!(f)?;
        }

        if !self.registers_after.is_empty() {
            writeln!(
                f,
                "Registers still differing: {}",
                self.registers_after.join(", ")
            )?;
        }
        if let Some(p) = &self.minimal_program {
            writeln!(f, "Minimal program: `{}`", p.display())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::compare_exception_lists;
    use crate::dump::{ExceptionCsrs, ExceptionDump};
    use crate::EmulatorType;

    fn diff_of(rocket: &[(u64, u64)]) -> OutputDiff {
        let list: Vec<ExceptionDump> = rocket
            .iter()
            .map(|&(mepc, mcause)| ExceptionDump {
                csrs: ExceptionCsrs {
                    mepc,
                    mcause,
                    ..ExceptionCsrs::default()
                },
                position: 0,
                inst_trace: None,
            })
            .collect();
        OutputDiff {
            first_emulator: EmulatorType::Spike,
            second_emulator: EmulatorType::Rocket,
            register_dump_presence: None,
            registers: None,
            exceptions: compare_exception_lists(
                &[],
                &list,
                EmulatorType::Spike,
                EmulatorType::Rocket,
            ),
        }
    }

    #[test]
    fn test_resolved_remaining_new() {
        let before = diff_of(&[(0x10, 2), (0x14, 2), (0x18, 5)]);
        let after = diff_of(&[(0x10, 5), (0x14, 4)]);
        let report = RetryReport::new(vec!["andn x1, x2, x3".into()], &before, &after);

        assert_eq!(report.before.exception_differences, 3);
        assert_eq!(report.after.exception_differences, 2);
        assert!(report.improved());
        assert_eq!(
            report.resolved,
            vec![DiffCategory::OnlyIn {
                emulator: EmulatorType::Rocket,
                mcause: 2
            }]
        );
        assert_eq!(report.remaining.len(), 1);
        assert_eq!(report.new.len(), 1);
    }

    #[test]
    fn test_save_writes_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let d = diff_of(&[(0x10, 2)]);
        let report = RetryReport::new(vec!["clmul a0, a1, a2".into()], &d, &d);
        let path = report.save(dir.path()).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("`clmul a0, a1, a2`"));
        assert!(text.contains("## Remaining"));
        assert!(!report.improved());
    }
}
