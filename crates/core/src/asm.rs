// RvDiff - RISC-V Core Differential Testing
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Text-level edits on harness assembly: user code extraction, instruction
//! removal and register dependency slicing.

use crate::names::canonical_register;
use crate::{CoreError, CoreResult};
use std::collections::HashSet;
use tracing::debug;

pub const USER_CODE_LABEL: &str = "_user_code:";

fn is_label(trimmed: &str) -> bool {
    trimmed.ends_with(':') && !trimmed.contains(char::is_whitespace)
}

fn strip_comment(line: &str) -> &str {
    line.split('#').next().unwrap_or("").trim()
}

/// Comparable form of an instruction line: no comment, single spaces, no
/// space after commas.
pub fn normalize_instruction(line: &str) -> String {
    strip_comment(line)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace(", ", ",")
}

/// Instructions between `_user_code:` and the next label.
pub fn extract_user_code(asm: &str) -> Vec<String> {
    asm.lines()
        .map(str::trim)
        .skip_while(|l| *l != USER_CODE_LABEL)
        .skip(1)
        .take_while(|l| !is_label(l))
        .map(strip_comment)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Registers named in an instruction, in operand order, as `xN`/`fN`.
///
/// The mnemonic is skipped so that `fadd.s` or `fence` never parse as registers.
pub fn regs_in_instruction(inst: &str) -> Vec<String> {
    let body = strip_comment(inst);
    let operands = match body.split_once(char::is_whitespace) {
        Some((_, rest)) => rest,
        None => return Vec::new(),
    };
    operands
        .split(|c: char| c == ',' || c == '(' || c == ')' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .filter_map(canonical_register)
        .collect()
}

/// Backward slice of `insts` that can influence any register in `targets`.
///
/// The first register operand is taken as the destination. An instruction is
/// kept when it writes a live register; its sources then become live. `x0` is
/// never tracked.
pub fn minimal_slice(insts: &[String], targets: &[String]) -> Vec<String> {
    let mut live: HashSet<String> = targets
        .iter()
        .filter_map(|t| canonical_register(t))
        .filter(|r| r != "x0")
        .collect();
    if insts.is_empty() || live.is_empty() {
        return Vec::new();
    }

    let mut kept = Vec::new();
    for inst in insts.iter().rev() {
        let regs = regs_in_instruction(inst);
        let Some((dest, sources)) = regs.split_first() else {
            continue;
        };
        if !live.remove(dest) {
            continue;
        }
        for src in sources.iter().filter(|r| *r != "x0") {
            live.insert(src.clone());
        }
        kept.push(inst.clone());
    }
    kept.reverse();
    debug!(
        "Sliced {} of {} instructions for {:?}",
        kept.len(),
        insts.len(),
        targets
    );
    kept
}

/// Drop every line equal to one of `removed` after normalisation.
///
/// Returns the new text and the number of dropped lines.
pub fn remove_instructions(asm: &str, removed: &[String]) -> CoreResult<(String, usize)> {
    if removed.is_empty() {
        return Err(CoreError::NothingToRemove);
    }
    let targets: HashSet<String> = removed.iter().map(|r| normalize_instruction(r)).collect();

    let mut out = String::with_capacity(asm.len());
    let mut dropped = 0;
    for line in asm.lines() {
        let norm = normalize_instruction(line);
        if !norm.is_empty() && targets.contains(&norm) {
            dropped += 1;
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    Ok((out, dropped))
}

/// Replace the user code block with `instructions`, keeping header and footer.
pub fn splice_user_code(asm: &str, instructions: &[String]) -> CoreResult<String> {
    let lines: Vec<&str> = asm.lines().collect();
    let start = lines
        .iter()
        .position(|l| l.trim() == USER_CODE_LABEL)
        .ok_or(CoreError::NoUserCode)?;
    let end = lines[start + 1..]
        .iter()
        .position(|l| is_label(l.trim()))
        .map_or(lines.len(), |n| start + 1 + n);

    let mut out = String::new();
    for line in &lines[..=start] {
        out.push_str(line);
        out.push('\n');
    }
    for inst in instructions {
        out.push_str("    ");
        out.push_str(inst);
        out.push('\n');
    }
    for line in &lines[end..] {
        out.push_str(line);
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROGRAM: &str = "\
_start:
    la t0, trap
_user_code:
    # generated
    li a0, 5
    add x5, a0, x0   # t0 = a0
    mul x6, x5, x5
    addi x7, x0, 3
    fadd.s f1, f2, f3
_dump_regs:
    DUMP_ALL_REGS
_exit:
    EXIT_SIM
";

    #[test]
    fn test_extract_user_code() {
        assert_eq!(
            extract_user_code(PROGRAM),
            vec![
                "li a0, 5",
                "add x5, a0, x0",
                "mul x6, x5, x5",
                "addi x7, x0, 3",
                "fadd.s f1, f2, f3"
            ]
        );
    }

    #[test]
    fn test_regs_skip_mnemonic_and_immediates() {
        assert_eq!(regs_in_instruction("fadd.s ft0, fa1, f2"), vec!["f0", "f11", "f2"]);
        assert_eq!(regs_in_instruction("ld s1, 8(sp)"), vec!["x9", "x2"]);
        assert_eq!(regs_in_instruction("addi x7, x0, 3"), vec!["x7", "x0"]);
        assert!(regs_in_instruction("fence").is_empty());
    }

    #[test]
    fn test_minimal_slice_follows_dependencies() {
        let insts = extract_user_code(PROGRAM);
        assert_eq!(
            minimal_slice(&insts, &["x6".to_string()]),
            vec!["li a0, 5", "add x5, a0, x0", "mul x6, x5, x5"]
        );
        assert_eq!(
            minimal_slice(&insts, &["x7".to_string()]),
            vec!["addi x7, x0, 3"]
        );
    }

    #[test]
    fn test_slice_stops_at_last_writer() {
        let insts: Vec<String> = ["li t0, 1", "li t0, 2", "add t1, t0, t0"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            minimal_slice(&insts, &["x6".to_string()]),
            vec!["li t0, 2", "add t1, t0, t0"]
        );
    }

    #[test]
    fn test_remove_instructions_exact_match() {
        let (out, n) = remove_instructions(PROGRAM, &["add x5,a0,x0".to_string()]).unwrap();
        assert_eq!(n, 1);
        assert!(!out.contains("add x5"));
        // prefix of another line is not enough
        let (_, n) = remove_instructions(PROGRAM, &["mul x6, x5".to_string()]).unwrap();
        assert_eq!(n, 0);
        assert!(matches!(
            remove_instructions(PROGRAM, &[]),
            Err(CoreError::NothingToRemove)
        ));
    }

    #[test]
    fn test_splice_user_code() {
        let out = splice_user_code(PROGRAM, &["mul x6, x5, x5".to_string()]).unwrap();
        assert_eq!(extract_user_code(&out), vec!["mul x6, x5, x5"]);
        assert!(out.contains("_dump_regs:\n    DUMP_ALL_REGS"));
        assert!(out.starts_with("_start:\n"));
        assert!(matches!(
            splice_user_code("nop\n", &[]),
            Err(CoreError::NoUserCode)
        ));
    }
}
