// RvDiff - RISC-V Core Differential Testing
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Register ABI names and trap cause descriptions.

const GPR_ABI: [&str; 32] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6",
];

const FPR_ABI: [&str; 32] = [
    "ft0", "ft1", "ft2", "ft3", "ft4", "ft5", "ft6", "ft7", "fs0", "fs1", "fa0", "fa1", "fa2",
    "fa3", "fa4", "fa5", "fa6", "fa7", "fs2", "fs3", "fs4", "fs5", "fs6", "fs7", "fs8", "fs9",
    "fs10", "fs11", "ft8", "ft9", "ft10", "ft11",
];

pub fn gpr_abi_name(index: usize) -> &'static str {
    GPR_ABI.get(index).copied().unwrap_or("invalid")
}

pub fn fpr_abi_name(index: usize) -> &'static str {
    FPR_ABI.get(index).copied().unwrap_or("invalid")
}

/// Canonical `xN`/`fN` name for an architectural or ABI register name.
pub fn canonical_register(token: &str) -> Option<String> {
    let token = token.trim();
    if let Some(n) = numbered(token, 'x') {
        return Some(format!("x{}", n));
    }
    if let Some(n) = numbered(token, 'f') {
        return Some(format!("f{}", n));
    }
    if token == "fp" {
        return Some("x8".to_string());
    }
    if let Some(i) = GPR_ABI.iter().position(|&n| n == token) {
        return Some(format!("x{}", i));
    }
    FPR_ABI
        .iter()
        .position(|&n| n == token)
        .map(|i| format!("f{}", i))
}

fn numbered(token: &str, prefix: char) -> Option<u32> {
    let rest = token.strip_prefix(prefix)?;
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok().filter(|n| *n < 32)
}

/// Interrupt flag for either register width.
pub fn is_interrupt(mcause: u64) -> bool {
    mcause >> 63 == 1 || mcause >> 31 == 1
}

pub fn cause_code(mcause: u64) -> u64 {
    mcause & 0x7FFF_FFFF
}

pub fn exception_description(mcause: u64) -> String {
    let code = cause_code(mcause);
    let known = if is_interrupt(mcause) {
        match code {
            0 => Some("User software interrupt"),
            1 => Some("Supervisor software interrupt"),
            2 => Some("Virtual supervisor software interrupt"),
            3 => Some("Machine software interrupt"),
            4 => Some("User timer interrupt"),
            5 => Some("Supervisor timer interrupt"),
            6 => Some("Virtual supervisor timer interrupt"),
            7 => Some("Machine timer interrupt"),
            8 => Some("User external interrupt"),
            9 => Some("Supervisor external interrupt"),
            10 => Some("Virtual supervisor external interrupt"),
            11 => Some("Machine external interrupt"),
            12 => Some("Supervisor guest external interrupt"),
            _ => None,
        }
    } else {
        match code {
            0 => Some("Instruction address misaligned"),
            1 => Some("Instruction access fault"),
            2 => Some("Illegal instruction"),
            3 => Some("Breakpoint"),
            4 => Some("Load address misaligned"),
            5 => Some("Load access fault"),
            6 => Some("Store/AMO address misaligned"),
            7 => Some("Store/AMO access fault"),
            8 => Some("Environment call from U-mode"),
            9 => Some("Environment call from S-mode"),
            10 => Some("Environment call from VS-mode"),
            11 => Some("Environment call from M-mode"),
            12 => Some("Instruction page fault"),
            13 => Some("Load page fault"),
            15 => Some("Store/AMO page fault"),
            20 => Some("Instruction guest-page fault"),
            21 => Some("Load guest-page fault"),
            22 => Some("Virtual instruction"),
            23 => Some("Store/AMO guest-page fault"),
            _ => None,
        }
    };
    match known {
        Some(s) => s.to_string(),
        None if is_interrupt(mcause) => format!("Unknown interrupt (code={})", code),
        None => format!("Unknown exception (code={})", code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abi_names() {
        assert_eq!(gpr_abi_name(0), "zero");
        assert_eq!(gpr_abi_name(31), "t6");
        assert_eq!(fpr_abi_name(10), "fa0");
        assert_eq!(fpr_abi_name(40), "invalid");
    }

    #[test]
    fn test_canonical_register() {
        assert_eq!(canonical_register("x5").as_deref(), Some("x5"));
        assert_eq!(canonical_register("a0").as_deref(), Some("x10"));
        assert_eq!(canonical_register("fp").as_deref(), Some("x8"));
        assert_eq!(canonical_register("fa1").as_deref(), Some("f11"));
        assert_eq!(canonical_register("f31").as_deref(), Some("f31"));
        assert_eq!(canonical_register("x32"), None);
        assert_eq!(canonical_register("fadd.s"), None);
        assert_eq!(canonical_register("0x10"), None);
    }

    #[test]
    fn test_exception_description() {
        assert_eq!(exception_description(2), "Illegal instruction");
        assert_eq!(
            exception_description(0x8000_0000_0000_0007),
            "Machine timer interrupt"
        );
        // RV32 interrupt bit
        assert_eq!(exception_description(0x8000_000B), "Machine external interrupt");
        assert_eq!(exception_description(14), "Unknown exception (code=14)");
    }
}
