// RvDiff - RISC-V Core Differential Testing
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Assembly harness around user code.
//!
//! The harness installs a trap handler that reports exception CSRs over HTIF
//! and steps past the faulting instruction, resets machine state, runs the
//! user code and finally dumps registers before exiting through `tohost`.
//! Every dump slot is 8 bytes wide; on RV32 the upper word is written as zero.

use crate::dump::{
    EXCEPTION_DUMP_SIZE, INT_DUMP_SIZE, INT_FLOAT_DUMP_SIZE, MARKER_EXCEPTION_CSR,
    MARKER_REGISTERS_INT_AND_FLOAT, MARKER_REGISTERS_INT_ONLY,
};
use rvdiff_config::{CoreProfile, Extension, Xlen};

const SAVE_AREA: &str = "framework_temp_save_area";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FloatWidth {
    None,
    Single,
    Double,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateOptions {
    pub xlen: Xlen,
    float: FloatWidth,
    pub hypervisor: bool,
    pub vector: bool,
}

impl TemplateOptions {
    pub fn for_profile(profile: &CoreProfile) -> Self {
        let float = if profile.has(Extension::D) {
            FloatWidth::Double
        } else if profile.has(Extension::F) {
            FloatWidth::Single
        } else {
            FloatWidth::None
        };
        Self {
            xlen: profile.xlen,
            float,
            hypervisor: profile.has(Extension::H),
            vector: profile.has(Extension::V),
        }
    }

    pub fn has_float(&self) -> bool {
        self.float != FloatWidth::None
    }

    pub fn render(&self, user_code: &str) -> String {
        let mut out = String::new();
        self.emit_macros(&mut out);
        self.emit_data(&mut out);
        self.emit_handler(&mut out);
        self.emit_main(&mut out, user_code);
        out
    }

    /// Render with one instruction per line, indented.
    pub fn render_instructions<S: AsRef<str>>(&self, insts: &[S]) -> String {
        let body = insts
            .iter()
            .map(|i| format!("    {}", i.as_ref()))
            .collect::<Vec<_>>()
            .join("\n");
        self.render(&body)
    }

    fn sx(&self, reg: &str, off: usize, base: &str) -> String {
        match self.xlen {
            Xlen::Rv64 => format!("sd {}, {}({})", reg, off, base),
            Xlen::Rv32 => format!("sw {}, {}({}); sw zero, {}({})", reg, off, base, off + 4, base),
        }
    }

    fn lx(&self, reg: &str, off: usize, base: &str) -> String {
        match self.xlen {
            Xlen::Rv64 => format!("ld {}, {}({})", reg, off, base),
            Xlen::Rv32 => format!("lw {}, {}({})", reg, off, base),
        }
    }

    fn fsx(&self, reg: &str, off: usize, base: &str) -> String {
        match self.float {
            FloatWidth::Single => {
                format!("fsw {}, {}({}); sw zero, {}({})", reg, off, base, off + 4, base)
            }
            _ => format!("fsd {}, {}({})", reg, off, base),
        }
    }

    fn fzero(&self, reg: u32) -> String {
        match (self.float, self.xlen) {
            (FloatWidth::Double, Xlen::Rv64) => format!("fmv.d.x f{}, x0", reg),
            (FloatWidth::Double, Xlen::Rv32) => format!("fcvt.d.w f{}, x0", reg),
            _ => format!("fmv.w.x f{}, x0", reg),
        }
    }

    fn emit_macros(&self, out: &mut String) {
        out.push_str("# Harness macros\n\n");

        let t_regs = ["t0", "t1", "t2", "t3", "t4", "t5"];
        out.push_str(".macro SAVE_T_REGS save_area_label\n");
        out.push_str("    csrw mscratch, t6\n    la   t6, \\save_area_label\n");
        for (i, r) in t_regs.iter().enumerate() {
            out.push_str(&format!("    {}\n", self.sx(r, i * 8, "t6")));
        }
        out.push_str("    csrr t5, mscratch\n");
        out.push_str(&format!("    {}\n", self.sx("t5", 48, "t6")));
        out.push_str("    csrr t6, mscratch\n.endm\n\n");

        out.push_str(".macro RESTORE_T_REGS save_area_label\n");
        out.push_str("    csrw mscratch, t6\n    la   t6, \\save_area_label\n");
        for (i, r) in t_regs.iter().enumerate() {
            out.push_str(&format!("    {}\n", self.lx(r, i * 8, "t6")));
        }
        out.push_str(&format!("    {}\n", self.lx("t6", 48, "t6")));
        out.push_str("    csrr t6, mscratch\n.endm\n\n");

        // HTIF syscall block: [SYS_write=64, fd=1, buf, len]
        out.push_str(".macro HTIF_PRINT_RAW data_label, data_size\n");
        out.push_str("    la   t0, htif_communication_buffer\n");
        out.push_str(&format!("    li   t1, 64; {}\n", self.sx("t1", 0, "t0")));
        out.push_str(&format!("    li   t1, 1; {}\n", self.sx("t1", 8, "t0")));
        out.push_str(&format!("    la   t1, \\data_label; {}\n", self.sx("t1", 16, "t0")));
        out.push_str(&format!("    li   t1, \\data_size; {}\n", self.sx("t1", 24, "t0")));
        out.push_str("    fence; la   t1, tohost\n");
        out.push_str(&format!("    {}\n", self.sx("t0", 0, "t1")));
        out.push_str("wait_htif_print_\\@:\n");
        out.push_str(&format!(
            "    la   t2, fromhost; {}; beqz t3, wait_htif_print_\\@\n",
            self.lx("t3", 0, "t2")
        ));
        out.push_str(&format!("    {}; fence\n", self.sx("zero", 0, "t2")));
        out.push_str(".endm\n\n");

        out.push_str(".macro HTIF_PRINT temp_save_area, data_label, data_size\n");
        out.push_str("    SAVE_T_REGS \\temp_save_area\n");
        out.push_str("    HTIF_PRINT_RAW \\data_label, \\data_size\n");
        out.push_str("    RESTORE_T_REGS \\temp_save_area\n.endm\n\n");

        self.emit_dump_all_regs(out);

        out.push_str(".macro DUMP_EXCEPTION_CSRS_RAW\n");
        out.push_str("    la   t0, exception_csr_dump_buffer\n");
        for (i, csr) in crate::dump::ExceptionCsrs::NAMES.iter().enumerate() {
            out.push_str(&format!(
                "    csrr t1, {}; {}\n",
                csr,
                self.sx("t1", i * 8, "t0")
            ));
        }
        out.push_str("    HTIF_PRINT_RAW exc_csr_dump_prefix, 8\n");
        out.push_str(&format!(
            "    HTIF_PRINT_RAW exception_csr_dump_buffer, {}\n.endm\n\n",
            EXCEPTION_DUMP_SIZE
        ));

        out.push_str(".macro EXIT_SIM\n    li   t0, 1; la   t1, tohost\n");
        out.push_str(&format!("    {}\n", self.sx("t0", 0, "t1")));
        out.push_str("infinite_exit_loop_\\@: j infinite_exit_loop_\\@\n.endm\n\n");

        self.emit_reset(out);
    }

    fn emit_dump_all_regs(&self, out: &mut String) {
        out.push_str(".macro DUMP_ALL_REGS_RAW\n");
        out.push_str("    csrw mscratch, t6\n    la t6, register_dump_buffer\n");
        for i in 0..31 {
            out.push_str(&format!("    {}\n", self.sx(&format!("x{}", i), i * 8, "t6")));
        }
        out.push_str("    csrr t5, mscratch\n");
        out.push_str(&format!("    {}\n", self.sx("t5", 248, "t6")));
        for (i, csr) in crate::dump::CoreCsrs::NAMES.iter().enumerate() {
            out.push_str(&format!(
                "    csrr t0, {}; {}\n",
                csr,
                self.sx("t0", 256 + i * 8, "t6")
            ));
        }

        if self.has_float() {
            out.push_str("    csrr t0, mstatus\n    li   t1, (1 << 13)\n");
            out.push_str("    or   t1, t0, t1\n    csrw mstatus, t1\n");
            out.push_str(&format!(
                "    csrr t1, fcsr; {}\n",
                self.sx("t1", INT_DUMP_SIZE, "t6")
            ));
            for i in 0..32 {
                out.push_str(&format!(
                    "    {}\n",
                    self.fsx(&format!("f{}", i), INT_DUMP_SIZE + 8 + i * 8, "t6")
                ));
            }
            out.push_str("    csrw mstatus, t0\n");
            out.push_str("    HTIF_PRINT_RAW full_reg_dump_prefix_with_fp, 8\n");
            out.push_str(&format!(
                "    HTIF_PRINT_RAW register_dump_buffer, {}\n",
                INT_FLOAT_DUMP_SIZE
            ));
        } else {
            out.push_str("    HTIF_PRINT_RAW full_reg_dump_prefix_no_fp, 8\n");
            out.push_str(&format!(
                "    HTIF_PRINT_RAW register_dump_buffer, {}\n",
                INT_DUMP_SIZE
            ));
        }
        out.push_str("    csrw mscratch, zero\n.endm\n\n");

        out.push_str(".macro DUMP_ALL_REGS temp_save_area\n");
        out.push_str("    SAVE_T_REGS \\temp_save_area\n    DUMP_ALL_REGS_RAW\n");
        out.push_str("    RESTORE_T_REGS \\temp_save_area\n.endm\n\n");
    }

    fn emit_reset(&self, out: &mut String) {
        out.push_str(".macro RESET_MACHINE_STATE\n    li t0, 0\n    li t1, 0\n");
        for csr in [
            "mstatus", "mie", "mip", "mepc", "mcause", "mtval", "mscratch", "medeleg", "mideleg",
        ] {
            out.push_str(&format!("    csrwi {}, 0\n", csr));
        }
        for i in 0..16 {
            out.push_str(&format!("    csrw pmpaddr{}, x0\n", i));
        }
        let pmpcfgs: &[u32] = match self.xlen {
            Xlen::Rv64 => &[0, 2],
            Xlen::Rv32 => &[0, 1, 2, 3],
        };
        for i in pmpcfgs {
            out.push_str(&format!("    csrw pmpcfg{}, x0\n", i));
        }

        out.push_str("    csrwi mcounteren, 0\n    csrwi scounteren, 0\n");
        out.push_str("    csrwi mcountinhibit, 0\n    csrw mcycle, t0; csrw minstret, t0\n");
        for i in 3..32 {
            out.push_str(&format!("    csrw mhpmcounter{}, t0; csrw mhpmevent{}, t0\n", i, i));
        }
        out.push_str("    csrwi tselect, 0; csrwi tdata1, 0; csrwi tdata2, 0\n");
        out.push_str("    csrwi tselect, 1; csrwi tdata1, 0; csrwi tdata2, 0\n");
        out.push_str("    csrwi tselect, 0\n");

        out.push_str("    csrwi sstatus, 0; csrwi sie, 0; csrwi sip, 0\n");
        out.push_str("    csrwi sepc, 0; csrwi scause, 0; csrwi stval, 0\n");
        out.push_str("    csrwi sscratch, 0; csrwi stvec, 0; csrwi satp, 0\n");

        if self.has_float() {
            out.push_str("    csrr t0, mstatus\n    li   t1, (1 << 13)\n");
            out.push_str("    or   t0, t0, t1\n    csrw mstatus, t0\n    csrwi fcsr, 0\n");
            for row in (0..32).collect::<Vec<u32>>().chunks(4) {
                let line: Vec<String> = row.iter().map(|&r| self.fzero(r)).collect();
                out.push_str(&format!("    {}\n", line.join("; ")));
            }
        }

        if self.vector {
            out.push_str("    csrr t0, mstatus\n    li   t1, (1 << 9)\n");
            out.push_str("    or   t0, t0, t1\n    csrw mstatus, t0\n");
            out.push_str("    csrwi vcsr, 0\n    csrwi vxrm, 0\n    csrwi vxsat, 0\n");
            out.push_str("    vsetvli t1, x0, e64, m8, ta, ma\n");
            for i in (0..32).step_by(8) {
                out.push_str(&format!("    vmv.v.x v{}, x0\n", i));
            }
            out.push_str("    vsetivli x0, 0, e8, m1, ta, ma\n");
        }

        if self.hypervisor {
            out.push_str("    csrwi hstatus, 0; csrwi hedeleg, 0; csrwi hideleg, 0\n");
            out.push_str("    csrwi hie, 0; csrwi hip, 0; csrwi hgeie, 0\n");
            out.push_str("    csrwi htval, 0; csrwi htinst, 0\n");
            out.push_str("    csrwi hgatp, 0; csrwi hcounteren, 0\n");
            if self.xlen == Xlen::Rv32 {
                out.push_str("    csrw htimedeltah, x0\n");
            }
            out.push_str("    csrwi vsstatus, 0; csrwi vsie, 0; csrwi vsip, 0\n");
            out.push_str("    csrwi vstvec, 0; csrwi vsscratch, 0; csrwi vsepc, 0\n");
            out.push_str("    csrwi vscause, 0; csrwi vstval, 0; csrwi vsatp, 0\n");
        }

        for i in 1..32 {
            out.push_str(&format!("    mv x{}, zero\n", i));
        }
        out.push_str(".endm\n\n");
    }

    fn emit_data(&self, out: &mut String) {
        out.push_str(".section .bss\n.align 4\n");
        out.push_str("register_dump_buffer:       .zero 1024\n");
        out.push_str(&format!(
            "exception_csr_dump_buffer:  .zero {}\n",
            EXCEPTION_DUMP_SIZE
        ));
        out.push_str(&format!("{}:   .zero 64\n\n", SAVE_AREA));

        out.push_str(".section .data\n.align 6\n");
        out.push_str("htif_communication_buffer: .zero 64\n");
        let dword = |label: &str, value: u64| format!("{}:\n    .dword 0x{:X}\n", label, value);
        if self.has_float() {
            out.push_str(&dword(
                "full_reg_dump_prefix_with_fp",
                MARKER_REGISTERS_INT_AND_FLOAT,
            ));
        } else {
            out.push_str(&dword("full_reg_dump_prefix_no_fp", MARKER_REGISTERS_INT_ONLY));
        }
        out.push_str(&dword("exc_csr_dump_prefix", MARKER_EXCEPTION_CSR));

        out.push_str("\n.section .tohost, \"aw\", @progbits\n.align 6\n");
        out.push_str(".globl tohost\ntohost:   .dword 0\n");
        out.push_str(".globl fromhost\nfromhost: .dword 0\n\n");
        out.push_str(".section .text\n.globl _start\n\n");
    }

    fn emit_handler(&self, out: &mut String) {
        out.push_str("exception_handler:\n");
        out.push_str(&format!("    SAVE_T_REGS {}\n", SAVE_AREA));
        out.push_str("    DUMP_EXCEPTION_CSRS_RAW\n");
        // Step over the trapping instruction: 4 bytes when the low bits are 0b11.
        out.push_str(
            "    csrr t0, mepc
    lhu t1, 0(t0)
    andi t2, t1, 0x3
    li t3, 0x3
    bne t2, t3, compressed_inst
    addi t0, t0, 4
    j update_mepc
compressed_inst:
    addi t0, t0, 2
update_mepc:
    csrw mepc, t0
    csrwi mcause, 0
    csrwi mtval, 0
    csrwi mip, 0
",
        );
        out.push_str(&format!("    RESTORE_T_REGS {}\n    mret\n\n", SAVE_AREA));
    }

    fn emit_main(&self, out: &mut String, user_code: &str) {
        out.push_str("_start:\n\n_init:\n    la t0, exception_handler\n    csrw mtvec, t0\n\n");
        out.push_str("    RESET_MACHINE_STATE\n\n_user_code:\n");
        out.push_str(user_code);
        out.push_str("\n\n");

        out.push_str(&format!("_dump_regs:\n    DUMP_ALL_REGS {}\n\n", SAVE_AREA));
        out.push_str("_exit:\n    EXIT_SIM\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::extract_user_code;
    use crate::dump::MarkerType;
    use rvdiff_config::{Catalog, MAX_EXTENSION_RV32, MAX_EXTENSION_RV64};

    fn options(name: &str) -> TemplateOptions {
        let profile = Catalog::builtin().resolve(name).unwrap();
        TemplateOptions::for_profile(&profile)
    }

    #[test]
    fn test_rv64_template() {
        let asm = options(MAX_EXTENSION_RV64).render("    add x1, x2, x3");
        assert!(asm.contains("sd x5, 40(t6)"));
        assert!(asm.contains("fsd f31, 656(t6)"));
        assert!(asm.contains("fmv.d.x f0, x0"));
        assert!(asm.contains("0xFEEDC0DE1000"));
        assert!(asm.contains("csrwi hstatus, 0"));
        assert!(asm.contains("csrw pmpcfg2, x0"));
        assert!(!asm.contains("pmpcfg1"));
        assert!(asm.contains("DUMP_EXCEPTION_CSRS_RAW\n    csrr t0, mepc"));
        assert_eq!(extract_user_code(&asm), vec!["add x1, x2, x3"]);
    }

    #[test]
    fn test_rv32_template_uses_word_stores() {
        let asm = options(MAX_EXTENSION_RV32).render("");
        assert!(asm.contains("sw x5, 40(t6); sw zero, 44(t6)"));
        assert!(!asm.contains("sd x5"));
        assert!(asm.contains("lw t0, 0(t6)"));
        assert!(asm.contains("fcvt.d.w f0, x0"));
        assert!(asm.contains("csrw htimedeltah, x0"));
        assert!(asm.contains("csrw pmpcfg3, x0"));
    }

    #[test]
    fn test_no_float_no_hypervisor() {
        let profile = Catalog::from_yaml(
            r#"
fragments:
  IntOnly:
    steps:
      - enable: [M, Zicsr]
profiles:
  Tiny:
    fragments: [IntOnly]
"#,
        )
        .unwrap()
        .resolve("Tiny")
        .unwrap();
        let asm = TemplateOptions::for_profile(&profile).render("");
        assert!(asm.contains("0xFEEDC0DE2000"));
        assert!(!asm.contains("fsd"));
        assert!(!asm.contains("DUMP_FPR_RAW"));
        assert!(!asm.contains("hstatus"));
    }

    /// Every `.dword` prefix the harness prints must be a marker the stream
    /// parser decodes.
    #[test]
    fn test_emitted_markers_are_parseable() {
        for name in [MAX_EXTENSION_RV64, MAX_EXTENSION_RV32] {
            let asm = options(name).render("");
            let markers: Vec<u64> = asm
                .lines()
                .filter_map(|l| l.trim().strip_prefix(".dword 0x"))
                .map(|hex| u64::from_str_radix(hex, 16).unwrap())
                .collect();
            assert_eq!(markers.len(), 2, "{}", name);
            for value in markers {
                assert!(MarkerType::from_value(value).is_some(), "0x{:X}", value);
            }
            assert!(!asm.contains("DUMP_GPR"));
            assert!(asm.contains("_dump_regs:\n    DUMP_ALL_REGS framework_temp_save_area"));
        }
    }
}
