// RvDiff - RISC-V Core Differential Testing
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Random register-only instruction streams.
//!
//! Only computational instructions are produced: no branches, jumps, memory
//! accesses or system instructions, so every generated program runs straight
//! through to the final register dump.

use crate::{CoreError, CoreResult};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rvdiff_config::{Extension, ExtensionSet, Xlen};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationOrder {
    /// Grouped by extension.
    #[default]
    Sequential,
    Shuffled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    /// rd, rs1, rs2
    R,
    /// rd, rs1, simm12
    I,
    /// rd, rs1, shamt below the given width (0 means xlen)
    Shift(u32),
    /// rd, imm20
    U,
    /// rd, rs1
    Unary,
    /// fd, fs1, fs2
    FR,
    /// fd, fs1, fs2, fs3
    FR4,
    /// fd, fs1
    FUnary,
    /// rd, fs1
    FToX,
    /// fd, rs1
    XToF,
    /// rd, fs1, fs2
    FCmp,
}

#[derive(Debug, Clone, Copy)]
struct Op {
    mnemonic: &'static str,
    shape: Shape,
    rv64_only: bool,
}

const fn op(mnemonic: &'static str, shape: Shape) -> Op {
    Op {
        mnemonic,
        shape,
        rv64_only: false,
    }
}

const fn op64(mnemonic: &'static str, shape: Shape) -> Op {
    Op {
        mnemonic,
        shape,
        rv64_only: true,
    }
}

use Shape::*;

const OPS_I: &[Op] = &[
    op("add", R),
    op("sub", R),
    op("sll", R),
    op("slt", R),
    op("sltu", R),
    op("xor", R),
    op("srl", R),
    op("sra", R),
    op("or", R),
    op("and", R),
    op("addi", I),
    op("slti", I),
    op("sltiu", I),
    op("xori", I),
    op("ori", I),
    op("andi", I),
    op("slli", Shift(0)),
    op("srli", Shift(0)),
    op("srai", Shift(0)),
    op("lui", U),
    op("auipc", U),
    op64("addw", R),
    op64("subw", R),
    op64("sllw", R),
    op64("srlw", R),
    op64("sraw", R),
    op64("addiw", I),
    op64("slliw", Shift(32)),
    op64("srliw", Shift(32)),
    op64("sraiw", Shift(32)),
];

const OPS_M: &[Op] = &[
    op("mul", R),
    op("mulh", R),
    op("mulhsu", R),
    op("mulhu", R),
    op("div", R),
    op("divu", R),
    op("rem", R),
    op("remu", R),
    op64("mulw", R),
    op64("divw", R),
    op64("divuw", R),
    op64("remw", R),
    op64("remuw", R),
];

const OPS_ZBA: &[Op] = &[
    op("sh1add", R),
    op("sh2add", R),
    op("sh3add", R),
    op64("add.uw", R),
    op64("sh1add.uw", R),
    op64("sh2add.uw", R),
    op64("sh3add.uw", R),
    op64("slli.uw", Shift(0)),
];

const OPS_ZBB: &[Op] = &[
    op("andn", R),
    op("orn", R),
    op("xnor", R),
    op("clz", Unary),
    op("ctz", Unary),
    op("cpop", Unary),
    op("max", R),
    op("maxu", R),
    op("min", R),
    op("minu", R),
    op("sext.b", Unary),
    op("sext.h", Unary),
    op("zext.h", Unary),
    op("rol", R),
    op("ror", R),
    op("rori", Shift(0)),
    op("orc.b", Unary),
    op("rev8", Unary),
    op64("clzw", Unary),
    op64("ctzw", Unary),
    op64("cpopw", Unary),
    op64("rolw", R),
    op64("rorw", R),
    op64("roriw", Shift(32)),
];

const OPS_ZBC: &[Op] = &[op("clmul", R), op("clmulh", R), op("clmulr", R)];

const OPS_ZBS: &[Op] = &[
    op("bclr", R),
    op("bclri", Shift(0)),
    op("bext", R),
    op("bexti", Shift(0)),
    op("binv", R),
    op("binvi", Shift(0)),
    op("bset", R),
    op("bseti", Shift(0)),
];

const OPS_ZICOND: &[Op] = &[op("czero.eqz", R), op("czero.nez", R)];

const OPS_F: &[Op] = &[
    op("fadd.s", FR),
    op("fsub.s", FR),
    op("fmul.s", FR),
    op("fdiv.s", FR),
    op("fsqrt.s", FUnary),
    op("fmin.s", FR),
    op("fmax.s", FR),
    op("fsgnj.s", FR),
    op("fsgnjn.s", FR),
    op("fsgnjx.s", FR),
    op("fmadd.s", FR4),
    op("fmsub.s", FR4),
    op("fnmadd.s", FR4),
    op("fnmsub.s", FR4),
    op("feq.s", FCmp),
    op("flt.s", FCmp),
    op("fle.s", FCmp),
    op("fclass.s", FToX),
    op("fcvt.w.s", FToX),
    op("fcvt.wu.s", FToX),
    op("fcvt.s.w", XToF),
    op("fcvt.s.wu", XToF),
    op("fmv.x.w", FToX),
    op("fmv.w.x", XToF),
    op64("fcvt.l.s", FToX),
    op64("fcvt.lu.s", FToX),
    op64("fcvt.s.l", XToF),
    op64("fcvt.s.lu", XToF),
];

const OPS_D: &[Op] = &[
    op("fadd.d", FR),
    op("fsub.d", FR),
    op("fmul.d", FR),
    op("fdiv.d", FR),
    op("fsqrt.d", FUnary),
    op("fmin.d", FR),
    op("fmax.d", FR),
    op("fsgnj.d", FR),
    op("fsgnjn.d", FR),
    op("fsgnjx.d", FR),
    op("fmadd.d", FR4),
    op("fmsub.d", FR4),
    op("fnmadd.d", FR4),
    op("fnmsub.d", FR4),
    op("feq.d", FCmp),
    op("flt.d", FCmp),
    op("fle.d", FCmp),
    op("fclass.d", FToX),
    op("fcvt.s.d", FUnary),
    op("fcvt.d.s", FUnary),
    op("fcvt.w.d", FToX),
    op("fcvt.wu.d", FToX),
    op("fcvt.d.w", XToF),
    op("fcvt.d.wu", XToF),
    op64("fcvt.l.d", FToX),
    op64("fcvt.lu.d", FToX),
    op64("fcvt.d.l", XToF),
    op64("fcvt.d.lu", XToF),
    op64("fmv.x.d", FToX),
    op64("fmv.d.x", XToF),
];

const OPS_ZFH: &[Op] = &[
    op("fadd.h", FR),
    op("fsub.h", FR),
    op("fmul.h", FR),
    op("fdiv.h", FR),
    op("fsqrt.h", FUnary),
    op("fmin.h", FR),
    op("fmax.h", FR),
    op("fsgnj.h", FR),
    op("fmadd.h", FR4),
    op("feq.h", FCmp),
    op("flt.h", FCmp),
    op("fle.h", FCmp),
    op("fclass.h", FToX),
    op("fcvt.h.s", FUnary),
    op("fcvt.s.h", FUnary),
    op("fcvt.w.h", FToX),
    op("fcvt.h.w", XToF),
    op("fmv.x.h", FToX),
    op("fmv.h.x", XToF),
    op64("fcvt.l.h", FToX),
    op64("fcvt.h.l", XToF),
];

fn ops_for(ext: Extension) -> Option<&'static [Op]> {
    match ext {
        Extension::I => Some(OPS_I),
        Extension::M => Some(OPS_M),
        Extension::Zba => Some(OPS_ZBA),
        Extension::Zbb => Some(OPS_ZBB),
        Extension::Zbc => Some(OPS_ZBC),
        Extension::Zbs => Some(OPS_ZBS),
        Extension::Zicond => Some(OPS_ZICOND),
        Extension::F => Some(OPS_F),
        Extension::D => Some(OPS_D),
        Extension::Zfh => Some(OPS_ZFH),
        _ => None,
    }
}

pub fn is_generatable(ext: Extension) -> bool {
    ops_for(ext).is_some()
}

/// Extensions of `set` that have instruction tables.
pub fn generatable(set: &ExtensionSet) -> Vec<Extension> {
    set.iter().filter(|e| is_generatable(*e)).collect()
}

pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

#[derive(Debug, Clone)]
pub struct InstructionGenerator {
    xlen: Xlen,
    order: GenerationOrder,
    counts: BTreeMap<Extension, usize>,
}

impl InstructionGenerator {
    pub fn new(xlen: Xlen) -> Self {
        Self {
            xlen,
            order: GenerationOrder::default(),
            counts: BTreeMap::new(),
        }
    }

    pub fn with(mut self, ext: Extension, count: usize) -> Self {
        *self.counts.entry(ext).or_insert(0) += count;
        self
    }

    pub fn order(mut self, order: GenerationOrder) -> Self {
        self.order = order;
        self
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn generate<G: Rng>(&self, rng: &mut G) -> CoreResult<Vec<String>> {
        let mut out = Vec::with_capacity(self.total());
        for (&ext, &count) in &self.counts {
            if count == 0 {
                continue;
            }
            let table: Vec<&Op> = ops_for(ext)
                .ok_or_else(|| {
                    CoreError::Generation(format!("no instruction table for {}", ext))
                })?
                .iter()
                .filter(|o| !o.rv64_only || self.xlen == Xlen::Rv64)
                .collect();
            for _ in 0..count {
                if let Some(o) = table.choose(rng) {
                    out.push(self.render(o, rng));
                }
            }
        }
        if self.order == GenerationOrder::Shuffled {
            out.shuffle(rng);
        }
        Ok(out)
    }

    fn render<G: Rng>(&self, op: &Op, rng: &mut G) -> String {
        let m = op.mnemonic;
        match op.shape {
            R => format!("{} {}, {}, {}", m, xreg(rng, true), xreg(rng, false), xreg(rng, false)),
            I => format!(
                "{} {}, {}, {}",
                m,
                xreg(rng, true),
                xreg(rng, false),
                rng.gen_range(-2048..2048)
            ),
            Shift(width) => {
                let width = if width == 0 { self.xlen.bits() } else { width };
                format!(
                    "{} {}, {}, {}",
                    m,
                    xreg(rng, true),
                    xreg(rng, false),
                    rng.gen_range(0..width)
                )
            }
            U => format!("{} {}, {}", m, xreg(rng, true), rng.gen_range(0..0x10_0000)),
            Unary => format!("{} {}, {}", m, xreg(rng, true), xreg(rng, false)),
            FR => format!("{} {}, {}, {}", m, freg(rng), freg(rng), freg(rng)),
            FR4 => format!("{} {}, {}, {}, {}", m, freg(rng), freg(rng), freg(rng), freg(rng)),
            FUnary => format!("{} {}, {}", m, freg(rng), freg(rng)),
            FToX => format!("{} {}, {}", m, xreg(rng, true), freg(rng)),
            XToF => format!("{} {}, {}", m, freg(rng), xreg(rng, false)),
            FCmp => format!("{} {}, {}, {}", m, xreg(rng, true), freg(rng), freg(rng)),
        }
    }
}

/// x0 is never picked as a destination.
fn xreg<G: Rng>(rng: &mut G, dest: bool) -> String {
    format!("x{}", rng.gen_range(u32::from(dest)..32))
}

fn freg<G: Rng>(rng: &mut G) -> String {
    format!("f{}", rng.gen_range(0..32))
}
