// RvDiff - RISC-V Core Differential Testing
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! RISC-V ISA model: register width, extensions and `-march` strings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Xlen {
    #[serde(rename = "rv32", alias = "RV32", alias = "riscv32")]
    Rv32,
    #[default]
    #[serde(rename = "rv64", alias = "RV64", alias = "riscv64")]
    Rv64,
}

impl Xlen {
    pub fn bits(self) -> u32 {
        match self {
            Xlen::Rv32 => 32,
            Xlen::Rv64 => 64,
        }
    }

    pub fn base(self) -> &'static str {
        match self {
            Xlen::Rv32 => "rv32",
            Xlen::Rv64 => "rv64",
        }
    }

    /// Size in bytes of a general purpose register.
    pub fn reg_bytes(self) -> usize {
        self.bits() as usize / 8
    }
}

impl fmt::Display for Xlen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base())
    }
}

impl FromStr for Xlen {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rv32" | "32" | "riscv32" => Ok(Xlen::Rv32),
            "rv64" | "64" | "riscv64" => Ok(Xlen::Rv64),
            other => Err(format!("unknown register width '{}'", other)),
        }
    }
}

/// A RISC-V ISA extension.
///
/// Declaration order is the display order used by [`ExtensionSet`]:
/// single-letter extensions first, then multi-letter ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Extension {
    I,
    M,
    A,
    F,
    D,
    Q,
    C,
    V,
    B,
    H,
    S,
    Zicsr,
    Zifencei,
    Zicond,
    Zba,
    Zbb,
    Zbc,
    Zbs,
    Zbkb,
    Zbkc,
    Zbkx,
    Zfa,
    Zfh,
    Zfhmin,
    Zfbfmin,
    Zaamo,
    Zalrsc,
    Zacas,
    Zabha,
    Zcb,
    Zcmp,
    Zcmop,
    Zcd,
    Zkn,
    Zknd,
    Zkne,
    Zknh,
    Svinval,
    Smdbltrp,
}

impl Extension {
    pub const ALL: &'static [Extension] = &[
        Extension::I,
        Extension::M,
        Extension::A,
        Extension::F,
        Extension::D,
        Extension::Q,
        Extension::C,
        Extension::V,
        Extension::B,
        Extension::H,
        Extension::S,
        Extension::Zicsr,
        Extension::Zifencei,
        Extension::Zicond,
        Extension::Zba,
        Extension::Zbb,
        Extension::Zbc,
        Extension::Zbs,
        Extension::Zbkb,
        Extension::Zbkc,
        Extension::Zbkx,
        Extension::Zfa,
        Extension::Zfh,
        Extension::Zfhmin,
        Extension::Zfbfmin,
        Extension::Zaamo,
        Extension::Zalrsc,
        Extension::Zacas,
        Extension::Zabha,
        Extension::Zcb,
        Extension::Zcmp,
        Extension::Zcmop,
        Extension::Zcd,
        Extension::Zkn,
        Extension::Zknd,
        Extension::Zkne,
        Extension::Zknh,
        Extension::Svinval,
        Extension::Smdbltrp,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Extension::I => "i",
            Extension::M => "m",
            Extension::A => "a",
            Extension::F => "f",
            Extension::D => "d",
            Extension::Q => "q",
            Extension::C => "c",
            Extension::V => "v",
            Extension::B => "b",
            Extension::H => "h",
            Extension::S => "s",
            Extension::Zicsr => "zicsr",
            Extension::Zifencei => "zifencei",
            Extension::Zicond => "zicond",
            Extension::Zba => "zba",
            Extension::Zbb => "zbb",
            Extension::Zbc => "zbc",
            Extension::Zbs => "zbs",
            Extension::Zbkb => "zbkb",
            Extension::Zbkc => "zbkc",
            Extension::Zbkx => "zbkx",
            Extension::Zfa => "zfa",
            Extension::Zfh => "zfh",
            Extension::Zfhmin => "zfhmin",
            Extension::Zfbfmin => "zfbfmin",
            Extension::Zaamo => "zaamo",
            Extension::Zalrsc => "zalrsc",
            Extension::Zacas => "zacas",
            Extension::Zabha => "zabha",
            Extension::Zcb => "zcb",
            Extension::Zcmp => "zcmp",
            Extension::Zcmop => "zcmop",
            Extension::Zcd => "zcd",
            Extension::Zkn => "zkn",
            Extension::Zknd => "zknd",
            Extension::Zkne => "zkne",
            Extension::Zknh => "zknh",
            Extension::Svinval => "svinval",
            Extension::Smdbltrp => "smdbltrp",
        }
    }

    pub fn is_single_letter(self) -> bool {
        self.name().len() == 1
    }

    /// Extensions that must also be enabled for this one to be meaningful.
    pub fn requires(self) -> &'static [Extension] {
        match self {
            Extension::D => &[Extension::F],
            Extension::Q => &[Extension::D],
            Extension::H => &[Extension::S],
            Extension::Zfh | Extension::Zfhmin | Extension::Zfa | Extension::Zfbfmin => {
                &[Extension::F]
            }
            Extension::Zcd => &[Extension::D],
            _ => &[],
        }
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Extension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Extension::ALL
            .iter()
            .copied()
            .find(|ext| ext.name().eq_ignore_ascii_case(needle))
            .ok_or_else(|| format!("unknown ISA extension '{}'", needle))
    }
}

impl From<Extension> for String {
    fn from(ext: Extension) -> Self {
        ext.name().to_string()
    }
}

impl TryFrom<String> for Extension {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtensionSet(BTreeSet<Extension>);

impl ExtensionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ext: Extension) -> bool {
        self.0.insert(ext)
    }

    pub fn remove(&mut self, ext: Extension) -> bool {
        self.0.remove(&ext)
    }

    pub fn contains(&self, ext: Extension) -> bool {
        self.0.contains(&ext)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Extension> + '_ {
        self.0.iter().copied()
    }

    pub fn intersection(&self, other: &ExtensionSet) -> ExtensionSet {
        self.0.intersection(&other.0).copied().collect()
    }

    pub fn difference(&self, other: &ExtensionSet) -> ExtensionSet {
        self.0.difference(&other.0).copied().collect()
    }
}

impl FromIterator<Extension> for ExtensionSet {
    fn from_iter<T: IntoIterator<Item = Extension>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a ExtensionSet {
    type Item = &'a Extension;
    type IntoIter = std::collections::btree_set::Iter<'a, Extension>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for ExtensionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(Extension::name).collect();
        f.write_str(&names.join(", "))
    }
}

/// Build the GNU `-march` string for an extension set.
///
/// Single-letter extensions are emitted in canonical `imafdqcv` order,
/// multi-letter extensions follow sorted and joined with `_`.
pub fn march_string(xlen: Xlen, extensions: &ExtensionSet) -> String {
    let mut std_exts: BTreeSet<char> = BTreeSet::new();
    let mut other_exts: BTreeSet<String> = BTreeSet::new();

    for ext in extensions.iter() {
        let mut other = |name: &str| {
            other_exts.insert(name.to_string());
        };
        match ext {
            Extension::I => {
                std_exts.insert('i');
            }
            Extension::M => {
                std_exts.insert('m');
            }
            Extension::A => {
                std_exts.insert('a');
            }
            Extension::F => {
                std_exts.insert('f');
                other("zfa");
            }
            Extension::D => {
                std_exts.extend(['d', 'f']);
                other("zfa");
            }
            Extension::Q => {
                std_exts.extend(['q', 'd', 'f']);
                other("zfa");
                other("zfhmin");
            }
            Extension::C => {
                std_exts.insert('c');
            }
            Extension::V => {
                std_exts.insert('v');
            }
            Extension::H => other("h"),
            Extension::B => {
                for name in ["zba", "zbb", "zbc", "zbs"] {
                    other(name);
                }
            }
            Extension::Zaamo => {
                std_exts.insert('a');
                other("zaamo");
            }
            Extension::Zalrsc => {
                std_exts.insert('a');
            }
            Extension::Zacas => {
                std_exts.insert('a');
                other("zacas");
            }
            Extension::Zabha => {
                std_exts.insert('a');
                other("zabha");
                other("zacas");
            }
            Extension::Zcb => {
                std_exts.extend(['c', 'm']);
                other("zcb");
                other("zbb");
                if xlen == Xlen::Rv64 {
                    other("zba");
                }
            }
            Extension::Zcmp | Extension::Zcmop => {
                std_exts.insert('c');
                other(ext.name());
            }
            Extension::Zcd => {
                std_exts.extend(['c', 'd', 'f']);
                other("zcd");
            }
            Extension::Zfh => {
                std_exts.extend(['d', 'f']);
                other("zfh");
                other("zfa");
            }
            Extension::Zfbfmin => {
                std_exts.insert('f');
                other("zfbfmin");
            }
            Extension::Smdbltrp => {
                other("smdbltrp");
                other("smctr");
            }
            // Privilege mode, implied by the toolchain.
            Extension::S => {}
            _ => other(ext.name()),
        }
    }

    assemble_march(xlen.base(), std_exts, other_exts)
}

fn assemble_march(base: &str, mut std_exts: BTreeSet<char>, other_exts: BTreeSet<String>) -> String {
    if std_exts.is_empty() && other_exts.is_empty() {
        return format!("{}i", base);
    }
    std_exts.insert('i');

    let mut march = String::from(base);
    for c in "imafdqcv".chars() {
        if std_exts.remove(&c) {
            march.push(c);
        }
    }
    march.extend(std_exts);

    if !other_exts.is_empty() {
        march.push('_');
        march.push_str(&other_exts.into_iter().collect::<Vec<_>>().join("_"));
    }
    march
}

/// Reduce a `-march` string to what the GNU preprocessor accepts.
///
/// Only `imafdc` survive from the base part and `d` is always present.
pub fn gcc_preprocess_march(march: &str) -> String {
    let base = march.split('_').next().unwrap_or(march);
    let (prefix, letters) = if let Some(rest) = base.strip_prefix("rv32") {
        ("rv32", rest)
    } else if let Some(rest) = base.strip_prefix("rv64") {
        ("rv64", rest)
    } else {
        return "rv64id".to_string();
    };

    let mut out = String::from(prefix);
    out.push('i');
    for c in "mafdc".chars() {
        if c == 'd' || letters.contains(c) {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(exts: &[Extension]) -> ExtensionSet {
        exts.iter().copied().collect()
    }

    #[test]
    fn test_empty_set_is_base_integer() {
        assert_eq!(march_string(Xlen::Rv64, &ExtensionSet::new()), "rv64i");
        assert_eq!(march_string(Xlen::Rv32, &ExtensionSet::new()), "rv32i");
    }

    #[test]
    fn test_canonical_order() {
        use Extension::*;
        let exts = set(&[C, M, I, A, F, D]);
        assert_eq!(march_string(Xlen::Rv64, &exts), "rv64imafdc_zfa");
    }

    #[test]
    fn test_multi_letter_sorted() {
        use Extension::*;
        let exts = set(&[I, Zbs, Zba, Zicsr, Zbb]);
        assert_eq!(march_string(Xlen::Rv32, &exts), "rv32i_zba_zbb_zbs_zicsr");
    }

    #[test]
    fn test_hypervisor_and_supervisor() {
        use Extension::*;
        let exts = set(&[I, H, S]);
        assert_eq!(march_string(Xlen::Rv64, &exts), "rv64i_h");
    }

    #[test]
    fn test_zfh_implies_double() {
        let exts = set(&[Extension::Zfh]);
        assert_eq!(march_string(Xlen::Rv64, &exts), "rv64ifd_zfa_zfh");
    }

    #[test]
    fn test_zcb_width_dependent() {
        let exts = set(&[Extension::Zcb]);
        assert_eq!(march_string(Xlen::Rv64, &exts), "rv64imc_zba_zbb_zcb");
        assert_eq!(march_string(Xlen::Rv32, &exts), "rv32imc_zbb_zcb");
    }

    #[test]
    fn test_supervisor_alone() {
        // S contributes nothing, but the set is not empty so I is forced.
        let exts = set(&[Extension::S]);
        assert_eq!(march_string(Xlen::Rv64, &exts), "rv64i");
    }

    #[test]
    fn test_gcc_preprocess_march() {
        assert_eq!(gcc_preprocess_march("rv64imafdc_zba_zbb"), "rv64imafdc");
        assert_eq!(gcc_preprocess_march("rv32imc_zicsr"), "rv32imdc");
        assert_eq!(gcc_preprocess_march("rv64i"), "rv64id");
        assert_eq!(gcc_preprocess_march("weird"), "rv64id");
    }

    #[test]
    fn test_extension_parse_case_insensitive() {
        assert_eq!("zba".parse::<Extension>().unwrap(), Extension::Zba);
        assert_eq!("ZIFENCEI".parse::<Extension>().unwrap(), Extension::Zifencei);
        assert_eq!("h".parse::<Extension>().unwrap(), Extension::H);
        assert!("Zxyz".parse::<Extension>().is_err());
    }

    #[test]
    fn test_extension_set_yaml() {
        let exts: ExtensionSet = serde_yaml::from_str("[zbb, I, Zba]").unwrap();
        assert_eq!(exts.to_string(), "i, zba, zbb");
        assert_eq!(Extension::Zifencei.to_string(), "zifencei");
        let out = serde_yaml::to_string(&exts).unwrap();
        assert!(out.contains("- zba"));
        let back: ExtensionSet = serde_yaml::from_str(&out).unwrap();
        assert_eq!(back, exts);
    }

    #[test]
    fn test_xlen_parse() {
        assert_eq!("RV32".parse::<Xlen>().unwrap(), Xlen::Rv32);
        assert_eq!("64".parse::<Xlen>().unwrap(), Xlen::Rv64);
        let x: Xlen = serde_yaml::from_str("rv32").unwrap();
        assert_eq!(x, Xlen::Rv32);
    }
}
