// RvDiff - RISC-V Core Differential Testing
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use rvdiff_config::{
    BusTopology, Catalog, ConflictPolicy, Extension, RunConfig, Xlen, MAX_EXTENSION_RV32,
    MAX_EXTENSION_RV64,
};
use std::io::Write;

#[test]
fn test_catalog_file_extends_builtins() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
schema_version: "1.0"
fragments:
  WithCrypto:
    description: "Scalar crypto"
    steps:
      - enable: [Zkn]
  WithQuadCore:
    steps:
      - cores: 4
      - include: WithIncoherentBusTopology
profiles:
  CryptoRV32Config:
    fragments: [DefaultConfig, WithCrypto, WithQuadCore, WithRV32]
"#
    )
    .unwrap();

    let catalog = Catalog::load_with_builtins(file.path()).unwrap();
    assert!(catalog.profiles.contains_key(MAX_EXTENSION_RV64));

    let p = catalog.resolve("CryptoRV32Config").unwrap();
    assert_eq!(p.xlen, Xlen::Rv32);
    assert_eq!(p.cores, 4);
    assert_eq!(p.bus, BusTopology::Incoherent);
    assert!(p.has(Extension::Zkn));
    assert_eq!(p.lineage.last().map(String::as_str), Some("WithRV32"));
}

#[test]
fn test_catalog_file_can_redefine_builtin_fragment() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
fragments:
  WithBitManip:
    steps:
      - enable: [Zba, Zbb]
"#
    )
    .unwrap();

    let catalog = Catalog::load_with_builtins(file.path()).unwrap();
    let p = catalog.resolve(MAX_EXTENSION_RV32).unwrap();
    assert!(p.has(Extension::Zba));
    assert!(!p.has(Extension::Zbc));
    assert!(!p.has(Extension::Zbs));
}

#[test]
fn test_catalog_unknown_extension_is_parse_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
fragments:
  WithMystery:
    steps:
      - enable: [Zmystery]
"#
    )
    .unwrap();

    let err = Catalog::from_file(file.path()).unwrap_err();
    let chain = format!("{:#}", err);
    assert!(chain.contains("Zmystery"), "{chain}");
}

#[test]
fn test_missing_catalog_file() {
    assert!(Catalog::from_file("/nonexistent/rvdiff/catalog.yaml").is_err());
}

#[test]
fn test_strict_policy_from_manifest() {
    let yaml = r#"
conflict_policy: fail_fast
fragments:
  WithSecondWidth:
    steps:
      - width: rv64
profiles:
  Flip:
    fragments: [WithRV32, WithSecondWidth]
"#;
    let mut catalog = Catalog::builtin();
    catalog.merge(Catalog::from_yaml(yaml).unwrap());
    assert!(catalog.resolve("Flip").is_err());
    let p = catalog
        .resolve_with("Flip", Some(ConflictPolicy::LastWins))
        .unwrap();
    assert_eq!(p.xlen, Xlen::Rv64);
}

#[test]
fn test_run_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
schema_version: "1.0"
toolchain:
  prefix: "riscv32-unknown-elf-"
  linker_script: "env/link.ld"
spike:
  path: "/usr/local/bin/spike"
  extra_args: ["-p1"]
max_log_size: "2MB"
"#
    )
    .unwrap();

    let cfg = RunConfig::from_file(file.path()).unwrap();
    assert_eq!(cfg.toolchain.tool("objdump"), "riscv32-unknown-elf-objdump");
    assert_eq!(cfg.toolchain.linker_script.to_str(), Some("env/link.ld"));
    assert_eq!(cfg.spike.extra_args, vec!["-p1"]);
    assert_eq!(cfg.rocket.path, "emulators/rocket_emulator");
    assert_eq!(cfg.max_log_bytes().unwrap(), 2_000_000);
}
