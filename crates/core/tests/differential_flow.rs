// RvDiff - RISC-V Core Differential Testing
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use rvdiff_config::Catalog;
use rvdiff_core::asm::{extract_user_code, minimal_slice, remove_instructions};
use rvdiff_core::diff::{compare_outputs, DiffOptions, OutputDiff};
use rvdiff_core::dump::{
    encode_exception_dump, encode_register_dump, CoreCsrs, ExceptionCsrs, MarkerType,
    RegisterDump,
};
use rvdiff_core::output::ExecutionOutput;
use rvdiff_core::retry::RetryReport;
use rvdiff_core::template::TemplateOptions;
use rvdiff_core::trace::DisassemblyIndex;
use rvdiff_core::EmulatorType;

const LISTING: &str = "\
0000000080000100 <_user_code>:
    li a0, 5
    80000100:\t00500513          \tli\ta0,5
    clmul x6, a0, a0
    80000104:\t0aa51333          \tclmul\tt1,a0,a0
    add x7, x6, x0
    80000108:\t000303b3          \tadd\tt2,t1,zero
";

fn register_dump(x7: u64) -> RegisterDump {
    let mut int_registers = [0u64; 32];
    int_registers[10] = 5;
    int_registers[7] = x7;
    RegisterDump {
        dump_type: MarkerType::RegistersIntOnly,
        int_registers,
        core_csrs: CoreCsrs {
            mstatus: 0x8000_0000_0000_1800,
            ..CoreCsrs::default()
        },
        float_registers: None,
        float_csr: None,
        position: 0,
    }
}

fn stream(exceptions: &[(u64, u64)], x7: u64) -> Vec<u8> {
    let mut out = b"Test starting\n".to_vec();
    for &(mepc, mcause) in exceptions {
        out.extend(encode_exception_dump(&ExceptionCsrs {
            mepc,
            mcause,
            ..ExceptionCsrs::default()
        }));
    }
    out.extend(encode_register_dump(&register_dump(x7)));
    out.extend_from_slice(b"PASS\n");
    out
}

#[test]
fn test_rocket_only_illegal_instruction_is_removed() -> anyhow::Result<()> {
    let index = DisassemblyIndex::parse(LISTING);
    let spike = ExecutionOutput::from_bytes(&stream(&[], 0), EmulatorType::Spike, Some(&index));
    let rocket = ExecutionOutput::from_bytes(
        &stream(&[(0x8000_0104, 2)], 5),
        EmulatorType::Rocket,
        Some(&index),
    );
    assert!(spike.conversion_stats.conversion_successful);
    assert_eq!(rocket.exceptions.len(), 1);

    let diff = compare_outputs(&spike, &rocket, &DiffOptions::default());
    assert!(!diff.is_empty());
    assert!(diff.exceptions.has_rocket_only_illegal());
    assert_eq!(diff.differing_registers(), vec!["x7"]);

    let removed = diff.exceptions.rocket_only_illegal_sources();
    assert_eq!(removed, vec!["clmul x6, a0, a0"]);

    let profile = Catalog::builtin().resolve("MaxExtensionRV64Config")?;
    let asm = TemplateOptions::for_profile(&profile).render_instructions(&[
        "li a0, 5",
        "clmul x6, a0, a0",
        "add x7, x6, x0",
    ]);
    let (retried, dropped) = remove_instructions(&asm, &removed)?;
    assert_eq!(dropped, 1);
    assert_eq!(
        extract_user_code(&retried),
        vec!["li a0, 5", "add x7, x6, x0"]
    );

    // The retried run agrees on exceptions but x7 still differs.
    let rocket_retry =
        ExecutionOutput::from_bytes(&stream(&[], 6), EmulatorType::Rocket, Some(&index));
    let after = compare_outputs(&spike, &rocket_retry, &DiffOptions::default());
    let report = RetryReport::new(removed, &diff, &after);
    assert!(report.improved());
    assert_eq!(report.resolved.len(), 1);
    assert_eq!(report.registers_after, vec!["x7"]);

    let slice = minimal_slice(&extract_user_code(&retried), &report.registers_after);
    assert_eq!(slice, vec!["add x7, x6, x0"]);
    Ok(())
}

#[test]
fn test_artifacts_round_trip_through_disk() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let spike = ExecutionOutput::from_bytes(&stream(&[], 0), EmulatorType::Spike, None);
    let rocket = ExecutionOutput::from_bytes(
        &stream(&[(0x8000_0104, 2)], 0),
        EmulatorType::Rocket,
        None,
    );

    let (spike_json, spike_md) = spike.save(dir.path())?;
    assert!(spike_json.ends_with("spike_output.json"));
    assert!(spike_md.exists());
    let (rocket_json, _) = rocket.save(dir.path())?;

    let a = ExecutionOutput::load_json(&spike_json)?;
    let b = ExecutionOutput::load_json(&rocket_json)?;
    assert_eq!(a, spike);

    let diff = compare_outputs(&a, &b, &DiffOptions::default());
    let (diff_json, diff_md) = diff.save(dir.path())?;
    assert_eq!(OutputDiff::load_json(&diff_json)?, diff);
    assert!(std::fs::read_to_string(diff_md)?.contains("Rocket"));
    Ok(())
}
