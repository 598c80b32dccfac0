// RvDiff - RISC-V Core Differential Testing
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::Result;

pub mod catalog;
pub mod isa;
pub mod profile;
pub mod rocket;
pub mod run;

pub use catalog::{Catalog, ProfileDef, MAX_EXTENSION_RV32, MAX_EXTENSION_RV64};
pub use isa::{gcc_preprocess_march, march_string, Extension, ExtensionSet, Xlen};
pub use profile::{
    validate_profile, BusTopology, ComposeError, ConflictPolicy, CoreProfile, Fragment,
    FragmentDef, ProfileComposer,
};
pub use rocket::{generation_extensions, rocket_verified};
pub use run::{RocketSettings, RunConfig, SpikeSettings, ToolchainConfig};

/// Default schema version for YAML configs
pub(crate) fn default_schema_version() -> String {
    "1.0".to_string()
}

pub fn parse_size(size_str: &str) -> Result<u64> {
    use human_size::{Byte, Size, SpecificSize};
    let s: Size = size_str
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid size format: {}", e))?;
    let bytes: SpecificSize<Byte> = s.into();
    Ok(bytes.value() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("128KB").unwrap(), 128_000);
        assert_eq!(parse_size("4KiB").unwrap(), 4096);
        assert!(parse_size("not-a-size").is_err());
    }
}
