// RvDiff - RISC-V Core Differential Testing
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Extensions known to execute correctly on the Rocket emulator.
//!
//! D, Zbc (clmul), Zfh, Zicond (czero) and Q are enabled in some profiles but
//! produce spurious illegal-instruction traps on the emulator build, so
//! random generation leaves them out.

use crate::isa::{Extension, ExtensionSet, Xlen};
use crate::profile::CoreProfile;
use tracing::warn;

const ROCKET_VERIFIED: &[Extension] = &[
    Extension::I,
    Extension::M,
    Extension::F,
    Extension::C,
    Extension::Zicsr,
    Extension::Zifencei,
    Extension::Zba,
    Extension::Zbb,
    Extension::Zbs,
    Extension::H,
    Extension::S,
    Extension::Zaamo,
    Extension::Zalrsc,
];

pub fn rocket_verified(_xlen: Xlen) -> ExtensionSet {
    // Both widths currently share one table.
    ROCKET_VERIFIED.iter().copied().collect()
}

/// Extensions random tests may draw from for `profile`.
///
/// Extensions the profile enables but Rocket is not verified for are
/// logged and dropped.
pub fn generation_extensions(profile: &CoreProfile) -> ExtensionSet {
    let verified = rocket_verified(profile.xlen);
    let dropped = profile.extensions.difference(&verified);
    if !dropped.is_empty() {
        warn!(
            "{}: not generating for unverified extensions: {}",
            profile.name, dropped
        );
    }
    profile.extensions.intersection(&verified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, MAX_EXTENSION_RV64};

    #[test]
    fn test_generation_set_for_max_profile() {
        let profile = Catalog::builtin().resolve(MAX_EXTENSION_RV64).unwrap();
        let gen = generation_extensions(&profile);
        assert!(gen.contains(Extension::Zba));
        assert!(gen.contains(Extension::H));
        assert!(!gen.contains(Extension::D));
        assert!(!gen.contains(Extension::Zbc));
        assert!(!gen.contains(Extension::Zfh));
        // A is enabled by the base config but only the split atomics are verified.
        assert!(!gen.contains(Extension::A));
    }
}
