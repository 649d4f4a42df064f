//! Build script for tandem
//!
//! Sets up `arm_architecture` and `arm_abi` cfgs for the Cortex-M port

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

/// Entry point to the build script
fn main() {
    arm_targets::process();
}

// End of File
