// build.rs — target-feature detection for zbs.
//
// Emits `cargo:rustc-cfg=has_bmi2` when the compile target enables the BMI2
// instruction set, gating the PDEP-based select-in-word fast path in
// src/bits.rs. Everything compiles and runs without it; the portable
// fallback is used instead.
fn main() {
    let features = std::env::var("CARGO_CFG_TARGET_FEATURE").unwrap_or_default();
    if features.split(',').any(|f| f == "bmi2") {
        println!("cargo:rustc-cfg=has_bmi2");
    }
}
