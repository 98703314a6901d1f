//! Crate-level test suites spanning several modules.


use quickcheck::{Arbitrary, Gen};

/// Opt-in log output: `RUST_LOG=debug cargo test`.
pub(crate) fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A uniformly drawn value in `[lo, hi]`.
pub(crate) fn sample(g: &mut Gen, lo: f64, hi: f64) -> f64 {
    let u = f64::from(u32::arbitrary(g)) / f64::from(u32::MAX);
    lo + (hi - lo) * u
}
