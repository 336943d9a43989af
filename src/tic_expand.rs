//! Reconstruction of full tic numbers from their transmitted low byte.
//!
//! To save bandwidth only `tic & 0xff` is sent. The receiver rebuilds the high
//! bits from a trusted reference tic (its own `maketic`), assuming the true tic
//! lies within [`EXPANSION_WINDOW`] of the reference's low byte.

use crate::report_violation;
use crate::telemetry::{ViolationKind, ViolationSeverity};
use crate::Tic;

/// Half-width of the window around the reference's low byte in which a
/// transmitted low byte is assumed to fall without wrapping.
pub const EXPANSION_WINDOW: i32 = 64;

/// Rebuilds the full tic number for `low` using `reference` for the high bits.
///
/// With `delta = low - (reference & 0xff)`:
///
/// | delta | result |
/// |-------|--------|
/// | `-64..=64` | `(reference & !0xff) + low` |
/// | `> 64` | `(reference & !0xff) - 256 + low` (low byte is from the previous lap) |
/// | `< -64` | `(reference & !0xff) + 256 + low` (low byte is from the next lap) |
///
/// The result always has `low` as its low byte and lies within 192 tics of `reference`.
///
/// # Examples
///
/// ```
/// use lockstep_tics::{expand_tic, Tic};
///
/// assert_eq!(expand_tic(235, Tic::new(1000)), Tic::new(1003));
/// assert_eq!(expand_tic(10, Tic::new(1000)), Tic::new(1034));
/// assert_eq!(expand_tic(250, Tic::new(1030)), Tic::new(1018));
/// ```
#[must_use]
pub fn expand_tic(low: u8, reference: Tic) -> Tic {
    let low = i32::from(low);
    let base = reference.high_bits();
    let delta = low - i32::from(reference.low_byte());

    match delta {
        d if (-EXPANSION_WINDOW..=EXPANSION_WINDOW).contains(&d) => base + low,
        d if d > EXPANSION_WINDOW => base - 256 + low,
        d if d < -EXPANSION_WINDOW => base + 256 + low,
        _ => {
            // delta is an integer, one of the arms above always matches.
            report_violation!(
                ViolationSeverity::Critical,
                ViolationKind::TicExpansion,
                "no expansion branch matched: low={}, reference={}, delta={}",
                low,
                reference,
                delta
            );
            Tic::ZERO
        },
    }
}
