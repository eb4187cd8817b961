//! Common time/period helpers for hmi_core.

/// Number of milliseconds in one second.
pub const MILLIS_PER_SEC: u64 = 1_000;

/// Compute the period in milliseconds for a given polling rate in Hz.
/// - Clamps `hz` to at least 1 to avoid division by zero.
/// - Ensures result is at least 1 millisecond.
#[inline]
pub fn period_ms(hz: u32) -> u64 {
    (MILLIS_PER_SEC / u64::from(hz.max(1))).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_clamps_both_ends() {
        assert_eq!(period_ms(0), 1000);
        assert_eq!(period_ms(200), 5);
        assert_eq!(period_ms(5000), 1);
    }
}
