use std::time::{Instant, SystemTime};

/// Returns the current unix timestamp (seconds elapsed since 1970-01-01).
#[inline]
pub fn timestamp_secs() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .expect("System clock is set before the unix epoch")
        .as_secs()
}

/// Seconds elapsed since `earlier`, for feeding `update(dt)` pumps.
#[inline]
pub fn elapsed_secs(earlier: Instant) -> f32 {
    earlier.elapsed().as_secs_f32()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_is_after_2020() {
        assert!(timestamp_secs() > 1_577_836_800);
    }

    #[test]
    fn test_elapsed_is_monotonic() {
        let earlier = Instant::now();
        assert!(elapsed_secs(earlier) >= 0.0);
    }
}
