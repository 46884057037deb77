use chrono::Utc;

/// Milliseconds since the Unix epoch, the unit of every `updatedAt` stamp.
#[must_use]
pub fn epoch_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_millis_is_monotonic_enough() {
        let a = epoch_millis();
        let b = epoch_millis();
        assert!(a > 1_600_000_000_000);
        assert!(b >= a);
    }
}
