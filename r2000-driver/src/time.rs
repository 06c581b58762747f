use std::time::{Duration, Instant};

pub(crate) fn sleep_ms(duration: u64) {
    std::thread::sleep(Duration::from_millis(duration));
}

/// True when more than `interval` passed since `since`, or `since` is unset.
pub(crate) fn elapsed_exceeds(since: Option<Instant>, interval: Duration) -> bool {
    match since {
        Some(t) => t.elapsed() > interval,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_exceeds() {
        assert!(elapsed_exceeds(None, Duration::from_secs(100)));
        assert!(!elapsed_exceeds(Some(Instant::now()), Duration::from_secs(100)));
        let past = Instant::now() - Duration::from_millis(50);
        assert!(elapsed_exceeds(Some(past), Duration::from_millis(10)));
    }
}
