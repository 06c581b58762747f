use std::ops::RangeInclusive;

/// Samples per scan the scanner can be configured to.
pub const SAMPLES_PER_SCAN: [u32; 29] = [
    25200, 16800, 12600, 10080, 8400, 7200, 6300, 5600, 5040, 4200, 3600, 2400, 1800, 1440, 1200,
    900, 800, 720, 600, 480, 450, 400, 360, 240, 180, 144, 120, 90, 72,
];

/// Rotation frequencies in Hertz the scanner can be configured to.
pub const SCAN_FREQUENCY_RANGE: RangeInclusive<u32> = 10..=50;

pub fn is_legal_samples_per_scan(samples: u32) -> bool {
    SAMPLES_PER_SCAN.contains(&samples)
}

pub fn is_legal_scan_frequency(frequency: u32) -> bool {
    SCAN_FREQUENCY_RANGE.contains(&frequency)
}
