use crate::header::PacketHeader;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Amplitudes below this value mark invalid or low-confidence returns.
pub const MIN_VALID_AMPLITUDE: u32 = 32;

/// Struct to hold one rotation of scan data.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Scan {
    /// Distance readings in millimeters.
    pub distances: Vec<u32>,
    /// Amplitude readings, parallel to `distances`.
    pub amplitudes: Vec<u32>,
    /// Headers of the packets the scan was assembled from.
    pub headers: Vec<PacketHeader>,
}

impl Scan {
    pub fn new() -> Scan {
        Scan::default()
    }

    /// Number of points received so far.
    pub fn len(&self) -> usize {
        self.distances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }

    /// Number of points the device announced for the full rotation.
    pub fn expected_points(&self) -> Option<usize> {
        self.headers.first().map(|h| h.num_points_scan as usize)
    }

    /// True when every announced point has arrived.
    pub fn is_complete(&self) -> bool {
        match self.expected_points() {
            Some(n) => self.len() >= n,
            None => false,
        }
    }

    /// True when the amplitude of point `index` is a valid return.
    pub fn is_valid_point(&self, index: usize) -> bool {
        self.amplitudes
            .get(index)
            .is_some_and(|a| *a >= MIN_VALID_AMPLITUDE)
    }
}
