/// Calculates the additive 6-bit checksum that follows every SCIP data span.
///
/// The sum of all covered bytes is truncated to its low 6 bits and offset by
/// `0x30`, so the result is always a printable character in `0x30..=0x6F`.
#[derive(Debug, Clone, Default)]
pub struct Checksum {
    current: u32,
}

impl Checksum {
    /// Creates a new `Checksum` instance, initialized to 0.
    #[inline]
    pub fn new() -> Checksum {
        Checksum { current: 0 }
    }

    /// Includes a slice of bytes in the checksum calculation.
    ///
    /// # Arguments
    ///
    /// * `data` - The byte slice to add into the running sum.
    #[inline]
    pub fn push_slice(&mut self, data: &[u8]) {
        for d in data {
            self.current = self.current.wrapping_add(u32::from(*d));
        }
    }

    /// Returns the calculated checksum byte.
    #[inline]
    pub fn checksum(&self) -> u8 {
        (self.current & 0x3F) as u8 + 0x30
    }
}

/// Computes the checksum byte of `data`.
#[inline]
pub fn checksum(data: &[u8]) -> u8 {
    let mut sum = Checksum::new();
    sum.push_slice(data);
    sum.checksum()
}

/// Returns `true` if `claimed` is the checksum byte of `data`.
#[inline]
pub fn verify(data: &[u8], claimed: u8) -> bool {
    checksum(data) == claimed
}
