//! Fixed-width big-endian numbers.
//!
//! Character codes and bf destinations in CMaps are byte strings that behave
//! like unsigned big-endian integers. The binary format stores them up to 16
//! bytes wide, so arithmetic on them is done byte by byte with explicit carries
//! instead of on machine words.

/// Largest number width the binary format can describe (`dataSize + 1`).
pub(crate) const MAX_NUM_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HexNumber {
    bytes: [u8; MAX_NUM_SIZE],
    width: usize,
}

impl HexNumber {
    /// Zero with the given width. `width` must be in `1..=MAX_NUM_SIZE`.
    pub fn new(width: usize) -> HexNumber {
        debug_assert!((1..=MAX_NUM_SIZE).contains(&width));
        HexNumber {
            bytes: [0; MAX_NUM_SIZE],
            width,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.width]
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes[..self.width]
    }

    pub fn set_from(&mut self, other: &HexNumber) {
        self.bytes = other.bytes;
        self.width = other.width;
    }

    /// `self += other`, carrying across the whole width. The final carry is dropped.
    pub fn add(&mut self, other: &HexNumber) {
        let mut carry = 0u16;
        for i in (0..self.width).rev() {
            carry += self.bytes[i] as u16 + other.bytes[i] as u16;
            self.bytes[i] = carry as u8;
            carry >>= 8;
        }
    }

    /// `self += 1`, wrapping within the width.
    pub fn increment(&mut self) {
        for byte in self.as_bytes_mut().iter_mut().rev() {
            let (value, overflow) = byte.overflowing_add(1);
            *byte = value;
            if !overflow {
                break;
            }
        }
    }

    /// Low 32 bits of the number.
    pub fn to_u32(&self) -> u32 {
        be_to_u32(self.as_bytes())
    }
}

/// Big-endian value of `bytes`, keeping only the low 32 bits for longer inputs.
pub(crate) fn be_to_u32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32)
}

/// Minimal big-endian encoding of `value`, at least one byte long.
pub(crate) fn u32_to_be(value: u32) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take(3).take_while(|&&b| b == 0).count();
    bytes[skip..].to_vec()
}

/// Increment a destination string as an odometer: the last byte steps by one
/// and overflow carries leftwards. A carry out of the first byte prepends a
/// new `0x01` so the string grows rather than wraps.
pub(crate) fn increment_bytes(bytes: &mut Vec<u8>) {
    for byte in bytes.iter_mut().rev() {
        let (value, overflow) = byte.overflowing_add(1);
        *byte = value;
        if !overflow {
            return;
        }
    }
    bytes.insert(0, 1);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number(bytes: &[u8]) -> HexNumber {
        let mut n = HexNumber::new(bytes.len());
        n.as_bytes_mut().copy_from_slice(bytes);
        n
    }

    #[test]
    fn add_carries_across_all_bytes() {
        let mut a = number(&[0x00, 0xFF, 0xFF]);
        a.add(&number(&[0x00, 0x00, 0x01]));
        assert_eq!(a.as_bytes(), &[0x01, 0x00, 0x00]);
    }

    #[test]
    fn add_wider_than_machine_word() {
        let mut a = number(&[0xFF; 12]);
        let mut one = HexNumber::new(12);
        one.as_bytes_mut()[11] = 1;
        a.add(&one);
        assert_eq!(a.as_bytes(), &[0u8; 12]);
    }

    #[test]
    fn increment_wraps_within_width() {
        let mut a = number(&[0x12, 0xFF]);
        a.increment();
        assert_eq!(a.as_bytes(), &[0x13, 0x00]);

        let mut b = number(&[0xFF, 0xFF]);
        b.increment();
        assert_eq!(b.as_bytes(), &[0x00, 0x00]);
    }

    #[test]
    fn to_u32_keeps_low_bits() {
        assert_eq!(number(&[0x01, 0x02]).to_u32(), 0x0102);
        assert_eq!(number(&[0xAA, 0x01, 0x02, 0x03, 0x04]).to_u32(), 0x01020304);
    }

    #[test]
    fn minimal_big_endian() {
        assert_eq!(u32_to_be(0), vec![0]);
        assert_eq!(u32_to_be(0x41), vec![0x41]);
        assert_eq!(u32_to_be(0x1234), vec![0x12, 0x34]);
        assert_eq!(u32_to_be(0x01000000), vec![1, 0, 0, 0]);
    }

    #[test]
    fn increment_bytes_is_an_odometer() {
        let mut dst = vec![0x00, 0x41];
        increment_bytes(&mut dst);
        assert_eq!(dst, vec![0x00, 0x42]);

        let mut dst = vec![0x30, 0xFF, 0xFF];
        increment_bytes(&mut dst);
        assert_eq!(dst, vec![0x31, 0x00, 0x00]);

        let mut dst = vec![0xFF];
        increment_bytes(&mut dst);
        assert_eq!(dst, vec![0x01, 0x00]);
    }
}
