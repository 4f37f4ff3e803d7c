//! 7-bit-safe payload codecs.
//!
//! The wire format reserves the top bit of every byte to mark command bytes,
//! so any 8-bit payload inside a sysex envelope has to be re-expressed with
//! the top bit clear. Two schemes are in use:
//!
//! - [`encode`]/[`decode`]: every byte becomes a `(low 7 bits, high bit)` pair.
//!   Used by I2C, serial bridging, strings, firmware names and most replies.
//! - [`pack_7bit`]/[`unpack_7bit`]: a continuous bit stream cut into 7-bit
//!   groups. Used by the 1-Wire sub-protocol only.

use thiserror::Error;

/// Errors raised by the pair codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Pair decoding was handed an odd number of bytes.
    #[error("malformed length: {0} bytes cannot be decoded as 7-bit pairs")]
    MalformedLength(usize),
}

/// Split every byte into a `(low 7 bits, high bit)` pair.
///
/// The result is a fresh vector twice the input length; every emitted byte
/// has its most significant bit clear.
///
/// ```
/// use firmata_host::codec::encode;
///
/// assert_eq!(encode(&[0, 1, 0xB2]), vec![0, 0, 1, 0, 0x32, 1]);
/// ```
pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() * 2);
    for &byte in data {
        out.push(byte & 0x7F);
        out.push((byte >> 7) & 0x7F);
    }
    out
}

/// Reassemble bytes from `(low, high)` pairs produced by [`encode`].
///
/// Fails with [`CodecError::MalformedLength`] when `pairs` has odd length.
pub fn decode(pairs: &[u8]) -> Result<Vec<u8>, CodecError> {
    if pairs.len() % 2 != 0 {
        return Err(CodecError::MalformedLength(pairs.len()));
    }
    Ok(pairs
        .chunks_exact(2)
        .map(|pair| (pair[0] & 0x7F) | ((pair[1] & 0x7F) << 7))
        .collect())
}

/// Combine a `(low, high)` pair into a 14-bit value.
pub fn word14(low: u8, high: u8) -> u16 {
    u16::from(low & 0x7F) | (u16::from(high & 0x7F) << 7)
}

/// Pack 8-bit bytes into a stream of 7-bit groups (1-Wire body encoding).
///
/// Eight input bytes become ceil(64 / 7) = 10 output bytes; a trailing
/// partial group is flushed as-is.
pub fn pack_7bit(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() * 8 / 7 + 1);
    let mut shift = 0u32;
    let mut previous = 0u8;

    for &byte in data {
        if shift == 0 {
            out.push(byte & 0x7F);
            shift = 1;
            previous = byte >> 7;
        } else {
            out.push(((byte << shift) & 0x7F) | previous);
            if shift == 6 {
                out.push(byte >> 1);
                shift = 0;
            } else {
                shift += 1;
                previous = byte >> (8 - shift);
            }
        }
    }

    if shift > 0 {
        out.push(previous);
    }
    out
}

/// Inverse of [`pack_7bit`]. Yields `len * 7 / 8` bytes; leftover bits are
/// padding and are ignored.
pub fn unpack_7bit(encoded: &[u8]) -> Vec<u8> {
    let expected = encoded.len() * 7 / 8;
    let mut out = Vec::with_capacity(expected);

    for i in 0..expected {
        let bit = i * 8;
        let pos = bit / 7;
        let shift = (bit % 7) as u32;
        let low = encoded[pos] >> shift;
        let high = encoded
            .get(pos + 1)
            .map(|next| ((u16::from(*next) << (7 - shift)) & 0xFF) as u8)
            .unwrap_or(0);
        out.push(low | high);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_arbitrary_data() {
        assert_eq!(encode(&[0, 1, 2, 3, 4]), vec![0, 0, 1, 0, 2, 0, 3, 0, 4, 0]);
    }

    #[test]
    fn test_decode_arbitrary_data() {
        assert_eq!(
            decode(&[0, 0, 1, 0, 2, 0, 3, 0, 4, 0]).unwrap(),
            vec![0, 1, 2, 3, 4]
        );
    }

    #[test]
    fn test_decode_rejects_odd_length() {
        let err = decode(&[0, 0, 1, 0, 2, 0, 3, 0, 4]).unwrap_err();
        assert_eq!(err, CodecError::MalformedLength(9));
        assert!(err.to_string().contains("malformed length"));
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        assert!(encode(&[]).is_empty());
        assert!(decode(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_encode_high_bit() {
        assert_eq!(encode(&[0xFF, 0x80]), vec![0x7F, 0x01, 0x00, 0x01]);
    }

    #[test]
    fn test_word14() {
        assert_eq!(word14((1023 & 0x7F) as u8, (1023 >> 7) as u8), 1023);
        assert_eq!(word14(0, 0), 0);
    }

    #[test]
    fn test_unpack_onewire_search_reply() {
        let packed = [0x28, 0x36, 0x3F, 0x0F, 0x52, 0x00, 0x00, 0x00, 0x5D, 0x00];
        let bytes = unpack_7bit(&packed);
        assert_eq!(bytes.len(), 8);
        assert_eq!(bytes[0], 0x28);
    }

    #[test]
    fn test_pack_eight_bytes_fills_ten_groups() {
        let packed = pack_7bit(&[0xFF; 8]);
        assert_eq!(packed.len(), 10);
        assert!(packed.iter().all(|b| b & 0x80 == 0));
    }

    proptest! {
        #[test]
        fn prop_pair_round_trip(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            let encoded = encode(&data);
            prop_assert!(encoded.iter().all(|b| b & 0x80 == 0));
            prop_assert_eq!(decode(&encoded).unwrap(), data);
        }

        #[test]
        fn prop_packed_round_trip(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            let packed = pack_7bit(&data);
            prop_assert!(packed.iter().all(|b| b & 0x80 == 0));
            prop_assert_eq!(unpack_7bit(&packed), data);
        }
    }
}
