//! Address decomposition
//!
//! An address is split like this:
//! | tag | index | word offset | byte offset |

use super::{get_log_2, get_mask, is_pow_2, BYTE_OFFSET_BITS};
use crate::error::ConfigError;

/// Fields of a decoded address
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodedAddress {
    pub tag: u64,
    /// Set index
    pub index: usize,
    /// Word within the block
    pub offset: usize,
    /// Byte within the word
    pub byte: u32,
}

/// Splits addresses into tag/index/offset for a fixed geometry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressDecoder {
    address_width: u32,
    tag_bits: u32,
    index_bits: u32,
    word_offset_bits: u32,
}

impl AddressDecoder {
    /// Build a decoder for `sets` sets of `block_size` words each.
    /// Zero index or word-offset bits are valid (one set, one-word blocks).
    pub fn new(
        sets: u64,
        block_size: u64,
        address_width: u32,
    ) -> Result<Self, ConfigError> {
        if address_width != 32 && address_width != 64 {
            return Err(ConfigError::UnsupportedAddressWidth(address_width));
        }
        if !is_pow_2(sets) {
            return Err(ConfigError::NotPowerOfTwo { field: "sets", value: sets });
        }
        if !is_pow_2(block_size) {
            return Err(ConfigError::NotPowerOfTwo {
                field: "block_size",
                value: block_size,
            });
        }

        let index_bits = get_log_2(sets);
        let word_offset_bits = get_log_2(block_size);
        let offset_bits = word_offset_bits + BYTE_OFFSET_BITS;
        if index_bits + offset_bits >= address_width {
            return Err(ConfigError::TagUnderflow {
                address_width,
                index_bits,
                offset_bits,
            });
        }

        Ok(Self {
            address_width,
            tag_bits: address_width - index_bits - offset_bits,
            index_bits,
            word_offset_bits,
        })
    }

    pub fn decode(&self, address: u64) -> DecodedAddress {
        let byte = (address & get_mask(BYTE_OFFSET_BITS)) as u32;
        let offset = ((address >> BYTE_OFFSET_BITS)
            & get_mask(self.word_offset_bits)) as usize;
        let index =
            ((address >> self.offset_bits()) & get_mask(self.index_bits)) as usize;
        // Bits above the address width stay in the tag so the block address
        // still reaches the backing store, which rejects it
        let tag = address >> (self.offset_bits() + self.index_bits);
        DecodedAddress { tag, index, offset, byte }
    }

    /// Inverse of `decode`
    pub fn compose(&self, decoded: &DecodedAddress) -> u64 {
        (decoded.tag << (self.offset_bits() + self.index_bits))
            | ((decoded.index as u64) << self.offset_bits())
            | ((decoded.offset as u64) << BYTE_OFFSET_BITS)
            | decoded.byte as u64
    }

    /// Address of the first byte of the block holding `tag` in set `index`
    pub fn block_address(&self, tag: u64, index: usize) -> u64 {
        self.compose(&DecodedAddress { tag, index, offset: 0, byte: 0 })
    }

    pub fn address_width(&self) -> u32 {
        self.address_width
    }

    pub fn tag_bits(&self) -> u32 {
        self.tag_bits
    }

    pub fn index_bits(&self) -> u32 {
        self.index_bits
    }

    /// Bits selecting a word within a block
    pub fn word_offset_bits(&self) -> u32 {
        self.word_offset_bits
    }

    /// Bits selecting a byte within a block
    pub fn offset_bits(&self) -> u32 {
        self.word_offset_bits + BYTE_OFFSET_BITS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_widths_cover_address() {
        for width in [32, 64] {
            for sets in [1u64, 2, 16, 1024] {
                for block_size in [1u64, 4, 64] {
                    let decoder =
                        AddressDecoder::new(sets, block_size, width).unwrap();
                    assert_eq!(
                        decoder.tag_bits()
                            + decoder.index_bits()
                            + decoder.offset_bits(),
                        width
                    );
                }
            }
        }
    }

    #[test]
    fn test_decode_compose() {
        let decoder = AddressDecoder::new(16, 4, 32).unwrap();
        for address in [0u64, 0x4, 0x13, 0xdead_beef, 0xffff_ffff, 0x8000_0000] {
            let decoded = decoder.decode(address);
            assert_eq!(decoder.compose(&decoded), address);
        }

        let decoded = decoder.decode(0x1234_5678);
        // 2 byte bits, 2 word bits, 4 index bits
        assert_eq!(decoded.byte, 0);
        assert_eq!(decoded.offset, 2);
        assert_eq!(decoded.index, 7);
        assert_eq!(decoded.tag, 0x1234_5678 >> 8);
    }

    #[test]
    fn test_keeps_bits_above_width() {
        let decoder = AddressDecoder::new(4, 1, 32).unwrap();
        let decoded = decoder.decode(0x1_0000_0000);
        assert_eq!(decoded.index, 0);
        assert_ne!(decoded.tag, decoder.decode(0x0).tag);
        assert_eq!(decoder.compose(&decoded), 0x1_0000_0000);
        assert_eq!(decoder.block_address(decoded.tag, 0), 0x1_0000_0000);
    }

    #[test]
    fn test_degenerate_geometry() {
        let decoder = AddressDecoder::new(1, 1, 32).unwrap();
        assert_eq!(decoder.index_bits(), 0);
        assert_eq!(decoder.word_offset_bits(), 0);
        assert_eq!(decoder.tag_bits(), 30);
        let decoded = decoder.decode(0x1000_0004);
        assert_eq!(decoded.index, 0);
        assert_eq!(decoded.offset, 0);
        assert_eq!(decoded.tag, 0x1000_0004 >> 2);
    }

    #[test]
    fn test_rejects_bad_geometry() {
        assert_eq!(
            AddressDecoder::new(3, 1, 32),
            Err(ConfigError::NotPowerOfTwo { field: "sets", value: 3 })
        );
        assert_eq!(
            AddressDecoder::new(4, 0, 32),
            Err(ConfigError::NotPowerOfTwo { field: "block_size", value: 0 })
        );
        assert_eq!(
            AddressDecoder::new(1, 1, 16),
            Err(ConfigError::UnsupportedAddressWidth(16))
        );
        assert!(matches!(
            AddressDecoder::new(1 << 20, 1 << 10, 32),
            Err(ConfigError::TagUnderflow { .. })
        ));
    }
}
