//! Instruction-immediate re-encoding.
//!
//! The constants this tool patches are sometimes embedded inside an ARM64
//! instruction rather than stored as a standalone literal. The immediate
//! field is split across two non-adjacent bit ranges, so replacing it means
//! a read-modify-write: clear the field's mask, splice the new value's
//! slices in, and leave every other bit of the word alone.
//!
//! Callers read the instruction word big-endian and write it back
//! big-endian; the bit positions below are in that byte order.

/// Field mask for the wide-immediate move encoding: bits [29,31] hold the
/// low 3 bits of the value, bits [16,23] the next 8. 11 bits representable.
pub const MOV_IMM_MASK: u32 = 0b1110_0000_1111_1111_0001_1111_0000_0000;

/// Field mask for the compare/subtract-immediate encoding: bits [18,23]
/// hold the low 6 bits of the value, bits [8,13] the next 6. 12 bits
/// representable.
pub const CMP_IMM_MASK: u32 = 0b0000_0000_1111_1100_0011_1111_0000_0000;

/// Splice `value` into the wide-immediate move field of `old`.
///
/// Bits of `value` above the 11 representable ones are silently masked
/// off, matching the hardware's truncation semantics for this family.
#[inline]
pub fn encode_mov_imm(old: u32, value: u32) -> u32 {
    let low = (value & 0b111) << 29;
    let high = ((value >> 3) & 0xFF) << 16;
    (old & !MOV_IMM_MASK) | low | high
}

/// Extract the immediate back out of a wide-immediate move word.
#[inline]
pub fn decode_mov_imm(word: u32) -> u32 {
    ((word >> 29) & 0b111) | (((word >> 16) & 0xFF) << 3)
}

/// Splice `value` into the compare/subtract-immediate field of `old`.
///
/// Bits of `value` above the 12 representable ones are silently masked.
#[inline]
pub fn encode_cmp_imm(old: u32, value: u32) -> u32 {
    let low = (value & 0x3F) << 18;
    let high = ((value >> 6) & 0x3F) << 8;
    (old & !CMP_IMM_MASK) | low | high
}

/// Extract the immediate back out of a compare/subtract-immediate word.
#[inline]
pub fn decode_cmp_imm(word: u32) -> u32 {
    ((word >> 18) & 0x3F) | (((word >> 8) & 0x3F) << 6)
}
