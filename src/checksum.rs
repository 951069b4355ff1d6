//! The Internet checksum (RFC 1071).

/// One's complement of the one's complement sum of `bytes` taken as big-endian 16-bit words.
///
/// A trailing odd byte is padded with a zero low byte. The result is meant to be stored
/// big-endian, and summing a buffer that already carries it yields zero.
pub fn internet_checksum(bytes: &[u8]) -> u16 {
    let mut chunks = bytes.chunks_exact(2);
    let mut sum: u32 = chunks
        .by_ref()
        .map(|word| u16::from_be_bytes([word[0], word[1]]) as u32)
        .fold(0, |acc, word| fold_carry(acc + word));
    if let [last] = chunks.remainder() {
        sum = fold_carry(sum + u16::from_be_bytes([*last, 0]) as u32);
    }
    !(fold_carry(sum) as u16)
}

fn fold_carry(mut sum: u32) -> u32 {
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    sum
}
