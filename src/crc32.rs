//! CRC-32 (IEEE 802.3) checksum used for CDN subdomain sharding.

const POLYNOMIAL: u32 = 0xEDB8_8320;

const fn make_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 { POLYNOMIAL ^ (c >> 1) } else { c >> 1 };
            k += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
}

static TABLE: [u32; 256] = make_table();

/// Checksum over raw bytes.
pub fn checksum(bytes: &[u8]) -> u32 {
    let mut crc = !0u32;
    for &b in bytes {
        crc = TABLE[((crc ^ b as u32) & 0xFF) as usize] ^ (crc >> 8);
    }
    !crc
}

/// Checksum over the UTF-8 encoding of `s`.
pub fn crc32(s: &str) -> u32 {
    checksum(s.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vectors() {
        assert_eq!(crc32(""), 0);
        assert_eq!(crc32("123456789"), 0xCBF4_3926);
        assert_eq!(crc32("The quick brown fox jumps over the lazy dog"), 0x414F_A339);
    }

    #[test]
    fn test_table_matches_reference_entries() {
        assert_eq!(TABLE[1], 0x7707_3096);
        assert_eq!(TABLE[255], 0x2D02_EF8D);
    }

    #[test]
    fn test_multibyte_input_uses_utf8() {
        assert_eq!(crc32("é"), checksum(&[0xC3, 0xA9]));
    }
}
