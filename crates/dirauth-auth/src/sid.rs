//! Binary security identifier decoding
//!
//! Layout: revision (1 byte), sub-authority count (1 byte), identifier
//! authority (6 bytes, big endian), then `count` sub-authorities (4 bytes each,
//! little endian).

/// Decode a binary SID into its `S-R-A-S1-S2...` string form.
///
/// Returns `None` when the buffer length does not match the header.
pub fn decode_sid(bytes: &[u8]) -> Option<String> {
    if bytes.len() < 8 {
        return None;
    }

    let revision = bytes[0];
    let count = bytes[1] as usize;
    if bytes.len() != 8 + 4 * count {
        return None;
    }

    let authority = bytes[2..8]
        .iter()
        .fold(0u64, |acc, &b| (acc << 8) | u64::from(b));

    let mut sid = if authority >= 1 << 32 {
        format!("S-{}-0x{:012X}", revision, authority)
    } else {
        format!("S-{}-{}", revision, authority)
    };

    for chunk in bytes[8..].chunks_exact(4) {
        let sub = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        sid.push('-');
        sid.push_str(&sub.to_string());
    }

    Some(sid)
}
