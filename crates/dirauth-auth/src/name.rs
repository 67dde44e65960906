//! Short names from distinguished names

/// Value of the first `CN=` component of a DN, or an empty string.
///
/// Commas escaped with a backslash do not split components. Escapes in the
/// returned value are decoded, both `\,` and the hex form `\2C`.
pub fn extract_name(dn: &str) -> String {
    for component in split_rdns(dn) {
        let Some((key, value)) = component.split_once('=') else {
            continue;
        };
        if key.trim().eq_ignore_ascii_case("CN") {
            return unescape(value);
        }
    }
    String::new()
}

fn split_rdns(dn: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;

    for (i, c) in dn.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            ',' => {
                parts.push(&dn[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&dn[start..]);
    parts
}

/// Undo RFC 4514 escapes: `\XX` hex pairs and `\<char>`.
///
/// Hex pairs are bytes of a UTF-8 sequence, so they are collected before
/// decoding. Invalid sequences are replaced rather than rejected.
fn unescape(value: &str) -> String {
    if !value.contains('\\') {
        return value.to_string();
    }

    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        match (bytes.get(i + 1), bytes.get(i + 2)) {
            (Some(&hi), Some(&lo)) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() => {
                out.push((hex_value(hi) << 4) | hex_value(lo));
                i += 3;
            }
            (Some(_), _) => {
                // Escaped character, possibly multi-byte: copy the whole char.
                let len = value[i + 1..].chars().next().map_or(1, char::len_utf8);
                out.extend_from_slice(&bytes[i + 1..i + 1 + len]);
                i += 1 + len;
            }
            (None, _) => i += 1,
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit - b'A' + 10,
    }
}
