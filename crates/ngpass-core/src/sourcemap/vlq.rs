//! Base64 VLQ codec for the `mappings` field.

const B64: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// VLQ-encode a signed integer and append to output string.
pub fn encode(value: i64, out: &mut String) {
    #[allow(clippy::cast_sign_loss)]
    let mut v = (if value < 0 {
        ((-value) << 1) | 1
    } else {
        value << 1
    }) as u64;
    loop {
        let mut digit = (v & 0x1f) as u8;
        v >>= 5;
        if v > 0 {
            digit |= 0x20; // continuation bit
        }
        out.push(B64[digit as usize] as char);
        if v == 0 {
            break;
        }
    }
}

fn digit_value(byte: u8) -> Option<u64> {
    let value = match byte {
        b'A'..=b'Z' => byte - b'A',
        b'a'..=b'z' => byte - b'a' + 26,
        b'0'..=b'9' => byte - b'0' + 52,
        b'+' => 62,
        b'/' => 63,
        _ => return None,
    };
    Some(u64::from(value))
}

/// Decode every value in one comma-free segment.
///
/// # Errors
/// Returns a message naming the offending segment on an invalid digit,
/// a truncated value, or an overflowing shift.
pub fn decode_segment(segment: &str) -> Result<Vec<i64>, String> {
    let mut values = Vec::with_capacity(5);
    let mut accum: u64 = 0;
    let mut shift = 0u32;
    let mut pending = false;

    for byte in segment.bytes() {
        let digit = digit_value(byte)
            .ok_or_else(|| format!("invalid base64 digit {:?} in {segment:?}", byte as char))?;
        if shift > 60 {
            return Err(format!("value too large in {segment:?}"));
        }
        accum |= (digit & 0x1f) << shift;
        if digit & 0x20 == 0 {
            let magnitude = i64::try_from(accum >> 1)
                .map_err(|_| format!("value too large in {segment:?}"))?;
            values.push(if accum & 1 == 1 { -magnitude } else { magnitude });
            accum = 0;
            shift = 0;
            pending = false;
        } else {
            shift += 5;
            pending = true;
        }
    }
    if pending {
        return Err(format!("truncated value in {segment:?}"));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(values: &[i64]) -> String {
        let mut out = String::new();
        for v in values {
            encode(*v, &mut out);
        }
        out
    }

    #[test]
    fn test_known_encodings() {
        assert_eq!(encoded(&[0]), "A");
        assert_eq!(encoded(&[1]), "C");
        assert_eq!(encoded(&[-1]), "D");
        assert_eq!(encoded(&[16]), "gB");
        assert_eq!(encoded(&[0, 0, 1, 0]), "AACA");
    }

    #[test]
    fn test_decode_matches_encode_on_mixed_values() {
        let values = [0, 5, -17, 1023, -40_000, 7];
        assert_eq!(decode_segment(&encoded(&values)).unwrap(), values.to_vec());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_segment("A!").unwrap_err().contains("invalid base64 digit"));
        assert!(decode_segment("g").unwrap_err().contains("truncated"));
    }
}
