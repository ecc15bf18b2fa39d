//! ASCIIHexDecode and ASCII85Decode.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};

/// ASCIIHexDecode filter. Whitespace is ignored; an odd final digit is padded with `0`.
pub struct AsciiHexDecoder;

impl StreamDecoder for AsciiHexDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut digits = Vec::with_capacity(input.len());
        for &c in input {
            match c {
                b'>' => break,
                c if c.is_ascii_whitespace() || c == 0 => {},
                c => digits.push(hex_value(c).ok_or_else(|| {
                    Error::malformed(format!("ASCIIHexDecode: invalid digit '{}'", c as char))
                })?),
            }
        }
        Ok(digits
            .chunks(2)
            .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
            .collect())
    }

    fn name(&self) -> &str {
        "ASCIIHexDecode"
    }
}

pub(crate) fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        _ => None,
    }
}

/// ASCII85Decode filter. `z` stands for four zero bytes; `~>` ends the data.
pub struct Ascii85Decoder;

impl StreamDecoder for Ascii85Decoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let body = input.strip_prefix(b"<~").unwrap_or(input);
        let mut output = Vec::with_capacity(body.len() * 4 / 5);
        let mut group = [0u8; 5];
        let mut count = 0;

        for &c in body {
            match c {
                b'~' => break,
                b'z' if count == 0 => output.extend_from_slice(&[0; 4]),
                b'!'..=b'u' => {
                    group[count] = c - b'!';
                    count += 1;
                    if count == 5 {
                        output.extend_from_slice(&group_value(&group)?.to_be_bytes());
                        count = 0;
                    }
                },
                c if c.is_ascii_whitespace() || c == 0 => {},
                c => {
                    return Err(Error::malformed(format!(
                        "ASCII85Decode: invalid character '{}'",
                        c as char
                    )));
                },
            }
        }

        match count {
            0 => {},
            1 => return Err(Error::malformed("ASCII85Decode: dangling final character")),
            n => {
                for slot in group.iter_mut().skip(n) {
                    *slot = 84;
                }
                output.extend_from_slice(&group_value(&group)?.to_be_bytes()[..n - 1]);
            },
        }

        Ok(output)
    }

    fn name(&self) -> &str {
        "ASCII85Decode"
    }
}

fn group_value(group: &[u8; 5]) -> Result<u32> {
    group
        .iter()
        .try_fold(0u32, |acc, &d| acc.checked_mul(85)?.checked_add(d as u32))
        .ok_or_else(|| Error::malformed("ASCII85Decode: group overflow"))
}
