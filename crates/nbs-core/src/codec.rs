//! Base64 envelope for chat message lines.
//!
//! Uses the canonical alphabet with `=` padding. The `*_into` functions
//! write into caller-provided buffers and refuse to run when the buffer is
//! too small, so they can never write past its end.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("output buffer too small: need {needed} bytes, have {available}")]
    OutputTooSmall { needed: usize, available: usize },

    #[error("input length {0} is not a multiple of 4")]
    BadLength(usize),

    #[error("invalid base64: {0}")]
    Invalid(String),
}

/// Exact encoded size of `len` input bytes, or `None` on overflow.
pub fn encoded_len(len: usize) -> Option<usize> {
    len.checked_add(2).map(|n| n / 3).and_then(|n| n.checked_mul(4))
}

/// Exact decoded size of a padded, trimmed input.
fn decoded_len(input: &[u8]) -> usize {
    let padding = input.iter().rev().take(2).filter(|&&b| b == b'=').count();
    (input.len() / 4 * 3).saturating_sub(padding)
}

/// Drop trailing CR, LF and spaces left over from line-oriented reads.
fn trim_trailing(input: &[u8]) -> &[u8] {
    let end = input
        .iter()
        .rposition(|&b| !matches!(b, b'\r' | b'\n' | b' '))
        .map_or(0, |i| i + 1);
    &input[..end]
}

/// Encode `input` into `out`, returning the number of bytes written.
pub fn encode_into(input: &[u8], out: &mut [u8]) -> Result<usize, CodecError> {
    let needed = encoded_len(input.len()).ok_or(CodecError::OutputTooSmall {
        needed: usize::MAX,
        available: out.len(),
    })?;
    if out.len() < needed {
        return Err(CodecError::OutputTooSmall {
            needed,
            available: out.len(),
        });
    }
    let encoded = STANDARD.encode(input);
    assert_eq!(encoded.len(), needed, "base64 encoded length mismatch");
    out[..needed].copy_from_slice(encoded.as_bytes());
    Ok(needed)
}

/// Decode `input` into `out`, returning the number of bytes written.
///
/// Trailing whitespace is ignored. Non-canonical padding, characters outside
/// the alphabet and lengths that are not a multiple of 4 are rejected.
pub fn decode_into(input: &[u8], out: &mut [u8]) -> Result<usize, CodecError> {
    let input = trim_trailing(input);
    if input.len() % 4 != 0 {
        return Err(CodecError::BadLength(input.len()));
    }
    let needed = decoded_len(input);
    if out.len() < needed {
        return Err(CodecError::OutputTooSmall {
            needed,
            available: out.len(),
        });
    }
    let decoded = STANDARD
        .decode(input)
        .map_err(|e| CodecError::Invalid(e.to_string()))?;
    if decoded.len() > out.len() {
        return Err(CodecError::OutputTooSmall {
            needed: decoded.len(),
            available: out.len(),
        });
    }
    out[..decoded.len()].copy_from_slice(&decoded);
    Ok(decoded.len())
}

/// Encode to an owned string.
pub fn encode(input: &[u8]) -> String {
    STANDARD.encode(input)
}

/// Decode an owned buffer, with the same validation as [`decode_into`].
pub fn decode(input: &str) -> Result<Vec<u8>, CodecError> {
    let trimmed = trim_trailing(input.as_bytes());
    let mut out = vec![0u8; decoded_len(trimmed)];
    let n = decode_into(trimmed, &mut out)?;
    out.truncate(n);
    Ok(out)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod decode {
        use super::*;

        #[test]
        fn all_zero_sextets() {
            // 'A' decodes to 0 and must not be mistaken for an invalid byte
            assert_eq!(decode("AAAA").unwrap(), vec![0, 0, 0]);
        }

        #[test]
        fn single_byte_with_padding() {
            assert_eq!(decode("QQ==").unwrap(), b"A".to_vec());
        }

        #[test]
        fn ignores_trailing_newline() {
            assert_eq!(decode("aGk=\r\n").unwrap(), b"hi".to_vec());
        }

        #[test]
        fn rejects_bad_length() {
            assert_eq!(decode("QQ="), Err(CodecError::BadLength(3)));
        }

        #[test]
        fn rejects_foreign_characters() {
            assert!(matches!(decode("QQ*="), Err(CodecError::Invalid(_))));
            assert!(matches!(decode("a-_b"), Err(CodecError::Invalid(_))));
        }

        #[test]
        fn rejects_undersized_buffer() {
            let mut out = [0u8; 2];
            let err = decode_into(b"AAAA", &mut out).unwrap_err();
            assert_eq!(
                err,
                CodecError::OutputTooSmall {
                    needed: 3,
                    available: 2
                }
            );
            assert_eq!(out, [0, 0]);
        }

        #[test]
        fn empty_input() {
            assert_eq!(decode("").unwrap(), Vec::<u8>::new());
        }
    }

    mod encode {
        use super::*;

        #[test]
        fn lengths() {
            assert_eq!(encoded_len(0), Some(0));
            assert_eq!(encoded_len(1), Some(4));
            assert_eq!(encoded_len(3), Some(4));
            assert_eq!(encoded_len(4), Some(8));
            assert_eq!(encoded_len(usize::MAX), None);
        }

        #[test]
        fn output_uses_canonical_alphabet() {
            let input: Vec<u8> = (0..=255u8).collect();
            let out = encode(&input);
            assert!(out
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'='));
        }

        #[test]
        fn rejects_undersized_buffer() {
            let mut out = [0u8; 3];
            assert_eq!(
                encode_into(b"A", &mut out),
                Err(CodecError::OutputTooSmall {
                    needed: 4,
                    available: 3
                })
            );
        }

        #[test]
        fn round_trips_every_short_length() {
            for len in 0..64usize {
                let input: Vec<u8> = (0..len).map(|i| (i * 37 % 256) as u8).collect();
                let mut enc = vec![0u8; encoded_len(len).unwrap()];
                let n = encode_into(&input, &mut enc).unwrap();
                let mut dec = vec![0u8; len];
                let m = decode_into(&enc[..n], &mut dec).unwrap();
                assert_eq!(&dec[..m], &input[..]);
            }
        }
    }
}
