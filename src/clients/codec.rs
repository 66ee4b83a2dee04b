//! Content-encoding decoding for response bodies.
//!
//! A response may carry several encodings, listed in the order they were
//! applied (`Content-Encoding: gzip, deflate`). [`decode_body`] undoes them
//! last-applied first. The whole chain is validated before any byte is
//! decoded, so an unsupported token fails the response even when it sits
//! behind layers that would decode fine.

use std::fmt;
use std::io::Read;

use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};
use reqwest::header::{HeaderMap, CONTENT_ENCODING};

use crate::clients::errors::CodecError;

/// A supported content encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentEncoding {
    /// `gzip` (or the legacy `x-gzip` alias).
    Gzip,
    /// `deflate`, zlib-wrapped or raw.
    Deflate,
    /// `identity`, no transformation.
    Identity,
}

impl ContentEncoding {
    /// Parses one encoding token.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnsupportedEncoding`] for `compress`, `br` and
    /// any token that is not recognized.
    pub fn parse(token: &str) -> Result<Self, CodecError> {
        match token.to_ascii_lowercase().as_str() {
            "gzip" | "x-gzip" => Ok(Self::Gzip),
            "deflate" => Ok(Self::Deflate),
            "identity" => Ok(Self::Identity),
            _ => Err(CodecError::UnsupportedEncoding {
                token: token.to_string(),
            }),
        }
    }
}

impl fmt::Display for ContentEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gzip => write!(f, "gzip"),
            Self::Deflate => write!(f, "deflate"),
            Self::Identity => write!(f, "identity"),
        }
    }
}

/// Parses every `Content-Encoding` header value into the applied chain.
///
/// Values of repeated headers are concatenated in header order. Tokens are
/// separated by commas and/or whitespace.
///
/// # Errors
///
/// Returns [`CodecError::UnsupportedEncoding`] naming the first token that
/// cannot be decoded.
pub fn encoding_chain(headers: &HeaderMap) -> Result<Vec<ContentEncoding>, CodecError> {
    let mut chain = Vec::new();
    for value in headers.get_all(CONTENT_ENCODING) {
        let value = value
            .to_str()
            .map_err(|_| CodecError::UnsupportedEncoding {
                token: String::from_utf8_lossy(value.as_bytes()).into_owned(),
            })?;
        for token in value
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|token| !token.is_empty())
        {
            chain.push(ContentEncoding::parse(token)?);
        }
    }
    Ok(chain)
}

/// Decodes a response body according to its `Content-Encoding` headers.
///
/// # Errors
///
/// Returns [`CodecError::UnsupportedEncoding`] if any token of the chain is
/// not supported and [`CodecError::Corrupt`] if a layer fails to decode.
pub fn decode_body(headers: &HeaderMap, body: &[u8]) -> Result<Vec<u8>, CodecError> {
    let chain = encoding_chain(headers)?;
    decode_chain(&chain, body)
}

/// Undoes `chain` (given in application order) on `body`.
///
/// # Errors
///
/// Returns [`CodecError::Corrupt`] if a layer fails to decode.
pub fn decode_chain(chain: &[ContentEncoding], body: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut data = body.to_vec();
    for encoding in chain.iter().rev() {
        data = decode_layer(*encoding, &data)?;
    }
    Ok(data)
}

// Each decoder lives only for the duration of its layer.
fn decode_layer(encoding: ContentEncoding, input: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut output = Vec::new();
    let result = match encoding {
        ContentEncoding::Identity => return Ok(input.to_vec()),
        ContentEncoding::Gzip => GzDecoder::new(input).read_to_end(&mut output),
        ContentEncoding::Deflate if looks_like_zlib(input) => {
            ZlibDecoder::new(input).read_to_end(&mut output)
        }
        ContentEncoding::Deflate => DeflateDecoder::new(input).read_to_end(&mut output),
    };
    result.map_err(|source| CodecError::Corrupt { encoding, source })?;
    Ok(output)
}

/// RFC 1950 header check: deflate method, and `CMF * 256 + FLG` divisible by 31.
fn looks_like_zlib(input: &[u8]) -> bool {
    match input {
        [cmf, flg, ..] => {
            cmf & 0x0f == 8 && ((u16::from(*cmf) << 8) | u16::from(*flg)) % 31 == 0
        }
        _ => false,
    }
}
