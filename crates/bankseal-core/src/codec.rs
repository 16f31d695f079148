//! Streaming content codec: base64 text plus optional gzip.
//!
//! Decode consumes any reader incrementally in bounded chunks; the base64
//! text never has to be materialized by the codec itself. The result is a
//! fully realized, rewound stream, which is what the pipelines hand across
//! their boundaries.

use std::io::{self, Cursor, Read};

use base64::engine::general_purpose::STANDARD;
use base64::read::DecoderReader;
use base64::write::EncoderStringWriter;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::EnvelopeError;

/// Copy buffer size for the streaming paths.
const CHUNK_SIZE: usize = 8192;

/// Decode base64 text into payload bytes, inflating when `compressed`.
///
/// The returned cursor is positioned at the start.
pub fn decode(reader: impl Read, compressed: bool) -> Result<Cursor<Vec<u8>>, EnvelopeError> {
    let base64 = DecoderReader::new(reader, &STANDARD);
    let mut out = Vec::new();
    if compressed {
        let mut inflater = GzDecoder::new(base64);
        copy_chunked(&mut inflater, &mut out)
            .map_err(|e| EnvelopeError::UnsupportedCompression(e.to_string()))?;
    } else {
        let mut base64 = base64;
        copy_chunked(&mut base64, &mut out)
            .map_err(|e| EnvelopeError::MalformedEnvelope(format!("invalid base64 content: {e}")))?;
    }
    Ok(Cursor::new(out))
}

/// Encode payload bytes into base64 text, gzip-compressing first when
/// `compress`.
pub fn encode(mut payload: impl Read, compress: bool) -> Result<String, EnvelopeError> {
    let mut writer = EncoderStringWriter::new(&STANDARD);
    if compress {
        let mut deflater = GzEncoder::new(&mut writer, Compression::default());
        io::copy(&mut payload, &mut deflater)?;
        deflater.finish()?;
    } else {
        io::copy(&mut payload, &mut writer)?;
    }
    Ok(writer.into_inner())
}

fn copy_chunked(reader: &mut impl Read, out: &mut Vec<u8>) -> io::Result<()> {
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            return Ok(());
        }
        out.extend_from_slice(&buf[..n]);
    }
}
