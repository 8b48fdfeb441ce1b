//! Minimal RIFF/WAVE (16-bit PCM) writer and panic-free reader.
//!
//! Parsing rules:
//! - Never index into the buffer; always go through `Buf` with `remaining()` checks.
//! - Unknown chunks between `fmt ` and `data` are skipped.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{AudioSpec, PcmBlock};
use crate::error::{Result, VoxError};

/// Size of the canonical header this writer produces.
pub const HEADER_LEN: usize = 44;

const FORMAT_PCM: u16 = 1;
const BITS_PER_SAMPLE: u16 = 16;

/// Encode interleaved samples as one complete WAV file.
pub fn encode(spec: &AudioSpec, samples: &[i16]) -> Bytes {
    let data_len = (samples.len() * 2) as u32;
    let block_align = spec.channels * (BITS_PER_SAMPLE / 8);
    let byte_rate = spec.sample_rate * block_align as u32;

    let mut buf = BytesMut::with_capacity(HEADER_LEN + data_len as usize);
    buf.put_slice(b"RIFF");
    buf.put_u32_le(36 + data_len);
    buf.put_slice(b"WAVE");

    buf.put_slice(b"fmt ");
    buf.put_u32_le(16);
    buf.put_u16_le(FORMAT_PCM);
    buf.put_u16_le(spec.channels);
    buf.put_u32_le(spec.sample_rate);
    buf.put_u32_le(byte_rate);
    buf.put_u16_le(block_align);
    buf.put_u16_le(BITS_PER_SAMPLE);

    buf.put_slice(b"data");
    buf.put_u32_le(data_len);
    for s in samples {
        buf.put_i16_le(*s);
    }
    buf.freeze()
}

fn bad(msg: &str) -> VoxError {
    VoxError::DecodeFailed(format!("wav: {msg}"))
}

fn take_tag(buf: &mut Bytes) -> Result<[u8; 4]> {
    if buf.remaining() < 4 {
        return Err(bad("truncated tag"));
    }
    let mut tag = [0u8; 4];
    buf.copy_to_slice(&mut tag);
    Ok(tag)
}

/// Parse a complete WAV file into PCM.
pub fn decode(mut buf: Bytes) -> Result<PcmBlock> {
    if take_tag(&mut buf)? != *b"RIFF" {
        return Err(bad("missing RIFF tag"));
    }
    if buf.remaining() < 4 {
        return Err(bad("truncated RIFF size"));
    }
    let _riff_len = buf.get_u32_le();
    if take_tag(&mut buf)? != *b"WAVE" {
        return Err(bad("missing WAVE tag"));
    }

    let mut spec: Option<AudioSpec> = None;
    loop {
        let tag = take_tag(&mut buf)?;
        if buf.remaining() < 4 {
            return Err(bad("truncated chunk size"));
        }
        let len = buf.get_u32_le() as usize;
        if buf.remaining() < len {
            return Err(bad("chunk shorter than declared"));
        }
        let mut body = buf.split_to(len);
        // chunks are word aligned
        if len % 2 == 1 && buf.remaining() > 0 {
            buf.advance(1);
        }

        match &tag {
            b"fmt " => {
                if body.remaining() < 16 {
                    return Err(bad("fmt chunk too short"));
                }
                let format = body.get_u16_le();
                let channels = body.get_u16_le();
                let sample_rate = body.get_u32_le();
                let _byte_rate = body.get_u32_le();
                let _block_align = body.get_u16_le();
                let bits = body.get_u16_le();
                if format != FORMAT_PCM || bits != BITS_PER_SAMPLE {
                    return Err(bad("only 16-bit PCM is supported"));
                }
                let s = AudioSpec::new(sample_rate, channels);
                if !s.is_encodable() {
                    return Err(bad("unsupported channel layout or rate"));
                }
                spec = Some(s);
            }
            b"data" => {
                let spec = spec.ok_or_else(|| bad("data before fmt"))?;
                if body.remaining() % (2 * spec.channels as usize) != 0 {
                    return Err(bad("data is not whole frames"));
                }
                let mut samples = Vec::with_capacity(body.remaining() / 2);
                while body.remaining() >= 2 {
                    samples.push(body.get_i16_le());
                }
                return Ok(PcmBlock { spec, samples });
            }
            other => {
                tracing::trace!(tag = %String::from_utf8_lossy(other), len, "skipping wav chunk");
            }
        }
    }
}
