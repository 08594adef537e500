/// Canonical 44-byte RIFF/WAVE container handling.
///
/// Parsing is lenient: tag mismatches and odd bit depths are reported as
/// structural warnings and the parsed values are used as-is. Only a stream
/// shorter than the header is fatal.
use std::fmt;
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut};
use thiserror::Error;

pub const HEADER_LEN: usize = 44;

// chunk_size covers everything after the RIFF id and the size field itself
pub const RIFF_SIZE_OVERHEAD: u32 = 36;

const RIFF_ID: [u8; 4] = *b"RIFF";
const WAVE_FORMAT: [u8; 4] = *b"WAVE";
const FMT_ID: [u8; 4] = *b"fmt ";
const DATA_ID: [u8; 4] = *b"data";

const SUPPORTED_BITS_PER_SAMPLE: [u16; 3] = [8, 16, 32];

type Result<T> = std::result::Result<T, WavError>;

/// Fatal container errors.
#[derive(Debug, Error)]
pub enum WavError {
    #[error("WAVE header truncated: expected {expected} bytes, got {actual}")]
    TruncatedHeader { expected: usize, actual: usize },

    #[error("Could not open file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Non-fatal header problems. Processing continues with the parsed values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralWarning {
    ChunkId([u8; 4]),
    Format([u8; 4]),
    Subchunk1Id([u8; 4]),
    Subchunk2Id([u8; 4]),
    BitsPerSample(u16),
    DataTruncated { declared: u32, actual: usize },
}

impl fmt::Display for StructuralWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructuralWarning::ChunkId(tag) => write!(f, "ChunkID is not 'RIFF' (found '{}')", tag_str(tag)),
            StructuralWarning::Format(tag) => write!(f, "Format is not 'WAVE' (found '{}')", tag_str(tag)),
            StructuralWarning::Subchunk1Id(tag) => write!(f, "SubChunk1ID is not 'fmt ' (found '{}')", tag_str(tag)),
            StructuralWarning::Subchunk2Id(tag) => write!(f, "SubChunk2ID is not 'data' (found '{}')", tag_str(tag)),
            StructuralWarning::BitsPerSample(bits) => write!(f, "BitsPerSample is not 8, 16, or 32 (got {bits})"),
            StructuralWarning::DataTruncated { declared, actual } => {
                write!(f, "Data chunk truncated: header declares {declared} bytes, file holds {actual}")
            }
        }
    }
}

/// The fixed 44-byte WAVE header, fields in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveHeader {
    pub chunk_id: [u8; 4],
    pub chunk_size: u32,
    pub format: [u8; 4],
    pub subchunk1_id: [u8; 4],
    pub subchunk1_size: u32,
    pub audio_format: u16,
    pub num_channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub subchunk2_id: [u8; 4],
    pub subchunk2_size: u32,
}

impl WaveHeader {
    /// Reads the header fields from the first 44 bytes of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(WavError::TruncatedHeader {
                expected: HEADER_LEN,
                actual: bytes.len(),
            });
        }

        let mut buf = &bytes[..HEADER_LEN];

        // Struct fields are evaluated in the order written, which is file order
        Ok(Self {
            chunk_id: read_tag(&mut buf),
            chunk_size: buf.get_u32_le(),
            format: read_tag(&mut buf),
            subchunk1_id: read_tag(&mut buf),
            subchunk1_size: buf.get_u32_le(),
            audio_format: buf.get_u16_le(),
            num_channels: buf.get_u16_le(),
            sample_rate: buf.get_u32_le(),
            byte_rate: buf.get_u32_le(),
            block_align: buf.get_u16_le(),
            bits_per_sample: buf.get_u16_le(),
            subchunk2_id: read_tag(&mut buf),
            subchunk2_size: buf.get_u32_le(),
        })
    }

    /// Checks tags and bit depth. Every failing check yields one warning.
    pub fn validate(&self) -> Vec<StructuralWarning> {
        let mut warnings = Vec::new();

        if self.chunk_id != RIFF_ID {
            warnings.push(StructuralWarning::ChunkId(self.chunk_id));
        }
        if self.format != WAVE_FORMAT {
            warnings.push(StructuralWarning::Format(self.format));
        }
        if self.subchunk1_id != FMT_ID {
            warnings.push(StructuralWarning::Subchunk1Id(self.subchunk1_id));
        }
        if self.subchunk2_id != DATA_ID {
            warnings.push(StructuralWarning::Subchunk2Id(self.subchunk2_id));
        }
        if !SUPPORTED_BITS_PER_SAMPLE.contains(&self.bits_per_sample) {
            warnings.push(StructuralWarning::BitsPerSample(self.bits_per_sample));
        }

        warnings
    }

    /// Writes the 44 header bytes in file order.
    pub fn serialize(&self) -> Vec<u8> {
        let mut header = Vec::with_capacity(HEADER_LEN);

        // RIFF chunk descriptor
        header.put_slice(&self.chunk_id);
        header.put_u32_le(self.chunk_size);
        header.put_slice(&self.format);

        // Format sub-chunk
        header.put_slice(&self.subchunk1_id);
        header.put_u32_le(self.subchunk1_size);
        header.put_u16_le(self.audio_format);
        header.put_u16_le(self.num_channels);
        header.put_u32_le(self.sample_rate);
        header.put_u32_le(self.byte_rate);
        header.put_u16_le(self.block_align);
        header.put_u16_le(self.bits_per_sample);

        // Data sub-chunk
        header.put_slice(&self.subchunk2_id);
        header.put_u32_le(self.subchunk2_size);

        header
    }

    /// Bytes encoding one channel's sample (1, 2 or 4 for supported depths).
    pub fn bytes_per_sample(&self) -> u16 {
        self.bits_per_sample / 8
    }

    /// Copy of this header with both size fields updated for `data_size` sample bytes.
    pub fn with_data_size(&self, data_size: u32) -> Self {
        Self {
            chunk_size: data_size.saturating_add(RIFF_SIZE_OVERHEAD),
            subchunk2_size: data_size,
            ..*self
        }
    }
}

impl fmt::Display for WaveHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ChunkID (1-4): {}", tag_str(&self.chunk_id))?;
        writeln!(f, "ChunkSize (5-8): {}", self.chunk_size)?;
        writeln!(f, "Format (9-12): {}", tag_str(&self.format))?;
        writeln!(f, "SubChunk1ID (13-16): {}", tag_str(&self.subchunk1_id))?;
        writeln!(f, "SubChunk1Size (17-20): {}", self.subchunk1_size)?;
        writeln!(f, "AudioFormat (21-22): {}", self.audio_format)?;
        writeln!(f, "NumChannels (23-24): {}", self.num_channels)?;
        writeln!(f, "SampleRate (25-28): {}", self.sample_rate)?;
        writeln!(f, "ByteRate (29-32): {}", self.byte_rate)?;
        writeln!(f, "BlockAlign (33-34): {}", self.block_align)?;
        writeln!(f, "BitsPerSample (35-36): {}", self.bits_per_sample)?;
        writeln!(f, "SubChunk2ID (37-40): {}", tag_str(&self.subchunk2_id))?;
        write!(f, "SubChunk2Size (41-44): {}", self.subchunk2_size)
    }
}

/// A parsed input file: header plus the raw bytes of its data chunk.
#[derive(Debug, Clone)]
pub struct WaveFile {
    pub header: WaveHeader,
    pub data: Vec<u8>,
}

impl WaveFile {
    /// Reads and parses the whole file into memory.
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|source| WavError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&bytes)
    }

    /// Splits `bytes` into header and sample data.
    ///
    /// Data runs from byte 44 up to `subchunk2_size`; anything after it
    /// (trailing chunks) is ignored.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let header = WaveHeader::parse(bytes)?;

        let body = &bytes[HEADER_LEN..];
        let declared = header.subchunk2_size as usize;
        let data = body[..declared.min(body.len())].to_vec();

        Ok(Self { header, data })
    }

    /// Header warnings plus a truncation warning when the data chunk is short.
    pub fn warnings(&self) -> Vec<StructuralWarning> {
        let mut warnings = self.header.validate();

        if self.data.len() < self.header.subchunk2_size as usize {
            warnings.push(StructuralWarning::DataTruncated {
                declared: self.header.subchunk2_size,
                actual: self.data.len(),
            });
        }

        warnings
    }
}

fn read_tag(buf: &mut &[u8]) -> [u8; 4] {
    let mut tag = [0u8; 4];
    buf.copy_to_slice(&mut tag);
    tag
}

fn tag_str(tag: &[u8; 4]) -> String {
    String::from_utf8_lossy(tag).into_owned()
}
