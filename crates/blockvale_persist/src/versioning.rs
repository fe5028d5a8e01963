use blockvale_world::coords::{CHUNK_BITS_X, CHUNK_BITS_Y, CHUNK_BITS_Z};

use crate::codec::CodecError;

pub const MAGIC: [u8; 4] = *b"BVCK";
pub const CURRENT_FORMAT_VERSION: u8 = 1;
pub const HEADER_LEN: usize = 12;

/// Body encodings a header can announce. Only run-length is written today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFormat {
    RunLength,
}

impl BodyFormat {
    pub fn tag(self) -> u8 {
        match self {
            BodyFormat::RunLength => 0,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(BodyFormat::RunLength),
            _ => None,
        }
    }
}

/// `[magic:4][version:1][dimX:1][dimY:1][dimZ:1][reserved:3][format:1]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub version: u8,
    pub dim_bits: [u8; 3],
    pub format: BodyFormat,
}

impl ChunkHeader {
    pub fn current() -> Self {
        Self {
            version: CURRENT_FORMAT_VERSION,
            dim_bits: expected_dim_bits(),
            format: BodyFormat::RunLength,
        }
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&MAGIC);
        out.push(self.version);
        out.extend_from_slice(&self.dim_bits);
        out.extend_from_slice(&[0; 3]);
        out.push(self.format.tag());
    }

    /// Splits `bytes` into a validated header and the body that follows it.
    /// Reserved bytes are not checked so later writers can use them.
    pub fn parse(bytes: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        if bytes.len() < HEADER_LEN {
            return Err(CodecError::TooShort { len: bytes.len() });
        }
        let (head, body) = bytes.split_at(HEADER_LEN);

        let mut magic = [0; 4];
        magic.copy_from_slice(&head[..4]);
        if magic != MAGIC {
            return Err(CodecError::BadMagic(magic));
        }

        let version = head[4];
        if version == 0 || version > CURRENT_FORMAT_VERSION {
            return Err(CodecError::UnsupportedVersion(version));
        }

        let dim_bits = [head[5], head[6], head[7]];
        if dim_bits != expected_dim_bits() {
            return Err(CodecError::DimMismatch { found: dim_bits });
        }

        let format = BodyFormat::from_tag(head[11]).ok_or(CodecError::UnknownFormat(head[11]))?;

        Ok((
            Self {
                version,
                dim_bits,
                format,
            },
            body,
        ))
    }

    pub fn cell_count(&self) -> usize {
        1 << self.dim_bits.iter().map(|bits| u32::from(*bits)).sum::<u32>()
    }
}

fn expected_dim_bits() -> [u8; 3] {
    [CHUNK_BITS_X as u8, CHUNK_BITS_Y as u8, CHUNK_BITS_Z as u8]
}
