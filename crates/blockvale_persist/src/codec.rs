use std::collections::BTreeMap;
use std::fmt;

use blockvale_world::block::{BlockId, BlockRegistry};
use blockvale_world::chunk::Chunk;
use blockvale_world::coords::{BlockIndex, CHUNK_VOLUME};

use crate::versioning::{BodyFormat, ChunkHeader};

pub const MAX_RUN: u8 = u8::MAX;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    TooShort { len: usize },
    BadMagic([u8; 4]),
    UnsupportedVersion(u8),
    DimMismatch { found: [u8; 3] },
    UnknownFormat(u8),
    ZeroLengthRun { offset: usize },
    UnknownBlockId { id: BlockId, offset: usize },
    RunOverflow { offset: usize },
    ShortStream { cells: usize },
    TrailingBytes { extra: usize },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::TooShort { len } => write!(f, "chunk blob is {len} bytes, shorter than its header"),
            CodecError::BadMagic(magic) => write!(f, "invalid chunk magic {magic:?}"),
            CodecError::UnsupportedVersion(version) => {
                write!(f, "unsupported chunk format version {version}")
            }
            CodecError::DimMismatch { found } => write!(
                f,
                "chunk dimension bits {found:?} do not match this build's chunk size"
            ),
            CodecError::UnknownFormat(tag) => write!(f, "unknown chunk body format {tag}"),
            CodecError::ZeroLengthRun { offset } => {
                write!(f, "zero-length run at byte {offset}")
            }
            CodecError::UnknownBlockId { id, offset } => {
                write!(f, "unknown block id {} at byte {offset}", id.0)
            }
            CodecError::RunOverflow { offset } => {
                write!(f, "run at byte {offset} extends past the chunk volume")
            }
            CodecError::ShortStream { cells } => {
                write!(f, "run stream ends after {cells} of {CHUNK_VOLUME} cells")
            }
            CodecError::TrailingBytes { extra } => {
                write!(f, "{extra} bytes follow the last run")
            }
        }
    }
}

impl std::error::Error for CodecError {}

/// Writes the header and one `(type, len)` pair per run, cells in index order.
pub fn encode(chunk: &Chunk) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    ChunkHeader::current().write(&mut out);

    let mut blocks = chunk.blocks().iter().map(|block| block.id());
    let Some(mut current) = blocks.next() else {
        return out;
    };
    let mut len: u8 = 1;
    for id in blocks {
        if id == current && len < MAX_RUN {
            len += 1;
            continue;
        }
        out.push(current.0);
        out.push(len);
        current = id;
        len = 1;
    }
    out.push(current.0);
    out.push(len);
    out
}

/// Replaces every cell of `chunk` with the decoded types. On error the chunk is
/// left exactly as it was. Light is not stored; callers re-seed it.
pub fn decode_into(
    bytes: &[u8],
    chunk: &mut Chunk,
    registry: &BlockRegistry,
) -> Result<(), CodecError> {
    let mut ids = Vec::with_capacity(CHUNK_VOLUME);
    for_each_run(bytes, |id, len, offset| {
        if !registry.contains(id) {
            return Err(CodecError::UnknownBlockId { id, offset });
        }
        ids.extend(std::iter::repeat(id).take(usize::from(len)));
        Ok(())
    })?;

    for (raw, id) in ids.into_iter().enumerate() {
        chunk
            .block_mut(BlockIndex(raw as u16))
            .reset(registry.get(id));
    }
    chunk.mark_dirty();
    Ok(())
}

/// What a blob holds, without needing a block registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobSummary {
    pub header: ChunkHeader,
    pub runs: usize,
    pub longest_run: u8,
    pub histogram: BTreeMap<BlockId, usize>,
}

pub fn summarize(bytes: &[u8]) -> Result<BlobSummary, CodecError> {
    let mut runs = 0;
    let mut longest_run = 0;
    let mut histogram = BTreeMap::new();
    let header = for_each_run(bytes, |id, len, _| {
        runs += 1;
        longest_run = longest_run.max(len);
        *histogram.entry(id).or_insert(0) += usize::from(len);
        Ok(())
    })?;
    Ok(BlobSummary {
        header,
        runs,
        longest_run,
        histogram,
    })
}

/// Validates the header and walks every run. The stream must cover the chunk
/// volume exactly.
fn for_each_run<F>(bytes: &[u8], mut visit: F) -> Result<ChunkHeader, CodecError>
where
    F: FnMut(BlockId, u8, usize) -> Result<(), CodecError>,
{
    let (header, body) = ChunkHeader::parse(bytes)?;
    match header.format {
        BodyFormat::RunLength => {}
    }

    let body_start = bytes.len() - body.len();
    let volume = header.cell_count();
    let mut cells = 0;
    let mut pairs = body.chunks_exact(2);
    for (i, pair) in pairs.by_ref().enumerate() {
        let offset = body_start + i * 2;
        if cells == volume {
            return Err(CodecError::TrailingBytes {
                extra: bytes.len() - offset,
            });
        }
        let (id, len) = (BlockId(pair[0]), pair[1]);
        if len == 0 {
            return Err(CodecError::ZeroLengthRun { offset });
        }
        if cells + usize::from(len) > volume {
            return Err(CodecError::RunOverflow { offset });
        }
        visit(id, len, offset)?;
        cells += usize::from(len);
    }

    let remainder = pairs.remainder().len();
    if cells < volume {
        return Err(CodecError::ShortStream { cells });
    }
    if remainder > 0 {
        return Err(CodecError::TrailingBytes { extra: remainder });
    }
    Ok(header)
}
