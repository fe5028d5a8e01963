use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use blockvale_persist::codec::{summarize, BlobSummary};
use blockvale_persist::file_cache::parse_file_name;
use blockvale_persist::versioning::MAGIC;
use blockvale_world::block::register_default_blocks;

fn main() {
    let Some(path) = env::args().nth(1) else {
        eprintln!("Usage: chunk_inspector <path/to/Chunk_x,y.chunk>");
        std::process::exit(2);
    };

    match describe(Path::new(&path)) {
        Ok(report) => print!("{report}"),
        Err(err) => {
            eprintln!("chunk_inspector error: {err}");
            std::process::exit(1);
        }
    }
}

fn describe(path: &Path) -> Result<String, String> {
    let bytes =
        fs::read(path).map_err(|err| format!("failed to read {}: {err}", path.display()))?;
    let summary = summarize(&bytes)
        .map_err(|err| format!("failed to decode {}: {err}", path.display()))?;
    Ok(render(path, bytes.len(), &summary))
}

fn render(path: &Path, size: usize, summary: &BlobSummary) -> String {
    let registry = register_default_blocks();
    let coords = path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(parse_file_name);

    let mut out = String::new();
    let _ = writeln!(out, "Chunk file: {}", path.display());
    match coords {
        Some(coords) => {
            let _ = writeln!(out, "Coords: ({}, {})", coords.x, coords.y);
        }
        None => {
            let _ = writeln!(out, "Coords: unknown (non-standard file name)");
        }
    }
    let _ = writeln!(out, "Size: {size} bytes");
    let _ = writeln!(out, "Magic: {:?}", String::from_utf8_lossy(&MAGIC));
    let _ = writeln!(out, "Version: {}", summary.header.version);
    let _ = writeln!(out, "Dimension bits: {:?}", summary.header.dim_bits);
    let _ = writeln!(out, "Format: {:?}", summary.header.format);
    let _ = writeln!(out, "Runs: {} (longest {})", summary.runs, summary.longest_run);

    let cells = summary.header.cell_count();
    let _ = writeln!(out, "Blocks:");
    for (id, count) in &summary.histogram {
        let name = registry
            .try_get(*id)
            .map(|def| def.name().to_string())
            .unwrap_or_else(|| format!("<unregistered {}>", id.0));
        let share = *count as f64 * 100.0 / cells as f64;
        let _ = writeln!(out, "  {name:>12}: {count:>6} ({share:.1}%)");
    }
    out
}
