use crate::hash::HeaderHasher;
use crate::reader::ByteReader;
use crate::scanner::FileScanner;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use znn_types::{Block, ChainParams};

/// Side file receiving records whose declared size fails the advisory check.
pub const WRONG_BLOCK_DUMP: &str = "wrongblock.blk";
/// Side file receiving records that failed to parse.
pub const BLOCK_DUMP: &str = "blockdump.blk";

/// One parsed `blk*.dat` file: every record that deserialized as a block,
/// in file order.
///
/// Records that fail to parse are dumped for inspection and skipped; the
/// scan continues at the next confirmed magic boundary. Spurious boundaries
/// (the magic pattern occurring inside a payload) are rejected this way
/// without losing the genuine records around them.
pub struct Datfile {
    path: PathBuf,
    blocks: Vec<Block>,
    rejected: usize,
}

impl Datfile {
    /// Reads and parses a whole block file.
    pub fn read<H: HeaderHasher>(
        path: &Path,
        params: &ChainParams,
        hasher: &H,
        dump_dir: &Path,
    ) -> io::Result<Datfile> {
        info!("reading blocks from {}", path.display());
        let data = fs::read(path)?;
        Ok(Self::parse(path, &data, params, hasher, dump_dir))
    }

    /// Parses an in-memory block file image.
    pub fn parse<H: HeaderHasher>(
        path: &Path,
        data: &[u8],
        params: &ChainParams,
        hasher: &H,
        dump_dir: &Path,
    ) -> Datfile {
        let scanner = FileScanner::new(data, params);
        let bounds = scanner.scan();
        scanner.validate(&bounds, params, &dump_dir.join(WRONG_BLOCK_DUMP));

        let mut blocks = Vec::with_capacity(bounds.len());
        let mut rejected = 0;
        let mut reader = ByteReader::new(data);

        for record in &bounds {
            // Records are parsed from their confirmed start against the
            // declared size alone. A genuine block whose payload happens to
            // contain the magic pattern reads straight across the spurious
            // boundary; the spurious record itself fails below and is
            // dropped without disturbing its neighbours.
            reader.seek(record.start);
            let outcome = reader.read_u32().and_then(|declared| {
                crate::block::read_block(&mut reader, declared, hasher, params)
            });

            match outcome {
                Ok(block) => blocks.push(block),
                Err(err) => {
                    rejected += 1;
                    warn!(
                        offset = record.start,
                        %err,
                        "discarding unparseable record in {}",
                        path.display()
                    );
                    let from = record.start.saturating_sub(4) as usize;
                    let to = (record.end as usize).min(data.len());
                    if let Err(io_err) =
                        fs::write(dump_dir.join(BLOCK_DUMP), &data[from..to])
                    {
                        warn!("failed to write {BLOCK_DUMP}: {io_err}");
                    }
                }
            }
        }

        info!(
            parsed = blocks.len(),
            rejected,
            "finished {}",
            path.display()
        );

        Datfile {
            path: path.to_path_buf(),
            blocks,
            rejected,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }

    /// Number of records that did not deserialize.
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    /// Whether every record in the file deserialized as a block.
    pub fn is_clean(&self) -> bool {
        self.rejected == 0
    }
}
