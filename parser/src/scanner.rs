use std::fs;
use std::path::Path;
use tracing::warn;
use znn_types::ChainParams;

/// Byte span of one candidate block record: `start` is the first payload
/// byte (the declared-size field), `end` is the next magic occurrence or
/// end of file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordBounds {
    pub start: u64,
    pub end: u64,
}

/// Locates block-record boundaries in a raw `blk*.dat` buffer by scanning
/// for the magic pattern.
///
/// The magic bytes can legitimately occur inside a block payload, so some
/// reported records are spurious; those fail to parse downstream and the
/// scan itself never filters them.
pub struct FileScanner<'a> {
    data: &'a [u8],
    magic: [u8; 4],
}

impl<'a> FileScanner<'a> {
    pub fn new(data: &'a [u8], params: &ChainParams) -> Self {
        FileScanner {
            data,
            magic: params.magic,
        }
    }

    /// All candidate records, in file order.
    pub fn scan(&self) -> Vec<RecordBounds> {
        let mut starts = Vec::new();
        let mut i = 0usize;
        // Scan for the first magic byte, then confirm the full pattern;
        // a partial match advances by a single byte.
        while i + self.magic.len() <= self.data.len() {
            if self.data[i] == self.magic[0] && self.data[i..i + 4] == self.magic {
                starts.push(i as u64 + 4);
                i += 4;
            } else {
                i += 1;
            }
        }

        starts
            .iter()
            .enumerate()
            .map(|(n, &start)| RecordBounds {
                start,
                end: match starts.get(n + 1) {
                    Some(&next_start) => next_start - 4,
                    None => self.data.len() as u64,
                },
            })
            .collect()
    }

    /// Advisory check of every record's declared size against its span.
    ///
    /// A mismatch is logged and the suspect range (with its magic framing)
    /// is dumped to `dump_path` for offline inspection; the scan result is
    /// not affected. Returns the number of suspect records.
    pub fn validate(
        &self,
        bounds: &[RecordBounds],
        params: &ChainParams,
        dump_path: &Path,
    ) -> usize {
        let mut suspect = 0;
        for (n, record) in bounds.iter().enumerate() {
            let span = record.end - record.start;
            let declared = if span >= 4 {
                let start = record.start as usize;
                let mut size_bytes = [0u8; 4];
                size_bytes.copy_from_slice(&self.data[start..start + 4]);
                Some(u32::from_le_bytes(size_bytes))
            } else {
                None
            };

            let valid = match declared {
                Some(size) => {
                    size >= params.min_block_size
                        && size <= params.max_block_size
                        && size as u64 == span - 4
                }
                None => false,
            };

            if !valid {
                suspect += 1;
                warn!(
                    index = n,
                    offset = record.start,
                    declared = ?declared,
                    span,
                    "record size mismatch, dumping to {}",
                    dump_path.display()
                );
                self.dump_record(record, dump_path);
            }
        }
        suspect
    }

    fn dump_record(&self, record: &RecordBounds, dump_path: &Path) {
        // Include the leading magic and up to one trailing pattern width.
        let from = record.start.saturating_sub(4) as usize;
        let to = (record.end as usize + 4).min(self.data.len());
        if let Err(err) = fs::write(dump_path, &self.data[from..to]) {
            warn!("failed to write record dump {}: {err}", dump_path.display());
        }
    }
}
