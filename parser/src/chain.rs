use crate::error::ChainError;
use std::collections::HashMap;
use tracing::info;
use znn_types::{Block, ChainParams, Hash256};

/// Every parsed block keyed by its id, before chain reconstruction.
pub type BlockMap = HashMap<Hash256, Block>;

/// The reconstructed main chain: exactly the blocks from genesis to the
/// working tip, forward-linked through `next_hash` and carrying heights.
#[derive(Debug)]
pub struct Chain {
    blocks: BlockMap,
    genesis: Hash256,
    tip: Hash256,
    tip_height: u64,
}

impl Chain {
    pub fn genesis(&self) -> Hash256 {
        self.genesis
    }

    pub fn tip(&self) -> Hash256 {
        self.tip
    }

    pub fn tip_height(&self) -> u64 {
        self.tip_height
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, hash: &Hash256) -> Option<&Block> {
        self.blocks.get(hash)
    }

    /// Removes and returns a block, releasing its memory to the caller.
    /// The snapshot walk consumes the chain this way, block by block.
    pub fn take(&mut self, hash: &Hash256) -> Option<Block> {
        self.blocks.remove(hash)
    }

    /// Checks the linking invariants: every retained block except the tip
    /// has a successor whose backlink and height agree with it.
    pub fn verify(&self) -> Result<(), ChainError> {
        for (hash, block) in &self.blocks {
            if *hash == self.tip {
                continue;
            }
            let next = self
                .blocks
                .get(&block.next_hash)
                .ok_or(ChainError::BrokenAncestry(*hash))?;
            if next.header.prev_hash != *hash || next.height != block.height + 1 {
                return Err(ChainError::BrokenAncestry(*hash));
            }
        }
        Ok(())
    }
}

/// Reconstructs the unique main chain from an unordered set of blocks.
///
/// The caller names the working tip (the last block parsed from the last
/// file; the read-ahead margin makes ending on a fork unlikely). Linking
/// walks the backlinks from the tip down to genesis, stamping each
/// predecessor's forward link, then walks forward assigning heights, and
/// finally drops everything the walk did not visit: orphans from abandoned
/// forks, and blocks above the height limit when one is set.
pub struct ChainLinker<'a> {
    params: &'a ChainParams,
    max_height: Option<u64>,
}

impl<'a> ChainLinker<'a> {
    pub fn new(params: &'a ChainParams) -> Self {
        ChainLinker {
            params,
            max_height: None,
        }
    }

    /// Limits the chain to blocks at or below `height`.
    pub fn with_max_height(mut self, height: u64) -> Self {
        self.max_height = Some(height);
        self
    }

    pub fn link(&self, mut blocks: BlockMap, tip: Hash256) -> Result<Chain, ChainError> {
        let genesis = self.params.genesis_hash;
        let available = blocks.len();

        // Reverse walk: stamp each predecessor's forward link.
        let mut current = tip;
        let mut linked = 1usize;
        while current != genesis {
            let block = blocks
                .get(&current)
                .ok_or(ChainError::BrokenAncestry(current))?;
            let prev = block.header.prev_hash;
            if prev.is_null() {
                // A rootless block that is not genesis: the tip belongs to
                // a chain this data set does not reach the bottom of.
                return Err(ChainError::MissingGenesis(current));
            }
            blocks
                .get_mut(&prev)
                .ok_or(ChainError::BrokenAncestry(prev))?
                .next_hash = current;
            current = prev;
            linked += 1;
            if linked > available {
                // Longer than the block count: the backlinks form a cycle.
                return Err(ChainError::BrokenAncestry(current));
            }
        }
        info!(linked, available, "linked main chain");

        // Forward walk: assign heights from genesis up to the tip. The walk
        // follows the links stamped above, so it must end at the tip.
        let mut height = 0u64;
        let mut cursor = genesis;
        let mut limit_tip = None;
        loop {
            let block = blocks
                .get_mut(&cursor)
                .ok_or(ChainError::BrokenAncestry(cursor))?;
            block.height = height;
            if self.max_height == Some(height) {
                limit_tip = Some(cursor);
            }
            let next = block.next_hash;
            if next.is_null() {
                if cursor != tip {
                    return Err(ChainError::UnreachableTip(cursor));
                }
                break;
            }
            cursor = next;
            height += 1;
        }

        // The snapshot ends either at the height limit or at the tip itself
        // when the limit lies beyond what was read.
        let (effective_tip, effective_height) = match limit_tip {
            Some(hash) => (hash, self.max_height.unwrap_or(height)),
            None => (tip, height),
        };

        // Anything whose predecessor does not link forward to it belongs to
        // an abandoned fork; with a height limit, the excess of the main
        // chain goes too.
        let doomed: Vec<Hash256> = blocks
            .iter()
            .filter(|(hash, block)| {
                if **hash == genesis {
                    return false;
                }
                let from_fork = match blocks.get(&block.header.prev_hash) {
                    Some(prev) => prev.next_hash != **hash,
                    None => true,
                };
                let above_limit = self.max_height.is_some_and(|max| block.height > max);
                from_fork || above_limit
            })
            .map(|(hash, _)| *hash)
            .collect();
        let removed = doomed.len();
        for hash in doomed {
            blocks.remove(&hash);
        }
        info!(removed, retained = blocks.len(), "pruned forked blocks");

        Ok(Chain {
            blocks,
            genesis,
            tip: effective_tip,
            tip_height: effective_height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use znn_types::{Header, MAINNET};

    fn hash(id: u8) -> Hash256 {
        Hash256::from_bytes([id; 32])
    }

    fn block(id: u8, prev: Hash256) -> Block {
        let header = Header {
            version: 4,
            prev_hash: prev,
            ..Header::default()
        };
        Block::new(0, 112, hash(id), header, Vec::new(), Vec::new())
    }

    fn params_with_genesis(id: u8) -> ChainParams {
        let mut params = MAINNET.clone();
        params.genesis_hash = hash(id);
        params
    }

    /// Builds a map for the given (id, prev_id) edges; id 1 is genesis.
    fn map_of(edges: &[(u8, u8)]) -> BlockMap {
        let mut blocks = BlockMap::new();
        blocks.insert(hash(1), block(1, Hash256::ZERO));
        for &(id, prev) in edges {
            blocks.insert(hash(id), block(id, hash(prev)));
        }
        blocks
    }

    #[test]
    fn links_a_linear_chain() {
        let params = params_with_genesis(1);
        let blocks = map_of(&[(2, 1), (3, 2), (4, 3)]);
        let chain = ChainLinker::new(&params).link(blocks, hash(4)).unwrap();

        assert_eq!(chain.len(), 4);
        assert_eq!(chain.tip(), hash(4));
        assert_eq!(chain.tip_height(), 3);
        assert_eq!(chain.get(&hash(1)).unwrap().height, 0);
        assert_eq!(chain.get(&hash(3)).unwrap().height, 2);
        assert_eq!(chain.get(&hash(3)).unwrap().next_hash, hash(4));
        assert!(chain.get(&hash(4)).unwrap().next_hash.is_null());
        chain.verify().unwrap();
    }

    #[test]
    fn prunes_a_one_block_fork() {
        // G -> A -> B (tip) with a competing G -> A -> C.
        let params = params_with_genesis(1);
        let blocks = map_of(&[(2, 1), (3, 2), (4, 2)]);
        let chain = ChainLinker::new(&params).link(blocks, hash(3)).unwrap();

        assert_eq!(chain.len(), 3);
        assert!(chain.get(&hash(4)).is_none());
        assert_eq!(chain.get(&hash(2)).unwrap().next_hash, hash(3));
        chain.verify().unwrap();
    }

    #[test]
    fn prunes_fork_descendants_transitively() {
        // The orphaned C has children D and E; all three must go.
        let params = params_with_genesis(1);
        let blocks = map_of(&[(2, 1), (3, 2), (4, 2), (5, 4), (6, 5)]);
        let chain = ChainLinker::new(&params).link(blocks, hash(3)).unwrap();

        assert_eq!(chain.len(), 3);
        for orphan in [4, 5, 6] {
            assert!(chain.get(&hash(orphan)).is_none());
        }
        chain.verify().unwrap();
    }

    #[test]
    fn height_limit_truncates_the_chain() {
        let params = params_with_genesis(1);
        let mut edges = Vec::new();
        for id in 2..=15 {
            edges.push((id, id - 1));
        }
        let blocks = map_of(&edges);

        let chain = ChainLinker::new(&params)
            .with_max_height(10)
            .link(blocks, hash(15))
            .unwrap();

        assert_eq!(chain.len(), 11);
        assert_eq!(chain.tip(), hash(11));
        assert_eq!(chain.tip_height(), 10);
        assert!(chain.get(&hash(12)).is_none());
        chain.verify().unwrap();
    }

    #[test]
    fn height_limit_beyond_the_tip_is_a_no_op() {
        let params = params_with_genesis(1);
        let blocks = map_of(&[(2, 1), (3, 2)]);
        let chain = ChainLinker::new(&params)
            .with_max_height(50)
            .link(blocks, hash(3))
            .unwrap();

        assert_eq!(chain.len(), 3);
        assert_eq!(chain.tip(), hash(3));
        assert_eq!(chain.tip_height(), 2);
    }

    #[test]
    fn missing_ancestor_is_broken_ancestry() {
        let params = params_with_genesis(1);
        // Block 3's predecessor 9 was never parsed.
        let blocks = map_of(&[(2, 1), (3, 9)]);
        assert_matches!(
            ChainLinker::new(&params).link(blocks, hash(3)),
            Err(ChainError::BrokenAncestry(h)) if h == hash(9)
        );
    }

    #[test]
    fn rootless_non_genesis_block_is_missing_genesis() {
        let params = params_with_genesis(1);
        let mut blocks = BlockMap::new();
        // A block with a null backlink whose hash is not the genesis hash.
        blocks.insert(hash(7), block(7, Hash256::ZERO));
        assert_matches!(
            ChainLinker::new(&params).link(blocks, hash(7)),
            Err(ChainError::MissingGenesis(h)) if h == hash(7)
        );
    }

    #[test]
    fn cyclic_backlinks_are_rejected() {
        let params = params_with_genesis(1);
        let mut blocks = map_of(&[(2, 1)]);
        // 3 <-> 4 reference each other; the tip sits on the cycle.
        blocks.insert(hash(3), block(3, hash(4)));
        blocks.insert(hash(4), block(4, hash(3)));
        assert_matches!(
            ChainLinker::new(&params).link(blocks, hash(3)),
            Err(ChainError::BrokenAncestry(_))
        );
    }

    #[test]
    fn genesis_only_chain() {
        let params = params_with_genesis(1);
        let blocks = map_of(&[]);
        let chain = ChainLinker::new(&params).link(blocks, hash(1)).unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.tip(), chain.genesis());
        assert_eq!(chain.tip_height(), 0);
        chain.verify().unwrap();
    }

    #[test]
    fn take_releases_ownership() {
        let params = params_with_genesis(1);
        let blocks = map_of(&[(2, 1)]);
        let mut chain = ChainLinker::new(&params).link(blocks, hash(2)).unwrap();

        let genesis = chain.take(&hash(1)).unwrap();
        assert_eq!(genesis.next_hash, hash(2));
        assert!(chain.take(&hash(1)).is_none());
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn verify_spots_a_tampered_link() {
        let params = params_with_genesis(1);
        let blocks = map_of(&[(2, 1), (3, 2)]);
        let mut chain = ChainLinker::new(&params).link(blocks, hash(3)).unwrap();
        chain.blocks.get_mut(&hash(2)).unwrap().height = 9;
        assert_matches!(chain.verify(), Err(ChainError::BrokenAncestry(_)));
    }
}
