use crate::chain::Chain;
use crate::error::SnapshotError;
use std::collections::{BTreeMap, HashMap};
use std::io::{self, Write};
use tracing::warn;
use znn_types::{Block, Hash256, OutPoint};

/// Receives the per-block export stream, in block order: the tip height,
/// the block hash at that height, the block's transaction hashes, every
/// address-bearing output, and finally the block's net per-address deltas.
///
/// Implementations are write-only from the engine's perspective; spends are
/// resolved from the in-memory backlog, never read back from the sink.
pub trait SnapshotSink {
    fn tip_height(&mut self, height: u64);
    fn block_hash(&mut self, height: u64, hash: &Hash256);
    fn block_txns(&mut self, height: u64, txns: &[Hash256]);
    fn tx_output(&mut self, txid: &Hash256, index: u32, address: &str, amount: i64);
    fn address_delta(&mut self, address: &str, height: u64, delta: i64);
}

/// Walks the linked chain from genesis and accumulates per-address balance
/// changes, consuming each block exactly once.
///
/// Every address-bearing output is remembered in a backlog keyed by its
/// outpoint so that later inputs can resolve the address and amount they
/// spend. Inputs of minting transactions claim nothing and are skipped; the
/// extended staking coinbase does claim its staked output and is processed
/// like any spend.
// Reborrowing `sink.as_deref_mut()` directly inside a loop runs into a
// known NLL limitation where the borrow is extended to the loop's
// enclosing scope; routing it through an explicit-lifetime function avoids
// that without changing what gets borrowed or for how long.
fn reborrow_sink<'a>(
    sink: &'a mut Option<&mut dyn SnapshotSink>,
) -> Option<&'a mut dyn SnapshotSink> {
    match sink {
        Some(s) => Some(&mut **s),
        None => None,
    }
}

pub struct SnapshotEngine {
    balances: BTreeMap<String, i64>,
    backlog: HashMap<OutPoint, (String, i64)>,
    strict_balances: bool,
}

impl Default for SnapshotEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotEngine {
    pub fn new() -> Self {
        SnapshotEngine {
            balances: BTreeMap::new(),
            backlog: HashMap::new(),
            strict_balances: false,
        }
    }

    /// Makes a balance falling below zero a fatal error instead of a
    /// warning. Off by default: negative intermediate values can be an
    /// artifact of snapshotting a chain prefix.
    pub fn strict_balances(mut self, on: bool) -> Self {
        self.strict_balances = on;
        self
    }

    /// Consumes the whole chain, genesis first. Blocks are removed from the
    /// chain as they are processed, releasing their memory early.
    pub fn consume_chain(
        &mut self,
        chain: &mut Chain,
        mut sink: Option<&mut dyn SnapshotSink>,
    ) -> Result<(), SnapshotError> {
        let mut cursor = chain.genesis();
        while let Some(block) = chain.take(&cursor) {
            self.consume_block(&block, reborrow_sink(&mut sink))?;
            if block.next_hash.is_null() {
                break;
            }
            cursor = block.next_hash;
        }
        // The backlog exists only to resolve spends during the walk.
        self.backlog = HashMap::new();
        Ok(())
    }

    fn consume_block(
        &mut self,
        block: &Block,
        mut sink: Option<&mut dyn SnapshotSink>,
    ) -> Result<(), SnapshotError> {
        // Net per-address movement of this block, reported to the sink
        // after the block's transactions are fully applied. Not tracked
        // when no sink is listening.
        let track_deltas = sink.is_some();
        let mut block_deltas: BTreeMap<String, i64> = BTreeMap::new();

        if let Some(sink) = sink.as_deref_mut() {
            sink.tip_height(block.height);
            sink.block_hash(block.height, &block.hash);
            let txns: Vec<Hash256> = block.txns.iter().map(|tx| tx.hash).collect();
            sink.block_txns(block.height, &txns);
        }

        for tx in &block.txns {
            for (index, output) in tx.vout.iter().enumerate() {
                // Addressless outputs (coin-stake markers, data carriers,
                // burns) move no spendable balance.
                if output.address.is_empty() {
                    continue;
                }
                let outpoint = OutPoint::new(tx.hash, index as u32);
                self.backlog
                    .insert(outpoint, (output.address.clone(), output.amount));
                if output.amount > 0 {
                    *self.balances.entry(output.address.clone()).or_insert(0) +=
                        output.amount;
                    if track_deltas {
                        *block_deltas.entry(output.address.clone()).or_insert(0) +=
                            output.amount;
                    }
                }
                if let Some(sink) = sink.as_deref_mut() {
                    sink.tx_output(&tx.hash, index as u32, &output.address, output.amount);
                }
            }

            if !tx.kind().is_minting() {
                for vin in &tx.vin {
                    if !vin.claims_output() {
                        continue;
                    }
                    let (address, amount) = self
                        .backlog
                        .get(&vin.prev_out)
                        .cloned()
                        .ok_or(SnapshotError::DanglingInput(vin.prev_out))?;
                    let balance = self.balances.entry(address.clone()).or_insert(0);
                    *balance -= amount;
                    let balance = *balance;
                    if track_deltas {
                        *block_deltas.entry(address.clone()).or_insert(0) -= amount;
                    }
                    if balance < 0 {
                        if self.strict_balances {
                            return Err(SnapshotError::NegativeBalance { address, balance });
                        }
                        warn!(
                            height = block.height,
                            address = %address,
                            balance,
                            "balance went negative"
                        );
                    }
                }
            }
        }

        if let Some(sink) = sink.as_deref_mut() {
            for (address, delta) in &block_deltas {
                sink.address_delta(address, block.height, *delta);
            }
        }

        Ok(())
    }

    /// The accumulated balances, keyed in ascending address order.
    pub fn balances(&self) -> &BTreeMap<String, i64> {
        &self.balances
    }

    /// Writes the snapshot in its stable text form: one `address:amount`
    /// line per address, ascending.
    pub fn write_to<W: Write>(&self, mut writer: W) -> io::Result<()> {
        for (address, balance) in &self.balances {
            writeln!(writer, "{address}:{balance}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{BlockMap, ChainLinker};
    use assert_matches::assert_matches;
    use znn_types::{
        ChainParams, Header, ScriptKind, Transaction, TxInput, TxKind, TxOutput, MAINNET,
    };

    fn hash(id: u8) -> Hash256 {
        Hash256::from_bytes([id; 32])
    }

    fn coinbase_input() -> TxInput {
        TxInput {
            prev_out: OutPoint::new(Hash256::ZERO, u32::MAX),
            script_sig: vec![0x51],
            sequence: u32::MAX,
        }
    }

    fn claim(txid: u8, vout: u32) -> TxInput {
        TxInput {
            prev_out: OutPoint::new(hash(txid), vout),
            script_sig: vec![],
            sequence: u32::MAX,
        }
    }

    fn pay(address: &str, amount: i64) -> TxOutput {
        TxOutput {
            amount,
            script_pubkey: vec![0x76, 0xa9],
            address: address.to_string(),
            kind: ScriptKind::PubkeyHash,
        }
    }

    fn marker() -> TxOutput {
        TxOutput {
            amount: 0,
            script_pubkey: vec![],
            address: String::new(),
            kind: ScriptKind::Empty,
        }
    }

    fn tx(id: u8, vin: Vec<TxInput>, vout: Vec<TxOutput>) -> Transaction {
        Transaction {
            version: 1,
            locktime: 0,
            hash: hash(id),
            vin,
            vout,
        }
    }

    fn block(id: u8, prev: Hash256, txns: Vec<Transaction>) -> znn_types::Block {
        let header = Header {
            version: 4,
            prev_hash: prev,
            ..Header::default()
        };
        znn_types::Block::new(0, 0, hash(id), header, txns, Vec::new())
    }

    fn test_params() -> ChainParams {
        let mut params = MAINNET.clone();
        params.genesis_hash = hash(1);
        params
    }

    /// G -> A -> B: A mints 50 to X, B spends X's output into Y:30, Z:20.
    fn spend_chain() -> Chain {
        let mut blocks = BlockMap::new();
        blocks.insert(hash(1), block(1, Hash256::ZERO, vec![]));
        blocks.insert(
            hash(2),
            block(2, hash(1), vec![tx(10, vec![coinbase_input()], vec![pay("X", 50)])]),
        );
        blocks.insert(
            hash(3),
            block(
                3,
                hash(2),
                vec![tx(11, vec![claim(10, 0)], vec![pay("Y", 30), pay("Z", 20)])],
            ),
        );
        let params = test_params();
        ChainLinker::new(&params).link(blocks, hash(3)).unwrap()
    }

    #[test]
    fn mint_and_spend_end_to_end() {
        let mut chain = spend_chain();
        let mut engine = SnapshotEngine::new();
        engine.consume_chain(&mut chain, None).unwrap();

        assert_eq!(engine.balances().len(), 3);
        assert_eq!(engine.balances()["X"], 0);
        assert_eq!(engine.balances()["Y"], 30);
        assert_eq!(engine.balances()["Z"], 20);
        // Every block was consumed and released.
        assert!(chain.is_empty());
    }

    #[test]
    fn coins_are_conserved() {
        let mut chain = spend_chain();
        let mut engine = SnapshotEngine::new();
        engine.consume_chain(&mut chain, None).unwrap();

        // Non-coinbase spends net to zero, so the sum of all balances is
        // the sum of minted outputs.
        let total: i64 = engine.balances().values().sum();
        assert_eq!(total, 50);
    }

    #[test]
    fn snapshot_text_is_sorted_and_stable() {
        let mut chain = spend_chain();
        let mut engine = SnapshotEngine::new();
        engine.consume_chain(&mut chain, None).unwrap();

        let mut out = Vec::new();
        engine.write_to(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "X:0\nY:30\nZ:20\n");
    }

    #[test]
    fn coinbase_inputs_are_not_processed() {
        // A PoW coinbase's input claims nothing; nothing may be deducted.
        let mut blocks = BlockMap::new();
        blocks.insert(hash(1), block(1, Hash256::ZERO, vec![]));
        blocks.insert(
            hash(2),
            block(2, hash(1), vec![tx(10, vec![coinbase_input()], vec![pay("X", 50)])]),
        );
        let params = test_params();
        let mut chain = ChainLinker::new(&params).link(blocks, hash(2)).unwrap();

        let mut engine = SnapshotEngine::new();
        engine.consume_chain(&mut chain, None).unwrap();
        assert_eq!(engine.balances()["X"], 50);
    }

    #[test]
    fn extended_staking_coinbase_spends_its_stake() {
        // A mints 40 to S; B's reward transaction claims that output and
        // pays S:55 and N:5. Unlike the plain coinbases, its input is
        // processed.
        let mut blocks = BlockMap::new();
        blocks.insert(hash(1), block(1, Hash256::ZERO, vec![]));
        blocks.insert(
            hash(2),
            block(2, hash(1), vec![tx(10, vec![coinbase_input()], vec![pay("S", 40)])]),
        );
        let reward = tx(
            11,
            vec![claim(10, 0)],
            vec![marker(), pay("S", 55), pay("N", 5)],
        );
        assert_eq!(reward.kind(), TxKind::PosCoinbaseExt);
        blocks.insert(hash(3), block(3, hash(2), vec![reward]));

        let params = test_params();
        let mut chain = ChainLinker::new(&params).link(blocks, hash(3)).unwrap();
        let mut engine = SnapshotEngine::new();
        engine.consume_chain(&mut chain, None).unwrap();

        assert_eq!(engine.balances()["S"], 55); // 40 minted + 55 reward - 40 staked
        assert_eq!(engine.balances()["N"], 5);
    }

    #[test]
    fn zero_amount_outputs_join_the_backlog_but_not_the_balances() {
        let mut blocks = BlockMap::new();
        blocks.insert(hash(1), block(1, Hash256::ZERO, vec![]));
        blocks.insert(
            hash(2),
            block(2, hash(1), vec![tx(10, vec![coinbase_input()], vec![pay("X", 0)])]),
        );
        // Spending the zero output works and nets to zero.
        blocks.insert(
            hash(3),
            block(3, hash(2), vec![tx(11, vec![claim(10, 0)], vec![pay("Y", 0)])]),
        );
        let params = test_params();
        let mut chain = ChainLinker::new(&params).link(blocks, hash(3)).unwrap();

        let mut engine = SnapshotEngine::new();
        engine.consume_chain(&mut chain, None).unwrap();
        // X only appears through the spend deduction of its zero amount.
        assert_eq!(engine.balances()["X"], 0);
        assert!(!engine.balances().contains_key("Y"));
    }

    #[test]
    fn unknown_outpoint_is_a_dangling_input() {
        let mut blocks = BlockMap::new();
        blocks.insert(hash(1), block(1, Hash256::ZERO, vec![]));
        blocks.insert(
            hash(2),
            block(2, hash(1), vec![tx(10, vec![claim(99, 7)], vec![pay("X", 1)])]),
        );
        let params = test_params();
        let mut chain = ChainLinker::new(&params).link(blocks, hash(2)).unwrap();

        let mut engine = SnapshotEngine::new();
        assert_matches!(
            engine.consume_chain(&mut chain, None),
            Err(SnapshotError::DanglingInput(outpoint)) if outpoint == OutPoint::new(hash(99), 7)
        );
    }

    #[test]
    fn strict_balances_flags_overspends() {
        // The same outpoint spent twice drives X negative.
        let overspend_chain = |params: &ChainParams| {
            let mut blocks = BlockMap::new();
            blocks.insert(hash(1), block(1, Hash256::ZERO, vec![]));
            blocks.insert(
                hash(2),
                block(2, hash(1), vec![tx(10, vec![coinbase_input()], vec![pay("X", 10)])]),
            );
            blocks.insert(
                hash(3),
                block(
                    3,
                    hash(2),
                    vec![
                        tx(11, vec![claim(10, 0)], vec![pay("Y", 10)]),
                        tx(12, vec![claim(10, 0)], vec![pay("Z", 10)]),
                    ],
                ),
            );
            ChainLinker::new(params).link(blocks, hash(3)).unwrap()
        };
        let params = test_params();

        let mut strict = SnapshotEngine::new().strict_balances(true);
        assert_matches!(
            strict.consume_chain(&mut overspend_chain(&params), None),
            Err(SnapshotError::NegativeBalance { balance: -10, .. })
        );

        // Advisory by default: the run completes.
        let mut lax = SnapshotEngine::new();
        lax.consume_chain(&mut overspend_chain(&params), None).unwrap();
        assert_eq!(lax.balances()["X"], -10);
    }

    /// Records every sink call as a flat string for order assertions.
    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl SnapshotSink for Recorder {
        fn tip_height(&mut self, height: u64) {
            self.events.push(format!("tip {height}"));
        }
        fn block_hash(&mut self, height: u64, hash: &Hash256) {
            self.events.push(format!("hash {height} {hash}"));
        }
        fn block_txns(&mut self, height: u64, txns: &[Hash256]) {
            self.events.push(format!("txns {height} {}", txns.len()));
        }
        fn tx_output(&mut self, _txid: &Hash256, index: u32, address: &str, amount: i64) {
            self.events.push(format!("out {index} {address} {amount}"));
        }
        fn address_delta(&mut self, address: &str, height: u64, delta: i64) {
            self.events.push(format!("delta {address} {height} {delta}"));
        }
    }

    #[test]
    fn sink_receives_the_block_stream_in_order() {
        let mut chain = spend_chain();
        let mut engine = SnapshotEngine::new();
        let mut recorder = Recorder::default();
        engine
            .consume_chain(&mut chain, Some(&mut recorder))
            .unwrap();

        let expected_prefix = vec![
            "tip 0".to_string(),
            format!("hash 0 {}", hash(1)),
            "txns 0 0".to_string(),
            "tip 1".to_string(),
            format!("hash 1 {}", hash(2)),
            "txns 1 1".to_string(),
            "out 0 X 50".to_string(),
            "delta X 1 50".to_string(),
            "tip 2".to_string(),
            format!("hash 2 {}", hash(3)),
            "txns 2 1".to_string(),
            "out 0 Y 30".to_string(),
            "out 1 Z 20".to_string(),
        ];
        assert_eq!(&recorder.events[..expected_prefix.len()], &expected_prefix[..]);

        // The final block nets +30 to Y, +20 to Z and -50 to X, reported
        // in address order after the block's outputs.
        let tail: Vec<&str> = recorder.events[expected_prefix.len()..]
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(tail, vec!["delta X 2 -50", "delta Y 2 30", "delta Z 2 20"]);
    }
}
