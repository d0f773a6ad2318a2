//! An in-memory chain view for the debugger.
//!
//! Keeps the live state, a state snapshot per persisted block (what historic
//! execution reads), deployed contracts and indexed transactions. The store
//! trait is the seam a full node's backing store would plug into.

use crate::contract_state::{ContractState, NefFile};
use crate::dao::Dao;
use crate::error::{RuntimeError, RuntimeResult};
use crate::manifest::ContractManifest;
use neodbg_config::{DbType, ProtocolSettings};
use neodbg_core::{Transaction, UInt160, UInt256};
use neodbg_store::{MemoryStore, Store, TrackState};
use std::collections::HashMap;
use std::rc::Rc;

/// The blockchain object the debug shell runs against.
pub struct Ledger {
    settings: ProtocolSettings,
    db_type: DbType,
    store: MemoryStore,
    // State after block h lives at snapshots[h].
    snapshots: Vec<MemoryStore>,
    transactions: HashMap<UInt256, (Transaction, u32)>,
    height: u32,
}

impl Ledger {
    /// Creates a chain holding only an empty genesis block.
    pub fn new(settings: ProtocolSettings, db_type: DbType) -> Self {
        let store = MemoryStore::new();
        Self {
            settings,
            db_type,
            snapshots: vec![store.clone()],
            store,
            transactions: HashMap::new(),
            height: 0,
        }
    }

    /// The protocol settings of this chain.
    pub fn settings(&self) -> &ProtocolSettings {
        &self.settings
    }

    /// The backing store type, reported by `env`.
    pub fn db_type(&self) -> DbType {
        self.db_type
    }

    /// The current block height.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// A shareable view of the live state.
    pub fn current_store(&self) -> Rc<dyn Store> {
        Rc::new(self.store.clone())
    }

    /// The state as it was after block `height` was applied.
    pub fn snapshot_store(&self, height: u32) -> RuntimeResult<Rc<dyn Store>> {
        let snapshot = self
            .snapshots
            .get(height as usize)
            .ok_or(RuntimeError::HeightOutOfRange {
                height,
                chain_height: self.height,
            })?;
        Ok(Rc::new(snapshot.clone()))
    }

    /// A read-only DAO over the live state.
    pub fn state_view(&self) -> Dao {
        Dao::new(self.current_store())
    }

    /// A transaction and the height of its block.
    pub fn transaction(&self, hash: &UInt256) -> Option<&(Transaction, u32)> {
        self.transactions.get(hash)
    }

    /// Persists a block: applies `apply`'s writes atomically, indexes
    /// `transactions`, snapshots the resulting state, and returns the new
    /// height.
    pub fn persist_block<F>(
        &mut self,
        transactions: Vec<Transaction>,
        apply: F,
    ) -> RuntimeResult<u32>
    where
        F: FnOnce(&mut Dao) -> RuntimeResult<()>,
    {
        let base: Rc<dyn Store> = Rc::new(self.store.clone());
        let mut dao = Dao::new(base);
        apply(&mut dao)?;
        for item in dao.get_batch() {
            match item.state {
                TrackState::Deleted => self.store.delete(&item.key),
                TrackState::Added | TrackState::Changed => self.store.put(item.key, item.value),
            }
        }
        self.height += 1;
        for transaction in transactions {
            self.transactions
                .insert(transaction.hash(), (transaction, self.height));
        }
        self.snapshots.push(self.store.clone());
        Ok(self.height)
    }

    /// Deploys a contract in a block of its own and returns its state.
    pub fn deploy_contract(
        &mut self,
        nef: NefFile,
        manifest: ContractManifest,
    ) -> RuntimeResult<ContractState> {
        let hash = UInt160::from_script(&nef.script);
        let mut deployed = None;
        self.persist_block(Vec::new(), |dao| {
            let id = dao.next_contract_id();
            let state = ContractState::new(id, hash, nef, manifest);
            dao.put_contract(&state)?;
            deployed = Some(state);
            Ok(())
        })?;
        Ok(deployed.expect("apply closure always runs"))
    }
}
