//! Data-access object over the layered store.
//!
//! Storage items live under `[contract-id LE4][user key]`. Contract records
//! and the id-to-hash index live under the contract-management namespace,
//! the way the native management contract lays them out.

use crate::contract_state::ContractState;
use crate::error::{RuntimeError, RuntimeResult};
use neodbg_core::UInt160;
use neodbg_store::{BatchItem, CachedStore, SeekDirection, Store};
use std::rc::Rc;

/// Storage id of the contract-management namespace.
pub const MANAGEMENT_ID: i32 = -1;
/// Management prefix for contract records, keyed by hash.
const PREFIX_CONTRACT: u8 = 8;
/// Management prefix for the id-to-hash index.
const PREFIX_CONTRACT_HASH: u8 = 12;
/// Management key for the next free contract id.
const PREFIX_NEXT_AVAILABLE_ID: u8 = 15;

/// A transactional view over blockchain state.
///
/// All writes land in the owned overlay; the base (live chain state or a
/// historic snapshot) is never touched.
pub struct Dao {
    store: CachedStore,
}

impl Dao {
    /// Creates a DAO with a fresh overlay over `base`.
    pub fn new(base: Rc<dyn Store>) -> Self {
        Self {
            store: CachedStore::new(base),
        }
    }

    /// The full storage key for a contract-scoped user key.
    pub fn storage_key(id: i32, key: &[u8]) -> Vec<u8> {
        let mut full = Vec::with_capacity(4 + key.len());
        full.extend_from_slice(&id.to_le_bytes());
        full.extend_from_slice(key);
        full
    }

    /// Reads a contract's storage item.
    pub fn get_storage_item(&self, id: i32, key: &[u8]) -> Option<Vec<u8>> {
        self.store.get(&Self::storage_key(id, key))
    }

    /// Writes a contract's storage item into the overlay.
    pub fn put_storage_item(&mut self, id: i32, key: &[u8], value: Vec<u8>) {
        self.store.put(Self::storage_key(id, key), value);
    }

    /// Deletes a contract's storage item in the overlay.
    pub fn delete_storage_item(&mut self, id: i32, key: &[u8]) {
        self.store.delete(&Self::storage_key(id, key));
    }

    /// Scans a contract's storage under `prefix`. Returned keys are the
    /// user-key portion, id prefix trimmed. `depth` 1 restricts the scan to
    /// the overlay: the storage-diff view.
    pub fn find_storage(
        &self,
        id: i32,
        prefix: &[u8],
        backwards: bool,
        depth: usize,
    ) -> Vec<(Vec<u8>, Vec<u8>)> {
        let direction = if backwards {
            SeekDirection::Backward
        } else {
            SeekDirection::Forward
        };
        self.store
            .seek(&Self::storage_key(id, prefix), direction, depth)
            .into_iter()
            .map(|(key, value)| (key[4..].to_vec(), value))
            .collect()
    }

    /// The overlay's pending operations, in first-touch order.
    pub fn get_batch(&self) -> Vec<BatchItem> {
        self.store.get_batch()
    }

    /// True when the overlay holds no pending writes.
    pub fn is_clean(&self) -> bool {
        self.store.is_clean()
    }

    /// Resolves a deployed contract by hash.
    pub fn get_contract(&self, hash: &UInt160) -> Option<ContractState> {
        let mut key = vec![PREFIX_CONTRACT];
        key.extend_from_slice(hash.as_bytes());
        let record = self.get_storage_item(MANAGEMENT_ID, &key)?;
        serde_json::from_slice(&record).ok()
    }

    /// Resolves a deployed contract by its signed 32-bit id.
    pub fn get_contract_by_id(&self, id: i32) -> Option<ContractState> {
        let mut key = vec![PREFIX_CONTRACT_HASH];
        key.extend_from_slice(&id.to_be_bytes());
        let hash_bytes = self.get_storage_item(MANAGEMENT_ID, &key)?;
        let hash = UInt160::from_bytes(&hash_bytes).ok()?;
        self.get_contract(&hash)
    }

    /// Records a deployed contract and its id index entry.
    pub fn put_contract(&mut self, state: &ContractState) -> RuntimeResult<()> {
        let record = serde_json::to_vec(state).map_err(RuntimeError::InvalidManifest)?;
        let mut key = vec![PREFIX_CONTRACT];
        key.extend_from_slice(state.hash.as_bytes());
        self.put_storage_item(MANAGEMENT_ID, &key, record);

        let mut index_key = vec![PREFIX_CONTRACT_HASH];
        index_key.extend_from_slice(&state.id.to_be_bytes());
        self.put_storage_item(MANAGEMENT_ID, &index_key, state.hash.to_le_vec());
        Ok(())
    }

    /// Allocates the next free contract id, starting from 1.
    pub fn next_contract_id(&mut self) -> i32 {
        let key = [PREFIX_NEXT_AVAILABLE_ID];
        let next = self
            .get_storage_item(MANAGEMENT_ID, &key)
            .and_then(|bytes| bytes.try_into().ok().map(i32::from_le_bytes))
            .unwrap_or(1);
        self.put_storage_item(MANAGEMENT_ID, &key, (next + 1).to_le_bytes().to_vec());
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract_state::NefFile;
    use crate::manifest::ContractManifest;
    use neodbg_store::MemoryStore;

    fn empty_dao() -> Dao {
        Dao::new(Rc::new(MemoryStore::new()))
    }

    #[test]
    fn storage_key_layout() {
        let key = Dao::storage_key(5, &[0xaa]);
        assert_eq!(key, vec![5, 0, 0, 0, 0xaa]);
        let key = Dao::storage_key(-1, b"");
        assert_eq!(key, vec![0xff, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn storage_round_trip_and_isolation() {
        let mut dao = empty_dao();
        dao.put_storage_item(1, &[1], vec![9]);
        assert_eq!(dao.get_storage_item(1, &[1]), Some(vec![9]));
        // A different contract id does not see the key.
        assert_eq!(dao.get_storage_item(2, &[1]), None);
    }

    #[test]
    fn find_trims_the_id_prefix() {
        let mut dao = empty_dao();
        dao.put_storage_item(7, &[1, 1], vec![1]);
        dao.put_storage_item(7, &[1, 2], vec![2]);
        dao.put_storage_item(7, &[2, 0], vec![3]);
        let found = dao.find_storage(7, &[1], false, 0);
        assert_eq!(
            found,
            vec![(vec![1, 1], vec![1]), (vec![1, 2], vec![2])]
        );
    }

    #[test]
    fn contract_records_resolve_by_hash_and_id() {
        let mut dao = empty_dao();
        let nef = NefFile::from_script("c", vec![0x11]).unwrap();
        let hash = UInt160::from_script(&nef.script);
        let id = dao.next_contract_id();
        let state = ContractState::new(id, hash, nef, ContractManifest::new("T"));
        dao.put_contract(&state).unwrap();

        assert_eq!(dao.get_contract(&hash).unwrap().id, id);
        assert_eq!(dao.get_contract_by_id(id).unwrap().hash, hash);
        assert!(dao.get_contract_by_id(id + 1).is_none());
    }

    #[test]
    fn contract_ids_increment() {
        let mut dao = empty_dao();
        assert_eq!(dao.next_contract_id(), 1);
        assert_eq!(dao.next_contract_id(), 2);
    }
}
