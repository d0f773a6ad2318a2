//! Historic execution: state as of a chosen block height.

use crate::dao::Dao;
use crate::error::RuntimeResult;
use crate::interop::InteropContext;
use crate::ledger::Ledger;
use crate::trigger::TriggerType;
use std::collections::HashMap;

/// Builds an interop context that reads state as it was after block
/// `height`, while presenting block `height + 1` as the one currently
/// being accepted.
///
/// Writes land in a fresh overlay over the snapshot; the stored history is
/// never touched, and the overlay dies with the context.
pub fn historic_context(ledger: &Ledger, height: u32) -> RuntimeResult<InteropContext> {
    let snapshot = ledger.snapshot_store(height)?;
    Ok(InteropContext {
        trigger: TriggerType::Application,
        dao: Dao::new(snapshot),
        container: None,
        notifications: Vec::new(),
        logs: Vec::new(),
        settings: ledger.settings().clone(),
        chain_height: ledger.height(),
        block_height: height + 1,
        method_tokens: HashMap::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use neodbg_config::{DbType, ProtocolSettings};

    #[test]
    fn historic_view_reads_old_state() {
        let mut ledger = Ledger::new(ProtocolSettings::default(), DbType::InMemory);
        for value in 1u8..=4 {
            ledger
                .persist_block(Vec::new(), |dao| {
                    dao.put_storage_item(1, &[1], vec![value]);
                    Ok(())
                })
                .unwrap();
        }
        let historic = historic_context(&ledger, 2).unwrap();
        assert_eq!(historic.dao.get_storage_item(1, &[1]), Some(vec![2]));
        assert_eq!(historic.block_height, 3);
        assert_eq!(historic.chain_height, 4);
    }

    #[test]
    fn historic_writes_never_reach_history() {
        let mut ledger = Ledger::new(ProtocolSettings::default(), DbType::InMemory);
        ledger
            .persist_block(Vec::new(), |dao| {
                dao.put_storage_item(1, &[1], vec![1]);
                Ok(())
            })
            .unwrap();

        let mut historic = historic_context(&ledger, 1).unwrap();
        historic.dao.put_storage_item(1, &[1], vec![99]);
        assert_eq!(historic.dao.get_storage_item(1, &[1]), Some(vec![99]));

        // The snapshot and the live chain are unchanged.
        let fresh = historic_context(&ledger, 1).unwrap();
        assert_eq!(fresh.dao.get_storage_item(1, &[1]), Some(vec![1]));
        assert_eq!(ledger.state_view().get_storage_item(1, &[1]), Some(vec![1]));
    }

    #[test]
    fn historic_height_out_of_range() {
        let ledger = Ledger::new(ProtocolSettings::default(), DbType::InMemory);
        assert!(historic_context(&ledger, 5).is_err());
    }
}
