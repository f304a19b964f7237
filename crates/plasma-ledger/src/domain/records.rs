//! Spending records: what the ledger stores under a `ctr` slot.
//!
//! `record = [signed_tx, [consumed_utxo_key(61)...]]`

use super::codec::{self, expect_list, fixed};
use super::errors::{DecodeError, LedgerError, Result};
use super::indexer::{keys_for_inputs, UtxoKey, UTXO_KEY_LENGTH};
use super::rlp::{self, rlp_encode_bytes, rlp_encode_list};
use super::transaction::{SignedTransaction, TransactionType};
use plasma_crypto::CryptoWorkerPool;

/// An accepted transaction together with the UTXO keys it consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendingRecord {
    /// Accepted transaction
    pub transaction: SignedTransaction,
    /// Keys cleared when the transaction was accepted; empty for funding
    pub consumed: Vec<UtxoKey>,
}

impl SpendingRecord {
    /// Record for a spending transaction. Derives the consumed keys from
    /// the recovered sender.
    pub fn for_spend(transaction: SignedTransaction, pool: &CryptoWorkerPool) -> Result<Self> {
        if transaction.tx_type() == TransactionType::Fund {
            return Err(LedgerError::FundingNotSpendable);
        }
        let consumed = keys_for_inputs(&transaction, pool)?;
        Ok(Self {
            transaction,
            consumed,
        })
    }

    /// Record for an operator funding transaction.
    pub fn for_funding(transaction: SignedTransaction) -> Self {
        Self {
            transaction,
            consumed: Vec::new(),
        }
    }

    /// RLP encoding.
    pub fn encode(&self) -> Vec<u8> {
        let keys: Vec<Vec<u8>> = self.consumed.iter().map(|k| rlp_encode_bytes(k)).collect();
        rlp_encode_list(&[codec::encode(&self.transaction), rlp_encode_list(&keys)])
    }

    /// Strict RLP decoding.
    pub fn decode(bytes: &[u8]) -> std::result::Result<Self, DecodeError> {
        let item = rlp::decode(bytes)?;
        let fields = expect_list(&item, "spending record", 2)?;
        let transaction = codec::signed_from_item(&fields[0])?;
        let consumed = fields[1]
            .as_list()?
            .iter()
            .map(|key| fixed::<UTXO_KEY_LENGTH>(key, "consumed key"))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            transaction,
            consumed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indexer::key_for_input;
    use crate::test_utils::{fund_tx, split_tx, TestKey};

    #[test]
    fn test_spend_record_keys() {
        let pool = CryptoWorkerPool::new(1);
        let alice = TestKey::new(1);
        let tx = split_tx(&alice, &pool, (1, 2, 0), 50, &[([3; 20], 50)]);
        let record = SpendingRecord::for_spend(tx.clone(), &pool).unwrap();
        assert_eq!(record.consumed, vec![key_for_input(&tx, 0, &pool).unwrap()]);

        let decoded = SpendingRecord::decode(&record.encode()).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_funding_record_has_no_consumed_keys() {
        let pool = CryptoWorkerPool::new(1);
        let tx = fund_tx(&TestKey::new(9), &pool, [1; 20], 10);
        assert_eq!(
            SpendingRecord::for_spend(tx.clone(), &pool),
            Err(LedgerError::FundingNotSpendable)
        );
        let record = SpendingRecord::for_funding(tx);
        let decoded = SpendingRecord::decode(&record.encode()).unwrap();
        assert!(decoded.consumed.is_empty());
    }

    #[test]
    fn test_short_consumed_key_rejected() {
        let pool = CryptoWorkerPool::new(1);
        let tx = fund_tx(&TestKey::new(9), &pool, [1; 20], 10);
        let bytes = rlp_encode_list(&[
            codec::encode(&tx),
            rlp_encode_list(&[rlp_encode_bytes(&[0u8; 60])]),
        ]);
        assert!(matches!(
            SpendingRecord::decode(&bytes),
            Err(DecodeError::FieldLength { .. })
        ));
    }
}
