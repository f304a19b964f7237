//! # Operator Policy
//!
//! Rules applied to every non-Fund transaction after structural validation:
//!
//! 1. Every output is at least `min_utxo_size`.
//! 2. With a non-zero `fee_per_branch`:
//!    - Merge must reduce the branching factor (more than one input, one output)
//!    - Split must carry at least two outputs; the last one pays the beneficiary
//!      at least `fee_per_branch * (outputs - 1)`

use crate::domain::errors::PolicyViolation;
use crate::domain::transaction::{SignedTransaction, TransactionType};
use crate::ports::outbound::PolicyChecker;
use plasma_crypto::Address;
use primitive_types::U256;

/// Fee and dust policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeePolicy {
    /// Receiver of split fees
    pub beneficiary: Address,
    /// Fee owed per extra output of a split
    pub fee_per_branch: U256,
    /// Smallest accepted output value
    pub min_utxo_size: U256,
}

impl FeePolicy {
    /// Policy with no fee and no minimum output size.
    pub fn permissive() -> Self {
        Self {
            beneficiary: [0u8; 20],
            fee_per_branch: U256::zero(),
            min_utxo_size: U256::zero(),
        }
    }

    fn check_output_sizes(&self, tx: &SignedTransaction) -> Result<(), PolicyViolation> {
        for (index, output) in tx.outputs().iter().enumerate() {
            if output.value < self.min_utxo_size {
                return Err(PolicyViolation::OutputTooSmall {
                    index,
                    value: output.value,
                    minimum: self.min_utxo_size,
                });
            }
        }
        Ok(())
    }

    fn check_fee(&self, tx: &SignedTransaction) -> Result<(), PolicyViolation> {
        if self.fee_per_branch.is_zero() {
            return Ok(());
        }
        let inputs = tx.inputs().len();
        let outputs = tx.outputs();
        match tx.tx_type() {
            TransactionType::Fund => Ok(()),
            TransactionType::Merge => {
                if inputs > 1 && outputs.len() == 1 {
                    Ok(())
                } else {
                    Err(PolicyViolation::MergeBranching)
                }
            }
            TransactionType::Split => {
                let Some(fee_output) = outputs.last().filter(|_| outputs.len() >= 2) else {
                    return Err(PolicyViolation::SplitWithoutFee);
                };
                if fee_output.to != self.beneficiary {
                    return Err(PolicyViolation::FeeRecipient);
                }
                let branches = U256::from(outputs.len() - 1);
                let required = self.fee_per_branch.saturating_mul(branches);
                if fee_output.value < required {
                    return Err(PolicyViolation::FeeTooSmall {
                        required,
                        paid: fee_output.value,
                    });
                }
                Ok(())
            }
        }
    }
}

impl PolicyChecker for FeePolicy {
    fn check(&self, tx: &SignedTransaction) -> Result<(), PolicyViolation> {
        if tx.tx_type() == TransactionType::Fund {
            return Ok(());
        }
        self.check_output_sizes(tx)?;
        self.check_fee(tx)
    }
}
