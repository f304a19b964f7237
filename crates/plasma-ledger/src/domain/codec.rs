//! # Transaction Codec
//!
//! Wire layout (every field a fixed-width RLP byte string):
//!
//! ```text
//! unsigned = [type(1), [input...], [output...]]
//! input    = [block(4), tx(4), out(1), value(32)]
//! output   = [out(1), to(20), value(32)]
//! signed   = [unsigned, V(1), R(32), S(32)]
//! ```
//!
//! `decode` is strict: any non-canonical or mis-sized encoding is rejected, so
//! `encode(decode(b)) == b` for every accepted `b`.

use super::errors::{DecodeError, ValidationError};
use super::rlp::{self, rlp_encode_bytes, rlp_encode_list, RlpItem};
use super::transaction::*;
use primitive_types::U256;

// =============================================================================
// ENCODING
// =============================================================================

/// Canonical encoding of a signed transaction.
pub fn encode(tx: &SignedTransaction) -> Vec<u8> {
    rlp_encode_list(&[
        encode_unsigned(tx.unsigned()),
        rlp_encode_bytes(&[tx.v()]),
        rlp_encode_bytes(tx.r()),
        rlp_encode_bytes(tx.s()),
    ])
}

/// Canonical encoding of the signed body.
pub fn encode_unsigned(tx: &UnsignedTransaction) -> Vec<u8> {
    let inputs: Vec<Vec<u8>> = tx.inputs().iter().map(encode_input).collect();
    let outputs: Vec<Vec<u8>> = tx.outputs().iter().map(encode_output).collect();
    rlp_encode_list(&[
        rlp_encode_bytes(&[tx.tx_type().as_byte()]),
        rlp_encode_list(&inputs),
        rlp_encode_list(&outputs),
    ])
}

fn encode_input(input: &TransactionInput) -> Vec<u8> {
    rlp_encode_list(&[
        rlp_encode_bytes(&input.block_number.to_be_bytes()),
        rlp_encode_bytes(&input.transaction_number.to_be_bytes()),
        rlp_encode_bytes(&[input.output_number]),
        rlp_encode_bytes(&input.value_bytes()),
    ])
}

fn encode_output(output: &TransactionOutput) -> Vec<u8> {
    rlp_encode_list(&[
        rlp_encode_bytes(&[output.output_number]),
        rlp_encode_bytes(&output.to),
        rlp_encode_bytes(&output.value_bytes()),
    ])
}

// =============================================================================
// DECODING
// =============================================================================

/// Decode a signed transaction from its canonical encoding.
pub fn decode(bytes: &[u8]) -> Result<SignedTransaction, DecodeError> {
    let item = rlp::decode(bytes)?;
    signed_from_item(&item)
}

/// Decode a signed transaction embedded in a larger RLP structure.
pub(crate) fn signed_from_item(item: &RlpItem<'_>) -> Result<SignedTransaction, DecodeError> {
    let fields = expect_list(item, "signed transaction", 4)?;
    let unsigned = unsigned_from_item(&fields[0])?;
    let v = fixed::<V_LENGTH>(&fields[1], "V")?;
    let r = fixed::<R_LENGTH>(&fields[2], "R")?;
    let s = fixed::<S_LENGTH>(&fields[3], "S")?;
    Ok(SignedTransaction::new(unsigned, v[0], r, s))
}

fn unsigned_from_item(item: &RlpItem<'_>) -> Result<UnsignedTransaction, DecodeError> {
    let fields = expect_list(item, "unsigned transaction", 3)?;
    let type_byte = fixed::<TRANSACTION_TYPE_LENGTH>(&fields[0], "transaction type")?[0];
    let tx_type = TransactionType::from_byte(type_byte)
        .ok_or(DecodeError::UnknownTransactionType(type_byte))?;

    let inputs = fields[1]
        .as_list()?
        .iter()
        .map(input_from_item)
        .collect::<Result<Vec<_>, _>>()?;
    let outputs = fields[2]
        .as_list()?
        .iter()
        .map(output_from_item)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(UnsignedTransaction::new(tx_type, inputs, outputs))
}

fn input_from_item(item: &RlpItem<'_>) -> Result<TransactionInput, DecodeError> {
    let fields = expect_list(item, "input", 4)?;
    Ok(TransactionInput {
        block_number: u32::from_be_bytes(fixed(&fields[0], "block number")?),
        transaction_number: u32::from_be_bytes(fixed(&fields[1], "transaction number")?),
        output_number: fixed::<OUTPUT_NUMBER_LENGTH>(&fields[2], "output number")?[0],
        value: U256::from_big_endian(&fixed::<VALUE_LENGTH>(&fields[3], "value")?),
    })
}

fn output_from_item(item: &RlpItem<'_>) -> Result<TransactionOutput, DecodeError> {
    let fields = expect_list(item, "output", 3)?;
    Ok(TransactionOutput {
        output_number: fixed::<OUTPUT_NUMBER_LENGTH>(&fields[0], "output number")?[0],
        to: fixed::<ADDRESS_LENGTH>(&fields[1], "address")?,
        value: U256::from_big_endian(&fixed::<VALUE_LENGTH>(&fields[2], "value")?),
    })
}

pub(crate) fn expect_list<'i, 'a>(
    item: &'i RlpItem<'a>,
    what: &'static str,
    expected: usize,
) -> Result<&'i [RlpItem<'a>], DecodeError> {
    let items = item.as_list()?;
    if items.len() != expected {
        return Err(DecodeError::ItemCount {
            what,
            expected,
            actual: items.len(),
        });
    }
    Ok(items)
}

pub(crate) fn fixed<const N: usize>(
    item: &RlpItem<'_>,
    field: &'static str,
) -> Result<[u8; N], DecodeError> {
    let bytes = item.as_bytes()?;
    bytes.try_into().map_err(|_| DecodeError::FieldLength {
        field,
        expected: N,
        actual: bytes.len(),
    })
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Check the structural invariants of a transaction. No storage access.
pub fn validate(tx: &SignedTransaction) -> Result<(), ValidationError> {
    validate_unsigned(tx.unsigned())
}

/// Body-only validation.
pub fn validate_unsigned(tx: &UnsignedTransaction) -> Result<(), ValidationError> {
    let inputs = tx.inputs();
    let outputs = tx.outputs();
    if inputs.is_empty() || outputs.is_empty() {
        return Err(ValidationError::Empty);
    }

    let arity_ok = match tx.tx_type() {
        TransactionType::Split => inputs.len() == 1 && outputs.len() <= 3,
        TransactionType::Merge => inputs.len() == 2 && outputs.len() == 1,
        TransactionType::Fund => inputs.len() == 1 && outputs.len() == 1,
    };
    if !arity_ok {
        return Err(ValidationError::Arity {
            tx_type: tx.tx_type().name(),
            inputs: inputs.len(),
            outputs: outputs.len(),
        });
    }

    for (index, output) in outputs.iter().enumerate() {
        if output.output_number as usize != index {
            return Err(ValidationError::OutputNumbering {
                index,
                found: output.output_number,
            });
        }
    }

    if tx.tx_type() == TransactionType::Fund {
        if !inputs[0].is_null() {
            return Err(ValidationError::FundingInput);
        }
        return Ok(());
    }

    let total_in = checked_sum(inputs.iter().map(|i| i.value))?;
    let total_out = checked_sum(outputs.iter().map(|o| o.value))?;
    if total_in != total_out {
        return Err(ValidationError::ValueMismatch {
            inputs: total_in,
            outputs: total_out,
        });
    }
    Ok(())
}

fn checked_sum(mut values: impl Iterator<Item = U256>) -> Result<U256, ValidationError> {
    values.try_fold(U256::zero(), |acc, v| {
        acc.checked_add(v).ok_or(ValidationError::ValueOverflow)
    })
}
