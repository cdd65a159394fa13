use proptest::prelude::*;

use bsv_primitives::chainhash::Hash;
use bsv_primitives::hash::sha256d;
use bsv_transaction::{Transaction, TransactionInput, TransactionOutput};

/// Strategy to generate a random transaction.
fn arb_transaction() -> impl Strategy<Value = Transaction> {
    let arb_input = (
        prop::array::uniform32(any::<u8>()),       // prev tx hash
        any::<u32>(),                              // prev tx index
        prop::collection::vec(any::<u8>(), 0..300), // script bytes
        any::<u32>(),                              // sequence
    )
        .prop_map(|(hash, idx, script, seq)| {
            let mut input = TransactionInput::new(Hash::new(hash), idx);
            input.unlocking_script = script;
            input.sequence_number = seq;
            input
        });

    let arb_output = (any::<u64>(), prop::collection::vec(any::<u8>(), 0..64))
        .prop_map(|(satoshis, script)| TransactionOutput::new(satoshis, script));

    (
        any::<i32>(), // version
        prop::collection::vec(arb_input, 0..4),
        prop::collection::vec(arb_output, 0..4),
        any::<u32>(), // locktime
    )
        .prop_map(|(version, inputs, outputs, lock_time)| Transaction {
            version,
            inputs,
            outputs,
            lock_time,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn transaction_serialize_deserialize_roundtrip(tx in arb_transaction()) {
        let bytes = tx.to_bytes();
        let tx2 = Transaction::from_bytes(&bytes).unwrap();
        prop_assert_eq!(&tx, &tx2);
        prop_assert_eq!(bytes, tx2.to_bytes());
    }

    #[test]
    fn transaction_hex_roundtrip(tx in arb_transaction()) {
        let tx2 = Transaction::from_hex(&tx.to_hex()).unwrap();
        prop_assert_eq!(tx.to_hex(), tx2.to_hex());
    }

    #[test]
    fn txid_is_sha256d_of_encoding(tx in arb_transaction()) {
        prop_assert_eq!(tx.tx_id(), sha256d(&tx.to_bytes()));
    }

    #[test]
    fn truncated_encoding_never_parses(tx in arb_transaction(), cut in 1usize..10) {
        let bytes = tx.to_bytes();
        let keep = bytes.len().saturating_sub(cut);
        prop_assert!(Transaction::from_bytes(&bytes[..keep]).is_err());
    }
}
