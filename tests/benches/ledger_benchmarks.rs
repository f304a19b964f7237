//! # Plasma Ledger Benchmarks
//!
//! | Area | Path measured |
//! |------|---------------|
//! | Codec | RLP decode and encode of a signed Split |
//! | Merkle | Tree build, proof generation and verification |
//! | Crypto | Pooled signing and address recovery |
//! | Spending | `write_spending` against the in-memory store |
//! | Blocks | Assembly plus batched block write |

#![allow(clippy::excessive_nesting)]

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use plasma_crypto::{keccak256, CryptoWorkerPool};
use plasma_ledger::domain::codec;
use plasma_ledger::domain::MerkleTree;
use plasma_ledger::test_utils::{seed_utxo, split_tx, test_ledger_store, test_secret, TestKey, OPERATOR_SEED, ZERO_HASH};
use plasma_ledger::{AtomicCounter, CounterSource, SpendingRecord};
use primitive_types::U256;
use rand::Rng;
use std::cell::Cell;
use std::time::Duration;

// ============================================================================
// CODEC
// ============================================================================

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");
    let pool = CryptoWorkerPool::new(1);
    let alice = TestKey::new(1);
    let tx = split_tx(&alice, &pool, (7, 3, 1), 1_000, &[([2; 20], 600), ([3; 20], 400)]);
    let raw = codec::encode(&tx);

    group.throughput(Throughput::Bytes(raw.len() as u64));
    group.bench_function("decode_split", |b| {
        b.iter(|| black_box(codec::decode(black_box(&raw)).is_ok()))
    });
    group.bench_function("encode_split", |b| b.iter(|| black_box(codec::encode(&tx))));
    group.bench_function("validate_split", |b| {
        b.iter(|| black_box(codec::validate(&tx).is_ok()))
    });

    group.finish();
}

// ============================================================================
// MERKLE
// ============================================================================

fn bench_merkle(c: &mut Criterion) {
    let mut group = c.benchmark_group("merkle");
    let mut rng = rand::thread_rng();

    for size in [16usize, 256, 4_096] {
        let leaves: Vec<Vec<u8>> = (0..size)
            .map(|_| (0..200).map(|_| rng.gen::<u8>()).collect())
            .collect();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("build", size), &leaves, |b, leaves| {
            b.iter(|| black_box(MerkleTree::build(leaves).map(|tree| tree.root())))
        });

        let Ok(tree) = MerkleTree::build(&leaves) else {
            continue;
        };
        let root = tree.root();
        let index = size / 2;
        group.bench_with_input(BenchmarkId::new("prove_and_verify", size), &index, |b, &index| {
            b.iter(|| {
                let proof = tree.provide_proof(index).unwrap_or_default();
                black_box(MerkleTree::verify_proof(&root, &proof, &leaves[index]).unwrap_or(false))
            })
        });
    }

    group.finish();
}

// ============================================================================
// CRYPTO POOL
// ============================================================================

fn bench_crypto_pool(c: &mut Criterion) {
    let mut group = c.benchmark_group("crypto-pool");
    group.measurement_time(Duration::from_secs(10));

    let pool = CryptoWorkerPool::with_cpu_count();
    let secret = test_secret(1);
    let digest = keccak256(b"benchmark digest");
    let signature = pool.sign(&digest, secret.as_bytes());

    group.bench_function("sign", |b| {
        b.iter(|| black_box(pool.sign(&digest, secret.as_bytes()).is_ok()))
    });
    if let Ok(signature) = signature {
        group.bench_function("recover_address", |b| {
            b.iter(|| black_box(pool.recover_address(&digest, &signature).is_ok()))
        });
    }

    group.finish();
}

// ============================================================================
// SPENDING
// ============================================================================

fn bench_write_spending(c: &mut Criterion) {
    let mut group = c.benchmark_group("spending");
    let store = test_ledger_store(64);
    let alice = TestKey::new(1);
    let next = Cell::new(0u32);
    let counter = AtomicCounter::new();

    group.throughput(Throughput::Elements(1));
    group.bench_function("write_spending", |b| {
        b.iter_batched(
            || {
                let position = next.get();
                next.set(position + 1);
                seed_utxo(store.store(), &alice.address, (1, position, 0), 10);
                let tx = split_tx(&alice, store.pool(), (1, position, 0), 10, &[([9; 20], 10)]);
                let record = SpendingRecord::for_spend(tx, store.pool()).expect("record");
                (record, counter.next_counter().expect("counter"))
            },
            |(record, slot)| black_box(store.write_spending(&record, slot).is_ok()),
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

// ============================================================================
// BLOCKS
// ============================================================================

fn bench_block_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("blocks");
    group.sample_size(10);
    let operator = test_secret(OPERATOR_SEED);

    for size in [64u32, 512] {
        group.throughput(Throughput::Elements(u64::from(size)));
        group.bench_with_input(BenchmarkId::new("assemble_and_write", size), &size, |b, &size| {
            b.iter_batched(
                || {
                    let store = test_ledger_store(128);
                    let counter = AtomicCounter::new();
                    for deposit in 0..size {
                        let slot = counter.next_counter().expect("counter");
                        store
                            .create_funding_tx([7; 20], U256::from(deposit + 1), slot, U256::from(deposit), &operator)
                            .expect("funding");
                    }
                    (store, counter)
                },
                |(store, counter)| {
                    let block = store
                        .assemble(&counter, 1, ZERO_HASH, false)
                        .expect("assemble")
                        .expect("records");
                    store.write_block(&block).expect("write");
                    black_box(block.header().hash())
                },
                BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_codec,
    bench_merkle,
    bench_crypto_pool,
    bench_write_spending,
    bench_block_pipeline,
);
criterion_main!(benches);
