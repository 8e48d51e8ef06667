//! Benchmarks for core operations: certified map construction, witness
//! generation, root reconstruction, witness decoding and full verification.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use icv_core::testutil::TestNetwork;
use icv_core::{verify_at, CertifiedMap, Ed25519Verifier, VerificationParams};
use icv_types::cbor::decode_hash_tree;
use icv_types::Principal;

const NOW_NANOS: u64 = 1_700_000_000_000_000_000;

fn make_map(size: usize) -> CertifiedMap {
    (0..size)
        .map(|i| ((i as u64).to_be_bytes().to_vec(), vec![(i & 0xFF) as u8; 32]))
        .collect()
}

fn bench_map_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_root_hash");

    for size in [1, 10, 100, 1000, 10000] {
        let map = make_map(size);
        group.bench_with_input(BenchmarkId::new("entries", size), &size, |b, _| {
            b.iter(|| map.root_hash());
        });
    }
    group.finish();
}

fn bench_witness_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("witness_generation");

    for size in [10, 100, 1000, 10000] {
        let map = make_map(size);
        let key = ((size / 2) as u64).to_be_bytes();
        group.bench_with_input(BenchmarkId::new("entries", size), &size, |b, _| {
            b.iter(|| map.witness_bytes(&key).unwrap().unwrap());
        });
    }
    group.finish();
}

fn bench_reconstruct(c: &mut Criterion) {
    let map = make_map(1000);
    let key = 500u64.to_be_bytes();
    let witness = map.witness(&key).unwrap();
    let bytes = map.witness_bytes(&key).unwrap().unwrap();

    c.bench_function("reconstruct_witness_1000", |b| {
        b.iter(|| witness.reconstruct());
    });

    c.bench_function("decode_witness_1000", |b| {
        b.iter(|| decode_hash_tree(&bytes).unwrap());
    });
}

fn bench_verification(c: &mut Criterion) {
    let network = TestNetwork::from_seed([1u8; 32]);
    let canister_id = Principal::from_slice(&[0, 0, 0, 0, 0, 0, 0, 2, 1, 1]).unwrap();
    let map = make_map(1000);
    let key = 500u64.to_be_bytes();
    let witness = map.witness_bytes(&key).unwrap().unwrap();
    let certificate = network.certify(&canister_id, &map.root_hash(), NOW_NANOS);
    let root_key = network.root_public_key();

    let params = VerificationParams {
        canister_id: &canister_id,
        encoded_certificate: &certificate,
        encoded_tree: &witness,
        root_key: &root_key,
        max_certificate_time_offset_ms: 50_000,
    };

    c.bench_function("verify_certified_witness", |b| {
        b.iter(|| verify_at(&params, &Ed25519Verifier, NOW_NANOS / 1_000_000).unwrap());
    });
}

criterion_group!(
    benches,
    bench_map_construction,
    bench_witness_generation,
    bench_reconstruct,
    bench_verification,
);
criterion_main!(benches);
