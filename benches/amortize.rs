//! Amortization benchmarks
//!
//! Measures the per-message cost of each queue flavor and of eager vs lazy
//! verification, which is the whole point of batching: the simple queue pays
//! one signature per message, the tree queues pay one per batch, and the
//! lazy verifier pays one verification per splice run.

use batchsig::{
    BatchQueue, EagerVerifier, Ed25519Signer, HistoryQueue, Keyring, LazyVerifier, MerkleQueue,
    Message, Metrics, SignedBlob, SimpleQueue,
};
use bytes::Bytes;
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use parking_lot::Mutex;
use std::sync::Arc;

const BATCH_SIZES: [usize; 3] = [8, 64, 512];

fn signer() -> Arc<Ed25519Signer> {
    Arc::new(Ed25519Signer::from_seed([7u8; 32]))
}

fn keyring(signer: &Ed25519Signer) -> Arc<Keyring> {
    let mut keyring = Keyring::new();
    keyring.insert(signer.verifying_key());
    Arc::new(keyring)
}

fn fill(queue: &dyn BatchQueue, n: usize, sink: &Arc<Mutex<Vec<(Bytes, SignedBlob)>>>) {
    for i in 0..n {
        let sink = Arc::clone(sink);
        let data = Bytes::from(format!("message payload number {i}"));
        let captured = data.clone();
        queue.add(Message::new(
            data,
            format!("recipient-{i}").into_bytes(),
            &b"author"[..],
            move |blob| {
                if let Some(blob) = blob {
                    sink.lock().push((captured, blob));
                }
            },
        ));
    }
}

fn sign_one_batch(queue: &dyn BatchQueue, n: usize) -> Vec<(Bytes, SignedBlob)> {
    let sink = Arc::new(Mutex::new(Vec::new()));
    fill(queue, n, &sink);
    queue.process();
    let signed = std::mem::take(&mut *sink.lock());
    signed
}

fn bench_queues(c: &mut Criterion) {
    let mut group = c.benchmark_group("sign_batch");
    for &n in &BATCH_SIZES {
        group.throughput(Throughput::Elements(n as u64));

        group.bench_with_input(BenchmarkId::new("simple", n), &n, |b, &n| {
            let queue = SimpleQueue::new(signer(), Metrics::new());
            b.iter(|| sign_one_batch(&queue, n));
        });
        group.bench_with_input(BenchmarkId::new("merkle", n), &n, |b, &n| {
            let queue = MerkleQueue::new(signer(), Metrics::new());
            b.iter(|| sign_one_batch(&queue, n));
        });
        group.bench_with_input(BenchmarkId::new("history", n), &n, |b, &n| {
            let queue = HistoryQueue::new(signer(), Metrics::new());
            b.iter(|| sign_one_batch(&queue, n));
        });
    }
    group.finish();
}

fn bench_verification(c: &mut Criterion) {
    let signer = signer();
    let keys = keyring(&signer);

    // Two spliced history batches to the same recipients.
    let queue = HistoryQueue::new(Arc::clone(&signer) as _, Metrics::new());
    let mut signed = sign_one_batch(&queue, 64);
    signed.extend(sign_one_batch(&queue, 64));

    let mut group = c.benchmark_group("verify_128_spliced");
    group.throughput(Throughput::Elements(signed.len() as u64));

    group.bench_function("eager_single", |b| {
        let verifier = EagerVerifier::new(Arc::clone(&keys) as _, Metrics::new());
        b.iter(|| {
            for (data, blob) in &signed {
                assert!(verifier.verify(data, blob));
            }
        });
    });

    group.bench_function("eager_batch", |b| {
        let verifier = EagerVerifier::new(Arc::clone(&keys) as _, Metrics::new());
        let items: Vec<(&[u8], &SignedBlob)> =
            signed.iter().map(|(d, b)| (d.as_ref(), b)).collect();
        b.iter(|| verifier.verify_batch(&items));
    });

    group.bench_function("lazy_forced", |b| {
        b.iter_batched(
            || LazyVerifier::new(Arc::clone(&keys) as _, Metrics::new()),
            |mut lazy| {
                for (data, blob) in &signed {
                    lazy.add(data, blob.clone(), |valid| assert!(valid));
                }
                lazy.force_all();
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_queues, bench_verification);
criterion_main!(benches);
