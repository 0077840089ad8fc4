//! Benchmarks for sumset operations.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use sumset::{
    HashTable, Matcher, Probe, RollingChecksum, SignatureBuilder, SignatureIndex, SignatureMagic,
    SignatureSet, StrongSum, TableKey,
};

fn sample(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31) ^ (i >> 7)) as u8).collect()
}

fn bench_rolling_checksum_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("rolling_checksum_update");

    for size in [64, 512, 2048, 8192].iter() {
        let data = sample(*size);

        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::new("update", size), &data, |b, data| {
            b.iter(|| RollingChecksum::from_bytes(black_box(data)).digest());
        });
        group.bench_with_input(BenchmarkId::new("rollin", size), &data, |b, data| {
            b.iter(|| {
                let mut sum = RollingChecksum::new();
                for &byte in black_box(data) {
                    sum.rollin(byte);
                }
                sum.digest()
            });
        });
    }

    group.finish();
}

fn bench_rolling_checksum_rotate(c: &mut Criterion) {
    let mut group = c.benchmark_group("rolling_checksum_rotate");

    let data = sample(2048);
    let mut checksum = RollingChecksum::from_bytes(&data);

    group.bench_function("rotate", |b| {
        b.iter(|| {
            checksum.rotate(black_box(42), black_box(43));
        });
    });

    group.finish();
}

fn bench_strong_sum(c: &mut Criterion) {
    let mut group = c.benchmark_group("strong_sum");

    for size in [512, 2048, 8192].iter() {
        let data = sample(*size);

        group.throughput(Throughput::Bytes(*size as u64));
        for magic in [SignatureMagic::Blake2, SignatureMagic::Md4] {
            group.bench_with_input(
                BenchmarkId::new(format!("{magic:?}"), size),
                &data,
                |b, data| {
                    b.iter(|| StrongSum::compute(magic, black_box(data)));
                },
            );
        }
    }

    group.finish();
}

struct Key(u32);

impl TableKey for Key {
    fn table_hash(&self) -> u32 {
        self.0
    }
}

impl Probe<Key> for Key {
    fn matches(&mut self, entry: &Key) -> bool {
        self.0 == entry.0
    }
}

fn bench_hashtable_find(c: &mut Criterion) {
    let mut group = c.benchmark_group("hashtable_find");

    for count in [256u32, 4096, 65536].iter() {
        let keys: Vec<Key> = (0..*count).map(|i| Key(i.wrapping_mul(2_654_435_761))).collect();
        let mut table = HashTable::new(count.next_power_of_two() as usize).unwrap();
        for key in &keys {
            table.insert(key).unwrap();
        }

        group.bench_with_input(BenchmarkId::new("hit", count), &table, |b, table| {
            let mut i = 0u32;
            b.iter(|| {
                i = (i + 1) % count;
                table.find(&mut Key(i.wrapping_mul(2_654_435_761))).is_some()
            });
        });
        group.bench_with_input(BenchmarkId::new("miss", count), &table, |b, table| {
            let mut i = 0u32;
            b.iter(|| {
                i = i.wrapping_add(1);
                table.find(&mut Key(black_box(i | 1).wrapping_mul(3))).is_some()
            });
        });
    }

    group.finish();
}

fn bench_signature_generate(c: &mut Criterion) {
    let mut group = c.benchmark_group("signature_generate");

    for size in [16 * 1024, 256 * 1024, 1024 * 1024].iter() {
        let data = sample(*size);
        let config = SignatureBuilder::new().block_len(2048).build().unwrap();

        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::new("blake2", size), &data, |b, data| {
            b.iter(|| SignatureSet::generate(&config, black_box(data)).unwrap());
        });
    }

    group.finish();
}

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");

    for size in [64 * 1024, 512 * 1024].iter() {
        let reference = sample(*size);
        let config = SignatureBuilder::new().block_len(1024).build().unwrap();
        let signature = SignatureSet::generate(&config, &reference).unwrap();
        let index = SignatureIndex::build(&signature).unwrap();
        let matcher = Matcher::new(&index);

        let mut shifted = b"shift".to_vec();
        shifted.extend_from_slice(&reference);

        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::new("identical", size), &reference, |b, data| {
            b.iter(|| matcher.scan(black_box(data), |_| {}));
        });
        group.bench_with_input(BenchmarkId::new("shifted", size), &shifted, |b, data| {
            b.iter(|| matcher.scan(black_box(data), |_| {}));
        });
        group.bench_with_input(BenchmarkId::new("aligned", size), &reference, |b, data| {
            b.iter(|| matcher.scan_aligned(black_box(data), |_| {}));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_rolling_checksum_update,
    bench_rolling_checksum_rotate,
    bench_strong_sum,
    bench_hashtable_find,
    bench_signature_generate,
    bench_scan,
);

criterion_main!(benches);
