use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;
use voxbridge::chunk::{AudioClip, chunk_audio, chunk_sentences, chunk_text};

/// A long answer in Bengali script: three-byte characters with danda terminators.
fn bengali_answer(sentences: usize) -> String {
    "ধান গাছের পাতা হলুদ হলে নাইট্রোজেন সার দিন এবং জমিতে জল জমতে দেবেন না। "
        .repeat(sentences)
}

fn english_answer(sentences: usize) -> String {
    "Water tomato plants early in the morning and mulch to keep the soil moist. "
        .repeat(sentences)
}

fn bench_chunk_text(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunk_text");
    for sentences in [10, 100, 1000] {
        let text = bengali_answer(sentences);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("bengali_800", sentences), &text, |b, text| {
            b.iter(|| chunk_text(black_box(text), 800))
        });
    }
    group.finish();
}

fn bench_chunk_sentences(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunk_sentences");
    for (name, text) in [
        ("english", english_answer(200)),
        ("bengali", bengali_answer(200)),
    ] {
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new(name, 300), &text, |b, text| {
            b.iter(|| chunk_sentences(black_box(text), 300))
        });
    }
    group.finish();
}

fn bench_chunk_audio(c: &mut Criterion) {
    // Ten minutes of 16 kHz mono.
    let clip = AudioClip::new(vec![0; 16_000 * 600], 16_000, 1);
    c.bench_function("chunk_audio_10min_30s", |b| {
        b.iter(|| chunk_audio(black_box(&clip), Duration::from_secs(30)))
    });
}

criterion_group!(benches, bench_chunk_text, bench_chunk_sentences, bench_chunk_audio);
criterion_main!(benches);
