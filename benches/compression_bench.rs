use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lar::codec::{get_compressor, CompressorKind};
use lar::io_stream::LarWriter;
use lar::scratch::ScratchKind;
use lar::toc::{decode_toc, encode_toc, TocEntry};
use lar::CodecOptions;

fn bench_compression(c: &mut Criterion) {
    let data: Vec<u8> = (0..1024 * 1024u32).map(|i| (i % 97) as u8).collect();
    for kind in [CompressorKind::Bzip2, CompressorKind::Zstd, CompressorKind::Lz4] {
        let codec = get_compressor(kind, kind.default_level());
        c.bench_function(&format!("{kind}_compress_1mb"), |b| b.iter(|| codec.compress(black_box(&data))));
    }
}

fn bench_pack_in_memory(c: &mut Criterion) {
    let data = vec![42u8; 1024 * 1024];

    c.bench_function("pack_1mb_bzip2", |b| {
        b.iter(|| {
            let mut writer = LarWriter::with_scratch(&CodecOptions::default(), ScratchKind::Memory, None).unwrap();
            writer.add_file("bench.bin".to_string(), 0o644, black_box(&data)).unwrap();
            writer.finalize().unwrap().write_to(std::io::sink(), "bench.lar").unwrap();
        })
    });
}

fn bench_toc_decode(c: &mut Criterion) {
    let entries: Vec<TocEntry> = (0..10_000)
        .map(|i| TocEntry::new(format!("dir{}/file{i}.txt", i % 100), i as u64, 0o644))
        .collect();
    let buf = encode_toc(&entries).unwrap();

    c.bench_function("decode_toc_10k", |b| b.iter(|| decode_toc(black_box(&buf)).unwrap()));
}

criterion_group!(benches, bench_compression, bench_pack_in_memory, bench_toc_decode);
criterion_main!(benches);
