//! Benchmark the bytes to bytes codecs.
#![allow(missing_docs)]

use std::borrow::Cow;
use std::num::NonZeroUsize;

use criterion::{
    AxisScale, BenchmarkId, Criterion, PlotConfiguration, Throughput, criterion_group,
    criterion_main,
};
use slabstore::codec::bytes_to_bytes::{
    crc32c::Crc32cCodec, fletcher32::Fletcher32Codec, gzip::GzipCodec, lzf::LzfCodec,
    shuffle::ShuffleCodec, zstd::ZstdCodec,
};
use slabstore::codec::{BytesRepresentation, BytesToBytesCodecTraits, CodecOptions};

fn bench_codec(c: &mut Criterion, name: &str, codec: &dyn BytesToBytesCodecTraits) {
    let plot_config = PlotConfiguration::default().summary_scale(AxisScale::Logarithmic);
    let mut group = c.benchmark_group(name);
    group.plot_config(plot_config);

    for size in [32u64, 64, 128].iter() {
        let size3 = size * size * size;
        let rep = BytesRepresentation::FixedSize(size3);

        let data_decoded: Vec<u8> = (0..size3).map(|i| (i % 251) as u8).collect();
        let data_encoded = codec
            .encode(Cow::Borrowed(&data_decoded), &CodecOptions::default())
            .unwrap();
        group.throughput(Throughput::Bytes(size3));
        group.bench_function(BenchmarkId::new("encode", size3), |b| {
            b.iter(|| {
                codec
                    .encode(Cow::Borrowed(&data_decoded), &CodecOptions::default())
                    .unwrap()
            });
        });
        group.bench_function(BenchmarkId::new("decode", size3), |b| {
            b.iter(|| {
                codec
                    .decode(Cow::Borrowed(&data_encoded), &rep, &CodecOptions::default())
                    .unwrap()
            });
        });
    }
    group.finish();
}

fn codec_shuffle(c: &mut Criterion) {
    bench_codec(c, "codec_shuffle", &ShuffleCodec::new(NonZeroUsize::new(4).unwrap()));
}

fn codec_gzip(c: &mut Criterion) {
    bench_codec(c, "codec_gzip", &GzipCodec::new(5).unwrap());
}

fn codec_zstd(c: &mut Criterion) {
    bench_codec(c, "codec_zstd", &ZstdCodec::new(3, false));
}

fn codec_lzf(c: &mut Criterion) {
    bench_codec(c, "codec_lzf", &LzfCodec::new());
}

fn codec_checksums(c: &mut Criterion) {
    bench_codec(c, "codec_fletcher32", &Fletcher32Codec::new());
    bench_codec(c, "codec_crc32c", &Crc32cCodec::new());
}

criterion_group!(
    benches,
    codec_shuffle,
    codec_gzip,
    codec_zstd,
    codec_lzf,
    codec_checksums
);
criterion_main!(benches);
