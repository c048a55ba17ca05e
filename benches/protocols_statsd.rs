#[macro_use]
extern crate criterion;

use criterion::Criterion;

extern crate sluice;

use sluice::protocols::statsd::parse_statsd;

fn experiment() {
    let packet = b"zrth:0|g
fst:-1.1|ms
snd:+2.2|g
thd:3.3|s
fth:4|c
fvth:5.5|c|@0.1
sxth:-6.6|g
svth:+7.77|g";

    let mut res = Vec::new();
    assert_eq!(parse_statsd(packet, &mut res), 8);
}

fn benchmark(c: &mut Criterion) {
    c.bench_function("parse_statsd", |b| {
        b.iter(|| experiment());
    });
}

criterion_group!(benches, benchmark);
criterion_main!(benches);
