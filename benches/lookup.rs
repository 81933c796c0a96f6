use atlasquiz_rs::{NameIndex, RevealState, suggest};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

static SAMPLE_WORLD: &str = include_str!("../data/sample_world.geojson");

fn bench_index_build(c: &mut Criterion) {
    c.bench_function("index::build_sample_world", |b| {
        b.iter(|| {
            let index = NameIndex::from_geojson_str(SAMPLE_WORLD).expect("sample world parses");
            black_box(index.key_count());
        });
    });
}

fn bench_resolve(c: &mut Criterion) {
    let index = NameIndex::bundled();
    const INPUTS: &[&str] = &["France", "united states", "Côte d'Ivoire", "Atlantis"];
    for &input in INPUTS {
        c.bench_with_input(BenchmarkId::new("resolve", input), &input, |b, &input| {
            b.iter(|| black_box(index.resolve(input).map(|entity| entity.id)));
        });
    }
}

fn bench_suggest(c: &mut Criterion) {
    let index = NameIndex::bundled();
    let reveal = RevealState::default();
    const CASES: &[(&str, usize)] = &[("a", 8), ("s", 8), ("new", 3)];
    for &(prefix, limit) in CASES {
        let label = format!("{prefix}_{limit}");
        c.bench_with_input(
            BenchmarkId::new("suggest", label),
            &(prefix, limit),
            |b, &(prefix, limit)| {
                b.iter(|| black_box(suggest(&index, &reveal, prefix, limit).len()));
            },
        );
    }
}

criterion_group!(benches, bench_index_build, bench_resolve, bench_suggest);
criterion_main!(benches);
