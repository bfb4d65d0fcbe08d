//! Benchmarks for extraction and loop analysis.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use parloop::analysis::{classify, score, screen};
use parloop::frontend::{extract_loops, tokenize, LoopBlock};
use parloop::transform::tile;

const PROGRAM: &str = r#"
int main() {
    int n, m;
    cin >> n >> m;
    for (int i = 0; i < n; i++)
        for (int j = 0; j < m; j++)
            cin >> a[i][j];
    for (int i = 0; i < n; i++) {
        for (int j = 0; j < m; j++) {
            c[i][j] = 0;
            for (int k = 0; k < m; k++) {
                c[i][j] += a[i][k] * b[k][j];
            }
        }
    }
    long long s = 0;
    for (int i = 1; i <= n; i++) {
        s += c[i - 1][0];
        if (s > 1000000) break;
    }
    cout << s << endl;
    return 0;
}
"#;

/// Benchmark lexer speed.
fn bench_lexing(c: &mut Criterion) {
    c.bench_function("lex_program", |b| b.iter(|| tokenize(black_box(PROGRAM))));
}

/// Benchmark loop extraction.
fn bench_extraction(c: &mut Criterion) {
    c.bench_function("extract_loops", |b| b.iter(|| extract_loops(black_box(PROGRAM))));
}

/// Benchmark the per-loop analysis passes.
fn bench_analysis(c: &mut Criterion) {
    let blocks = extract_loops(PROGRAM);

    c.bench_function("classify_variables", |b| {
        b.iter(|| blocks.iter().map(|l| classify(black_box(l))).collect::<Vec<_>>())
    });

    c.bench_function("screen_dependencies", |b| {
        b.iter(|| blocks.iter().map(|l| screen(black_box(l))).collect::<Vec<_>>())
    });

    c.bench_function("complexity_score", |b| {
        b.iter(|| blocks.iter().map(|l| score(black_box(l))).collect::<Vec<_>>())
    });
}

/// Benchmark 2D tiling.
fn bench_tiling(c: &mut Criterion) {
    let block = LoopBlock::from_text("for (int i = 0; i < n; i++) for (int j = 0; j < m; j++) a[i][j] = b[j][i];")
        .unwrap();
    c.bench_function("tile_2d", |b| b.iter(|| tile(black_box(&block), 64)));
}

criterion_group!(benches, bench_lexing, bench_extraction, bench_analysis, bench_tiling);
criterion_main!(benches);
