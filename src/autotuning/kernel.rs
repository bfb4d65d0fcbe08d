//! Synthetic timing programs for tile-size candidates.

use super::TuningConfig;
use crate::analysis::Dimensionality;
use crate::utils::pretty::CodeFormatter;

const INDEX_VARS: [&str; 3] = ["i", "j", "k"];

/// A self-contained C++ program timing a tiled elementwise loop.
///
/// Prints one elapsed time in microseconds per timed pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingKernel {
    /// Loop nest depth, 1 to 3
    rank: usize,
    /// Array extent per dimension
    extent: usize,
    tile_size: usize,
    warmup_passes: usize,
    timed_passes: usize,
}

impl TimingKernel {
    /// Kernel for `dims`. Scalar loops get the 1D kernel and deeper nests the
    /// 3D one.
    pub fn new(dims: Dimensionality, tile_size: usize, config: &TuningConfig) -> Self {
        let rank = dims.rank().clamp(1, 3);
        let extent = match rank {
            1 => config.sizes.one_d,
            2 => config.sizes.two_d,
            _ => config.sizes.three_d,
        };
        Self {
            rank,
            extent,
            tile_size: tile_size.max(1),
            warmup_passes: config.warmup_passes,
            timed_passes: config.timed_passes.max(1),
        }
    }

    /// Flat element index, e.g. `(i * n + j) * n + k`.
    fn index(&self) -> String {
        let vars = &INDEX_VARS[..self.rank];
        vars[1..].iter().fold(vars[0].to_string(), |acc, v| {
            if acc.contains(' ') {
                format!("({}) * n + {}", acc, v)
            } else {
                format!("{} * n + {}", acc, v)
            }
        })
    }

    fn write_loop(&self, f: &mut CodeFormatter) {
        let vars = &INDEX_VARS[..self.rank];
        for v in vars {
            f.writeln(&format!(
                "for (int {v}_tile = 0; {v}_tile < n; {v}_tile += tile_size) {{",
                v = v
            ));
            f.indent();
        }
        for v in vars {
            f.writeln(&format!(
                "for (int {v} = {v}_tile; {v} < std::min({v}_tile + tile_size, n); {v}++) {{",
                v = v
            ));
            f.indent();
        }
        let idx = self.index();
        f.writeln(&format!("c[{idx}] = a[{idx}] + b[{idx}];", idx = idx));
        for _ in 0..2 * self.rank {
            f.dedent();
            f.writeln("}");
        }
    }

    /// C++ source text.
    pub fn render(&self) -> String {
        let mut f = CodeFormatter::new("    ");
        for header in ["algorithm", "chrono", "iostream", "vector"] {
            f.writeln(&format!("#include <{}>", header));
        }
        f.newline();
        f.block("int main()", |f| {
            f.writeln(&format!("const int n = {};", self.extent));
            f.writeln(&format!("const int tile_size = {};", self.tile_size));
            let len = (0..self.rank).map(|_| "n").collect::<Vec<_>>().join(" * ");
            f.writeln(&format!("const std::size_t len = (std::size_t){};", len));
            f.writeln("std::vector<float> a(len, 1.0f), b(len, 2.0f), c(len, 0.0f);");
            f.newline();

            f.block(&format!("for (int pass = 0; pass < {}; pass++)", self.warmup_passes), |f| {
                self.write_loop(f)
            });
            f.block(&format!("for (int pass = 0; pass < {}; pass++)", self.timed_passes), |f| {
                f.writeln("auto start = std::chrono::high_resolution_clock::now();");
                self.write_loop(f);
                f.writeln("auto stop = std::chrono::high_resolution_clock::now();");
                f.writeln(
                    "std::cout << std::chrono::duration<double, std::micro>(stop - start).count() << std::endl;",
                );
            });
            f.writeln("volatile float sink = c[len - 1];");
            f.writeln("(void)sink;");
            f.writeln("return 0;");
        });
        f.finish()
    }
}
