//! Loop tiling.
//!
//! Tiling (also called blocking) splits an iteration range into blocks of
//! `tile_size` consecutive iterations:
//!
//! ```text
//! for (int i = 0; i < n; i++) a[i] = 0;
//! ```
//! becomes:
//! ```text
//! for (int i_tile = 0; i_tile < n; i_tile += 64) {
//!   for (int i = i_tile; i < std::min(i_tile + 64, n); i++) a[i] = 0;
//! }
//! ```
//!
//! A perfectly nested rectangular pair is tiled in both dimensions.

use crate::frontend::structure::{header_at, matching, statement_end};
use crate::frontend::token::{Token, TokenKind};
use crate::frontend::{tokenize, CanonicalLoop, LoopBlock, LoopTokens};
use crate::transform::LoopTransform;
use crate::utils::pretty::CodeFormatter;

/// Suffix of block-start variables.
pub const TILE_SUFFIX: &str = "_tile";

/// One tiled loop dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TiledDim {
    /// Control variable
    pub var: String,
    /// Declared type, if the original header declared the variable
    pub declared_type: Option<String>,
    /// First index
    pub start: String,
    /// Exclusive upper bound
    pub end: String,
}

impl TiledDim {
    fn from_canonical(c: &CanonicalLoop) -> Option<Self> {
        if !c.is_unit_ascending() {
            return None;
        }
        Some(Self {
            var: c.var.clone(),
            declared_type: c.declared_type.clone(),
            start: c.start.trim().to_string(),
            end: c.exclusive_end()?.trim().to_string(),
        })
    }

    fn tile_var(&self) -> String {
        format!("{}{}", self.var, TILE_SUFFIX)
    }

    fn tile_header(&self, tile_size: usize) -> String {
        let t = self.tile_var();
        format!(
            "for ({} {} = {}; {} < {}; {} += {})",
            self.declared_type.as_deref().unwrap_or("int"),
            t,
            self.start,
            t,
            self.end,
            t,
            tile_size
        )
    }

    fn point_header(&self, tile_size: usize) -> String {
        let t = self.tile_var();
        let decl = match &self.declared_type {
            Some(ty) => format!("{} {}", ty, self.var),
            None => self.var.clone(),
        };
        format!(
            "for ({} = {}; {} < std::min({} + {}, {}); {}++)",
            decl, t, self.var, t, tile_size, self.end, self.var
        )
    }
}

/// A tiling decision for one loop block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilePlan {
    /// Tiled dimensions, outermost first
    pub dims: Vec<TiledDim>,
    /// Body of the innermost original loop
    pub body: String,
    /// Iterations per tile in every dimension
    pub tile_size: usize,
}

fn source_between(tokens: &[Token], text: &str, from: usize, to: usize) -> String {
    text.get(tokens[from].span.start..tokens[to].span.end)
        .unwrap_or("")
        .to_string()
}

impl TilePlan {
    /// Plan tiling for `block`. `None` if the loop shape is unsupported or
    /// `tile_size < 2`.
    pub fn new(block: &LoopBlock, tile_size: usize) -> Option<TilePlan> {
        if tile_size < 2 {
            return None;
        }
        let outer = TiledDim::from_canonical(&CanonicalLoop::parse(block.header_inner())?)?;
        let lt = LoopTokens::new(block)?;
        let body = lt.body();
        if body.is_empty() {
            return None;
        }

        if let Some(plan) = Self::nested(block, body, &outer, tile_size) {
            return Some(plan);
        }
        Some(TilePlan {
            dims: vec![outer],
            body: block.body().trim().to_string(),
            tile_size,
        })
    }

    /// Two-dimensional plan for a perfectly nested rectangular pair.
    fn nested(block: &LoopBlock, body: &[Token], outer: &TiledDim, tile_size: usize) -> Option<TilePlan> {
        let last = body.len() - 1;
        let (first, expected_end) = if body[0].kind == TokenKind::LeftBrace {
            let close = matching(body, 0)?;
            if close != last || close < 2 {
                return None;
            }
            (1, close - 1)
        } else {
            (0, last)
        };
        if body[first].kind != TokenKind::For || statement_end(body, first) != expected_end {
            return None;
        }

        let site = header_at(body, first)?;
        let inner_text = &block.text[body[site.open].span.end..body[site.close].span.start];
        let inner = TiledDim::from_canonical(&CanonicalLoop::parse(inner_text)?)?;
        if inner.var == outer.var {
            return None;
        }
        let mentions_outer = |expr: &str| tokenize(expr).iter().any(|t| t.is_ident(&outer.var));
        if mentions_outer(&inner.start) || mentions_outer(&inner.end) {
            return None;
        }
        if site.close >= expected_end {
            return None;
        }

        Some(TilePlan {
            dims: vec![outer.clone(), inner],
            body: source_between(body, &block.text, site.close + 1, expected_end),
            tile_size,
        })
    }

    /// Emit the tiled loop nest.
    pub fn render(&self) -> String {
        let mut f = CodeFormatter::default_indent();
        let ts = self.tile_size;
        let depth = self.dims.len();

        for dim in &self.dims {
            f.write(&dim.tile_header(ts));
            f.writeln(" {");
            f.indent();
        }
        for (k, dim) in self.dims.iter().enumerate() {
            f.write(&dim.point_header(ts));
            if k + 1 < depth {
                f.writeln(" {");
                f.indent();
            } else {
                f.write(" ");
                f.write_verbatim(&self.body);
            }
        }
        for _ in 0..(2 * depth - 1) {
            f.dedent();
            f.writeln("}");
        }
        f.finish().trim_end().to_string()
    }
}

/// Tile `block` with square tiles of `tile_size`.
///
/// Unsupported shapes and `tile_size < 2` come back unchanged.
pub fn tile(block: &LoopBlock, tile_size: usize) -> String {
    match TilePlan::new(block, tile_size) {
        Some(plan) => plan.render(),
        None => block.text.clone(),
    }
}

/// [`tile`] with a fixed size, as a [`LoopTransform`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tiling {
    /// Iterations per tile
    pub tile_size: usize,
}

impl Tiling {
    /// Tiling with square tiles of `tile_size`.
    pub fn new(tile_size: usize) -> Self {
        Self { tile_size }
    }
}

impl LoopTransform for Tiling {
    fn apply(&self, block: &LoopBlock) -> String {
        tile(block, self.tile_size)
    }

    fn name(&self) -> &str {
        "tile"
    }
}
