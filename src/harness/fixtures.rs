//! Fixture discovery and input-shape detection.

use crate::frontend::lexer::tokenize;
use crate::frontend::structure::{loops_and_switches, subscripts};
use crate::frontend::token::{Token, TokenKind};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Directories tried, in order, when the detected one is missing.
pub const FALLBACK_DIRS: [&str; 4] = ["1 D Array", "2 D Array", "Graph", "Weighted Graph"];

/// Shape of the data a program reads from stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputShape {
    /// `cin >> x;`
    Scalar,
    /// `cin >> a[i]`
    OneD,
    /// `cin >> a[i][j]`
    TwoD,
    /// `cin >> u >> v;`
    Graph,
    /// `cin >> u >> v >> w;`
    WeightedGraph,
}

impl InputShape {
    /// Fixture subdirectory holding inputs of this shape.
    pub fn dir_name(&self) -> &'static str {
        match self {
            InputShape::Scalar => "Scalar",
            InputShape::OneD => "1 D Array",
            InputShape::TwoD => "2 D Array",
            InputShape::Graph => "Graph",
            InputShape::WeightedGraph => "Weighted Graph",
        }
    }
}

impl fmt::Display for InputShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Shape of the first `cin` statement found inside a loop of `source`.
pub fn detect_input_shape(source: &str) -> Option<InputShape> {
    let tokens = tokenize(source);
    let loops: Vec<_> = loops_and_switches(&tokens)
        .into_iter()
        .filter(|r| tokens[*r.start()].kind != TokenKind::Switch)
        .collect();
    tokens
        .iter()
        .enumerate()
        .filter(|(k, t)| t.is_ident("cin") && loops.iter().any(|r| r.contains(k)))
        .find_map(|(k, _)| shape_at(&tokens, k))
}

/// Classify the extraction chain starting at the `cin` token `k`.
fn shape_at(tokens: &[Token], k: usize) -> Option<InputShape> {
    let mut ranks = Vec::new();
    let mut j = k + 1;
    while tokens.get(j).map_or(false, |t| t.is_op(">>")) {
        let operand = tokens.get(j + 1)?;
        if operand.kind != TokenKind::Identifier {
            return None;
        }
        let groups = subscripts(tokens, j + 2);
        ranks.push(groups.len());
        j = groups.last().map_or(j + 2, |&(_, close)| close + 1);
    }
    let terminated = tokens.get(j).map_or(false, |t| t.kind == TokenKind::Semicolon);

    match ranks.as_slice() {
        [r, ..] if *r >= 2 => Some(InputShape::TwoD),
        [1, ..] => Some(InputShape::OneD),
        [0, 0, 0] if terminated => Some(InputShape::WeightedGraph),
        [0, 0] if terminated => Some(InputShape::Graph),
        [0] if terminated => Some(InputShape::Scalar),
        _ => None,
    }
}

/// Directory under `root` matching the input shape of `source`, else the
/// first existing fallback directory.
pub fn select_fixture_dir(root: &Path, source: &str) -> Option<PathBuf> {
    let shape = detect_input_shape(source);
    debug!("detected input shape {:?}", shape);
    if let Some(shape) = shape {
        let dir = root.join(shape.dir_name());
        if dir.is_dir() {
            return Some(dir);
        }
        warn!("fixture directory {} does not exist", dir.display());
    }
    let fallback = FALLBACK_DIRS.iter().map(|d| root.join(d)).find(|d| d.is_dir());
    match &fallback {
        Some(dir) => debug!("using fallback fixtures {}", dir.display()),
        None => warn!("no fixture directory found under {}", root.display()),
    }
    fallback
}

/// One input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixture {
    /// Full path
    pub path: PathBuf,
    /// File name
    pub name: String,
    /// Numeric identity taken from the name
    pub id: u64,
}

/// Numeric identity of a fixture.
///
/// A stem containing `_` yields the number after the first `_`, or `ordinal`
/// when that part is not a number (`run_a7.txt` gets `ordinal`). A stem
/// without `_` yields its first digit run, or `ordinal` when it has none.
pub fn fixture_id(file_name: &str, ordinal: u64) -> u64 {
    let stem = file_name.split('.').next().unwrap_or(file_name);
    if let Some((_, rest)) = stem.split_once('_') {
        return rest.parse().unwrap_or(ordinal);
    }
    let digits: String = stem
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(ordinal)
}

/// `.txt` files in `dir`, sorted by name.
pub fn fixture_files(dir: &Path) -> io::Result<Vec<Fixture>> {
    let mut names: Vec<String> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.ends_with(".txt"))
        .collect();
    names.sort();

    Ok(names
        .into_iter()
        .enumerate()
        .map(|(i, name)| Fixture {
            path: dir.join(&name),
            id: fixture_id(&name, i as u64 + 1),
            name,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_shapes() {
        let cases = [
            ("for (int i = 0; i < n; i++) for (int j = 0; j < m; j++) cin >> a[i][j];", Some(InputShape::TwoD)),
            ("for (int i = 0; i < n; i++) { cin >> a[i]; }", Some(InputShape::OneD)),
            ("while (m--) { cin >> u >> v >> w; }", Some(InputShape::WeightedGraph)),
            ("for (int e = 0; e < m; e++) { std::cin >> u >> v; }", Some(InputShape::Graph)),
            ("do { cin >> x; } while (x);", Some(InputShape::Scalar)),
            ("int main() { cin >> n; }", None),
            ("for (int i = 0; i < n; i++) cout << a[i];", None),
        ];
        for (source, expected) in cases {
            assert_eq!(detect_input_shape(source), expected, "{}", source);
        }
    }

    #[test]
    fn test_first_input_wins() {
        let source = "int main() { cin >> n; for (int i = 0; i < n; i++) cin >> a[i]; \
                      for (int i = 0; i < n; i++) for (int j = 0; j < n; j++) cin >> g[i][j]; }";
        assert_eq!(detect_input_shape(source), Some(InputShape::OneD));
    }

    #[test]
    fn test_fixture_id() {
        assert_eq!(fixture_id("input_7.txt", 1), 7);
        assert_eq!(fixture_id("case12.txt", 1), 12);
        assert_eq!(fixture_id("input_x.txt", 3), 3);
        assert_eq!(fixture_id("data.txt", 5), 5);
        assert_eq!(fixture_id("run_a7.txt", 4), 4);
    }

    #[test]
    fn test_fixture_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["input_2.txt", "input_1.txt", "notes.md"] {
            fs::write(dir.path().join(name), "1 2 3").unwrap();
        }
        fs::create_dir(dir.path().join("nested.txt")).unwrap();
        let files = fixture_files(dir.path()).unwrap();
        let ids: Vec<u64> = files.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(files[0].name, "input_1.txt");
    }

    #[test]
    fn test_select_fixture_dir() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("Graph")).unwrap();
        let source = "for (int i = 0; i < n; i++) cin >> a[i];";
        // No "1 D Array" directory, so the first existing fallback is used.
        assert_eq!(select_fixture_dir(root.path(), source), Some(root.path().join("Graph")));

        fs::create_dir(root.path().join("1 D Array")).unwrap();
        assert_eq!(select_fixture_dir(root.path(), source), Some(root.path().join("1 D Array")));

        let empty = tempfile::tempdir().unwrap();
        assert_eq!(select_fixture_dir(empty.path(), source), None);
    }
}
