//! Helpers for emitting C++ text.

use std::fmt;

/// Indent a block of text.
pub fn indent(s: &str, spaces: usize) -> String {
    let indent_str = " ".repeat(spaces);
    s.lines()
        .map(|line| {
            if line.is_empty() {
                line.to_string()
            } else {
                format!("{}{}", indent_str, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// An indenting writer for generated code.
#[derive(Debug)]
pub struct CodeFormatter {
    output: String,
    indent_level: usize,
    indent_str: String,
    at_line_start: bool,
}

impl CodeFormatter {
    /// Create a new formatter with the given indent string.
    pub fn new(indent_str: &str) -> Self {
        Self {
            output: String::new(),
            indent_level: 0,
            indent_str: indent_str.to_string(),
            at_line_start: true,
        }
    }

    /// Create a formatter with LLVM-style two-space indentation.
    pub fn default_indent() -> Self {
        Self::new("  ")
    }

    /// Increase indentation level.
    pub fn indent(&mut self) {
        self.indent_level += 1;
    }

    /// Decrease indentation level.
    pub fn dedent(&mut self) {
        if self.indent_level > 0 {
            self.indent_level -= 1;
        }
    }

    /// Write text, indenting every new line.
    pub fn write(&mut self, s: &str) {
        for c in s.chars() {
            if c == '\n' {
                self.output.push('\n');
                self.at_line_start = true;
            } else {
                if self.at_line_start {
                    for _ in 0..self.indent_level {
                        self.output.push_str(&self.indent_str);
                    }
                    self.at_line_start = false;
                }
                self.output.push(c);
            }
        }
    }

    /// Write a line.
    pub fn writeln(&mut self, s: &str) {
        self.write(s);
        self.write("\n");
    }

    /// Write an empty line.
    pub fn newline(&mut self) {
        self.write("\n");
    }

    /// Write `header {`, the body produced by `f`, then `}`.
    pub fn block<F: FnOnce(&mut Self)>(&mut self, header: &str, f: F) {
        self.write(header);
        self.writeln(" {");
        self.indent();
        f(self);
        self.dedent();
        self.writeln("}");
    }

    /// Write a statement that was lifted out of existing source.
    ///
    /// The common leading whitespace of continuation lines is removed so the
    /// text picks up the current indentation while keeping its inner shape.
    pub fn write_verbatim(&mut self, s: &str) {
        let mut lines = s.trim().lines();
        let Some(first) = lines.next() else {
            return;
        };
        let rest: Vec<&str> = lines.collect();
        let common = rest
            .iter()
            .filter(|l| !l.trim().is_empty())
            .map(|l| l.len() - l.trim_start().len())
            .min()
            .unwrap_or(0);

        self.writeln(first);
        for line in rest {
            if line.trim().is_empty() {
                self.newline();
            } else {
                self.writeln(line.get(common..).unwrap_or(line).trim_end());
            }
        }
    }

    /// Get the formatted output.
    pub fn finish(self) -> String {
        self.output
    }
}

/// Format a list with separators.
pub fn format_list<T: fmt::Display>(items: impl IntoIterator<Item = T>, sep: &str) -> String {
    items
        .into_iter()
        .map(|x| x.to_string())
        .collect::<Vec<_>>()
        .join(sep)
}
