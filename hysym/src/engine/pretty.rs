//! RcDoc-based printer producing SMT-LIB 2 terms, with termcolor annotations.
//!
//! Applications are laid out as `(head arg1 arg2 ...)`, breaking into indented lines when a
//! term does not fit the requested width. Numerals are printed as `#x..` when their width
//! is a multiple of four and as `#b..` otherwise. Subterms nested deeper than
//! [`MAX_PRINT_DEPTH`] are elided as `...`.
use std::io::{self, Write};

use pretty::{RcDoc, RenderAnnotated};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use super::{AstKey, Node, Store};

/// Styles used to annotate parts of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    /// Parentheses are colored by nesting depth so matching pairs share a color.
    Paren(u8),
    Operator,
    Literal,
    Ident,
}

impl Style {
    fn to_color_spec(self) -> ColorSpec {
        let mut s = ColorSpec::new();
        match self {
            Style::Paren(depth) => {
                let fg = match depth % 4 {
                    0 => Color::Blue,
                    1 => Color::Green,
                    2 => Color::Yellow,
                    _ => Color::Magenta,
                };
                s.set_fg(Some(fg)).set_dimmed(true);
            }
            Style::Operator => {
                s.set_fg(Some(Color::Yellow)).set_bold(true);
            }
            Style::Literal => {
                s.set_fg(Some(Color::Cyan));
            }
            Style::Ident => {
                s.set_fg(Some(Color::Green)).set_bold(true);
            }
        }
        s
    }
}

/// Characters allowed in an unquoted SMT-LIB symbol besides ASCII alphanumerics.
const SIMPLE_SYMBOL_CHARS: &str = "~!@$%^&*_-+=<>.?/";

/// Printed form of a symbol, quoted with `|` when needed.
pub fn symbol_text(name: &str) -> String {
    let simple = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || SIMPLE_SYMBOL_CHARS.contains(c))
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if simple || name.contains('|') {
        name.to_string()
    } else {
        format!("|{name}|")
    }
}

/// Printed form of a `width`-bit numeral.
pub fn numeral_text(width: u32, value: u128) -> String {
    if width % 4 == 0 {
        format!("#x{:0digits$x}", value, digits = (width / 4) as usize)
    } else {
        format!("#b{:0digits$b}", value, digits = width as usize)
    }
}

/// Nesting depth past which applications are printed as `...`.
pub const MAX_PRINT_DEPTH: usize = 256;

/// Nesting depth kept in error messages.
const SUMMARY_DEPTH: usize = 6;
const SUMMARY_WIDTH: usize = 1 << 12;

struct Printer<'s> {
    store: &'s Store,
    limit: usize,
}

impl Printer<'_> {
    fn application(
        &self,
        head: RcDoc<'static, Style>,
        args: &[AstKey],
        depth: usize,
    ) -> RcDoc<'static, Style> {
        if depth >= self.limit {
            return RcDoc::as_string("...");
        }
        let paren = Style::Paren((depth % 4) as u8);
        let args = args.iter().map(|&arg| self.to_doc(arg, depth + 1));
        RcDoc::as_string("(")
            .annotate(paren)
            .append(
                head.append(RcDoc::line().append(RcDoc::intersperse(args, RcDoc::line())))
                    .nest(2),
            )
            .append(RcDoc::as_string(")").annotate(paren))
            .group()
    }

    fn to_doc(&self, key: AstKey, depth: usize) -> RcDoc<'static, Style> {
        let store = self.store;
        match store.node(key) {
            Node::Bool(value) => RcDoc::as_string(value).annotate(Style::Literal),
            Node::Numeral { width, value } => {
                RcDoc::as_string(numeral_text(*width, *value)).annotate(Style::Literal)
            }
            Node::Const { name, .. } => {
                RcDoc::as_string(symbol_text(store.symbol_str(*name))).annotate(Style::Ident)
            }
            Node::App { decl, args } => {
                let head = RcDoc::as_string(symbol_text(store.decl_name(*decl)))
                    .annotate(Style::Ident);
                if args.is_empty() {
                    head
                } else {
                    self.application(head, args, depth)
                }
            }
            Node::Op { op, args } => {
                let name = RcDoc::as_string(op.name()).annotate(Style::Operator);
                let indices = op.indices();
                let head = if indices.is_empty() {
                    name
                } else {
                    RcDoc::as_string("(_ ")
                        .append(name)
                        .append(RcDoc::concat(
                            indices
                                .into_iter()
                                .map(|i| RcDoc::space().append(RcDoc::as_string(i))),
                        ))
                        .append(")")
                };
                self.application(head, args, depth)
            }
        }
    }
}

/// Build the annotated document of `key`.
pub fn doc(store: &Store, key: AstKey) -> RcDoc<'static, Style> {
    Printer {
        store,
        limit: MAX_PRINT_DEPTH,
    }
    .to_doc(key, 0)
}

/// Format `key` into a plain string laid out for `width` columns.
pub fn to_plain_string(store: &Store, key: AstKey, width: usize) -> String {
    let mut buf = String::new();
    let _ = doc(store, key).render_fmt(width, &mut buf);
    buf
}

/// Short single-line form of `key`, eliding everything below a few levels.
pub fn summary(store: &Store, key: AstKey) -> String {
    let doc = Printer {
        store,
        limit: SUMMARY_DEPTH,
    }
    .to_doc(key, 0);
    let mut buf = String::new();
    let _ = doc.render_fmt(SUMMARY_WIDTH, &mut buf);
    buf.lines().map(str::trim_start).collect::<Vec<_>>().join(" ")
}

// A writer that maps Style annotations to termcolor ColorSpec on a WriteColor sink.
struct ColorWriter<'w, W: WriteColor + Write> {
    out: &'w mut W,
}

impl<'a, 'w, W: WriteColor + Write> RenderAnnotated<'a, Style> for ColorWriter<'w, W> {
    fn push_annotation(&mut self, ann: &'a Style) -> io::Result<()> {
        self.out.set_color(&ann.to_color_spec())
    }
    fn pop_annotation(&mut self) -> io::Result<()> {
        self.out.reset()
    }
}

impl<'w, W: WriteColor + Write> pretty::Render for ColorWriter<'w, W> {
    type Error = io::Error;
    fn write_str(&mut self, s: &str) -> io::Result<usize> {
        self.out.write_all(s.as_bytes())?;
        Ok(s.len())
    }
    fn write_str_all(&mut self, s: &str) -> io::Result<()> {
        self.out.write_all(s.as_bytes())
    }
    fn fail_doc(&self) -> Self::Error {
        io::Error::other("render failed")
    }
}

/// Render a document to a `termcolor::WriteColor` with width-aware layout.
pub fn render_to<W: WriteColor + Write>(
    doc: &RcDoc<'_, Style>,
    width: usize,
    out: &mut W,
) -> io::Result<()> {
    let mut cw = ColorWriter { out };
    doc.render_raw(width, &mut cw)
}

/// Print a document to stdout with colors if supported, at the terminal width.
pub fn print_colored(doc: &RcDoc<'_, Style>) -> io::Result<()> {
    let stdout = StandardStream::stdout(ColorChoice::Auto);
    let mut stdout = stdout.lock();
    render_to(doc, terminal_width(), &mut stdout)?;
    writeln!(stdout)
}

/// Width of the terminal, or 80 if it cannot be determined.
pub fn terminal_width() -> usize {
    term_size::dimensions().map(|(w, _)| w).unwrap_or(80)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Op, Sort};

    #[test]
    fn literals() {
        assert_eq!(numeral_text(8, 0x0f), "#x0f");
        assert_eq!(numeral_text(32, 1), "#x00000001");
        assert_eq!(numeral_text(3, 5), "#b101");
        assert_eq!(symbol_text("x.1"), "x.1");
        assert_eq!(symbol_text("a(b)"), "|a(b)|");
    }

    #[test]
    fn applications() {
        let mut store = Store::new();
        let x = store.mk_const("x", Sort::BitVec(16));
        let low = store.mk_extract(7, 0, x);
        let one = store.mk_numeral(8, 1);
        let sum = store.mk_op(Op::BvAdd, &[one, low]);
        assert_eq!(
            to_plain_string(&store, sum, 80),
            "(bvadd #x01 ((_ extract 7 0) x))"
        );
    }

    #[test]
    fn deep_terms_are_elided() {
        let mut store = Store::new();
        let mut term = store.mk_const("x", Sort::BitVec(8));
        for _ in 0..MAX_PRINT_DEPTH + 40 {
            term = store.mk_op(Op::BvNeg, &[term]);
        }
        let text = to_plain_string(&store, term, 80);
        assert_eq!(text.matches("bvneg").count(), MAX_PRINT_DEPTH);
        assert!(text.contains("..."));
        assert!(!text.contains('x'));

        let short = summary(&store, term);
        assert_eq!(short.matches("bvneg").count(), SUMMARY_DEPTH);
        assert!(!short.contains('\n'));
    }

    #[test]
    fn colored_rendering_matches_plain_text() {
        let mut store = Store::new();
        let p = store.mk_const("p", Sort::Bool);
        let q = store.mk_const("q", Sort::Bool);
        let conj = store.mk_and(&[p, q]);

        let mut plain = termcolor::Buffer::no_color();
        render_to(&doc(&store, conj), 80, &mut plain).unwrap();
        assert_eq!(String::from_utf8(plain.into_inner()).unwrap(), "(and p q)");

        let mut colored = termcolor::Buffer::ansi();
        render_to(&doc(&store, conj), 80, &mut colored).unwrap();
        let colored = String::from_utf8(colored.into_inner()).unwrap();
        assert!(colored.contains("\x1b["));
        assert_ne!(colored, "(and p q)");
    }

    #[test]
    fn long_terms_break_lines() {
        let mut store = Store::new();
        let args: Vec<AstKey> = (0..12)
            .map(|i| store.mk_const(&format!("variable_{i}"), Sort::Bool))
            .collect();
        let conj = store.mk_and(&args);
        let text = to_plain_string(&store, conj, 40);
        assert!(text.starts_with("(and\n  variable_0\n"));
        assert!(text.lines().count() > 1);
    }
}
