//! Markdown to styled terminal rows.
//!
//! The reply is re-rendered from scratch on every redraw, so this only needs to be
//! a pure function of the accumulated text. Unclosed markup in a partial reply simply
//! renders literally until the closing half arrives.

use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use unicode_width::UnicodeWidthChar;

const ANSI_BOLD: &str = "\x1b[1m";
const ANSI_DIM: &str = "\x1b[2m";
const ANSI_ITALIC: &str = "\x1b[3m";
const ANSI_CYAN: &str = "\x1b[36m";
const ANSI_RESET: &str = "\x1b[0m";

/// Terminal tab stops are every eight columns.
const TAB_WIDTH: usize = 8;

/// Visual attributes of a span.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Style {
    /// Headings and strong emphasis.
    pub bold: bool,
    /// Emphasis.
    pub italic: bool,
    /// Inline code and code blocks.
    pub code: bool,
    /// Rules and other decoration.
    pub dim: bool,
}

impl Style {
    fn is_plain(&self) -> bool {
        *self == Style::default()
    }
}

/// A run of text sharing one style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    /// The text of the run.
    pub text: String,
    /// Its style.
    pub style: Style,
}

/// One row of styled text.
pub type Line = Vec<Span>;

/// Renders markdown into logical (unwrapped) lines.
pub fn markdown_lines(source: &str) -> Vec<Line> {
    let mut builder = LineBuilder::default();
    for event in Parser::new(source) {
        builder.event(event);
    }
    builder.finish()
}

/// Greedily wraps a line to `width` display columns, breaking after spaces when it
/// can and inside a word when it must.
pub fn wrap_line(line: &Line, width: usize) -> Vec<Line> {
    let width = width.max(1);
    let cells: Vec<(char, Style)> = line
        .iter()
        .flat_map(|span| span.text.chars().map(move |c| (c, span.style)))
        .collect();

    let mut rows: Vec<Vec<(char, Style)>> = Vec::new();
    let mut row: Vec<(char, Style)> = Vec::new();
    let mut row_width = 0;
    let mut last_space: Option<usize> = None;

    for (c, style) in cells {
        let w = c.width().unwrap_or(0);
        if row_width + w > width && !row.is_empty() {
            if c == ' ' {
                while row.last().is_some_and(|(c, _)| *c == ' ') {
                    row.pop();
                }
                rows.push(std::mem::take(&mut row));
                row_width = 0;
                last_space = None;
                continue;
            }
            let carry = match last_space {
                Some(at) if at + 1 < row.len() => row.split_off(at + 1),
                _ => Vec::new(),
            };
            while row.last().is_some_and(|(c, _)| *c == ' ') {
                row.pop();
            }
            rows.push(std::mem::take(&mut row));
            row = carry;
            row_width = row.iter().map(|(c, _)| c.width().unwrap_or(0)).sum();
            last_space = None;
        }
        if c == ' ' && row.is_empty() && !rows.is_empty() {
            // Drop leading spaces on continuation rows.
            continue;
        }
        if c == ' ' {
            last_space = Some(row.len());
        }
        row.push((c, style));
        row_width += w;
    }
    if !row.is_empty() || rows.is_empty() {
        rows.push(row);
    }

    rows.into_iter().map(merge_cells).collect()
}

/// The text of a line without styling.
pub fn plain(line: &Line) -> String {
    line.iter().map(|span| span.text.as_str()).collect()
}

/// The display width of a line.
pub fn display_width(line: &Line) -> usize {
    line.iter()
        .flat_map(|span| span.text.chars())
        .map(|c| c.width().unwrap_or(0))
        .sum()
}

/// The text of a line with ANSI styling when `use_color` is set.
pub fn paint(line: &Line, use_color: bool) -> String {
    let mut out = String::new();
    for span in line {
        if !use_color || span.style.is_plain() {
            out.push_str(&span.text);
            continue;
        }
        if span.style.bold {
            out.push_str(ANSI_BOLD);
        }
        if span.style.dim {
            out.push_str(ANSI_DIM);
        }
        if span.style.italic {
            out.push_str(ANSI_ITALIC);
        }
        if span.style.code {
            out.push_str(ANSI_CYAN);
        }
        out.push_str(&span.text);
        out.push_str(ANSI_RESET);
    }
    out
}

fn merge_cells(cells: Vec<(char, Style)>) -> Line {
    let mut line: Line = Vec::new();
    for (c, style) in cells {
        match line.last_mut() {
            Some(span) if span.style == style => span.text.push(c),
            _ => line.push(Span {
                text: c.to_string(),
                style,
            }),
        }
    }
    line
}

/// Replaces tabs with spaces up to the next tab stop and drops other control
/// characters, so every remaining character has the width it is counted at.
fn expand_tabs(text: &str, start_column: usize) -> String {
    let mut out = String::with_capacity(text.len());
    let mut column = start_column;
    for c in text.chars() {
        if c == '\t' {
            let pad = TAB_WIDTH - column % TAB_WIDTH;
            out.extend(std::iter::repeat_n(' ', pad));
            column += pad;
        } else if !c.is_control() {
            out.push(c);
            column += c.width().unwrap_or(0);
        }
    }
    out
}

#[derive(Default)]
struct LineBuilder {
    lines: Vec<Line>,
    current: Line,
    bold: usize,
    italic: usize,
    in_code_block: bool,
    lists: Vec<Option<u64>>,
}

impl LineBuilder {
    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(Tag::Heading { .. }) => {
                self.start_block();
                self.bold += 1;
            }
            Event::End(TagEnd::Heading(_)) => {
                self.bold = self.bold.saturating_sub(1);
                self.end_block();
            }
            Event::Start(Tag::Paragraph) => {
                if self.lists.is_empty() {
                    self.start_block();
                }
            }
            Event::End(TagEnd::Paragraph) => {
                if self.lists.is_empty() {
                    self.end_block();
                } else {
                    self.end_line();
                }
            }
            Event::Start(Tag::Strong) => self.bold += 1,
            Event::End(TagEnd::Strong) => self.bold = self.bold.saturating_sub(1),
            Event::Start(Tag::Emphasis) => self.italic += 1,
            Event::End(TagEnd::Emphasis) => self.italic = self.italic.saturating_sub(1),
            Event::Start(Tag::CodeBlock(_)) => {
                self.start_block();
                self.in_code_block = true;
            }
            Event::End(TagEnd::CodeBlock) => {
                self.in_code_block = false;
                self.end_block();
            }
            Event::Start(Tag::List(start)) => {
                self.start_block();
                self.lists.push(start);
            }
            Event::End(TagEnd::List(_)) => {
                self.lists.pop();
                if self.lists.is_empty() {
                    self.end_block();
                }
            }
            Event::Start(Tag::Item) => {
                self.start_block();
                let indent = "  ".repeat(self.lists.len().saturating_sub(1));
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{n}. ");
                        *n += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                self.push(format!("{indent}{marker}"), Style::default());
            }
            Event::End(TagEnd::Item) => self.end_line(),
            Event::Code(code) => self.push(
                code.into_string(),
                Style {
                    code: true,
                    ..self.style()
                },
            ),
            Event::Text(text) | Event::Html(text) | Event::InlineHtml(text) => {
                self.text(&text);
            }
            Event::SoftBreak => self.push(" ".to_string(), self.style()),
            Event::HardBreak => self.end_line(),
            Event::Rule => {
                self.start_block();
                self.push(
                    "─".repeat(24),
                    Style {
                        dim: true,
                        ..Style::default()
                    },
                );
                self.end_block();
            }
            _ => {}
        }
    }

    fn style(&self) -> Style {
        Style {
            bold: self.bold > 0,
            italic: self.italic > 0,
            code: self.in_code_block,
            dim: false,
        }
    }

    fn text(&mut self, text: &str) {
        let style = self.style();
        let mut parts = text.split('\n').peekable();
        while let Some(part) = parts.next() {
            if !part.is_empty() {
                self.push(part.to_string(), style);
            }
            if parts.peek().is_some() {
                if self.in_code_block {
                    self.force_line();
                } else {
                    self.end_line();
                }
            }
        }
    }

    fn push(&mut self, text: String, style: Style) {
        let text = expand_tabs(&text, display_width(&self.current));
        match self.current.last_mut() {
            Some(span) if span.style == style => span.text.push_str(&text),
            _ => self.current.push(Span { text, style }),
        }
    }

    /// Ends the current line if it has content.
    fn end_line(&mut self) {
        if !self.current.is_empty() {
            self.lines.push(std::mem::take(&mut self.current));
        }
    }

    /// Ends the current line even if it is empty (blank lines inside code blocks).
    fn force_line(&mut self) {
        self.lines.push(std::mem::take(&mut self.current));
    }

    fn start_block(&mut self) {
        self.end_line();
    }

    /// Ends a block, leaving one blank line after it.
    fn end_block(&mut self) {
        self.end_line();
        if self.lines.last().is_some_and(|line| !line.is_empty()) {
            self.lines.push(Vec::new());
        }
    }

    fn finish(mut self) -> Vec<Line> {
        self.end_line();
        while self.lines.last().is_some_and(|line| line.is_empty()) {
            self.lines.pop();
        }
        self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(source: &str) -> Vec<String> {
        markdown_lines(source).iter().map(plain).collect()
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(rendered("Hello!"), vec!["Hello!"]);
        assert!(rendered("").is_empty());
    }

    #[test]
    fn paragraphs_are_separated_by_blank_line() {
        assert_eq!(rendered("one\n\ntwo"), vec!["one", "", "two"]);
    }

    #[test]
    fn soft_breaks_join_lines() {
        assert_eq!(rendered("one\ntwo"), vec!["one two"]);
    }

    #[test]
    fn strong_text_is_bold_without_markers() {
        let lines = markdown_lines("say **hi** now");
        assert_eq!(plain(&lines[0]), "say hi now");
        let bold: Vec<&Span> = lines[0].iter().filter(|s| s.style.bold).collect();
        assert_eq!(bold.len(), 1);
        assert_eq!(bold[0].text, "hi");
    }

    #[test]
    fn unclosed_markup_renders_literally() {
        assert_eq!(rendered("**Hel"), vec!["**Hel"]);
    }

    #[test]
    fn headings_are_bold() {
        let lines = markdown_lines("# Title\nbody");
        assert_eq!(plain(&lines[0]), "Title");
        assert!(lines[0][0].style.bold);
        assert_eq!(plain(&lines[2]), "body");
    }

    #[test]
    fn code_blocks_keep_lines() {
        let lines = markdown_lines("```\nfn main() {\n\n}\n```");
        let text: Vec<String> = lines.iter().map(plain).collect();
        assert_eq!(text, vec!["fn main() {", "", "}"]);
        assert!(lines[0][0].style.code);
    }

    #[test]
    fn code_block_tabs_become_spaces() {
        let lines = markdown_lines("```\n\tif x {\n\t\treturn y\n\t}\n```");
        let text: Vec<String> = lines.iter().map(plain).collect();
        assert_eq!(text[0], format!("{}if x {{", " ".repeat(8)));
        assert_eq!(text[1], format!("{}return y", " ".repeat(16)));
        assert!(text.iter().all(|row| !row.contains('\t')));
    }

    #[test]
    fn tabs_align_to_tab_stops() {
        assert_eq!(expand_tabs("ab\tc", 0), "ab      c");
        assert_eq!(expand_tabs("\tc", 3), "     c");
        assert_eq!(expand_tabs("a\rb", 0), "ab");
    }

    #[test]
    fn wrapped_tab_indented_code_fits_width() {
        let width = 21;
        for line in markdown_lines("```\n\t\tif x {\n\t\t\treturn y\n\t\t}\n```") {
            for row in wrap_line(&line, width) {
                assert!(display_width(&row) <= width, "{:?}", plain(&row));
                assert!(!plain(&row).contains('\t'));
            }
        }
    }

    #[test]
    fn lists_get_markers() {
        assert_eq!(rendered("- a\n- b"), vec!["• a", "• b"]);
        assert_eq!(rendered("3. x\n4. y"), vec!["3. x", "4. y"]);
        assert_eq!(rendered("- a\n  - b"), vec!["• a", "  • b"]);
    }

    #[test]
    fn wrap_prefers_spaces() {
        let line = vec![Span {
            text: "hello brave new world".to_string(),
            style: Style::default(),
        }];
        let rows: Vec<String> = wrap_line(&line, 11).iter().map(plain).collect();
        assert_eq!(rows, vec!["hello brave", "new world"]);
    }

    #[test]
    fn wrap_breaks_long_words() {
        let line = vec![Span {
            text: "abcdefghij".to_string(),
            style: Style::default(),
        }];
        let rows: Vec<String> = wrap_line(&line, 4).iter().map(plain).collect();
        assert_eq!(rows, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn wrap_counts_wide_characters() {
        let line = vec![Span {
            text: "日本語です".to_string(),
            style: Style::default(),
        }];
        let rows = wrap_line(&line, 4);
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|row| display_width(row) <= 4));
    }

    #[test]
    fn wrap_keeps_styles() {
        let line = markdown_lines("aa **bb** cc").remove(0);
        let rows = wrap_line(&line, 5);
        assert_eq!(plain(&rows[0]), "aa bb");
        assert!(rows[0].iter().any(|s| s.style.bold && s.text == "bb"));
        assert_eq!(plain(&rows[1]), "cc");
    }

    #[test]
    fn paint_without_color_is_plain() {
        let line = markdown_lines("**x** `y`").remove(0);
        assert_eq!(paint(&line, false), "x y");
        let colored = paint(&line, true);
        assert!(colored.contains(ANSI_BOLD));
        assert!(colored.contains(ANSI_CYAN));
    }
}
