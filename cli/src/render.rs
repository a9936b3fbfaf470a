//! Terminal rendering of the `<color>…</color>` markup.
//!
//! Known color tags become ANSI styles through crossterm; tags may nest and
//! the innermost one wins. Anything that is not a known tag is printed as
//! is. With colors disabled the known tags are stripped instead.

use std::io::{self, Write};

use crossterm::style::{Color, Stylize};

use poolcheck_core::report::OutputSink;

/// Writes harness lines to stdout, rendering markup.
#[derive(Debug, Clone, Copy)]
pub struct TerminalSink {
    color: bool,
}

impl TerminalSink {
    pub fn new(color: bool) -> Self {
        Self { color }
    }
}

impl OutputSink for TerminalSink {
    fn emit(&self, line: &str) {
        let rendered = render(line, self.color);
        let mut out = io::stdout().lock();
        // A closed stdout leaves nothing useful to report to.
        let _ = writeln!(out, "{rendered}");
    }
}

fn color_for(tag: &str) -> Option<Color> {
    Some(match tag {
        "black" => Color::Black,
        "red" => Color::DarkRed,
        "green" => Color::DarkGreen,
        "yellow" => Color::DarkYellow,
        "blue" => Color::DarkBlue,
        "magenta" => Color::DarkMagenta,
        "cyan" => Color::DarkCyan,
        "white" => Color::Grey,
        "light_red" => Color::Red,
        "light_green" => Color::Green,
        "light_yellow" => Color::Yellow,
        "light_blue" => Color::Blue,
        "light_magenta" => Color::Magenta,
        "light_cyan" => Color::Cyan,
        "light_white" => Color::White,
        _ => return None,
    })
}

/// Render one markup line. Unbalanced closing tags are dropped.
pub fn render(line: &str, color: bool) -> String {
    let mut out = String::with_capacity(line.len());
    let mut stack: Vec<Color> = Vec::new();
    let mut rest = line;

    while !rest.is_empty() {
        let Some(open) = rest.find('<') else {
            push_segment(&mut out, rest, stack.last().copied(), color);
            break;
        };
        push_segment(&mut out, &rest[..open], stack.last().copied(), color);
        rest = &rest[open..];

        let tag = rest[1..].find('>').map(|end| &rest[1..=end]);
        match tag.and_then(parse_tag) {
            Some(Tag::Open(c)) => {
                stack.push(c);
                rest = &rest[tag.map_or(0, str::len) + 2..];
            }
            Some(Tag::Close) => {
                stack.pop();
                rest = &rest[tag.map_or(0, str::len) + 2..];
            }
            None => {
                push_segment(&mut out, "<", stack.last().copied(), color);
                rest = &rest[1..];
            }
        }
    }
    out
}

enum Tag {
    Open(Color),
    Close,
}

fn parse_tag(tag: &str) -> Option<Tag> {
    match tag.strip_prefix('/') {
        Some(name) => color_for(name).map(|_| Tag::Close),
        None => color_for(tag).map(Tag::Open),
    }
}

fn push_segment(out: &mut String, text: &str, style: Option<Color>, color: bool) {
    if text.is_empty() {
        return;
    }
    match style {
        Some(c) if color => out.push_str(&text.with(c).to_string()),
        _ => out.push_str(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_mode_strips_known_tags() {
        assert_eq!(
            render("[<green>PASS</green>] saved <light_red>\"x\"</light_red>", false),
            "[PASS] saved \"x\""
        );
    }

    #[test]
    fn unknown_tags_and_stray_brackets_survive() {
        assert_eq!(render("a < b <tag> c</tag>", false), "a < b <tag> c</tag>");
        assert_eq!(render("x</red>y", false), "xy");
    }

    #[test]
    fn color_mode_styles_the_tagged_text() {
        let out = render("<red>FAIL</red> done", true);
        assert_eq!(out, format!("{} done", "FAIL".with(Color::DarkRed)));
    }

    #[test]
    fn nested_tags_use_the_innermost_color() {
        let out = render("<blue>a <yellow>b</yellow> c</blue>", true);
        assert_eq!(out, format!(
            "{}{}{}",
            "a ".with(Color::DarkBlue),
            "b".with(Color::DarkYellow),
            " c".with(Color::DarkBlue)
        ));
    }
}
