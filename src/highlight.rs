use std::sync::OnceLock;

use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    Shell,
    Sql,
    Plain,
}

impl Language {
    /// Pick a language from a fenced block's info string (```rust, ```py ...)
    pub fn from_info(info: &str) -> Self {
        let tag = info
            .split(|c: char| c.is_whitespace() || c == ',')
            .next()
            .unwrap_or("")
            .to_lowercase();
        match tag.as_str() {
            "rust" | "rs" => Language::Rust,
            "python" | "py" => Language::Python,
            "javascript" | "js" | "typescript" | "ts" | "jsx" | "tsx" | "json" => {
                Language::JavaScript
            }
            "sh" | "bash" | "zsh" | "shell" | "console" => Language::Shell,
            "sql" => Language::Sql,
            _ => Language::Plain,
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    fn comment(self) -> &'static str {
        match self {
            Language::Python | Language::Shell => r"#[^\n]*",
            Language::Sql => r"--[^\n]*",
            Language::Rust | Language::JavaScript | Language::Plain => r"//[^\n]*",
        }
    }

    fn keywords(self) -> &'static [&'static str] {
        match self {
            Language::Rust => &[
                "as", "async", "await", "break", "const", "continue", "crate", "else", "enum",
                "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
                "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super",
                "trait", "true", "type", "unsafe", "use", "where", "while",
            ],
            Language::Python => &[
                "and", "as", "async", "await", "break", "class", "continue", "def", "del",
                "elif", "else", "except", "False", "finally", "for", "from", "if", "import",
                "in", "is", "lambda", "None", "not", "or", "pass", "raise", "return", "True",
                "try", "while", "with", "yield",
            ],
            Language::JavaScript => &[
                "async", "await", "break", "case", "catch", "class", "const", "continue",
                "default", "else", "export", "extends", "false", "for", "function", "if",
                "import", "let", "new", "null", "return", "switch", "this", "throw", "true",
                "try", "typeof", "undefined", "var", "while",
            ],
            Language::Shell => &[
                "case", "do", "done", "elif", "else", "esac", "export", "fi", "for", "function",
                "if", "in", "local", "then", "until", "while",
            ],
            Language::Sql => &[
                "AND", "AS", "BY", "CREATE", "DELETE", "FROM", "GROUP", "INSERT", "INTO", "JOIN",
                "LIMIT", "NOT", "NULL", "ON", "OR", "ORDER", "SELECT", "SET", "TABLE", "UPDATE",
                "VALUES", "WHERE", "and", "as", "by", "from", "select", "where",
            ],
            Language::Plain => &[],
        }
    }

    fn token_regex(self) -> &'static Regex {
        static CACHE: [OnceLock<Regex>; 6] = [
            OnceLock::new(),
            OnceLock::new(),
            OnceLock::new(),
            OnceLock::new(),
            OnceLock::new(),
            OnceLock::new(),
        ];
        CACHE[self.index()].get_or_init(|| {
            let mut pattern = format!(
                r#"(?P<comment>{})|(?P<string>"(?:[^"\\\n]|\\.)*"|'(?:[^'\\\n]|\\.)*')|(?P<number>\b\d[\d_]*(?:\.\d+)?\b)"#,
                self.comment()
            );
            let keywords = self.keywords();
            if !keywords.is_empty() {
                pattern.push_str(&format!(r"|(?P<keyword>\b(?:{})\b)", keywords.join("|")));
            }
            // Every fragment above is a fixed literal, so the pattern always compiles.
            Regex::new(&pattern).expect("highlight pattern is valid")
        })
    }
}

pub fn code_style() -> Style {
    Style::default().fg(Color::Gray)
}

fn token_style(group: &str) -> Style {
    match group {
        "comment" => Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::ITALIC),
        "string" => Style::default().fg(Color::Green),
        "number" => Style::default().fg(Color::Magenta),
        "keyword" => Style::default()
            .fg(Color::LightBlue)
            .add_modifier(Modifier::BOLD),
        _ => code_style(),
    }
}

/// Colour one line of code. Text between tokens keeps the plain code style.
pub fn highlight_line(line: &str, language: Language) -> Line<'static> {
    let regex = language.token_regex();
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut last = 0;

    for caps in regex.captures_iter(line) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() > last {
            spans.push(Span::styled(line[last..whole.start()].to_string(), code_style()));
        }
        let group = ["comment", "string", "number", "keyword"]
            .into_iter()
            .find(|name| caps.name(name).is_some())
            .unwrap_or("");
        spans.push(Span::styled(whole.as_str().to_string(), token_style(group)));
        last = whole.end();
    }

    if last < line.len() {
        spans.push(Span::styled(line[last..].to_string(), code_style()));
    }

    Line::from(spans)
}

pub fn highlight_block(info: &str, code: &str) -> Vec<Line<'static>> {
    let language = Language::from_info(info);
    code.trim_end_matches('\n')
        .split('\n')
        .map(|line| highlight_line(line, language))
        .collect()
}
