//! Purpose: Render pretty JSON with optional ANSI colorization for CLI output.
//! Exports: colorize_json.
//! Role: Small, pure formatter used by CLI emission paths.
//! Invariants: When color is disabled, output equals serde_json::to_string_pretty.
//! Invariants: ANSI escapes appear only when explicitly enabled.
use serde_json::Value;

// Plain 8/16-color codes; bright variants lose contrast on some themes.
const KEY: &str = "36";
const STRING: &str = "32";
const NUMBER: &str = "33";
const BOOL: &str = "35";
const NEUTRAL: &str = "39";

pub fn colorize_json(value: &Value, use_color: bool) -> String {
    let painter = Painter { use_color };
    let mut out = String::new();
    painter.render(value, 0, &mut out);
    out
}

struct Painter {
    use_color: bool,
}

impl Painter {
    fn render(&self, value: &Value, depth: usize, out: &mut String) {
        match value {
            Value::Null => self.paint(NEUTRAL, "null", out),
            Value::Bool(true) => self.paint(BOOL, "true", out),
            Value::Bool(false) => self.paint(BOOL, "false", out),
            Value::Number(num) => self.paint(NUMBER, &num.to_string(), out),
            Value::String(text) => self.paint(STRING, &encode_str(text), out),
            Value::Array(items) => {
                if items.is_empty() {
                    self.paint(NEUTRAL, "[]", out);
                    return;
                }
                self.paint(NEUTRAL, "[", out);
                out.push('\n');
                for (idx, item) in items.iter().enumerate() {
                    indent(depth + 1, out);
                    self.render(item, depth + 1, out);
                    if idx + 1 < items.len() {
                        self.paint(NEUTRAL, ",", out);
                    }
                    out.push('\n');
                }
                indent(depth, out);
                self.paint(NEUTRAL, "]", out);
            }
            Value::Object(map) => {
                if map.is_empty() {
                    self.paint(NEUTRAL, "{}", out);
                    return;
                }
                self.paint(NEUTRAL, "{", out);
                out.push('\n');
                for (idx, (key, item)) in map.iter().enumerate() {
                    indent(depth + 1, out);
                    self.paint(KEY, &encode_str(key), out);
                    self.paint(NEUTRAL, ":", out);
                    out.push(' ');
                    self.render(item, depth + 1, out);
                    if idx + 1 < map.len() {
                        self.paint(NEUTRAL, ",", out);
                    }
                    out.push('\n');
                }
                indent(depth, out);
                self.paint(NEUTRAL, "}", out);
            }
        }
    }

    fn paint(&self, color: &str, text: &str, out: &mut String) {
        if !self.use_color {
            out.push_str(text);
            return;
        }
        out.push_str("\u{1b}[");
        out.push_str(color);
        out.push('m');
        out.push_str(text);
        out.push_str("\u{1b}[0m");
    }
}

fn encode_str(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string())
}

fn indent(depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}
