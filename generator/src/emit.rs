// emit.rs — C# text fragments: literals, argument lists, array constructors
//
// Purely mechanical formatting shared by the serializer. Indentation is one
// tab per level; array constructors start on a fresh line so they can be
// dropped into an argument list.
//
// Preconditions: none.
// Postconditions: returned fragments are syntactically valid C# expressions.
// Failure modes: none (pure string formatting).
// Side effects: none.

use std::fmt::Write as _;

use crate::model::{Bounds, Vec2, Vec3};

// ── Literals ────────────────────────────────────────────────────────────────

/// Types that render as a C# literal expression.
pub trait Literal {
    fn literal(&self) -> String;
}

impl Literal for f32 {
    fn literal(&self) -> String {
        float_lit(*self)
    }
}

impl Literal for bool {
    fn literal(&self) -> String {
        if *self { "true" } else { "false" }.to_string()
    }
}

impl Literal for i32 {
    fn literal(&self) -> String {
        self.to_string()
    }
}

impl Literal for String {
    fn literal(&self) -> String {
        string_lit(self)
    }
}

impl Literal for Vec2 {
    fn literal(&self) -> String {
        format!("new Vector2({}, {})", float_lit(self.0), float_lit(self.1))
    }
}

impl Literal for Vec3 {
    fn literal(&self) -> String {
        format!(
            "new Vector3({}, {}, {})",
            float_lit(self.0),
            float_lit(self.1),
            float_lit(self.2)
        )
    }
}

impl Literal for Bounds {
    fn literal(&self) -> String {
        format!(
            "new Bounds({}, {})",
            self.center.literal(),
            self.size.literal()
        )
    }
}

/// `f32` as a C# float literal: shortest round-trip digits plus `f`.
pub fn float_lit(v: f32) -> String {
    if v.is_nan() {
        "float.NaN".to_string()
    } else if v == f32::INFINITY {
        "float.PositiveInfinity".to_string()
    } else if v == f32::NEG_INFINITY {
        "float.NegativeInfinity".to_string()
    } else {
        format!("{v}f")
    }
}

/// Double-quoted C# string with backslashes, quotes, and control characters escaped.
pub fn string_lit(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Qualified enum member, e.g. `WrapMode.Loop`.
pub fn enum_lit(prefix: &str, member: &str) -> String {
    format!("{prefix}.{member}")
}

// ── Argument lists ──────────────────────────────────────────────────────────

/// Argument list for a generated call. Named arguments whose value equals the
/// declared default are left out; the target signatures supply the default.
#[derive(Debug, Default, Clone)]
pub struct Args(Vec<String>);

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, expr: impl Into<String>) -> Self {
        self.0.push(expr.into());
        self
    }

    /// `name: expr`. An expression starting on its own line keeps the colon
    /// at the end of the current one.
    pub fn named(mut self, name: &str, expr: impl AsRef<str>) -> Self {
        let expr = expr.as_ref();
        let sep = if expr.starts_with('\n') { "" } else { " " };
        self.0.push(format!("{name}:{sep}{expr}"));
        self
    }

    pub fn named_opt(self, name: &str, expr: Option<String>) -> Self {
        match expr {
            Some(expr) => self.named(name, expr),
            None => self,
        }
    }

    /// `name: literal` unless `value == default`.
    pub fn named_lit<T: Literal + PartialEq>(self, name: &str, value: &T, default: &T) -> Self {
        if value == default {
            self
        } else {
            self.named(name, value.literal())
        }
    }

    /// Like `named_lit` with a caller-supplied rendering.
    pub fn named_with<T: PartialEq>(
        self,
        name: &str,
        value: &T,
        default: &T,
        render: impl FnOnce(&T) -> String,
    ) -> Self {
        if value == default {
            self
        } else {
            let expr = render(value);
            self.named(name, expr)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Comma-separated; no space before an argument that opens a new line.
    pub fn join(&self) -> String {
        let mut out = String::new();
        for (i, arg) in self.0.iter().enumerate() {
            if i > 0 {
                out.push(',');
                if !arg.starts_with('\n') {
                    out.push(' ');
                }
            }
            out.push_str(arg);
        }
        out
    }
}

/// `function(arg, arg, ...)`.
pub fn call(function: &str, args: Args) -> String {
    format!("{function}({})", args.join())
}

/// Array constructor starting on a new line at `tabs`, one item per line.
/// An empty `type_name` produces an implicitly typed `new [] {`.
pub fn array(type_name: &str, items: &[String], tabs: usize) -> String {
    let mut out = String::new();
    out.push('\n');
    push_indent(&mut out, tabs);
    let _ = writeln!(out, "new {type_name}[] {{");
    push_items(&mut out, items, tabs + 1);
    push_indent(&mut out, tabs);
    out.push('}');
    out
}

/// Comma-separated items, one per line, without a trailing comma.
pub fn push_items(out: &mut String, items: &[String], tabs: usize) {
    for (i, item) in items.iter().enumerate() {
        push_indent(out, tabs);
        out.push_str(item);
        if i + 1 != items.len() {
            out.push(',');
        }
        out.push('\n');
    }
}

pub fn push_indent(out: &mut String, tabs: usize) {
    for _ in 0..tabs {
        out.push('\t');
    }
}

// ── Line writer ─────────────────────────────────────────────────────────────

/// Accumulates generated source line by line.
#[derive(Debug, Default)]
pub struct CodeWriter {
    out: String,
}

impl CodeWriter {
    pub fn new() -> Self {
        CodeWriter {
            out: String::with_capacity(16 * 1024),
        }
    }

    /// One indented line.
    pub fn line(&mut self, tabs: usize, text: impl AsRef<str>) {
        push_indent(&mut self.out, tabs);
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    pub fn blank(&mut self) {
        self.out.push('\n');
    }

    /// `Type ident = expr;`
    pub fn declare(&mut self, tabs: usize, type_name: &str, ident: &str, expr: &str) {
        self.line(tabs, format!("{type_name} {ident} = {expr};"));
    }

    /// `Type[] ident = new Type[] { items };`
    pub fn declare_array(&mut self, tabs: usize, type_name: &str, ident: &str, items: &[String]) {
        self.line(tabs, format!("{type_name}[] {ident} = new {type_name}[] {{"));
        push_items(&mut self.out, items, tabs + 1);
        self.line(tabs, "};");
    }

    /// Append pre-rendered lines verbatim.
    pub fn push_raw(&mut self, text: &str) {
        self.out.push_str(text);
    }

    /// Comma-separated items, one per line.
    pub fn items(&mut self, tabs: usize, items: &[String]) {
        push_items(&mut self.out, items, tabs);
    }

    /// `target = new Type[] { items };`
    pub fn assign_array(&mut self, tabs: usize, target: &str, type_name: &str, items: &[String]) {
        self.line(tabs, format!("{target} = new {type_name}[] {{"));
        push_items(&mut self.out, items, tabs + 1);
        self.line(tabs, "};");
    }

    pub fn as_str(&self) -> &str {
        &self.out
    }

    pub fn finish(self) -> String {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_literals() {
        assert_eq!(float_lit(0.5), "0.5f");
        assert_eq!(float_lit(1.0), "1f");
        assert_eq!(float_lit(-0.25), "-0.25f");
        assert_eq!(float_lit(800.0), "800f");
        assert_eq!(float_lit(0.1), "0.1f");
        assert_eq!(float_lit(f32::INFINITY), "float.PositiveInfinity");
        assert_eq!(float_lit(f32::NEG_INFINITY), "float.NegativeInfinity");
        assert_eq!(float_lit(f32::NAN), "float.NaN");
    }

    #[test]
    fn string_literals_are_escaped() {
        assert_eq!(string_lit("Idle"), "\"Idle\"");
        assert_eq!(string_lit("a\"b"), "\"a\\\"b\"");
        assert_eq!(string_lit("C:\\x"), "\"C:\\\\x\"");
        assert_eq!(string_lit("line\nbreak"), "\"line\\nbreak\"");
    }

    #[test]
    fn default_arguments_are_omitted() {
        let args = Args::new()
            .arg("\"T\"")
            .named_lit("duration", &0.0f32, &0.0)
            .named_lit("exitTime", &0.75f32, &0.0)
            .named_lit("orderedInterruption", &true, &true)
            .named_lit("mute", &true, &false);
        assert_eq!(
            call("GenerateTransition", args),
            "GenerateTransition(\"T\", exitTime: 0.75f, mute: true)"
        );
    }

    #[test]
    fn named_with_uses_renderer() {
        let args = Args::new()
            .named_with("wrapMode", &"Loop", &"Default", |v| enum_lit("WrapMode", v))
            .named_with("other", &"Default", &"Default", |v| enum_lit("WrapMode", v));
        assert_eq!(args.join(), "wrapMode: WrapMode.Loop");
    }

    #[test]
    fn named_opt_skips_none() {
        let args = Args::new()
            .named_opt("motion", None)
            .named_opt("defaultState", Some("StateIdle".into()));
        assert_eq!(args.join(), "defaultState: StateIdle");
        assert!(Args::new().is_empty());
    }

    #[test]
    fn multiline_arguments_have_no_trailing_space() {
        let items = vec!["\"Hips\"".to_string()];
        let args = Args::new()
            .arg("\"Upper\"")
            .arg(array("string", &items, 1))
            .named("conditions", array("bool", &[], 1));
        assert_eq!(
            call("GenerateMask", args),
            "GenerateMask(\"Upper\",\n\tnew string[] {\n\t\t\"Hips\"\n\t},conditions:\n\tnew bool[] {\n\t})"
        );
    }

    #[test]
    fn vectors_and_bounds() {
        assert_eq!(Vec3(800.0, 20.0, 0.0).literal(), "new Vector3(800f, 20f, 0f)");
        assert_eq!(Vec2(1.5, -1.0).literal(), "new Vector2(1.5f, -1f)");
        assert_eq!(
            Bounds::default().literal(),
            "new Bounds(new Vector3(0f, 0f, 0f), new Vector3(0f, 0f, 0f))"
        );
    }

    #[test]
    fn array_constructor_layout() {
        let items = vec!["a".to_string(), "b".to_string()];
        assert_eq!(array("string", &items, 1), "\n\tnew string[] {\n\t\ta,\n\t\tb\n\t}");
        assert_eq!(array("bool", &[], 0), "\nnew bool[] {\n}");
    }

    #[test]
    fn writer_lines_and_arrays() {
        let mut w = CodeWriter::new();
        w.declare(1, "AnimatorState", "StateIdle", "GenerateState(\"Idle\")");
        w.assign_array(1, "StateIdle.transitions", "AnimatorStateTransition", &["t".to_string()]);
        w.blank();
        assert_eq!(
            w.finish(),
            "\tAnimatorState StateIdle = GenerateState(\"Idle\");\n\tStateIdle.transitions = new AnimatorStateTransition[] {\n\t\tt\n\t};\n\n"
        );
    }
}
