//! Textual parser for controller source files.
//!
//! The parser does not build a syntax tree. It locates namespaces, imports, class
//! declarations and method spans by pattern matching, using a bracket matcher that skips
//! string literals and comments. That is enough to hand method source text to the
//! literal-pattern scanners and to read literal arrays; anything built dynamically is
//! out of its reach. Heredoc/nowdoc strings are not recognized.

use crate::error::Result;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

static NAMESPACE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*namespace\s+([A-Za-z_][\w\\]*)\s*[;{]").expect("namespace regex should be valid")
});

static USE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*use\s+\\?([A-Za-z_][\w\\]*)(?:\s+as\s+(\w+))?\s*;")
        .expect("use regex should be valid")
});

static CLASS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(?:(?:abstract|final|readonly)\s+)*class\s+(\w+)(?:\s+extends\s+\\?([\w\\]+))?(?:\s+implements\s+[\w\\,\s]+?)?\s*\{",
    )
    .expect("class regex should be valid")
});

static METHOD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"((?:(?:public|protected|private|static|final|abstract)\s+)*)function\s+&?(\w+)\s*\(")
        .expect("method regex should be valid")
});

static RETURN_ARRAY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\breturn\s*(\[|array\s*\()").expect("return regex should be valid")
});

/// Stateless parser entry point.
pub struct SourceParser;

/// One source file reduced to the declarations the generator cares about.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub path: PathBuf,
    pub namespace: Option<String>,
    /// Import alias (short name) to fully-qualified name
    pub imports: HashMap<String, String>,
    pub classes: Vec<ClassDecl>,
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: String,
    /// Fully-qualified name, without a leading backslash
    pub fqcn: String,
    /// Fully-qualified parent name, if the class extends one
    pub parent: Option<String>,
    pub methods: Vec<MethodDecl>,
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub name: String,
    pub is_static: bool,
    /// Raw text between the parameter parentheses
    pub parameters_text: String,
    /// Full method text from its modifiers to its closing brace
    pub source: String,
}

/// One declared parameter, as written.
#[derive(Debug, Clone, PartialEq)]
pub struct RawParameter {
    pub name: String,
    pub declared_type: Option<String>,
    pub optional: bool,
    pub default: Option<String>,
}

/// A literal value read from source. Anything that is not a string or an array of
/// literals is kept as the raw expression text.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Str(String),
    Array(Vec<ArrayEntry>),
    Expr(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayEntry {
    pub key: Option<String>,
    pub value: LiteralValue,
}

impl SourceParser {
    /// Reads and parses a single file.
    pub fn parse_file(path: &Path) -> Result<ParsedFile> {
        debug!("Parsing file: {}", path.display());
        let content = fs::read_to_string(path)?;
        Ok(Self::parse_str(path, &content))
    }

    /// Parses several files, continuing past the ones that cannot be read.
    pub fn parse_files(paths: &[PathBuf]) -> Vec<Result<ParsedFile>> {
        let results: Vec<Result<ParsedFile>> = paths
            .iter()
            .map(|path| {
                Self::parse_file(path).map_err(|e| {
                    warn!("Failed to parse {}: {}", path.display(), e);
                    e
                })
            })
            .collect();

        let success_count = results.iter().filter(|r| r.is_ok()).count();
        debug!(
            "Parsing complete: {} succeeded, {} failed",
            success_count,
            results.len() - success_count
        );
        results
    }

    /// Parses source text already in memory.
    pub fn parse_str(path: &Path, content: &str) -> ParsedFile {
        let namespace = NAMESPACE_RE
            .captures(content)
            .map(|c| c[1].trim_matches('\\').to_string());

        let header_end = CLASS_RE.find(content).map(|m| m.start()).unwrap_or(content.len());
        let mut imports = HashMap::new();
        for caps in USE_RE.captures_iter(&content[..header_end]) {
            let full = caps[1].trim_matches('\\').to_string();
            let alias = match caps.get(2) {
                Some(alias) => alias.as_str().to_string(),
                None => short_name(&full).to_string(),
            };
            imports.insert(alias, full);
        }

        let mut file = ParsedFile {
            path: path.to_path_buf(),
            namespace,
            imports,
            classes: Vec::new(),
        };

        let mut search_from = 0;
        while let Some(caps) = CLASS_RE.captures(&content[search_from..]) {
            let Some(whole) = caps.get(0) else { break };
            let open = search_from + whole.end() - 1;
            let Some(close) = find_matching(content, open, b'{', b'}') else {
                debug!("Unbalanced class body in {}", path.display());
                break;
            };

            let name = caps[1].to_string();
            let parent = caps.get(2).map(|p| file.resolve_name(p.as_str()));
            let fqcn = match &file.namespace {
                Some(ns) => format!("{}\\{}", ns, name),
                None => name.clone(),
            };
            let methods = parse_methods(&content[open + 1..close]);

            file.classes.push(ClassDecl {
                name,
                fqcn,
                parent,
                methods,
            });
            search_from = close + 1;
        }

        file
    }
}

impl ParsedFile {
    /// Resolves a class reference written in this file to its fully-qualified name.
    pub fn resolve_name(&self, name: &str) -> String {
        if let Some(absolute) = name.strip_prefix('\\') {
            return absolute.to_string();
        }
        let (head, rest) = match name.split_once('\\') {
            Some((head, rest)) => (head, Some(rest)),
            None => (name, None),
        };
        if let Some(imported) = self.imports.get(head) {
            return match rest {
                Some(rest) => format!("{}\\{}", imported, rest),
                None => imported.clone(),
            };
        }
        match &self.namespace {
            Some(ns) => format!("{}\\{}", ns, name),
            None => name.to_string(),
        }
    }
}

impl ClassDecl {
    pub fn method(&self, name: &str) -> Option<&MethodDecl> {
        self.methods.iter().find(|m| m.name.eq_ignore_ascii_case(name))
    }
}

fn parse_methods(body: &str) -> Vec<MethodDecl> {
    let mut methods = Vec::new();
    let mut pos = 0;

    while let Some(caps) = METHOD_RE.captures(&body[pos..]) {
        let Some(whole) = caps.get(0) else { break };
        let start = pos + whole.start();
        let paren_open = pos + whole.end() - 1;
        let Some(paren_close) = find_matching(body, paren_open, b'(', b')') else {
            break;
        };

        let modifiers = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let name = caps[2].to_string();
        let parameters_text = body[paren_open + 1..paren_close].to_string();

        // Return type declarations sit between `)` and the body or the `;` of an
        // abstract/interface method.
        let rest = &body[paren_close + 1..];
        let end = match rest.find(|c: char| c == '{' || c == ';') {
            Some(offset) if rest.as_bytes()[offset] == b'{' => {
                let open = paren_close + 1 + offset;
                match find_matching(body, open, b'{', b'}') {
                    Some(close) => close,
                    None => break,
                }
            }
            Some(offset) => paren_close + 1 + offset,
            None => break,
        };

        methods.push(MethodDecl {
            name,
            is_static: modifiers.split_whitespace().any(|m| m == "static"),
            parameters_text,
            source: body[start..=end].to_string(),
        });
        pos = end + 1;
    }

    methods
}

/// Returns the index of the bracket closing the one at `open_idx`.
///
/// String literals and comments are skipped so brackets inside them do not count.
pub fn find_matching(text: &str, open_idx: usize, open: u8, close: u8) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.get(open_idx) != Some(&open) {
        return None;
    }

    let mut depth = 0usize;
    let mut i = open_idx;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' => {
                i = skip_string(bytes, i);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                i = skip_line(bytes, i);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = skip_block_comment(bytes, i);
                continue;
            }
            b'#' if bytes.get(i + 1) != Some(&b'[') => {
                i = skip_line(bytes, i);
                continue;
            }
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn skip_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            c if c == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn skip_line(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|&b| b == b'\n')
        .map(|p| start + p + 1)
        .unwrap_or(bytes.len())
}

fn skip_block_comment(bytes: &[u8], start: usize) -> usize {
    bytes[start + 2..]
        .windows(2)
        .position(|w| w == b"*/")
        .map(|p| start + 2 + p + 2)
        .unwrap_or(bytes.len())
}

/// Splits `text` on `separator` wherever it appears outside brackets, strings and comments.
pub fn split_top_level<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut last = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' => {
                i = skip_string(bytes, i);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                i = skip_line(bytes, i);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = skip_block_comment(bytes, i);
                continue;
            }
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            _ if depth == 0 && bytes[i..].starts_with(separator.as_bytes()) => {
                // `=>` is not an assignment
                let is_arrow = separator == "=" && bytes.get(i + 1) == Some(&b'>');
                let is_comparison = separator == "="
                    && (bytes.get(i + 1) == Some(&b'=') || (i > 0 && b"!<>=".contains(&bytes[i - 1])));
                if !is_arrow && !is_comparison {
                    parts.push(&text[last..i]);
                    i += separator.len();
                    last = i;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(&text[last..]);
    parts
}

/// Unquotes a single- or double-quoted string literal.
pub fn parse_string_literal(text: &str) -> Option<String> {
    let text = text.trim();
    let quote = text.chars().next()?;
    if (quote != '\'' && quote != '"') || text.len() < 2 || !text.ends_with(quote) {
        return None;
    }
    let inner = &text[1..text.len() - 1];

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) if next == quote || next == '\\' => out.push(next),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            }
        } else if c == quote {
            // An unescaped quote means this was a concatenation, not one literal
            return None;
        } else {
            out.push(c);
        }
    }
    Some(out)
}

/// Parses the text between the brackets of an array literal.
pub fn parse_array_literal(inner: &str) -> Vec<ArrayEntry> {
    split_top_level(inner, ",")
        .into_iter()
        .map(str::trim)
        .filter(|element| !element.is_empty())
        .map(|element| {
            let parts = split_top_level(element, "=>");
            if parts.len() == 2 {
                ArrayEntry {
                    key: parse_string_literal(parts[0]).or_else(|| Some(parts[0].trim().to_string())),
                    value: parse_value(parts[1]),
                }
            } else {
                ArrayEntry {
                    key: None,
                    value: parse_value(element),
                }
            }
        })
        .collect()
}

/// Parses a single literal value expression.
pub fn parse_value(text: &str) -> LiteralValue {
    let text = text.trim();
    if let Some(s) = parse_string_literal(text) {
        return LiteralValue::Str(s);
    }
    if let Some(inner) = array_literal_inner(text, 0) {
        return LiteralValue::Array(parse_array_literal(inner));
    }
    LiteralValue::Expr(text.to_string())
}

/// Returns the inside of an array literal that starts at `start` and spans the rest of `text`.
fn array_literal_inner(text: &str, start: usize) -> Option<&str> {
    let rest = &text[start..];
    let (open, offset) = if rest.starts_with('[') {
        (b'[', 0)
    } else if rest.to_ascii_lowercase().starts_with("array") {
        let paren = rest.find('(')?;
        if !rest[5..paren].trim().is_empty() {
            return None;
        }
        (b'(', paren)
    } else {
        return None;
    };
    let close_byte = if open == b'[' { b']' } else { b')' };
    let open_idx = start + offset;
    let close = find_matching(text, open_idx, open, close_byte)?;
    if !text[close + 1..].trim().trim_end_matches(';').trim().is_empty() {
        return None;
    }
    Some(&text[open_idx + 1..close])
}

/// Finds the first `return [...]` in a method body and parses the array.
///
/// Returns `None` when the method does not return a literal array.
pub fn extract_returned_array(source: &str) -> Option<Vec<ArrayEntry>> {
    let m = RETURN_ARRAY_RE.find(source)?;
    let bracket_start = m.end() - 1;
    let (open, close) = if source.as_bytes()[bracket_start] == b'[' {
        (b'[', b']')
    } else {
        (b'(', b')')
    };
    let end = find_matching(source, bracket_start, open, close)?;
    let tail = source[end + 1..].trim_start();
    if !tail.starts_with(';') {
        // e.g. `return [..] + parent::rules();`
        return None;
    }
    Some(parse_array_literal(&source[bracket_start + 1..end]))
}

/// Parses a parameter list as written between a method's parentheses.
pub fn parse_parameters(text: &str) -> Vec<RawParameter> {
    const MODIFIERS: &[&str] = &["public", "protected", "private", "readonly"];

    split_top_level(text, ",")
        .into_iter()
        .filter_map(|piece| {
            let mut piece = piece.trim();
            while piece.starts_with("#[") {
                let close = find_matching(piece, 1, b'[', b']')?;
                piece = piece[close + 1..].trim_start();
            }
            if piece.is_empty() {
                return None;
            }

            let parts = split_top_level(piece, "=");
            let declaration = parts[0].trim();
            let default = if parts.len() > 1 {
                Some(parts[1..].join("=").trim().to_string())
            } else {
                None
            };

            let tokens: Vec<&str> = declaration.split_whitespace().collect();
            let name_idx = tokens.iter().rposition(|t| t.contains('$'))?;
            let raw_name = tokens[name_idx];
            let variadic = raw_name.contains("...");
            let name = raw_name
                .trim_start_matches(|c: char| c == '&' || c == '.' || c == '$')
                .to_string();
            let declared_type = tokens[..name_idx]
                .iter()
                .filter(|t| !MODIFIERS.contains(&t.to_lowercase().as_str()))
                .last()
                .map(|t| t.to_string());

            Some(RawParameter {
                name,
                declared_type,
                optional: default.is_some() || variadic,
                default,
            })
        })
        .collect()
}

/// Last segment of a backslash-separated class name.
pub fn short_name(name: &str) -> &str {
    name.rsplit('\\').next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CONTROLLER: &str = r#"<?php

namespace App\Http\Controllers;

use App\Http\Requests\StoreUserRequest;
use Illuminate\Http\Request as HttpRequest;

class UserController extends Controller
{
    // A brace in a comment: {
    public function index(HttpRequest $request, int $page = 1)
    {
        $label = "}";
        return response()->json([]);
    }

    public function store(StoreUserRequest $request): JsonResponse
    {
        $request->validate(['name' => 'required|string']);
        return response()->json(['ok' => true], 201);
    }

    abstract protected function helper();

    public static function make(?string ...$args) {}
}
"#;

    fn parse(content: &str) -> ParsedFile {
        SourceParser::parse_str(Path::new("UserController.php"), content)
    }

    #[test]
    fn test_parse_namespace_imports_and_class() {
        let file = parse(CONTROLLER);
        assert_eq!(file.namespace.as_deref(), Some("App\\Http\\Controllers"));
        assert_eq!(
            file.imports.get("HttpRequest").map(String::as_str),
            Some("Illuminate\\Http\\Request")
        );
        assert_eq!(file.classes.len(), 1);

        let class = &file.classes[0];
        assert_eq!(class.fqcn, "App\\Http\\Controllers\\UserController");
        assert_eq!(class.parent.as_deref(), Some("App\\Http\\Controllers\\Controller"));
    }

    #[test]
    fn test_methods_are_delimited_correctly() {
        let file = parse(CONTROLLER);
        let names: Vec<_> = file.classes[0].methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["index", "store", "helper", "make"]);

        let store = file.classes[0].method("store").unwrap();
        assert!(store.source.contains("$request->validate"));
        assert!(store.source.trim_end().ends_with('}'));
        assert!(!store.source.contains("helper"));

        let make = file.classes[0].method("make").unwrap();
        assert!(make.is_static);
    }

    #[test]
    fn test_parse_parameters() {
        let params = parse_parameters("HttpRequest $request, int $page = 1, ?string ...$rest");
        assert_eq!(
            params,
            vec![
                RawParameter {
                    name: "request".to_string(),
                    declared_type: Some("HttpRequest".to_string()),
                    optional: false,
                    default: None,
                },
                RawParameter {
                    name: "page".to_string(),
                    declared_type: Some("int".to_string()),
                    optional: true,
                    default: Some("1".to_string()),
                },
                RawParameter {
                    name: "rest".to_string(),
                    declared_type: Some("?string".to_string()),
                    optional: true,
                    default: None,
                },
            ]
        );
    }

    #[test]
    fn test_parse_promoted_and_attributed_parameters() {
        let params = parse_parameters("#[Inject] private readonly Mailer $mailer, $opts = ['a' => 1]");
        assert_eq!(params[0].name, "mailer");
        assert_eq!(params[0].declared_type.as_deref(), Some("Mailer"));
        assert_eq!(params[1].declared_type, None);
        assert_eq!(params[1].default.as_deref(), Some("['a' => 1]"));
    }

    #[test]
    fn test_resolve_name() {
        let file = parse(CONTROLLER);
        assert_eq!(
            file.resolve_name("StoreUserRequest"),
            "App\\Http\\Requests\\StoreUserRequest"
        );
        assert_eq!(file.resolve_name("\\Foo\\Bar"), "Foo\\Bar");
        assert_eq!(file.resolve_name("Local"), "App\\Http\\Controllers\\Local");
    }

    #[test]
    fn test_extract_returned_array() {
        let source = r#"public function rules(): array
        {
            return [
                'email' => 'required|email',
                'tags' => ['array', Rule::in(['a', 'b']), 'min:1'],
                'role' => $this->roleRule(),
            ];
        }"#;
        let entries = extract_returned_array(source).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].key.as_deref(), Some("email"));
        assert_eq!(entries[0].value, LiteralValue::Str("required|email".to_string()));
        match &entries[1].value {
            LiteralValue::Array(items) => {
                assert_eq!(items.len(), 3);
                assert_eq!(items[0].value, LiteralValue::Str("array".to_string()));
                assert!(matches!(items[1].value, LiteralValue::Expr(_)));
            }
            other => panic!("expected array, got {:?}", other),
        }
        assert!(matches!(entries[2].value, LiteralValue::Expr(_)));
    }

    #[test]
    fn test_returned_array_concatenation_is_not_literal() {
        let source = "function rules() { return ['a' => 'string'] + parent::rules(); }";
        assert!(extract_returned_array(source).is_none());
        assert!(extract_returned_array("function rules() { return $this->base; }").is_none());
    }

    #[test]
    fn test_string_literals() {
        assert_eq!(parse_string_literal("'it\\'s'"), Some("it's".to_string()));
        assert_eq!(parse_string_literal("\"a|b\""), Some("a|b".to_string()));
        assert_eq!(parse_string_literal("'a' . 'b'"), None);
        assert_eq!(parse_string_literal("$x"), None);
    }

    #[test]
    fn test_split_top_level_ignores_nested_and_quoted() {
        let parts = split_top_level("'a,b', [1, 2], f(3, 4)", ",");
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1].trim(), "[1, 2]");
    }
}
