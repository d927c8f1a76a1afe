//! Translation of rule-file XPath expressions into CSS selectors.
//!
//! Only the subset that rule files actually use is understood: location
//! paths with `/` and `//`, element names or `*`, positional predicates,
//! attribute presence/equality, `contains()` and `starts-with()` on
//! attributes, `and`-joined predicates and `|` unions. Anything else is
//! reported as an error instead of producing a selector that matches
//! something different.

use crate::error::ImportError;

/// Selector used when a descriptor carries no XPath.
pub const DEFAULT_SELECTOR: &str = "body";

pub fn xpath_to_css(xpath: &str) -> Result<String, ImportError> {
    let fail = |reason: &str| ImportError::Selector {
        xpath: xpath.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = xpath.trim();
    if trimmed.is_empty() {
        return Err(fail("empty expression"));
    }

    let mut selectors = Vec::new();
    for branch in split_top_level(trimmed, '|') {
        selectors.push(translate_path(branch.trim()).map_err(|r| fail(&r))?);
    }
    Ok(selectors.join(", "))
}

#[derive(Debug, PartialEq)]
enum Axis {
    Child,
    Descendant,
}

fn translate_path(path: &str) -> Result<String, String> {
    if path.is_empty() {
        return Err("empty location path".to_string());
    }

    let mut out = String::new();
    let mut rest = path;
    let mut first = true;

    while !rest.is_empty() {
        let axis = if let Some(r) = rest.strip_prefix("//") {
            rest = r;
            Axis::Descendant
        } else if let Some(r) = rest.strip_prefix('/') {
            rest = r;
            Axis::Child
        } else if first {
            Axis::Descendant
        } else {
            return Err(format!("unexpected '{}'", rest));
        };

        let end = step_end(rest)?;
        let (step, tail) = rest.split_at(end);
        let css = translate_step(step)?;

        if !first {
            out.push_str(match axis {
                Axis::Child => " > ",
                Axis::Descendant => " ",
            });
        }
        out.push_str(&css);

        first = false;
        rest = tail;
    }

    Ok(out)
}

/// Byte offset of the next top-level `/` (or end of input).
fn step_end(s: &str) -> Result<usize, String> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in s.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '[' | '(') => depth += 1,
            (None, ']' | ')') => {
                depth = depth.checked_sub(1).ok_or("unbalanced brackets")?;
            }
            (None, '/') if depth == 0 => return Ok(i),
            _ => {}
        }
    }
    if depth != 0 || quote.is_some() {
        return Err("unbalanced brackets or quotes".to_string());
    }
    Ok(s.len())
}

fn translate_step(step: &str) -> Result<String, String> {
    let (name, predicates) = match step.find('[') {
        Some(i) => (&step[..i], &step[i..]),
        None => (step, ""),
    };
    let name = name.trim();

    if name.is_empty() {
        return Err("missing node test".to_string());
    }
    if name.contains("::") {
        return Err(format!("axis '{}' is not supported", name));
    }
    if name.ends_with(')') || name == "." || name == ".." || name.starts_with('@') {
        return Err(format!("node test '{}' has no CSS equivalent", name));
    }
    if name != "*" && !is_name(name) {
        return Err(format!("invalid element name '{}'", name));
    }

    let mut css = String::new();
    let mut suffix = String::new();
    for predicate in split_predicates(predicates)? {
        suffix.push_str(&translate_predicate(predicate.trim(), name)?);
    }

    if name != "*" {
        css.push_str(name);
    } else if suffix.is_empty() {
        css.push('*');
    }
    css.push_str(&suffix);
    Ok(css)
}

/// Split `[a][b]` into `["a", "b"]`.
fn split_predicates(s: &str) -> Result<Vec<&str>, String> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut quote: Option<char> = None;
    for (i, c) in s.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '[') => {
                if depth == 0 {
                    start = i + 1;
                }
                depth += 1;
            }
            (None, ']') => {
                depth = depth.checked_sub(1).ok_or("unbalanced brackets")?;
                if depth == 0 {
                    out.push(&s[start..i]);
                }
            }
            (None, c) if depth == 0 && !c.is_whitespace() => {
                return Err(format!("unexpected '{}' after node test", c));
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err("unbalanced brackets".to_string());
    }
    Ok(out)
}

fn translate_predicate(predicate: &str, element: &str) -> Result<String, String> {
    if let Ok(n) = predicate.parse::<u32>() {
        return Ok(if element == "*" {
            format!(":nth-child({})", n)
        } else {
            format!(":nth-of-type({})", n)
        });
    }
    if predicate == "last()" {
        return Ok(if element == "*" {
            ":last-child".to_string()
        } else {
            ":last-of-type".to_string()
        });
    }

    let mut css = String::new();
    for term in split_keyword(predicate, " and ") {
        css.push_str(&translate_term(term.trim())?);
    }
    Ok(css)
}

fn translate_term(term: &str) -> Result<String, String> {
    if let Some(args) = function_args(term, "contains") {
        let (attr, value) = attribute_and_literal(args)?;
        return Ok(format!("[{}*=\"{}\"]", attr, escape(&value)));
    }
    if let Some(args) = function_args(term, "starts-with") {
        let (attr, value) = attribute_and_literal(args)?;
        return Ok(format!("[{}^=\"{}\"]", attr, escape(&value)));
    }

    let Some(attr_expr) = term.strip_prefix('@') else {
        return Err(format!("predicate '{}' is not supported", term));
    };

    match attr_expr.split_once('=') {
        None => {
            let attr = attr_expr.trim();
            if !is_name(attr) {
                return Err(format!("invalid attribute name '{}'", attr));
            }
            Ok(format!("[{}]", attr))
        }
        Some((attr, literal)) => {
            let attr = attr.trim();
            if attr.ends_with('!') || !is_name(attr) {
                return Err(format!("comparison '{}' is not supported", term));
            }
            let value = parse_literal(literal.trim())?;
            Ok(match attr {
                "id" if is_identifier(&value) => format!("#{}", value),
                "class" if is_identifier(&value) => format!(".{}", value),
                _ => format!("[{}=\"{}\"]", attr, escape(&value)),
            })
        }
    }
}

/// `name(args)` → `args`.
fn function_args<'a>(term: &'a str, name: &str) -> Option<&'a str> {
    term.strip_prefix(name)?
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')
}

fn attribute_and_literal(args: &str) -> Result<(String, String), String> {
    let parts = split_top_level(args, ',');
    let [attr, literal] = parts.as_slice() else {
        return Err(format!("expected two arguments in '{}'", args));
    };
    let attr = attr
        .trim()
        .strip_prefix('@')
        .filter(|a| is_name(a))
        .ok_or_else(|| format!("first argument of '{}' must be an attribute", args))?;
    Ok((attr.to_string(), parse_literal(literal.trim())?))
}

fn parse_literal(s: &str) -> Result<String, String> {
    for q in ['\'', '"'] {
        if let Some(inner) = s.strip_prefix(q).and_then(|r| r.strip_suffix(q)) {
            if !inner.contains(q) {
                return Ok(inner.to_string());
            }
        }
    }
    Err(format!("expected a string literal, got '{}'", s))
}

/// Split on `sep` outside quotes and brackets.
fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '[' | '(') => depth += 1,
            (None, ']' | ')') => depth -= 1,
            (None, c) if c == sep && depth == 0 => {
                out.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    out.push(&s[start..]);
    out
}

/// Split on a keyword such as ` and ` outside quotes and brackets.
fn split_keyword<'a>(s: &'a str, keyword: &str) -> Vec<&'a str> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    let mut i = 0;
    while i < s.len() {
        let c = s[i..].chars().next().unwrap_or(' ');
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '[' | '(') => depth += 1,
            (None, ']' | ')') => depth -= 1,
            (None, _) if depth == 0 && s[i..].starts_with(keyword) => {
                out.push(&s[start..i]);
                i += keyword.len();
                start = i;
                continue;
            }
            _ => {}
        }
        i += c.len_utf8();
    }
    out.push(&s[start..]);
    out
}

fn is_name(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
}

/// Safe to emit after `#` or `.` without escaping.
fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '-')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
