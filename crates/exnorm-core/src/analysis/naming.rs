//! Identifier conventions of the target language.

/// Characters that may appear inside an identifier token.
pub fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// `_name` marks an intentionally unused binder. A lone `_` is the wildcard
/// and carries no name.
pub fn is_underscored(name: &str) -> bool {
    name.len() > 1 && name.starts_with('_')
}

/// Name with the unused marker added (idempotent).
pub fn underscored(name: &str) -> String {
    if name.starts_with('_') {
        name.to_string()
    } else {
        format!("_{}", name)
    }
}

/// Name with every leading unused marker removed.
pub fn strip_underscore(name: &str) -> &str {
    let stripped = name.trim_start_matches('_');
    if stripped.is_empty() {
        name
    } else {
        stripped
    }
}

/// A variable name the target language accepts without complaint:
/// lowercase first letter (after optional markers), identifier characters
/// only.
pub fn is_valid_variable_name(name: &str) -> bool {
    let body = name.trim_start_matches('_');
    let Some(first) = body.chars().next() else {
        return !name.is_empty();
    };
    let first_ok = first.is_ascii_lowercase() || (first.is_ascii_digit() && body.len() < name.len());
    first_ok
        && body
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// `fooBar` -> `foo_bar`, `HTTPServer` -> `http_server`, `Count` -> `count`.
/// Leading markers are preserved.
pub fn to_snake_case(name: &str) -> String {
    let prefix_len = name.len() - name.trim_start_matches('_').len();
    let (prefix, body) = name.split_at(prefix_len);
    let chars: Vec<char> = body.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    out.push_str(prefix);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() {
            let prev = if i > 0 { Some(chars[i - 1]) } else { None };
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                None => false,
                Some(p) if p == '_' => false,
                Some(p) if p.is_ascii_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_ascii_uppercase() => next.is_some_and(|n| n.is_ascii_lowercase()),
                Some(_) => false,
            };
            if boundary {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Identifier tokens of `text`: maximal runs of identifier characters that
/// do not start with a digit.
pub fn identifier_tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !is_ident_char(c))
        .filter(|tok| !tok.is_empty() && !tok.starts_with(|c: char| c.is_ascii_digit()))
}

/// Whether `name` occurs in `text` as a whole token, i.e. not flanked by
/// identifier characters on either side.
pub fn contains_token(text: &str, name: &str) -> bool {
    identifier_tokens(text).any(|tok| tok == name)
}

/// Replace every whole-token occurrence of `from` in `text` with `to`.
pub fn replace_token(text: &str, from: &str, to: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut token = String::new();
    let flush = |token: &mut String, out: &mut String| {
        if token.as_str() == from {
            out.push_str(to);
        } else {
            out.push_str(token);
        }
        token.clear();
    };
    for c in text.chars() {
        if is_ident_char(c) {
            token.push(c);
        } else {
            flush(&mut token, &mut out);
            out.push(c);
        }
    }
    flush(&mut token, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_underscore_helpers() {
        assert!(is_underscored("_x"));
        assert!(!is_underscored("_"));
        assert!(!is_underscored("x"));
        assert_eq!(underscored("x"), "_x");
        assert_eq!(underscored("_x"), "_x");
        assert_eq!(strip_underscore("__x"), "x");
        assert_eq!(strip_underscore("_"), "_");
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(to_snake_case("fooBar"), "foo_bar");
        assert_eq!(to_snake_case("HTTPServer"), "http_server");
        assert_eq!(to_snake_case("Count"), "count");
        assert_eq!(to_snake_case("_tmpValue"), "_tmp_value");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
        assert_eq!(to_snake_case("item2Name"), "item2_name");
    }

    #[test]
    fn test_valid_variable_names() {
        assert!(is_valid_variable_name("count"));
        assert!(is_valid_variable_name("_count"));
        assert!(is_valid_variable_name("item2"));
        assert!(!is_valid_variable_name("Count"));
        assert!(!is_valid_variable_name("myVar"));
    }

    #[test]
    fn test_token_boundaries() {
        assert!(contains_token("foo(value, 1)", "value"));
        assert!(!contains_token("foo(values)", "value"));
        assert!(!contains_token("my_value", "value"));
        assert!(!contains_token("value2", "value"));
    }

    #[test]
    fn test_replace_token() {
        assert_eq!(
            replace_token("f(_v, _values) + _v", "_v", "v"),
            "f(v, _values) + v"
        );
    }
}
