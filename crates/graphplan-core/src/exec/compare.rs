//! Value comparison shared by the executor and the materializer.

use std::cmp::Ordering;

use graphplan_proto::Value;

/// Total order for sorting. NULLs sort first; integers and floats compare
/// numerically; values of unrelated types compare equal.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
        (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
        (Value::Uuid(a), Value::Uuid(b)) => a.cmp(b),
        (a, b) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => match (a.as_f64(), b.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            },
        },
    }
}

/// SQL equality: `None` when either side is NULL or the types are not
/// comparable.
pub fn values_equal(a: &Value, b: &Value) -> Option<bool> {
    if a.is_null() || b.is_null() {
        return None;
    }
    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => Some(a == b),
        (Value::String(a), Value::String(b)) => Some(a == b),
        (Value::Bytes(a), Value::Bytes(b)) => Some(a == b),
        (Value::Timestamp(a), Value::Timestamp(b)) => Some(a == b),
        (Value::Uuid(a), Value::Uuid(b)) => Some(a == b),
        (a, b) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => Some(a == b),
            _ => match (a.as_f64(), b.as_f64()) {
                (Some(a), Some(b)) => Some(a == b),
                _ => None,
            },
        },
    }
}

/// Match a string against a LIKE pattern.
///
/// `%` matches any run of characters, `_` exactly one, and a backslash
/// escapes the next pattern character.
pub fn like_match(value: &str, pattern: &str) -> bool {
    let text: Vec<char> = value.chars().collect();
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '%' => Token::Any,
            '_' => Token::One,
            '\\' => Token::Char(chars.next().unwrap_or('\\')),
            c => Token::Char(c),
        });
    }

    // Greedy match with backtracking to the last `%`.
    let (mut t, mut p) = (0, 0);
    let mut resume: Option<(usize, usize)> = None;
    while t < text.len() {
        match tokens.get(p) {
            Some(Token::Any) => {
                resume = Some((p, t));
                p += 1;
            }
            Some(Token::One) => {
                t += 1;
                p += 1;
            }
            Some(Token::Char(c)) if *c == text[t] => {
                t += 1;
                p += 1;
            }
            _ => match resume {
                Some((star, matched)) => {
                    p = star + 1;
                    t = matched + 1;
                    resume = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }
    tokens[p..].iter().all(|token| matches!(token, Token::Any))
}

#[derive(Clone, Copy)]
enum Token {
    Any,
    One,
    Char(char),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_values() {
        assert_eq!(compare_values(&Value::Int32(1), &Value::Int64(2)), Ordering::Less);
        assert_eq!(compare_values(&Value::Int32(2), &Value::Float64(1.5)), Ordering::Greater);
        assert_eq!(compare_values(&Value::Null, &Value::Int32(0)), Ordering::Less);
        assert_eq!(compare_values(&Value::from("b"), &Value::from("a")), Ordering::Greater);
        assert_eq!(compare_values(&Value::from("a"), &Value::Int32(1)), Ordering::Equal);
    }

    #[test]
    fn test_values_equal() {
        assert_eq!(values_equal(&Value::Int32(1), &Value::Int64(1)), Some(true));
        assert_eq!(values_equal(&Value::Int32(1), &Value::Float64(1.0)), Some(true));
        assert_eq!(values_equal(&Value::from("a"), &Value::from("b")), Some(false));
        assert_eq!(values_equal(&Value::Null, &Value::Null), None);
        assert_eq!(values_equal(&Value::from("1"), &Value::Int32(1)), None);
    }

    #[test]
    fn test_like_match() {
        assert!(like_match("hello", "hello"));
        assert!(like_match("hello", "h%"));
        assert!(like_match("hello", "%llo"));
        assert!(like_match("hello", "h_llo"));
        assert!(like_match("hello", "%"));
        assert!(like_match("", "%"));
        assert!(like_match("abcabd", "%ab_"));
        assert!(like_match("50%", "50\\%"));
        assert!(!like_match("500", "50\\%"));
        assert!(!like_match("hello", "h_lo"));
        assert!(!like_match("hello", "world"));
    }
}
