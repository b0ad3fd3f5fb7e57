//! Argument checks
//!
//! Walks the raw text of one argument, tracking quotes, and reports
//! malformed variable syntax, out-of-range numeric escapes, unbalanced
//! brackets and errors inside command substitutions.

use super::{analyze_substitution, Analysis};
use crate::parser::lexer::tok_first;

pub const ERROR_NOT_STATUS: &str = "$? is not the exit status. In fish, please use $status.";
pub const ERROR_NOT_PID: &str = "$$ is not the pid. In fish, please use %self.";
pub const ERROR_NOT_ARGV_COUNT: &str = "$# is not supported. In fish, please use 'count $argv'.";
pub const ERROR_NOT_ARGV_AT: &str = "$@ is not supported. In fish, please use $argv.";
pub const ERROR_NOT_ARGV_STAR: &str = "$* is not supported. In fish, please use $argv.";
pub const ERROR_NO_VAR_NAME: &str = "Expected a variable name after this $.";
pub const ERROR_MISMATCHED_PAREN: &str = "Mismatched parenthesis";
pub const ERROR_UNCLOSED_BRACE: &str = "Unexpected end of string, incomplete brace expansion";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    None,
    Single,
    Double,
}

fn is_var_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Check one argument whose text starts at `offset` in the buffer
pub(crate) fn check_argument(arg: &str, offset: usize, depth: usize, analysis: &mut Analysis) {
    let chars: Vec<(usize, char)> = arg.char_indices().collect();
    let mut quote = Quote::None;
    let mut open_braces: Vec<usize> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];
        match quote {
            Quote::Single => {
                if c == '\'' {
                    quote = Quote::None;
                }
                i += 1;
            }
            Quote::Double => match c {
                '"' => {
                    quote = Quote::None;
                    i += 1;
                }
                '\\' => i += 2,
                '$' => i = check_variable(arg, &chars, i, true, offset, analysis),
                _ => i += 1,
            },
            Quote::None => match c {
                '\\' => i = check_escape(arg, &chars, i, offset, analysis),
                '\'' => {
                    quote = Quote::Single;
                    i += 1;
                }
                '"' => {
                    quote = Quote::Double;
                    i += 1;
                }
                '$' => i = check_variable(arg, &chars, i, false, offset, analysis),
                '(' => match matching_paren(&chars, i) {
                    Some(close) => {
                        let inner_start = pos + 1;
                        let inner = &arg[inner_start..chars[close].0];
                        analysis.merge(analyze_substitution(inner, depth + 1), offset + inner_start);
                        i = close + 1;
                    }
                    None => {
                        analysis.error(offset + pos, 1, ERROR_MISMATCHED_PAREN);
                        return;
                    }
                },
                ')' => {
                    analysis.error(offset + pos, 1, ERROR_MISMATCHED_PAREN);
                    i += 1;
                }
                '{' => {
                    open_braces.push(pos);
                    i += 1;
                }
                '}' => {
                    open_braces.pop();
                    i += 1;
                }
                _ => i += 1,
            },
        }
    }

    if let Some(&pos) = open_braces.first() {
        analysis.error(offset + pos, 1, ERROR_UNCLOSED_BRACE);
    }
}

/// Index of the `)` closing the `(` at `open`, skipping quoted text
fn matching_paren(chars: &[(usize, char)], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote = Quote::None;
    let mut i = open;
    while i < chars.len() {
        let c = chars[i].1;
        match (quote, c) {
            (Quote::Single, '\'') | (Quote::Double, '"') => quote = Quote::None,
            (Quote::Single, _) => {}
            (_, '\\') => i += 1,
            (Quote::Double, _) => {}
            (Quote::None, '\'') => quote = Quote::Single,
            (Quote::None, '"') => quote = Quote::Double,
            (Quote::None, '(') => depth += 1,
            (Quote::None, ')') => {
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

/// Validate the `$` at index `i`; returns the index to resume at
fn check_variable(
    arg: &str,
    chars: &[(usize, char)],
    i: usize,
    quoted: bool,
    offset: usize,
    analysis: &mut Analysis,
) -> usize {
    let mut end = i;
    while chars.get(end).map(|c| c.1) == Some('$') {
        end += 1;
    }
    if chars.get(end).map_or(false, |c| is_var_char(c.1)) {
        return end;
    }

    // Describe the problem from the character after the first dollar
    let text = match chars.get(i + 1).map(|c| c.1) {
        None | Some('"') | Some('\'') => ERROR_NO_VAR_NAME.to_string(),
        Some('?') => ERROR_NOT_STATUS.to_string(),
        Some('$') => ERROR_NOT_PID.to_string(),
        Some('#') => ERROR_NOT_ARGV_COUNT.to_string(),
        Some('@') => ERROR_NOT_ARGV_AT.to_string(),
        Some('*') => ERROR_NOT_ARGV_STAR.to_string(),
        Some('{') => bracketed_variable_message(chars, i + 2, quoted),
        Some('(') => {
            let body_start = chars[i + 1].0 + 1;
            let body_end = matching_paren(chars, i + 1).map_or(arg.len(), |close| chars[close].0);
            format!(
                "$(...) is not supported. In fish, please use '({})'.",
                tok_first(&arg[body_start..body_end])
            )
        }
        Some(c) => format!("${} is not a valid variable in fish.", c),
    };
    analysis.error(offset + chars[i].0, 1, text);
    end
}

fn bracketed_variable_message(chars: &[(usize, char)], name_start: usize, quoted: bool) -> String {
    let name: String = chars
        .iter()
        .skip(name_start)
        .map(|c| c.1)
        .take_while(|c| is_var_char(*c))
        .collect();
    let closed = chars.get(name_start + name.chars().count()).map(|c| c.1) == Some('}');
    if name.is_empty() || !closed {
        return "${ is not a valid variable in fish.".to_string();
    }
    if quoted {
        format!("Variables cannot be bracketed. In fish, please use \"${}\".", name)
    } else {
        format!("Variables cannot be bracketed. In fish, please use {{${}}}.", name)
    }
}

/// Validate the unquoted escape at index `i`; returns the index to resume at
fn check_escape(
    arg: &str,
    chars: &[(usize, char)],
    i: usize,
    offset: usize,
    analysis: &mut Analysis,
) -> usize {
    let next = match chars.get(i + 1) {
        Some(&(_, c)) => c,
        None => return i + 1,
    };
    let (digits_start, radix, max_digits, max_value) = match next {
        'x' => (i + 2, 16, 2, 0x7F),
        'X' => (i + 2, 16, 2, 0xFF),
        'u' => (i + 2, 16, 4, 0xFFFF),
        'U' => (i + 2, 16, 8, 0x10FFFF),
        '0'..='7' => (i + 1, 8, 3, 0x7F),
        _ => return i + 2,
    };

    let mut value: u32 = 0;
    let mut end = digits_start;
    while end < chars.len() && end - digits_start < max_digits {
        match chars[end].1.to_digit(radix) {
            Some(digit) => value = value * radix + digit,
            None => break,
        }
        end += 1;
    }

    let no_digits = end == digits_start;
    if no_digits || value > max_value {
        let start = chars[i].0;
        let stop = chars.get(end).map_or(arg.len(), |c| c.0);
        analysis.error(
            offset + start,
            stop - start,
            format!("Invalid escape sequence '{}'", &arg[start..stop]),
        );
    }
    end
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(arg: &str) -> Analysis {
        let mut analysis = Analysis::default();
        check_argument(arg, 0, 0, &mut analysis);
        analysis
    }

    fn messages(arg: &str) -> Vec<String> {
        check(arg).errors.into_iter().map(|e| e.text).collect()
    }

    #[test]
    fn test_valid_arguments() {
        for arg in [
            "foo",
            "$foo",
            "$$foo",
            "\"$foo\"",
            "'$$'",
            "'\\xFF'",
            "{a,b}",
            "\\x41",
            "\\XFF",
            "\\u00e9",
            "\\$",
            "(echo hi)",
            "\"(\"",
            "$foo[1]",
        ] {
            assert!(check(arg).flags.is_empty(), "{}: {:?}", arg, check(arg).errors);
        }
    }

    #[test]
    fn test_escapes() {
        assert_eq!(messages("\\x80"), vec!["Invalid escape sequence '\\x80'"]);
        assert!(check("\\777").has_error());
        assert!(check("\\U110000").has_error());
        assert!(!check("\\U10FFFF").has_error());
        assert_eq!(messages("\\xg"), vec!["Invalid escape sequence '\\x'"]);

        let analysis = check("ab\\xFF9");
        assert_eq!(analysis.errors[0].source_start, 2);
        assert_eq!(analysis.errors[0].source_length, 4);
    }

    #[test]
    fn test_variables() {
        assert_eq!(messages("$?"), vec![ERROR_NOT_STATUS]);
        assert_eq!(messages("foo$$"), vec![ERROR_NOT_PID]);
        assert_eq!(messages("$"), vec![ERROR_NO_VAR_NAME]);
        assert_eq!(messages("$-"), vec!["$- is not a valid variable in fish."]);
        assert_eq!(messages("\"${x}\""), vec!["Variables cannot be bracketed. In fish, please use \"$x\"."]);
    }

    #[test]
    fn test_brackets() {
        assert_eq!(messages("{a,b"), vec![ERROR_UNCLOSED_BRACE]);
        assert_eq!(messages("(echo"), vec![ERROR_MISMATCHED_PAREN]);
        assert_eq!(messages("a)"), vec![ERROR_MISMATCHED_PAREN]);
        assert!(check("'{'").flags.is_empty());
    }

    #[test]
    fn test_substitution_offsets() {
        let mut analysis = Analysis::default();
        check_argument("x(echo $$)", 10, 0, &mut analysis);
        assert_eq!(analysis.errors.len(), 1);
        assert_eq!(analysis.errors[0].source_start, 17);

        let nested = check("(echo (cat | and cat))");
        assert_eq!(nested.errors.len(), 1);
        assert_eq!(nested.errors[0].source_start, 13);
    }

    #[test]
    fn test_unclosed_block_in_substitution_is_error() {
        let analysis = check("(begin; echo)");
        assert!(analysis.has_error());
        assert!(!analysis.is_incomplete());
    }
}
