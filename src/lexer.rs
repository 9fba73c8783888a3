//! Whitespace tokenization of a raw input line.

use crate::error::ShellError;

/// Characters with quoting meaning in other shells; here they are simply
/// disallowed, so a token containing one rejects the whole line.
const QUOTE_CHARS: &[char] = &['"', '\'', '`'];

/// Split `line` on runs of whitespace.
///
/// There is no escaping and no grouping: a pipe, redirect or `=` inside a
/// larger token (e.g. `foo=bar`) stays part of that token and only the later
/// whole-token passes give it meaning.
pub fn tokenize(line: &str) -> Result<Vec<String>, ShellError> {
    let tokens: Vec<String> = line.split_whitespace().map(str::to_owned).collect();
    if tokens.iter().any(|token| token.contains(QUOTE_CHARS)) {
        return Err(ShellError::QuoteNotAllowed);
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_whitespace_runs() {
        let tokens = tokenize("echo   hello\tworld").unwrap();
        assert_eq!(tokens, vec!["echo", "hello", "world"]);
    }

    #[test]
    fn empty_and_blank_lines_yield_no_tokens() {
        assert!(tokenize("").unwrap().is_empty());
        assert!(tokenize("   \t  ").unwrap().is_empty());
    }

    #[test]
    fn operators_are_plain_tokens() {
        let tokens = tokenize("cat a.txt | wc > out").unwrap();
        assert_eq!(tokens, vec!["cat", "a.txt", "|", "wc", ">", "out"]);
    }

    #[test]
    fn assignment_stays_one_token() {
        let tokens = tokenize("X=5 echo $X").unwrap();
        assert_eq!(tokens, vec!["X=5", "echo", "$X"]);
    }

    #[test]
    fn rejects_each_quote_character() {
        for line in ["echo \"hi\"", "echo 'hi'", "echo `hi`"] {
            assert!(matches!(tokenize(line), Err(ShellError::QuoteNotAllowed)));
        }
    }

    #[test]
    fn rejects_quote_inside_a_larger_token() {
        assert!(matches!(
            tokenize("echo don't"),
            Err(ShellError::QuoteNotAllowed)
        ));
    }
}
