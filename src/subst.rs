//! The per-line substitution passes, in application order: history recall on
//! the raw line, assignment extraction, `$name` expansion, alias expansion of
//! the command name.

use crate::session::{HistoryLog, Session};

/// Resolve a `!!` or `!N` prefix against the history log.
///
/// The recalled entry replaces the entire line; anything after the reference
/// is dropped. A reference that cannot be resolved (empty history, index out
/// of range, bare `!`) leaves the line untouched, so it will be executed and
/// recorded literally.
pub fn substitute_history(line: &str, history: &HistoryLog) -> String {
    let Some(rest) = line.strip_prefix('!') else {
        return line.to_owned();
    };
    if rest.starts_with('!') {
        return history.last().unwrap_or(line).to_owned();
    }
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return line.to_owned();
    }
    match digits.parse::<usize>().ok().and_then(|n| history.get(n)) {
        Some(entry) => entry.to_owned(),
        None => line.to_owned(),
    }
}

/// Strip the leading run of `name=value` tokens, committing each to the
/// shell-local table.
///
/// The first token without `=` ends the run; later `=`-bearing tokens are
/// ordinary arguments, so `alias ll=ls` keeps its argument. Assignments
/// commit immediately even if the rest of the line fails later. The split is
/// at the first `=`, so the value may itself contain `=`.
pub fn extract_assignments(mut tokens: Vec<String>, session: &mut Session) -> Vec<String> {
    let mut taken = 0;
    for token in &tokens {
        let Some((name, value)) = token.split_once('=') else {
            break;
        };
        session.set_local(name, value);
        taken += 1;
    }
    tokens.drain(..taken);
    tokens
}

/// Expand whole-token `$name` forms.
///
/// Lookup order is environment, then shell-locals, then the empty string; an
/// unknown name leaves an empty token in place. A `$` inside a larger token
/// has no meaning.
pub fn substitute_vars(tokens: Vec<String>, session: &Session) -> Vec<String> {
    tokens
        .into_iter()
        .map(|token| match token.strip_prefix('$') {
            Some(name) => session.lookup_var(name),
            None => token,
        })
        .collect()
}

/// One-level alias expansion of the command-name token.
///
/// The replacement becomes token 0 as a single token; it is not re-tokenized
/// and not itself looked up again.
pub fn substitute_alias(mut tokens: Vec<String>, session: &Session) -> Vec<String> {
    if let Some(first) = tokens.first_mut() {
        if let Some(replacement) = session.aliases.get(first.as_str()) {
            *first = replacement.clone();
        }
    }
    tokens
}
