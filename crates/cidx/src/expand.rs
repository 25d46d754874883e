//! Textual macro expansion: parameter substitution only.
//!
//! No rescanning, stringizing or pasting. `#` and `##` are left in place.

use crate::frontend::lex::{TokenKind, tokenize};
use crate::types::Macro;

const VA_ARGS: &str = "__VA_ARGS__";

/// Substitute `args` into a macro's replacement list.
///
/// Object-like macros expand to their definition whatever the arguments.
/// A function-like macro called with no arguments also expands to its bare
/// definition. Otherwise the argument count must match the parameters
/// (or cover them, when the body uses `__VA_ARGS__`), or `None` is returned.
#[must_use]
pub fn expand(mac: &Macro, args: &[&str]) -> Option<String> {
    if !mac.is_function_like || args.is_empty() {
        return Some(mac.definition.clone());
    }

    let params = mac.params.as_deref().unwrap_or_default();
    let tokens = tokenize(&mac.definition);
    let variadic = tokens
        .iter()
        .any(|t| t.kind == TokenKind::Identifier && t.spelling == VA_ARGS);
    let count_ok = if variadic {
        args.len() >= params.len()
    } else {
        args.len() == params.len()
    };
    if !count_ok {
        return None;
    }

    let rest = args.get(params.len()..).unwrap_or_default().join(", ");
    let mut out = String::with_capacity(mac.definition.len());
    let mut copied = 0;
    for token in &tokens {
        if token.kind != TokenKind::Identifier {
            continue;
        }
        let replacement = if variadic && token.spelling == VA_ARGS {
            Some(rest.as_str())
        } else {
            params
                .iter()
                .position(|p| *p == token.spelling)
                .map(|i| args[i])
        };
        if let Some(replacement) = replacement {
            out.push_str(&mac.definition[copied..token.start]);
            out.push_str(replacement);
            copied = token.end;
        }
    }
    out.push_str(&mac.definition[copied..]);
    Some(out)
}
