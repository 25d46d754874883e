//! Macro definitions and include directives from the preprocessing record.

use super::Walker;
use crate::compile_db::CompileCommand;
use crate::db::{IncludeData, MacroData};
use crate::frontend::lex::{Token, TokenKind};
use crate::frontend::MacroDefinition;

impl Walker<'_> {
    pub(super) fn extract_macros(&mut self) {
        let tu = self.tu;
        for def in tu.macro_definitions() {
            if !tu.is_main_file(&def.location) {
                continue;
            }
            self.out.macros.push(macro_data(def));
        }
    }

    /// `-D` definitions of the compile command, stored without a file.
    pub(super) fn extract_builtin_macros(&mut self, command: &CompileCommand) {
        for (name, value) in command.defines() {
            self.out.macros.push(MacroData {
                name,
                line: 0,
                definition: value,
                is_function_like: false,
                params: None,
                is_builtin: true,
            });
        }
    }

    pub(super) fn extract_includes(&mut self) {
        let tu = self.tu;
        for directive in tu.inclusion_directives() {
            if !tu.is_main_file(&directive.location) {
                continue;
            }
            let resolved_path = directive
                .resolved
                .as_ref()
                .map(|p| p.display().to_string());
            let is_system = directive.in_system_dir
                || resolved_path
                    .as_deref()
                    .map_or(directive.is_angled, |p| p.contains("/usr/"));
            self.out.includes.push(IncludeData {
                included_path: directive.spelling.clone(),
                resolved_path,
                line: directive.location.line,
                is_system,
            });
        }
    }
}

fn macro_data(def: &MacroDefinition) -> MacroData {
    let tokens = &def.tokens;
    let name_end = tokens.first().map_or(0, |t| t.end);
    let is_function_like = tokens
        .get(1)
        .is_some_and(|t| t.spelling == "(" && t.start == name_end);

    let (params, body) = if is_function_like {
        let (params, close) = parameter_list(&tokens[2..]);
        (Some(params), close.map_or(&[][..], |i| &tokens[2 + i + 1..]))
    } else {
        (None, tokens.get(1..).unwrap_or_default())
    };

    MacroData {
        name: def.name.clone(),
        line: def.location.line,
        definition: replacement_text(&def.text, body),
        is_function_like,
        params,
        is_builtin: false,
    }
}

/// Identifiers up to the closing parenthesis, and that parenthesis' index.
fn parameter_list(tokens: &[Token]) -> (Vec<String>, Option<usize>) {
    let mut params = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::Punct if token.spelling == ")" => return (params, Some(i)),
            TokenKind::Identifier => params.push(token.spelling.clone()),
            _ => {}
        }
    }
    (params, None)
}

/// Source text of the replacement list, continuation lines folded into one.
/// Comments around the list are dropped because the slice runs from the
/// first token to the last.
fn replacement_text(text: &str, body: &[Token]) -> String {
    let (Some(first), Some(last)) = (body.first(), body.last()) else {
        return String::new();
    };
    text.get(first.start..last.end)
        .unwrap_or_default()
        .lines()
        .map(|line| line.trim().trim_end_matches('\\').trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
