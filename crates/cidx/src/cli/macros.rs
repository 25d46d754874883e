//! `cidx macro` command implementation.

use std::path::Path;

use cidx::Cidx;
use colored::Colorize;

use super::display::{location, print_empty_index_hint};

/// Show a macro's definition, or its expansion when arguments are given.
pub fn run(workspace: &Path, name: &str, args: &[String]) -> Result<(), cidx::Error> {
    let cidx = Cidx::open(workspace)?;

    let Some(mac) = cidx.get_macro_definition(name)? else {
        println!("No macro named \"{}\"", name.cyan());
        return print_empty_index_hint(&cidx);
    };

    let params = mac
        .params
        .as_ref()
        .map(|p| format!("({})", p.join(", ")))
        .unwrap_or_default();
    let origin = match &mac.file_path {
        Some(path) => location(path, mac.line),
        None => "<builtin>".dimmed().to_string(),
    };
    println!("#define {}{params} {}  {origin}", mac.name.cyan().bold(), mac.definition);

    if args.is_empty() {
        return Ok(());
    }

    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let Some(expansion) = cidx.expand_macro(name, &args)? else {
        let expected = mac.params.as_ref().map_or(0, Vec::len);
        return Err(cidx::Error::Config(format!(
            "macro {name} takes {expected} arguments, got {}",
            args.len()
        )));
    };
    println!("{} {expansion}", "→".green().bold());
    Ok(())
}
