//! `cidx typedef`, `fields` and `enum` command implementations.

use std::path::Path;

use cidx::{Cidx, UsageSite};
use colored::Colorize;

use super::display::{location, print_empty_index_hint};

const MAX_USAGES: usize = 20;

/// Show a type, the type its typedef chain ends at, and where it is used.
pub fn typedef(workspace: &Path, name: &str) -> Result<(), cidx::Error> {
    let cidx = Cidx::open(workspace)?;

    let Some(def) = cidx.get_type_definition(name)? else {
        println!("No type named \"{}\"", name.cyan());
        return print_empty_index_hint(&cidx);
    };

    println!(
        "{} {}  {}",
        def.kind.as_str().dimmed(),
        def.symbol.name.cyan().bold(),
        location(&def.symbol.file_path, def.symbol.line)
    );
    if let Some(underlying) = &def.underlying_type {
        println!("  {}: {underlying}", "Underlying".white().bold());
    }
    let resolved = cidx
        .resolve_typedef(name)?
        .filter(|r| def.underlying_type.as_deref() != Some(r.as_str()));
    if let Some(resolved) = resolved {
        println!("  {}: {resolved}", "Resolves to".white().bold());
    }
    if let Some(size) = def.size_bytes {
        let align = def
            .alignment
            .map(|a| format!(", align {a}"))
            .unwrap_or_default();
        println!("  {}: {size} bytes{align}", "Size".white().bold());
    }

    let usages = cidx.find_type_usage(name)?;
    if !usages.is_empty() {
        println!();
        println!("{} ({}):", "Used by".white().bold(), usages.len());
        for usage in usages.iter().take(MAX_USAGES) {
            let site = match usage.site {
                UsageSite::Reference => "reference",
                UsageSite::Variable => "variable",
                UsageSite::Parameter => "parameter",
                UsageSite::Field => "field",
            };
            let owner = usage
                .owner
                .as_deref()
                .map(|o| format!(" in {o}"))
                .unwrap_or_default();
            println!(
                "  {} {} {}{owner}  {}",
                "•".dimmed(),
                site.dimmed(),
                usage.name,
                location(&usage.file_path, usage.line)
            );
        }
        if usages.len() > MAX_USAGES {
            println!("  ... and {} more", usages.len() - MAX_USAGES);
        }
    }

    Ok(())
}

/// Show the members of a struct or union.
pub fn fields(workspace: &Path, name: &str) -> Result<(), cidx::Error> {
    let cidx = Cidx::open(workspace)?;
    let fields = cidx.get_struct_fields(name)?;

    if fields.is_empty() {
        println!("No struct or union members found for \"{}\"", name.cyan());
        return print_empty_index_hint(&cidx);
    }

    println!("Members of \"{}\":", name.cyan().bold());
    for field in &fields {
        let offset = match (field.offset_bytes(), field.offset_bits) {
            (Some(bytes), _) if !field.is_bitfield => format!("+{bytes}"),
            (_, Some(bits)) => format!("+{bits}b"),
            _ => "?".to_string(),
        };
        let width = field
            .bitfield_width
            .map(|w| format!(" : {w}"))
            .unwrap_or_default();
        println!(
            "  {}  {} {}{width}",
            format!("{offset:>6}").dimmed(),
            field.type_name.dimmed(),
            field.name
        );
    }
    Ok(())
}

/// Show the constants of an enum.
pub fn enum_values(workspace: &Path, name: &str) -> Result<(), cidx::Error> {
    let cidx = Cidx::open(workspace)?;
    let values = cidx.get_enum_values(name)?;

    if values.is_empty() {
        println!("No enum constants found for \"{}\"", name.cyan());
        return print_empty_index_hint(&cidx);
    }

    println!("Values of \"{}\":", name.cyan().bold());
    for constant in &values {
        println!("  {} = {}", constant.name, constant.value.to_string().green());
    }
    Ok(())
}
