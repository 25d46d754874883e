//! Integration tests for building an index and querying it.
//!
//! These tests run the full pipeline:
//! compile_commands.json → tree-sitter → extraction → `SQLite` → queries

use std::fs;
use std::path::Path;

use cidx::{Cidx, Definition, ReferenceKind, UsageSite};
use tempfile::TempDir;

/// Create a temporary workspace with the given files and a
/// `compile_commands.json` listing every `.c` file among them.
/// Returns the temp directory (must be kept alive) and the Cidx instance.
fn workspace_with_files(files: &[(&str, &str)]) -> (TempDir, Cidx) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");

    for (path, content) in files {
        let full_path = dir.path().join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent dirs");
        }
        fs::write(&full_path, content).expect("failed to write file");
    }
    write_manifest(dir.path(), files);

    let cidx = Cidx::open(dir.path()).expect("failed to open Cidx");
    (dir, cidx)
}

fn write_manifest(root: &Path, files: &[(&str, &str)]) {
    let entries: Vec<_> = files
        .iter()
        .filter(|(path, _)| path.ends_with(".c"))
        .map(|(path, _)| {
            serde_json::json!({
                "directory": root,
                "file": path,
                "arguments": ["cc", "-c", path, "-DBUF_SIZE=128"],
            })
        })
        .collect();
    fs::write(
        root.join("compile_commands.json"),
        serde_json::to_string_pretty(&entries).expect("serialize manifest"),
    )
    .expect("failed to write compile_commands.json");
}

// ============================================================================
// End-to-end scenarios
// ============================================================================

#[test]
fn function_with_two_parameters() {
    let (_dir, mut cidx) =
        workspace_with_files(&[("add.c", "int add(int a, int b) { return a + b; }\n")]);

    let report = cidx.build().expect("build failed");
    assert_eq!(report.files_processed, 1);
    assert!(report.errors.is_empty(), "unexpected errors: {:?}", report.errors);

    let functions = cidx.find_function("add").expect("query failed");
    assert_eq!(functions.len(), 1);
    assert_eq!(functions[0].return_type, "int");
    assert!(functions[0].symbol.is_definition);

    let params = cidx.get_function_parameters("add").expect("query failed");
    let positions: Vec<(u32, &str)> = params
        .iter()
        .map(|p| (p.position, p.name.as_str()))
        .collect();
    assert_eq!(positions, vec![(0, "a"), (1, "b")]);
    assert!(params.iter().all(|p| p.type_name == "int"));
}

#[test]
fn mutual_recursion_paths_terminate() {
    let (_dir, mut cidx) = workspace_with_files(&[(
        "cycle.c",
        "void b(void);\nvoid a(void) { b(); }\nvoid b(void) { a(); }\n",
    )]);
    cidx.build().expect("build failed");

    let to_b = cidx.find_call_path("a", "b", 5).expect("query failed");
    assert_eq!(to_b, vec![vec!["a".to_string(), "b".to_string()]]);

    let round_trip = cidx.find_call_path("a", "a", 5).expect("query failed");
    assert_eq!(
        round_trip,
        vec![vec!["a".to_string(), "b".to_string(), "a".to_string()]]
    );
}

#[test]
fn typedef_chain_resolves_to_builtin() {
    let (_dir, mut cidx) = workspace_with_files(&[(
        "types.c",
        "typedef unsigned int u32;\ntypedef u32 id_t;\nid_t next_id;\n",
    )]);
    cidx.build().expect("build failed");

    assert_eq!(
        cidx.resolve_typedef("id_t").expect("query failed").as_deref(),
        Some("unsigned int")
    );
    assert_eq!(
        cidx.resolve_typedef("u32").expect("query failed").as_deref(),
        Some("unsigned int")
    );
    assert_eq!(cidx.resolve_typedef("next_id").expect("query failed"), None);
}

#[test]
fn deleted_function_leaves_call_sites_unresolved() {
    let (dir, mut cidx) = workspace_with_files(&[
        (
            "lib.c",
            "int keep(void) { return 1; }\nint drop(void) { return 2; }\n",
        ),
        (
            "main.c",
            "int keep(void);\nint drop(void);\nint main(void) { return keep() + drop(); }\n",
        ),
    ]);
    cidx.build().expect("build failed");

    let before = cidx.get_callers("drop").expect("query failed");
    assert_eq!(before.len(), 1);
    assert!(before[0].callee_id.is_some(), "drop() should be resolved");

    fs::write(dir.path().join("lib.c"), "int keep(void) { return 1; }\n").expect("rewrite lib.c");
    cidx.update(&[dir.path().join("lib.c")]).expect("update failed");

    let definitions: Vec<_> = cidx
        .find_function("drop")
        .expect("query failed")
        .into_iter()
        .filter(|f| f.symbol.is_definition)
        .collect();
    assert!(definitions.is_empty(), "drop's definition should be gone");

    let after = cidx.get_callers("drop").expect("query failed");
    assert_eq!(after.len(), 1, "the call site itself survives");
    assert_eq!(after[0].caller_name, "main");
    assert_eq!(after[0].callee_id, None);

    let keep = cidx.get_callers("keep").expect("query failed");
    assert!(keep[0].callee_id.is_some(), "keep() is relinked to its new row");
}

// ============================================================================
// Functions
// ============================================================================

#[test]
fn locals_documentation_and_source() {
    let source = "\
/**
 * @brief Sum an array.
 * @param[in] values numbers to add
 * @param count how many
 * @return the total
 */
long sum(const int *values, int count)
{
    long total = 0;
    for (int i = 0; i < count; i++) {
        total += values[i];
    }
    return total;
}
";
    let (_dir, mut cidx) = workspace_with_files(&[("sum.c", source)]);
    cidx.build().expect("build failed");

    let locals = cidx.get_function_locals("sum").expect("query failed");
    let names: Vec<&str> = locals.iter().map(|l| l.name.as_str()).collect();
    assert!(names.contains(&"total"));
    assert!(names.contains(&"i"));

    let doc = cidx
        .get_function_doc("sum")
        .expect("query failed")
        .expect("sum is documented");
    assert_eq!(doc.brief.as_deref(), Some("Sum an array."));
    assert_eq!(doc.params.len(), 2);
    assert_eq!(doc.params[0].name, "values");
    assert_eq!(doc.return_doc.as_deref(), Some("the total"));

    let text = cidx
        .extract_function_source("sum")
        .expect("query failed")
        .expect("sum has a body");
    assert!(text.starts_with("long sum(const int *values, int count)"));
    assert!(text.trim_end().ends_with('}'));
}

#[test]
fn function_listing_and_search() {
    let (_dir, mut cidx) = workspace_with_files(&[(
        "alloc.c",
        "void *pool_alloc(int n) { return 0; }\n\
         void pool_free(void *p) { }\n\
         static int helper(void) { return 0; }\n",
    )]);
    cidx.build().expect("build failed");

    let in_file = cidx
        .list_functions_in_file(Path::new("alloc.c"))
        .expect("query failed");
    assert_eq!(in_file.len(), 3);

    let pool: Vec<String> = cidx
        .search_functions("pool_%")
        .expect("query failed")
        .into_iter()
        .map(|f| f.symbol.name)
        .collect();
    assert_eq!(pool.len(), 2);
    assert!(pool.contains(&"pool_alloc".to_string()));
    assert!(pool.contains(&"pool_free".to_string()));

    let helper = cidx.find_function("helper").expect("query failed");
    assert!(helper[0].symbol.is_static);
}

#[test]
fn static_functions_sharing_a_name_all_contribute_callees() {
    let (_dir, mut cidx) = workspace_with_files(&[
        (
            "a.c",
            "static int helper(void) { return 1; }\nint use_a(void) { return helper(); }\n",
        ),
        (
            "b.c",
            "int target(void);\n\
             static int helper(void) { return target(); }\n\
             int use_b(void) { return helper(); }\n",
        ),
        ("t.c", "int target(void) { return 0; }\n"),
    ]);
    cidx.build().expect("build failed");

    let callees: Vec<String> = cidx
        .get_callees("helper")
        .expect("query failed")
        .into_iter()
        .map(|c| c.callee_name)
        .collect();
    assert_eq!(callees, vec!["target"]);

    let paths = cidx.find_call_path("helper", "target", 3).expect("query failed");
    assert_eq!(paths, vec![vec!["helper".to_string(), "target".to_string()]]);

    let tree = cidx
        .get_call_tree("use_b", 2)
        .expect("query failed")
        .expect("use_b exists");
    assert_eq!(tree.calls[0].name, "helper");
    assert_eq!(tree.calls[0].calls[0].name, "target");
}

#[test]
fn call_tree_marks_cycles_as_truncated() {
    let (_dir, mut cidx) = workspace_with_files(&[(
        "tree.c",
        "void leaf(void) { }\n\
         void loop(void);\n\
         void mid(void) { leaf(); loop(); }\n\
         void loop(void) { mid(); }\n\
         void top(void) { mid(); }\n",
    )]);
    cidx.build().expect("build failed");

    let tree = cidx
        .get_call_tree("top", 5)
        .expect("query failed")
        .expect("top exists");
    assert_eq!(tree.name, "top");
    let mid = &tree.calls[0];
    assert_eq!(mid.name, "mid");
    let names: Vec<&str> = mid.calls.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["leaf", "loop"]);
    let back_edge = &mid.calls[1].calls[0];
    assert_eq!(back_edge.name, "mid");
    assert!(back_edge.truncated);

    assert!(cidx.get_call_tree("nowhere", 3).expect("query failed").is_none());
}

// ============================================================================
// Types
// ============================================================================

#[test]
fn struct_fields_through_a_typedef() {
    let (_dir, mut cidx) = workspace_with_files(&[(
        "point.c",
        "typedef struct point {\n    int x;\n    int y;\n    char tag;\n} point_t;\n\
         point_t origin;\n",
    )]);
    cidx.build().expect("build failed");

    let by_tag = cidx.get_struct_fields("point").expect("query failed");
    let by_typedef = cidx.get_struct_fields("point_t").expect("query failed");
    assert_eq!(by_tag, by_typedef);

    let names: Vec<&str> = by_tag.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["x", "y", "tag"]);
    assert_eq!(cidx.get_field_offset("point_t", "y").expect("query failed"), Some(4));
    assert_eq!(cidx.get_field_offset("point_t", "z").expect("query failed"), None);

    let usages = cidx.find_type_usage("point_t").expect("query failed");
    assert!(
        usages
            .iter()
            .any(|u| u.site == UsageSite::Variable && u.name == "origin")
    );
}

#[test]
fn enum_values_with_implicit_increments() {
    let (_dir, mut cidx) = workspace_with_files(&[(
        "color.c",
        "typedef enum color { RED, GREEN = 5, BLUE } color_t;\n",
    )]);
    cidx.build().expect("build failed");

    let values: Vec<(String, i64)> = cidx
        .get_enum_values("color_t")
        .expect("query failed")
        .into_iter()
        .map(|c| (c.name, c.value))
        .collect();
    assert_eq!(
        values,
        vec![
            ("RED".to_string(), 0),
            ("GREEN".to_string(), 5),
            ("BLUE".to_string(), 6)
        ]
    );
}

// ============================================================================
// Macros, references, includes
// ============================================================================

#[test]
fn macros_expand_and_builtins_come_last() {
    let (_dir, mut cidx) = workspace_with_files(&[(
        "macros.c",
        "#define SQUARE(x) ((x) * (x))\n#define LIMIT 64\nint area = SQUARE(LIMIT);\n",
    )]);
    cidx.build().expect("build failed");

    assert_eq!(
        cidx.expand_macro("SQUARE", &["n + 1"]).expect("query failed").as_deref(),
        Some("((n + 1) * (n + 1))")
    );
    assert_eq!(cidx.expand_macro("SQUARE", &["1", "2"]).expect("query failed"), None);
    assert_eq!(
        cidx.expand_macro("LIMIT", &[]).expect("query failed").as_deref(),
        Some("64")
    );

    let builtin = cidx
        .get_macro_definition("BUF_SIZE")
        .expect("query failed")
        .expect("-D defines are recorded");
    assert!(builtin.is_builtin);
    assert_eq!(builtin.definition, "128");
    assert_eq!(builtin.file_path, None);

    let found: Vec<String> = cidx
        .search_macros("%")
        .expect("query failed")
        .into_iter()
        .map(|m| m.name)
        .collect();
    assert!(found.contains(&"SQUARE".to_string()));
    assert!(!found.contains(&"BUF_SIZE".to_string()), "builtins are not searched");
}

#[test]
fn references_are_classified_by_access() {
    let (_dir, mut cidx) = workspace_with_files(&[(
        "counter.c",
        "int counter;\n\
         int peek(void) { return counter; }\n\
         void bump(void) { counter = peek() + 1; int *p = &counter; }\n",
    )]);
    cidx.build().expect("build failed");

    let writes = cidx
        .find_references("counter", Some(ReferenceKind::Write))
        .expect("query failed");
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].context_function.as_deref(), Some("bump"));

    let reads = cidx
        .find_references("counter", Some(ReferenceKind::Read))
        .expect("query failed");
    assert_eq!(reads.len(), 1);
    assert_eq!(reads[0].context_function.as_deref(), Some("peek"));

    let all = cidx.find_references("counter", None).expect("query failed");
    assert_eq!(all.len(), 3);

    let calls = cidx
        .find_references("peek", Some(ReferenceKind::Call))
        .expect("query failed");
    assert_eq!(calls.len(), 1);

    let globals = cidx
        .get_globals_in_file(Path::new("counter.c"))
        .expect("query failed");
    assert_eq!(globals.len(), 1);
    assert_eq!(globals[0].symbol.name, "counter");

    match cidx.find_symbol_definition("counter").expect("query failed") {
        Some(Definition::Symbol(symbol)) => assert_eq!(symbol.line, 1),
        other => panic!("expected a symbol definition, got {other:?}"),
    }
}

#[test]
fn include_graph_queries() {
    let (dir, mut cidx) = workspace_with_files(&[
        ("include/base.h", "typedef int base_t;\n"),
        ("include/util.h", "#include \"base.h\"\nint util(void);\n"),
        ("main.c", "#include \"include/util.h\"\n#include <stdio.h>\nint main(void) { return 0; }\n"),
        ("other.c", "#include \"include/util.h\"\n"),
    ]);
    cidx.build().expect("build failed");

    let direct = cidx
        .get_includes(&dir.path().join("main.c"), false)
        .expect("query failed");
    assert_eq!(direct.len(), 2);
    assert!(direct.iter().any(|h| h.ends_with("util.h")));
    assert!(direct.iter().any(|h| h.ends_with("stdio.h")));

    let mut includers = cidx.get_includers("include/util.h").expect("query failed");
    includers.sort();
    assert_eq!(includers, vec!["main.c".to_string(), "other.c".to_string()]);

    assert!(cidx.get_includers("missing.h").expect("query failed").is_empty());
}
