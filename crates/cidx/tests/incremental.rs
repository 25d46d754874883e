//! Integration tests for incremental updates: staleness, purging, error
//! isolation and the guarantees that hold across re-indexing.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use cidx::{Cidx, Config, FileState, IndexErrorKind};
use proptest::prelude::*;
use tempfile::TempDir;

/// Create a temporary workspace with the given files and a
/// `compile_commands.json` listing every `.c` file among them.
fn workspace_with_files(files: &[(&str, &str)]) -> (TempDir, Cidx) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    for (path, content) in files {
        let full_path = dir.path().join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent dirs");
        }
        fs::write(&full_path, content).expect("failed to write file");
    }
    let sources: Vec<&str> = files
        .iter()
        .map(|(path, _)| *path)
        .filter(|path| path.ends_with(".c"))
        .collect();
    write_manifest(dir.path(), &sources);
    let cidx = Cidx::open(dir.path()).expect("failed to open Cidx");
    (dir, cidx)
}

fn write_manifest(root: &Path, sources: &[&str]) {
    let entries: Vec<_> = sources
        .iter()
        .map(|path| {
            serde_json::json!({
                "directory": root,
                "file": path,
                "arguments": ["cc", "-c", path],
            })
        })
        .collect();
    fs::write(
        root.join("compile_commands.json"),
        serde_json::to_string(&entries).expect("serialize manifest"),
    )
    .expect("failed to write compile_commands.json");
}

/// Rewrite a file so its mtime moves past the indexed one.
fn touch(root: &Path, path: &str, content: &str) -> PathBuf {
    thread::sleep(Duration::from_millis(50));
    let full = root.join(path);
    fs::write(&full, content).expect("failed to rewrite file");
    full
}

/// Call edges as `(caller, callee, line, column, resolved)`.
type Edge = (String, String, u32, u32, bool);

/// Index content with row ids left out.
fn snapshot(cidx: &Cidx) -> (BTreeMap<String, usize>, Vec<(String, String)>, Vec<Edge>) {
    let stats = cidx.stats().expect("stats failed");
    let functions: Vec<(String, String)> = cidx
        .search_functions("%")
        .expect("query failed")
        .into_iter()
        .map(|f| (f.symbol.name, f.signature))
        .collect();
    let mut edges: Vec<Edge> = functions
        .iter()
        .flat_map(|(name, _)| cidx.get_callers(name).expect("query failed"))
        .map(|c| (c.caller_name, c.callee_name, c.line, c.column, c.callee_id.is_some()))
        .collect();
    edges.sort();
    edges.dedup();
    (stats.tables, functions, edges)
}

const LIB: &str = "\
int twice(int x) { return x * 2; }
int apply(int x) { return twice(x) + 1; }
";

const MAIN: &str = "\
int apply(int x);
int main(void) { return apply(20); }
";

// -- Idempotence --

#[test]
fn rebuilding_yields_the_same_content() {
    let (_dir, mut cidx) = workspace_with_files(&[("lib.c", LIB), ("main.c", MAIN)]);

    cidx.build().expect("first build failed");
    let first = snapshot(&cidx);
    cidx.build().expect("second build failed");
    let second = snapshot(&cidx);

    assert_eq!(first, second);
    assert!(!first.2.is_empty(), "snapshot should contain call edges");
}

#[test]
fn updating_an_unchanged_file_yields_the_same_content() {
    let (dir, mut cidx) = workspace_with_files(&[("lib.c", LIB), ("main.c", MAIN)]);
    cidx.build().expect("build failed");
    let before = snapshot(&cidx);

    let report = cidx
        .update(&[dir.path().join("lib.c")])
        .expect("update failed");
    assert_eq!(report.files_processed, 1);

    assert_eq!(snapshot(&cidx), before);
}

const FOO_A: &str = "int foo(void) { return 1; }\n";
const FOO_B: &str = "int foo(void) { return 2; }\n";
const FOO_MAIN: &str = "int foo(void);\nint main(void) { return foo(); }\n";

/// File of the definition a call from `caller` to `callee` is linked to.
fn linked_definition(cidx: &Cidx, caller: &str, callee: &str) -> Option<PathBuf> {
    let target = cidx
        .get_callees(caller)
        .expect("query failed")
        .into_iter()
        .find(|c| c.callee_name == callee)?
        .callee_id?;
    cidx.find_function(callee)
        .expect("query failed")
        .into_iter()
        .find(|f| f.symbol.id == target)
        .map(|f| f.symbol.file_path)
}

#[test]
fn reindexing_one_of_several_definitions_keeps_call_links() {
    let (dir, mut cidx) =
        workspace_with_files(&[("a.c", FOO_A), ("b.c", FOO_B), ("main.c", FOO_MAIN)]);
    cidx.build().expect("build failed");
    let before = snapshot(&cidx);
    assert_eq!(linked_definition(&cidx, "main", "foo"), Some(PathBuf::from("a.c")));

    cidx.update(&[dir.path().join("a.c")]).expect("update failed");
    assert_eq!(linked_definition(&cidx, "main", "foo"), Some(PathBuf::from("a.c")));

    cidx.update(&[dir.path().join("b.c")]).expect("update failed");
    assert_eq!(linked_definition(&cidx, "main", "foo"), Some(PathBuf::from("a.c")));
    assert_eq!(snapshot(&cidx), before);
}

// -- Cascade --

#[test]
fn purging_a_file_removes_every_dependent_row() {
    let (dir, mut cidx) = workspace_with_files(&[
        (
            "shapes.c",
            "/** Area. */\nstruct rect { int w; int h; };\nenum unit { MM, CM };\n\
             #define SCALE 10\n\
             int area(struct rect r) { int a = r.w * r.h; return a * SCALE; }\n",
        ),
        ("empty.c", "int placeholder;\n"),
    ]);
    cidx.build().expect("build failed");
    assert!(!cidx.get_struct_fields("rect").expect("query failed").is_empty());

    fs::remove_file(dir.path().join("shapes.c")).expect("remove shapes.c");
    let report = cidx.update_stale().expect("update failed");
    assert_eq!(report.files_removed, 1);

    let tables = cidx.stats().expect("stats failed").tables;
    for table in [
        "functions",
        "parameters",
        "locals",
        "types",
        "fields",
        "enum_constants",
        "calls",
        "docs",
    ] {
        assert_eq!(tables.get(table).copied(), Some(0), "{table} should be empty");
    }
    assert_eq!(tables.get("files").copied(), Some(1));
    assert!(cidx.get_macro_definition("SCALE").expect("query failed").is_none());
}

// -- Resolution monotonicity --

#[test]
fn adding_a_definition_resolves_earlier_calls() {
    let (dir, mut cidx) = workspace_with_files(&[("main.c", MAIN)]);
    let first = cidx.build().expect("build failed");
    assert_eq!(first.calls_unresolved, 1);
    assert_eq!(cidx.get_callers("apply").expect("query failed")[0].callee_id, None);

    fs::write(dir.path().join("lib.c"), LIB).expect("write lib.c");
    write_manifest(dir.path(), &["main.c", "lib.c"]);
    let second = cidx
        .update(&[dir.path().join("lib.c")])
        .expect("update failed");

    assert_eq!(second.calls_unresolved, 0);
    let callers = cidx.get_callers("apply").expect("query failed");
    assert!(callers[0].callee_id.is_some());
    assert_eq!(callers[0].caller_name, "main");
}

#[test]
fn updating_one_file_keeps_links_into_other_files() {
    let (dir, mut cidx) = workspace_with_files(&[("lib.c", LIB), ("main.c", MAIN)]);
    cidx.build().expect("build failed");

    let main = touch(
        dir.path(),
        "main.c",
        "int apply(int x);\nint main(void) { return apply(1) + apply(2); }\n",
    );
    cidx.update(&[main]).expect("update failed");

    let callers = cidx.get_callers("apply").expect("query failed");
    assert_eq!(callers.len(), 2);
    assert!(callers.iter().all(|c| c.callee_id.is_some()));
    let twice = cidx.get_callers("twice").expect("query failed");
    assert!(twice[0].callee_id.is_some(), "untouched file keeps its link");
}

// -- Staleness --

#[test]
fn fresh_index_has_no_stale_files() {
    let (dir, mut cidx) = workspace_with_files(&[("lib.c", LIB), ("main.c", MAIN)]);
    assert_eq!(cidx.stale_files().expect("stale failed").len(), 2);

    cidx.build().expect("build failed");

    assert!(cidx.stale_files().expect("stale failed").is_empty());
    assert_eq!(
        cidx.file_state(&dir.path().join("lib.c")).expect("state failed"),
        FileState::Indexed
    );
}

#[test]
fn modified_file_is_stale_until_updated() {
    let (dir, mut cidx) = workspace_with_files(&[("lib.c", LIB), ("main.c", MAIN)]);
    cidx.build().expect("build failed");

    let lib = touch(dir.path(), "lib.c", "int twice(int x) { return x + x; }\n");

    assert_eq!(
        cidx.stale_files().expect("stale failed"),
        vec![PathBuf::from("lib.c")]
    );
    assert_eq!(cidx.file_state(&lib).expect("state failed"), FileState::Stale);

    let report = cidx.update_stale().expect("update failed");
    assert_eq!(report.files_processed, 1);
    assert!(cidx.stale_files().expect("stale failed").is_empty());
    assert!(cidx.find_function("apply").expect("query failed").iter().all(|f| !f.symbol.is_definition));
}

#[test]
fn new_manifest_entry_is_unknown_and_stale() {
    let (dir, mut cidx) = workspace_with_files(&[("main.c", MAIN)]);
    cidx.build().expect("build failed");

    fs::write(dir.path().join("extra.c"), "int extra(void) { return 3; }\n").expect("write extra.c");
    write_manifest(dir.path(), &["main.c", "extra.c"]);

    assert_eq!(
        cidx.file_state(&dir.path().join("extra.c")).expect("state failed"),
        FileState::Unknown
    );
    assert_eq!(
        cidx.stale_files().expect("stale failed"),
        vec![PathBuf::from("extra.c")]
    );
}

// -- Removal --

#[test]
fn deleted_file_is_purged() {
    let (dir, mut cidx) = workspace_with_files(&[("lib.c", LIB), ("main.c", MAIN)]);
    cidx.build().expect("build failed");

    fs::remove_file(dir.path().join("lib.c")).expect("remove lib.c");
    assert_eq!(
        cidx.file_state(&dir.path().join("lib.c")).expect("state failed"),
        FileState::Removed
    );

    let report = cidx.update_stale().expect("update failed");

    assert_eq!(report.files_removed, 1);
    assert!(cidx.search_functions("twice").expect("query failed").is_empty());
    assert_eq!(cidx.get_callers("apply").expect("query failed")[0].callee_id, None);
    assert_eq!(
        cidx.file_state(&dir.path().join("lib.c")).expect("state failed"),
        FileState::Unknown
    );
    let paths: Vec<PathBuf> = cidx
        .list_files()
        .expect("list failed")
        .into_iter()
        .map(|f| f.path)
        .collect();
    assert_eq!(paths, vec![PathBuf::from("main.c")]);
}

// -- Error isolation --

#[test]
fn one_bad_file_does_not_stop_the_batch() {
    let (dir, mut cidx) = workspace_with_files(&[
        ("good.c", "int good(void) { return 1; }\n"),
        ("bad.c", ""),
        ("broken.c", "int ok(void) { return 0; }\nint broken( {\n"),
    ]);
    fs::write(dir.path().join("bad.c"), b"int bad(void) { return \xff; }\n").expect("write bad.c");

    let report = cidx.build().expect("build must not fail on bad input");

    assert_eq!(report.files_failed, 2);
    let mut kinds: Vec<(String, IndexErrorKind)> = report
        .errors
        .iter()
        .map(|e| {
            let name = e.path.file_name().map(|n| n.to_string_lossy().into_owned());
            (name.unwrap_or_default(), e.kind)
        })
        .collect();
    kinds.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        kinds,
        vec![
            ("bad.c".to_string(), IndexErrorKind::EncodingError),
            ("broken.c".to_string(), IndexErrorKind::SyntaxErrors),
        ]
    );
    assert!(report.errors.iter().all(|e| e.kind.is_input_error()));

    assert_eq!(cidx.find_function("good").expect("query failed").len(), 1);
    assert_eq!(cidx.find_function("ok").expect("query failed").len(), 1);
    assert!(cidx.find_function("bad").expect("query failed").is_empty());
}

#[test]
fn file_outside_the_manifest_is_reported() {
    let (dir, mut cidx) = workspace_with_files(&[("main.c", MAIN)]);
    cidx.build().expect("build failed");
    fs::write(dir.path().join("stray.c"), "int stray;\n").expect("write stray.c");

    let report = cidx
        .update(&[dir.path().join("stray.c")])
        .expect("update failed");

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].kind, IndexErrorKind::NoCompileCommand);
}

// -- Typedef chains --

fn typedef_chain(length: usize) -> String {
    let mut source = String::from("typedef unsigned int t0;\n");
    for i in 1..=length {
        let _ = writeln!(source, "typedef t{} t{i};", i - 1);
    }
    source
}

#[test]
fn chain_past_the_limit_is_reported_and_truncated() {
    let (dir, _) = workspace_with_files(&[("deep.c", &typedef_chain(8))]);
    let config = Config {
        typedef_chain_limit: 4,
        ..Config::default()
    };
    let mut cidx = Cidx::with_config(dir.path(), config).expect("open failed");

    let report = cidx.build().expect("build failed");

    assert_eq!(cidx.resolve_typedef("t4").expect("query failed").as_deref(), Some("unsigned int"));
    assert_ne!(cidx.resolve_typedef("t8").expect("query failed").as_deref(), Some("unsigned int"));
    assert!(
        report
            .errors
            .iter()
            .all(|e| e.kind == IndexErrorKind::TypedefChainTooDeep)
    );
    assert_eq!(report.errors.len(), 4, "t5 through t8 exceed four hops");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn chains_within_the_limit_resolve_to_the_base(length in 1usize..40) {
        let (_dir, mut cidx) = workspace_with_files(&[("chain.c", &typedef_chain(length))]);
        let report = cidx.build().expect("build failed");

        prop_assert!(report.errors.is_empty());
        let last = format!("t{length}");
        prop_assert_eq!(
            cidx.resolve_typedef(&last).expect("query failed"),
            Some("unsigned int".to_string())
        );
    }
}
