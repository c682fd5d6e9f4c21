//! End-to-end scenarios (spec.md §8 "End-to-end scenarios"), exercised
//! through the public `Makefile::load` / `Makefile::build_graph` pipeline
//! rather than against any single internal module. Grounded on the sibling
//! example repo `lynzrand-n2o5`'s `cli/tests/parser_snapshot.rs`, the
//! closest precedent in the retrieval pack for a whole-file, black-box
//! parse/evaluate test; this crate's scenarios assert on specific field
//! values instead of a snapshot file since there is no snapshot-testing
//! dependency in the stack.

use std::io::Write;

use just_make::eval::{Evaluator, SystemIo, Var};
use just_make::{Makefile, MakefileOptions};

fn write_makefile(name: &str, contents: &str) -> std::path::PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("just_make_scenario_{name}_{}.mk", std::process::id()));
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    path
}

/// Scenario 1: a recursive (`=`) variable re-expands to the value its
/// reference held at the *last* assignment before the recipe runs, not the
/// value at the point `B` itself was defined.
#[test]
fn recursive_variable_reexpands_at_reference_time() {
    let path = write_makefile("recursive", "A := 1\nB = $(A)\nA := 2\nall: ; @echo $(B)\n");
    let mk = Makefile::load(path.to_str().unwrap(), MakefileOptions::default()).unwrap();
    let _ = std::fs::remove_file(&path);

    let b_sym = mk.symtab.intern_str("B");
    let value = match mk.vars.global_var(b_sym) {
        Var::Recursive { value, .. } => value.clone(),
        other => panic!("expected B to stay a recursive variable, got {other:?}"),
    };

    let io = SystemIo;
    let mut ev = Evaluator::new(mk.symtab.clone(), &io);
    ev.state.vars = mk.vars;
    let expanded = ev.expand_value(&value).unwrap();
    assert_eq!(String::from_utf8(expanded).unwrap(), "2");
}

/// Scenario 2: a simple (`:=`) variable captures its right-hand side at
/// assignment time, so a later reassignment of `A` does not retroactively
/// change `B`.
#[test]
fn simple_variable_captures_value_at_assignment() {
    let path = write_makefile("simple", "A := 1\nB := $(A)\nA := 2\nall: ; @echo $(B)\n");
    let mk = Makefile::load(path.to_str().unwrap(), MakefileOptions::default()).unwrap();
    let _ = std::fs::remove_file(&path);

    let b_sym = mk.symtab.intern_str("B");
    assert_eq!(mk.vars.global_var(b_sym).raw_text(), b"1");
}

/// Scenario 3: an explicit rule for `foo.o` that names the same
/// prerequisite as a pattern rule resolves through the pattern rule when no
/// explicit rule exists, binding one dependency edge and one command.
#[test]
fn pattern_rule_resolves_against_an_existing_source_file() {
    let dir = std::env::temp_dir().join(format!("just_make_scenario_pattern_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let makefile_path = dir.join("Makefile");
    std::fs::write(&makefile_path, "%.o: %.c\n\tgcc -c $< -o $@\n\nfoo.o: foo.c\n").unwrap();
    std::fs::write(dir.join("foo.c"), "int main(void) { return 0; }\n").unwrap();

    let prev_cwd = std::env::current_dir().unwrap();
    std::env::set_current_dir(&dir).unwrap();
    let result = std::panic::catch_unwind(|| {
        let mut mk = Makefile::load("Makefile", MakefileOptions::default()).unwrap();
        let foo_o = mk.target("foo.o");
        let graph = mk.build_graph(&[foo_o]).unwrap();
        let node = graph.node(graph.find(foo_o).unwrap());
        assert_eq!(node.actual_inputs.len(), 1);
        assert_eq!(mk.symtab.name_str(node.actual_inputs[0]), "foo.c");
        assert_eq!(node.commands.len(), 1);
    });
    std::env::set_current_dir(&prev_cwd).unwrap();
    let _ = std::fs::remove_dir_all(&dir);
    result.unwrap();
}

/// Scenario 4: the `else` branch of an `ifdef` runs when the tested
/// variable is unset.
#[test]
fn ifdef_else_branch_runs_when_variable_is_unset() {
    let path = write_makefile("ifdef", "ifdef X\nY := defined\nelse\nY := not\nendif\nall: ; @echo $(Y)\n");
    let mk = Makefile::load(path.to_str().unwrap(), MakefileOptions::default()).unwrap();
    let _ = std::fs::remove_file(&path);

    let y_sym = mk.symtab.intern_str("Y");
    assert_eq!(mk.vars.global_var(y_sym).raw_text(), b"not");
}

/// Scenario 5: `$(shell ...)` inside a simple assignment captures the
/// subprocess's stdout, trimmed, as the variable's value.
#[test]
fn shell_function_captures_subprocess_stdout() {
    let path = write_makefile("shell", "A := $(shell echo hi there)\nall: ; @echo $(A)\n");
    let mk = Makefile::load(path.to_str().unwrap(), MakefileOptions::default()).unwrap();
    let _ = std::fs::remove_file(&path);

    let a_sym = mk.symtab.intern_str("A");
    assert_eq!(mk.vars.global_var(a_sym).raw_text(), b"hi there");
}

/// Scenario 6: a target named in `.PHONY` is flagged as phony on its
/// `DepNode` regardless of whether a file of that name exists.
#[test]
fn phony_declared_target_is_flagged_on_its_node() {
    let path = write_makefile("phony", ".PHONY: clean\nclean: ; rm -rf out\n");
    let mut mk = Makefile::load(path.to_str().unwrap(), MakefileOptions::default()).unwrap();
    let _ = std::fs::remove_file(&path);

    let clean = mk.target("clean");
    let graph = mk.build_graph(&[clean]).unwrap();
    let node = graph.node(graph.find(clean).unwrap());
    assert!(node.is_phony);
    assert_eq!(node.commands.len(), 1);
}
