use std::fs;
use std::path::{Path, PathBuf};

use indoc::indoc;
use tsgen::callgraph::RootKind;
use tsgen::pipeline::{FileOutput, MemoryTarget, RewriteReport, Stage};
use tsgen::sema::SourceInput;
use tsgen::{Gen, Options, SkipReason};

fn testdata(dir: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("testdata").join(dir)
}

/// Every `.go` file of a fixture directory, `first` leading.
fn fixture(dir: &str, first: &str) -> Vec<SourceInput> {
    let root = testdata(dir);
    let mut names: Vec<String> = fs::read_dir(&root)
        .expect("fixture dir")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".go") && name != first)
        .collect();
    names.sort();
    names.insert(0, first.to_string());
    names
        .into_iter()
        .map(|name| SourceInput {
            path: PathBuf::from(dir).join(&name),
            source: fs::read_to_string(root.join(&name)).expect("read fixture"),
        })
        .collect()
}

fn golden(dir: &str, file: &str) -> String {
    fs::read_to_string(testdata(dir).join(format!("{}.golden", file))).expect("read golden")
}

fn inputs(files: &[(&str, &str)]) -> Vec<SourceInput> {
    files
        .iter()
        .map(|(path, source)| SourceInput {
            path: PathBuf::from(path),
            source: source.to_string(),
        })
        .collect()
}

fn rewrite_one(sources: Vec<SourceInput>, options: Options, path: &str) -> (FileOutput, Vec<RewriteReport>) {
    let gen = Gen::from_sources(sources, options).expect("load program");
    let (mut outputs, reports) = gen.rewrite(|p| p == Path::new(path));
    assert_eq!(outputs.len(), 1, "exactly one accepted file");
    (outputs.remove(0), reports)
}

fn assert_golden(dir: &str, file: &str) -> Vec<RewriteReport> {
    let path = format!("{}/{}", dir, file);
    let (output, reports) = rewrite_one(fixture(dir, file), Options::default(), &path);
    let expected = golden(dir, file);
    assert!(output.changed, "{} was not rewritten", path);
    assert_eq!(output.contents, expected, "{} differs from its golden file", path);
    reports
}

#[test]
fn first_matching_template_wins_per_concrete_type() {
    let reports = assert_golden("dispatch", "dispatch.go");
    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.function, "Foo");
    assert_eq!(report.stage, Stage::Expanded);
    assert_eq!(report.skipped, None);
    assert_eq!(report.arms_added.len(), 5);
    assert!(report.dropped.is_empty(), "dropped: {:?}", report.dropped);
}

#[test]
fn annotated_type_variable_is_a_placeholder() {
    let reports = assert_golden("avg", "avg.go");
    assert_eq!(reports[0].arms_added, vec!["[]int", "[]uint", "[]float32"]);
}

#[test]
fn test_functions_root_a_package_without_main() {
    let gen = Gen::from_sources(fixture("foreach", "foreach.go"), Options::default()).expect("load program");
    assert_eq!(gen.graph().root_kind(), RootKind::TestMain);

    let reports = assert_golden("foreach", "foreach.go");
    // the inner switch on `cb` is not a top-level statement
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].arms_added, vec!["[]string", "[]bool"]);
}

#[test]
fn map_value_placeholder_binds_each_caller_type() {
    let reports = assert_golden("keys", "keys.go");
    assert_eq!(reports[0].arms_added, vec!["map[string]int", "map[string]bool"]);
}

#[test]
fn a_second_pass_adds_nothing() {
    for (dir, file) in [("dispatch", "dispatch.go"), ("avg", "avg.go"), ("keys", "keys.go")] {
        let mut sources = fixture(dir, file);
        sources[0].source = golden(dir, file);
        let expected = sources[0].source.clone();
        let path = format!("{}/{}", dir, file);
        let (output, reports) = rewrite_one(sources, Options::default(), &path);
        assert!(!output.changed, "{} changed on the second pass", path);
        assert_eq!(output.contents, expected);
        assert!(reports.iter().all(|r| r.arms_added.is_empty()));
    }
}

#[test]
fn misspelled_subject_is_skipped_with_a_hint() {
    let source = indoc! {"
        package main

        type T interface{}

        func show(value interface{}) {
        \tswitch v := valeu.(type) {
        \tcase []T:
        \t\t_ = v
        \t}
        }

        func main() {
        \tshow([]int{1})
        }
    "};
    let (output, reports) = rewrite_one(inputs(&[("m/main.go", source)]), Options::default(), "m/main.go");
    assert!(!output.changed);
    assert_eq!(output.contents, source);
    assert_eq!(
        reports[0].skipped,
        Some(SkipReason::ParamNotFound {
            name: "valeu".to_string(),
            hint: Some("did you mean `value`?".to_string()),
        })
    );
}

#[test]
fn local_shadowing_the_subject_is_skipped() {
    let source = indoc! {"
        package main

        type T interface{}

        func show(v interface{}) {
        \tv = 1
        \tvar w interface{} = v
        \tswitch w.(type) {
        \tcase *T:
        \t}
        }

        func main() {
        \tshow(new(int))
        }
    "};
    let (output, reports) = rewrite_one(inputs(&[("m/main.go", source)]), Options::default(), "m/main.go");
    assert!(!output.changed);
    assert_eq!(reports[0].skipped, Some(SkipReason::ScopeMismatch("w".to_string())));
}

#[test]
fn duplicates_and_already_listed_types_are_not_added() {
    let source = indoc! {"
        package main

        type T interface{}

        func show(v interface{}) {
        \tswitch v.(type) {
        \tcase []string, []byte:
        \tcase []T:
        \tcase *T:
        \t}
        }

        func main() {
        \tshow([]int{})
        \tshow([]int{1, 2})
        \tshow([]string{})
        \tshow([]byte(\"x\"))
        \tshow(\"plain\")
        }
    "};
    let (output, reports) = rewrite_one(inputs(&[("m/main.go", source)]), Options::default(), "m/main.go");
    assert!(
        output.contents.contains("\tswitch v.(type) {\n\tcase []int:\n\tcase []string, []byte:"),
        "unexpected output:\n{}",
        output.contents
    );
    assert_eq!(reports[0].arms_added, vec!["[]int"]);
    assert_eq!(reports[0].dropped, vec!["string"]);
    assert_eq!(reports[0].already_handled, vec!["[]string", "[]uint8"]);
}

#[test]
fn struct_fields_match_by_position_not_name() {
    let source = indoc! {"
        package main

        type T interface{}

        func show(v interface{}) {
        \tswitch v.(type) {
        \tcase struct{ name string; size T }:
        \t}
        }

        func main() {
        \tshow(struct {
        \t\tlabel string
        \t\tsize  int
        \t}{})
        \tshow(struct{ name int }{})
        }
    "};
    let (output, reports) = rewrite_one(inputs(&[("m/main.go", source)]), Options::default(), "m/main.go");
    assert_eq!(reports[0].arms_added, vec!["struct{label string; size int}"]);
    assert_eq!(reports[0].dropped, vec!["struct{name int}"]);
    assert!(
        output.contents.contains("\tcase struct{ name string; size int }:\n\tcase struct{ name string; size T }:"),
        "unexpected output:\n{}",
        output.contents
    );
}

#[test]
fn function_local_types_get_no_arm() {
    let source = indoc! {"
        package main

        type T interface{}

        func show(v interface{}) {
        \tswitch v.(type) {
        \tcase []T:
        \t}
        }

        func main() {
        \ttype point struct{ x int }
        \tshow([]point{{1}})
        \tshow([]int{})
        }
    "};
    let (output, reports) = rewrite_one(inputs(&[("m/main.go", source)]), Options::default(), "m/main.go");
    assert_eq!(reports[0].arms_added, vec!["[]int"]);
    assert!(reports[0].dropped.is_empty(), "dropped: {:?}", reports[0].dropped);
    assert!(
        output.contents.contains("\tswitch v.(type) {\n\tcase []int:\n\tcase []T:\n\t}"),
        "unexpected output:\n{}",
        output.contents
    );
}

#[test]
fn unresolvable_pattern_skips_only_its_switch() {
    let source = indoc! {"
        package main

        type T interface{}

        func broken(v interface{}) {
        \tswitch v.(type) {
        \tcase []Missing:
        \tcase []T:
        \t}
        }

        func show(v interface{}) {
        \tswitch v.(type) {
        \tcase []T:
        \t}
        }

        func main() {
        \tbroken([]int{})
        \tshow([]int{})
        }
    "};
    let (output, reports) = rewrite_one(inputs(&[("m/main.go", source)]), Options::default(), "m/main.go");
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].function, "broken");
    assert_eq!(reports[0].stage, Stage::TypesInferred);
    assert!(
        matches!(reports[0].skipped, Some(SkipReason::UnsupportedPattern(_))),
        "{:?}",
        reports[0].skipped
    );
    assert!(reports[0].arms_added.is_empty());
    assert_eq!(reports[1].function, "show");
    assert_eq!(reports[1].skipped, None);
    assert_eq!(reports[1].arms_added, vec!["[]int"]);
    assert!(
        output
            .contents
            .contains("func broken(v interface{}) {\n\tswitch v.(type) {\n\tcase []Missing:\n\tcase []T:\n\t}"),
        "unexpected output:\n{}",
        output.contents
    );
    assert!(
        output.contents.contains("func show(v interface{}) {\n\tswitch v.(type) {\n\tcase []int:\n\tcase []T:"),
        "unexpected output:\n{}",
        output.contents
    );
}

#[test]
fn types_from_unimported_packages_get_an_import() {
    let files = [
        (
            "app/main.go",
            "package main\n\nimport (\n\t\"example.com/lib\"\n\t\"example.com/view\"\n)\n\nfunc main() {\n\tview.Show([]lib.Item{})\n}\n",
        ),
        ("lib/lib.go", "package lib\n\ntype Item struct{}\n"),
        (
            "view/view.go",
            "package view\n\ntype T interface{}\n\nfunc Show(v interface{}) {\n\tswitch v.(type) {\n\tcase []T:\n\t}\n}\n",
        ),
    ];
    let options = Options {
        main: Some("main".to_string()),
        ..Options::default()
    };
    let (output, _) = rewrite_one(inputs(&files), options, "view/view.go");
    assert_eq!(
        output.contents,
        "package view\n\nimport \"example.com/lib\"\n\ntype T interface{}\n\nfunc Show(v interface{}) {\n\tswitch v.(type) {\n\tcase []lib.Item:\n\tcase []T:\n\t}\n}\n"
    );
}

#[test]
fn same_named_packages_keep_distinct_types() {
    let files = [
        (
            "app/main.go",
            indoc! {"
                package main

                import (
                \tam \"example.com/a/model\"
                \tbm \"example.com/b/model\"
                )

                type T interface{}

                func show(v interface{}) {
                \tswitch v.(type) {
                \tcase []T:
                \t}
                }

                func main() {
                \tshow([]am.Item{})
                \tshow([]bm.Item{})
                }
            "},
        ),
        ("a/model/item.go", "package model\n\ntype Item struct{ id int }\n"),
        ("b/model/item.go", "package model\n\ntype Item struct{ name string }\n"),
    ];
    let (output, reports) = rewrite_one(inputs(&files), Options::default(), "app/main.go");
    assert_eq!(
        reports[0].arms_added,
        vec!["[]example.com/a/model.Item", "[]example.com/b/model.Item"]
    );
    assert!(
        output.contents.contains("\tswitch v.(type) {\n\tcase []bm.Item:\n\tcase []am.Item:\n\tcase []T:"),
        "unexpected output:\n{}",
        output.contents
    );
}

#[test]
fn fatal_errors_write_nothing() {
    let broken = inputs(&[
        ("m/main.go", "package main\n\nfunc main() {}\n"),
        ("m/bad.go", "package main\n\nfunc broken( {\n"),
    ]);
    assert!(matches!(Gen::from_sources(broken, Options::default()), Err(tsgen::GenError::Parse { .. })));

    let no_entry = inputs(&[("lib/lib.go", "package lib\n\nfunc helper() {}\n")]);
    let err = Gen::from_sources(no_entry, Options::default()).err().expect("no entry point");
    assert!(matches!(err, tsgen::GenError::NoEntryPoint(ref name) if name == "lib"), "{}", err);
}

#[test]
fn memory_target_receives_every_accepted_file() {
    let gen = Gen::from_sources(fixture("keys", "keys.go"), Options::default()).expect("load program");
    let mut target = MemoryTarget::default();
    gen.expand(&mut target).expect("expand");
    assert_eq!(target.outputs.len(), 2);
    assert_eq!(target.outputs[&PathBuf::from("keys/keys.go")], golden("keys", "keys.go"));
    let main = fs::read_to_string(testdata("keys").join("main.go")).expect("read main");
    assert_eq!(target.outputs[&PathBuf::from("keys/main.go")], main);
}
