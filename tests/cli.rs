use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tsgen::cli::run_cli;

fn temp_dir(prefix: &str) -> PathBuf {
    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time drift")
        .as_nanos();
    std::env::temp_dir().join(format!("tsgen-{}-{}-{}", prefix, std::process::id(), nonce))
}

fn copy_fixture(name: &str, to: &Path) {
    let from = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("testdata").join(name);
    fs::create_dir_all(to).expect("mkdir");
    for entry in fs::read_dir(&from).expect("fixture dir") {
        let path = entry.expect("entry").path();
        if path.extension().map_or(false, |ext| ext == "go") {
            fs::copy(&path, to.join(path.file_name().expect("name"))).expect("copy");
        }
    }
}

fn golden(name: &str, file: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("testdata")
        .join(name)
        .join(format!("{}.golden", file));
    fs::read_to_string(path).expect("golden")
}

fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn write_flag_rewrites_only_named_files() {
    let dir = temp_dir("cli-write");
    copy_fixture("keys", &dir);
    let main_before = fs::read_to_string(dir.join("main.go")).expect("read main");
    let keys = dir.join("keys.go");

    let code = run_cli(args(&["expand", "-w", &keys.display().to_string()]));
    assert_eq!(code, 0);
    assert_eq!(fs::read_to_string(&keys).expect("read keys"), golden("keys", "keys.go"));
    assert_eq!(fs::read_to_string(dir.join("main.go")).expect("read main"), main_before);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn config_file_supplies_write_and_entry() {
    let root = temp_dir("cli-config");
    let dir = root.join("avg");
    copy_fixture("avg", &dir);
    fs::write(root.join("tsgen.toml"), "write = true\nmain = \"main\"\n").expect("write config");
    let avg = dir.join("avg.go");

    assert_eq!(run_cli(args(&["expand", &avg.display().to_string()])), 0);
    assert_eq!(fs::read_to_string(&avg).expect("read avg"), golden("avg", "avg.go"));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn unknown_entry_package_leaves_files_untouched() {
    let dir = temp_dir("cli-entry");
    copy_fixture("keys", &dir);
    let keys = dir.join("keys.go");
    let before = fs::read_to_string(&keys).expect("read keys");

    let code = run_cli(args(&["expand", "-w", "--main", "nope", &keys.display().to_string()]));
    assert_eq!(code, 1);
    assert_eq!(fs::read_to_string(&keys).expect("read keys"), before);

    let _ = fs::remove_dir_all(&dir);
}
