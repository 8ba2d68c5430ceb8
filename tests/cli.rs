use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

fn playpen() -> Command {
    Command::cargo_bin("playpen").expect("binary exists")
}

#[test]
fn engines_lists_every_engine() {
    playpen()
        .arg("engines")
        .assert()
        .success()
        .stdout(predicate::str::contains("narcissus-ui"))
        .stdout(predicate::str::contains("Narcissus"))
        .stdout(predicate::str::contains("html"))
        .stdout(predicate::str::contains("react"))
        .stdout(predicate::str::contains("typescript"));
}

#[test]
fn examples_lists_bundled_scripts() {
    playpen()
        .args(["examples", "--engine", "narcissus"])
        .assert()
        .success()
        .stdout(predicate::str::contains("01 Hello World"))
        .stdout(predicate::str::contains("02 Fibonacci"));
}

#[test]
fn run_inline_source() {
    playpen()
        .args(["run", "--engine", "narcissus", "--source", "print(1 + 1)"])
        .assert()
        .success()
        .stdout("2\n");
}

#[test]
fn run_bundled_example() {
    playpen()
        .args(["run", "--engine", "narcissus", "--example", "02 Fibonacci"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("0\n1\n1\n2\n3\n"))
        .stdout(predicate::str::contains("34\n"));
}

#[test]
fn unknown_example_is_an_error() {
    playpen()
        .args(["run", "--engine", "narcissus", "--example", "Nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no example named `Nope`"));
}

#[test]
fn run_file_argument() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("greet.ns");
    fs::write(&script, "var who = \"file\"\nprint(\"hi\", who)\n").expect("write script");

    playpen()
        .arg("run")
        .arg(&script)
        .assert()
        .success()
        .stdout("hi file\n");
}

#[test]
fn run_reads_stdin_for_dash() {
    playpen()
        .args(["run", "-"])
        .write_stdin("print(\"from stdin\")")
        .assert()
        .success()
        .stdout("from stdin\n");
}

#[test]
fn forbidden_import_fails_run() {
    playpen()
        .args(["run", "--source", "use os\nprint(os.cwd())"])
        .assert()
        .failure()
        .stdout("")
        .stderr(predicate::str::contains(
            "Blocked: forbidden capability import.",
        ));
}

#[test]
fn runtime_error_keeps_earlier_output() {
    playpen()
        .args(["run", "--source", "print(\"before\")\nmissing()"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("before"))
        .stderr(predicate::str::contains("undefined variable `missing`"));
}

#[test]
fn json_output_serializes_blocks() {
    let output = playpen()
        .args(["run", "--json", "--source", "print(\"hey\")"])
        .output()
        .expect("run binary");
    assert!(output.status.success());

    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is JSON");
    let blocks = parsed["blocks"].as_array().expect("blocks array");
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0]["block"], "console");
    assert_eq!(blocks[0]["text"], "hey\n");
}

#[test]
fn host_engine_prints_widgets_and_panel() {
    playpen()
        .args([
            "run",
            "--engine",
            "narcissus-ui",
            "--source",
            "ui.title(\"Report\")\nprint(\"  side note  \")",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("# Report"))
        .stdout(predicate::str::contains("--- Console output ---\nside note"));
}

#[test]
fn preview_dir_receives_markup_pages() {
    let dir = tempdir().expect("create temp dir");
    let previews = dir.path().join("previews");

    playpen()
        .args(["run", "--engine", "html", "--source", "<p>\"hi\"</p>"])
        .arg("--preview-dir")
        .arg(&previews)
        .assert()
        .success()
        .stdout(predicate::str::contains("<p>\"hi\"</p>"));

    let page = fs::read_to_string(previews.join("preview-1.html")).expect("preview written");
    assert!(page.contains("sandbox=\"allow-scripts\""), "{page}");
    assert!(page.contains("srcdoc=\"&lt;p&gt;&quot;hi&quot;&lt;/p&gt;\""), "{page}");
}

#[test]
fn config_file_supplies_defaults() {
    let dir = tempdir().expect("create temp dir");
    let config = dir.path().join("playpen.yaml");
    fs::write(&config, "engine: react\nformat: json\n").expect("write config");

    let output = playpen()
        .arg("--config")
        .arg(&config)
        .args(["run", "--source", "const App = () => <b>hi</b>;"])
        .output()
        .expect("run binary");
    assert!(output.status.success());

    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is JSON");
    assert_eq!(parsed["blocks"][0]["block"], "markup");
    assert_eq!(parsed["blocks"][0]["height"], 800);
}

#[test]
fn config_with_unknown_key_is_rejected() {
    let dir = tempdir().expect("create temp dir");
    let config = dir.path().join("playpen.yaml");
    fs::write(&config, "colour: blue\n").expect("write config");

    playpen()
        .arg("--config")
        .arg(&config)
        .arg("engines")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse settings"));
}
