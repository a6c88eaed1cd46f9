use morlock::console::{ScriptedConsole, Tone};
use morlock::error::ExitCode;
use morlock::lock::Argon2Hasher;
use morlock::repl::Repl;
use morlock::session::Session;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

fn repl() -> Repl {
    let session =
        Session::default().with_hasher(Box::new(Argon2Hasher::with_params(8, 1, 1).unwrap()));
    Repl::new(session, "morlock")
}

fn song(dir: &TempDir, name: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, b"ID3\x03\x00audio").unwrap();
    path
}

fn quoted(path: &Path) -> String {
    format!("'{}'", path.display())
}

#[test]
fn test_script_edit_and_save() {
    let dir = tempdir().unwrap();
    let path = song(&dir, "song.mp3");
    let p = quoted(&path);

    let mut repl = repl();
    let mut console = ScriptedConsole::new([
        format!("load {}", p),
        format!("activate {}", p),
        "set data.volume 5".to_string(),
        "set title 'My Song'".to_string(),
        "set tags '[\"a\", \"b\"]'".to_string(),
        "name Favourite".to_string(),
        "save".to_string(),
        "quit".to_string(),
    ]);
    assert_eq!(repl.run(&mut console), ExitCode::Success);
    assert!(console.errors().is_empty(), "{:?}", console.errors());

    let document = repl.session().get(&path).unwrap().document().unwrap().clone();
    assert_eq!(document.name.as_deref(), Some("Favourite"));
    assert_eq!(document.data["volume"], json!(5));
    assert_eq!(document.data["title"], json!("My Song"));
    assert_eq!(document.data["tags"], json!(["a", "b"]));
    assert!(fs::read(&path).unwrap().starts_with(b"<morlock>"));
}

#[test]
fn test_prompt_follows_active_file() {
    let dir = tempdir().unwrap();
    let path = song(&dir, "song.mp3");
    let p = quoted(&path);

    let mut repl = repl();
    let mut console = ScriptedConsole::new([
        format!("load {}", p),
        format!("activate {}", p),
        "deactivate".to_string(),
    ]);
    repl.run(&mut console);
    assert_eq!(
        console.prompts,
        vec![
            "morlock> ".to_string(),
            "morlock> ".to_string(),
            format!("morlock({})> ", path.display()),
            "morlock> ".to_string(),
        ]
    );
}

#[test]
fn test_multi_target_continues_after_failure() {
    let dir = tempdir().unwrap();
    let a = song(&dir, "a.mp3");
    let b = song(&dir, "b.mp3");
    let missing = dir.path().join("missing.mp3");

    let mut repl = repl();
    let mut console = ScriptedConsole::new([format!(
        "load {} {} {}",
        quoted(&a),
        quoted(&missing),
        quoted(&b)
    )]);
    repl.run(&mut console);

    assert!(repl.session().is_loaded(&a));
    assert!(repl.session().is_loaded(&b));
    assert_eq!(console.errors().len(), 1);
    assert!(console.errors()[0].contains("not found"));
}

#[test]
fn test_second_activate_is_reported() {
    let dir = tempdir().unwrap();
    let a = song(&dir, "a.mp3");
    let b = song(&dir, "b.mp3");

    let mut repl = repl();
    let mut console = ScriptedConsole::new([
        format!("load {} {}", quoted(&a), quoted(&b)),
        format!("activate {}", quoted(&a)),
        format!("activate {}", quoted(&b)),
        format!("switch {}", quoted(&b)),
    ]);
    repl.run(&mut console);

    assert_eq!(console.errors().len(), 1);
    assert_eq!(repl.session().active(), Some(b.as_path()));
}

#[test]
fn test_bad_keys_are_reported() {
    let dir = tempdir().unwrap();
    let path = song(&dir, "song.mp3");

    let mut repl = repl();
    let mut console = ScriptedConsole::new([
        format!("load {}", quoted(&path)),
        format!("activate {}", quoted(&path)),
        "set list [1,2]".to_string(),
        "set list[5] 3".to_string(),
        "set a..b 1".to_string(),
        "set a[] 1".to_string(),
        "set a[x] 1".to_string(),
        "set list[2] 3".to_string(),
    ]);
    assert_eq!(repl.run(&mut console), ExitCode::Interrupted);

    assert_eq!(console.errors().len(), 4);
    assert_eq!(
        repl.session().get(&path).unwrap().document().unwrap().data["list"],
        json!([1, 2, 3])
    );
}

#[test]
fn test_quit_with_changes_asks_first() {
    let dir = tempdir().unwrap();
    let path = song(&dir, "song.mp3");

    let mut repl = repl();
    let mut console = ScriptedConsole::new([
        format!("load {}", quoted(&path)),
        format!("activate {}", quoted(&path)),
        "set x 1".to_string(),
        "quit".to_string(),
        "n".to_string(),
        "save".to_string(),
        "quit".to_string(),
    ]);
    assert_eq!(repl.run(&mut console), ExitCode::Success);
    assert!(console
        .prompts
        .iter()
        .any(|p| p.starts_with("Unsaved changes in")));
    assert!(!repl.session().get(&path).unwrap().modified);
}

#[test]
fn test_end_of_input_during_exit_question() {
    let dir = tempdir().unwrap();
    let path = song(&dir, "song.mp3");

    let mut repl = repl();
    let mut console = ScriptedConsole::new([
        format!("load {}", quoted(&path)),
        format!("wipe {}", quoted(&path)),
    ]);
    assert_eq!(repl.run(&mut console), ExitCode::Interrupted);
    assert_eq!(fs::read(&path).unwrap(), b"ID3\x03\x00audio".to_vec());
}

#[test]
fn test_open_activates_single_file() {
    let dir = tempdir().unwrap();
    let a = song(&dir, "a.mp3");
    let b = song(&dir, "b.mp3");

    let mut console = ScriptedConsole::default();
    let mut single = repl();
    single.open(&[a.clone()], None, &mut console);
    assert_eq!(single.session().active(), Some(a.as_path()));

    let mut several = repl();
    several.open(&[a.clone(), b], None, &mut console);
    assert_eq!(several.session().active(), None);
    assert_eq!(several.session().files().count(), 2);
}

#[test]
fn test_files_and_notices() {
    let dir = tempdir().unwrap();
    let path = song(&dir, "song.mp3");

    let mut repl = repl();
    let mut console = ScriptedConsole::new([
        "files".to_string(),
        format!("load {}", quoted(&path)),
        format!("activate {}", quoted(&path)),
        "set x 1".to_string(),
        "set x 1".to_string(),
        "files".to_string(),
        "save".to_string(),
    ]);
    repl.run(&mut console);

    let notices: Vec<&str> = console
        .output
        .iter()
        .filter(|(tone, _)| *tone == Tone::Notice)
        .map(|(_, line)| line.as_str())
        .collect();
    assert_eq!(notices, vec!["No files loaded.", "'x' already holds that value."]);
    assert!(console
        .transcript()
        .contains(&format!("* {} [modified]", path.display())));
}
