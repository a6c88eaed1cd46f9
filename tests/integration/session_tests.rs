use morlock::console::ScriptedConsole;
use morlock::error::ErrorKind;
use morlock::lock::Argon2Hasher;
use morlock::session::{Outcome, Session, SessionSettings};
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

const AUDIO: &[u8] = b"ID3\x04\x00\x00\x00\x00\x00\x00\xff\xfb\x90\x64";

fn new_session() -> Session {
    Session::new(SessionSettings::default())
        .with_hasher(Box::new(Argon2Hasher::with_params(8, 1, 1).unwrap()))
}

fn song(dir: &TempDir, name: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, AUDIO).unwrap();
    path
}

#[test]
fn test_session_workflow_full() {
    let dir = tempdir().unwrap();
    let path = song(&dir, "song.mp3");
    let mut console = ScriptedConsole::default();

    // 1. Load a file without a header and edit it
    let mut session = new_session();
    session.load(&path, &mut console).unwrap();
    session.activate(&path).unwrap();
    session.set("data.volume", json!(5)).unwrap();
    session.set("tags[0]", json!("rock")).unwrap();
    session.set("tags[1]", json!("live")).unwrap();
    session.set("album.year", json!(1999)).unwrap();

    let listed: serde_json::Value = serde_json::from_str(&session.list(None).unwrap()).unwrap();
    assert_eq!(
        listed["data"],
        json!({"volume": 5, "tags": ["rock", "live"], "album": {"year": 1999}})
    );

    // 2. Save and reload from disk
    session.save(None).unwrap();
    session.reload(&path, &mut console).unwrap();
    let reloaded: serde_json::Value =
        serde_json::from_str(&session.list(Some(&path)).unwrap()).unwrap();
    assert_eq!(listed, reloaded);

    // 3. The audio payload is untouched
    let bytes = fs::read(&path).unwrap();
    assert!(bytes.ends_with(AUDIO));

    // 4. A fresh session sees the same document
    let mut fresh = new_session();
    fresh.load(&path, &mut console).unwrap();
    assert_eq!(
        fresh.get(&path).unwrap().document().unwrap().data["volume"],
        json!(5)
    );
}

#[test]
fn test_reload_keeps_file_inactive() {
    let dir = tempdir().unwrap();
    let path = song(&dir, "song.mp3");
    let mut console = ScriptedConsole::default();
    let mut session = new_session();

    session.load(&path, &mut console).unwrap();
    session.activate(&path).unwrap();
    session.reload(&path, &mut console).unwrap();
    assert!(session.is_loaded(&path));
    assert_eq!(session.active(), None);
}

#[test]
fn test_reload_discards_on_confirmation() {
    let dir = tempdir().unwrap();
    let path = song(&dir, "song.mp3");
    let mut console = ScriptedConsole::new(["y"]);
    let mut session = new_session();

    session.load(&path, &mut console).unwrap();
    session.activate(&path).unwrap();
    session.set("x", json!(1)).unwrap();
    session.reload(&path, &mut console).unwrap();

    let file = session.get(&path).unwrap();
    assert!(!file.modified);
    assert!(file.document().unwrap().data.is_empty());
}

#[test]
fn test_load_errors() {
    let dir = tempdir().unwrap();
    let mut console = ScriptedConsole::default();
    let mut session = new_session();

    let err = session
        .load(&dir.path().join("missing.mp3"), &mut console)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let wav = dir.path().join("song.wav");
    fs::write(&wav, AUDIO).unwrap();
    let err = session.load(&wav, &mut console).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);

    let broken = dir.path().join("broken.mp3");
    fs::write(&broken, b"<morlock>{\"name\":null,\"data\":{}}</morlock>ID3").unwrap();
    let err = session.load(&broken, &mut console).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Corrupted);

    assert_eq!(session.files().count(), 0);
}

#[test]
fn test_custom_extension_setting() {
    let dir = tempdir().unwrap();
    let wav = dir.path().join("song.wav");
    fs::write(&wav, AUDIO).unwrap();
    let settings = SessionSettings {
        extensions: vec!["wav".to_string()],
        ..SessionSettings::default()
    };
    let mut session = Session::new(settings);
    let mut console = ScriptedConsole::default();
    assert_eq!(
        session.load(&wav, &mut console).unwrap(),
        Outcome::Loaded(wav.clone())
    );
}

#[test]
fn test_lock_flow_across_sessions() {
    let dir = tempdir().unwrap();
    let path = song(&dir, "song.mp3");
    let mut console = ScriptedConsole::new(["secret"]);

    let mut session = new_session();
    session.load(&path, &mut console).unwrap();
    session.activate(&path).unwrap();
    session.lock(None, &mut console).unwrap();
    assert!(session.get(&path).unwrap().modified);
    session.save(None).unwrap();
    assert!(session.get(&path).unwrap().is_locked());

    // Changing the password requires the current one
    console.push("nope");
    let err = session.lock(None, &mut console).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert!(!session.get(&path).unwrap().modified);

    console.push("secret");
    console.push("better");
    session.lock(None, &mut console).unwrap();
    session.save(None).unwrap();

    let mut other = new_session();
    console.push("secret");
    let err = other.load(&path, &mut console).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);

    console.push("better");
    other.load(&path, &mut console).unwrap();
    assert_eq!(console.remaining(), 0);
}

#[test]
fn test_empty_new_password_rejected() {
    let dir = tempdir().unwrap();
    let path = song(&dir, "song.mp3");
    let mut console = ScriptedConsole::new([""]);
    let mut session = new_session();
    session.load(&path, &mut console).unwrap();

    let err = session.lock(Some(&path), &mut console).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(!session.get(&path).unwrap().is_locked());
}

#[test]
fn test_wipe_and_clear_are_distinct() {
    let dir = tempdir().unwrap();
    let a = song(&dir, "a.mp3");
    let b = song(&dir, "b.mp3");
    let mut console = ScriptedConsole::new(["pw"]);
    let mut session = new_session();

    for path in [&a, &b] {
        session.load(path, &mut console).unwrap();
        session.activate(path).unwrap();
        session.rename(Some("label".into())).unwrap();
        session.set("k", json!("v")).unwrap();
        session.save(None).unwrap();
        session.deactivate().unwrap();
    }

    session.clear(Some(&a)).unwrap();
    session.save(Some(&a)).unwrap();
    let bytes = fs::read(&a).unwrap();
    assert!(bytes.starts_with(b"<morlock>{\"name\":\"label\",\"password\":null,\"data\":{}}</morlock>"));

    session.wipe(Some(&b)).unwrap();
    assert_eq!(session.save(Some(&b)).unwrap(), Outcome::Erased(b.clone()));
    assert_eq!(fs::read(&b).unwrap(), AUDIO.to_vec());
    assert!(!session.is_loaded(&b));
}

#[test]
fn test_header_with_garbage_prefix_loads() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("song.mp3");
    let mut raw = b"junk<morlock>xx{\"name\":\"n\",\"password\":null,\"data\":{\"a\":[1]}}</morlock>"
        .to_vec();
    raw.extend_from_slice(AUDIO);
    fs::write(&path, &raw).unwrap();

    let mut console = ScriptedConsole::default();
    let mut session = new_session();
    session.load(&path, &mut console).unwrap();
    let file = session.get(&path).unwrap();
    assert_eq!(file.document().unwrap().data["a"], json!([1]));
    assert_eq!(file.payload, AUDIO.to_vec());
}

#[test]
fn test_non_ascii_values_survive_save() {
    let dir = tempdir().unwrap();
    let path = song(&dir, "song.mp3");
    let mut console = ScriptedConsole::default();
    let mut session = new_session();
    session.load(&path, &mut console).unwrap();
    session.activate(&path).unwrap();
    session.set("title", json!("Señor <ID3> 🎵")).unwrap();
    session.save(None).unwrap();
    session.deactivate().unwrap();
    session.unload(&path, &mut console).unwrap();

    session.load(&path, &mut console).unwrap();
    assert_eq!(
        session.get(&path).unwrap().document().unwrap().data["title"],
        json!("Señor <ID3> 🎵")
    );
    assert!(fs::read(&path).unwrap().ends_with(AUDIO));
}
