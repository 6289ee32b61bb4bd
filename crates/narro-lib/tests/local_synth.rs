//! Exercises the local provider against a shell script standing in for the
//! real executable. Kept to one test so only one script is ever being
//! written while processes are spawned.
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use narro_lib::narro_core::types::LocalTtsConfig;
use narro_lib::synth::{LocalSynthesizer, SpeechSynthesizer, SynthError};
use pretty_assertions::assert_eq;

const FAKE_TTS: &str = r#"#!/bin/sh
while [ $# -gt 0 ]; do
  case "$1" in
    --text) text="$2"; shift 2 ;;
    --out_path) out="$2"; shift 2 ;;
    --model_name) model="$2"; shift 2 ;;
    *) shift ;;
  esac
done
if [ "$model" = "missing-model" ]; then
  echo "model missing-model not found" >&2
  exit 3
fi
printf '%s' "$text" > "$out"
printf '%s' "$model" > "$out.model"
"#;

fn install_script(dir: &Path) -> std::path::PathBuf {
    let script = dir.join("fake-tts");
    std::fs::write(&script, FAKE_TTS).unwrap();
    let mut perms = std::fs::metadata(&script).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&script, perms).unwrap();
    script
}

#[tokio::test]
async fn local_executable_contract() {
    let dir = tempfile::tempdir().unwrap();
    let script = install_script(dir.path());

    // Success: text truncated to 20000 chars, written by the process itself.
    let ok = LocalSynthesizer::new(LocalTtsConfig {
        executable: script.clone(),
        model: "tts_models/en/test".into(),
    });
    let dest = dir.path().join("story.mp3");
    let text = "y".repeat(25_000);
    ok.synthesize(&text, &dest).await.expect("synthesize");

    let written = std::fs::read_to_string(&dest).unwrap();
    assert_eq!(written.chars().count(), 20_000);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("story.mp3.model")).unwrap(),
        "tts_models/en/test"
    );

    // Failure: non-zero exit surfaces stderr.
    let failing = LocalSynthesizer::new(LocalTtsConfig {
        executable: script,
        model: "missing-model".into(),
    });
    let dest = dir.path().join("never.mp3");
    let err = failing.synthesize("hello", &dest).await.unwrap_err();
    match err {
        SynthError::Provider(msg) => assert_eq!(msg, "model missing-model not found"),
        other => panic!("expected provider error, got {other:?}"),
    }
    assert!(!dest.exists());
}
