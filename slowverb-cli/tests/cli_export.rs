use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

fn slowverb() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("slowverb"))
}

fn write_tone(path: &Path, seconds: f32, sample_rate: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
    let frames = (seconds * sample_rate as f32) as usize;
    for n in 0..frames {
        let phase = 2.0 * std::f32::consts::PI * 220.0 * n as f32 / sample_rate as f32;
        writer
            .write_sample((phase.sin() * 10_000.0) as i16)
            .expect("write sample");
    }
    writer.finalize().expect("finalize wav");
}

#[test]
fn create_settings_json_prints_defaults() {
    slowverb()
        .args(["create", "settings-json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"speed\": 0.85"))
        .stdout(predicate::str::contains("\"reverb_mix\": 0.5"))
        .stdout(predicate::str::contains("\"eq_gains\""));
}

#[test]
fn export_writes_default_name_into_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("tone.wav");
    write_tone(&input, 0.5, 8_000);
    let out_dir = dir.path().join("out");
    std::fs::create_dir(&out_dir).expect("out dir");

    slowverb()
        .arg("export")
        .arg(&input)
        .args(["--speed", "0.5", "--output"])
        .arg(&out_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "tone_Slower+Reverb_slowedandreverbgenerator.com.wav",
        ));

    let written = out_dir.join("tone_Slower+Reverb_slowedandreverbgenerator.com.wav");
    let reader = hound::WavReader::open(&written).expect("open export");
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.spec().sample_rate, 8_000);
    assert_eq!(reader.spec().bits_per_sample, 16);
    assert_eq!(reader.duration(), 8_000);
}

#[cfg(not(feature = "mp3"))]
#[test]
fn mp3_export_falls_back_to_wav() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("clip.wav");
    write_tone(&input, 0.2, 8_000);

    slowverb()
        .arg("export")
        .arg(&input)
        .args(["--format", "mp3"])
        .assert()
        .success()
        .stdout(predicate::str::contains(".wav"))
        .stderr(predicate::str::contains("wrote wav instead"));

    let written = dir
        .path()
        .join("clip_Slower+Reverb_slowedandreverbgenerator.com.wav");
    assert!(written.exists());
}

#[cfg(feature = "mp3")]
#[test]
fn mp3_export_writes_mp3() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("clip.wav");
    write_tone(&input, 0.5, 44_100);

    slowverb()
        .arg("export")
        .arg(&input)
        .args(["--format", "mp3"])
        .assert()
        .success()
        .stdout(predicate::str::contains(".mp3"));

    let written = dir
        .path()
        .join("clip_Slower+Reverb_slowedandreverbgenerator.com.mp3");
    let bytes = std::fs::read(&written).expect("read mp3");
    assert!(bytes.windows(2).any(|w| w[0] == 0xFF && w[1] & 0xE0 == 0xE0));
}

#[test]
fn brand_comes_from_environment() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("a.wav");
    write_tone(&input, 0.1, 8_000);

    slowverb()
        .env("SLOWVERB_BRAND", "example.org")
        .arg("export")
        .arg(&input)
        .assert()
        .success();

    assert!(dir.path().join("a_Slower+Reverb_example.org.wav").exists());
}

#[test]
fn explicit_output_file_is_used() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("b.wav");
    write_tone(&input, 0.1, 8_000);
    let output = dir.path().join("custom.wav");

    slowverb()
        .arg("export")
        .arg(&input)
        .arg("--output")
        .arg(&output)
        .assert()
        .success();

    assert!(output.exists());
}

#[test]
fn undecodable_input_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("junk.mp3");
    std::fs::write(&input, [0x42_u8; 128]).expect("write junk");

    slowverb()
        .arg("export")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not load audio"));
}

#[test]
fn bad_eq_list_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("c.wav");
    write_tone(&input, 0.1, 8_000);

    slowverb()
        .arg("export")
        .arg(&input)
        .args(["--eq", "1,2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected 9 eq gains"));
}
