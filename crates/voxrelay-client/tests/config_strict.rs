#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::time::Duration;

use voxrelay_client::config::{self, SourceSpec};
use voxrelay_core::audio::{AudioFormat, CaptureMode};

#[test]
fn minimal_config_uses_documented_defaults() {
    let cfg = config::load_from_str("version: 1\n").expect("must parse");
    let session = cfg.relay.session();
    assert_eq!(session.heartbeat_interval, Duration::from_secs(30));
    assert_eq!(session.reconnect_delay, Duration::from_secs(3));

    let enc = cfg.capture.encoder();
    assert_eq!(enc.mode, CaptureMode::CompleteFile);
    assert_eq!(enc.window, Duration::from_millis(500));
    assert_eq!(enc.slice, Duration::from_millis(100));
    assert_eq!(enc.formats, vec![AudioFormat::Wav, AudioFormat::L16]);

    let re = cfg.playback.reassembler();
    assert_eq!(re.batch_gap, Duration::from_millis(50));
    assert!(re.known_format.is_none());
    assert!(cfg.playback.output.is_none());
}

#[test]
fn unknown_fields_are_rejected() {
    let bad = r#"
version: 1
playback:
  batch_gap: 50 # should be batch_gap_ms
"#;
    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.code().as_str(), "CONFIG");
}

#[test]
fn source_variants_parse() {
    let cfg = config::load_from_str(
        r#"
version: 1
capture:
  mode: streaming_slice
  source:
    kind: wav_file
    path: "input.wav"
playback:
  known_format: l16
"#,
    )
    .expect("must parse");
    assert_eq!(cfg.capture.mode, CaptureMode::StreamingSlice);
    assert_eq!(
        cfg.capture.source,
        SourceSpec::WavFile {
            path: "input.wav".into()
        }
    );
    assert_eq!(cfg.playback.known_format, Some(AudioFormat::L16));
}

#[test]
fn out_of_range_values_are_rejected() {
    for bad in [
        "version: 2\n",
        "version: 1\nrelay:\n  url: \"http://example.com\"\n",
        "version: 1\nrelay:\n  reconnect_delay_ms: 0\n",
        "version: 1\ncapture:\n  formats: []\n",
        "version: 1\ncapture:\n  source:\n    kind: tone\n    channels: 6\n",
        "version: 1\nplayback:\n  stream:\n    sample_rate: 0\n    channels: 1\n",
    ] {
        let err = config::load_from_str(bad).expect_err(bad);
        assert_eq!(err.code().as_str(), "CONFIG", "{bad}");
    }
}

#[test]
fn shipped_config_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/voxrelay-client.yaml");
    let cfg = config::load_from_file(path).expect("shipped config must load");
    assert!(cfg.capture.enabled);
    assert!(matches!(cfg.capture.source, SourceSpec::Tone { .. }));
}
