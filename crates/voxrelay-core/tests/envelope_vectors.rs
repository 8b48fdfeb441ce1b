//! Envelope wire vector tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use voxrelay_core::audio::AudioChunk;
use voxrelay_core::protocol::{decode, encode, Envelope};

use vector_loader::load;

fn chunk_lens(env: &Envelope) -> Vec<usize> {
    match env {
        Envelope::Audio(c) => vec![c.len()],
        Envelope::Playback(cs) => cs.iter().map(AudioChunk::len).collect(),
        Envelope::Ping | Envelope::Pong => vec![],
    }
}

#[test]
fn envelope_vectors() {
    let files = [
        "audio_ok.json",
        "audio_extra_fields.json",
        "ping.json",
        "pong.json",
        "playback_batch.json",
        "not_json.json",
        "missing_type.json",
        "unknown_type.json",
        "audio_missing_data.json",
        "audio_bad_base64.json",
    ];

    for f in files {
        let v = load(f);
        let res = decode(&v.frame);

        if let Some(err) = v.expect_error {
            let e = res.expect_err("expected error");
            assert_eq!(e.code().as_str(), err.code, "vector={}", v.description);
            continue;
        }

        let env = res.expect("expected ok envelope");
        let ex = v.expect.expect("missing expect block");
        assert_eq!(env.kind().as_str(), ex.kind, "vector={}", v.description);
        assert_eq!(chunk_lens(&env), ex.chunk_lens, "vector={}", v.description);

        // everything that decodes re-encodes to the same envelope
        let again = decode(&encode(&env).unwrap()).unwrap();
        assert_eq!(again, env, "vector={}", v.description);
    }
}

#[test]
fn binary_payload_survives_text_framing() {
    let payload: Vec<u8> = (0..=255u8).collect();
    let env = Envelope::Audio(AudioChunk::new(payload.clone()));
    let text = encode(&env).unwrap();
    assert!(text.is_ascii());
    match decode(&text).unwrap() {
        Envelope::Audio(c) => assert_eq!(c.as_bytes(), payload.as_slice()),
        other => panic!("unexpected {other:?}"),
    }
}
