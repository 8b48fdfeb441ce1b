#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use voxrelay_gateway::config::{self, BroadcastPolicy};

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
gateway:
  listen: "0.0.0.0:8000"
relay:
  polcy: echo # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.code().as_str(), "CONFIG");
}

#[test]
fn ok_minimal_config() {
    let cfg = config::load_from_str("version: 1\n").expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.gateway.listen, "0.0.0.0:8000");
    assert_eq!(cfg.relay.policy, BroadcastPolicy::FanOut);
    assert!(cfg.gateway.idle_timeout().is_none());
}

#[test]
fn policies_parse() {
    for (text, expect) in [
        ("fan_out", BroadcastPolicy::FanOut),
        ("echo", BroadcastPolicy::Echo),
        ("replay", BroadcastPolicy::Replay),
    ] {
        let cfg = config::load_from_str(&format!("version: 1\nrelay:\n  policy: {text}\n"))
            .expect("must parse");
        assert_eq!(cfg.relay.policy, expect);
    }
}

#[test]
fn rejects_out_of_range_values() {
    let cases = [
        "version: 2\n",
        "version: 1\ngateway:\n  listen: \"not-an-addr\"\n",
        "version: 1\ngateway:\n  queue_depth: 0\n",
        "version: 1\ngateway:\n  ping_interval_ms: 20000\n  idle_timeout_ms: 10000\n",
        "version: 1\nrelay:\n  replay:\n    record_ms: 10\n",
    ];
    for c in cases {
        assert!(config::load_from_str(c).is_err(), "case={c}");
    }
}

#[test]
fn shipped_config_is_valid() {
    config::load_from_file("voxrelay.yaml").expect("shipped config must load");
}
