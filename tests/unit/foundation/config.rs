use super::*;

#[test]
fn defaults_match_link_protocol_constants() {
    let opts = TransferOpts::default();
    assert_eq!(opts.chunk_max, 100);
    assert_eq!(opts.ack_timeout(), Duration::from_millis(500));
    assert_eq!(opts.max_attempts, 3);
    assert_eq!(opts.accept_timeout(), Duration::from_secs(3));
    assert_eq!(opts.finished_timeout(), Some(Duration::from_secs(10)));
    opts.validate().unwrap();
}

#[test]
fn validate_rejects_unusable_chunk_sizes() {
    let mut opts = TransferOpts {
        chunk_max: 0,
        ..TransferOpts::default()
    };
    assert!(opts.validate().is_err());
    opts.chunk_max = 256;
    assert!(opts.validate().is_err());
    opts.chunk_max = 255;
    assert!(opts.validate().is_ok());
}

#[test]
fn validate_rejects_zero_attempts() {
    let opts = TransferOpts {
        max_attempts: 0,
        ..TransferOpts::default()
    };
    assert!(opts.validate().is_err());
}

#[test]
fn partial_json_fills_in_defaults() {
    let opts: TransferOpts =
        serde_json::from_str(r#"{ "chunk_max": 20, "finished_timeout_ms": null }"#).unwrap();
    assert_eq!(opts.chunk_max, 20);
    assert_eq!(opts.finished_timeout(), None);
    assert_eq!(opts.max_attempts, 3);
}
