use anywhere::config::{Config, ConfigError};
use serial_test::serial;

const VARS: &[&str] = &[
    "JWT_SECRET",
    "BIND_ADDR",
    "TOKEN_TTL_MINUTES",
    "MEDIA_MAX_IMAGE_BYTES",
    "S3_ENDPOINT",
    "S3_BUCKET",
    "ENABLE_HSTS",
    "FRONTEND_URL",
];

fn clear() {
    for v in VARS {
        std::env::remove_var(v);
    }
}

#[test]
#[serial]
fn reads_process_environment() {
    clear();
    std::env::set_var("JWT_SECRET", "an-environment-secret-of-32-chars!");
    std::env::set_var("BIND_ADDR", "127.0.0.1:9000");
    std::env::set_var("MEDIA_MAX_IMAGE_BYTES", "1024");
    std::env::set_var("ENABLE_HSTS", "true");
    std::env::set_var("S3_ENDPOINT", "http://minio:9000");
    std::env::set_var("FRONTEND_URL", "  ");

    let cfg = Config::from_env().unwrap();
    assert_eq!(cfg.bind_addr, "127.0.0.1:9000");
    assert_eq!(cfg.media_limits.max_image_bytes, 1024);
    assert!(cfg.enable_hsts);
    let s3 = cfg.s3.expect("s3 configured");
    assert_eq!(s3.endpoint, "http://minio:9000");
    assert_eq!(s3.bucket, "anywhere-media");
    // blank counts as unset
    assert_eq!(cfg.frontend_url, "http://localhost:5173");
    clear();
}

#[test]
#[serial]
fn missing_secret_is_an_error() {
    clear();
    assert_eq!(Config::from_env().unwrap_err(), ConfigError::Missing("JWT_SECRET"));

    std::env::set_var("JWT_SECRET", "an-environment-secret-of-32-chars!");
    std::env::set_var("MEDIA_MAX_IMAGE_BYTES", "lots");
    let err = Config::from_env().unwrap_err();
    assert_eq!(err.to_string(), "MEDIA_MAX_IMAGE_BYTES has an invalid value 'lots'");
    clear();
}
