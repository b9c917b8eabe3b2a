//! Config environment variable tests
//!
//! These tests verify that Config::from_env() correctly reads and applies
//! environment variable overrides, and that malformed values are rejected
//! instead of silently replaced by defaults.
//!
//! Tests use #[serial] to prevent race conditions with shared env vars.

use std::env;
use std::io::Write;

use linkography_engine::config::{Config, LogFormat};
use linkography_engine::metrics::MetricWeights;
use linkography_engine::AppError;
use serial_test::serial;

#[test]
#[serial]
fn test_config_from_env_defaults() {
    let config = Config::from_env().unwrap();

    assert!((config.engine.similarity_threshold - 0.35).abs() < f64::EPSILON);
    assert_eq!(config.engine.max_link_range, 15);
    assert_eq!(config.embedding.dimensions, 384);
    assert_eq!(config.request.max_retries, 3);
    assert_eq!(config.weights, MetricWeights::default());
}

#[test]
#[serial]
fn test_config_from_env_engine_overrides() {
    env::set_var("LINKOGRAPHY_SIMILARITY_THRESHOLD", "0.5");
    env::set_var("LINKOGRAPHY_MAX_LINK_RANGE", "8");
    env::set_var("LINKOGRAPHY_CRITICAL_MOVE_FRACTION", "0.2");
    env::set_var("LINKOGRAPHY_INCLUDE_INTERSECTIONS", "false");

    let config = Config::from_env().unwrap();
    assert!((config.engine.similarity_threshold - 0.5).abs() < f64::EPSILON);
    assert_eq!(config.engine.max_link_range, 8);
    assert!((config.engine.critical_move_fraction - 0.2).abs() < f64::EPSILON);
    assert!(!config.engine.include_intersections);
    // untouched
    assert_eq!(config.engine.chunk_window_size, 5);

    // Cleanup
    env::remove_var("LINKOGRAPHY_SIMILARITY_THRESHOLD");
    env::remove_var("LINKOGRAPHY_MAX_LINK_RANGE");
    env::remove_var("LINKOGRAPHY_CRITICAL_MOVE_FRACTION");
    env::remove_var("LINKOGRAPHY_INCLUDE_INTERSECTIONS");
}

#[test]
#[serial]
fn test_config_invalid_number_is_rejected() {
    env::set_var("LINKOGRAPHY_MAX_LINK_RANGE", "fifteen");

    let result = Config::from_env();
    env::remove_var("LINKOGRAPHY_MAX_LINK_RANGE");

    match result {
        Err(AppError::Config { message }) => {
            assert!(message.contains("LINKOGRAPHY_MAX_LINK_RANGE"));
            assert!(message.contains("fifteen"));
        }
        other => panic!("Expected config error, got {:?}", other.map(|_| ())),
    }
}

#[test]
#[serial]
fn test_config_out_of_range_threshold_is_rejected() {
    env::set_var("LINKOGRAPHY_SIMILARITY_THRESHOLD", "1.5");

    let result = Config::from_env();
    env::remove_var("LINKOGRAPHY_SIMILARITY_THRESHOLD");

    let err = result.unwrap_err();
    assert!(err.to_string().contains("similarity_threshold"));
}

#[test]
#[serial]
fn test_config_zero_window_is_rejected() {
    env::set_var("LINKOGRAPHY_CHUNK_WINDOW_SIZE", "0");

    let result = Config::from_env();
    env::remove_var("LINKOGRAPHY_CHUNK_WINDOW_SIZE");

    assert!(matches!(result, Err(AppError::Config { .. })));
}

#[test]
#[serial]
fn test_config_from_env_embedding_service() {
    env::set_var("EMBEDDING_BASE_URL", "https://embeddings.example.com");
    env::set_var("EMBEDDING_MODEL", "text-embedding-3-small");
    env::set_var("EMBEDDING_API_KEY", "sk-test");
    env::set_var("EMBEDDING_DIMENSIONS", "1536");

    let config = Config::from_env().unwrap();
    assert_eq!(config.embedding.base_url, "https://embeddings.example.com");
    assert_eq!(config.embedding.model, "text-embedding-3-small");
    assert_eq!(config.embedding.api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.embedding.dimensions, 1536);

    // Cleanup
    env::remove_var("EMBEDDING_BASE_URL");
    env::remove_var("EMBEDDING_MODEL");
    env::remove_var("EMBEDDING_API_KEY");
    env::remove_var("EMBEDDING_DIMENSIONS");
}

#[test]
#[serial]
fn test_config_empty_api_key_is_none() {
    env::set_var("EMBEDDING_API_KEY", "");

    let config = Config::from_env().unwrap();
    assert!(config.embedding.api_key.is_none());

    env::remove_var("EMBEDDING_API_KEY");
}

#[test]
#[serial]
fn test_config_zero_dimensions_is_rejected() {
    env::set_var("EMBEDDING_DIMENSIONS", "0");

    let result = Config::from_env();
    env::remove_var("EMBEDDING_DIMENSIONS");

    assert!(matches!(result, Err(AppError::Config { .. })));
}

#[test]
#[serial]
fn test_config_from_env_json_log_format() {
    env::set_var("LOG_FORMAT", "json");
    env::set_var("LOG_LEVEL", "debug");

    let config = Config::from_env().unwrap();
    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(config.logging.level, "debug");

    // Cleanup
    env::remove_var("LOG_FORMAT");
    env::remove_var("LOG_LEVEL");
}

#[test]
#[serial]
fn test_config_from_env_custom_request() {
    env::set_var("REQUEST_TIMEOUT_MS", "60000");
    env::set_var("MAX_RETRIES", "5");
    env::set_var("RETRY_DELAY_MS", "2000");

    let config = Config::from_env().unwrap();
    assert_eq!(config.request.timeout_ms, 60000);
    assert_eq!(config.request.max_retries, 5);
    assert_eq!(config.request.retry_delay_ms, 2000);

    // Cleanup
    env::remove_var("REQUEST_TIMEOUT_MS");
    env::remove_var("MAX_RETRIES");
    env::remove_var("RETRY_DELAY_MS");
}

#[test]
#[serial]
fn test_config_excessive_retries_rejected() {
    env::set_var("MAX_RETRIES", "70");

    let result = Config::from_env();
    env::remove_var("MAX_RETRIES");

    match result {
        Err(AppError::Config { message }) => {
            assert!(message.contains("MAX_RETRIES"));
            assert!(message.contains("70"));
        }
        other => panic!("Expected config error, got {:?}", other.map(|_| ())),
    }
}

#[test]
#[serial]
fn test_config_weights_file() {
    let mut weights = MetricWeights::default();
    weights.density_saturation = 4.5;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", serde_json::to_string(&weights).unwrap()).unwrap();

    env::set_var("LINKOGRAPHY_WEIGHTS_PATH", file.path());
    let result = Config::from_env();
    env::remove_var("LINKOGRAPHY_WEIGHTS_PATH");

    let config = result.unwrap();
    assert_eq!(config.weights.density_saturation, 4.5);
    assert_eq!(config.weights, weights);
}

#[test]
#[serial]
fn test_config_missing_weights_file_is_rejected() {
    env::set_var("LINKOGRAPHY_WEIGHTS_PATH", "/nonexistent/linkography-weights.json");
    let result = Config::from_env();
    env::remove_var("LINKOGRAPHY_WEIGHTS_PATH");

    let err = result.unwrap_err();
    assert!(err.to_string().contains("cannot read weights file"));
}
