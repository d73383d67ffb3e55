//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    let config: GatewayConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::BodyPolicy;

    const SAMPLE: &str = r#"
        [listener]
        bind_address = "127.0.0.1:8081"

        [upstream]
        endpoint = "http://127.0.0.1:50051"

        [[routes]]
        name = "detect"
        method = "POST"
        pattern = "/detect_face"
        rpc = "/com.sekirocc.face_service.FaceService/Detect"

        [[routes]]
        name = "get_face"
        method = "GET"
        pattern = "/v1/faces/{face_id}"
        rpc = "/com.sekirocc.face_service.FaceService/GetFace"
        body = "none"
    "#;

    #[test]
    fn test_parse_sample() {
        let config = parse_config(SAMPLE).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:8081");
        assert_eq!(config.routes.len(), 2);
        assert_eq!(config.routes[0].body, BodyPolicy::Decode);
        assert_eq!(config.routes[1].body, BodyPolicy::Ignore);
        assert_eq!(config.timeouts.request_secs, 30);
        assert!(config.marshal.msgpack);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert!(config.upstream.is_none());
        assert!(config.routes.is_empty());
    }

    #[test]
    fn test_validation_errors_are_collected() {
        let err = parse_config(
            r#"
            [timeouts]
            request_secs = 0

            [[routes]]
            name = "bad"
            method = "post"
            pattern = "detect"
            rpc = "Detect"
            "#,
        )
        .unwrap_err();

        match err {
            ConfigError::Validation(errors) => assert!(errors.len() >= 4, "{:?}", errors),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/gateway.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
