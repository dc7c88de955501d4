use serde::de::DeserializeOwned;

/// Failure to read a caller-supplied configuration document.
#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Parse(e) => write!(f, "invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Parse(e) => Some(e),
        }
    }
}

/// Parses a JSON configuration object; absent fields take their defaults.
pub fn parse_json_config<T: DeserializeOwned>(text: &str) -> Result<T, ConfigError> {
    serde_json::from_str(text).map_err(ConfigError::Parse)
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::{ConfigError, parse_json_config};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        #[serde(default)]
        n: u32,
    }

    #[test]
    fn parses_and_defaults() {
        assert_eq!(parse_json_config::<Sample>("{}").unwrap(), Sample { n: 0 });
        assert_eq!(
            parse_json_config::<Sample>(r#"{"n": 4}"#).unwrap(),
            Sample { n: 4 }
        );
    }

    #[test]
    fn reports_parse_errors() {
        let err = parse_json_config::<Sample>(r#"{"n": "four"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().starts_with("invalid configuration"));
    }
}
