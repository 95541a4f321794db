use derive_more::Display;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::CodecCreateError;

/// The configuration of a codec.
pub type Configuration = serde_json::Map<String, serde_json::Value>;

/// The metadata of a codec: its name and configuration.
///
/// Serialised as `{"name": ..., "configuration": {...}}`, with the configuration omitted if empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Display)]
#[display("{}", serde_json::to_string(self).unwrap_or_default())]
pub struct CodecMetadata {
    name: String,
    #[serde(default, skip_serializing_if = "Configuration::is_empty")]
    configuration: Configuration,
}

impl CodecMetadata {
    /// Create codec metadata with an empty configuration.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            configuration: Configuration::new(),
        }
    }

    /// Create codec metadata with a configuration.
    #[must_use]
    pub fn new_with_configuration(name: impl Into<String>, configuration: Configuration) -> Self {
        Self {
            name: name.into(),
            configuration,
        }
    }

    /// Create codec metadata with a serialisable configuration.
    ///
    /// # Errors
    /// Returns [`CodecCreateError::InvalidConfiguration`] if `configuration` does not serialise to a JSON object.
    pub fn new_with_serializable_configuration<T: Serialize>(
        name: impl Into<String>,
        configuration: &T,
    ) -> Result<Self, CodecCreateError> {
        let name = name.into();
        match serde_json::to_value(configuration) {
            Ok(serde_json::Value::Object(configuration)) => Ok(Self {
                name,
                configuration,
            }),
            Ok(_) => Err(CodecCreateError::InvalidConfiguration {
                name,
                reason: "the configuration is not a JSON object".to_string(),
            }),
            Err(err) => Err(CodecCreateError::InvalidConfiguration {
                name,
                reason: err.to_string(),
            }),
        }
    }

    /// The codec name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The codec configuration.
    #[must_use]
    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// Deserialise the configuration.
    ///
    /// # Errors
    /// Returns [`CodecCreateError::InvalidConfiguration`] if the configuration does not match `T`.
    pub fn to_configuration<T: DeserializeOwned>(&self) -> Result<T, CodecCreateError> {
        serde_json::from_value(serde_json::Value::Object(self.configuration.clone())).map_err(
            |err| CodecCreateError::InvalidConfiguration {
                name: self.name.clone(),
                reason: err.to_string(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct LevelConfiguration {
        level: u32,
    }

    #[test]
    fn codec_metadata_serde() -> Result<(), Box<dyn std::error::Error>> {
        let metadata = CodecMetadata::new_with_serializable_configuration(
            "gzip",
            &LevelConfiguration { level: 5 },
        )?;
        assert_eq!(
            serde_json::to_string(&metadata)?,
            r#"{"name":"gzip","configuration":{"level":5}}"#
        );
        assert_eq!(metadata.to_string(), r#"{"name":"gzip","configuration":{"level":5}}"#);
        assert_eq!(
            metadata.to_configuration::<LevelConfiguration>()?,
            LevelConfiguration { level: 5 }
        );

        let metadata: CodecMetadata = serde_json::from_str(r#"{"name":"fletcher32"}"#)?;
        assert_eq!(metadata, CodecMetadata::new("fletcher32"));
        assert_eq!(serde_json::to_string(&metadata)?, r#"{"name":"fletcher32"}"#);
        assert!(metadata.to_configuration::<LevelConfiguration>().is_err());
        Ok(())
    }

    #[test]
    fn codec_metadata_not_an_object() {
        assert!(CodecMetadata::new_with_serializable_configuration("x", &1u8).is_err());
    }
}
