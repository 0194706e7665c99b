//! Audio source enumeration
//!
//! Produces the typed source list an external selection UI presents; the
//! chosen `id` goes straight back into [`AudioCaptureHandle::start`].
//!
//! [`AudioCaptureHandle::start`]: super::AudioCaptureHandle::start

use cpal::traits::{DeviceTrait, HostTrait};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Audio source information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSource {
    /// Identifier accepted by the capture layer
    pub id: String,

    /// Display name
    pub name: String,

    /// Source type
    pub source_type: SourceType,
}

/// Type of audio source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// The system default input device
    DefaultInput,

    /// A named input device (microphone, line-in)
    InputDevice,
}

/// Audio source errors
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to enumerate devices: {0}")]
    EnumerationError(String),
}

/// List available capture sources.
pub fn list_sources() -> Result<Vec<AudioSource>, SourceError> {
    let mut sources = Vec::new();

    let host = cpal::default_host();

    if let Some(device) = host.default_input_device() {
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        sources.push(AudioSource {
            id: "default".to_string(),
            name: format!("Default Input ({device_name})"),
            source_type: SourceType::DefaultInput,
        });
    }

    let devices = host
        .input_devices()
        .map_err(|e| SourceError::EnumerationError(e.to_string()))?;
    for device in devices {
        if let Ok(name) = device.name() {
            sources.push(AudioSource {
                id: format!("input:{name}"),
                name: format!("Input: {name}"),
                source_type: SourceType::InputDevice,
            });
        }
    }

    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_type_serializes_as_snake_case() {
        let json = serde_json::to_string(&SourceType::DefaultInput).unwrap();
        assert_eq!(json, "\"default_input\"");
    }

    #[test]
    fn source_round_trips_through_json() {
        let source = AudioSource {
            id: "input:Mic".to_string(),
            name: "Input: Mic".to_string(),
            source_type: SourceType::InputDevice,
        };

        let json = serde_json::to_string(&source).unwrap();
        let back: AudioSource = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, source.id);
        assert_eq!(back.source_type, source.source_type);
    }
}
