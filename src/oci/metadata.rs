//! Image metadata the bundle builder consumes
//!
//! Only two things are read out of an image: the manifest annotations and
//! the exposed ports of the image config. Both are optional in an OCI
//! image, so a missing structure reads as "none".

use std::fmt;

use log::{debug, trace, warn};
use serde_json::{Number, Value};

use crate::exceptions::{BndlError, Result};

/// Protocol assumed for an exposed port declared without one
pub const DEFAULT_PORT_PROTOCOL: &str = "tcp";

/// Scalar annotation value, kept in its native type for rendering
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationValue {
    String(String),
    Number(Number),
    Bool(bool),
}

impl AnnotationValue {
    /// Convert a JSON value; `None` for null, arrays and objects
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(AnnotationValue::String(s.clone())),
            Value::Number(n) => Some(AnnotationValue::Number(n.clone())),
            Value::Bool(b) => Some(AnnotationValue::Bool(*b)),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Read a command-line value: integers and floats become numbers, the rest strings
    pub fn parse(raw: &str) -> Self {
        if let Ok(n) = raw.parse::<i64>() {
            return AnnotationValue::Number(n.into());
        }
        if let Some(n) = raw.parse::<f64>().ok().and_then(Number::from_f64) {
            if raw.contains('.') {
                return AnnotationValue::Number(n);
            }
        }
        AnnotationValue::String(raw.to_string())
    }
}

impl From<&str> for AnnotationValue {
    fn from(s: &str) -> Self {
        AnnotationValue::String(s.to_string())
    }
}

impl From<String> for AnnotationValue {
    fn from(s: String) -> Self {
        AnnotationValue::String(s)
    }
}

impl From<i64> for AnnotationValue {
    fn from(n: i64) -> Self {
        AnnotationValue::Number(n.into())
    }
}

/// A port declared in the image config's `ExposedPorts`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExposedPort {
    pub port: u16,
    pub protocol: String,
}

impl ExposedPort {
    pub fn new<S: Into<String>>(port: u16, protocol: S) -> Self {
        Self {
            port,
            protocol: protocol.into(),
        }
    }

    /// Parse a Docker-style `<port>[/<protocol>]` key
    pub fn parse(key: &str) -> Result<Self> {
        let (port, protocol) = match key.split_once('/') {
            Some((port, protocol)) => (port, protocol),
            None => (key, DEFAULT_PORT_PROTOCOL),
        };
        if protocol.is_empty() || protocol.contains('/') {
            return Err(BndlError::InvalidMetadata(format!(
                "Invalid exposed port protocol in '{key}'"
            )));
        }
        let port = port.parse::<u16>().map_err(|e| {
            BndlError::InvalidMetadata(format!("Invalid exposed port '{key}': {e}"))
        })?;
        Ok(Self::new(port, protocol.to_ascii_lowercase()))
    }
}

impl fmt::Display for ExposedPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.port, self.protocol)
    }
}

/// Manifest annotations and exposed ports of one image
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageMetadata {
    /// Annotations in manifest order; keys may be dotted paths
    pub annotations: Vec<(String, AnnotationValue)>,
    /// Exposed ports in config order, each `port/protocol` once
    pub exposed_ports: Vec<ExposedPort>,
}

impl ImageMetadata {
    /// Extract metadata from a parsed image manifest and image config
    ///
    /// # Errors
    ///
    /// Returns an error if an exposed port key is not `<port>[/<protocol>]`.
    pub fn from_documents(manifest: &Value, config: &Value) -> Result<Self> {
        let mut metadata = ImageMetadata::default();

        if let Some(annotations) = manifest.get("annotations").and_then(Value::as_object) {
            for (key, value) in annotations {
                match AnnotationValue::from_json(value) {
                    Some(value) => metadata.annotations.push((key.clone(), value)),
                    None => warn!("⚠️ Skipping non-scalar annotation '{key}'"),
                }
            }
        }

        let exposed = config
            .get("config")
            .and_then(|c| c.get("ExposedPorts"))
            .and_then(Value::as_object);
        if let Some(exposed) = exposed {
            for key in exposed.keys() {
                let port = ExposedPort::parse(key)?;
                if metadata.exposed_ports.contains(&port) {
                    debug!("Exposed port '{key}' repeats {port}, skipping");
                    continue;
                }
                metadata.exposed_ports.push(port);
            }
        }

        trace!(
            "📊 Image metadata: {} annotations, {} exposed ports",
            metadata.annotations.len(),
            metadata.exposed_ports.len()
        );
        Ok(metadata)
    }
}
