//! bundle.conf derivation for an OCI image component
//!
//! Top-level fields come from the default table unless overridden. The
//! field order depends on whether anything was overridden at all, and
//! consumers that diff or hash bundle.conf rely on both orders staying
//! exactly as they are.

use std::fmt;

use log::{debug, trace};

use super::annotations::annotation_tree;
use super::conf::{ConfObject, ConfValue};
use super::defaults::{
    ANNOTATIONS_KEY, COMPONENTS_KEY, DEFAULT_FIELDS, Field, FieldDefault, HOST_ENV_SUFFIX,
    NAME_KEY, OCI_IMAGE_FILE_SYSTEM_TYPE, OCI_IMAGE_TAG_COMMAND, OVERRIDE_ORDER,
    STATUS_CHECK_COMMAND, STATUS_COMPONENT_DESCRIPTION, STATUS_COMPONENT_SUFFIX, TAGS_KEY,
    UNIVERSAL_FILE_SYSTEM_TYPE,
};
use super::params::BundleParameters;
use crate::oci::{ExposedPort, ImageMetadata};

/// A network endpoint of a component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub bind_protocol: String,
    pub bind_port: u16,
    pub service_name: String,
}

impl Endpoint {
    fn to_conf(&self) -> ConfObject {
        ConfObject::new()
            .with("bind-protocol", self.bind_protocol.as_str())
            .with("bind-port", self.bind_port)
            .with("service-name", self.service_name.as_str())
    }
}

/// A runnable unit of a bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub description: String,
    pub file_system_type: String,
    pub start_command: Vec<String>,
    /// Endpoint id to endpoint, in declaration order
    pub endpoints: Vec<(String, Endpoint)>,
}

impl Component {
    fn to_conf(&self) -> ConfObject {
        let endpoints = self
            .endpoints
            .iter()
            .fold(ConfObject::new(), |obj, (id, endpoint)| {
                obj.with(id.as_str(), endpoint.to_conf())
            });

        ConfObject::new()
            .with("description", self.description.as_str())
            .with("file-system-type", self.file_system_type.as_str())
            .with("start-command", ConfValue::strings(&self.start_command))
            .with("endpoints", endpoints)
    }
}

/// A complete bundle descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct BundleConfiguration {
    pub name: String,
    /// Top-level fields between `name` and `annotations`, in emission order
    pub fields: Vec<(&'static str, ConfValue)>,
    pub annotations: ConfObject,
    /// Component id to component, in emission order
    pub components: Vec<(String, Component)>,
}

impl BundleConfiguration {
    /// Look up a top-level field by key
    pub fn field(&self, key: &str) -> Option<&ConfValue> {
        self.fields.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn component(&self, id: &str) -> Option<&Component> {
        self.components.iter().find(|(k, _)| k == id).map(|(_, c)| c)
    }

    /// The whole descriptor as a document tree
    pub fn to_conf(&self) -> ConfObject {
        let mut doc = ConfObject::new().with(NAME_KEY, self.name.as_str());
        for (key, value) in &self.fields {
            doc.insert(*key, value.clone());
        }
        doc.insert(ANNOTATIONS_KEY, self.annotations.clone());

        let components = self
            .components
            .iter()
            .fold(ConfObject::new(), |obj, (id, component)| {
                obj.with(id.as_str(), component.to_conf())
            });
        doc.with(COMPONENTS_KEY, components)
    }

    /// bundle.conf text, without a trailing newline
    pub fn render(&self) -> String {
        self.to_conf().render()
    }
}

impl fmt::Display for BundleConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Endpoint id and service name for a port: `<component>-<protocol>-<port>`
pub fn endpoint_name(component_id: &str, port: &ExposedPort) -> String {
    format!("{component_id}-{}-{}", port.protocol, port.port)
}

/// Environment variable prefix for a component: upper-cased, `-` as `_`
pub fn env_var_name(component_id: &str) -> String {
    component_id.to_uppercase().replace('-', "_")
}

/// `$<COMPONENT>_<PROTOCOL>_<PORT>_HOST`, the variable carrying an endpoint's address
pub fn endpoint_host_var(component_id: &str, port: &ExposedPort) -> String {
    format!(
        "${}_{}_{}{HOST_ENV_SUFFIX}",
        env_var_name(component_id),
        port.protocol.to_uppercase(),
        port.port
    )
}

fn default_field_value(default: FieldDefault, params: &BundleParameters) -> ConfValue {
    match default {
        FieldDefault::Text(text) => ConfValue::string(text),
        FieldDefault::Integer(n) => ConfValue::from(n),
        FieldDefault::Decimal(d) => ConfValue::decimal(d),
        FieldDefault::EmptyList => ConfValue::List(Vec::new()),
        FieldDefault::BundleName => ConfValue::string(params.name.as_str()),
    }
}

fn top_level_fields(params: &BundleParameters) -> Vec<(&'static str, ConfValue)> {
    let overrides = &params.overrides;
    let order: Vec<Field> = if overrides.is_empty() {
        DEFAULT_FIELDS.iter().map(|(field, _)| *field).collect()
    } else {
        OVERRIDE_ORDER.to_vec()
    };

    let mut fields: Vec<(&'static str, ConfValue)> = order
        .into_iter()
        .map(|field| {
            let value = overrides
                .value(field)
                .unwrap_or_else(|| default_field_value(field.default_value(), params));
            (field.key(), value)
        })
        .collect();

    // the tag only stands in for the version when no version was given
    let tags = match overrides.version {
        Some(_) => Vec::new(),
        None => vec![params.tag.clone()],
    };
    fields.push((TAGS_KEY, ConfValue::strings(tags)));
    fields
}

fn image_component(
    metadata: &ImageMetadata,
    component_id: &str,
    params: &BundleParameters,
) -> Component {
    let ports: &[ExposedPort] = if params.use_default_endpoints {
        &metadata.exposed_ports
    } else {
        &[]
    };
    let endpoints = ports
        .iter()
        .map(|port| {
            let name = endpoint_name(component_id, port);
            let endpoint = Endpoint {
                bind_protocol: port.protocol.clone(),
                bind_port: port.port,
                service_name: name.clone(),
            };
            (name, endpoint)
        })
        .collect();

    Component {
        description: params.component_description.clone(),
        file_system_type: OCI_IMAGE_FILE_SYSTEM_TYPE.to_string(),
        start_command: vec![OCI_IMAGE_TAG_COMMAND.to_string(), params.tag.clone()],
        endpoints,
    }
}

fn status_component(metadata: &ImageMetadata, component_id: &str) -> Component {
    let mut start_command = vec![STATUS_CHECK_COMMAND.to_string()];
    start_command.extend(
        metadata
            .exposed_ports
            .iter()
            .map(|port| endpoint_host_var(component_id, port)),
    );

    Component {
        description: STATUS_COMPONENT_DESCRIPTION.to_string(),
        file_system_type: UNIVERSAL_FILE_SYSTEM_TYPE.to_string(),
        start_command,
        endpoints: Vec::new(),
    }
}

/// Derive the bundle descriptor for an OCI image component
///
/// Exactly one image component is emitted under `component_id`. Its
/// endpoints, and a `<component_id>-status` companion checking them, are
/// only derived from the exposed ports when default endpoints are enabled.
pub fn oci_image_bundle_conf(
    component_id: &str,
    metadata: &ImageMetadata,
    params: &BundleParameters,
) -> BundleConfiguration {
    trace!("🔧 Building bundle.conf for component {component_id}");

    let mut components = vec![(
        component_id.to_string(),
        image_component(metadata, component_id, params),
    )];
    if params.use_default_endpoints && !metadata.exposed_ports.is_empty() {
        let status_id = format!("{component_id}{STATUS_COMPONENT_SUFFIX}");
        debug!(
            "🩺 Adding {status_id} for {} endpoints",
            metadata.exposed_ports.len()
        );
        components.push((status_id, status_component(metadata, component_id)));
    }

    BundleConfiguration {
        name: params.name.clone(),
        fields: top_level_fields(params),
        annotations: annotation_tree(&metadata.annotations, &params.annotations),
        components,
    }
}
