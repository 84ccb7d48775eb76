//! Caller-supplied bundle parameters

use super::conf::ConfValue;
use super::defaults::Field;
use crate::oci::AnnotationValue;

/// Overrides for top-level bundle.conf fields
///
/// Overridden values are written as given, always quoted; numeric-looking
/// strings like `"8"` are never reinterpreted as numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleOverrides {
    pub version: Option<String>,
    pub compatibility_version: Option<String>,
    pub system: Option<String>,
    pub system_version: Option<String>,
    pub nr_of_cpus: Option<String>,
    pub memory: Option<String>,
    pub disk_space: Option<String>,
    pub roles: Option<Vec<String>>,
}

impl BundleOverrides {
    /// True when no field is overridden
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Rendered value of an overridden field
    pub fn value(&self, field: Field) -> Option<ConfValue> {
        let text = match field {
            Field::Roles => return self.roles.as_ref().map(|r| ConfValue::strings(r.clone())),
            Field::Version => &self.version,
            Field::CompatibilityVersion => &self.compatibility_version,
            Field::System => &self.system,
            Field::SystemVersion => &self.system_version,
            Field::NrOfCpus => &self.nr_of_cpus,
            Field::Memory => &self.memory,
            Field::DiskSpace => &self.disk_space,
        };
        text.as_deref().map(ConfValue::string)
    }
}

/// Everything the caller decides about a bundle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BundleParameters {
    /// Bundle name, also the default `system`
    pub name: String,
    pub component_description: String,
    /// Image tag the component starts with
    pub tag: String,
    pub overrides: BundleOverrides,
    /// Derive endpoints and a status-check component from the exposed ports
    pub use_default_endpoints: bool,
    /// Extra annotations; merged after the manifest's and winning on conflict
    pub annotations: Vec<(String, AnnotationValue)>,
}

impl BundleParameters {
    pub fn new<N, D, T>(name: N, component_description: D, tag: T) -> Self
    where
        N: Into<String>,
        D: Into<String>,
        T: Into<String>,
    {
        Self {
            name: name.into(),
            component_description: component_description.into(),
            tag: tag.into(),
            overrides: BundleOverrides::default(),
            use_default_endpoints: true,
            annotations: Vec::new(),
        }
    }

    pub fn with_overrides(mut self, overrides: BundleOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_default_endpoints(mut self, enabled: bool) -> Self {
        self.use_default_endpoints = enabled;
        self
    }

    pub fn with_annotation<K: Into<String>, V: Into<AnnotationValue>>(
        mut self,
        key: K,
        value: V,
    ) -> Self {
        self.annotations.push((key.into(), value.into()));
        self
    }
}
