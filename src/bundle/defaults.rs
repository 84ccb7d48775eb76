// Centralized bundle.conf defaults and fixed names

/// Top-level bundle.conf fields that callers may override
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Roles,
    CompatibilityVersion,
    DiskSpace,
    Memory,
    NrOfCpus,
    Version,
    System,
    SystemVersion,
}

impl Field {
    /// Key as written in bundle.conf
    pub const fn key(self) -> &'static str {
        match self {
            Field::Roles => "roles",
            Field::CompatibilityVersion => "compatibilityVersion",
            Field::DiskSpace => "diskSpace",
            Field::Memory => "memory",
            Field::NrOfCpus => "nrOfCpus",
            Field::Version => "version",
            Field::System => "system",
            Field::SystemVersion => "systemVersion",
        }
    }

    /// Built-in value used when the field is not overridden
    pub fn default_value(self) -> FieldDefault {
        DEFAULT_FIELDS
            .iter()
            .find(|(field, _)| *field == self)
            .map(|(_, default)| *default)
            .unwrap_or(FieldDefault::EmptyList)
    }
}

/// Shape of a built-in default
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldDefault {
    /// Rendered quoted
    Text(&'static str),
    /// Rendered as a bare integer
    Integer(u64),
    /// Rendered as a bare decimal
    Decimal(f64),
    /// Rendered `[]`
    EmptyList,
    /// The bundle name, quoted
    BundleName,
}

// =================================
// Field defaults
// =================================
pub const DEFAULT_VERSION: &str = "1";
pub const DEFAULT_COMPATIBILITY_VERSION: &str = "0";
pub const DEFAULT_SYSTEM_VERSION: &str = "1";
pub const DEFAULT_DISK_SPACE: u64 = 1_073_741_824; // 1 GiB
pub const DEFAULT_MEMORY: u64 = 402_653_184; // 384 MiB
pub const DEFAULT_NR_OF_CPUS: f64 = 0.1;

/// Defaults in the order they are written when nothing is overridden
pub const DEFAULT_FIELDS: [(Field, FieldDefault); 8] = [
    (Field::Roles, FieldDefault::EmptyList),
    (
        Field::CompatibilityVersion,
        FieldDefault::Text(DEFAULT_COMPATIBILITY_VERSION),
    ),
    (Field::DiskSpace, FieldDefault::Integer(DEFAULT_DISK_SPACE)),
    (Field::Memory, FieldDefault::Integer(DEFAULT_MEMORY)),
    (Field::NrOfCpus, FieldDefault::Decimal(DEFAULT_NR_OF_CPUS)),
    (Field::Version, FieldDefault::Text(DEFAULT_VERSION)),
    (Field::System, FieldDefault::BundleName),
    (Field::SystemVersion, FieldDefault::Text(DEFAULT_SYSTEM_VERSION)),
];

/// Field order once any field is overridden
pub const OVERRIDE_ORDER: [Field; 8] = [
    Field::Version,
    Field::CompatibilityVersion,
    Field::System,
    Field::SystemVersion,
    Field::NrOfCpus,
    Field::Memory,
    Field::DiskSpace,
    Field::Roles,
];

// =================================
// Document keys
// =================================
pub const NAME_KEY: &str = "name";
pub const TAGS_KEY: &str = "tags";
pub const ANNOTATIONS_KEY: &str = "annotations";
pub const COMPONENTS_KEY: &str = "components";

// =================================
// Components
// =================================
pub const OCI_IMAGE_FILE_SYSTEM_TYPE: &str = "oci-image";
pub const UNIVERSAL_FILE_SYSTEM_TYPE: &str = "universal";
pub const OCI_IMAGE_TAG_COMMAND: &str = "ociImageTag";
pub const STATUS_COMPONENT_SUFFIX: &str = "-status";
pub const STATUS_COMPONENT_DESCRIPTION: &str = "Status check for oci-image component";
pub const STATUS_CHECK_COMMAND: &str = "check";
pub const HOST_ENV_SUFFIX: &str = "_HOST";

// =================================
// Bundle layout on disk
// =================================
pub const BUNDLE_CONF_FILE: &str = "bundle.conf";
pub const OCI_IMAGE_DIR: &str = "oci-image";
pub const DEFAULT_TAG: &str = "latest";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let table: Vec<(&str, FieldDefault)> = DEFAULT_FIELDS
            .iter()
            .map(|(field, default)| (field.key(), *default))
            .collect();

        assert_eq!(
            table,
            vec![
                ("roles", FieldDefault::EmptyList),
                ("compatibilityVersion", FieldDefault::Text("0")),
                ("diskSpace", FieldDefault::Integer(1073741824)),
                ("memory", FieldDefault::Integer(402653184)),
                ("nrOfCpus", FieldDefault::Decimal(0.1)),
                ("version", FieldDefault::Text("1")),
                ("system", FieldDefault::BundleName),
                ("systemVersion", FieldDefault::Text("1")),
            ]
        );
    }

    #[test]
    fn test_override_order_covers_every_field() {
        for (field, default) in DEFAULT_FIELDS {
            assert!(OVERRIDE_ORDER.contains(&field));
            assert_eq!(field.default_value(), default);
        }
    }
}
