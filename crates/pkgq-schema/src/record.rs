use serde::{Deserialize, Serialize};

use crate::types::Location;
use crate::version::{coerce_semver, parse_drv_name};

/// Metadata extracted from one package node.
///
/// Records built from a live catalog node and records read back from the
/// crawl cache are interchangeable field for field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageRecord {
    /// Where the package lives in the catalog.
    pub location: Location,
    /// Full derivation name (e.g. `hello-2.12.1`).
    pub name: String,
    /// Short name without the version (e.g. `hello`).
    pub pname: String,
    /// Version string as declared by the package.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Version coerced to a semantic version, when possible.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semver: Option<semver::Version>,
    /// SPDX license identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    /// All output names.
    #[serde(default)]
    pub outputs: Vec<String>,
    /// Outputs installed when none are requested explicitly.
    #[serde(default)]
    pub outputs_to_install: Vec<String>,
    /// Whether the package is marked broken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broken: Option<bool>,
    /// Whether the package has an unfree license.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unfree: Option<bool>,
}

impl PackageRecord {
    /// Create a record from a full name, filling `pname`, `version`, and
    /// `semver` from explicit values or, failing that, from the name.
    ///
    /// # Example
    ///
    /// ```
    /// use pkgq_schema::{Location, PackageRecord, Prefix};
    ///
    /// let loc = Location::new(Prefix::direct("x86_64-linux"), vec!["hello".into()]);
    /// let rec = PackageRecord::new(loc, "hello-2.12", None, None);
    /// assert_eq!(rec.pname, "hello");
    /// assert_eq!(rec.version.as_deref(), Some("2.12"));
    /// assert_eq!(rec.semver.unwrap().to_string(), "2.12.0");
    /// ```
    pub fn new(
        location: Location,
        name: impl Into<String>,
        pname: Option<String>,
        version: Option<String>,
    ) -> Self {
        let name = name.into();
        let (parsed_pname, parsed_version) = parse_drv_name(&name);
        let pname = pname.unwrap_or_else(|| parsed_pname.to_string());
        let version = version.or_else(|| parsed_version.map(str::to_string));
        let semver = version.as_deref().and_then(coerce_semver);
        Self {
            location,
            pname,
            version,
            semver,
            license: None,
            outputs: vec!["out".to_string()],
            outputs_to_install: vec!["out".to_string()],
            broken: None,
            unfree: None,
            name,
        }
    }

    /// Final attribute name of the package's path.
    pub fn attr_name(&self) -> &str {
        self.location.attr_name().unwrap_or(&self.pname)
    }
}
