use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use crate::catalog::CatalogSource;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::platform::{current_platform, current_x_platform, x_platform_from};
use crate::template::{find_placeholder_in, RenderContext};

/// Rendering passes applied to a merged option set. Placeholders are not
/// recursive, so anything still unresolved after this is an error.
const MAX_RENDER_PASSES: usize = 2;

/// Options later split into words; values substituted into them are quoted.
const COMMAND_FIELDS: [&str; 2] = ["extract", "test"];

/// The options shared by manifest templates, version blocks and settings
/// overrides.
#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct PackageOptions {
    /// External invoker. When set, the resolved binary becomes its first argument.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub exec: String,
    /// Bin name to path relative to the output directory.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub bins: BTreeMap<String, String>,
    /// URL of the artifact to download.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source: String,
    /// Command fed the downloaded artifact on stdin.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub extract: String,
    /// Self-test command.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub test: String,
    /// Expected SHA-256 of the downloaded artifact, hex encoded.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sha256: String,
}

impl PackageOptions {
    /// Merges a higher-precedence option set into this one.
    ///
    /// Non-empty scalars replace ours; bins are unioned, `higher` winning on
    /// duplicate keys.
    pub fn merge(&mut self, higher: &PackageOptions) {
        merge_scalar(&mut self.exec, &higher.exec);
        merge_scalar(&mut self.source, &higher.source);
        merge_scalar(&mut self.extract, &higher.extract);
        merge_scalar(&mut self.test, &higher.test);
        merge_scalar(&mut self.sha256, &higher.sha256);
        for (bin, path) in &higher.bins {
            self.bins.insert(bin.clone(), path.clone());
        }
    }
}

fn merge_scalar(target: &mut String, value: &str) {
    if !value.is_empty() {
        *target = value.to_string();
    }
}

/// A `[[versions]]` block: options applied when the selected version falls
/// inside `range`.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VersionBlock {
    pub range: String,
    #[serde(flatten)]
    pub options: PackageOptions,
}

/// A package manifest template as stored in the catalog.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ManifestTemplate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Default version, used when nothing pins one.
    #[serde(default)]
    pub version: String,
    #[serde(flatten)]
    pub options: PackageOptions,
    #[serde(default)]
    pub versions: Vec<VersionBlock>,
}

impl ManifestTemplate {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<ManifestTemplate> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::MalformedManifest {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Base options overridden, in declaration order, by every version block
    /// whose range contains `version`.
    pub fn options_for(&self, version: &Version) -> PackageOptions {
        let mut options = self.options.clone();
        for block in &self.versions {
            let range = match block.range.parse::<VersionRange>() {
                Ok(range) => range,
                Err(e) => {
                    log::warn!("Ignoring version block \"{}\" of {}: {e}", block.range, self.name);
                    continue;
                }
            };
            if range.matches(version) {
                log::debug!("Applying version block \"{}\" of {}", block.range, self.name);
                options.merge(&block.options);
            }
        }
        options
    }
}

/// A version range label such as `>=1.2.0 <2.0.0 || 3.x`.
///
/// Comparators may be separated by spaces or commas and alternatives by `||`.
/// A bare full version means exactly that version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    alternatives: Vec<VersionReq>,
}

impl VersionRange {
    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }
}

impl FromStr for VersionRange {
    type Err = semver::Error;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        let alternatives = raw
            .split("||")
            .map(|alternative| VersionReq::parse(&normalize_comparators(alternative)))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(VersionRange { alternatives })
    }
}

fn normalize_comparators(alternative: &str) -> String {
    let mut comparators: Vec<String> = Vec::new();
    let mut pending_op = String::new();
    for token in alternative.split(|c: char| c == ',' || c.is_whitespace()) {
        if token.is_empty() {
            continue;
        }
        if token.chars().all(|c| "<>=~^".contains(c)) {
            pending_op.push_str(token);
            continue;
        }
        let comparator = format!("{}{}", std::mem::take(&mut pending_op), token);
        let bare_full_version = comparator.starts_with(|c: char| c.is_ascii_digit())
            && Version::parse(&comparator).is_ok();
        if bare_full_version {
            comparators.push(format!("={comparator}"));
        } else {
            comparators.push(comparator);
        }
    }
    if comparators.is_empty() {
        return "*".to_string();
    }
    comparators.join(", ")
}

/// A fully resolved and rendered manifest for one package at one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageManifest {
    pub name: String,
    pub description: String,
    pub version: String,
    pub platform: String,
    pub options: PackageOptions,
    /// `<packages>/<name>/<version>`
    pub output_dir: PathBuf,
}

impl PackageManifest {
    /// Declared bin names, sorted.
    pub fn bin_names(&self) -> Vec<String> {
        self.options.bins.keys().cloned().collect()
    }

    /// Absolute path of `bin` inside the output directory.
    pub fn bin_path(&self, bin: &str) -> Result<PathBuf> {
        let relative = self.options.bins.get(bin).ok_or_else(|| Error::BinNotFound {
            name: self.name.clone(),
            bin: bin.to_string(),
            available: self.bin_names(),
        })?;
        Ok(self.output_dir.join(relative))
    }

    /// Checks that the manifest can be fetched: a non-empty, fully rendered
    /// source and a version.
    pub fn validate_for_fetch(&self) -> Result<()> {
        if self.version.is_empty() {
            return Err(self.incomplete("version", "is empty"));
        }
        if self.options.source.is_empty() {
            return Err(self.incomplete("source", "is empty"));
        }
        if self.options.source.contains("${") {
            return Err(self.incomplete(
                "source",
                &format!("has unresolved placeholders: {}", self.options.source),
            ));
        }
        Ok(())
    }

    fn incomplete(&self, field: &str, detail: &str) -> Error {
        Error::IncompleteManifest {
            name: self.name.clone(),
            version: self.version.clone(),
            field: field.to_string(),
            detail: detail.to_string(),
        }
    }
}

impl fmt::Display for PackageManifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Turns catalog templates into [`PackageManifest`]s.
pub struct Resolver<'a> {
    ctx: &'a Context,
    catalog: &'a dyn CatalogSource,
}

impl<'a> Resolver<'a> {
    pub fn new(ctx: &'a Context, catalog: &'a dyn CatalogSource) -> Resolver<'a> {
        Resolver { ctx, catalog }
    }

    /// Loads the template for `name`, fetching the catalog first if there is
    /// no local copy.
    pub fn template(&self, name: &str) -> Result<ManifestTemplate> {
        self.catalog.ensure_present()?;
        let path = self.catalog.manifest_path(name);
        if !path.is_file() {
            return Err(Error::PackageNotFound {
                name: name.to_string(),
                path,
            });
        }
        ManifestTemplate::load(&path)
    }

    /// Resolves `name` at `version` (or the settings pin, or the template
    /// default), merging matching version blocks, then settings overrides,
    /// then `overrides`, and rendering every placeholder.
    pub fn resolve(
        &self,
        name: &str,
        version: Option<&str>,
        overrides: Option<&PackageOptions>,
    ) -> Result<PackageManifest> {
        let template = self.template(name)?;
        if template.name != name {
            log::debug!("Manifest for {name} declares name \"{}\"", template.name);
        }

        let version = version
            .or_else(|| self.ctx.settings.pinned_version(name))
            .unwrap_or(template.version.as_str())
            .trim()
            .to_string();
        let parsed = Version::parse(&version).map_err(|e| Error::InvalidVersion {
            name: name.to_string(),
            reason: if version.is_empty() {
                "no version pinned and the manifest declares no default".to_string()
            } else {
                e.to_string()
            },
            version: version.clone(),
        })?;

        let mut options = template.options_for(&parsed);
        let package_settings = self.ctx.settings.package(name);
        if let Some(settings) = package_settings {
            options.merge(&settings.options);
        }
        if let Some(overrides) = overrides {
            options.merge(overrides);
        }

        let platform = package_settings
            .and_then(|settings| settings.platform.clone())
            .unwrap_or_else(current_platform);
        let x_platform = match package_settings.and_then(|s| s.platform.as_deref()) {
            Some(platform) => x_platform_from(platform),
            None => current_x_platform(),
        };
        let output_dir = self.ctx.paths.package_dir(name, &version);
        let render = RenderContext {
            version: version.clone(),
            platform: platform.clone(),
            x_platform,
            output: output_dir.display().to_string(),
        };

        let mut options = render_options(name, &version, options, &render)?;
        if options.bins.is_empty() {
            options.bins.insert(name.to_string(), name.to_string());
        }

        let manifest = PackageManifest {
            name: name.to_string(),
            description: template.description,
            version,
            platform,
            options,
            output_dir,
        };
        manifest.validate_for_fetch()?;
        log::debug!("Resolved {manifest}: {:?}", manifest.options);
        Ok(manifest)
    }
}

/// Renders a merged option set through its serialized form, at most
/// [`MAX_RENDER_PASSES`] times.
fn render_options(
    name: &str,
    version: &str,
    options: PackageOptions,
    render: &RenderContext,
) -> Result<PackageOptions> {
    let malformed = |message: String| Error::MalformedManifest {
        path: PathBuf::from(format!("{name}@{version}")),
        message,
    };
    let mut value = toml::Value::try_from(&options).map_err(|e| malformed(e.to_string()))?;
    let quoted = render.shell_quoted();
    for _ in 0..MAX_RENDER_PASSES {
        let mut changed = false;
        if let toml::Value::Table(table) = &mut value {
            for (field, item) in table.iter_mut() {
                let ctx = if COMMAND_FIELDS.contains(&field.as_str()) { &quoted } else { render };
                changed |= ctx.render_value(item);
            }
        }
        if !changed {
            break;
        }
    }

    if let toml::Value::Table(table) = &value {
        for (field, item) in table {
            if let Some(token) = find_placeholder_in(item) {
                return Err(Error::IncompleteManifest {
                    name: name.to_string(),
                    version: version.to_string(),
                    field: field.clone(),
                    detail: format!("has unresolved placeholder {token}"),
                });
            }
        }
    }

    value.try_into().map_err(|e: toml::de::Error| malformed(e.to_string()))
}
