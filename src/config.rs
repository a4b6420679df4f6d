//! Site configuration module.
//!
//! Handles loading, validating, and resolving the single `staticpage.toml`
//! that drives a build. User files are sparse: they are merged key-by-key on
//! top of the stock defaults, then deserialized with unknown keys rejected.
//!
//! ## Configuration Options
//!
//! ```toml
//! clean_before_build = false
//!
//! [dirs]
//! site = "web/_sites"        # Output root
//! pages = "web/pages"        # Page sources (.html templates, .md documents)
//! templates = "web/templates"
//! static = "web/static"
//! cdn = "web/cdn"            # Staging root published to the object store
//! data = "web/data"
//! sass = "web/sass"
//!
//! [urls]
//! home = "https://example.com"
//! static = "/static"         # Also the output subpath for static assets
//! cdn = "https://cdn.example.com"
//!
//! [pages]
//! execute = true
//! only_index = true          # about.html -> about/index.html
//! skip_for_index = ["404\\.html"]
//!
//! [minify]
//! execute = true
//! extensions = [".html", ".css", ".js"]
//! skip_files = []
//! skip_dirs = []
//!
//! [gzip]
//! execute = true
//! extensions = [".html", ".css", ".js"]
//! skip_files = []
//!
//! [sass]
//! execute = false
//! output_style = "nested"    # nested | expanded | compressed
//! destination = "static"     # static | cdn
//!
//! [cdn]
//! execute = false
//! bucket_name = "my-cdn"
//! aws_access_key = "$ENV:CDN_ACCESS_KEY"
//! ```
//!
//! ## Environment Substitution
//!
//! Any string value of the form `"$ENV:NAME"` is replaced with the value of
//! the environment variable `NAME` before deserialization. A missing variable
//! is a configuration error, so credentials never silently become empty.
//!
//! ## Relative Directories
//!
//! Relative `[dirs]` entries are resolved against the directory containing
//! the config file, so a build behaves the same from any working directory.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

use crate::filter::compile_patterns;
use crate::minify::MinifyKind;

/// Default config file name looked up by the CLI.
pub const DEFAULT_CONFIG_FILE: &str = "staticpage.toml";

const ENV_PREFIX: &str = "$ENV:";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("environment variable {0} referenced by config is not set")]
    MissingEnv(String),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Full build configuration.
///
/// All sections have defaults; only `[dirs]` entries needed by the enabled
/// stages are required (see [`SiteConfig::validate`]).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Remove the output root before any stage runs.
    pub clean_before_build: bool,
    pub dirs: DirsConfig,
    pub urls: UrlsConfig,
    pub pages: PageConfig,
    #[serde(rename = "static")]
    pub static_files: StaticConfig,
    pub minify: MinifyConfig,
    pub gzip: GzipConfig,
    pub sass: SassConfig,
    pub cdn: CdnConfig,
    pub processing: ProcessingConfig,
}

/// Named filesystem roots shared by every stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DirsConfig {
    /// Output root.
    pub site: PathBuf,
    pub pages: PathBuf,
    pub templates: PathBuf,
    #[serde(rename = "static")]
    pub static_files: PathBuf,
    /// Staging root whose contents are published to the object store.
    pub cdn: PathBuf,
    pub data: PathBuf,
    pub sass: PathBuf,
}

/// Base URLs injected into templates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UrlsConfig {
    pub home: String,
    #[serde(rename = "static")]
    pub static_files: String,
    pub cdn: String,
}

impl UrlsConfig {
    /// Output subpath for static assets: the static URL without its leading
    /// slash, or `static` when unset.
    pub fn static_subpath(&self) -> PathBuf {
        let trimmed = self.static_files.trim_matches('/');
        if trimmed.is_empty() {
            PathBuf::from("static")
        } else {
            PathBuf::from(trimmed)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PageConfig {
    pub execute: bool,
    /// Rewrite `name.html` to `name/index.html`.
    pub only_index: bool,
    /// File-name patterns exempt from the index rewrite.
    pub skip_for_index: Vec<String>,
    /// Extra values available in every template context.
    pub globals: BTreeMap<String, toml::Value>,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            execute: false,
            only_index: true,
            skip_for_index: Vec::new(),
            globals: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StaticConfig {
    pub execute: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MinifyConfig {
    pub execute: bool,
    pub extensions: Vec<String>,
    pub skip_files: Vec<String>,
    pub skip_dirs: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GzipConfig {
    pub execute: bool,
    pub extensions: Vec<String>,
    pub skip_files: Vec<String>,
}

/// Stylesheet output style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStyle {
    #[default]
    Nested,
    Expanded,
    Compressed,
}

/// Where compiled stylesheets are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SassDestination {
    /// `<site>/<static-subpath>/css/`, with local variants.
    #[default]
    #[serde(rename = "static", alias = "local-static")]
    Static,
    /// `<cdn>/css/`, left for the publish stage.
    #[serde(rename = "cdn", alias = "remote-staging")]
    Cdn,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SassConfig {
    pub execute: bool,
    pub output_style: OutputStyle,
    pub destination: SassDestination,
}

/// Remote object store settings. Identity fields are opaque strings handed
/// to the store client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CdnConfig {
    pub execute: bool,
    pub service_name: String,
    pub region_name: String,
    pub endpoint: String,
    pub bucket_name: String,
    pub object_key_prefix: String,
    pub aws_access_key: String,
    pub aws_secret_access_key: String,
    /// Canned ACL sent with every upload; empty sends none.
    pub acl: String,
}

impl Default for CdnConfig {
    fn default() -> Self {
        Self {
            execute: false,
            service_name: "s3".to_string(),
            region_name: String::new(),
            endpoint: String::new(),
            bucket_name: String::new(),
            object_key_prefix: String::new(),
            aws_access_key: String::new(),
            aws_secret_access_key: String::new(),
            acl: "public-read".to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel file workers. `None` means all cores;
    /// larger values are clamped down to the core count.
    pub max_processes: Option<usize>,
}

/// Resolve the effective worker count: user can constrain down, not up.
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map_or(cores, |n| n.clamp(1, cores))
}

impl SiteConfig {
    /// Check that every enabled stage has what it needs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut required: Vec<(&str, &Path)> = vec![("dirs.site", &self.dirs.site)];
        if self.pages.execute {
            required.push(("dirs.pages", &self.dirs.pages));
            required.push(("dirs.templates", &self.dirs.templates));
        }
        if self.static_files.execute {
            required.push(("dirs.static", &self.dirs.static_files));
        }
        if self.sass.execute {
            required.push(("dirs.sass", &self.dirs.sass));
            if self.sass.destination == SassDestination::Cdn {
                required.push(("dirs.cdn", &self.dirs.cdn));
            }
        }
        if self.cdn.execute {
            required.push(("dirs.cdn", &self.dirs.cdn));
        }
        for (key, dir) in &required {
            if dir.as_os_str().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "{key} is required by the enabled stages"
                )));
            }
        }

        if self.cdn.execute && self.cdn.bucket_name.is_empty() {
            return Err(ConfigError::Validation(
                "cdn.bucket_name is required when cdn.execute is set".into(),
            ));
        }

        for ext in &self.minify.extensions {
            let bare = ext.trim_start_matches('.');
            if MinifyKind::from_extension(bare).is_none() {
                return Err(ConfigError::Validation(format!(
                    "minify.extensions: {ext} cannot be minified (supported: html, htm, css, js)"
                )));
            }
        }

        let pattern_lists = [
            ("pages.skip_for_index", &self.pages.skip_for_index),
            ("minify.skip_files", &self.minify.skip_files),
            ("minify.skip_dirs", &self.minify.skip_dirs),
            ("gzip.skip_files", &self.gzip.skip_files),
        ];
        for (key, patterns) in pattern_lists {
            compile_patterns(patterns)
                .map_err(|e| ConfigError::Validation(format!("{key}: {e}")))?;
        }

        // Cleaning the output root must never take a source tree with it.
        if self.clean_before_build {
            let site = normalize(&self.dirs.site);
            let sources = [
                ("dirs.pages", &self.dirs.pages),
                ("dirs.templates", &self.dirs.templates),
                ("dirs.static", &self.dirs.static_files),
                ("dirs.cdn", &self.dirs.cdn),
                ("dirs.data", &self.dirs.data),
                ("dirs.sass", &self.dirs.sass),
            ];
            for (key, dir) in sources {
                if !dir.as_os_str().is_empty() && normalize(dir).starts_with(&site) {
                    return Err(ConfigError::Validation(format!(
                        "{key} lies inside dirs.site, which clean_before_build would delete"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Join every relative directory onto `base`.
    pub fn resolve_dirs(&mut self, base: &Path) {
        let dirs = &mut self.dirs;
        for dir in [
            &mut dirs.site,
            &mut dirs.pages,
            &mut dirs.templates,
            &mut dirs.static_files,
            &mut dirs.cdn,
            &mut dirs.data,
            &mut dirs.sass,
        ] {
            if !dir.as_os_str().is_empty() && dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
    }
}

/// Lexically normalize a path (drop `.`, fold `..`) for containment checks.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Stock defaults as a TOML table, the base layer for user overrides.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(SiteConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// Tables merge key-by-key; any other overlay value replaces the base value.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    let toml::Value::Table(mut merged) = base else {
        return overlay;
    };
    let toml::Value::Table(overlay) = overlay else {
        return overlay;
    };
    for (key, value) in overlay {
        let next = match merged.remove(&key) {
            Some(existing) => merge_toml(existing, value),
            None => value,
        };
        merged.insert(key, next);
    }
    toml::Value::Table(merged)
}

/// Replace every `"$ENV:NAME"` string with the variable's value.
pub fn substitute_env(value: toml::Value) -> Result<toml::Value, ConfigError> {
    substitute_env_with(value, &|name| std::env::var(name).ok())
}

fn substitute_env_with(
    value: toml::Value,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<toml::Value, ConfigError> {
    Ok(match value {
        toml::Value::String(s) => match s.strip_prefix(ENV_PREFIX) {
            Some(name) => toml::Value::String(
                lookup(name).ok_or_else(|| ConfigError::MissingEnv(name.to_string()))?,
            ),
            None => toml::Value::String(s),
        },
        toml::Value::Array(items) => toml::Value::Array(
            items
                .into_iter()
                .map(|v| substitute_env_with(v, lookup))
                .collect::<Result<_, _>>()?,
        ),
        toml::Value::Table(table) => {
            let mut out = toml::map::Map::new();
            for (k, v) in table {
                out.insert(k, substitute_env_with(v, lookup)?);
            }
            toml::Value::Table(out)
        }
        other => other,
    })
}

/// Merge an overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, substitute_env(ov)?),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load a config file, resolving relative directories against its parent.
pub fn load_config(path: &Path) -> Result<SiteConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: toml::Value = toml::from_str(&content)?;
    let mut config = resolve_config(Some(value))?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    config.resolve_dirs(base);
    Ok(config)
}

/// Returns a fully-commented stock `staticpage.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# staticpage configuration
# ========================
# Values shown are the defaults unless noted. Any string of the form
# "$ENV:NAME" is replaced with the environment variable NAME.
# Relative directories are resolved against this file's directory.

# Delete the output root before building.
clean_before_build = false

# ---------------------------------------------------------------------------
# Directories (only those used by enabled stages are required)
# ---------------------------------------------------------------------------
[dirs]
site = "web/_sites"
pages = "web/pages"
templates = "web/templates"
static = "web/static"
cdn = "web/cdn"
data = "web/data"
sass = "web/sass"

# ---------------------------------------------------------------------------
# URLs injected into templates as url_home, url_static, url_cdn
# ---------------------------------------------------------------------------
[urls]
home = ""
# Without its leading slash this is also the output subpath for static files.
static = "/static"
cdn = ""

# ---------------------------------------------------------------------------
# Pages: render .html templates and .md documents, copy everything else
# ---------------------------------------------------------------------------
[pages]
execute = false
# Write name.html as name/index.html.
only_index = true
# File-name patterns (prefix regex) that keep their name.
skip_for_index = []

# Extra template variables.
[pages.globals]

# ---------------------------------------------------------------------------
# Static assets: copied to <site>/<static subpath>/
# ---------------------------------------------------------------------------
[static]
execute = false

# ---------------------------------------------------------------------------
# Minified variants (supported: .html, .htm, .css, .js)
# ---------------------------------------------------------------------------
[minify]
execute = false
extensions = []
# File-name patterns (prefix regex) never minified.
skip_files = []
# Directory-name patterns (prefix regex) never minified.
skip_dirs = []

# ---------------------------------------------------------------------------
# Gzipped variants
# ---------------------------------------------------------------------------
[gzip]
execute = false
extensions = []
skip_files = []

# ---------------------------------------------------------------------------
# Stylesheets (.scss / .sass)
# ---------------------------------------------------------------------------
[sass]
execute = false
# nested | expanded | compressed
output_style = "nested"
# static: <site>/<static subpath>/css/   cdn: <dirs.cdn>/css/
destination = "static"

# ---------------------------------------------------------------------------
# Incremental publish of dirs.cdn to an S3-compatible bucket
# ---------------------------------------------------------------------------
[cdn]
execute = false
service_name = "s3"
region_name = ""
endpoint = ""
bucket_name = ""
object_key_prefix = ""
aws_access_key = ""
aws_secret_access_key = ""
acl = "public-read"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel file workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn minimal() -> SiteConfig {
        let mut config = SiteConfig::default();
        config.dirs.site = PathBuf::from("out");
        config
    }

    #[test]
    fn default_config_disables_every_stage() {
        let config = SiteConfig::default();
        assert!(!config.clean_before_build);
        assert!(!config.pages.execute);
        assert!(!config.static_files.execute);
        assert!(!config.sass.execute);
        assert!(!config.cdn.execute);
        assert!(config.pages.only_index);
        assert_eq!(config.cdn.acl, "public-read");
    }

    #[test]
    fn parse_sections() {
        let toml = r#"
[dirs]
site = "web/_sites"
static = "web/static"

[urls]
static = "/assets"

[minify]
execute = true
extensions = [".css", ".js"]
skip_files = ["help\\.js"]
skip_dirs = ["private"]

[sass]
execute = true
output_style = "compressed"
destination = "cdn"
"#;
        let config: SiteConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.dirs.static_files, PathBuf::from("web/static"));
        assert_eq!(config.urls.static_files, "/assets");
        assert_eq!(config.minify.extensions, vec![".css", ".js"]);
        assert_eq!(config.minify.skip_dirs, vec!["private"]);
        assert_eq!(config.sass.output_style, OutputStyle::Compressed);
        assert_eq!(config.sass.destination, SassDestination::Cdn);
    }

    #[test]
    fn sass_destination_accepts_long_names() {
        let config: SassConfig = toml::from_str(r#"destination = "remote-staging""#).unwrap();
        assert_eq!(config.destination, SassDestination::Cdn);
        let config: SassConfig = toml::from_str(r#"destination = "local-static""#).unwrap();
        assert_eq!(config.destination, SassDestination::Static);
    }

    #[test]
    fn unknown_key_rejected() {
        let result: Result<SiteConfig, _> = toml::from_str("[minify]\nextentions = []\n");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown field"));
    }

    #[test]
    fn static_subpath_strips_slashes() {
        let mut urls = UrlsConfig::default();
        assert_eq!(urls.static_subpath(), PathBuf::from("static"));
        urls.static_files = "/assets/".into();
        assert_eq!(urls.static_subpath(), PathBuf::from("assets"));
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn validate_requires_site_dir() {
        let err = SiteConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("dirs.site"));
    }

    #[test]
    fn validate_requires_dirs_of_enabled_stages() {
        let mut config = minimal();
        config.pages.execute = true;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("dirs.pages"));

        config.dirs.pages = "pages".into();
        config.dirs.templates = "templates".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_cdn_stylesheets_need_staging_dir() {
        let mut config = minimal();
        config.sass.execute = true;
        config.sass.destination = SassDestination::Cdn;
        config.dirs.sass = "sass".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("dirs.cdn"));
    }

    #[test]
    fn validate_publish_needs_bucket() {
        let mut config = minimal();
        config.cdn.execute = true;
        config.dirs.cdn = "cdn".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("bucket_name"));
    }

    #[test]
    fn validate_rejects_unminifiable_extension() {
        let mut config = minimal();
        config.minify.extensions = vec![".css".into(), ".png".into()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains(".png"));
    }

    #[test]
    fn validate_rejects_invalid_pattern() {
        let mut config = minimal();
        config.gzip.skip_files = vec!["[".into()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("gzip.skip_files"));
    }

    #[test]
    fn validate_rejects_sources_inside_cleaned_output() {
        let mut config = minimal();
        config.clean_before_build = true;
        config.dirs.site = "web".into();
        config.dirs.pages = "./web/pages".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("dirs.pages"));

        config.dirs.site = "web/_sites".into();
        assert!(config.validate().is_ok());
    }

    // =========================================================================
    // Merging and environment substitution
    // =========================================================================

    #[test]
    fn merge_toml_keeps_base_keys() {
        let base: toml::Value = toml::from_str("[gzip]\nexecute = false\nextensions = []\n").unwrap();
        let overlay: toml::Value = toml::from_str("[gzip]\nexecute = true\n").unwrap();
        let merged = merge_toml(base, overlay);
        let gzip = merged.get("gzip").unwrap();
        assert_eq!(gzip.get("execute").unwrap().as_bool(), Some(true));
        assert!(gzip.get("extensions").is_some());
    }

    #[test]
    fn merge_toml_scalar_replaces_table() {
        let base: toml::Value = toml::from_str("[a]\nb = 1\n").unwrap();
        let overlay: toml::Value = toml::from_str("a = 3\n").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("a").unwrap().as_integer(), Some(3));
    }

    #[test]
    fn env_substitution_replaces_nested_strings() {
        let value: toml::Value = toml::from_str(
            r#"
[cdn]
aws_access_key = "$ENV:ACCESS"
bucket_name = "plain"
"#,
        )
        .unwrap();
        let lookup = |name: &str| (name == "ACCESS").then(|| "secret-key".to_string());
        let out = substitute_env_with(value, &lookup).unwrap();
        let cdn = out.get("cdn").unwrap();
        assert_eq!(cdn.get("aws_access_key").unwrap().as_str(), Some("secret-key"));
        assert_eq!(cdn.get("bucket_name").unwrap().as_str(), Some("plain"));
    }

    #[test]
    fn env_substitution_missing_variable_is_error() {
        let value: toml::Value = toml::from_str(r#"key = "$ENV:NOPE""#).unwrap();
        let result = substitute_env_with(value, &|_| None);
        assert!(matches!(result, Err(ConfigError::MissingEnv(name)) if name == "NOPE"));
    }

    // =========================================================================
    // load_config
    // =========================================================================

    #[test]
    fn load_config_resolves_relative_dirs() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(DEFAULT_CONFIG_FILE);
        fs::write(
            &path,
            r#"
[dirs]
site = "out"
static = "/abs/static"
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.dirs.site, tmp.path().join("out"));
        assert_eq!(config.dirs.static_files, PathBuf::from("/abs/static"));
        assert!(config.dirs.pages.as_os_str().is_empty());
    }

    #[test]
    fn load_config_missing_file_names_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("absent.toml");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("absent.toml"));
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "this is not valid toml [[[").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_validates() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "[pages]\nexecute = true\n").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // Stock config
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: SiteConfig = toml::from_str(stock_config_toml()).unwrap();
        assert!(!config.pages.execute);
        assert!(config.pages.only_index);
        assert_eq!(config.sass.output_style, OutputStyle::Nested);
        assert_eq!(config.sass.destination, SassDestination::Static);
        assert_eq!(config.cdn.service_name, "s3");
        assert_eq!(config.urls.static_files, "/static");
        assert_eq!(config.processing.max_processes, None);
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value().unwrap();
        for section in ["dirs", "urls", "pages", "static", "minify", "gzip", "sass", "cdn"] {
            assert!(val.get(section).is_some(), "missing [{section}]");
        }
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let config = ProcessingConfig {
            max_processes: Some(99999),
        };
        assert_eq!(effective_threads(&config), cores);
    }
}
