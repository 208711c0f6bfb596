//! Source catalogue and run settings.
//!
//! The catalogue lists, per language, the page URL template, the localized
//! slug of each sign and the label strings used by the extractor. The default
//! catalogue (`config/languages.yaml`) is compiled into the binary; a file of
//! the same shape can replace it at runtime.

use crate::error::{Error, Result};
use crate::models::{Labels, Task};
use itertools::Itertools;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};
use url::Url;

/// Placeholder replaced by a sign slug in URL templates.
pub const SIGN_PLACEHOLDER: &str = "{sign}";

/// Maximum number of tasks in flight.
pub const DEFAULT_CONCURRENCY: usize = 8;
/// Attempts per task before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Constant wait between two attempts of the same task.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(2000);
/// Upper bound for one page navigation.
pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(45);

const DEFAULT_CATALOGUE: &str = include_str!("../config/languages.yaml");

/// One language source.
#[derive(Debug, Clone, Deserialize)]
pub struct LanguageConfig {
    pub name: String,
    pub url_template: String,
    /// Sign key to localized page slug.
    pub signs: BTreeMap<String, String>,
    #[serde(default)]
    pub labels: Labels,
}

impl LanguageConfig {
    /// URL of the page for one slug.
    pub fn url_for(&self, slug: &str) -> String {
        self.url_template.replace(SIGN_PLACEHOLDER, slug)
    }
}

/// All configured language sources, in catalogue order.
#[derive(Debug, Clone, Deserialize)]
pub struct Catalogue {
    pub languages: Vec<LanguageConfig>,
}

impl Catalogue {
    /// The catalogue compiled into the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(DEFAULT_CATALOGUE)
    }

    /// Load from `path`, or fall back to the built-in catalogue.
    #[instrument(level = "info")]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let catalogue = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                Self::from_yaml(&text)?
            }
            None => Self::builtin()?,
        };
        info!(
            languages = catalogue.languages.len(),
            tasks = catalogue.task_count(),
            "Loaded catalogue"
        );
        Ok(catalogue)
    }

    /// Parse and validate a YAML catalogue.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let catalogue: Catalogue = serde_yaml::from_str(text)?;
        catalogue.validate()?;
        Ok(catalogue)
    }

    fn validate(&self) -> Result<()> {
        if self.languages.is_empty() {
            return Err(Error::Config("catalogue has no languages".to_string()));
        }
        if let Some(name) = self.languages.iter().map(|l| &l.name).duplicates().next() {
            return Err(Error::Config(format!("language '{name}' is listed twice")));
        }
        for language in &self.languages {
            if !language.url_template.contains(SIGN_PLACEHOLDER) {
                return Err(Error::Config(format!(
                    "url_template of '{}' has no {SIGN_PLACEHOLDER} placeholder",
                    language.name
                )));
            }
            if language.signs.is_empty() {
                return Err(Error::Config(format!(
                    "language '{}' has no signs",
                    language.name
                )));
            }
            for slug in language.signs.values() {
                let url = language.url_for(slug);
                Url::parse(&url).map_err(|e| {
                    Error::Config(format!("invalid URL '{url}' for '{}': {e}", language.name))
                })?;
            }
        }
        Ok(())
    }

    /// Keep only the named languages. Unknown names are an error.
    pub fn restrict_to(mut self, names: &[String]) -> Result<Self> {
        if names.is_empty() {
            return Ok(self);
        }
        if let Some(unknown) = names
            .iter()
            .find(|n| !self.languages.iter().any(|l| &l.name == *n))
        {
            return Err(Error::Config(format!("unknown language '{unknown}'")));
        }
        self.languages.retain(|l| names.contains(&l.name));
        Ok(self)
    }

    pub fn language_names(&self) -> impl Iterator<Item = &str> {
        self.languages.iter().map(|l| l.name.as_str())
    }

    pub fn task_count(&self) -> usize {
        self.languages.iter().map(|l| l.signs.len()).sum()
    }

    /// One task per language and sign.
    pub fn tasks(&self) -> Vec<Task> {
        self.languages
            .iter()
            .flat_map(|language| {
                let labels = Arc::new(language.labels.clone());
                language.signs.iter().map(move |(sign, slug)| Task {
                    language: language.name.clone(),
                    sign: sign.clone(),
                    url: language.url_for(slug),
                    labels: Arc::clone(&labels),
                })
            })
            .collect()
    }
}

/// Attempt budget and timing for a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub navigation_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            navigation_timeout: DEFAULT_NAVIGATION_TIMEOUT,
        }
    }
}

/// Settings of one scrape run.
#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    pub concurrency: usize,
    pub retry: RetryPolicy,
    /// Where to write `horoscopes_<language>.json`; `None` disables export.
    pub export_dir: Option<PathBuf>,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::default(),
            export_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_LANGUAGES: &str = r#"
languages:
  - name: english
    url_template: "https://example.com/en/{sign}.asp"
    signs:
      aries: aries
      leo: leo
    labels:
      lucky_number: ["Lucky Number"]
  - name: hindi
    url_template: "https://example.com/hi/{sign}.asp"
    signs:
      aries: mesh
"#;

    #[test]
    fn test_builtin_catalogue_has_ten_languages_of_twelve_signs() {
        let catalogue = Catalogue::builtin().unwrap();
        assert_eq!(catalogue.languages.len(), 10);
        assert!(catalogue.languages.iter().all(|l| l.signs.len() == 12));
        assert_eq!(catalogue.task_count(), 120);
        assert_eq!(catalogue.tasks().len(), 120);
    }

    #[test]
    fn test_builtin_urls_render_slugs() {
        let catalogue = Catalogue::builtin().unwrap();
        let tasks = catalogue.tasks();
        let hindi_aries = tasks
            .iter()
            .find(|t| t.language == "hindi" && t.sign == "aries")
            .unwrap();
        assert_eq!(
            hindi_aries.url,
            "https://hindi.astrosage.com/rashifal/mesh-rashifal.asp"
        );
        assert!(hindi_aries.labels.remedy.contains(&"उपाय".to_string()));
    }

    #[test]
    fn test_tasks_share_labels_per_language() {
        let catalogue = Catalogue::from_yaml(TWO_LANGUAGES).unwrap();
        let tasks = catalogue.tasks();
        assert_eq!(tasks.len(), 3);
        let english: Vec<_> = tasks.iter().filter(|t| t.language == "english").collect();
        assert!(Arc::ptr_eq(&english[0].labels, &english[1].labels));
        assert!(tasks.iter().any(|t| t.url == "https://example.com/hi/mesh.asp"));
    }

    #[test]
    fn test_rejects_duplicate_language() {
        let yaml = r#"
languages:
  - name: english
    url_template: "https://example.com/{sign}"
    signs: { aries: aries }
  - name: english
    url_template: "https://example.com/{sign}"
    signs: { leo: leo }
"#;
        let err = Catalogue::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("listed twice"));
    }

    #[test]
    fn test_rejects_template_without_placeholder() {
        let yaml = r#"
languages:
  - name: english
    url_template: "https://example.com/daily.asp"
    signs: { aries: aries }
"#;
        assert!(matches!(Catalogue::from_yaml(yaml), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_relative_url() {
        let yaml = r#"
languages:
  - name: english
    url_template: "/daily/{sign}.asp"
    signs: { aries: aries }
"#;
        assert!(matches!(Catalogue::from_yaml(yaml), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_empty_catalogue() {
        assert!(Catalogue::from_yaml("languages: []").is_err());
    }

    #[test]
    fn test_restrict_to_subset() {
        let catalogue = Catalogue::from_yaml(TWO_LANGUAGES)
            .unwrap()
            .restrict_to(&["hindi".to_string()])
            .unwrap();
        assert_eq!(catalogue.language_names().collect::<Vec<_>>(), vec!["hindi"]);
        assert_eq!(catalogue.task_count(), 1);
    }

    #[test]
    fn test_restrict_to_unknown_language_fails() {
        let err = Catalogue::from_yaml(TWO_LANGUAGES)
            .unwrap()
            .restrict_to(&["klingon".to_string()])
            .unwrap_err();
        assert!(err.to_string().contains("klingon"));
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.retry_delay, Duration::from_millis(2000));
        assert_eq!(policy.navigation_timeout, Duration::from_secs(45));
        assert_eq!(ScrapeSettings::default().concurrency, 8);
    }
}
