//! JSON bulk export of a run's snapshot.
//!
//! One file per language, overwritten on every run:
//! ```text
//! export_dir/
//! ├── horoscopes_english.json
//! ├── horoscopes_hindi.json
//! └── ...
//! ```
//!
//! Each file maps sign to payload; permanently failed signs carry the
//! placeholder payload.

use crate::aggregator::Snapshot;
use crate::error::Result;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// File name of the export for `language`.
pub fn export_file_name(language: &str) -> String {
    format!("horoscopes_{language}.json")
}

/// Write every language of `snapshot` into `export_dir`.
///
/// # Returns
///
/// The paths written, in language order.
#[instrument(level = "info", skip_all, fields(export_dir = %export_dir.display()))]
pub async fn write_snapshot(snapshot: &Snapshot, export_dir: &Path) -> Result<Vec<PathBuf>> {
    if let Err(e) = fs::create_dir_all(export_dir).await {
        error!(error = %e, "Failed to create export dir");
        return Err(e.into());
    }

    let mut written = Vec::new();
    for (language, signs) in snapshot.languages() {
        let json = serde_json::to_string_pretty(signs)?;
        let path = export_dir.join(export_file_name(language));
        fs::write(&path, json).await?;
        info!(%language, signs = signs.len(), path = %path.display(), "Wrote export");
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExtractedFields, ResultRecord};
    use crate::test_support::task;
    use std::collections::BTreeMap;

    #[test]
    fn test_export_file_name() {
        assert_eq!(export_file_name("hindi"), "horoscopes_hindi.json");
    }

    #[tokio::test]
    async fn test_writes_one_file_per_language_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let mut snapshot = Snapshot::with_languages(["english", "tamil"]);
        snapshot.fold(&ResultRecord::success(
            &task("english", "leo"),
            ExtractedFields {
                lucky_color: Some("Gold".to_string()),
                ..Default::default()
            },
            1,
        ));

        std::fs::write(dir.path().join("horoscopes_english.json"), "stale").unwrap();
        let written = write_snapshot(&snapshot, dir.path()).await.unwrap();

        assert_eq!(written.len(), 2);
        let english: BTreeMap<String, ExtractedFields> = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("horoscopes_english.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(english["leo"].lucky_color.as_deref(), Some("Gold"));

        let tamil = std::fs::read_to_string(dir.path().join("horoscopes_tamil.json")).unwrap();
        assert_eq!(tamil.trim(), "{}");
    }
}
