//! JSON-backed font rule and gradient scheme stores.
//!
//! Both stores are plain JSON objects whose key order is meaningful, so they
//! are always written back in the order they were read.

use crate::error::{Error, Result};
use crate::types::{RuleSet, SchemeTable};
use std::fs;
use std::path::Path;

/// Default file name of the font rule store.
pub const DEFAULT_RULE_STORE: &str = "font_config.json";

/// Default file name of the gradient scheme store.
pub const DEFAULT_SCHEME_STORE: &str = "config.json";

/// Load the font rule store at `path`.
pub fn load_rule_set(path: &Path) -> Result<RuleSet> {
    let json = read_store(path)?;
    RuleSet::from_json_str(&json)
}

/// Load the rule store, treating a missing file as an empty rule set.
pub fn load_rule_set_or_default(path: &Path) -> Result<RuleSet> {
    match load_rule_set(path) {
        Err(Error::ConfigMissing(_)) => Ok(RuleSet::new()),
        other => other,
    }
}

/// Write the font rule store to `path`.
pub fn save_rule_set(rules: &RuleSet, path: &Path) -> Result<()> {
    write_store(path, &rules.to_json_string()?)
}

/// Load the gradient scheme store at `path`.
pub fn load_scheme_table(path: &Path) -> Result<SchemeTable> {
    let json = read_store(path)?;
    SchemeTable::from_json_str(&json)
}

/// Load the scheme store, treating a missing file as an empty table.
pub fn load_scheme_table_or_default(path: &Path) -> Result<SchemeTable> {
    match load_scheme_table(path) {
        Err(Error::ConfigMissing(_)) => Ok(SchemeTable::new()),
        other => other,
    }
}

/// Write the gradient scheme store to `path`.
pub fn save_scheme_table(table: &SchemeTable, path: &Path) -> Result<()> {
    write_store(path, &table.to_json_string()?)
}

fn read_store(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(Error::ConfigMissing(format!(
            "store not found: {}",
            path.display()
        )));
    }
    Ok(fs::read_to_string(path)?)
}

fn write_store(path: &Path, json: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, json).map_err(|e| Error::save(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FontRule, GradientScheme, GradientStop};

    #[test]
    fn test_missing_store_is_config_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("font_config.json");
        assert!(matches!(load_rule_set(&path), Err(Error::ConfigMissing(_))));
        assert!(load_rule_set_or_default(&path).unwrap().is_empty());
        assert!(load_scheme_table_or_default(&path).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_store_is_config_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_scheme_table(&path), Err(Error::ConfigInvalid(_))));
        assert!(matches!(
            load_scheme_table_or_default(&path),
            Err(Error::ConfigInvalid(_))
        ));
    }

    #[test]
    fn test_save_and_reload_stores() {
        let dir = tempfile::tempdir().unwrap();
        let rules_path = dir.path().join("nested").join("font_config.json");
        let schemes_path = dir.path().join("config.json");

        let mut rules = RuleSet::new();
        rules.insert(FontRule {
            id: "second".into(),
            new_font: Some("Sora".into()),
            apply_latin: true,
            ..Default::default()
        });
        rules.insert(FontRule {
            id: "first".into(),
            new_size: Some("20".into()),
            ..Default::default()
        });
        save_rule_set(&rules, &rules_path).unwrap();
        assert_eq!(load_rule_set(&rules_path).unwrap(), rules);

        let mut table = SchemeTable::new();
        table.insert(
            "14.5",
            GradientScheme::new(
                vec![GradientStop::new(0, "#9A6FDC"), GradientStop::new(100_000, "accent2")],
                "微软雅黑",
            ),
        );
        save_scheme_table(&table, &schemes_path).unwrap();
        let reloaded = load_scheme_table(&schemes_path).unwrap();
        assert_eq!(reloaded, table);
        assert!(reloaded.get("14.5").is_some());
    }
}
