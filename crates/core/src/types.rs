//! Domain types for font rules and gradient schemes.

use crate::error::{Error, Result};
use crate::units::{canonical_size_key, parse_points};
use serde::{Deserialize, Deserializer, Serialize};

/// Highest gradient stop position (100%).
pub const MAX_STOP_POSITION: u32 = 100_000;

/// A single font/size substitution rule.
///
/// `old_font`/`old_size` act as wildcards when absent. Sizes are kept as the
/// raw decimal tokens found in the store and parsed when the rule is applied,
/// so one malformed value only disables that part of the rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FontRule {
    /// Rule label (the key in the rule store).
    #[serde(skip)]
    pub id: String,

    /// Typeface a run must currently use (any script slot).
    #[serde(default, deserialize_with = "deserialize_token")]
    pub old_font: Option<String>,

    /// Point size a run must currently have (within 0.1pt).
    #[serde(default, deserialize_with = "deserialize_token")]
    pub old_size: Option<String>,

    /// Replacement typeface.
    #[serde(default, deserialize_with = "deserialize_token")]
    pub new_font: Option<String>,

    /// Replacement point size.
    #[serde(default, deserialize_with = "deserialize_token")]
    pub new_size: Option<String>,

    /// Replace the Latin typeface slot.
    #[serde(rename = "latin", default)]
    pub apply_latin: bool,

    /// Replace the East-Asian typeface slot.
    #[serde(rename = "ea", default)]
    pub apply_ea: bool,

    /// Replace the Complex-Script typeface slot.
    #[serde(rename = "cs", default)]
    pub apply_cs: bool,
}

impl FontRule {
    /// Whether the rule would change anything at all.
    pub fn is_effective(&self) -> bool {
        self.new_font.is_some() || self.new_size.is_some()
    }

    /// Check a rule before it is added to a store.
    pub fn validate(&self) -> Result<()> {
        if !self.is_effective() {
            return Err(Error::ConfigInvalid(format!(
                "rule '{}' sets neither new_font nor new_size",
                self.id
            )));
        }
        for (field, value) in [("old_size", &self.old_size), ("new_size", &self.new_size)] {
            if let Some(value) = value {
                if parse_points(value).is_none() {
                    return Err(Error::ConfigInvalid(format!(
                        "rule '{}': {} '{}' is not a number",
                        self.id, field, value
                    )));
                }
            }
        }
        Ok(())
    }

    /// Label derived from the rule's match and replacement fields,
    /// e.g. `font:Arial_size:12_to-font:Microsoft YaHei_to-size:14`.
    pub fn derive_label(&self) -> String {
        let parts: Vec<String> = [
            ("font", &self.old_font),
            ("size", &self.old_size),
            ("to-font", &self.new_font),
            ("to-size", &self.new_size),
        ]
        .into_iter()
        .filter_map(|(tag, value)| value.as_ref().map(|v| format!("{}:{}", tag, v)))
        .collect();

        if parts.is_empty() {
            "any".to_string()
        } else {
            parts.join("_")
        }
    }

    /// Whether any script slot is enabled for font replacement.
    pub fn applies_to_any_script(&self) -> bool {
        self.apply_latin || self.apply_ea || self.apply_cs
    }
}

/// Ordered collection of font rules; order is evaluation order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    rules: Vec<FontRule>,
}

impl RuleSet {
    /// Create an empty rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the JSON rule store: an object of label → rule.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)
            .map_err(|e| Error::ConfigInvalid(format!("font rule store: {}", e)))?;

        let mut rules = Vec::with_capacity(map.len());
        for (label, value) in map {
            let mut rule: FontRule = serde_json::from_value(value)
                .map_err(|e| Error::ConfigInvalid(format!("font rule '{}': {}", label, e)))?;
            rule.id = label;
            rules.push(rule);
        }
        Ok(Self { rules })
    }

    /// Serialize to the JSON rule store format, preserving order.
    pub fn to_json_string(&self) -> Result<String> {
        let mut map = serde_json::Map::new();
        for rule in &self.rules {
            let value = serde_json::to_value(rule)
                .map_err(|e| Error::ConfigInvalid(format!("font rule '{}': {}", rule.id, e)))?;
            map.insert(rule.id.clone(), value);
        }
        serde_json::to_string_pretty(&map)
            .map_err(|e| Error::ConfigInvalid(format!("font rule store: {}", e)))
    }

    /// Add a rule, replacing one with the same label in place.
    pub fn insert(&mut self, rule: FontRule) {
        match self.rules.iter_mut().find(|r| r.id == rule.id) {
            Some(existing) => *existing = rule,
            None => self.rules.push(rule),
        }
    }

    /// Remove a rule by label.
    pub fn remove(&mut self, label: &str) -> Option<FontRule> {
        let idx = self.rules.iter().position(|r| r.id == label)?;
        Some(self.rules.remove(idx))
    }

    /// Look up a rule by label.
    pub fn get(&self, label: &str) -> Option<&FontRule> {
        self.rules.iter().find(|r| r.id == label)
    }

    /// Rules in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = &FontRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl FromIterator<FontRule> for RuleSet {
    fn from_iter<I: IntoIterator<Item = FontRule>>(iter: I) -> Self {
        let mut set = RuleSet::new();
        for rule in iter {
            set.insert(rule);
        }
        set
    }
}

/// Names accepted as theme (scheme) colors.
const SCHEME_COLOR_NAMES: &[&str] = &[
    "bg1", "bg2", "tx1", "tx2", "dk1", "dk2", "lt1", "lt2", "hlink", "folHlink", "phClr",
];

/// Color of a gradient stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ColorSpec {
    /// RGB hex value without the leading `#`.
    Hex(String),
    /// Theme color such as `accent1`.
    SchemeRef(String),
    /// Anything else, written verbatim as an RGB value.
    RawToken(String),
}

impl ColorSpec {
    /// Classify a color string from a scheme store.
    pub fn parse(token: &str) -> Self {
        let token = token.trim();
        if let Some(hex) = token.strip_prefix('#') {
            ColorSpec::Hex(hex.to_string())
        } else if token.starts_with("accent") || SCHEME_COLOR_NAMES.contains(&token) {
            ColorSpec::SchemeRef(token.to_string())
        } else {
            ColorSpec::RawToken(token.to_string())
        }
    }

    /// The value written into the color element's `val` attribute.
    pub fn value(&self) -> &str {
        match self {
            ColorSpec::Hex(v) | ColorSpec::SchemeRef(v) | ColorSpec::RawToken(v) => v,
        }
    }
}

impl From<String> for ColorSpec {
    fn from(token: String) -> Self {
        ColorSpec::parse(&token)
    }
}

impl From<&str> for ColorSpec {
    fn from(token: &str) -> Self {
        ColorSpec::parse(token)
    }
}

impl From<ColorSpec> for String {
    fn from(color: ColorSpec) -> Self {
        color.to_string()
    }
}

impl std::fmt::Display for ColorSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColorSpec::Hex(v) => write!(f, "#{}", v),
            ColorSpec::SchemeRef(v) | ColorSpec::RawToken(v) => f.write_str(v),
        }
    }
}

/// One color stop of a linear gradient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradientStop {
    /// Position in thousandths of a percent, `0..=100000`.
    pub position: u32,
    /// Stop color.
    pub color: ColorSpec,
}

impl GradientStop {
    pub fn new(position: u32, color: impl Into<ColorSpec>) -> Self {
        Self {
            position,
            color: color.into(),
        }
    }

    /// Parse the CLI shorthand `position:color`, e.g. `0:#9A6FDC`.
    pub fn parse_shorthand(text: &str) -> Result<Self> {
        let (pos, color) = text.split_once(':').ok_or_else(|| {
            Error::ConfigInvalid(format!("gradient stop '{}' is not position:color", text))
        })?;
        let position: u32 = pos.trim().parse().map_err(|_| {
            Error::ConfigInvalid(format!("gradient stop position '{}' is not an integer", pos))
        })?;
        Ok(Self::new(position, color))
    }
}

/// Gradient stops bound to a typeface, keyed by font size in a scheme table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientScheme {
    /// Stops in store order; use [`GradientScheme::sorted_stops`] for output.
    pub gradient_config: Vec<GradientStop>,
    /// Typeface a run must use to receive this gradient.
    pub font_name: String,
}

impl GradientScheme {
    pub fn new(gradient_config: Vec<GradientStop>, font_name: impl Into<String>) -> Self {
        Self {
            gradient_config,
            font_name: font_name.into(),
        }
    }

    /// Stops sorted by ascending position.
    pub fn sorted_stops(&self) -> Vec<GradientStop> {
        let mut stops = self.gradient_config.clone();
        stops.sort_by_key(|s| s.position);
        stops
    }

    /// Require at least two stops, all within `0..=100000`.
    pub fn validate(&self) -> Result<()> {
        if self.gradient_config.len() < 2 {
            return Err(Error::ConfigInvalid(format!(
                "gradient for '{}' needs at least 2 stops, got {}",
                self.font_name,
                self.gradient_config.len()
            )));
        }
        if let Some(stop) = self
            .gradient_config
            .iter()
            .find(|s| s.position > MAX_STOP_POSITION)
        {
            return Err(Error::ConfigInvalid(format!(
                "gradient stop position {} is outside 0..={}",
                stop.position, MAX_STOP_POSITION
            )));
        }
        Ok(())
    }
}

/// Gradient schemes keyed by canonical font-size string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemeTable {
    entries: Vec<(String, GradientScheme)>,
}

impl SchemeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// One-entry table built from explicitly supplied arguments.
    pub fn single(
        font_size: &str,
        gradient_config: Vec<GradientStop>,
        font_name: impl Into<String>,
    ) -> Result<Self> {
        let scheme = GradientScheme::new(gradient_config, font_name);
        scheme.validate()?;
        let mut table = Self::new();
        table.insert(font_size, scheme);
        Ok(table)
    }

    /// Parse the JSON scheme store. Invalid entries are dropped with a
    /// warning; a structurally broken document is an error.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)
            .map_err(|e| Error::ConfigInvalid(format!("gradient scheme store: {}", e)))?;

        let mut table = Self::new();
        for (key, value) in map {
            let scheme: GradientScheme = match serde_json::from_value(value) {
                Ok(scheme) => scheme,
                Err(e) => {
                    log::warn!("Skipping gradient scheme '{}': {}", key, e);
                    continue;
                }
            };
            if let Err(e) = scheme.validate() {
                log::warn!("Skipping gradient scheme '{}': {}", key, e);
                continue;
            }
            table.insert(&key, scheme);
        }
        Ok(table)
    }

    /// Serialize to the JSON scheme store format.
    pub fn to_json_string(&self) -> Result<String> {
        let mut map = serde_json::Map::new();
        for (key, scheme) in &self.entries {
            let value = serde_json::to_value(scheme)
                .map_err(|e| Error::ConfigInvalid(format!("gradient scheme '{}': {}", key, e)))?;
            map.insert(key.clone(), value);
        }
        serde_json::to_string_pretty(&map)
            .map_err(|e| Error::ConfigInvalid(format!("gradient scheme store: {}", e)))
    }

    /// Add or replace the scheme for a font size.
    pub fn insert(&mut self, font_size: &str, scheme: GradientScheme) {
        let key = canonical_size_key(font_size);
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = scheme,
            None => self.entries.push((key, scheme)),
        }
    }

    /// Remove the scheme for a font size.
    pub fn remove(&mut self, font_size: &str) -> Option<GradientScheme> {
        let key = canonical_size_key(font_size);
        let idx = self.entries.iter().position(|(k, _)| *k == key)?;
        Some(self.entries.remove(idx).1)
    }

    /// Look up the scheme for a rendered size such as `"14.5"`.
    pub fn get(&self, size_key: &str) -> Option<&GradientScheme> {
        self.entries
            .iter()
            .find(|(k, _)| k == size_key)
            .map(|(_, scheme)| scheme)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &GradientScheme)> {
        self.entries.iter().map(|(k, s)| (k.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Kind of fill currently set on a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillKind {
    None,
    Solid,
    Gradient,
}

/// Font information of one run, as reported by the inspector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFontInfo {
    /// 1-based slide number in presentation order.
    pub slide: usize,
    /// First characters of the run text.
    pub text: String,
    /// Size in points, if set on the run.
    pub size: Option<f64>,
    pub latin: String,
    pub ea: String,
    pub cs: String,
    pub fill: FillKind,
}

/// Accept a JSON string or number, mapping blank strings and null to None.
fn deserialize_token<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Token {
        Text(String),
        Number(serde_json::Number),
    }

    let token = Option::<Token>::deserialize(deserializer)?;
    Ok(match token {
        Some(Token::Text(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Token::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_set_preserves_store_order() {
        let json = r#"{
            "zeta": {"old_font": null, "old_size": null, "new_font": null, "new_size": "20", "latin": false, "ea": false, "cs": false},
            "alpha": {"old_font": "Arial", "old_size": 12, "new_font": "Microsoft YaHei", "new_size": "14", "latin": true, "ea": false, "cs": false}
        }"#;
        let rules = RuleSet::from_json_str(json).unwrap();
        let ids: Vec<&str> = rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["zeta", "alpha"]);

        let alpha = rules.get("alpha").unwrap();
        assert_eq!(alpha.old_size.as_deref(), Some("12"));
        assert!(alpha.apply_latin);
        assert!(!alpha.apply_ea);
    }

    #[test]
    fn test_rule_blank_tokens_are_wildcards() {
        let json = r#"{"r": {"old_font": "", "old_size": "  ", "new_size": "20"}}"#;
        let rules = RuleSet::from_json_str(json).unwrap();
        let rule = rules.get("r").unwrap();
        assert_eq!(rule.old_font, None);
        assert_eq!(rule.old_size, None);
        assert!(!rule.applies_to_any_script());
    }

    #[test]
    fn test_rule_validate() {
        let mut rule = FontRule {
            id: "noop".into(),
            old_font: Some("Arial".into()),
            ..Default::default()
        };
        assert!(rule.validate().is_err());

        rule.new_size = Some("large".into());
        assert!(rule.validate().is_err());

        rule.new_size = Some("14".into());
        assert!(rule.validate().is_ok());
    }

    #[test]
    fn test_derive_label() {
        let rule = FontRule {
            old_font: Some("Arial".into()),
            old_size: Some("12".into()),
            new_font: Some("Microsoft YaHei".into()),
            new_size: Some("14".into()),
            ..Default::default()
        };
        assert_eq!(
            rule.derive_label(),
            "font:Arial_size:12_to-font:Microsoft YaHei_to-size:14"
        );

        let wildcard = FontRule {
            new_size: Some("20".into()),
            ..Default::default()
        };
        assert_eq!(wildcard.derive_label(), "to-size:20");
    }

    #[test]
    fn test_rule_set_insert_replaces_in_place() {
        let mut rules: RuleSet = vec![
            FontRule { id: "a".into(), new_size: Some("10".into()), ..Default::default() },
            FontRule { id: "b".into(), new_size: Some("11".into()), ..Default::default() },
        ]
        .into_iter()
        .collect();

        rules.insert(FontRule { id: "a".into(), new_size: Some("12".into()), ..Default::default() });
        let ids: Vec<&str> = rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(rules.get("a").unwrap().new_size.as_deref(), Some("12"));

        assert!(rules.remove("a").is_some());
        assert!(rules.remove("a").is_none());
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn test_rule_set_json_round_trip_keeps_labels() {
        let json = r#"{"b": {"new_font": "Sora", "latin": true}, "a": {"new_size": "9"}}"#;
        let rules = RuleSet::from_json_str(json).unwrap();
        let again = RuleSet::from_json_str(&rules.to_json_string().unwrap()).unwrap();
        assert_eq!(rules, again);
    }

    #[test]
    fn test_color_spec_parse() {
        assert_eq!(ColorSpec::parse("#73C6E1"), ColorSpec::Hex("73C6E1".into()));
        assert_eq!(ColorSpec::parse("accent1"), ColorSpec::SchemeRef("accent1".into()));
        assert_eq!(ColorSpec::parse("tx1"), ColorSpec::SchemeRef("tx1".into()));
        assert_eq!(ColorSpec::parse("FF0000"), ColorSpec::RawToken("FF0000".into()));
        assert_eq!(ColorSpec::Hex("73C6E1".into()).to_string(), "#73C6E1");
    }

    #[test]
    fn test_sorted_stops() {
        let scheme = GradientScheme::new(
            vec![GradientStop::new(100_000, "#73C6E1"), GradientStop::new(0, "#9A6FDC")],
            "Sora",
        );
        let positions: Vec<u32> = scheme.sorted_stops().iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![0, 100_000]);
        // store order is untouched
        assert_eq!(scheme.gradient_config[0].position, 100_000);
    }

    #[test]
    fn test_scheme_validate() {
        let one = GradientScheme::new(vec![GradientStop::new(0, "#000000")], "Sora");
        assert!(one.validate().is_err());

        let out_of_range = GradientScheme::new(
            vec![GradientStop::new(0, "#000000"), GradientStop::new(100_001, "#FFFFFF")],
            "Sora",
        );
        assert!(out_of_range.validate().is_err());
    }

    #[test]
    fn test_scheme_table_from_json() {
        let json = r##"{
            "14.0": {"gradient_config": [{"position": 0, "color": "#9A6FDC"}, {"position": 100000, "color": "accent1"}], "font_name": "微软雅黑"},
            "9": {"gradient_config": [{"position": 0, "color": "#9A6FDC"}], "font_name": "Sora"}
        }"##;
        let table = SchemeTable::from_json_str(json).unwrap();
        assert_eq!(table.len(), 1);
        let scheme = table.get("14").unwrap();
        assert_eq!(scheme.font_name, "微软雅黑");
        assert_eq!(
            scheme.gradient_config[1].color,
            ColorSpec::SchemeRef("accent1".into())
        );
        assert!(table.get("9").is_none());
    }

    #[test]
    fn test_scheme_table_rejects_broken_json() {
        assert!(SchemeTable::from_json_str("[1, 2").is_err());
        assert!(SchemeTable::from_json_str("[]").is_err());
    }

    #[test]
    fn test_stop_shorthand() {
        let stop = GradientStop::parse_shorthand("100000:#73C6E1").unwrap();
        assert_eq!(stop.position, 100_000);
        assert_eq!(stop.color, ColorSpec::Hex("73C6E1".into()));
        assert!(GradientStop::parse_shorthand("#73C6E1").is_err());
        assert!(GradientStop::parse_shorthand("x:#73C6E1").is_err());
    }
}
