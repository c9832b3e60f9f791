//! Language inference for run text.
//!
//! After a font change the run's `lang` attributes are rewritten so that
//! PowerPoint picks the right proofing language and script slot.

/// Language tags written onto modified runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageTag {
    /// Simplified Chinese, used when the text contains CJK ideographs.
    ZhCn,
    /// US English, used for everything else.
    EnUs,
}

impl LanguageTag {
    /// Classify a run's text.
    pub fn infer(text: &str) -> Self {
        if contains_cjk(text) {
            LanguageTag::ZhCn
        } else {
            LanguageTag::EnUs
        }
    }

    /// The BCP 47 tag as written into `lang` attributes.
    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageTag::ZhCn => "zh-CN",
            LanguageTag::EnUs => "en-US",
        }
    }
}

impl std::fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `c` is a CJK unified ideograph (basic block, extension A or
/// extension B).
pub fn is_cjk_char(c: char) -> bool {
    matches!(
        c as u32,
        0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0x20000..=0x2A6DF
    )
}

/// Whether any character of `text` is a CJK ideograph.
pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(is_cjk_char)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_cjk_char() {
        assert!(is_cjk_char('你'));
        assert!(is_cjk_char('\u{3400}'));
        assert!(is_cjk_char('\u{20000}'));
        assert!(!is_cjk_char('a'));
        // Kana and full-width punctuation are not ideographs
        assert!(!is_cjk_char('あ'));
        assert!(!is_cjk_char('，'));
    }

    #[test]
    fn test_infer_language() {
        assert_eq!(LanguageTag::infer("你好"), LanguageTag::ZhCn);
        assert_eq!(LanguageTag::infer("Hello 世界"), LanguageTag::ZhCn);
        assert_eq!(LanguageTag::infer("Hello"), LanguageTag::EnUs);
        assert_eq!(LanguageTag::infer("123"), LanguageTag::EnUs);
        assert_eq!(LanguageTag::ZhCn.as_str(), "zh-CN");
        assert_eq!(LanguageTag::EnUs.to_string(), "en-US");
    }
}
