//! 目标语言代码到语言名称的映射

/// 已知的语言代码及其英文名称
pub const LANGUAGES: &[(&str, &str)] = &[("en", "English"), ("ko", "Korean"), ("ja", "Japanese")];

/// 解析语言代码；未知代码原样透传
pub fn resolve_language_name(code: &str) -> &str {
    LANGUAGES
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, name)| *name)
        .unwrap_or(code)
}

/// 是否为已知语言代码
pub fn is_known_language(code: &str) -> bool {
    LANGUAGES.iter().any(|(known, _)| *known == code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes() {
        assert_eq!(resolve_language_name("en"), "English");
        assert_eq!(resolve_language_name("ko"), "Korean");
        assert_eq!(resolve_language_name("ja"), "Japanese");
        assert!(is_known_language("ko"));
    }

    #[test]
    fn test_unknown_code_passes_through() {
        assert_eq!(resolve_language_name("French"), "French");
        assert_eq!(resolve_language_name("zh-TW"), "zh-TW");
        assert!(!is_known_language("fr"));
    }
}
