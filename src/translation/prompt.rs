//! 系统提示词构建

use serde::{Deserialize, Serialize};

use super::languages::resolve_language_name;

const RULES: &str = concat!(
    "    Rules:\n",
    "    1. Maintain the original meaning and tone\n",
    "    2. Preserve formatting and structure  \n",
    "    3. Only return the translated text, no explanations\n",
    "    4. If the text contains technical terms, preserve them when appropriate\n",
    "    5. Auto-detect the source language - do not ask for clarification\n",
    "    6. If previous context is provided, ensure consistency in terminology and style",
);

/// 上一单元的原文与译文，仅在发起请求时计算，不持久化
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationContext {
    #[serde(rename = "source")]
    pub previous_source: String,
    #[serde(rename = "translation")]
    pub previous_translation: String,
}

impl TranslationContext {
    pub fn new(previous_source: impl Into<String>, previous_translation: impl Into<String>) -> Self {
        Self {
            previous_source: previous_source.into(),
            previous_translation: previous_translation.into(),
        }
    }
}

/// 构建翻译系统提示词
///
/// 空白的附加说明视为未提供。
pub fn build_system_prompt(
    target_lang: &str,
    instructions: Option<&str>,
    context: Option<&TranslationContext>,
) -> String {
    let language = resolve_language_name(target_lang);

    let instruction = match instructions.map(str::trim) {
        Some(text) if !text.is_empty() => format!("Additional instructions: {}", text),
        _ => String::new(),
    };

    let context_instruction = context
        .map(|ctx| {
            format!(
                "\n\nFor consistency, here is the previous page translation context:\n\
                 Previous source: \"{}\"\n\
                 Previous translation: \"{}\"\n\n\
                 Please maintain consistent terminology, style, and flow with the previous translation.",
                ctx.previous_source, ctx.previous_translation
            )
        })
        .unwrap_or_default();

    format!(
        "You are a professional translator. Auto-detect the source language and translate the following text to {}. {}{}\n\n{}",
        language, instruction, context_instruction, RULES
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_names_resolved_language() {
        let prompt = build_system_prompt("ko", None, None);
        assert!(prompt.starts_with(
            "You are a professional translator. Auto-detect the source language and translate the following text to Korean. "
        ));
        assert!(prompt.contains("    Rules:\n    1. Maintain the original meaning and tone"));
        assert!(!prompt.contains("Additional instructions"));
        assert!(!prompt.contains("Previous source"));
    }

    #[test]
    fn test_prompt_with_instructions() {
        let prompt = build_system_prompt("Spanish", Some("Use a formal register"), None);
        assert!(prompt.contains("to Spanish. Additional instructions: Use a formal register\n\n"));

        let blank = build_system_prompt("en", Some("   "), None);
        assert!(!blank.contains("Additional instructions"));
    }

    #[test]
    fn test_prompt_embeds_previous_context() {
        let context = TranslationContext::new("Hola mundo.", "Hello world.");
        let prompt = build_system_prompt("en", None, Some(&context));

        assert!(prompt.contains(
            "\n\nFor consistency, here is the previous page translation context:\nPrevious source: \"Hola mundo.\"\nPrevious translation: \"Hello world.\"\n\nPlease maintain consistent terminology"
        ));
        assert!(prompt.ends_with("ensure consistency in terminology and style"));
    }
}
