//! 文本分块
//!
//! 把超长文本按句子边界切成有界大小的块。分块是纯函数，同样的输入总是得到同样的输出。

use std::sync::OnceLock;

use regex::Regex;

/// 默认分块阈值（词数）
pub const DEFAULT_CHUNK_WORDS: usize = 500;

fn sentence_boundary() -> &'static Regex {
    static BOUNDARY: OnceLock<Regex> = OnceLock::new();
    // 句末标点本身是单字节 ASCII，保留在句子内，其后的空白被丢弃
    BOUNDARY.get_or_init(|| Regex::new(r"[.!?]\s+").expect("sentence boundary pattern is valid"))
}

/// 统计词数：按空白切分后的非空片段数
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// 文本是否超过阈值、需要分块
pub fn needs_chunking(text: &str, threshold: usize) -> bool {
    count_words(text) > threshold
}

/// 将文本切分为不超过 `max_words` 词的块
///
/// - 空白文本返回空列表
/// - 不超过阈值的文本原样返回（不做 trim）
/// - 否则按句子贪心累积；单句超长时先关闭当前块，再按词硬切
pub fn chunk_text(text: &str, max_words: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let max_words = max_words.max(1);

    if count_words(text) <= max_words {
        return vec![text.to_string()];
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_words = 0usize;

    for sentence in split_sentences(text) {
        let sentence_words = count_words(sentence);
        if sentence_words == 0 {
            continue;
        }

        if current_words + sentence_words > max_words && !current.is_empty() {
            chunks.push(current.join(" "));
            current.clear();
            current_words = 0;
        }

        if sentence_words > max_words {
            chunks.extend(split_long_sentence(sentence, max_words));
        } else {
            current.push(sentence);
            current_words += sentence_words;
        }
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }

    chunks.retain(|chunk| !chunk.trim().is_empty());
    chunks
}

/// 按词边界把单个长句硬切成 `ceil(words / max_words)` 段
pub fn split_long_sentence(sentence: &str, max_words: usize) -> Vec<String> {
    let words: Vec<&str> = sentence.split_whitespace().collect();
    words
        .chunks(max_words.max(1))
        .map(|slice| slice.join(" "))
        .collect()
}

fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for boundary in sentence_boundary().find_iter(text) {
        // 包含标点
        let end = boundary.start() + 1;
        sentences.push(text[start..end].trim());
        start = boundary.end();
    }

    if start < text.len() {
        sentences.push(text[start..].trim());
    }

    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentence(words: usize, tag: &str) -> String {
        let mut parts: Vec<String> = (0..words).map(|i| format!("{}{}", tag, i)).collect();
        if let Some(last) = parts.last_mut() {
            last.push('.');
        }
        parts.join(" ")
    }

    #[test]
    fn test_count_words() {
        assert_eq!(count_words(""), 0);
        assert_eq!(count_words("   \n\t "), 0);
        assert_eq!(count_words("one  two\nthree"), 3);
        assert!(needs_chunking("a b c d", 3));
        assert!(!needs_chunking("a b c", 3));
    }

    #[test]
    fn test_blank_text_yields_nothing() {
        assert!(chunk_text("", 10).is_empty());
        assert!(chunk_text("  \n ", 10).is_empty());
    }

    #[test]
    fn test_short_text_is_returned_unchanged() {
        let text = "  Hello world.  Keep   my spacing!  ";
        assert_eq!(chunk_text(text, 10), vec![text.to_string()]);
        // 幂等
        assert_eq!(chunk_text(&chunk_text(text, 10)[0], 10), vec![text.to_string()]);
    }

    #[test]
    fn test_chunks_end_at_sentence_boundaries() {
        let text = [sentence(4, "a"), sentence(4, "b"), sentence(4, "c")].join(" ");
        let chunks = chunk_text(&text, 8);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], format!("{} {}", sentence(4, "a"), sentence(4, "b")));
        assert_eq!(chunks[1], sentence(4, "c"));
        for chunk in &chunks {
            assert!(chunk.ends_with('.'));
            assert!(count_words(chunk) <= 8);
        }
    }

    #[test]
    fn test_join_reconstructs_text_up_to_whitespace() {
        let text = "First one here.\n\nSecond   sentence is here!  Third? Fourth sentence without end";
        let chunks = chunk_text(text, 4);

        let normalize = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ");
        assert_eq!(normalize(&chunks.join(" ")), normalize(text));
        assert_eq!(chunks, chunk_text(text, 4));
    }

    #[test]
    fn test_long_sentence_is_hard_split() {
        let long = sentence(25, "w");
        let text = format!("{} {}", sentence(3, "p"), long);
        let chunks = chunk_text(&text, 10);

        assert_eq!(chunks[0], sentence(3, "p"));
        assert_eq!(chunks.len(), 1 + 3);
        assert_eq!(count_words(&chunks[1]), 10);
        assert_eq!(count_words(&chunks[2]), 10);
        assert_eq!(count_words(&chunks[3]), 5);
    }

    #[test]
    fn test_1200_words_in_three_chunks() {
        // 24 句，每句 50 词
        let text = (0..24)
            .map(|i| sentence(50, &format!("s{}w", i)))
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(count_words(&text), 1200);

        let chunks = chunk_text(&text, DEFAULT_CHUNK_WORDS);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| count_words(c) <= DEFAULT_CHUNK_WORDS));
        assert_eq!(chunks.iter().map(|c| count_words(c)).sum::<usize>(), 1200);
    }

    #[test]
    fn test_split_long_sentence_counts() {
        let parts = split_long_sentence("a b c d e f g", 3);
        assert_eq!(parts, vec!["a b c", "d e f", "g"]);
    }
}
