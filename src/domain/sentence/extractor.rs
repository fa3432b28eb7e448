//! 例句提取器
//!
//! 从卡片内容中提取可朗读的例句，去除 markdown 强调与音标标注

use once_cell::sync::Lazy;
use regex::Regex;

/// 卡片正面分段标记
pub const FRONT_MARKER: &str = "==front part==";

static FRONT_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)==front part==").expect("valid regex"));
static FRONT_SECTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)==front part==(.*?)==front part==").expect("valid regex"));
static PART_OF_SPEECH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+\*[^*]+\*$").expect("valid regex"));
static BOLD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^*]+)\*\*").expect("valid regex"));
static UNDERSCORE_BOLD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"__([^_]+)__").expect("valid regex"));
static ITALIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^*]+)\*").expect("valid regex"));
// 斜线内首字符不能是数字或空白，末字符不能是空白，避免吞掉 1/2、and/or 这类普通文本
static SLASH_IPA_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/[^/\s\d](?:[^/]*[^/\s])?/(\s*\(\s*[A-Za-z]{2,3}\s*\))?\s*").expect("valid regex")
});
static BRACKET_IPA_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[[^\]]+\](\s*\(\s*[A-Za-z]{2,3}\s*\))?\s*").expect("valid regex")
});
static MULTI_SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").expect("valid regex"));
static SPACE_BEFORE_PUNCT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+([.,!?;:])").expect("valid regex"));

/// 提取例句
///
/// - 含有 `==front part==` 标记时只取正面段落的第一行；标记不成对视为没有例句
/// - 不含标记时整段文本即为例句
///
/// 返回去除标注后的例句（保留原始大小写），为空时返回 `None`
pub fn extract_example_sentence(content: &str) -> Option<String> {
    let line = if FRONT_MARKER_RE.is_match(content) {
        let front = FRONT_SECTION_RE.captures(content)?.get(1)?.as_str().trim();
        front.lines().next().unwrap_or_default().to_string()
    } else {
        content.to_string()
    };

    let cleaned = clean_sentence(&line);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// 清理单个例句中的标注
fn clean_sentence(line: &str) -> String {
    let sentence = line.trim();

    // 1. 末尾的词性标注，如 *noun*
    let sentence = PART_OF_SPEECH_RE.replace(sentence, "");

    // 2. 强调标记，保留目标词
    let sentence = BOLD_RE.replace_all(&sentence, "$1");
    let sentence = UNDERSCORE_BOLD_RE.replace_all(&sentence, "$1");
    let sentence = ITALIC_RE.replace_all(&sentence, "$1");

    // 3. 音标 /.../ 与 [...]，可带地区标记 (US) / (UK)
    let sentence = SLASH_IPA_RE.replace_all(&sentence, "");
    let sentence = BRACKET_IPA_RE.replace_all(&sentence, "");

    // 4. 空白与标点
    let sentence = MULTI_SPACE_RE.replace_all(&sentence, " ");
    let sentence = SPACE_BEFORE_PUNCT_RE.replace_all(&sentence, "$1");

    sentence.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn front(body: &str) -> String {
        format!("{FRONT_MARKER}\n{body}\n{FRONT_MARKER}")
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(extract_example_sentence(""), None);
        assert_eq!(extract_example_sentence("   \n  "), None);
    }

    #[test]
    fn test_plain_text_without_markers() {
        assert_eq!(
            extract_example_sentence("Some content without markers").as_deref(),
            Some("Some content without markers")
        );
    }

    #[test]
    fn test_unclosed_marker_is_not_a_sentence() {
        assert_eq!(extract_example_sentence("==front part== no closing marker"), None);
    }

    #[test]
    fn test_first_line_of_front_section_only() {
        let content = format!(
            "{}\n\n==back part==\nThis should not be included\n==back part==",
            front("This is the first line.\nThis second line should be ignored.")
        );
        assert_eq!(
            extract_example_sentence(&content).as_deref(),
            Some("This is the first line.")
        );
    }

    #[test]
    fn test_removes_formatting_and_part_of_speech() {
        let content = front("She **endeavored** /ɪnˈdevərd/ to finish her project on time *verb*");
        assert_eq!(
            extract_example_sentence(&content).as_deref(),
            Some("She endeavored to finish her project on time")
        );
    }

    #[test]
    fn test_region_tagged_slash_notation() {
        let content = front(
            "Don't worry about being **presumptuous** /prɪˈzʌmp.tʃuː.əs/ (US) /prɪˈzʌmp.tʃəs/ (UK). You don't have to tell anyone.",
        );
        assert_eq!(
            extract_example_sentence(&content).as_deref(),
            Some("Don't worry about being presumptuous. You don't have to tell anyone.")
        );
    }

    #[test]
    fn test_square_bracket_notation() {
        let content = front("I often **read** [riːd] (US) [red] (UK) books about science.");
        assert_eq!(
            extract_example_sentence(&content).as_deref(),
            Some("I often read books about science.")
        );

        let content = front("Can you **read**[riːd]? It's an important skill.");
        assert_eq!(
            extract_example_sentence(&content).as_deref(),
            Some("Can you read? It's an important skill.")
        );
    }

    #[test]
    fn test_mixed_notation() {
        let content = front("The **content** [ˈkɒntent] /kənˈtent/ varies depending on the context.");
        assert_eq!(
            extract_example_sentence(&content).as_deref(),
            Some("The content varies depending on the context.")
        );
    }

    #[test]
    fn test_part_of_speech_on_next_paragraph() {
        let text = "I read [riːd] about the new discoveries in quantum physics.\n*verb, past tense*";
        assert_eq!(
            extract_example_sentence(text).as_deref(),
            Some("I read about the new discoveries in quantum physics.")
        );
    }

    #[test]
    fn test_ordinary_slashes_are_kept() {
        assert_eq!(
            extract_example_sentence("The ratio is 1/2 and 3/4.").as_deref(),
            Some("The ratio is 1/2 and 3/4.")
        );
        assert_eq!(
            extract_example_sentence("Cats and/or dogs /ˈkæts/ are welcome.").as_deref(),
            Some("Cats and/or dogs are welcome.")
        );
    }
}
