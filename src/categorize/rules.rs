//! 规则分类模块
//!
//! # 设计思路
//!
//! 按固定顺序逐条匹配，**先命中者胜**。顺序本身就是歧义的裁决规则：
//! 图片路径先于普通文件路径，URL 先于邮箱，邮箱先于电话号码，
//! 多行缩进启发式先于逐行代码特征。
//!
//! # 实现思路
//!
//! - 正则通过 `once_cell::sync::Lazy` 在首次调用时编译，后续零成本复用。
//! - 电话号码只接受 ASCII 数字，`\d` 的 Unicode 语义在这里被刻意排除。

use once_cell::sync::Lazy;
use regex::Regex;

use super::Category;
use super::image_path::is_image;

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:https?://|file:///|ftp://)\S+$|^(?:www\.)?[a-z0-9][-a-z0-9]*(?:\.[a-z0-9][-a-z0-9]*)*\.[a-z]{2,}(?:/\S*)?$",
    )
    .expect("URL 正则无效")
});

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}$").expect("邮箱正则无效")
});

static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9\-()+\s]{10,}$").expect("电话正则无效"));

static FILEPATH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[a-zA-Z]:\\|/(?:home|usr|var|etc|opt|tmp|mnt|media)|~/)[\w\\/\-.\s]+$")
        .expect("文件路径正则无效")
});

/// 代码特征（不锚定整串，任意位置命中即可）
///
/// 1. 行首语言关键字
/// 2. 以 `}` `{` `]` `[` 加分号结尾的行
/// 3. 行首注释符 `#` 或 `//`
/// 4. 箭头函数 `=> {` / `=> (`
/// 5. 行首注解 / 装饰器 `@name`
/// 6. HTML 风格标签
static CODE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)(?:^\s*(?:def|class|function|const|let|var|import|from|export|public|private|protected)\s+|[{}\[\]];$|^\s*(?:#|//)|=>\s*[{(]|^\s*@\w+|<[a-zA-Z][^>]*/?>)",
    )
    .expect("代码正则无效")
});

/// 多行文本中缩进行占比达到该比例即视为代码（30%）
const INDENTED_RATIO_NUMERATOR: usize = 3;
const INDENTED_RATIO_DENOMINATOR: usize = 10;

/// 按规则对文本分类，结果确定且总是有值（默认 `text`）
pub fn classify_by_rules(text: &str) -> Category {
    let text = text.trim();

    if text.is_empty() {
        return Category::Text;
    }

    if is_image(text) {
        return Category::Image;
    }

    if URL_PATTERN.is_match(text) {
        return Category::Url;
    }

    if EMAIL_PATTERN.is_match(text) {
        return Category::Email;
    }

    if is_phone_number(text) {
        return Category::Phone;
    }

    if FILEPATH_PATTERN.is_match(text) {
        return Category::Filepath;
    }

    if is_indented_block(text) {
        return Category::Code;
    }

    if CODE_PATTERN.is_match(text) {
        return Category::Code;
    }

    Category::Text
}

/// 形状匹配且去掉分隔符后全部为 ASCII 数字
fn is_phone_number(text: &str) -> bool {
    if !PHONE_PATTERN.is_match(text) {
        return false;
    }

    let digits: String = text
        .chars()
        .filter(|c| !matches!(c, '-' | ' ' | '(' | ')' | '+'))
        .collect();

    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

fn is_indented_block(text: &str) -> bool {
    let lines: Vec<&str> = text.split('\n').collect();
    if lines.len() <= 1 {
        return false;
    }

    let indented = lines
        .iter()
        .filter(|line| line.starts_with("  ") || line.starts_with('\t'))
        .count();

    indented * INDENTED_RATIO_DENOMINATOR >= lines.len() * INDENTED_RATIO_NUMERATOR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_whitespace_are_text() {
        assert_eq!(classify_by_rules(""), Category::Text);
        assert_eq!(classify_by_rules("   \n\t "), Category::Text);
    }

    #[test]
    fn image_path_beats_filepath() {
        assert_eq!(classify_by_rules("/home/user/cat.png"), Category::Image);
        assert_eq!(classify_by_rules("/home/user/cat.txt"), Category::Filepath);
    }

    #[test]
    fn urls_with_and_without_scheme() {
        assert_eq!(classify_by_rules("https://example.com/a?b=c"), Category::Url);
        assert_eq!(classify_by_rules("ftp://files.example.org"), Category::Url);
        assert_eq!(classify_by_rules("www.example.com"), Category::Url);
        assert_eq!(classify_by_rules("docs.rs/regex"), Category::Url);
        assert_eq!(classify_by_rules("file:///tmp/readme.md"), Category::Url);
    }

    #[test]
    fn email_is_not_mistaken_for_url() {
        assert_eq!(classify_by_rules("user@example.com"), Category::Email);
    }

    #[test]
    fn phone_requires_length_and_digits() {
        assert_eq!(classify_by_rules("123-456-7890"), Category::Phone);
        assert_eq!(classify_by_rules("+1 (555) 010-9999"), Category::Phone);
        assert_eq!(classify_by_rules("123"), Category::Text);
        assert_eq!(classify_by_rules("--- ---- ---"), Category::Text);
    }

    #[test]
    fn phone_rejects_non_ascii_digits() {
        assert_eq!(classify_by_rules("١٢٣-٤٥٦-٧٨٩٠"), Category::Text);
    }

    #[test]
    fn filepaths_for_known_roots() {
        assert_eq!(classify_by_rules("C:\\Program Files\\app"), Category::Filepath);
        assert_eq!(classify_by_rules("~/projects/notes"), Category::Filepath);
        assert_eq!(classify_by_rules("/etc/hosts"), Category::Filepath);
    }

    #[test]
    fn indented_multi_line_text_is_code() {
        let text = "items:\n  first\n  second\nend";
        assert_eq!(classify_by_rules(text), Category::Code);
    }

    #[test]
    fn sparse_indentation_is_not_code() {
        let text = "one\ntwo\nthree\nfour\n  five";
        assert_eq!(classify_by_rules(text), Category::Text);
    }

    #[test]
    fn code_features_anywhere() {
        assert_eq!(classify_by_rules("def main():"), Category::Code);
        assert_eq!(classify_by_rules("const x = () => { return 1 }"), Category::Code);
        assert_eq!(classify_by_rules("// comment"), Category::Code);
        assert_eq!(classify_by_rules("@Override"), Category::Code);
        assert_eq!(classify_by_rules("<div class=\"a\">"), Category::Code);
        assert_eq!(classify_by_rules("hello\nfoo();\n};"), Category::Code);
    }

    #[test]
    fn plain_prose_is_text() {
        assert_eq!(classify_by_rules("hello world"), Category::Text);
        assert_eq!(classify_by_rules("Meeting moved to Tuesday."), Category::Text);
    }
}
