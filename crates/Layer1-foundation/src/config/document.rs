//! 설정 문서 파싱 (JSON / JSONC / TOML)

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;

/// 문서 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Toml,
}

impl DocumentFormat {
    /// 확장자로 형식 판별 (`.toml` 이외는 JSON)
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => DocumentFormat::Toml,
            _ => DocumentFormat::Json,
        }
    }
}

/// 문자열을 JSON 값으로 파싱
pub fn parse_document(content: &str, format: DocumentFormat) -> Result<Value> {
    match format {
        DocumentFormat::Json => Ok(serde_json::from_str(&strip_json_comments(content))?),
        DocumentFormat::Toml => {
            let table: toml::Value = toml::from_str(content)?;
            Ok(serde_json::to_value(table)?)
        }
    }
}

/// 파일을 읽어 JSON 값으로 파싱
pub fn read_document(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)?;
    parse_document(&content, DocumentFormat::from_path(path)).map_err(|e| {
        Error::InvalidInput(format!("Invalid document at {}: {}", path.display(), e))
    })
}

/// 파일을 읽어 타입으로 역직렬화
pub fn read_typed<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let value = read_document(path)?;
    serde_json::from_value(value).map_err(|e| {
        Error::InvalidInput(format!("Invalid document at {}: {}", path.display(), e))
    })
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Scan {
    Code,
    Str,
    StrEscape,
    LineComment,
    BlockComment,
}

/// JSONC → JSON
///
/// `//`, `/* */` 주석과 `}` / `]` 앞의 trailing comma 를 제거합니다.
/// 주석 안의 줄바꿈은 남겨서 파서 에러의 줄 번호가 원문과 같습니다.
pub fn strip_json_comments(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut state = Scan::Code;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        state = match (state, c) {
            (Scan::Str, '\\') => {
                output.push(c);
                Scan::StrEscape
            }
            (Scan::Str, '"') => {
                output.push(c);
                Scan::Code
            }
            (Scan::Str, _) => {
                output.push(c);
                Scan::Str
            }
            (Scan::StrEscape, _) => {
                output.push(c);
                Scan::Str
            }
            (Scan::LineComment, '\n') => {
                output.push(c);
                Scan::Code
            }
            (Scan::LineComment, _) => Scan::LineComment,
            (Scan::BlockComment, '*') if chars.peek() == Some(&'/') => {
                chars.next();
                Scan::Code
            }
            (Scan::BlockComment, '\n') => {
                output.push(c);
                Scan::BlockComment
            }
            (Scan::BlockComment, _) => Scan::BlockComment,
            (Scan::Code, '/') if chars.peek() == Some(&'/') => {
                chars.next();
                Scan::LineComment
            }
            (Scan::Code, '/') if chars.peek() == Some(&'*') => {
                chars.next();
                Scan::BlockComment
            }
            (Scan::Code, '}' | ']') => {
                drop_trailing_comma(&mut output);
                output.push(c);
                Scan::Code
            }
            (Scan::Code, '"') => {
                output.push(c);
                Scan::Str
            }
            (Scan::Code, _) => {
                output.push(c);
                Scan::Code
            }
        };
    }

    output
}

/// 마지막 공백이 아닌 문자가 `,` 이면 제거 (공백은 유지)
fn drop_trailing_comma(output: &mut String) {
    let trimmed = output.trim_end();
    if trimmed.ends_with(',') {
        let at = trimmed.len() - 1;
        output.remove(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_json_comments() {
        let input = r#"{
            // This is a comment
            "key": "value", /* inline comment */
            "url": "http://example.com/path"
        }"#;

        let output = strip_json_comments(input);
        assert!(!output.contains("comment"));

        let value: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["url"], "http://example.com/path");
    }

    #[test]
    fn test_trailing_commas_and_line_numbers() {
        let input = "{\n  /* a\n  b */\n  \"list\": [1, 2,],\n  \"s\": \"a,]\\\"//x\",\n}";
        let output = strip_json_comments(input);

        assert_eq!(output.lines().count(), input.lines().count());
        let value: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value, json!({ "list": [1, 2], "s": "a,]\"//x" }));
    }

    #[test]
    fn test_parse_toml() {
        let value = parse_document(
            r#"
            coreVersion = "1.2.0"
            [limits]
            timeout = 5
            "#,
            DocumentFormat::Toml,
        )
        .unwrap();

        assert_eq!(value, json!({ "coreVersion": "1.2.0", "limits": { "timeout": 5 } }));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(DocumentFormat::from_path(Path::new("a/b.toml")), DocumentFormat::Toml);
        assert_eq!(DocumentFormat::from_path(Path::new("a/b.json")), DocumentFormat::Json);
        assert_eq!(DocumentFormat::from_path(Path::new("a/b")), DocumentFormat::Json);
    }
}
