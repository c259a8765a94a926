//! 从自由文本中提取 JSON 对象
//!
//! LLM 常把 JSON 包在 ```json 围栏或解释性文字里；这里按「围栏优先、
//! 首 `{` 到末 `}` 兜底」的顺序定位并解析第一个对象。

use serde_json::{Map, Value};

/// 提取文本中的第一个 JSON 对象；找不到或解析失败返回 None
pub fn extract_json_object(text: &str) -> Option<Map<String, Value>> {
    let trimmed = text.trim();

    let candidate = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        rest.find("```")
            .map(|end| rest[..end].trim())
            .unwrap_or_else(|| rest.trim())
    } else if let Some(start) = trimmed.find("```") {
        let rest = &trimmed[start + 3..];
        rest.find("```")
            .map(|end| rest[..end].trim())
            .unwrap_or_else(|| rest.trim())
    } else {
        trimmed
    };

    let candidate = match (candidate.find('{'), candidate.rfind('}')) {
        (Some(start), Some(end)) if start < end => &candidate[start..=end],
        _ => return None,
    };

    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_object() {
        let map = extract_json_object(r#"{"injuries": "leg pain"}"#).unwrap();
        assert_eq!(map["injuries"], "leg pain");
    }

    #[test]
    fn test_fenced_json() {
        let text = "Here is the result:\n```json\n{\"breathing\": \"normal\"}\n```\nDone.";
        let map = extract_json_object(text).unwrap();
        assert_eq!(map["breathing"], "normal");
    }

    #[test]
    fn test_bare_fence() {
        let text = "```\n{\"can_walk\": \"yes\"}\n```";
        let map = extract_json_object(text).unwrap();
        assert_eq!(map["can_walk"], "yes");
    }

    #[test]
    fn test_prose_wrapped() {
        let text = "Based on the exchange I extracted {\"consciousness\": \"alert\"} as updates.";
        let map = extract_json_object(text).unwrap();
        assert_eq!(map["consciousness"], "alert");
    }

    #[test]
    fn test_truncated_object() {
        assert!(extract_json_object("{\"injuries\": \"br").is_none());
    }

    #[test]
    fn test_no_json() {
        assert!(extract_json_object("I could not determine any fields.").is_none());
    }

    #[test]
    fn test_non_object_json() {
        assert!(extract_json_object("[1, 2, 3]").is_none());
    }
}
