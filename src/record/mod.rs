//! 受困者状态记录：字段校验、一阶段评估与二阶段舒适需求
//!
//! 两类记录共用同一套更新校验规则：丢弃未知字段、空值、"unknown" 占位
//! 以及与当前值相同的无效更新。字段一旦被评估过就不会回退为 unknown。

pub mod assessment;
pub mod comfort;

use std::collections::BTreeMap;

use serde_json::{Map, Value};

pub use assessment::AssessmentRecord;
pub use comfort::ComfortRecord;

/// 未评估字段的占位值
pub const UNKNOWN: &str = "unknown";

/// 一次提取得到的有效字段更新（字段名 -> 新值）
pub type FieldUpdates = BTreeMap<String, String>;

/// 值是否等价于未知：空白或大小写不敏感的 "unknown"
pub fn is_unknown_value(value: &str) -> bool {
    let v = value.trim();
    v.is_empty() || v.eq_ignore_ascii_case(UNKNOWN)
}

/// 将 JSON 值转成纯文本；对象与数组不接受
fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// 过滤一批原始更新：
/// - 不在 `allowed` 中的字段丢弃
/// - 空白 / "unknown" 值丢弃
/// - 与当前值相同的更新丢弃（避免无效覆盖刷新评估集合）
pub fn validate_updates(
    raw: &Map<String, Value>,
    allowed: &[&str],
    current: impl Fn(&str) -> Option<String>,
) -> FieldUpdates {
    let mut updates = FieldUpdates::new();
    for (key, value) in raw {
        if !allowed.contains(&key.as_str()) {
            continue;
        }
        let Some(text) = value_as_text(value) else {
            continue;
        };
        let text = text.trim().to_string();
        if is_unknown_value(&text) {
            continue;
        }
        if let Some(cur) = current(key) {
            if cur == text {
                continue;
            }
        }
        updates.insert(key.clone(), text);
    }
    updates
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_drops_unknown_fields_and_values() {
        let input = raw(json!({
            "injuries": "broken leg",
            "favorite_color": "blue",
            "breathing": "unknown",
            "can_walk": "  ",
            "consciousness": "Unknown"
        }));
        let updates = validate_updates(
            &input,
            &["injuries", "breathing", "can_walk", "consciousness"],
            |_| Some(UNKNOWN.to_string()),
        );
        assert_eq!(updates.len(), 1);
        assert_eq!(updates["injuries"], "broken leg");
    }

    #[test]
    fn test_drops_no_op_updates() {
        let input = raw(json!({"breathing": "normal"}));
        let updates = validate_updates(&input, &["breathing"], |_| Some("normal".to_string()));
        assert!(updates.is_empty());
    }

    #[test]
    fn test_accepts_numeric_values() {
        let input = raw(json!({"age": 72}));
        let updates = validate_updates(&input, &["age"], |_| Some(UNKNOWN.to_string()));
        assert_eq!(updates["age"], "72");
    }
}
