//! 二阶段舒适需求记录：用药、过敏、年龄与特殊状况
//!
//! 完成标准比一阶段宽松：前五个优先字段评估满四个即可。合并策略是追加：
//! 已有值与新值不同则以 "; " 连接。

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{is_unknown_value, FieldUpdates, UNKNOWN};

/// 二阶段字段，同时也是优先级顺序
pub const COMFORT_PRIORITY: [&str; 9] = [
    "emergency_medication",
    "medical_conditions",
    "allergies",
    "regular_medication",
    "age",
    "elderly",
    "mobility_impairment",
    "pregnant",
    "mental_health_conditions",
];

const NEGATIVE_ANSWERS: [&str; 3] = ["no", "none", "n/a"];

/// 二阶段舒适需求记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComfortRecord {
    fields: BTreeMap<String, String>,
    assessed: BTreeSet<String>,
}

impl Default for ComfortRecord {
    fn default() -> Self {
        let mut fields = BTreeMap::new();
        for name in COMFORT_PRIORITY {
            fields.insert(name.to_string(), UNKNOWN.to_string());
        }
        Self {
            fields,
            assessed: BTreeSet::new(),
        }
    }
}

impl ComfortRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn is_assessed(&self, field: &str) -> bool {
        self.assessed.contains(field)
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.fields.clone()
    }

    pub fn known_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .filter(|(_, v)| !is_unknown_value(v))
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// 合并已校验更新：未知则写入，已知且不同则以 "; " 追加
    pub fn apply(&mut self, updates: &FieldUpdates) -> Vec<String> {
        let mut applied = Vec::new();
        for (key, value) in updates {
            let Some(current) = self.fields.get(key).cloned() else {
                continue;
            };
            if current == UNKNOWN {
                self.fields.insert(key.clone(), value.clone());
            } else if value != &current {
                self.fields
                    .insert(key.clone(), format!("{}; {}", current, value));
            }
            self.assessed.insert(key.clone());
            applied.push(key.clone());
        }
        applied
    }

    /// 前五个优先字段评估满四个即视为完成
    pub fn is_complete(&self) -> bool {
        let assessed = COMFORT_PRIORITY[..5]
            .iter()
            .filter(|f| self.assessed.contains(**f))
            .count();
        assessed >= 4
    }

    pub fn next_priority_field(&self) -> Option<&'static str> {
        COMFORT_PRIORITY
            .iter()
            .find(|f| !self.assessed.contains(**f) && self.fields[**f] == UNKNOWN)
            .copied()
    }

    pub fn assessed_count(&self) -> usize {
        self.assessed.len()
    }

    pub fn needs_emergency_medication(&self) -> bool {
        self.positive_field("emergency_medication")
    }

    pub fn has_critical_allergies(&self) -> bool {
        self.positive_field("allergies")
    }

    pub fn has_mobility_limitations(&self) -> bool {
        self.positive_field("mobility_impairment")
    }

    /// 65 岁以上或 elderly 字段为肯定
    pub fn is_elderly(&self) -> bool {
        let elderly = self.fields["elderly"].to_lowercase();
        if elderly != UNKNOWN && (elderly == "yes" || elderly == "true") {
            return true;
        }
        let age = &self.fields["age"];
        if age != UNKNOWN {
            if let Ok(re) = Regex::new(r"\d+") {
                if let Some(m) = re.find(age) {
                    if let Ok(n) = m.as_str().parse::<u32>() {
                        return n >= 65;
                    }
                }
            }
        }
        false
    }

    fn positive_field(&self, field: &str) -> bool {
        let value = &self.fields[field];
        value != UNKNOWN && !NEGATIVE_ANSWERS.contains(&value.to_lowercase().as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn updates(pairs: &[(&str, &str)]) -> FieldUpdates {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_append_merge() {
        let mut record = ComfortRecord::new();
        record.apply(&updates(&[("allergies", "penicillin")]));
        record.apply(&updates(&[("allergies", "peanuts")]));
        assert_eq!(record.get("allergies"), Some("penicillin; peanuts"));
    }

    #[test]
    fn test_complete_at_four_of_five() {
        let mut record = ComfortRecord::new();
        for field in &COMFORT_PRIORITY[..3] {
            record.apply(&updates(&[(field, "no")]));
        }
        assert!(!record.is_complete());
        record.apply(&updates(&[("regular_medication", "no")]));
        assert!(record.is_complete());
    }

    #[test]
    fn test_low_priority_fields_do_not_complete() {
        let mut record = ComfortRecord::new();
        for field in &COMFORT_PRIORITY[5..] {
            record.apply(&updates(&[(field, "no")]));
        }
        assert!(!record.is_complete());
    }

    #[test]
    fn test_next_priority_field() {
        let mut record = ComfortRecord::new();
        assert_eq!(record.next_priority_field(), Some("emergency_medication"));
        record.apply(&updates(&[("emergency_medication", "insulin")]));
        assert_eq!(record.next_priority_field(), Some("medical_conditions"));
    }

    #[test]
    fn test_elderly_from_age_digits() {
        let mut record = ComfortRecord::new();
        record.apply(&updates(&[("age", "I am 72 years old")]));
        assert!(record.is_elderly());

        let mut young = ComfortRecord::new();
        young.apply(&updates(&[("age", "34")]));
        assert!(!young.is_elderly());
    }

    #[test]
    fn test_elderly_flag() {
        let mut record = ComfortRecord::new();
        record.apply(&updates(&[("elderly", "yes")]));
        assert!(record.is_elderly());
    }

    #[test]
    fn test_negative_answers_not_critical() {
        let mut record = ComfortRecord::new();
        record.apply(&updates(&[("allergies", "None")]));
        assert!(!record.has_critical_allergies());
        record.apply(&updates(&[("emergency_medication", "insulin")]));
        assert!(record.needs_emergency_medication());
    }
}
