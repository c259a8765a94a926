//! 一阶段评估记录：伤情、呼吸、行动能力、环境危险等关键字段
//!
//! 字段值是自由文本，"unknown" 为未评估占位；assessed 集合记录显式评估过的
//! 字段（consciousness 默认 "Conscious" 但不算已评估）。合并策略：injuries
//! 追加去重，其余字段覆盖；stuck_trapped 为阳性时自动推断 can_walk。

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::{is_unknown_value, FieldUpdates, UNKNOWN};

/// 一阶段的全部字段名
pub const ASSESSMENT_FIELDS: [&str; 7] = [
    "injuries",
    "people_in_surroundings",
    "can_walk",
    "stuck_trapped",
    "breathing",
    "consciousness",
    "immediate_danger",
];

/// 评估优先级（固定全序，决定下一个提问字段）
pub const ASSESSMENT_PRIORITY: [&str; 6] = [
    "injuries",
    "breathing",
    "immediate_danger",
    "stuck_trapped",
    "can_walk",
    "people_in_surroundings",
];

/// 一阶段评估记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentRecord {
    fields: BTreeMap<String, String>,
    assessed: BTreeSet<String>,
    /// 机器人 GPS 写入的位置描述，不参与完成度判定
    location: Option<String>,
}

impl Default for AssessmentRecord {
    fn default() -> Self {
        let mut fields = BTreeMap::new();
        for name in ASSESSMENT_FIELDS {
            fields.insert(name.to_string(), UNKNOWN.to_string());
        }
        // 默认假设：能对话即有意识
        fields.insert("consciousness".to_string(), "Conscious".to_string());
        Self {
            fields,
            assessed: BTreeSet::new(),
            location: None,
        }
    }
}

impl AssessmentRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn is_assessed(&self, field: &str) -> bool {
        self.assessed.contains(field)
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// 机器人 GPS 写入位置
    pub fn set_location(&mut self, latitude: f64, longitude: f64, description: &str) {
        self.location = Some(format!(
            "Latitude {}, Longitude {} ({})",
            latitude, longitude, description
        ));
    }

    /// 字段快照（不含 location），用于备用交互镜像与报告
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.fields.clone()
    }

    /// 已有值的字段（非 unknown），用于提示词拼装
    pub fn known_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .filter(|(_, v)| !is_unknown_value(v))
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// 合并一批已校验的更新，返回实际写入的字段名
    pub fn apply(&mut self, updates: &FieldUpdates) -> Vec<String> {
        let mut applied = Vec::new();
        for (key, value) in updates {
            let Some(current) = self.fields.get(key).cloned() else {
                continue;
            };

            if current == UNKNOWN {
                self.fields.insert(key.clone(), value.clone());
            } else if value != &current {
                if key == "injuries" && current.to_lowercase().starts_with("yes") {
                    if !is_duplicate_info(&current, value) {
                        let addition = value.replace("yes - ", "");
                        self.fields
                            .insert(key.clone(), format!("{}; {}", current, addition));
                    }
                } else {
                    self.fields.insert(key.clone(), value.clone());
                }
            }
            self.assessed.insert(key.clone());
            applied.push(key.clone());
        }

        // 受困即默认无法行走
        if let Some(stuck) = updates.get("stuck_trapped") {
            if stuck.to_lowercase().contains("yes")
                && self.fields.get("can_walk").map(String::as_str) == Some(UNKNOWN)
            {
                self.fields.insert(
                    "can_walk".to_string(),
                    "No - victim is stuck/trapped".to_string(),
                );
                self.assessed.insert("can_walk".to_string());
                applied.push("can_walk".to_string());
            }
        }

        applied
    }

    /// 备用交互树或先验评估直接写入单个字段
    pub fn set_field(&mut self, field: &str, value: impl Into<String>) {
        if self.fields.contains_key(field) {
            self.fields.insert(field.to_string(), value.into());
            self.assessed.insert(field.to_string());
        }
    }

    pub fn is_complete(&self) -> bool {
        ASSESSMENT_PRIORITY.iter().all(|f| self.assessed.contains(*f))
    }

    /// 下一个待评估字段；全部完成时返回 None
    pub fn next_priority_field(&self) -> Option<&'static str> {
        ASSESSMENT_PRIORITY
            .iter()
            .find(|f| !self.assessed.contains(**f))
            .copied()
    }

    pub fn assessed_count(&self) -> usize {
        ASSESSMENT_PRIORITY
            .iter()
            .filter(|f| self.assessed.contains(**f))
            .count()
    }

    /// 先验评估是否足以跳过一阶段（五个关键字段均已有值）
    pub fn is_sufficient_for_phase_2(&self) -> bool {
        ["injuries", "breathing", "can_walk", "immediate_danger", "consciousness"]
            .iter()
            .all(|f| {
                self.fields
                    .get(*f)
                    .map(|v| !is_unknown_value(v))
                    .unwrap_or(false)
            })
    }

    pub fn can_victim_walk(&self) -> bool {
        if !self.assessed.contains("can_walk") {
            return false;
        }
        let value = self.fields["can_walk"].to_lowercase();
        value.contains("yes") || value.contains("can walk")
    }

    pub fn is_victim_stuck(&self) -> bool {
        if !self.assessed.contains("stuck_trapped") {
            return false;
        }
        let value = self.fields["stuck_trapped"].to_lowercase();
        value.contains("yes") || value.contains("stuck") || value.contains("trapped")
    }
}

/// 新旧伤情描述是否互为子串（去掉 yes/no 前缀后，大小写不敏感）
fn is_duplicate_info(existing: &str, new: &str) -> bool {
    let existing = existing.to_lowercase();
    let new = new
        .to_lowercase()
        .replace("yes - ", "")
        .replace("no - ", "");
    existing.contains(&new) || new.contains(&existing)
}
