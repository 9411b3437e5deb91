//! Config Schema - 플러그인 설정 스키마 검증
//!
//! JSON Schema 의 부분 집합을 직접 검증합니다.
//!
//! 지원 키워드:
//! - `type`: object / array / string / number / integer / boolean (생략 시 any)
//! - `properties`, `required`, `additionalProperties`
//! - `items`, `minItems`, `maxItems`
//! - `enum`, `minimum`, `maximum`, `minLength`, `maxLength`, `pattern`
//! - `default`: `apply_defaults` 가 빠진 필드를 채울 때 사용
//!
//! ```ignore
//! let schema: ConfigSchema = serde_json::from_value(json!({
//!     "type": "object",
//!     "properties": {
//!         "maxItems": { "type": "integer", "minimum": 1, "maximum": 1000, "default": 50 }
//!     },
//!     "required": ["maxItems"]
//! }))?;
//!
//! let violations = schema.validate(&json!({ "maxItems": -5 }));
//! assert_eq!(violations[0].path, "maxItems");
//! ```

use crate::error::SchemaViolation;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// 값 타입
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    Object,
    Array,
    String,
    Number,
    Integer,
    Boolean,
    #[default]
    Any,
}

impl std::fmt::Display for SchemaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Object => "object",
            Self::Array => "array",
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Any => "any",
        };
        write!(f, "{}", name)
    }
}

/// 설정 스키마 노드
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSchema {
    #[serde(rename = "type", default)]
    pub kind: SchemaType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    // object
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, ConfigSchema>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    /// false 면 선언되지 않은 키를 거부 (기본 허용)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<bool>,

    // array
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ConfigSchema>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,

    // scalar
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl ConfigSchema {
    /// 아무 값이나 허용하는 스키마
    pub fn any() -> Self {
        Self::default()
    }

    /// 빈 object 스키마
    pub fn object() -> Self {
        Self {
            kind: SchemaType::Object,
            ..Default::default()
        }
    }

    /// 빌더 패턴: 속성 추가
    pub fn with_property(mut self, name: impl Into<String>, schema: ConfigSchema) -> Self {
        self.properties.insert(name.into(), schema);
        self
    }

    /// 빌더 패턴: 필수 필드 추가
    pub fn with_required(mut self, name: impl Into<String>) -> Self {
        self.required.push(name.into());
        self
    }

    /// 빌더 패턴: 기본값 설정
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// integer 범위 스키마
    pub fn integer_range(min: i64, max: i64) -> Self {
        Self {
            kind: SchemaType::Integer,
            minimum: Some(min as f64),
            maximum: Some(max as f64),
            ..Default::default()
        }
    }

    /// 문자열 enum 스키마
    pub fn string_enum<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: SchemaType::String,
            enum_values: Some(values.into_iter().map(|v| Value::String(v.into())).collect()),
            ..Default::default()
        }
    }

    fn is_object_like(&self) -> bool {
        self.kind == SchemaType::Object || !self.properties.is_empty()
    }

    // ========================================================================
    // 기본값
    // ========================================================================

    /// 스키마에 선언된 기본값만으로 만든 설정 값
    pub fn defaults(&self) -> Value {
        let mut value = self.default.clone().unwrap_or(Value::Null);
        self.apply_defaults(&mut value);
        value
    }

    /// 빠진 필드를 스키마 기본값으로 채움 (이미 있는 값은 건드리지 않음)
    pub fn apply_defaults(&self, value: &mut Value) {
        if !self.is_object_like() {
            return;
        }
        if value.is_null() {
            *value = Value::Object(Map::new());
        }
        let Value::Object(map) = value else {
            return;
        };

        for (key, prop) in &self.properties {
            match map.get_mut(key) {
                Some(existing) => prop.apply_defaults(existing),
                None => {
                    let filled = prop.defaults();
                    if !filled.is_null() {
                        map.insert(key.clone(), filled);
                    }
                }
            }
        }
    }

    // ========================================================================
    // 검증
    // ========================================================================

    /// 값 검증. 위반 항목 전부를 반환 (비어 있으면 통과)
    pub fn validate(&self, value: &Value) -> Vec<SchemaViolation> {
        let mut violations = Vec::new();
        self.validate_at(value, "", &mut violations);
        violations
    }

    fn validate_at(&self, value: &Value, path: &str, out: &mut Vec<SchemaViolation>) {
        if !self.type_matches(value) {
            out.push(SchemaViolation::new(
                path,
                format!("expected {}, found {}", self.kind, type_name(value)),
            ));
            return;
        }

        if let Some(allowed) = &self.enum_values {
            if !allowed.contains(value) {
                let list: Vec<String> = allowed.iter().map(ToString::to_string).collect();
                out.push(SchemaViolation::new(
                    path,
                    format!("must be one of [{}]", list.join(", ")),
                ));
            }
        }

        match value {
            Value::Number(n) => self.check_number(n.as_f64().unwrap_or(f64::NAN), path, out),
            Value::String(s) => self.check_string(s, path, out),
            Value::Array(items) => self.check_array(items, path, out),
            Value::Object(map) => self.check_object(map, path, out),
            _ => {}
        }
    }

    fn type_matches(&self, value: &Value) -> bool {
        match self.kind {
            SchemaType::Any => true,
            SchemaType::Object => value.is_object(),
            SchemaType::Array => value.is_array(),
            SchemaType::String => value.is_string(),
            SchemaType::Boolean => value.is_boolean(),
            SchemaType::Number => value.is_number(),
            SchemaType::Integer => match value {
                Value::Number(n) => {
                    n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
                }
                _ => false,
            },
        }
    }

    fn check_number(&self, n: f64, path: &str, out: &mut Vec<SchemaViolation>) {
        if let Some(min) = self.minimum {
            if n < min {
                out.push(SchemaViolation::new(path, format!("must be >= {}", min)));
            }
        }
        if let Some(max) = self.maximum {
            if n > max {
                out.push(SchemaViolation::new(path, format!("must be <= {}", max)));
            }
        }
    }

    fn check_string(&self, s: &str, path: &str, out: &mut Vec<SchemaViolation>) {
        let len = s.chars().count();
        if let Some(min) = self.min_length {
            if len < min {
                out.push(SchemaViolation::new(path, format!("length must be >= {}", min)));
            }
        }
        if let Some(max) = self.max_length {
            if len > max {
                out.push(SchemaViolation::new(path, format!("length must be <= {}", max)));
            }
        }
        if let Some(pattern) = &self.pattern {
            match Regex::new(pattern) {
                Ok(re) if !re.is_match(s) => {
                    out.push(SchemaViolation::new(path, format!("must match /{}/", pattern)));
                }
                Ok(_) => {}
                Err(e) => {
                    out.push(SchemaViolation::new(path, format!("invalid pattern in schema: {}", e)));
                }
            }
        }
    }

    fn check_array(&self, items: &[Value], path: &str, out: &mut Vec<SchemaViolation>) {
        if let Some(min) = self.min_items {
            if items.len() < min {
                out.push(SchemaViolation::new(path, format!("must have at least {} items", min)));
            }
        }
        if let Some(max) = self.max_items {
            if items.len() > max {
                out.push(SchemaViolation::new(path, format!("must have at most {} items", max)));
            }
        }
        if let Some(item_schema) = &self.items {
            for (i, item) in items.iter().enumerate() {
                item_schema.validate_at(item, &join(path, &i.to_string()), out);
            }
        }
    }

    fn check_object(&self, map: &Map<String, Value>, path: &str, out: &mut Vec<SchemaViolation>) {
        for name in &self.required {
            if !map.contains_key(name) {
                out.push(SchemaViolation::new(join(path, name), "is required"));
            }
        }

        for (key, value) in map {
            match self.properties.get(key) {
                Some(prop) => prop.validate_at(value, &join(path, key), out),
                None if self.additional_properties == Some(false) => {
                    out.push(SchemaViolation::new(join(path, key), "is not allowed"));
                }
                None => {}
            }
        }
    }
}

fn join(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", path, segment)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
