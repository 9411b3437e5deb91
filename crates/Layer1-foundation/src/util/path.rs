//! Object path helpers - 점 표기 경로 처리
//!
//! `"display.theme"` 같은 경로로 JSON 값을 읽고 씁니다.
//! 배열 요소는 숫자 세그먼트로 접근합니다 (`"items.0.name"`).

use serde_json::{Map, Value};
use std::collections::BTreeMap;

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('.').filter(|s| !s.is_empty())
}

/// 경로로 값 조회 (빈 경로는 루트)
pub fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in segments(path) {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// 경로에 값 설정
///
/// 중간 노드가 없거나 객체가 아니면 빈 객체로 만들어 채웁니다.
/// 빈 경로는 루트 전체를 교체합니다.
pub fn set_path(target: &mut Value, path: &str, new_value: Value) {
    let parts: Vec<&str> = segments(path).collect();
    let Some((last, parents)) = parts.split_last() else {
        *target = new_value;
        return;
    };

    let mut current = target;
    for segment in parents {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else {
            return;
        };
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    if let Value::Object(map) = current {
        map.insert(last.to_string(), new_value);
    }
}

/// 경로의 값을 제거하고 반환
pub fn remove_path(target: &mut Value, path: &str) -> Option<Value> {
    let parts: Vec<&str> = segments(path).collect();
    let (last, parents) = parts.split_last()?;

    let mut current = target;
    for segment in parents {
        current = current.as_object_mut()?.get_mut(*segment)?;
    }
    current.as_object_mut()?.remove(*last)
}

/// dotted-key 맵을 중첩 객체로 확장
///
/// `{"a.b": 1, "a.c": 2}` → `{"a": {"b": 1, "c": 2}}`.
/// 같은 경로가 겹치면 나중 항목이 이깁니다.
pub fn expand_dotted<I, K>(entries: I) -> Value
where
    I: IntoIterator<Item = (K, Value)>,
    K: AsRef<str>,
{
    let mut root = Value::Object(Map::new());
    for (key, value) in entries {
        set_path(&mut root, key.as_ref(), value);
    }
    root
}

/// 중첩 객체를 dotted-key 맵으로 평탄화 (리프만 포함)
pub fn flatten(value: &Value) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    flatten_into(value, String::new(), &mut out);
    out
}

fn flatten_into(value: &Value, prefix: String, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_into(child, path, out);
            }
        }
        _ => {
            out.insert(prefix, value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_path() {
        let value = json!({ "a": { "b": [ { "c": 3 } ] } });

        assert_eq!(get_path(&value, "a.b.0.c"), Some(&json!(3)));
        assert_eq!(get_path(&value, ""), Some(&value));
        assert_eq!(get_path(&value, "a.x"), None);
        assert_eq!(get_path(&value, "a.b.9"), None);
        assert_eq!(get_path(&value, "a.b.c"), None);
    }

    #[test]
    fn test_set_path_creates_parents() {
        let mut value = json!({ "a": 1 });
        set_path(&mut value, "b.c.d", json!("x"));
        set_path(&mut value, "a.e", json!(true));

        assert_eq!(value, json!({ "a": { "e": true }, "b": { "c": { "d": "x" } } }));
    }

    #[test]
    fn test_remove_path() {
        let mut value = json!({ "a": { "b": 1, "c": 2 } });
        assert_eq!(remove_path(&mut value, "a.b"), Some(json!(1)));
        assert_eq!(remove_path(&mut value, "a.zz"), None);
        assert_eq!(value, json!({ "a": { "c": 2 } }));
    }

    #[test]
    fn test_expand_dotted_matches_nested() {
        let expanded = expand_dotted([
            ("leave.title", json!("Leave")),
            ("leave.form.submit", json!("Send")),
            ("common.ok", json!("OK")),
        ]);

        let hand_built = json!({
            "leave": { "title": "Leave", "form": { "submit": "Send" } },
            "common": { "ok": "OK" }
        });

        assert_eq!(expanded, hand_built);
    }

    #[test]
    fn test_flatten_inverts_expand() {
        let nested = json!({ "a": { "b": 1, "c": { "d": "x" } }, "e": [1] });
        let flat = flatten(&nested);

        assert_eq!(flat.get("a.c.d"), Some(&json!("x")));
        assert_eq!(flat.get("e"), Some(&json!([1])));
        assert_eq!(expand_dotted(flat), nested);
    }
}
