//! Deep merge

use serde_json::Value;

/// 일반 객체(맵)인지 확인
pub fn is_plain_object(value: &Value) -> bool {
    matches!(value, Value::Object(_))
}

/// 두 값을 딥 머지한 새 값을 반환
///
/// - 양쪽 모두 객체면 키 단위로 재귀 병합
/// - 그 외 (배열, 원시값, null, 타입 불일치) 는 `overlay` 가 이김
pub fn deep_merge(base: &Value, overlay: &Value) -> Value {
    let mut merged = base.clone();
    deep_merge_into(&mut merged, overlay.clone());
    merged
}

/// `target` 에 `overlay` 를 제자리 병합
pub fn deep_merge_into(target: &mut Value, overlay: Value) {
    match (target, overlay) {
        (Value::Object(target_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let recurse = overlay_value.is_object()
                    && target_map.get(&key).is_some_and(Value::is_object);

                if recurse {
                    if let Some(existing) = target_map.get_mut(&key) {
                        deep_merge_into(existing, overlay_value);
                    }
                } else {
                    target_map.insert(key, overlay_value);
                }
            }
        }
        (target, overlay) => *target = overlay,
    }
}
