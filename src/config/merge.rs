//! Field-by-field merge of configuration tiers.
//!
//! Higher tiers override lower ones key by key. Arrays are replaced, not concatenated.

use serde_json::Value;

/// Deep merge two JSON values, with `overlay` taking precedence over `base`.
///
/// - Objects are merged recursively: keys in overlay override keys in base
/// - Arrays, strings, numbers, booleans, nulls are replaced entirely
/// - If overlay is null, the base value is preserved (null means "not specified")
///
/// # Example
/// ```
/// use serde_json::json;
/// use polar_core::config::deep_merge;
///
/// let base = json!({
///     "reconciler": { "interval_hours": 12, "run_on_startup": true },
///     "tags": ["a", "b"]
/// });
/// let overlay = json!({
///     "reconciler": { "interval_hours": 6 },
///     "tags": ["c"]
/// });
/// let result = deep_merge(base, overlay);
/// assert_eq!(
///     result,
///     json!({ "reconciler": { "interval_hours": 6, "run_on_startup": true }, "tags": ["c"] })
/// );
/// ```
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        // Both are objects: merge recursively
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged_value = if let Some(base_value) = base_map.remove(&key) {
                    deep_merge(base_value, overlay_value)
                } else {
                    overlay_value
                };
                base_map.insert(key, merged_value);
            }
            Value::Object(base_map)
        }
        // Overlay is null: preserve base (null means "not specified")
        (base, Value::Null) => base,
        // Any other case: overlay replaces base entirely
        (_, overlay) => overlay,
    }
}

/// Merge multiple values in order, with later values taking precedence.
///
/// Equivalent to folding `deep_merge` over the list.
pub fn deep_merge_all(values: impl IntoIterator<Item = Value>) -> Value {
    values.into_iter().fold(Value::Null, deep_merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_keys_merge_individually() {
        let base = json!({
            "triggers": {"exact": true, "snooze_minutes": 60},
            "store": {"db_path": "polar.db"}
        });
        let overlay = json!({"triggers": {"exact": false}, "extra": 1});
        assert_eq!(
            deep_merge(base, overlay),
            json!({
                "triggers": {"exact": false, "snooze_minutes": 60},
                "store": {"db_path": "polar.db"},
                "extra": 1
            })
        );
    }

    #[test]
    fn arrays_are_replaced() {
        let result = deep_merge(json!({"lists": [1, 2, 3]}), json!({"lists": [4]}));
        assert_eq!(result, json!({"lists": [4]}));
    }

    #[test]
    fn null_keeps_lower_tier() {
        let base = json!({"reconciler": {"interval_hours": 12}, "store": "a.db"});
        let overlay = json!({"reconciler": {"interval_hours": null}, "store": null});
        assert_eq!(deep_merge(base.clone(), overlay), base);
    }

    #[test]
    fn later_tiers_win() {
        let tiers = vec![
            json!({"reconciler": {"interval_hours": 12, "run_on_startup": true}}),
            json!({"reconciler": {"interval_hours": 6}}),
            json!({"reconciler": {"interval_hours": 24}, "triggers": {"exact": false}}),
        ];
        assert_eq!(
            deep_merge_all(tiers),
            json!({
                "reconciler": {"interval_hours": 24, "run_on_startup": true},
                "triggers": {"exact": false}
            })
        );
    }

    #[test]
    fn scalar_and_object_replace_each_other() {
        let base = json!({"store": {"db_path": "a.db"}, "reconciler": 1});
        let overlay = json!({"store": "b.db", "reconciler": {"interval_hours": 2}});
        let result = deep_merge(base, overlay);
        assert_eq!(result, json!({"store": "b.db", "reconciler": {"interval_hours": 2}}));
    }
}
