use serde_json::Value;

/// Typed field access on loosely-typed remote records.
pub trait ValueExt {
    fn str_field(&self, key: &str) -> Option<&str>;
    fn f64_field(&self, key: &str) -> Option<f64>;
    fn i64_field(&self, key: &str) -> Option<i64>;
    fn bool_field(&self, key: &str) -> Option<bool>;
    fn string_list(&self) -> Option<Vec<String>>;
    fn string_list_field(&self, key: &str) -> Option<Vec<String>>;
}

impl ValueExt for Value {
    fn str_field(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    fn f64_field(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    fn i64_field(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    fn bool_field(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    fn string_list(&self) -> Option<Vec<String>> {
        self.as_array()?
            .iter()
            .map(|v| v.as_str().map(String::from))
            .collect()
    }

    fn string_list_field(&self, key: &str) -> Option<Vec<String>> {
        self.get(key)?.string_list()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_fields() {
        let v = json!({ "Name": "W", "DwellTime": 0.5, "Binning": 2, "Inserted": true });
        assert_eq!(v.str_field("Name"), Some("W"));
        assert_eq!(v.f64_field("DwellTime"), Some(0.5));
        assert_eq!(v.i64_field("Binning"), Some(2));
        assert_eq!(v.bool_field("Inserted"), Some(true));
        assert_eq!(v.str_field("Missing"), None);
    }

    #[test]
    fn test_string_list_rejects_mixed_arrays() {
        assert_eq!(
            json!(["a", "b"]).string_list(),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(json!(["a", 1]).string_list(), None);
        assert_eq!(json!({ "Images": ["i1"] }).string_list_field("Images").map(|l| l.len()), Some(1));
    }
}
