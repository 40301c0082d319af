//! CLI 输出格式

use serde::Serialize;

/// JSON 输出（`--json`），紧凑模式用于管道
pub fn format_output<T: Serialize>(data: &T, pretty: bool) -> String {
    let rendered = if pretty {
        serde_json::to_string_pretty(data)
    } else {
        serde_json::to_string(data)
    };
    rendered.unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_output() {
        let data = serde_json::json!({"id": "com.foo", "allowed": true});
        assert_eq!(format_output(&data, false), r#"{"allowed":true,"id":"com.foo"}"#);
        assert!(format_output(&data, true).contains('\n'));
    }
}
