use serde_json::Value;
use serde_json::json;

use crate::commands::OutputFormat;
use crate::common::Colors;

/// Output formatting shared by every command handler.
pub trait Presenter {
    fn present_success(&self, message: &str, warning: Option<&str>);

    fn present_error(&self, message: &str, suggestion: Option<&str>);

    /// Present a structured value (for JSON output, shows the raw value).
    fn present_value(&self, value: &Value);

    fn present_kv(&self, key: &str, value: &str);

    fn present_list_header(&self, title: &str);

    fn present_list_item(&self, item: &str);

    /// Present a dim/info message.
    fn present_info(&self, message: &str);

    /// Present raw text without formatting.
    fn present_raw(&self, text: &str);
}

pub struct TextPresenter;

impl Presenter for TextPresenter {
    fn present_success(&self, message: &str, warning: Option<&str>) {
        println!("{} {}", Colors::success("✓"), message);
        if let Some(w) = warning {
            eprintln!("{} {}", Colors::warning("Warning:"), w);
        }
    }

    fn present_error(&self, message: &str, suggestion: Option<&str>) {
        eprintln!("{} {}", Colors::error("Error:"), message);
        if let Some(s) = suggestion {
            eprintln!("{} {}", Colors::dim("Suggestion:"), s);
        }
    }

    fn present_value(&self, value: &Value) {
        match value {
            Value::String(s) => println!("{}", s),
            Value::Number(n) => println!("{}", n),
            Value::Bool(b) => println!("{}", b),
            _ => println!(
                "{}",
                serde_json::to_string_pretty(value).unwrap_or_default()
            ),
        }
    }

    fn present_kv(&self, key: &str, value: &str) {
        println!("  {}: {}", key, value);
    }

    fn present_list_header(&self, title: &str) {
        println!("{}", Colors::bold(title));
    }

    fn present_list_item(&self, item: &str) {
        println!("  {}", item);
    }

    fn present_info(&self, message: &str) {
        println!("{}", Colors::dim(message));
    }

    fn present_raw(&self, text: &str) {
        println!("{}", text);
    }
}

/// Machine-readable output; one JSON document per presented item.
pub struct JsonPresenter;

fn print_json(value: &Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

impl Presenter for JsonPresenter {
    fn present_success(&self, message: &str, warning: Option<&str>) {
        let mut output = json!({
            "success": true,
            "message": message
        });
        if let Some(w) = warning {
            output["warning"] = json!(w);
        }
        print_json(&output);
    }

    fn present_error(&self, message: &str, suggestion: Option<&str>) {
        let mut output = json!({
            "success": false,
            "error": message
        });
        if let Some(s) = suggestion {
            output["suggestion"] = json!(s);
        }
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
    }

    fn present_value(&self, value: &Value) {
        print_json(value);
    }

    fn present_kv(&self, key: &str, value: &str) {
        print_json(&json!({ key: value }));
    }

    fn present_list_header(&self, _title: &str) {}

    fn present_list_item(&self, item: &str) {
        println!("{}", json!(item));
    }

    fn present_info(&self, message: &str) {
        print_json(&json!({ "info": message }));
    }

    fn present_raw(&self, text: &str) {
        print_json(&json!({ "output": text }));
    }
}

pub fn create_presenter(format: OutputFormat) -> Box<dyn Presenter> {
    match format {
        OutputFormat::Json => Box::new(JsonPresenter),
        OutputFormat::Text => Box::new(TextPresenter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_presenter_success() {
        let presenter = TextPresenter;
        presenter.present_success("Window opened", None);
        presenter.present_success("Window closed", Some("it was already gone"));
    }

    #[test]
    fn test_json_presenter_error() {
        let presenter = JsonPresenter;
        presenter.present_error("No window named 'W'", Some("Run 'tree'"));
        presenter.present_error("boom", None);
    }

    #[test]
    fn test_create_presenter_per_format() {
        let json = create_presenter(OutputFormat::Json);
        json.present_value(&json!({ "windows": ["W"] }));
        let text = create_presenter(OutputFormat::Text);
        text.present_value(&json!("W"));
        text.present_value(&Value::Null);
    }
}
