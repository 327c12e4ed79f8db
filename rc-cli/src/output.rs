//! Rendering of parsed structures in the configured output format.

use std::fmt::Debug;

use rc_config::OutputFormat;
use serde::Serialize;

/// Render `value`, always ending with a newline.
pub fn render<T: Serialize + Debug>(value: &T, format: OutputFormat) -> Result<String, String> {
    let mut rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value).map_err(|e| e.to_string())?,
        OutputFormat::Yaml => serde_yaml::to_string(value).map_err(|e| e.to_string())?,
        OutputFormat::Debug => format!("{:#?}", value),
    };
    if !rendered.ends_with('\n') {
        rendered.push('\n');
    }
    Ok(rendered)
}
