//! Loader - タスク定義の読み込み
//!
//! 生の定義（JSON）を型付きの TaskDefinition に一度だけ変換します。
//! 変換に失敗した定義は設定ミスとしてログに残し、残りは読み込みます。

use serde_json::Value;
use tracing::warn;

use crate::domain::{ConfigError, RawTaskDefinition, TaskDefinition};

#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<TaskDefinition>,
    /// (code or position, error) of every skipped definition.
    pub rejected: Vec<(String, ConfigError)>,
}

pub fn load_definitions(raw: impl IntoIterator<Item = RawTaskDefinition>) -> LoadReport {
    let mut report = LoadReport::default();
    for definition in raw {
        let code = definition.code.clone();
        match TaskDefinition::try_from(definition) {
            Ok(task) => report.loaded.push(task),
            Err(err) => reject(&mut report, code, err),
        }
    }
    report
}

/// Same as [`load_definitions`], but starts from untyped JSON so a single
/// malformed entry does not sink the whole file.
pub fn load_definitions_from_values(values: impl IntoIterator<Item = Value>) -> LoadReport {
    let mut report = LoadReport::default();
    let mut raw = Vec::new();
    for (position, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<RawTaskDefinition>(value) {
            Ok(definition) => raw.push(definition),
            Err(err) => reject(
                &mut report,
                format!("#{position}"),
                ConfigError::Malformed(err.to_string()),
            ),
        }
    }
    let typed = load_definitions(raw);
    report.loaded = typed.loaded;
    report.rejected.extend(typed.rejected);
    report
}

fn reject(report: &mut LoadReport, code: String, err: ConfigError) {
    warn!(task_code = %code, error = %err, "skipping task definition");
    report.rejected.push((code, err));
}
