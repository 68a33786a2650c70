//! YAML rendering for reports.

use anyhow::{Context, Result};
use serde::Serialize;
use yaml_rust_davvid::YamlEmitter;

/// Serializes a report (or any value) to YAML.
///
/// Tool output is multi-line; it is emitted as block scalars instead of one
/// long escaped string.
pub fn to_yaml<T: Serialize>(data: &T) -> Result<String> {
    let serde_value = serde_yaml::to_value(data).context("Failed to serialize to serde value")?;
    let yaml_rust_value = convert_serde_to_yaml_rust(&serde_value)?;

    let mut output = String::new();
    let mut emitter = YamlEmitter::new(&mut output);
    emitter.multiline_strings(true);
    emitter
        .dump(&yaml_rust_value)
        .context("Failed to emit YAML")?;

    Ok(output)
}

/// Converts a `serde_yaml` value into the emitter's document model.
fn convert_serde_to_yaml_rust(value: &serde_yaml::Value) -> Result<yaml_rust_davvid::Yaml> {
    use yaml_rust_davvid::Yaml;

    match value {
        serde_yaml::Value::Null => Ok(Yaml::Null),
        serde_yaml::Value::Bool(b) => Ok(Yaml::Boolean(*b)),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Yaml::Integer(i))
            } else if let Some(f) = n.as_f64() {
                Ok(Yaml::Real(f.to_string()))
            } else {
                Ok(Yaml::String(n.to_string()))
            }
        }
        serde_yaml::Value::String(s) => Ok(Yaml::String(s.clone())),
        serde_yaml::Value::Sequence(seq) => {
            let yaml_seq: Result<Vec<_>> = seq.iter().map(convert_serde_to_yaml_rust).collect();
            Ok(Yaml::Array(yaml_seq?))
        }
        serde_yaml::Value::Mapping(map) => {
            let mut yaml_map = yaml_rust_davvid::yaml::Hash::new();
            for (k, v) in map {
                let yaml_key = convert_serde_to_yaml_rust(k)?;
                let yaml_value = convert_serde_to_yaml_rust(v)?;
                yaml_map.insert(yaml_key, yaml_value);
            }
            Ok(Yaml::Hash(yaml_map))
        }
        serde_yaml::Value::Tagged(tagged) => convert_serde_to_yaml_rust(&tagged.value),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Stage {
        name: String,
        exit_code: Option<i32>,
        output: String,
    }

    #[test]
    fn multiline_output_is_kept_readable() {
        let stage = Stage {
            name: "ESLint".to_string(),
            exit_code: Some(1),
            output: "a.js\n  1:1  error  no-undef\n".to_string(),
        };
        let yaml = to_yaml(&stage).unwrap();
        assert!(yaml.contains("name: ESLint"));
        assert!(yaml.contains("exit_code: 1"));
        assert!(yaml.contains("no-undef"));
    }

    #[test]
    fn null_fields() {
        let stage = Stage {
            name: "Delta".to_string(),
            exit_code: None,
            output: String::new(),
        };
        let yaml = to_yaml(&stage).unwrap();
        assert!(yaml.contains("exit_code: ~"));
    }
}
