//! Typed YAML loading for config and import files

use serde::de::DeserializeOwned;

use crate::yaml::diagnostics::{YamlError, YamlSyntaxError};

/// Parse YAML text into a typed value, keeping the source for error reports
pub fn parse_yaml<T: DeserializeOwned>(content: &str, filename: &str) -> Result<T, YamlError> {
    serde_yml::from_str(content).map_err(|e| {
        YamlError::Syntax(YamlSyntaxError::from_serde_error(&e, content, filename))
    })
}

/// Parse YAML from a file path
pub fn parse_yaml_file<T: DeserializeOwned>(path: &std::path::Path) -> Result<T, YamlError> {
    let content = std::fs::read_to_string(path)?;
    let filename = path.display().to_string();
    parse_yaml(&content, &filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct TestStruct {
        name: String,
        value: i32,
    }

    #[test]
    fn test_parse_valid_yaml() {
        let yaml = "name: test\nvalue: 42\n";
        let result: TestStruct = parse_yaml(yaml, "test.yaml").unwrap();
        assert_eq!(result.name, "test");
        assert_eq!(result.value, 42);
    }

    #[test]
    fn test_wrong_shape_reports_file_and_line() {
        let yaml = "name: test\nvalue: not-a-number\n";
        match parse_yaml::<TestStruct>(yaml, "import.yaml") {
            Err(YamlError::Syntax(e)) => {
                assert_eq!(e.filename, "import.yaml");
                assert_eq!(e.line(), Some(2));
            }
            other => panic!("expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result: Result<TestStruct, _> =
            parse_yaml_file(std::path::Path::new("/definitely/not/here.yaml"));
        assert!(matches!(result, Err(YamlError::Io(_))));
    }
}
