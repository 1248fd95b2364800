//! Starter contents for the definition and document buffers

/// Example jute template
pub const DEFINITION: &str = r#"fist_name: $ name.given.first()
last_name: $ name.family.first()
letandif:
  $let:
    - x: 2
  $body:
    $if: $ a = 1
    $then: 1
    $else: $ b
"#;

/// Example Patient resource
pub const DOCUMENT: &str = r#"resourceType: Patient
a: 2
b: Hoho
name:
  - use: official
    given:
      - Nikolai
    family: Ryzhikov
  - user: alias
    given:
      - Nik
    family: Got
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{evaluate, InputFormat, Rendered};

    #[test]
    fn test_samples_are_valid_yaml() {
        let definition: serde_yaml::Value = serde_yaml::from_str(DEFINITION).unwrap();
        assert!(definition.get("letandif").is_some());

        let rendered = evaluate(InputFormat::Yaml, DOCUMENT, "$ name.given.first()");
        assert_eq!(rendered, Rendered::Output("- Nikolai\n".to_string()));
    }
}
