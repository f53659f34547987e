//! Argument marshalling against a method's declared parameters

use super::MethodDefinition;
use crate::error::{ConduitError, ConduitResult};
use serde_json::{Map, Value};

impl MethodDefinition {
    /// Convert caller arguments into the params sent on the wire.
    ///
    /// - positional (array) arguments are named after the declared params
    /// - named (object) arguments must contain every required param
    /// - `null` is allowed only when no param is required, and is omitted
    /// - methods without declared params pass arguments through untouched
    pub fn marshal_params(&self, args: Value) -> ConduitResult<Option<Value>> {
        if self.params.is_empty() {
            return Ok(match args {
                Value::Null => None,
                other => Some(other),
            });
        }

        match args {
            Value::Null => {
                self.check_required(&Map::new())?;
                Ok(None)
            }
            Value::Array(values) => {
                if values.len() > self.params.len() {
                    return Err(ConduitError::invalid_call(format!(
                        "{} takes at most {} arguments, got {}",
                        self.name,
                        self.params.len(),
                        values.len()
                    )));
                }
                let named: Map<String, Value> = self
                    .params
                    .iter()
                    .map(|p| p.name.clone())
                    .zip(values)
                    .collect();
                self.check_required(&named)?;
                Ok(Some(Value::Object(named)))
            }
            Value::Object(named) => {
                self.check_required(&named)?;
                Ok(Some(Value::Object(named)))
            }
            other => Err(ConduitError::invalid_call(format!(
                "{} expects an array or object of arguments, got {}",
                self.name, other
            ))),
        }
    }

    fn check_required(&self, named: &Map<String, Value>) -> ConduitResult<()> {
        let missing: Vec<&str> = self
            .params
            .iter()
            .filter(|p| !p.optional && !named.contains_key(&p.name))
            .map(|p| p.name.as_str())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConduitError::invalid_call(format!(
                "{} is missing required arguments: {}",
                self.name,
                missing.join(", ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ConduitError;
    use crate::registry::{MethodDefinition, MethodKind, ParamSpec};
    use serde_json::json;

    fn goto_definition() -> MethodDefinition {
        MethodDefinition::new("getDefinition", MethodKind::Call)
            .with_param(ParamSpec::required("path"))
            .with_param(ParamSpec::required("line"))
            .with_param(ParamSpec::optional("column"))
    }

    #[test]
    fn test_positional_arguments_are_named() {
        let params = goto_definition()
            .marshal_params(json!(["/src/main.hh", 12]))
            .unwrap();
        assert_eq!(params, Some(json!({"path": "/src/main.hh", "line": 12})));
    }

    #[test]
    fn test_named_arguments_pass_through() {
        let args = json!({"path": "a.hh", "line": 1, "column": 4});
        let params = goto_definition().marshal_params(args.clone()).unwrap();
        assert_eq!(params, Some(args));
    }

    #[test]
    fn test_missing_required_argument() {
        let err = goto_definition()
            .marshal_params(json!({"path": "a.hh"}))
            .unwrap_err();
        match err {
            ConduitError::InvalidCall { message } => assert!(message.contains("line")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_too_many_positional_arguments() {
        let result = goto_definition().marshal_params(json!(["a", 1, 2, 3]));
        assert!(matches!(result, Err(ConduitError::InvalidCall { .. })));
    }

    #[test]
    fn test_null_arguments() {
        let optional_only = MethodDefinition::new("status", MethodKind::Call)
            .with_param(ParamSpec::optional("verbose"));
        assert_eq!(optional_only.marshal_params(json!(null)).unwrap(), None);

        assert!(goto_definition().marshal_params(json!(null)).is_err());
    }

    #[test]
    fn test_undeclared_params_pass_through() {
        let method = MethodDefinition::new("raw", MethodKind::Notify);
        assert_eq!(method.marshal_params(json!(null)).unwrap(), None);
        assert_eq!(method.marshal_params(json!(42)).unwrap(), Some(json!(42)));
    }

    #[test]
    fn test_scalar_rejected_when_params_declared() {
        assert!(goto_definition().marshal_params(json!("a.hh")).is_err());
    }
}
