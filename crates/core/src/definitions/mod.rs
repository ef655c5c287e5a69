//! Integration type and entity definitions

pub mod ports;
pub mod registry;

use std::collections::HashMap;

use conduit_domain::IntegrationEntityDefinition;
pub use ports::DefinitionSource;
pub use registry::TypeRegistry;
use serde_json::Value;

use crate::extraction::plain_string;

/// The user's option values restricted to those the entity declares, rendered
/// as template text.
pub fn declared_options(
    definition: &IntegrationEntityDefinition,
    options: &HashMap<String, Value>,
) -> HashMap<String, String> {
    definition
        .options
        .keys()
        .filter_map(|key| options.get(key).map(|value| (key.clone(), plain_string(value))))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn undeclared_options_are_dropped() {
        let definition: IntegrationEntityDefinition = serde_json::from_value(json!({
            "entityType": "e", "name": "E", "integrationType": "t",
            "identifier": "x", "timestamp": "$.t",
            "options": {
                "ACCOUNT": {"type": "string", "name": "Account"},
                "LIMIT": {"type": "number", "name": "Limit"}
            }
        }))
        .expect("definition parses");
        let options = HashMap::from([
            ("ACCOUNT".to_string(), json!("acc-1")),
            ("LIMIT".to_string(), json!(50)),
            ("EXTRA".to_string(), json!("ignored")),
        ]);

        let mapped = declared_options(&definition, &options);
        assert_eq!(mapped.len(), 2);
        assert_eq!(mapped["ACCOUNT"], "acc-1");
        assert_eq!(mapped["LIMIT"], "50");
    }
}
