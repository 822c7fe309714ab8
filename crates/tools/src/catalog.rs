//! Built-in tool declarations, served when no remote registry is configured
//! and used as the registry's wire format reference.

use async_trait::async_trait;
use openmud_core::error::RegistryError;
use openmud_core::tool::ToolSchema;
use serde_json::json;

use crate::cache::SchemaSource;
use crate::names::*;

/// The six tools openmud knows how to run.
pub fn builtin_schemas() -> Vec<ToolSchema> {
    vec![
        ToolSchema {
            name: MATERIAL_COST.into(),
            description: "Calculate material cost for construction. Use for pipe, concrete, rebar. Returns unit cost, total, and waste factor.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "material_type": {"type": "string", "description": "pipe, concrete, or rebar"},
                    "quantity": {"type": "number", "description": "Quantity needed"},
                    "size": {"type": "string", "description": "Size: e.g. '4' for 4-inch pipe, '3000_psi' for concrete"}
                },
                "required": ["material_type", "quantity"]
            }),
        },
        ToolSchema {
            name: LABOR_COST.into(),
            description: "Calculate labor cost. Use for operator, laborer, foreman, electrician, ironworker.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "labor_type": {"type": "string", "description": "operator, laborer, foreman, electrician, ironworker"},
                    "hours": {"type": "number", "description": "Number of hours"}
                },
                "required": ["labor_type", "hours"]
            }),
        },
        ToolSchema {
            name: EQUIPMENT_COST.into(),
            description: "Calculate equipment rental cost. Use for excavator, auger, compactor.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "equipment_type": {"type": "string", "description": "excavator, auger, compactor"},
                    "days": {"type": "number", "description": "Number of rental days"}
                },
                "required": ["equipment_type", "days"]
            }),
        },
        ToolSchema {
            name: ESTIMATE_PROJECT.into(),
            description: "Full project cost estimate with materials, labor, equipment, and markup.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "materials": {
                        "type": "array",
                        "items": {"type": "object", "properties": {"type": {"type": "string"}, "quantity": {"type": "number"}, "size": {"type": "string"}}},
                        "description": "List of {type, quantity, size}"
                    },
                    "labor": {
                        "type": "array",
                        "items": {"type": "object", "properties": {"type": {"type": "string"}, "hours": {"type": "number"}}},
                        "description": "List of {type, hours}"
                    },
                    "equipment": {
                        "type": "array",
                        "items": {"type": "object", "properties": {"type": {"type": "string"}, "days": {"type": "number"}}},
                        "description": "Optional list of {type, days}"
                    },
                    "markup": {"type": "number", "description": "Markup as decimal, e.g. 0.15 for 15%"}
                },
                "required": ["materials", "labor"]
            }),
        },
        ToolSchema {
            name: BUILD_SCHEDULE.into(),
            description: "Build a construction schedule with phases and dates.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "project_name": {"type": "string"},
                    "start_date": {"type": "string", "description": "ISO date YYYY-MM-DD"},
                    "duration_days": {"type": "number"},
                    "phases": {"type": "array", "items": {"type": "string"}, "description": "Phase names"}
                },
                "required": ["project_name", "duration_days"]
            }),
        },
        ToolSchema {
            name: RENDER_PROPOSAL.into(),
            description: "Generate proposal HTML for PDF export.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "client": {"type": "string"},
                    "scope": {"type": "string"},
                    "total": {"type": "number"},
                    "duration": {"type": "number"},
                    "bid_items": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "description": {"type": "string"},
                                "quantity": {"type": "number"},
                                "unit": {"type": "string"},
                                "unit_price": {"type": "number"}
                            }
                        },
                        "description": "Optional line items; amounts default to quantity x unit_price"
                    },
                    "assumptions": {"type": "string"},
                    "exclusions": {"type": "string"}
                },
                "required": ["client", "scope", "total"]
            }),
        },
    ]
}

/// A schema source that never leaves the process.
pub struct BuiltinSchemaSource;

#[async_trait]
impl SchemaSource for BuiltinSchemaSource {
    async fn fetch(&self) -> Result<Vec<ToolSchema>, RegistryError> {
        Ok(builtin_schemas())
    }

    fn describe(&self) -> String {
        "builtin".into()
    }
}
