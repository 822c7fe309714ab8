//! Canonical tool names and the aliases models and clients use for them.

pub const BUILD_SCHEDULE: &str = "build_schedule";
pub const RENDER_PROPOSAL: &str = "render_proposal_html";
pub const ESTIMATE_PROJECT: &str = "estimate_project_cost";
pub const MATERIAL_COST: &str = "calculate_material_cost";
pub const LABOR_COST: &str = "calculate_labor_cost";
pub const EQUIPMENT_COST: &str = "calculate_equipment_cost";

/// Tools that run on the remote compute service.
pub const REMOTE_TOOLS: [&str; 4] = [ESTIMATE_PROJECT, MATERIAL_COST, LABOR_COST, EQUIPMENT_COST];

const ALIASES: &[(&str, &str)] = &[
    ("generate_proposal", RENDER_PROPOSAL),
    ("build_proposal", RENDER_PROPOSAL),
    ("proposal", RENDER_PROPOSAL),
    ("schedule", BUILD_SCHEDULE),
    ("generate_schedule", BUILD_SCHEDULE),
    ("create_schedule", BUILD_SCHEDULE),
    ("estimate", ESTIMATE_PROJECT),
    ("project_estimate", ESTIMATE_PROJECT),
];

/// Map a tool name to its canonical spelling. Unknown names pass through trimmed.
pub fn canonical(name: &str) -> &str {
    let trimmed = name.trim();
    ALIASES
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(trimmed))
        .map(|(_, canonical)| *canonical)
        .unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_names_map_to_canonical() {
        assert_eq!(canonical("generate_proposal"), RENDER_PROPOSAL);
        assert_eq!(canonical(" Schedule "), BUILD_SCHEDULE);
        assert_eq!(canonical("estimate"), ESTIMATE_PROJECT);
    }

    #[test]
    fn canonical_and_unknown_names_pass_through() {
        assert_eq!(canonical(BUILD_SCHEDULE), BUILD_SCHEDULE);
        assert_eq!(canonical("dig_trench"), "dig_trench");
    }
}
