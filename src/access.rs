//! Area visibility rules.
//!
//! Allow-lists restrict which catalog areas a user can see. Guests get a
//! catalog-level list, signed-in users a per-user one maintained by an
//! administrator. An authenticated user with no usable configuration is
//! pushed into the configuration screen, but only if they have no saved
//! progress yet; history always wins over a missing allow-list.

use crate::types::Area;

/// Drop duplicates (keeping first occurrence) and names not present in the
/// catalog. The result preserves the configured order.
pub fn sanitize_configured_short_names(configured: &[String], catalog: &[Area]) -> Vec<String> {
    let mut seen: Vec<&str> = Vec::new();
    configured
        .iter()
        .filter(|name| {
            if seen.contains(&name.as_str()) {
                return false;
            }
            seen.push(name.as_str());
            catalog.iter().any(|area| &area.short_name == *name)
        })
        .cloned()
        .collect()
}

/// Project the catalog into the order given by `short_names`, dropping names
/// with no matching area.
pub fn order_areas_by_short_names(catalog: &[Area], short_names: &[String]) -> Vec<Area> {
    short_names
        .iter()
        .filter_map(|name| catalog.iter().find(|area| &area.short_name == name))
        .cloned()
        .collect()
}

/// Inputs for the forced-configuration decision.
pub struct ConfigurationCheck<'a> {
    pub is_authenticated: bool,
    pub is_guest: bool,
    /// The allow-list stored for this user, `None` if never configured.
    pub configured_short_names: Option<&'a [String]>,
    pub catalog: &'a [Area],
    /// Whether any learning state exists for this user at all.
    pub has_existing_learning_state: bool,
}

/// Whether the user must pass through the area-configuration screen before
/// seeing any content.
pub fn should_force_configuration(check: &ConfigurationCheck<'_>) -> bool {
    if !check.is_authenticated || check.is_guest {
        return false;
    }
    if check.has_existing_learning_state {
        return false;
    }
    match check.configured_short_names {
        None => true,
        Some(configured) => sanitize_configured_short_names(configured, check.catalog).is_empty(),
    }
}

/// Inputs for computing the list of areas a user may open.
pub struct VisibilityCheck<'a> {
    pub is_guest: bool,
    /// For guests: the catalog-level guest allow-list.
    pub guest_allowed_short_names: Option<&'a [String]>,
    /// For signed-in users: their personal allow-list.
    pub configured_short_names: Option<&'a [String]>,
    pub catalog: &'a [Area],
}

/// The areas visible to this user, in allow-list order where one applies.
pub fn visible_areas(check: &VisibilityCheck<'_>) -> Vec<Area> {
    if check.is_guest {
        return match check.guest_allowed_short_names {
            // An absent or empty guest list means guests see everything
            None => check.catalog.to_vec(),
            Some(allowed) if allowed.is_empty() => check.catalog.to_vec(),
            Some(allowed) => {
                let sanitized = sanitize_configured_short_names(allowed, check.catalog);
                order_areas_by_short_names(check.catalog, &sanitized)
            }
        };
    }

    match check.configured_short_names {
        None => check.catalog.to_vec(),
        Some(configured) => {
            let sanitized = sanitize_configured_short_names(configured, check.catalog);
            if sanitized.is_empty() {
                // A fully invalid personal list falls back to the whole
                // catalog rather than an empty menu
                check.catalog.to_vec()
            } else {
                order_areas_by_short_names(check.catalog, &sanitized)
            }
        }
    }
}
