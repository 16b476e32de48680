use crate::catalog::{EntityCatalog, EntityDefinition};
use crate::state::{Availability, EntityState, StateMap};
use chrono::{DateTime, Duration, FixedOffset, Utc};
use std::fmt::Write;

/// One entity as the board shows it
#[derive(Clone, Debug, PartialEq)]
pub struct EntityView<'a> {
    pub definition: &'a EntityDefinition,
    pub state: EntityState,
    pub availability: Availability,
}

/// Entities of a display group, in catalog order
pub fn board<'a>(
    catalog: &'a EntityCatalog,
    states: &StateMap,
    now: DateTime<Utc>,
) -> Vec<(&'a str, Vec<EntityView<'a>>)> {
    catalog
        .groups()
        .into_iter()
        .map(|(group, entities)| {
            let views = entities
                .into_iter()
                .map(|definition| {
                    let state = states.get(&definition.id).copied().unwrap_or_default();
                    EntityView {
                        definition,
                        state,
                        availability: state.availability(now),
                    }
                })
                .collect();
            (group, views)
        })
        .collect()
}

/// `MM:SS`, minutes uncapped, negative clamped to zero
pub fn format_remaining(remaining: Duration) -> String {
    let total_seconds = remaining.num_seconds().max(0);
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}

/// Wall-clock time in the schedule zone
pub fn format_local(instant: DateTime<Utc>, zone: &FixedOffset) -> String {
    instant.with_timezone(zone).format("%d/%m %H:%M").to_string()
}

/// Render the board as text, one line per entity
pub fn render_board(catalog: &EntityCatalog, states: &StateMap, now: DateTime<Utc>) -> String {
    let zone = catalog.zone();
    let mut out = String::new();

    for (group, views) in board(catalog, states, now) {
        let _ = writeln!(out, "[{}]", group.to_uppercase());
        for view in views {
            let status = match view.state.next_spawn_time {
                Some(next) if !view.availability.is_eligible_now => format!(
                    "in {} (at {})",
                    format_remaining(view.availability.time_remaining),
                    format_local(next, zone)
                ),
                _ => "UP".to_string(),
            };
            let icon = view.definition.icon.as_deref().unwrap_or(" ");
            let _ = write!(
                out,
                "  {} {:<16} {:<14} {}",
                icon, view.definition.name, view.definition.id, status
            );
            if let Some(last) = view.state.last_action_time {
                let _ = write!(
                    out,
                    "  last {} {}",
                    view.definition.kind.action_kind().verb(),
                    format_local(last, zone)
                );
            }
            out.push('\n');
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::reconcile;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(Duration::zero()), "00:00");
        assert_eq!(format_remaining(Duration::seconds(59)), "00:59");
        assert_eq!(format_remaining(Duration::seconds(30 * 60 - 1)), "29:59");
        // Minutes are not wrapped into hours
        assert_eq!(format_remaining(Duration::minutes(185)), "185:00");
        assert_eq!(format_remaining(Duration::seconds(-5)), "00:00");
    }

    #[test]
    fn test_format_local_uses_schedule_zone() {
        let zone = FixedOffset::west_opt(3 * 3600).unwrap();
        assert_eq!(format_local(t0(), &zone), "10/06 06:00");
    }

    #[test]
    fn test_board_groups_in_catalog_order() {
        let catalog = EntityCatalog::builtin();
        let states = reconcile(&catalog, &StateMap::new(), t0()).states;

        let groups = board(&catalog, &states, t0());
        let names: Vec<&str> = groups.iter().map(|(group, _)| *group).collect();
        assert_eq!(names, vec!["red", "yellow", "cyan", "resource"]);

        let cyan = &groups[2].1;
        assert_eq!(cyan.len(), 4);
        assert!(cyan.iter().all(|view| view.availability.is_eligible_now));
        assert!(groups[0].1.iter().all(|view| !view.availability.is_eligible_now));
    }

    #[test]
    fn test_render_board_lines() {
        let catalog = EntityCatalog::builtin();
        let states = reconcile(&catalog, &StateMap::new(), t0()).states;

        let text = render_board(&catalog, &states, t0());
        assert!(text.contains("[RED]"));
        // Red Norte next spawns at 10:00 local, four hours out
        let red_line = text.lines().find(|l| l.contains("red-boss-1")).unwrap();
        assert!(red_line.ends_with("in 240:00 (at 10/06 10:00)"));
        let cyan_line = text.lines().find(|l| l.contains("cyan-boss-1")).unwrap();
        assert!(cyan_line.ends_with("UP"));
    }
}
