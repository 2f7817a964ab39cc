//! Row filter and status classifier.
//!
//! A guest earns a row on the panel iff it carries the production tag. The
//! row color depends only on the reported status, never on the guest kind.
//! Both functions are pure over the snapshot so classification has no
//! ordering dependency.

use crate::geometry::Rgb;
use crate::model::{Guest, GuestStatus};

/// Tag that opts a guest into the panel.
pub const PRODUCTION_TAG: &str = "production";

/// Color used for the cells of a running guest.
pub const RUNNING_COLOR: Rgb = Rgb::GREEN;

/// Color used for the cells of any non-running guest.
pub const STOPPED_COLOR: Rgb = Rgb::RED;

/// Decide whether a guest gets a row, and with which color.
///
/// Returns `None` for untagged guests; they never produce a row.
pub fn classify(guest: &Guest) -> Option<Rgb> {
    if !guest.has_tag(PRODUCTION_TAG) {
        return None;
    }
    Some(status_color(&guest.status))
}

/// Map a guest status to its cell color.
pub fn status_color(status: &GuestStatus) -> Rgb {
    if status.is_running() {
        RUNNING_COLOR
    } else {
        STOPPED_COLOR
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GuestKind;
    use std::collections::BTreeSet;

    fn guest(kind: GuestKind, status: &str, tags: &[&str]) -> Guest {
        Guest {
            vmid: 100,
            name: "web1".to_string(),
            kind,
            status: GuestStatus::from_wire(status),
            cpu: 0.1,
            mem: 1024,
            tags: tags.iter().map(|t| t.to_string()).collect::<BTreeSet<_>>(),
        }
    }

    #[test]
    fn row_exists_iff_production_tag() {
        assert!(classify(&guest(GuestKind::Vm, "running", &["production"])).is_some());
        assert!(classify(&guest(GuestKind::Vm, "running", &[])).is_none());
        assert!(classify(&guest(GuestKind::Vm, "running", &["staging"])).is_none());
        assert!(classify(&guest(GuestKind::Container, "stopped", &["production", "db"])).is_some());
    }

    #[test]
    fn running_maps_green_everything_else_red() {
        for kind in [GuestKind::Vm, GuestKind::Container] {
            assert_eq!(
                classify(&guest(kind, "running", &["production"])),
                Some(Rgb::GREEN)
            );
            assert_eq!(
                classify(&guest(kind, "stopped", &["production"])),
                Some(Rgb::RED)
            );
            assert_eq!(
                classify(&guest(kind, "paused", &["production"])),
                Some(Rgb::RED)
            );
        }
    }

    #[test]
    fn classification_is_pure() {
        let g = guest(GuestKind::Container, "running", &["production"]);
        let first = classify(&g);
        let second = classify(&g);
        assert_eq!(first, second);
    }
}
