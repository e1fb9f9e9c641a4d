//! Entity identifier allocation

use chrono::Utc;
use rand::Rng;
use uuid::Uuid;

/// How identifiers are produced when a caller does not supply one.
///
/// `Timestamped` yields `<prefix><unix millis><0..=9999>`. Two calls in the
/// same millisecond that draw the same suffix collide; switch to `Uuid` when
/// that residual risk matters. Both return plain strings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdentifierAllocator {
    #[default]
    Timestamped,
    Uuid,
}

impl IdentifierAllocator {
    pub fn allocate(self, prefix: &str) -> String {
        match self {
            Self::Timestamped => {
                let millis = Utc::now().timestamp_millis();
                let suffix = rand::rng().random_range(0..10_000u32);
                format!("{prefix}{millis}{suffix}")
            }
            Self::Uuid => format!("{prefix}{}", Uuid::now_v7().simple()),
        }
    }
}

/// Allocate an identifier with the default strategy.
pub fn allocate_id(prefix: &str) -> String {
    IdentifierAllocator::Timestamped.allocate(prefix)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use regex::Regex;

    use super::*;

    #[test]
    fn timestamped_ids_match_prefix_millis_suffix() {
        let pattern = Regex::new(r"^VEH\d{13,}\d{1,4}$").unwrap();
        for _ in 0..100 {
            let id = allocate_id("VEH");
            assert!(pattern.is_match(&id), "unexpected id format: {id}");
        }
    }

    #[test]
    fn timestamped_ids_have_no_collisions_over_many_draws() {
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            let id = allocate_id("VEH");
            assert!(seen.insert(id.clone()), "duplicate id: {id}");
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(seen.len(), 1000);
    }

    #[test]
    fn uuid_ids_have_no_collisions_over_many_draws() {
        let ids: HashSet<String> = (0..1000)
            .map(|_| IdentifierAllocator::Uuid.allocate("VEH"))
            .collect();
        assert_eq!(ids.len(), 1000);
        assert!(ids.iter().all(|id| id.starts_with("VEH") && id.len() == 35));
    }
}
