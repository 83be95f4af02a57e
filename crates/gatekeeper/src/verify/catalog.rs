//! Fixed challenge catalog and uniform selection.

use gatekeeper_common::ChallengeRecord;

/// The fixed, non-empty-by-configuration set of pre-baked captcha records.
///
/// Codes are lowercased at load time; records are never mutated after
/// process start.
pub struct ChallengeCatalog {
    records: Vec<ChallengeRecord>,
}

impl ChallengeCatalog {
    pub fn new(records: Vec<ChallengeRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|record| ChallengeRecord {
                code: record.code.to_lowercase(),
                image_ref: record.image_ref,
            })
            .collect();
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Draw one record uniformly at random.
    ///
    /// `None` only when the catalog is empty; callers must surface that as
    /// an "unconfigured" condition rather than start a session.
    pub fn pick(&self) -> Option<&ChallengeRecord> {
        use rand::Rng;

        if self.records.is_empty() {
            return None;
        }
        let idx = rand::rng().random_range(0..self.records.len());
        self.records.get(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(code: &str) -> ChallengeRecord {
        ChallengeRecord {
            code: code.to_string(),
            image_ref: format!("assets/{code}.png"),
        }
    }

    #[test]
    fn empty_catalog_picks_nothing() {
        let catalog = ChallengeCatalog::new(Vec::new());
        assert!(catalog.is_empty());
        assert!(catalog.pick().is_none());
    }

    #[test]
    fn codes_are_lowercased_at_load() {
        let catalog = ChallengeCatalog::new(vec![record("KyMeDp")]);
        let picked = catalog.pick().expect("one record");
        assert_eq!(picked.code, "kymedp");
    }

    #[test]
    fn pick_stays_inside_the_catalog() {
        let catalog = ChallengeCatalog::new(vec![record("aaaa"), record("bbbb"), record("cccc")]);
        for _ in 0..64 {
            let picked = catalog.pick().expect("non-empty");
            assert!(["aaaa", "bbbb", "cccc"].contains(&picked.code.as_str()));
        }
    }
}
