//! KPI milestones
//!
//! A milestone fires when cumulative work minutes reach the KPI threshold and have
//! advanced past the minute of the previous crossing. Each crossing unlocks one city
//! drawn without replacement; once every city is unlocked a new cycle starts.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeSet;
use tracing::info;

use crate::config::DEFAULT_KPI_MINUTES;
use crate::error::NagError;

/// Cities unlocked by balloon milestones.
///
/// The flag prefix is part of the identifier. Persisted unlocked sets store these exact
/// strings, and restore drops anything that does not match one.
pub const DEFAULT_CATALOG: [&str; 47] = [
    "🇨🇳 Beijing",
    "🇺🇸 New York",
    "🇯🇵 Tokyo",
    "🇬🇧 London",
    "🇫🇷 Paris",
    "🇩🇪 Berlin",
    "🇮🇹 Rome",
    "🇪🇸 Madrid",
    "🇨🇦 Toronto",
    "🇦🇺 Sydney",
    "🇧🇷 Rio de Janeiro",
    "🇮🇳 Mumbai",
    "🇷🇺 Moscow",
    "🇰🇷 Seoul",
    "🇲🇽 Mexico City",
    "🇳🇱 Amsterdam",
    "🇸🇪 Stockholm",
    "🇳🇴 Oslo",
    "🇩🇰 Copenhagen",
    "🇫🇮 Helsinki",
    "🇨🇭 Zurich",
    "🇦🇹 Vienna",
    "🇧🇪 Brussels",
    "🇵🇱 Warsaw",
    "🇬🇷 Athens",
    "🇵🇹 Lisbon",
    "🇹🇷 Istanbul",
    "🇸🇬 Singapore",
    "🇹🇭 Bangkok",
    "🇻🇳 Ho Chi Minh City",
    "🇵🇭 Manila",
    "🇮🇩 Jakarta",
    "🇲🇾 Kuala Lumpur",
    "🇳🇿 Auckland",
    "🇿🇦 Cape Town",
    "🇪🇬 Cairo",
    "🇦🇷 Buenos Aires",
    "🇨🇱 Santiago",
    "🇪🇸 Barcelona",
    "🇮🇹 Milan",
    "🇺🇸 Los Angeles",
    "🇺🇸 Chicago",
    "🇨🇦 Vancouver",
    "🇦🇺 Melbourne",
    "🇯🇵 Osaka",
    "🇨🇳 Shanghai",
    "🇨🇳 Hong Kong",
];

/// Threshold-crossing detector with a single in-flight guard
#[derive(Debug, Clone)]
pub struct KpiTracker {
    threshold_minutes: u32,
    last_checked_seconds: u64,
    in_flight: bool,
}

impl Default for KpiTracker {
    fn default() -> Self {
        Self {
            threshold_minutes: DEFAULT_KPI_MINUTES,
            last_checked_seconds: 0,
            in_flight: false,
        }
    }
}

impl KpiTracker {
    pub fn new(threshold_minutes: u32) -> Result<Self, NagError> {
        if threshold_minutes == 0 {
            return Err(NagError::InvalidThreshold(threshold_minutes));
        }
        Ok(Self {
            threshold_minutes,
            ..Self::default()
        })
    }

    /// Change the threshold. Minutes already worked do not count toward the new one.
    pub fn set_threshold(
        &mut self,
        threshold_minutes: u32,
        total_work_seconds: u64,
    ) -> Result<(), NagError> {
        if threshold_minutes == 0 {
            return Err(NagError::InvalidThreshold(threshold_minutes));
        }
        self.threshold_minutes = threshold_minutes;
        self.last_checked_seconds = total_work_seconds;
        Ok(())
    }

    /// Evaluate a credited second. Returns true when a milestone should launch, in
    /// which case the tracker is marked in flight until [`KpiTracker::finish`].
    pub fn check(&mut self, total_work_seconds: u64) -> bool {
        if self.in_flight {
            return false;
        }

        let current_minutes = total_work_seconds / 60;
        let last_minutes = self.last_checked_seconds / 60;
        if current_minutes >= u64::from(self.threshold_minutes) && current_minutes > last_minutes
        {
            self.last_checked_seconds = total_work_seconds;
            self.in_flight = true;
            return true;
        }
        false
    }

    /// The milestone animation finished; allow the next crossing
    pub fn finish(&mut self) {
        self.in_flight = false;
    }

    pub fn threshold_minutes(&self) -> u32 {
        self.threshold_minutes
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }
}

/// Result of one draw
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestoneDraw {
    pub milestone: String,
    /// Number of items unlocked in the current cycle, including this one
    pub unlocked_count: usize,
    /// True when the catalog was exhausted and this draw started a new cycle
    pub cycle_reset: bool,
}

/// Catalog of milestone identifiers with the set already unlocked
#[derive(Debug, Clone)]
pub struct MilestoneCatalog {
    items: Vec<String>,
    unlocked: BTreeSet<String>,
}

impl Default for MilestoneCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_CATALOG.iter().map(|s| s.to_string()).collect())
    }
}

impl MilestoneCatalog {
    /// Build a catalog; duplicate identifiers are dropped
    pub fn new(items: Vec<String>) -> Self {
        let mut seen = BTreeSet::new();
        let items = items
            .into_iter()
            .filter(|item| seen.insert(item.clone()))
            .collect();
        Self {
            items,
            unlocked: BTreeSet::new(),
        }
    }

    /// Restore unlocked identifiers. Unknown identifiers are ignored.
    pub fn restore_unlocked<I: IntoIterator<Item = String>>(&mut self, unlocked: I) {
        self.unlocked = unlocked
            .into_iter()
            .filter(|id| self.items.contains(id))
            .collect();
    }

    /// Draw one item not yet unlocked, starting a new cycle when none remain
    pub fn draw<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<MilestoneDraw> {
        let available: Vec<&String> = self
            .items
            .iter()
            .filter(|item| !self.unlocked.contains(*item))
            .collect();

        let (milestone, cycle_reset) = match available.choose(rng) {
            Some(item) => ((*item).clone(), false),
            None => {
                let item = self.items.choose(rng)?.clone();
                self.unlocked.clear();
                (item, true)
            }
        };

        self.unlocked.insert(milestone.clone());
        info!(%milestone, unlocked = self.unlocked.len(), cycle_reset, "milestone unlocked");
        Some(MilestoneDraw {
            milestone,
            unlocked_count: self.unlocked.len(),
            cycle_reset,
        })
    }

    pub fn unlocked(&self) -> impl Iterator<Item = &String> {
        self.unlocked.iter()
    }

    pub fn unlocked_count(&self) -> usize {
        self.unlocked.len()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_fires_once_per_crossing() {
        let mut kpi = KpiTracker::new(1).unwrap();
        let mut fired_at = Vec::new();

        for seconds in 0..=125 {
            if kpi.check(seconds) {
                fired_at.push(seconds);
                kpi.finish();
            }
        }

        assert_eq!(fired_at, vec![60, 120]);
    }

    #[test]
    fn test_threshold_multiple_minutes() {
        let mut kpi = KpiTracker::new(2).unwrap();
        let mut fired_at = Vec::new();
        for seconds in 0..=300 {
            if kpi.check(seconds) {
                fired_at.push(seconds);
                kpi.finish();
            }
        }
        // Past the threshold every new minute is a crossing
        assert_eq!(fired_at, vec![120, 180, 240, 300]);
    }

    #[test]
    fn test_crossing_lost_while_in_flight() {
        let mut kpi = KpiTracker::new(1).unwrap();
        assert!(kpi.check(60));
        assert!(!kpi.check(120));
        kpi.finish();
        // 121 is still minute 2, which is past the recorded minute 1
        assert!(kpi.check(121));
        kpi.finish();
        assert!(!kpi.check(179));
    }

    #[test]
    fn test_set_threshold_does_not_fire_retroactively() {
        let mut kpi = KpiTracker::new(30).unwrap();
        kpi.set_threshold(1, 600).unwrap();
        assert!(!kpi.check(601));
        assert!(kpi.check(660));
    }

    #[test]
    fn test_zero_threshold_rejected() {
        assert!(matches!(KpiTracker::new(0), Err(NagError::InvalidThreshold(0))));
        let mut kpi = KpiTracker::default();
        assert!(kpi.set_threshold(0, 0).is_err());
        assert_eq!(kpi.threshold_minutes(), DEFAULT_KPI_MINUTES);
    }

    #[test]
    fn test_draw_without_replacement() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut catalog = MilestoneCatalog::new(vec!["a".into(), "b".into(), "c".into()]);

        let mut drawn: Vec<String> = (0..3)
            .map(|_| catalog.draw(&mut rng).unwrap())
            .inspect(|d| assert!(!d.cycle_reset))
            .map(|d| d.milestone)
            .collect();
        drawn.sort();
        assert_eq!(drawn, vec!["a", "b", "c"]);

        let next = catalog.draw(&mut rng).unwrap();
        assert!(next.cycle_reset);
        assert_eq!(next.unlocked_count, 1);
    }

    #[test]
    fn test_default_catalog_is_unique() {
        let catalog = MilestoneCatalog::default();
        assert_eq!(catalog.len(), DEFAULT_CATALOG.len());
    }

    #[test]
    fn test_restore_ignores_unknown() {
        let mut catalog = MilestoneCatalog::new(vec!["a".into(), "b".into()]);
        catalog.restore_unlocked(vec!["a".to_string(), "zzz".to_string()]);
        assert_eq!(catalog.unlocked_count(), 1);

        let mut rng = StdRng::seed_from_u64(1);
        let draw = catalog.draw(&mut rng).unwrap();
        assert_eq!(draw.milestone, "b");
        assert_eq!(draw.unlocked_count, 2);
    }

    #[test]
    fn test_restore_default_catalog_ids() {
        let mut catalog = MilestoneCatalog::default();
        catalog.restore_unlocked(vec![
            "🇳🇴 Oslo".to_string(),
            "🇯🇵 Tokyo".to_string(),
            "Oslo".to_string(),
        ]);
        let restored: Vec<&String> = catalog.unlocked().collect();
        assert_eq!(restored, vec!["🇯🇵 Tokyo", "🇳🇴 Oslo"]);
    }

    #[test]
    fn test_empty_catalog_draws_nothing() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut catalog = MilestoneCatalog::new(Vec::new());
        assert!(catalog.draw(&mut rng).is_none());
    }
}
