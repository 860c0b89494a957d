// ── Zone cache ──
//
// Zone id → zone record, maintained from the subscription feed. Outputs
// are embedded in their zone and found by scanning.

use std::collections::HashMap;
use std::sync::Arc;

use roon_bridge_api::models::{Output, Zone, ZoneDiff};

#[derive(Debug, Default)]
pub struct ZoneCache {
    zones: HashMap<String, Arc<Zone>>,
}

impl ZoneCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole cache with a snapshot.
    pub fn replace_all(&mut self, zones: Vec<Zone>) {
        self.zones = zones
            .into_iter()
            .map(|zone| (zone.zone_id.clone(), Arc::new(zone)))
            .collect();
    }

    /// Apply removals, then additions, then changes, then seek updates.
    pub fn apply_diff(&mut self, diff: &ZoneDiff) {
        for zone_id in &diff.zones_removed {
            self.zones.remove(zone_id);
        }
        for zone in diff.zones_added.iter().chain(&diff.zones_changed) {
            self.zones
                .insert(zone.zone_id.clone(), Arc::new(zone.clone()));
        }
        for seek in &diff.zones_seek_changed {
            if let Some(zone) = self.zones.get_mut(&seek.zone_id) {
                let zone = Arc::make_mut(zone);
                zone.queue_time_remaining = seek.queue_time_remaining;
                if let Some(now_playing) = zone.now_playing.as_mut() {
                    now_playing.seek_position = seek.seek_position;
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.zones.clear();
    }

    pub fn zone(&self, zone_id: &str) -> Option<Arc<Zone>> {
        self.zones.get(zone_id).cloned()
    }

    /// First output with `output_id` across all zones.
    pub fn output(&self, output_id: &str) -> Option<Output> {
        self.zones
            .values()
            .find_map(|zone| zone.output(output_id))
            .cloned()
    }

    /// A copy of every zone; later mutations don't show through.
    pub fn snapshot(&self) -> Vec<Arc<Zone>> {
        self.zones.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use roon_bridge_api::models::{NowPlaying, SeekChange};

    use super::*;

    fn zone(id: &str, name: &str, outputs: &[&str]) -> Zone {
        Zone {
            zone_id: id.into(),
            display_name: name.into(),
            outputs: outputs
                .iter()
                .map(|o| Output {
                    output_id: (*o).into(),
                    zone_id: id.into(),
                    ..Output::default()
                })
                .collect(),
            ..Zone::default()
        }
    }

    fn ids(cache: &ZoneCache) -> Vec<String> {
        let mut ids: Vec<_> = cache.snapshot().iter().map(|z| z.zone_id.clone()).collect();
        ids.sort();
        ids
    }

    #[test]
    fn diff_applies_removals_then_additions_then_changes() {
        let mut cache = ZoneCache::new();
        cache.replace_all(vec![zone("A", "a", &[]), zone("C", "c", &[])]);

        cache.apply_diff(&ZoneDiff {
            zones_removed: vec!["A".into()],
            zones_added: vec![zone("B", "b", &[])],
            zones_changed: vec![zone("C", "c-updated", &[])],
            zones_seek_changed: vec![],
        });

        assert_eq!(ids(&cache), vec!["B".to_owned(), "C".to_owned()]);
        assert_eq!(cache.zone("C").unwrap().display_name, "c-updated");
    }

    #[test]
    fn zone_removed_and_readded_in_one_diff_survives() {
        let mut cache = ZoneCache::new();
        cache.replace_all(vec![zone("A", "old", &[])]);

        cache.apply_diff(&ZoneDiff {
            zones_removed: vec!["A".into()],
            zones_added: vec![zone("A", "new", &[])],
            ..ZoneDiff::default()
        });

        assert_eq!(cache.zone("A").unwrap().display_name, "new");
    }

    #[test]
    fn snapshot_replaces_everything() {
        let mut cache = ZoneCache::new();
        cache.replace_all(vec![zone("A", "a", &[])]);
        cache.replace_all(vec![zone("B", "b", &[])]);
        assert_eq!(ids(&cache), vec!["B".to_owned()]);
    }

    #[test]
    fn output_lookup_scans_all_zones() {
        let mut cache = ZoneCache::new();
        cache.replace_all(vec![zone("Z1", "one", &["O1"]), zone("Z2", "two", &["O2", "O3"])]);

        assert_eq!(cache.output("O3").unwrap().zone_id, "Z2");
        assert!(cache.output("O9").is_none());
    }

    #[test]
    fn snapshot_is_a_copy() {
        let mut cache = ZoneCache::new();
        cache.replace_all(vec![zone("A", "a", &[])]);
        let before = cache.snapshot();
        cache.clear();

        assert_eq!(before.len(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn seek_updates_touch_now_playing_only() {
        let mut playing = zone("A", "a", &[]);
        playing.now_playing = Some(NowPlaying {
            seek_position: Some(10),
            ..NowPlaying::default()
        });
        let mut cache = ZoneCache::new();
        cache.replace_all(vec![playing]);

        cache.apply_diff(&ZoneDiff {
            zones_seek_changed: vec![SeekChange {
                zone_id: "A".into(),
                seek_position: Some(42),
                queue_time_remaining: 120,
            }],
            ..ZoneDiff::default()
        });

        let zone = cache.zone("A").unwrap();
        assert_eq!(zone.now_playing.as_ref().unwrap().seek_position, Some(42));
        assert_eq!(zone.queue_time_remaining, 120);
        assert_eq!(zone.display_name, "a");
    }
}
