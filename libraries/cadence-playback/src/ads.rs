//! Cooldown-based advertisement policy
//!
//! Counts songs per listener and asks for an ad once a listener has heard
//! `songs_between_ads` songs since the last ad.

use crate::config::AdSettings;
use cadence_core::{AdvertisementPolicy, TrackRef, UserId};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

pub struct CooldownAdPolicy {
    songs_between_ads: u32,
    catalog: Vec<TrackRef>,
    counters: Mutex<HashMap<UserId, u32>>,
}

impl CooldownAdPolicy {
    /// Create a policy over `catalog`
    ///
    /// Tracks in the catalog are marked as advertisements. An empty catalog
    /// never shows ads.
    pub fn new(settings: &AdSettings, catalog: Vec<TrackRef>) -> Self {
        let catalog = catalog
            .into_iter()
            .map(|mut ad| {
                ad.is_advertisement = true;
                ad
            })
            .collect();

        Self {
            songs_between_ads: settings.songs_between_ads.max(1),
            catalog,
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Songs counted for `user` since the last ad
    pub fn plays_since_ad(&self, user: &UserId) -> u32 {
        self.counters.lock().get(user).copied().unwrap_or(0)
    }
}

impl AdvertisementPolicy for CooldownAdPolicy {
    fn should_show_ad(&self, user: &UserId) -> bool {
        !self.catalog.is_empty() && self.plays_since_ad(user) >= self.songs_between_ads
    }

    fn catalog(&self) -> Vec<TrackRef> {
        self.catalog.clone()
    }

    fn note_play(&self, user: &UserId) {
        let mut counters = self.counters.lock();
        let count = counters.entry(user.clone()).or_insert(0);
        *count = count.saturating_add(1);
        debug!(user = %user, plays = *count, "Counted play");
    }

    fn reset_counter(&self, user: &UserId) {
        self.counters.lock().remove(user);
    }
}
