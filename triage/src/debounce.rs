use std::collections::HashMap;
use std::time::{Duration, Instant};

use facetriage_store::Identity;
use serde::{Deserialize, Serialize};

use crate::TriageError;

/// Configuration for [`Debouncer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    /// Identified events kept in the rolling window (K).
    pub window: usize,

    /// Hits within the window needed to confirm (M). Must be a strict
    /// majority of `window`.
    pub min_hits: usize,

    /// Minimum time between two confirmations of one identity (T).
    pub cooldown_ms: u64,

    /// Clears the window when no identified event arrived for this long.
    /// 0 keeps the window forever.
    pub stale_after_ms: u64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            window: 5,
            min_hits: 3,
            cooldown_ms: 30_000,
            stale_after_ms: 3_000,
        }
    }
}

impl DebounceConfig {
    pub fn validate(&self) -> Result<(), TriageError> {
        if self.window == 0 {
            return Err(TriageError::InvalidConfig("window must be positive".into()));
        }
        if self.min_hits * 2 <= self.window || self.min_hits > self.window {
            return Err(TriageError::InvalidConfig(format!(
                "min_hits {} must be a strict majority of window {}",
                self.min_hits, self.window
            )));
        }
        Ok(())
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn stale_after(&self) -> Option<Duration> {
        (self.stale_after_ms > 0).then(|| Duration::from_millis(self.stale_after_ms))
    }
}

/// A debounced recognition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub identity: Identity,
    /// Hits of `identity` in the window at confirmation.
    pub hits: usize,
    pub at: Instant,
}

/// Majority vote over the last K identified events, with a per-identity
/// cool-down.
///
/// # Algorithm
///
/// A circular buffer holds the identities of the last `window` identified
/// events. Feeding an identity confirms it when it fills at least
/// `min_hits` slots and it was not confirmed within `cooldown`. Unknown
/// faces are not recorded, so a brief occlusion never breaks up a streak.
///
/// All timing comes from the event instants passed in, never the clock.
#[derive(Debug)]
pub struct Debouncer {
    window: Vec<Option<Identity>>,
    pos: usize,
    min_hits: usize,
    cooldown: Duration,
    stale_after: Option<Duration>,
    last_seen: Option<Instant>,
    last_confirmed: HashMap<Identity, Instant>,
}

impl Debouncer {
    pub fn new(config: &DebounceConfig) -> Result<Self, TriageError> {
        config.validate()?;
        Ok(Self {
            window: vec![None; config.window],
            pos: 0,
            min_hits: config.min_hits,
            cooldown: config.cooldown(),
            stale_after: config.stale_after(),
            last_seen: None,
            last_confirmed: HashMap::new(),
        })
    }

    /// Feeds one event. `None` is an unknown face.
    pub fn feed(&mut self, identity: Option<&Identity>, at: Instant) -> Option<Confirmation> {
        let identity = identity?;

        if let (Some(stale), Some(seen)) = (self.stale_after, self.last_seen) {
            if at.saturating_duration_since(seen) > stale {
                self.clear_window();
            }
        }
        self.last_seen = Some(at);

        self.window[self.pos] = Some(identity.clone());
        self.pos = (self.pos + 1) % self.window.len();

        let hits = self.hits(identity);
        if hits < self.min_hits {
            return None;
        }
        let cooling = self
            .last_confirmed
            .get(identity)
            .is_some_and(|last| at.saturating_duration_since(*last) < self.cooldown);
        if cooling {
            return None;
        }
        self.last_confirmed.insert(identity.clone(), at);
        Some(Confirmation {
            identity: identity.clone(),
            hits,
            at,
        })
    }

    /// Occurrences of `identity` in the window.
    pub fn hits(&self, identity: &Identity) -> usize {
        self.window
            .iter()
            .filter(|slot| slot.as_ref() == Some(identity))
            .count()
    }

    /// Forgets the window and every cool-down.
    pub fn reset(&mut self) {
        self.clear_window();
        self.last_seen = None;
        self.last_confirmed.clear();
    }

    fn clear_window(&mut self) {
        for slot in &mut self.window {
            *slot = None;
        }
        self.pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> Identity {
        Identity::new(s).unwrap()
    }

    fn debouncer(window: usize, min_hits: usize, cooldown_ms: u64) -> Debouncer {
        Debouncer::new(&DebounceConfig {
            window,
            min_hits,
            cooldown_ms,
            stale_after_ms: 0,
        })
        .unwrap()
    }

    /// Feeds `seq` one event per 100ms starting at `t0`; returns the
    /// confirmed identities.
    fn run(d: &mut Debouncer, t0: Instant, seq: &[Option<&str>]) -> Vec<String> {
        let mut out = Vec::new();
        for (i, s) in seq.iter().enumerate() {
            let ident = s.map(id);
            let at = t0 + Duration::from_millis(100 * i as u64);
            if let Some(c) = d.feed(ident.as_ref(), at) {
                out.push(c.identity.to_string());
            }
        }
        out
    }

    #[test]
    fn majority_required() {
        let mut d = debouncer(5, 3, 30_000);
        let got = run(
            &mut d,
            Instant::now(),
            &[Some("A"), Some("A"), Some("A"), Some("B"), Some("B")],
        );
        assert_eq!(got, vec!["A"]);
    }

    #[test]
    fn alternating_identities_never_confirm_late_one() {
        let mut d = debouncer(5, 3, 30_000);
        let got = run(
            &mut d,
            Instant::now(),
            &[Some("A"), Some("B"), Some("A"), Some("B"), Some("C")],
        );
        assert!(got.is_empty(), "{got:?}");
    }

    #[test]
    fn unknowns_do_not_break_streak() {
        let mut d = debouncer(5, 3, 30_000);
        let got = run(
            &mut d,
            Instant::now(),
            &[Some("A"), None, None, Some("A"), None, Some("A")],
        );
        assert_eq!(got, vec!["A"]);
    }

    #[test]
    fn old_hits_roll_out_of_window() {
        let mut d = debouncer(3, 2, 0);
        let got = run(
            &mut d,
            Instant::now(),
            &[Some("A"), Some("B"), Some("C"), Some("A"), Some("B")],
        );
        assert!(got.is_empty(), "{got:?}");
    }

    #[test]
    fn cooldown_suppresses_repeat() {
        let t0 = Instant::now();
        let mut d = debouncer(5, 3, 1_000);
        let a = id("A");
        let mut confirmations = 0;
        // 30 events 10ms apart: 290ms < cooldown.
        for i in 0..30 {
            if d.feed(Some(&a), t0 + Duration::from_millis(10 * i)).is_some() {
                confirmations += 1;
            }
        }
        assert_eq!(confirmations, 1);
    }

    #[test]
    fn confirms_again_after_cooldown() {
        let t0 = Instant::now();
        let mut d = debouncer(5, 3, 1_000);
        let a = id("A");
        let mut at = Vec::new();
        // 40 events 100ms apart: 0..3900ms.
        for i in 0..40u64 {
            let t = t0 + Duration::from_millis(100 * i);
            if d.feed(Some(&a), t).is_some() {
                at.push(i);
            }
        }
        // First at the third event, then every 10 events.
        assert_eq!(at, vec![2, 12, 22, 32]);
    }

    #[test]
    fn stale_window_is_cleared() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(&DebounceConfig {
            window: 5,
            min_hits: 3,
            cooldown_ms: 0,
            stale_after_ms: 500,
        })
        .unwrap();
        let a = id("A");
        assert!(d.feed(Some(&a), t0).is_none());
        assert!(d.feed(Some(&a), t0 + Duration::from_millis(100)).is_none());
        // Long gap: earlier hits no longer count.
        assert!(d.feed(Some(&a), t0 + Duration::from_secs(5)).is_none());
        assert_eq!(d.hits(&a), 1);
    }

    #[test]
    fn per_identity_cooldown() {
        let t0 = Instant::now();
        let mut d = debouncer(5, 3, 60_000);
        let got = run(
            &mut d,
            t0,
            &[
                Some("A"),
                Some("A"),
                Some("A"),
                Some("B"),
                Some("B"),
                Some("B"),
                Some("B"),
            ],
        );
        assert_eq!(got, vec!["A", "B"]);
    }

    #[test]
    fn config_requires_strict_majority() {
        for (window, min_hits) in [(5, 2), (4, 2), (5, 6), (0, 0)] {
            let cfg = DebounceConfig {
                window,
                min_hits,
                ..Default::default()
            };
            assert!(
                matches!(cfg.validate(), Err(TriageError::InvalidConfig(_))),
                "{window}/{min_hits}"
            );
        }
        DebounceConfig {
            window: 1,
            min_hits: 1,
            ..Default::default()
        }
        .validate()
        .unwrap();
    }
}
