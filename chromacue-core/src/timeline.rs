use thiserror::Error;

/// Timeline misuse errors. These indicate incorrect construction by the
/// caller (an event registered twice, a lookup for an event that was never
/// registered) and are treated as fatal by the trial runner.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimelineError {
    #[error("event '{0}' is already registered")]
    DuplicateEvent(String),

    #[error("anchor '{anchor}' for event '{event}' is not a registered event")]
    UnknownAnchor { event: String, anchor: String },

    #[error("event '{0}' was never registered")]
    UnknownEvent(String),
}

/// What a [`TimelineEvent`] offset is measured from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    /// Offset from trial start (t = 0).
    TrialStart,
    /// Offset from another event registered earlier in the same timeline.
    Event(String),
}

impl Anchor {
    pub fn after(name: &str) -> Self {
        Anchor::Event(name.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct TimelineEvent {
    pub name: String,
    pub offset_ms: u64,
    pub anchor: Anchor,
}

/// Ordered collection of named, relative stimulus events for one trial.
///
/// Offsets are chainable: `mask_on` is anchored to `target_off`, so changing
/// the target duration (a manipulated factor) reflows every downstream onset
/// without the caller recomputing anything. A timeline is built fresh during
/// trial preparation and discarded with the trial.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    events: Vec<TimelineEvent>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name` at `offset_ms` from `anchor`. Anchors must name an
    /// event that is already registered.
    pub fn add(&mut self, name: &str, offset_ms: u64, anchor: Anchor) -> Result<(), TimelineError> {
        if self.contains(name) {
            return Err(TimelineError::DuplicateEvent(name.to_string()));
        }
        if let Anchor::Event(a) = &anchor {
            if !self.contains(a) {
                return Err(TimelineError::UnknownAnchor {
                    event: name.to_string(),
                    anchor: a.clone(),
                });
            }
        }
        self.events.push(TimelineEvent {
            name: name.to_string(),
            offset_ms,
            anchor,
        });
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.events.iter().any(|e| e.name == name)
    }

    /// Absolute offset of `name` from trial start, in ms: the event's own
    /// offset plus its anchor's absolute offset, recursively.
    pub fn resolve(&self, name: &str) -> Result<u64, TimelineError> {
        let event = self
            .events
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| TimelineError::UnknownEvent(name.to_string()))?;
        match &event.anchor {
            Anchor::TrialStart => Ok(event.offset_ms),
            Anchor::Event(a) => Ok(event.offset_ms + self.resolve(a)?),
        }
    }

    /// Polling predicate: has trial time not yet reached `name`? The
    /// presentation loop asks this once per frame, so the event pump keeps
    /// servicing input between polls.
    pub fn before(&self, name: &str, elapsed_ms: f64) -> Result<bool, TimelineError> {
        Ok(elapsed_ms < self.resolve(name)? as f64)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_sums_anchor_chain() {
        let mut tl = Timeline::new();
        tl.add("a", 100, Anchor::TrialStart).unwrap();
        tl.add("b", 50, Anchor::after("a")).unwrap();
        assert_eq!(tl.resolve("a").unwrap(), 100);
        assert_eq!(tl.resolve("b").unwrap(), 150);
    }

    #[test]
    fn resolve_follows_long_chains() {
        let mut tl = Timeline::new();
        tl.add("target_on", 400, Anchor::TrialStart).unwrap();
        tl.add("target_off", 33, Anchor::after("target_on")).unwrap();
        tl.add("mask_on", 0, Anchor::after("target_off")).unwrap();
        tl.add("mask_off", 200, Anchor::after("mask_on")).unwrap();
        tl.add("response_period", 0, Anchor::after("mask_off")).unwrap();
        assert_eq!(tl.resolve("response_period").unwrap(), 633);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut tl = Timeline::new();
        tl.add("a", 10, Anchor::TrialStart).unwrap();
        assert_eq!(
            tl.add("a", 20, Anchor::TrialStart),
            Err(TimelineError::DuplicateEvent("a".into()))
        );
    }

    #[test]
    fn unknown_anchor_is_rejected() {
        let mut tl = Timeline::new();
        let err = tl.add("b", 50, Anchor::after("a")).unwrap_err();
        assert_eq!(
            err,
            TimelineError::UnknownAnchor {
                event: "b".into(),
                anchor: "a".into(),
            }
        );
    }

    #[test]
    fn unknown_event_lookup_fails() {
        let tl = Timeline::new();
        assert_eq!(
            tl.resolve("ghost"),
            Err(TimelineError::UnknownEvent("ghost".into()))
        );
        assert!(tl.before("ghost", 0.0).is_err());
    }

    #[test]
    fn before_compares_elapsed_against_resolved_offset() {
        let mut tl = Timeline::new();
        tl.add("target_on", 400, Anchor::TrialStart).unwrap();
        assert!(tl.before("target_on", 399.9).unwrap());
        assert!(!tl.before("target_on", 400.0).unwrap());
        assert!(!tl.before("target_on", 1000.0).unwrap());
    }

    #[test]
    fn conditional_events_are_simply_absent() {
        let mut tl = Timeline::new();
        tl.add("target_on", 400, Anchor::TrialStart).unwrap();
        assert!(!tl.contains("play_tone"));
        assert_eq!(tl.len(), 1);
    }
}
