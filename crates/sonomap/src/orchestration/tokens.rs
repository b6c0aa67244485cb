//! Generation counters: the staleness backbone for async compute streams.
//!
//! Every logical recompute stream (scene, grid, drag) owns a monotonically
//! increasing counter. Issuing a request stamps it with the stream's next
//! generation; a response is applied only while its generation is still
//! current. Cancellation is just advancing the counter: in-flight work is
//! allowed to finish and its result is ignored.

use std::fmt;

/// A stamped generation number. Opaque outside this module family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Generation(u64);

impl Generation {
    /// Raw counter value, for logging.
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Monotonic per-stream counter.
#[derive(Debug, Default)]
pub struct GenerationCounter {
    current: u64,
}

impl GenerationCounter {
    /// Advance the stream and return the new generation, superseding all
    /// previously stamped requests.
    pub fn advance(&mut self) -> Generation {
        self.current += 1;
        Generation(self.current)
    }

    /// The live generation.
    pub fn current(&self) -> Generation {
        Generation(self.current)
    }

    /// Whether a stamped generation is still the live one.
    pub fn is_current(&self, generation: Generation) -> bool {
        generation.0 == self.current
    }

    /// Run `mutation` only if `generation` is still current. This is the
    /// single compare-and-discard gate; call sites never compare counters
    /// by hand.
    pub fn apply_if_current<T>(
        &self,
        generation: Generation,
        mutation: impl FnOnce() -> T,
    ) -> Option<T> {
        if self.is_current(generation) {
            Some(mutation())
        } else {
            None
        }
    }
}

/// Identifies which stream and entity a request belongs to. Combined with
/// a [`Generation`], this makes staleness a pure predicate on the
/// response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequestKey {
    /// Full-scene receiver/panel recompute.
    Scene,
    /// Heatmap grid recompute (separately tokened; typically slower).
    Grid,
    /// Single-source drag contribution for receivers and panels.
    Drag {
        /// The dragged source.
        source_id: String,
    },
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKey::Scene => write!(f, "scene"),
            RequestKey::Grid => write!(f, "grid"),
            RequestKey::Drag { source_id } => write!(f, "drag:{source_id}"),
        }
    }
}

/// A stamped request: its key plus the generation it was issued under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub key: RequestKey,
    pub generation: Generation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_supersedes() {
        let mut counter = GenerationCounter::default();
        let g1 = counter.advance();
        assert!(counter.is_current(g1));
        let g2 = counter.advance();
        assert!(!counter.is_current(g1));
        assert!(counter.is_current(g2));
    }

    #[test]
    fn test_apply_if_current_gates_mutation() {
        let mut counter = GenerationCounter::default();
        let g1 = counter.advance();
        let mut hits = 0;
        assert!(counter.apply_if_current(g1, || hits += 1).is_some());
        let _g2 = counter.advance();
        assert!(counter.apply_if_current(g1, || hits += 1).is_none());
        assert_eq!(hits, 1);
    }

    #[test]
    fn test_request_key_display() {
        let key = RequestKey::Drag {
            source_id: "s1".into(),
        };
        assert_eq!(key.to_string(), "drag:s1");
        assert_eq!(RequestKey::Scene.to_string(), "scene");
    }
}
