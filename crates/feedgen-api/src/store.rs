use chrono::{SecondsFormat, Utc};
use feedgen_common::wire::FeedbackItem;
use rand::seq::SliceRandom;
use rand::Rng;

pub const KEY_PREFIX: &str = "mock_feedback/";
pub const LIST_LIMIT: usize = 1000;

const PERSONAS: &[&str] = &[
    "firefighter",
    "chief",
    "new recruit",
    "veteran",
    "training officer",
    "admin",
    "paramedic",
    "volunteer",
];

const OPENERS: &[(&str, &[&str])] = &[
    ("positive", &["Love the app!", "The scenarios are spot on.", "Best training tool we've had."]),
    ("constructive", &["Solid so far.", "Works well overall.", "Useful, with a few gaps."]),
    ("excited", &["This is a game-changer!", "Can't wait for the next drop!", "Our crew is hooked."]),
    ("frustrated", &["Too expensive for a small department.", "Sync keeps failing on shift change.", "Hard to find older scenarios."]),
];

const ASKS: &[&str] = &[
    "We need notifications when new scenarios drop.",
    "Would be cool to export compliance reports as PDFs.",
    "Please add an offline mode for rural stations.",
    "Let admins assign scenarios to specific shifts.",
    "A dark mode for night shifts would help.",
    "Show how my scores compare to the rest of the crew.",
];

/// In-memory item store.
#[derive(Debug, Default)]
pub struct FeedbackStore {
    items: Vec<FeedbackItem>,
    last_updated: Option<String>,
    generate_calls: u64,
}

impl FeedbackStore {
    pub fn count(&self) -> u64 {
        self.items.len() as u64
    }

    pub fn last_updated(&self) -> Option<&str> {
        self.last_updated.as_deref()
    }

    /// Bumps and returns the number of generate calls seen so far.
    pub fn note_generate_call(&mut self) -> u64 {
        self.generate_calls += 1;
        self.generate_calls
    }

    /// Appends `count` items numbered after the current total.
    pub fn generate(&mut self, count: u64) -> Vec<FeedbackItem> {
        let mut rng = rand::thread_rng();
        let start = self.count();
        let fresh: Vec<FeedbackItem> = (1..=count)
            .map(|i| FeedbackItem {
                id: start + i,
                feedback: compose_feedback(&mut rng),
                timestamp: now_rfc3339(),
            })
            .collect();
        self.items.extend(fresh.iter().cloned());
        self.last_updated = Some(now_rfc3339());
        fresh
    }

    /// Object keys in lexical order, capped at `LIST_LIMIT`.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> =
            self.items.iter().map(|item| format!("{}feedback_{:04}.json", KEY_PREFIX, item.id)).collect();
        if !self.items.is_empty() {
            keys.push(format!("{}metadata.json", KEY_PREFIX));
        }
        keys.sort();
        keys.truncate(LIST_LIMIT);
        keys
    }
}

fn compose_feedback<R: Rng>(rng: &mut R) -> String {
    let persona = PERSONAS.choose(rng).copied().unwrap_or("firefighter");
    let (tone, openers) = OPENERS.choose(rng).copied().unwrap_or(OPENERS[0]);
    let opener = openers.choose(rng).copied().unwrap_or_default();
    let ask = ASKS.choose(rng).copied().unwrap_or_default();
    tracing::trace!(target: "api", persona, tone, "composing feedback");
    format!("As a {}: {} {}", persona, opener, ask)
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `"12.30%"` style share of `target`.
pub fn percent_of(count: u64, target: u64) -> String {
    if target == 0 {
        return "0.00%".into();
    }
    format!("{:.2}%", count as f64 / target as f64 * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_continue_from_the_stored_total() {
        let mut store = FeedbackStore::default();
        let first = store.generate(3);
        let second = store.generate(2);
        assert_eq!(first.iter().map(|f| f.id).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(second.iter().map(|f| f.id).collect::<Vec<_>>(), vec![4, 5]);
        assert_eq!(store.count(), 5);
        assert!(store.last_updated().is_some());
        assert!(second.iter().all(|f| f.feedback.starts_with("As a ")));
    }

    #[test]
    fn keys_are_sorted_and_capped() {
        let mut store = FeedbackStore::default();
        assert!(store.keys().is_empty());
        store.generate(1005);
        let keys = store.keys();
        assert_eq!(keys.len(), LIST_LIMIT);
        assert_eq!(keys[0], "mock_feedback/feedback_0001.json");
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn percentage_has_two_decimals() {
        assert_eq!(percent_of(123, 1000), "12.30%");
        assert_eq!(percent_of(1000, 1000), "100.00%");
        assert_eq!(percent_of(5, 0), "0.00%");
    }
}
