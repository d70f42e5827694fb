//! Arranger
//!
//! Orders the classified benchmark methods into a [`Schedule`]. Every method
//! appears exactly once and all of its repetitions run as one contiguous
//! block; only the order of methods varies.

use crate::classifier::BenchmarkMethod;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::sync::Arc;

/// Order in which methods are executed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Arrangement {
    /// Class order, then declaration order
    #[default]
    Sequential,
    /// Random permutation of methods
    Shuffled,
}

impl FromStr for Arrangement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sequential" | "seq" => Ok(Arrangement::Sequential),
            "shuffled" | "shuffle" => Ok(Arrangement::Shuffled),
            other => Err(format!(
                "unknown arrangement '{other}' (expected sequential or shuffled)"
            )),
        }
    }
}

impl fmt::Display for Arrangement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arrangement::Sequential => f.write_str("sequential"),
            Arrangement::Shuffled => f.write_str("shuffled"),
        }
    }
}

/// A method with its contiguous block of repetitions
#[derive(Debug, Clone)]
pub struct Scheduled {
    /// The method to run
    pub method: Arc<BenchmarkMethod>,
    /// Number of repetitions
    pub runs: u32,
}

impl Scheduled {
    /// 1-based repetition indices
    pub fn repetitions(&self) -> RangeInclusive<u32> {
        1..=self.runs
    }
}

/// Ordered execution plan
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    /// Methods in execution order
    pub entries: Vec<Scheduled>,
    /// Seed of the shuffle, `None` for sequential schedules
    pub seed: Option<u64>,
}

impl Schedule {
    /// Number of scheduled methods
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is scheduled
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Repetitions over all methods
    pub fn total_runs(&self) -> u64 {
        self.entries.iter().map(|e| u64::from(e.runs)).sum()
    }

    /// Index of the last scheduled method of a class
    pub fn last_of_class(&self, class: &str) -> Option<usize> {
        self.entries
            .iter()
            .rposition(|e| e.method.class_name == class)
    }
}

/// Arrange methods for execution.
///
/// `Shuffled` uses `seed` when given and draws a fresh one otherwise; the seed
/// actually used is stored in the schedule.
pub fn arrange(
    methods: Vec<Arc<BenchmarkMethod>>,
    arrangement: Arrangement,
    seed: Option<u64>,
) -> Schedule {
    let mut entries: Vec<Scheduled> = methods
        .into_iter()
        .map(|method| Scheduled {
            runs: method.runs,
            method,
        })
        .collect();

    let seed = match arrangement {
        Arrangement::Sequential => None,
        Arrangement::Shuffled => {
            let seed = seed.unwrap_or_else(|| rand::thread_rng().gen());
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            entries.shuffle(&mut rng);
            Some(seed)
        }
    };

    Schedule { entries, seed }
}

/// Narrows the set of methods before arrangement
#[derive(Debug, Clone, Default)]
pub struct PlanFilter {
    pattern: Option<Regex>,
    class: Option<String>,
}

impl PlanFilter {
    /// Filter by a regex on `Class::method` and/or an exact class name
    pub fn new(pattern: Option<&str>, class: Option<&str>) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: pattern.map(Regex::new).transpose()?,
            class: class.map(str::to_string),
        })
    }

    /// Whether the filter lets the method through
    pub fn matches(&self, method: &BenchmarkMethod) -> bool {
        self.matches_id(method.class_name, method.method_name)
    }

    /// Same as [`PlanFilter::matches`] for a bare class and method name
    pub fn matches_id(&self, class: &str, method: &str) -> bool {
        if !self.admits_class(class) {
            return false;
        }

        if let Some(re) = &self.pattern {
            if !re.is_match(&format!("{class}::{method}")) {
                return false;
            }
        }

        true
    }

    /// Whether the class could contribute any method at all
    pub fn admits_class(&self, class: &str) -> bool {
        self.class.as_deref().map_or(true, |c| c == class)
    }

    /// Keep only matching methods
    pub fn apply(&self, methods: Vec<Arc<BenchmarkMethod>>) -> Vec<Arc<BenchmarkMethod>> {
        methods.into_iter().filter(|m| self.matches(m)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use std::collections::HashSet;

    fn noop(_: &mut dyn Any) -> Result<(), String> {
        Ok(())
    }

    fn bench(class: &'static str, method: &'static str, runs: u32) -> Arc<BenchmarkMethod> {
        Arc::new(BenchmarkMethod {
            class_name: class,
            method_name: method,
            runs,
            body: noop,
            before_first_run: None,
            before_each_run: None,
            after_each_run: None,
            after_last_run: None,
        })
    }

    fn many() -> Vec<Arc<BenchmarkMethod>> {
        const NAMES: [&str; 8] = ["a", "b", "c", "d", "e", "f", "g", "h"];
        NAMES
            .iter()
            .enumerate()
            .map(|(i, &name)| bench(if i < 4 { "First" } else { "Second" }, name, 2))
            .collect()
    }

    fn ids(schedule: &Schedule) -> Vec<String> {
        schedule.entries.iter().map(|e| e.method.id()).collect()
    }

    #[test]
    fn test_sequential_keeps_order() {
        let schedule = arrange(many(), Arrangement::Sequential, Some(9));
        assert_eq!(schedule.seed, None);
        assert_eq!(schedule.len(), 8);
        assert_eq!(ids(&schedule)[0], "First::a");
        assert_eq!(ids(&schedule)[7], "Second::h");
        assert_eq!(schedule.total_runs(), 16);
        assert_eq!(schedule.last_of_class("First"), Some(3));
    }

    #[test]
    fn test_seeded_shuffle_is_deterministic() {
        let a = arrange(many(), Arrangement::Shuffled, Some(42));
        let b = arrange(many(), Arrangement::Shuffled, Some(42));
        assert_eq!(a.seed, Some(42));
        assert_eq!(ids(&a), ids(&b));

        // Still a permutation
        let mut sorted = ids(&a);
        sorted.sort();
        let mut expected = ids(&arrange(many(), Arrangement::Sequential, None));
        expected.sort();
        assert_eq!(sorted, expected);
    }

    #[test]
    fn test_other_seed_other_order() {
        let orders: HashSet<Vec<String>> = (1..=4)
            .map(|seed| ids(&arrange(many(), Arrangement::Shuffled, Some(seed))))
            .collect();
        assert!(orders.len() > 1, "four seeds produced one order");

        let sequential = ids(&arrange(many(), Arrangement::Sequential, None));
        assert!(orders.iter().any(|order| *order != sequential));
    }

    #[test]
    fn test_unseeded_shuffle_reports_seed() {
        let first = arrange(many(), Arrangement::Shuffled, None);
        let seed = first.seed.unwrap();
        let replay = arrange(many(), Arrangement::Shuffled, Some(seed));
        assert_eq!(ids(&first), ids(&replay));
    }

    #[test]
    fn test_repetitions_are_one_based() {
        let schedule = arrange(vec![bench("C", "m", 3)], Arrangement::Sequential, None);
        let reps: Vec<u32> = schedule.entries[0].repetitions().collect();
        assert_eq!(reps, [1, 2, 3]);
    }

    #[test]
    fn test_arrangement_parse() {
        assert_eq!("sequential".parse::<Arrangement>(), Ok(Arrangement::Sequential));
        assert_eq!("Shuffled".parse::<Arrangement>(), Ok(Arrangement::Shuffled));
        assert!("sideways".parse::<Arrangement>().is_err());
        assert!("random".parse::<Arrangement>().is_err());
        assert_eq!(Arrangement::Shuffled.to_string(), "shuffled");
    }

    #[test]
    fn test_filter() {
        let filter = PlanFilter::new(Some("::(a|f)$"), None).unwrap();
        let kept: Vec<_> = filter.apply(many()).iter().map(|m| m.id()).collect();
        assert_eq!(kept, ["First::a", "Second::f"]);

        let by_class = PlanFilter::new(None, Some("Second")).unwrap();
        assert_eq!(by_class.apply(many()).len(), 4);
        assert!(by_class.admits_class("Second"));
        assert!(!by_class.admits_class("First"));

        assert!(by_class.matches_id("Second", "anything"));
        assert!(PlanFilter::new(Some("("), None).is_err());
        assert_eq!(PlanFilter::default().apply(many()).len(), 8);
    }
}
