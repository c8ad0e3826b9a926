use std::collections::BTreeSet;

use chrono::{Local, NaiveDate};
use clap::ValueEnum;

use crate::models::Scholarship;

pub const MEDIUM_AMOUNT_FLOOR: i64 = 4000;
pub const HIGH_AMOUNT_FLOOR: i64 = 7000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum AmountRange {
    #[default]
    All,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SortKey {
    /// Keep catalog order
    #[default]
    Catalog,
    /// Soonest deadline first
    Deadline,
    /// Largest award first
    Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineStatus {
    Active,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AmountBucket {
    Low,
    Medium,
    High,
}

impl AmountBucket {
    pub fn of(amount: i64) -> Self {
        match amount {
            a if a >= HIGH_AMOUNT_FLOOR => AmountBucket::High,
            a if a >= MEDIUM_AMOUNT_FLOOR => AmountBucket::Medium,
            _ => AmountBucket::Low,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AmountBucket::Low => "low",
            AmountBucket::Medium => "medium",
            AmountBucket::High => "high",
        }
    }
}

impl DeadlineStatus {
    pub fn label(self) -> &'static str {
        match self {
            DeadlineStatus::Active => "active",
            DeadlineStatus::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    pub search_text: String,
    pub status: StatusFilter,
    pub amount_range: AmountRange,
    pub tags: BTreeSet<String>,
}

impl FilterState {
    pub fn is_identity(&self) -> bool {
        self.search_text.trim().is_empty()
            && self.status == StatusFilter::All
            && self.amount_range == AmountRange::All
            && self.tags.is_empty()
    }

    pub fn describe(&self) -> String {
        if self.is_identity() {
            return "all scholarships".to_string();
        }

        let mut parts = Vec::new();
        if !self.search_text.trim().is_empty() {
            parts.push(format!("search \"{}\"", self.search_text.trim()));
        }
        if self.status != StatusFilter::All {
            parts.push(format!("status {:?}", self.status).to_lowercase());
        }
        if self.amount_range != AmountRange::All {
            parts.push(format!("amount {:?}", self.amount_range).to_lowercase());
        }
        if !self.tags.is_empty() {
            let tags: Vec<&str> = self.tags.iter().map(String::as_str).collect();
            parts.push(format!("tags {}", tags.join("|")));
        }
        parts.join(", ")
    }
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Whole calendar days from `today` to `deadline`; negative once the deadline has passed.
pub fn days_until(deadline: NaiveDate, today: NaiveDate) -> i64 {
    (deadline - today).num_days()
}

pub fn classify(scholarship: &Scholarship, today: NaiveDate) -> DeadlineStatus {
    if days_until(scholarship.deadline, today) < 0 {
        DeadlineStatus::Expired
    } else {
        DeadlineStatus::Active
    }
}

fn matches_search(scholarship: &Scholarship, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }

    scholarship.name.to_lowercase().contains(needle)
        || scholarship.description.to_lowercase().contains(needle)
        || scholarship
            .tags
            .iter()
            .any(|tag| tag.to_lowercase().contains(needle))
}

fn matches_status(scholarship: &Scholarship, status: StatusFilter, today: NaiveDate) -> bool {
    match status {
        StatusFilter::All => true,
        StatusFilter::Active => classify(scholarship, today) == DeadlineStatus::Active,
        StatusFilter::Expired => classify(scholarship, today) == DeadlineStatus::Expired,
    }
}

fn matches_amount(scholarship: &Scholarship, range: AmountRange) -> bool {
    let bucket = AmountBucket::of(scholarship.amount);
    match range {
        AmountRange::All => true,
        AmountRange::Low => bucket == AmountBucket::Low,
        AmountRange::Medium => bucket == AmountBucket::Medium,
        AmountRange::High => bucket == AmountBucket::High,
    }
}

fn matches_tags(scholarship: &Scholarship, tags: &BTreeSet<String>) -> bool {
    tags.is_empty() || tags.iter().any(|tag| scholarship.has_tag(tag))
}

/// Apply every filter category conjunctively; tags within the tag category are OR-ed.
pub fn filter_scholarships(
    all: &[Scholarship],
    state: &FilterState,
    today: NaiveDate,
) -> Vec<Scholarship> {
    let needle = state.search_text.trim().to_lowercase();

    all.iter()
        .filter(|s| matches_search(s, &needle))
        .filter(|s| matches_status(s, state.status, today))
        .filter(|s| matches_amount(s, state.amount_range))
        .filter(|s| matches_tags(s, &state.tags))
        .cloned()
        .collect()
}

pub fn sort_scholarships(scholarships: &mut [Scholarship], key: SortKey) {
    match key {
        SortKey::Catalog => {}
        SortKey::Deadline => scholarships.sort_by_key(|s| s.deadline),
        SortKey::Amount => scholarships.sort_by(|a, b| b.amount.cmp(&a.amount)),
    }
}

/// Distinct tags in first-seen order.
pub fn available_tags(all: &[Scholarship]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut tags = Vec::new();

    for tag in all.iter().flat_map(|s| s.tags.iter()) {
        if seen.insert(tag.as_str()) {
            tags.push(tag.clone());
        }
    }

    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::fallback_scholarships;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample(id: &str, amount: i64, deadline: NaiveDate, tags: &[&str]) -> Scholarship {
        Scholarship {
            id: id.to_string(),
            name: format!("Scholarship {id}"),
            amount,
            deadline,
            description: "Supports ambitious students.".to_string(),
            eligibility: "Open to all majors.".to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn tag_set(tags: &[&str]) -> BTreeSet<String> {
        tags.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn identity_state_returns_everything() {
        let all = fallback_scholarships();
        let state = FilterState::default();
        assert!(state.is_identity());
        assert_eq!(filter_scholarships(all, &state, date(2026, 1, 1)), all.to_vec());
    }

    #[test]
    fn deadline_today_is_active_yesterday_is_expired() {
        let today = date(2026, 3, 10);
        let due_today = sample("a", 100, today, &[]);
        let due_yesterday = sample("b", 100, date(2026, 3, 9), &[]);

        assert_eq!(days_until(due_today.deadline, today), 0);
        assert_eq!(classify(&due_today, today), DeadlineStatus::Active);
        assert_eq!(days_until(due_yesterday.deadline, today), -1);
        assert_eq!(classify(&due_yesterday, today), DeadlineStatus::Expired);
    }

    #[test]
    fn amount_buckets_are_half_open() {
        assert_eq!(AmountBucket::of(3999), AmountBucket::Low);
        assert_eq!(AmountBucket::of(4000), AmountBucket::Medium);
        assert_eq!(AmountBucket::of(6999), AmountBucket::Medium);
        assert_eq!(AmountBucket::of(7000), AmountBucket::High);
        assert_eq!(AmountBucket::of(0), AmountBucket::Low);
    }

    #[test]
    fn tag_filter_is_inclusive_or() {
        let s = sample("a", 100, date(2030, 1, 1), &["A", "B"]);
        assert!(matches_tags(&s, &tag_set(&["B", "C"])));
        assert!(!matches_tags(&s, &tag_set(&["C", "D"])));
        assert!(matches_tags(&s, &BTreeSet::new()));
    }

    #[test]
    fn search_is_case_insensitive_across_name_description_and_tags() {
        let mut s = sample("a", 100, date(2030, 1, 1), &["Women"]);
        s.name = "Rural Health Award".to_string();
        s.description = "For future NURSES.".to_string();

        assert!(matches_search(&s, "health"));
        assert!(matches_search(&s, "nurses"));
        assert!(matches_search(&s, "women"));
        assert!(!matches_search(&s, "engineering"));

        let state = FilterState {
            search_text: "   ".to_string(),
            ..FilterState::default()
        };
        assert_eq!(filter_scholarships(&[s], &state, date(2026, 1, 1)).len(), 1);
    }

    #[test]
    fn categories_combine_conjunctively() {
        let today = date(2026, 1, 1);
        let all = vec![
            sample("match", 5000, date(2026, 6, 1), &["stem"]),
            sample("expired", 5000, date(2025, 6, 1), &["stem"]),
            sample("too-big", 9000, date(2026, 6, 1), &["stem"]),
            sample("wrong-tag", 5000, date(2026, 6, 1), &["arts"]),
        ];
        let state = FilterState {
            search_text: "scholarship".to_string(),
            status: StatusFilter::Active,
            amount_range: AmountRange::Medium,
            tags: tag_set(&["stem", "health"]),
        };

        let ids: Vec<String> = filter_scholarships(&all, &state, today)
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["match".to_string()]);
    }

    #[test]
    fn expired_filter_selects_only_past_deadlines() {
        let today = date(2026, 1, 1);
        let all = vec![
            sample("past", 100, date(2025, 12, 31), &[]),
            sample("today", 100, today, &[]),
        ];
        let state = FilterState {
            status: StatusFilter::Expired,
            ..FilterState::default()
        };
        let result = filter_scholarships(&all, &state, today);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "past");
    }

    #[test]
    fn sample_scholarship_is_active_and_medium_before_deadline() {
        let s = crate::dataset::find_fallback("sch_001").unwrap();
        let today = date(2025, 11, 1);
        assert_eq!(classify(s, today), DeadlineStatus::Active);
        assert_eq!(AmountBucket::of(s.amount), AmountBucket::Medium);
    }

    #[test]
    fn sorting_orders_by_deadline_or_amount() {
        let mut all = vec![
            sample("late-small", 100, date(2026, 9, 1), &[]),
            sample("early-big", 9000, date(2026, 2, 1), &[]),
        ];
        sort_scholarships(&mut all, SortKey::Deadline);
        assert_eq!(all[0].id, "early-big");
        sort_scholarships(&mut all, SortKey::Amount);
        assert_eq!(all[0].id, "early-big");
        all.reverse();
        sort_scholarships(&mut all, SortKey::Catalog);
        assert_eq!(all[0].id, "late-small");
    }

    #[test]
    fn available_tags_keep_first_seen_order() {
        let all = vec![
            sample("a", 1, date(2026, 1, 1), &["stem", "women"]),
            sample("b", 1, date(2026, 1, 1), &["arts", "stem"]),
        ];
        assert_eq!(available_tags(&all), vec!["stem", "women", "arts"]);
    }

    #[test]
    fn describe_lists_active_filters() {
        let state = FilterState {
            search_text: "nurse".to_string(),
            status: StatusFilter::Active,
            amount_range: AmountRange::High,
            tags: tag_set(&["health"]),
        };
        assert_eq!(
            state.describe(),
            "search \"nurse\", status active, amount high, tags health"
        );
        assert_eq!(FilterState::default().describe(), "all scholarships");
    }
}
