use std::collections::HashMap;
use std::fmt::Write;

use chrono::NaiveDate;
use serde::Serialize;

use crate::catalog::Catalog;
use crate::filter::{self, AmountBucket, DeadlineStatus, FilterState};
use crate::models::Scholarship;

#[derive(Debug, Clone, PartialEq)]
pub struct BucketSummary {
    pub bucket: AmountBucket,
    pub count: usize,
    pub total_amount: i64,
}

pub fn summarize_by_bucket(scholarships: &[Scholarship]) -> Vec<BucketSummary> {
    let mut map: HashMap<AmountBucket, (usize, i64)> = HashMap::new();

    for scholarship in scholarships {
        let entry = map
            .entry(AmountBucket::of(scholarship.amount))
            .or_insert((0, 0));
        entry.0 += 1;
        entry.1 += scholarship.amount;
    }

    let mut summaries: Vec<BucketSummary> = map
        .into_iter()
        .map(|(bucket, (count, total_amount))| BucketSummary {
            bucket,
            count,
            total_amount,
        })
        .collect();

    summaries.sort_by_key(|s| s.bucket);
    summaries
}

pub fn count_tags(scholarships: &[Scholarship]) -> Vec<(String, usize)> {
    let order = filter::available_tags(scholarships);
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for tag in scholarships.iter().flat_map(|s| s.tags.iter()) {
        *counts.entry(tag.as_str()).or_insert(0) += 1;
    }

    let mut tags: Vec<(String, usize)> = order
        .into_iter()
        .map(|tag| {
            let count = counts.get(tag.as_str()).copied().unwrap_or(0);
            (tag, count)
        })
        .collect();

    tags.sort_by(|a, b| b.1.cmp(&a.1));
    tags
}

pub fn build_report(
    catalog: &Catalog,
    state: &FilterState,
    today: NaiveDate,
    matches: &[Scholarship],
) -> String {
    let summaries = summarize_by_bucket(matches);
    let tags = count_tags(matches);

    let mut output = String::new();

    let _ = writeln!(output, "# Scholarship Catalog Report");
    let _ = writeln!(
        output,
        "Generated {} from the {} catalog ({} of {} scholarships match {})",
        today,
        catalog.source.label(),
        matches.len(),
        catalog.scholarships.len(),
        state.describe()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Award Mix");

    if summaries.is_empty() {
        let _ = writeln!(output, "No scholarships match these filters.");
    } else {
        for summary in summaries.iter() {
            let _ = writeln!(
                output,
                "- {}: {} scholarships (${} total)",
                summary.bucket.label(),
                summary.count,
                summary.total_amount
            );
        }
    }

    let mut open: Vec<&Scholarship> = matches
        .iter()
        .filter(|s| filter::classify(s, today) == DeadlineStatus::Active)
        .collect();
    open.sort_by_key(|s| s.deadline);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Closing Soon");

    if open.is_empty() {
        let _ = writeln!(output, "No open deadlines.");
    } else {
        for scholarship in open.iter().take(5) {
            let _ = writeln!(
                output,
                "- {} ({}) ${} due {} ({} days left)",
                scholarship.name,
                scholarship.id,
                scholarship.amount,
                scholarship.deadline,
                filter::days_until(scholarship.deadline, today)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Tags");

    if tags.is_empty() {
        let _ = writeln!(output, "No tags recorded.");
    } else {
        for (tag, count) in tags.iter().take(10) {
            let _ = writeln!(output, "- {tag}: {count}");
        }
    }

    output
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    id: &'a str,
    name: &'a str,
    amount: i64,
    amount_range: &'static str,
    deadline: NaiveDate,
    days_left: i64,
    status: &'static str,
    tags: String,
}

/// Write one CSV row per scholarship with its derived status and amount range.
pub fn write_csv<W: std::io::Write>(
    writer: W,
    scholarships: &[Scholarship],
    today: NaiveDate,
) -> anyhow::Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    for scholarship in scholarships {
        csv_writer.serialize(CsvRow {
            id: &scholarship.id,
            name: &scholarship.name,
            amount: scholarship.amount,
            amount_range: AmountBucket::of(scholarship.amount).label(),
            deadline: scholarship.deadline,
            days_left: filter::days_until(scholarship.deadline, today),
            status: filter::classify(scholarship, today).label(),
            tags: scholarship.tags.join(";"),
        })?;
    }

    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogSource;
    use crate::dataset::fallback_scholarships;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn fallback_catalog() -> Catalog {
        Catalog {
            scholarships: fallback_scholarships().to_vec(),
            source: CatalogSource::Fallback,
        }
    }

    #[test]
    fn buckets_are_sorted_and_totalled() {
        let all = fallback_scholarships();
        let summaries = summarize_by_bucket(all);

        assert_eq!(summaries.len(), 3);
        assert_eq!(summaries[0].bucket, AmountBucket::Low);
        let counted: usize = summaries.iter().map(|s| s.count).sum();
        assert_eq!(counted, all.len());
        let total: i64 = summaries.iter().map(|s| s.total_amount).sum();
        assert_eq!(total, all.iter().map(|s| s.amount).sum::<i64>());
    }

    #[test]
    fn tags_are_ranked_by_frequency() {
        let tags = count_tags(fallback_scholarships());
        assert!(tags.windows(2).all(|w| w[0].1 >= w[1].1));
        assert!(tags.iter().any(|(tag, _)| tag == "stem"));
    }

    #[test]
    fn report_lists_sections() {
        let catalog = fallback_catalog();
        let state = FilterState::default();
        let today = date(2026, 1, 1);
        let report = build_report(&catalog, &state, today, &catalog.scholarships);

        assert!(report.starts_with("# Scholarship Catalog Report"));
        assert!(report.contains(
            "from the embedded catalog (25 of 25 scholarships match all scholarships)"
        ));
        assert!(report.contains("## Award Mix"));
        assert!(report.contains("## Closing Soon"));
        assert!(report.contains(
            "- Academic Excellence Award (sch_010) $3999 due 2026-01-15 (14 days left)"
        ));
    }

    #[test]
    fn empty_selection_renders_placeholders() {
        let catalog = fallback_catalog();
        let report = build_report(&catalog, &FilterState::default(), date(2026, 1, 1), &[]);
        assert!(report.contains("No scholarships match these filters."));
        assert!(report.contains("No open deadlines."));
        assert!(report.contains("No tags recorded."));
    }

    #[test]
    fn csv_export_includes_derived_columns() {
        let sample = crate::dataset::find_fallback("sch_001").unwrap().clone();
        let mut buffer = Vec::new();
        write_csv(&mut buffer, &[sample], date(2025, 12, 2)).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("id,name,amount,amount_range,deadline,days_left,status,tags")
        );
        assert_eq!(
            lines.next(),
            Some("sch_001,Future Leaders Scholarship,5000,medium,2025-12-01,-1,expired,leadership;community;undergraduate")
        );
    }
}
