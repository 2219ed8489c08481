//! Market summary aggregation.
//!
//! Recomputed in full on every read: observations are grouped per
//! (item, variation), each group is ordered chronologically, and the trailing
//! window of up to [`MEAN_WINDOW`] observations yields the mean, the percent
//! deviation of the latest price, and the buy/sell/neutral call. The working
//! set is small (thousands of rows), so no incremental state is kept.

mod insights;

pub use insights::{history_insights, HistoryInsights, TrendHint};

use std::collections::HashMap;

use crate::config::MEAN_WINDOW;
use crate::types::{PriceObservation, Recommendation, SummaryRow};
use crate::variation::VariationKey;

/// Produce one summary row per (item, variation) group, ordered by display
/// label. Empty input yields an empty result — nothing to summarize is not
/// an error.
pub fn compute_summary(observations: &[PriceObservation]) -> Vec<SummaryRow> {
    if observations.is_empty() {
        return Vec::new();
    }

    let mut groups: HashMap<(i64, &VariationKey), Vec<&PriceObservation>> = HashMap::new();
    for obs in observations {
        groups
            .entry((obs.item_id, &obs.variation_key))
            .or_default()
            .push(obs);
    }

    let mut rows: Vec<SummaryRow> = groups.into_values().map(summarize_group).collect();
    rows.sort_by(|a, b| {
        a.display_label
            .cmp(&b.display_label)
            .then_with(|| a.item_id.cmp(&b.item_id))
            .then_with(|| a.variation_key.as_str().cmp(b.variation_key.as_str()))
    });
    rows
}

fn summarize_group(mut group: Vec<&PriceObservation>) -> SummaryRow {
    // Date ascending; same-date rows ordered by recording time so a same-day
    // correction supersedes as "last" instead of being averaged as a peer.
    group.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.recorded_at_ns.cmp(&b.recorded_at_ns))
    });

    // Groups are non-empty by construction.
    let last = group[group.len() - 1];
    let window = &group[group.len().saturating_sub(MEAN_WINDOW)..];
    let mean_last5 =
        window.iter().map(|o| o.price_zeny as f64).sum::<f64>() / window.len() as f64;

    // Floor at exactly 0.0 instead of dividing by zero; a single observation
    // also lands here as price/mean - 1 = 0.
    let deviation_pct = if mean_last5 > 0.0 {
        last.price_zeny as f64 / mean_last5 - 1.0
    } else {
        0.0
    };

    SummaryRow {
        item_id: last.item_id,
        variation_key: last.variation_key.clone(),
        display_label: last.display_label.clone(),
        last_date: last.date,
        last_price: last.price_zeny,
        mean_last5,
        deviation_pct,
        recommendation: Recommendation::from_deviation(deviation_pct),
    }
}

/// Top gainers and losers: the summary rows re-sorted by deviation, descending
/// for gainers and ascending for losers, truncated to `limit` each.
pub fn top_movers(rows: &[SummaryRow], limit: usize) -> (Vec<SummaryRow>, Vec<SummaryRow>) {
    let mut by_deviation: Vec<SummaryRow> = rows.to_vec();
    by_deviation.sort_by(|a, b| {
        b.deviation_pct
            .partial_cmp(&a.deviation_pct)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let gainers: Vec<SummaryRow> = by_deviation.iter().take(limit).cloned().collect();
    let losers: Vec<SummaryRow> = by_deviation.iter().rev().take(limit).cloned().collect();
    (gainers, losers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variation::derive_key;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).expect("valid date")
    }

    fn obs(item_id: i64, d: u32, price: i64, recorded_at_ns: i64) -> PriceObservation {
        obs_with_key(item_id, d, price, recorded_at_ns, 0, &[])
    }

    fn obs_with_key(
        item_id: i64,
        d: u32,
        price: i64,
        recorded_at_ns: i64,
        refine: u32,
        attachments: &[i64],
    ) -> PriceObservation {
        let key = derive_key(refine, attachments, None);
        PriceObservation {
            item_id,
            item_name: format!("Item {item_id}"),
            date: day(d),
            price_zeny: price,
            refine,
            attachment_ids: attachments.to_vec(),
            free_text: None,
            display_label: format!("Item {item_id} [{}]", key.as_str()),
            variation_key: key,
            recorded_at_ns,
        }
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(compute_summary(&[]).is_empty());
    }

    #[test]
    fn single_observation_has_zero_deviation() {
        let rows = compute_summary(&[obs(1, 1, 650_000, 10)]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].last_price, 650_000);
        assert_eq!(rows[0].mean_last5, 650_000.0);
        assert_eq!(rows[0].deviation_pct, 0.0);
        assert_eq!(rows[0].recommendation, Recommendation::Neutral);
    }

    #[test]
    fn five_day_scenario_is_neutral() {
        let prices = [100, 110, 90, 120, 105];
        let observations: Vec<_> = prices
            .iter()
            .enumerate()
            .map(|(i, &p)| obs(1, i as u32 + 1, p, i as i64))
            .collect();

        let rows = compute_summary(&observations);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].mean_last5, 105.0);
        assert_eq!(rows[0].last_price, 105);
        assert_eq!(rows[0].deviation_pct, 0.0);
        assert_eq!(rows[0].recommendation, Recommendation::Neutral);
    }

    #[test]
    fn sixth_day_pushes_out_the_first() {
        let prices = [100, 110, 90, 120, 105, 115];
        let observations: Vec<_> = prices
            .iter()
            .enumerate()
            .map(|(i, &p)| obs(1, i as u32 + 1, p, i as i64))
            .collect();

        let rows = compute_summary(&observations);
        assert_eq!(rows[0].mean_last5, 108.0);
        assert_eq!(rows[0].last_price, 115);
        let expected = 115.0 / 108.0 - 1.0;
        assert!((rows[0].deviation_pct - expected).abs() < 1e-12);
        // ~+6.5%, below the +10% sell bar
        assert_eq!(rows[0].recommendation, Recommendation::Neutral);
    }

    #[test]
    fn price_collapse_flags_a_buy() {
        let prices = [110, 90, 120, 105, 115, 90];
        let observations: Vec<_> = prices
            .iter()
            .enumerate()
            .map(|(i, &p)| obs(1, i as u32 + 1, p, i as i64))
            .collect();

        let rows = compute_summary(&observations);
        // window is [90, 120, 105, 115, 90], mean 104
        assert_eq!(rows[0].mean_last5, 104.0);
        assert!(rows[0].deviation_pct < -0.05);
        assert_eq!(rows[0].recommendation, Recommendation::Buy);
    }

    #[test]
    fn variations_never_share_history() {
        let mut observations = vec![
            obs_with_key(1, 1, 100, 1, 0, &[]),
            obs_with_key(1, 2, 100, 2, 0, &[]),
        ];
        observations.push(obs_with_key(1, 2, 900_000, 3, 7, &[4001]));

        let rows = compute_summary(&observations);
        assert_eq!(rows.len(), 2);
        let base = rows
            .iter()
            .find(|r| r.variation_key.as_str() == "r0")
            .expect("base variation present");
        assert_eq!(base.mean_last5, 100.0);
        assert_eq!(base.last_price, 100);
    }

    #[test]
    fn same_day_correction_supersedes_but_still_counts() {
        let observations = vec![
            obs(1, 1, 100, 1),
            obs(1, 2, 110, 2),
            obs(1, 3, 90, 3),
            obs(1, 4, 120, 4),
            // two writes on day 5: the later recording wins as "last"
            obs(1, 5, 50, 5),
            obs(1, 5, 105, 6),
        ];

        let rows = compute_summary(&observations);
        assert_eq!(rows[0].last_price, 105);
        // window is the last 5 by (date, recorded_at): [110, 90, 120, 50, 105]
        assert_eq!(rows[0].mean_last5, 95.0);
    }

    #[test]
    fn rows_are_ordered_by_display_label() {
        let observations = vec![obs(3, 1, 100, 1), obs(1, 1, 100, 2), obs(2, 1, 100, 3)];
        let rows = compute_summary(&observations);
        let labels: Vec<_> = rows.iter().map(|r| r.display_label.as_str()).collect();
        let mut sorted = labels.clone();
        sorted.sort();
        assert_eq!(labels, sorted);
    }

    #[test]
    fn top_movers_rank_by_deviation() {
        let observations = vec![
            // item 1: flat
            obs(1, 1, 100, 1),
            obs(1, 2, 100, 2),
            // item 2: spike
            obs(2, 1, 100, 3),
            obs(2, 2, 150, 4),
            // item 3: collapse
            obs(3, 1, 100, 5),
            obs(3, 2, 60, 6),
        ];
        let rows = compute_summary(&observations);
        let (gainers, losers) = top_movers(&rows, 1);
        assert_eq!(gainers[0].item_id, 2);
        assert_eq!(losers[0].item_id, 3);
    }
}
