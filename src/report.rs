/* src/report.rs */

use crate::notify::escape_html;
use crate::tracker::{AccountTracker, StatusSnapshot};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt::Write;
use std::sync::Arc;

const MEDALS: [&str; 3] = ["🥇", "🥈", "🥉"];
const MARKER: &str = "🔹";
/// Telegram rejects longer messages.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// A snapshot with its place in the report.
#[derive(Debug, Clone, Serialize)]
pub struct RankedEntry {
    pub rank: usize,
    pub badge: &'static str,
    #[serde(flatten)]
    pub snapshot: StatusSnapshot,
}

/// Snapshots of every tracker that has fetched a position at least once.
pub fn collect(trackers: &[Arc<AccountTracker>]) -> Vec<StatusSnapshot> {
    trackers.iter().filter_map(|t| t.snapshot()).collect()
}

/// Orders by queue depth, closest to the front first. Ties keep input order.
pub fn rank(mut snapshots: Vec<StatusSnapshot>) -> Vec<RankedEntry> {
    snapshots.sort_by(|a, b| a.depth().total_cmp(&b.depth()));
    snapshots
        .into_iter()
        .enumerate()
        .map(|(idx, snapshot)| RankedEntry {
            rank: idx + 1,
            badge: MEDALS.get(idx).copied().unwrap_or(MARKER),
            snapshot,
        })
        .collect()
}

fn section(entry: &RankedEntry) -> String {
    let s = &entry.snapshot;
    let mut out = String::new();
    let _ = write!(
        out,
        "\n{} <b>#{} {}</b>\n\
         Behind: <code>{}</code>\n\
         ETA: {}\n\
         Last ping: {}\n\
         Last update: {}\n\
         Proxy: <code>{}</code>\n",
        entry.badge,
        entry.rank,
        escape_html(&s.name),
        s.behind,
        escape_html(&s.eta),
        s.last_ping,
        s.last_update,
        escape_html(&s.proxy),
    );
    out
}

/// Renders the Telegram HTML report, or `None` when there is nothing to report.
///
/// Stays within [`MAX_MESSAGE_CHARS`]: sections that do not fit are replaced
/// by a single `+N more` line.
pub fn render(entries: &[RankedEntry], generated_at: DateTime<Local>) -> Option<String> {
    if entries.is_empty() {
        return None;
    }

    let footer = format!(
        "\n<i>Generated {}</i>",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    );
    let budget = MAX_MESSAGE_CHARS.saturating_sub(footer.chars().count());
    let overflow_room = overflow_line(entries.len()).chars().count();

    let mut out = format!("<b>📊 Queue status</b> ({} accounts)\n", entries.len());
    let mut used = out.chars().count();
    for (idx, entry) in entries.iter().enumerate() {
        let text = section(entry);
        let len = text.chars().count();
        // Anything but the last section must leave room for the overflow line.
        let reserve = if idx + 1 == entries.len() { 0 } else { overflow_room };
        if used + len + reserve > budget {
            out.push_str(&overflow_line(entries.len() - idx));
            break;
        }
        out.push_str(&text);
        used += len;
    }
    out.push_str(&footer);
    Some(out)
}

fn overflow_line(hidden: usize) -> String {
    format!("\n… +{} more\n", hidden)
}

pub fn build_report(trackers: &[Arc<AccountTracker>], now: DateTime<Local>) -> Option<String> {
    render(&rank(collect(trackers)), now)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(name: &str, behind: u64) -> StatusSnapshot {
        StatusSnapshot {
            name: name.to_string(),
            behind: behind.into(),
            eta: format!("{behind} min"),
            last_ping: "never".to_string(),
            last_update: "2026-01-01 00:00:00".to_string(),
            proxy: "direct".to_string(),
        }
    }

    #[test]
    fn ranks_ascending_with_stable_ties() {
        let ranked = rank(vec![snap("a", 42), snap("b", 7), snap("c", 100), snap("d", 7)]);
        let order: Vec<_> = ranked
            .iter()
            .map(|e| (e.snapshot.name.as_str(), e.snapshot.depth()))
            .collect();
        assert_eq!(
            order,
            vec![("b", 7.0), ("d", 7.0), ("a", 42.0), ("c", 100.0)]
        );

        let badges: Vec<_> = ranked.iter().map(|e| e.badge).collect();
        assert_eq!(badges, vec!["🥇", "🥈", "🥉", "🔹"]);
        assert_eq!(ranked[3].rank, 4);
    }

    #[test]
    fn everyone_past_third_shares_the_marker() {
        let ranked = rank((0..6).map(|i| snap(&format!("n{i}"), i)).collect());
        assert!(ranked[3..].iter().all(|e| e.badge == MARKER));
    }

    #[test]
    fn renders_sections_in_rank_order() {
        let ranked = rank(vec![snap("a", 42), snap("b", 7), snap("c", 100), snap("d", 7)]);
        let text = render(&ranked, Local::now()).unwrap();

        let pos = |needle: &str| text.find(needle).unwrap();
        assert!(pos("#1 b") < pos("#2 d"));
        assert!(pos("#2 d") < pos("#3 a"));
        assert!(pos("#3 a") < pos("#4 c"));
        assert!(text.contains("🥇 <b>#1 b</b>"));
        assert!(text.contains("🔹 <b>#4 c</b>"));
        assert!(text.starts_with("<b>📊 Queue status</b> (4 accounts)"));
    }

    #[test]
    fn names_are_html_escaped() {
        let text = render(&rank(vec![snap("<script>", 1)]), Local::now()).unwrap();
        assert!(text.contains("&lt;script&gt;"));
        assert!(!text.contains("<script>"));
    }

    #[test]
    fn nothing_to_report_renders_nothing() {
        assert!(render(&[], Local::now()).is_none());
        assert!(build_report(&[], Local::now()).is_none());
    }

    #[test]
    fn ranked_entries_serialize_flat() {
        let ranked = rank(vec![snap("a", 3)]);
        let value = serde_json::to_value(&ranked[0]).unwrap();
        assert_eq!(value["rank"], 1);
        assert_eq!(value["name"], "a");
        assert_eq!(value["behind"], 3);
    }

    #[test]
    fn long_reports_are_cut_to_the_message_limit() {
        let ranked = rank((0..60).map(|i| snap(&format!("account-{i:02}"), i)).collect());
        let text = render(&ranked, Local::now()).unwrap();

        assert!(text.chars().count() <= MAX_MESSAGE_CHARS);
        assert!(text.starts_with("<b>📊 Queue status</b> (60 accounts)"));
        assert!(text.contains("#1 account-00"));
        assert!(!text.contains("#60 account-59"));
        assert!(text.contains("<i>Generated "));

        let shown = text.matches("</b>\nBehind:").count();
        let more = format!("+{} more", 60 - shown);
        assert!(shown > 0 && shown < 60);
        assert!(text.contains(&more), "missing {more}");
    }
}
