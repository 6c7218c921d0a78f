use serde::Serialize;

use crate::enums::Cadence;
use crate::streak::StreakSummary;

#[derive(Debug, Serialize)]
pub struct InsightDebugMeta {
    pub rule_id: String,
    pub key_numbers: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct CoachingInsight {
    pub status_title: String,
    pub bullets: Vec<String>,
    pub next_step: String,
    pub tone: String,
    pub debug_meta: Option<InsightDebugMeta>,
}

fn period_word(cadence: Cadence) -> &'static str {
    match cadence {
        Cadence::Daily => "day",
        Cadence::Weekly => "week",
        Cadence::Monthly => "month",
    }
}

fn plural(count: u32, word: &str) -> String {
    if count == 1 {
        format!("{} {}", count, word)
    } else {
        format!("{} {}s", count, word)
    }
}

/// Streak length worth celebrating for each cadence.
fn milestone_for(cadence: Cadence) -> u32 {
    match cadence {
        Cadence::Daily => 7,
        Cadence::Weekly => 4,
        Cadence::Monthly => 3,
    }
}

pub fn streak_insight(summary: &StreakSummary, cadence: Cadence) -> CoachingInsight {
    let period = period_word(cadence);
    let count = i64::from(summary.count);
    let milestone = milestone_for(cadence);

    if summary.count == 0 {
        return CoachingInsight {
            status_title: format!("No {} savings logged yet.", cadence.as_str()),
            bullets: vec![format!(
                "A streak starts with one entry and grows every {}.",
                period
            )],
            next_step: "Small step: log one contribution today.".to_string(),
            tone: "neutral".to_string(),
            debug_meta: Some(InsightDebugMeta {
                rule_id: "first_step".to_string(),
                key_numbers: vec![count],
            }),
        };
    }

    if summary.broken {
        return CoachingInsight {
            status_title: format!(
                "Your {} streak paused after {}.",
                cadence.as_str(),
                plural(summary.count, period)
            ),
            bullets: vec![
                format!("Longest recent run: {}.", plural(summary.count, period)),
                "Missing one period does not erase the progress you made.".to_string(),
            ],
            next_step: "Small step: log a contribution now to start a new run.".to_string(),
            tone: "warn".to_string(),
            debug_meta: Some(InsightDebugMeta {
                rule_id: "streak_broken".to_string(),
                key_numbers: vec![count, summary.last_ts_utc.unwrap_or_default()],
            }),
        };
    }

    if summary.count >= milestone {
        return CoachingInsight {
            status_title: format!(
                "{} in a row, that is a real habit.",
                plural(summary.count, period)
            ),
            bullets: vec![
                format!("Current streak {}.", plural(summary.count, period)),
                format!("Milestone for {} saving is {}.", cadence.as_str(), plural(milestone, period)),
            ],
            next_step: format!("Keep it up: one entry next {} keeps the run going.", period),
            tone: "praise".to_string(),
            debug_meta: Some(InsightDebugMeta {
                rule_id: "milestone".to_string(),
                key_numbers: vec![count, i64::from(milestone)],
            }),
        };
    }

    let to_go = milestone - summary.count;
    CoachingInsight {
        status_title: format!("Streak at {}.", plural(summary.count, period)),
        bullets: vec![format!(
            "{} more to reach the {} milestone.",
            plural(to_go, period),
            cadence.as_str()
        )],
        next_step: format!("Small step: log your next contribution this {}.", period),
        tone: "calm".to_string(),
        debug_meta: Some(InsightDebugMeta {
            rule_id: "keep_going".to_string(),
            key_numbers: vec![count, i64::from(to_go)],
        }),
    }
}
