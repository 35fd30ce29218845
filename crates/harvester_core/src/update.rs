use engine_logging::{engine_debug, engine_info, engine_trace, engine_warn};

use crate::filter::{classify, judge, Classification, Verdict};
use crate::{parse_activity_timestamp, Effect, Msg, ScanState, StopReason};

/// Pure update function: applies an observation to the scan and returns the
/// effects the engine must run next, in order.
///
/// A finished scan ignores every further message.
pub fn update(mut state: ScanState, msg: Msg) -> (ScanState, Vec<Effect>) {
    if state.is_finished() {
        return (state, Vec::new());
    }

    let effects = match msg {
        Msg::Start => vec![Effect::ReadPass],
        Msg::PassObserved { entries } => {
            if state.observe_pass(!entries.is_empty()) {
                engine_info!("First pass rendered no entries; nothing to harvest");
                return finish(state, StopReason::EmptyFeed);
            }

            let mut candidate = None;
            for entry in &entries {
                match classify(entry, state.criteria(), state.visited()) {
                    Classification::SkipDuplicate => {
                        engine_trace!("Skipping visited entry {}", entry.identity());
                        state.note_duplicate();
                    }
                    Classification::SkipNoMatch => {
                        engine_trace!("Skipping unmatched entry {:?}", entry.title);
                        state.note_unmatched();
                    }
                    Classification::Candidate(identity) => {
                        candidate = Some(identity);
                        break;
                    }
                }
            }

            match candidate {
                Some(identity) => {
                    // Marked before any side effect so a failed or stale item
                    // is never opened twice in one harvest.
                    state.mark_visited(identity.clone());
                    engine_debug!("Opening candidate entry {}", identity);
                    vec![Effect::OpenEntry { identity }]
                }
                None => unproductive_pass(&mut state),
            }
        }
        Msg::FeedHidden => {
            let within_retries = state.note_hidden();
            let within_budget = state.spend_attempt();
            if !within_retries {
                engine_warn!("Feed container stayed hidden; ending scan");
                return finish(state, StopReason::FeedUnavailable);
            }
            if !within_budget {
                engine_warn!("Scroll attempt budget used up while feed was hidden");
                return finish(state, StopReason::AttemptsExhausted);
            }
            vec![Effect::RetryPass]
        }
        Msg::DetailOpened {
            identity,
            raw_timestamp,
        } => {
            let raw = raw_timestamp.unwrap_or_default();
            match parse_activity_timestamp(&raw) {
                Err(err) => {
                    engine_warn!("Skipping {}: {}", identity, err);
                    state.note_unparseable();
                    back_to_feed(&state)
                }
                Ok(timestamp) => match judge(timestamp, state.criteria()) {
                    Verdict::StopScan => {
                        engine_info!(
                            "Entry {} at {} is not newer than cutoff {}; stopping",
                            identity,
                            timestamp,
                            state.criteria().cutoff
                        );
                        return finish(state, StopReason::CutoffReached);
                    }
                    Verdict::Match => vec![Effect::Download {
                        identity,
                        timestamp,
                    }],
                },
            }
        }
        Msg::ItemHarvested { identity, files } => {
            engine_info!("Harvested {} file(s) from {}", files.len(), identity);
            state.record_harvest(files);
            back_to_feed(&state)
        }
        Msg::ItemFailed { identity, reason } => {
            engine_warn!("Item {} failed, continuing: {}", identity, reason);
            state.record_failure(&identity, reason);
            back_to_feed(&state)
        }
        Msg::Cancelled => return finish(state, StopReason::Cancelled),
    };

    (state, effects)
}

fn unproductive_pass(state: &mut ScanState) -> Vec<Effect> {
    if !state.spend_attempt() {
        engine_info!(
            "No new candidates after {} attempts; ending scan",
            state.scroll_attempts()
        );
        state.finish(StopReason::AttemptsExhausted);
        return vec![Effect::Finish {
            reason: StopReason::AttemptsExhausted,
        }];
    }
    state.note_scroll();
    vec![Effect::Scroll, Effect::ReadPass]
}

/// Reopening the feed lands at the top; scroll back to where the scan was
/// reading. These scrolls do not spend the attempt budget.
fn back_to_feed(state: &ScanState) -> Vec<Effect> {
    let restore = state.depth() as usize;
    let mut effects = Vec::with_capacity(restore + 2);
    effects.push(Effect::ReturnToFeed);
    effects.extend(std::iter::repeat(Effect::Scroll).take(restore));
    effects.push(Effect::ReadPass);
    effects
}

fn finish(mut state: ScanState, reason: StopReason) -> (ScanState, Vec<Effect>) {
    state.finish(reason);
    (state, vec![Effect::Finish { reason }])
}
