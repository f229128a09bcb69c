//! Poll Registry
//!
//! Owns every poll definition and its recorded answers. All mutation goes
//! through one mutex so that the duplicate check, the insert and the tally
//! happen in a single critical section.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::aggregate::compute_results;
use crate::error::PollError;
use crate::model::{Poll, RecordedAnswer, Results};

/// Tunables for [`PollRegistry`].
#[derive(Debug, Clone)]
pub struct PollRegistryConfig {
    /// Reject answers that arrive after a poll's time limit.
    pub enforce_time_limit: bool,
    /// Polls kept in memory, current one included. Older polls are dropped
    /// together with their answers.
    pub max_retained_polls: usize,
}

impl Default for PollRegistryConfig {
    fn default() -> Self {
        Self {
            enforce_time_limit: true,
            max_retained_polls: 32,
        }
    }
}

/// Outcome of an answer submission that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// The answer was recorded; carries the fresh tally.
    Accepted(Results),
    /// The participant had already answered; nothing changed.
    Duplicate,
}

/// What changed when a poll was created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollCreated {
    pub poll: Poll,
    /// Previously current poll, now inactive.
    pub retired: Option<String>,
    /// Server-side deadline, if one is enforced for this poll.
    pub closes_at: Option<DateTime<Utc>>,
}

struct PollEntry {
    poll: Poll,
    answers: HashMap<String, RecordedAnswer>,
    closes_at: Option<DateTime<Utc>>,
}

impl PollEntry {
    fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.poll.is_active && self.closes_at.is_none_or(|deadline| now < deadline)
    }

    fn results(&self) -> Results {
        compute_results(
            &self.poll,
            self.answers.values().map(|a| a.option.as_str()),
        )
    }
}

#[derive(Default)]
struct PollStore {
    polls: HashMap<String, PollEntry>,
    /// Poll ids in creation order, oldest first.
    order: VecDeque<String>,
    current: Option<String>,
}

impl PollStore {
    fn entry(&self, poll_id: &str) -> Result<&PollEntry, PollError> {
        self.polls
            .get(poll_id)
            .ok_or_else(|| PollError::poll_not_found(poll_id))
    }

    fn entry_mut(&mut self, poll_id: &str) -> Result<&mut PollEntry, PollError> {
        self.polls
            .get_mut(poll_id)
            .ok_or_else(|| PollError::poll_not_found(poll_id))
    }
}

/// Process-wide store of polls and their answers.
pub struct PollRegistry {
    config: PollRegistryConfig,
    store: Mutex<PollStore>,
}

impl PollRegistry {
    pub fn new(config: PollRegistryConfig) -> Self {
        Self {
            config,
            store: Mutex::new(PollStore::default()),
        }
    }

    /// Insert a new poll with no answers and make it the current one.
    ///
    /// The poll's content is not validated here; a poll without options is
    /// accepted and simply tallies to an empty table.
    pub fn create_poll(&self, poll: Poll) -> Result<PollCreated, PollError> {
        self.create_poll_at(poll, Utc::now())
    }

    fn create_poll_at(&self, poll: Poll, now: DateTime<Utc>) -> Result<PollCreated, PollError> {
        let mut store = self.store.lock();
        if store.polls.contains_key(&poll.id) {
            return Err(PollError::PollExists(poll.id));
        }

        // A limit too large to represent is treated as no limit.
        let closes_at = (self.config.enforce_time_limit && poll.time_limit > 0)
            .then(|| {
                i64::try_from(poll.time_limit)
                    .ok()
                    .and_then(Duration::try_seconds)
                    .and_then(|limit| now.checked_add_signed(limit))
            })
            .flatten();

        let retired = match store.current.take() {
            Some(prev_id) => match store.polls.get_mut(&prev_id) {
                Some(prev) if prev.poll.is_active => {
                    prev.poll.is_active = false;
                    Some(prev_id)
                }
                _ => None,
            },
            None => None,
        };

        let id = poll.id.clone();
        store.polls.insert(
            id.clone(),
            PollEntry {
                poll: poll.clone(),
                answers: HashMap::new(),
                closes_at,
            },
        );
        store.order.push_back(id.clone());
        store.current = Some(id.clone());

        let keep = self.config.max_retained_polls.max(1);
        while store.order.len() > keep {
            if let Some(old) = store.order.pop_front() {
                store.polls.remove(&old);
                debug!(poll_id = %old, "Evicted retired poll");
            }
        }

        info!(poll_id = %id, options = poll.options.len(), "Poll created");
        Ok(PollCreated {
            poll,
            retired,
            closes_at,
        })
    }

    /// Snapshot of a poll record.
    pub fn get_poll(&self, poll_id: &str) -> Result<Poll, PollError> {
        let store = self.store.lock();
        store.entry(poll_id).map(|e| e.poll.clone())
    }

    /// The most recently created poll, if it is still retained.
    pub fn current_poll(&self) -> Option<Poll> {
        let store = self.store.lock();
        let id = store.current.as_ref()?;
        store.polls.get(id).map(|e| e.poll.clone())
    }

    pub fn len(&self) -> usize {
        self.store.lock().polls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record `option` as `participant_id`'s answer.
    ///
    /// Returns `Ok(false)` when the participant already answered this poll;
    /// the first answer is kept.
    pub fn record_answer(
        &self,
        poll_id: &str,
        participant_id: &str,
        option: &str,
    ) -> Result<bool, PollError> {
        self.submit_answer(poll_id, participant_id, option)
            .map(|s| matches!(s, Submission::Accepted(_)))
    }

    /// Record an answer and, if it was new, tally the poll under the same lock.
    pub fn submit_answer(
        &self,
        poll_id: &str,
        participant_id: &str,
        option: &str,
    ) -> Result<Submission, PollError> {
        self.submit_answer_with(poll_id, participant_id, option, |_| {})
    }

    /// Like [`submit_answer`](Self::submit_answer), but hands the fresh tally
    /// to `on_accept` before the registry lock is released.
    ///
    /// Tallies reach `on_accept` in the order the answers were recorded, so a
    /// publisher called from here never sends an older tally after a newer
    /// one. `on_accept` must not block or call back into the registry.
    pub fn submit_answer_with<F>(
        &self,
        poll_id: &str,
        participant_id: &str,
        option: &str,
        on_accept: F,
    ) -> Result<Submission, PollError>
    where
        F: FnOnce(&Results),
    {
        self.submit_answer_at(poll_id, participant_id, option, Utc::now(), on_accept)
    }

    fn submit_answer_at<F>(
        &self,
        poll_id: &str,
        participant_id: &str,
        option: &str,
        now: DateTime<Utc>,
        on_accept: F,
    ) -> Result<Submission, PollError>
    where
        F: FnOnce(&Results),
    {
        let mut store = self.store.lock();
        let entry = store.entry_mut(poll_id)?;

        if entry.answers.contains_key(participant_id) {
            debug!(poll_id, participant_id, "Duplicate answer ignored");
            return Ok(Submission::Duplicate);
        }
        if !entry.is_open(now) {
            return Err(PollError::PollClosed(poll_id.to_string()));
        }
        if !entry.poll.has_option(option) {
            return Err(PollError::InvalidOption {
                poll_id: poll_id.to_string(),
                answer: option.to_string(),
            });
        }

        let sequence = entry.answers.len() as u64;
        entry.answers.insert(
            participant_id.to_string(),
            RecordedAnswer {
                participant_id: participant_id.to_string(),
                option: option.to_string(),
                sequence,
                submitted_at: now,
            },
        );

        let results = entry.results();
        on_accept(&results);
        Ok(Submission::Accepted(results))
    }

    /// Current tally for a poll.
    pub fn results(&self, poll_id: &str) -> Result<Results, PollError> {
        let store = self.store.lock();
        store.entry(poll_id).map(PollEntry::results)
    }

    /// Answers recorded for a poll, in submission order.
    pub fn answers(&self, poll_id: &str) -> Result<Vec<RecordedAnswer>, PollError> {
        let store = self.store.lock();
        let mut answers: Vec<_> = store.entry(poll_id)?.answers.values().cloned().collect();
        answers.sort_by_key(|a| a.sequence);
        Ok(answers)
    }

    /// Close a poll because the deadline `deadline` passed.
    ///
    /// Only closes the poll if `deadline` is the deadline it was created
    /// with. A poll id that was evicted and then reused gets a new deadline,
    /// so a timer left over from the earlier poll leaves it alone.
    pub fn expire_poll(&self, poll_id: &str, deadline: DateTime<Utc>) -> Result<bool, PollError> {
        let mut store = self.store.lock();
        let entry = store.entry_mut(poll_id)?;
        if entry.closes_at != Some(deadline) || !entry.poll.is_active {
            return Ok(false);
        }
        entry.poll.is_active = false;
        info!(poll_id, "Poll time limit reached");
        Ok(true)
    }

    /// Stop accepting answers for a poll. Returns whether it was open.
    pub fn close_poll(&self, poll_id: &str) -> Result<bool, PollError> {
        let mut store = self.store.lock();
        let entry = store.entry_mut(poll_id)?;
        let was_active = entry.poll.is_active;
        entry.poll.is_active = false;
        if was_active {
            info!(poll_id, "Poll closed");
        }
        Ok(was_active)
    }
}

impl Default for PollRegistry {
    fn default() -> Self {
        Self::new(PollRegistryConfig::default())
    }
}
