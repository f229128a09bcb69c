//! Vote tallying.

use std::collections::BTreeMap;

use crate::model::{Poll, Results};

/// Tally `answers` against the options of `poll`.
///
/// Every option gets a key, zero votes included. An answer naming something
/// that is not an option gets no key of its own but still counts toward
/// `total_responses`, which is always the number of answers given.
pub fn compute_results<'a, I>(poll: &Poll, answers: I) -> Results
where
    I: IntoIterator<Item = &'a str>,
{
    let mut results: BTreeMap<String, u64> =
        poll.options.iter().map(|o| (o.clone(), 0)).collect();

    let mut total_responses = 0;
    for answer in answers {
        total_responses += 1;
        if let Some(count) = results.get_mut(answer) {
            *count += 1;
        }
    }

    Results {
        poll_id: poll.id.clone(),
        results,
        total_responses,
    }
}
