use crate::*;

use indexmap::IndexMap;
use std::sync::{Arc, Mutex, RwLock};

/// Keyed store mapping poll ids to their crypto contexts.
///
/// Replaces ambient module-level singletons with an explicit service object:
/// contexts are created at poll creation and torn down with `remove_poll`.
/// Each context sits behind its own mutex, so token issuance and ballot
/// accumulation get their required check-and-mutate atomicity and two
/// ballots submitted concurrently to one poll serialize, while different
/// polls do not contend.
#[derive(Default)]
pub struct PollCryptoService {
    polls: RwLock<IndexMap<String, Arc<Mutex<PollCryptoContext>>>>,
}

impl PollCryptoService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate keys and register a context for `poll_id`.
    ///
    /// Key generation runs before any lock is taken, so the prime search
    /// never blocks token or vote handling on other polls.
    pub fn create_poll(&self, poll_id: &str, options: usize, bits: usize) -> Result<(), ValidationError> {
        if self.polls.read().unwrap().contains_key(poll_id) {
            return Err(ValidationError::PollExists(poll_id.to_string()));
        }

        let context = PollCryptoContext::new(options, bits)?;

        let mut polls = self.polls.write().unwrap();
        if polls.contains_key(poll_id) {
            return Err(ValidationError::PollExists(poll_id.to_string()));
        }
        polls.insert(poll_id.to_string(), Arc::new(Mutex::new(context)));
        info!("registered crypto context for poll {}", poll_id);
        Ok(())
    }

    pub fn open_poll(&self, poll_id: &str) -> Result<(), ValidationError> {
        self.with_poll(poll_id, |context| context.open())
    }

    pub fn public_key_bundle(&self, poll_id: &str) -> Result<PublicKeyBundle, ValidationError> {
        self.with_poll(poll_id, |context| Ok(context.public_key_bundle()))
    }

    pub fn request_token(
        &self,
        poll_id: &str,
        request: &TokenRequest,
    ) -> Result<TokenResponse, ValidationError> {
        self.with_poll(poll_id, |context| context.request_token(request))
    }

    pub fn submit_ballot(
        &self,
        poll_id: &str,
        submission: &BallotSubmission,
    ) -> Result<BallotReceipt, ValidationError> {
        self.with_poll(poll_id, |context| context.submit_ballot(submission))
    }

    /// Close the poll and return the published tally shape.
    pub fn close_poll(&self, poll_id: &str) -> Result<TallyResult, ValidationError> {
        self.with_poll(poll_id, |context| context.close().map(|outcome| outcome.to_result()))
    }

    /// The cached tally of a closed poll.
    pub fn tally_result(&self, poll_id: &str) -> Result<TallyResult, ValidationError> {
        self.with_poll(poll_id, |context| context.tally_result())
    }

    pub fn archive_poll(&self, poll_id: &str) -> Result<(), ValidationError> {
        self.with_poll(poll_id, |context| context.archive())
    }

    pub fn status(&self, poll_id: &str) -> Result<SystemStatus, ValidationError> {
        self.with_poll(poll_id, |context| Ok(context.status()))
    }

    /// Tear down a poll's crypto state, dropping its keys.
    pub fn remove_poll(&self, poll_id: &str) -> Result<(), ValidationError> {
        let mut polls = self.polls.write().unwrap();
        polls
            .shift_remove(poll_id)
            .map(|_| info!("removed crypto context for poll {}", poll_id))
            .ok_or_else(|| ValidationError::PollNotFound(poll_id.to_string()))
    }

    pub fn poll_count(&self) -> usize {
        self.polls.read().unwrap().len()
    }

    fn with_poll<T>(
        &self,
        poll_id: &str,
        operation: impl FnOnce(&mut PollCryptoContext) -> Result<T, ValidationError>,
    ) -> Result<T, ValidationError> {
        let context = self
            .polls
            .read()
            .unwrap()
            .get(poll_id)
            .cloned()
            .ok_or_else(|| ValidationError::PollNotFound(poll_id.to_string()))?;
        let mut context = context.lock().unwrap();
        operation(&mut context)
    }
}
