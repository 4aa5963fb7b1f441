use std::time::Duration;

use casefile_types::{ReferenceNumber, SuspectLinks};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

use crate::matcher::{AutoLinkMatcher, SuspectMatch};

/// Suspects proposed for linking to the case being edited.
///
/// Nothing is linked until the editor accepts the suggestion and submits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LinkSuggestion {
    pub reference: String,
    pub matches: Vec<SuspectMatch>,
    pub message: String,
}

impl LinkSuggestion {
    fn new(reference: String, matches: Vec<SuspectMatch>) -> Self {
        let names = matches
            .iter()
            .map(|m| m.display_name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let message =
            format!("Suggested linking: {names} (based on R.O. {reference}). Review and confirm.");
        Self {
            reference,
            matches,
            message,
        }
    }

    /// Add the suggested suspects to `links`.
    pub fn accept_into(&self, links: &mut SuspectLinks) {
        for m in &self.matches {
            links.insert(m.id.clone());
        }
    }
}

/// Debounces reference-number edits before asking the matcher.
///
/// Owned by whoever drives the edit, one per open form. A query runs only
/// once the reference has been quiet for the settle period and differs from
/// the last one queried.
#[derive(Debug)]
pub struct SuggestionSession {
    settle: Duration,
    pending: Option<(String, Instant)>,
    last_processed: Option<String>,
}

impl SuggestionSession {
    pub fn new(settle: Duration) -> Self {
        Self {
            settle,
            pending: None,
            last_processed: None,
        }
    }

    /// Record that the reference now reads `reference`. Clearing it resets
    /// the session, so re-entering an earlier value queries again.
    pub fn observe(&mut self, reference: &str, now: Instant) {
        let reference = reference.trim();
        if reference.is_empty() {
            self.pending = None;
            self.last_processed = None;
            return;
        }
        self.pending = Some((reference.to_string(), now));
    }

    /// When the pending edit becomes eligible for a query.
    pub fn ready_at(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, at)| *at + self.settle)
    }

    pub fn last_processed(&self) -> Option<&str> {
        self.last_processed.as_deref()
    }

    /// Query the matcher if a settled, unprocessed reference is pending.
    ///
    /// Suspects already in `current` are left out; `None` means there is
    /// nothing new to suggest.
    pub async fn poll(
        &mut self,
        matcher: &AutoLinkMatcher,
        now: Instant,
        current: &SuspectLinks,
    ) -> Option<LinkSuggestion> {
        let ready = self.ready_at()?;
        if now < ready {
            return None;
        }
        let (raw, _) = self.pending.take()?;
        // Spellings of one reference number share a cache entry.
        let reference = raw
            .parse::<ReferenceNumber>()
            .map(|r| r.to_string())
            .unwrap_or(raw);
        if self.last_processed.as_deref() == Some(reference.as_str()) {
            debug!(%reference, "reference already processed");
            return None;
        }
        self.last_processed = Some(reference.clone());

        let matches: Vec<SuspectMatch> = matcher
            .find_suspects_for_reference_number(&reference)
            .await
            .into_iter()
            .filter(|m| !current.contains(&m.id))
            .collect();
        if matches.is_empty() {
            return None;
        }
        debug!(%reference, suggested = matches.len(), "link suggestion ready");
        Some(LinkSuggestion::new(reference, matches))
    }
}

/// Drive a [`SuggestionSession`] from watch channels.
///
/// `references` carries the reference field as it is edited and `links` the
/// form's current suspect links. Suggestions go to `out`. Once the reference
/// sender is dropped the last pending edit is still processed, then the task
/// ends. It also ends when `out` is closed.
pub fn spawn_suggestion_task(
    matcher: AutoLinkMatcher,
    settle: Duration,
    mut references: watch::Receiver<String>,
    links: watch::Receiver<SuspectLinks>,
    out: mpsc::Sender<LinkSuggestion>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut session = SuggestionSession::new(settle);
        let initial = references.borrow_and_update().clone();
        session.observe(&initial, Instant::now());

        let mut open = true;
        loop {
            let deadline = session.ready_at();
            if !open && deadline.is_none() {
                break;
            }
            tokio::select! {
                changed = references.changed(), if open => {
                    if changed.is_err() {
                        open = false;
                        continue;
                    }
                    let value = references.borrow_and_update().clone();
                    session.observe(&value, Instant::now());
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    let current = links.borrow().clone();
                    if let Some(suggestion) = session.poll(&matcher, Instant::now(), &current).await {
                        if out.send(suggestion).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
        debug!("suggestion task stopped");
    })
}
