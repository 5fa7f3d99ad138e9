use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

/// Records which resource ids currently have a download in flight.
///
/// `begin` is an insert-if-absent claim: only the caller that gets `true`
/// may dispatch the request, and it owes exactly one `end` for it.
#[derive(Debug, Default)]
pub struct DownloadTracker {
    in_flight: Mutex<HashSet<i64>>,
}

impl DownloadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, id: i64) -> bool {
        self.lock().insert(id)
    }

    pub fn end(&self, id: i64) {
        self.lock().remove(&id);
    }

    pub fn is_in_flight(&self, id: i64) -> bool {
        self.lock().contains(&id)
    }

    pub fn in_flight_count(&self) -> usize {
        self.lock().len()
    }

    /// Scoped form of `begin`/`end`: the mark is released when the claim
    /// drops, whichever way the download finishes.
    pub fn claim(&self, id: i64) -> Option<DownloadClaim<'_>> {
        self.begin(id).then_some(DownloadClaim { tracker: self, id })
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<i64>> {
        self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Debug)]
pub struct DownloadClaim<'a> {
    tracker: &'a DownloadTracker,
    id: i64,
}

impl DownloadClaim<'_> {
    pub fn id(&self) -> i64 {
        self.id
    }
}

impl Drop for DownloadClaim<'_> {
    fn drop(&mut self) {
        self.tracker.end(self.id);
    }
}
