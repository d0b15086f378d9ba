//! Record predicates for [`LocalStore::list`](crate::LocalStore::list).

use crate::types::{Origin, RemoteRef, SubscriptionPass};
use chrono::{DateTime, Utc};

/// A conjunction of optional conditions; an empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassFilter {
    origin: Option<Origin>,
    linked: Option<bool>,
    pending_push: Option<bool>,
    stale_before: Option<DateTime<Utc>>,
    remote_ref: Option<RemoteRef>,
}

impl PassFilter {
    /// Matches every record.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Only records authored by `origin`.
    #[must_use]
    pub fn origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Only linked (`true`) or unlinked (`false`) records.
    #[must_use]
    pub fn linked(mut self, linked: bool) -> Self {
        self.linked = Some(linked);
        self
    }

    /// Only records whose pending push flag equals `pending`.
    #[must_use]
    pub fn pending_push(mut self, pending: bool) -> Self {
        self.pending_push = Some(pending);
        self
    }

    /// Only records never synced or last synced strictly before `cutoff`.
    #[must_use]
    pub fn stale_before(mut self, cutoff: DateTime<Utc>) -> Self {
        self.stale_before = Some(cutoff);
        self
    }

    /// Only the record linked to `remote_ref`.
    #[must_use]
    pub fn remote_ref(mut self, remote_ref: RemoteRef) -> Self {
        self.remote_ref = Some(remote_ref);
        self
    }

    /// Evaluates the filter against a record.
    #[must_use]
    pub fn matches(&self, pass: &SubscriptionPass) -> bool {
        if self.origin.is_some_and(|origin| pass.origin != origin) {
            return false;
        }
        if self.linked.is_some_and(|linked| pass.is_linked() != linked) {
            return false;
        }
        if self
            .pending_push
            .is_some_and(|pending| pass.pending_push != pending)
        {
            return false;
        }
        if let Some(cutoff) = self.stale_before {
            if pass.last_sync_at.is_some_and(|at| at >= cutoff) {
                return false;
            }
        }
        if self.remote_ref.is_some() && pass.remote_ref != self.remote_ref {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NewPass, PassId, VehicleClass};
    use chrono::Duration;

    fn pass() -> SubscriptionPass {
        NewPass::local("GA-1", "Ada", VehicleClass::Car, 1_000).into_pass(PassId::new(1))
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(PassFilter::all().matches(&pass()));
    }

    #[test]
    fn origin_and_link_conditions() {
        let mut p = pass();
        assert!(PassFilter::all().origin(Origin::Local).matches(&p));
        assert!(!PassFilter::all().origin(Origin::Remote).matches(&p));
        assert!(!PassFilter::all().linked(true).matches(&p));

        p.remote_ref = Some(RemoteRef::new(4));
        assert!(PassFilter::all().linked(true).matches(&p));
        assert!(PassFilter::all().remote_ref(RemoteRef::new(4)).matches(&p));
        assert!(!PassFilter::all().remote_ref(RemoteRef::new(5)).matches(&p));
    }

    #[test]
    fn staleness_treats_never_synced_as_stale() {
        let now = Utc::now();
        let mut p = pass();
        let filter = PassFilter::all().stale_before(now - Duration::minutes(5));
        assert!(filter.matches(&p));

        p.last_sync_at = Some(now - Duration::minutes(10));
        assert!(filter.matches(&p));

        p.last_sync_at = Some(now - Duration::minutes(1));
        assert!(!filter.matches(&p));
    }
}
