use std::collections::BTreeSet;

use crate::broker::message::EventKind;

pub type SubscriptionId = u64;

/// The set of event kinds a subscription wants.
///
/// An empty filter never matches; use [`KindFilter::all`] to receive everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KindFilter {
    kinds: BTreeSet<EventKind>,
}

impl KindFilter {
    pub fn all() -> Self {
        EventKind::ALL.into_iter().collect()
    }

    pub fn matches(&self, kind: EventKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = EventKind> + '_ {
        self.kinds.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

impl FromIterator<EventKind> for KindFilter {
    fn from_iter<I: IntoIterator<Item = EventKind>>(iter: I) -> Self {
        Self {
            kinds: iter.into_iter().collect(),
        }
    }
}

impl From<EventKind> for KindFilter {
    fn from(kind: EventKind) -> Self {
        std::iter::once(kind).collect()
    }
}

impl<const N: usize> From<[EventKind; N]> for KindFilter {
    fn from(kinds: [EventKind; N]) -> Self {
        kinds.into_iter().collect()
    }
}

impl From<&[EventKind]> for KindFilter {
    fn from(kinds: &[EventKind]) -> Self {
        kinds.iter().copied().collect()
    }
}
