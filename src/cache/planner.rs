//! Invalidation plan generation.
//!
//! Merges queued cache events into the set of key prefixes and tag groups
//! that must be dropped.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use super::events::{CacheEvent, EventKind};
use super::keys::{Family, KeyPrefix, QueryKind, TagGroup};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct InvalidationPlan {
    pub prefixes: BTreeSet<KeyPrefix>,
    pub groups: BTreeSet<TagGroup>,
}

impl fmt::Display for InvalidationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefixes: Vec<String> = self.prefixes.iter().map(ToString::to_string).collect();
        let groups: Vec<String> = self.groups.iter().map(ToString::to_string).collect();
        write!(
            f,
            "InvalidationPlan {{ prefixes: [{}], groups: [{}] }}",
            prefixes.join(", "),
            groups.join(", ")
        )
    }
}

impl InvalidationPlan {
    /// Merge events into one plan, ignoring duplicate deliveries.
    pub fn from_events(events: Vec<CacheEvent>) -> Self {
        let mut plan = Self::default();
        let mut seen_ids = HashSet::new();

        for event in events.into_iter().filter(|e| seen_ids.insert(e.id)) {
            match event.kind {
                EventKind::RecordCreated { record_id, slug }
                | EventKind::PublishToggled { record_id, slug } => {
                    plan.record(record_id);
                    plan.slug(slug);
                    plan.collection();
                    plan.aggregates();
                }
                EventKind::RecordUpdated {
                    record_id,
                    slug,
                    aggregates_changed,
                } => {
                    plan.record(record_id);
                    plan.slug(slug);
                    plan.collection();
                    if aggregates_changed {
                        plan.aggregates();
                    }
                }
                EventKind::RecordDeleted { record_id } => {
                    plan.record(record_id);
                    plan.collection();
                    plan.aggregates();
                }
                EventKind::CommentsChanged { post_id } => {
                    plan.prefixes.insert(
                        KeyPrefix::kind(Family::Comments, QueryKind::Approved).with_param(post_id),
                    );
                }
            }
        }

        plan
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty() && self.groups.is_empty()
    }

    pub fn len(&self) -> usize {
        self.prefixes.len() + self.groups.len()
    }

    fn record(&mut self, id: String) {
        self.groups.insert(TagGroup::Record(id));
    }

    fn slug(&mut self, slug: String) {
        self.groups.insert(TagGroup::Slug(slug));
    }

    fn collection(&mut self) {
        self.prefixes
            .insert(KeyPrefix::kind(Family::Content, QueryKind::List));
    }

    fn aggregates(&mut self) {
        self.prefixes
            .insert(KeyPrefix::kind(Family::Content, QueryKind::Tags));
    }
}
