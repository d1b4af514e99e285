//! Materialization of recurring templates into concrete instances.

use std::collections::{BTreeMap, HashSet};
use std::collections::btree_map::Entry;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::EventSyncEngine;
use crate::error::{ParishError, ParishResult};
use crate::event::Event;
use crate::recurrence;

/// How much of a template's horizon is covered after a sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Materialization {
    /// Every occurrence inside the horizon has an instance.
    Full,
    /// The pass stopped early; the next sync fills the gaps.
    Partial,
}

/// Outcome of syncing one template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSync {
    pub template_id: String,
    pub title: String,
    pub created: usize,
    pub pruned: usize,
    /// Extra instances removed from slots that held more than one.
    pub deduplicated: usize,
    pub error: Option<String>,
}

impl TemplateSync {
    fn for_template(template: &Event) -> Self {
        TemplateSync {
            template_id: template.id.clone(),
            title: template.title.clone(),
            created: 0,
            pruned: 0,
            deduplicated: 0,
            error: None,
        }
    }

    pub fn state(&self) -> Materialization {
        if self.error.is_some() {
            Materialization::Partial
        } else {
            Materialization::Full
        }
    }
}

/// Summary of one `sync_recurring_events` pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub now: DateTime<Utc>,
    pub horizon_end: DateTime<Utc>,
    pub templates: Vec<TemplateSync>,
    /// Instances removed because their template no longer exists.
    pub orphans_removed: usize,
    /// Past instances removed whose parent is no longer a template.
    pub detached_pruned: usize,
    /// Failures outside any single template.
    pub errors: Vec<String>,
}

impl SyncReport {
    fn new(now: DateTime<Utc>, horizon_end: DateTime<Utc>) -> Self {
        SyncReport {
            now,
            horizon_end,
            templates: Vec::new(),
            orphans_removed: 0,
            detached_pruned: 0,
            errors: Vec::new(),
        }
    }

    /// A pass that could not even list templates.
    pub(crate) fn aborted(now: DateTime<Utc>, horizon_end: DateTime<Utc>, error: &ParishError) -> Self {
        let mut report = SyncReport::new(now, horizon_end);
        report.errors.push(error.to_string());
        report
    }

    pub fn created(&self) -> usize {
        self.templates.iter().map(|t| t.created).sum()
    }

    pub fn pruned(&self) -> usize {
        self.templates.iter().map(|t| t.pruned).sum::<usize>() + self.detached_pruned
    }

    pub fn deduplicated(&self) -> usize {
        self.templates.iter().map(|t| t.deduplicated).sum()
    }

    /// Whether the pass added or removed anything.
    pub fn changed(&self) -> bool {
        self.created() > 0 || self.pruned() > 0 || self.deduplicated() > 0 || self.orphans_removed > 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &TemplateSync> {
        self.templates.iter().filter(|t| t.error.is_some())
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.failures().next().is_none()
    }
}

impl EventSyncEngine {
    /// Bring every template's instances in line with the horizon.
    ///
    /// Retires instances that have started, removes extra copies of any slot
    /// filled more than once, then creates each missing occurrence in
    /// `[now, now + horizon)`. Existing instances, including ones a caller
    /// edited, are left alone, and slots listed in a template's
    /// `excluded_dates` stay empty, so running this repeatedly is safe.
    ///
    /// Passes on one engine run one at a time. A store failure stops work on
    /// the affected template only and is recorded in the report. Only a
    /// failure to list templates is returned as an error.
    pub async fn sync_recurring_events(&self) -> ParishResult<SyncReport> {
        let _pass = self.sync_lock.lock().await;

        let now = self.now();
        let horizon_end = self.config.horizon.end_from(now);
        let templates = self.repo.templates().await?;

        let mut report = SyncReport::new(now, horizon_end);

        for template in &templates {
            let mut outcome = TemplateSync::for_template(template);

            if let Err(e) = self.sync_template(template, now, horizon_end, &mut outcome).await {
                warn!(
                    template_id = %template.id,
                    title = %template.title,
                    created = outcome.created,
                    error = %e,
                    "Template left partially materialized"
                );
                outcome.error = Some(e.to_string());
            }

            report.templates.push(outcome);
        }

        let template_ids: HashSet<&str> = templates.iter().map(|t| t.id.as_str()).collect();
        if let Err(e) = self.sweep_detached(&template_ids, now, &mut report).await {
            warn!(error = %e, "Failed to sweep detached instances");
            report.errors.push(e.to_string());
        }

        info!(
            templates = report.templates.len(),
            created = report.created(),
            pruned = report.pruned(),
            deduplicated = report.deduplicated(),
            orphans_removed = report.orphans_removed,
            failures = report.failures().count(),
            horizon_end = %horizon_end,
            "Recurring events synced"
        );

        Ok(report)
    }

    async fn sync_template(
        &self,
        template: &Event,
        now: DateTime<Utc>,
        horizon_end: DateTime<Utc>,
        outcome: &mut TemplateSync,
    ) -> ParishResult<()> {
        self.expire_exclusions(template, now).await?;

        let mut slots: BTreeMap<DateTime<Utc>, String> = BTreeMap::new();
        for instance in self.repo.instances_of(&template.id).await? {
            if instance.start_time < now {
                self.delete_if_present(&instance.id).await?;
                debug!(template_id = %template.id, instance_id = %instance.id, start = %instance.start_time, "Retired past instance");
                outcome.pruned += 1;
                continue;
            }

            match slots.entry(instance.start_time) {
                Entry::Vacant(slot) => {
                    slot.insert(instance.id);
                }
                Entry::Occupied(slot) => {
                    self.delete_if_present(&instance.id).await?;
                    debug!(template_id = %template.id, kept = %slot.get(), removed = %instance.id, start = %instance.start_time, "Removed duplicate instance");
                    outcome.deduplicated += 1;
                }
            }
        }

        let tz = self.config.timezone;
        let dates = recurrence::occurrences(
            template.start_time.with_timezone(&tz),
            template.recurrence_type,
            now.with_timezone(&tz),
            horizon_end.with_timezone(&tz),
        );

        for occurrence in dates {
            let start = occurrence.with_timezone(&Utc);

            if template.is_excluded(start) || slots.contains_key(&start) {
                continue;
            }

            let instance = self.repo.create(template.instance_at(start)).await?;
            debug!(template_id = %template.id, instance_id = %instance.id, start = %start, "Materialized instance");
            outcome.created += 1;
        }

        Ok(())
    }

    /// Drop skipped occurrences that are already past. The template is only
    /// written back when something was dropped.
    async fn expire_exclusions(&self, template: &Event, now: DateTime<Utc>) -> ParishResult<()> {
        let mut current = template.clone();
        let expired = current.expire_exclusions(now);
        if expired > 0 {
            self.repo.set(&current).await?;
            debug!(template_id = %template.id, expired, "Forgot past excluded dates");
        }
        Ok(())
    }

    /// Clean up instances whose parent is not among the current templates:
    /// orphans of a deleted template go entirely, instances of a parent that
    /// stopped repeating are only retired once past.
    async fn sweep_detached(
        &self,
        template_ids: &HashSet<&str>,
        now: DateTime<Utc>,
        report: &mut SyncReport,
    ) -> ParishResult<()> {
        let mut by_parent: BTreeMap<String, Vec<Event>> = BTreeMap::new();

        for instance in self.repo.instances().await? {
            let Some(parent_id) = instance.parent_event_id.clone() else {
                continue;
            };
            if !template_ids.contains(parent_id.as_str()) {
                by_parent.entry(parent_id).or_default().push(instance);
            }
        }

        for (parent_id, instances) in by_parent {
            let parent_exists = self.repo.get(&parent_id).await?.is_some();

            for instance in instances {
                if parent_exists && instance.start_time >= now {
                    continue;
                }

                self.delete_if_present(&instance.id).await?;

                if parent_exists {
                    report.detached_pruned += 1;
                } else {
                    debug!(parent_id = %parent_id, instance_id = %instance.id, "Removed orphaned instance");
                    report.orphans_removed += 1;
                }
            }
        }

        Ok(())
    }

    /// Delete, treating "already gone" as success. Concurrent syncs race here.
    pub(crate) async fn delete_if_present(&self, id: &str) -> ParishResult<()> {
        match self.repo.delete(id).await {
            Ok(()) | Err(ParishError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
