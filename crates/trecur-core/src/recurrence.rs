use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::datecalc::{evaluate_instant, EvalContext};
use crate::error::CoreError;
use crate::models::{RecurrenceType, SynthesisResult, Task, TaskStatus, TemplateDate};
use crate::period::Period;
use crate::store::{TaskFilter, TaskStore};
use crate::template;
use crate::timezone::{detect_system_timezone, parse_timezone};

/// Periodic catch-up never runs more iterations than this by default.
pub const DEFAULT_MAX_BACKFILL: usize = 10_000;

/// Mean Gregorian month.
const AVERAGE_MONTH_SECONDS: i64 = 2_629_746;

/// Attributes a chained instance does not inherit from its parent.
const CHAINED_EXCLUDED: &[&str] = &["due", "recur", "rlastinstance", "status", "end"];

/// Attributes a periodic instance does not inherit from its parent.
const PERIODIC_EXCLUDED: &[&str] = &[
    "due",
    "recur",
    "rlastinstance",
    "rwait",
    "rscheduled",
    "status",
    "end",
];

/// Source of "now".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Clock {
    #[default]
    System,
    Fixed(DateTime<Utc>),
}

impl Clock {
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(at) => *at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecurrenceConfig {
    /// Zone whose wall clock day and month arithmetic follows.
    pub timezone: Tz,
    /// Upper bound on periodic iterations per synthesis.
    pub max_backfill: usize,
    pub clock: Clock,
}

impl RecurrenceConfig {
    pub fn new(timezone: Tz) -> Self {
        Self {
            timezone,
            max_backfill: DEFAULT_MAX_BACKFILL,
            clock: Clock::System,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_max_backfill(mut self, max_backfill: usize) -> Self {
        self.max_backfill = max_backfill;
        self
    }
}

impl Default for RecurrenceConfig {
    fn default() -> Self {
        let timezone = parse_timezone(&detect_system_timezone()).unwrap_or(Tz::UTC);
        Self::new(timezone)
    }
}

/// Creates the instances of chained and periodic series.
///
/// A series is a parent record carrying `r` and `rtype`, plus instances that
/// point back at it through `rparent`. The parent's `rlastinstance` tracks the
/// newest instance.
pub struct RecurrenceProcessor<'a> {
    store: &'a dyn TaskStore,
    config: RecurrenceConfig,
}

impl<'a> RecurrenceProcessor<'a> {
    pub fn new(store: &'a dyn TaskStore, config: RecurrenceConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &RecurrenceConfig {
        &self.config
    }

    pub fn store(&self) -> &'a dyn TaskStore {
        self.store
    }

    /// Turns a freshly added record into the parent of a new series.
    ///
    /// The first instance is saved right away. The returned parent is not: it
    /// is handed back to Taskwarrior, which stores it.
    pub async fn add_recurrent_task(&self, mut task: Task) -> Result<Task, CoreError> {
        let period = match (&task.r, task.due) {
            (Some(r), Some(_)) => r.to_string(),
            _ => return Err(CoreError::MissingParameter("r and due".to_string())),
        };
        let parent_uuid = *task.uuid.get_or_insert_with(Uuid::new_v4);

        let mut child = template::copy(&task, &["rtype"])?;
        child.rparent = Some(parent_uuid);
        self.store.save(&mut child).await?;
        let child_uuid = child.require_uuid()?;
        info!(parent = %parent_uuid, child = %child_uuid, "created first instance");

        task.recur = Some(period);
        task.rlastinstance = Some(child_uuid);
        Ok(task)
    }

    /// Deletes the instance the parent `task` currently tracks.
    pub async fn delete_child_task(&self, task: &Task) -> Result<(), CoreError> {
        let child_uuid = task.rlastinstance.ok_or_else(|| {
            CoreError::InvalidInput(format!("{} does not track an instance", task.label()))
        })?;
        let mut child = self.store.get(child_uuid).await?;
        self.store.delete(&mut child).await?;
        info!(parent = ?task.uuid, child = %child_uuid, "deleted tracked instance");
        Ok(())
    }

    /// Creates whatever follows `task`, an instance that has just been
    /// completed or deleted.
    pub async fn synthesize_next_child(&self, task: &Task) -> Result<SynthesisResult, CoreError> {
        let parent = self.load_parent(task).await?;
        match parent.rtype {
            Some(RecurrenceType::Chained) => self.chain(parent, task).await,
            Some(RecurrenceType::Periodic) => self.backfill(parent, task).await,
            None => {
                let parent = parent.require_uuid()?;
                debug!(parent = %parent, "parent is not recurring");
                Ok(SynthesisResult::NotRecurring { parent })
            }
        }
    }

    /// Chained series: the next instance is due one period after `task` ended.
    pub async fn synthesize_next_chained(&self, task: &Task) -> Result<SynthesisResult, CoreError> {
        let parent = self.load_parent(task).await?;
        self.chain(parent, task).await
    }

    /// Periodic series: creates every instance due after `task` up to and
    /// including the first one due in the future.
    pub async fn synthesize_next_periodic(&self, task: &Task) -> Result<SynthesisResult, CoreError> {
        let parent = self.load_parent(task).await?;
        self.backfill(parent, task).await
    }

    fn now(&self) -> DateTime<Utc> {
        self.config.clock.now()
    }

    async fn load_parent(&self, task: &Task) -> Result<Task, CoreError> {
        let parent = task.rparent.ok_or_else(|| {
            CoreError::InvalidInput(format!("{} is not an instance of a series", task.label()))
        })?;
        self.store.get(parent).await
    }

    async fn chain(&self, mut parent: Task, finished: &Task) -> Result<SynthesisResult, CoreError> {
        let parent_uuid = parent.require_uuid()?;
        self.normalize_template_dates(&mut parent)?;
        if parent.status.is_terminal() {
            debug!(parent = %parent_uuid, status = %parent.status, "series has ended");
            return Ok(SynthesisResult::ParentClosed { parent: parent_uuid });
        }
        let period = require_period(&parent)?;

        let mut child = template::copy(&parent, CHAINED_EXCLUDED)?;
        child.r = Some(period.clone());
        child.rparent = Some(parent_uuid);

        let finished_at = finished.end.unwrap_or_else(|| self.now());
        child.due = Some(
            period
                .add_to(finished_at, &self.config.timezone)
                .ok_or_else(|| out_of_range(&period, finished_at))?,
        );
        apply_template_dates(&parent, &mut child)?;

        self.save_instance(&mut child).await?;
        let child_uuid = child.require_uuid()?;
        info!(parent = %parent_uuid, child = %child_uuid, due = ?child.due, "created chained instance");

        parent.rlastinstance = Some(child_uuid);
        self.store.save(&mut parent).await?;

        Ok(SynthesisResult::Chained { parent, child })
    }

    async fn backfill(&self, mut parent: Task, finished: &Task) -> Result<SynthesisResult, CoreError> {
        let parent_uuid = parent.require_uuid()?;
        self.normalize_template_dates(&mut parent)?;
        if parent.status.is_terminal() {
            debug!(parent = %parent_uuid, status = %parent.status, "series has ended");
            return Ok(SynthesisResult::ParentClosed { parent: parent_uuid });
        }
        let period = require_period(&parent)?;
        let anchor = parent.due.ok_or_else(|| {
            CoreError::InvalidInput(format!("{} has no due date", parent.label()))
        })?;

        let mut template = template::copy(&parent, PERIODIC_EXCLUDED)?;
        template.r = Some(period.clone());
        template.rparent = Some(parent_uuid);

        let now = self.now();
        let mut index = match finished.due {
            Some(previous) => first_index_after(&period, anchor, previous, &self.config.timezone)?,
            None => 1,
        };
        let mut created = Vec::new();
        let mut visited: usize = 0;

        let last = loop {
            visited += 1;
            if visited > self.config.max_backfill {
                warn!(parent = %parent_uuid, limit = self.config.max_backfill, "backfill limit reached");
                return Err(CoreError::BackfillLimit(self.config.max_backfill));
            }

            let due = period
                .nth_after(anchor, index, &self.config.timezone)
                .ok_or_else(|| out_of_range(&period, anchor))?;

            let instance = match self.store.find_instance(parent_uuid, due).await? {
                Some(existing) => {
                    debug!(parent = %parent_uuid, due = %due, "instance already exists");
                    existing
                }
                None => {
                    let mut child = template::copy(&template, &[])?;
                    child.due = Some(due);
                    apply_template_dates(&parent, &mut child)?;
                    match self.save_instance(&mut child).await {
                        Ok(()) => match self.settle_duplicates(parent_uuid, due, &mut child).await? {
                            Some(winner) => winner,
                            None => {
                                info!(parent = %parent_uuid, child = ?child.uuid, due = %due, "created periodic instance");
                                created.push(child.clone());
                                child
                            }
                        },
                        Err(CoreError::Conflict(reason)) => {
                            debug!(parent = %parent_uuid, %reason, "adopting concurrent instance");
                            self.store
                                .find_instance(parent_uuid, due)
                                .await?
                                .ok_or(CoreError::Conflict(reason))?
                        }
                        Err(err) => return Err(err),
                    }
                }
            };

            if due > now {
                break instance;
            }
            index = index
                .checked_add(1)
                .ok_or_else(|| out_of_range(&period, anchor))?;
        };

        parent.rlastinstance = Some(last.require_uuid()?);
        self.store.save(&mut parent).await?;

        Ok(SynthesisResult::Periodic {
            parent,
            created,
            last,
        })
    }

    /// Saves a new instance. Taskwarrior may hand back a working-set id that
    /// is already off by one; that case is retried once with the previous id.
    async fn save_instance(&self, task: &mut Task) -> Result<(), CoreError> {
        match self.store.save(task).await {
            Err(CoreError::StaleId(id)) => {
                warn!(id, "stale working-set id after save, retrying with the previous one");
                task.id = Some(id.saturating_sub(1));
                self.store.refresh(task).await
            }
            other => other,
        }
    }

    /// Stores without a uniqueness constraint can end up with two live
    /// instances in one `(rparent, due)` slot when hooks run concurrently.
    /// The instance with the lowest uuid wins; `child` is deleted if it lost.
    async fn settle_duplicates(
        &self,
        parent_uuid: Uuid,
        due: DateTime<Utc>,
        child: &mut Task,
    ) -> Result<Option<Task>, CoreError> {
        let winner = self
            .store
            .find(&[TaskFilter::Parent(parent_uuid), TaskFilter::Due(due)])
            .await?
            .into_iter()
            .filter(|sibling| sibling.status != TaskStatus::Deleted)
            .min_by_key(|sibling| sibling.uuid);
        match winner {
            Some(winner) if winner.uuid != child.uuid => {
                warn!(parent = %parent_uuid, due = %due, kept = ?winner.uuid, "removing duplicate instance");
                self.store.delete(child).await?;
                Ok(Some(winner))
            }
            _ => Ok(None),
        }
    }

    /// Evaluates `rwait`/`rscheduled` expressions against the parent's due date.
    fn normalize_template_dates(&self, parent: &mut Task) -> Result<(), CoreError> {
        let ctx = EvalContext {
            now: self.now(),
            due: parent.due,
            tz: self.config.timezone,
        };
        for slot in [&mut parent.rwait, &mut parent.rscheduled] {
            if let Some(TemplateDate::Expr(expr)) = slot.as_ref() {
                let at = evaluate_instant(expr, &ctx)?;
                *slot = Some(TemplateDate::At(at));
            }
        }
        Ok(())
    }
}

fn require_period(parent: &Task) -> Result<Period, CoreError> {
    parent
        .r
        .clone()
        .ok_or_else(|| CoreError::InvalidInput(format!("{} has no recurrence period", parent.label())))
}

/// The smallest `n >= 1` with `anchor + period × n` later than `after`.
///
/// Starts from an estimate based on the average span length and walks to the
/// exact index, so resuming a long series costs a few steps.
fn first_index_after(
    period: &Period,
    anchor: DateTime<Utc>,
    after: DateTime<Utc>,
    tz: &Tz,
) -> Result<u32, CoreError> {
    if after < anchor {
        return Ok(1);
    }
    let span = period.span();
    let approx = i64::from(span.months) * AVERAGE_MONTH_SECONDS + i64::from(span.days) * 86_400 + span.seconds;
    let elapsed = (after - anchor).num_seconds();
    let at = |n: u32| {
        period
            .nth_after(anchor, n, tz)
            .ok_or_else(|| out_of_range(period, anchor))
    };

    let mut n = u32::try_from(elapsed / approx.max(1)).unwrap_or(u32::MAX).max(1);
    while n > 1 && at(n - 1)? > after {
        n -= 1;
    }
    while at(n)? <= after {
        n = n.checked_add(1).ok_or_else(|| out_of_range(period, anchor))?;
    }
    Ok(n)
}

fn out_of_range(period: &Period, from: DateTime<Utc>) -> CoreError {
    CoreError::InvalidInput(format!("{} + {} is out of range", from, period))
}

/// Places `wait`/`scheduled` at the same distance before `child.due` as the
/// parent's `rwait`/`rscheduled` are before its `due`.
fn apply_template_dates(parent: &Task, child: &mut Task) -> Result<(), CoreError> {
    let (Some(parent_due), Some(due)) = (parent.due, child.due) else {
        return Ok(());
    };
    let shift = |template: &TemplateDate| -> Result<DateTime<Utc>, CoreError> {
        match template {
            TemplateDate::At(at) => due
                .checked_sub_signed(parent_due - *at)
                .ok_or_else(|| CoreError::InvalidInput(format!("offset of {} is out of range", at))),
            TemplateDate::Expr(expr) => Err(CoreError::InvalidInput(format!(
                "unevaluated date expression '{}'",
                expr
            ))),
        }
    };
    if let Some(rwait) = &parent.rwait {
        child.wait = Some(shift(rwait)?);
    }
    if let Some(rscheduled) = &parent.rscheduled {
        child.scheduled = Some(shift(rscheduled)?);
    }
    Ok(())
}
