//! Credential repair job.
//!
//! One-shot remediation for accounts whose stored password is plaintext,
//! possibly wrapped in stray quotes or whitespace, instead of a hash. The job
//! is scoped to one role, processes records one at a time and only rewrites
//! values that are provably not a hash yet, so it is safe to re-run.
//!
//! [`plan`] is the pure part: records in, per-record actions out. [`RepairJob`]
//! executes those actions against an injected [`UserStore`].

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::auth::PasswordHasher;
use crate::auth::password::is_hash;
use crate::user::{User, UserRole, UserStore};

/// Strip literal quote characters and surrounding whitespace.
pub fn normalize_password(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != '"' && *c != '\'')
        .collect::<String>()
        .trim()
        .to_string()
}

/// Why a record was left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The stored value is already a well-formed hash.
    AlreadyHashed,
    /// Nothing is left after normalization; an empty password is never hashed.
    Empty,
}

/// What the job will do with one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairAction {
    /// Store this freshly computed hash of the normalized plaintext.
    Rehash(String),
    /// Store the normalized value as-is: it was a hash wrapped in quotes or
    /// whitespace, and hashing it again would lock the account out.
    Unwrap(String),
    /// Leave the record alone.
    Skip(SkipReason),
    /// Hashing failed; nothing is written.
    Invalid(String),
}

/// Planned action for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairPlan {
    pub user_id: String,
    pub email: String,
    pub action: RepairAction,
}

/// Decide what to do with one stored password.
pub fn plan_record(user: &User, hasher: &PasswordHasher) -> RepairPlan {
    let action = if is_hash(&user.password) {
        RepairAction::Skip(SkipReason::AlreadyHashed)
    } else {
        let normalized = normalize_password(&user.password);
        if normalized.is_empty() {
            RepairAction::Skip(SkipReason::Empty)
        } else if is_hash(&normalized) {
            RepairAction::Unwrap(normalized)
        } else {
            match hasher.hash(&normalized) {
                Ok(hash) => RepairAction::Rehash(hash),
                Err(e) => RepairAction::Invalid(format!("{e:#}")),
            }
        }
    };

    RepairPlan {
        user_id: user.id.clone(),
        email: user.email.clone(),
        action,
    }
}

/// Plan every record. No I/O.
pub fn plan(records: &[User], hasher: &PasswordHasher) -> Vec<RepairPlan> {
    records.iter().map(|user| plan_record(user, hasher)).collect()
}

/// Result for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordOutcome {
    Rehashed,
    Unwrapped,
    Skipped { reason: SkipReason },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordReport {
    pub user_id: String,
    pub email: String,
    #[serde(flatten)]
    pub outcome: RecordOutcome,
}

/// Totals for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RepairSummary {
    pub matched: usize,
    pub rehashed: usize,
    pub unwrapped: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Outcome of a repair run.
#[derive(Debug, Clone, Serialize)]
pub struct RepairReport {
    pub role: UserRole,
    pub dry_run: bool,
    pub summary: RepairSummary,
    pub records: Vec<RecordReport>,
}

impl RepairReport {
    fn new(role: UserRole, dry_run: bool) -> Self {
        Self {
            role,
            dry_run,
            summary: RepairSummary::default(),
            records: Vec::new(),
        }
    }

    fn record(&mut self, plan: &RepairPlan, outcome: RecordOutcome) {
        self.summary.matched += 1;
        match &outcome {
            RecordOutcome::Rehashed => self.summary.rehashed += 1,
            RecordOutcome::Unwrapped => self.summary.unwrapped += 1,
            RecordOutcome::Skipped { .. } => self.summary.skipped += 1,
            RecordOutcome::Failed { .. } => self.summary.failed += 1,
        }
        self.records.push(RecordReport {
            user_id: plan.user_id.clone(),
            email: plan.email.clone(),
            outcome,
        });
    }

    /// Number of records whose stored value was (or would be) rewritten.
    pub fn changed(&self) -> usize {
        self.summary.rehashed + self.summary.unwrapped
    }
}

/// Executes repairs against a user store.
pub struct RepairJob<'a, S: UserStore + ?Sized> {
    store: &'a S,
    hasher: PasswordHasher,
    dry_run: bool,
}

impl<'a, S: UserStore + ?Sized> RepairJob<'a, S> {
    pub fn new(store: &'a S, hasher: PasswordHasher) -> Self {
        Self {
            store,
            hasher,
            dry_run: false,
        }
    }

    /// Plan and report without writing anything.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Repair every user with `role`.
    ///
    /// Fails only when the role query fails. Per-record hashing or update
    /// failures are logged, recorded in the report and do not stop the run.
    #[instrument(skip(self), fields(dry_run = self.dry_run, cost = self.hasher.cost()))]
    pub async fn run(&self, role: UserRole) -> Result<RepairReport> {
        let users = self.store.find_by_role(role).await?;
        info!(count = users.len(), %role, "loaded users for credential repair");

        let mut report = RepairReport::new(role, self.dry_run);

        for user in &users {
            let plan = plan_record(user, &self.hasher);
            let outcome = self.apply(&plan).await;
            report.record(&plan, outcome);
        }

        let summary = report.summary;
        info!(
            matched = summary.matched,
            rehashed = summary.rehashed,
            unwrapped = summary.unwrapped,
            skipped = summary.skipped,
            failed = summary.failed,
            "credential repair finished"
        );

        Ok(report)
    }

    async fn apply(&self, plan: &RepairPlan) -> RecordOutcome {
        let (new_value, success) = match &plan.action {
            RepairAction::Skip(reason) => {
                debug!(user_id = %plan.user_id, ?reason, "skipping");
                return RecordOutcome::Skipped { reason: *reason };
            }
            RepairAction::Invalid(error) => {
                warn!(user_id = %plan.user_id, %error, "could not hash password");
                return RecordOutcome::Failed {
                    error: error.clone(),
                };
            }
            RepairAction::Rehash(hash) => (hash, RecordOutcome::Rehashed),
            RepairAction::Unwrap(hash) => (hash, RecordOutcome::Unwrapped),
        };

        if self.dry_run {
            info!(user_id = %plan.user_id, email = %plan.email, outcome = ?success, "dry-run: would update password");
            return success;
        }

        match self.store.update_password(&plan.user_id, new_value).await {
            Ok(()) => {
                info!(user_id = %plan.user_id, email = %plan.email, outcome = ?success, "updated password");
                success
            }
            Err(e) => {
                warn!(user_id = %plan.user_id, email = %plan.email, error = %format!("{e:#}"), "failed to update password");
                RecordOutcome::Failed {
                    error: format!("{e:#}"),
                }
            }
        }
    }
}
