//! Compensation stack for multi-step operations.
//!
//! Each completed side effect pushes the action that undoes it. On failure
//! the stack is unwound in reverse; on success it is committed (dropped).
//! Steps that free the port or the row wait for the container to be removed
//! and are kept if that removal fails.

use async_trait::async_trait;

/// Undo action for one completed step of `create`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compensation {
    /// Revoke the issued credential's account.
    RevokeCredential(String),
    /// Drop a reservation that was never bound.
    ReleaseReservation(u16),
    /// Stop and remove a launched container.
    RemoveContainer(String),
    /// Delete a persisted instance row.
    DeleteRow(String),
    /// Free the port bound to this instance.
    ReleaseBinding(String),
}

impl Compensation {
    /// Whether undoing this step hands a port or a name back to the pool.
    #[must_use]
    pub fn frees_resources(&self) -> bool {
        matches!(
            self,
            Self::ReleaseReservation(_) | Self::DeleteRow(_) | Self::ReleaseBinding(_)
        )
    }

    fn is_removal(&self) -> bool {
        matches!(self, Self::RemoveContainer(_))
    }
}

/// Executes compensations.
#[async_trait]
pub trait Compensator: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the undo action itself failed.
    async fn compensate(&self, step: &Compensation) -> anyhow::Result<()>;
}

/// Outcome of [`Compensations::unwind`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Unwound {
    /// Steps whose undo action failed.
    pub failed: usize,
    /// Steps skipped because a container could not be removed.
    pub kept: usize,
}

impl Unwound {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed == 0 && self.kept == 0
    }
}

/// Ordered record of undo actions.
#[derive(Debug, Default)]
#[must_use = "an uncommitted stack must be unwound or committed"]
pub struct Compensations {
    steps: Vec<Compensation>,
}

impl Compensations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: Compensation) {
        self.steps.push(step);
    }

    /// Swap `old` for `new` in place, keeping its position in the unwind
    /// order. Returns `false` if `old` is not on the stack.
    pub fn replace(&mut self, old: &Compensation, new: Compensation) -> bool {
        match self.steps.iter_mut().find(|step| *step == old) {
            Some(step) => {
                *step = new;
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Keep every side effect.
    pub fn commit(self) {
        tracing::debug!(steps = self.steps.len(), "compensations committed");
    }

    /// Run every compensation, newest first. A failing step is logged and
    /// the remaining steps still run.
    ///
    /// Resource-freeing steps pushed after a container launch are held until
    /// that container is removed. If the removal fails, they and every older
    /// resource-freeing step are kept, so the port and row stay with the
    /// container that still holds them.
    pub async fn unwind(self, compensator: &dyn Compensator) -> Unwound {
        let mut outcome = Unwound::default();
        let mut removals = self.steps.iter().filter(|s| s.is_removal()).count();
        let mut held: Vec<Compensation> = Vec::new();
        let mut pinned = false;

        for step in self.steps.into_iter().rev() {
            if step.is_removal() {
                removals -= 1;
                if apply(compensator, &step).await {
                    for step in held.drain(..) {
                        if !apply(compensator, &step).await {
                            outcome.failed += 1;
                        }
                    }
                } else {
                    outcome.failed += 1;
                    pinned = true;
                    for step in held.drain(..) {
                        keep(&step, &mut outcome);
                    }
                }
            } else if step.frees_resources() && removals > 0 {
                held.push(step);
            } else if step.frees_resources() && pinned {
                keep(&step, &mut outcome);
            } else if !apply(compensator, &step).await {
                outcome.failed += 1;
            }
        }
        outcome
    }
}

async fn apply(compensator: &dyn Compensator, step: &Compensation) -> bool {
    match compensator.compensate(step).await {
        Ok(()) => {
            tracing::info!(?step, "compensated");
            true
        }
        Err(e) => {
            tracing::warn!(?step, error = %e, "compensation failed");
            false
        }
    }
}

fn keep(step: &Compensation, outcome: &mut Unwound) {
    tracing::warn!(?step, "kept, container still present");
    outcome.kept += 1;
}
