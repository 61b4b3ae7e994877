//! Optimistic in-place updates with rollback on failure.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::error::{ListError, ListResult};
use super::source::Entity;

/// The pre-mutation snapshot of one entity, kept until the commit resolves.
#[derive(Debug, Clone)]
pub struct PendingMutation<T: Entity> {
  pub id: T::Id,
  pub snapshot: T,
  /// The entity as the local change left it
  pub optimistic: T,
  pub patch: Option<T::Patch>,
  pub started_at: DateTime<Utc>,
}

/// How a pending mutation resolved
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome<Id> {
  /// The backend accepted the change
  Committed(Id),
  /// The backend rejected the change and the snapshot was restored
  RolledBack { id: Id, error: ListError },
}

impl<Id> MutationOutcome<Id> {
  pub fn id(&self) -> &Id {
    match self {
      MutationOutcome::Committed(id) => id,
      MutationOutcome::RolledBack { id, .. } => id,
    }
  }

  pub fn error(&self) -> Option<&ListError> {
    match self {
      MutationOutcome::RolledBack { error, .. } => Some(error),
      MutationOutcome::Committed(_) => None,
    }
  }
}

type Completion<T> = (<T as Entity>::Id, ListResult<Option<<T as Entity>::Patch>>);

/// Applies local changes immediately and reconciles them once the backend
/// answers.
///
/// The list itself is owned elsewhere (the fetch controller); it is passed
/// in on `apply` and `poll`. At most one mutation per entity is in flight.
pub struct OptimisticMutator<T: Entity> {
  pending: HashMap<T::Id, PendingMutation<T>>,
  tx: mpsc::UnboundedSender<Completion<T>>,
  rx: mpsc::UnboundedReceiver<Completion<T>>,
}

impl<T: Entity> Default for OptimisticMutator<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Entity> OptimisticMutator<T> {
  pub fn new() -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    Self {
      pending: HashMap::new(),
      tx,
      rx,
    }
  }

  pub fn is_pending(&self, id: &T::Id) -> bool {
    self.pending.contains_key(id)
  }

  pub fn pending(&self) -> impl Iterator<Item = &PendingMutation<T>> {
    self.pending.values()
  }

  pub fn pending_count(&self) -> usize {
    self.pending.len()
  }

  /// Mutate the entity `id` locally, then commit it in the background.
  ///
  /// Fails synchronously with `NotFound` if the entity is not in `items`
  /// and with `Busy` if a mutation for it is still outstanding. In both
  /// cases nothing is changed and `commit` is never started.
  pub fn apply<M, F>(&mut self, items: &mut [T], id: &T::Id, mutate: M, commit: F) -> ListResult<()>
  where
    M: FnOnce(&mut T),
    F: Future<Output = ListResult<Option<T::Patch>>> + Send + 'static,
  {
    self.start(items, id, None, mutate, commit)
  }

  /// Like [`apply`](Self::apply), recording the patch alongside the snapshot.
  pub fn apply_patch<F>(&mut self, items: &mut [T], id: &T::Id, patch: T::Patch, commit: F) -> ListResult<()>
  where
    F: Future<Output = ListResult<Option<T::Patch>>> + Send + 'static,
  {
    T::validate_patch(&patch)?;
    let local = patch.clone();
    self.start(items, id, Some(patch), move |entity| entity.apply_patch(&local), commit)
  }

  fn start<M, F>(
    &mut self,
    items: &mut [T],
    id: &T::Id,
    patch: Option<T::Patch>,
    mutate: M,
    commit: F,
  ) -> ListResult<()>
  where
    M: FnOnce(&mut T),
    F: Future<Output = ListResult<Option<T::Patch>>> + Send + 'static,
  {
    let entity = items
      .iter_mut()
      .find(|e| &e.id() == id)
      .ok_or_else(|| ListError::NotFound(format!("{} {}", T::KIND, id)))?;

    if self.pending.contains_key(id) {
      return Err(ListError::Busy(format!("{} {}", T::KIND, id)));
    }

    let snapshot = entity.clone();
    mutate(entity);
    let optimistic = entity.clone();
    info!(kind = T::KIND, %id, "applied optimistic change");

    self.pending.insert(
      id.clone(),
      PendingMutation {
        id: id.clone(),
        snapshot,
        optimistic,
        patch,
        started_at: Utc::now(),
      },
    );

    let tx = self.tx.clone();
    let id = id.clone();
    tokio::spawn(async move {
      let result = commit.await;
      let _ = tx.send((id, result));
    });

    Ok(())
  }

  /// Resolve finished commits against the current list.
  ///
  /// Successes drop the snapshot and apply any canonical fields returned by
  /// the server; failures put the snapshot back, but only over the
  /// optimistic value. A row that a refresh replaced or removed in the
  /// meantime keeps the fresher data and only the bookkeeping is cleared.
  pub fn poll(&mut self, mut items: Option<&mut [T]>) -> Vec<MutationOutcome<T::Id>> {
    let mut outcomes = Vec::new();

    while let Ok((id, result)) = self.rx.try_recv() {
      let Some(pending) = self.pending.remove(&id) else {
        continue;
      };
      let entity = items
        .as_deref_mut()
        .and_then(|items| items.iter_mut().find(|e| e.id() == id));

      match result {
        Ok(canonical) => {
          if let (Some(entity), Some(patch)) = (entity, canonical.as_ref()) {
            entity.apply_patch(patch);
          }
          info!(kind = T::KIND, %id, "change committed");
          outcomes.push(MutationOutcome::Committed(id));
        }
        Err(error) => {
          match entity {
            Some(entity) if *entity == pending.optimistic => *entity = pending.snapshot,
            Some(_) => debug!(kind = T::KIND, %id, "row refreshed since the change, keeping it"),
            None => {}
          }
          warn!(kind = T::KIND, %id, %error, "change rejected, rolled back");
          outcomes.push(MutationOutcome::RolledBack { id, error });
        }
      }
    }

    outcomes
  }
}

impl<T: Entity> std::fmt::Debug for OptimisticMutator<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("OptimisticMutator")
      .field("pending", &self.pending.keys().collect::<Vec<_>>())
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  #[derive(Debug, Clone, PartialEq)]
  struct Row {
    id: u32,
    stock: i64,
    available: bool,
  }

  #[derive(Debug, Clone, PartialEq)]
  struct RowPatch {
    stock: Option<i64>,
    available: Option<bool>,
  }

  impl Entity for Row {
    type Id = u32;
    type Patch = RowPatch;
    const KIND: &'static str = "row";

    fn id(&self) -> u32 {
      self.id
    }

    fn apply_patch(&mut self, patch: &RowPatch) {
      if let Some(stock) = patch.stock {
        self.stock = stock;
      }
      if let Some(available) = patch.available {
        self.available = available;
      }
    }

    fn validate_patch(patch: &RowPatch) -> ListResult<()> {
      match patch.stock {
        Some(stock) if stock < 0 => Err(ListError::validation("stock must be >= 0")),
        _ => Ok(()),
      }
    }
  }

  fn rows() -> Vec<Row> {
    vec![
      Row {
        id: 1,
        stock: 5,
        available: true,
      },
      Row {
        id: 2,
        stock: 0,
        available: false,
      },
    ]
  }

  fn stock(n: i64) -> RowPatch {
    RowPatch {
      stock: Some(n),
      available: None,
    }
  }

  async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
  }

  #[tokio::test]
  async fn test_failed_commit_restores_snapshot() {
    let mut items = rows();
    let before = items[0].clone();
    let mut mutator = OptimisticMutator::new();

    mutator
      .apply_patch(&mut items, &1, stock(12), async {
        Err(ListError::server(500, "db locked"))
      })
      .unwrap();

    // visible immediately
    assert_eq!(items[0].stock, 12);
    assert!(mutator.is_pending(&1));

    settle().await;
    let outcomes = mutator.poll(Some(&mut items));

    assert_eq!(items[0], before);
    assert_eq!(
      outcomes,
      vec![MutationOutcome::RolledBack {
        id: 1,
        error: ListError::server(500, "db locked"),
      }]
    );
    assert!(!mutator.is_pending(&1));
  }

  #[tokio::test]
  async fn test_successful_commit_keeps_change_and_reconciles() {
    let mut items = rows();
    let mut mutator = OptimisticMutator::new();

    // Local toggle says available; the server reports the authoritative value
    mutator
      .apply(
        &mut items,
        &2,
        |row| row.available = !row.available,
        async {
          Ok(Some(RowPatch {
            stock: None,
            available: Some(false),
          }))
        },
      )
      .unwrap();
    assert!(items[1].available);

    settle().await;
    let outcomes = mutator.poll(Some(&mut items));
    assert_eq!(outcomes, vec![MutationOutcome::Committed(2)]);
    assert!(!items[1].available);
  }

  #[tokio::test]
  async fn test_missing_entity_is_not_found() {
    let mut items = rows();
    let mut mutator = OptimisticMutator::new();

    let err = mutator
      .apply_patch(&mut items, &99, stock(1), async { Ok(None) })
      .unwrap_err();
    assert_eq!(err, ListError::NotFound("row 99".into()));
    assert_eq!(mutator.pending_count(), 0);
  }

  #[tokio::test]
  async fn test_second_mutation_on_same_entity_is_busy() {
    let mut items = rows();
    let mut mutator = OptimisticMutator::new();

    mutator
      .apply_patch(&mut items, &1, stock(8), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(None)
      })
      .unwrap();

    let err = mutator
      .apply_patch(&mut items, &1, stock(9), async { Ok(None) })
      .unwrap_err();
    assert_eq!(err, ListError::Busy("row 1".into()));
    assert_eq!(items[0].stock, 8);

    // a different entity is independent
    mutator
      .apply_patch(&mut items, &2, stock(3), async { Ok(None) })
      .unwrap();
    assert_eq!(mutator.pending_count(), 2);

    tokio::time::sleep(Duration::from_millis(80)).await;
    let outcomes = mutator.poll(Some(&mut items));
    assert_eq!(outcomes.len(), 2);
    assert_eq!(items[0].stock, 8);
    assert_eq!(items[1].stock, 3);
  }

  #[tokio::test]
  async fn test_invalid_patch_is_rejected_before_any_change() {
    let mut items = rows();
    let mut mutator = OptimisticMutator::new();

    let err = mutator
      .apply_patch(&mut items, &1, stock(-4), async { Ok(None) })
      .unwrap_err();
    assert!(matches!(err, ListError::ValidationFailure(_)));
    assert_eq!(items[0].stock, 5);
    assert!(!mutator.is_pending(&1));
  }

  #[tokio::test]
  async fn test_rollback_after_list_replaced_only_clears_bookkeeping() {
    let mut items = rows();
    let mut mutator = OptimisticMutator::new();

    mutator
      .apply_patch(&mut items, &1, stock(12), async {
        Err(ListError::NetworkFailure("reset".into()))
      })
      .unwrap();

    settle().await;
    let outcomes = mutator.poll(None);
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].error().is_some());
    assert!(!mutator.is_pending(&1));
  }

  #[tokio::test]
  async fn test_rollback_keeps_row_refreshed_while_pending() {
    let mut items = rows();
    let mut mutator = OptimisticMutator::new();

    mutator
      .apply_patch(&mut items, &1, stock(12), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Err(ListError::server(500, "db locked"))
      })
      .unwrap();

    // a background refresh lands with newer server data for the row
    let mut refreshed = rows();
    refreshed[0].stock = 7;
    refreshed[0].available = false;
    let expected = refreshed[0].clone();

    settle().await;
    let outcomes = mutator.poll(Some(&mut refreshed));
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].error().is_some());
    assert_eq!(refreshed[0], expected);
  }
}
