use super::*;
use crate::models::RecurrenceInfo;
use crate::store::test_support::{plain_task_store, task_store_with_policies};
use crate::time::MinuteClock;
use chrono::Duration;

fn recurrence(
    basis: RecurrenceBasis,
    effect: RecurrenceEffect,
    days: u32,
) -> RecurrenceInfo {
    RecurrenceInfo {
        frequency: RecurrenceFrequency::EveryXDays { x: days },
        recurrence_basis: basis,
        recurrence_effect: effect,
    }
}

fn recurring_task(basis: RecurrenceBasis, effect: RecurrenceEffect) -> Task {
    let mut task = Task::new("user-1", "Recurring");
    task.recurrence_info = Some(recurrence(basis, effect, 1));
    task
}

fn service_for_test() -> (
    Arc<RecurrenceService>,
    MinuteClock,
    AppVisibility,
    mpsc::UnboundedReceiver<()>,
) {
    let clock = MinuteClock::new();
    let visibility = AppVisibility::new(true);
    let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();
    let service = RecurrenceService::new(clock.subscribe(), visibility.clone(), refresh_tx);
    (service, clock, visibility, refresh_rx)
}

#[test]
fn test_next_recurrence_date_follows_basis() {
    let now = Utc::now();
    let mut task = recurring_task(RecurrenceBasis::DueDate, RecurrenceEffect::RollOnBasis);
    task.start_date = Some(now - Duration::days(3));
    task.due_date = Some(now - Duration::days(1));

    assert_eq!(
        RecurrenceService::next_recurrence_date(&task),
        Some(now - Duration::days(1) + Duration::days(1))
    );

    task.recurrence_info = Some(recurrence(
        RecurrenceBasis::StartDate,
        RecurrenceEffect::RollOnBasis,
        1,
    ));
    assert_eq!(
        RecurrenceService::next_recurrence_date(&task),
        Some(now - Duration::days(3) + Duration::days(1))
    );
}

#[test]
fn test_next_recurrence_date_none_cases() {
    // No descriptor at all.
    let plain = Task::new("user-1", "plain");
    assert_eq!(RecurrenceService::next_recurrence_date(&plain), None);

    // Completion-driven recurrence has no calendar trigger.
    let mut on_completion =
        recurring_task(RecurrenceBasis::DueDate, RecurrenceEffect::RollOnCompletion);
    on_completion.due_date = Some(Utc::now());
    assert_eq!(RecurrenceService::next_recurrence_date(&on_completion), None);

    // Anchor unset.
    let unanchored = recurring_task(RecurrenceBasis::DueDate, RecurrenceEffect::RollOnBasis);
    assert_eq!(RecurrenceService::next_recurrence_date(&unanchored), None);
}

#[test]
fn test_next_recurrence_date_uses_parent_snapshot_for_children() {
    let snapshot_due = Utc::now() - Duration::days(5);
    let mut child = recurring_task(RecurrenceBasis::DueDate, RecurrenceEffect::RollOnBasis);
    // The child's own date would give a different answer.
    child.due_date = Some(Utc::now() + Duration::days(30));
    child.parent_recurring_task_info = Some(ParentRecurringTaskInfo {
        task_id: "root".to_string(),
        start_date: None,
        due_date: Some(snapshot_due),
    });

    assert_eq!(
        RecurrenceService::next_recurrence_date(&child),
        Some(snapshot_due + Duration::days(1))
    );
}

#[test]
fn test_simulated_next_recurrence_date_leaves_task_untouched() {
    let task = Task::new("user-1", "plain");
    let due = Utc::now() + Duration::days(4);

    let simulated = RecurrenceService::simulated_next_recurrence_date(&task, |mut t| {
        t.recurrence_info = Some(recurrence(
            RecurrenceBasis::DueDate,
            RecurrenceEffect::RollOnBasis,
            2,
        ));
        t.due_date = Some(due);
        t
    });

    assert_eq!(simulated, Some(due + Duration::days(2)));
    assert!(task.recurrence_info.is_none());
    assert!(task.due_date.is_none());
}

#[test]
fn test_task_should_recur() {
    // Completion-driven: recurs exactly when completed.
    let mut on_completion =
        recurring_task(RecurrenceBasis::DueDate, RecurrenceEffect::RollOnCompletion);
    assert!(!RecurrenceService::task_should_recur(&on_completion));
    on_completion.completed = true;
    assert!(RecurrenceService::task_should_recur(&on_completion));

    // Calendar-driven: recurs once the next date is in the past.
    let mut due_based = recurring_task(RecurrenceBasis::DueDate, RecurrenceEffect::RollOnBasis);
    due_based.due_date = Some(Utc::now() - Duration::days(2));
    assert!(RecurrenceService::task_should_recur(&due_based));
    due_based.due_date = Some(Utc::now() + Duration::days(2));
    assert!(!RecurrenceService::task_should_recur(&due_based));

    // Children never trigger on their own.
    let mut child = recurring_task(RecurrenceBasis::DueDate, RecurrenceEffect::RollOnBasis);
    child.due_date = Some(Utc::now() - Duration::days(2));
    child.parent_recurring_task_info = Some(ParentRecurringTaskInfo {
        task_id: "root".to_string(),
        start_date: None,
        due_date: Some(Utc::now() - Duration::days(2)),
    });
    assert!(!RecurrenceService::task_should_recur(&child));

    // No descriptor.
    assert!(!RecurrenceService::task_should_recur(&Task::new(
        "user-1", "plain"
    )));
}

#[test]
fn test_catch_up_rolls_basis_into_future() {
    let mut task = recurring_task(RecurrenceBasis::DueDate, RecurrenceEffect::RollOnBasis);
    task.due_date = Some(Utc::now() - Duration::days(10));

    RecurrenceService::roll_dates_forward(&mut task);

    let rolled_due = task.due_date.unwrap();
    assert!(rolled_due >= Utc::now() - Duration::minutes(1));

    // With the basis already in the future, only the unconditional single
    // step applies; the catch-up loop is a no-op.
    RecurrenceService::roll_dates_forward(&mut task);
    assert_eq!(task.due_date.unwrap(), rolled_due + Duration::days(1));
}

#[test]
fn test_roll_dates_forward_stack_is_single_step() {
    let mut task = recurring_task(RecurrenceBasis::DueDate, RecurrenceEffect::Stack);
    let original_due = Utc::now() - Duration::days(10);
    task.due_date = Some(original_due);

    RecurrenceService::roll_dates_forward(&mut task);

    // Stack never catch-up loops.
    assert_eq!(task.due_date.unwrap(), original_due + Duration::days(1));
}

#[test]
fn test_roll_dates_forward_advances_both_dates() {
    let mut task = recurring_task(RecurrenceBasis::DueDate, RecurrenceEffect::RollOnBasis);
    let start = Utc::now() + Duration::days(1);
    let due = Utc::now() + Duration::days(2);
    task.start_date = Some(start);
    task.due_date = Some(due);

    RecurrenceService::roll_dates_forward(&mut task);

    assert_eq!(task.start_date.unwrap(), start + Duration::days(1));
    assert_eq!(task.due_date.unwrap(), due + Duration::days(1));
}

#[tokio::test]
async fn test_stack_recurrence_duplicates_and_strips_original() {
    let (store, _persistence) = plain_task_store();
    let mut root = recurring_task(RecurrenceBasis::DueDate, RecurrenceEffect::Stack);
    let original_due = Utc::now() - Duration::days(3);
    root.due_date = Some(original_due);
    let mut child = Task::new("user-1", "Step");
    child.parent_task_id = Some(root.id.clone());
    child.recurrence_info = root.recurrence_info.clone();
    child.parent_recurring_task_info = Some(ParentRecurringTaskInfo {
        task_id: root.id.clone(),
        start_date: None,
        due_date: root.due_date,
    });

    store.add_doc(root.clone()).await;
    store.add_doc(child.clone()).await;

    let map = store.get_map();
    RecurrenceService::execute_recurrence_for_task(&root, &map, &store).await;

    let map = store.get_map();
    assert_eq!(map.len(), 4);

    // The original keeps its ID and dates but loses recurrence ownership.
    let original = map.get(&root.id).unwrap();
    assert_eq!(original.due_date, Some(original_due));
    assert!(original.recurrence_info.is_none());
    assert!(original.parent_recurring_task_info.is_none());
    let original_child = map.get(&child.id).unwrap();
    assert!(original_child.recurrence_info.is_none());

    // Exactly one new subtree: advanced dates, completed per policy, and
    // the newest root instance carries the recurrence forward.
    let new_root = map
        .values()
        .find(|t| t.id != root.id && t.parent_task_id.is_none())
        .unwrap();
    assert!(new_root.completed);
    assert!(new_root.is_recurrence_root());
    assert_eq!(new_root.due_date, Some(original_due + Duration::days(1)));
    let new_child = map
        .values()
        .find(|t| t.parent_task_id.as_deref() == Some(new_root.id.as_str()))
        .unwrap();
    assert!(new_child.completed);
}

#[tokio::test]
async fn test_roll_on_basis_rolls_subtree_and_resets_completed() {
    let (store, _persistence) = plain_task_store();
    let mut root = recurring_task(RecurrenceBasis::DueDate, RecurrenceEffect::RollOnBasis);
    root.due_date = Some(Utc::now() - Duration::days(2));
    root.completed = true;
    let mut child = Task::new("user-1", "Step");
    child.parent_task_id = Some(root.id.clone());
    child.completed = true;

    store.add_doc(root.clone()).await;
    store.add_doc(child.clone()).await;

    let map = store.get_map();
    RecurrenceService::execute_recurrence_for_task(&root, &map, &store).await;

    let map = store.get_map();
    assert_eq!(map.len(), 2);
    let rolled_root = map.get(&root.id).unwrap();
    assert!(!rolled_root.completed);
    assert!(rolled_root.due_date.unwrap() >= Utc::now() - Duration::minutes(1));
    assert!(!map.get(&child.id).unwrap().completed);
}

#[tokio::test]
async fn test_time_subscription_lifecycle() {
    let (service, _clock, _visibility, _refresh_rx) = service_for_test();
    let mut root = recurring_task(RecurrenceBasis::DueDate, RecurrenceEffect::RollOnBasis);
    root.due_date = Some(Utc::now() + Duration::days(1));

    service.update_or_remove_time_subscription(&root);
    assert_eq!(service.active_subscription_count(), 1);

    // Installing again replaces rather than leaks.
    service.update_or_remove_time_subscription(&root);
    assert_eq!(service.active_subscription_count(), 1);

    service.remove_time_subscription(&root.id);
    assert_eq!(service.active_subscription_count(), 0);

    // Children and completion-driven roots get no subscription.
    let mut child = root.clone();
    child.parent_recurring_task_info = Some(ParentRecurringTaskInfo {
        task_id: "other".to_string(),
        start_date: None,
        due_date: None,
    });
    service.update_or_remove_time_subscription(&child);
    let on_completion =
        recurring_task(RecurrenceBasis::DueDate, RecurrenceEffect::RollOnCompletion);
    service.update_or_remove_time_subscription(&on_completion);
    assert_eq!(service.active_subscription_count(), 0);

    let map = crate::models::map_from_docs(vec![root, on_completion]);
    service.rebuild_time_subscriptions(&map);
    assert_eq!(service.active_subscription_count(), 1);
}

#[tokio::test]
async fn test_subscription_tick_requests_refresh_only_when_visible() {
    let (service, clock, visibility, mut refresh_rx) = service_for_test();
    let mut root = recurring_task(RecurrenceBasis::DueDate, RecurrenceEffect::RollOnBasis);
    root.due_date = Some(Utc::now() - Duration::days(2));
    service.update_or_remove_time_subscription(&root);

    visibility.set(false);
    clock.tick(Utc::now());
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(refresh_rx.try_recv().is_err());

    visibility.set(true);
    clock.tick(Utc::now());
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(refresh_rx.try_recv().is_ok());
}

#[tokio::test]
async fn test_validate_doc_update_propagates_linkage_to_children() {
    let (service, _clock, _visibility, _refresh_rx) = service_for_test();
    let (store, _persistence) = task_store_with_policies(vec![service.policy()]);

    let root = Task::new("user-1", "root");
    let mut child = Task::new("user-1", "child");
    child.parent_task_id = Some(root.id.clone());
    store.add_doc(root.clone()).await;
    store.add_doc(child.clone()).await;

    // Attach a future-dated recurrence descriptor to the root.
    let info = recurrence(RecurrenceBasis::DueDate, RecurrenceEffect::RollOnBasis, 1);
    let future_due = Utc::now() + Duration::days(7);
    let attached_info = info.clone();
    store
        .update_doc(&root.id, move |mut t| {
            t.due_date = Some(future_due);
            t.recurrence_info = Some(attached_info);
            t
        })
        .await;

    // The child now carries the descriptor plus the back-reference.
    let stored_child = store.get_doc(&child.id).unwrap();
    assert_eq!(stored_child.recurrence_info, Some(info));
    let link = stored_child.parent_recurring_task_info.unwrap();
    assert_eq!(link.task_id, root.id);
}

#[tokio::test]
async fn test_validate_doc_update_executes_due_recurrence() {
    let (service, _clock, _visibility, _refresh_rx) = service_for_test();
    let (store, _persistence) = task_store_with_policies(vec![service.policy()]);

    let mut root = recurring_task(RecurrenceBasis::DueDate, RecurrenceEffect::RollOnBasis);
    let original_due = Utc::now() + Duration::hours(1);
    root.due_date = Some(original_due);
    root.completed = true;
    store.add_doc(root.clone()).await;

    // Editing the due date into the past makes the task immediately due;
    // the single-document path short-circuits into the roll-forward.
    store
        .update_doc(&root.id, move |mut t| {
            t.due_date = Some(Utc::now() - Duration::days(2));
            t
        })
        .await;

    let rolled = store.get_doc(&root.id).unwrap();
    assert!(!rolled.completed);
    assert_eq!(rolled.due_date, Some(original_due + Duration::days(1)));
}
