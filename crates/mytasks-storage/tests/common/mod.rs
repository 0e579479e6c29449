//! Behaviour every `Store` backend must share.
//!
//! Each function takes a freshly opened, empty store.

#![allow(dead_code)]

use std::time::Duration;

use chrono::NaiveDate;
use mytasks_core::{Priority, Project, ProjectType, Task};
use mytasks_storage::{OpContext, Store};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub async fn add_project<S: Store + ?Sized>(store: &S, name: &str) -> Project {
    store
        .create_project(
            &OpContext::background(),
            &Project::new(name, ProjectType::Project),
        )
        .await
        .expect("Failed to create project")
}

pub async fn add_task<S: Store + ?Sized>(store: &S, project_id: i64, desc: &str) -> Task {
    store
        .create_task(
            &OpContext::background(),
            &Task::new(project_id, desc, Priority::Medium),
        )
        .await
        .expect("Failed to create task")
}

fn ids_of(tasks: &[Task]) -> Vec<i64> {
    tasks.iter().map(|t| t.id).collect()
}

pub async fn project_crud<S: Store + ?Sized>(store: &S) {
    let cx = OpContext::background();

    let mut input = Project::new("Kitchen remodel", ProjectType::Project);
    input.description = "new cabinets".to_string();
    input.target_date = Some(date(2025, 6, 1));
    let created = store.create_project(&cx, &input).await.unwrap();

    assert!(created.id > 0);
    assert_eq!(created.sort_order, 1);
    assert!(!created.completed);
    assert_eq!(created.completed_at, None);

    let fetched = store.get_project(&cx, created.id).await.unwrap();
    assert_eq!(fetched.name, "Kitchen remodel");
    assert_eq!(fetched.description, "new cabinets");
    assert_eq!(fetched.project_type, "project");
    assert_eq!(fetched.target_date, Some(date(2025, 6, 1)));

    let mut edit = fetched.clone();
    edit.name = "Kitchen".to_string();
    edit.target_date = None;
    let updated = store.update_project(&cx, &edit).await.unwrap();
    assert_eq!(updated.name, "Kitchen");
    assert_eq!(updated.target_date, None);
    assert!(updated.updated_at >= fetched.updated_at);

    store.delete_project(&cx, created.id).await.unwrap();
    let err = store.get_project(&cx, created.id).await.unwrap_err();
    assert!(err.is_not_found());
}

pub async fn missing_rows_are_not_found<S: Store + ?Sized>(store: &S) {
    let cx = OpContext::background();

    assert!(store.get_project(&cx, 999).await.unwrap_err().is_not_found());
    assert!(store.get_task(&cx, 999).await.unwrap_err().is_not_found());
    assert!(store.delete_project(&cx, 999).await.unwrap_err().is_not_found());
    assert!(store.delete_task(&cx, 999).await.unwrap_err().is_not_found());
    assert!(store
        .toggle_task_complete(&cx, 999)
        .await
        .unwrap_err()
        .is_not_found());
    assert!(store
        .mark_project_complete(&cx, 999)
        .await
        .unwrap_err()
        .is_not_found());

    let mut ghost = Task::new(999, "orphan", Priority::Low);
    assert!(store.create_task(&cx, &ghost).await.unwrap_err().is_not_found());
    ghost.id = 999;
    assert!(store.update_task(&cx, &ghost).await.unwrap_err().is_not_found());
}

pub async fn sort_order_appends_and_reorders<S: Store + ?Sized>(store: &S) {
    let cx = OpContext::background();
    let project = add_project(store, "Errands").await;

    let a = add_task(store, project.id, "A").await;
    let b = add_task(store, project.id, "B").await;
    let c = add_task(store, project.id, "C").await;
    assert_eq!((a.sort_order, b.sort_order, c.sort_order), (1, 2, 3));

    let listed = store.list_tasks_by_project(&cx, project.id, 0).await.unwrap();
    assert_eq!(ids_of(&listed), vec![a.id, b.id, c.id]);

    store
        .reorder_tasks(&cx, project.id, &[c.id, a.id, b.id])
        .await
        .unwrap();
    let listed = store.list_tasks_by_project(&cx, project.id, 0).await.unwrap();
    assert_eq!(ids_of(&listed), vec![c.id, a.id, b.id]);
    assert_eq!(
        listed.iter().map(|t| t.sort_order).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );

    // Appends continue after the current maximum, not the row count.
    let d = add_task(store, project.id, "D").await;
    assert_eq!(d.sort_order, 4);

    // A positive caller-supplied position is kept.
    let mut pinned = Task::new(project.id, "pinned", Priority::High);
    pinned.sort_order = 10;
    let pinned = store.create_task(&cx, &pinned).await.unwrap();
    assert_eq!(pinned.sort_order, 10);
    assert_eq!(add_task(store, project.id, "E").await.sort_order, 11);

    // Sort order is per project.
    let other = add_project(store, "Other").await;
    assert_eq!(add_task(store, other.id, "first").await.sort_order, 1);
}

pub async fn reorder_projects<S: Store + ?Sized>(store: &S) {
    let cx = OpContext::background();
    let a = add_project(store, "A").await;
    let b = add_project(store, "B").await;
    let c = add_project(store, "C").await;

    store
        .reorder_projects(&cx, &[b.id, c.id, a.id])
        .await
        .unwrap();
    let names: Vec<String> = store
        .list_projects(&cx)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, vec!["B", "C", "A"]);
}

/// Reorder does not insist on a permutation of the project's tasks.
pub async fn reorder_is_lenient<S: Store + ?Sized>(store: &S) {
    let cx = OpContext::background();
    let project = add_project(store, "Lenient").await;
    let other = add_project(store, "Elsewhere").await;

    let a = add_task(store, project.id, "A").await;
    let b = add_task(store, project.id, "B").await;
    let c = add_task(store, project.id, "C").await;
    let foreign = add_task(store, other.id, "foreign").await;

    // Partial list with an unknown id and a task from another project.
    store
        .reorder_tasks(&cx, project.id, &[c.id, 4242, foreign.id])
        .await
        .unwrap();

    assert_eq!(store.get_task(&cx, c.id).await.unwrap().sort_order, 1);
    assert_eq!(store.get_task(&cx, a.id).await.unwrap().sort_order, 1);
    assert_eq!(store.get_task(&cx, b.id).await.unwrap().sort_order, 2);
    assert_eq!(store.get_task(&cx, foreign.id).await.unwrap().sort_order, 1);

    // Ties fall back to insertion order.
    let listed = store.list_tasks_by_project(&cx, project.id, 0).await.unwrap();
    assert_eq!(ids_of(&listed), vec![a.id, c.id, b.id]);

    // A repeated id ends at its last position.
    store
        .reorder_tasks(&cx, project.id, &[a.id, b.id, a.id])
        .await
        .unwrap();
    assert_eq!(store.get_task(&cx, a.id).await.unwrap().sort_order, 3);

    // Empty list is a no-op.
    store.reorder_tasks(&cx, project.id, &[]).await.unwrap();
}

pub async fn delete_project_cascades<S: Store + ?Sized>(store: &S) {
    let cx = OpContext::background();
    let doomed = add_project(store, "Doomed").await;
    let kept = add_project(store, "Kept").await;

    let t1 = add_task(store, doomed.id, "one").await;
    let t2 = add_task(store, doomed.id, "two").await;
    let survivor = add_task(store, kept.id, "survivor").await;

    store.delete_project(&cx, doomed.id).await.unwrap();

    assert!(store.get_task(&cx, t1.id).await.unwrap_err().is_not_found());
    assert!(store.get_task(&cx, t2.id).await.unwrap_err().is_not_found());
    assert!(store
        .list_tasks_by_project(&cx, doomed.id, 0)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        store.get_task(&cx, survivor.id).await.unwrap().description,
        "survivor"
    );
}

pub async fn toggle_twice_restores<S: Store + ?Sized>(store: &S) {
    let cx = OpContext::background();
    let project = add_project(store, "Toggle").await;
    let task = add_task(store, project.id, "flip").await;

    let done = store.toggle_task_complete(&cx, task.id).await.unwrap();
    assert!(done.completed);
    assert_eq!(done.completed_at, Some(mytasks_core::today()));

    let undone = store.toggle_task_complete(&cx, task.id).await.unwrap();
    assert!(!undone.completed);
    assert_eq!(undone.completed_at, None);
    assert_eq!(undone.description, task.description);
    assert_eq!(undone.sort_order, task.sort_order);
}

pub async fn update_task_completion_rules<S: Store + ?Sized>(store: &S) {
    let cx = OpContext::background();
    let project = add_project(store, "Rules").await;
    let task = add_task(store, project.id, "rules").await;

    let mut edit = task.clone();
    edit.completed = true;
    let done = store.update_task(&cx, &edit).await.unwrap();
    assert_eq!(done.completed_at, Some(mytasks_core::today()));

    // Complete -> complete with a supplied date keeps the supplied date.
    let mut edit = done.clone();
    edit.completed_at = Some(date(2025, 1, 15));
    let redated = store.update_task(&cx, &edit).await.unwrap();
    assert_eq!(redated.completed_at, Some(date(2025, 1, 15)));

    // Complete -> complete without one keeps the stored date.
    let mut edit = redated.clone();
    edit.completed_at = None;
    edit.notes = Some("kept".to_string());
    let kept = store.update_task(&cx, &edit).await.unwrap();
    assert_eq!(kept.completed_at, Some(date(2025, 1, 15)));
    assert_eq!(kept.notes.as_deref(), Some("kept"));

    let mut edit = kept.clone();
    edit.completed = false;
    edit.completed_at = Some(date(2025, 1, 15));
    let reopened = store.update_task(&cx, &edit).await.unwrap();
    assert!(!reopened.completed);
    assert_eq!(reopened.completed_at, None);
}

pub async fn project_completion<S: Store + ?Sized>(store: &S) {
    let cx = OpContext::background();
    let project = add_project(store, "Finish me").await;

    // Incomplete -> incomplete is a no-op that still succeeds.
    store.mark_project_incomplete(&cx, project.id).await.unwrap();
    store.mark_project_incomplete(&cx, project.id).await.unwrap();
    let fetched = store.get_project(&cx, project.id).await.unwrap();
    assert!(!fetched.completed);
    assert_eq!(fetched.completed_at, None);

    store.mark_project_complete(&cx, project.id).await.unwrap();
    let fetched = store.get_project(&cx, project.id).await.unwrap();
    assert!(fetched.completed);
    assert_eq!(fetched.completed_at, Some(mytasks_core::today()));

    store.mark_project_complete(&cx, project.id).await.unwrap();
    let again = store.get_project(&cx, project.id).await.unwrap();
    assert_eq!(again.completed_at, fetched.completed_at);

    store.mark_project_incomplete(&cx, project.id).await.unwrap();
    let reopened = store.get_project(&cx, project.id).await.unwrap();
    assert!(!reopened.completed);
    assert_eq!(reopened.completed_at, None);
}

pub async fn filtered_listing_and_limits<S: Store + ?Sized>(store: &S) {
    let cx = OpContext::background();
    let project = add_project(store, "Lists").await;

    let mut tasks = Vec::new();
    for i in 0..5 {
        tasks.push(add_task(store, project.id, &format!("task {}", i)).await);
    }
    store.toggle_task_complete(&cx, tasks[1].id).await.unwrap();
    store.toggle_task_complete(&cx, tasks[3].id).await.unwrap();

    let open = store
        .list_tasks_by_project_filtered(&cx, project.id, false, 0)
        .await
        .unwrap();
    assert_eq!(ids_of(&open), vec![tasks[0].id, tasks[2].id, tasks[4].id]);

    let done = store
        .list_tasks_by_project_filtered(&cx, project.id, true, 0)
        .await
        .unwrap();
    assert_eq!(ids_of(&done), vec![tasks[1].id, tasks[3].id]);

    let first_two = store
        .list_tasks_by_project_filtered(&cx, project.id, false, 2)
        .await
        .unwrap();
    assert_eq!(ids_of(&first_two), vec![tasks[0].id, tasks[2].id]);

    assert_eq!(
        store
            .list_tasks_by_project(&cx, project.id, 3)
            .await
            .unwrap()
            .len(),
        3
    );
    assert_eq!(
        store
            .list_tasks_by_project(&cx, project.id, 0)
            .await
            .unwrap()
            .len(),
        5
    );

    let today = mytasks_core::today();
    let completed_today = store
        .list_tasks_completed_between(&cx, project.id, Some(today), Some(today), 1)
        .await
        .unwrap();
    assert_eq!(completed_today.len(), 1);
}

pub async fn task_fields_round_trip<S: Store + ?Sized>(store: &S) {
    let cx = OpContext::background();
    let project = add_project(store, "Dates").await;

    let mut input = Task::new(project.id, "file taxes", Priority::High);
    input.notes = Some("bring receipts".to_string());
    input.due_date = Some(date(2025, 2, 5));
    let created = store.create_task(&cx, &input).await.unwrap();

    let fetched = store.get_task(&cx, created.id).await.unwrap();
    assert_eq!(fetched.due_date, Some(date(2025, 2, 5)));
    assert_eq!(fetched.priority, "high");
    assert_eq!(fetched.notes.as_deref(), Some("bring receipts"));
    assert_eq!(fetched.project_id, project.id);
    assert!(!fetched.completed);

    // Created already complete: completion date defaults to today.
    let mut finished = Task::new(project.id, "already done", Priority::Low);
    finished.completed = true;
    let finished = store.create_task(&cx, &finished).await.unwrap();
    assert_eq!(finished.completed_at, Some(mytasks_core::today()));
}

pub async fn expired_deadline_writes_nothing<S: Store + ?Sized>(store: &S) {
    let project = add_project(store, "Deadline").await;
    let a = add_task(store, project.id, "A").await;
    let b = add_task(store, project.id, "B").await;

    let expired = OpContext::with_timeout(Duration::ZERO);

    let err = store
        .create_task(&expired, &Task::new(project.id, "late", Priority::Low))
        .await
        .unwrap_err();
    assert!(err.is_deadline_exceeded());

    let err = store
        .reorder_tasks(&expired, project.id, &[b.id, a.id])
        .await
        .unwrap_err();
    assert!(err.is_deadline_exceeded());

    let cx = OpContext::background();
    let listed = store.list_tasks_by_project(&cx, project.id, 0).await.unwrap();
    assert_eq!(ids_of(&listed), vec![a.id, b.id]);
}

pub async fn close_is_idempotent<S: Store + ?Sized>(store: &S) {
    store.close().await.unwrap();
    store.close().await.unwrap();

    let err = store
        .list_projects(&OpContext::background())
        .await
        .unwrap_err();
    assert!(matches!(err, mytasks_storage::DbError::Closed));
}
