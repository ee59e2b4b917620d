use chrono::{DateTime, Duration, TimeZone, Utc};
use dodo_core::db::open_db_in_memory;
use dodo_core::{
    Action, ActionId, ActionRepository, ActionStore, ActionUpdate, Clock, FocusPresenter,
    RepoError, RepoResult, SqliteActionRepository, StoreError, StoreState,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

struct TestClock(Rc<Cell<DateTime<Utc>>>);

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        self.0.get()
    }
}

struct RecordingPresenter(Rc<RefCell<Vec<String>>>);

impl FocusPresenter for RecordingPresenter {
    fn focus_started(&mut self, action: &Action, _started_at: DateTime<Utc>) {
        self.0.borrow_mut().push(format!("start:{}", action.id));
    }

    fn focus_ended(&mut self, id: ActionId) {
        self.0.borrow_mut().push(format!("end:{id}"));
    }
}

/// Repository wrapper whose writes can be failed on demand.
struct FlakyRepo<'conn> {
    inner: SqliteActionRepository<'conn>,
    fail_writes: Rc<Cell<bool>>,
}

impl FlakyRepo<'_> {
    fn injected_failure() -> RepoError {
        RepoError::InvalidData("injected write failure".to_string())
    }
}

impl ActionRepository for FlakyRepo<'_> {
    fn load_all(&self) -> RepoResult<Vec<Action>> {
        self.inner.load_all()
    }

    fn upsert(&self, action: &Action) -> RepoResult<()> {
        if self.fail_writes.get() {
            return Err(Self::injected_failure());
        }
        self.inner.upsert(action)
    }

    fn patch(
        &self,
        id: ActionId,
        patch: &dodo_core::ActionPatch,
    ) -> RepoResult<()> {
        if self.fail_writes.get() {
            return Err(Self::injected_failure());
        }
        self.inner.patch(id, patch)
    }

    fn remove(&self, id: ActionId) -> RepoResult<()> {
        if self.fail_writes.get() {
            return Err(Self::injected_failure());
        }
        self.inner.remove(id)
    }

    fn upsert_many(&self, actions: &[Action]) -> RepoResult<()> {
        if self.fail_writes.get() {
            return Err(Self::injected_failure());
        }
        self.inner.upsert_many(actions)
    }
}

fn ready_store(conn: &rusqlite::Connection) -> ActionStore<SqliteActionRepository<'_>> {
    let mut store = ActionStore::new(SqliteActionRepository::try_new(conn).unwrap());
    store.init().unwrap();
    store
}

fn active_names(store: &ActionStore<impl ActionRepository>) -> Vec<String> {
    store
        .active_actions()
        .iter()
        .map(|action| action.name.clone())
        .collect()
}

fn assert_dense_orders(store: &ActionStore<impl ActionRepository>) {
    let orders: Vec<i64> = store
        .active_actions()
        .iter()
        .map(|action| action.order)
        .collect();
    let expected: Vec<i64> = (0..orders.len() as i64).collect();
    assert_eq!(orders, expected);
}

#[test]
fn mutations_before_init_fail_with_not_ready() {
    let conn = open_db_in_memory().unwrap();
    let mut store = ActionStore::new(SqliteActionRepository::try_new(&conn).unwrap());

    assert_eq!(store.state(), StoreState::Uninitialized);
    assert!(store.is_loading());
    let err = store.create("too early", None, None).unwrap_err();
    assert!(matches!(err, StoreError::NotReady));
}

#[test]
fn init_loads_persisted_actions_in_order() {
    let conn = open_db_in_memory().unwrap();
    {
        let mut store = ready_store(&conn);
        store.create("a", None, None).unwrap();
        store.create("b", None, None).unwrap();
    }

    let mut reloaded = ActionStore::new(SqliteActionRepository::try_new(&conn).unwrap());
    reloaded.init().unwrap();
    assert_eq!(reloaded.state(), StoreState::Ready);
    assert!(!reloaded.is_loading());
    assert_eq!(active_names(&reloaded), vec!["a", "b"]);
    assert_dense_orders(&reloaded);
}

#[test]
fn create_appends_with_dense_orders() {
    let conn = open_db_in_memory().unwrap();
    let mut store = ready_store(&conn);

    store.create("a", None, None).unwrap();
    store.create("b", Some("with notes".to_string()), None).unwrap();
    store.create("c", None, None).unwrap();

    assert_eq!(active_names(&store), vec!["a", "b", "c"]);
    assert_dense_orders(&store);

    let created = &store.active_actions()[0];
    assert!(created.completed_at.is_none());
    assert!(created.focused_at.is_none());
    assert!(created.time_spent.is_none());
}

#[test]
fn create_with_index_inserts_mid_list_and_renumbers() {
    let conn = open_db_in_memory().unwrap();
    let mut store = ready_store(&conn);

    store.create("a", None, None).unwrap();
    store.create("b", None, None).unwrap();
    store.create("x", None, Some(1)).unwrap();

    assert_eq!(active_names(&store), vec!["a", "x", "b"]);
    assert_dense_orders(&store);

    // Out-of-range insert index falls back to append.
    store.create("z", None, Some(99)).unwrap();
    assert_eq!(active_names(&store), vec!["a", "x", "b", "z"]);
    assert_dense_orders(&store);
}

#[test]
fn create_rejects_whitespace_name_without_state_change() {
    let conn = open_db_in_memory().unwrap();
    let mut store = ready_store(&conn);

    let err = store.create("   ", None, None).unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
    assert!(store.actions().is_empty());
}

#[test]
fn create_trims_name() {
    let conn = open_db_in_memory().unwrap();
    let mut store = ready_store(&conn);

    store.create("  padded  ", None, None).unwrap();
    assert_eq!(active_names(&store), vec!["padded"]);
}

#[test]
fn update_merges_name_and_notes_only() {
    let conn = open_db_in_memory().unwrap();
    let mut store = ready_store(&conn);

    let id = store.create("before", Some("keep".to_string()), None).unwrap();
    store
        .update(
            id,
            ActionUpdate {
                name: Some("after".to_string()),
                ..ActionUpdate::default()
            },
        )
        .unwrap();

    let action = &store.active_actions()[0];
    assert_eq!(action.name, "after");
    assert_eq!(action.notes.as_deref(), Some("keep"));

    store
        .update(
            id,
            ActionUpdate {
                notes: Some(None),
                ..ActionUpdate::default()
            },
        )
        .unwrap();
    assert!(store.active_actions()[0].notes.is_none());
}

#[test]
fn update_unknown_id_fails_with_not_found() {
    let conn = open_db_in_memory().unwrap();
    let mut store = ready_store(&conn);

    let ghost = Action::new("ghost", None);
    let err = store.update(ghost.id, ActionUpdate::default()).unwrap_err();
    assert!(matches!(err, StoreError::NotFound(id) if id == ghost.id));
}

#[test]
fn reorder_then_complete_scenario() {
    let conn = open_db_in_memory().unwrap();
    let mut store = ready_store(&conn);

    let _a = store.create("A", None, None).unwrap();
    let b = store.create("B", None, None).unwrap();
    let _c = store.create("C", None, None).unwrap();

    store.reorder(0, 2).unwrap();
    assert_eq!(active_names(&store), vec!["B", "C", "A"]);
    assert_dense_orders(&store);

    // Completion removes B from the active subset without renumbering the
    // remaining actions (documented policy: gaps persist until the next
    // reorder/restore/create-with-index).
    store.complete(b).unwrap();
    assert_eq!(active_names(&store), vec!["C", "A"]);
    let orders: Vec<i64> = store
        .active_actions()
        .iter()
        .map(|action| action.order)
        .collect();
    assert_eq!(orders, vec![1, 2]);

    let completed = store.completed_actions();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].id, b);
    assert!(completed[0].completed_at.is_some());
}

#[test]
fn reorder_rejects_bad_from_index() {
    let conn = open_db_in_memory().unwrap();
    let mut store = ready_store(&conn);
    store.create("only", None, None).unwrap();

    let err = store.reorder(5, 0).unwrap_err();
    assert!(matches!(err, StoreError::IndexOutOfRange { index: 5, len: 1 }));
    assert_eq!(active_names(&store), vec!["only"]);
}

#[test]
fn delete_tolerates_gaps_until_next_reorder() {
    let conn = open_db_in_memory().unwrap();
    let mut store = ready_store(&conn);

    store.create("a", None, None).unwrap();
    let b = store.create("b", None, None).unwrap();
    store.create("c", None, None).unwrap();

    store.delete(b).unwrap();
    let orders: Vec<i64> = store
        .active_actions()
        .iter()
        .map(|action| action.order)
        .collect();
    assert_eq!(orders, vec![0, 2]);

    store.reorder(0, 0).unwrap();
    assert_dense_orders(&store);
}

#[test]
fn delete_unknown_id_fails_with_not_found() {
    let conn = open_db_in_memory().unwrap();
    let mut store = ready_store(&conn);

    let ghost = Action::new("ghost", None);
    let err = store.delete(ghost.id).unwrap_err();
    assert!(matches!(err, StoreError::NotFound(id) if id == ghost.id));
}

#[test]
fn restore_returns_action_to_end_of_active_list() {
    let conn = open_db_in_memory().unwrap();
    let mut store = ready_store(&conn);

    let a = store.create("a", None, None).unwrap();
    store.create("b", None, None).unwrap();
    store.create("c", None, None).unwrap();

    store.complete(a).unwrap();
    store.restore(a).unwrap();

    // Restored items go to the end, never back to their original position.
    assert_eq!(active_names(&store), vec!["b", "c", "a"]);
    let restored = store.active_actions().pop().unwrap();
    assert!(restored.completed_at.is_none());
    assert!(restored.focused_at.is_none());
    assert!(restored.time_spent.is_none());
}

#[test]
fn focus_then_complete_settles_time_spent() {
    let conn = open_db_in_memory().unwrap();
    let now = Rc::new(Cell::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()));
    let mut store = ActionStore::with_parts(
        SqliteActionRepository::try_new(&conn).unwrap(),
        Box::new(dodo_core::NoopFocusPresenter),
        Box::new(TestClock(now.clone())),
    );
    store.init().unwrap();

    let a = store.create("A", None, None).unwrap();
    store.focus(a).unwrap();
    assert_eq!(store.elapsed_focus_seconds(a), Some(0));

    now.set(now.get() + Duration::seconds(5));
    assert_eq!(store.elapsed_focus_seconds(a), Some(5));

    store.complete(a).unwrap();
    let completed = &store.completed_actions()[0];
    assert_eq!(completed.time_spent, Some(5));
    assert!(completed.focused_at.is_none());
    assert!(store.elapsed_focus_seconds(a).is_none());
}

#[test]
fn unfocus_discards_elapsed_time() {
    let conn = open_db_in_memory().unwrap();
    let now = Rc::new(Cell::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()));
    let mut store = ActionStore::with_parts(
        SqliteActionRepository::try_new(&conn).unwrap(),
        Box::new(dodo_core::NoopFocusPresenter),
        Box::new(TestClock(now.clone())),
    );
    store.init().unwrap();

    let a = store.create("A", None, None).unwrap();
    store.focus(a).unwrap();
    now.set(now.get() + Duration::seconds(30));
    store.unfocus(a).unwrap();

    let action = &store.active_actions()[0];
    assert!(action.focused_at.is_none());
    assert!(action.time_spent.is_none());

    now.set(now.get() + Duration::seconds(5));
    store.complete(a).unwrap();
    assert!(store.completed_actions()[0].time_spent.is_none());
}

#[test]
fn focus_on_completed_action_is_silent_no_op() {
    let conn = open_db_in_memory().unwrap();
    let mut store = ready_store(&conn);

    let a = store.create("A", None, None).unwrap();
    store.complete(a).unwrap();
    store.focus(a).unwrap();

    assert!(store.completed_actions()[0].focused_at.is_none());
}

#[test]
fn focus_and_completion_are_mutually_exclusive_after_every_operation() {
    let conn = open_db_in_memory().unwrap();
    let mut store = ready_store(&conn);

    let a = store.create("A", None, None).unwrap();
    store.focus(a).unwrap();
    store.complete(a).unwrap();
    store.restore(a).unwrap();
    store.focus(a).unwrap();
    store.unfocus(a).unwrap();

    for action in store.actions() {
        assert!(
            !(action.focused_at.is_some() && action.completed_at.is_some()),
            "focused_at and completed_at are both set for {}",
            action.id
        );
    }
}

#[test]
fn presenter_hooks_fire_exactly_once_per_focus_session() {
    let conn = open_db_in_memory().unwrap();
    let events = Rc::new(RefCell::new(Vec::new()));
    let mut store = ActionStore::with_presenter(
        SqliteActionRepository::try_new(&conn).unwrap(),
        Box::new(RecordingPresenter(events.clone())),
    );
    store.init().unwrap();

    let a = store.create("A", None, None).unwrap();
    store.focus(a).unwrap();
    store.focus(a).unwrap(); // already focused: no second start
    store.complete(a).unwrap();
    store.complete(a).unwrap(); // already completed: no second end

    assert_eq!(
        *events.borrow(),
        vec![format!("start:{a}"), format!("end:{a}")]
    );
}

#[test]
fn delete_of_focused_action_ends_presentation_first() {
    let conn = open_db_in_memory().unwrap();
    let events = Rc::new(RefCell::new(Vec::new()));
    let mut store = ActionStore::with_presenter(
        SqliteActionRepository::try_new(&conn).unwrap(),
        Box::new(RecordingPresenter(events.clone())),
    );
    store.init().unwrap();

    let a = store.create("A", None, None).unwrap();
    store.focus(a).unwrap();
    store.delete(a).unwrap();

    assert_eq!(
        *events.borrow(),
        vec![format!("start:{a}"), format!("end:{a}")]
    );
    assert!(store.actions().is_empty());
}

#[test]
fn focus_session_surviving_a_restart_still_gets_its_end_hook() {
    let conn = open_db_in_memory().unwrap();
    let a;
    {
        let mut store = ready_store(&conn);
        a = store.create("A", None, None).unwrap();
        store.focus(a).unwrap();
    }

    // A fresh store over the same database owes the teardown hook for the
    // focus session it loaded, even though it never saw the start.
    let events = Rc::new(RefCell::new(Vec::new()));
    let mut reloaded = ActionStore::with_presenter(
        SqliteActionRepository::try_new(&conn).unwrap(),
        Box::new(RecordingPresenter(events.clone())),
    );
    reloaded.init().unwrap();
    assert!(reloaded.active_actions()[0].focused_at.is_some());

    reloaded.complete(a).unwrap();
    assert_eq!(*events.borrow(), vec![format!("end:{a}")]);
}

#[test]
fn failed_reorder_write_leaves_published_collection_unchanged() {
    let conn = open_db_in_memory().unwrap();
    let fail_writes = Rc::new(Cell::new(false));
    let repo = FlakyRepo {
        inner: SqliteActionRepository::try_new(&conn).unwrap(),
        fail_writes: fail_writes.clone(),
    };
    let mut store = ActionStore::new(repo);
    store.init().unwrap();

    store.create("a", None, None).unwrap();
    store.create("b", None, None).unwrap();
    store.create("c", None, None).unwrap();
    let before = active_names(&store);

    fail_writes.set(true);
    let err = store.reorder(0, 2).unwrap_err();
    assert!(matches!(
        err,
        StoreError::Persistence {
            operation: "action_reorder",
            ..
        }
    ));
    assert_eq!(active_names(&store), before);

    fail_writes.set(false);
    store.reorder(0, 2).unwrap();
    assert_eq!(active_names(&store), vec!["b", "c", "a"]);
}

#[test]
fn failed_create_write_surfaces_error_and_changes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let fail_writes = Rc::new(Cell::new(false));
    let repo = FlakyRepo {
        inner: SqliteActionRepository::try_new(&conn).unwrap(),
        fail_writes: fail_writes.clone(),
    };
    let mut store = ActionStore::new(repo);
    store.init().unwrap();

    fail_writes.set(true);
    let err = store.create("doomed", None, None).unwrap_err();
    assert!(matches!(err, StoreError::Persistence { .. }));
    assert!(store.actions().is_empty());
}

#[test]
fn subscribers_receive_each_successful_mutation_and_skip_failures() {
    let conn = open_db_in_memory().unwrap();
    let fail_writes = Rc::new(Cell::new(false));
    let repo = FlakyRepo {
        inner: SqliteActionRepository::try_new(&conn).unwrap(),
        fail_writes: fail_writes.clone(),
    };
    let mut store = ActionStore::new(repo);

    let notifications = Rc::new(RefCell::new(Vec::new()));
    let sink = notifications.clone();
    let subscription = store.subscribe(Box::new(move |actions: &[Action]| {
        sink.borrow_mut().push(actions.len());
    }));

    store.init().unwrap();
    store.create("a", None, None).unwrap();
    store.create("b", None, None).unwrap();

    fail_writes.set(true);
    let _ = store.create("doomed", None, None).unwrap_err();
    fail_writes.set(false);

    // init, then one notification per successful create.
    assert_eq!(*notifications.borrow(), vec![0, 1, 2]);

    assert!(store.unsubscribe(subscription));
    assert!(!store.unsubscribe(subscription));
    store.create("c", None, None).unwrap();
    assert_eq!(notifications.borrow().len(), 3);
}

#[test]
fn completed_by_day_buckets_history_newest_first() {
    let conn = open_db_in_memory().unwrap();
    let now = Rc::new(Cell::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()));
    let mut store = ActionStore::with_parts(
        SqliteActionRepository::try_new(&conn).unwrap(),
        Box::new(dodo_core::NoopFocusPresenter),
        Box::new(TestClock(now.clone())),
    );
    store.init().unwrap();

    for name in ["day1", "day2", "day3"] {
        let id = store.create(name, None, None).unwrap();
        store.complete(id).unwrap();
        now.set(now.get() + Duration::days(1));
    }

    let groups = store.completed_by_day();
    assert_eq!(groups.len(), 3);
    assert_eq!(groups[0].items[0].name, "day3");
    assert_eq!(groups[1].items[0].name, "day2");
    assert_eq!(groups[2].items[0].name, "day1");
}
