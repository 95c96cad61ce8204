//! Pure reconciliation of the mirrored todo list against change notifications.

use shared::{domain::Todo, protocol::ChangeEvent};

/// Applies one change notification to the collection and returns the result.
///
/// Insert appends without a dedup check against existing ids (backend ids are
/// monotonic, so append preserves ascending order). Update is a full row
/// replacement keyed by id, delete removes every row with a matching id.
/// Update and delete on an unknown id leave the collection unchanged.
pub fn apply_change(mut todos: Vec<Todo>, event: &ChangeEvent) -> Vec<Todo> {
    match event {
        ChangeEvent::Insert { new } => todos.push(new.clone()),
        ChangeEvent::Update { new } => {
            for todo in &mut todos {
                if todo.id == new.id {
                    *todo = new.clone();
                }
            }
        }
        ChangeEvent::Delete { old } => todos.retain(|todo| todo.id != old.id),
    }
    todos
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> Vec<Todo> {
        vec![Todo::new(1, "Buy milk"), Todo::new(2, "Walk dog")]
    }

    #[test]
    fn insert_appends_one_row_per_event() {
        let todos = apply_change(
            seeded(),
            &ChangeEvent::Insert {
                new: Todo::new(3, "Call mom"),
            },
        );
        assert_eq!(
            todos,
            vec![
                Todo::new(1, "Buy milk"),
                Todo::new(2, "Walk dog"),
                Todo::new(3, "Call mom"),
            ]
        );
    }

    #[test]
    fn insert_does_not_dedup_existing_ids() {
        let todos = apply_change(
            seeded(),
            &ChangeEvent::Insert {
                new: Todo::new(2, "Walk dog (again)"),
            },
        );
        assert_eq!(todos.len(), 3);
        assert_eq!(todos[2], Todo::new(2, "Walk dog (again)"));
    }

    #[test]
    fn update_replaces_every_matching_row_and_nothing_else() {
        let todos = apply_change(
            seeded(),
            &ChangeEvent::Update {
                new: Todo::new(2, "Walk dog twice"),
            },
        );
        assert_eq!(
            todos,
            vec![Todo::new(1, "Buy milk"), Todo::new(2, "Walk dog twice")]
        );
    }

    #[test]
    fn update_with_unknown_id_is_a_noop() {
        let todos = apply_change(
            seeded(),
            &ChangeEvent::Update {
                new: Todo::new(9, "ghost"),
            },
        );
        assert_eq!(todos, seeded());
    }

    #[test]
    fn delete_removes_exactly_the_matching_row() {
        let todos = apply_change(
            seeded(),
            &ChangeEvent::Delete {
                old: Todo::new(1, "Buy milk"),
            },
        );
        assert_eq!(todos, vec![Todo::new(2, "Walk dog")]);
    }

    #[test]
    fn delete_with_unknown_id_is_a_noop() {
        let todos = apply_change(
            seeded(),
            &ChangeEvent::Delete {
                old: Todo::new(9, "ghost"),
            },
        );
        assert_eq!(todos, seeded());
    }
}
