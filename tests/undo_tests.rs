#[cfg(test)]
mod tests {
    use datacolumn::undo::{UndoCommand, UndoStack};

    // Appends a number; undo pops it again.
    struct Append(i32);

    impl UndoCommand for Append {
        type Target = Vec<i32>;

        fn redo(&mut self, target: &mut Vec<i32>) {
            target.push(self.0);
        }

        fn undo(&mut self, target: &mut Vec<i32>) {
            target.pop();
        }

        fn text(&self) -> String {
            format!("append {}", self.0)
        }
    }

    #[test]
    fn test_push_executes_and_records() {
        let mut stack = UndoStack::new();
        let mut values = Vec::new();
        stack.push(Append(1), &mut values);
        stack.push(Append(2), &mut values);
        assert_eq!(values, vec![1, 2]);
        assert_eq!(stack.count(), 2);
        assert_eq!(stack.index(), 2);
        assert_eq!(stack.undo_text(), Some("append 2"));
        assert_eq!(stack.redo_text(), None);
    }

    #[test]
    fn test_undo_redo_inverse() {
        let mut stack = UndoStack::new();
        let mut values = Vec::new();
        for n in 1..=4 {
            stack.push(Append(n), &mut values);
        }
        for _ in 0..4 {
            assert!(stack.undo(&mut values));
        }
        assert!(values.is_empty());
        assert!(!stack.undo(&mut values));

        for _ in 0..4 {
            assert!(stack.redo(&mut values));
        }
        assert_eq!(values, vec![1, 2, 3, 4]);
        assert!(!stack.redo(&mut values));
    }

    #[test]
    fn test_push_after_undo_drops_redo_branch() {
        let mut stack = UndoStack::new();
        let mut values = Vec::new();
        stack.push(Append(1), &mut values);
        stack.push(Append(2), &mut values);
        stack.undo(&mut values);
        assert!(stack.can_redo());

        stack.push(Append(3), &mut values);
        assert!(!stack.can_redo());
        assert_eq!(stack.count(), 2);
        assert_eq!(values, vec![1, 3]);
    }

    #[test]
    fn test_macro_is_one_step() {
        let mut stack = UndoStack::new();
        let mut values = vec![0];
        stack.begin_macro("fill");
        for n in 1..=3 {
            stack.push(Append(n), &mut values);
        }
        stack.end_macro();
        assert_eq!(stack.count(), 1);
        assert_eq!(stack.undo_text(), Some("fill"));

        assert!(stack.undo(&mut values));
        assert_eq!(values, vec![0]);
        assert!(stack.redo(&mut values));
        assert_eq!(values, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_nested_macros_collapse_into_outermost() {
        let mut stack = UndoStack::new();
        let mut values = Vec::new();
        stack.begin_macro("outer");
        stack.push(Append(1), &mut values);
        stack.begin_macro("inner");
        stack.push(Append(2), &mut values);
        stack.end_macro();
        assert!(stack.in_macro());
        stack.push(Append(3), &mut values);
        stack.end_macro();
        assert!(!stack.in_macro());

        assert_eq!(stack.count(), 1);
        assert_eq!(stack.undo_text(), Some("outer"));
        stack.undo(&mut values);
        assert!(values.is_empty());
    }

    #[test]
    fn test_undo_disabled_inside_macro() {
        let mut stack = UndoStack::new();
        let mut values = Vec::new();
        stack.push(Append(1), &mut values);
        stack.begin_macro("open");
        stack.push(Append(2), &mut values);
        assert!(!stack.can_undo());
        assert!(!stack.undo(&mut values));
        assert_eq!(values, vec![1, 2]);
        stack.end_macro();
        assert!(stack.can_undo());
    }

    #[test]
    fn test_empty_macro_leaves_no_step() {
        let mut stack: UndoStack<Append> = UndoStack::new();
        stack.begin_macro("nothing");
        stack.end_macro();
        assert_eq!(stack.count(), 0);
        assert!(!stack.can_undo());
    }

    #[test]
    fn test_unbalanced_end_macro_is_ignored() {
        let mut stack = UndoStack::new();
        let mut values = Vec::new();
        stack.end_macro();
        stack.push(Append(7), &mut values);
        assert_eq!(stack.count(), 1);
        assert!(stack.undo(&mut values));
        assert!(values.is_empty());
    }

    #[test]
    fn test_clear_forgets_history() {
        let mut stack = UndoStack::new();
        let mut values = Vec::new();
        stack.push(Append(1), &mut values);
        stack.clear();
        assert_eq!(stack.count(), 0);
        assert!(!stack.can_undo());
        assert_eq!(values, vec![1]);
    }
}
