#[cfg(test)]
mod tests {
    use datacolumn::interval::{Interval, IntervalMap, IntervalSet};

    fn set_of(intervals: &[(usize, usize)]) -> IntervalSet {
        intervals.iter().map(|&(s, e)| Interval::new(s, e)).collect()
    }

    #[test]
    fn test_interval_basics() {
        let iv = Interval::new(5, 2);
        assert_eq!(iv.start(), 2);
        assert_eq!(iv.end(), 5);
        assert_eq!(iv.len(), 4);
        assert!(iv.contains(2));
        assert!(iv.contains(5));
        assert!(!iv.contains(6));
        assert_eq!(Interval::single(3).len(), 1);
        assert_eq!(iv.to_string(), "[2,5]");
    }

    #[test]
    fn test_interval_relations() {
        let a = Interval::new(2, 5);
        assert!(a.intersects(&Interval::new(5, 8)));
        assert!(!a.intersects(&Interval::new(6, 8)));
        assert!(a.touches(&Interval::new(6, 8)));
        assert!(!a.touches(&Interval::new(7, 8)));
        assert!(a.contains_interval(&Interval::new(3, 4)));
        assert!(!a.contains_interval(&Interval::new(3, 6)));
        assert_eq!(a.intersection(&Interval::new(4, 9)), Some(Interval::new(4, 5)));
        assert_eq!(a.intersection(&Interval::new(7, 9)), None);
    }

    #[test]
    fn test_interval_subtract_and_clamp() {
        let a = Interval::new(2, 8);
        assert_eq!(
            a.subtract(&Interval::new(4, 5)),
            vec![Interval::new(2, 3), Interval::new(6, 8)]
        );
        assert_eq!(a.subtract(&Interval::new(0, 9)), Vec::<Interval>::new());
        assert_eq!(a.subtract(&Interval::new(10, 12)), vec![a]);
        assert_eq!(a.clamp_to(5), Some(Interval::new(2, 4)));
        assert_eq!(a.clamp_to(2), None);
        assert_eq!(a.clamp_to(0), None);
    }

    #[test]
    fn test_set_merges_overlapping_and_adjacent() {
        let mut set = IntervalSet::new();
        set.insert(Interval::new(0, 2));
        set.insert(Interval::new(3, 5));
        set.insert(Interval::new(8, 9));
        assert_eq!(set.intervals(), &[Interval::new(0, 5), Interval::new(8, 9)]);

        set.insert(Interval::new(4, 8));
        assert_eq!(set.intervals(), &[Interval::new(0, 9)]);
        assert!(set.contains(7));
        assert!(!set.contains(10));
    }

    #[test]
    fn test_set_keeps_sorted_order() {
        let set = set_of(&[(10, 12), (0, 1), (5, 6)]);
        assert_eq!(
            set.intervals(),
            &[Interval::new(0, 1), Interval::new(5, 6), Interval::new(10, 12)]
        );
        assert!(set.contains_all(&Interval::new(10, 11)));
        assert!(!set.contains_all(&Interval::new(1, 5)));
    }

    #[test]
    fn test_set_remove_splits() {
        let mut set = set_of(&[(0, 9)]);
        set.remove(Interval::new(3, 4));
        assert_eq!(set.intervals(), &[Interval::new(0, 2), Interval::new(5, 9)]);
        assert!(!set.contains(3));
        set.remove(Interval::new(0, 20));
        assert!(set.is_empty());
    }

    #[test]
    fn test_set_insert_rows_shifts_and_splits() {
        let mut set = set_of(&[(2, 5), (8, 8)]);
        set.insert_rows(3, 2);
        assert_eq!(
            set.intervals(),
            &[Interval::new(2, 2), Interval::new(5, 7), Interval::new(10, 10)]
        );

        let mut before = set_of(&[(2, 2)]);
        before.insert_rows(1, 2);
        assert_eq!(before.intervals(), &[Interval::new(4, 4)]);
    }

    #[test]
    fn test_set_remove_rows_shifts_and_merges() {
        let mut set = set_of(&[(0, 2), (5, 9)]);
        set.remove_rows(3, 2);
        assert_eq!(set.intervals(), &[Interval::new(0, 7)]);

        let mut inner = set_of(&[(2, 6)]);
        inner.remove_rows(3, 2);
        assert_eq!(inner.intervals(), &[Interval::new(2, 4)]);

        let mut gone = set_of(&[(3, 4)]);
        gone.remove_rows(3, 2);
        assert!(gone.is_empty());
    }

    #[test]
    fn test_set_truncate() {
        let mut set = set_of(&[(0, 1), (4, 8)]);
        set.truncate(6);
        assert_eq!(set.intervals(), &[Interval::new(0, 1), Interval::new(4, 5)]);
        set.truncate(0);
        assert!(set.is_empty());
    }

    #[test]
    fn test_map_overrides_and_coalesces() {
        let mut map = IntervalMap::new();
        map.set(Interval::new(0, 4), "a".to_string());
        map.set(Interval::new(2, 3), "b".to_string());
        assert_eq!(
            map.intervals(),
            vec![Interval::new(0, 1), Interval::new(2, 3), Interval::new(4, 4)]
        );
        assert_eq!(map.value_at(2).map(String::as_str), Some("b"));
        assert_eq!(map.value_at(4).map(String::as_str), Some("a"));
        assert_eq!(map.value_at(5), None);

        map.set(Interval::new(2, 3), "a".to_string());
        assert_eq!(map.intervals(), vec![Interval::new(0, 4)]);
    }

    #[test]
    fn test_map_row_shifts() {
        let mut map = IntervalMap::new();
        map.set(Interval::new(1, 2), "x".to_string());
        map.set(Interval::new(5, 5), "y".to_string());

        map.insert_rows(0, 1);
        assert_eq!(map.intervals(), vec![Interval::new(2, 3), Interval::new(6, 6)]);

        map.remove_rows(2, 2);
        assert_eq!(map.intervals(), vec![Interval::new(4, 4)]);
        assert_eq!(map.value_at(4).map(String::as_str), Some("y"));

        map.truncate(4);
        assert!(map.is_empty());
    }
}
