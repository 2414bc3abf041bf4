#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
    use datacolumn::column::ColumnEvent;
    use datacolumn::filter::{NumericFormat, OutputFilter};
    use datacolumn::interval::{Interval, IntervalMap, IntervalSet};
    use datacolumn::storage::ColumnData;
    use datacolumn::*;

    // Everything a row-level mutation can touch.
    #[derive(Debug, PartialEq)]
    struct Snapshot {
        mode: ColumnMode,
        data: ColumnData,
        invalid: IntervalSet,
        masked: IntervalSet,
        formulas: IntervalMap<String>,
    }

    fn snapshot(column: &Column) -> Snapshot {
        let state = column.state();
        Snapshot {
            mode: state.mode(),
            data: state.data().clone(),
            invalid: state.invalid().clone(),
            masked: state.masked().clone(),
            formulas: state.formulas().clone(),
        }
    }

    fn numbers(values: &[f64]) -> Column {
        Column::with_values("x", values.to_vec(), IntervalSet::new())
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn test_new_column() {
        let column = Column::new("c", ColumnMode::Text);
        assert_eq!(column.name(), "c");
        assert_eq!(column.row_count(), 0);
        assert_eq!(column.data_type(), ColumnDataType::Text);
        assert_eq!(column.plot_designation(), PlotDesignation::None);
        assert!(!column.can_undo());
    }

    #[test]
    fn test_set_then_get_value() {
        let mut column = numbers(&[1.0, 2.0]);
        for (row, v) in [(0, -3.25), (1, 1e300), (5, 7.0)] {
            column.set_value_at(row, v).unwrap();
            assert_eq!(column.value_at(row), v);
        }
        assert_eq!(column.row_count(), 6);
        assert_eq!(column.value_at(3), 0.0);
    }

    #[test]
    fn test_wrong_type_write_is_rejected() {
        let mut column = numbers(&[1.0]);
        let err = column.set_text_at(0, "a").unwrap_err();
        assert!(matches!(err, ColumnError::TypeMismatch { .. }));
        assert_eq!(column.value_at(0), 1.0);
        assert!(!column.can_undo());
    }

    #[test]
    fn test_write_keeps_invalid_flag() {
        let mut column = numbers(&[1.0, 2.0]);
        column.set_invalid(1, true);
        column.set_value_at(1, 9.0).unwrap();
        assert!(column.is_invalid(1));
        assert!(!column.is_invalid(0));
    }

    #[test]
    fn test_text_input_marks_invalid() {
        let mut column = numbers(&[1.0, 2.0]);
        column.set_text_input(0, "oops");
        assert!(column.is_invalid(0));
        assert_eq!(column.value_at(0), 0.0);

        column.set_text_input(0, "4.5");
        assert!(!column.is_invalid(0));
        assert_eq!(column.value_at(0), 4.5);
    }

    #[test]
    fn test_insert_rows_shifts_masks() {
        let mut column = numbers(&[1.0, 2.0, 3.0]);
        column.set_masked(2, true);
        column.insert_rows(1, 2);
        assert_eq!(column.row_count(), 5);
        assert_eq!(column.masked_intervals(), vec![Interval::single(4)]);
        assert_eq!(column.value_at(4), 3.0);
        assert_eq!(column.value_at(1), 0.0);
    }

    #[test]
    fn test_remove_rows_shifts_attributes() {
        let mut column = numbers(&[0.0, 1.0, 2.0, 3.0, 4.0]);
        column.set_invalid(4, true);
        column.set_formula_interval(Interval::new(3, 4), "x*2");
        column.remove_rows(1, 2);
        assert_eq!(column.row_count(), 3);
        assert_eq!(column.value_at(1), 3.0);
        assert_eq!(column.invalid_intervals(), vec![Interval::single(2)]);
        assert_eq!(column.formula_intervals(), vec![Interval::new(1, 2)]);
        assert_eq!(column.formula(2), Some("x*2"));
    }

    #[test]
    fn test_intervals_are_clamped_to_rows() {
        let mut column = numbers(&[1.0, 2.0, 3.0]);
        column.set_masked_interval(Interval::new(1, 10), true);
        assert_eq!(column.masked_intervals(), vec![Interval::new(1, 2)]);

        column.set_invalid_interval(Interval::new(5, 8), true);
        assert!(column.invalid_intervals().is_empty());
        assert!(column.is_masked_interval(&Interval::new(1, 2)));
    }

    #[test]
    fn test_formula_tags() {
        let mut column = numbers(&[1.0, 2.0, 3.0]);
        column.set_formula_interval(Interval::new(0, 2), "col(1)");
        column.set_formula(1, "");
        assert_eq!(column.formula(1), None);
        assert_eq!(
            column.formula_intervals(),
            vec![Interval::single(0), Interval::single(2)]
        );
    }

    #[test]
    fn test_clear_family_is_idempotent() {
        let mut column = numbers(&[1.0, 2.0, 3.0]);
        column.set_masked(0, true);
        column.set_invalid(1, true);
        column.set_formula(2, "f");
        for _ in 0..2 {
            column.clear();
            column.clear_validity();
            column.clear_masks();
            column.clear_formulas();
            assert_eq!(column.row_count(), 0);
            assert!(column.masked_intervals().is_empty());
            assert!(column.invalid_intervals().is_empty());
            assert!(column.formula_intervals().is_empty());
        }
    }

    #[test]
    fn test_undo_redo_inverse_law() {
        let mut column = numbers(&[1.0, 2.0, 3.0, 4.0]);
        column.set_invalid(3, true);
        column.clear_undo_stack();
        let before = snapshot(&column);

        column.set_value_at(6, 1.5).unwrap();
        column.insert_rows(2, 3);
        column.set_masked_interval(Interval::new(0, 4), true);
        column.set_formula_interval(Interval::new(1, 2), "sqrt(x)");
        column.remove_rows(1, 2);
        column.set_invalid(0, true);
        column.clear_masks();
        column.set_text_input(0, "bad");
        column.set_column_mode(ColumnMode::Text);
        column.clear();
        let steps = 10;
        let after = snapshot(&column);

        for _ in 0..steps {
            assert!(column.undo());
        }
        assert_eq!(snapshot(&column), before);
        assert!(!column.can_undo());

        for _ in 0..steps {
            assert!(column.redo());
        }
        assert_eq!(snapshot(&column), after);
    }

    #[test]
    fn test_macro_undoes_in_one_step() {
        let mut column = numbers(&[1.0, 2.0]);
        let before = snapshot(&column);
        column.begin_macro("edit block");
        column.set_value_at(0, 10.0).unwrap();
        column.insert_rows(0, 1);
        column.set_masked(1, true);
        column.end_macro();

        assert_eq!(column.undo_stack().undo_text(), Some("edit block"));
        assert!(column.undo());
        assert_eq!(snapshot(&column), before);
        assert!(!column.can_undo());
    }

    #[test]
    fn test_mode_change_numeric_to_text_and_back() {
        let mut column = numbers(&[1.5, 2.0]);
        column.set_column_mode(ColumnMode::Text);
        assert_eq!(column.data_type(), ColumnDataType::Text);
        assert_eq!(column.text_at(0), "1.5");
        assert_eq!(column.text_at(1), "2");

        column.set_text_at(1, "abc").unwrap();
        column.set_column_mode(ColumnMode::Numeric);
        assert_eq!(column.value_at(0), 1.5);
        assert_eq!(column.value_at(1), 0.0);
        assert!(column.is_invalid(1));
        assert!(!column.is_invalid(0));
    }

    #[test]
    fn test_mode_change_is_one_undo_step() {
        let mut column = numbers(&[2_440_588.0]);
        column.set_column_mode(ColumnMode::DateTime);
        assert_eq!(column.date_time_at(0), Some(at(1970, 1, 2, 12, 0, 0)));
        assert_eq!(column.undo_stack().count(), 1);

        assert!(column.undo());
        assert_eq!(column.column_mode(), ColumnMode::Numeric);
        assert_eq!(column.value_at(0), 2_440_588.0);
        assert!(column.redo());
        assert_eq!(column.column_mode(), ColumnMode::DateTime);
    }

    #[test]
    fn test_copy_requires_same_type() {
        let mut target = numbers(&[1.0]);
        let source = Column::with_texts("t", vec!["a".into()], IntervalSet::new());
        let err = target.copy(&source).unwrap_err();
        assert_eq!(
            err,
            ColumnError::TypeMismatch {
                expected: ColumnDataType::Double,
                found: ColumnDataType::Text,
            }
        );
        assert_eq!(target.row_count(), 1);
        assert_eq!(target.value_at(0), 1.0);
    }

    #[test]
    fn test_copy_takes_cells_and_intervals() {
        let mut source = numbers(&[5.0, 6.0, 7.0]);
        source.set_masked(1, true);
        source.set_invalid(2, true);
        source.set_formula(0, "a+b");

        let mut target = numbers(&[1.0]);
        target.copy(&source).unwrap();
        assert_eq!(target.row_count(), 3);
        assert_eq!(target.value_at(2), 7.0);
        assert_eq!(target.masked_intervals(), vec![Interval::single(1)]);
        assert_eq!(target.invalid_intervals(), vec![Interval::single(2)]);
        assert_eq!(target.formula(0), Some("a+b"));

        assert!(target.undo());
        assert_eq!(target.row_count(), 1);
    }

    #[test]
    fn test_copy_rows() {
        let mut source = numbers(&[1.0, 2.0, 3.0, 4.0]);
        source.set_invalid(2, true);
        let mut target = Column::new("t", ColumnMode::Numeric);
        target.copy_rows(&source, 1, 0, 5).unwrap();
        assert_eq!(target.row_count(), 3);
        assert_eq!(target.value_at(0), 2.0);
        assert!(target.is_invalid(1));
    }

    #[test]
    fn test_date_and_time_setters() {
        let mut column = Column::with_date_times(
            "d",
            vec![Some(at(2020, 1, 2, 3, 4, 5)), None],
            IntervalSet::new(),
        );
        column
            .set_date_at(0, NaiveDate::from_ymd_opt(2021, 6, 7).unwrap())
            .unwrap();
        assert_eq!(column.date_time_at(0), Some(at(2021, 6, 7, 3, 4, 5)));

        column
            .set_time_at(1, NaiveTime::from_hms_opt(8, 30, 0).unwrap())
            .unwrap();
        assert_eq!(column.date_time_at(1), Some(at(1970, 1, 1, 8, 30, 0)));
        assert!(column.set_value_at(0, 1.0).is_err());
    }

    #[test]
    fn test_display_text_per_mode() {
        let mut column = numbers(&[3.5, 100.0]);
        assert_eq!(column.display_text(0), "3.5");
        assert_eq!(column.display_text(1), "100");
        assert_eq!(column.display_text(5), "");

        column
            .set_output_filter(OutputFilter::Double2String {
                format: NumericFormat::Fixed,
                digits: 2,
            })
            .unwrap();
        assert_eq!(column.display_text(0), "3.50");
        assert!(column.set_output_filter(OutputFilter::StringIdentity).is_err());

        let mut months = Column::new("m", ColumnMode::Month);
        months.set_text_input(0, "March");
        assert_eq!(months.display_text(0), "March");
    }

    #[test]
    fn test_description_changes_are_undoable() {
        let mut column = numbers(&[]);
        column.set_name("renamed");
        column.set_comment("note");
        column.set_plot_designation(PlotDesignation::Y);
        assert_eq!(column.name(), "renamed");
        assert_eq!(column.comment(), "note");

        column.undo();
        assert_eq!(column.plot_designation(), PlotDesignation::None);
        column.undo();
        column.undo();
        assert_eq!(column.name(), "x");
        assert_eq!(column.comment(), "");
    }

    #[test]
    fn test_notifications() {
        let mut column = numbers(&[1.0]);
        let events = column.subscribe();

        column.set_value_at(0, 2.0).unwrap();
        assert_eq!(events.try_recv(), Ok(ColumnEvent::DataChanged));
        assert!(events.try_recv().is_err());

        column.set_masked(0, true);
        assert_eq!(events.try_recv(), Ok(ColumnEvent::MaskingChanged));

        column.set_plot_designation(PlotDesignation::X);
        assert_eq!(events.try_recv(), Ok(ColumnEvent::PlotDesignationChanged));

        column.undo();
        assert_eq!(events.try_recv(), Ok(ColumnEvent::PlotDesignationChanged));

        column.notify_replacement("y");
        assert_eq!(
            events.try_recv(),
            Ok(ColumnEvent::AboutToBeReplaced {
                replacement: "y".to_string()
            })
        );
    }

    #[test]
    fn test_dropped_subscriber_is_forgotten() {
        let mut column = numbers(&[1.0]);
        drop(column.subscribe());
        column.set_value_at(0, 3.0).unwrap();
        assert_eq!(column.value_at(0), 3.0);
    }

    #[test]
    fn test_output_filter_digits_are_bounded() {
        let mut column = numbers(&[1.0]);
        let err = column
            .set_output_filter(OutputFilter::Double2String {
                format: NumericFormat::Fixed,
                digits: 100,
            })
            .unwrap_err();
        assert!(matches!(err, ColumnError::TooManyDigits { digits: 100, max: 16 }));
        assert_eq!(column.output_filter(), &OutputFilter::for_mode(ColumnMode::Numeric));
        assert!(!column.can_undo());
        assert_eq!(column.display_text(0), "1");
    }

    #[test]
    fn test_text_input_keeps_milliseconds() {
        let mut column = Column::new("d", ColumnMode::DateTime);
        column.set_text_input(0, "2020-01-02 03:04:05.123456789");
        let expected = NaiveDate::from_ymd_opt(2020, 1, 2)
            .unwrap()
            .and_hms_milli_opt(3, 4, 5, 123)
            .unwrap();
        assert_eq!(column.date_time_at(0), Some(expected));
    }
}
