//! Counter filter limits and start modes.

use citystore::filter::{ComparisonOperator, CounterFilter, FilterError};

#[test]
fn one_based_limits_translate_to_count_and_offset() {
    let f = CounterFilter::new(11, 20).unwrap();
    assert_eq!(f.count(), 10);
    assert_eq!(f.start_index(), Some(10));

    // A window starting at row 1 needs no offset.
    let first_page = CounterFilter::new(1, 10).unwrap();
    assert_eq!(first_page.count(), 10);
    assert_eq!(first_page.start_index(), None);

    let single = CounterFilter::new(5, 5).unwrap();
    assert_eq!(single.count(), 1);
    assert_eq!(single.start_index(), Some(4));
}

#[test]
fn limits_must_be_positive_and_ordered() {
    assert!(matches!(
        CounterFilter::new(0, 10),
        Err(FilterError::NonPositiveLimit { .. })
    ));
    assert!(matches!(
        CounterFilter::new(1, 0),
        Err(FilterError::NonPositiveLimit { .. })
    ));
    assert!(matches!(
        CounterFilter::new(20, 11),
        Err(FilterError::LimitOrder { .. })
    ));
    assert!(matches!(
        CounterFilter::with_count(0),
        Err(FilterError::NonPositiveLimit { .. })
    ));
}

#[test]
fn start_modes_are_mutually_exclusive() {
    let mut f = CounterFilter::with_count(100).unwrap();
    assert_eq!(f.start_index(), None);
    assert_eq!(f.start_id(), None);

    f.set_start_index(40);
    assert_eq!(f.start_index(), Some(40));
    assert_eq!(f.start_id(), None);

    f.set_start_id(7000);
    assert_eq!(f.start_index(), None);
    assert_eq!(f.start_id(), Some(7000));

    f.set_start_index(0);
    assert_eq!(f.start_index(), Some(0));
    assert_eq!(f.start_id(), None);
}

#[test]
fn keyed_paging_operator_defaults_to_gt() {
    let mut f = CounterFilter::with_count(10).unwrap();
    assert_eq!(f.operator(), ComparisonOperator::Gt);

    f.set_operator(ComparisonOperator::Gte);
    assert_eq!(f.operator(), ComparisonOperator::Gte);
}
