use notecull_core::{
    evaluate, evaluate_filter_set, select, Comparator, FieldSelector, FilterError, FilterSet,
    FilterSpec, Item, ItemId, ItemType, MatchPolicy, Predicate, PredicateSpec,
};

fn note(id: &str, title: &str, text: &str) -> Item {
    Item::new(ItemId::from(id), ItemType::note())
        .with_label(title)
        .with_body(text)
}

fn sample_predicates() -> Vec<Predicate> {
    vec![
        Predicate::equals(FieldSelector::Label, "Groceries"),
        Predicate::new(FieldSelector::Body, Comparator::Contains, "milk").unwrap(),
        Predicate::new(FieldSelector::Named("Mood".into()), Comparator::NotEquals, "sad").unwrap(),
    ]
}

#[test]
fn equals_is_case_respecting_unless_folded() {
    let item = note("a", "TestNoteOne", "");
    assert!(evaluate(&item, &Predicate::equals(FieldSelector::Label, "TestNoteOne")));
    assert!(!evaluate(&item, &Predicate::equals(FieldSelector::Label, "testnoteone")));

    let folded = Predicate::folded(FieldSelector::Label, Comparator::Equals, "testnoteone").unwrap();
    assert!(evaluate(&item, &folded));
}

#[test]
fn absent_field_is_unequal_and_satisfies_negations() {
    let item = note("a", "title", "body");
    let field = FieldSelector::Named("Priority".to_string());

    let equals = Predicate::new(field.clone(), Comparator::Equals, "").unwrap();
    let not_equals = Predicate::new(field.clone(), Comparator::NotEquals, "high").unwrap();
    let contains = Predicate::new(field.clone(), Comparator::Contains, "").unwrap();
    let not_contains = Predicate::new(field.clone(), Comparator::NotContains, "x").unwrap();
    let matches = Predicate::new(field, Comparator::Matches, ".*").unwrap();

    // Absent is not the empty string.
    assert!(!evaluate(&item, &equals));
    assert!(!evaluate(&item, &contains));
    assert!(!evaluate(&item, &matches));
    assert!(evaluate(&item, &not_equals));
    assert!(evaluate(&item, &not_contains));
}

#[test]
fn present_empty_field_equals_empty_string() {
    let item = note("a", "", "body");
    assert!(evaluate(&item, &Predicate::equals(FieldSelector::Label, "")));
}

#[test]
fn regex_is_unanchored_unless_caller_anchors() {
    let item = note("a", "TestNoteOne", "");
    let inner = Predicate::new(FieldSelector::Label, Comparator::Matches, "Note").unwrap();
    let anchored = Predicate::new(FieldSelector::Label, Comparator::Matches, "^Note").unwrap();
    let spec_pattern =
        Predicate::new(FieldSelector::Label, Comparator::Matches, "^T.*ote..[def]").unwrap();

    assert!(evaluate(&item, &inner));
    assert!(!evaluate(&item, &anchored));
    assert!(evaluate(&item, &spec_pattern));
}

#[test]
fn match_all_equals_logical_and_of_predicates() {
    let predicates = sample_predicates();
    let filter_set = FilterSet::new(predicates.clone(), MatchPolicy::MatchAll).unwrap();
    let items = [
        note("a", "Groceries", "eggs and milk"),
        note("b", "Groceries", "eggs"),
        note("c", "Chores", "buy milk").with_field("Mood", "sad"),
        note("d", "Other", "nothing"),
    ];

    for item in &items {
        let expected = predicates.iter().all(|p| evaluate(item, p));
        assert_eq!(evaluate_filter_set(item, &filter_set), expected, "item {}", item.id);
    }
}

#[test]
fn match_any_equals_logical_or_of_predicates() {
    let predicates = sample_predicates();
    let filter_set = FilterSet::new(predicates.clone(), MatchPolicy::MatchAny).unwrap();
    let items = [
        note("a", "Groceries", "eggs"),
        note("b", "Other", "nothing").with_field("Mood", "sad"),
        note("c", "Other", "milk").with_field("Mood", "sad"),
    ];

    for item in &items {
        let expected = predicates.iter().any(|p| evaluate(item, p));
        assert_eq!(evaluate_filter_set(item, &filter_set), expected, "item {}", item.id);
    }
    assert!(!evaluate_filter_set(&items[1], &filter_set));
}

#[test]
fn empty_filter_set_is_rejected() {
    let err = FilterSet::new(Vec::new(), MatchPolicy::MatchAny).unwrap_err();
    assert_eq!(err, FilterError::EmptyFilterSet);

    let err = FilterSpec::default().build().unwrap_err();
    assert_eq!(err, FilterError::EmptyFilterSet);
}

#[test]
fn select_drops_duplicates_and_tombstones_and_keeps_order() {
    let items = vec![
        note("1", "Groceries", "a"),
        note("2", "Groceries", "b").tombstoned(),
        note("3", "Chores", "c"),
        note("4", "Groceries", "d"),
        note("1", "Groceries", "a"),
    ];
    let matched = select(&items, &FilterSet::label_equals("Groceries"));
    let ids: Vec<&str> = matched.iter().map(|item| item.id.as_str()).collect();
    assert_eq!(ids, ["1", "4"]);
}

#[test]
fn filter_spec_builds_from_caller_shape() {
    let spec: FilterSpec = serde_json::from_value(serde_json::json!({
        "predicates": [
            { "field": "Title", "comparator": "==", "value": "A" },
            { "field": "Text", "comparator": "contains", "value": "x", "fold_case": true }
        ],
        "matchAny": true
    }))
    .unwrap();
    let filter_set = spec.build().unwrap();
    assert_eq!(filter_set.policy(), MatchPolicy::MatchAny);
    assert_eq!(filter_set.predicates().len(), 2);
    assert!(filter_set.predicates()[1].is_fold_case());
    assert!(evaluate_filter_set(&note("z", "B", "XYZ"), &filter_set));
}

#[test]
fn filter_spec_surfaces_invalid_pattern() {
    let spec = FilterSpec {
        predicates: vec![PredicateSpec {
            field: "title".to_string(),
            comparator: "~".to_string(),
            value: "[".to_string(),
            fold_case: false,
        }],
        match_any: false,
    };
    assert!(matches!(spec.build(), Err(FilterError::InvalidPattern { .. })));
}
