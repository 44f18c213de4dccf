use rand::Rng;
use serde::{Deserialize, Serialize};
use specweave::expression::{Expression, Lambda};
use specweave::specification::{
    apply_not, embed, resolve_lambda, ExpressionSelector, ExpressionSpec, Predicate, PredicateKind,
    Projection, Selector, Specification, SpecificationExt,
};
use specweave::{MemoryEngine, SpecificationSliceExt};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SubItem {
    active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Item {
    id: String,
    sub: SubItem,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct OptionalItem {
    id: String,
    sub: Option<SubItem>,
}

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn item(id: &str, active: bool) -> Item {
    Item {
        id: id.to_string(),
        sub: SubItem { active },
    }
}

fn items(ids: &[&str]) -> Vec<Item> {
    ids.iter().map(|id| item(id, true)).collect()
}

fn ids(found: Vec<&Item>) -> Vec<String> {
    found.into_iter().map(|i| i.id.clone()).collect()
}

fn id_equals(id: &str) -> ExpressionSpec<Item> {
    let id = id.to_string();
    ExpressionSpec::new(Predicate::new("x", move |x| {
        Expression::eq(x.member("id"), Expression::string(id))
    }))
}

fn id_contains(needle: &str) -> ExpressionSpec<Item> {
    let needle = needle.to_string();
    ExpressionSpec::new(Predicate::new("x", move |x| {
        x.member("id").contains(Expression::string(needle))
    }))
}

fn sub_active() -> ExpressionSpec<SubItem> {
    ExpressionSpec::new(Predicate::new("s", |s| s.member("active")))
}

fn sub_selector() -> ExpressionSelector<Item, SubItem> {
    ExpressionSelector::new(Projection::new("x", |x| x.member("sub")))
}

#[test]
fn test_equality_specification() {
    init();
    let data = items(&["1", "2", "3"]);
    let found = data.where_satisfies(Some(&id_equals("1"))).unwrap();
    assert_eq!(ids(found), vec!["1"]);
}

#[test]
fn test_specification_through_selector() {
    init();
    let data = vec![item("1", true), item("2", false), item("3", true)];
    let selector = sub_selector().build_expression();
    let found = data
        .where_satisfies_via::<SubItem>(Some(&sub_active()), Some(&selector))
        .unwrap();
    assert_eq!(ids(found), vec!["1", "3"]);
}

#[test]
fn test_and_of_contains() {
    init();
    let data = items(&["11", "21", "22"]);
    let spec = id_contains("2").and(id_contains("1"));
    let found = data.where_satisfies(Some(&spec)).unwrap();
    assert_eq!(ids(found), vec!["21"]);
}

#[test]
fn test_or_of_contains() {
    init();
    let data = items(&["11", "22", "33"]);
    let spec = id_contains("1").or(id_contains("2"));
    let found = data.where_satisfies(Some(&spec)).unwrap();
    assert_eq!(ids(found), vec!["11", "22"]);
}

#[test]
fn test_and_via_selector() {
    init();
    let data = vec![item("12", true), item("13", false), item("24", true)];
    let spec = id_contains("1").and_via(sub_active(), sub_selector());
    let found = data.where_satisfies(Some(&spec)).unwrap();
    assert_eq!(ids(found), vec!["12"]);

    let spec = id_contains("2").or_via(sub_active(), sub_selector());
    let found = data.where_satisfies(Some(&spec)).unwrap();
    assert_eq!(ids(found), vec!["12", "24"]);
}

#[test]
fn test_or_with_show_all_keeps_other_side() {
    init();
    let data = items(&["1", "2", "3"]);

    // A ShowAll operand is dropped rather than widening the result
    let spec = ExpressionSpec::<Item>::show_all().or(id_equals("2"));
    assert_eq!(ids(data.where_satisfies(Some(&spec)).unwrap()), vec!["2"]);

    let spec = id_equals("3").or(ExpressionSpec::<Item>::show_all());
    assert_eq!(ids(data.where_satisfies(Some(&spec)).unwrap()), vec!["3"]);

    // ShowNone is dropped the same way
    let none = ExpressionSpec::new(Predicate::<Item>::show_none());
    let spec = none.or(id_equals("1"));
    assert_eq!(ids(data.where_satisfies(Some(&spec)).unwrap()), vec!["1"]);
}

#[test]
fn test_and_with_show_all() {
    init();
    let data = items(&["1", "2"]);
    let spec = ExpressionSpec::<Item>::show_all().and(id_equals("2"));
    assert_eq!(spec.build_expression().kind(), PredicateKind::Composed);
    assert_eq!(ids(data.where_satisfies(Some(&spec)).unwrap()), vec!["2"]);
}

#[test]
fn test_not() {
    init();
    let data = items(&["1", "2", "3"]);
    let spec = id_equals("2").not();
    assert_eq!(ids(data.where_satisfies(Some(&spec)).unwrap()), vec!["1", "3"]);

    // Negating ShowAll still matches everything
    let spec = ExpressionSpec::<Item>::show_all().not();
    assert!(spec.build_expression().is_show_all());
    assert_eq!(data.count_satisfying(&spec).unwrap(), 3);
}

#[test]
fn test_double_negation_is_identity() {
    init();
    let mut rng = rand::thread_rng();
    let data: Vec<Item> = (0..50)
        .map(|_| item(&rng.gen_range(0..100).to_string(), rng.gen_bool(0.5)))
        .collect();

    let spec = Arc::new(id_contains("7").or(id_contains("3")));
    let twice = spec.clone().not().not();
    for entry in &data {
        assert_eq!(
            spec.is_satisfied_by(entry).unwrap(),
            twice.is_satisfied_by(entry).unwrap(),
            "mismatch for {:?}",
            entry
        );
    }
}

#[test]
fn test_predicate_kinds() {
    let show_all = Predicate::<Item>::show_all();
    assert_eq!(show_all.kind(), PredicateKind::Literal(true));
    assert_eq!(apply_not(&show_all).kind(), PredicateKind::Literal(true));

    let written = Predicate::<Item>::new("x", |_| Expression::bool(false));
    assert_eq!(written.kind(), PredicateKind::Literal(false));
    assert!(written.is_show_none());

    assert_eq!(
        id_equals("1").build_expression().kind(),
        PredicateKind::General
    );
}

#[test]
fn test_nested_embedding_matches_manual_composition() {
    init();
    let data = vec![item("1", true), item("2", false), item("3", true)];

    // x => Embed(sub_active)(x.sub) && x.id != "3"
    let handle = embed::specification(sub_active());
    let embedded = ExpressionSpec::new(Predicate::<Item>::new("x", |x| {
        Expression::and(
            handle.invoke(vec![x.clone().member("sub")]),
            Expression::ne(x.member("id"), Expression::string("3")),
        )
    }));
    let outer = embed::specification(embedded);
    let wrapped = ExpressionSpec::new(Predicate::<Item>::new("y", |y| outer.invoke(vec![y])));

    let manual = ExpressionSpec::new(Predicate::<Item>::new("x", |x| {
        Expression::and(
            x.clone().member("sub").member("active"),
            Expression::ne(x.member("id"), Expression::string("3")),
        )
    }));

    assert_eq!(
        ids(data.where_satisfies(Some(&wrapped)).unwrap()),
        ids(data.where_satisfies(Some(&manual)).unwrap())
    );
    assert_eq!(ids(data.where_satisfies(Some(&wrapped)).unwrap()), vec!["1"]);

    let resolved = wrapped.build_expression().resolve_embedded().unwrap();
    assert!(!resolved.body().contains_embed());
    assert_eq!(
        resolved.to_string(),
        "y => (y.sub.active && (y.id != \"3\"))"
    );
}

#[test]
fn test_resolution_is_idempotent() {
    let handle = embed::specification(id_equals("1"));
    let lambda = Lambda::unary("x", |x| handle.invoke(vec![x]));
    let once = resolve_lambda(&lambda).unwrap();
    assert_eq!(resolve_lambda(&once).unwrap(), once);
}

#[test]
fn test_shared_operand_is_rebuilt_per_use() {
    init();
    let data = items(&["1", "2"]);
    let shared: Arc<dyn Specification<Item>> = Arc::new(id_equals("1"));
    let either = shared.clone().or(id_equals("2"));
    let neither = shared.not().and(id_equals("2").not());

    assert_eq!(data.count_satisfying(&either).unwrap(), 2);
    assert_eq!(data.count_satisfying(&neither).unwrap(), 0);
}

#[test]
fn test_selector_over_nullable_property() {
    init();
    let data = vec![
        OptionalItem {
            id: "1".to_string(),
            sub: Some(SubItem { active: true }),
        },
        OptionalItem {
            id: "2".to_string(),
            sub: None,
        },
        OptionalItem {
            id: "3".to_string(),
            sub: None,
        },
    ];
    // s => s != null && s.active
    let present_and_active = ExpressionSpec::<SubItem>::new(Predicate::new("s", |s| {
        Expression::and(
            Expression::ne(s.clone(), Expression::null()),
            s.member("active"),
        )
    }));
    let selector = Projection::<OptionalItem, SubItem>::new("x", |x| x.member("sub"));

    let found: Vec<&str> = data
        .where_satisfies_via::<SubItem>(Some(&present_and_active), Some(&selector))
        .unwrap()
        .into_iter()
        .map(|i| i.id.as_str())
        .collect();
    assert_eq!(found, vec!["1"]);

    let engine = MemoryEngine::new();
    engine.insert("items", &data).unwrap();
    let found: Vec<String> = engine
        .query::<OptionalItem>("items")
        .where_via::<SubItem>(Some(&present_and_active), Some(&selector))
        .to_list()
        .unwrap()
        .into_iter()
        .map(|i| i.id)
        .collect();
    assert_eq!(found, vec!["1"]);
}

#[test]
fn test_specification_inside_embedded_selector() {
    init();
    let data = vec![item("1", true), item("2", false), item("3", false)];

    // Selector x => Embed(sub_active)(x.sub), itself embedded in the filter
    let spec_handle = embed::specification(sub_active());
    let is_active = ExpressionSelector::new(Projection::<Item, bool>::new("x", |x| {
        spec_handle.invoke(vec![x.member("sub")])
    }));
    let selector_handle = embed::selector(is_active);
    let embedded = Predicate::<Item>::new("y", |y| selector_handle.invoke(vec![y]));
    let manual = Predicate::<Item>::new("x", |x| x.member("sub").member("active"));

    let resolved = embedded.resolve_embedded().unwrap();
    assert!(!resolved.body().contains_embed());
    assert_eq!(resolved.to_string(), "y => y.sub.active");

    let in_memory = ids(data
        .where_satisfies(Some(&ExpressionSpec::new(embedded.clone())))
        .unwrap());
    let by_hand = ids(data
        .where_satisfies(Some(&ExpressionSpec::new(manual.clone())))
        .unwrap());
    assert_eq!(in_memory, vec!["1"]);
    assert_eq!(in_memory, by_hand);

    let engine = MemoryEngine::new();
    engine.insert("items", &data).unwrap();
    let queried: Vec<String> = engine
        .query::<Item>("items")
        .filter(embedded)
        .to_list()
        .unwrap()
        .into_iter()
        .map(|i| i.id)
        .collect();
    let queried_by_hand = engine.query::<Item>("items").filter(manual).count().unwrap();
    assert_eq!(queried, vec!["1"]);
    assert_eq!(queried_by_hand, 1);
}
