use serde::{Deserialize, Serialize};
use specweave::expression::{Expression, Lambda};
use specweave::specification::{
    embed, ExpressionGroupSelector, ExpressionSelector, ExpressionSpec, Grouping, KeyWithCount,
    Predicate, Projection, Specification, SpecificationExt,
};
use specweave::{MemoryEngine, SpecError, SpecificationSliceExt};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Line {
    sku: String,
    active: bool,
    quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Order {
    id: String,
    region: String,
    lines: Vec<Line>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Summary {
    id: String,
    active_lines: usize,
}

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn line(sku: &str, active: bool, quantity: i64) -> Line {
    Line {
        sku: sku.to_string(),
        active,
        quantity,
    }
}

fn orders() -> Vec<Order> {
    vec![
        Order {
            id: "11".to_string(),
            region: "north".to_string(),
            lines: vec![line("a", true, 2), line("b", false, 1)],
        },
        Order {
            id: "22".to_string(),
            region: "south".to_string(),
            lines: vec![line("c", false, 5)],
        },
        Order {
            id: "22".to_string(),
            region: "north".to_string(),
            lines: vec![line("d", true, 3), line("e", true, 4)],
        },
    ]
}

fn engine() -> MemoryEngine {
    let engine = MemoryEngine::new();
    engine.insert("orders", &orders()).unwrap();
    engine
}

fn line_active() -> ExpressionSpec<Line> {
    ExpressionSpec::new(Predicate::new("l", |l| l.member("active")))
}

fn id_is(id: &str) -> ExpressionSpec<Order> {
    let id = id.to_string();
    ExpressionSpec::new(Predicate::new("o", move |o| {
        Expression::eq(o.member("id"), Expression::string(id))
    }))
}

fn by_id() -> Projection<Order, String> {
    Projection::new("o", |o| o.member("id"))
}

/// o => o.lines.Any(l => Embed(line_active)(l))
fn has_active_line() -> Predicate<Order> {
    let handle = embed::specification(line_active());
    Predicate::new("o", |o| {
        o.member("lines")
            .any(Lambda::unary("l", |l| handle.invoke(vec![l])))
    })
}

/// o => new { id = o.id, active_lines = o.lines.Where(l => Embed(line_active)(l)).Count() }
fn summary() -> Projection<Order, Summary> {
    let handle = embed::specification(line_active());
    Projection::new("o", |o| {
        Expression::record(vec![
            ("id", o.clone().member("id")),
            (
                "active_lines",
                o.member("lines")
                    .filter(Lambda::unary("l", |l| handle.invoke(vec![l])))
                    .count(),
            ),
        ])
    })
}

#[test]
fn test_group_and_count_both_paths() {
    init();
    let data = orders();
    let counts = data.group_and_count_dictionary::<String>(&by_id()).unwrap();
    assert_eq!(counts.len(), 2);
    assert_eq!(counts["11"], 1);
    assert_eq!(counts["22"], 2);

    let rows = data.group_and_count::<String>(&by_id()).unwrap();
    assert_eq!(
        rows,
        vec![
            KeyWithCount {
                key: "11".to_string(),
                count: 1
            },
            KeyWithCount {
                key: "22".to_string(),
                count: 2
            },
        ]
    );

    let engine = engine();
    let counts = engine
        .query::<Order>("orders")
        .group_and_count_dictionary::<String>(&by_id())
        .unwrap();
    assert_eq!(counts["11"], 1);
    assert_eq!(counts["22"], 2);

    let rows: Vec<KeyWithCount<String>> = engine
        .query::<Order>("orders")
        .group_and_count::<String>(&by_id())
        .to_list()
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].count, 2);
}

#[test]
fn test_embedding_inside_any() {
    init();
    let data = orders();
    let spec = ExpressionSpec::new(has_active_line());
    let found: Vec<&str> = data
        .where_satisfies(Some(&spec))
        .unwrap()
        .into_iter()
        .map(|o| o.region.as_str())
        .collect();
    assert_eq!(found, vec!["north", "north"]);

    let engine = engine();
    let query = engine.query::<Order>("orders").filter(has_active_line());
    assert_eq!(query.count().unwrap(), 2);
    assert!(query.to_list().unwrap().iter().all(|o| o.region == "north"));
}

#[test]
fn test_embedding_inside_projected_record() {
    init();
    let expected = vec![
        Summary {
            id: "11".to_string(),
            active_lines: 1,
        },
        Summary {
            id: "22".to_string(),
            active_lines: 0,
        },
        Summary {
            id: "22".to_string(),
            active_lines: 2,
        },
    ];

    let data = orders();
    assert_eq!(data.select_with::<Summary>(&summary()).unwrap(), expected);

    let engine = engine();
    let query = engine.query::<Order>("orders").map(summary());
    let plan = query.plan(specweave::sequence::Terminal::List).unwrap();
    assert!(!plan.contains_embed());
    assert_eq!(query.to_list().unwrap(), expected);
}

#[test]
fn test_select_via() {
    init();
    let engine = engine();
    let first_line = ExpressionSelector::new(Projection::<Order, Line>::new("o", |o| {
        o.member("lines").first_or_default()
    }));
    let quantity = Projection::<Line, i64>::new("l", |l| l.member("quantity"));

    let quantities: Vec<i64> = engine
        .query::<Order>("orders")
        .select_via::<Line, i64>(&quantity, &first_line)
        .to_list()
        .unwrap();
    assert_eq!(quantities, vec![2, 5, 3]);
}

#[test]
fn test_filter_through_selector() {
    init();
    let engine = engine();
    let first_line = Projection::<Order, Line>::new("o", |o| o.member("lines").first_or_default());

    let query = engine
        .query::<Order>("orders")
        .where_via::<Line>(Some(&line_active() as &dyn Specification<Line>), Some(&first_line));
    assert_eq!(query.count().unwrap(), 2);

    let any_inactive = engine
        .query::<Order>("orders")
        .any_via::<Line>(&line_active().not(), &first_line)
        .unwrap();
    assert!(any_inactive);

    let first = engine
        .query::<Order>("orders")
        .first_via::<Line>(&line_active().not(), &first_line)
        .unwrap();
    assert_eq!(first.map(|o| o.region), Some("south".to_string()));

    let data = orders();
    assert_eq!(
        data.count_satisfying_via::<Line>(&line_active(), &first_line).unwrap(),
        2
    );
}

#[test]
fn test_absent_specification() {
    init();
    let data = orders();
    assert!(matches!(
        data.where_satisfies(None),
        Err(SpecError::NullArgument(_))
    ));

    // The query path leaves the query unchanged instead
    let engine = engine();
    let query = engine.query::<Order>("orders").where_spec(None);
    assert_eq!(query.count().unwrap(), 3);
    let query = query.where_via::<Line>(None, None);
    assert_eq!(query.count().unwrap(), 3);
}

#[test]
fn test_group_to_dictionary() {
    init();
    let region = Projection::<Order, String>::new("o", |o| o.member("region"));
    let total = Projection::<Grouping<String, Order>, i64>::new("g", |g| {
        g.member("items")
            .select(Lambda::unary("o", |o| {
                o.member("lines")
                    .select(Lambda::unary("l", |l| l.member("quantity")))
                    .sum()
            }))
            .sum()
    });
    let selector = ExpressionGroupSelector::new(region, total);

    let data = orders();
    let totals = data.group_to_dictionary::<String, i64>(&selector).unwrap();
    assert_eq!(totals["north"], 10);
    assert_eq!(totals["south"], 5);

    let engine = engine();
    let totals = engine
        .query::<Order>("orders")
        .group_to_dictionary::<String, i64>(&selector)
        .unwrap();
    assert_eq!(totals["north"], 10);
    assert_eq!(totals["south"], 5);
}

#[test]
fn test_composed_specification_in_both_paths() {
    init();
    let spec = id_is("22").and(ExpressionSpec::new(has_active_line()));
    let data = orders();
    assert_eq!(data.count_satisfying(&spec).unwrap(), 1);
    assert!(data.any_satisfying(&spec).unwrap());
    assert_eq!(
        data.first_satisfying(&spec).unwrap().map(|o| o.lines.len()),
        Some(2)
    );

    let engine = engine();
    let query = engine.query::<Order>("orders").where_spec(Some(&spec));
    assert_eq!(query.count().unwrap(), 1);
}

#[tokio::test]
async fn test_async_query_terminals() {
    init();
    let engine = engine();
    let spec = ExpressionSpec::new(has_active_line());
    let query = engine.query::<Order>("orders").where_spec(Some(&spec));

    assert_eq!(query.count_async().await.unwrap(), 2);
    assert!(query.any_async().await.unwrap());
    assert_eq!(
        query.first_async().await.unwrap().map(|o| o.id),
        Some("11".to_string())
    );

    let counts = query.group_and_count_dictionary_async::<String>(&by_id()).await.unwrap();
    assert_eq!(counts["11"], 1);
    assert_eq!(counts["22"], 1);

    let quantity = Projection::<Order, f64>::new("o", |o| {
        o.member("lines")
            .select(Lambda::unary("l", |l| l.member("quantity")))
            .sum()
    });
    assert_eq!(query.average_async(&quantity).await.unwrap(), Some(5.0));
}
