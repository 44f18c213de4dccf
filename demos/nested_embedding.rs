//! Demo of composing, embedding and running specifications

use serde::{Deserialize, Serialize};
use specweave::expression::{Expression, Lambda};
use specweave::sequence::Terminal;
use specweave::specification::{
    embed, ExpressionSelector, ExpressionSpec, Predicate, Projection, SpecificationExt,
};
use specweave::{MemoryEngine, SpecificationSliceExt};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Tag {
    label: String,
    visible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Article {
    id: String,
    author: String,
    tags: Vec<Tag>,
}

fn article(id: &str, author: &str, tags: &[(&str, bool)]) -> Article {
    Article {
        id: id.to_string(),
        author: author.to_string(),
        tags: tags
            .iter()
            .map(|(label, visible)| Tag {
                label: label.to_string(),
                visible: *visible,
            })
            .collect(),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();

    println!("Specification Composition Demo");
    println!("==============================");

    let articles = vec![
        article("1", "ada", &[("rust", true), ("draft", false)]),
        article("2", "grace", &[("cobol", false)]),
        article("3", "ada", &[("compilers", true)]),
        article("4", "linus", &[]),
    ];

    // Example 1: combining reusable specifications
    println!("\n1. Composition");
    println!("--------------");

    let by_ada = ExpressionSpec::<Article>::new(Predicate::new("a", |a| {
        Expression::eq(a.member("author"), Expression::string("ada"))
    }));
    let not_first = ExpressionSpec::<Article>::new(Predicate::new("a", |a| {
        Expression::ne(a.member("id"), Expression::string("1"))
    }));
    let spec = by_ada.and(not_first);
    let found = articles.where_satisfies(Some(&spec))?;
    println!("by ada, not #1: {:?}", found.iter().map(|a| &a.id).collect::<Vec<_>>());

    // Example 2: a specification embedded inside a hand-written tree
    println!("\n2. Embedding");
    println!("------------");

    let visible = ExpressionSpec::<Tag>::new(Predicate::new("t", |t| t.member("visible")));
    let handle = embed::specification(visible);
    let has_visible_tag = Predicate::<Article>::new("a", |a| {
        a.member("tags")
            .any(Lambda::unary("t", |t| handle.invoke(vec![t])))
    });
    println!("as written: {}", has_visible_tag);
    println!("resolved:   {}", has_visible_tag.resolve_embedded()?);

    // Example 3: running the same trees through a query engine
    println!("\n3. Query engine");
    println!("---------------");

    let engine = MemoryEngine::new();
    engine.insert("articles", &articles)?;

    let query = engine
        .query::<Article>("articles")
        .filter(has_visible_tag.clone());
    println!("plan:  {}", query.plan(Terminal::Count)?);
    println!("count: {}", query.count()?);

    let author = ExpressionSelector::new(Projection::<Article, String>::new("a", |a| {
        a.member("author")
    }));
    let per_author = engine
        .query::<Article>("articles")
        .group_and_count_dictionary::<String>(&author)?;
    println!("per author: {:?}", per_author);

    Ok(())
}
