use pretty_assertions::assert_eq;

use super::*;
use crate::error::QueryError;
use crate::sql_provider::BoundParameter;
use crate::value::Value;

fn ordered() -> Expr {
    call("OrderBy", vec![people(), lambda(p("LastName"))])
}

fn take(source: Expr, count: Expr) -> Expr {
    call("Take", vec![source, count])
}

fn skip(source: Expr, count: Expr) -> Expr {
    call("Skip", vec![source, count])
}

#[test]
fn test_skip_then_take() {
    let query = take(skip(ordered(), Expr::constant(10)), Expr::constant(5));
    assert_eq!(
        generic(&query),
        "SELECT\n\t\"p\".\"PersonID\",\n\t\"p\".\"FirstName\",\n\t\"p\".\"LastName\"\nFROM\n\t\"Person\" \"p\"\nORDER BY\n\t\"p\".\"LastName\"\nLIMIT 5 OFFSET 10"
    );
}

#[test]
fn test_skip_after_take_shrinks_take() {
    let query = skip(take(ordered(), Expr::constant(15)), Expr::constant(10));
    assert!(generic(&query).ends_with("ORDER BY\n\t\"p\".\"LastName\"\nLIMIT 5 OFFSET 10"));

    let query = skip(take(ordered(), Expr::constant(3)), Expr::constant(10));
    assert!(generic(&query).ends_with("LIMIT 0 OFFSET 10"));
}

#[test]
fn test_take_twice_keeps_smaller() {
    let query = take(take(people(), Expr::constant(10)), Expr::constant(3));
    let text = generic(&query);
    assert!(text.ends_with("\nLIMIT 3"), "{}", text);
    assert!(!text.contains("LIMIT 10"));
}

#[test]
fn test_take_parameter_after_take_wraps() {
    let query = take(take(people(), Expr::constant(10)), Expr::query_param("n", 3));
    let text = generic(&query);
    assert!(text.contains("LIMIT 10"), "{}", text);
    assert!(text.ends_with("LIMIT :n"), "{}", text);
}

#[test]
fn test_skip_twice_with_parameter() {
    let query = skip(skip(people(), Expr::query_param("skip", 10)), Expr::constant(5));
    let statement = render(&DataProvider::generic(), &query);
    assert_eq!(
        statement.parameters,
        vec![BoundParameter {
            name: ":skip".into(),
            value: Value::Int(15)
        }]
    );
}

#[test]
fn test_skip_twice_with_literals() {
    let query = skip(skip(ordered(), Expr::constant(10)), Expr::constant(5));
    assert!(generic(&query).ends_with("OFFSET 15"));
}

#[test]
fn test_skip_twice_overflowing_is_rejected() {
    let query = skip(skip(ordered(), Expr::constant(i64::MAX)), Expr::constant(1i64));
    let err = compile(&DataProvider::generic(), &schema(), &query).unwrap_err();
    assert!(matches!(err, QueryError::Unsupported(_)), "{}", err);
}

#[test]
fn test_sql_server_2000_rejects_skip() {
    let query = skip(people(), Expr::constant(1));
    let err = compile(&DataProvider::sql_server("2000"), &schema(), &query).unwrap_err();
    assert!(matches!(err, QueryError::Unsupported(_)), "{}", err);
    assert_eq!(err.to_string(), "Unsupported query: 'Skip' is not supported by SqlServer.2000");
}

#[test]
fn test_take_parameter_inlined_when_not_accepted() {
    let provider = DataProvider::sql_server("2000");
    let query = take(people(), Expr::query_param("n", 3));
    let statement = render(&provider, &query);
    assert!(statement.sql.starts_with("SELECT TOP 3\n"), "{}", statement.sql);
    assert!(statement.parameters.is_empty());

    let statement = render(&DataProvider::sql_server("2008"), &query);
    assert!(statement.sql.starts_with("SELECT TOP (@n)\n"), "{}", statement.sql);
    assert_eq!(statement.parameters.len(), 1);
}

#[test]
fn test_order_by_after_take_wraps() {
    let query = call(
        "OrderBy",
        vec![take(people(), Expr::constant(5)), lambda(p("FirstName"))],
    );
    let text = sql_server(&query);
    assert!(text.contains("SELECT TOP (5)"), "{}", text);
    assert!(text.ends_with(") [p]\nORDER BY\n\t[p].[FirstName2]"), "{}", text);
}

#[test]
fn test_distinct_after_take_wraps() {
    let query = call("Distinct", vec![take(people(), Expr::constant(5))]);
    let text = generic(&query);
    assert!(text.starts_with("SELECT DISTINCT\n"), "{}", text);
    assert!(text.contains("LIMIT 5"), "{}", text);
}
