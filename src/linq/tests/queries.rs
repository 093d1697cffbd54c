use pretty_assertions::assert_eq;

use super::*;
use crate::ast::Node;
use crate::error::QueryError;
use crate::linq::{BuildInfo, ConvertFlags, ExpressionBuilder, Projection, QueryKind};
use crate::sql_provider::BoundParameter;
use crate::value::{ScalarType, Value};

#[test]
fn test_select_all() {
    assert_eq!(
        sql_server(&people()),
        "SELECT\n\t[t1].[PersonID],\n\t[t1].[FirstName],\n\t[t1].[LastName]\nFROM\n\t[Person] [t1]"
    );
}

#[test]
fn test_where_with_projection() {
    let query = call(
        "Select",
        vec![
            call(
                "Where",
                vec![people(), lambda(p("PersonID").equal(Expr::query_param("id", 5)))],
            ),
            lambda(Expr::new_object([("Name", p("FirstName"))])),
        ],
    );

    let statement = render(&DataProvider::sql_server("2008"), &query);
    assert_eq!(
        statement.sql,
        "SELECT\n\t[p].[FirstName]\nFROM\n\t[Person] [p]\nWHERE\n\t[p].[PersonID] = @id"
    );
    assert_eq!(
        statement.parameters,
        vec![BoundParameter {
            name: "@id".into(),
            value: Value::Int(5)
        }]
    );

    assert_eq!(
        plan(&query).kind(),
        &QueryKind::Rows(Projection::Record(vec![(
            "Name".to_string(),
            Projection::Column {
                index: 0,
                system_type: ScalarType::String
            }
        )]))
    );
}

#[test]
fn test_projection_reads_rows() {
    let query = call(
        "Select",
        vec![
            people(),
            lambda(Expr::new_object([("Id", p("PersonID")), ("Name", p("FirstName"))])),
        ],
    );
    let QueryKind::Rows(projection) = plan(&query).kind().clone() else {
        panic!("expected rows");
    };
    let row = [Value::Int(3), Value::from("Ann")];
    assert_eq!(
        projection.read(&row).unwrap(),
        Value::record([("Id", Value::Int(3)), ("Name", Value::from("Ann"))])
    );
}

#[test]
fn test_identity_select_keeps_source() {
    let query = call("Select", vec![people(), lambda(Expr::param("p"))]);
    assert_eq!(sql_server(&query), sql_server(&people()));
}

#[test]
fn test_order_by_then_by() {
    let query = call(
        "ThenBy",
        vec![
            call("OrderBy", vec![people(), lambda(p("LastName"))]),
            lambda(p("FirstName")),
        ],
    );

    let compiled = plan(&query);
    let order_by = &compiled.tree().query(compiled.query()).unwrap().order_by;
    assert_eq!(order_by.len(), 2);
    assert!(order_by.iter().all(|item| !item.is_descending));

    assert_eq!(
        sql_server(&query),
        "SELECT\n\t[p].[PersonID],\n\t[p].[FirstName],\n\t[p].[LastName]\nFROM\n\t[Person] [p]\nORDER BY\n\t[p].[LastName],\n\t[p].[FirstName]"
    );
}

#[test]
fn test_order_by_replaces_previous_order() {
    let query = call(
        "OrderByDescending",
        vec![
            call("OrderBy", vec![people(), lambda(p("LastName"))]),
            lambda(p("FirstName")),
        ],
    );
    assert!(sql_server(&query).ends_with("ORDER BY\n\t[p].[FirstName] DESC"));
}

#[test]
fn test_order_by_entity_uses_keys() {
    let query = call("OrderBy", vec![people(), lambda(Expr::param("p"))]);
    assert!(sql_server(&query).ends_with("ORDER BY\n\t[p].[PersonID]"));
}

#[test]
fn test_order_by_explicit_construction_rejected() {
    let query = call(
        "OrderBy",
        vec![
            people(),
            lambda(Expr::member_init("Person", Vec::<(&str, Expr)>::new())),
        ],
    );
    let err = compile(&DataProvider::generic(), &schema(), &query).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Unsupported query: Explicit construction of entity type 'Person' in order by is not allowed."
    );
}

#[test]
fn test_where_and_splits_conditions() {
    let predicate = p("PersonID")
        .equal(Expr::constant(1))
        .and(p("FirstName").equal(Expr::constant("Ann")));
    let query = call("Where", vec![people(), lambda(predicate)]);
    assert!(
        generic(&query).ends_with("WHERE\n\t\"p\".\"PersonID\" = 1 AND \"p\".\"FirstName\" = 'Ann'"),
        "{}",
        generic(&query)
    );
    let compiled = plan(&query);
    let where_clause = compiled.tree().query(compiled.query()).unwrap().where_clause;
    let Node::SearchCondition(sc) = compiled.tree().node(where_clause) else {
        panic!("where clause is not a search condition");
    };
    assert_eq!(sc.conditions.len(), 2);
}

#[test]
fn test_null_comparison_becomes_is_null() {
    let query = call(
        "Where",
        vec![people(), lambda(p("LastName").equal(Expr::constant(Value::Null)))],
    );
    assert!(sql_server(&query).ends_with("WHERE\n\t[p].[LastName] IS NULL"));
}

#[test]
fn test_contains_escapes_like_pattern() {
    let query = call(
        "Where",
        vec![
            people(),
            lambda(Expr::function(
                "Contains",
                vec![p("FirstName"), Expr::constant("50% off [sale]")],
            )),
        ],
    );

    let text = sql_server(&query);
    assert!(
        text.ends_with("WHERE\n\t[p].[FirstName] LIKE N'%50~% off [[]sale]%' ESCAPE N'~'"),
        "{}",
        text
    );

    let text = generic(&query);
    assert!(text.contains("LIKE '%50~% off [sale]%'"), "{}", text);
    assert!(!text.contains("[[]"));
}

#[test]
fn test_starts_with_parameter_pattern() {
    let query = call(
        "Where",
        vec![
            people(),
            lambda(Expr::function(
                "StartsWith",
                vec![p("FirstName"), Expr::query_param("prefix", "A_")],
            )),
        ],
    );
    let statement = render(&DataProvider::sql_server("2008"), &query);
    assert!(
        statement.sql.ends_with("[p].[FirstName] LIKE @prefix ESCAPE N'~'"),
        "{}",
        statement.sql
    );
    assert_eq!(statement.parameters[0].value, Value::from("A~_%"));
}

#[test]
fn test_contains_list_expands_to_in() {
    let ids = Value::from(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    let query = call(
        "Where",
        vec![
            people(),
            lambda(Expr::function(
                "Contains",
                vec![Expr::query_param("ids", ids), p("PersonID")],
            )),
        ],
    );
    let statement = render(&DataProvider::sql_server("2008"), &query);
    assert!(statement.sql.ends_with("[p].[PersonID] IN (1, 2, 3)"), "{}", statement.sql);
    assert!(statement.parameters.is_empty());

    let empty = call(
        "Where",
        vec![
            people(),
            lambda(Expr::function(
                "Contains",
                vec![Expr::query_param("ids", Vec::<Value>::new()), p("PersonID")],
            )),
        ],
    );
    assert!(sql_server(&empty).ends_with("WHERE\n\t1 = 0"));
}

#[test]
fn test_unknown_member() {
    let query = call("Where", vec![people(), lambda(p("Age").equal(Expr::constant(1)))]);
    let err = compile(&DataProvider::generic(), &schema(), &query).unwrap_err();
    assert!(matches!(err, QueryError::UnknownMember { ref member, .. } if member == "Age"), "{}", err);
}

#[test]
fn test_entity_in_scalar_position_rejected() {
    let query = call("Where", vec![people(), lambda(Expr::param("p").equal(Expr::constant(1)))]);
    let err = compile(&DataProvider::generic(), &schema(), &query).unwrap_err();
    assert!(matches!(err, QueryError::Unsupported(_)), "{}", err);
}

#[test]
fn test_unknown_operator() {
    let query = call("GroupJoin", vec![people(), people()]);
    let err = compile(&DataProvider::generic(), &schema(), &query).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Unsupported query: 'GroupJoin' with 2 argument(s) is not supported"
    );
}

#[test]
fn test_scalar_select() {
    let query = call("Select", vec![thunk(Expr::constant(1))]);
    assert_eq!(sql_server(&query), "SELECT\n\t1 as [c1]");
    assert_eq!(
        plan(&query).kind(),
        &QueryKind::Scalar(Projection::Column {
            index: 0,
            system_type: ScalarType::Int
        })
    );
}

#[test]
fn test_where_after_take_wraps() {
    let query = call(
        "Where",
        vec![
            call("Take", vec![people(), Expr::constant(5)]),
            lambda(p("FirstName").equal(Expr::constant("Ann"))),
        ],
    );
    let text = generic(&query);
    assert!(text.contains("LIMIT 5\n\t) \"p\""), "{}", text);
    assert!(text.ends_with("WHERE\n\t\"p\".\"FirstName2\" = 'Ann'"), "{}", text);

    let compiled = plan(&query);
    let QueryKind::Rows(projection) = compiled.kind() else {
        panic!("expected rows");
    };
    assert_eq!(projection.columns(), vec![0, 1, 2]);
}

#[test]
fn test_distinct_then_order_by_wraps_on_sql_server() {
    let query = call(
        "OrderBy",
        vec![
            call("Distinct", vec![call("Select", vec![people(), lambda(p("LastName"))])]),
            lambda(Expr::param("p")),
        ],
    );
    let text = sql_server(&query);
    assert!(text.contains("SELECT DISTINCT"), "{}", text);
    let order_by = text.rfind("ORDER BY").unwrap();
    assert!(order_by > text.rfind(')').unwrap(), "{}", text);
}

#[test]
fn test_sequence_probes() {
    let provider = DataProvider::generic();
    let schema = schema();
    let mut builder = ExpressionBuilder::new(&provider, &schema);
    let query = builder.tree.new_query();

    let filter = call("Where", vec![people(), lambda(p("PersonID").equal(Expr::constant(1)))]);
    let delete = call("Delete", vec![people()]);
    let select = call(
        "Select",
        vec![people(), lambda(Expr::new_object([("A", p("FirstName")), ("B", p("LastName"))]))],
    );

    assert!(builder.is_sequence(&BuildInfo::new(&filter, query)).unwrap());
    assert!(!builder.is_sequence(&BuildInfo::new(&delete, query)).unwrap());
    assert!(!builder.is_sequence(&BuildInfo::new(&Expr::constant(1), query)).unwrap());

    let members = builder
        .convert_sequence(&BuildInfo::new(&select, query))
        .unwrap()
        .unwrap()
        .members;
    assert_eq!(members, vec!["A".to_string(), "B".to_string()]);
    let members = builder
        .convert_sequence(&BuildInfo::new(&people(), query))
        .unwrap()
        .unwrap()
        .members;
    assert_eq!(members, vec!["PersonID", "FirstName", "LastName"]);
}

#[test]
fn test_plan_renders_for_several_providers() {
    let compiled = plan(&call("Take", vec![people(), Expr::constant(2)]));
    let generic = compiled.sql(&DataProvider::generic()).unwrap().sql;
    let sql_server = compiled.sql(&DataProvider::sql_server("2008")).unwrap().sql;
    assert!(generic.ends_with("LIMIT 2"), "{}", generic);
    assert!(sql_server.starts_with("SELECT TOP (2)\n"), "{}", sql_server);
    assert_eq!(compiled.sql(&DataProvider::generic()).unwrap().sql, generic);
}

#[test]
fn test_scalar_select_of_constants_adds_dummy_column() {
    let query = call(
        "Select",
        vec![thunk(Expr::new_object([
            ("A", Expr::constant(1)),
            ("B", Expr::constant(2)),
        ]))],
    );
    assert_eq!(sql_server(&query), "SELECT\n\t1 as [c1]");
    assert_eq!(
        plan(&query).kind(),
        &QueryKind::Scalar(Projection::Record(vec![
            ("A".to_string(), Projection::Value(Value::Int(1))),
            ("B".to_string(), Projection::Value(Value::Int(2))),
        ]))
    );
}

#[test]
fn test_parent_index_through_two_sub_queries() {
    let provider = DataProvider::generic();
    let schema = schema();
    let mut builder = ExpressionBuilder::new(&provider, &schema);
    let query = builder.tree.new_query();
    let table = builder.build_sequence(&BuildInfo::new(&people(), query)).unwrap();
    builder
        .convert_to_index(table, &["PersonID".to_string()], ConvertFlags::Field)
        .unwrap();
    let middle = builder.wrap_in_sub_query(table).unwrap();
    let outer = builder.wrap_in_sub_query(middle).unwrap();

    let infos = builder
        .convert_to_index(table, &["LastName".to_string()], ConvertFlags::Field)
        .unwrap();
    let index = infos[0].index.unwrap();
    assert_eq!(index, 1);

    // Nothing was projected by the wrappers yet, so the column lands first in each.
    let outer_index = builder.convert_to_parent_index(table, index, outer).unwrap();
    assert_eq!(outer_index, 0);
    let middle_query = builder.query_of(middle).unwrap();
    assert_eq!(builder.tree().query(middle_query).unwrap().select.columns.len(), 1);

    let outer_query = builder.query_of(outer).unwrap();
    let column = builder.tree().query(outer_query).unwrap().select.columns[outer_index];
    let field = builder.tree().underlying_field(column).unwrap();
    assert_eq!(builder.tree().field(field).unwrap().name, "LastName");

    // Re-carrying the same column reuses it at every level.
    assert_eq!(builder.convert_to_parent_index(table, index, outer).unwrap(), outer_index);
    assert_eq!(builder.tree().query(outer_query).unwrap().select.columns.len(), 1);

    assert!(matches!(
        builder.convert_to_parent_index(outer, 0, table),
        Err(QueryError::Internal(_))
    ));
}

#[test]
fn test_projection_through_nested_wraps() {
    let query = call(
        "OrderBy",
        vec![
            call("Distinct", vec![call("Take", vec![people(), Expr::constant(5)])]),
            lambda(p("LastName")),
        ],
    );
    let compiled = plan(&query);
    let QueryKind::Rows(projection) = compiled.kind() else {
        panic!("expected rows");
    };
    let row = [Value::Int(7), Value::from("Ann"), Value::from("Lee")];
    assert_eq!(
        projection.read(&row).unwrap(),
        Value::record([
            ("PersonID", Value::Int(7)),
            ("FirstName", Value::from("Ann")),
            ("LastName", Value::from("Lee")),
        ])
    );
}
