use pretty_assertions::assert_eq;

use super::*;
use crate::ast::{Like, QueryType, SetExpression};
use crate::error::QueryError;
use crate::sql_provider::{BoundParameter, DataProvider};

#[test]
fn test_select_with_parameter() {
    let mut tree = SqlTree::new();
    let (query, table) = select_first_names(&mut tree);
    let id = parameter(&mut tree, "id", 7);
    where_id_equals(&mut tree, query, table, id);

    let statement = DataProvider::generic().build_sql(&mut tree, query).unwrap();
    assert_eq!(
        statement.sql,
        "SELECT\n\t\"t1\".\"FirstName\"\nFROM\n\t\"Person\" \"t1\"\nWHERE\n\t\"t1\".\"PersonID\" = :id"
    );
    assert_eq!(
        statement.parameters,
        vec![BoundParameter {
            name: ":id".into(),
            value: Value::Int(7)
        }]
    );
}

#[test]
fn test_limit_offset() {
    let mut tree = SqlTree::new();
    let (query, table) = select_first_names(&mut tree);
    let last_name = tree.table_field(table, "LastName").unwrap();
    tree.order_by_add(query, last_name, true).unwrap();
    let skip = tree.value(5);
    let take = tree.value(10);
    let q = tree.query_mut(query).unwrap();
    q.select.skip = Some(skip);
    q.select.take = Some(take);

    let sql = DataProvider::generic().build_sql(&mut tree, query).unwrap().sql;
    assert_eq!(
        sql,
        "SELECT\n\t\"t1\".\"FirstName\"\nFROM\n\t\"Person\" \"t1\"\nORDER BY\n\t\"t1\".\"LastName\" DESC\nLIMIT 10 OFFSET 5"
    );
}

#[test]
fn test_like_literal_is_not_bracket_escaped() {
    let mut tree = SqlTree::new();
    let (query, table) = select_first_names(&mut tree);
    let first_name = tree.table_field(table, "FirstName").unwrap();
    let pattern = tree.value("50% off [sale]");
    let like = tree.add(Like {
        expr: first_name,
        is_not: false,
        pattern,
        escape: None,
    });
    tree.where_add(query, like).unwrap();

    let sql = DataProvider::generic().build_sql(&mut tree, query).unwrap().sql;
    assert!(sql.ends_with("WHERE\n\t\"t1\".\"FirstName\" LIKE '50% off [sale]'"), "{}", sql);
}

#[test]
fn test_sub_query_source() {
    let mut tree = SqlTree::new();
    let (inner, _) = select_first_names(&mut tree);
    let outer = tree.new_query();
    tree.add_from(outer, inner, None).unwrap();
    let inner_column = tree.query(inner).unwrap().select.columns[0];
    tree.select_add(outer, inner_column).unwrap();

    let sql = DataProvider::generic().build_sql(&mut tree, outer).unwrap().sql;
    assert_eq!(
        sql,
        "SELECT\n\t\"t1\".\"FirstName2\" as \"FirstName\"\nFROM\n\t(\n\t\tSELECT\n\t\t\t\"t2\".\"FirstName\" as \"FirstName2\"\n\t\tFROM\n\t\t\t\"Person\" \"t2\"\n\t) \"t1\""
    );
}

#[test]
fn test_update_and_delete() {
    let mut tree = SqlTree::new();
    let query = tree.new_query();
    let table = tree.table_from_entity(&person());
    tree.add_from(query, table, None).unwrap();
    let last_name = tree.table_field(table, "LastName").unwrap();
    let value = tree.value("X");
    let one = tree.value(1);
    where_id_equals(&mut tree, query, table, one);
    let q = tree.query_mut(query).unwrap();
    q.query_type = QueryType::Update;
    q.update.items.push(SetExpression {
        column: last_name,
        expr: value,
    });

    let provider = DataProvider::generic();
    assert_eq!(
        provider.build_sql(&mut tree, query).unwrap().sql,
        "UPDATE\n\t\"Person\" \"t1\"\nSET\n\t\"LastName\" = 'X'\nWHERE\n\t\"t1\".\"PersonID\" = 1"
    );

    let q = tree.query_mut(query).unwrap();
    q.query_type = QueryType::Delete;
    assert_eq!(
        provider.build_sql(&mut tree, query).unwrap().sql,
        "DELETE\nFROM\n\t\"Person\" \"t1\"\nWHERE\n\t\"t1\".\"PersonID\" = 1"
    );
}

#[test]
fn test_insert_with_identity_query() {
    let mut tree = SqlTree::new();
    let query = tree.new_query();
    let table = tree.table_from_entity(&person());
    let first_name = tree.table_field(table, "FirstName").unwrap();
    let name = parameter(&mut tree, "FirstName", "Ann");
    let q = tree.query_mut(query).unwrap();
    q.query_type = QueryType::Insert;
    q.insert.into = Some(table);
    q.insert.with_identity = true;
    q.insert.items.push(SetExpression {
        column: first_name,
        expr: name,
    });

    let sql = DataProvider::generic().build_sql(&mut tree, query).unwrap().sql;
    assert_eq!(
        sql,
        "INSERT INTO \"Person\"\n(\n\t\"FirstName\"\n)\nVALUES\n(\n\t:FirstName\n)\n\nSELECT LAST_INSERT_ID()"
    );
}

#[test]
fn test_insert_or_update_not_supported() {
    let mut tree = SqlTree::new();
    let query = tree.new_query();
    tree.query_mut(query).unwrap().query_type = QueryType::InsertOrUpdate;
    assert!(matches!(
        DataProvider::generic().build_sql(&mut tree, query),
        Err(QueryError::Render(_))
    ));
}

#[test]
fn test_create_table() {
    let mut tree = SqlTree::new();
    let query = tree.new_query();
    let table = tree.table_from_entity(&person());
    let q = tree.query_mut(query).unwrap();
    q.query_type = QueryType::CreateTable;
    q.create_table.table = Some(table);

    let sql = DataProvider::generic().build_sql(&mut tree, query).unwrap().sql;
    assert_eq!(
        sql,
        "CREATE TABLE \"Person\"\n(\n\t\"PersonID\" Int NOT NULL GENERATED BY DEFAULT AS IDENTITY,\n\t\"FirstName\" NVarChar(50) NOT NULL,\n\t\"LastName\" NVarChar NULL,\n\tCONSTRAINT \"PK_Person\" PRIMARY KEY (\"PersonID\")\n)"
    );
}
