use pretty_assertions::assert_eq;
use querygen::prelude::*;

const CONFIG: &str = r#"
[provider]
name = "SqlServer"
version = "2012"

[[entities]]
name = "Person"
table = "People"
schema = "dbo"

[[entities.columns]]
member = "Id"
column = "PersonID"
type = "int"
primary_key = 1
identity = true

[[entities.columns]]
member = "Name"
type = "nvarchar(100)"
"#;

/// `People.Where(p => p.Name == @name).OrderBy(p => p.Id).Skip(10).Take(5)`
const PAGED: &str = r#"
{"Call": {"method": "Take", "args": [
  {"Call": {"method": "Skip", "args": [
    {"Call": {"method": "OrderBy", "args": [
      {"Call": {"method": "Where", "args": [
        {"Table": "Person"},
        {"Lambda": {"params": ["p"], "body":
          {"Binary": {"op": "Equal",
            "left": {"Member": {"expr": {"Parameter": "p"}, "member": "Name"}},
            "right": {"QueryParam": {"name": "name", "value": {"String": "Ann"}}}}}}}
      ]}},
      {"Lambda": {"params": ["p"], "body": {"Member": {"expr": {"Parameter": "p"}, "member": "Id"}}}}
    ]}},
    {"Constant": {"Int": 10}}
  ]}},
  {"Constant": {"Int": 5}}
]}}
"#;

fn setup(version: Option<&str>) -> (DataProvider, MappingSchema) {
    let mut config = CompilerConfig::from_toml(CONFIG).unwrap();
    if let Some(version) = version {
        config.provider.version = Some(version.to_string());
    }
    (config.provider().unwrap(), config.schema())
}

fn compile_json(json: &str, version: Option<&str>) -> SqlStatement {
    let (provider, schema) = setup(version);
    let expr: Expr = serde_json::from_str(json).unwrap();
    compile(&provider, &schema, &expr)
        .unwrap()
        .sql(&provider)
        .unwrap()
}

#[test]
fn test_offset_fetch_paging() {
    let statement = compile_json(PAGED, None);
    assert_eq!(
        statement.sql,
        "SELECT\n\t[p].[PersonID],\n\t[p].[Name]\nFROM\n\t[dbo].[People] [p]\nWHERE\n\t[p].[Name] = @name\nORDER BY\n\t[p].[PersonID]\nOFFSET 10 ROWS FETCH NEXT 5 ROWS ONLY"
    );
    assert_eq!(
        statement.parameters,
        vec![BoundParameter {
            name: "@name".into(),
            value: Value::from("Ann")
        }]
    );
}

#[test]
fn test_row_number_paging() {
    let statement = compile_json(PAGED, Some("2005"));
    assert!(statement.sql.contains("ROW_NUMBER() OVER"), "{}", statement.sql);
    assert!(statement.sql.ends_with("BETWEEN 11 AND 15"), "{}", statement.sql);
}

#[test]
fn test_generic_paging() {
    let (_, schema) = setup(None);
    let provider = DataProvider::generic();
    let expr: Expr = serde_json::from_str(PAGED).unwrap();
    let statement = compile(&provider, &schema, &expr).unwrap().sql(&provider).unwrap();
    assert!(statement.sql.ends_with("LIMIT 5 OFFSET 10"), "{}", statement.sql);
    assert!(statement.sql.contains("\"p\".\"Name\" = :name"), "{}", statement.sql);
}

#[test]
fn test_skip_unsupported_on_2000() {
    let (provider, schema) = setup(Some("2000"));
    let expr: Expr = serde_json::from_str(PAGED).unwrap();
    let err = compile(&provider, &schema, &expr).unwrap_err();
    assert!(matches!(err, QueryError::Unsupported(_)), "{}", err);
}

#[test]
fn test_unknown_entity() {
    let (provider, schema) = setup(None);
    let err = compile(&provider, &schema, &Expr::table("Order")).unwrap_err();
    assert_eq!(err.to_string(), "Unknown entity: 'Order'");
}

#[test]
fn test_insert_with_identity_reads_scalar() {
    let json = r#"
{"Call": {"method": "InsertWithIdentity", "args": [
  {"Table": "Person"},
  {"Lambda": {"params": [], "body":
    {"MemberInit": {"type_name": "Person", "bindings": [
      {"Assignment": {"member": "Name", "expr": {"Constant": {"String": "Ann"}}}}
    ]}}}}
]}}
"#;
    let (provider, schema) = setup(None);
    let expr: Expr = serde_json::from_str(json).unwrap();
    let plan = compile(&provider, &schema, &expr).unwrap();

    let statement = plan.sql(&provider).unwrap();
    assert_eq!(
        statement.sql,
        "INSERT INTO [dbo].[People]\n(\n\t[Name]\n)\nOUTPUT [INSERTED].[PersonID]\nVALUES\n(\n\tN'Ann'\n)"
    );

    let QueryKind::Scalar(projection) = plan.kind() else {
        panic!("expected a scalar result");
    };
    assert_eq!(projection.read(&[Value::Int(42)]).unwrap(), Value::Int(42));
}
