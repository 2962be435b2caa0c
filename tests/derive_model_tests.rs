use factory_persist::{DataType, FactoryError, Model, ModelArgs, Record, Value};

#[derive(Debug, Clone, Default, PartialEq, Model)]
#[model(table = "memberships", unique(org, member), unique(badge))]
struct Membership {
    #[column(primary_key)]
    id: Option<i64>,
    org: String,
    member: String,
    badge: Option<String>,
    #[column(name = "is_admin")]
    admin: bool,
    #[column(unique)]
    seat: i32,
    score: f64,
    #[column(skip)]
    cached_display: String,
}

#[derive(Debug, Clone, Default, Model)]
struct AuditEntry {
    #[column(primary_key)]
    seq: Option<i64>,
    r#type: String,
    count: u32,
}

#[test]
fn schema_reflects_declared_columns_only() {
    let schema = Membership::schema();

    assert_eq!(schema.table(), "memberships");
    assert_eq!(
        schema.field_names().collect::<Vec<_>>(),
        ["id", "org", "member", "badge", "is_admin", "seat", "score"]
    );
    assert_eq!(schema.primary_key().map(|c| c.name.as_str()), Some("id"));

    let badge = schema.column("badge").unwrap();
    assert_eq!(badge.data_type, DataType::Text);
    assert!(badge.nullable);
    assert!(!schema.column("org").unwrap().nullable);
    assert_eq!(schema.column("seat").unwrap().data_type, DataType::Integer);
    assert!(!schema.has_column("cached_display"));
}

#[test]
fn unique_constraints_keep_declaration_order() {
    let groups: Vec<Vec<String>> = Membership::schema()
        .unique_constraints()
        .iter()
        .map(|c| c.columns().to_vec())
        .collect();

    assert_eq!(
        groups,
        vec![
            vec!["org".to_string(), "member".to_string()],
            vec!["badge".to_string()],
            vec!["seat".to_string()],
        ]
    );
}

#[test]
fn field_access_uses_column_names() {
    let mut membership = Membership::from_args(
        ModelArgs::new()
            .kwarg("org", "acme")
            .kwarg("member", "ada")
            .kwarg("is_admin", true),
    )
    .unwrap();

    assert!(membership.admin);
    assert_eq!(membership.field("is_admin"), Some(Value::Boolean(true)));
    assert_eq!(membership.field("admin"), None);
    assert_eq!(membership.field("badge"), Some(Value::Null));

    membership.set_field("badge", Value::from("gold")).unwrap();
    assert_eq!(membership.badge.as_deref(), Some("gold"));

    let err = membership.set_field("cached_display", Value::from("x")).unwrap_err();
    assert!(matches!(err, FactoryError::UnknownField { model, .. } if model == "memberships"));
}

#[test]
fn records_convert_both_ways() {
    let record = Record::new()
        .with("id", 3)
        .with("org", "acme")
        .with("member", "bob")
        .with("badge", Value::Null)
        .with("is_admin", false)
        .with("seat", 12)
        .with("score", 4.5)
        .with("unrelated", "ignored");

    let membership = Membership::from_record(&record).unwrap();
    assert_eq!(membership.id, Some(3));
    assert_eq!(membership.seat, 12);
    assert_eq!(membership.badge, None);

    let back = membership.to_record();
    assert_eq!(back.len(), 7);
    assert_eq!(back.get("score"), Some(&Value::Float(4.5)));
    assert!(back.get("unrelated").is_none());
}

#[test]
fn raw_identifiers_and_default_table_names() {
    let schema = AuditEntry::schema();
    assert_eq!(schema.table(), "audit_entry");
    assert_eq!(schema.field_names().collect::<Vec<_>>(), ["seq", "type", "count"]);
    assert_eq!(schema.primary_key().map(|c| c.name.as_str()), Some("seq"));

    let entry = AuditEntry::from_args(ModelArgs::new().arg(None::<i64>).arg("login").arg(2)).unwrap();
    assert_eq!(entry.r#type, "login");
    assert_eq!(entry.count, 2);

    let err = AuditEntry::from_args(ModelArgs::new().kwarg("count", -1)).unwrap_err();
    assert!(matches!(err, FactoryError::TypeMismatch(_)));
}
