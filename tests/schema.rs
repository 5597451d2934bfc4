use batchq::schema::{schema_fn, Issue, Schema, SchemaError, SerdeSchema};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, PartialEq, serde::Deserialize)]
struct Account {
    id: u64,
    email: String,
}

#[test]
fn test_serde_schema() {
    let schema = SerdeSchema::<Account>::new();

    let account = schema
        .parse(&json!({ "id": 3, "email": "a@example.com" }))
        .expect("parse");
    assert_eq!(
        account,
        Account {
            id: 3,
            email: "a@example.com".into()
        }
    );

    let error = schema.parse(&json!({ "id": "3" })).expect_err("invalid");
    assert_eq!(error.issues().len(), 1);
}

#[test]
fn test_schema_fn_reports_every_issue() {
    let schema = schema_fn(|value: &serde_json::Value| {
        let mut issues = Vec::new();
        if !value["id"].is_u64() {
            issues.push(Issue::new("id", "expected an integer"));
        }
        if !value["email"].as_str().is_some_and(|email| email.contains('@')) {
            issues.push(Issue::new("email", "expected an email address"));
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::new(issues))
        }
    });

    let error = schema.parse(&json!({ "id": -1, "email": "nope" })).expect_err("invalid");
    assert_eq!(
        error.to_string(),
        "id: expected an integer; email: expected an email address"
    );
}

#[test]
fn test_shared_schema() {
    let schema: Arc<dyn Schema<Account>> = Arc::new(SerdeSchema::<Account>::new());
    let again = Arc::clone(&schema);

    assert!(schema.parse(&json!({ "id": 1, "email": "x@y" })).is_ok());
    assert!(again.parse(&json!(null)).is_err());
}
