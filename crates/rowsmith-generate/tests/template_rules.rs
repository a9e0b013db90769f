use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rowsmith_core::{Error, SqlType, Value};
use rowsmith_generate::descriptor::{
    auto_increment, expression, foreign_key, generated, literal, primary_key, unique,
};
use rowsmith_generate::expression::{field, lit, mul};
use rowsmith_generate::generators::{RandomInteger, RandomString};
use rowsmith_generate::{
    Catalog, DatasetGenerator, EntityTemplate, GenerateOptions, GenerationContext,
    GenerationError, ReferenceRows, Row,
};

fn customer() -> Arc<EntityTemplate> {
    EntityTemplate::builder("Customer")
        .field("id", primary_key(auto_increment()))
        .field("code", unique(generated(RandomString::new(8))))
        .build()
        .expect("customer")
}

#[test]
fn foreign_key_to_a_non_key_field_fails_at_declaration() {
    let customer = customer();
    let err = foreign_key(&customer, &["code"]).unwrap_err();
    match err {
        Error::Integrity(message) => assert!(message.contains("expected primary key")),
        other => panic!("expected integrity error, got {other:?}"),
    }

    let err = foreign_key(&customer, &["missing"]).unwrap_err();
    assert!(matches!(err, Error::Integrity(_)));
}

#[test]
fn foreign_key_without_fields_is_an_empty_key() {
    let err = foreign_key(&customer(), &[]).unwrap_err();
    assert!(matches!(err, Error::EmptyKey(_)));
}

#[test]
fn primary_key_cannot_wrap_a_key_marker() {
    let err = EntityTemplate::builder("Broken")
        .field("id", primary_key(primary_key(auto_increment())))
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::EmptyKey(_)));
}

#[test]
fn duplicate_fields_and_unknown_references_are_rejected() {
    let err = EntityTemplate::builder("Twice")
        .field("a", literal(1))
        .field("a", literal(2))
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::InvalidSchema(_)));

    let err = EntityTemplate::builder("Dangling")
        .field("total", expression(mul(field("price"), lit(2))))
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::InvalidSchema(message) if message.contains("price")));
}

#[test]
fn foreign_key_columns_take_the_referenced_type() {
    let customer = customer();
    let order = EntityTemplate::builder("Order")
        .field("id", primary_key(auto_increment()))
        .field("customer", foreign_key(&customer, &["id"]).expect("fk"))
        .field("_quantity", generated(RandomInteger::new(1, 5)))
        .field("total", expression(mul(field("_quantity"), lit(2.5))))
        .build()
        .expect("order");

    let types = order.column_types().expect("types");
    assert_eq!(
        types,
        vec![
            ("id", SqlType::Integer),
            ("customer", SqlType::Integer),
            ("total", SqlType::Float),
        ]
    );
    assert_eq!(order.dependencies(), vec!["Customer"]);
    assert_eq!(order.column_type("_quantity").expect("hidden"), SqlType::Integer);
}

#[test]
fn standalone_generation_needs_references() {
    let customer = customer();
    let order = EntityTemplate::builder("Order")
        .field("customer", foreign_key(&customer, &["id"]).expect("fk"))
        .build()
        .expect("order");

    let catalog = Catalog::builtin();
    let mut rng = ChaCha8Rng::seed_from_u64(4);
    let mut ctx = GenerationContext::new(&mut rng, &catalog);
    let err = order.generate(&mut ctx).unwrap_err();
    assert!(matches!(
        err,
        GenerationError::DatasetRequired { ref entity, ref field, ref target }
            if entity == "Order" && field == "customer" && target == "Customer"
    ));
}

#[test]
fn fixed_reference_rows_satisfy_foreign_keys() {
    let customer = customer();
    let order = EntityTemplate::builder("Order")
        .field("customer", foreign_key(&customer, &["id"]).expect("fk"))
        .build()
        .expect("order");
    let existing: Row = [("id", Value::Int(42)), ("code", Value::from("ABCDEFGH"))]
        .into_iter()
        .collect();
    let mut references = ReferenceRows::new().with("Customer", vec![existing]);

    let catalog = Catalog::builtin();
    let mut rng = ChaCha8Rng::seed_from_u64(4);
    let mut ctx = GenerationContext::new(&mut rng, &catalog).with_references(&mut references);
    let row = order.generate(&mut ctx).expect("row");
    assert_eq!(row.get("customer"), Some(&Value::Int(42)));
}

#[test]
fn empty_reference_rows_are_an_integrity_error() {
    let customer = customer();
    let order = EntityTemplate::builder("Order")
        .field("customer", foreign_key(&customer, &["id"]).expect("fk"))
        .build()
        .expect("order");
    let mut references = ReferenceRows::new().with("Customer", Vec::new());

    let catalog = Catalog::builtin();
    let mut rng = ChaCha8Rng::seed_from_u64(4);
    let mut ctx = GenerationContext::new(&mut rng, &catalog).with_references(&mut references);
    let err = order.generate(&mut ctx).unwrap_err();
    assert!(matches!(err, GenerationError::Integrity(_)));
}

#[test]
fn a_finished_dataset_serves_references() {
    let customer = customer();
    let order = EntityTemplate::builder("Order")
        .field("customer", foreign_key(&customer, &["id"]).expect("fk"))
        .build()
        .expect("order");
    let mut dataset = DatasetGenerator::new(
        [(Arc::clone(&customer), 3)],
        &GenerateOptions::default().with_seed(8),
    )
    .expect("dataset");

    let catalog = Catalog::builtin();
    let mut rng = ChaCha8Rng::seed_from_u64(4);
    let mut ctx = GenerationContext::new(&mut rng, &catalog).with_references(&mut dataset);
    let row = order.generate(&mut ctx).expect("row");
    let id = row.get("customer").and_then(Value::as_i64).expect("customer id");
    assert!((1..=3).contains(&id));
}

#[test]
fn hidden_fields_feed_expressions_but_are_not_emitted() {
    let line = EntityTemplate::builder("Line")
        .field("_unit", literal(3))
        .field("double", expression(mul(field("_unit"), lit(2))))
        .build()
        .expect("line");

    let catalog = Catalog::builtin();
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let mut ctx = GenerationContext::new(&mut rng, &catalog);
    let row = line.generate(&mut ctx).expect("row");

    assert_eq!(line.column_names(), vec!["double"]);
    assert_eq!(row.columns().collect::<Vec<_>>(), vec!["double"]);
    assert_eq!(row.get("double"), Some(&Value::Int(6)));
}
