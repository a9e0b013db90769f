use std::sync::Arc;

use chrono::NaiveDate;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rowsmith_core::{CastTarget, Error, Method, SqlType, Value};
use rowsmith_generate::descriptor::{expression, generated, literal, primary_key, auto_increment};
use rowsmith_generate::expression::{
    add, attr, average, call, cast, div, draw, eq, field, ge, lit, maximum, minimum, mul, sub,
};
use rowsmith_generate::generators::{RandomDateTime, RandomInteger};
use rowsmith_generate::{
    Catalog, DatasetGenerator, EntityTemplate, GenerateOptions, GenerationContext,
    GenerationError,
};

fn reference_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn people() -> Arc<EntityTemplate> {
    let start = NaiveDate::from_ymd_opt(1960, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let end = NaiveDate::from_ymd_opt(2000, 12, 31)
        .unwrap()
        .and_hms_opt(23, 59, 59)
        .unwrap();

    EntityTemplate::builder("Person")
        .field("id", primary_key(auto_increment()))
        .field("_born", generated(RandomDateTime::between(start, end)))
        .field("birthday", expression(attr(field("_born"), "date")))
        .field(
            "age_days",
            expression(attr(sub(lit(reference_day()), field("birthday")), "days")),
        )
        .field("birth_year", expression(attr(field("_born"), "year")))
        .field(
            "consistent",
            expression(eq(attr(field("birthday"), "year"), field("birth_year"))),
        )
        .build()
        .expect("person")
}

#[test]
fn derived_fields_reuse_the_row_value() {
    let dataset = DatasetGenerator::new(
        [(people(), 25)],
        &GenerateOptions::default().with_seed(17),
    )
    .expect("dataset");

    for row in dataset.get("Person").expect("rows") {
        let birthday = match row.get("birthday") {
            Some(Value::Date(date)) => *date,
            other => panic!("birthday should be a date, got {other:?}"),
        };
        let expected = (reference_day() - birthday).num_days();
        assert_eq!(row.get("age_days"), Some(&Value::Int(expected)));
        assert_eq!(row.get("consistent"), Some(&Value::Bool(true)));
        assert!(row.get("_born").is_none());
    }

    // the hidden timestamp is drawn once per row, however many fields read it
    assert_eq!(
        dataset.report().generator_usage.get("random_datetime"),
        Some(&25)
    );
}

#[test]
fn inferred_column_types_follow_the_expression() {
    let person = people();
    let types = person.column_types().expect("types");
    assert_eq!(
        types,
        vec![
            ("id", SqlType::Integer),
            ("birthday", SqlType::Date),
            ("age_days", SqlType::Integer),
            ("birth_year", SqlType::Integer),
            ("consistent", SqlType::Boolean),
        ]
    );
}

#[test]
fn functions_and_methods_compose() {
    let stats = EntityTemplate::builder("Stats")
        .field("low", literal(4))
        .field("high", literal(10))
        .field("mean", expression(average(vec![field("low"), field("high")])))
        .field("top", expression(maximum(vec![field("low"), field("high"), lit(7)])))
        .field("bottom", expression(minimum(vec![field("low"), field("high")])))
        .field("ratio", expression(div(field("high"), field("low"))))
        .field("label", expression(cast(add(field("low"), field("high")), CastTarget::Text)))
        .field(
            "shout",
            expression(call(lit(" quiet "), Method::Trim, vec![])),
        )
        .field("big", expression(ge(field("high"), lit(10))))
        .build()
        .expect("stats");

    let catalog = Catalog::builtin();
    let mut rng = ChaCha8Rng::seed_from_u64(2);
    let mut ctx = GenerationContext::new(&mut rng, &catalog);
    let row = stats.generate(&mut ctx).expect("row");

    assert_eq!(row.get("mean"), Some(&Value::Float(7.0)));
    assert_eq!(row.get("top"), Some(&Value::Int(10)));
    assert_eq!(row.get("bottom"), Some(&Value::Int(4)));
    assert_eq!(row.get("ratio"), Some(&Value::Float(2.5)));
    assert_eq!(row.get("label"), Some(&Value::from("14")));
    assert_eq!(row.get("shout"), Some(&Value::from("quiet")));
    assert_eq!(row.get("big"), Some(&Value::Bool(true)));
}

#[test]
fn inline_generators_are_drawn_inside_the_expression() {
    let dice = EntityTemplate::builder("Roll")
        .field(
            "total",
            expression(add(draw(RandomInteger::new(1, 6)), lit(100))),
        )
        .build()
        .expect("roll");

    let catalog = Catalog::builtin();
    let mut rng = ChaCha8Rng::seed_from_u64(9);
    let mut ctx = GenerationContext::new(&mut rng, &catalog);
    for _ in 0..20 {
        let row = dice.generate(&mut ctx).expect("row");
        let total = row.get("total").and_then(Value::as_i64).expect("total");
        assert!((101..=106).contains(&total));
    }
}

#[test]
fn operation_errors_surface_from_generation() {
    let broken = EntityTemplate::builder("Broken")
        .field("zero", literal(0))
        .field("boom", expression(div(lit(1), field("zero"))))
        .build()
        .expect("broken");

    let catalog = Catalog::builtin();
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let mut ctx = GenerationContext::new(&mut rng, &catalog);
    let err = broken.generate(&mut ctx).unwrap_err();
    assert!(matches!(
        err,
        GenerationError::Core(Error::UnsupportedOperation(_))
    ));

    let mismatched = EntityTemplate::builder("Mismatched")
        .field("flag", literal(true))
        .field("sum", expression(add(field("flag"), lit(1))))
        .build()
        .expect("mismatched");
    let err = mismatched.generate(&mut ctx).unwrap_err();
    assert!(matches!(
        err,
        GenerationError::Core(Error::UnsupportedOperation(_))
    ));
}

#[test]
fn oversized_results_fail_the_dataset() {
    let repeated = EntityTemplate::builder("Repeated")
        .field("s", expression(mul(lit("ab"), lit(i64::MAX))))
        .build()
        .expect("repeated");
    let err = DatasetGenerator::new([(repeated, 1)], &GenerateOptions::default().with_seed(1))
        .unwrap_err();
    assert!(matches!(
        err,
        GenerationError::Core(Error::UnsupportedOperation(_))
    ));

    let overflow = EntityTemplate::builder("Overflow")
        .field("x", expression(mul(lit(1e300), lit(1e300))))
        .build()
        .expect("overflow");
    let err = DatasetGenerator::new([(overflow, 1)], &GenerateOptions::default().with_seed(1))
        .unwrap_err();
    assert!(matches!(
        err,
        GenerationError::Core(Error::UnsupportedOperation(_))
    ));
}
