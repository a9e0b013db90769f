use chrono::NaiveDate;

use rowsmith_core::{ArithmeticOp, CastTarget, DependencyGraph, Method, SqlType, Value};

#[test]
fn age_can_be_derived_from_a_birthday() {
    let today = Value::Date(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
    let birthday = Value::Date(NaiveDate::from_ymd_opt(1990, 6, 1).unwrap());

    let days = today
        .arithmetic(ArithmeticOp::Sub, &birthday)
        .and_then(|interval| interval.attribute("days"))
        .expect("interval days");
    let years = days
        .arithmetic(ArithmeticOp::Div, &Value::Int(365))
        .and_then(|value| value.cast(CastTarget::Int))
        .expect("age in years");

    assert_eq!(years, Value::Int(34));
}

#[test]
fn text_methods_chain() {
    let value = Value::from("  Mixed Case ")
        .call(Method::Trim, &[])
        .and_then(|value| value.call(Method::Lower, &[]))
        .and_then(|value| value.call(Method::Replace, &[Value::from(" "), Value::from("_")]))
        .expect("text pipeline");
    assert_eq!(value, Value::from("mixed_case"));
}

#[test]
fn sql_types_render_as_sql_text() {
    assert_eq!(SqlType::VarChar(15).to_string(), "VARCHAR(15)");
    assert_eq!(SqlType::DateTime.to_string(), "DATETIME");
    assert_eq!(SqlType::Decimal.to_string(), "DECIMAL");
}

#[test]
fn dependency_report_serializes() {
    let mut graph = DependencyGraph::new();
    graph.add_dependency("Car", "Person");

    let json = serde_json::to_value(graph.report()).expect("serialize report");
    assert_eq!(json["summary"]["nodes"], 2);
    assert_eq!(json["summary"]["edges"], 1);
    assert_eq!(json["topo_order"], serde_json::json!(["Person", "Car"]));
    assert!(json["cycle"].is_null());
}
