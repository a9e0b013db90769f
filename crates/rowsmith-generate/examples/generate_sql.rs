use std::env;
use std::io::{self, Write};
use std::path::Path;

use chrono::NaiveDate;
use rowsmith_core::{CastTarget, SqlType};
use rowsmith_generate::descriptor::{
    auto_increment, expression, foreign_key, generated, primary_key, typed_expression, unique,
};
use rowsmith_generate::expression::{attr, cast, div, field, lit, sub};
use rowsmith_generate::generators::{
    BloodType, CarBrand, CarModel, CreditCard, RandomDateTime, RandomName,
};
use rowsmith_generate::{
    DatasetGenerator, EntityTemplate, GenerateOptions, GenerationError, init_tracing,
};

fn main() -> Result<(), GenerationError> {
    // optional TOML options file as the first argument
    let options = match env::args().nth(1) {
        Some(path) => GenerateOptions::load(Path::new(&path))?,
        None => GenerateOptions::default().with_seed(42),
    };
    init_tracing(options.log_format)?;

    let born_after = NaiveDate::from_ymd_opt(1950, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| GenerationError::InvalidOptions("bad date range".to_string()))?;
    let born_before = NaiveDate::from_ymd_opt(2005, 12, 31)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| GenerationError::InvalidOptions("bad date range".to_string()))?;
    let today = NaiveDate::from_ymd_opt(2024, 1, 1)
        .ok_or_else(|| GenerationError::InvalidOptions("bad reference date".to_string()))?;

    let person = EntityTemplate::builder("Person")
        .field("id", primary_key(auto_increment()))
        .field("name", generated(RandomName::new()))
        .field("_born", generated(RandomDateTime::between(born_after, born_before)))
        .field("birthday", expression(attr(field("_born"), "date")))
        .field(
            "age",
            typed_expression(
                cast(
                    div(attr(sub(lit(today), field("birthday")), "days"), lit(365)),
                    CastTarget::Int,
                ),
                SqlType::Integer,
            ),
        )
        .field("blood_type", generated(BloodType))
        .field("card", unique(generated(CreditCard)))
        .build()?;

    let car = EntityTemplate::builder("Car")
        .field("id", primary_key(auto_increment()))
        .field("owner", foreign_key(&person, &["id"])?)
        .field("brand", generated(CarBrand))
        .field("model", generated(CarModel::of_brand("brand")))
        .build()?;

    let dataset = DatasetGenerator::new([(car, 3), (person, 2)], &options)?;

    let mut stdout = io::stdout();
    dataset.get_sql(Some(&mut stdout as &mut dyn Write), options.create_tables)?;
    println!();
    Ok(())
}
