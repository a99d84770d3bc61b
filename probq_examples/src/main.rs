// Copyright 2025 the probq Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Runs the same probability queries against the columnar and the Arrow backend.
//!
//! Set `RUST_LOG=probq=debug` (or `trace`) to see query execution in the logs.

use std::error::Error;
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, DictionaryArray, Float64Array, Int64Array};
use arrow::datatypes::Int32Type;
use arrow::record_batch::RecordBatch;
use probq::{Column, ColumnFrame, DEFAULT_TOLERANCE, Frame, VariableBuilder, p};
use probq_arrow::ArrowFrame;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const AGE: [i64; 8] = [25, 30, 25, 41, 30, 25, 52, 41];
const PURCHASED: [bool; 8] = [true, true, false, true, false, true, false, true];
const CHANNEL: [&str; 8] = ["web", "store", "web", "web", "store", "web", "store", "web"];
const SPEND: [Option<f64>; 8] = [
    Some(12.5),
    Some(80.0),
    None,
    Some(45.0),
    None,
    Some(20.0),
    Some(5.0),
    Some(61.0),
];

fn main() -> Result<(), Box<dyn Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let columns = column_frame()?;
    let arrow = arrow_frame()?;

    println!("== {} backend ==", columns.backend());
    report(&columns)?;
    println!();
    println!("== {} backend ==", arrow.backend());
    report(&arrow)?;

    let a = VariableBuilder::from_data(&columns)?;
    let b = VariableBuilder::from_data(&arrow)?;
    let same = p(&a.variable("age")?)?.approx_eq(&p(&b.variable("age")?)?, DEFAULT_TOLERANCE);
    println!();
    println!("backends agree on P(age): {same}");

    match p((&a.variable("age")?, &b.variable("channel")?)) {
        Ok(_) => println!("mixing frames unexpectedly succeeded"),
        Err(err) => println!("mixing frames: {err}"),
    }
    Ok(())
}

fn column_frame() -> Result<ColumnFrame, Box<dyn Error>> {
    Ok(ColumnFrame::new()
        .with_column("age", AGE.to_vec())?
        .with_column("purchased", PURCHASED.to_vec())?
        .with_column("channel", Column::categorical(CHANNEL.map(Some)))?
        .with_column("spend", SPEND.to_vec())?)
}

fn arrow_frame() -> Result<ArrowFrame, Box<dyn Error>> {
    let channel: DictionaryArray<Int32Type> = CHANNEL.into_iter().collect();
    let batch = RecordBatch::try_from_iter(vec![
        ("age", Arc::new(Int64Array::from(AGE.to_vec())) as ArrayRef),
        (
            "purchased",
            Arc::new(BooleanArray::from(PURCHASED.to_vec())) as ArrayRef,
        ),
        ("channel", Arc::new(channel) as ArrayRef),
        ("spend", Arc::new(Float64Array::from(SPEND.to_vec())) as ArrayRef),
    ])?;
    Ok(ArrowFrame::try_new(batch)?)
}

fn report(frame: &dyn Frame) -> Result<(), Box<dyn Error>> {
    let vb = VariableBuilder::from_data(frame)?;
    let vars = vb.get_variables(&["age", "purchased", "channel", "spend"])?;
    let (age, purchased, channel, spend) = (&vars[0], &vars[1], &vars[2], &vars[3]);

    println!("{}", p(age)?);
    println!("{}", p((age, purchased))?);
    println!("P(purchased) = {}", p(purchased.eq(true)?)?);
    println!(
        "P(purchased | channel = web) = {}",
        p(purchased.eq(true)?)?.given(channel.eq("web")?)?
    );
    println!(
        "P(spend > 20 | age in 25..=41) = {}",
        p(spend.gt(20)?)?.given(age.between(25, 41)?)?
    );
    println!("P(spend missing) = {}", p(spend.is_null())?);
    println!("{}", p(purchased)?.given_each(channel)?);

    let none = p(age)?.given(age.gt(100)?)?;
    println!("degenerate: {}", none.is_degenerate());
    if let Err(err) = p(purchased.eq(true)?)?.given(age.gt(100)?) {
        println!("conditioning on an empty event: {err}");
    }
    if let Err(err) = channel.lt("web") {
        println!("ordering a categorical: {err}");
    }
    if let Err(err) = vb.get_variables(&["age", "income"]) {
        println!("lookup: {err}");
    }
    Ok(())
}
