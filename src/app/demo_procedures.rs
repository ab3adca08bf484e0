use crate::procedures::{Arguments, ProcedureContext, ProcedureDef, ProcedureRegistry};
use anyhow::{bail, Context};
use serde_json::{json, Value};

pub const DATASET_X: &str = "X.csv";
pub const DATASET_Y: &str = "Y.csv";
pub const CLASSIFIER: &str = "classifier.rf";

/// Procedures shipped with the `steplog` binary.
pub fn demo_registry() -> ProcedureRegistry {
    let mut registry = ProcedureRegistry::new();
    for def in demo_procedures() {
        // Names are literals and distinct.
        let _ = registry.register(def);
    }
    registry
}

pub fn demo_procedures() -> Vec<ProcedureDef> {
    vec![
        ProcedureDef::new("foo", |_ctx, args| add(args.require("a")?, args.require("b")?))
            .param("a")
            .param_with_default("b", 4)
            .describe("adds two numbers"),
        ProcedureDef::new("bar", |_ctx, args| multiply(args.require("a")?, args.require("b")?))
            .param("a")
            .param("b")
            .describe("multiplies two numbers"),
        ProcedureDef::new("load", load)
            .param_with_default("n_samples", 40)
            .cache_outputs([DATASET_X, DATASET_Y])
            .describe("generates a two-feature labelled dataset"),
        ProcedureDef::new("train", train)
            .param("X")
            .param("Y")
            .param_with_default("n_estimators", 10)
            .cache_outputs([CLASSIFIER])
            .describe("fits a perceptron for n_estimators passes"),
        ProcedureDef::new("score", score)
            .param("classifier")
            .param("X")
            .param("Y")
            .describe("accuracy of a classifier, with a bar chart figure"),
    ]
}

fn add(a: &Value, b: &Value) -> anyhow::Result<Value> {
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        if let Some(sum) = a.checked_add(b) {
            return Ok(json!(sum));
        }
    }
    Ok(json!(number(a, "a")? + number(b, "b")?))
}

fn multiply(a: &Value, b: &Value) -> anyhow::Result<Value> {
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        if let Some(product) = a.checked_mul(b) {
            return Ok(json!(product));
        }
    }
    Ok(json!(number(a, "a")? * number(b, "b")?))
}

fn number(value: &Value, name: &str) -> anyhow::Result<f64> {
    value
        .as_f64()
        .with_context(|| format!("argument `{name}` must be a number, got {value}"))
}

fn load(ctx: &ProcedureContext, args: &Arguments) -> anyhow::Result<Value> {
    let n_samples = args.i64("n_samples")?;
    if n_samples < 2 {
        bail!("n_samples must be at least 2, got {n_samples}");
    }
    let n = n_samples as f64;
    let mut features = Vec::new();
    let mut labels = Vec::new();
    for i in 0..n_samples {
        let x0 = i as f64 / n;
        let x1 = ((i * 7) % n_samples) as f64 / n;
        features.push(json!([x0, x1]));
        labels.push(json!(i64::from(x0 + x1 > 1.0)));
    }
    ctx.log(format!("generated {n_samples} samples"));
    Ok(json!([features, labels]))
}

fn train(ctx: &ProcedureContext, args: &Arguments) -> anyhow::Result<Value> {
    let features = matrix(args.require("X")?, "X")?;
    let labels = vector(args.require("Y")?, "Y")?;
    if features.len() != labels.len() {
        bail!(
            "X has {} rows but Y has {} labels",
            features.len(),
            labels.len()
        );
    }
    let n_estimators = args.i64("n_estimators")?;
    if n_estimators < 1 {
        bail!("n_estimators must be positive, got {n_estimators}");
    }

    let width = features.first().map(Vec::len).unwrap_or(0);
    let mut weights = vec![0.0; width];
    let mut bias = 0.0;
    for pass in 0..n_estimators {
        let mut errors = 0;
        for (row, label) in features.iter().zip(&labels) {
            let delta = label - predict(&weights, bias, row);
            if delta != 0.0 {
                errors += 1;
                for (weight, x) in weights.iter_mut().zip(row) {
                    *weight += 0.1 * delta * x;
                }
                bias += 0.1 * delta;
            }
        }
        ctx.log(format!("pass {pass}: {errors} misclassified"));
    }
    Ok(json!({
        "kind": "perceptron",
        "n_estimators": n_estimators,
        "weights": weights,
        "bias": bias,
    }))
}

fn score(ctx: &ProcedureContext, args: &Arguments) -> anyhow::Result<Value> {
    let classifier = args.require("classifier")?;
    let weights = vector(&classifier["weights"], "classifier.weights")?;
    let bias = number(&classifier["bias"], "classifier.bias")?;
    let features = matrix(args.require("X")?, "X")?;
    let labels = vector(args.require("Y")?, "Y")?;
    if features.is_empty() || features.len() != labels.len() {
        bail!("X and Y must be non-empty and of equal length");
    }

    let correct = features
        .iter()
        .zip(&labels)
        .filter(|(row, label)| predict(&weights, bias, row) == **label)
        .count();
    let accuracy = correct as f64 / labels.len() as f64;
    ctx.save_figure_as("accuracy", "svg", accuracy_chart(accuracy).as_bytes())?;
    ctx.log(format!("accuracy {accuracy:.3}"));
    Ok(json!(accuracy))
}

fn predict(weights: &[f64], bias: f64, row: &[f64]) -> f64 {
    let activation: f64 = weights.iter().zip(row).map(|(w, x)| w * x).sum::<f64>() + bias;
    if activation > 0.0 {
        1.0
    } else {
        0.0
    }
}

fn vector(value: &Value, name: &str) -> anyhow::Result<Vec<f64>> {
    value
        .as_array()
        .with_context(|| format!("`{name}` must be an array"))?
        .iter()
        .map(|item| number(item, name))
        .collect()
}

fn matrix(value: &Value, name: &str) -> anyhow::Result<Vec<Vec<f64>>> {
    value
        .as_array()
        .with_context(|| format!("`{name}` must be an array of rows"))?
        .iter()
        .map(|row| vector(row, name))
        .collect()
}

fn accuracy_chart(accuracy: f64) -> String {
    let width = (accuracy.clamp(0.0, 1.0) * 200.0).round();
    format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"220\" height=\"40\">\
         <rect x=\"10\" y=\"10\" width=\"{width}\" height=\"20\" fill=\"#4a7\"/>\
         <text x=\"12\" y=\"25\" font-size=\"12\">{:.1}%</text></svg>",
        accuracy * 100.0
    )
}
