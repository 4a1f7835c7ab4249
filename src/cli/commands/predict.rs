//! Predict command implementation
//!
//! Validates one feature record and prints the model's prediction. Nothing
//! is audited and no metrics are kept.
//!
//! ```bash
//! housing-inference predict --json '{"MedInc":8.3252,"HouseAge":41,...}'
//! housing-inference predict --input record.json --json-output
//! ```

use crate::cli::PredictArgs;
use crate::features::{validate, FeatureField};
use crate::model::ModelAdapter;
use anyhow::{bail, Context, Result};
use colored::Colorize;
use serde_json::json;
use tracing::info;

/// Execute the predict command
pub fn execute(args: &PredictArgs, quiet: bool) -> Result<()> {
    let raw = if let Some(ref path) = args.input {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file: {}", path.display()))?
    } else if let Some(ref json) = args.json {
        json.clone()
    } else {
        bail!("Provide a feature record with --input or --json");
    };

    let payload: serde_json::Value =
        serde_json::from_str(&raw).context("Feature record is not valid JSON")?;

    let model = ModelAdapter::load(&args.model)
        .with_context(|| format!("Failed to load model: {}", args.model.display()))?;
    info!(kind = %model.info().kind, "Model ready");

    let features = match validate(&payload) {
        Ok(features) => features,
        Err(e) => {
            if args.json_output {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({
                        "error": "validation_failed",
                        "violations": e.violations,
                    }))?
                );
            } else {
                eprintln!("{} Invalid feature record:", "x".bright_red());
                for v in &e.violations {
                    eprintln!("  {} = {} violates {}", v.field.bold(), v.value, v.rule.yellow());
                }
            }
            bail!("{}", e);
        }
    };

    let prediction = model.predict(&features)?;

    if args.json_output {
        println!("{}", serde_json::to_string_pretty(&json!({ "prediction": prediction }))?);
    } else if quiet {
        println!("{prediction}");
    } else {
        println!("{} Prediction", "=>".bright_cyan());
        for field in FeatureField::ALL {
            println!("  {:<11} {}", field.name(), features.get(field));
        }
        println!(
            "  {:<11} {} (x $100k)",
            "MedHouseVal".bold(),
            format!("{prediction:.4}").bright_green()
        );
    }

    Ok(())
}
