//! CLI probe for the DataDesk store.
//!
//! # Responsibility
//! - Open the store from `DATADESK_*` environment settings.
//! - Forward one call to the host boundary and print the JSON envelope.
//!
//! Usage: `datadesk [call] [json-payload]`. Without a call it prints the
//! probe lines and the list of known calls.

use datadesk_api::{ApiContext, CALLS};
use datadesk_core::{core_version, init_from_config, ping, CoreConfig};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let Some(call) = args.next() else {
        println!("datadesk_core ping={}", ping());
        println!("datadesk_core version={}", core_version());
        println!("calls: {}", CALLS.join(", "));
        return ExitCode::SUCCESS;
    };
    let payload = args.next().unwrap_or_default();

    let config = match CoreConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("config error: {err}");
            return ExitCode::from(2);
        }
    };
    if let Err(err) = init_from_config(&config) {
        eprintln!("logging disabled: {err}");
    }

    let ctx = match ApiContext::open(&config) {
        Ok(ctx) => ctx,
        Err(err) => {
            eprintln!("cannot open `{}`: {err}", config.db_path.display());
            return ExitCode::FAILURE;
        }
    };

    let payload = if payload.trim().is_empty() {
        serde_json::Value::Null
    } else {
        match serde_json::from_str(&payload) {
            Ok(payload) => payload,
            Err(err) => {
                eprintln!("payload is not valid JSON: {err}");
                return ExitCode::from(2);
            }
        }
    };

    let response = ctx.dispatch(&call, &payload);
    println!("{}", response.to_json());
    if response.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
