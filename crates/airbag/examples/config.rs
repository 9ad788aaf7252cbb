// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Configures policies from a JSON document. Only the data part of each policy is
//! configurable; callbacks stay in code.

use std::time::Duration;

use airbag::options::OrchestratorOptions;
use airbag::retry::Retry;
use airbag::timeout::Timeout;
use airbag::{Error, Orchestrator, PolicyContext, Recovery, RecoveryInfo};
use layered::{Execute, Service};
use ohno::AppError;
use tick::Clock;

const CONFIG: &str = r#"{
    "retry": { "max_retries": 2, "base_delay": { "secs": 0, "nanos": 50000000 }, "backoff": "exponential" },
    "timeout": { "timeout": { "secs": 1, "nanos": 0 } },
    "breaker": { "enabled": false }
}"#;

type Out = Result<String, Error>;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let options: OrchestratorOptions = serde_json::from_str(CONFIG)?;
    println!("{options:#?}");

    let clock = Clock::new_tokio();
    let context = PolicyContext::<String, Out>::new(&clock).name("configured");

    let orchestrator = Orchestrator::builder(&context)
        .timeout(
            Timeout::layer("timeout", &context)
                .timeout(Duration::from_secs(30))
                .timeout_exceeded()
                .options(&options.timeout),
        )
        .retry(
            Retry::layer("retry", &context)
                .clone_input()
                .recovery_with(|out, _args| match out {
                    Ok(_) => RecoveryInfo::never(),
                    Err(error) => error.recovery(),
                })
                .options(&options.retry),
        )
        .build(Execute::new(|input: String| async move {
            if fastrand::bool() {
                Err(Error::transient("connection refused"))
            } else {
                Ok(input)
            }
        }));

    match orchestrator.execute("ping".to_string()).await {
        Ok(output) => println!("succeeded: {output}"),
        Err(error) => println!("failed: {error}"),
    }

    Ok(())
}
