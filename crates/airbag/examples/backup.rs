// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Backup request example. A slow primary request is raced by a duplicate sent after a short
//! delay; whichever finishes first wins and the other one is dropped. `POST` requests are not
//! duplicated unless they carry an idempotency override header.

use std::time::Duration;

use airbag::backup::Backup;
use airbag::{Error, PolicyContext};
use http::{Method, Request, Response};
use layered::{Execute, Layer, Service};
use ohno::AppError;
use tick::Clock;

type Out = Result<Response<String>, Error>;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let clock = Clock::new_tokio();
    let context = PolicyContext::<Request<String>, Out>::new(&clock);

    let service = Backup::layer("backup", &context)
        .clone_input_with(airbag::try_clone_request)
        .delay(Duration::from_millis(200))
        .on_backup(|request, args| {
            println!("{} {} still pending after {:?}, sending backup", request.method(), request.uri(), args.delay());
        })
        .layer(Execute::new(move |request: Request<String>| {
            let clock = clock.clone();
            async move {
                // Latency between 50ms and 1s
                let latency = Duration::from_millis(fastrand::u64(50..1000));
                clock.delay(latency).await;
                Ok::<_, Error>(Response::new(format!("{} answered in {latency:?}", request.uri())))
            }
        }));

    for method in [Method::GET, Method::PUT, Method::POST] {
        let request = Request::builder()
            .method(method.clone())
            .uri("https://catalog.example.com/products")
            .body(String::new())?;

        let started = std::time::Instant::now();
        let response = service.execute(request).await?;
        println!("{method}: {} (total {:?})", response.body(), started.elapsed());
    }

    let request = Request::builder()
        .method(Method::POST)
        .uri("https://catalog.example.com/products/search")
        .header("x-http-method-override", "GET")
        .body(String::new())?;
    let response = service.execute(request).await?;
    println!("POST with override: {}", response.body());

    Ok(())
}
