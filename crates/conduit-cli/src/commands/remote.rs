//! Calls, subscriptions and notifications against a worker

use super::session::WorkerSession;
use crate::args::CallArgs;
use anyhow::Context;
use conduit_core::{ConduitConfig, ServiceRegistry};
use futures::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Call a method and print its result
pub async fn call(
    config: &ConduitConfig,
    registry: &Arc<ServiceRegistry>,
    args: &CallArgs,
    trace: bool,
) -> anyhow::Result<()> {
    let params = parse_params(args.params.as_deref())?;
    let session = WorkerSession::open(config, registry, &args.worker, trace)?;

    let proxy = session.supervisor.get_service(&args.service).await?;
    let result = session.bounded(proxy.call(&args.method, params)).await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Print every value of a streaming method until it completes
pub async fn subscribe(
    config: &ConduitConfig,
    registry: &Arc<ServiceRegistry>,
    args: &CallArgs,
    trace: bool,
) -> anyhow::Result<()> {
    let params = parse_params(args.params.as_deref())?;
    let session = WorkerSession::open(config, registry, &args.worker, trace)?;

    let proxy = session.supervisor.get_service(&args.service).await?;
    let mut subscription = proxy.subscribe(&args.method, params)?;

    let mut count = 0usize;
    // The timeout bounds the wait for each value, not the whole stream
    while let Some(value) = session
        .bounded(async { subscription.next().await.transpose() })
        .await?
    {
        println!("{}", serde_json::to_string(&value)?);
        count += 1;
    }

    debug!("Stream completed after {} values", count);
    Ok(())
}

/// Send a notification and wait until it has been written
pub async fn notify(
    config: &ConduitConfig,
    registry: &Arc<ServiceRegistry>,
    args: &CallArgs,
    trace: bool,
) -> anyhow::Result<()> {
    let params = parse_params(args.params.as_deref())?;
    let session = WorkerSession::open(config, registry, &args.worker, trace)?;

    let proxy = session.supervisor.get_service(&args.service).await?;
    proxy.notify(&args.method, params)?;
    session.bounded(proxy.flush()).await?;
    Ok(())
}

fn parse_params(raw: Option<&str>) -> anyhow::Result<Value> {
    match raw {
        None => Ok(Value::Null),
        Some(raw) => serde_json::from_str(raw).context("PARAMS must be valid JSON"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_params() {
        assert_eq!(parse_params(None).unwrap(), Value::Null);
        assert_eq!(parse_params(Some("[1, 2]")).unwrap(), json!([1, 2]));
        assert_eq!(
            parse_params(Some(r#"{"line": 3}"#)).unwrap(),
            json!({"line": 3})
        );
        assert!(parse_params(Some("{line: 3")).is_err());
    }
}
