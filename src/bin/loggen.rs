//! Sublog Log Generator
//!
//! Posts synthetic log events to a running Sublog server, for exercising
//! the viewer without a real producer.
//!
//! Run with: cargo run --bin sublog-loggen -- --batch-size 5 --interval 0.5

use clap::Parser;
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};

use sublog::config::LoggingConfig;
use sublog::logging::init_logging;

#[derive(Parser, Debug)]
#[command(name = "sublog-loggen")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Log generator for Sublog")]
struct Args {
    /// Host to send logs to
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Port to send logs to
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Logs endpoint
    #[arg(long, default_value = "/logs")]
    endpoint: String,

    /// Seconds between batches
    #[arg(long, default_value_t = 1.0)]
    interval: f64,

    /// Logs per batch; a batch of one is sent as a single object
    #[arg(long, default_value_t = 1)]
    batch_size: usize,

    /// Seconds to run (0 = until interrupted)
    #[arg(long, default_value_t = 0)]
    run_time: u64,

    /// Seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,
}

/// Level name with its selection weight
const LEVELS: [(&str, u32); 4] = [("debug", 40), ("info", 30), ("warn", 20), ("error", 10)];

/// Message template with the level it usually carries
const TEMPLATES: &[(&str, &str)] = &[
    ("User {userId} logged in from {ip}", "info"),
    ("Failed login attempt for user {userId} from {ip}", "warn"),
    ("Database query took {queryTime}ms", "debug"),
    ("API request to {endpoint} completed in {responseTime}ms", "info"),
    ("Memory usage at {memoryUsage}MB", "debug"),
    ("CPU usage at {cpuUsage}%", "debug"),
    ("Cache hit ratio: {cacheHitRatio}%", "debug"),
    ("New order #{orderId} created for customer {customerId}", "info"),
    ("Payment of ${amount} received for order #{orderId}", "info"),
    ("Shipment #{shipmentId} dispatched to {address}", "info"),
    ("Rate limit exceeded for API key {apiKey}", "warn"),
    ("Invalid request parameters: {params}", "warn"),
    ("Permission denied for user {userId} accessing {resource}", "warn"),
    ("Database connection failed: {error}", "error"),
    ("Unhandled exception in {service}: {errorMessage}", "error"),
    ("Service {serviceName} is unresponsive", "error"),
    ("Failed to process transaction #{transactionId}: {reason}", "error"),
];

/// Pick one of `items`, or `fallback` for an empty slice
fn pick<'a>(rng: &mut StdRng, items: &[&'a str], fallback: &'a str) -> &'a str {
    items.choose(rng).copied().unwrap_or(fallback)
}

/// Lowercase alphanumeric token of `len` characters
fn token(rng: &mut StdRng, len: usize) -> String {
    rng.sample_iter(Alphanumeric)
        .take(len)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

/// Level drawn by weight, independent of any template
fn weighted_level(rng: &mut StdRng) -> &'static str {
    LEVELS
        .choose_weighted(rng, |(_, weight)| *weight)
        .map(|(name, _)| *name)
        .unwrap_or("info")
}

/// Value substituted for a `{placeholder}`, or `None` when unknown
fn placeholder(rng: &mut StdRng, key: &str) -> Option<String> {
    let value = match key {
        "userId" | "customerId" => format!("user-{}", rng.gen_range(1000..=9999)),
        "ip" => format!(
            "{}.{}.{}.{}",
            rng.gen_range(1..=255),
            rng.gen_range(0..=255),
            rng.gen_range(0..=255),
            rng.gen_range(0..=255)
        ),
        "queryTime" | "responseTime" => rng.gen_range(1..=500).to_string(),
        "memoryUsage" => rng.gen_range(100..=8000).to_string(),
        "cpuUsage" => rng.gen_range(5..=95).to_string(),
        "cacheHitRatio" => rng.gen_range(60..=100).to_string(),
        "orderId" | "shipmentId" | "transactionId" => rng.gen_range(10000..=99999).to_string(),
        "amount" => format!("{:.2}", rng.gen_range(100..=10000) as f64 / 100.0),
        "address" => format!(
            "{} Main St, Anytown, ST {}",
            rng.gen_range(1..=999),
            rng.gen_range(10000..=99999)
        ),
        "apiKey" => format!("api-{}", token(rng, 8)),
        "params" => format!(
            "missing required field: {}",
            pick(rng, &["email", "name", "password", "address", "phone"], "email")
        ),
        "resource" => format!(
            "/{}/{}",
            pick(rng, &["users", "orders", "products", "settings", "admin"], "users"),
            rng.gen_range(1..=9999)
        ),
        "error" => pick(
            rng,
            &["Connection timeout", "Connection refused", "Too many connections", "Auth failure"],
            "Connection timeout",
        )
        .to_string(),
        "service" | "serviceName" => pick(
            rng,
            &["AuthService", "PaymentProcessor", "InventoryManager", "EmailService"],
            "AuthService",
        )
        .to_string(),
        "errorMessage" => pick(
            rng,
            &[
                "NullReferenceException",
                "OutOfMemoryException",
                "IndexOutOfRangeException",
                "Cannot read property of undefined",
            ],
            "NullReferenceException",
        )
        .to_string(),
        "reason" => pick(
            rng,
            &["Insufficient funds", "Card declined", "Expired card", "Gateway timeout"],
            "Card declined",
        )
        .to_string(),
        "endpoint" => format!(
            "/{}/{}",
            pick(rng, &["api", "auth", "users", "orders", "products"], "api"),
            pick(rng, &["create", "update", "delete", "get"], "get")
        ),
        _ => return None,
    };
    Some(value)
}

/// Replace every `{key}` in a template
fn fill_template(rng: &mut StdRng, template: &str) -> String {
    let mut out = String::with_capacity(template.len() + 32);
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                let key = &after[..end];
                match placeholder(rng, key) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push('{');
                        out.push_str(key);
                        out.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

/// Build one synthetic log event
fn generate_entry(rng: &mut StdRng) -> Value {
    let use_template_level = rng.gen_bool(0.7);
    let (template, template_level) = TEMPLATES
        .choose(rng)
        .copied()
        .unwrap_or(("Service {serviceName} is unresponsive", "error"));
    let level = if use_template_level {
        template_level
    } else {
        weighted_level(rng)
    };
    let message = fill_template(rng, template);
    let now = chrono::Utc::now().to_rfc3339();

    let mut meta = Map::new();
    meta.insert("timestamp".into(), json!(now));
    meta.insert("requestId".into(), json!(format!("req-{}", token(rng, 12))));
    meta.insert("sessionId".into(), json!(format!("sess-{}", token(rng, 8))));

    if message.contains("logged in") || message.contains("login attempt") {
        meta.insert(
            "browser".into(),
            json!(pick(rng, &["Chrome", "Firefox", "Safari", "Edge"], "Chrome")),
        );
        meta.insert(
            "platform".into(),
            json!(pick(rng, &["Windows", "macOS", "Linux", "iOS", "Android"], "Linux")),
        );
    } else if message.contains("Database") {
        meta.insert(
            "dbInstance".into(),
            json!(pick(rng, &["primary", "replica-1", "replica-2"], "primary")),
        );
        meta.insert("queryId".into(), json!(format!("q-{}", token(rng, 8))));
    } else if message.contains("order") {
        meta.insert("orderItems".into(), json!(rng.gen_range(1..=10)));
        meta.insert(
            "totalValue".into(),
            json!(rng.gen_range(1000..=100000) as f64 / 100.0),
        );
    }

    json!({
        "level": level,
        "message": message,
        "meta": meta,
        "timestamp": now,
    })
}

/// Request body for a batch: a lone object for one event, an array otherwise
fn batch_body(mut batch: Vec<Value>) -> Value {
    if batch.len() == 1 {
        batch.remove(0)
    } else {
        Value::Array(batch)
    }
}

async fn send_batch(client: &reqwest::Client, url: &str, batch: Vec<Value>) {
    let sent = batch.len();
    for entry in &batch {
        let log_level = entry["level"].as_str().unwrap_or_default();
        let text = entry["message"].as_str().unwrap_or_default();
        tracing::debug!(log_level, text, "Generated log");
    }

    let response = match client.post(url).json(&batch_body(batch)).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "Error sending logs");
            return;
        }
    };

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::error!(%status, %body, "Server rejected logs");
        return;
    }

    match response.json::<Value>().await {
        Ok(reply) => {
            let processed = reply["processed_count"].as_u64().unwrap_or_default();
            let received = reply["received_count"].as_u64().unwrap_or_default();
            tracing::info!(sent, processed, received, "Sent logs");
        }
        Err(e) => tracing::warn!(sent, error = %e, "Sent logs, unreadable response"),
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let url = format!("http://{}:{}{}", args.host, args.port, args.endpoint);
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    tracing::info!(%url, batch_size = args.batch_size, interval = args.interval, "Starting log generator");

    let deadline = (args.run_time > 0).then(|| Instant::now() + Duration::from_secs(args.run_time));
    match deadline {
        Some(_) => tracing::info!("Will run for {} seconds", args.run_time),
        None => tracing::info!("Running until interrupted (Ctrl+C to stop)"),
    }

    let period = Duration::from_secs_f64(args.interval.max(0.001));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }

        let batch: Vec<Value> = (0..args.batch_size.max(1))
            .map(|_| generate_entry(&mut rng))
            .collect();
        send_batch(&client, &url, batch).await;
    }

    tracing::info!("Log generator finished");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&LoggingConfig::default())?;

    tokio::select! {
        result = run(args) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Log generator stopped by user");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    #[test]
    fn test_same_seed_same_events() {
        let mut a = seeded(42);
        let mut b = seeded(42);
        for _ in 0..50 {
            let x = generate_entry(&mut a);
            let y = generate_entry(&mut b);
            assert_eq!(x["level"], y["level"]);
            assert_eq!(x["message"], y["message"]);
            assert_eq!(x["meta"]["requestId"], y["meta"]["requestId"]);
        }
    }

    #[test]
    fn test_level_weights() {
        let mut rng = seeded(1234);
        let mut debug = 0;
        let mut error = 0;
        for _ in 0..10_000 {
            match weighted_level(&mut rng) {
                "debug" => debug += 1,
                "error" => error += 1,
                _ => {}
            }
        }
        // 40% vs 10%
        assert!(debug > error * 2);
        assert!(error > 0);
    }

    #[test]
    fn test_token_is_lowercase_alphanumeric() {
        let mut rng = seeded(11);
        let t = token(&mut rng, 12);
        assert_eq!(t.len(), 12);
        assert!(t.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_fill_template() {
        let mut rng = seeded(99);
        let message = fill_template(&mut rng, "CPU usage at {cpuUsage}% on {unknown}");
        assert!(message.starts_with("CPU usage at "));
        assert!(message.ends_with("% on {unknown}"));
        assert!(!message.contains("{cpuUsage}"));

        let cpu: u32 = message["CPU usage at ".len()..message.find('%').unwrap()]
            .parse()
            .unwrap();
        assert!((5..=95).contains(&cpu));
    }

    #[test]
    fn test_generated_entry_shape() {
        let mut rng = seeded(5);
        let entry = generate_entry(&mut rng);
        assert!(entry["level"].is_string());
        assert!(entry["message"].is_string());
        assert!(entry["meta"]["requestId"].as_str().unwrap().starts_with("req-"));
        assert!(chrono::DateTime::parse_from_rfc3339(entry["timestamp"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_batch_body_shape() {
        let mut rng = seeded(3);
        let single = batch_body(vec![generate_entry(&mut rng)]);
        assert!(single.is_object());

        let many = batch_body((0..3).map(|_| generate_entry(&mut rng)).collect());
        assert_eq!(many.as_array().map(Vec::len), Some(3));
    }
}
