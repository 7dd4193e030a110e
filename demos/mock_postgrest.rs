//! demos/mock_postgrest.rs
//! A stand-in PostgREST gateway for running the health endpoint locally.
//! Run: cargo run --example mock_postgrest -- <port>
//!
//! Env: BASE_DELAY_MS, JITTER_MS, FAIL_PCT (per count query), MIGRATION_VERSION.

use hyper::{
    service::{make_service_fn, service_fn},
    Body, Request, Response, Server, StatusCode,
};
use rand::Rng;
use std::{
    collections::HashMap,
    convert::Infallible,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::time::sleep;

#[derive(Clone)]
struct GatewayState {
    rows: Arc<HashMap<&'static str, u64>>,
    req_counter: Arc<AtomicU64>,
    db_up: Arc<AtomicBool>,
    base_delay: u64,
    jitter_ms: u64,
    fail_pct: f64,
    migration_version: Option<String>,
}

fn respond(status: StatusCode, body: impl Into<Body>) -> Response<Body> {
    let mut response = Response::new(body.into());
    *response.status_mut() = status;
    response
}

async fn handle(req: Request<Body>, state: GatewayState) -> Result<Response<Body>, Infallible> {
    state.req_counter.fetch_add(1, Ordering::SeqCst);
    let path = req.uri().path().trim_start_matches('/').to_owned();

    // The root is the liveness endpoint and is always fast.
    if path.is_empty() {
        return Ok(respond(StatusCode::OK, r#"{"swagger":"2.0","info":{"title":"mock"}}"#));
    }

    if !state.db_up.load(Ordering::SeqCst) {
        return Ok(respond(
            StatusCode::SERVICE_UNAVAILABLE,
            r#"{"message":"Database client error"}"#,
        ));
    }

    let delay = state.base_delay + rand::thread_rng().gen_range(0..=state.jitter_ms);
    if delay > 0 {
        sleep(Duration::from_millis(delay)).await;
    }

    if path == "schema_migrations" {
        let body = match &state.migration_version {
            Some(version) => format!(r#"[{{"version":"{}"}}]"#, version),
            None => "[]".to_string(),
        };
        return Ok(respond(StatusCode::OK, body));
    }

    let Some(rows) = state.rows.get(path.as_str()).copied() else {
        return Ok(respond(
            StatusCode::NOT_FOUND,
            format!(r#"{{"message":"relation \"{}\" does not exist"}}"#, path),
        ));
    };

    if state.fail_pct > 0.0 && rand::thread_rng().gen_bool(state.fail_pct / 100.0) {
        return Ok(respond(StatusCode::INTERNAL_SERVER_ERROR, "Injected failure"));
    }

    let range = if rows == 0 {
        "*/0".to_string()
    } else {
        format!("0-{}/{}", rows - 1, rows)
    };
    let mut response = respond(StatusCode::OK, format!(r#"[{{"count":{}}}]"#, rows));
    if let Ok(value) = range.parse() {
        response.headers_mut().insert("Content-Range", value);
    }
    Ok(response)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let port: u16 = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "3001".into())
        .parse()?;

    let env_num = |key: &str| std::env::var(key).ok().and_then(|v| v.parse().ok());

    let state = GatewayState {
        rows: Arc::new(HashMap::from([
            ("jobs", 10),
            ("applications", 3),
            ("application_projects", 1),
            ("user_profile", 1),
        ])),
        req_counter: Arc::new(AtomicU64::new(0)),
        db_up: Arc::new(AtomicBool::new(true)),
        base_delay: env_num("BASE_DELAY_MS").unwrap_or(0),
        jitter_ms: env_num("JITTER_MS").unwrap_or(0),
        fail_pct: std::env::var("FAIL_PCT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.0),
        migration_version: std::env::var("MIGRATION_VERSION").ok(),
    };

    // Flip the database every 30 s so the dashboard cycles Healthy/Degraded.
    {
        let st = state.clone();
        tokio::spawn(async move {
            loop {
                sleep(Duration::from_secs(30)).await;
                let up = st.db_up.load(Ordering::SeqCst);
                st.db_up.store(!up, Ordering::SeqCst);
                println!(
                    "database {} after {} requests",
                    if up { "down" } else { "up" },
                    st.req_counter.load(Ordering::SeqCst)
                );
            }
        });
    }

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let make_svc = make_service_fn(move |_conn| {
        let st = state.clone();
        async move { Ok::<_, Infallible>(service_fn(move |req| handle(req, st.clone()))) }
    });

    println!("Mock PostgREST gateway on http://{}", addr);

    Server::bind(&addr).serve(make_svc).await?;
    Ok(())
}
