use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use warthog::config::ServerConfig;
use warthog::dispatcher::HandlerOutcome;
use warthog::runtime_config::RuntimeConfig;
use warthog::server::{send_response, HttpServer, RequestContext, ResponseContext};

/// Embedded HTTP dispatch core demo server.
#[derive(Parser, Debug)]
#[command(name = "warthog", version, about)]
struct Args {
    /// YAML config file
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Listen address override
    #[arg(long)]
    listen: Option<String>,

    /// Listen port override
    #[arg(long)]
    port: Option<u16>,

    /// Enable CORS response shaping
    #[arg(long)]
    cors: bool,

    /// Require this API key on every route
    #[arg(long, env = "WARTHOG_API_KEY")]
    api_key: Option<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    may::config().set_stack_size(RuntimeConfig::from_env().stack_size);

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => ServerConfig::from_yaml_file(path)?,
        None => ServerConfig::default(),
    };
    if let Some(listen) = args.listen {
        config.listen_address = listen;
    }
    if let Some(port) = args.port {
        config.listen_port = port;
    }
    if args.cors {
        config.cors_enabled = true;
    }

    let mut builder = HttpServer::builder(config)
        .get(
            "/status",
            Arc::new(|req: RequestContext, mut res: ResponseContext| {
                res.set_body("{\"ok\":true}");
                HandlerOutcome::Complete(req, res)
            }),
            false,
        )
        .post(
            "/echo",
            Arc::new(|req: RequestContext, mut res: ResponseContext| {
                res.set_body(req.body.clone());
                HandlerOutcome::Complete(req, res)
            }),
            false,
        )
        .get(
            "/items/:id",
            Arc::new(|req: RequestContext, mut res: ResponseContext| {
                let body = serde_json::json!({ "id": req.param("id") });
                res.set_body(body.to_string());
                HandlerOutcome::Complete(req, res)
            }),
            false,
        )
        .get(
            "/stream",
            Arc::new(|req: RequestContext, mut res: ResponseContext| {
                res.set_content_type("text/plain");
                let mut turn = 0u32;
                HandlerOutcome::stream(req, res, move |_req, res| {
                    turn += 1;
                    res.body = format!("chunk {turn}\n");
                    if turn == 3 {
                        res.is_final = true;
                    }
                })
            }),
            true,
        );

    // Deferred delivery demo: the handler hands its contexts to a worker
    // thread, which replies through the message bus; the registered
    // message handler finishes the send on the reactor thread.
    let sender = builder.bus_sender();
    builder = builder
        .post(
            "/jobs",
            Arc::new(move |req: RequestContext, mut res: ResponseContext| {
                let sender = sender.clone();
                std::thread::spawn(move || {
                    res.status = 201;
                    res.set_body("{\"job\":\"done\"}");
                    sender.send("job_finished", Box::new((req, res)));
                });
                HandlerOutcome::Deferred
            }),
            true,
        )
        .on_message("job_finished", |payload| {
            if let Ok(pair) = payload.downcast::<(RequestContext, ResponseContext)>() {
                let (req, res) = *pair;
                send_response(req, res);
            }
        });

    if let Some(api_key) = args.api_key {
        builder = builder.auth_policy(Arc::new(
            move |_route: &warthog::Route, token: &str| token == api_key,
        ));
    }

    builder.build().run()?;
    Ok(())
}
