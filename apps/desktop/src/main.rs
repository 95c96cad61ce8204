use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use client_core::{RestTodoService, TodoListView, TodoService, ViewEvent};
use shared::domain::Todo;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod config;

#[derive(Parser, Debug)]
struct Args {
    /// Backend base url; overrides todos.toml and environment settings.
    #[arg(long)]
    server_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let mut settings = config::load_settings();
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }

    let service = RestTodoService::new(settings.server_url);
    if let Err(err) = service.start_feed().await {
        warn!(error = %err, "change feed unavailable; list will not update live");
    }

    let view = TodoListView::new(Arc::clone(&service) as Arc<dyn TodoService>);
    let mut events = view.subscribe_view_events();
    view.initialize().await;
    render(&view.snapshot().await);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(ViewEvent::ListChanged(todos)) => render(&todos),
                Err(RecvError::Lagged(_)) => render(&view.snapshot().await),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    view.teardown().await;
    service.shutdown().await;
    Ok(())
}

fn render(todos: &[Todo]) {
    println!("Todo List:");
    if todos.is_empty() {
        println!("  (no todos)");
        return;
    }
    for todo in todos {
        println!("  {:>4}  {}", todo.id.0, todo.title);
    }
}
