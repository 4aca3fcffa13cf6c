//! Radio server example
//!
//! Run with: cargo run --example radio_server
//!
//! Ports come from the environment:
//!   PORT=3000        client connections (newline-delimited JSON)
//!   QUERY_PORT=3001  HTTP query endpoint
//!
//! ## Broadcasting
//!
//! ```text
//! $ nc localhost 3000
//! {"id":1,"type":"start-broadcast","name":"jazz","coordinate":{"lat":59.33,"lng":18.06}}
//! {"id":2,"type":"player-state-changed","state":{"timestamp":1,"isPaused":false,"trackURI":"t1","playbackPosition":0}}
//! ```
//!
//! ## Listening
//!
//! ```text
//! $ nc localhost 3000
//! {"id":1,"type":"join-broadcast","name":"jazz"}
//! ```
//!
//! ## Inspecting
//!
//! ```text
//! $ curl localhost:3001/stations
//! $ curl localhost:3001/stats
//! ```

use std::time::Duration;

use radio_relay::{RadioServer, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("radio_relay=info")),
        )
        .init();

    let config = ServerConfig::from_env();
    println!("Radio server starting on {}", config.bind_addr);
    if let Some(query_addr) = config.query_addr {
        println!("Query endpoint on http://{}", query_addr);
    }

    let server = RadioServer::new(config);

    let stats = server.stats().clone();
    let controller = server.controller().clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(30));
        loop {
            ticker.tick().await;
            let stations = controller.get_stations().await;
            let snapshot = stats.snapshot().with_stations(&stations);
            println!(
                "Stats: connections={} stations={} listeners={} commands={}",
                snapshot.active_connections,
                snapshot.stations,
                snapshot.listeners,
                snapshot.commands_processed,
            );
        }
    });

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    println!("Radio server stopped");
    Ok(())
}
