//! Axum server setup and startup

use std::net::SocketAddr;

use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};

use super::context::AppState;
use super::routes::create_router;

/// Run the API server on the specified port until the shutdown signal flips
pub async fn run_server(
    port: u16,
    state: AppState,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), std::io::Error> {
    // Any origin, method and header
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state).layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("API server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while !*shutdown_rx.borrow_and_update() {
                if shutdown_rx.changed().await.is_err() {
                    break;
                }
            }
            tracing::info!("API server shutting down gracefully");
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::AppContext;
    use crate::settings::RigSettings;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn free_port() -> u16 {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    async fn request(port: u16, raw: &str) -> String {
        let mut stream = tokio::net::TcpStream::connect(("127.0.0.1", port))
            .await
            .unwrap();
        stream.write_all(raw.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    async fn connect_with_retry(port: u16) {
        for _ in 0..100 {
            if tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("server did not come up on port {}", port);
    }

    #[tokio::test]
    async fn test_cors_and_graceful_shutdown() {
        let state: AppState =
            Arc::new(AppContext::from_settings(&RigSettings::simulated()).unwrap());
        let port = free_port().await;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let server = tokio::spawn(run_server(port, state, shutdown_rx));
        connect_with_retry(port).await;

        // Preflight from an arbitrary origin
        let response = request(
            port,
            "OPTIONS /brightness/10 HTTP/1.1\r\nHost: localhost\r\nOrigin: http://viewer.local\r\n\
             Access-Control-Request-Method: PUT\r\nConnection: close\r\n\r\n",
        )
        .await
        .to_ascii_lowercase();
        assert!(response.starts_with("http/1.1 200"), "{}", response);
        assert!(response.contains("access-control-allow-origin: *"));

        let response = request(
            port,
            "POST /stop HTTP/1.1\r\nHost: localhost\r\nOrigin: http://viewer.local\r\n\
             Content-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(response.contains("Stream stopped"));
        assert!(response
            .to_ascii_lowercase()
            .contains("access-control-allow-origin: *"));

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("server should stop after the shutdown signal")
            .unwrap()
            .unwrap();
    }
}
