use axum::Router;
use serde_json::{Value, json};
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Serves `router` on an ephemeral local port for the lifetime of the test runtime.
pub async fn spawn_server(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

pub fn sample_products() -> Value {
    json!([
        {
            "id": 1,
            "title": "Shirt",
            "price": 9.99,
            "description": "d",
            "category": "c",
            "image": "i",
            "rating": {"rate": 4.2, "count": 10}
        },
        {
            "id": 2,
            "title": "Backpack",
            "price": 109.95,
            "description": "Fits 15 inch laptops",
            "category": "men's clothing",
            "image": "https://example.com/backpack.jpg",
            "rating": {"rate": 3.9, "count": 120}
        }
    ])
}
