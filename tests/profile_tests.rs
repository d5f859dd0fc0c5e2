// tests/profile_tests.rs

use exam_hub::{
    config::Config, routes, state::AppState, store::MemoryStore, utils::jwt::sign_jwt,
};
use serde_json::{Value, json};
use std::sync::Arc;

const JWT_SECRET: &str = "profile_test_secret";

async fn spawn_app() -> String {
    let config = Config {
        database_url: None,
        jwt_secret: JWT_SECRET.to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        public_base_url: "http://localhost:3000".to_string(),
        static_dir: None,
        github: None,
        admin_github_users: vec![],
        fingerprint_allow_list: vec![],
    };

    let state = AppState::new(Arc::new(MemoryStore::new()), config);
    let app = routes::create_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

#[tokio::test]
async fn test_profile_photo_flow() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let user_a = format!("ua_{}", &uuid::Uuid::new_v4().to_string()[..8]);
    let token_a = sign_jwt(&user_a, "user", JWT_SECRET, 600).unwrap();

    // 1. No profile yet
    let response = client
        .get(format!("{}/api/profile/{}", address, user_a))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    // 2. Updating requires login
    let response = client
        .put(format!("{}/api/profile/photo", address))
        .json(&json!({ "photoUrl": "https://avatars.example.com/a.png" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    // 3. Non-http URLs are rejected
    let response = client
        .put(format!("{}/api/profile/photo", address))
        .bearer_auth(&token_a)
        .json(&json!({ "photoUrl": "javascript:alert(1)" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // 4. Set the photo, then replace it
    for url in [
        "https://avatars.example.com/a.png",
        "https://avatars.example.com/b.png",
    ] {
        let response = client
            .put(format!("{}/api/profile/photo", address))
            .bearer_auth(&token_a)
            .json(&json!({ "photoUrl": url }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
    }

    // 5. The profile is public and reflects the latest photo
    let profile: Value = client
        .get(format!("{}/api/profile/{}", address, user_a))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(profile["username"], user_a.as_str());
    assert_eq!(profile["photoUrl"], "https://avatars.example.com/b.png");
}

#[tokio::test]
async fn test_profile_update_rejects_forged_token() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let forged = sign_jwt("mallory", "admin", "some_other_secret", 600).unwrap();

    let response = client
        .put(format!("{}/api/profile/photo", address))
        .bearer_auth(&forged)
        .json(&json!({ "photoUrl": "https://avatars.example.com/m.png" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}
