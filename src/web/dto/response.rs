//! Response DTOs for the HTTP API.

use serde::Serialize;

use crate::db::User;

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Register / login response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    /// Access token (JWT).
    pub access_token: String,
    /// Access token expiry in seconds.
    pub expires_in: u64,
    pub user: User,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_api_response_wraps_data() {
        let json = serde_json::to_value(ApiResponse::new(vec![1, 2, 3])).unwrap();
        assert_eq!(json, serde_json::json!({ "data": [1, 2, 3] }));
    }

    #[test]
    fn test_auth_response_hides_password() {
        let response = AuthResponse {
            access_token: "token".to_string(),
            expires_in: 3600,
            user: User {
                id: 1,
                username: "jane".to_string(),
                password: "$argon2id$secret".to_string(),
                display_name: "Jane".to_string(),
                avatar_url: None,
                storage_limit: 100,
                storage_used: 0,
                created_at: Utc::now(),
            },
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["accessToken"], "token");
        assert_eq!(json["expiresIn"], 3600);
        assert_eq!(json["user"]["displayName"], "Jane");
        assert!(json["user"].get("password").is_none());
    }
}
