use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::model::{Identity, RoomId};

/// One stored message as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub message: String,
    pub sender: Identity,
    pub sender_name: String,
    /// Stored timestamp, format not guaranteed
    pub date: String,
}

/// A friend entry from the directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Friend {
    pub user_id: Identity,
    pub user_name: String,
}

/// A user found by directory search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub member_no: i64,
    pub member_id: Identity,
    pub user_name: String,
}

#[derive(Debug, Serialize)]
struct RoomRequest<'a> {
    my_id: &'a Identity,
    target_id: &'a Identity,
}

#[derive(Debug, Deserialize)]
struct RoomResponse {
    room_id: RoomId,
    #[serde(default)]
    message: Option<String>,
}

/// Chat backend collaborator
///
/// `resolve_room` must be idempotent: the same pair always yields the same
/// room id.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    /// Resolve or create the room shared by two users
    async fn resolve_room(&self, me: &Identity, peer: &Identity) -> Result<RoomId>;

    /// Fetch the stored messages of a room
    async fn fetch_history(&self, room_id: RoomId) -> Result<Vec<StoredMessage>>;
}

/// REST client for the chat backend
#[derive(Clone)]
pub struct HttpChatBackend {
    client: Client,
    base_url: String,
}

impl HttpChatBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// List the friends (existing rooms) of a user
    pub async fn list_friends(&self, me: &Identity) -> Result<Vec<Friend>> {
        let url = format!("{}/chat/list", self.base_url);

        let friends = self
            .client
            .get(&url)
            .query(&[("user_id", me.as_str())])
            .send()
            .await
            .context("Friend list request failed")?
            .error_for_status()?
            .json::<Vec<Friend>>()
            .await
            .context("Failed to parse friend list")?;

        debug!("Loaded {} friends for {}", friends.len(), me);

        Ok(friends)
    }

    /// Search other users by display name and/or member id
    pub async fn search_users(
        &self,
        me: &Identity,
        name: Option<&str>,
        member_id: Option<&str>,
    ) -> Result<Vec<UserSummary>> {
        if name.is_none() && member_id.is_none() {
            return Ok(Vec::new());
        }

        let url = format!("{}/chat/search", self.base_url);
        let mut query = vec![("my_id", me.as_str())];
        if let Some(name) = name {
            query.push(("name", name));
        }
        if let Some(member_id) = member_id {
            query.push(("member_id", member_id));
        }

        let users = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .context("User search request failed")?
            .error_for_status()?
            .json::<Vec<UserSummary>>()
            .await
            .context("Failed to parse search results")?;

        Ok(users)
    }
}

#[async_trait::async_trait]
impl ChatBackend for HttpChatBackend {
    async fn resolve_room(&self, me: &Identity, peer: &Identity) -> Result<RoomId> {
        let url = format!("{}/chat/room", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&RoomRequest {
                my_id: me,
                target_id: peer,
            })
            .send()
            .await
            .context("Room request failed")?
            .error_for_status()?
            .json::<RoomResponse>()
            .await
            .context("Failed to parse room response")?;

        info!(
            "Resolved room {} for {} / {} ({})",
            response.room_id,
            me,
            peer,
            response.message.as_deref().unwrap_or("ok")
        );

        Ok(response.room_id)
    }

    async fn fetch_history(&self, room_id: RoomId) -> Result<Vec<StoredMessage>> {
        let url = format!("{}/chat/history/{}", self.base_url, room_id);

        let history = self
            .client
            .get(&url)
            .send()
            .await
            .context("History request failed")?
            .error_for_status()?
            .json::<Vec<StoredMessage>>()
            .await
            .context("Failed to parse history")?;

        Ok(history)
    }
}
